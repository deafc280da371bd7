use core::num::NonZeroU16;
use derive_more::Display;
use indexmap::IndexMap as _IndexMap;
use rustc_hash::FxBuildHasher;
use std::collections::HashSet as _HashSet;

/// Unique identifier of a process in a graph.
///
/// Compact `NonZeroU16` bounds the number of processes and keeps
/// `Option<ProcessId>` the size of the id itself.
pub type ProcessId = NonZeroU16;

/// Position of a connection in its graph, in insertion order.
///
/// The scheduler scans connections in this order, so lower ids win ties
/// between processes that are ready at the same time.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("connection {_0}")]
pub struct ConnectionId(u16);

impl ConnectionId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index.try_into().expect("ConnectionId::new: [1]"))
    }

    /// Position in the graph's connection list.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) type HashSet<T> = _HashSet<T, FxBuildHasher>;
/// `IndexMap` type with fast hasher.
pub type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
