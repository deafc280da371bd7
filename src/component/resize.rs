use crate::{
    block::DataBlock,
    component::{ArraySize, ComponentKind, DataComponent, NodeId, Shape, SizeDriverPath},
    error::DataError,
    value::{ScalarKind, ScalarValue},
};
use tracing::{debug, trace};

/// Slot count of one node before and after a structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCountChange {
    /// Node whose count changed.
    pub node: NodeId,
    /// Count before the change.
    pub old: usize,
    /// Count after the change.
    pub new: usize,
}

/// Nodes whose slot count was updated by a resize or a choice switch.
///
/// Only the changed node, the arrays whose buffer holds it, and the parent
/// of that buffer are updated. Callers holding the tree inside a deeper
/// structure keep going with [`DataComponent::propagate_slot_count`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct ResizeReport {
    changes: Vec<SlotCountChange>,
}

impl ResizeReport {
    /// Changes in the order they were applied.
    #[must_use]
    pub fn changes(&self) -> &[SlotCountChange] {
        &self.changes
    }

    /// Whether nothing was resized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Whether the slot count of `node` was updated.
    #[must_use]
    pub fn touched(&self, node: NodeId) -> bool {
        self.changes.iter().any(|change| change.node == node)
    }

    pub(crate) fn push(&mut self, node: NodeId, old: usize, new: usize) {
        self.changes.push(SlotCountChange { node, old, new });
    }

    pub(crate) fn merge(&mut self, other: Self) {
        self.changes.extend(other.changes);
    }
}

impl DataComponent {
    /// Number of elements of an array; the number of direct components for
    /// every other shape.
    ///
    /// A variable-length array reads its size driver when the driver is
    /// bound. A negative or non-numeric driver value counts as zero. An
    /// unbound driver falls back to the last size applied.
    #[must_use]
    pub fn element_count(&self, id: NodeId) -> usize {
        let shape = &self.node(id).shape;
        let Shape::Array(array) = shape else {
            return shape.children().len();
        };
        let ArraySize::Variable(path) = &array.size else {
            return array.element_count;
        };
        match self.resolve_driver(id, path).and_then(|driver| self.data(driver)) {
            Some(block) => block
                .long_value(0)
                .ok()
                .and_then(|value| usize::try_from(value).ok())
                .unwrap_or(0),
            None => array.element_count,
        }
    }

    /// Whether `id` is an array sized by another scalar.
    #[must_use]
    pub fn is_variable_length(&self, id: NodeId) -> bool {
        matches!(&self.node(id).shape, Shape::Array(array) if matches!(array.size, ArraySize::Variable(_)))
    }

    /// Scalar carrying the size of a variable-length array.
    #[must_use]
    pub fn size_driver(&self, id: NodeId) -> Option<NodeId> {
        match &self.node(id).shape {
            Shape::Array(array) => match &array.size {
                ArraySize::Variable(path) => self.resolve_driver(id, path),
                ArraySize::Fixed => None,
            },
            _ => None,
        }
    }

    fn resolve_driver(&self, id: NodeId, path: &SizeDriverPath) -> Option<NodeId> {
        let mut holder = id;
        for _ in 0..path.steps {
            holder = self.parent(holder)?;
        }
        self.child_by_name(holder, &path.name)
            .filter(|&driver| self.scalar_kind(driver).is_some_and(ScalarKind::is_integer))
    }

    /// Resize a variable-length array to `count` elements.
    ///
    /// The new size is written to the size driver, a new block is allocated
    /// for the array holding a copy of the old values (truncated or
    /// zero-padded) and swapped into the parent's block, and the slot counts
    /// of the array and its parent are updated. Views taken before the call
    /// are stale afterwards.
    ///
    /// An array nested in the elements of other arrays has one copy per
    /// enclosing element in the outermost enclosing buffer. Every copy keeps
    /// its own values, truncated or zero-padded the same way.
    ///
    /// Fixed-size arrays ignore the request and return an empty report.
    ///
    /// # Errors
    /// If `id` is not an array, its size driver cannot be resolved, or the
    /// surrounding blocks do not match the tree.
    pub fn resize(&mut self, id: NodeId, count: usize) -> Result<ResizeReport, DataError> {
        let Shape::Array(array) = &self.node(id).shape else {
            return Err(self.shape_error(id, ComponentKind::Array));
        };
        let ArraySize::Variable(path) = &array.size else {
            trace!(path = %self.path(id), count, "ignored resize of fixed-size array");
            return Ok(ResizeReport::default());
        };
        let driver = self
            .resolve_driver(id, path)
            .ok_or_else(|| DataError::MissingSizeDriver {
                path: self.path(id),
                name: path.name.clone(),
            })?;
        if let Some(block) = self.data(driver) {
            block.set_value(0, ScalarValue::Long(i64::try_from(count).unwrap_or(i64::MAX)))?;
        }
        self.apply_size(id, count)
    }

    /// Re-read the size drivers below `id` and resize every variable-length
    /// array whose storage no longer matches its driver.
    ///
    /// Arrays nested in an element are synced before the array holding
    /// them, so the outer array is sized with the new element width. Only
    /// the selected item of a choice is visited.
    ///
    /// Use this after writing a size driver directly, for instance while
    /// decoding a stream into the tree.
    ///
    /// # Errors
    /// See [`resize`](Self::resize).
    pub fn sync_size(&mut self, id: NodeId) -> Result<ResizeReport, DataError> {
        let mut report = ResizeReport::default();
        let nested: Vec<NodeId> = match &self.node(id).shape {
            Shape::Choice { items, selected } => items.get(*selected).copied().into_iter().collect(),
            shape => shape.children().to_vec(),
        };
        for child in nested {
            report.merge(self.sync_size(child)?);
        }
        if let Shape::Array(array) = &self.node(id).shape
            && matches!(array.size, ArraySize::Variable(_))
        {
            let stored = array.element_count;
            let element = array.element;
            let count = self.element_count(id);
            let expected = count * self.scalar_count(element);
            let stale = self.data(id).is_some_and(|block| block.atom_count() != expected);
            if count != stored || stale {
                report.merge(self.apply_size(id, count)?);
            }
        }
        Ok(report)
    }

    /// Turn the array at `id` into a fixed-size array of `count` elements.
    ///
    /// Slot counts are recomputed up to the root. Bound blocks are not
    /// reallocated; assign a new block to get storage of the new size.
    ///
    /// # Errors
    /// If `id` is not an array.
    pub fn set_fixed_size(&mut self, id: NodeId, count: usize) -> Result<(), DataError> {
        if self.kind(id) != ComponentKind::Array {
            return Err(self.shape_error(id, ComponentKind::Array));
        }
        if let Shape::Array(array) = &mut self.node_mut(id).shape {
            array.size = ArraySize::Fixed;
            array.element_count = count;
        }
        self.refresh_scalar_count(id);
        let mut current = id;
        while let Some(change) = self.propagate_slot_count(current) {
            current = change.node;
        }
        Ok(())
    }

    /// Recompute the slot count of the parent of `id` from its components.
    ///
    /// Returns the change, or `None` at the root or when the count is
    /// unchanged. Call it again with the returned node to continue upward.
    pub fn propagate_slot_count(&mut self, id: NodeId) -> Option<SlotCountChange> {
        let parent = self.parent(id)?;
        let old = self.scalar_count(parent);
        let new = self.refresh_scalar_count(parent);
        (old != new).then_some(SlotCountChange {
            node: parent,
            old,
            new,
        })
    }

    fn apply_size(&mut self, id: NodeId, count: usize) -> Result<ResizeReport, DataError> {
        let mut report = ResizeReport::default();
        let old = self.scalar_count(id);
        let element = match &mut self.node_mut(id).shape {
            Shape::Array(array) => {
                array.element_count = count;
                array.element
            }
            _ => unreachable!("DataComponent::apply_size"),
        };
        let new = count * self.scalar_count(element);
        self.node_mut(id).scalar_count = new;
        report.push(id, old, new);

        match self.enclosing_array(id) {
            // Nested in array elements: the outermost enclosing array owns
            // the only buffer, holding `copies` strided copies of `id`.
            Some(parent) => {
                let mut owner = parent;
                let mut copies = self.element_count(parent);
                loop {
                    let before = self.scalar_count(owner);
                    let after = self.refresh_scalar_count(owner);
                    report.push(owner, before, after);
                    let Some(up) = self.enclosing_array(owner) else {
                        break;
                    };
                    copies *= self.element_count(up);
                    owner = up;
                }
                self.reallocate(owner, |block| block.restrided(copies, old, new))?;
                if let Some(change) = self.propagate_slot_count(owner) {
                    report.changes.push(change);
                }
            }
            None => {
                self.reallocate(id, |block| block.resized(new))?;
                if let Some(change) = self.propagate_slot_count(id) {
                    report.changes.push(change);
                }
            }
        }
        debug!(path = %self.path(id), old, new, "resized variable-length array");
        Ok(report)
    }

    fn enclosing_array(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id)
            .filter(|&parent| self.kind(parent) == ComponentKind::Array)
    }

    /// Swap the block of `id` for the copy `relayout` makes of it, then point
    /// the parent's mixed block at it.
    fn reallocate(
        &mut self,
        id: NodeId,
        relayout: impl FnOnce(&DataBlock) -> Option<DataBlock>,
    ) -> Result<(), DataError> {
        let Some(block) = self.data(id).cloned() else {
            return Ok(());
        };
        let fresh = relayout(&block).ok_or_else(|| self.layout_error(id))?;
        self.bind(id, fresh.clone())?;
        match self.parent(id) {
            Some(parent) => self.reattach(parent, id, fresh),
            None => Ok(()),
        }
    }

    fn reattach(&mut self, parent: NodeId, child: NodeId, block: DataBlock) -> Result<(), DataError> {
        let Some(data) = self.data(parent) else {
            return Ok(());
        };
        let DataBlock::Mixed(mixed) = data else {
            return Err(self.layout_error(parent));
        };
        let index = match &self.node(parent).shape {
            Shape::Choice { .. } => 1,
            shape => shape
                .children()
                .iter()
                .position(|&c| c == child)
                .expect("DataComponent::reattach: [1]"),
        };
        if mixed.replace_member(index, block) {
            Ok(())
        } else {
            Err(self.layout_error(parent))
        }
    }
}
