use crate::process::Process;

/// Configuration entry-point for instantiating a process graph.
///
/// A concrete `Config` binds the process type a [`ProcessGraph`] owns and
/// fires. Graphs of one process type use it directly; graphs mixing several
/// use [`DynConfig`].
///
/// [`ProcessGraph`]: crate::graph::ProcessGraph
pub trait Config: Sized + 'static {
    /// The process type the graph constructs its slots from.
    type Process: Process;
}

/// Binds boxed trait objects, for graphs of heterogeneous processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynConfig;

impl Config for DynConfig {
    type Process = Box<dyn Process>;
}

/// Bounds applied by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Maximum number of firings in one
    /// [`run_until_idle`](crate::graph::ProcessGraph::run_until_idle) call.
    /// Feedback loops that never go idle stop here.
    pub max_firings: usize,
}

impl SchedulerOptions {
    /// Firing limit used by [`Default`].
    pub const DEFAULT_MAX_FIRINGS: usize = 10_000;

    /// Replace the firing limit.
    #[must_use]
    pub fn with_max_firings(mut self, max_firings: usize) -> Self {
        self.max_firings = max_firings;
        self
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_firings: Self::DEFAULT_MAX_FIRINGS,
        }
    }
}
