use crate::{
    config::Config,
    graph::{GraphError, ProcessGraph, ProcessSlot},
    process::{ExecContext, PortDirection, Process},
    types::{ConnectionId, HashSet, ProcessId},
};
use tracing::{debug, trace, warn};

impl<C: Config> ProcessGraph<C> {
    /// Make the destination port of connection `id` view the block of its
    /// source port, if it does not already.
    ///
    /// Returns whether the destination was rebound. A source resized since
    /// the last check counts as a different block, so the destination picks
    /// up the new storage here.
    ///
    /// # Errors
    /// [`GraphError::UnknownConnection`], or [`GraphError::Process`] naming
    /// the destination when the source block does not fit its port.
    pub fn check_data_blocks(&mut self, id: ConnectionId) -> Result<bool, GraphError> {
        let connection = self
            .connection(id)
            .cloned()
            .ok_or(GraphError::UnknownConnection(id))?;
        let (source, destination) = (connection.source(), connection.destination());
        let Some(block) = self
            .port(source.process, source.direction, source.port)
            .and_then(|component| component.data(component.root()))
            .cloned()
        else {
            return Ok(false);
        };
        let component = self
            .port_mut(destination.process, destination.direction, destination.port)
            .expect("ProcessGraph::check_data_blocks: [1]");
        let root = component.root();
        if component.is_bound_to(root, &block) {
            return Ok(false);
        }
        component.bind(root, block).map_err(|e| GraphError::Process {
            id: destination.process,
            source: e.into(),
        })?;
        debug!(%source, %destination, "rebound destination port to source block");
        Ok(true)
    }

    /// Whether process `id` may fire now.
    ///
    /// A process with input connections needs at least one of them needed
    /// and available, and every needed one available. Every process needs
    /// each needed output connection drained by its consumer. Sources have
    /// no input condition; the driving loop fires them through
    /// [`execute_process`](Self::execute_process).
    #[must_use]
    pub fn can_run(&self, id: ProcessId) -> bool {
        let mut has_inputs = false;
        let mut fed = false;
        for connection in &self.connections {
            if connection.feeds(id) {
                has_inputs = true;
                if connection.needed {
                    if !connection.available {
                        return false;
                    }
                    fed = true;
                }
            }
            if connection.source.process == id && connection.ready() {
                return false;
            }
        }
        !has_inputs || fed
    }

    /// Execute process `id` once.
    ///
    /// Destination ports of `id` are rebound to their sources first. When
    /// `execute` succeeds, the flag changes it made are applied, the inputs
    /// it was fed are consumed and its needed outputs become available. An
    /// output held back with [`ExecContext::request_input`] stays
    /// unavailable, so no consumer reads it half written. Consuming
    /// the data of a source that stopped asking for input (it signalled its
    /// output) re-arms that source's inputs once all its needed outputs are
    /// drained.
    ///
    /// # Errors
    /// [`GraphError::Halted`] after an earlier failure,
    /// [`GraphError::UnknownProcess`], or [`GraphError::Process`] when the
    /// process fails. A failure halts the graph and leaves every flag as it
    /// was.
    pub fn execute_process(&mut self, id: ProcessId) -> Result<(), GraphError> {
        if self.halted {
            return Err(GraphError::Halted);
        }
        if !self.processes.contains_key(&id) {
            return Err(GraphError::UnknownProcess(id));
        }
        let incoming: Vec<ConnectionId> = self
            .connection_ids()
            .filter(|&c| self.connections[c.index()].destination.process == id)
            .collect();
        for &connection in &incoming {
            if let Err(error) = self.check_data_blocks(connection) {
                return Err(self.halt(id, error));
            }
        }
        let fed: Vec<ConnectionId> = incoming
            .into_iter()
            .filter(|&c| {
                let connection = &self.connections[c.index()];
                connection.feeds(id) && connection.ready()
            })
            .collect();

        let Self {
            processes,
            connections,
            ..
        } = self;
        let ProcessSlot { process, ports } =
            processes.get_mut(&id).expect("ProcessGraph::execute_process: [1]");
        let mut input_needed = vec![false; ports.inputs().len()];
        let mut output_needed = vec![false; ports.outputs().len()];
        for connection in connections.iter() {
            if connection.feeds(id) {
                input_needed[connection.destination.port] = connection.needed;
            }
            if connection.source.process == id {
                output_needed[connection.source.port] |= connection.needed;
            }
        }
        let mut ctx = ExecContext::new(ports, &input_needed, &output_needed);
        let result = process.execute(&mut ctx);
        let staged = ctx.into_staged();
        if let Err(source) = result {
            return Err(self.halt(id, GraphError::Process { id, source }));
        }

        for connection in connections.iter_mut() {
            if connection.feeds(id)
                && let Some(&Some(needed)) = staged.inputs.get(connection.destination.port)
            {
                connection.needed = needed;
            }
            if connection.source.process == id {
                if let Some(&Some(needed)) = staged.outputs.get(connection.source.port) {
                    connection.needed = needed;
                }
                if connection.needed {
                    connection.available = true;
                }
            }
        }
        let mut drained = HashSet::default();
        for connection in fed {
            let connection = &mut self.connections[connection.index()];
            connection.available = false;
            drained.insert(connection.source.process);
        }
        for source in drained {
            self.rearm(source);
        }
        trace!(process = %id, "fired process");
        Ok(())
    }

    /// Set every input of `id` needed again once it stopped asking for input
    /// and all its needed outputs were consumed.
    fn rearm(&mut self, id: ProcessId) {
        let waiting = self
            .connections
            .iter()
            .any(|c| (c.feeds(id) && c.needed) || (c.source.process == id && c.ready()));
        if waiting {
            return;
        }
        let mut rearmed = false;
        for connection in &mut self.connections {
            if connection.feeds(id) {
                connection.needed = true;
                rearmed = true;
            }
        }
        if rearmed {
            trace!(process = %id, "re-armed inputs");
        }
    }

    fn halt(&mut self, id: ProcessId, error: GraphError) -> GraphError {
        self.halted = true;
        warn!(process = %id, %error, "process failed, halting graph");
        error
    }

    /// Fire the destination of the first connection, in insertion order,
    /// that is needed and available and whose destination can run.
    ///
    /// Returns the fired process, or `None` when the graph is idle.
    ///
    /// # Errors
    /// See [`execute_process`](Self::execute_process).
    pub fn step(&mut self) -> Result<Option<ProcessId>, GraphError> {
        if self.halted {
            return Err(GraphError::Halted);
        }
        let Some(id) = self.next_ready() else {
            return Ok(None);
        };
        self.execute_process(id)?;
        Ok(Some(id))
    }

    fn next_ready(&self) -> Option<ProcessId> {
        self.connections
            .iter()
            .filter(|c| c.destination.direction == PortDirection::Input && c.ready())
            .map(|c| c.destination.process)
            .find(|&id| self.can_run(id))
    }

    /// Step until the graph is idle. Returns the number of firings.
    ///
    /// # Errors
    /// [`GraphError::FiringLimit`] when another process is ready after
    /// [`SchedulerOptions::max_firings`](crate::config::SchedulerOptions)
    /// firings, or any error of [`step`](Self::step).
    pub fn run_until_idle(&mut self) -> Result<usize, GraphError> {
        if self.halted {
            return Err(GraphError::Halted);
        }
        let max_firings = self.options.max_firings;
        let mut firings = 0;
        while let Some(id) = self.next_ready() {
            if firings == max_firings {
                warn!(max_firings, "firing limit reached, graph is not idle");
                return Err(GraphError::FiringLimit(max_firings));
            }
            self.execute_process(id)?;
            firings += 1;
        }
        Ok(firings)
    }
}
