use crate::{
    component::ComponentKind,
    config::{Config, SchedulerOptions},
    graph::{Connection, Endpoint, ProcessGraph, ProcessSlot},
    process::{PortDirection, Process, ProcessError, Ports},
    types::{ConnectionId, IndexMap, ProcessId},
};
use thiserror::Error;
use tracing::debug;

/// Error kind for graph construction and execution.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum GraphError {
    /// A process with this id is already registered.
    #[error("process {0} is already registered")]
    DuplicateProcess(ProcessId),
    /// No process with this id is registered.
    #[error("process {0} is not registered")]
    UnknownProcess(ProcessId),
    /// No connection with this id exists.
    #[error("{0} does not exist")]
    UnknownConnection(ConnectionId),
    /// The process has no port of that name.
    #[error("process {process} has no {direction} port `{name}`")]
    UnknownPort {
        /// Process looked up.
        process: ProcessId,
        /// Direction looked up.
        direction: PortDirection,
        /// Port name.
        name: String,
    },
    /// The two ports have different shapes.
    #[error("cannot connect {from} ({from_kind}) to {to} ({to_kind})")]
    IncompatiblePorts {
        /// Source port.
        from: Endpoint,
        /// Shape of the source port.
        from_kind: ComponentKind,
        /// Destination port.
        to: Endpoint,
        /// Shape of the destination port.
        to_kind: ComponentKind,
    },
    /// A process cannot feed itself directly.
    #[error("process {0} cannot be connected to itself")]
    SelfConnection(ProcessId),
    /// Destination ports accept a single incoming connection.
    #[error("{0} already has an incoming connection")]
    InputAlreadyConnected(Endpoint),
    /// A process failed to initialize or execute.
    #[error("process {id} failed: {source}")]
    Process {
        /// Failing process.
        id: ProcessId,
        /// What went wrong.
        source: ProcessError,
    },
    /// An earlier process failure stopped the graph.
    #[error("graph halted after a process failure")]
    Halted,
    /// `run_until_idle` fired the maximum number of processes without going
    /// idle.
    #[error("firing limit of {0} reached before the graph went idle")]
    FiringLimit(usize),
}

impl<C: Config> Default for ProcessGraph<C> {
    fn default() -> Self {
        Self::new(SchedulerOptions::default())
    }
}

impl<C: Config> ProcessGraph<C> {
    /// Empty graph.
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            processes: IndexMap::default(),
            connections: vec![],
            options,
            halted: false,
        }
    }

    /// Register `process` under `id` with its declared `ports`.
    ///
    /// # Errors
    /// [`GraphError::DuplicateProcess`] if `id` is taken.
    pub fn add_process(
        &mut self,
        id: ProcessId,
        process: C::Process,
        ports: Ports,
    ) -> Result<(), GraphError> {
        if self.processes.contains_key(&id) {
            return Err(GraphError::DuplicateProcess(id));
        }
        self.processes.insert(id, ProcessSlot { process, ports });
        Ok(())
    }

    /// Connect output `output` of `from` to input `input` of `to`.
    ///
    /// The connection starts needed and not available.
    ///
    /// # Errors
    /// If either process or port is unknown, the ports have different shapes,
    /// `from == to`, or the input is already connected.
    pub fn connect(
        &mut self,
        from: ProcessId,
        output: &str,
        to: ProcessId,
        input: &str,
    ) -> Result<ConnectionId, GraphError> {
        self.connect_port(from, output, to, PortDirection::Input, input)
    }

    /// Connect output `output` of `from` to parameter `parameter` of `to`.
    ///
    /// Parameter connections only share data: they start not needed, so
    /// they never make `to` fire.
    ///
    /// # Errors
    /// See [`connect`](Self::connect).
    pub fn connect_parameter(
        &mut self,
        from: ProcessId,
        output: &str,
        to: ProcessId,
        parameter: &str,
    ) -> Result<ConnectionId, GraphError> {
        self.connect_port(from, output, to, PortDirection::Parameter, parameter)
    }

    fn connect_port(
        &mut self,
        from: ProcessId,
        output: &str,
        to: ProcessId,
        direction: PortDirection,
        input: &str,
    ) -> Result<ConnectionId, GraphError> {
        if from == to {
            return Err(GraphError::SelfConnection(from));
        }
        let (source, from_kind) = self.endpoint(from, PortDirection::Output, output)?;
        let (destination, to_kind) = self.endpoint(to, direction, input)?;
        if from_kind != to_kind {
            return Err(GraphError::IncompatiblePorts {
                from: source,
                from_kind,
                to: destination,
                to_kind,
            });
        }
        if self.connections.iter().any(|c| c.destination == destination) {
            return Err(GraphError::InputAlreadyConnected(destination));
        }
        let id = ConnectionId::new(self.connections.len());
        self.connections.push(Connection::new(source, destination));
        debug!(%source, %destination, "connected ports");
        Ok(id)
    }

    fn endpoint(
        &self,
        process: ProcessId,
        direction: PortDirection,
        name: &str,
    ) -> Result<(Endpoint, ComponentKind), GraphError> {
        let slot = self
            .processes
            .get(&process)
            .ok_or(GraphError::UnknownProcess(process))?;
        let list = slot.ports.list(direction);
        let port = list.index_of(name).ok_or_else(|| GraphError::UnknownPort {
            process,
            direction,
            name: name.to_owned(),
        })?;
        let component = list.port(port).expect("ProcessGraph::endpoint: [1]");
        let endpoint = Endpoint {
            process,
            direction,
            port,
        };
        Ok((endpoint, component.kind(component.root())))
    }

    /// Bind a fresh block to every unbound port, initialize every process in
    /// insertion order, then make every destination port view the block of
    /// its source.
    ///
    /// # Errors
    /// [`GraphError::Process`] naming the first process whose ports cannot be
    /// allocated or whose `initialize` fails.
    pub fn initialize(&mut self) -> Result<(), GraphError> {
        for (&id, slot) in &mut self.processes {
            let ProcessSlot { process, ports } = slot;
            for direction in PortDirection::ALL {
                for component in ports.list_mut(direction).components_mut() {
                    if component.data(component.root()).is_none() {
                        component
                            .assign_new_block()
                            .map_err(|e| GraphError::Process { id, source: e.into() })?;
                    }
                }
            }
            process
                .initialize(ports)
                .map_err(|source| GraphError::Process { id, source })?;
            debug!(process = %id, "initialized process");
        }
        for connection in self.connection_ids() {
            self.check_data_blocks(connection)?;
        }
        Ok(())
    }
}
