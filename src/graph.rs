mod execute;
mod setup;

/// Error returned by graph construction and execution.
pub use crate::graph::setup::GraphError;
use crate::{
    component::DataComponent,
    config::{Config, SchedulerOptions},
    process::{PortDirection, Ports},
    types::{ConnectionId, IndexMap, ProcessId},
};
use derive_more::{Debug, Display};

/// Dataflow graph of processes wired by connections, driven by per-connection
/// readiness flags.
///
/// Key responsibilities:
/// - Owns every process together with its ports.
/// - Validates connections when they are added.
/// - Keeps each destination port viewing the block of its source port, so
///   data moves along connections without copies.
/// - Decides which process fires next from the `needed` and `available`
///   flags of the connections, without any buffering queue between
///   processes.
///
/// Feedback loops are allowed; [`SchedulerOptions::max_firings`] bounds how
/// long a single [`run_until_idle`](Self::run_until_idle) may keep firing.
#[must_use]
#[derive(Debug)]
pub struct ProcessGraph<C: Config> {
    processes: IndexMap<ProcessId, ProcessSlot<C>>,
    connections: Vec<Connection>,
    options: SchedulerOptions,
    /// Set after a process failure. No process fires afterwards.
    halted: bool,
}

#[must_use]
#[derive(Debug)]
pub(crate) struct ProcessSlot<C: Config> {
    process: C::Process,
    ports: Ports,
}

/// One end of a connection: a port of a process.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{process}.{direction}[{port}]")]
pub struct Endpoint {
    /// Owning process.
    pub process: ProcessId,
    /// Role of the port.
    pub direction: PortDirection,
    /// Port index within its direction.
    pub port: usize,
}

/// Directed edge from an output port to an input or parameter port.
///
/// `needed` is owned by the destination: it asks for data. `available` is
/// owned by the source: it says fresh data was produced and not yet consumed.
/// Parameter connections start not needed, so they share data without taking
/// part in scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    source: Endpoint,
    destination: Endpoint,
    needed: bool,
    available: bool,
}

impl Connection {
    fn new(source: Endpoint, destination: Endpoint) -> Self {
        Self {
            source,
            destination,
            needed: destination.direction == PortDirection::Input,
            available: false,
        }
    }

    /// Producing end.
    #[must_use]
    pub fn source(&self) -> Endpoint {
        self.source
    }

    /// Consuming end.
    #[must_use]
    pub fn destination(&self) -> Endpoint {
        self.destination
    }

    /// Whether the destination wants data.
    #[must_use]
    pub fn is_needed(&self) -> bool {
        self.needed
    }

    /// Whether the source produced data the destination has not consumed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }

    fn feeds(&self, process: ProcessId) -> bool {
        self.destination.process == process && self.destination.direction == PortDirection::Input
    }

    fn ready(&self) -> bool {
        self.needed && self.available
    }
}

impl<C: Config> ProcessGraph<C> {
    /// Ports of process `id`.
    #[must_use]
    pub fn ports(&self, id: ProcessId) -> Option<&Ports> {
        self.processes.get(&id).map(|slot| &slot.ports)
    }

    /// Component of one port of process `id`.
    #[must_use]
    pub fn port(&self, id: ProcessId, direction: PortDirection, index: usize) -> Option<&DataComponent> {
        self.ports(id)?.list(direction).port(index)
    }

    /// Mutable component of one port of process `id`, for feeding sources
    /// or reading results from the driving loop.
    #[must_use]
    pub fn port_mut(
        &mut self,
        id: ProcessId,
        direction: PortDirection,
        index: usize,
    ) -> Option<&mut DataComponent> {
        self.processes
            .get_mut(&id)?
            .ports
            .list_mut(direction)
            .port_mut(index)
    }

    /// Process `id`.
    #[must_use]
    pub fn process(&self, id: ProcessId) -> Option<&C::Process> {
        self.processes.get(&id).map(|slot| &slot.process)
    }

    /// Mutable process `id`.
    #[must_use]
    pub fn process_mut(&mut self, id: ProcessId) -> Option<&mut C::Process> {
        self.processes.get_mut(&id).map(|slot| &mut slot.process)
    }

    /// Ids of all processes, in insertion order.
    pub fn process_ids(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.processes.keys().copied()
    }

    /// Connection `id`.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.index())
    }

    /// All connections, in insertion order.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Needed flag of connection `id`.
    #[must_use]
    pub fn is_needed(&self, id: ConnectionId) -> Option<bool> {
        self.connection(id).map(Connection::is_needed)
    }

    /// Override the needed flag of connection `id` from the driving loop.
    ///
    /// # Errors
    /// [`GraphError::UnknownConnection`].
    pub fn set_needed(&mut self, id: ConnectionId, needed: bool) -> Result<(), GraphError> {
        let connection = self
            .connections
            .get_mut(id.index())
            .ok_or(GraphError::UnknownConnection(id))?;
        connection.needed = needed;
        Ok(())
    }

    /// Whether a process failure stopped the graph.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Scheduler bounds in use.
    #[must_use]
    pub fn options(&self) -> SchedulerOptions {
        self.options
    }

    fn connection_ids(&self) -> impl Iterator<Item = ConnectionId> + use<C> {
        (0..self.connections.len()).map(ConnectionId::new)
    }
}
