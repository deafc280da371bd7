use crate::{
    component::{ComponentKind, DataComponent},
    error::DataError,
    types::IndexMap,
};
use core::fmt::Debug;
use derive_more::{Deref, Display};
use thiserror::Error;

/// A processing node of a dataflow graph.
///
/// Processes are constructed by the caller and handed to
/// [`ProcessGraph::add_process`] together with their [`Ports`]. The graph
/// calls `initialize` once, then `execute` each time the readiness flags on
/// the process's connections allow it to fire.
///
/// [`ProcessGraph::add_process`]: crate::graph::ProcessGraph::add_process
pub trait Process: Debug {
    /// Look up and validate the ports the process works with, typically
    /// remembering their indices for `execute`.
    ///
    /// Every port is bound to a data block before this is called.
    ///
    /// # Errors
    /// A configuration error naming the offending port when a required port
    /// is absent or has the wrong shape.
    fn initialize(&mut self, ports: &mut Ports) -> Result<(), ProcessError>;

    /// Perform one unit of work: read the inputs, write the outputs, and
    /// adjust the needed flags through `ctx`. Must not block.
    ///
    /// # Errors
    /// When the computation fails. Flag changes made through `ctx` are then
    /// discarded and the graph stops.
    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<(), ProcessError>;
}

impl<P: Process + ?Sized> Process for Box<P> {
    fn initialize(&mut self, ports: &mut Ports) -> Result<(), ProcessError> {
        (**self).initialize(ports)
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<(), ProcessError> {
        (**self).execute(ctx)
    }
}

/// Role of a port.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Data consumed by the process.
    #[display("input")]
    Input,
    /// Data produced by the process.
    #[display("output")]
    Output,
    /// Configuration data read by the process.
    #[display("parameter")]
    Parameter,
}

impl PortDirection {
    /// Every direction, in declaration order.
    pub const ALL: [Self; 3] = [Self::Input, Self::Output, Self::Parameter];
}

/// Error kind for process configuration and execution.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ProcessError {
    /// A required port is not declared.
    #[error("missing {direction} port `{name}`")]
    MissingPort {
        /// Direction the port was looked up in.
        direction: PortDirection,
        /// Port name.
        name: String,
    },
    /// A port has the wrong shape.
    #[error("{direction} port `{name}` is a {actual}, expected a {expected}")]
    PortShape {
        /// Direction of the port.
        direction: PortDirection,
        /// Port name.
        name: String,
        /// Required shape.
        expected: ComponentKind,
        /// Declared shape.
        actual: ComponentKind,
    },
    /// A port or parameter holds a value the process cannot work with.
    #[error("invalid port `{name}`: {reason}")]
    InvalidParameter {
        /// Port name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The computation itself failed.
    #[error("execution failed: {0}")]
    Execution(String),
    /// Reading or writing port data failed.
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Named components of one direction, in declaration order.
///
/// Dereferences to the underlying map for lookups by name or position.
#[derive(Debug, Default, Deref)]
pub struct PortList(IndexMap<String, DataComponent>);

impl PortList {
    /// Declare the port `name`, replacing a previous one of the same name.
    /// Returns its index.
    pub fn add(&mut self, name: impl Into<String>, component: DataComponent) -> usize {
        self.0.insert_full(name.into(), component).0
    }

    /// Component of port `index`.
    #[must_use]
    pub fn port(&self, index: usize) -> Option<&DataComponent> {
        self.0.get_index(index).map(|(_, component)| component)
    }

    /// Mutable component of port `index`.
    #[must_use]
    pub fn port_mut(&mut self, index: usize) -> Option<&mut DataComponent> {
        self.0.get_index_mut(index).map(|(_, component)| component)
    }

    /// Index of the port called `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.get_index_of(name)
    }

    /// Name of port `index`.
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.0.get_index(index).map(|(name, _)| name.as_str())
    }

    pub(crate) fn components_mut(&mut self) -> impl Iterator<Item = &mut DataComponent> {
        self.0.values_mut()
    }
}

/// Input, output and parameter ports of a process.
///
/// ```
/// use swedf::{component::ComponentDesc, process::{PortDirection, Ports}, value::ScalarKind};
///
/// let ports = Ports::new()
///     .with_input("value", ComponentDesc::scalar(ScalarKind::Double).build().unwrap())
///     .with_output("sum", ComponentDesc::scalar(ScalarKind::Double).build().unwrap());
/// assert_eq!(ports.require(PortDirection::Output, "sum"), Ok(0));
/// assert!(ports.require(PortDirection::Parameter, "gain").is_err());
/// ```
#[derive(Debug, Default)]
pub struct Ports {
    inputs: PortList,
    outputs: PortList,
    parameters: PortList,
}

impl Ports {
    /// No ports.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input port.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, component: DataComponent) -> Self {
        self.inputs.add(name, component);
        self
    }

    /// Add an output port.
    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>, component: DataComponent) -> Self {
        self.outputs.add(name, component);
        self
    }

    /// Add a parameter port.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, component: DataComponent) -> Self {
        self.parameters.add(name, component);
        self
    }

    /// Ports of `direction`.
    #[must_use]
    pub fn list(&self, direction: PortDirection) -> &PortList {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
            PortDirection::Parameter => &self.parameters,
        }
    }

    /// Mutable ports of `direction`.
    #[must_use]
    pub fn list_mut(&mut self, direction: PortDirection) -> &mut PortList {
        match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
            PortDirection::Parameter => &mut self.parameters,
        }
    }

    /// Input ports.
    #[must_use]
    pub fn inputs(&self) -> &PortList {
        &self.inputs
    }

    /// Output ports.
    #[must_use]
    pub fn outputs(&self) -> &PortList {
        &self.outputs
    }

    /// Parameter ports.
    #[must_use]
    pub fn parameters(&self) -> &PortList {
        &self.parameters
    }

    /// Index of the port `name`.
    ///
    /// # Errors
    /// [`ProcessError::MissingPort`] if there is no such port.
    pub fn require(&self, direction: PortDirection, name: &str) -> Result<usize, ProcessError> {
        self.list(direction)
            .index_of(name)
            .ok_or_else(|| ProcessError::MissingPort {
                direction,
                name: name.to_owned(),
            })
    }

    /// Index of the port `name`, which must have the shape `kind`.
    ///
    /// # Errors
    /// [`ProcessError::MissingPort`] or [`ProcessError::PortShape`].
    pub fn require_shape(
        &self,
        direction: PortDirection,
        name: &str,
        kind: ComponentKind,
    ) -> Result<usize, ProcessError> {
        let index = self.require(direction, name)?;
        let component = self.list(direction).port(index).expect("Ports::require_shape: [1]");
        let actual = component.kind(component.root());
        if actual != kind {
            return Err(ProcessError::PortShape {
                direction,
                name: name.to_owned(),
                expected: kind,
                actual,
            });
        }
        Ok(index)
    }
}

/// Needed flag of one port as seen during `execute`: the value on the
/// connection, possibly overridden by the running process.
#[derive(Debug, Clone, Copy)]
struct PortFlag {
    current: bool,
    staged: Option<bool>,
}

impl PortFlag {
    fn get(self) -> bool {
        self.staged.unwrap_or(self.current)
    }
}

/// Flag changes requested by a process, per port index, to apply once its
/// `execute` succeeded.
#[derive(Debug, Clone, Default)]
pub(crate) struct StagedFlags {
    pub(crate) inputs: Vec<Option<bool>>,
    pub(crate) outputs: Vec<Option<bool>>,
}

/// What a process sees while it executes: its ports and the needed flags of
/// the connections attached to them.
///
/// An unconnected port reads as not needed. Flag changes are staged and only
/// reach the connections if `execute` returns `Ok`.
///
/// # Panics
/// The flag methods panic when given an index past the declared ports.
#[derive(Debug)]
pub struct ExecContext<'a> {
    ports: &'a mut Ports,
    inputs: Vec<PortFlag>,
    outputs: Vec<PortFlag>,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(ports: &'a mut Ports, inputs: &[bool], outputs: &[bool]) -> Self {
        let flags = |needed: &[bool]| -> Vec<PortFlag> {
            needed
                .iter()
                .map(|&current| PortFlag {
                    current,
                    staged: None,
                })
                .collect()
        };
        Self {
            inputs: flags(inputs),
            outputs: flags(outputs),
            ports,
        }
    }

    pub(crate) fn into_staged(self) -> StagedFlags {
        let Self {
            ports: _,
            inputs,
            outputs,
        } = self;
        StagedFlags {
            inputs: inputs.iter().map(|flag| flag.staged).collect(),
            outputs: outputs.iter().map(|flag| flag.staged).collect(),
        }
    }

    /// All ports of the running process.
    #[must_use]
    pub fn ports(&self) -> &Ports {
        self.ports
    }

    /// Component of input `index`. Mutable because array traversal moves
    /// element views.
    #[must_use]
    pub fn input_mut(&mut self, index: usize) -> Option<&mut DataComponent> {
        self.ports.inputs.port_mut(index)
    }

    /// Component of output `index`.
    #[must_use]
    pub fn output_mut(&mut self, index: usize) -> Option<&mut DataComponent> {
        self.ports.outputs.port_mut(index)
    }

    /// Component of input `index`.
    #[must_use]
    pub fn input(&self, index: usize) -> Option<&DataComponent> {
        self.ports.inputs.port(index)
    }

    /// Component of output `index`.
    #[must_use]
    pub fn output(&self, index: usize) -> Option<&DataComponent> {
        self.ports.outputs.port(index)
    }

    /// Component of parameter `index`.
    #[must_use]
    pub fn parameter(&self, index: usize) -> Option<&DataComponent> {
        self.ports.parameters.port(index)
    }

    /// Whether the connection into input `index` wants data.
    #[must_use]
    pub fn is_input_needed(&self, index: usize) -> bool {
        self.inputs[index].get()
    }

    /// Whether a connection out of output `index` wants data.
    #[must_use]
    pub fn is_output_needed(&self, index: usize) -> bool {
        self.outputs[index].get()
    }

    /// Mark input `index` as needed or not.
    pub fn set_input_needed(&mut self, index: usize, needed: bool) {
        self.inputs[index].staged = Some(needed);
    }

    /// Mark every connection out of output `index` as needed or not.
    pub fn set_output_needed(&mut self, index: usize, needed: bool) {
        self.outputs[index].staged = Some(needed);
    }

    /// Ask for more data on `input` while holding back `output`.
    pub fn request_input(&mut self, input: usize, output: usize) {
        self.set_input_needed(input, true);
        self.set_output_needed(output, false);
    }

    /// Release `output` to its consumers and stop asking for `input` until
    /// they have drained it.
    pub fn signal_output(&mut self, input: usize, output: usize) {
        self.set_input_needed(input, false);
        self.set_output_needed(output, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{component::ComponentDesc, value::ScalarKind};

    fn scalar() -> DataComponent {
        ComponentDesc::scalar(ScalarKind::Int).build().unwrap()
    }

    #[test]
    fn require_shape_names_the_port() {
        let ports = Ports::new().with_input("value", scalar());
        assert_eq!(
            ports.require_shape(PortDirection::Input, "value", ComponentKind::Array),
            Err(ProcessError::PortShape {
                direction: PortDirection::Input,
                name: "value".into(),
                expected: ComponentKind::Array,
                actual: ComponentKind::Scalar,
            })
        );
        let err = ports.require(PortDirection::Output, "value").unwrap_err();
        assert_eq!(err.to_string(), "missing output port `value`");
    }

    #[test]
    fn flag_changes_are_staged() {
        let mut ports = Ports::new().with_input("in", scalar()).with_output("out", scalar());
        let mut ctx = ExecContext::new(&mut ports, &[true], &[true]);
        ctx.signal_output(0, 0);
        assert!(!ctx.is_input_needed(0));
        assert!(ctx.is_output_needed(0));
        ctx.request_input(0, 0);
        assert!(!ctx.is_output_needed(0));

        let staged = ctx.into_staged();
        assert_eq!(staged.inputs, vec![Some(true)]);
        assert_eq!(staged.outputs, vec![Some(false)]);
    }
}
