//! Built-in processes.

use crate::{
    component::{ComponentDesc, ComponentKind, DataComponent},
    error::DataError,
    process::{ExecContext, PortDirection, Ports, Process, ProcessError},
};

/// Collects `N` successive values of its input into an `N`-element array.
///
/// Each firing copies the `value` input into element `i` of the `array`
/// output and asks for more input. The firing that fills the last element
/// signals the output instead and restarts at element `0`, so downstream
/// processes fire once per `N` upstream values.
#[derive(Debug, Default)]
pub struct ArrayBuilder {
    value: usize,
    array: usize,
    size: usize,
    fill_index: usize,
}

impl ArrayBuilder {
    /// Name of the input port.
    pub const VALUE: &'static str = "value";
    /// Name of the output port.
    pub const ARRAY: &'static str = "array";

    /// Builder with no ports resolved yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ports for collecting `size` copies of `element`.
    ///
    /// # Errors
    /// If `element` does not build.
    pub fn ports(element: &ComponentDesc, size: usize) -> Result<Ports, DataError> {
        Ok(Ports::new()
            .with_input(Self::VALUE, element.build()?)
            .with_output(
                Self::ARRAY,
                ComponentDesc::fixed_array(element.clone(), size).build()?,
            ))
    }

    /// Element the next firing writes.
    #[must_use]
    pub fn fill_index(&self) -> usize {
        self.fill_index
    }

    /// Number of elements collected per output.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

fn port<'a>(
    component: Option<&'a mut DataComponent>,
    direction: PortDirection,
    name: &str,
) -> Result<&'a mut DataComponent, ProcessError> {
    component.ok_or_else(|| ProcessError::MissingPort {
        direction,
        name: name.to_owned(),
    })
}

impl Process for ArrayBuilder {
    fn initialize(&mut self, ports: &mut Ports) -> Result<(), ProcessError> {
        let value = ports.require(PortDirection::Input, Self::VALUE)?;
        let array = ports.require_shape(PortDirection::Output, Self::ARRAY, ComponentKind::Array)?;
        let input = ports.inputs().port(value).expect("ArrayBuilder::initialize: [1]");
        let output = ports.outputs().port(array).expect("ArrayBuilder::initialize: [2]");
        let root = output.root();
        let element = output.element(root).expect("ArrayBuilder::initialize: [3]");
        let size = output.element_count(root);
        if size == 0 {
            return Err(ProcessError::InvalidParameter {
                name: Self::ARRAY.to_owned(),
                reason: "array has no elements".to_owned(),
            });
        }
        if input.scalar_count(input.root()) != output.scalar_count(element) {
            return Err(ProcessError::InvalidParameter {
                name: Self::VALUE.to_owned(),
                reason: format!(
                    "{} slots do not fill a {}-slot element",
                    input.scalar_count(input.root()),
                    output.scalar_count(element)
                ),
            });
        }
        *self = Self {
            value,
            array,
            size,
            fill_index: 0,
        };
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> Result<(), ProcessError> {
        let Self {
            value,
            array,
            size,
            fill_index,
        } = self;
        let input = port(ctx.input_mut(*value), PortDirection::Input, Self::VALUE)?;
        let values = input
            .data(input.root())
            .ok_or_else(|| DataError::Unbound {
                path: input.path(input.root()),
            })?
            .values()?;

        let output = port(ctx.output_mut(*array), PortDirection::Output, Self::ARRAY)?;
        let root = output.root();
        let element = output.get_component(root, *fill_index)?;
        let target = output.data(element).ok_or_else(|| DataError::Unbound {
            path: output.path(element),
        })?;
        for (index, value) in values.into_iter().enumerate() {
            target.set_value(index, value)?;
        }

        *fill_index += 1;
        if *fill_index < *size {
            ctx.request_input(*value, *array);
        } else {
            ctx.signal_output(*value, *array);
            *fill_index = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarKind;

    #[test]
    fn rejects_empty_array() {
        let mut ports = ArrayBuilder::ports(&ComponentDesc::scalar(ScalarKind::Double), 0).unwrap();
        let err = ArrayBuilder::new().initialize(&mut ports).unwrap_err();
        assert!(matches!(err, ProcessError::InvalidParameter { ref name, .. } if name == "array"));
    }

    #[test]
    fn rejects_missing_input() {
        let mut ports = Ports::new().with_output(
            ArrayBuilder::ARRAY,
            ComponentDesc::fixed_array(ComponentDesc::scalar(ScalarKind::Int), 2)
                .build()
                .unwrap(),
        );
        assert_eq!(
            ArrayBuilder::new().initialize(&mut ports),
            Err(ProcessError::MissingPort {
                direction: PortDirection::Input,
                name: "value".to_owned(),
            })
        );
    }
}
