use crate::value::ScalarKind;
use thiserror::Error;

/// Error kind for the component and storage layer.
///
/// Paths are the slash-separated component names from the tree root
/// (`packet/values/<element>`), see [`DataComponent::path`].
///
/// [`DataComponent::path`]: crate::component::DataComponent::path
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum DataError {
    /// An array or record child was requested outside `[0, count)`.
    #[error("index {index} is out of bounds for `{path}` with {count} components")]
    IndexOutOfBounds {
        /// Component being indexed.
        path: String,
        /// Requested index.
        index: usize,
        /// Current number of components.
        count: usize,
    },
    /// A slot was read or written past the atoms visible from a block view.
    #[error("atom {index} is outside the {atom_count} atoms visible from this block")]
    AtomOutOfRange {
        /// Requested atom.
        index: usize,
        /// Atoms visible from the view.
        atom_count: usize,
    },
    /// The tree shape maps to a storage layout that is not implemented, such
    /// as an array of heterogeneous records.
    #[error("no storage layout for arrays of heterogeneous records at `{path}`")]
    UnsupportedLayout {
        /// Offending component.
        path: String,
    },
    /// The scalar carrying the size of a variable-length array cannot be found.
    #[error("size driver `{name}` of `{path}` cannot be resolved")]
    MissingSizeDriver {
        /// Variable-length array.
        path: String,
        /// Name of the size driver.
        name: String,
    },
    /// A value was accessed on a component that has no data block.
    #[error("`{path}` is not bound to a data block")]
    Unbound {
        /// Offending component.
        path: String,
    },
    /// The component does not have the shape the operation requires.
    #[error("`{path}` is a {actual}, expected a {expected}")]
    ShapeMismatch {
        /// Offending component.
        path: String,
        /// Required shape.
        expected: &'static str,
        /// Actual shape.
        actual: &'static str,
    },
    /// A data block does not have the layout the component tree expects.
    #[error("data block bound to `{path}` does not match its structure")]
    LayoutMismatch {
        /// Offending component.
        path: String,
    },
    /// Two siblings would share a name.
    #[error("`{path}` already has a component named `{name}`")]
    DuplicateName {
        /// Parent component.
        path: String,
        /// Duplicated name.
        name: String,
    },
    /// A value cannot be represented in the requested kind.
    #[error("cannot convert `{value}` to {to}")]
    Conversion {
        /// Textual form of the source value.
        value: String,
        /// Requested kind.
        to: ScalarKind,
    },
}
