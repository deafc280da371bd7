mod binding;
mod build;
mod resize;

pub use crate::component::{
    build::{ComponentDesc, SizeDesc},
    resize::{ResizeReport, SlotCountChange},
};
use crate::{
    block::DataBlock,
    error::DataError,
    value::{ScalarKind, ScalarValue},
};
use core::fmt;
use derive_more::Display;

/// Index of a node inside one [`DataComponent`] arena.
///
/// Ids are only meaningful for the tree that produced them. Operations taking
/// a foreign id panic on out-of-range indices.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("#{_0}")]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index.try_into().expect("NodeId::new: [1]"))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Shape family of a component.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Single primitive value.
    #[display("scalar")]
    Scalar,
    /// Ordered named fields.
    #[display("record")]
    Record,
    /// Repeated element, fixed or variable length.
    #[display("array")]
    Array,
    /// Tagged union of items.
    #[display("choice")]
    Choice,
}

impl ComponentKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Record => "record",
            Self::Array => "array",
            Self::Choice => "choice",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Shape {
    Scalar(ScalarKind),
    Record(Vec<NodeId>),
    Array(ArrayShape),
    Choice { items: Vec<NodeId>, selected: usize },
}

impl Shape {
    fn kind(&self) -> ComponentKind {
        match self {
            Self::Scalar(_) => ComponentKind::Scalar,
            Self::Record(_) => ComponentKind::Record,
            Self::Array(_) => ComponentKind::Array,
            Self::Choice { .. } => ComponentKind::Choice,
        }
    }

    fn children(&self) -> &[NodeId] {
        match self {
            Self::Scalar(_) => &[],
            Self::Record(fields) => fields,
            Self::Array(array) => core::slice::from_ref(&array.element),
            Self::Choice { items, .. } => items,
        }
    }

    fn remap(&mut self, offset: usize) {
        let shift = |id: &mut NodeId| *id = NodeId::new(id.index() + offset);
        match self {
            Self::Scalar(_) => {}
            Self::Record(fields) => fields.iter_mut().for_each(shift),
            Self::Array(array) => shift(&mut array.element),
            Self::Choice { items, .. } => items.iter_mut().for_each(shift),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ArrayShape {
    pub(crate) element: NodeId,
    /// Fixed size, or the last size applied to a variable-length array.
    pub(crate) element_count: usize,
    pub(crate) size: ArraySize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArraySize {
    Fixed,
    Variable(SizeDriverPath),
}

/// Where the size driver of a variable-length array lives, relative to the
/// array: `steps` parent hops, then the direct child called `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SizeDriverPath {
    pub(crate) name: String,
    pub(crate) steps: usize,
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) name: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) scalar_count: usize,
    pub(crate) data: Option<DataBlock>,
    pub(crate) shape: Shape,
}

/// A self-describing data component: a schema tree stored in an arena, each
/// node optionally bound to a view of a [`DataBlock`].
///
/// Parent links are arena indices, so walking upward (to find the size driver
/// of a variable-length array, or to adjust an ancestor's slot count) never
/// needs shared ownership. Bound blocks are shared views: writing a value
/// through any node is visible through every other view of the same storage,
/// which is why value setters take `&self`.
///
/// Array nodes use cursor semantics: [`get_component`](Self::get_component)
/// moves the element node's view to the requested index, so two element views
/// of the same array cannot be held at once.
#[derive(Debug)]
pub struct DataComponent {
    nodes: Vec<Node>,
}

impl DataComponent {
    /// Root of the tree.
    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Name of the component, if any.
    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    /// Enclosing component.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Shape family of the component.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> ComponentKind {
        self.node(id).shape.kind()
    }

    /// Primitive kind of a scalar component.
    #[must_use]
    pub fn scalar_kind(&self, id: NodeId) -> Option<ScalarKind> {
        match self.node(id).shape {
            Shape::Scalar(kind) => Some(kind),
            _ => None,
        }
    }

    /// Number of primitive slots the component and its descendants occupy.
    #[must_use]
    pub fn scalar_count(&self, id: NodeId) -> usize {
        self.node(id).scalar_count
    }

    /// Number of direct components: fields of a record, items of a choice,
    /// elements of an array, zero for a scalar.
    #[must_use]
    pub fn component_count(&self, id: NodeId) -> usize {
        match &self.node(id).shape {
            Shape::Scalar(_) => 0,
            Shape::Record(fields) => fields.len(),
            Shape::Array(_) => self.element_count(id),
            Shape::Choice { items, .. } => items.len(),
        }
    }

    /// Field of a record or item of a choice, by position. Arrays have a
    /// single [`element`](Self::element) node instead.
    #[must_use]
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        match &self.node(id).shape {
            Shape::Record(fields) => fields.get(index).copied(),
            Shape::Choice { items, .. } => items.get(index).copied(),
            Shape::Scalar(_) | Shape::Array(_) => None,
        }
    }

    /// Direct component called `name`.
    #[must_use]
    pub fn child_by_name(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id)
            .shape
            .children()
            .iter()
            .copied()
            .find(|&child| self.name(child) == Some(name))
    }

    /// Position of the direct component called `name`.
    #[must_use]
    pub fn component_index(&self, id: NodeId, name: &str) -> Option<usize> {
        self.node(id)
            .shape
            .children()
            .iter()
            .position(|&child| self.name(child) == Some(name))
    }

    /// Element schema of an array.
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<NodeId> {
        match &self.node(id).shape {
            Shape::Array(array) => Some(array.element),
            _ => None,
        }
    }

    /// Item currently selected by a choice.
    #[must_use]
    pub fn selected(&self, id: NodeId) -> Option<usize> {
        match self.node(id).shape {
            Shape::Choice { selected, .. } => Some(selected),
            _ => None,
        }
    }

    /// Slash-separated path from the root, used in error messages.
    #[must_use]
    pub fn path(&self, id: NodeId) -> String {
        let mut segments = vec![];
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            let segment = match (&node.name, node.parent) {
                (Some(name), _) => name.clone(),
                (None, None) => "<root>".to_owned(),
                (None, Some(parent)) => match &self.node(parent).shape {
                    Shape::Array(_) => "<element>".to_owned(),
                    shape => {
                        let index = shape.children().iter().position(|&c| c == node_id);
                        index.map_or_else(|| "#?".to_owned(), |i| format!("#{i}"))
                    }
                },
            };
            segments.push(segment);
            current = node.parent;
        }
        segments.reverse();
        segments.join("/")
    }

    /// Block currently viewed by the component.
    #[must_use]
    pub fn data(&self, id: NodeId) -> Option<&DataBlock> {
        self.node(id).data.as_ref()
    }

    fn scalar_block(&self, id: NodeId) -> Result<&DataBlock, DataError> {
        if self.kind(id) != ComponentKind::Scalar {
            return Err(self.shape_error(id, ComponentKind::Scalar));
        }
        self.data(id).ok_or_else(|| DataError::Unbound {
            path: self.path(id),
        })
    }

    pub(crate) fn shape_error(&self, id: NodeId, expected: ComponentKind) -> DataError {
        DataError::ShapeMismatch {
            path: self.path(id),
            expected: expected.label(),
            actual: self.kind(id).label(),
        }
    }

    /// Value of a scalar at its current view.
    ///
    /// # Errors
    /// If the component is not a bound scalar.
    pub fn value(&self, id: NodeId) -> Result<ScalarValue, DataError> {
        self.scalar_block(id)?.value(0)
    }

    /// Write a scalar at its current view.
    ///
    /// # Errors
    /// If the component is not a bound scalar or the value does not convert
    /// to the storage kind.
    pub fn set_value(&self, id: NodeId, value: impl Into<ScalarValue>) -> Result<(), DataError> {
        self.scalar_block(id)?.set_value(0, value)
    }

    /// # Errors
    /// See [`value`](Self::value).
    pub fn bool_value(&self, id: NodeId) -> Result<bool, DataError> {
        self.value(id)?.as_bool()
    }

    /// # Errors
    /// See [`value`](Self::value).
    pub fn int_value(&self, id: NodeId) -> Result<i32, DataError> {
        self.value(id)?.as_i32()
    }

    /// # Errors
    /// See [`value`](Self::value).
    pub fn long_value(&self, id: NodeId) -> Result<i64, DataError> {
        self.value(id)?.as_i64()
    }

    /// # Errors
    /// See [`value`](Self::value).
    pub fn float_value(&self, id: NodeId) -> Result<f32, DataError> {
        self.value(id)?.as_f32()
    }

    /// # Errors
    /// See [`value`](Self::value).
    pub fn double_value(&self, id: NodeId) -> Result<f64, DataError> {
        self.value(id)?.as_f64()
    }

    /// # Errors
    /// See [`value`](Self::value).
    pub fn string_value(&self, id: NodeId) -> Result<String, DataError> {
        Ok(self.value(id)?.as_string())
    }

    /// Structural copy of the whole tree. Data is not copied.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.copy_subtree(self.root())
    }

    /// Structural copy of the subtree rooted at `id`, as a tree of its own.
    ///
    /// Variable-length arrays keep their relative size-driver path. A driver
    /// outside the copied subtree is found again once the copy is grafted
    /// back with [`add_component`](Self::add_component).
    #[must_use]
    pub fn copy_subtree(&self, id: NodeId) -> Self {
        let mut out = Self { nodes: vec![] };
        self.copy_into(id, None, &mut out);
        out
    }

    fn copy_into(&self, id: NodeId, parent: Option<NodeId>, out: &mut Self) -> NodeId {
        let node = self.node(id);
        let new_id = NodeId::new(out.nodes.len());
        out.nodes.push(Node {
            name: node.name.clone(),
            parent,
            scalar_count: node.scalar_count,
            data: None,
            shape: node.shape.clone(),
        });
        let children: Vec<NodeId> = node
            .shape
            .children()
            .iter()
            .map(|&child| self.copy_into(child, Some(new_id), out))
            .collect();
        match &mut out.node_mut(new_id).shape {
            Shape::Scalar(_) => {}
            Shape::Record(fields) => *fields = children,
            Shape::Array(array) => array.element = children[0],
            Shape::Choice { items, .. } => *items = children,
        }
        new_id
    }

    /// Graft `tree` as the last field of `record`, returning the new field.
    ///
    /// Slot counts of `record` and its ancestors are recomputed. Blocks
    /// already bound to `record` do not include the new field; assign a new
    /// block to pick it up.
    ///
    /// # Errors
    /// If `record` is not a record or already has a field with the same name.
    pub fn add_component(&mut self, record: NodeId, tree: Self) -> Result<NodeId, DataError> {
        if self.kind(record) != ComponentKind::Record {
            return Err(self.shape_error(record, ComponentKind::Record));
        }
        if let Some(name) = tree.name(tree.root())
            && self.child_by_name(record, name).is_some()
        {
            return Err(DataError::DuplicateName {
                path: self.path(record),
                name: name.to_owned(),
            });
        }
        let offset = self.nodes.len();
        let new_root = NodeId::new(offset);
        for mut node in tree.nodes {
            node.shape.remap(offset);
            node.parent = Some(node.parent.map_or(record, |p| NodeId::new(p.index() + offset)));
            self.nodes.push(node);
        }
        let Shape::Record(fields) = &mut self.node_mut(record).shape else {
            unreachable!("DataComponent::add_component")
        };
        fields.push(new_root);
        let mut current = new_root;
        while let Some(change) = self.propagate_slot_count(current) {
            current = change.node;
        }
        Ok(new_root)
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let node = self.node(id);
        write!(f, "{:indent$}", "", indent = depth * 2)?;
        match &node.shape {
            Shape::Scalar(kind) => write!(f, "Scalar<{kind}>")?,
            Shape::Record(_) => write!(f, "Record")?,
            Shape::Array(array) => match array.size {
                ArraySize::Fixed => write!(f, "Array[{}]", array.element_count)?,
                ArraySize::Variable(_) => write!(f, "Array[?={}]", self.element_count(id))?,
            },
            Shape::Choice { selected, .. } => write!(f, "Choice({selected})")?,
        }
        if let Some(name) = &node.name {
            write!(f, ": {name}")?;
        }
        writeln!(f)?;
        for &child in node.shape.children() {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for DataComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root(), 0)
    }
}
