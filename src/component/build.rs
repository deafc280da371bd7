use crate::{
    block::{DataBlock, MixedBlock, ParallelBlock},
    component::{ArrayShape, ArraySize, ComponentKind, DataComponent, Node, NodeId, Shape, SizeDriverPath},
    error::DataError,
    types::HashSet,
    value::{ScalarKind, ScalarValue},
};

/// Declarative description of a component tree, turned into an arena with
/// [`ComponentDesc::build`].
///
/// ```
/// use swedf::{component::ComponentDesc, value::ScalarKind};
///
/// let packet = ComponentDesc::record([
///     ComponentDesc::scalar(ScalarKind::Int).named("count"),
///     ComponentDesc::variable_array(ComponentDesc::scalar(ScalarKind::Double), "count")
///         .named("samples"),
/// ])
/// .named("packet")
/// .build()
/// .unwrap();
/// assert_eq!(packet.component_count(packet.root()), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDesc {
    name: Option<String>,
    shape: ShapeDesc,
}

#[derive(Debug, Clone, PartialEq)]
enum ShapeDesc {
    Scalar(ScalarKind),
    Record(Vec<ComponentDesc>),
    Array {
        element: Box<ComponentDesc>,
        size: SizeDesc,
    },
    Choice(Vec<ComponentDesc>),
}

/// Size of an array description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeDesc {
    /// Constant element count.
    Fixed(usize),
    /// Element count carried by the scalar called `driver`, a direct child of
    /// one of the array's ancestors.
    Variable {
        /// Name of the size driver.
        driver: String,
    },
}

impl ComponentDesc {
    /// Scalar of `kind`.
    #[must_use]
    pub fn scalar(kind: ScalarKind) -> Self {
        Self {
            name: None,
            shape: ShapeDesc::Scalar(kind),
        }
    }

    /// Record of `fields`, in order.
    #[must_use]
    pub fn record(fields: impl IntoIterator<Item = Self>) -> Self {
        Self {
            name: None,
            shape: ShapeDesc::Record(fields.into_iter().collect()),
        }
    }

    /// Array of `count` copies of `element`.
    #[must_use]
    pub fn fixed_array(element: Self, count: usize) -> Self {
        Self::array(element, SizeDesc::Fixed(count))
    }

    /// Array whose size is read from the scalar called `driver`.
    #[must_use]
    pub fn variable_array(element: Self, driver: impl Into<String>) -> Self {
        Self::array(
            element,
            SizeDesc::Variable {
                driver: driver.into(),
            },
        )
    }

    /// Array of `element` sized by `size`.
    #[must_use]
    pub fn array(element: Self, size: SizeDesc) -> Self {
        Self {
            name: None,
            shape: ShapeDesc::Array {
                element: Box::new(element),
                size,
            },
        }
    }

    /// Choice between `items`; the first one starts selected.
    #[must_use]
    pub fn choice(items: impl IntoIterator<Item = Self>) -> Self {
        Self {
            name: None,
            shape: ShapeDesc::Choice(items.into_iter().collect()),
        }
    }

    /// Set the component name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the arena for this description.
    ///
    /// # Errors
    /// If two siblings share a name or a variable-length array names a size
    /// driver that is not a scalar child of one of its ancestors.
    pub fn build(&self) -> Result<DataComponent, DataError> {
        DataComponent::build(self)
    }
}

impl DataComponent {
    /// Build an unbound tree from `desc`. Variable-length arrays start empty.
    ///
    /// # Errors
    /// See [`ComponentDesc::build`].
    pub fn build(desc: &ComponentDesc) -> Result<Self, DataError> {
        let mut tree = Self { nodes: vec![] };
        let mut pending = vec![];
        let root = tree.push(desc, None, &mut pending)?;
        for (array, driver) in pending {
            let steps = tree.locate_driver(array, &driver)?;
            let Shape::Array(shape) = &mut tree.node_mut(array).shape else {
                unreachable!("DataComponent::build")
            };
            shape.size = ArraySize::Variable(SizeDriverPath {
                name: driver,
                steps,
            });
        }
        tree.compute_scalar_count(root);
        Ok(tree)
    }

    fn push(
        &mut self,
        desc: &ComponentDesc,
        parent: Option<NodeId>,
        pending: &mut Vec<(NodeId, String)>,
    ) -> Result<NodeId, DataError> {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node {
            name: desc.name.clone(),
            parent,
            scalar_count: 0,
            data: None,
            shape: Shape::Record(vec![]),
        });
        let shape = match &desc.shape {
            ShapeDesc::Scalar(kind) => Shape::Scalar(*kind),
            ShapeDesc::Record(fields) => Shape::Record(self.push_siblings(id, fields, pending)?),
            ShapeDesc::Choice(items) => Shape::Choice {
                items: self.push_siblings(id, items, pending)?,
                selected: 0,
            },
            ShapeDesc::Array { element, size } => {
                let element = self.push(element, Some(id), pending)?;
                let element_count = match size {
                    SizeDesc::Fixed(count) => *count,
                    SizeDesc::Variable { driver } => {
                        pending.push((id, driver.clone()));
                        0
                    }
                };
                Shape::Array(ArrayShape {
                    element,
                    element_count,
                    size: ArraySize::Fixed,
                })
            }
        };
        self.node_mut(id).shape = shape;
        Ok(id)
    }

    fn push_siblings(
        &mut self,
        parent: NodeId,
        descs: &[ComponentDesc],
        pending: &mut Vec<(NodeId, String)>,
    ) -> Result<Vec<NodeId>, DataError> {
        let mut names = HashSet::default();
        let mut ids = Vec::with_capacity(descs.len());
        for desc in descs {
            if let Some(name) = &desc.name
                && !names.insert(name.as_str())
            {
                return Err(DataError::DuplicateName {
                    path: self.path(parent),
                    name: name.clone(),
                });
            }
            ids.push(self.push(desc, Some(parent), pending)?);
        }
        Ok(ids)
    }

    /// Parent hops from `array` to the ancestor holding the scalar `driver`.
    fn locate_driver(&self, array: NodeId, driver: &str) -> Result<usize, DataError> {
        let mut steps = 0;
        let mut current = array;
        while let Some(parent) = self.parent(current) {
            steps += 1;
            if let Some(found) = self.child_by_name(parent, driver)
                && self.scalar_kind(found).is_some_and(ScalarKind::is_integer)
            {
                return Ok(steps);
            }
            current = parent;
        }
        Err(DataError::MissingSizeDriver {
            path: self.path(array),
            name: driver.to_owned(),
        })
    }

    pub(crate) fn compute_scalar_count(&mut self, id: NodeId) -> usize {
        let count = match self.node(id).shape.clone() {
            Shape::Scalar(_) => 1,
            Shape::Record(fields) => fields.iter().map(|&f| self.compute_scalar_count(f)).sum(),
            Shape::Array(array) => self.compute_scalar_count(array.element) * self.element_count(id),
            Shape::Choice { items, selected } => {
                let counts: Vec<usize> = items.iter().map(|&i| self.compute_scalar_count(i)).collect();
                1 + counts.get(selected).copied().unwrap_or(0)
            }
        };
        self.node_mut(id).scalar_count = count;
        count
    }

    fn is_flat_record(&self, id: NodeId) -> bool {
        matches!(
            &self.node(id).shape,
            Shape::Record(fields) if fields.iter().all(|&f| self.kind(f) == ComponentKind::Scalar)
        )
    }

    fn holds_variable_length(&self, id: NodeId) -> bool {
        self.is_variable_length(id)
            || self
                .node(id)
                .shape
                .children()
                .iter()
                .any(|&child| self.holds_variable_length(child))
    }

    /// Allocate a block whose layout matches the subtree at `id`.
    ///
    /// Scalars get a one-slot primitive block. A record whose fields are all
    /// primitive blocks of one kind collapses into a single primitive block;
    /// any other record, and any record with a variable-length array anywhere
    /// below it, gets a mixed block so that member can be reallocated on its
    /// own. An array
    /// replicates its element block: primitive elements give one contiguous
    /// buffer, parallel elements and records of scalars of mixed kinds give
    /// a parallel block with one buffer per field. A choice is a mixed block
    /// of the selected index and the selected item.
    ///
    /// # Errors
    /// [`DataError::UnsupportedLayout`] for arrays whose element needs any
    /// other mixed block, such as a choice or a record holding a nested
    /// record of another kind.
    pub fn create_block(&self, id: NodeId) -> Result<DataBlock, DataError> {
        match &self.node(id).shape {
            Shape::Scalar(kind) => Ok(DataBlock::primitive(*kind, 1)),
            Shape::Record(fields) => {
                let blocks = fields
                    .iter()
                    .map(|&f| self.create_block(f))
                    .collect::<Result<Vec<_>, _>>()?;
                let has_variable = fields.iter().any(|&f| self.holds_variable_length(f));
                match common_kind(&blocks) {
                    Some(kind) if !has_variable => {
                        let atoms = blocks.iter().map(DataBlock::atom_count).sum();
                        Ok(DataBlock::primitive(kind, atoms))
                    }
                    _ => Ok(MixedBlock::new(blocks).into()),
                }
            }
            Shape::Array(array) => {
                let count = self.element_count(id);
                match self.create_block(array.element)? {
                    DataBlock::Primitive(element) => {
                        Ok(DataBlock::primitive(element.kind(), element.atom_count() * count))
                    }
                    DataBlock::Parallel(element) => Ok(ParallelBlock::new(
                        &element.field_kinds(),
                        element.row_count() * count,
                    )
                    .into()),
                    DataBlock::Mixed(element) => match element
                        .tuple_kinds()
                        .filter(|_| self.is_flat_record(array.element))
                    {
                        Some(kinds) => Ok(ParallelBlock::new(&kinds, count).into()),
                        // Element members have different strides, so there is
                        // no single axis to replicate along.
                        None => Err(DataError::UnsupportedLayout {
                            path: self.path(id),
                        }),
                    },
                }
            }
            Shape::Choice { items, selected } => {
                let index = DataBlock::primitive(ScalarKind::Int, 1);
                index.set_value(0, ScalarValue::Long(i64::try_from(*selected).unwrap_or(i64::MAX)))?;
                let item = match items.get(*selected) {
                    Some(&item) => self.create_block(item)?,
                    None => MixedBlock::new(vec![]).into(),
                };
                Ok(MixedBlock::new(vec![index, item]).into())
            }
        }
    }

    /// Allocate a fresh block for the whole tree and bind it.
    ///
    /// # Errors
    /// See [`create_block`](Self::create_block).
    pub fn assign_new_block(&mut self) -> Result<(), DataError> {
        let root = self.root();
        let block = self.create_block(root)?;
        self.bind(root, block)
    }

    /// Replace the root block by a zero-filled block of the same layout.
    ///
    /// # Errors
    /// If the tree is unbound.
    pub fn renew_block(&mut self) -> Result<(), DataError> {
        let root = self.root();
        let block = self
            .data(root)
            .map(DataBlock::renewed)
            .ok_or_else(|| DataError::Unbound {
                path: self.path(root),
            })?;
        self.bind(root, block)
    }
}

fn common_kind(blocks: &[DataBlock]) -> Option<ScalarKind> {
    let mut kinds = blocks.iter().map(|block| match block {
        DataBlock::Primitive(p) => Some(p.kind()),
        _ => None,
    });
    let first = kinds.next()??;
    kinds.all(|kind| kind == Some(first)).then_some(first)
}
