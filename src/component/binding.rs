use crate::{
    block::DataBlock,
    component::{ComponentKind, DataComponent, NodeId, ResizeReport, Shape},
    error::DataError,
    value::ScalarValue,
};
use tracing::trace;

impl DataComponent {
    /// Bind `block` to the component at `id` and derive the views of every
    /// descendant from it.
    ///
    /// Record fields get consecutive sub-views of a primitive block, one
    /// field buffer each of a parallel block, or their own member of a mixed
    /// block. An array's element is bound to the view of element `0`. A
    /// choice reads its selected index from the first member of its block.
    /// Slot counts along the bound subtree are refreshed afterwards.
    ///
    /// # Errors
    /// If the block layout does not match the subtree.
    pub fn bind(&mut self, id: NodeId, block: DataBlock) -> Result<(), DataError> {
        let shape = self.node(id).shape.clone();
        match (&shape, &block) {
            (Shape::Scalar(_), _) => {
                if block.atom_count() != 1 {
                    return Err(self.layout_error(id));
                }
            }
            (Shape::Record(fields), DataBlock::Primitive(block)) => {
                let mut offset = 0;
                for &field in fields {
                    let count = self.scalar_count(field);
                    self.bind(field, block.view(offset, count)?.into())?;
                    offset += count;
                }
            }
            (Shape::Record(fields), DataBlock::Parallel(block)) => {
                if block.field_count() != fields.len() || block.row_count() != 1 {
                    return Err(self.layout_error(id));
                }
                for (index, &field) in fields.iter().enumerate() {
                    if self.kind(field) != ComponentKind::Scalar {
                        return Err(self.layout_error(id));
                    }
                    let view = block.field(index).expect("DataComponent::bind: [1]");
                    self.bind(field, view.into())?;
                }
            }
            (Shape::Record(fields), DataBlock::Mixed(block)) => {
                if block.member_count() != fields.len() {
                    return Err(self.layout_error(id));
                }
                // Scalars first, so size drivers are bound before the arrays
                // they size.
                let (scalars, others): (Vec<_>, Vec<_>) = fields
                    .iter()
                    .copied()
                    .enumerate()
                    .partition(|&(_, field)| self.kind(field) == ComponentKind::Scalar);
                for (index, field) in scalars.into_iter().chain(others) {
                    let member = block.member(index).expect("DataComponent::bind: [2]");
                    self.bind(field, member)?;
                }
            }
            (Shape::Array(array), _) => {
                if self.element_count(id) == 0 {
                    self.unbind(array.element);
                } else {
                    let view = self.element_view(id, &block, 0)?;
                    self.bind(array.element, view)?;
                }
            }
            (Shape::Choice { items, .. }, DataBlock::Mixed(block)) if block.member_count() == 2 => {
                let index = block.member(0).expect("DataComponent::bind: [3]").long_value(0)?;
                let selected = usize::try_from(index)
                    .ok()
                    .filter(|&i| i < items.len())
                    .ok_or_else(|| DataError::IndexOutOfBounds {
                        path: self.path(id),
                        index: usize::try_from(index).unwrap_or(usize::MAX),
                        count: items.len(),
                    })?;
                for &item in items {
                    self.unbind(item);
                }
                let member = block.member(1).expect("DataComponent::bind: [4]");
                self.bind(items[selected], member)?;
                if let Shape::Choice { selected: current, .. } = &mut self.node_mut(id).shape {
                    *current = selected;
                }
            }
            _ => return Err(self.layout_error(id)),
        }
        self.node_mut(id).data = Some(block);
        self.refresh_scalar_count(id);
        Ok(())
    }

    /// Drop the views of `id` and all its descendants.
    pub fn unbind(&mut self, id: NodeId) {
        self.node_mut(id).data = None;
        for child in self.node(id).shape.children().to_vec() {
            self.unbind(child);
        }
    }

    /// Component `index` of `id`.
    ///
    /// For arrays this moves the element node's view onto element `index`
    /// and returns the element node; a view obtained from an earlier call is
    /// overwritten. For records and choices it returns the field or item.
    ///
    /// # Errors
    /// [`DataError::IndexOutOfBounds`] if `index` is not below
    /// [`component_count`](Self::component_count).
    pub fn get_component(&mut self, id: NodeId, index: usize) -> Result<NodeId, DataError> {
        let element = match &self.node(id).shape {
            Shape::Array(array) => array.element,
            Shape::Scalar(_) => return Err(self.shape_error(id, ComponentKind::Record)),
            Shape::Record(_) | Shape::Choice { .. } => {
                return self
                    .child(id, index)
                    .ok_or_else(|| self.bounds_error(id, index));
            }
        };
        if index >= self.element_count(id) {
            return Err(self.bounds_error(id, index));
        }
        if let Some(block) = self.node(id).data.clone() {
            let view = self.element_view(id, &block, index)?;
            trace!(path = %self.path(id), index, start = view.start_index(), "moved element view");
            self.bind(element, view)?;
        }
        Ok(element)
    }

    /// Switch a choice to item `index`.
    ///
    /// When the choice is bound, the selected index is written to its block
    /// and a fresh block for the new item replaces the old one. The slot
    /// counts of the choice and of its parent are adjusted and reported, so
    /// callers can continue upward with
    /// [`propagate_slot_count`](Self::propagate_slot_count).
    ///
    /// # Errors
    /// If `id` is not a choice, `index` is out of range, or the item cannot
    /// be allocated.
    pub fn select(&mut self, id: NodeId, index: usize) -> Result<ResizeReport, DataError> {
        let Shape::Choice { items, .. } = &self.node(id).shape else {
            return Err(self.shape_error(id, ComponentKind::Choice));
        };
        let Some(&item) = items.get(index) else {
            return Err(self.bounds_error(id, index));
        };
        let old = self.scalar_count(id);
        match self.node(id).data.clone() {
            Some(DataBlock::Mixed(block)) => {
                block
                    .member(0)
                    .ok_or_else(|| self.layout_error(id))?
                    .set_value(0, ScalarValue::Long(i64::try_from(index).unwrap_or(i64::MAX)))?;
                let fresh = self.create_block(item)?;
                if !block.replace_member(1, fresh) {
                    return Err(self.layout_error(id));
                }
                self.bind(id, block.into())?;
            }
            Some(_) => return Err(self.layout_error(id)),
            None => {
                if let Shape::Choice { selected, .. } = &mut self.node_mut(id).shape {
                    *selected = index;
                }
                self.refresh_scalar_count(id);
            }
        }
        let mut report = ResizeReport::default();
        report.push(id, old, self.scalar_count(id));
        if let Some(change) = self.propagate_slot_count(id) {
            report.push(change.node, change.old, change.new);
        }
        Ok(report)
    }

    /// Whether `id` views exactly `block`, including the members every
    /// descendant views inside a mixed block.
    #[must_use]
    pub fn is_bound_to(&self, id: NodeId, block: &DataBlock) -> bool {
        self.data(id).is_some_and(|data| data.same_storage(block)) && self.members_in_sync(id)
    }

    fn members_in_sync(&self, id: NodeId) -> bool {
        let Some(DataBlock::Mixed(block)) = self.data(id) else {
            return true;
        };
        let bound: Vec<(usize, NodeId)> = match &self.node(id).shape {
            Shape::Record(fields) => fields.iter().copied().enumerate().collect(),
            Shape::Choice { items, selected } => vec![(1, items[*selected])],
            Shape::Scalar(_) | Shape::Array(_) => return true,
        };
        bound.into_iter().all(|(index, child)| match block.member(index) {
            Some(member) => self.is_bound_to(child, &member),
            None => false,
        })
    }

    /// View of element `index` of array `id` inside `block`.
    pub(crate) fn element_view(
        &self,
        id: NodeId,
        block: &DataBlock,
        index: usize,
    ) -> Result<DataBlock, DataError> {
        let element = self.element(id).ok_or_else(|| self.shape_error(id, ComponentKind::Array))?;
        let width = self.scalar_count(element);
        match block {
            DataBlock::Primitive(block) => Ok(block.view(index * width, width)?.into()),
            DataBlock::Parallel(block) => {
                let fields = block.field_count();
                if fields == 0 || width % fields != 0 {
                    return Err(self.layout_error(id));
                }
                let rows = width / fields;
                Ok(block.view(index * rows, rows)?.into())
            }
            DataBlock::Mixed(_) => Err(DataError::UnsupportedLayout {
                path: self.path(id),
            }),
        }
    }

    /// Recompute the slot count of `id` from its direct components.
    pub(crate) fn refresh_scalar_count(&mut self, id: NodeId) -> usize {
        let count = match &self.node(id).shape {
            Shape::Scalar(_) => 1,
            Shape::Record(fields) => fields.iter().map(|&f| self.scalar_count(f)).sum(),
            Shape::Array(array) => self.element_count(id) * self.scalar_count(array.element),
            Shape::Choice { items, selected } => {
                1 + items.get(*selected).map_or(0, |&item| self.scalar_count(item))
            }
        };
        self.node_mut(id).scalar_count = count;
        count
    }

    pub(super) fn layout_error(&self, id: NodeId) -> DataError {
        DataError::LayoutMismatch {
            path: self.path(id),
        }
    }

    pub(super) fn bounds_error(&self, id: NodeId, index: usize) -> DataError {
        DataError::IndexOutOfBounds {
            path: self.path(id),
            index,
            count: self.component_count(id),
        }
    }
}
