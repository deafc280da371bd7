//! Storage blocks: the physical buffers behind a component tree.
//!
//! Every block is a window (`start_index`, `atom_count`) onto one or more
//! [`PrimitiveArray`] buffers. Cloning a block clones the window, never the
//! buffer, so the clone aliases the same storage. A buffer is replaced, not
//! grown in place, whenever its size changes ([`DataBlock::resized`]), which
//! invalidates every outstanding view onto the old one.

/// Homogeneous primitive buffers.
pub mod primitive;

pub use crate::block::primitive::PrimitiveArray;
use crate::{
    block::primitive::SharedArray,
    error::DataError,
    value::{ScalarKind, ScalarValue},
};
use core::cell::RefCell;
use derive_more::{Display, From};
use std::rc::Rc;

/// Physical layout of a [`DataBlock`].
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockLayout {
    /// One contiguous homogeneous buffer.
    #[display("primitive")]
    Primitive,
    /// Struct-of-arrays, one buffer per record field.
    #[display("parallel")]
    Parallel,
    /// Tuple of sub-blocks of possibly different kinds and sizes.
    #[display("mixed")]
    Mixed,
}

/// Values of a component tree, in one of three physical layouts.
#[derive(Debug, Clone, From)]
pub enum DataBlock {
    /// Single-kind contiguous buffer.
    Primitive(PrimitiveBlock),
    /// Struct-of-arrays layout used for arrays of records.
    Parallel(ParallelBlock),
    /// Heterogeneous tuple used for records of mixed shapes.
    Mixed(MixedBlock),
}

impl DataBlock {
    /// Fresh zero-filled primitive block of `atom_count` slots.
    #[must_use]
    pub fn primitive(kind: ScalarKind, atom_count: usize) -> Self {
        Self::Primitive(PrimitiveBlock::new(kind, atom_count))
    }

    /// Layout of this block.
    #[must_use]
    pub fn layout(&self) -> BlockLayout {
        match self {
            Self::Primitive(_) => BlockLayout::Primitive,
            Self::Parallel(_) => BlockLayout::Parallel,
            Self::Mixed(_) => BlockLayout::Mixed,
        }
    }

    /// Offset of the view into its storage. Rows for parallel blocks, always
    /// zero for mixed blocks.
    #[must_use]
    pub fn start_index(&self) -> usize {
        match self {
            Self::Primitive(block) => block.start_index,
            Self::Parallel(block) => block.start_index,
            Self::Mixed(_) => 0,
        }
    }

    /// Number of slots visible from this view.
    #[must_use]
    pub fn atom_count(&self) -> usize {
        match self {
            Self::Primitive(block) => block.atom_count,
            Self::Parallel(block) => block.atom_count(),
            Self::Mixed(block) => block.atom_count(),
        }
    }

    /// Value of atom `index` of the view.
    ///
    /// # Errors
    /// If `index` is not below [`atom_count`](Self::atom_count).
    pub fn value(&self, index: usize) -> Result<ScalarValue, DataError> {
        match self {
            Self::Primitive(block) => block.value(index),
            Self::Parallel(block) => block.value(index),
            Self::Mixed(block) => block.value(index),
        }
    }

    /// Store `value` in atom `index` of the view, converted to the kind of
    /// the underlying buffer.
    ///
    /// # Errors
    /// If `index` is out of the view or the value does not convert.
    pub fn set_value(&self, index: usize, value: impl Into<ScalarValue>) -> Result<(), DataError> {
        let value = value.into();
        match self {
            Self::Primitive(block) => block.set_value(index, value),
            Self::Parallel(block) => block.set_value(index, value),
            Self::Mixed(block) => block.set_value(index, value),
        }
    }

    /// # Errors
    /// See [`value`](Self::value) and [`ScalarValue::as_bool`].
    pub fn bool_value(&self, index: usize) -> Result<bool, DataError> {
        self.value(index)?.as_bool()
    }

    /// # Errors
    /// See [`value`](Self::value) and [`ScalarValue::as_i32`].
    pub fn int_value(&self, index: usize) -> Result<i32, DataError> {
        self.value(index)?.as_i32()
    }

    /// # Errors
    /// See [`value`](Self::value) and [`ScalarValue::as_i64`].
    pub fn long_value(&self, index: usize) -> Result<i64, DataError> {
        self.value(index)?.as_i64()
    }

    /// # Errors
    /// See [`value`](Self::value) and [`ScalarValue::as_f32`].
    pub fn float_value(&self, index: usize) -> Result<f32, DataError> {
        self.value(index)?.as_f32()
    }

    /// # Errors
    /// See [`value`](Self::value) and [`ScalarValue::as_f64`].
    pub fn double_value(&self, index: usize) -> Result<f64, DataError> {
        self.value(index)?.as_f64()
    }

    /// # Errors
    /// See [`value`](Self::value).
    pub fn string_value(&self, index: usize) -> Result<String, DataError> {
        Ok(self.value(index)?.as_string())
    }

    /// All visible atoms in order.
    ///
    /// # Errors
    /// Only if the view points outside its storage, which a well-formed block
    /// never does.
    pub fn values(&self) -> Result<Vec<ScalarValue>, DataError> {
        (0..self.atom_count()).map(|i| self.value(i)).collect()
    }

    /// Whether both views read and write the same slots of the same buffers.
    #[must_use]
    pub fn same_storage(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Primitive(a), Self::Primitive(b)) => {
                Rc::ptr_eq(&a.array, &b.array)
                    && a.start_index == b.start_index
                    && a.atom_count == b.atom_count
            }
            (Self::Parallel(a), Self::Parallel(b)) => {
                a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(&b.fields).all(|(x, y)| Rc::ptr_eq(x, y))
                    && a.start_index == b.start_index
                    && a.row_count == b.row_count
            }
            (Self::Mixed(a), Self::Mixed(b)) => Rc::ptr_eq(&a.members, &b.members),
            _ => false,
        }
    }

    /// Freshly allocated block with the same layout and size, zero-filled.
    #[must_use]
    pub fn renewed(&self) -> Self {
        match self {
            Self::Primitive(block) => Self::primitive(block.kind(), block.atom_count),
            Self::Parallel(block) => Self::Parallel(ParallelBlock::new(
                &block.field_kinds(),
                block.row_count,
            )),
            Self::Mixed(block) => Self::Mixed(MixedBlock::new(
                block.members.borrow().iter().map(Self::renewed).collect(),
            )),
        }
    }

    /// Newly allocated block of `atom_count` slots holding a copy of the
    /// visible values, truncated or zero-padded. `None` for mixed blocks,
    /// which have no single axis to grow along.
    #[must_use]
    pub fn resized(&self, atom_count: usize) -> Option<Self> {
        match self {
            Self::Primitive(block) => Some(Self::Primitive(block.resized(atom_count))),
            Self::Parallel(block) => Some(Self::Parallel(block.resized(atom_count))),
            Self::Mixed(_) => None,
        }
    }

    /// Newly allocated block holding `copies` consecutive records whose
    /// width changes from `old_stride` to `new_stride` atoms.
    ///
    /// Each record keeps its first `min(old_stride, new_stride)` atoms at its
    /// new position and is zero-padded after them. Records past the end of
    /// this view are left zeroed. `None` for mixed blocks, and for parallel
    /// blocks whose strides are not whole rows.
    #[must_use]
    pub fn restrided(&self, copies: usize, old_stride: usize, new_stride: usize) -> Option<Self> {
        match self {
            Self::Primitive(block) => {
                Some(Self::Primitive(block.restrided(copies, old_stride, new_stride)))
            }
            Self::Parallel(block) => {
                let width = block.field_count();
                if width == 0 || old_stride % width != 0 || new_stride % width != 0 {
                    return None;
                }
                Some(Self::Parallel(block.restrided(
                    copies,
                    old_stride / width,
                    new_stride / width,
                )))
            }
            Self::Mixed(_) => None,
        }
    }
}

/// Copy `copies` strided records of `source[start..start + available]` into
/// a fresh buffer of `copies * new` slots.
fn restride(
    source: &PrimitiveArray,
    start: usize,
    available: usize,
    copies: usize,
    (old, new): (usize, usize),
) -> PrimitiveArray {
    let mut target = PrimitiveArray::new(source.kind(), copies * new);
    let kept = old.min(new);
    for copy in 0..copies {
        let from = copy * old;
        if from + kept > available {
            break;
        }
        target.copy_from(source, start + from, copy * new, kept);
    }
    target
}

/// View onto a single homogeneous buffer.
#[derive(Debug, Clone)]
pub struct PrimitiveBlock {
    array: SharedArray,
    start_index: usize,
    atom_count: usize,
}

impl PrimitiveBlock {
    /// Fresh zero-filled buffer owned by this view.
    #[must_use]
    pub fn new(kind: ScalarKind, atom_count: usize) -> Self {
        Self::from_array(PrimitiveArray::new(kind, atom_count))
    }

    /// Take ownership of `array`, viewing all of it.
    #[must_use]
    pub fn from_array(array: PrimitiveArray) -> Self {
        let atom_count = array.len();
        Self {
            array: array.shared(),
            start_index: 0,
            atom_count,
        }
    }

    /// Kind of the underlying buffer.
    #[must_use]
    pub fn kind(&self) -> ScalarKind {
        self.array.borrow().kind()
    }

    /// Offset of the view into the buffer.
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Slots visible from the view.
    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.atom_count
    }

    /// Sub-view of `count` atoms starting `offset` atoms into this view.
    ///
    /// # Errors
    /// If the sub-view would reach past the physical buffer.
    pub fn view(&self, offset: usize, count: usize) -> Result<Self, DataError> {
        let start_index = self.start_index + offset;
        let len = self.array.borrow().len();
        if start_index + count > len {
            return Err(DataError::AtomOutOfRange {
                index: start_index + count,
                atom_count: len,
            });
        }
        Ok(Self {
            array: Rc::clone(&self.array),
            start_index,
            atom_count: count,
        })
    }

    fn physical(&self, index: usize) -> Result<usize, DataError> {
        if index >= self.atom_count {
            return Err(DataError::AtomOutOfRange {
                index,
                atom_count: self.atom_count,
            });
        }
        Ok(self.start_index + index)
    }

    fn value(&self, index: usize) -> Result<ScalarValue, DataError> {
        let physical = self.physical(index)?;
        self.array
            .borrow()
            .get(physical)
            .ok_or(DataError::AtomOutOfRange {
                index,
                atom_count: self.atom_count,
            })
    }

    fn set_value(&self, index: usize, value: ScalarValue) -> Result<(), DataError> {
        let physical = self.physical(index)?;
        self.array.borrow_mut().set(physical, value)
    }

    fn resized(&self, atom_count: usize) -> Self {
        let array = self
            .array
            .borrow()
            .copy_resized(self.start_index, atom_count.min(self.atom_count));
        Self::from_array(array.copy_resized(0, atom_count))
    }

    fn restrided(&self, copies: usize, old: usize, new: usize) -> Self {
        let array = restride(
            &self.array.borrow(),
            self.start_index,
            self.atom_count,
            copies,
            (old, new),
        );
        Self::from_array(array)
    }
}

/// Struct-of-arrays view: one buffer per record field, all with the same
/// number of rows.
///
/// Atom `i` of the view is field `i % field_count` of row
/// `start_index + i / field_count`, so reading the view in order yields
/// records one after another while each field stays contiguous.
#[derive(Debug, Clone)]
pub struct ParallelBlock {
    fields: Vec<SharedArray>,
    start_index: usize,
    row_count: usize,
}

impl ParallelBlock {
    /// Fresh buffers of `row_count` rows, one per entry of `kinds`.
    #[must_use]
    pub fn new(kinds: &[ScalarKind], row_count: usize) -> Self {
        Self {
            fields: kinds
                .iter()
                .map(|&kind| PrimitiveArray::new(kind, row_count).shared())
                .collect(),
            start_index: 0,
            row_count,
        }
    }

    /// Number of field buffers.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// First row of the view.
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Rows visible from the view.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Slots visible from the view.
    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.row_count * self.fields.len()
    }

    /// Kinds of the field buffers, in field order.
    #[must_use]
    pub fn field_kinds(&self) -> Vec<ScalarKind> {
        self.fields.iter().map(|f| f.borrow().kind()).collect()
    }

    /// Field `field` across every visible row, as one contiguous primitive
    /// view.
    #[must_use]
    pub fn field(&self, field: usize) -> Option<PrimitiveBlock> {
        self.fields.get(field).map(|array| PrimitiveBlock {
            array: Rc::clone(array),
            start_index: self.start_index,
            atom_count: self.row_count,
        })
    }

    /// Sub-view of `rows` rows starting `offset` rows into this view.
    ///
    /// # Errors
    /// If the sub-view would reach past the field buffers.
    pub fn view(&self, offset: usize, rows: usize) -> Result<Self, DataError> {
        let start_index = self.start_index + offset;
        let len = self.fields.first().map_or(0, |f| f.borrow().len());
        if start_index + rows > len {
            return Err(DataError::AtomOutOfRange {
                index: start_index + rows,
                atom_count: len,
            });
        }
        Ok(Self {
            fields: self.fields.clone(),
            start_index,
            row_count: rows,
        })
    }

    fn locate(&self, index: usize) -> Result<(usize, usize), DataError> {
        let atom_count = self.atom_count();
        if index >= atom_count {
            return Err(DataError::AtomOutOfRange { index, atom_count });
        }
        let width = self.fields.len();
        Ok((index % width, self.start_index + index / width))
    }

    fn value(&self, index: usize) -> Result<ScalarValue, DataError> {
        let (field, row) = self.locate(index)?;
        self.fields[field]
            .borrow()
            .get(row)
            .ok_or(DataError::AtomOutOfRange {
                index,
                atom_count: self.atom_count(),
            })
    }

    fn set_value(&self, index: usize, value: ScalarValue) -> Result<(), DataError> {
        let (field, row) = self.locate(index)?;
        self.fields[field].borrow_mut().set(row, value)
    }

    fn resized(&self, atom_count: usize) -> Self {
        let width = self.fields.len();
        if width == 0 {
            return self.clone();
        }
        let row_count = atom_count / width;
        Self {
            fields: self
                .fields
                .iter()
                .map(|f| {
                    let kept = f
                        .borrow()
                        .copy_resized(self.start_index, row_count.min(self.row_count));
                    kept.copy_resized(0, row_count).shared()
                })
                .collect(),
            start_index: 0,
            row_count,
        }
    }

    fn restrided(&self, copies: usize, old_rows: usize, new_rows: usize) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .map(|f| {
                    restride(
                        &f.borrow(),
                        self.start_index,
                        self.row_count,
                        copies,
                        (old_rows, new_rows),
                    )
                    .shared()
                })
                .collect(),
            start_index: 0,
            row_count: copies * new_rows,
        }
    }
}

/// Tuple of sub-blocks laid out one after another.
///
/// The member list itself is shared: replacing a member (after a nested
/// variable-length array is reallocated) is visible through every clone of
/// this block.
#[derive(Debug, Clone)]
pub struct MixedBlock {
    members: Rc<RefCell<Vec<DataBlock>>>,
}

impl MixedBlock {
    /// Tuple of `members`, in order.
    #[must_use]
    pub fn new(members: Vec<DataBlock>) -> Self {
        Self {
            members: Rc::new(RefCell::new(members)),
        }
    }

    /// Number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.borrow().len()
    }

    /// Member `index` (a view aliasing the member's storage).
    #[must_use]
    pub fn member(&self, index: usize) -> Option<DataBlock> {
        self.members.borrow().get(index).cloned()
    }

    /// Sum of the members' atom counts.
    #[must_use]
    pub fn atom_count(&self) -> usize {
        self.members.borrow().iter().map(DataBlock::atom_count).sum()
    }

    /// Whether every member is a single primitive slot, which lets an array
    /// of this tuple be stored as a [`ParallelBlock`].
    #[must_use]
    pub fn is_tuple(&self) -> bool {
        let members = self.members.borrow();
        !members.is_empty()
            && members
                .iter()
                .all(|m| matches!(m, DataBlock::Primitive(p) if p.atom_count == 1))
    }

    /// Kinds of the members when [`is_tuple`](Self::is_tuple) holds.
    pub(crate) fn tuple_kinds(&self) -> Option<Vec<ScalarKind>> {
        self.members
            .borrow()
            .iter()
            .map(|m| match m {
                DataBlock::Primitive(p) if p.atom_count == 1 => Some(p.kind()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn replace_member(&self, index: usize, block: DataBlock) -> bool {
        match self.members.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = block;
                true
            }
            None => false,
        }
    }

    fn locate(&self, mut index: usize) -> Result<(DataBlock, usize), DataError> {
        let members = self.members.borrow();
        for member in members.iter() {
            let count = member.atom_count();
            if index < count {
                return Ok((member.clone(), index));
            }
            index -= count;
        }
        Err(DataError::AtomOutOfRange {
            index,
            atom_count: members.iter().map(DataBlock::atom_count).sum(),
        })
    }

    fn value(&self, index: usize) -> Result<ScalarValue, DataError> {
        let (member, local) = self.locate(index)?;
        member.value(local)
    }

    fn set_value(&self, index: usize, value: ScalarValue) -> Result<(), DataError> {
        let (member, local) = self.locate(index)?;
        member.set_value(local, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_views_alias_one_buffer() {
        let block = PrimitiveBlock::new(ScalarKind::Double, 6);
        let tail = DataBlock::Primitive(block.view(4, 2).unwrap());
        tail.set_value(1, 9.5).unwrap();
        let whole = DataBlock::Primitive(block);
        assert_eq!(whole.double_value(5).unwrap(), 9.5);
        assert!(tail.value(2).is_err());
        assert!(!whole.same_storage(&tail));
        assert!(whole.same_storage(&whole.clone()));
    }

    #[test]
    fn parallel_atoms_interleave_fields() {
        let block = ParallelBlock::new(&[ScalarKind::Double, ScalarKind::Int], 3);
        let data = DataBlock::Parallel(block.clone());
        data.set_value(3, 7).unwrap();
        assert_eq!(block.field(1).map(|f| DataBlock::Primitive(f).int_value(1).unwrap()), Some(7));
        assert_eq!(data.atom_count(), 6);

        let row = DataBlock::Parallel(block.view(2, 1).unwrap());
        row.set_value(0, 1.25).unwrap();
        assert_eq!(data.double_value(4).unwrap(), 1.25);
    }

    #[test]
    fn mixed_members_are_shared_between_clones() {
        let mixed = MixedBlock::new(vec![
            DataBlock::primitive(ScalarKind::Int, 1),
            DataBlock::primitive(ScalarKind::String, 2),
        ]);
        let alias = DataBlock::Mixed(mixed.clone());
        assert!(mixed.replace_member(1, DataBlock::primitive(ScalarKind::String, 4)));
        assert_eq!(alias.atom_count(), 5);
        alias.set_value(4, "last").unwrap();
        assert_eq!(mixed.member(1).unwrap().string_value(3).unwrap(), "last");
        assert!(alias.resized(3).is_none());
    }

    #[test]
    fn resized_copies_visible_prefix_into_new_buffer() {
        let block = PrimitiveBlock::from_array(PrimitiveArray::Int(vec![1, 2, 3, 4]));
        let view = DataBlock::Primitive(block.view(1, 2).unwrap());
        let grown = view.resized(3).unwrap();
        assert_eq!(
            grown.values().unwrap(),
            vec![ScalarValue::Int(2), ScalarValue::Int(3), ScalarValue::Int(0)]
        );
        assert!(!grown.same_storage(&view));
    }

    #[test]
    fn restrided_keeps_each_record_in_place() {
        let rows = DataBlock::Primitive(PrimitiveBlock::from_array(PrimitiveArray::Int(vec![1, 2, 3, 4])));
        let wide = rows.restrided(2, 2, 3).unwrap();
        assert_eq!(
            wide.values().unwrap(),
            [1, 2, 0, 3, 4, 0].map(ScalarValue::Int).to_vec()
        );
        let narrow = wide.restrided(2, 3, 1).unwrap();
        assert_eq!(narrow.values().unwrap(), vec![ScalarValue::Int(1), ScalarValue::Int(3)]);

        let table = ParallelBlock::new(&[ScalarKind::Double, ScalarKind::Int], 2);
        let data = DataBlock::Parallel(table);
        data.set_value(2, 5.0).unwrap();
        data.set_value(3, 6).unwrap();
        let grown = data.restrided(2, 2, 4).unwrap();
        assert_eq!(grown.double_value(4).unwrap(), 5.0);
        assert_eq!(grown.int_value(5).unwrap(), 6);
        assert_eq!(grown.atom_count(), 8);
        assert!(data.restrided(2, 3, 4).is_none());
    }
}
