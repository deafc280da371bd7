use crate::{
    error::DataError,
    value::{ScalarKind, ScalarValue},
};
use core::cell::RefCell;
use std::rc::Rc;

/// Homogeneous buffer of primitive slots.
///
/// This is the only place values physically live. Blocks reference it
/// through [`SharedArray`] and never copy it implicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveArray {
    /// Boolean slots.
    Boolean(Vec<bool>),
    /// `i32` slots.
    Int(Vec<i32>),
    /// `i64` slots.
    Long(Vec<i64>),
    /// `f32` slots.
    Float(Vec<f32>),
    /// `f64` slots.
    Double(Vec<f64>),
    /// String slots.
    String(Vec<String>),
}

/// Reference-counted buffer shared by every view onto it.
pub(crate) type SharedArray = Rc<RefCell<PrimitiveArray>>;

impl PrimitiveArray {
    /// Zero-filled buffer of `len` slots.
    #[must_use]
    pub fn new(kind: ScalarKind, len: usize) -> Self {
        match kind {
            ScalarKind::Boolean => Self::Boolean(vec![false; len]),
            ScalarKind::Int => Self::Int(vec![0; len]),
            ScalarKind::Long => Self::Long(vec![0; len]),
            ScalarKind::Float => Self::Float(vec![0.0; len]),
            ScalarKind::Double => Self::Double(vec![0.0; len]),
            ScalarKind::String => Self::String(vec![String::new(); len]),
        }
    }

    /// Kind of every slot.
    #[must_use]
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Boolean(_) => ScalarKind::Boolean,
            Self::Int(_) => ScalarKind::Int,
            Self::Long(_) => ScalarKind::Long,
            Self::Float(_) => ScalarKind::Float,
            Self::Double(_) => ScalarKind::Double,
            Self::String(_) => ScalarKind::String,
        }
    }

    /// Physical length.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Boolean(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Long(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    /// Whether the buffer has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at physical slot `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ScalarValue> {
        match self {
            Self::Boolean(v) => v.get(index).copied().map(ScalarValue::Boolean),
            Self::Int(v) => v.get(index).copied().map(ScalarValue::Int),
            Self::Long(v) => v.get(index).copied().map(ScalarValue::Long),
            Self::Float(v) => v.get(index).copied().map(ScalarValue::Float),
            Self::Double(v) => v.get(index).copied().map(ScalarValue::Double),
            Self::String(v) => v.get(index).cloned().map(ScalarValue::String),
        }
    }

    /// Store `value` at physical slot `index`, converting it to the buffer
    /// kind first.
    ///
    /// # Errors
    /// If `index` is past the end or `value` does not convert.
    pub fn set(&mut self, index: usize, value: ScalarValue) -> Result<(), DataError> {
        let len = self.len();
        if index >= len {
            return Err(DataError::AtomOutOfRange {
                index,
                atom_count: len,
            });
        }
        match self {
            Self::Boolean(v) => v[index] = value.as_bool()?,
            Self::Int(v) => v[index] = value.as_i32()?,
            Self::Long(v) => v[index] = value.as_i64()?,
            Self::Float(v) => v[index] = value.as_f32()?,
            Self::Double(v) => v[index] = value.as_f64()?,
            Self::String(v) => v[index] = value.as_string(),
        }
        Ok(())
    }

    /// New buffer of `len` slots holding a copy of `self[start..]`, truncated
    /// or zero-padded.
    #[must_use]
    pub fn copy_resized(&self, start: usize, len: usize) -> Self {
        fn take<T: Clone + Default>(v: &[T], start: usize, len: usize) -> Vec<T> {
            let mut out: Vec<T> = v.iter().skip(start).take(len).cloned().collect();
            out.resize_with(len, T::default);
            out
        }
        match self {
            Self::Boolean(v) => Self::Boolean(take(v, start, len)),
            Self::Int(v) => Self::Int(take(v, start, len)),
            Self::Long(v) => Self::Long(take(v, start, len)),
            Self::Float(v) => Self::Float(take(v, start, len)),
            Self::Double(v) => Self::Double(take(v, start, len)),
            Self::String(v) => Self::String(take(v, start, len)),
        }
    }

    /// Copy `len` slots of `source` starting at `from` into `self` starting
    /// at `to`. Both buffers must be of the same kind.
    pub(crate) fn copy_from(&mut self, source: &Self, from: usize, to: usize, len: usize) {
        fn copy<T: Clone>(target: &mut [T], source: &[T], from: usize, to: usize, len: usize) {
            target[to..to + len].clone_from_slice(&source[from..from + len]);
        }
        match (self, source) {
            (Self::Boolean(t), Self::Boolean(s)) => copy(t, s, from, to, len),
            (Self::Int(t), Self::Int(s)) => copy(t, s, from, to, len),
            (Self::Long(t), Self::Long(s)) => copy(t, s, from, to, len),
            (Self::Float(t), Self::Float(s)) => copy(t, s, from, to, len),
            (Self::Double(t), Self::Double(s)) => copy(t, s, from, to, len),
            (Self::String(t), Self::String(s)) => copy(t, s, from, to, len),
            _ => unreachable!("PrimitiveArray::copy_from: [1]"),
        }
    }

    pub(crate) fn shared(self) -> SharedArray {
        Rc::new(RefCell::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_converts_to_buffer_kind() {
        let mut array = PrimitiveArray::new(ScalarKind::Int, 2);
        array.set(1, ScalarValue::Double(4.7)).unwrap();
        assert_eq!(array.get(1), Some(ScalarValue::Int(4)));
        assert_eq!(
            array.set(2, ScalarValue::Int(0)),
            Err(DataError::AtomOutOfRange {
                index: 2,
                atom_count: 2
            })
        );
    }

    #[test]
    fn copy_resized_keeps_prefix_from_start() {
        let array = PrimitiveArray::Double(vec![1.0, 2.0, 3.0]);
        assert_eq!(
            array.copy_resized(1, 4),
            PrimitiveArray::Double(vec![2.0, 3.0, 0.0, 0.0])
        );
        assert_eq!(array.copy_resized(0, 1), PrimitiveArray::Double(vec![1.0]));
    }
}
