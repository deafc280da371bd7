use crate::error::DataError;
use derive_more::{Display, From};

/// Primitive type carried by a scalar component and by the storage buffer
/// backing it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// `bool` slots.
    #[display("boolean")]
    Boolean,
    /// `i32` slots.
    #[display("int")]
    Int,
    /// `i64` slots.
    #[display("long")]
    Long,
    /// `f32` slots.
    #[display("float")]
    Float,
    /// `f64` slots.
    #[display("double")]
    Double,
    /// UTF-8 string slots.
    #[display("string")]
    String,
}

impl ScalarKind {
    /// Whether values of this kind can drive the size of a variable-length
    /// array without loss.
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::Long)
    }
}

/// A single scalar value read from or written to a storage slot.
///
/// Accessors convert between kinds the way sensor codecs expect: numeric
/// kinds cast into each other, booleans read as `0`/`1`, and strings are
/// parsed on demand.
#[derive(Debug, Display, Clone, PartialEq, From)]
pub enum ScalarValue {
    /// Boolean value.
    #[display("{_0}")]
    Boolean(bool),
    /// 32-bit integer value.
    #[display("{_0}")]
    Int(i32),
    /// 64-bit integer value.
    #[display("{_0}")]
    Long(i64),
    /// Single precision value.
    #[display("{_0}")]
    Float(f32),
    /// Double precision value.
    #[display("{_0}")]
    Double(f64),
    /// String value.
    #[display("{_0}")]
    String(String),
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl ScalarValue {
    /// The kind this value natively carries.
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

    /// # Errors
    /// If a string does not parse as a boolean.
    pub fn as_bool(&self) -> Result<bool, DataError> {
        Ok(match self {
            Self::Boolean(v) => *v,
            Self::Int(v) => *v != 0,
            Self::Long(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::Double(v) => *v != 0.0,
            Self::String(s) => s.trim().parse().map_err(|_| self.conversion(ScalarKind::Boolean))?,
        })
    }

    /// # Errors
    /// If a string does not parse as an integer.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i32(&self) -> Result<i32, DataError> {
        Ok(match self {
            Self::Boolean(v) => i32::from(*v),
            Self::Int(v) => *v,
            Self::Long(v) => *v as i32,
            Self::Float(v) => *v as i32,
            Self::Double(v) => *v as i32,
            Self::String(s) => s.trim().parse().map_err(|_| self.conversion(ScalarKind::Int))?,
        })
    }

    /// # Errors
    /// If a string does not parse as an integer.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Result<i64, DataError> {
        Ok(match self {
            Self::Boolean(v) => i64::from(*v),
            Self::Int(v) => i64::from(*v),
            Self::Long(v) => *v,
            Self::Float(v) => *v as i64,
            Self::Double(v) => *v as i64,
            Self::String(s) => s.trim().parse().map_err(|_| self.conversion(ScalarKind::Long))?,
        })
    }

    /// # Errors
    /// If a string does not parse as a number.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn as_f32(&self) -> Result<f32, DataError> {
        Ok(match self {
            Self::Boolean(v) => f32::from(u8::from(*v)),
            Self::Int(v) => *v as f32,
            Self::Long(v) => *v as f32,
            Self::Float(v) => *v,
            Self::Double(v) => *v as f32,
            Self::String(s) => s.trim().parse().map_err(|_| self.conversion(ScalarKind::Float))?,
        })
    }

    /// # Errors
    /// If a string does not parse as a number.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Result<f64, DataError> {
        Ok(match self {
            Self::Boolean(v) => f64::from(u8::from(*v)),
            Self::Int(v) => f64::from(*v),
            Self::Long(v) => *v as f64,
            Self::Float(v) => f64::from(*v),
            Self::Double(v) => *v,
            Self::String(s) => s.trim().parse().map_err(|_| self.conversion(ScalarKind::Double))?,
        })
    }

    /// Textual form of the value. Never fails.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Convert into a value of `kind`.
    ///
    /// # Errors
    /// If the conversion requires parsing a string that is not a valid
    /// literal of `kind`.
    pub fn convert(self, kind: ScalarKind) -> Result<Self, DataError> {
        if self.kind() == kind {
            return Ok(self);
        }
        Ok(match kind {
            ScalarKind::Boolean => Self::Boolean(self.as_bool()?),
            ScalarKind::Int => Self::Int(self.as_i32()?),
            ScalarKind::Long => Self::Long(self.as_i64()?),
            ScalarKind::Float => Self::Float(self.as_f32()?),
            ScalarKind::Double => Self::Double(self.as_f64()?),
            ScalarKind::String => Self::String(self.as_string()),
        })
    }

    fn conversion(&self, to: ScalarKind) -> DataError {
        DataError::Conversion {
            value: self.as_string(),
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_kinds_cast_into_each_other() {
        assert_eq!(ScalarValue::Double(3.9).as_i32().unwrap(), 3);
        assert_eq!(ScalarValue::Int(-2).as_f64().unwrap(), -2.0);
        assert_eq!(ScalarValue::Boolean(true).as_i64().unwrap(), 1);
        assert!(ScalarValue::Float(0.5).as_bool().unwrap());
    }

    #[test]
    fn strings_parse_or_fail() {
        assert_eq!(ScalarValue::from(" 42 ").as_i64().unwrap(), 42);
        assert_eq!(
            ScalarValue::from("abc").convert(ScalarKind::Double),
            Err(DataError::Conversion {
                value: "abc".into(),
                to: ScalarKind::Double,
            })
        );
        assert_eq!(
            ScalarValue::Long(7).convert(ScalarKind::String).unwrap(),
            ScalarValue::String("7".into())
        );
    }
}
