//! # Value Type System
//!
//! Core value types for Burrow columns: boolean, fixed-width integers,
//! floats, strings, complex scalars, and vector forms of every numeric and
//! complex type.
//!
//! ## Usage
//!
//! ```rust
//! use burrowdb::value::{ColumnType, Value};
//!
//! let v = Value::double_vector(vec![1.0, 0.0, 0.0]);
//! assert_eq!(v.logical_size(), 3);
//! assert!(ColumnType::DoubleVector { dim: 3 }.matches(&v));
//! ```
//!
//! Values are immutable once constructed; vector and string payloads are
//! reference counted so records can be passed between tasks without copies.
//! Equality is structural, with floats compared by bit pattern so values
//! behave as map keys.

pub mod complex;
pub mod vector;

pub use complex::{Complex32, Complex64};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Errors raised by value-level operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// Values of this type define equality but no order
    #[error("values of type {0} cannot be ordered")]
    Unordered(&'static str),

    /// Operand types are incompatible
    #[error("type mismatch: {left} is incompatible with {right}")]
    TypeMismatch {
        left: &'static str,
        right: &'static str,
    },

    /// Element-wise operation over vectors of unequal length
    #[error("vector length mismatch: {left} vs {right} elements")]
    LengthMismatch { left: usize, right: usize },

    /// A numeric operation applied to a non-numeric value
    #[error("value of type {0} is not numeric")]
    NotNumeric(&'static str),

    /// A vector operation applied to a scalar value
    #[error("value of type {0} is not a vector")]
    NotVector(&'static str),
}

/// Supported column types.
///
/// Vector types pin their element count; a value only matches when its
/// length equals `dim`. A complex vector of `n` elements has logical size
/// `n` (its storage spans `2n` scalar components).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Complex32,
    Complex64,
    ByteVector { dim: usize },
    ShortVector { dim: usize },
    IntVector { dim: usize },
    LongVector { dim: usize },
    FloatVector { dim: usize },
    DoubleVector { dim: usize },
    Complex32Vector { dim: usize },
    Complex64Vector { dim: usize },
}

impl ColumnType {
    /// Logical size: 1 for scalars, the element count for vectors.
    pub fn logical_size(&self) -> usize {
        match self {
            ColumnType::ByteVector { dim }
            | ColumnType::ShortVector { dim }
            | ColumnType::IntVector { dim }
            | ColumnType::LongVector { dim }
            | ColumnType::FloatVector { dim }
            | ColumnType::DoubleVector { dim }
            | ColumnType::Complex32Vector { dim }
            | ColumnType::Complex64Vector { dim } => *dim,
            _ => 1,
        }
    }

    /// Physical size of one value in bytes.
    ///
    /// Strings are variable-width; the pointer-sized figure here is the
    /// planner's per-row estimate, not a storage guarantee.
    pub fn physical_size(&self) -> usize {
        match self {
            ColumnType::Boolean | ColumnType::Byte => 1,
            ColumnType::Short => 2,
            ColumnType::Int | ColumnType::Float => 4,
            ColumnType::Long | ColumnType::Double | ColumnType::String => 8,
            ColumnType::Complex32 => 8,
            ColumnType::Complex64 => 16,
            ColumnType::ByteVector { dim } => *dim,
            ColumnType::ShortVector { dim } => 2 * dim,
            ColumnType::IntVector { dim } | ColumnType::FloatVector { dim } => 4 * dim,
            ColumnType::LongVector { dim } | ColumnType::DoubleVector { dim } => 8 * dim,
            ColumnType::Complex32Vector { dim } => 8 * dim,
            ColumnType::Complex64Vector { dim } => 16 * dim,
        }
    }

    /// True for the orderable numeric scalar types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::Byte
                | ColumnType::Short
                | ColumnType::Int
                | ColumnType::Long
                | ColumnType::Float
                | ColumnType::Double
        )
    }

    /// True for all vector types.
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            ColumnType::ByteVector { .. }
                | ColumnType::ShortVector { .. }
                | ColumnType::IntVector { .. }
                | ColumnType::LongVector { .. }
                | ColumnType::FloatVector { .. }
                | ColumnType::DoubleVector { .. }
                | ColumnType::Complex32Vector { .. }
                | ColumnType::Complex64Vector { .. }
        )
    }

    /// True for vectors with real (non-complex) elements.
    pub fn is_real_vector(&self) -> bool {
        matches!(
            self,
            ColumnType::ByteVector { .. }
                | ColumnType::ShortVector { .. }
                | ColumnType::IntVector { .. }
                | ColumnType::LongVector { .. }
                | ColumnType::FloatVector { .. }
                | ColumnType::DoubleVector { .. }
        )
    }

    /// Check if a value matches this type, including element-count
    /// validation for vectors. `Value::Null` never matches; nullability is
    /// the column def's concern.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ColumnType::Boolean, Value::Boolean(_)) => true,
            (ColumnType::Byte, Value::Byte(_)) => true,
            (ColumnType::Short, Value::Short(_)) => true,
            (ColumnType::Int, Value::Int(_)) => true,
            (ColumnType::Long, Value::Long(_)) => true,
            (ColumnType::Float, Value::Float(_)) => true,
            (ColumnType::Double, Value::Double(_)) => true,
            (ColumnType::String, Value::String(_)) => true,
            (ColumnType::Complex32, Value::Complex32(_)) => true,
            (ColumnType::Complex64, Value::Complex64(_)) => true,
            (ColumnType::ByteVector { dim }, Value::ByteVector(v)) => v.len() == *dim,
            (ColumnType::ShortVector { dim }, Value::ShortVector(v)) => v.len() == *dim,
            (ColumnType::IntVector { dim }, Value::IntVector(v)) => v.len() == *dim,
            (ColumnType::LongVector { dim }, Value::LongVector(v)) => v.len() == *dim,
            (ColumnType::FloatVector { dim }, Value::FloatVector(v)) => v.len() == *dim,
            (ColumnType::DoubleVector { dim }, Value::DoubleVector(v)) => v.len() == *dim,
            (ColumnType::Complex32Vector { dim }, Value::Complex32Vector(v)) => v.len() == *dim,
            (ColumnType::Complex64Vector { dim }, Value::Complex64Vector(v)) => v.len() == *dim,
            _ => false,
        }
    }

    /// Zero/empty value of this type, used for non-nullable defaults.
    pub fn default_value(&self) -> Value {
        match self {
            ColumnType::Boolean => Value::Boolean(false),
            ColumnType::Byte => Value::Byte(0),
            ColumnType::Short => Value::Short(0),
            ColumnType::Int => Value::Int(0),
            ColumnType::Long => Value::Long(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Double => Value::Double(0.0),
            ColumnType::String => Value::String(Arc::from("")),
            ColumnType::Complex32 => Value::Complex32(Complex32::ZERO),
            ColumnType::Complex64 => Value::Complex64(Complex64::ZERO),
            ColumnType::ByteVector { dim } => Value::ByteVector(Arc::new(vec![0; *dim])),
            ColumnType::ShortVector { dim } => Value::ShortVector(Arc::new(vec![0; *dim])),
            ColumnType::IntVector { dim } => Value::IntVector(Arc::new(vec![0; *dim])),
            ColumnType::LongVector { dim } => Value::LongVector(Arc::new(vec![0; *dim])),
            ColumnType::FloatVector { dim } => Value::FloatVector(Arc::new(vec![0.0; *dim])),
            ColumnType::DoubleVector { dim } => Value::DoubleVector(Arc::new(vec![0.0; *dim])),
            ColumnType::Complex32Vector { dim } => {
                Value::Complex32Vector(Arc::new(vec![Complex32::ZERO; *dim]))
            }
            ColumnType::Complex64Vector { dim } => {
                Value::Complex64Vector(Arc::new(vec![Complex64::ZERO; *dim]))
            }
        }
    }

    /// Short name for error messages and the on-disk header tag.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Byte => "byte",
            ColumnType::Short => "short",
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Complex32 => "complex32",
            ColumnType::Complex64 => "complex64",
            ColumnType::ByteVector { .. } => "byte_vector",
            ColumnType::ShortVector { .. } => "short_vector",
            ColumnType::IntVector { .. } => "int_vector",
            ColumnType::LongVector { .. } => "long_vector",
            ColumnType::FloatVector { .. } => "float_vector",
            ColumnType::DoubleVector { .. } => "double_vector",
            ColumnType::Complex32Vector { .. } => "complex32_vector",
            ColumnType::Complex64Vector { .. } => "complex64_vector",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_vector() {
            write!(f, "{}[{}]", self.name(), self.logical_size())
        } else {
            f.write_str(self.name())
        }
    }
}

/// A dynamically-typed value stored in a record.
///
/// Serde support (for query messages and catalog metadata) relies on the
/// `rc` feature for the shared payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Null/missing value (valid only in nullable columns)
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// UTF-8 string (reference counted for efficient cloning)
    String(Arc<str>),
    Complex32(Complex32),
    Complex64(Complex64),
    ByteVector(Arc<Vec<i8>>),
    ShortVector(Arc<Vec<i16>>),
    IntVector(Arc<Vec<i32>>),
    LongVector(Arc<Vec<i64>>),
    FloatVector(Arc<Vec<f32>>),
    DoubleVector(Arc<Vec<f64>>),
    Complex32Vector(Arc<Vec<Complex32>>),
    Complex64Vector(Arc<Vec<Complex64>>),
}

impl Value {
    /// Convenience constructor for the most common vector type.
    pub fn double_vector(data: Vec<f64>) -> Value {
        Value::DoubleVector(Arc::new(data))
    }

    /// Convenience constructor for f32 vectors.
    pub fn float_vector(data: Vec<f32>) -> Value {
        Value::FloatVector(Arc::new(data))
    }

    /// Convenience constructor for strings.
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column type this value belongs to; `None` for null, whose type
    /// is determined by its column.
    pub fn data_type(&self) -> Option<ColumnType> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::Byte(_) => ColumnType::Byte,
            Value::Short(_) => ColumnType::Short,
            Value::Int(_) => ColumnType::Int,
            Value::Long(_) => ColumnType::Long,
            Value::Float(_) => ColumnType::Float,
            Value::Double(_) => ColumnType::Double,
            Value::String(_) => ColumnType::String,
            Value::Complex32(_) => ColumnType::Complex32,
            Value::Complex64(_) => ColumnType::Complex64,
            Value::ByteVector(v) => ColumnType::ByteVector { dim: v.len() },
            Value::ShortVector(v) => ColumnType::ShortVector { dim: v.len() },
            Value::IntVector(v) => ColumnType::IntVector { dim: v.len() },
            Value::LongVector(v) => ColumnType::LongVector { dim: v.len() },
            Value::FloatVector(v) => ColumnType::FloatVector { dim: v.len() },
            Value::DoubleVector(v) => ColumnType::DoubleVector { dim: v.len() },
            Value::Complex32Vector(v) => ColumnType::Complex32Vector { dim: v.len() },
            Value::Complex64Vector(v) => ColumnType::Complex64Vector { dim: v.len() },
        })
    }

    /// Logical size: 1 for scalars, element count for vectors.
    pub fn logical_size(&self) -> usize {
        self.data_type().map_or(1, |t| t.logical_size())
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self.data_type() {
            None => "null",
            Some(t) => t.name(),
        }
    }

    /// Numeric scalar widened to `f64`.
    pub fn as_f64(&self) -> Result<f64, ValueError> {
        match self {
            Value::Byte(v) => Ok(f64::from(*v)),
            Value::Short(v) => Ok(f64::from(*v)),
            Value::Int(v) => Ok(f64::from(*v)),
            Value::Long(v) => Ok(*v as f64),
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Double(v) => Ok(*v),
            other => Err(ValueError::NotNumeric(other.type_name())),
        }
    }

    /// Numeric or complex scalar widened to `Complex64`.
    pub fn as_complex64(&self) -> Result<Complex64, ValueError> {
        match self {
            Value::Complex32(c) => Ok(c.widen()),
            Value::Complex64(c) => Ok(*c),
            other => other.as_f64().map(Complex64::from),
        }
    }

    /// Compare two values of compatible types.
    ///
    /// Numeric scalars compare through `f64` widening (NaN sorts below all
    /// other values). Complex scalars, vectors, and nulls define equality
    /// only and fail here.
    pub fn try_compare(&self, other: &Value) -> Result<Ordering, ValueError> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            (Value::Complex32(_) | Value::Complex64(_), _)
            | (_, Value::Complex32(_) | Value::Complex64(_)) => {
                Err(ValueError::Unordered(self.type_name()))
            }
            (a, _) if a.data_type().is_some_and(|t| t.is_vector()) => {
                Err(ValueError::Unordered(a.type_name()))
            }
            (_, b) if b.data_type().is_some_and(|t| t.is_vector()) => {
                Err(ValueError::Unordered(b.type_name()))
            }
            (a, b) => {
                let (x, y) = (a.as_f64()?, b.as_f64()?);
                Ok(total_cmp_f64(x, y))
            }
        }
    }

    /// Scalar addition with widening promotion. Same-lane integer operands
    /// stay integral; anything mixed goes through the common promoted lane
    /// (`Double`, or `Complex64` when complex is involved).
    pub fn checked_add(&self, other: &Value) -> Result<Value, ValueError> {
        scalar_binop(self, other, i64::wrapping_add, |a, b| a + b, |a, b| a + b)
    }

    /// Scalar subtraction with widening promotion.
    pub fn checked_sub(&self, other: &Value) -> Result<Value, ValueError> {
        scalar_binop(self, other, i64::wrapping_sub, |a, b| a - b, |a, b| a - b)
    }

    /// Scalar multiplication with widening promotion.
    pub fn checked_mul(&self, other: &Value) -> Result<Value, ValueError> {
        scalar_binop(self, other, i64::wrapping_mul, |a, b| a * b, |a, b| a * b)
    }

    /// Scalar division. Integer lanes divide in `f64` to avoid the
    /// divide-by-zero trap and truncation surprises.
    pub fn checked_div(&self, other: &Value) -> Result<Value, ValueError> {
        if self.is_complex() || other.is_complex() {
            Ok(Value::Complex64(
                self.as_complex64()? / other.as_complex64()?,
            ))
        } else {
            Ok(Value::Double(self.as_f64()? / other.as_f64()?))
        }
    }

    fn is_complex(&self) -> bool {
        matches!(self, Value::Complex32(_) | Value::Complex64(_))
    }

    fn is_integer(&self) -> bool {
        matches!(
            self,
            Value::Byte(_) | Value::Short(_) | Value::Int(_) | Value::Long(_)
        )
    }

    fn as_i64(&self) -> Result<i64, ValueError> {
        match self {
            Value::Byte(v) => Ok(i64::from(*v)),
            Value::Short(v) => Ok(i64::from(*v)),
            Value::Int(v) => Ok(i64::from(*v)),
            Value::Long(v) => Ok(*v),
            other => Err(ValueError::NotNumeric(other.type_name())),
        }
    }
}

/// Total order over f64 with NaN below every other value, matching the
/// heap's admission order.
#[inline]
pub(crate) fn total_cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => unreachable!(),
        })
}

/// Shared skeleton of the scalar binops: integer lane, double lane,
/// complex lane, in widening order.
fn scalar_binop(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
    complex_op: fn(Complex64, Complex64) -> Complex64,
) -> Result<Value, ValueError> {
    if a.is_complex() || b.is_complex() {
        return Ok(Value::Complex64(complex_op(
            a.as_complex64()?,
            b.as_complex64()?,
        )));
    }
    if a.is_integer() && b.is_integer() {
        return Ok(Value::Long(int_op(a.as_i64()?, b.as_i64()?)));
    }
    Ok(Value::Double(float_op(a.as_f64()?, b.as_f64()?)))
}

// Structural equality. Floats compare by bit pattern so that equal rows
// dedupe reliably and NaN does not break map keys.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Complex32(a), Value::Complex32(b)) => {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            }
            (Value::Complex64(a), Value::Complex64(b)) => {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            }
            (Value::ByteVector(a), Value::ByteVector(b)) => a == b,
            (Value::ShortVector(a), Value::ShortVector(b)) => a == b,
            (Value::IntVector(a), Value::IntVector(b)) => a == b,
            (Value::LongVector(a), Value::LongVector(b)) => a == b,
            (Value::FloatVector(a), Value::FloatVector(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Value::DoubleVector(a), Value::DoubleVector(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Value::Complex32Vector(a), Value::Complex32Vector(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| {
                        x.re.to_bits() == y.re.to_bits() && x.im.to_bits() == y.im.to_bits()
                    })
            }
            (Value::Complex64Vector(a), Value::Complex64Vector(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| {
                        x.re.to_bits() == y.re.to_bits() && x.im.to_bits() == y.im.to_bits()
                    })
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(v) => v.hash(state),
            Value::Byte(v) => v.hash(state),
            Value::Short(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Complex32(c) => {
                c.re.to_bits().hash(state);
                c.im.to_bits().hash(state);
            }
            Value::Complex64(c) => {
                c.re.to_bits().hash(state);
                c.im.to_bits().hash(state);
            }
            Value::ByteVector(v) => v.hash(state),
            Value::ShortVector(v) => v.hash(state),
            Value::IntVector(v) => v.hash(state),
            Value::LongVector(v) => v.hash(state),
            Value::FloatVector(v) => {
                for x in v.iter() {
                    x.to_bits().hash(state);
                }
            }
            Value::DoubleVector(v) => {
                for x in v.iter() {
                    x.to_bits().hash(state);
                }
            }
            Value::Complex32Vector(v) => {
                for c in v.iter() {
                    c.re.to_bits().hash(state);
                    c.im.to_bits().hash(state);
                }
            }
            Value::Complex64Vector(v) => {
                for c in v.iter() {
                    c.re.to_bits().hash(state);
                    c.im.to_bits().hash(state);
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Complex32(v) => write!(f, "{v}"),
            Value::Complex64(v) => write!(f, "{v}"),
            Value::ByteVector(v) => write!(f, "byte[{}]", v.len()),
            Value::ShortVector(v) => write!(f, "short[{}]", v.len()),
            Value::IntVector(v) => write!(f, "int[{}]", v.len()),
            Value::LongVector(v) => write!(f, "long[{}]", v.len()),
            Value::FloatVector(v) => write!(f, "float[{}]", v.len()),
            Value::DoubleVector(v) => write!(f, "double[{}]", v.len()),
            Value::Complex32Vector(v) => write!(f, "complex32[{}]", v.len()),
            Value::Complex64Vector(v) => write!(f, "complex64[{}]", v.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_and_physical_size() {
        let t = ColumnType::DoubleVector { dim: 3 };
        assert_eq!(t.logical_size(), 3);
        assert_eq!(t.physical_size(), 24);

        // Complex vectors: logical size is the element count, storage twice that
        let c = ColumnType::Complex32Vector { dim: 4 };
        assert_eq!(c.logical_size(), 4);
        assert_eq!(c.physical_size(), 32);

        assert_eq!(ColumnType::Long.logical_size(), 1);
        assert_eq!(ColumnType::Long.physical_size(), 8);
    }

    #[test]
    fn test_type_matches_checks_dimension() {
        let t = ColumnType::DoubleVector { dim: 3 };
        assert!(t.matches(&Value::double_vector(vec![1.0, 2.0, 3.0])));
        assert!(!t.matches(&Value::double_vector(vec![1.0, 2.0])));
        assert!(!t.matches(&Value::float_vector(vec![1.0, 2.0, 3.0])));
        assert!(!t.matches(&Value::Null));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(ColumnType::Int.default_value(), Value::Int(0));
        assert_eq!(
            ColumnType::FloatVector { dim: 2 }.default_value(),
            Value::float_vector(vec![0.0, 0.0])
        );
        assert_eq!(ColumnType::String.default_value(), Value::string(""));
    }

    #[test]
    fn test_numeric_comparison_widens() {
        let a = Value::Int(3);
        let b = Value::Double(3.5);
        assert_eq!(a.try_compare(&b).unwrap(), Ordering::Less);
        assert_eq!(b.try_compare(&a).unwrap(), Ordering::Greater);
        assert_eq!(
            Value::Long(7).try_compare(&Value::Byte(7)).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn test_complex_rejects_ordering() {
        let a = Value::Complex64(Complex64::new(1.0, 1.0));
        let b = Value::Complex64(Complex64::new(2.0, 0.0));
        assert!(matches!(
            a.try_compare(&b),
            Err(ValueError::Unordered("complex64"))
        ));
        // Equality still works
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_vectors_reject_ordering() {
        let a = Value::double_vector(vec![1.0]);
        let b = Value::double_vector(vec![2.0]);
        assert!(matches!(a.try_compare(&b), Err(ValueError::Unordered(_))));
    }

    #[test]
    fn test_scalar_arithmetic_promotion() {
        // Integer lane stays integral
        assert_eq!(
            Value::Int(2).checked_add(&Value::Byte(3)).unwrap(),
            Value::Long(5)
        );
        // Mixed int/float widens to double
        assert_eq!(
            Value::Int(2).checked_mul(&Value::Double(0.5)).unwrap(),
            Value::Double(1.0)
        );
        // Complex wins the promotion
        let z = Value::Complex32(Complex32::new(1.0, 1.0));
        assert_eq!(
            z.checked_add(&Value::Int(1)).unwrap(),
            Value::Complex64(Complex64::new(2.0, 1.0))
        );
    }

    #[test]
    fn test_division_never_traps() {
        assert_eq!(
            Value::Int(1).checked_div(&Value::Int(0)).unwrap(),
            Value::Double(f64::INFINITY)
        );
    }

    #[test]
    fn test_string_arithmetic_fails() {
        let err = Value::string("a").checked_add(&Value::Int(1)).unwrap_err();
        assert!(matches!(err, ValueError::NotNumeric("string")));
    }

    #[test]
    fn test_structural_equality_and_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Value::double_vector(vec![1.0, 2.0]));
        set.insert(Value::double_vector(vec![1.0, 2.0]));
        set.insert(Value::double_vector(vec![2.0, 1.0]));
        assert_eq!(set.len(), 2);
    }
}
