//! Vector Value Operations
//!
//! Element-wise arithmetic and the special vector methods (abs, pow, sqrt,
//! sum, norms, dot, Minkowski distances) over the vector variants of
//! [`Value`](super::Value).
//!
//! Two evaluation lanes cover all element types: real vectors compute in
//! `f64`, complex vectors in `Complex64`. Like-typed element-wise
//! arithmetic preserves the operand type; unlike types widen to the lane
//! type. Every operation allocates a fresh result; operands are never
//! mutated.

use super::complex::Complex64;
use super::{total_cmp_f64, Value, ValueError};
use std::borrow::Cow;
use std::sync::Arc;

/// Element-wise binary operator selection shared by the arithmetic entry
/// points below.
#[derive(Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn int(self, a: i64, b: i64) -> i64 {
        match self {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => unreachable!("integer lanes divide in f64"),
        }
    }

    fn float(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
        }
    }

    fn complex(self, a: Complex64, b: Complex64) -> Complex64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
        }
    }
}

macro_rules! same_lane_int {
    ($va:expr, $vb:expr, $variant:ident, $ty:ty, $op:expr) => {{
        check_len($va.len(), $vb.len())?;
        Ok(Value::$variant(Arc::new(
            $va.iter()
                .zip($vb.iter())
                .map(|(x, y)| $op.int(i64::from(*x), i64::from(*y)) as $ty)
                .collect(),
        )))
    }};
}

#[inline]
fn check_len(a: usize, b: usize) -> Result<(), ValueError> {
    if a == b {
        Ok(())
    } else {
        Err(ValueError::LengthMismatch { left: a, right: b })
    }
}

impl Value {
    /// Borrow or widen the elements of a real vector as `f64`.
    ///
    /// `DoubleVector` borrows without copying; the other real lanes widen
    /// into a fresh buffer. Complex vectors and scalars fail.
    pub fn real_elements(&self) -> Result<Cow<'_, [f64]>, ValueError> {
        match self {
            Value::DoubleVector(v) => Ok(Cow::Borrowed(v.as_slice())),
            Value::FloatVector(v) => Ok(Cow::Owned(v.iter().map(|x| f64::from(*x)).collect())),
            Value::ByteVector(v) => Ok(Cow::Owned(v.iter().map(|x| f64::from(*x)).collect())),
            Value::ShortVector(v) => Ok(Cow::Owned(v.iter().map(|x| f64::from(*x)).collect())),
            Value::IntVector(v) => Ok(Cow::Owned(v.iter().map(|x| f64::from(*x)).collect())),
            Value::LongVector(v) => Ok(Cow::Owned(v.iter().map(|x| *x as f64).collect())),
            other => Err(ValueError::NotVector(other.type_name())),
        }
    }

    /// Widen the elements of a complex (or real) vector to `Complex64`.
    pub fn complex_elements(&self) -> Result<Cow<'_, [Complex64]>, ValueError> {
        match self {
            Value::Complex64Vector(v) => Ok(Cow::Borrowed(v.as_slice())),
            Value::Complex32Vector(v) => {
                Ok(Cow::Owned(v.iter().map(|c| c.widen()).collect()))
            }
            other => {
                let reals = other.real_elements()?;
                Ok(Cow::Owned(
                    reals.iter().map(|x| Complex64::from(*x)).collect(),
                ))
            }
        }
    }

    fn is_complex_vector(&self) -> bool {
        matches!(self, Value::Complex32Vector(_) | Value::Complex64Vector(_))
    }

    fn is_vector_value(&self) -> bool {
        self.data_type().is_some_and(|t| t.is_vector())
    }

    /// Element-wise addition; vector/scalar operands broadcast.
    pub fn elementwise_add(&self, other: &Value) -> Result<Value, ValueError> {
        self.elementwise(other, BinOp::Add)
    }

    /// Element-wise subtraction; vector/scalar operands broadcast.
    pub fn elementwise_sub(&self, other: &Value) -> Result<Value, ValueError> {
        self.elementwise(other, BinOp::Sub)
    }

    /// Element-wise multiplication; vector/scalar operands broadcast.
    pub fn elementwise_mul(&self, other: &Value) -> Result<Value, ValueError> {
        self.elementwise(other, BinOp::Mul)
    }

    /// Element-wise division in the widened lane (integer elements divide
    /// in `f64`, so there is no zero-divisor trap).
    pub fn elementwise_div(&self, other: &Value) -> Result<Value, ValueError> {
        self.elementwise(other, BinOp::Div)
    }

    fn elementwise(&self, other: &Value, op: BinOp) -> Result<Value, ValueError> {
        match (self.is_vector_value(), other.is_vector_value()) {
            (true, true) => self.vector_vector(other, op),
            (true, false) => self.broadcast(other, op, false),
            (false, true) => other.broadcast(self, op, true),
            (false, false) => Err(ValueError::NotVector(self.type_name())),
        }
    }

    fn vector_vector(&self, other: &Value, op: BinOp) -> Result<Value, ValueError> {
        // Like-typed integer/float lanes keep their element type (division
        // always widens).
        if !matches!(op, BinOp::Div) {
            match (self, other) {
                (Value::ByteVector(a), Value::ByteVector(b)) => {
                    return same_lane_int!(a, b, ByteVector, i8, op)
                }
                (Value::ShortVector(a), Value::ShortVector(b)) => {
                    return same_lane_int!(a, b, ShortVector, i16, op)
                }
                (Value::IntVector(a), Value::IntVector(b)) => {
                    return same_lane_int!(a, b, IntVector, i32, op)
                }
                (Value::LongVector(a), Value::LongVector(b)) => {
                    check_len(a.len(), b.len())?;
                    return Ok(Value::LongVector(Arc::new(
                        a.iter().zip(b.iter()).map(|(x, y)| op.int(*x, *y)).collect(),
                    )));
                }
                (Value::FloatVector(a), Value::FloatVector(b)) => {
                    check_len(a.len(), b.len())?;
                    return Ok(Value::FloatVector(Arc::new(
                        a.iter()
                            .zip(b.iter())
                            .map(|(x, y)| op.float(f64::from(*x), f64::from(*y)) as f32)
                            .collect(),
                    )));
                }
                _ => {}
            }
        }
        if self.is_complex_vector() || other.is_complex_vector() {
            let (a, b) = (self.complex_elements()?, other.complex_elements()?);
            check_len(a.len(), b.len())?;
            Ok(Value::Complex64Vector(Arc::new(
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| op.complex(*x, *y))
                    .collect(),
            )))
        } else {
            let (a, b) = (self.real_elements()?, other.real_elements()?);
            check_len(a.len(), b.len())?;
            Ok(Value::DoubleVector(Arc::new(
                a.iter()
                    .zip(b.iter())
                    .map(|(x, y)| op.float(*x, *y))
                    .collect(),
            )))
        }
    }

    /// Broadcast a scalar over every element of `self`. `flipped` marks the
    /// scalar as the left operand, which matters for `Sub` and `Div`.
    fn broadcast(&self, scalar: &Value, op: BinOp, flipped: bool) -> Result<Value, ValueError> {
        if self.is_complex_vector() || scalar.is_complex() {
            let s = scalar.as_complex64()?;
            let elems = self.complex_elements()?;
            Ok(Value::Complex64Vector(Arc::new(
                elems
                    .iter()
                    .map(|x| {
                        if flipped {
                            op.complex(s, *x)
                        } else {
                            op.complex(*x, s)
                        }
                    })
                    .collect(),
            )))
        } else {
            let s = scalar.as_f64()?;
            let elems = self.real_elements()?;
            Ok(Value::DoubleVector(Arc::new(
                elems
                    .iter()
                    .map(|x| if flipped { op.float(s, *x) } else { op.float(*x, s) })
                    .collect(),
            )))
        }
    }

    /// Element-wise magnitude. Real element types are preserved; complex
    /// elements map to their modulo as a real of matching width.
    pub fn vector_abs(&self) -> Result<Value, ValueError> {
        match self {
            Value::ByteVector(v) => Ok(Value::ByteVector(Arc::new(
                v.iter().map(|x| x.saturating_abs()).collect(),
            ))),
            Value::ShortVector(v) => Ok(Value::ShortVector(Arc::new(
                v.iter().map(|x| x.saturating_abs()).collect(),
            ))),
            Value::IntVector(v) => Ok(Value::IntVector(Arc::new(
                v.iter().map(|x| x.saturating_abs()).collect(),
            ))),
            Value::LongVector(v) => Ok(Value::LongVector(Arc::new(
                v.iter().map(|x| x.saturating_abs()).collect(),
            ))),
            Value::FloatVector(v) => Ok(Value::FloatVector(Arc::new(
                v.iter().map(|x| x.abs()).collect(),
            ))),
            Value::DoubleVector(v) => Ok(Value::DoubleVector(Arc::new(
                v.iter().map(|x| x.abs()).collect(),
            ))),
            Value::Complex32Vector(v) => Ok(Value::FloatVector(Arc::new(
                v.iter().map(|c| c.modulo()).collect(),
            ))),
            Value::Complex64Vector(v) => Ok(Value::DoubleVector(Arc::new(
                v.iter().map(|c| c.modulo()).collect(),
            ))),
            other => Err(ValueError::NotVector(other.type_name())),
        }
    }

    /// Element-wise integer power. Result elements are `f64`
    /// (`Complex64` for complex inputs).
    pub fn vector_pow(&self, n: i32) -> Result<Value, ValueError> {
        if self.is_complex_vector() {
            let elems = self.complex_elements()?;
            Ok(Value::Complex64Vector(Arc::new(
                elems.iter().map(|c| c.powi(n)).collect(),
            )))
        } else {
            let elems = self.real_elements()?;
            Ok(Value::DoubleVector(Arc::new(
                elems.iter().map(|x| x.powi(n)).collect(),
            )))
        }
    }

    /// Element-wise square root. Result elements are `f64`
    /// (`Complex64` for complex inputs).
    pub fn vector_sqrt(&self) -> Result<Value, ValueError> {
        if self.is_complex_vector() {
            let elems = self.complex_elements()?;
            Ok(Value::Complex64Vector(Arc::new(
                elems.iter().map(|c| c.sqrt()).collect(),
            )))
        } else {
            let elems = self.real_elements()?;
            Ok(Value::DoubleVector(Arc::new(
                elems.iter().map(|x| x.sqrt()).collect(),
            )))
        }
    }

    /// Sum of all elements in the widest representable type of the input:
    /// `Long` for integer lanes, `Double` for float lanes, `Complex64` for
    /// complex lanes.
    pub fn vector_sum(&self) -> Result<Value, ValueError> {
        match self {
            Value::ByteVector(v) => Ok(Value::Long(v.iter().map(|x| i64::from(*x)).sum())),
            Value::ShortVector(v) => Ok(Value::Long(v.iter().map(|x| i64::from(*x)).sum())),
            Value::IntVector(v) => Ok(Value::Long(v.iter().map(|x| i64::from(*x)).sum())),
            Value::LongVector(v) => Ok(Value::Long(v.iter().sum())),
            Value::FloatVector(v) => Ok(Value::Double(v.iter().map(|x| f64::from(*x)).sum())),
            Value::DoubleVector(v) => Ok(Value::Double(v.iter().sum())),
            Value::Complex32Vector(_) | Value::Complex64Vector(_) => {
                let elems = self.complex_elements()?;
                let mut acc = Complex64::ZERO;
                for c in elems.iter() {
                    acc = acc + *c;
                }
                Ok(Value::Complex64(acc))
            }
            other => Err(ValueError::NotVector(other.type_name())),
        }
    }

    /// Euclidean norm `sqrt(sum(|x_i|^2))`. Real for real vectors, complex
    /// (with zero imaginary part) for complex vectors.
    pub fn norm2(&self) -> Result<Value, ValueError> {
        if self.is_complex_vector() {
            let elems = self.complex_elements()?;
            let sum_sq: f64 = elems.iter().map(|c| c.modulo_squared()).sum();
            Ok(Value::Complex64(Complex64::new(sum_sq.sqrt(), 0.0)))
        } else {
            let elems = self.real_elements()?;
            let sum_sq: f64 = elems.iter().map(|x| x * x).sum();
            Ok(Value::Double(sum_sq.sqrt()))
        }
    }

    /// Hermitian inner product `sum(conj(a_i) * b_i)`, returning the real
    /// component as a real scalar. For real inputs this is the plain dot
    /// product.
    pub fn dot(&self, other: &Value) -> Result<Value, ValueError> {
        if self.is_complex_vector() || other.is_complex_vector() {
            let (a, b) = (self.complex_elements()?, other.complex_elements()?);
            check_len(a.len(), b.len())?;
            let mut acc = Complex64::ZERO;
            for (x, y) in a.iter().zip(b.iter()) {
                acc = acc + x.conjugate() * *y;
            }
            Ok(Value::Double(acc.re))
        } else {
            let (a, b) = (self.real_elements()?, other.real_elements()?);
            check_len(a.len(), b.len())?;
            Ok(Value::Double(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()))
        }
    }

    /// Manhattan distance. Complex-vs-complex accumulates the real and
    /// imaginary components independently and returns a complex whose
    /// magnitude is the distance; everything else returns a real.
    pub fn l1(&self, other: &Value) -> Result<Value, ValueError> {
        if self.is_complex_vector() && other.is_complex_vector() {
            let (a, b) = (self.complex_elements()?, other.complex_elements()?);
            check_len(a.len(), b.len())?;
            let mut re = 0.0;
            let mut im = 0.0;
            for (x, y) in a.iter().zip(b.iter()) {
                re += (x.re - y.re).abs();
                im += (x.im - y.im).abs();
            }
            Ok(Value::Complex64(Complex64::new(re, im)))
        } else {
            self.minkowski(other, 1)
        }
    }

    /// Euclidean distance as a real scalar (complex inputs go through the
    /// per-element modulo of the difference).
    pub fn l2(&self, other: &Value) -> Result<Value, ValueError> {
        self.minkowski(other, 2)
    }

    /// Minkowski distance of integer order `p >= 1` as a real scalar.
    pub fn lp(&self, other: &Value, p: u32) -> Result<Value, ValueError> {
        self.minkowski(other, p)
    }

    fn minkowski(&self, other: &Value, p: u32) -> Result<Value, ValueError> {
        let sum = if self.is_complex_vector() || other.is_complex_vector() {
            let (a, b) = (self.complex_elements()?, other.complex_elements()?);
            check_len(a.len(), b.len())?;
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| (*x - *y).modulo().powi(p as i32))
                .sum::<f64>()
        } else {
            let (a, b) = (self.real_elements()?, other.real_elements()?);
            check_len(a.len(), b.len())?;
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).abs().powi(p as i32))
                .sum::<f64>()
        };
        Ok(Value::Double(sum.powf(1.0 / f64::from(p))))
    }

    /// Chebyshev (`L-infinity`) distance over real vectors.
    pub fn linf(&self, other: &Value) -> Result<Value, ValueError> {
        let (a, b) = (self.real_elements()?, other.real_elements()?);
        check_len(a.len(), b.len())?;
        let max = a
            .iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .max_by(|x, y| total_cmp_f64(*x, *y))
            .unwrap_or(0.0);
        Ok(Value::Double(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::complex::Complex32;

    fn dvec(data: &[f64]) -> Value {
        Value::double_vector(data.to_vec())
    }

    fn cvec(data: &[(f64, f64)]) -> Value {
        Value::Complex64Vector(Arc::new(
            data.iter().map(|(re, im)| Complex64::new(*re, *im)).collect(),
        ))
    }

    #[test]
    fn test_like_typed_arithmetic_preserves_type() {
        let a = Value::IntVector(Arc::new(vec![1, 2, 3]));
        let b = Value::IntVector(Arc::new(vec![10, 20, 30]));
        assert_eq!(
            a.elementwise_add(&b).unwrap(),
            Value::IntVector(Arc::new(vec![11, 22, 33]))
        );
    }

    #[test]
    fn test_unlike_typed_arithmetic_widens() {
        let a = Value::IntVector(Arc::new(vec![1, 2]));
        let b = dvec(&[0.5, 0.5]);
        assert_eq!(a.elementwise_add(&b).unwrap(), dvec(&[1.5, 2.5]));
    }

    #[test]
    fn test_length_mismatch() {
        let a = dvec(&[1.0, 2.0]);
        let b = dvec(&[1.0]);
        assert!(matches!(
            a.elementwise_add(&b),
            Err(ValueError::LengthMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn test_scalar_broadcast() {
        let v = dvec(&[1.0, 2.0, 3.0]);
        assert_eq!(
            v.elementwise_mul(&Value::Int(2)).unwrap(),
            dvec(&[2.0, 4.0, 6.0])
        );
        // Scalar on the left of a subtraction
        assert_eq!(
            Value::Double(10.0).elementwise_sub(&v).unwrap(),
            dvec(&[9.0, 8.0, 7.0])
        );
    }

    #[test]
    fn test_abs_preserves_real_type() {
        let v = Value::IntVector(Arc::new(vec![-1, 2, -3]));
        assert_eq!(
            v.vector_abs().unwrap(),
            Value::IntVector(Arc::new(vec![1, 2, 3]))
        );
    }

    #[test]
    fn test_abs_of_complex_is_real() {
        let v = Value::Complex32Vector(Arc::new(vec![Complex32::new(3.0, 4.0)]));
        assert_eq!(v.vector_abs().unwrap(), Value::float_vector(vec![5.0]));
    }

    #[test]
    fn test_pow_and_sqrt_are_double_typed() {
        let v = Value::IntVector(Arc::new(vec![2, 3]));
        assert_eq!(v.vector_pow(2).unwrap(), dvec(&[4.0, 9.0]));
        assert_eq!(dvec(&[4.0, 9.0]).vector_sqrt().unwrap(), dvec(&[2.0, 3.0]));
    }

    #[test]
    fn test_sum_widens() {
        let v = Value::ByteVector(Arc::new(vec![100, 100, 100]));
        assert_eq!(v.vector_sum().unwrap(), Value::Long(300));
        assert_eq!(dvec(&[0.5, 0.25]).vector_sum().unwrap(), Value::Double(0.75));
    }

    #[test]
    fn test_norm2() {
        assert_eq!(dvec(&[3.0, 4.0]).norm2().unwrap(), Value::Double(5.0));
        let c = cvec(&[(3.0, 4.0)]);
        assert_eq!(
            c.norm2().unwrap(),
            Value::Complex64(Complex64::new(5.0, 0.0))
        );
    }

    #[test]
    fn test_dot_is_hermitian() {
        // conj(i) * i = 1, so <[i], [i]> = 1
        let v = cvec(&[(0.0, 1.0)]);
        assert_eq!(v.dot(&v).unwrap(), Value::Double(1.0));

        // Real degenerates to the plain dot product
        let a = dvec(&[1.0, 2.0]);
        let b = dvec(&[3.0, 4.0]);
        assert_eq!(a.dot(&b).unwrap(), Value::Double(11.0));
    }

    #[test]
    fn test_l2_symmetry_and_identity() {
        let a = dvec(&[1.0, 0.0, 0.0]);
        let b = dvec(&[0.0, 1.0, 0.0]);
        assert_eq!(a.l2(&b).unwrap(), b.l2(&a).unwrap());
        assert_eq!(a.l2(&a).unwrap(), Value::Double(0.0));
    }

    #[test]
    fn test_l1_dominates_linf() {
        let a = dvec(&[1.0, -2.0, 3.0]);
        let b = dvec(&[0.0, 2.0, -1.0]);
        let l1 = match a.l1(&b).unwrap() {
            Value::Double(d) => d,
            _ => unreachable!(),
        };
        let linf = match a.linf(&b).unwrap() {
            Value::Double(d) => d,
            _ => unreachable!(),
        };
        assert!(l1 >= linf);
    }

    #[test]
    fn test_complex_l1_accumulates_independently() {
        let a = cvec(&[(1.0, 2.0), (0.0, 0.0)]);
        let b = cvec(&[(0.0, 0.0), (-1.0, 1.0)]);
        assert_eq!(
            a.l1(&b).unwrap(),
            Value::Complex64(Complex64::new(2.0, 3.0))
        );
    }

    #[test]
    fn test_lp_matches_l2_at_p2() {
        let a = dvec(&[1.0, 1.0]);
        let b = dvec(&[0.0, 0.0]);
        assert_eq!(a.lp(&b, 2).unwrap(), a.l2(&b).unwrap());
    }
}
