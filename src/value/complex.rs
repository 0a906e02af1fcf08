//! Complex Number Arithmetic
//!
//! Fixed-width complex scalars backing the `Complex32`/`Complex64` column
//! types and their vector forms. Both widths are plain value types; all
//! operators allocate fresh results.
//!
//! Complex values define equality but no total order. Ordering is rejected
//! at the `Value` layer so the error carries the offending type name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Complex number with `f32` components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

/// Complex number with `f64` components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Complex32 {
    pub const ZERO: Complex32 = Complex32 { re: 0.0, im: 0.0 };

    pub fn new(re: f32, im: f32) -> Self {
        Complex32 { re, im }
    }

    /// Complex conjugate: `a + bi -> a - bi`.
    #[inline]
    pub fn conjugate(self) -> Self {
        Complex32 {
            re: self.re,
            im: -self.im,
        }
    }

    /// Magnitude `sqrt(re^2 + im^2)`.
    #[inline]
    pub fn modulo(self) -> f32 {
        self.re.hypot(self.im)
    }

    /// Widen to the `f64` representation used by mixed-type arithmetic.
    #[inline]
    pub fn widen(self) -> Complex64 {
        Complex64 {
            re: f64::from(self.re),
            im: f64::from(self.im),
        }
    }
}

impl Complex64 {
    pub const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };

    pub fn new(re: f64, im: f64) -> Self {
        Complex64 { re, im }
    }

    /// Complex conjugate: `a + bi -> a - bi`.
    #[inline]
    pub fn conjugate(self) -> Self {
        Complex64 {
            re: self.re,
            im: -self.im,
        }
    }

    /// Magnitude `sqrt(re^2 + im^2)`.
    #[inline]
    pub fn modulo(self) -> f64 {
        self.re.hypot(self.im)
    }

    /// Squared magnitude `re^2 + im^2` (avoids the sqrt for accumulation).
    #[inline]
    pub fn modulo_squared(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    /// Principal square root.
    ///
    /// Uses the half-angle form: for `z = r*e^(i*theta)`,
    /// `sqrt(z) = sqrt(r)*e^(i*theta/2)`.
    pub fn sqrt(self) -> Complex64 {
        let r = self.modulo();
        let re = ((r + self.re) / 2.0).sqrt();
        let im = ((r - self.re) / 2.0).sqrt();
        Complex64 {
            re,
            im: if self.im < 0.0 { -im } else { im },
        }
    }

    /// Integer power by repeated multiplication.
    ///
    /// Negative exponents go through the reciprocal; `z^0` is `1 + 0i`
    /// including for `z = 0`, matching `f64::powi`.
    pub fn powi(self, n: i32) -> Complex64 {
        if n == 0 {
            return Complex64::new(1.0, 0.0);
        }
        let base = if n < 0 {
            Complex64::new(1.0, 0.0) / self
        } else {
            self
        };
        let mut acc = base;
        for _ in 1..n.unsigned_abs() {
            acc = acc * base;
        }
        acc
    }
}

impl Add for Complex64 {
    type Output = Complex64;

    #[inline]
    fn add(self, rhs: Complex64) -> Complex64 {
        Complex64::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex64 {
    type Output = Complex64;

    #[inline]
    fn sub(self, rhs: Complex64) -> Complex64 {
        Complex64::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex64 {
    type Output = Complex64;

    #[inline]
    fn mul(self, rhs: Complex64) -> Complex64 {
        Complex64::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

impl Div for Complex64 {
    type Output = Complex64;

    #[inline]
    fn div(self, rhs: Complex64) -> Complex64 {
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Complex64::new(
            (self.re * rhs.re + self.im * rhs.im) / denom,
            (self.im * rhs.re - self.re * rhs.im) / denom,
        )
    }
}

impl Neg for Complex64 {
    type Output = Complex64;

    #[inline]
    fn neg(self) -> Complex64 {
        Complex64::new(-self.re, -self.im)
    }
}

impl From<Complex32> for Complex64 {
    fn from(c: Complex32) -> Complex64 {
        c.widen()
    }
}

impl From<f64> for Complex64 {
    fn from(re: f64) -> Complex64 {
        Complex64 { re, im: 0.0 }
    }
}

impl fmt::Display for Complex32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:+}i", self.re, self.im)
    }
}

impl fmt::Display for Complex64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:+}i", self.re, self.im)
    }
}
