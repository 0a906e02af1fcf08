//! Distance Kernels
//!
//! Pure distance functions over `f64` slices used by kNN evaluation.
//! Includes the [`Distance`] selector the binder resolves by name and the
//! planner consults for relative cost.
//!
//! # Performance Considerations
//! - Single-pass, iterator-based implementations enable SIMD
//!   autovectorization
//! - All kernels are pure and thread-safe; tasks invoke them concurrently
//!   without synchronization
//! - Length equality is enforced upstream by the column-def check, so the
//!   kernels themselves only debug-assert it

use serde::{Deserialize, Serialize};

// Distance Functions

/// Compute Manhattan (L1) distance between two vectors.
///
/// Formula: `d(a, b) = sum(|a[i] - b[i]|)`
#[inline]
pub fn manhattan_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Compute Euclidean (L2) distance between two vectors.
///
/// Formula: `d(a, b) = sqrt(sum((a[i] - b[i])^2))`
#[inline]
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean_distance(a, b).sqrt()
}

/// Compute squared Euclidean distance (avoids the sqrt for comparisons).
#[inline]
pub fn squared_euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

/// Compute Minkowski distance of integer order `p >= 1`.
///
/// Formula: `d(a, b) = (sum(|a[i] - b[i]|^p))^(1/p)`
#[inline]
pub fn minkowski_distance(a: &[f64], b: &[f64], p: u32) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs().powi(p as i32))
        .sum();
    sum.powf(1.0 / f64::from(p))
}

/// Compute cosine distance between two vectors.
///
/// Formula: `d(a, b) = 1 - (a . b) / (||a|| * ||b||)`
///
/// Returns a value in [0, 2]. Zero vectors are treated as identical
/// (distance 0) so degenerate rows never dominate a result.
#[inline]
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0;
    let mut norm_a_sq = 0.0;
    let mut norm_b_sq = 0.0;

    // Single pass through both vectors for cache efficiency
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a_sq += x * x;
        norm_b_sq += y * y;
    }

    let norm_a = norm_a_sq.sqrt();
    let norm_b = norm_b_sq.sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    1.0 - similarity
}

/// Compute inner-product distance: the negated dot product, so that more
/// similar vectors sort first under the heap's ascending order.
#[inline]
pub fn inner_product_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    -a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f64>()
}

/// Compute Hamming distance: the number of element positions where the two
/// vectors differ.
#[inline]
pub fn hamming_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .filter(|(x, y)| x.to_bits() != y.to_bits())
        .count() as f64
}

/// Compute chi-squared distance.
///
/// Formula: `d(a, b) = sum((b[i] - a[i])^2 / (b[i] + a[i]))`
///
/// Terms with a zero denominator contribute nothing (both elements zero
/// means no divergence at that position).
#[inline]
pub fn chi_squared_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let denom = x + y;
            if denom == 0.0 {
                0.0
            } else {
                let diff = y - x;
                diff * diff / denom
            }
        })
        .sum()
}

// Weighted Variants

/// Weighted Manhattan distance: `sum(w[i] * |a[i] - b[i]|)`.
#[inline]
pub fn weighted_manhattan_distance(a: &[f64], b: &[f64], w: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), w.len());
    a.iter()
        .zip(b.iter())
        .zip(w.iter())
        .map(|((x, y), wi)| wi * (x - y).abs())
        .sum()
}

/// Weighted Euclidean distance: `sqrt(sum(w[i] * (a[i] - b[i])^2))`.
#[inline]
pub fn weighted_euclidean_distance(a: &[f64], b: &[f64], w: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), w.len());
    a.iter()
        .zip(b.iter())
        .zip(w.iter())
        .map(|((x, y), wi)| {
            let diff = x - y;
            wi * diff * diff
        })
        .sum::<f64>()
        .sqrt()
}

/// Weighted Minkowski distance: `(sum(w[i] * |a[i] - b[i]|^p))^(1/p)`.
#[inline]
pub fn weighted_minkowski_distance(a: &[f64], b: &[f64], w: &[f64], p: u32) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), w.len());
    let sum: f64 = a
        .iter()
        .zip(b.iter())
        .zip(w.iter())
        .map(|((x, y), wi)| wi * (x - y).abs().powi(p as i32))
        .sum();
    sum.powf(1.0 / f64::from(p))
}

/// Weighted chi-squared distance: each term multiplied by `w[i]`.
#[inline]
pub fn weighted_chi_squared_distance(a: &[f64], b: &[f64], w: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len(), w.len());
    a.iter()
        .zip(b.iter())
        .zip(w.iter())
        .map(|((x, y), wi)| {
            let denom = x + y;
            if denom == 0.0 {
                0.0
            } else {
                let diff = y - x;
                wi * diff * diff / denom
            }
        })
        .sum()
}

// Kernel Selection

/// Distance kernel selected by a kNN predicate.
///
/// Stateless; copies are free and invocations are safe from any number of
/// tasks at once. `cost()` is the relative CPU multiplier the planner
/// charges per candidate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Manhattan (L1)
    L1,
    /// Euclidean (L2)
    L2,
    /// Squared Euclidean (monotone with L2, cheaper)
    SquaredL2,
    /// Minkowski of integer order `p >= 1`
    Lp(u32),
    /// Cosine distance
    Cosine,
    /// Negated inner product
    InnerProduct,
    /// Element disagreement count
    Hamming,
    /// Chi-squared
    ChiSquared,
}

impl Distance {
    /// Resolve a kernel by the name carried in a query message.
    pub fn from_name(name: &str) -> Option<Distance> {
        match name.to_ascii_lowercase().as_str() {
            "l1" | "manhattan" => Some(Distance::L1),
            "l2" | "euclidean" => Some(Distance::L2),
            "squaredl2" | "squared_euclidean" => Some(Distance::SquaredL2),
            "cosine" => Some(Distance::Cosine),
            "innerproduct" | "inner_product" | "dot" => Some(Distance::InnerProduct),
            "hamming" => Some(Distance::Hamming),
            "chisquared" | "chi_squared" => Some(Distance::ChiSquared),
            lp => lp
                .strip_prefix("lp")
                .and_then(|p| p.parse::<u32>().ok())
                .filter(|p| *p >= 1)
                .map(Distance::Lp),
        }
    }

    /// Relative CPU cost per candidate row, used by the plan cost model.
    pub fn cost(&self) -> f64 {
        match self {
            Distance::Hamming => 0.8,
            Distance::SquaredL2 | Distance::InnerProduct => 0.9,
            Distance::L1 | Distance::L2 => 1.0,
            Distance::Cosine => 1.2,
            Distance::ChiSquared => 1.3,
            Distance::Lp(_) => 1.5,
        }
    }

    /// True when the kernel has a weighted form.
    pub fn supports_weights(&self) -> bool {
        matches!(
            self,
            Distance::L1 | Distance::L2 | Distance::Lp(_) | Distance::ChiSquared
        )
    }

    /// Evaluate the kernel.
    #[inline]
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            Distance::L1 => manhattan_distance(a, b),
            Distance::L2 => euclidean_distance(a, b),
            Distance::SquaredL2 => squared_euclidean_distance(a, b),
            Distance::Lp(p) => minkowski_distance(a, b, *p),
            Distance::Cosine => cosine_distance(a, b),
            Distance::InnerProduct => inner_product_distance(a, b),
            Distance::Hamming => hamming_distance(a, b),
            Distance::ChiSquared => chi_squared_distance(a, b),
        }
    }

    /// Evaluate the weighted form. Kernels without one ignore the weights;
    /// the binder rejects such queries before execution.
    #[inline]
    pub fn weighted_distance(&self, a: &[f64], b: &[f64], w: &[f64]) -> f64 {
        match self {
            Distance::L1 => weighted_manhattan_distance(a, b, w),
            Distance::L2 => weighted_euclidean_distance(a, b, w),
            Distance::Lp(p) => weighted_minkowski_distance(a, b, w, *p),
            Distance::ChiSquared => weighted_chi_squared_distance(a, b, w),
            other => other.distance(a, b),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Distance::L1 => "l1",
            Distance::L2 => "l2",
            Distance::SquaredL2 => "squaredl2",
            Distance::Lp(_) => "lp",
            Distance::Cosine => "cosine",
            Distance::InnerProduct => "innerproduct",
            Distance::Hamming => "hamming",
            Distance::ChiSquared => "chisquared",
        }
    }
}
