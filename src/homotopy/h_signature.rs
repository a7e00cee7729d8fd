//! Topological path classification via complex-valued h-signatures.
//!
//! Two trajectories between the same endpoints belong to the same homotopy
//! class iff one can be deformed into the other without crossing an
//! obstacle. The h-signature is a complex line integral over the path that
//! is invariant under such deformations: each obstacle centroid contributes
//! a weighted principal-branch logarithm per path segment, so paths that
//! wind differently around an obstacle accumulate imaginary parts differing
//! by multiples of 2π.

use num_complex::Complex64;

use crate::core::types::Point2D;
use crate::obstacles::Obstacle;

/// Obstacle centroids closer than this (after prescaling) share a branch
/// weight; the factor is skipped to keep the weight finite.
const OBSTACLE_MERGE_TOLERANCE: f64 = 0.05;

/// Perturbation applied when a path vertex coincides with a centroid.
const DEGENERATE_EPS: f64 = 1e-9;

/// A homotopy-class invariant of one trajectory.
///
/// Equivalence is a pairwise, non-transitive relation: both components must
/// agree within a threshold. Class lists therefore keep a linear scan and
/// match new signatures against every stored member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HSignature(Complex64);

impl HSignature {
    /// The signature of an empty or obstacle-free path.
    pub fn zero() -> Self {
        Self(Complex64::new(0.0, 0.0))
    }

    pub fn value(&self) -> Complex64 {
        self.0
    }

    /// Whether two signatures identify the same homotopy class under the
    /// given threshold.
    pub fn is_equivalent(&self, other: &HSignature, threshold: f64) -> bool {
        (self.0.re - other.0.re).abs() <= threshold
            && (self.0.im - other.0.im).abs() <= threshold
    }
}

/// Compute the h-signature of a polyline with respect to an obstacle set.
///
/// Path vertices and obstacle centroids are mapped to the complex plane and
/// scaled by `prescaler` (0 < prescaler <= 1) to keep branch-weight
/// magnitudes stable. Fewer than two path points or an empty obstacle set
/// yield the zero signature. The accumulation is Kahan-compensated; paths
/// with many segments and obstacles would otherwise lose the sub-threshold
/// resolution the class comparison depends on.
pub fn compute_h_signature(
    points: impl IntoIterator<Item = Point2D>,
    obstacles: &[Box<dyn Obstacle>],
    prescaler: f64,
) -> HSignature {
    let path: Vec<Complex64> = points
        .into_iter()
        .map(|p| Complex64::new(p.x as f64 * prescaler, p.y as f64 * prescaler))
        .collect();
    if path.len() < 2 || obstacles.is_empty() {
        return HSignature::zero();
    }

    let centroids: Vec<Complex64> = obstacles
        .iter()
        .map(|o| {
            let c = o.centroid();
            Complex64::new(c.x as f64 * prescaler, c.y as f64 * prescaler)
        })
        .collect();

    let weights = branch_weights(&centroids, prescaler);

    let mut sum = Complex64::new(0.0, 0.0);
    let mut compensation = Complex64::new(0.0, 0.0);
    for segment in path.windows(2) {
        for (l, &centroid) in centroids.iter().enumerate() {
            let mut denominator = segment[0] - centroid;
            let mut numerator = segment[1] - centroid;
            if denominator.norm() < DEGENERATE_EPS {
                denominator += Complex64::new(DEGENERATE_EPS, DEGENERATE_EPS);
            }
            if numerator.norm() < DEGENERATE_EPS {
                numerator += Complex64::new(DEGENERATE_EPS, DEGENERATE_EPS);
            }

            let term = weights[l] * (numerator / denominator).ln();

            // Kahan-compensated accumulation
            let y = term - compensation;
            let t = sum + y;
            compensation = (t - sum) - y;
            sum = t;
        }
    }

    HSignature(sum)
}

/// Alternating partial-fraction weights `(-1)^l / prod_{k != l}(w_l - w_k)`
/// over the prescaled centroids.
fn branch_weights(centroids: &[Complex64], prescaler: f64) -> Vec<Complex64> {
    let merge_tolerance = OBSTACLE_MERGE_TOLERANCE * prescaler;
    centroids
        .iter()
        .enumerate()
        .map(|(l, &w_l)| {
            let mut weight = Complex64::new(if l % 2 == 0 { 1.0 } else { -1.0 }, 0.0);
            for (k, &w_k) in centroids.iter().enumerate() {
                if k == l {
                    continue;
                }
                let diff = w_l - w_k;
                if diff.norm() < merge_tolerance {
                    continue;
                }
                weight /= diff;
            }
            weight
        })
        .collect()
}
