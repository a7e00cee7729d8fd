//! Pool of trajectory candidates, one per live homotopy class.

use crate::config::PlannerConfig;
use crate::core::types::{Pose2D, Twist2D};
use crate::homotopy::h_signature::{HSignature, compute_h_signature};
use crate::obstacles::Obstacle;
use crate::trajectory::TebOptimizer;

/// Equivalence threshold for the in-pool duplicate filter. Deliberately
/// hard-coded and distinct from `hcp.h_signature_threshold`.
const DUPLICATE_SIGNATURE_THRESHOLD: f64 = 0.1;

/// Ordered container of trajectory candidates with their cached
/// h-signatures and the current best selection.
///
/// Invariants: the pool never exceeds `hcp.max_number_classes` entries
/// (enforced by the enumeration cutoff), after [`renew_and_analyze`] no two
/// stored signatures are equivalent under the configured threshold, and the
/// best selection is an index into the pool or absent.
///
/// [`renew_and_analyze`]: CandidatePool::renew_and_analyze
#[derive(Debug, Default)]
pub struct CandidatePool {
    candidates: Vec<TebOptimizer>,
    signatures: Vec<HSignature>,
    best_index: Option<usize>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn tebs(&self) -> &[TebOptimizer] {
        &self.candidates
    }

    pub fn tebs_mut(&mut self) -> &mut [TebOptimizer] {
        &mut self.candidates
    }

    pub fn signatures(&self) -> &[HSignature] {
        &self.signatures
    }

    /// The currently selected best candidate, if any.
    pub fn best(&self) -> Option<&TebOptimizer> {
        self.best_index.map(|i| &self.candidates[i])
    }

    /// Append a candidate spawned by the path enumerator.
    pub fn push(&mut self, candidate: TebOptimizer) {
        self.candidates.push(candidate);
    }

    /// Register a signature unless an equivalent one is already stored.
    ///
    /// The scan is linear on purpose: signature equivalence is not
    /// transitive, so the class list is defined by pairwise comparison
    /// against every live member, first match wins.
    pub fn register_if_novel(&mut self, signature: &HSignature, threshold: f64) -> bool {
        if self
            .signatures
            .iter()
            .any(|existing| existing.is_equivalent(signature, threshold))
        {
            return false;
        }
        self.signatures.push(*signature);
        true
    }

    /// Re-anchor every candidate to new boundary conditions.
    pub fn update_all(
        &mut self,
        start: Option<&Pose2D>,
        goal: Option<&Pose2D>,
        start_velocity: Option<Twist2D>,
        min_samples: usize,
    ) {
        for candidate in &mut self.candidates {
            candidate.band_mut().update_and_prune(start, goal, min_samples);
            if let Some(velocity) = start_velocity {
                candidate.set_start_velocity(velocity);
            }
        }
    }

    /// Reclassify all candidates at the start of a cycle.
    ///
    /// The signature list is reset first so that obstacle motion can
    /// legitimately reassign classes. Candidates are then filtered in a
    /// fixed order: detours (optional), degenerate candidates pinned to an
    /// obstacle, in-pool duplicates (keeping the cheaper one, using the
    /// previous cycle's optimization costs), and finally the surviving
    /// signatures are re-registered against the configured threshold.
    pub fn renew_and_analyze(
        &mut self,
        obstacles: &[Box<dyn Obstacle>],
        config: &PlannerConfig,
        delete_detours: bool,
    ) {
        self.best_index = None;
        self.signatures.clear();
        let detour_threshold = config.hcp.obstacle_heading_threshold.cos();

        let mut index = 0;
        while index < self.candidates.len() {
            if delete_detours
                && self.candidates.len() > 1
                && self.candidates[index]
                    .band()
                    .detect_detours_backwards(detour_threshold)
            {
                self.candidates.remove(index);
                continue;
            }

            let band = self.candidates[index].band();
            let degenerate = obstacles.iter().any(|obst| {
                let closest = band.find_closest_pose(obst.centroid());
                obst.minimum_distance(band.pose(closest).position())
                    < config.hcp.degenerate_obstacle_dist
            });
            if degenerate {
                log::debug!("renew_and_analyze: candidate pinned to an obstacle, erasing");
                self.candidates.remove(index);
                continue;
            }

            index += 1;
        }

        // collect signatures for the survivors before any duplicate
        // handling, so cost comparisons reflect the previous cycle
        let mut work: Vec<(TebOptimizer, HSignature)> = self
            .candidates
            .drain(..)
            .map(|candidate| {
                let signature = compute_h_signature(
                    candidate.band().positions(),
                    obstacles,
                    config.hcp.h_signature_prescaler,
                );
                (candidate, signature)
            })
            .collect();

        // duplicate classes: erase whichever candidate is more expensive
        let mut i = 0;
        while i < work.len() {
            let current = work[i].1;
            let duplicate = work.iter().enumerate().position(|(j, (_, signature))| {
                j != i && signature.is_equivalent(&current, DUPLICATE_SIGNATURE_THRESHOLD)
            });
            match duplicate {
                Some(j) => {
                    if work[j].0.cost_sum() > work[i].0.cost_sum() {
                        work.remove(j);
                        if j < i {
                            i -= 1;
                        }
                    } else {
                        work.remove(i);
                    }
                }
                None => i += 1,
            }
        }

        for (candidate, signature) in work {
            if self.register_if_novel(&signature, config.hcp.h_signature_threshold) {
                self.candidates.push(candidate);
            } else {
                // should not happen: duplicates were just filtered above
                log::error!(
                    "renew_and_analyze: duplicate h-signature survived filtering, dropping candidate"
                );
            }
        }
    }

    /// Select the candidate with the minimum summed cost.
    pub fn select_best(&mut self) -> Option<&TebOptimizer> {
        self.best_index = None;
        let mut min_cost = f32::INFINITY;
        for (i, candidate) in self.candidates.iter().enumerate() {
            let cost = candidate.cost_sum();
            if cost < min_cost {
                min_cost = cost;
                self.best_index = Some(i);
            }
        }
        self.best()
    }

    /// Erase every detour candidate, as long as at least one other remains.
    pub fn prune_detours(&mut self, threshold: f32) {
        let mut index = 0;
        while index < self.candidates.len() {
            if self.candidates.len() > 1
                && self.candidates[index]
                    .band()
                    .detect_detours_backwards(threshold)
            {
                self.candidates.remove(index);
                match self.best_index {
                    Some(best) if best == index => self.best_index = None,
                    Some(best) if best > index => self.best_index = Some(best - 1),
                    _ => {}
                }
                continue;
            }
            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Point2D;
    use crate::obstacles::{ObstacleSet, PointObstacle};
    use approx::assert_relative_eq;

    fn candidate_through(
        points: &[Point2D],
        config: &PlannerConfig,
    ) -> TebOptimizer {
        TebOptimizer::from_waypoints(points, 0.0, 0.0, config).unwrap()
    }

    fn upper_candidate(config: &PlannerConfig) -> TebOptimizer {
        candidate_through(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(5.0, 1.0),
                Point2D::new(10.0, 0.0),
            ],
            config,
        )
    }

    fn lower_candidate(config: &PlannerConfig) -> TebOptimizer {
        candidate_through(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(5.0, -1.0),
                Point2D::new(10.0, 0.0),
            ],
            config,
        )
    }

    #[test]
    fn test_register_if_novel_thresholds() {
        let mut pool = CandidatePool::new();
        let config = PlannerConfig::default();
        let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];

        let upper = compute_h_signature(
            upper_candidate(&config).band().positions(),
            &obstacles,
            config.hcp.h_signature_prescaler,
        );
        let lower = compute_h_signature(
            lower_candidate(&config).band().positions(),
            &obstacles,
            config.hcp.h_signature_prescaler,
        );

        assert!(pool.register_if_novel(&upper, 0.1));
        assert!(!pool.register_if_novel(&upper, 0.1));
        assert!(pool.register_if_novel(&lower, 0.1));
        assert_eq!(pool.signatures().len(), 2);
    }

    #[test]
    fn test_renew_keeps_distinct_classes() {
        let config = PlannerConfig::default();
        let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];
        let mut pool = CandidatePool::new();
        pool.push(upper_candidate(&config));
        pool.push(lower_candidate(&config));

        pool.renew_and_analyze(&obstacles, &config, false);

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.signatures().len(), 2);
        assert!(!pool.signatures()[0].is_equivalent(&pool.signatures()[1], 0.1));
    }

    #[test]
    fn test_renew_dedups_same_class_keeping_cheaper() {
        let config = PlannerConfig::default();
        let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];

        // two candidates in the same class; the detour is more expensive
        let mut short = upper_candidate(&config);
        let mut long = candidate_through(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(3.0, 3.0),
                Point2D::new(7.0, 3.0),
                Point2D::new(10.0, 0.0),
            ],
            &config,
        );
        short
            .optimize(5, 4, true, &obstacles, &config)
            .unwrap();
        long.optimize(5, 4, true, &obstacles, &config).unwrap();
        assert!(long.cost_sum() > short.cost_sum());
        let short_length = short.band().length();

        let mut pool = CandidatePool::new();
        pool.push(long);
        pool.push(short);
        pool.renew_and_analyze(&obstacles, &config, false);

        assert_eq!(pool.len(), 1);
        assert_relative_eq!(pool.tebs()[0].band().length(), short_length);
    }

    #[test]
    fn test_renew_erases_degenerate_candidate() {
        let config = PlannerConfig::default();
        // candidate running straight through the obstacle position
        let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];
        let mut pool = CandidatePool::new();
        pool.push(candidate_through(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(5.0, 0.0),
                Point2D::new(10.0, 0.0),
            ],
            &config,
        ));

        pool.renew_and_analyze(&obstacles, &config, false);

        assert!(pool.is_empty());
    }

    #[test]
    fn test_select_best_prefers_lower_cost() {
        let config = PlannerConfig::default();
        let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];
        let mut upper = upper_candidate(&config);
        let mut lower = candidate_through(
            &[
                Point2D::new(0.0, 0.0),
                Point2D::new(3.0, -3.0),
                Point2D::new(7.0, -3.0),
                Point2D::new(10.0, 0.0),
            ],
            &config,
        );
        upper.optimize(5, 4, true, &obstacles, &config).unwrap();
        lower.optimize(5, 4, true, &obstacles, &config).unwrap();

        let mut pool = CandidatePool::new();
        pool.push(upper);
        pool.push(lower);
        let best_cost = pool.select_best().unwrap().cost_sum();

        assert!(pool.best().is_some());
        for candidate in pool.tebs() {
            assert!(best_cost <= candidate.cost_sum());
        }
    }

    #[test]
    fn test_select_best_empty_pool() {
        let mut pool = CandidatePool::new();
        assert!(pool.select_best().is_none());
        assert!(pool.best().is_none());
    }

    #[test]
    fn test_prune_detours_keeps_last_candidate() {
        let config = PlannerConfig::default();
        let mut pool = CandidatePool::new();
        // band heading against its start-goal direction everywhere
        let mut backwards = candidate_through(
            &[Point2D::new(0.0, 0.0), Point2D::new(5.0, 0.0)],
            &config,
        );
        backwards.band_mut().pose_mut(0).theta = std::f32::consts::PI;
        backwards.band_mut().pose_mut(1).theta = std::f32::consts::PI;
        pool.push(backwards);

        pool.prune_detours(0.0);
        // a lone candidate survives even as a detour
        assert_eq!(pool.len(), 1);

        pool.push(candidate_through(
            &[Point2D::new(0.0, 0.0), Point2D::new(5.0, 0.0)],
            &config,
        ));
        pool.prune_detours(0.0);
        assert_eq!(pool.len(), 1);
        assert!(!pool.tebs()[0].band().detect_detours_backwards(0.0));
    }

    #[test]
    fn test_prune_detours_remaps_best_index() {
        let config = PlannerConfig::default();
        let obstacles = ObstacleSet::new();
        let mut detour = candidate_through(
            &[Point2D::new(0.0, 0.0), Point2D::new(5.0, 0.0)],
            &config,
        );
        detour.band_mut().pose_mut(0).theta = std::f32::consts::PI;
        let mut good = candidate_through(
            &[Point2D::new(0.0, 0.0), Point2D::new(5.0, 0.0)],
            &config,
        );
        good.optimize(5, 4, true, &obstacles, &config).unwrap();

        let mut pool = CandidatePool::new();
        pool.push(detour);
        pool.push(good);
        pool.select_best();
        pool.prune_detours(0.0);

        // the surviving best still refers to a pool member
        let best = pool.best().unwrap();
        assert!(best.cost_sum().is_finite());
    }
}
