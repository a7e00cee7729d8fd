//! Timed elastic band: a discrete trajectory of poses with time differences.

use crate::core::math::angle_lerp;
use crate::core::types::{Point2D, Pose2D};
use crate::error::{PlannerError, Result};

/// Floor for a single time difference, keeps velocity extraction finite.
const MIN_TIME_DIFF: f32 = 0.01;

/// A time-parameterized discrete trajectory.
///
/// The band holds `n` poses and `n - 1` time differences; `time_diffs[i]`
/// is the transition time from pose `i` to pose `i + 1`. The band is
/// deformed in place by [`TebOptimizer`](crate::trajectory::TebOptimizer)
/// and re-anchored each planning cycle via [`update_and_prune`].
///
/// [`update_and_prune`]: TimedElasticBand::update_and_prune
#[derive(Debug, Clone)]
pub struct TimedElasticBand {
    poses: Vec<Pose2D>,
    time_diffs: Vec<f32>,
}

impl TimedElasticBand {
    /// Initialize a band along a waypoint polyline.
    ///
    /// Interior orientations follow the direction of travel; the first and
    /// last orientations are anchored to the given boundary headings. Time
    /// differences assume constant travel at `max_vel`.
    pub fn from_waypoints(
        waypoints: &[Point2D],
        start_theta: f32,
        goal_theta: f32,
        max_vel: f32,
    ) -> Result<Self> {
        if waypoints.len() < 2 {
            return Err(PlannerError::Trajectory(
                "band initialization requires at least two waypoints".into(),
            ));
        }
        if max_vel <= 0.0 {
            return Err(PlannerError::Trajectory(
                "band initialization requires a positive velocity".into(),
            ));
        }

        let n = waypoints.len();
        let mut poses = Vec::with_capacity(n);
        for (i, &p) in waypoints.iter().enumerate() {
            let theta = if i == 0 {
                start_theta
            } else if i == n - 1 {
                goal_theta
            } else {
                let dir = waypoints[i + 1] - p;
                dir.y.atan2(dir.x)
            };
            poses.push(Pose2D::new(p.x, p.y, theta));
        }

        let time_diffs = waypoints
            .windows(2)
            .map(|w| (w[0].distance(w[1]) / max_vel).max(MIN_TIME_DIFF))
            .collect();

        Ok(Self { poses, time_diffs })
    }

    /// Number of poses.
    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn pose(&self, index: usize) -> &Pose2D {
        &self.poses[index]
    }

    pub fn pose_mut(&mut self, index: usize) -> &mut Pose2D {
        &mut self.poses[index]
    }

    pub fn time_diff(&self, index: usize) -> f32 {
        self.time_diffs[index]
    }

    /// Positions of all poses in order.
    pub fn positions(&self) -> impl Iterator<Item = Point2D> + '_ {
        self.poses.iter().map(|p| p.position())
    }

    /// Total transition time of the band.
    pub fn sum_time(&self) -> f32 {
        self.time_diffs.iter().sum()
    }

    /// Total Euclidean path length of the band.
    pub fn length(&self) -> f32 {
        self.poses
            .windows(2)
            .map(|w| w[0].position().distance(w[1].position()))
            .sum()
    }

    /// Index of the pose closest to `point`.
    pub fn find_closest_pose(&self, point: Point2D) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (i, pose) in self.poses.iter().enumerate() {
            let d = pose.position().distance(point);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        best
    }

    /// Detect whether any pose faces backwards with respect to the overall
    /// start-goal direction.
    ///
    /// A pose counts as backwards when the dot product of its heading with
    /// the normalized start-goal direction falls below `threshold`.
    pub fn detect_detours_backwards(&self, threshold: f32) -> bool {
        if self.poses.len() < 2 {
            return false;
        }
        let first = self.poses[0].position();
        let last = self.poses[self.poses.len() - 1].position();
        let Some(dir) = (last - first).normalized() else {
            return false;
        };
        self.poses
            .iter()
            .any(|pose| pose.heading_vector().dot(dir) < threshold)
    }

    /// Re-anchor the band to new boundary conditions.
    ///
    /// Poses the robot has already passed are pruned: the closest pose to
    /// the new start is searched within a bounded lookahead (stopping at the
    /// first non-improving sample, at most 10, never shrinking the band
    /// below `min_samples`), preceding poses are dropped and the first pose
    /// is overwritten with the new start. The last pose is overwritten with
    /// the new goal.
    pub fn update_and_prune(
        &mut self,
        new_start: Option<&Pose2D>,
        new_goal: Option<&Pose2D>,
        min_samples: usize,
    ) {
        if let Some(start) = new_start {
            if !self.poses.is_empty() {
                let lookahead = self.poses.len().saturating_sub(min_samples.max(2)).min(10);
                let mut best_dist = start.position().distance(self.poses[0].position());
                let mut nearest = 0;
                for i in 1..=lookahead {
                    let d = start.position().distance(self.poses[i].position());
                    if d < best_dist {
                        best_dist = d;
                        nearest = i;
                    } else {
                        break;
                    }
                }
                if nearest > 0 {
                    self.poses.drain(1..=nearest);
                    self.time_diffs.drain(1..=nearest.min(self.time_diffs.len() - 1));
                }
                self.poses[0] = *start;
            }
        }

        if let Some(goal) = new_goal {
            if let Some(last) = self.poses.last_mut() {
                *last = *goal;
            }
        }
    }

    /// Adjust the band resolution toward `dt_ref`.
    ///
    /// Segments slower than `dt_ref + dt_hysteresis` are split at their
    /// midpoint; segments faster than `dt_ref - dt_hysteresis` are merged
    /// into their successor. Bounded by `min_samples`/`max_samples`.
    pub fn autoresize(
        &mut self,
        dt_ref: f32,
        dt_hysteresis: f32,
        min_samples: usize,
        max_samples: usize,
    ) {
        for _ in 0..100 {
            let mut changed = false;
            let mut i = 0;
            while i < self.time_diffs.len() {
                let dt = self.time_diffs[i];
                if dt > dt_ref + dt_hysteresis && self.poses.len() < max_samples {
                    let a = self.poses[i];
                    let b = self.poses[i + 1];
                    let mid = Pose2D::new(
                        0.5 * (a.x + b.x),
                        0.5 * (a.y + b.y),
                        angle_lerp(a.theta, b.theta, 0.5),
                    );
                    self.poses.insert(i + 1, mid);
                    self.time_diffs[i] = 0.5 * dt;
                    self.time_diffs.insert(i + 1, 0.5 * dt);
                    changed = true;
                } else if dt < dt_ref - dt_hysteresis
                    && self.poses.len() > min_samples
                    && i + 1 < self.time_diffs.len()
                {
                    self.time_diffs[i + 1] += dt;
                    self.time_diffs.remove(i);
                    self.poses.remove(i + 1);
                    changed = true;
                }
                i += 1;
            }
            if !changed {
                break;
            }
        }
    }

    /// Recompute time differences from the current pose spacing.
    pub fn rebuild_timing(&mut self, max_vel: f32) {
        if max_vel <= 0.0 {
            return;
        }
        self.time_diffs = self
            .poses
            .windows(2)
            .map(|w| (w[0].position().distance(w[1].position()) / max_vel).max(MIN_TIME_DIFF))
            .collect();
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn straight_band() -> TimedElasticBand {
        let waypoints = [
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(3.0, 0.0),
        ];
        TimedElasticBand::from_waypoints(&waypoints, 0.0, 0.0, 0.5).unwrap()
    }

    #[test]
    fn test_from_waypoints_orientations() {
        let waypoints = [
            Point2D::new(0.0, 0.0),
            Point2D::new(1.0, 0.0),
            Point2D::new(1.0, 1.0),
        ];
        let band = TimedElasticBand::from_waypoints(&waypoints, 0.3, 1.0, 0.5).unwrap();

        assert_eq!(band.len(), 3);
        assert_relative_eq!(band.pose(0).theta, 0.3);
        // interior pose points toward the next waypoint (straight up)
        assert_relative_eq!(band.pose(1).theta, FRAC_PI_2, epsilon = 1e-6);
        assert_relative_eq!(band.pose(2).theta, 1.0);
    }

    #[test]
    fn test_from_waypoints_rejects_short_input() {
        assert!(TimedElasticBand::from_waypoints(&[Point2D::new(0.0, 0.0)], 0.0, 0.0, 0.5).is_err());
    }

    #[test]
    fn test_timing_follows_distance() {
        let band = straight_band();
        assert_relative_eq!(band.sum_time(), 6.0, epsilon = 1e-5);
        assert_relative_eq!(band.length(), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_find_closest_pose() {
        let band = straight_band();
        assert_eq!(band.find_closest_pose(Point2D::new(2.1, 0.5)), 2);
        assert_eq!(band.find_closest_pose(Point2D::new(-5.0, 0.0)), 0);
    }

    #[test]
    fn test_detect_detours_backwards() {
        let mut band = straight_band();
        assert!(!band.detect_detours_backwards(0.0));

        // turn one pose around
        band.pose_mut(1).theta = std::f32::consts::PI;
        assert!(band.detect_detours_backwards(0.0));
    }

    #[test]
    fn test_update_and_prune_drops_passed_poses() {
        let mut band = straight_band();
        let new_start = Pose2D::new(1.1, 0.0, 0.0);
        let new_goal = Pose2D::new(3.5, 0.0, 0.0);

        band.update_and_prune(Some(&new_start), Some(&new_goal), 2);

        // pose 1 was closest to the new start, so one pose was pruned
        assert_eq!(band.len(), 3);
        assert_relative_eq!(band.pose(0).x, 1.1);
        assert_relative_eq!(band.pose(band.len() - 1).x, 3.5);
        assert_eq!(band.time_diffs.len(), band.len() - 1);
    }

    #[test]
    fn test_autoresize_splits_coarse_segments() {
        let waypoints = [Point2D::new(0.0, 0.0), Point2D::new(4.0, 0.0)];
        let mut band = TimedElasticBand::from_waypoints(&waypoints, 0.0, 0.0, 0.5).unwrap();
        assert_eq!(band.len(), 2);

        band.autoresize(0.3, 0.1, 3, 100);

        assert!(band.len() > 2);
        assert!(band.len() <= 100);
        for i in 0..band.len() - 1 {
            assert!(band.time_diff(i) <= 0.4 + 1e-4);
        }
        // total time is preserved by splitting
        assert_relative_eq!(band.sum_time(), 8.0, epsilon = 1e-3);
    }

    #[test]
    fn test_autoresize_respects_max_samples() {
        let waypoints = [Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0)];
        let mut band = TimedElasticBand::from_waypoints(&waypoints, 0.0, 0.0, 0.1).unwrap();
        band.autoresize(0.3, 0.1, 3, 20);
        assert!(band.len() <= 20);
    }
}
