//! Penalty-gradient optimizer for a single trajectory candidate.

use crate::config::PlannerConfig;
use crate::core::math::angle_diff;
use crate::core::types::{Point2D, Twist2D};
use crate::error::{PlannerError, Result};
use crate::obstacles::Obstacle;
use crate::trajectory::band::TimedElasticBand;

/// Step size of the elastic contraction toward the neighbor midpoint.
const SMOOTHING_STEP: f32 = 0.4;
/// Step size of the obstacle repulsion.
const REPULSION_STEP: f32 = 0.5;
/// Step size of the start-velocity bias on the first interior pose.
const VELOCITY_BIAS_STEP: f32 = 0.2;

/// One trajectory candidate: an elastic band plus its cached cost.
///
/// Each candidate is owned by exactly one pool slot and mutated only through
/// the pool (boundary updates) and [`optimize`](TebOptimizer::optimize).
/// Optimization of different candidates is independent, so the driver may
/// fan candidates out onto worker threads.
#[derive(Debug, Clone)]
pub struct TebOptimizer {
    band: TimedElasticBand,
    start_velocity: Option<Twist2D>,
    cost: Option<Vec<f32>>,
}

impl TebOptimizer {
    /// Create a candidate from a waypoint polyline with anchored boundary
    /// orientations.
    pub fn from_waypoints(
        waypoints: &[Point2D],
        start_theta: f32,
        goal_theta: f32,
        config: &PlannerConfig,
    ) -> Result<Self> {
        let band = TimedElasticBand::from_waypoints(
            waypoints,
            start_theta,
            goal_theta,
            config.trajectory.max_vel_x,
        )?;
        Ok(Self {
            band,
            start_velocity: None,
            cost: None,
        })
    }

    /// Wrap an existing band (used by tests and band replacements).
    pub fn from_band(band: TimedElasticBand) -> Self {
        Self {
            band,
            start_velocity: None,
            cost: None,
        }
    }

    pub fn band(&self) -> &TimedElasticBand {
        &self.band
    }

    pub fn band_mut(&mut self) -> &mut TimedElasticBand {
        &mut self.band
    }

    /// Set the velocity the robot currently has at the band start.
    pub fn set_start_velocity(&mut self, velocity: Twist2D) {
        self.start_velocity = Some(velocity);
    }

    /// Deform the band for `outer_iterations` resize/deform cycles with
    /// `inner_iterations` gradient steps each.
    ///
    /// On error the cached cost is cleared, which makes the candidate
    /// compare as infinitely expensive in [`cost_sum`](TebOptimizer::cost_sum).
    pub fn optimize(
        &mut self,
        inner_iterations: usize,
        outer_iterations: usize,
        compute_cost: bool,
        obstacles: &[Box<dyn Obstacle>],
        config: &PlannerConfig,
    ) -> Result<()> {
        self.cost = None;
        if self.band.len() < 2 {
            return Err(PlannerError::Optimization(
                "band has fewer than two poses".into(),
            ));
        }

        let t = &config.trajectory;
        for _ in 0..outer_iterations {
            self.band
                .autoresize(t.dt_ref, t.dt_hysteresis, t.min_samples, t.max_samples);
            for _ in 0..inner_iterations {
                self.deform_step(obstacles, config);
            }
            self.band.rebuild_timing(t.max_vel_x);
        }

        if compute_cost {
            self.cost = Some(self.compute_cost(obstacles, config));
        }
        Ok(())
    }

    /// Cached cost components from the last optimization, if any.
    pub fn current_cost(&self) -> Option<&[f32]> {
        self.cost.as_deref()
    }

    /// Summed cost; infinite when no cost has been computed yet or the last
    /// optimization failed.
    pub fn cost_sum(&self) -> f32 {
        match &self.cost {
            Some(components) => components.iter().sum(),
            None => f32::INFINITY,
        }
    }

    /// First control action of the band.
    pub fn velocity_command(&self) -> Twist2D {
        if self.band.len() < 2 {
            return Twist2D::zero();
        }
        let p0 = self.band.pose(0);
        let p1 = self.band.pose(1);
        let dt = self.band.time_diff(0).max(1e-3);
        let dp = p1.position() - p0.position();
        let sign = if dp.dot(p0.heading_vector()) >= 0.0 {
            1.0
        } else {
            -1.0
        };
        Twist2D::new(sign * dp.norm() / dt, angle_diff(p0.theta, p1.theta) / dt)
    }

    /// One Jacobi-style deformation step over all interior poses.
    fn deform_step(&mut self, obstacles: &[Box<dyn Obstacle>], config: &PlannerConfig) {
        let n = self.band.len();
        if n < 3 {
            return;
        }
        let min_dist = config.obstacles.min_obstacle_dist;

        let mut updates: Vec<Point2D> = Vec::with_capacity(n - 2);
        for i in 1..n - 1 {
            let p = self.band.pose(i).position();
            let prev = self.band.pose(i - 1).position();
            let next = self.band.pose(i + 1).position();

            let mut force = ((prev + next) * 0.5 - p) * SMOOTHING_STEP;

            for obst in obstacles {
                let d = obst.minimum_distance(p);
                if d < min_dist {
                    let away = p - obst.centroid();
                    let dir = away
                        .normalized()
                        .or_else(|| (next - prev).perpendicular().normalized());
                    if let Some(dir) = dir {
                        force = force + dir * ((min_dist - d) * REPULSION_STEP);
                    }
                }
            }

            if i == 1 {
                if let Some(vel) = self.start_velocity {
                    let p0 = self.band.pose(0);
                    let dt = self.band.time_diff(0);
                    let target = p0.position() + p0.heading_vector() * (vel.linear * dt);
                    force = force + (target - p) * VELOCITY_BIAS_STEP;
                }
            }

            updates.push(p + force);
        }

        for (k, i) in (1..n - 1).enumerate() {
            let pose = self.band.pose_mut(i);
            pose.x = updates[k].x;
            pose.y = updates[k].y;
        }

        // re-derive interior orientations from the deformed path
        for i in 1..n - 1 {
            let dir = self.band.pose(i + 1).position() - self.band.pose(i - 1).position();
            if let Some(dir) = dir.normalized() {
                self.band.pose_mut(i).theta = dir.y.atan2(dir.x);
            }
        }
    }

    /// Cost vector: weighted transition time, path length, weighted
    /// obstacle penalty.
    fn compute_cost(&self, obstacles: &[Box<dyn Obstacle>], config: &PlannerConfig) -> Vec<f32> {
        let time_cost = config.optim.weight_optimaltime * self.band.sum_time();
        let path_cost = self.band.length();

        let min_dist = config.obstacles.min_obstacle_dist;
        let mut obstacle_cost = 0.0;
        for i in 0..self.band.len() {
            let p = self.band.pose(i).position();
            for obst in obstacles {
                let d = obst.minimum_distance(p);
                if d < min_dist {
                    let violation = min_dist - d;
                    obstacle_cost += violation * violation;
                }
            }
        }

        vec![
            time_cost,
            path_cost,
            config.optim.weight_obstacle * obstacle_cost,
        ]
    }
}
