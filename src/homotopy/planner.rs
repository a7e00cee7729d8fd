//! Planning orchestrator: one homotopy-aware local planning cycle.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::PlannerConfig;
use crate::core::types::{Point2D, Pose2D, Twist2D};
use crate::error::{PlannerError, Result};
use crate::homotopy::exploration::explore_paths;
use crate::homotopy::graph::{self, ExplorationGraph};
use crate::homotopy::pool::CandidatePool;
use crate::obstacles::Obstacle;
use crate::trajectory::TebOptimizer;
use crate::visualization::Visualization;

/// Collision model of the navigation stack's costmap.
pub trait CostmapModel {
    /// Cost of placing the footprint at the given pose; negative means the
    /// footprint is in collision.
    fn footprint_cost(
        &self,
        x: f32,
        y: f32,
        theta: f32,
        footprint: &[Point2D],
        inscribed_radius: f32,
        circumscribed_radius: f32,
    ) -> f32;
}

/// Local planner maintaining one optimized trajectory per homotopy class.
///
/// Per [`plan`](HomotopyClassPlanner::plan) call the planner re-anchors the
/// surviving candidates, reclassifies and filters them, explores the
/// workspace for classes it does not cover yet, optimizes every candidate
/// (in parallel when configured) and elects the cheapest one. The pool is
/// the only state carried across cycles; the exploration graph is rebuilt
/// from scratch every time.
pub struct HomotopyClassPlanner {
    config: PlannerConfig,
    pool: CandidatePool,
    graph: ExplorationGraph,
    rng: StdRng,
    running: Arc<AtomicBool>,
    visualization: Option<Box<dyn Visualization>>,
}

impl HomotopyClassPlanner {
    /// Create a planner from its configuration.
    pub fn new(config: PlannerConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Create a planner with a fixed roadmap-sampling seed.
    pub fn with_seed(config: PlannerConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: PlannerConfig, rng: StdRng) -> Self {
        Self {
            config,
            pool: CandidatePool::new(),
            graph: ExplorationGraph::new(),
            rng,
            running: Arc::new(AtomicBool::new(true)),
            visualization: None,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    /// The exploration graph of the most recent cycle.
    pub fn graph(&self) -> &ExplorationGraph {
        &self.graph
    }

    /// Register a visualization sink.
    pub fn set_visualization(&mut self, visualization: Box<dyn Visualization>) {
        self.visualization = Some(visualization);
    }

    /// Shared flag polled by the roadmap sampler; clear it to cancel.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run one planning cycle.
    ///
    /// A start within the goal tolerance of the goal is not an error: the
    /// cycle succeeds with an empty pool and a zero velocity command.
    pub fn plan(
        &mut self,
        start: &Pose2D,
        goal: &Pose2D,
        start_velocity: Option<Twist2D>,
        obstacles: &[Box<dyn Obstacle>],
    ) -> Result<()> {
        self.pool.update_all(
            Some(start),
            Some(goal),
            start_velocity,
            self.config.trajectory.min_samples,
        );
        self.pool.renew_and_analyze(obstacles, &self.config, false);
        self.explore_and_init(start, goal, obstacles);
        self.optimize_all(obstacles);
        self.pool.select_best();
        self.pool.prune_detours(0.0);
        Ok(())
    }

    /// Run one planning cycle on a waypoint plan, consuming only its first
    /// pose (start) and last pose (goal).
    pub fn plan_waypoints(
        &mut self,
        waypoints: &[Pose2D],
        start_velocity: Option<Twist2D>,
        obstacles: &[Box<dyn Obstacle>],
    ) -> Result<()> {
        let (Some(first), Some(last)) = (waypoints.first(), waypoints.last()) else {
            return Err(PlannerError::InvalidInput(
                "waypoint plan must contain at least one pose".into(),
            ));
        };
        let (first, last) = (*first, *last);
        self.plan(&first, &last, start_velocity, obstacles)
    }

    /// The best candidate of the last cycle, if one exists.
    pub fn best(&self) -> Option<&TebOptimizer> {
        self.pool.best()
    }

    /// First control action of the best candidate, or zero when no feasible
    /// class exists.
    pub fn velocity_command(&self) -> Twist2D {
        self.pool
            .best()
            .map(|candidate| candidate.velocity_command())
            .unwrap_or_else(Twist2D::zero)
    }

    /// Check the first poses of the best candidate against the costmap.
    ///
    /// `look_ahead` is clamped into the pose range; a negative value checks
    /// the whole band. Returns `false` when no best candidate exists.
    pub fn is_trajectory_feasible(
        &self,
        costmap: &dyn CostmapModel,
        footprint: &[Point2D],
        inscribed_radius: f32,
        circumscribed_radius: f32,
        look_ahead: i32,
    ) -> bool {
        let Some(best) = self.pool.best() else {
            return false;
        };
        let band = best.band();
        let last = band.len() as i32 - 1;
        let look_ahead = if look_ahead < 0 || look_ahead > last {
            last
        } else {
            look_ahead
        };
        for i in 0..=look_ahead as usize {
            let pose = band.pose(i);
            if costmap.footprint_cost(
                pose.x,
                pose.y,
                pose.theta,
                footprint,
                inscribed_radius,
                circumscribed_radius,
            ) < 0.0
            {
                return false;
            }
        }
        true
    }

    /// Publish the current cycle to the registered visualization sink.
    pub fn visualize(&self) {
        let Some(sink) = self.visualization.as_deref() else {
            log::debug!("visualize: no visualization sink registered");
            return;
        };
        if self.config.hcp.visualize_hc_graph {
            sink.publish_graph(&self.graph);
        }
        sink.publish_candidates(self.pool.tebs());
        if let Some(best) = self.pool.best() {
            sink.publish_best(best.band());
        }
    }

    /// Build this cycle's exploration graph and spawn candidates for newly
    /// discovered classes.
    fn explore_and_init(
        &mut self,
        start: &Pose2D,
        goal: &Pose2D,
        obstacles: &[Box<dyn Obstacle>],
    ) {
        self.graph.clear();
        let build = if self.config.hcp.simple_exploration {
            graph::build_keypoint_graph(start, goal, obstacles, &self.config)
        } else {
            graph::build_roadmap_graph(
                start,
                goal,
                obstacles,
                &self.config,
                &mut self.rng,
                &self.running,
            )
        };
        let Some(build) = build else {
            log::debug!("explore_and_init: no exploration graph this cycle");
            return;
        };
        explore_paths(
            &build,
            start.theta,
            goal.theta,
            obstacles,
            &self.config,
            &mut self.pool,
        );
        self.graph = build.graph;
    }

    /// Optimize every candidate exactly once.
    ///
    /// With multithreading enabled each candidate gets its own worker;
    /// failures are surfaced after all workers joined, and failed
    /// candidates keep an infinite cost.
    fn optimize_all(&mut self, obstacles: &[Box<dyn Obstacle>]) {
        let inner = self.config.optim.no_inner_iterations;
        let outer = self.config.optim.no_outer_iterations;
        let config = &self.config;

        let results: Vec<Result<()>> = if config.hcp.enable_multithreading {
            thread::scope(|scope| {
                let workers: Vec<_> = self
                    .pool
                    .tebs_mut()
                    .iter_mut()
                    .map(|candidate| {
                        scope.spawn(move || candidate.optimize(inner, outer, true, obstacles, config))
                    })
                    .collect();
                workers
                    .into_iter()
                    .map(|worker| {
                        worker.join().unwrap_or_else(|_| {
                            Err(PlannerError::Optimization("optimizer worker panicked".into()))
                        })
                    })
                    .collect()
            })
        } else {
            self.pool
                .tebs_mut()
                .iter_mut()
                .map(|candidate| candidate.optimize(inner, outer, true, obstacles, config))
                .collect()
        };

        if let Some(error) = results.into_iter().find_map(|r| r.err()) {
            log::warn!("optimize_all: {error}; affected candidates kept with infinite cost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacles::{ObstacleSet, PointObstacle};

    fn simple_config() -> PlannerConfig {
        let mut config = PlannerConfig::default();
        config.hcp.simple_exploration = true;
        config
    }

    #[test]
    fn test_corridor_plan_selects_single_candidate() {
        let mut planner = HomotopyClassPlanner::new(simple_config());
        let obstacles = ObstacleSet::new();

        planner
            .plan(
                &Pose2D::new(0.0, 0.0, 0.0),
                &Pose2D::new(10.0, 0.0, 0.0),
                None,
                &obstacles,
            )
            .unwrap();

        assert_eq!(planner.graph().vertex_count(), 2);
        assert_eq!(planner.graph().edge_count(), 1);
        assert_eq!(planner.pool().len(), 1);
        assert!(planner.best().is_some());
        assert!(planner.velocity_command().linear > 0.0);
    }

    #[test]
    fn test_sequential_and_parallel_agree_on_pool_size() {
        let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];
        let start = Pose2D::new(0.0, 0.0, 0.0);
        let goal = Pose2D::new(10.0, 0.0, 0.0);

        let mut parallel_config = simple_config();
        parallel_config.hcp.enable_multithreading = true;
        let mut sequential_config = simple_config();
        sequential_config.hcp.enable_multithreading = false;

        let mut parallel = HomotopyClassPlanner::new(parallel_config);
        let mut sequential = HomotopyClassPlanner::new(sequential_config);
        parallel.plan(&start, &goal, None, &obstacles).unwrap();
        sequential.plan(&start, &goal, None, &obstacles).unwrap();

        assert_eq!(parallel.pool().len(), 2);
        assert_eq!(sequential.pool().len(), 2);
        for candidate in parallel.pool().tebs() {
            assert!(candidate.cost_sum().is_finite());
        }
    }

    #[test]
    fn test_empty_input_plan_is_success_with_zero_command() {
        let mut planner = HomotopyClassPlanner::new(simple_config());
        let obstacles = ObstacleSet::new();

        planner
            .plan(
                &Pose2D::new(0.0, 0.0, 0.0),
                &Pose2D::new(0.01, 0.0, 0.0),
                None,
                &obstacles,
            )
            .unwrap();

        assert!(planner.graph().is_empty());
        assert!(planner.pool().is_empty());
        assert_eq!(planner.velocity_command(), Twist2D::zero());
    }

    #[test]
    fn test_plan_waypoints_uses_first_and_last() {
        let mut planner = HomotopyClassPlanner::new(simple_config());
        let obstacles = ObstacleSet::new();
        let waypoints = [
            Pose2D::new(0.0, 0.0, 0.0),
            Pose2D::new(3.0, 5.0, 0.2),
            Pose2D::new(10.0, 0.0, 0.0),
        ];

        planner.plan_waypoints(&waypoints, None, &obstacles).unwrap();

        assert_eq!(planner.pool().len(), 1);
        let band = planner.best().unwrap().band();
        assert_eq!(band.pose(0).position(), waypoints[0].position());
        assert_eq!(
            band.pose(band.len() - 1).position(),
            waypoints[2].position()
        );
    }

    #[test]
    fn test_plan_waypoints_rejects_empty_plan() {
        let mut planner = HomotopyClassPlanner::new(simple_config());
        assert!(planner
            .plan_waypoints(&[], None, &ObstacleSet::new())
            .is_err());
    }
}
