//! Depth-first enumeration of simple start-goal paths.
//!
//! Each simple path found in the exploration graph is classified by its
//! h-signature; paths landing in a class the pool does not know yet spawn a
//! new trajectory candidate. Enumeration stops as soon as the pool holds
//! the configured maximum number of classes.

use crate::config::PlannerConfig;
use crate::core::types::Point2D;
use crate::homotopy::graph::GraphBuild;
use crate::homotopy::h_signature::compute_h_signature;
use crate::homotopy::pool::CandidatePool;
use crate::obstacles::Obstacle;
use crate::trajectory::TebOptimizer;

/// Equivalence threshold for registering classes found during enumeration.
/// Intentionally distinct from `hcp.h_signature_threshold`, which governs
/// the long-term lookup list.
const NEW_CLASS_SIGNATURE_THRESHOLD: f64 = 0.1;

/// Enumerate simple paths from the build's start vertex and spawn one
/// candidate per newly discovered homotopy class.
pub fn explore_paths(
    build: &GraphBuild,
    start_theta: f32,
    goal_theta: f32,
    obstacles: &[Box<dyn Obstacle>],
    config: &PlannerConfig,
    pool: &mut CandidatePool,
) {
    let mut visited = vec![build.start];
    depth_first(
        build,
        &mut visited,
        start_theta,
        goal_theta,
        obstacles,
        config,
        pool,
    );
}

fn depth_first(
    build: &GraphBuild,
    visited: &mut Vec<usize>,
    start_theta: f32,
    goal_theta: f32,
    obstacles: &[Box<dyn Obstacle>],
    config: &PlannerConfig,
    pool: &mut CandidatePool,
) {
    // no need to search for further alternatives once the pool is full
    if pool.len() >= config.hcp.max_number_classes {
        return;
    }
    let Some(&back) = visited.last() else {
        return;
    };

    // first phase: a single goal hit represents all classes routed through
    // this node, so stop after the first goal-reaching neighbor
    for &neighbor in build.graph.out_neighbors(back) {
        if visited.contains(&neighbor) {
            continue;
        }
        if neighbor == build.goal {
            visited.push(neighbor);

            let signature = compute_h_signature(
                visited.iter().map(|&v| build.graph.position(v)),
                obstacles,
                config.hcp.h_signature_prescaler,
            );
            if pool.register_if_novel(&signature, NEW_CLASS_SIGNATURE_THRESHOLD) {
                let waypoints: Vec<Point2D> =
                    visited.iter().map(|&v| build.graph.position(v)).collect();
                match TebOptimizer::from_waypoints(&waypoints, start_theta, goal_theta, config) {
                    Ok(candidate) => pool.push(candidate),
                    Err(e) => {
                        log::warn!("explore_paths: failed to initialize new candidate: {e}")
                    }
                }
            }

            visited.pop();
            break;
        }
    }

    // second phase: descend into the remaining neighbors
    for &neighbor in build.graph.out_neighbors(back) {
        if visited.contains(&neighbor) || neighbor == build.goal {
            continue;
        }
        visited.push(neighbor);
        depth_first(
            build,
            visited,
            start_theta,
            goal_theta,
            obstacles,
            config,
            pool,
        );
        visited.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Pose2D;
    use crate::homotopy::graph::build_keypoint_graph;
    use crate::obstacles::{ObstacleSet, PointObstacle};

    fn explore_world(obstacles: &ObstacleSet, config: &PlannerConfig) -> CandidatePool {
        let start = Pose2D::new(0.0, 0.0, 0.0);
        let goal = Pose2D::new(10.0, 0.0, 0.0);
        let build = build_keypoint_graph(&start, &goal, obstacles, config).unwrap();
        let mut pool = CandidatePool::new();
        explore_paths(&build, start.theta, goal.theta, obstacles, config, &mut pool);
        pool
    }

    #[test]
    fn test_free_corridor_yields_one_candidate() {
        let config = PlannerConfig::default();
        let pool = explore_world(&ObstacleSet::new(), &config);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_single_obstacle_yields_two_classes() {
        let config = PlannerConfig::default();
        let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];
        let pool = explore_world(&obstacles, &config);

        assert_eq!(pool.len(), 2);
        let signatures = pool.signatures();
        assert_eq!(signatures.len(), 2);
        assert!(!signatures[0].is_equivalent(&signatures[1], 0.1));
    }

    #[test]
    fn test_class_count_cap_halts_enumeration() {
        let mut config = PlannerConfig::default();
        config.hcp.max_number_classes = 2;
        let obstacles: ObstacleSet = vec![
            Box::new(PointObstacle::new(2.0, 0.0)),
            Box::new(PointObstacle::new(4.0, 0.1)),
            Box::new(PointObstacle::new(5.0, -0.1)),
            Box::new(PointObstacle::new(6.0, 0.0)),
            Box::new(PointObstacle::new(8.0, 0.1)),
        ];
        let pool = explore_world(&obstacles, &config);

        assert!(pool.len() <= 2);
    }

    #[test]
    fn test_duplicate_classes_not_respawned() {
        let config = PlannerConfig::default();
        let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];
        let start = Pose2D::new(0.0, 0.0, 0.0);
        let goal = Pose2D::new(10.0, 0.0, 0.0);
        let build = build_keypoint_graph(&start, &goal, &obstacles, &config).unwrap();

        let mut pool = CandidatePool::new();
        explore_paths(&build, 0.0, 0.0, &obstacles, &config, &mut pool);
        let first_run = pool.len();
        // a second sweep over the same graph finds no new classes
        explore_paths(&build, 0.0, 0.0, &obstacles, &config, &mut pool);

        assert_eq!(pool.len(), first_run);
    }
}
