//! Exploration graph construction between start and goal.
//!
//! Two strategies build the graph each cycle: a deterministic graph placing
//! two keypoints per obstacle symmetrically off the start-goal axis, and a
//! probabilistic roadmap sampling a rotated rectangle around that axis.
//! Both share the same edge rule: edges must point sufficiently forward and
//! must clear every obstacle.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use rand::rngs::StdRng;

use crate::config::PlannerConfig;
use crate::core::types::{Point2D, Pose2D};
use crate::obstacles::Obstacle;

/// Directed graph over workspace waypoints.
///
/// Vertices are identified by their insertion index, stable within one
/// planning cycle: index 0 is the start, the last index is the goal, and
/// keypoints (or samples) sit in between in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ExplorationGraph {
    positions: Vec<Point2D>,
    adjacency: Vec<Vec<usize>>,
}

impl ExplorationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vertex, returning its index.
    pub fn add_vertex(&mut self, position: Point2D) -> usize {
        self.positions.push(position);
        self.adjacency.push(Vec::new());
        self.positions.len() - 1
    }

    /// Insert the directed edge `from -> to`.
    pub fn add_edge(&mut self, from: usize, to: usize) {
        self.adjacency[from].push(to);
    }

    pub fn position(&self, index: usize) -> Point2D {
        self.positions[index]
    }

    pub fn out_neighbors(&self, index: usize) -> &[usize] {
        &self.adjacency[index]
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(|n| n.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.adjacency.clear();
    }
}

/// A freshly built graph together with its terminal vertex indices.
#[derive(Debug)]
pub struct GraphBuild {
    pub graph: ExplorationGraph,
    pub start: usize,
    pub goal: usize,
}

/// Build the deterministic obstacle-keypoint graph.
///
/// For every obstacle in front of the start, two keypoints are placed at
/// `centroid ± normal * min_obstacle_dist`, forcing the path enumerator to
/// commit to a left or right routing. Returns `None` when the goal lies
/// within the translational goal tolerance.
pub fn build_keypoint_graph(
    start: &Pose2D,
    goal: &Pose2D,
    obstacles: &[Box<dyn Obstacle>],
    config: &PlannerConfig,
) -> Option<GraphBuild> {
    let diff = goal.position() - start.position();
    if diff.norm() < config.goal_tolerance.xy_goal_tolerance {
        return None;
    }
    let dir = diff.normalized()?;
    let dist_to_obst = config.obstacles.min_obstacle_dist;
    let normal = dir.perpendicular() * dist_to_obst;

    let mut graph = ExplorationGraph::new();
    let start_idx = graph.add_vertex(start.position());

    // nearest-obstacle keypoints, only relevant with the heading limit on
    let limit_heading = config.hcp.obstacle_heading_threshold != 0.0;
    let mut nearest_keypoints: Option<(usize, usize)> = None;
    let mut nearest_dist = f32::INFINITY;

    for obst in obstacles {
        let centroid = obst.centroid();
        let to_obst = centroid - start.position();
        let dist = to_obst.norm();
        // skip obstacles behind or lateral to the start-goal direction
        if to_obst.dot(dir) < 0.1 * dist {
            continue;
        }

        let left = graph.add_vertex(centroid + normal);
        let right = graph.add_vertex(centroid - normal);

        if limit_heading && dist < nearest_dist {
            nearest_dist = dist;
            nearest_keypoints = Some((left, right));
        }
    }

    let goal_idx = graph.add_vertex(goal.position());

    insert_edges(
        &mut graph,
        start,
        start_idx,
        goal_idx,
        dir,
        obstacles,
        dist_to_obst,
        config.hcp.obstacle_heading_threshold,
        nearest_keypoints,
    );

    Some(GraphBuild {
        graph,
        start: start_idx,
        goal: goal_idx,
    })
}

/// Build the probabilistic roadmap graph.
///
/// Samples collision-free vertices inside a rectangle of the configured
/// width, aligned with the start-goal axis. The rejection loop honors the
/// `running` flag so over-cluttered scenes cannot livelock the planner;
/// cancellation aborts the build.
pub fn build_roadmap_graph(
    start: &Pose2D,
    goal: &Pose2D,
    obstacles: &[Box<dyn Obstacle>],
    config: &PlannerConfig,
    rng: &mut StdRng,
    running: &AtomicBool,
) -> Option<GraphBuild> {
    let diff = goal.position() - start.position();
    let start_goal_dist = diff.norm();
    if start_goal_dist < config.goal_tolerance.xy_goal_tolerance {
        return None;
    }
    let dir = diff.normalized()?;
    let dist_to_obst = config.obstacles.min_obstacle_dist;

    let area_width = config.hcp.roadmap_graph_area_width;
    if area_width <= 0.0 {
        log::warn!("build_roadmap_graph: non-positive sampling area width");
        return None;
    }
    let area_origin = start.position() - dir.perpendicular() * (0.5 * area_width);
    let phi = diff.y.atan2(diff.x);
    let (sin_phi, cos_phi) = phi.sin_cos();

    let mut graph = ExplorationGraph::new();
    let start_idx = graph.add_vertex(start.position());

    for _ in 0..config.hcp.roadmap_graph_no_samples {
        // rejection-sample until collision free or cancelled
        let sample = loop {
            if !running.load(Ordering::Relaxed) {
                log::debug!("build_roadmap_graph: sampling cancelled");
                return None;
            }
            let along: f32 = rng.random_range(0.0..start_goal_dist);
            let across: f32 = rng.random_range(0.0..area_width);
            let candidate = Point2D::new(
                area_origin.x + along * cos_phi - across * sin_phi,
                area_origin.y + along * sin_phi + across * cos_phi,
            );
            if !obstacles
                .iter()
                .any(|o| o.check_collision(candidate, dist_to_obst))
            {
                break candidate;
            }
        };
        graph.add_vertex(sample);
    }

    let goal_idx = graph.add_vertex(goal.position());

    insert_edges(
        &mut graph,
        start,
        start_idx,
        goal_idx,
        dir,
        obstacles,
        dist_to_obst,
        config.hcp.obstacle_heading_threshold,
        None,
    );

    Some(GraphBuild {
        graph,
        start: start_idx,
        goal: goal_idx,
    })
}

/// Shared edge-insertion rule for both graph strategies.
///
/// An ordered pair `(i, j)` becomes an edge when the normalized direction
/// from `i` to `j` points forward (dot with the start-goal direction above
/// the cosine of the heading threshold), the optional start-heading limit
/// toward the nearest obstacle's keypoints holds, and no obstacle cuts the
/// segment within half the obstacle distance.
#[allow(clippy::too_many_arguments)]
fn insert_edges(
    graph: &mut ExplorationGraph,
    start: &Pose2D,
    start_idx: usize,
    goal_idx: usize,
    dir: Point2D,
    obstacles: &[Box<dyn Obstacle>],
    dist_to_obst: f32,
    heading_threshold: f32,
    nearest_keypoints: Option<(usize, usize)>,
) {
    let cos_threshold = heading_threshold.cos();
    let vertex_count = graph.vertex_count();

    for i in 0..vertex_count {
        if i == goal_idx {
            continue;
        }
        for j in 0..vertex_count {
            if i == j {
                continue;
            }
            let Some(dij) = (graph.position(j) - graph.position(i)).normalized() else {
                continue;
            };
            if dij.dot(dir) <= cos_threshold {
                continue;
            }

            if let Some((left, right)) = nearest_keypoints {
                if i == start_idx && (j == left || j == right) {
                    let Some(to_keypoint) =
                        (graph.position(j) - start.position()).normalized()
                    else {
                        continue;
                    };
                    if start.heading_vector().dot(to_keypoint) < cos_threshold {
                        log::debug!("insert_edges: start edge exceeds heading limit, dropped");
                        continue;
                    }
                }
            }

            if obstacles.iter().any(|o| {
                o.check_line_intersection(graph.position(i), graph.position(j), 0.5 * dist_to_obst)
            }) {
                continue;
            }

            graph.add_edge(i, j);
        }
    }
}
