//! Configuration loading for the homotopy-class planner.

use crate::error::{PlannerError, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub hcp: HcpConfig,
    #[serde(default)]
    pub goal_tolerance: GoalToleranceConfig,
    #[serde(default)]
    pub obstacles: ObstacleConfig,
    #[serde(default)]
    pub optim: OptimConfig,
    #[serde(default)]
    pub trajectory: TrajectoryConfig,
}

/// Homotopy-class exploration settings
#[derive(Clone, Debug, Deserialize)]
pub struct HcpConfig {
    /// Upper bound on the number of trajectory candidates kept alive
    #[serde(default = "default_max_number_classes")]
    pub max_number_classes: usize,

    /// Use the deterministic obstacle-keypoint graph instead of the
    /// probabilistic roadmap
    #[serde(default = "default_simple_exploration")]
    pub simple_exploration: bool,

    /// Angle (radians) whose cosine bounds forward-edge pruning and
    /// detour detection; zero disables the start-heading limit
    #[serde(default = "default_obstacle_heading_threshold")]
    pub obstacle_heading_threshold: f32,

    /// Number of collision-free samples drawn for the roadmap graph
    #[serde(default = "default_roadmap_graph_no_samples")]
    pub roadmap_graph_no_samples: usize,

    /// Width (meters) of the sampling rectangle around the start-goal axis
    #[serde(default = "default_roadmap_graph_area_width")]
    pub roadmap_graph_area_width: f32,

    /// Magnitude scale applied to path and obstacle coordinates in the
    /// h-signature integral (0 < prescaler <= 1)
    #[serde(default = "default_h_signature_prescaler")]
    pub h_signature_prescaler: f64,

    /// Equivalence threshold for the long-term h-signature lookup list
    #[serde(default = "default_h_signature_threshold")]
    pub h_signature_threshold: f64,

    /// Candidates whose closest pose lies within this distance (meters) of
    /// an obstacle are discarded as degenerate
    #[serde(default = "default_degenerate_obstacle_dist")]
    pub degenerate_obstacle_dist: f32,

    /// Optimize candidates on one worker thread each
    #[serde(default = "default_enable_multithreading")]
    pub enable_multithreading: bool,

    /// Publish the exploration graph to the visualization sink
    #[serde(default = "default_visualize_hc_graph")]
    pub visualize_hc_graph: bool,
}

/// Goal tolerance settings
#[derive(Clone, Debug, Deserialize)]
pub struct GoalToleranceConfig {
    /// Minimum start-goal distance (meters); below this planning yields an
    /// empty candidate pool
    #[serde(default = "default_xy_goal_tolerance")]
    pub xy_goal_tolerance: f32,
}

/// Obstacle clearance settings
#[derive(Clone, Debug, Deserialize)]
pub struct ObstacleConfig {
    /// Desired minimum distance (meters) between trajectory and obstacles
    #[serde(default = "default_min_obstacle_dist")]
    pub min_obstacle_dist: f32,
}

/// Per-candidate optimizer settings
#[derive(Clone, Debug, Deserialize)]
pub struct OptimConfig {
    /// Deformation steps per outer iteration
    #[serde(default = "default_no_inner_iterations")]
    pub no_inner_iterations: usize,

    /// Resize-and-deform cycles per optimize call
    #[serde(default = "default_no_outer_iterations")]
    pub no_outer_iterations: usize,

    /// Weight of the obstacle penalty in the cost vector
    #[serde(default = "default_weight_obstacle")]
    pub weight_obstacle: f32,

    /// Weight of the total transition time in the cost vector
    #[serde(default = "default_weight_optimaltime")]
    pub weight_optimaltime: f32,
}

/// Elastic band discretization settings
#[derive(Clone, Debug, Deserialize)]
pub struct TrajectoryConfig {
    /// Desired time resolution (seconds) between consecutive band poses
    #[serde(default = "default_dt_ref")]
    pub dt_ref: f32,

    /// Hysteresis (seconds) around dt_ref before the band is resized
    #[serde(default = "default_dt_hysteresis")]
    pub dt_hysteresis: f32,

    /// Minimum number of band poses
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Maximum number of band poses
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Maximum translational velocity (m/s) used for band timing
    #[serde(default = "default_max_vel_x")]
    pub max_vel_x: f32,
}

// Default value functions
fn default_max_number_classes() -> usize {
    4
}
fn default_simple_exploration() -> bool {
    false
}
fn default_obstacle_heading_threshold() -> f32 {
    1.0
}
fn default_roadmap_graph_no_samples() -> usize {
    15
}
fn default_roadmap_graph_area_width() -> f32 {
    5.0
}
fn default_h_signature_prescaler() -> f64 {
    0.5
}
fn default_h_signature_threshold() -> f64 {
    0.1
}
fn default_degenerate_obstacle_dist() -> f32 {
    0.03
}
fn default_enable_multithreading() -> bool {
    true
}
fn default_visualize_hc_graph() -> bool {
    false
}
fn default_xy_goal_tolerance() -> f32 {
    0.2
}
fn default_min_obstacle_dist() -> f32 {
    0.5
}
fn default_no_inner_iterations() -> usize {
    5
}
fn default_no_outer_iterations() -> usize {
    4
}
fn default_weight_obstacle() -> f32 {
    50.0
}
fn default_weight_optimaltime() -> f32 {
    1.0
}
fn default_dt_ref() -> f32 {
    0.3
}
fn default_dt_hysteresis() -> f32 {
    0.1
}
fn default_min_samples() -> usize {
    3
}
fn default_max_samples() -> usize {
    200
}
fn default_max_vel_x() -> f32 {
    0.4
}

impl Default for HcpConfig {
    fn default() -> Self {
        Self {
            max_number_classes: default_max_number_classes(),
            simple_exploration: default_simple_exploration(),
            obstacle_heading_threshold: default_obstacle_heading_threshold(),
            roadmap_graph_no_samples: default_roadmap_graph_no_samples(),
            roadmap_graph_area_width: default_roadmap_graph_area_width(),
            h_signature_prescaler: default_h_signature_prescaler(),
            h_signature_threshold: default_h_signature_threshold(),
            degenerate_obstacle_dist: default_degenerate_obstacle_dist(),
            enable_multithreading: default_enable_multithreading(),
            visualize_hc_graph: default_visualize_hc_graph(),
        }
    }
}

impl Default for GoalToleranceConfig {
    fn default() -> Self {
        Self {
            xy_goal_tolerance: default_xy_goal_tolerance(),
        }
    }
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            min_obstacle_dist: default_min_obstacle_dist(),
        }
    }
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            no_inner_iterations: default_no_inner_iterations(),
            no_outer_iterations: default_no_outer_iterations(),
            weight_obstacle: default_weight_obstacle(),
            weight_optimaltime: default_weight_optimaltime(),
        }
    }
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            dt_ref: default_dt_ref(),
            dt_hysteresis: default_dt_hysteresis(),
            min_samples: default_min_samples(),
            max_samples: default_max_samples(),
            max_vel_x: default_max_vel_x(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            hcp: HcpConfig::default(),
            goal_tolerance: GoalToleranceConfig::default(),
            obstacles: ObstacleConfig::default(),
            optim: OptimConfig::default(),
            trajectory: TrajectoryConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlannerError::Config(format!("Failed to read config file: {}", e)))?;
        let config: PlannerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let config = PlannerConfig::default();
        assert_eq!(config.hcp.max_number_classes, 4);
        assert!(config.hcp.h_signature_prescaler > 0.0);
        assert!(config.hcp.h_signature_prescaler <= 1.0);
        assert!(config.trajectory.min_samples >= 3);
        assert!(config.trajectory.max_samples > config.trajectory.min_samples);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: PlannerConfig = toml::from_str(
            r#"
            [hcp]
            max_number_classes = 2
            simple_exploration = true

            [obstacles]
            min_obstacle_dist = 0.8
            "#,
        )
        .unwrap();

        assert_eq!(config.hcp.max_number_classes, 2);
        assert!(config.hcp.simple_exploration);
        assert_eq!(config.obstacles.min_obstacle_dist, 0.8);
        // untouched sections fall back to defaults
        assert_eq!(config.optim.no_inner_iterations, 5);
        assert_eq!(config.goal_tolerance.xy_goal_tolerance, 0.2);
    }

    #[test]
    fn test_parse_empty_toml() {
        let config: PlannerConfig = toml::from_str("").unwrap();
        assert_eq!(config.hcp.roadmap_graph_no_samples, 15);
    }
}
