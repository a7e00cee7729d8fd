//! MargaNav - homotopy-aware local trajectory planning for mobile robots.
//!
//! Given a start pose, a goal pose, the current velocity and a set of
//! workspace obstacles, the planner discovers topologically distinct ways
//! of routing around the obstacles, keeps one elastic-band trajectory per
//! homotopy class alive across planning cycles, optimizes the whole pool
//! (optionally in parallel) and commands along the cheapest survivor.
//!
//! # Architecture
//!
//! The crate is organized in layers, foundation first:
//!
//! - [`core`]: geometric value types and angular math
//! - [`obstacles`]: obstacle primitives and distance queries
//! - [`trajectory`]: timed elastic bands and the per-candidate optimizer
//! - [`homotopy`]: h-signatures, exploration graphs, path enumeration,
//!   the candidate pool and the planning orchestrator
//! - [`visualization`]: optional SVG sinks for graphs and candidates
//!
//! # Example
//!
//! ```
//! use marga_nav::{HomotopyClassPlanner, ObstacleSet, PlannerConfig, PointObstacle, Pose2D};
//!
//! let mut config = PlannerConfig::default();
//! config.hcp.simple_exploration = true;
//!
//! let mut planner = HomotopyClassPlanner::new(config);
//! let obstacles: ObstacleSet = vec![Box::new(PointObstacle::new(5.0, 0.0))];
//!
//! planner
//!     .plan(
//!         &Pose2D::new(0.0, 0.0, 0.0),
//!         &Pose2D::new(10.0, 0.0, 0.0),
//!         None,
//!         &obstacles,
//!     )
//!     .unwrap();
//!
//! assert_eq!(planner.pool().len(), 2);
//! let command = planner.velocity_command();
//! assert!(command.linear > 0.0);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod homotopy;
pub mod obstacles;
pub mod trajectory;
pub mod visualization;

pub use crate::config::PlannerConfig;
pub use crate::core::types::{Point2D, Pose2D, Twist2D};
pub use crate::error::{PlannerError, Result};
pub use crate::homotopy::graph::ExplorationGraph;
pub use crate::homotopy::h_signature::{HSignature, compute_h_signature};
pub use crate::homotopy::planner::{CostmapModel, HomotopyClassPlanner};
pub use crate::homotopy::pool::CandidatePool;
pub use crate::obstacles::{CircleObstacle, LineObstacle, Obstacle, ObstacleSet, PointObstacle};
pub use crate::trajectory::{TebOptimizer, TimedElasticBand};
pub use crate::visualization::{SvgVisualization, Visualization};
