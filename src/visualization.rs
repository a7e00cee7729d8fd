//! Visualization sinks for exploration graphs and trajectory candidates.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use crate::core::types::Point2D;
use crate::homotopy::graph::ExplorationGraph;
use crate::trajectory::{TebOptimizer, TimedElasticBand};

/// Sink receiving the planner's per-cycle artifacts.
///
/// Implementations must never fail the planning cycle; report problems via
/// logging instead.
pub trait Visualization {
    /// The exploration graph of the current cycle.
    fn publish_graph(&self, graph: &ExplorationGraph);

    /// All live trajectory candidates.
    fn publish_candidates(&self, candidates: &[TebOptimizer]);

    /// The elected best trajectory.
    fn publish_best(&self, band: &TimedElasticBand);
}

/// Candidate stroke colors, cycled in pool order.
const CANDIDATE_COLORS: [&str; 6] = ["blue", "orange", "purple", "teal", "brown", "gray"];

/// Writes SVG snapshots of the planning cycle into a directory.
///
/// Files are overwritten every cycle: `hc_graph.svg` for the exploration
/// graph, `candidates.svg` for the candidate container and `best_plan.svg`
/// for the elected trajectory.
pub struct SvgVisualization {
    directory: PathBuf,
}

impl SvgVisualization {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn write_file(&self, name: &str, svg: String) {
        let path = self.directory.join(name);
        if let Err(e) = fs::create_dir_all(&self.directory) {
            log::warn!("SvgVisualization: cannot create {:?}: {e}", self.directory);
            return;
        }
        if let Err(e) = fs::write(&path, svg) {
            log::warn!("SvgVisualization: cannot write {path:?}: {e}");
        }
    }
}

impl Visualization for SvgVisualization {
    fn publish_graph(&self, graph: &ExplorationGraph) {
        let positions: Vec<Point2D> = (0..graph.vertex_count()).map(|i| graph.position(i)).collect();
        let mut svg = svg_header(&positions);

        for i in 0..graph.vertex_count() {
            let from = graph.position(i);
            for &j in graph.out_neighbors(i) {
                let to = graph.position(j);
                let _ = writeln!(
                    svg,
                    r##"    <line x1="{:.3}" y1="{:.3}" x2="{:.3}" y2="{:.3}" stroke="#cccccc" stroke-width="0.02"/>"##,
                    from.x, from.y, to.x, to.y
                );
            }
        }
        for (i, p) in positions.iter().enumerate() {
            let color = if i == 0 || i + 1 == positions.len() {
                "red"
            } else {
                "blue"
            };
            let _ = writeln!(
                svg,
                r#"    <circle cx="{:.3}" cy="{:.3}" r="0.06" fill="{color}"/>"#,
                p.x, p.y
            );
        }

        svg.push_str(SVG_FOOTER);
        self.write_file("hc_graph.svg", svg);
    }

    fn publish_candidates(&self, candidates: &[TebOptimizer]) {
        let positions: Vec<Point2D> = candidates
            .iter()
            .flat_map(|c| c.band().positions())
            .collect();
        let mut svg = svg_header(&positions);

        for (index, candidate) in candidates.iter().enumerate() {
            let color = CANDIDATE_COLORS[index % CANDIDATE_COLORS.len()];
            append_polyline(&mut svg, candidate.band(), color, 0.04);
        }

        svg.push_str(SVG_FOOTER);
        self.write_file("candidates.svg", svg);
    }

    fn publish_best(&self, band: &TimedElasticBand) {
        let positions: Vec<Point2D> = band.positions().collect();
        let mut svg = svg_header(&positions);
        append_polyline(&mut svg, band, "lime", 0.06);
        svg.push_str(SVG_FOOTER);
        self.write_file("best_plan.svg", svg);
    }
}

const SVG_FOOTER: &str = "  </g>\n</svg>\n";

/// Header with a viewBox fitted to the data, y-axis flipped to world frame.
fn svg_header(positions: &[Point2D]) -> String {
    let mut min = Point2D::new(f32::INFINITY, f32::INFINITY);
    let mut max = Point2D::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in positions {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    if !min.x.is_finite() {
        min = Point2D::new(0.0, 0.0);
        max = Point2D::new(1.0, 1.0);
    }

    let margin = 0.5;
    let view_min_x = min.x - margin;
    let view_min_y = min.y - margin;
    let view_width = (max.x - min.x) + 2.0 * margin;
    let view_height = (max.y - min.y) + 2.0 * margin;

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}" width="800" height="600">
  <rect x="{}" y="{}" width="{}" height="{}" fill="white"/>
  <g transform="scale(1, -1) translate(0, -{})">
"#,
        view_min_x,
        -view_min_y - view_height,
        view_width,
        view_height,
        view_min_x,
        -view_min_y - view_height,
        view_width,
        view_height,
        2.0 * view_min_y + view_height
    )
}

fn append_polyline(svg: &mut String, band: &TimedElasticBand, color: &str, width: f32) {
    for i in 0..band.len().saturating_sub(1) {
        let a = band.pose(i).position();
        let b = band.pose(i + 1).position();
        let _ = writeln!(
            svg,
            r#"    <line x1="{:.3}" y1="{:.3}" x2="{:.3}" y2="{:.3}" stroke="{color}" stroke-width="{width}"/>"#,
            a.x, a.y, b.x, b.y
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homotopy::graph::ExplorationGraph;

    #[test]
    fn test_svg_header_handles_empty_input() {
        let svg = svg_header(&[]);
        assert!(svg.contains("<svg"));
        assert!(svg.contains("viewBox"));
    }

    #[test]
    fn test_publish_graph_writes_svg_file() {
        let directory = std::env::temp_dir().join(format!(
            "marga-nav-viz-{}",
            std::process::id()
        ));
        let sink = SvgVisualization::new(&directory);

        let mut graph = ExplorationGraph::new();
        let a = graph.add_vertex(Point2D::new(0.0, 0.0));
        let b = graph.add_vertex(Point2D::new(2.0, 1.0));
        graph.add_edge(a, b);
        sink.publish_graph(&graph);

        let path = directory.join("hc_graph.svg");
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("<line"));
        assert!(content.contains("<circle"));

        let _ = fs::remove_dir_all(&directory);
    }

    #[test]
    fn test_svg_header_covers_all_points() {
        let svg = svg_header(&[Point2D::new(-2.0, 1.0), Point2D::new(6.0, 3.0)]);
        // width = extent + margins
        assert!(svg.contains("viewBox=\"-2.5"));
        assert!(svg.contains(" 9 "));
    }
}
