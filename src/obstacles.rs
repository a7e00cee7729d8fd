//! Obstacle primitives queried by the graph builders and the band optimizer.
//!
//! Obstacles are read-only for the duration of a planning cycle; mutation
//! happens between `plan()` calls on the owning side.

use std::fmt::Debug;

use crate::core::types::Point2D;

/// A static workspace obstacle.
pub trait Obstacle: Send + Sync + Debug {
    /// Representative center of the obstacle region.
    fn centroid(&self) -> Point2D;

    /// Whether `point` lies within `min_dist` of the obstacle region.
    fn check_collision(&self, point: Point2D, min_dist: f32) -> bool;

    /// Whether the segment `start`-`end` passes within `min_dist` of the
    /// obstacle region.
    fn check_line_intersection(&self, start: Point2D, end: Point2D, min_dist: f32) -> bool;

    /// Signed-free distance from `point` to the obstacle region boundary.
    fn minimum_distance(&self, point: Point2D) -> f32;
}

/// Owned obstacle container shared with the planner per cycle.
pub type ObstacleSet = Vec<Box<dyn Obstacle>>;

/// Distance from a point to a line segment.
fn point_to_segment_distance(point: Point2D, a: Point2D, b: Point2D) -> f32 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq < 1e-12 {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

/// A dimensionless point obstacle.
#[derive(Debug, Clone, Copy)]
pub struct PointObstacle {
    position: Point2D,
}

impl PointObstacle {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            position: Point2D::new(x, y),
        }
    }
}

impl Obstacle for PointObstacle {
    fn centroid(&self) -> Point2D {
        self.position
    }

    fn check_collision(&self, point: Point2D, min_dist: f32) -> bool {
        self.minimum_distance(point) < min_dist
    }

    fn check_line_intersection(&self, start: Point2D, end: Point2D, min_dist: f32) -> bool {
        point_to_segment_distance(self.position, start, end) <= min_dist
    }

    fn minimum_distance(&self, point: Point2D) -> f32 {
        self.position.distance(point)
    }
}

/// A circular obstacle with finite radius.
#[derive(Debug, Clone, Copy)]
pub struct CircleObstacle {
    center: Point2D,
    radius: f32,
}

impl CircleObstacle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            center: Point2D::new(x, y),
            radius,
        }
    }
}

impl Obstacle for CircleObstacle {
    fn centroid(&self) -> Point2D {
        self.center
    }

    fn check_collision(&self, point: Point2D, min_dist: f32) -> bool {
        self.minimum_distance(point) < min_dist
    }

    fn check_line_intersection(&self, start: Point2D, end: Point2D, min_dist: f32) -> bool {
        point_to_segment_distance(self.center, start, end) <= self.radius + min_dist
    }

    fn minimum_distance(&self, point: Point2D) -> f32 {
        self.center.distance(point) - self.radius
    }
}

/// A line segment obstacle (e.g. a wall fragment).
#[derive(Debug, Clone, Copy)]
pub struct LineObstacle {
    start: Point2D,
    end: Point2D,
}

impl LineObstacle {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self { start, end }
    }

    /// Proper or touching intersection test between two segments.
    fn segments_intersect(p1: Point2D, p2: Point2D, q1: Point2D, q2: Point2D) -> bool {
        fn cross(o: Point2D, a: Point2D, b: Point2D) -> f32 {
            (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
        }

        let d1 = cross(q1, q2, p1);
        let d2 = cross(q1, q2, p2);
        let d3 = cross(p1, p2, q1);
        let d4 = cross(p1, p2, q2);

        if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
            && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
        {
            return true;
        }

        // collinear overlap reduces to an endpoint lying on the other segment
        let on = |p: Point2D, a: Point2D, b: Point2D, d: f32| {
            d.abs() < 1e-9 && point_to_segment_distance(p, a, b) < 1e-6
        };
        on(p1, q1, q2, d1) || on(p2, q1, q2, d2) || on(q1, p1, p2, d3) || on(q2, p1, p2, d4)
    }
}

impl Obstacle for LineObstacle {
    fn centroid(&self) -> Point2D {
        (self.start + self.end) * 0.5
    }

    fn check_collision(&self, point: Point2D, min_dist: f32) -> bool {
        self.minimum_distance(point) < min_dist
    }

    fn check_line_intersection(&self, start: Point2D, end: Point2D, min_dist: f32) -> bool {
        if Self::segments_intersect(start, end, self.start, self.end) {
            return true;
        }
        let d = point_to_segment_distance(self.start, start, end)
            .min(point_to_segment_distance(self.end, start, end))
            .min(point_to_segment_distance(start, self.start, self.end))
            .min(point_to_segment_distance(end, self.start, self.end));
        d <= min_dist
    }

    fn minimum_distance(&self, point: Point2D) -> f32 {
        point_to_segment_distance(point, self.start, self.end)
    }
}
