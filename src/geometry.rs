//! Integer plane geometry used by the region-of-interest test.
//!
//! All coordinates are pixel positions. Every predicate treats shapes as
//! closed sets, so shapes that only share a boundary point intersect.

use serde::{Deserialize, Serialize};

/// A pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle given by its inclusive corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: i32,
    pub y_min: i32,
    pub x_max: i32,
    pub y_max: i32,
}

impl BoundingBox {
    /// Create a box, reordering the corners if necessary
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_min.max(x_max),
            y_max: y_min.max(y_max),
        }
    }

    pub fn width(&self) -> u32 {
        (self.x_max - self.x_min).unsigned_abs()
    }

    pub fn height(&self) -> u32 {
        (self.y_max - self.y_min).unsigned_abs()
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x_min, self.y_min),
            Point::new(self.x_max, self.y_min),
            Point::new(self.x_max, self.y_max),
            Point::new(self.x_min, self.y_max),
        ]
    }

    fn edges(&self) -> [(Point, Point); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }
}

/// Closed polygon. Winding order does not matter and the closing edge is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(i32, i32)>", into = "Vec<(i32, i32)>")]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(mut vertices: Vec<Point>) -> Self {
        // Tolerate an explicitly closed ring
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Edges including the implicit closing edge
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Point-in-polygon test where the boundary counts as inside
    pub fn contains(&self, p: Point) -> bool {
        if self.vertices.is_empty() {
            return false;
        }
        if self.edges().any(|(a, b)| on_segment(a, b, p)) {
            return true;
        }

        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let dy = i64::from(b.y) - i64::from(a.y);
                let c = cross(a, b, p);
                if (dy > 0 && c > 0) || (dy < 0 && c < 0) {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// True when the rectangle and the polygon share at least one point
    pub fn intersects_box(&self, bbox: &BoundingBox) -> bool {
        if self.vertices.is_empty() {
            return false;
        }
        if self.vertices.iter().any(|v| bbox.contains(*v)) {
            return true;
        }
        if bbox.corners().iter().any(|c| self.contains(*c)) {
            return true;
        }
        self.edges().any(|(a, b)| {
            bbox.edges()
                .iter()
                .any(|(c, d)| segments_intersect(a, b, *c, *d))
        })
    }
}

impl From<Vec<(i32, i32)>> for Polygon {
    fn from(points: Vec<(i32, i32)>) -> Self {
        Self::new(points.into_iter().map(Point::from).collect())
    }
}

impl From<Polygon> for Vec<(i32, i32)> {
    fn from(polygon: Polygon) -> Self {
        polygon.vertices.into_iter().map(|p| (p.x, p.y)).collect()
    }
}

/// Z component of (b - a) x (p - a)
fn cross(a: Point, b: Point, p: Point) -> i64 {
    let (ax, ay) = (i64::from(a.x), i64::from(a.y));
    let (bx, by) = (i64::from(b.x), i64::from(b.y));
    let (px, py) = (i64::from(p.x), i64::from(p.y));
    (bx - ax) * (py - ay) - (px - ax) * (by - ay)
}

fn within_span(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    cross(a, b, p) == 0 && within_span(a, b, p)
}

fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = cross(q1, q2, p1).signum();
    let d2 = cross(q1, q2, p2).signum();
    let d3 = cross(p1, p2, q1).signum();
    let d4 = cross(p1, p2, q2).signum();

    if d1 * d2 < 0 && d3 * d4 < 0 {
        return true;
    }

    (d1 == 0 && within_span(q1, q2, p1))
        || (d2 == 0 && within_span(q1, q2, p2))
        || (d3 == 0 && within_span(p1, p2, q1))
        || (d4 == 0 && within_span(p1, p2, q2))
}
