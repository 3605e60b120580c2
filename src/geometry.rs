use serde::{Deserialize, Serialize};

use crate::ir::{Node, ShapeKind};

pub type Point = (f32, f32);

/// Below this length a segment has no usable direction.
const DEGENERATE_LENGTH: f32 = 1e-3;

pub fn distance(a: Point, b: Point) -> f32 {
    ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt()
}

/// Unit direction from `a` to `b`, or `(0, 0)` for a degenerate segment.
pub fn direction(a: Point, b: Point) -> Point {
    let len = distance(a, b);
    if len < DEGENERATE_LENGTH {
        return (0.0, 0.0);
    }
    ((b.0 - a.0) / len, (b.1 - a.1) / len)
}

/// Whether the segment is within `tolerance_deg` of horizontal.
pub fn is_horizontal(a: Point, b: Point, tolerance_deg: f32) -> bool {
    let angle = (b.1 - a.1).atan2(b.0 - a.0).abs();
    angle < tolerance_deg.to_radians() || angle > (180.0 - tolerance_deg).to_radians()
}

/// Whether the segment is within `tolerance_deg` of vertical.
pub fn is_vertical(a: Point, b: Point, tolerance_deg: f32) -> bool {
    let angle = (b.1 - a.1).atan2(b.0 - a.0).abs();
    (angle - std::f32::consts::FRAC_PI_2).abs() < tolerance_deg.to_radians()
}

/// Side of a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
    Top,
    Bottom,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
            Side::Top => "top",
            Side::Bottom => "bottom",
        }
    }

    /// Unit normal pointing out of the shape.
    pub fn outward_normal(self) -> Point {
        match self {
            Side::Left => (-1.0, 0.0),
            Side::Right => (1.0, 0.0),
            Side::Top => (0.0, -1.0),
            Side::Bottom => (0.0, 1.0),
        }
    }
}

/// A placed shape, used as a routing obstacle and as a validation target.
/// `x`/`y` is the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeBox {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub shape: ShapeKind,
}

impl ShapeBox {
    pub fn new(id: &str, x: f32, y: f32, width: f32, height: f32, shape: ShapeKind) -> Self {
        Self {
            id: id.to_string(),
            x,
            y,
            width,
            height,
            shape,
        }
    }

    /// Box covering a laid-out node (node positions are centers).
    pub fn from_node(node: &Node) -> Self {
        Self::new(
            &node.id,
            node.left(),
            node.top(),
            node.width,
            node.height,
            node.shape(),
        )
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point, margin: f32) -> bool {
        self.left() - margin <= p.0
            && p.0 <= self.right() + margin
            && self.top() - margin <= p.1
            && p.1 <= self.bottom() + margin
    }

    /// Whether `p` lies strictly inside the box shrunk by `margin`.
    pub fn contains_strictly(&self, p: Point, margin: f32) -> bool {
        self.left() + margin < p.0
            && p.0 < self.right() - margin
            && self.top() + margin < p.1
            && p.1 < self.bottom() - margin
    }

    /// Closest side to `p`. Ties resolve in left, right, top, bottom order.
    pub fn nearest_side(&self, p: Point) -> Side {
        let candidates = [
            (Side::Left, (p.0 - self.left()).abs()),
            (Side::Right, (p.0 - self.right()).abs()),
            (Side::Top, (p.1 - self.top()).abs()),
            (Side::Bottom, (p.1 - self.bottom()).abs()),
        ];
        let mut best = candidates[0];
        for candidate in &candidates[1..] {
            if candidate.1 < best.1 {
                best = *candidate;
            }
        }
        best.0
    }
}

/// A finished connector: an origin plus waypoints relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub points: Vec<Point>,
    pub elbowed: bool,
    pub start_binding: Option<String>,
    pub end_binding: Option<String>,
    pub label: Option<String>,
}

impl Arrow {
    /// Builds an arrow from absolute waypoints; the first one becomes the origin.
    pub fn from_waypoints(id: &str, waypoints: &[Point]) -> Self {
        let origin = waypoints.first().copied().unwrap_or((0.0, 0.0));
        let points = if waypoints.is_empty() {
            vec![(0.0, 0.0)]
        } else {
            waypoints
                .iter()
                .map(|(x, y)| (x - origin.0, y - origin.1))
                .collect()
        };
        Self {
            id: id.to_string(),
            x: origin.0,
            y: origin.1,
            points,
            elbowed: true,
            start_binding: None,
            end_binding: None,
            label: None,
        }
    }

    pub fn bound(mut self, start: &str, end: &str) -> Self {
        self.start_binding = Some(start.to_string());
        self.end_binding = Some(end.to_string());
        self
    }

    pub fn absolute_points(&self) -> Vec<Point> {
        self.points
            .iter()
            .map(|(dx, dy)| (self.x + dx, self.y + dy))
            .collect()
    }

    pub fn segments(&self) -> Vec<(Point, Point)> {
        let points = self.absolute_points();
        points.windows(2).map(|pair| (pair[0], pair[1])).collect()
    }

    pub fn start_point(&self) -> Point {
        self.offset(self.points.first())
    }

    pub fn end_point(&self) -> Point {
        self.offset(self.points.last())
    }

    fn offset(&self, point: Option<&Point>) -> Point {
        match point {
            Some((dx, dy)) => (self.x + dx, self.y + dy),
            None => (self.x, self.y),
        }
    }
}
