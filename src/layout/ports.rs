use std::collections::{BTreeMap, HashMap};

use super::routing::simplify_path;
use crate::geometry::{Point, ShapeBox, Side};
use crate::ir::{Edge, Node, NodeKind, ShapeKind};

/// Which end of an edge a connection point is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortMode {
    Exit,
    Entry,
    Auto,
}

/// Point on `shape`'s outline where an edge to or from `other` attaches.
///
/// Diamonds are left through their left or right corner: `forced` wins when
/// it names one of those, otherwise the corner facing `other`. They are
/// entered from the top when `other` is above. Rectangles and ellipses
/// entered from below (a back edge) take the side facing `other`. Everything
/// else attaches to the side facing `other` along the dominant axis.
pub fn connection_point(
    shape: &ShapeBox,
    other: &ShapeBox,
    mode: PortMode,
    forced: Option<Side>,
) -> Point {
    let (cx, cy) = shape.center();
    let (ox, oy) = other.center();
    let dx = ox - cx;
    let dy = oy - cy;

    let side_facing = || if dx > 0.0 { (shape.right(), cy) } else { (shape.left(), cy) };
    let dominant = || {
        if dx.abs() > dy.abs() {
            side_facing()
        } else if dy > 0.0 {
            (cx, shape.bottom())
        } else {
            (cx, shape.top())
        }
    };

    match (shape.shape, mode) {
        (ShapeKind::Diamond, PortMode::Exit) => match forced {
            Some(Side::Left) => (shape.left(), cy),
            Some(Side::Right) => (shape.right(), cy),
            _ if dx >= 0.0 => (shape.right(), cy),
            _ => (shape.left(), cy),
        },
        (ShapeKind::Diamond, PortMode::Entry) if dy < 0.0 => (cx, shape.top()),
        (_, PortMode::Entry) if shape.shape != ShapeKind::Diamond && dy > 0.0 => side_facing(),
        _ => dominant(),
    }
}

/// Opposite exit sides for decision nodes with exactly two labelled branches.
///
/// A branch whose target is not below the decision counts as a back edge and
/// exits left when its sibling is a forward branch. Otherwise the branch
/// whose target lies further left exits left. Decisions with one or three or
/// more labelled branches get no entry.
pub fn decision_exit_sides(
    nodes: &BTreeMap<String, Node>,
    edges: &[Edge],
) -> HashMap<(String, String), Side> {
    let mut branches: Vec<(&str, Vec<&Edge>)> = Vec::new();
    for edge in edges {
        let is_decision = nodes
            .get(&edge.from)
            .is_some_and(|node| node.kind == Some(NodeKind::Decision));
        if !is_decision || edge.label.is_none() {
            continue;
        }
        match branches.iter_mut().find(|(src, _)| *src == edge.from) {
            Some((_, list)) => list.push(edge),
            None => branches.push((edge.from.as_str(), vec![edge])),
        }
    }

    let mut sides = HashMap::new();
    for (src, list) in branches {
        let [first, second] = list.as_slice() else {
            continue;
        };
        let (Some(source), Some(t1), Some(t2)) = (
            nodes.get(src),
            nodes.get(&first.to),
            nodes.get(&second.to),
        ) else {
            continue;
        };
        let first_back = t1.y <= source.y;
        let second_back = t2.y <= source.y;
        let first_left = if first_back != second_back {
            first_back
        } else {
            t1.x < t2.x
        };
        let (first_side, second_side) = if first_left {
            (Side::Left, Side::Right)
        } else {
            (Side::Right, Side::Left)
        };
        sides.insert((first.from.clone(), first.to.clone()), first_side);
        sides.insert((second.from.clone(), second.to.clone()), second_side);
    }
    sides
}

/// Elbow path for the edge that jumps between two columns: out of the
/// source's right side, down the gap at `gap_x`, across to `clearance` above
/// the target, then down into the target's top.
pub fn column_connector_path(
    source: &ShapeBox,
    target: &ShapeBox,
    gap_x: f32,
    clearance: f32,
) -> Vec<Point> {
    let (_, sy) = source.center();
    let sx = source.right();
    let (ex, _) = target.center();
    let ey = target.top();
    simplify_path(&[
        (sx, sy),
        (gap_x, sy),
        (gap_x, ey - clearance),
        (ex, ey - clearance),
        (ex, ey),
    ])
}
