use std::collections::BTreeMap;

use serde::Serialize;

use crate::geometry::{Arrow, ShapeBox};
use crate::ir::{Direction, Edge, Node};

/// Positioned graph. Node coordinates are centers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutResult {
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
    pub width: f32,
    pub height: f32,
    /// Node ids grouped by layer, in layer order; empty for force layouts.
    pub layers: Vec<Vec<String>>,
    pub aspect_ratio: f32,
    pub direction: Direction,
}

impl LayoutResult {
    pub fn empty(edges: Vec<Edge>, direction: Direction) -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges,
            width: 0.0,
            height: 0.0,
            layers: Vec::new(),
            aspect_ratio: 1.0,
            direction,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Recomputes `width`, `height` and `aspect_ratio` as the extent of all
    /// nodes measured from the origin.
    pub fn refresh_extent(&mut self) {
        let mut max_x: f32 = 0.0;
        let mut max_y: f32 = 0.0;
        for node in self.nodes.values() {
            max_x = max_x.max(node.right());
            max_y = max_y.max(node.bottom());
        }
        self.width = max_x;
        self.height = max_y;
        self.aspect_ratio = aspect_ratio(max_x, max_y);
    }
}

pub(crate) fn aspect_ratio(width: f32, height: f32) -> f32 {
    if height > 0.0 { width / height } else { 1.0 }
}

/// The single edge that crosses a two-column split, drawn through the gap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnConnector {
    pub from: String,
    pub to: String,
    /// x-coordinate of the middle of the whitespace between the columns.
    pub gap_x: f32,
}

/// Boxes materialised from a layout plus one routed arrow per edge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutedDiagram {
    pub boxes: Vec<ShapeBox>,
    pub arrows: Vec<Arrow>,
}
