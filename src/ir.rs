use serde::{Deserialize, Serialize};

use crate::layout::LayoutError;

/// Default node size used when a graph file omits one.
pub const DEFAULT_NODE_WIDTH: f32 = 150.0;
pub const DEFAULT_NODE_HEIGHT: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "TB", alias = "TD")]
    TopDown,
    #[serde(rename = "LR")]
    LeftRight,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TD" | "TB" => Some(Self::TopDown),
            "LR" => Some(Self::LeftRight),
            _ => None,
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s.trim()).ok_or_else(|| LayoutError::UnknownDirection(s.to_string()))
    }
}

/// Semantic role of a node. Only consulted by routing heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Process,
    Decision,
    Terminal,
}

impl NodeKind {
    pub fn shape(self) -> ShapeKind {
        match self {
            NodeKind::Process => ShapeKind::Rectangle,
            NodeKind::Decision => ShapeKind::Diamond,
            NodeKind::Terminal => ShapeKind::Ellipse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Ellipse,
    Diamond,
}

impl ShapeKind {
    pub fn from_element_type(token: &str) -> Option<Self> {
        match token {
            "rectangle" => Some(Self::Rectangle),
            "ellipse" => Some(Self::Ellipse),
            "diamond" => Some(Self::Diamond),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Diamond => "diamond",
        }
    }
}

/// A node to be placed. `x`/`y` are the node **center** once a layout has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_node_width")]
    pub width: f32,
    #[serde(default = "default_node_height")]
    pub height: f32,
    #[serde(default)]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

fn default_node_width() -> f32 {
    DEFAULT_NODE_WIDTH
}

fn default_node_height() -> f32 {
    DEFAULT_NODE_HEIGHT
}

impl Node {
    pub fn new(id: &str, label: &str, width: f32, height: f32) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            width,
            height,
            kind: None,
            x: 0.0,
            y: 0.0,
        }
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn shape(&self) -> ShapeKind {
        self.kind.unwrap_or_default().shape()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl Edge {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Input graph. Node order is significant: it is the processing order used to
/// break ties during layering and ordering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> &mut Self {
        self.nodes.push(node);
        self
    }

    pub fn add_edge(&mut self, edge: Edge) -> &mut Self {
        self.edges.push(edge);
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direction_tokens() {
        assert_eq!("TB".parse::<Direction>().ok(), Some(Direction::TopDown));
        assert_eq!("TD".parse::<Direction>().ok(), Some(Direction::TopDown));
        assert_eq!("LR".parse::<Direction>().ok(), Some(Direction::LeftRight));
        assert!("RL".parse::<Direction>().is_err());
    }

    #[test]
    fn graph_json_fills_default_sizes() {
        let graph: Graph = serde_json::from_str(
            r#"{
                "direction": "LR",
                "nodes": [{"id": "a", "label": "A"}, {"id": "b", "width": 90, "height": 40, "kind": "decision"}],
                "edges": [{"from": "a", "to": "b", "label": "go"}]
            }"#,
        )
        .unwrap();
        assert_eq!(graph.direction, Some(Direction::LeftRight));
        let a = graph.node("a").unwrap();
        assert_eq!((a.width, a.height), (DEFAULT_NODE_WIDTH, DEFAULT_NODE_HEIGHT));
        let b = graph.node("b").unwrap();
        assert_eq!(b.shape(), ShapeKind::Diamond);
        assert_eq!(graph.edges[0].label.as_deref(), Some("go"));
    }

    #[test]
    fn node_edges_are_relative_to_center() {
        let mut node = Node::new("n", "N", 100.0, 40.0);
        node.x = 200.0;
        node.y = 100.0;
        assert_eq!(node.left(), 150.0);
        assert_eq!(node.right(), 250.0);
        assert_eq!(node.top(), 80.0);
        assert_eq!(node.bottom(), 120.0);
    }
}
