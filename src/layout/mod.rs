mod columns;
mod error;
mod force;
mod hierarchical;
mod ports;
mod ranking;
mod routing;
pub(crate) mod types;
pub use columns::split_columns;
pub use error::LayoutError;
pub use force::layout_force;
pub use hierarchical::layout_hierarchical;
pub use ports::{PortMode, column_connector_path, connection_point, decision_exit_sides};
pub use routing::{GridRouter, simplify_path};
pub use types::*;

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::{Config, LayoutAlgorithm, LayoutConfig};
use crate::geometry::{Arrow, ShapeBox};
use crate::ir::{Graph, Node};

/// Lays out `graph` with the configured algorithm. A direction set on the
/// graph overrides the configured one.
pub fn compute_layout(graph: &Graph, config: &LayoutConfig) -> Result<LayoutResult, LayoutError> {
    let direction = graph.direction.unwrap_or(config.direction);
    match config.algorithm {
        LayoutAlgorithm::Hierarchical => {
            layout_hierarchical(&graph.nodes, &graph.edges, config, direction)
        }
        LayoutAlgorithm::Force => layout_force(&graph.nodes, &graph.edges, &config.force, direction),
    }
}

/// Like [`compute_layout`] with the algorithm picked by name
/// (`hierarchical`/`sugiyama` or `force`/`force-directed`).
pub fn auto_layout(
    graph: &Graph,
    algorithm: &str,
    config: &LayoutConfig,
) -> Result<LayoutResult, LayoutError> {
    let algorithm: LayoutAlgorithm = algorithm.parse()?;
    let config = LayoutConfig {
        algorithm,
        ..config.clone()
    };
    compute_layout(graph, &config)
}

/// Layout followed by the optional two-column split.
pub fn layout_graph(
    graph: &Graph,
    config: &LayoutConfig,
) -> Result<(LayoutResult, Option<ColumnConnector>), LayoutError> {
    let result = compute_layout(graph, config)?;
    if config.columns.enabled {
        Ok(split_columns(result, &config.columns))
    } else {
        Ok((result, None))
    }
}

/// Turns a finished layout into boxes and routed arrows.
///
/// Every edge except self-loops gets one elbowed arrow bound to its endpoint
/// boxes, routed by a single [`GridRouter`] over all boxes. Labelled branches
/// of two-way decisions leave through opposite corners. Edges matching the
/// column connector are replaced by one arrow through the column gap.
pub fn route_layout(
    result: &LayoutResult,
    connector: Option<&ColumnConnector>,
    config: &Config,
) -> RoutedDiagram {
    let boxes: Vec<ShapeBox> = result.nodes.values().map(ShapeBox::from_node).collect();
    let by_id: HashMap<&str, &ShapeBox> = boxes.iter().map(|b| (b.id.as_str(), b)).collect();
    let router = GridRouter::new(&boxes, &config.routing);
    let exit_sides = decision_exit_sides(&result.nodes, &result.edges);

    let mut ids = ArrowIds::default();
    let mut arrows = Vec::with_capacity(result.edges.len());
    for edge in &result.edges {
        if edge.is_self_loop() {
            debug!(node = %edge.from, "not routing self-loop");
            continue;
        }
        if connector.is_some_and(|c| c.from == edge.from && c.to == edge.to) {
            continue;
        }
        let (Some(source), Some(target)) =
            (by_id.get(edge.from.as_str()), by_id.get(edge.to.as_str()))
        else {
            debug!(from = %edge.from, to = %edge.to, "not routing edge with unknown endpoint");
            continue;
        };
        let forced = exit_sides
            .get(&(edge.from.clone(), edge.to.clone()))
            .copied();
        let start = connection_point(source, target, PortMode::Exit, forced);
        let end = connection_point(target, source, PortMode::Entry, None);
        let waypoints = router.find_route(start, end);

        let mut arrow = Arrow::from_waypoints(&ids.next(&edge.from, &edge.to), &waypoints)
            .bound(&edge.from, &edge.to);
        arrow.label = edge.label.clone();
        arrows.push(arrow);
    }

    if let Some(connector) = connector {
        if let (Some(source), Some(target)) = (
            by_id.get(connector.from.as_str()),
            by_id.get(connector.to.as_str()),
        ) {
            let path = column_connector_path(
                source,
                target,
                connector.gap_x,
                config.layout.columns.connector_clearance,
            );
            let mut arrow = Arrow::from_waypoints(&ids.next(&connector.from, &connector.to), &path)
                .bound(&connector.from, &connector.to);
            arrow.label = result
                .edges
                .iter()
                .find(|edge| edge.from == connector.from && edge.to == connector.to)
                .and_then(|edge| edge.label.clone());
            arrows.push(arrow);
        }
    }

    debug!(boxes = boxes.len(), arrows = arrows.len(), "routed layout");
    RoutedDiagram { boxes, arrows }
}

/// `from->to` arrow ids, suffixed with `#n` for parallel edges.
#[derive(Default)]
struct ArrowIds {
    seen: HashMap<String, usize>,
}

impl ArrowIds {
    fn next(&mut self, from: &str, to: &str) -> String {
        let base = format!("{from}->{to}");
        let count = self.seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 { base } else { format!("{base}#{count}") }
    }
}

/// Rejects duplicate ids and non-positive or non-finite sizes.
pub(crate) fn validate_nodes(nodes: &[Node]) -> Result<(), LayoutError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(nodes.len());
    for node in nodes {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !valid(node.width) || !valid(node.height) {
            return Err(LayoutError::InvalidNodeSize {
                id: node.id.clone(),
                width: node.width,
                height: node.height,
            });
        }
        if !seen.insert(node.id.as_str()) {
            return Err(LayoutError::DuplicateNode(node.id.clone()));
        }
    }
    Ok(())
}
