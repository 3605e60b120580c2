use std::collections::HashSet;

use tracing::debug;

use super::types::{ColumnConnector, LayoutResult};
use crate::config::ColumnConfig;

/// Rebalances a tall layered layout into two side-by-side columns.
///
/// The split happens only when the layout has at least `min_layers` layers
/// and its aspect ratio is below `target_aspect_ratio * aspect_ratio_tolerance`.
/// Otherwise the input comes back untouched with no connector. The rule is
/// the same for both directions: a left-right layout that is still too tall
/// (wide layers stacked high) is split the same way.
///
/// Column B (the later half of the layers) is moved so its top lines up with
/// column A's top and its left edge sits `column_gap` right of column A. The
/// returned connector names one edge crossing the split, preferring an edge
/// between the two layers adjacent to the split point.
pub fn split_columns(
    mut result: LayoutResult,
    config: &ColumnConfig,
) -> (LayoutResult, Option<ColumnConnector>) {
    let threshold = config.target_aspect_ratio * config.aspect_ratio_tolerance;
    if result.layers.len() < config.min_layers || result.aspect_ratio >= threshold {
        debug!(
            layers = result.layers.len(),
            aspect_ratio = result.aspect_ratio,
            threshold,
            "column split skipped"
        );
        return (result, None);
    }

    let split_index = result.layers.len() / 2;
    let (left_layers, right_layers) = result.layers.split_at(split_index);
    let left_ids: HashSet<String> = left_layers.iter().flatten().cloned().collect();
    let right_ids: HashSet<String> = right_layers.iter().flatten().cloned().collect();
    let last_left: HashSet<&str> = left_layers
        .last()
        .map(|layer| layer.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let first_right: HashSet<&str> = right_layers
        .first()
        .map(|layer| layer.iter().map(String::as_str).collect())
        .unwrap_or_default();

    let adjacent = result
        .edges
        .iter()
        .find(|edge| last_left.contains(edge.from.as_str()) && first_right.contains(edge.to.as_str()));
    let crossing = adjacent.or_else(|| {
        result
            .edges
            .iter()
            .find(|edge| left_ids.contains(&edge.from) && right_ids.contains(&edge.to))
    });
    let crossing = crossing.map(|edge| (edge.from.clone(), edge.to.clone()));

    let Some(left_bounds) = bounds(&result, &left_ids) else {
        return (result, None);
    };
    let Some(right_bounds) = bounds(&result, &right_ids) else {
        return (result, None);
    };

    let offset_x = left_bounds.max_x + config.column_gap - right_bounds.min_x;
    let offset_y = left_bounds.min_y - right_bounds.min_y;
    for id in &right_ids {
        if let Some(node) = result.nodes.get_mut(id) {
            node.x += offset_x;
            node.y += offset_y;
        }
    }
    let before = result.aspect_ratio;
    result.refresh_extent();

    let connector = crossing.map(|(from, to)| ColumnConnector {
        from,
        to,
        gap_x: left_bounds.max_x + config.column_gap / 2.0,
    });
    debug!(
        split_index,
        before,
        after = result.aspect_ratio,
        connector = connector.is_some(),
        "split layout into two columns"
    );
    (result, connector)
}

struct Bounds {
    min_x: f32,
    min_y: f32,
    max_x: f32,
}

fn bounds(result: &LayoutResult, ids: &HashSet<String>) -> Option<Bounds> {
    let mut nodes = ids.iter().filter_map(|id| result.nodes.get(id)).peekable();
    nodes.peek()?;
    let mut bounds = Bounds {
        min_x: f32::MAX,
        min_y: f32::MAX,
        max_x: f32::MIN,
    };
    for node in nodes {
        bounds.min_x = bounds.min_x.min(node.left());
        bounds.min_y = bounds.min_y.min(node.top());
        bounds.max_x = bounds.max_x.max(node.right());
    }
    Some(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::{Direction, Edge, Node};
    use crate::layout::hierarchical::layout_hierarchical;

    fn chain(len: usize) -> LayoutResult {
        let nodes: Vec<Node> = (0..len)
            .map(|i| Node::new(&format!("n{i}"), "", 150.0, 60.0))
            .collect();
        let edges: Vec<Edge> = (1..len)
            .map(|i| Edge::new(&format!("n{}", i - 1), &format!("n{i}")))
            .collect();
        layout_hierarchical(&nodes, &edges, &LayoutConfig::default(), Direction::TopDown).unwrap()
    }

    #[test]
    fn tall_chain_splits_in_two() {
        let config = ColumnConfig::default();
        let tall = chain(6);
        assert!(tall.aspect_ratio < 0.7);
        let (split, connector) = split_columns(tall.clone(), &config);

        let connector = connector.expect("crossing edge");
        assert_eq!(connector.from, "n2");
        assert_eq!(connector.to, "n3");
        assert_eq!(connector.gap_x, tall.nodes["n0"].right() + config.column_gap / 2.0);

        // Column B starts level with column A and one gap to its right.
        assert_eq!(split.nodes["n3"].top(), split.nodes["n0"].top());
        assert_eq!(
            split.nodes["n3"].left(),
            split.nodes["n0"].right() + config.column_gap
        );
        assert!(split.aspect_ratio > tall.aspect_ratio);
        assert_eq!(split.layers, tall.layers);
    }

    #[test]
    fn tall_left_right_layout_is_split_too() {
        // Six parallel four-step chains: four layers, each six nodes high.
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for lane in 0..6 {
            for step in 0..4 {
                nodes.push(Node::new(&format!("l{lane}s{step}"), "", 150.0, 60.0));
                if step > 0 {
                    edges.push(Edge::new(
                        &format!("l{lane}s{}", step - 1),
                        &format!("l{lane}s{step}"),
                    ));
                }
            }
        }
        let config = ColumnConfig::default();
        let lr =
            layout_hierarchical(&nodes, &edges, &LayoutConfig::default(), Direction::LeftRight)
                .unwrap();
        assert_eq!(lr.layers.len(), 4);
        assert!(lr.aspect_ratio < config.target_aspect_ratio * config.aspect_ratio_tolerance);

        let (split, connector) = split_columns(lr.clone(), &config);
        let connector = connector.expect("crossing edge");
        assert_eq!((connector.from.as_str(), connector.to.as_str()), ("l0s1", "l0s2"));
        assert_eq!(split.layers, lr.layers);
        assert_eq!(split.nodes["l0s2"].top(), split.nodes["l0s0"].top());
        assert_eq!(
            split.nodes["l0s2"].left(),
            split.nodes["l0s1"].right() + config.column_gap
        );
        assert!(split.aspect_ratio > lr.aspect_ratio);
    }

    #[test]
    fn acceptable_layout_is_returned_unchanged() {
        let config = ColumnConfig {
            target_aspect_ratio: 0.1,
            ..ColumnConfig::default()
        };
        let layout = chain(6);
        let (same, connector) = split_columns(layout.clone(), &config);
        assert_eq!(same, layout);
        assert!(connector.is_none());
    }

    #[test]
    fn too_few_layers_is_not_split() {
        let layout = chain(3);
        let (same, connector) = split_columns(layout.clone(), &ColumnConfig::default());
        assert_eq!(same, layout);
        assert!(connector.is_none());
    }

    #[test]
    fn split_without_crossing_edge_has_no_connector() {
        let mut layout = chain(6);
        layout.edges.clear();
        let (split, connector) = split_columns(layout.clone(), &ColumnConfig::default());
        assert!(connector.is_none());
        assert_ne!(split.nodes["n5"].x, layout.nodes["n5"].x);
    }

    #[test]
    fn falls_back_to_any_crossing_edge() {
        let mut layout = chain(6);
        layout.edges = vec![Edge::new("n0", "n5")];
        let (_, connector) = split_columns(layout, &ColumnConfig::default());
        let connector = connector.expect("crossing edge");
        assert_eq!((connector.from.as_str(), connector.to.as_str()), ("n0", "n5"));
    }
}
