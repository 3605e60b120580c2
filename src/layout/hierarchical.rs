use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use super::error::LayoutError;
use super::ranking::{compute_ranks, order_rank_nodes, rank_buckets};
use super::types::LayoutResult;
use super::validate_nodes;
use crate::config::LayoutConfig;
use crate::ir::{Direction, Edge, Node};

/// Sub-pixel slack when checking whether two neighbours in a layer collide.
const OVERLAP_EPSILON: f32 = 1e-3;

/// Scratch placement of one connected component, relative to its own origin.
struct ComponentPlacement {
    centers: HashMap<String, (f32, f32)>,
    layers: Vec<Vec<String>>,
    min_x: f32,
    max_x: f32,
}

/// Layered placement. Returned coordinates are node centers, with the
/// top-left of the drawing at the origin.
pub fn layout_hierarchical(
    nodes: &[Node],
    edges: &[Edge],
    config: &LayoutConfig,
    direction: Direction,
) -> Result<LayoutResult, LayoutError> {
    validate_nodes(nodes)?;
    if nodes.is_empty() {
        return Ok(LayoutResult::empty(edges.to_vec(), direction));
    }

    let node_order: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.clone(), idx))
        .collect();
    let sizes: HashMap<String, (f32, f32)> = nodes
        .iter()
        .map(|node| (node.id.clone(), (node.width, node.height)))
        .collect();

    let mut links: Vec<&Edge> = Vec::with_capacity(edges.len());
    for edge in edges {
        if edge.is_self_loop() {
            debug!(node = %edge.from, "ignoring self-loop during layering");
            continue;
        }
        if !node_order.contains_key(&edge.from) || !node_order.contains_key(&edge.to) {
            debug!(from = %edge.from, to = %edge.to, "ignoring edge with unknown endpoint");
            continue;
        }
        links.push(edge);
    }

    let components = connected_components(nodes, &links, &node_order);

    let mut centers: HashMap<String, (f32, f32)> = HashMap::new();
    let mut merged_layers: Vec<Vec<String>> = Vec::new();
    let mut cursor_x = 0.0_f32;
    for component in &components {
        let member_set: HashSet<&str> = component.iter().map(String::as_str).collect();
        let component_links: Vec<&Edge> = links
            .iter()
            .copied()
            .filter(|edge| member_set.contains(edge.from.as_str()))
            .collect();
        let placement = place_component(component, &component_links, &node_order, &sizes, config);

        let shift_x = cursor_x - placement.min_x;
        for (id, (x, y)) in placement.centers {
            centers.insert(id, (x + shift_x, y));
        }
        cursor_x = placement.max_x + shift_x + 2.0 * config.horizontal_spacing;

        for (depth, layer) in placement.layers.into_iter().enumerate() {
            if merged_layers.len() <= depth {
                merged_layers.push(Vec::new());
            }
            merged_layers[depth].extend(layer);
        }
    }

    let mut placed: BTreeMap<String, Node> = BTreeMap::new();
    for node in nodes {
        let (x, y) = centers.get(&node.id).copied().unwrap_or((0.0, 0.0));
        let mut positioned = node.clone();
        match direction {
            Direction::TopDown => {
                positioned.x = x;
                positioned.y = y;
            }
            Direction::LeftRight => {
                positioned.x = y;
                positioned.y = x;
                positioned.width = node.height;
                positioned.height = node.width;
            }
        }
        placed.insert(positioned.id.clone(), positioned);
    }

    debug!(
        nodes = nodes.len(),
        edges = links.len(),
        components = components.len(),
        layers = merged_layers.len(),
        "hierarchical layout"
    );

    let mut result = LayoutResult {
        nodes: placed,
        edges: edges.to_vec(),
        width: 0.0,
        height: 0.0,
        layers: merged_layers,
        aspect_ratio: 1.0,
        direction,
    };
    result.refresh_extent();
    Ok(result)
}

/// Weakly connected components, each in declaration order, ordered by their
/// first declared node.
fn connected_components(
    nodes: &[Node],
    links: &[&Edge],
    node_order: &HashMap<String, usize>,
) -> Vec<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in links {
        adjacency
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
        adjacency
            .entry(edge.to.as_str())
            .or_default()
            .push(edge.from.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::new();
    let mut components: Vec<Vec<String>> = Vec::new();
    for node in nodes {
        if !visited.insert(node.id.as_str()) {
            continue;
        }
        let mut stack = vec![node.id.as_str()];
        let mut comp = Vec::new();
        while let Some(cur) = stack.pop() {
            comp.push(cur.to_string());
            if let Some(neigh) = adjacency.get(cur) {
                for next in neigh {
                    if visited.insert(next) {
                        stack.push(next);
                    }
                }
            }
        }
        comp.sort_by_key(|id| node_order.get(id).copied().unwrap_or(usize::MAX));
        components.push(comp);
    }
    components
}

fn place_component(
    member_ids: &[String],
    links: &[&Edge],
    node_order: &HashMap<String, usize>,
    sizes: &HashMap<String, (f32, f32)>,
    config: &LayoutConfig,
) -> ComponentPlacement {
    let ranking = compute_ranks(member_ids, links, node_order);
    let forward: Vec<&Edge> = links
        .iter()
        .copied()
        .filter(|edge| !ranking.is_back_edge(edge))
        .collect();

    let widths: HashMap<String, f32> = member_ids
        .iter()
        .map(|id| (id.clone(), size_of(sizes, id).0))
        .collect();
    let mut rank_nodes = rank_buckets(member_ids, &ranking.ranks, node_order);
    order_rank_nodes(
        &mut rank_nodes,
        &forward,
        node_order,
        &widths,
        config.horizontal_spacing,
        config.crossing_passes,
    );

    let mut centers = assign_positions(&rank_nodes, sizes, config);
    align_to_parents(&mut rank_nodes, &forward, sizes, &mut centers, config);

    let mut min_x = f32::MAX;
    let mut max_x = f32::MIN;
    for (id, (x, _)) in &centers {
        let half = size_of(sizes, id).0 / 2.0;
        min_x = min_x.min(x - half);
        max_x = max_x.max(x + half);
    }
    if min_x > max_x {
        min_x = 0.0;
        max_x = 0.0;
    }

    ComponentPlacement {
        centers,
        layers: rank_nodes,
        min_x,
        max_x,
    }
}

/// Packs each layer left-to-right around x = 0. A layer's nodes share its
/// center line; the next layer starts below the tallest node plus spacing.
fn assign_positions(
    rank_nodes: &[Vec<String>],
    sizes: &HashMap<String, (f32, f32)>,
    config: &LayoutConfig,
) -> HashMap<String, (f32, f32)> {
    let mut centers = HashMap::new();
    let mut main_cursor = 0.0_f32;
    for bucket in rank_nodes {
        let max_height = bucket
            .iter()
            .map(|id| size_of(sizes, id).1)
            .fold(0.0_f32, f32::max);
        let layer_width: f32 = bucket.iter().map(|id| size_of(sizes, id).0).sum::<f32>()
            + config.horizontal_spacing * bucket.len().saturating_sub(1) as f32;
        let center_y = main_cursor + max_height / 2.0;
        let mut cross_cursor = -layer_width / 2.0;
        for id in bucket {
            let width = size_of(sizes, id).0;
            centers.insert(id.clone(), (cross_cursor + width / 2.0, center_y));
            cross_cursor += width + config.horizontal_spacing;
        }
        main_cursor += max_height + config.vertical_spacing;
    }
    centers
}

/// Top-down pass pulling single-parent nodes under their parent: chains line
/// up exactly and branch points center under their sole parent. Each layer is
/// then swept left-to-right to push apart anything the moves made collide.
fn align_to_parents(
    rank_nodes: &mut [Vec<String>],
    forward: &[&Edge],
    sizes: &HashMap<String, (f32, f32)>,
    centers: &mut HashMap<String, (f32, f32)>,
    config: &LayoutConfig,
) {
    let mut parents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in forward {
        let parent_list = parents.entry(edge.to.as_str()).or_default();
        if !parent_list.contains(&edge.from.as_str()) {
            parent_list.push(edge.from.as_str());
        }
        let child_list = children.entry(edge.from.as_str()).or_default();
        if !child_list.contains(&edge.to.as_str()) {
            child_list.push(edge.to.as_str());
        }
    }
    let child_count = |id: &str| children.get(id).map_or(0, Vec::len);

    for bucket in rank_nodes.iter_mut() {
        for id in bucket.iter() {
            let Some([parent]) = parents.get(id.as_str()).map(Vec::as_slice) else {
                continue;
            };
            if child_count(*parent) != 1 && child_count(id.as_str()) < 2 {
                continue;
            }
            let Some(&(parent_x, _)) = centers.get(*parent) else {
                continue;
            };
            if let Some(center) = centers.get_mut(id) {
                center.0 = parent_x;
            }
        }
        separate_layer(bucket, sizes, centers, config.horizontal_spacing);
    }
}

/// Restores the spacing invariant inside one layer: nodes are taken in x
/// order and any node closer than `spacing` to its left neighbour is pushed
/// right. The bucket is reordered to match.
fn separate_layer(
    bucket: &mut [String],
    sizes: &HashMap<String, (f32, f32)>,
    centers: &mut HashMap<String, (f32, f32)>,
    spacing: f32,
) {
    if bucket.len() < 2 {
        return;
    }
    let x_of = |centers: &HashMap<String, (f32, f32)>, id: &str| {
        centers.get(id).map_or(0.0, |center| center.0)
    };
    bucket.sort_by(|a, b| x_of(&*centers, a).total_cmp(&x_of(&*centers, b)));

    let mut prev_right = f32::MIN;
    for id in bucket.iter() {
        let half = size_of(sizes, id).0 / 2.0;
        if let Some(center) = centers.get_mut(id) {
            let min_left = prev_right + spacing;
            if prev_right > f32::MIN && center.0 - half < min_left - OVERLAP_EPSILON {
                center.0 = min_left + half;
            }
            prev_right = center.0 + half;
        }
    }
}

fn size_of(sizes: &HashMap<String, (f32, f32)>, id: &str) -> (f32, f32) {
    sizes.get(id).copied().unwrap_or((0.0, 0.0))
}
