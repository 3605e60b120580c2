use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::ir::Edge;

/// Layer assignment for one connected component.
#[derive(Debug, Clone, Default)]
pub(super) struct Ranking {
    pub(super) ranks: HashMap<String, usize>,
    /// Edges pointing against the processing order. They never raise a rank.
    pub(super) back_edges: HashSet<(String, String)>,
}

impl Ranking {
    pub(super) fn is_back_edge(&self, edge: &Edge) -> bool {
        self.back_edges
            .contains(&(edge.from.clone(), edge.to.clone()))
    }
}

/// Topological order of `node_ids` over `edges`, ties broken by declaration
/// order. A cycle is broken by taking the earliest remaining node that is
/// already reached from a processed node as the next source, so the edges
/// closing the cycle become back edges. Only a cycle with no processed
/// predecessor at all restarts from the earliest remaining node.
pub(super) fn topological_order(
    node_ids: &[String],
    edges: &[&Edge],
    node_order: &HashMap<String, usize>,
) -> Vec<String> {
    let set: HashSet<&str> = node_ids.iter().map(String::as_str).collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut preds: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indeg: HashMap<&str, usize> = set.iter().map(|id| (*id, 0)).collect();

    for edge in edges {
        if edge.is_self_loop() || !set.contains(edge.from.as_str()) || !set.contains(edge.to.as_str())
        {
            continue;
        }
        adj.entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
        preds
            .entry(edge.to.as_str())
            .or_default()
            .push(edge.from.as_str());
        if let Some(deg) = indeg.get_mut(edge.to.as_str()) {
            *deg += 1;
        }
    }

    let order_key = |id: &str| -> usize { node_order.get(id).copied().unwrap_or(usize::MAX) };

    let mut ready: BinaryHeap<Reverse<(usize, &str)>> = BinaryHeap::new();
    for id in node_ids {
        if indeg.get(id.as_str()).copied().unwrap_or(0) == 0 {
            ready.push(Reverse((order_key(id), id.as_str())));
        }
    }

    let mut order: Vec<String> = Vec::with_capacity(set.len());
    let mut processed: HashSet<&str> = HashSet::new();
    loop {
        while let Some(Reverse((_key, id))) = ready.pop() {
            if !processed.insert(id) {
                continue;
            }
            order.push(id.to_string());
            if let Some(nexts) = adj.get(id) {
                for next in nexts {
                    if processed.contains(next) {
                        continue;
                    }
                    if let Some(deg) = indeg.get_mut(next) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            ready.push(Reverse((order_key(next), next)));
                        }
                    }
                }
            }
        }

        if processed.len() >= set.len() {
            break;
        }

        // Cycle: restart inside it from where the processed part enters it.
        let remaining = || {
            node_ids
                .iter()
                .map(String::as_str)
                .filter(|id| !processed.contains(id))
        };
        let reached = remaining()
            .filter(|id| {
                preds
                    .get(id)
                    .is_some_and(|from| from.iter().any(|p| processed.contains(p)))
            })
            .min_by_key(|id| order_key(id));
        let next = reached.or_else(|| remaining().min_by_key(|id| order_key(id)));
        match next {
            Some(id) => ready.push(Reverse((order_key(id), id))),
            None => break,
        }
    }

    order
}

/// Longest-path layering over the forward edges of the topological order.
pub(super) fn compute_ranks(
    node_ids: &[String],
    edges: &[&Edge],
    node_order: &HashMap<String, usize>,
) -> Ranking {
    let order = topological_order(node_ids, edges, node_order);
    let order_index: HashMap<&str, usize> = order
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();

    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut back_edges = HashSet::new();
    for edge in edges {
        if edge.is_self_loop() {
            continue;
        }
        let (Some(from_idx), Some(to_idx)) = (
            order_index.get(edge.from.as_str()),
            order_index.get(edge.to.as_str()),
        ) else {
            continue;
        };
        if to_idx <= from_idx {
            back_edges.insert((edge.from.clone(), edge.to.clone()));
            continue;
        }
        adj.entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
    }

    let mut ranks: HashMap<String, usize> = HashMap::new();
    for node in &order {
        let rank = *ranks.entry(node.clone()).or_insert(0);
        if let Some(nexts) = adj.get(node.as_str()) {
            for next in nexts {
                let entry = ranks.entry(next.to_string()).or_insert(0);
                *entry = (*entry).max(rank + 1);
            }
        }
    }

    Ranking { ranks, back_edges }
}

/// Groups nodes by rank, each bucket in declaration order.
pub(super) fn rank_buckets(
    node_ids: &[String],
    ranks: &HashMap<String, usize>,
    node_order: &HashMap<String, usize>,
) -> Vec<Vec<String>> {
    let max_rank = ranks.values().copied().max().unwrap_or(0);
    let mut buckets: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
    for node_id in node_ids {
        let rank = ranks.get(node_id).copied().unwrap_or(0);
        buckets[rank].push(node_id.clone());
    }
    for bucket in &mut buckets {
        bucket.sort_by_key(|id| node_order.get(id).copied().unwrap_or(usize::MAX));
    }
    buckets.retain(|bucket| !bucket.is_empty());
    buckets
}

/// Provisional x-centers of every node when each bucket is packed
/// left-to-right and centered on x = 0.
pub(super) fn bucket_centers(
    rank_nodes: &[Vec<String>],
    widths: &HashMap<String, f32>,
    spacing: f32,
) -> HashMap<String, f32> {
    let mut centers = HashMap::new();
    for bucket in rank_nodes {
        let total: f32 = bucket
            .iter()
            .map(|id| widths.get(id).copied().unwrap_or(0.0))
            .sum::<f32>()
            + spacing * bucket.len().saturating_sub(1) as f32;
        let mut cursor = -total / 2.0;
        for id in bucket {
            let width = widths.get(id).copied().unwrap_or(0.0);
            centers.insert(id.clone(), cursor + width / 2.0);
            cursor += width + spacing;
        }
    }
    centers
}

/// Barycentric crossing reduction: alternating down/up sweeps that re-sort
/// each layer by the median x of its already-placed neighbours. Stops after
/// `passes` sweeps or once a sweep changes nothing.
pub(super) fn order_rank_nodes(
    rank_nodes: &mut [Vec<String>],
    edges: &[&Edge],
    node_order: &HashMap<String, usize>,
    widths: &HashMap<String, f32>,
    spacing: f32,
    passes: usize,
) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let mut incoming: HashMap<String, Vec<String>> = HashMap::new();
    let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();

    for edge in edges {
        outgoing
            .entry(edge.from.clone())
            .or_default()
            .push(edge.to.clone());
        incoming
            .entry(edge.to.clone())
            .or_default()
            .push(edge.from.clone());
    }

    let sort_bucket = |bucket: &mut Vec<String>,
                       neighbors: &HashMap<String, Vec<String>>,
                       positions: &HashMap<String, f32>|
     -> bool {
        let before = bucket.clone();
        let current_positions: HashMap<String, usize> = bucket
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();
        let scores: HashMap<String, f32> = bucket
            .iter()
            .map(|id| (id.clone(), median_position(id, neighbors, positions)))
            .collect();
        bucket.sort_by(|a, b| {
            let a_score = scores.get(a).copied().unwrap_or(0.0);
            let b_score = scores.get(b).copied().unwrap_or(0.0);
            match a_score.partial_cmp(&b_score) {
                Some(std::cmp::Ordering::Equal) | None => {
                    let a_pos = current_positions.get(a).copied().unwrap_or(0);
                    let b_pos = current_positions.get(b).copied().unwrap_or(0);
                    match a_pos.cmp(&b_pos) {
                        std::cmp::Ordering::Equal => node_order
                            .get(a)
                            .copied()
                            .unwrap_or(usize::MAX)
                            .cmp(&node_order.get(b).copied().unwrap_or(usize::MAX)),
                        other => other,
                    }
                }
                Some(ordering) => ordering,
            }
        });
        *bucket != before
    };

    let mut positions = bucket_centers(rank_nodes, widths, spacing);
    for _ in 0..passes.max(1) {
        let mut changed = false;
        for rank in 1..rank_nodes.len() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            if sort_bucket(&mut rank_nodes[rank], &incoming, &positions) {
                changed = true;
                positions = bucket_centers(rank_nodes, widths, spacing);
            }
        }
        for rank in (0..rank_nodes.len() - 1).rev() {
            if rank_nodes[rank].len() <= 1 {
                continue;
            }
            if sort_bucket(&mut rank_nodes[rank], &outgoing, &positions) {
                changed = true;
                positions = bucket_centers(rank_nodes, widths, spacing);
            }
        }
        if !changed {
            break;
        }
    }
}

/// Median x of the placed neighbours of `node_id`; a node without placed
/// neighbours keeps its own x.
pub(super) fn median_position(
    node_id: &str,
    neighbors: &HashMap<String, Vec<String>>,
    positions: &HashMap<String, f32>,
) -> f32 {
    let own = positions.get(node_id).copied().unwrap_or(0.0);
    let Some(list) = neighbors.get(node_id) else {
        return own;
    };
    let mut values: Vec<f32> = list
        .iter()
        .filter_map(|neighbor| positions.get(neighbor).copied())
        .collect();
    if values.is_empty() {
        return own;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) * 0.5
    }
}
