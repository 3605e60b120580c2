use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::error::LayoutError;
use super::types::LayoutResult;
use super::validate_nodes;
use crate::config::ForceConfig;
use crate::ir::{Direction, Edge, Node};

/// Keeps the inverse-square repulsion finite for coincident nodes.
const DISTANCE_FLOOR: f32 = 0.01;

/// Spring embedder: pairwise inverse-square repulsion, linear attraction along
/// edges and damped velocities for a fixed number of steps. Positions start
/// random; set `config.seed` for reproducible output. Force layouts carry no
/// layer grouping.
pub fn layout_force(
    nodes: &[Node],
    edges: &[Edge],
    config: &ForceConfig,
    direction: Direction,
) -> Result<LayoutResult, LayoutError> {
    validate_nodes(nodes)?;
    if nodes.is_empty() {
        return Ok(LayoutResult::empty(edges.to_vec(), direction));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let spread = config.initial_spread.max(0.0);
    let mut positions: Vec<(f32, f32)> = nodes
        .iter()
        .map(|_| (rng.gen_range(0.0..=spread), rng.gen_range(0.0..=spread)))
        .collect();
    let mut velocities = vec![(0.0_f32, 0.0_f32); nodes.len()];

    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, node)| (node.id.as_str(), idx))
        .collect();
    let springs: Vec<(usize, usize)> = edges
        .iter()
        .filter(|edge| !edge.is_self_loop())
        .filter_map(|edge| Some((*index.get(edge.from.as_str())?, *index.get(edge.to.as_str())?)))
        .collect();

    for _ in 0..config.iterations {
        let mut forces = vec![(0.0_f32, 0.0_f32); nodes.len()];

        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let dx = positions[i].0 - positions[j].0;
                let dy = positions[i].1 - positions[j].1;
                let distance = (dx * dx + dy * dy).sqrt() + DISTANCE_FLOOR;
                let magnitude = config.repulsion / (distance * distance);
                let fx = magnitude * dx / distance;
                let fy = magnitude * dy / distance;
                forces[i].0 += fx;
                forces[i].1 += fy;
                forces[j].0 -= fx;
                forces[j].1 -= fy;
            }
        }

        for &(source, target) in &springs {
            let dx = positions[target].0 - positions[source].0;
            let dy = positions[target].1 - positions[source].1;
            let distance = (dx * dx + dy * dy).sqrt() + DISTANCE_FLOOR;
            let magnitude = config.attraction * distance;
            let fx = magnitude * dx / distance;
            let fy = magnitude * dy / distance;
            forces[source].0 += fx;
            forces[source].1 += fy;
            forces[target].0 -= fx;
            forces[target].1 -= fy;
        }

        for ((position, velocity), force) in positions
            .iter_mut()
            .zip(velocities.iter_mut())
            .zip(forces.iter())
        {
            velocity.0 = (velocity.0 + force.0) * config.damping;
            velocity.1 = (velocity.1 + force.1) * config.damping;
            position.0 += velocity.0;
            position.1 += velocity.1;
        }
    }

    let min_x = positions.iter().map(|p| p.0).fold(f32::MAX, f32::min);
    let min_y = positions.iter().map(|p| p.1).fold(f32::MAX, f32::min);

    let mut placed = BTreeMap::new();
    for (node, (x, y)) in nodes.iter().zip(positions) {
        let mut positioned = node.clone();
        positioned.x = x - min_x + config.margin;
        positioned.y = y - min_y + config.margin;
        placed.insert(positioned.id.clone(), positioned);
    }

    debug!(
        nodes = nodes.len(),
        springs = springs.len(),
        iterations = config.iterations,
        seeded = config.seed.is_some(),
        "force-directed layout"
    );

    let mut result = LayoutResult {
        nodes: placed,
        edges: edges.to_vec(),
        width: 0.0,
        height: 0.0,
        layers: Vec::new(),
        aspect_ratio: 1.0,
        direction,
    };
    result.refresh_extent();
    Ok(result)
}
