use diagram_layout::{
    Config, Edge, Graph, LayoutConfig, Node, Point, compute_layout, route_layout, simplify_path,
};
use proptest::prelude::*;

const EPS: f32 = 1e-3;

fn grid_points() -> impl Strategy<Value = Vec<Point>> {
    prop::collection::vec((0i32..12, 0i32..12), 0..24).prop_map(|cells| {
        cells
            .into_iter()
            .map(|(x, y)| (x as f32 * 25.0, y as f32 * 25.0))
            .collect()
    })
}

fn sizes(max_nodes: usize) -> impl Strategy<Value = Vec<(f32, f32)>> {
    prop::collection::vec((40.0f32..220.0, 30.0f32..120.0), 1..max_nodes)
}

/// Graph with the given node sizes, a chain through all nodes and extra
/// forward edges picked from `extra` (pairs are reduced modulo the node count).
fn forward_graph(sizes: &[(f32, f32)], extra: &[(usize, usize)]) -> Graph {
    let mut graph = Graph::new();
    for (i, (w, h)) in sizes.iter().enumerate() {
        graph.add_node(Node::new(&format!("n{i}"), "", *w, *h));
    }
    for i in 1..sizes.len() {
        graph.add_edge(Edge::new(&format!("n{}", i - 1), &format!("n{i}")));
    }
    for (a, b) in extra {
        let (a, b) = (a % sizes.len(), b % sizes.len());
        if a < b {
            graph.add_edge(Edge::new(&format!("n{a}"), &format!("n{b}")));
        }
    }
    graph
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn simplify_path_is_idempotent(points in grid_points()) {
        let once = simplify_path(&points);
        let twice = simplify_path(&once);
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.len() <= points.len().max(1));
        if let (Some(first), Some(kept)) = (points.first(), once.first()) {
            prop_assert_eq!(first, kept);
        }
    }

    #[test]
    fn edgeless_graphs_form_one_non_overlapping_layer(sizes in sizes(12)) {
        let mut graph = Graph::new();
        for (i, (w, h)) in sizes.iter().enumerate() {
            graph.add_node(Node::new(&format!("n{i}"), "", *w, *h));
        }
        let layout = compute_layout(&graph, &LayoutConfig::default()).expect("layout failed");
        prop_assert_eq!(layout.layers.len(), 1);
        prop_assert_eq!(layout.layers[0].len(), sizes.len());
        let mut placed: Vec<&Node> = layout.nodes.values().collect();
        placed.sort_by(|a, b| a.x.total_cmp(&b.x));
        for pair in placed.windows(2) {
            prop_assert!(pair[0].right() <= pair[1].left() + EPS);
            prop_assert!((pair[0].top() - pair[1].top()).abs() < EPS);
        }
    }

    #[test]
    fn routed_paths_are_orthogonal(
        sizes in sizes(10),
        extra in prop::collection::vec((0usize..10, 0usize..10), 0..8),
    ) {
        let graph = forward_graph(&sizes, &extra);
        let config = Config::default();
        let layout = compute_layout(&graph, &config.layout).expect("layout failed");
        let routed = route_layout(&layout, None, &config);
        prop_assert_eq!(routed.arrows.len(), graph.edges.len());
        for arrow in &routed.arrows {
            for (a, b) in arrow.segments() {
                prop_assert!(
                    (a.0 - b.0).abs() < EPS || (a.1 - b.1).abs() < EPS,
                    "arrow {} has slanted segment {:?} -> {:?}",
                    arrow.id,
                    a,
                    b
                );
            }
        }
    }
}
