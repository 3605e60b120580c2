use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::geometry::{Point, ShapeBox};

/// A grid point within this distance of a box edge counts as inside it.
const OBSTACLE_TOLERANCE: f32 = 1.0;
/// Two points closer than this on both axes are the same point.
const SAME_POINT_EPSILON: f32 = 1e-3;
/// Relative cross-product slack when testing three points for collinearity.
const COLLINEAR_EPSILON: f32 = 1e-4;

/// Moves on the 4-connected grid: up, down, left, right.
const DIRS: [(isize, isize); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

/// Axis of the move that reached a search state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    fn of(dx: isize) -> Self {
        if dx != 0 { Axis::Horizontal } else { Axis::Vertical }
    }

    fn slot(axis: Option<Axis>) -> usize {
        match axis {
            None => 0,
            Some(Axis::Horizontal) => 1,
            Some(Axis::Vertical) => 2,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct GridState {
    x: usize,
    y: usize,
    axis: Option<Axis>,
}

#[derive(Clone, Copy, Debug)]
struct GridEntry {
    est: f32,
    seq: u64,
    cost: f32,
    state: GridState,
}

impl Ord for GridEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .total_cmp(&self.est)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for GridEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GridEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GridEntry {}

/// Orthogonal A* router over a sparse grid made from obstacle outlines.
///
/// Grid lines are each box's `left - margin`, `left`, center, `right` and
/// `right + margin` (and the same vertically), so the search space grows with
/// the number of boxes rather than with the canvas size.
#[derive(Debug, Clone)]
pub struct GridRouter {
    xs: Vec<f32>,
    ys: Vec<f32>,
    blocked: Vec<bool>,
    bend_penalty: f32,
    max_expansions: usize,
}

impl GridRouter {
    pub fn new(boxes: &[ShapeBox], config: &RoutingConfig) -> Self {
        let margin = config.margin;
        let mut xs = Vec::with_capacity(boxes.len() * 5);
        let mut ys = Vec::with_capacity(boxes.len() * 5);
        for shape in boxes {
            let (cx, cy) = shape.center();
            xs.extend([
                shape.left() - margin,
                shape.left(),
                cx,
                shape.right(),
                shape.right() + margin,
            ]);
            ys.extend([
                shape.top() - margin,
                shape.top(),
                cy,
                shape.bottom(),
                shape.bottom() + margin,
            ]);
        }
        let xs = sorted_lines(xs);
        let ys = sorted_lines(ys);

        let mut blocked = vec![false; xs.len() * ys.len()];
        for shape in boxes {
            let x_range = line_range(
                &xs,
                shape.left() - OBSTACLE_TOLERANCE,
                shape.right() + OBSTACLE_TOLERANCE,
            );
            let y_range = line_range(
                &ys,
                shape.top() - OBSTACLE_TOLERANCE,
                shape.bottom() + OBSTACLE_TOLERANCE,
            );
            for iy in y_range {
                for ix in x_range.clone() {
                    blocked[iy * xs.len() + ix] = true;
                }
            }
        }

        debug!(
            boxes = boxes.len(),
            columns = xs.len(),
            rows = ys.len(),
            blocked = blocked.iter().filter(|b| **b).count(),
            "built routing grid"
        );

        Self {
            xs,
            ys,
            blocked,
            bend_penalty: config.bend_penalty,
            max_expansions: config.max_expansions,
        }
    }

    /// Vertical grid lines, strictly increasing.
    pub fn x_lines(&self) -> &[f32] {
        &self.xs
    }

    /// Horizontal grid lines, strictly increasing.
    pub fn y_lines(&self) -> &[f32] {
        &self.ys
    }

    pub fn is_blocked(&self, ix: usize, iy: usize) -> bool {
        ix < self.xs.len() && iy < self.ys.len() && self.blocked[self.index(ix, iy)]
    }

    /// Routes from `start` to `end`. Both snap to their nearest grid point and
    /// may sit inside an obstacle. The result is simplified to its turn
    /// points. When no path exists, or the expansion budget runs out, the
    /// straight segment `[start, end]` is returned instead.
    pub fn find_route(&self, start: Point, end: Point) -> Vec<Point> {
        let (Some(start_cell), Some(end_cell)) = (self.nearest_cell(start), self.nearest_cell(end))
        else {
            return vec![start, end];
        };
        if start_cell == end_cell {
            return vec![start, end];
        }
        match self.search(start_cell, end_cell) {
            Some(cells) => {
                let points: Vec<Point> = cells
                    .into_iter()
                    .map(|(ix, iy)| (self.xs[ix], self.ys[iy]))
                    .collect();
                simplify_path(&points)
            }
            None => vec![start, end],
        }
    }

    fn index(&self, ix: usize, iy: usize) -> usize {
        iy * self.xs.len() + ix
    }

    fn state_index(&self, state: GridState) -> usize {
        self.index(state.x, state.y) * 3 + Axis::slot(state.axis)
    }

    fn nearest_cell(&self, point: Point) -> Option<(usize, usize)> {
        Some((nearest_line(&self.xs, point.0)?, nearest_line(&self.ys, point.1)?))
    }

    fn heuristic(&self, (ix, iy): (usize, usize), (gx, gy): (usize, usize)) -> f32 {
        (self.xs[ix] - self.xs[gx]).abs() + (self.ys[iy] - self.ys[gy]).abs()
    }

    /// A* over `(cell, last axis)`. The start and end cells are passable even
    /// when blocked; the grid itself is never modified.
    fn search(&self, start: (usize, usize), end: (usize, usize)) -> Option<Vec<(usize, usize)>> {
        let cols = self.xs.len() as isize;
        let rows = self.ys.len() as isize;
        let states = self.xs.len() * self.ys.len() * 3;
        let mut best_cost = vec![f32::INFINITY; states];
        let mut prev: Vec<Option<GridState>> = vec![None; states];
        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;

        let origin = GridState {
            x: start.0,
            y: start.1,
            axis: None,
        };
        best_cost[self.state_index(origin)] = 0.0;
        heap.push(GridEntry {
            est: self.heuristic(start, end),
            seq,
            cost: 0.0,
            state: origin,
        });

        let passable = |ix: usize, iy: usize| {
            (ix, iy) == start || (ix, iy) == end || !self.blocked[self.index(ix, iy)]
        };

        let mut expansions = 0usize;
        while let Some(GridEntry { cost, state, .. }) = heap.pop() {
            if cost > best_cost[self.state_index(state)] {
                continue;
            }
            if (state.x, state.y) == end {
                debug!(expansions, cost, "route found");
                return Some(self.reconstruct(&prev, state));
            }
            expansions += 1;
            if expansions > self.max_expansions {
                warn!(
                    expansions,
                    ?start,
                    ?end,
                    "routing expansion budget exhausted; using a straight line"
                );
                return None;
            }

            for (dx, dy) in DIRS {
                let nx = state.x as isize + dx;
                let ny = state.y as isize + dy;
                if nx < 0 || ny < 0 || nx >= cols || ny >= rows {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if !passable(nx, ny) {
                    continue;
                }
                let axis = Axis::of(dx);
                let mut next_cost = cost
                    + (self.xs[nx] - self.xs[state.x]).abs()
                    + (self.ys[ny] - self.ys[state.y]).abs();
                if state.axis.is_some_and(|prev_axis| prev_axis != axis) {
                    next_cost += self.bend_penalty;
                }
                let next = GridState {
                    x: nx,
                    y: ny,
                    axis: Some(axis),
                };
                let next_idx = self.state_index(next);
                if next_cost >= best_cost[next_idx] {
                    continue;
                }
                best_cost[next_idx] = next_cost;
                prev[next_idx] = Some(state);
                seq += 1;
                heap.push(GridEntry {
                    est: next_cost + self.heuristic((nx, ny), end),
                    seq,
                    cost: next_cost,
                    state: next,
                });
            }
        }

        warn!(?start, ?end, "no orthogonal route; using a straight line");
        None
    }

    fn reconstruct(&self, prev: &[Option<GridState>], end: GridState) -> Vec<(usize, usize)> {
        let mut cells = Vec::new();
        let mut cur = end;
        loop {
            cells.push((cur.x, cur.y));
            match prev[self.state_index(cur)] {
                Some(prev_state) => cur = prev_state,
                None => break,
            }
        }
        cells.reverse();
        cells
    }
}

fn sorted_lines(mut lines: Vec<f32>) -> Vec<f32> {
    lines.retain(|v| v.is_finite());
    lines.sort_by(f32::total_cmp);
    lines.dedup();
    lines
}

/// Indices of the lines inside `[lo, hi]`.
fn line_range(lines: &[f32], lo: f32, hi: f32) -> std::ops::Range<usize> {
    let start = lines.partition_point(|v| *v < lo);
    let end = lines.partition_point(|v| *v <= hi);
    start..end.max(start)
}

fn nearest_line(lines: &[f32], value: f32) -> Option<usize> {
    if lines.is_empty() {
        return None;
    }
    let idx = lines.partition_point(|v| *v < value);
    if idx == 0 {
        return Some(0);
    }
    if idx >= lines.len() {
        return Some(lines.len() - 1);
    }
    if (lines[idx] - value).abs() < (value - lines[idx - 1]).abs() {
        Some(idx)
    } else {
        Some(idx - 1)
    }
}

/// Drops repeated points and every point that lies on the line through its
/// neighbours, keeping the endpoints. Simplifying a simplified path is a no-op.
pub fn simplify_path(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &point in points {
        let mut duplicate = false;
        loop {
            let n = out.len();
            if n >= 1 && same_point(out[n - 1], point) {
                duplicate = true;
                break;
            }
            if n >= 2 && collinear(out[n - 2], out[n - 1], point) {
                out.pop();
                continue;
            }
            break;
        }
        if !duplicate {
            out.push(point);
        }
    }
    out
}

fn same_point(a: Point, b: Point) -> bool {
    (a.0 - b.0).abs() <= SAME_POINT_EPSILON && (a.1 - b.1).abs() <= SAME_POINT_EPSILON
}

fn collinear(a: Point, b: Point, c: Point) -> bool {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let (bcx, bcy) = (c.0 - b.0, c.1 - b.1);
    let cross = abx * bcy - aby * bcx;
    let scale = (abx.abs() + aby.abs()) * (bcx.abs() + bcy.abs());
    cross.abs() <= COLLINEAR_EPSILON * scale.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ShapeKind;

    fn rect(id: &str, x: f32, y: f32, w: f32, h: f32) -> ShapeBox {
        ShapeBox::new(id, x, y, w, h, ShapeKind::Rectangle)
    }

    fn assert_orthogonal(path: &[Point]) {
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(
                a.0 == b.0 || a.1 == b.1,
                "segment {a:?} -> {b:?} is diagonal"
            );
        }
    }

    #[test]
    fn grid_lines_are_strictly_increasing_and_span_boxes() {
        let boxes = [rect("a", 0.0, 0.0, 100.0, 50.0), rect("b", 100.0, 0.0, 40.0, 50.0)];
        let router = GridRouter::new(&boxes, &RoutingConfig::default());
        for lines in [router.x_lines(), router.y_lines()] {
            assert!(lines.windows(2).all(|w| w[0] < w[1]));
        }
        for shape in &boxes {
            let spanning = router
                .x_lines()
                .iter()
                .filter(|x| **x >= shape.left() && **x <= shape.right())
                .count();
            assert!(spanning >= 2);
        }
    }

    #[test]
    fn detours_around_obstacle_in_the_way() {
        let obstacle = rect("wall", 150.0, 50.0, 100.0, 100.0);
        let source = rect("src", 0.0, 75.0, 50.0, 50.0);
        let target = rect("dst", 350.0, 75.0, 50.0, 50.0);
        let boxes = [source.clone(), obstacle.clone(), target.clone()];
        let router = GridRouter::new(&boxes, &RoutingConfig::default());

        let path = router.find_route((source.right(), 100.0), (target.left(), 100.0));
        assert_eq!(path.first(), Some(&(50.0, 100.0)));
        assert_eq!(path.last(), Some(&(350.0, 100.0)));
        assert_orthogonal(&path);
        for pair in path.windows(2) {
            for step in 0..=20 {
                let t = step as f32 / 20.0;
                let p = (
                    pair[0].0 + (pair[1].0 - pair[0].0) * t,
                    pair[0].1 + (pair[1].1 - pair[0].1) * t,
                );
                assert!(!obstacle.contains(p, 0.0), "{p:?} inside obstacle");
            }
        }
    }

    #[test]
    fn unobstructed_route_is_straight() {
        let a = rect("a", 0.0, 0.0, 100.0, 60.0);
        let b = rect("b", 0.0, 200.0, 100.0, 60.0);
        let router = GridRouter::new(&[a.clone(), b.clone()], &RoutingConfig::default());
        let path = router.find_route((50.0, a.bottom()), (50.0, b.top()));
        assert_eq!(path, vec![(50.0, 60.0), (50.0, 200.0)]);
    }

    #[test]
    fn exhausted_budget_falls_back_to_straight_line() {
        let obstacle = rect("wall", 150.0, 50.0, 100.0, 100.0);
        let config = RoutingConfig {
            max_expansions: 1,
            ..RoutingConfig::default()
        };
        let router = GridRouter::new(&[obstacle], &config);
        let start = (10.0, 100.0);
        let end = (390.0, 100.0);
        assert_eq!(router.find_route(start, end), vec![start, end]);
    }

    #[test]
    fn empty_grid_falls_back_to_straight_line() {
        let router = GridRouter::new(&[], &RoutingConfig::default());
        assert_eq!(router.find_route((0.0, 0.0), (5.0, 9.0)), vec![(0.0, 0.0), (5.0, 9.0)]);
    }

    #[test]
    fn routing_leaves_the_grid_untouched() {
        let a = rect("a", 0.0, 0.0, 100.0, 60.0);
        let router = GridRouter::new(std::slice::from_ref(&a), &RoutingConfig::default());
        let before = router.blocked.clone();
        let _ = router.find_route((50.0, 0.0), (50.0, 60.0));
        assert_eq!(router.blocked, before);
        assert!(router.is_blocked(2, 2));
    }

    fn path_length(path: &[Point]) -> f32 {
        path.windows(2)
            .map(|w| (w[1].0 - w[0].0).abs() + (w[1].1 - w[0].1).abs())
            .sum()
    }

    #[test]
    fn bend_penalty_prefers_single_turn_over_staircase() {
        // Between the two boxes every monotone path costs the same distance;
        // the grid has enough lines for staircases with several turns.
        let a = rect("a", 0.0, 0.0, 20.0, 20.0);
        let b = rect("b", 200.0, 200.0, 20.0, 20.0);
        let start = (a.right(), 10.0);
        let end = (210.0, b.top());
        let manhattan = (end.0 - start.0).abs() + (end.1 - start.1).abs();

        let config = RoutingConfig {
            bend_penalty: 50.0,
            ..RoutingConfig::default()
        };
        let router = GridRouter::new(&[a.clone(), b.clone()], &config);
        let path = router.find_route(start, end);
        assert_eq!(path, vec![(20.0, 10.0), (210.0, 10.0), (210.0, 200.0)]);
        assert_eq!(path_length(&path), manhattan);

        let free_turns = RoutingConfig {
            bend_penalty: 0.0,
            ..RoutingConfig::default()
        };
        let path = GridRouter::new(&[a, b], &free_turns).find_route(start, end);
        assert_orthogonal(&path);
        assert_eq!(path_length(&path), manhattan);
    }

    #[test]
    fn equal_cost_routes_resolve_the_same_way_every_time() {
        // Both L-shapes from a's corner to b's corner are free and cost the same.
        let a = rect("a", 0.0, 0.0, 20.0, 20.0);
        let b = rect("b", 200.0, 200.0, 20.0, 20.0);
        let start = (20.0, 20.0);
        let end = (200.0, 200.0);

        let router = GridRouter::new(&[a.clone(), b.clone()], &RoutingConfig::default());
        let first = router.find_route(start, end);
        let second = router.find_route(start, end);
        let rebuilt = GridRouter::new(&[b, a], &RoutingConfig::default()).find_route(start, end);
        assert_eq!(first, second);
        assert_eq!(first, rebuilt);

        let across_first = vec![start, (200.0, 20.0), end];
        let down_first = vec![start, (20.0, 200.0), end];
        assert!(first == across_first || first == down_first, "{first:?}");

        // Reversing the query walks the mirror image of one of the two Ls.
        let back = router.find_route(end, start);
        assert_eq!(back, router.find_route(end, start));
        assert_eq!(back.len(), 3);
        assert_eq!(path_length(&back), path_length(&first));
    }

    #[test]
    fn simplify_keeps_turns_and_endpoints() {
        let path = [
            (0.0, 0.0),
            (0.0, 0.0),
            (0.0, 10.0),
            (0.0, 20.0),
            (10.0, 20.0),
            (30.0, 20.0),
            (30.0, 40.0),
        ];
        let simplified = simplify_path(&path);
        assert_eq!(
            simplified,
            vec![(0.0, 0.0), (0.0, 20.0), (30.0, 20.0), (30.0, 40.0)]
        );
        assert_eq!(simplify_path(&simplified), simplified);
    }

    #[test]
    fn simplify_handles_short_input() {
        assert!(simplify_path(&[]).is_empty());
        assert_eq!(simplify_path(&[(1.0, 1.0)]), vec![(1.0, 1.0)]);
        assert_eq!(simplify_path(&[(1.0, 1.0), (1.0, 1.0)]), vec![(1.0, 1.0)]);
    }
}
