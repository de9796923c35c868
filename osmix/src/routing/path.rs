//! Shared path representation and cost accounting for the routing
//! algorithms: each settles the same kind of path, over the
//! same [`Graph`], against one of two metrics.

use super::graph::{Edge, Graph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Distance,
    Time,
}

/// One stop along a resolved route. The start carries `cost=0` and no
/// predecessor; every later segment names the edge that reached it.
#[derive(Debug, Clone, Copy)]
pub struct PathSegment {
    pub node_index: usize,
    pub way_index: Option<u32>,
    pub previous_node_index: Option<usize>,
    pub cost: f64,
}

pub fn edge_cost(edge: &Edge, metric: Metric) -> f64 {
    match metric {
        Metric::Distance => edge.distance_m,
        Metric::Time => edge.time_s,
    }
}

/// Walks `came_from` back from `end` to `start` and returns the path in
/// travel order, with `cost[n]` as each segment's cumulative cost.
pub fn reconstruct(came_from: &[Option<(u32, u32)>], cost: &[f64], start: usize, end: usize) -> Vec<PathSegment> {
    let mut path = Vec::new();
    let mut current = end;
    loop {
        let (way_index, previous) = match came_from[current] {
            Some((w, p)) => (Some(w), Some(p as usize)),
            None => (None, None),
        };
        path.push(PathSegment { node_index: current, way_index, previous_node_index: previous, cost: cost[current] });
        if current == start {
            break;
        }
        current = previous.expect("every non-start node on the reconstructed path has a predecessor");
    }
    path.reverse();
    path
}

pub fn fresh_cost_arrays(graph: &Graph) -> (Vec<f64>, Vec<Option<(u32, u32)>>, Vec<bool>) {
    let n = graph.node_count();
    (vec![f64::INFINITY; n], vec![None; n], vec![false; n])
}
