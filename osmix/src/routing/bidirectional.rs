//! Bidirectional BFS: two unweighted frontiers expanding from
//! `start` and `end` in lockstep, stopping the moment some node has been
//! reached from both sides. Returns *a* path, not necessarily the
//! shortest one under either metric — callers that need optimality
//! should use [`super::dijkstra::dijkstra`] or [`super::astar::astar`]
//! instead.

use super::graph::Graph;
use super::path::PathSegment;
use std::collections::VecDeque;

fn walk_back(came_from: &[Option<(u32, u32)>], start: usize, meeting: usize) -> Vec<usize> {
    let mut nodes = vec![meeting];
    let mut current = meeting;
    while current != start {
        let (_, previous) = came_from[current].expect("every non-start node on a BFS frontier has a predecessor");
        current = previous as usize;
        nodes.push(current);
    }
    nodes.reverse();
    nodes
}

/// Builds the adjacency needed to walk backward from `end` toward `start`
/// by scanning every node's forward edges for one that targets it. This
/// graph has no reverse-adjacency index, so the backward frontier pays an
/// O(edges) scan per expansion step; acceptable since routing graphs are
/// built for short regional queries, not continental ones.
fn reverse_neighbors(graph: &Graph, node: usize) -> Vec<(usize, u32)> {
    let mut out = Vec::new();
    for u in 0..graph.node_count() {
        for edge in graph.edges_from(u) {
            if edge.target as usize == node {
                out.push((u, edge.way_index));
            }
        }
    }
    out
}

pub fn bidirectional_bfs(graph: &Graph, start: usize, end: usize) -> Option<Vec<PathSegment>> {
    if start == end {
        return Some(vec![PathSegment { node_index: start, way_index: None, previous_node_index: None, cost: 0.0 }]);
    }

    let n = graph.node_count();
    let mut forward_from: Vec<Option<(u32, u32)>> = vec![None; n];
    let mut backward_from: Vec<Option<(u32, u32)>> = vec![None; n];
    let mut forward_seen = vec![false; n];
    let mut backward_seen = vec![false; n];
    forward_seen[start] = true;
    backward_seen[end] = true;

    let mut forward_queue = VecDeque::from([start]);
    let mut backward_queue = VecDeque::from([end]);

    while !forward_queue.is_empty() && !backward_queue.is_empty() {
        for _ in 0..forward_queue.len() {
            let u = forward_queue.pop_front().unwrap();
            if backward_seen[u] {
                return Some(stitch(&forward_from, &backward_from, start, end, u));
            }
            for edge in graph.edges_from(u) {
                let v = edge.target as usize;
                if !forward_seen[v] {
                    forward_seen[v] = true;
                    forward_from[v] = Some((edge.way_index, u as u32));
                    forward_queue.push_back(v);
                }
            }
        }

        for _ in 0..backward_queue.len() {
            let u = backward_queue.pop_front().unwrap();
            if forward_seen[u] {
                return Some(stitch(&forward_from, &backward_from, start, end, u));
            }
            for (v, way_index) in reverse_neighbors(graph, u) {
                if !backward_seen[v] {
                    backward_seen[v] = true;
                    backward_from[v] = Some((way_index, u as u32));
                    backward_queue.push_back(v);
                }
            }
        }
    }
    None
}

/// Backward frontier order along the meeting-to-`end` half, paired with the
/// way crossed to reach each node from the one before it (i.e. from `end`'s
/// side), in `end -> meeting` order.
fn walk_back_with_ways(came_from: &[Option<(u32, u32)>], start: usize, meeting: usize) -> Vec<(usize, Option<u32>)> {
    let mut nodes = vec![(meeting, None)];
    let mut current = meeting;
    while current != start {
        let (way_index, previous) = came_from[current].expect("every non-start node on a BFS frontier has a predecessor");
        current = previous as usize;
        nodes.push((current, Some(way_index)));
    }
    nodes
}

fn stitch(
    forward_from: &[Option<(u32, u32)>],
    backward_from: &[Option<(u32, u32)>],
    start: usize,
    end: usize,
    meeting: usize,
) -> Vec<PathSegment> {
    let forward_nodes = walk_back(forward_from, start, meeting);

    // `backward_nodes` runs `end -> meeting`, each entry paired with the way
    // used to step from it toward `end`. Reversing gives `meeting -> end`,
    // where that way now crosses from the *previous* node in travel order.
    let mut backward_nodes = walk_back_with_ways(backward_from, end, meeting);
    backward_nodes.reverse();

    let mut path = Vec::with_capacity(forward_nodes.len() + backward_nodes.len() - 1);
    for &node_index in &forward_nodes {
        let (way_index, previous_node_index) = if node_index == start {
            (None, None)
        } else {
            let (w, p) = forward_from[node_index].unwrap();
            (Some(w), Some(p as usize))
        };
        path.push(PathSegment { node_index, way_index, previous_node_index, cost: path.len() as f64 });
    }
    for &(node_index, way_index) in backward_nodes.iter().skip(1) {
        let previous_node_index = path.last().map(|p: &PathSegment| p.node_index);
        path.push(PathSegment { node_index, way_index, previous_node_index, cost: path.len() as f64 });
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Osm;
    use crate::routing::graph::{build_graph, default_speeds};

    #[test]
    fn finds_some_path_across_a_line() {
        let mut osm = Osm::new();
        for (id, lon) in [(1, 0.0), (2, 0.01), (3, 0.02)] {
            osm.add_node(id, lon, 0.0, std::iter::empty()).unwrap();
        }
        osm.add_way(100, &[1, 2, 3], [("highway", "residential")]).unwrap();
        osm.finish().unwrap();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let start = osm.nodes().index_of(1).unwrap();
        let end = osm.nodes().index_of(3).unwrap();
        let path = bidirectional_bfs(&graph, start, end).unwrap();
        assert_eq!(path.first().unwrap().node_index, start);
        assert_eq!(path.last().unwrap().node_index, end);
    }

    #[test]
    fn start_equal_to_end_is_a_single_node_path() {
        let mut osm = Osm::new();
        osm.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        osm.finish().unwrap();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let path = bidirectional_bfs(&graph, 0, 0).unwrap();
        assert_eq!(path.len(), 1);
    }
}
