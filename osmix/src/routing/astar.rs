//! A* shortest-path search over a [`Graph`]: Dijkstra with a
//! coordinate-driven heuristic added to the heap priority.

use super::graph::Graph;
use super::heap::MinHeap;
use super::path::{edge_cost, fresh_cost_arrays, reconstruct, Metric, PathSegment};
use crate::error::{OsmError, Result};
use crate::geometry::haversine;

/// Speed ceiling the heuristic assumes, so `h(n)` never overestimates the
/// true remaining cost under the time metric and the search stays
/// admissible.
const MAX_SPEED_KMH: f64 = 130.0;
const MAX_SPEED_MS: f64 = MAX_SPEED_KMH * 1000.0 / 3600.0;

/// `f(n) = g(n) + h(n)`, `h(n) = haversine(n, end)` (or that distance
/// divided by `MAX_SPEED_MS` under the time metric). `coord_of` supplies
/// node coordinates. `end`'s coordinate is looked up on every call, so if
/// `coord_of` can't resolve it the heuristic is unusable outright and the
/// search fails with `AStarRequiresCoords`; a miss on an individual
/// interior node instead degrades that node's heuristic to `h = 0`, which
/// stays admissible (it never overestimates) and falls back to
/// Dijkstra-like behavior for that node alone.
pub fn astar(
    graph: &Graph,
    start: usize,
    end: usize,
    metric: Metric,
    coord_of: &dyn Fn(usize) -> Result<(f64, f64)>,
) -> Result<Option<Vec<PathSegment>>> {
    let heuristic = |node: usize| -> Result<f64> {
        let to = coord_of(end).map_err(|_| OsmError::AStarRequiresCoords)?;
        let from = match coord_of(node) {
            Ok(coord) => coord,
            Err(_) => return Ok(0.0),
        };
        let distance_m = haversine(from, to);
        Ok(match metric {
            Metric::Distance => distance_m,
            Metric::Time => distance_m / MAX_SPEED_MS,
        })
    };

    let (mut cost, mut came_from, mut settled) = fresh_cost_arrays(graph);

    let mut heap = MinHeap::with_capacity(graph.node_count());
    cost[start] = 0.0;
    heap.push(start as u32, heuristic(start)?);

    while let Some((u, _)) = heap.pop() {
        let u = u as usize;
        if settled[u] {
            continue;
        }
        settled[u] = true;
        if u == end {
            return Ok(Some(reconstruct(&came_from, &cost, start, end)));
        }
        for edge in graph.edges_from(u) {
            let v = edge.target as usize;
            if settled[v] {
                continue;
            }
            let candidate = cost[u] + edge_cost(edge, metric);
            if candidate < cost[v] {
                cost[v] = candidate;
                came_from[v] = Some((edge.way_index, u as u32));
                heap.push(v as u32, candidate + heuristic(v)?);
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Osm;
    use crate::routing::dijkstra::dijkstra;
    use crate::routing::graph::{build_graph, default_speeds};

    fn line_graph() -> Osm {
        let mut osm = Osm::new();
        for (id, lon) in [(1, 0.0), (2, 0.01), (3, 0.02)] {
            osm.add_node(id, lon, 0.0, std::iter::empty()).unwrap();
        }
        osm.add_way(100, &[1, 2, 3], [("highway", "residential")]).unwrap();
        osm.finish().unwrap();
        osm
    }

    #[test]
    fn missing_coordinate_fails_with_a_star_requires_coords() {
        let osm = line_graph();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let start = osm.nodes().index_of(1).unwrap();
        let end = osm.nodes().index_of(3).unwrap();
        let no_coords = |_: usize| -> Result<(f64, f64)> { Err(OsmError::NotFound { kind: "node", id: -1 }) };
        let err = astar(&graph, start, end, Metric::Distance, &no_coords);
        assert!(matches!(err, Err(OsmError::AStarRequiresCoords)));
    }

    #[test]
    fn missing_interior_node_coordinate_degrades_to_zero_heuristic() {
        let osm = line_graph();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let start = osm.nodes().index_of(1).unwrap();
        let end = osm.nodes().index_of(3).unwrap();
        let middle = osm.nodes().index_of(2).unwrap();
        let coord_of = |ix: usize| -> Result<(f64, f64)> {
            if ix == middle {
                Err(OsmError::NotFound { kind: "node", id: 2 })
            } else {
                osm.nodes().coord_of(ix)
            }
        };
        let a_path = astar(&graph, start, end, Metric::Distance, &coord_of).unwrap().unwrap();
        let d_path = dijkstra(&graph, start, end, Metric::Distance).unwrap();
        assert!((a_path.last().unwrap().cost - d_path.last().unwrap().cost).abs() < 1e-6);
    }

    #[test]
    fn matches_dijkstra_cost_on_a_simple_line() {
        let osm = line_graph();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let start = osm.nodes().index_of(1).unwrap();
        let end = osm.nodes().index_of(3).unwrap();
        let coord_of = |ix: usize| osm.nodes().coord_of(ix);
        let a_path = astar(&graph, start, end, Metric::Distance, &coord_of).unwrap().unwrap();
        let d_path = dijkstra(&graph, start, end, Metric::Distance).unwrap();
        assert!((a_path.last().unwrap().cost - d_path.last().unwrap().cost).abs() < 1e-6);
    }
}
