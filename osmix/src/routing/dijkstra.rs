//! Standard Dijkstra shortest-path search over a [`Graph`].

use super::graph::Graph;
use super::heap::MinHeap;
use super::path::{edge_cost, fresh_cost_arrays, reconstruct, Metric, PathSegment};

/// Min-heap over `g(n)`. Settles each node at most once.
pub fn dijkstra(graph: &Graph, start: usize, end: usize, metric: Metric) -> Option<Vec<PathSegment>> {
    let (mut cost, mut came_from, mut settled) = fresh_cost_arrays(graph);

    let mut heap = MinHeap::with_capacity(graph.node_count());
    cost[start] = 0.0;
    heap.push(start as u32, 0.0);

    while let Some((u, _)) = heap.pop() {
        let u = u as usize;
        if settled[u] {
            continue;
        }
        settled[u] = true;
        if u == end {
            return Some(reconstruct(&came_from, &cost, start, end));
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
                heap.push(v as u32, candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Osm;
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
    fn finds_a_path_across_two_edges() {
        let osm = line_graph();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let start = osm.nodes().index_of(1).unwrap();
        let end = osm.nodes().index_of(3).unwrap();
        let path = dijkstra(&graph, start, end, Metric::Distance).unwrap();
        assert_eq!(path.first().unwrap().node_index, start);
        assert_eq!(path.last().unwrap().node_index, end);
        assert!(path.last().unwrap().cost > 0.0);
    }

    #[test]
    fn unreachable_target_yields_none() {
        let mut osm = Osm::new();
        osm.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        osm.add_node(2, 1.0, 1.0, std::iter::empty()).unwrap();
        osm.finish().unwrap();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        assert!(dijkstra(&graph, 0, 1, Metric::Distance).is_none());
    }

    #[test]
    fn time_metric_prefers_the_faster_route_even_if_longer() {
        let mut osm = Osm::new();
        for (id, lon, lat) in [(1, 0.0, 0.0), (2, 0.02, 0.0), (3, 0.0, 0.01), (4, 0.02, 0.01)] {
            osm.add_node(id, lon, lat, std::iter::empty()).unwrap();
        }
        osm.add_way(100, &[1, 2], [("highway", "residential")]).unwrap(); // slow, direct
        osm.add_way(101, &[1, 3], [("highway", "motorway")]).unwrap(); // fast detour
        osm.add_way(102, &[3, 4], [("highway", "motorway")]).unwrap();
        osm.add_way(103, &[4, 2], [("highway", "motorway")]).unwrap();
        osm.finish().unwrap();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let start = osm.nodes().index_of(1).unwrap();
        let end = osm.nodes().index_of(2).unwrap();
        let by_time = dijkstra(&graph, start, end, Metric::Time).unwrap();
        assert!(by_time.len() > 2, "should take the longer but faster detour");
    }
}
