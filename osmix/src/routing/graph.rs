//! CSR routing graph construction.

use crate::dataset::Osm;
use crate::error::Result;
use crate::geometry::haversine;
use crate::highway::Highway;
use crate::speed::parse_maxspeed;
use std::collections::{BTreeMap, HashMap};

const DEFAULT_SPEED_KMH: f64 = 50.0;

/// `highway` tag value -> default speed in km/h, seeded from the ranked
/// `Highway` classification.
pub fn default_speeds() -> HashMap<String, f64> {
    let mut speeds = HashMap::new();
    for highway in [
        Highway::Motorway,
        Highway::Trunk,
        Highway::Primary,
        Highway::Secondary,
        Highway::Tertiary,
        Highway::Unclassified,
        Highway::Residential,
        Highway::MotorwayLink,
        Highway::TrunkLink,
        Highway::PrimaryLink,
        Highway::SecondaryLink,
        Highway::TertiaryLink,
        Highway::LivingStreet,
        Highway::Service,
        Highway::Pedestrian,
        Highway::Track,
        Highway::Footway,
        Highway::Bridleway,
        Highway::Steps,
        Highway::Path,
        Highway::Cycleway,
    ] {
        speeds.insert(highway.to_string(), highway.default_speed_kmh());
    }
    speeds
}

/// One directed edge in the CSR adjacency structure.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub target: u32,
    pub way_index: u32,
    pub distance_m: f64,
    pub time_s: f64,
}

/// Routing graph over a dataset's node indexes, stored as CSR adjacency.
pub struct Graph {
    node_count: usize,
    edge_offsets: Vec<u32>,
    edges: Vec<Edge>,
    routable: Vec<bool>,
    intersection: Vec<bool>,
}

impl Graph {
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edges_from(&self, node_index: usize) -> &[Edge] {
        let start = self.edge_offsets[node_index] as usize;
        let end = self.edge_offsets[node_index + 1] as usize;
        &self.edges[start..end]
    }

    pub fn is_routable(&self, node_index: usize) -> bool {
        self.routable.get(node_index).copied().unwrap_or(false)
    }

    pub fn is_intersection(&self, node_index: usize) -> bool {
        self.intersection.get(node_index).copied().unwrap_or(false)
    }
}

/// Builds a routing graph from every way in `osm` for which `filter(tags)`
/// holds.
pub fn build_graph<F>(osm: &Osm, filter: F, default_speeds: &HashMap<String, f64>) -> Result<Graph>
where
    F: Fn(&BTreeMap<String, String>) -> bool,
{
    let node_count = osm.node_count();
    let mut routable = vec![false; node_count];
    let mut intersection = vec![false; node_count];
    let mut adjacency: Vec<Vec<Edge>> = vec![Vec::new(); node_count];

    for wi in 0..osm.way_count() {
        let tags = osm.ways().tags_of(wi, osm.strings())?;
        if !filter(&tags) {
            continue;
        }

        let refs = osm.ways().refs_of(wi)?;
        let mut node_indexes = Vec::with_capacity(refs.len());
        for &r in refs {
            if let Some(idx) = osm.nodes().index_of(r) {
                node_indexes.push(idx);
            }
        }
        if node_indexes.len() < 2 {
            continue;
        }

        let oneway = matches!(tags.get("oneway").map(String::as_str), Some("yes") | Some("1"));
        let speed_kmh = edge_speed_kmh(&tags, default_speeds);
        let speed_ms = speed_kmh * 1000.0 / 3600.0;

        for w in node_indexes.windows(2) {
            let (u, v) = (w[0], w[1]);
            let u_coord = osm.nodes().coord_of(u)?;
            let v_coord = osm.nodes().coord_of(v)?;
            let distance_m = haversine(u_coord, v_coord);
            let time_s = distance_m / speed_ms;

            adjacency[u].push(Edge { target: v as u32, way_index: wi as u32, distance_m, time_s });
            if !oneway {
                adjacency[v].push(Edge { target: u as u32, way_index: wi as u32, distance_m, time_s });
            }

            for &n in &[u, v] {
                if routable[n] {
                    intersection[n] = true;
                }
                routable[n] = true;
            }
        }
    }

    let mut edge_offsets = Vec::with_capacity(node_count + 1);
    let mut edges = Vec::new();
    edge_offsets.push(0u32);
    for node_edges in &adjacency {
        edges.extend_from_slice(node_edges);
        edge_offsets.push(edges.len() as u32);
    }

    Ok(Graph { node_count, edge_offsets, edges, routable, intersection })
}

fn edge_speed_kmh(tags: &BTreeMap<String, String>, default_speeds: &HashMap<String, f64>) -> f64 {
    if let Some(maxspeed) = tags.get("maxspeed") {
        if let Ok(Some(v)) = parse_maxspeed(maxspeed) {
            return v;
        }
    }
    if let Some(highway) = tags.get("highway") {
        if let Some(&v) = default_speeds.get(highway) {
            return v;
        }
    }
    DEFAULT_SPEED_KMH
}

/// `find_nearest_routable`: nearest `graph`-routable node to `point` within
/// `max_km`, or `None`.
pub fn find_nearest_routable(osm: &Osm, graph: &Graph, point: (f64, f64), max_km: f64) -> Result<Option<(usize, (f64, f64), f64)>> {
    let max_m = max_km * 1000.0;
    // within_radius takes its radius in the coordinate space's own units
    // (decimal degrees); approximate degrees-per-meter at this latitude
    // generously so the bbox prefilter never misses a true candidate, and
    // refine with haversine below.
    let degree_radius = (max_km / 111.0).max(0.0001);
    let candidates = osm.nodes().within_radius(point.0, point.1, degree_radius)?;

    let mut best: Option<(usize, (f64, f64), f64)> = None;
    for idx in candidates {
        if !graph.is_routable(idx) {
            continue;
        }
        let coord = osm.nodes().coord_of(idx)?;
        let dist = haversine(point, coord);
        if dist > max_m {
            continue;
        }
        if best.is_none() || dist < best.unwrap().2 {
            best = Some((idx, coord, dist / 1000.0));
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Osm {
        let mut osm = Osm::new();
        for (id, lon, lat) in [(1, 0.0, 0.0), (2, 0.01, 0.0), (3, 0.01, 0.01)] {
            osm.add_node(id, lon, lat, std::iter::empty()).unwrap();
        }
        osm.add_way(100, &[1, 2], [("highway", "residential")]).unwrap();
        osm.add_way(101, &[2, 3], [("highway", "residential"), ("oneway", "yes")]).unwrap();
        osm.finish().unwrap();
        osm
    }

    #[test]
    fn bidirectional_way_emits_edges_both_directions() {
        let osm = grid();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let u = osm.nodes().index_of(1).unwrap();
        let v = osm.nodes().index_of(2).unwrap();
        assert!(graph.edges_from(u).iter().any(|e| e.target as usize == v));
        assert!(graph.edges_from(v).iter().any(|e| e.target as usize == u));
    }

    #[test]
    fn oneway_emits_a_single_direction() {
        let osm = grid();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let v = osm.nodes().index_of(2).unwrap();
        let w = osm.nodes().index_of(3).unwrap();
        assert!(graph.edges_from(v).iter().any(|e| e.target as usize == w));
        assert!(!graph.edges_from(w).iter().any(|e| e.target as usize == v));
    }

    #[test]
    fn intersection_node_flagged_on_second_visit() {
        let osm = grid();
        let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
        let v = osm.nodes().index_of(2).unwrap();
        assert!(graph.is_intersection(v));
    }
}
