//! Route reporting over a resolved path: aggregate totals and a
//! human-facing turn-by-turn breakdown.

use super::graph::Graph;
use super::path::PathSegment;
use crate::dataset::Osm;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct RouteStatistics {
    pub distance_m: f64,
    pub time_s: f64,
    pub edge_count: usize,
}

/// Folds distance and time over every edge on `path` by looking each one
/// back up in `graph` (a `PathSegment` only carries cumulative cost under
/// whichever single metric the search ran with).
pub fn route_statistics(graph: &Graph, path: &[PathSegment]) -> RouteStatistics {
    let mut stats = RouteStatistics::default();
    for segment in path {
        let Some(previous) = segment.previous_node_index else { continue };
        let edge = graph
            .edges_from(previous)
            .iter()
            .find(|e| e.target as usize == segment.node_index);
        if let Some(edge) = edge {
            stats.distance_m += edge.distance_m;
            stats.time_s += edge.time_s;
            stats.edge_count += 1;
        }
    }
    stats
}

#[derive(Debug, Clone)]
pub struct WaySegment {
    pub way_ids: Vec<i64>,
    pub name: Option<String>,
    pub highway: Option<String>,
    pub distance_m: f64,
    pub time_s: f64,
}

/// Merges consecutive path edges whose `(name, highway)` tag pair matches
/// into single `WaySegment`s, so a route report reads "take Main St for
/// 2km" instead of one line per way-pair edge.
pub fn route_path_info(osm: &Osm, graph: &Graph, path: &[PathSegment]) -> Result<Vec<WaySegment>> {
    let mut segments: Vec<WaySegment> = Vec::new();
    let mut current_way_index: Option<u32> = None;

    for segment in path {
        let (Some(previous), Some(way_index)) = (segment.previous_node_index, segment.way_index) else { continue };
        let edge = graph
            .edges_from(previous)
            .iter()
            .find(|e| e.target as usize == segment.node_index && e.way_index == way_index);
        let Some(edge) = edge else { continue };

        let way = osm.ways().id_of(way_index as usize)?;
        let tags = osm.ways().tags_of(way_index as usize, osm.strings())?;
        let name = tags.get("name").cloned();
        let highway = tags.get("highway").cloned();

        let merges_with_last = current_way_index == Some(way_index)
            || segments
                .last()
                .map(|s| s.name == name && s.highway == highway)
                .unwrap_or(false);

        if merges_with_last {
            let last = segments.last_mut().unwrap();
            if !last.way_ids.contains(&way) {
                last.way_ids.push(way);
            }
            last.distance_m += edge.distance_m;
            last.time_s += edge.time_s;
        } else {
            segments.push(WaySegment {
                way_ids: vec![way],
                name,
                highway,
                distance_m: edge.distance_m,
                time_s: edge.time_s,
            });
        }
        current_way_index = Some(way_index);
    }

    Ok(segments)
}
