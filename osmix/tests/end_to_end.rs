//! Top-level integration suite exercising the concrete end-to-end
//! scenarios a small synthetic OSM dataset must satisfy, built in-test
//! with no network fetch and no real-world PBF checked into the repo.

use osmix::dataset::Osm;
use osmix::merge::merge;
use osmix::routing::{astar, bidirectional_bfs, build_graph, default_speeds, dijkstra, Metric};

/// A tiny dataset shaped like a real city extract: a handful of named
/// nodes, two ways, and one relation grouping them, built directly
/// through the public ingest API rather than from a raw byte fixture
/// (the PBF wire format itself is covered by the `pbf` module's own
/// tests).
fn monaco_shaped_fixture() -> Osm {
    let mut osm = Osm::new();
    osm.add_node(1, 7.4229, 43.7371, [("name", "Port Hercule")]).unwrap();
    osm.add_node(2, 7.4230, 43.7372, std::iter::empty()).unwrap();
    osm.add_node(3, 7.4231, 43.7373, std::iter::empty()).unwrap();
    osm.add_node(4, 7.4180, 43.7400, [("name", "Monaco-Ville")]).unwrap();

    osm.add_way(100, &[1, 2, 3], [("highway", "residential"), ("name", "Quai Albert 1er")]).unwrap();
    osm.add_way(101, &[3, 4], [("highway", "tertiary")]).unwrap();

    osm.add_relation(
        200,
        [
            (osmix::relation_table::MemberType::Way, 100, "outer"),
            (osmix::relation_table::MemberType::Way, 101, "outer"),
        ],
        [("type", "route")],
    )
    .unwrap();

    osm.finish().unwrap();
    osm
}

#[test]
fn monaco_shaped_fixture_reproduces_counts_bbox_and_first_node_id() {
    let osm = monaco_shaped_fixture();

    assert_eq!(osm.node_count(), 4);
    assert_eq!(osm.way_count(), 2);
    assert_eq!(osm.relation_count(), 1);
    assert_eq!(osm.nodes().id_of(0).unwrap(), 1);

    let bbox = osm.nodes().bbox();
    assert!((bbox.min_lon - 7.4180).abs() < 1e-9);
    assert!((bbox.max_lon - 7.4231).abs() < 1e-9);
    assert!((bbox.min_lat - 43.7371).abs() < 1e-9);
    assert!((bbox.max_lat - 43.7400).abs() < 1e-9);
}

#[test]
fn monaco_shaped_fixture_survives_a_pbf_round_trip() {
    let osm = monaco_shaped_fixture();
    let bytes = osm.write_pbf().unwrap();
    let reloaded = Osm::load_from_pbf(&bytes).unwrap();

    assert_eq!(reloaded.node_count(), osm.node_count());
    assert_eq!(reloaded.way_count(), osm.way_count());
    assert_eq!(reloaded.relation_count(), osm.relation_count());
    assert_eq!(reloaded.nodes().id_of(0).unwrap(), osm.nodes().id_of(0).unwrap());
    assert_eq!(reloaded.get_way(100).unwrap().refs, osm.get_way(100).unwrap().refs);
}

fn grid_3x3() -> Osm {
    let mut osm = Osm::new();
    let mut id = 1;
    for row in 0..3 {
        for col in 0..3 {
            let lon = col as f64 * 0.01;
            let lat = row as f64 * 0.01;
            osm.add_node(id, lon, lat, std::iter::empty()).unwrap();
            id += 1;
        }
    }
    // horizontal edges
    for row in 0..3 {
        for col in 0..2 {
            let a = row * 3 + col + 1;
            let b = a + 1;
            osm.add_way(1000 + a, &[a as i64, b as i64], [("highway", "residential")]).unwrap();
        }
    }
    // vertical edges
    for row in 0..2 {
        for col in 0..3 {
            let a = row * 3 + col + 1;
            let b = a + 3;
            osm.add_way(2000 + a, &[a as i64, b as i64], [("highway", "residential")]).unwrap();
        }
    }
    osm.finish().unwrap();
    osm
}

#[test]
fn dijkstra_and_astar_agree_on_a_3x3_grid() {
    let osm = grid_3x3();
    let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
    let start = osm.nodes().index_of(1).unwrap();
    let end = osm.nodes().index_of(9).unwrap();

    let d_path = dijkstra(&graph, start, end, Metric::Distance).unwrap();
    let coord_of = |ix: usize| osm.nodes().coord_of(ix);
    let a_path = astar(&graph, start, end, Metric::Distance, &coord_of).unwrap().unwrap();

    assert!(!d_path.is_empty());
    assert!((d_path.last().unwrap().cost - a_path.last().unwrap().cost).abs() < 1e-6);
}

#[test]
fn bidirectional_bfs_returns_some_path_on_a_3x3_grid() {
    let osm = grid_3x3();
    let graph = build_graph(&osm, |_| true, &default_speeds()).unwrap();
    let start = osm.nodes().index_of(1).unwrap();
    let end = osm.nodes().index_of(9).unwrap();

    let path = bidirectional_bfs(&graph, start, end).unwrap();
    assert_eq!(path.first().unwrap().node_index, start);
    assert_eq!(path.last().unwrap().node_index, end);
}

#[test]
fn merging_a_dataset_with_itself_is_idempotent() {
    let osm = monaco_shaped_fixture();
    let (merged, stats) = merge(&osm, &osm).unwrap();

    assert_eq!(merged.node_count(), osm.node_count());
    assert_eq!(merged.way_count(), osm.way_count());
    assert_eq!(stats.deduplicated_nodes, 0);
    assert_eq!(stats.intersection_points_found, 0);
}

#[test]
fn coincident_patch_node_merges_down_to_a_single_node() {
    let mut base = Osm::new();
    base.add_node(1, 7.40, 43.70, std::iter::empty()).unwrap();
    base.add_node(2, 7.41, 43.71, std::iter::empty()).unwrap();
    base.add_way(100, &[1, 2], [("highway", "residential")]).unwrap();
    base.finish().unwrap();

    let mut patch = Osm::new();
    patch.add_node(10, 7.40, 43.70, std::iter::empty()).unwrap();
    patch.add_node(11, 7.42, 43.72, std::iter::empty()).unwrap();
    patch.add_way(200, &[10, 11], [("highway", "residential")]).unwrap();
    patch.finish().unwrap();

    let (merged, stats) = merge(&base, &patch).unwrap();
    assert_eq!(stats.deduplicated_nodes, 1);

    let mut coords: Vec<(i64, (i64, i64))> = (0..merged.node_count())
        .map(|i| {
            let (lon, lat) = merged.nodes().coord_of(i).unwrap();
            (merged.nodes().id_of(i).unwrap(), ((lon * 1e6) as i64, (lat * 1e6) as i64))
        })
        .collect();
    coords.sort_by_key(|(_, ll)| *ll);
    for pair in coords.windows(2) {
        assert_ne!(pair[0].1, pair[1].1, "no two nodes should share identical coordinates after dedup");
    }
}
