//! Intersection synthesis: finds places where a patch way crosses
//! an existing base way with no shared node, and introduces one.

use super::changeset::{Changeset, NodeChange, WayChange};
use super::connect::ways_should_connect;
use crate::dataset::Osm;
use crate::error::Result;
use crate::geometry::{haversine, line_intersect, nearest_point_on_line};
use std::collections::BTreeMap;

/// Crossing points closer together than this are treated as the same real
/// intersection, avoiding a node-per-intersecting-segment-pair.
const REUSE_TOLERANCE_M: f64 = 1.0;

#[derive(Debug, Default)]
pub struct IntersectStats {
    pub intersection_points_found: u64,
}

/// `createIntersections(patch)`: for every patch way, finds candidate base
/// ways sharing a bbox, and for connectable pairs, synthesizes a shared
/// node at every transversal crossing that doesn't already have one.
pub fn create_intersections(
    base: &Osm,
    patch: &Osm,
    changeset: &mut Changeset,
    stats: &mut IntersectStats,
) -> Result<()> {
    let mut next_new_node_id = max_node_id(base)?.max(max_node_id(patch)?) + 1;

    for wi in 0..patch.way_count() {
        let w_id = patch.ways().id_of(wi)?;
        let w_tags = patch.ways().tags_of(wi, patch.strings())?;
        let w_line = patch.ways().line_of(wi, patch.nodes())?;
        let w_bbox = patch.ways().bbox_of(wi)?;

        for &bi in &base.ways().intersects(&w_bbox)? {
            let b_id = base.ways().id_of(bi)?;
            if b_id == w_id {
                continue;
            }
            let b_tags = base.ways().tags_of(bi, base.strings())?;
            if !ways_should_connect(&w_tags, &b_tags) {
                continue;
            }
            let b_line = base.ways().line_of(bi, base.nodes())?;

            for ll in line_intersect(&w_line, &b_line) {
                stats.intersection_points_found += 1;

                let b_refs = current_refs(changeset, base, bi)?;
                let w_refs = current_refs_patch(changeset, patch, wi)?;

                let existing_on_b = nearest_existing_node(base, &b_refs, ll, REUSE_TOLERANCE_M)?;
                let existing_on_w = nearest_existing_node(patch, &w_refs, ll, REUSE_TOLERANCE_M)?;

                let node_id = match existing_on_b.or(existing_on_w) {
                    Some(id) => id,
                    None => {
                        let id = next_new_node_id;
                        next_new_node_id += 1;
                        let mut tags = BTreeMap::new();
                        tags.insert("crossing".to_string(), "yes".to_string());
                        changeset.nodes.insert(id, NodeChange::Create { lon: ll.0, lat: ll.1, tags });
                        id
                    }
                };

                if existing_on_b.is_none() {
                    insert_at_nearest_segment(changeset, base, bi, b_id, &b_refs, ll, node_id, base.strings())?;
                }
                if existing_on_w.is_none() {
                    insert_at_nearest_segment(changeset, patch, wi, w_id, &w_refs, ll, node_id, patch.strings())?;
                }
                tag_node_as_crossing(changeset, base, patch, node_id)?;
            }
        }
    }
    Ok(())
}

fn max_node_id(osm: &Osm) -> Result<i64> {
    let mut max = 0i64;
    for i in 0..osm.node_count() {
        max = max.max(osm.nodes().id_of(i)?);
    }
    Ok(max)
}

fn current_refs(changeset: &Changeset, base: &Osm, way_index: usize) -> Result<Vec<i64>> {
    let id = base.ways().id_of(way_index)?;
    Ok(match changeset.ways.get(&id) {
        Some(WayChange::Modify { refs, .. }) => refs.clone(),
        _ => base.ways().refs_of(way_index)?.to_vec(),
    })
}

fn current_refs_patch(changeset: &Changeset, patch: &Osm, way_index: usize) -> Result<Vec<i64>> {
    let id = patch.ways().id_of(way_index)?;
    Ok(match changeset.ways.get(&id) {
        Some(WayChange::Modify { refs, .. }) => refs.clone(),
        _ => patch.ways().refs_of(way_index)?.to_vec(),
    })
}

fn nearest_existing_node(osm: &Osm, refs: &[i64], ll: (f64, f64), tol_m: f64) -> Result<Option<i64>> {
    for &r in refs {
        if let Some(idx) = osm.nodes().index_of(r) {
            let coord = osm.nodes().coord_of(idx)?;
            if haversine(coord, ll) <= tol_m {
                return Ok(Some(r));
            }
        }
    }
    Ok(None)
}

#[allow(clippy::too_many_arguments)]
fn insert_at_nearest_segment(
    changeset: &mut Changeset,
    osm: &Osm,
    way_index: usize,
    way_id: i64,
    refs: &[i64],
    ll: (f64, f64),
    node_id: i64,
    strings: &crate::string_table::StringTable,
) -> Result<()> {
    let line = osm.ways().line_of(way_index, osm.nodes())?;
    let Some((_, segment_index, _)) = nearest_point_on_line(&line, ll) else { return Ok(()) };
    let mut new_refs = refs.to_vec();
    new_refs.insert(segment_index + 1, node_id);
    let tags = osm.ways().tags_of(way_index, strings)?;
    changeset.ways.insert(way_id, WayChange::Modify { refs: new_refs, tags });
    Ok(())
}

fn tag_node_as_crossing(changeset: &mut Changeset, base: &Osm, patch: &Osm, node_id: i64) -> Result<()> {
    if let Some(NodeChange::Create { tags, .. }) = changeset.nodes.get_mut(&node_id) {
        tags.insert("crossing".to_string(), "yes".to_string());
        return Ok(());
    }
    let (lon, lat, mut tags) = if let Ok(node) = base.get_node(node_id) {
        (node.lon, node.lat, node.tags)
    } else if let Ok(node) = patch.get_node(node_id) {
        (node.lon, node.lat, node.tags)
    } else {
        return Ok(());
    };
    tags.insert("crossing".to_string(), "yes".to_string());
    changeset.nodes.insert(node_id, NodeChange::Modify { lon, lat, tags });
    Ok(())
}
