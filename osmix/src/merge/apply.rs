//! Changeset application: produces a new, independent dataset.

use super::changeset::{Changeset, NodeChange, RelationChange, WayChange};
use crate::dataset::Osm;
use crate::error::{OsmError, Result};
use crate::relation_table::MemberType;
use std::collections::BTreeSet;

/// Builds a fresh dataset from `base` plus `changeset`.
/// `base` is left untouched.
pub fn apply_changes(base: &Osm, changeset: &Changeset) -> Result<Osm> {
    let mut out = Osm::new();
    let mut remaining_nodes: BTreeSet<i64> = changeset.nodes.keys().copied().collect();
    let mut remaining_ways: BTreeSet<i64> = changeset.ways.keys().copied().collect();
    let mut remaining_relations: BTreeSet<i64> = changeset.relations.keys().copied().collect();

    for i in 0..base.node_count() {
        let id = base.nodes().id_of(i)?;
        match changeset.nodes.get(&id) {
            Some(NodeChange::Delete) => {}
            Some(NodeChange::Modify { lon, lat, tags }) => {
                out.add_node(id, *lon, *lat, tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            }
            Some(NodeChange::Create { .. }) => return Err(OsmError::ConflictingCreate(id)),
            None => {
                let (lon, lat) = base.nodes().coord_of(i)?;
                let tags = base.nodes().tags_of(i, base.strings())?;
                out.add_node(id, lon, lat, tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            }
        }
        remaining_nodes.remove(&id);
    }
    let mut sorted_creates: Vec<i64> = remaining_nodes.into_iter().collect();
    sorted_creates.sort_unstable();
    for id in sorted_creates {
        match &changeset.nodes[&id] {
            NodeChange::Create { lon, lat, tags } => {
                out.add_node(id, *lon, *lat, tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            }
            _ => return Err(OsmError::StaleChange(id)),
        }
    }

    for i in 0..base.way_count() {
        let id = base.ways().id_of(i)?;
        match changeset.ways.get(&id) {
            Some(WayChange::Delete) => {}
            Some(WayChange::Modify { refs, tags }) => {
                out.add_way(id, refs, tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            }
            Some(WayChange::Create { .. }) => return Err(OsmError::ConflictingCreate(id)),
            None => {
                let refs = base.ways().refs_of(i)?.to_vec();
                let tags = base.ways().tags_of(i, base.strings())?;
                out.add_way(id, &refs, tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            }
        }
        remaining_ways.remove(&id);
    }
    let mut sorted_way_creates: Vec<i64> = remaining_ways.into_iter().collect();
    sorted_way_creates.sort_unstable();
    for id in sorted_way_creates {
        match &changeset.ways[&id] {
            WayChange::Create { refs, tags } => {
                out.add_way(id, refs, tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
            }
            _ => return Err(OsmError::StaleChange(id)),
        }
    }

    for i in 0..base.relation_count() {
        let id = base.relations().id_of(i)?;
        match changeset.relations.get(&id) {
            Some(RelationChange::Delete) => {}
            Some(RelationChange::Modify { members, tags }) => {
                out.add_relation(
                    id,
                    members.iter().map(|(t, r, role)| (member_type(*t), *r, role.as_str())),
                    tags.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                )?;
            }
            Some(RelationChange::Create { .. }) => return Err(OsmError::ConflictingCreate(id)),
            None => {
                let relation = base.get_relation(id)?;
                out.add_relation(
                    id,
                    relation.members.iter().map(|m| (m.member_type, m.member_ref, m.role.as_str())),
                    relation.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                )?;
            }
        }
        remaining_relations.remove(&id);
    }
    let mut sorted_relation_creates: Vec<i64> = remaining_relations.into_iter().collect();
    sorted_relation_creates.sort_unstable();
    for id in sorted_relation_creates {
        match &changeset.relations[&id] {
            RelationChange::Create { members, tags } => {
                out.add_relation(
                    id,
                    members.iter().map(|(t, r, role)| (member_type(*t), *r, role.as_str())),
                    tags.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                )?;
            }
            _ => return Err(OsmError::StaleChange(id)),
        }
    }

    out.finish()?;
    Ok(out)
}

fn member_type(v: u8) -> MemberType {
    MemberType::from_u8(v).unwrap_or(MemberType::Node)
}
