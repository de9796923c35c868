//! A changeset: three OSM-id-keyed maps of create/modify/delete entries.

use crate::dataset::Osm;
use crate::error::Result;
use crate::relation_table::Member;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub enum NodeChange {
    Create { lon: f64, lat: f64, tags: BTreeMap<String, String> },
    Modify { lon: f64, lat: f64, tags: BTreeMap<String, String> },
    Delete,
}

#[derive(Debug, Clone)]
pub enum WayChange {
    Create { refs: Vec<i64>, tags: BTreeMap<String, String> },
    Modify { refs: Vec<i64>, tags: BTreeMap<String, String> },
    Delete,
}

#[derive(Debug, Clone)]
pub enum RelationChange {
    Create { members: Vec<(u8, i64, String)>, tags: BTreeMap<String, String> },
    Modify { members: Vec<(u8, i64, String)>, tags: BTreeMap<String, String> },
    Delete,
}

#[derive(Debug, Default, Clone)]
pub struct Changeset {
    pub nodes: BTreeMap<i64, NodeChange>,
    pub ways: BTreeMap<i64, WayChange>,
    pub relations: BTreeMap<i64, RelationChange>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }
}

fn members_as_tuples(members: &[Member]) -> Vec<(u8, i64, String)> {
    members.iter().map(|m| (m.member_type.as_u8(), m.member_ref, m.role.clone())).collect()
}

/// `generateDirectChanges(base, patch)`: every entity present in `patch` is
/// classified against `base` by id, comparing tags plus the per-type fields
/// (coords / refs / members).
pub fn generate_direct_changes(base: &Osm, patch: &Osm) -> Result<Changeset> {
    let mut changeset = Changeset::new();

    for i in 0..patch.node_count() {
        let id = patch.nodes().id_of(i)?;
        let (lon, lat) = patch.nodes().coord_of(i)?;
        let tags = patch.nodes().tags_of(i, patch.strings())?;
        match base.get_node(id) {
            Ok(base_node) => {
                if base_node.lon != lon || base_node.lat != lat || base_node.tags != tags {
                    changeset.nodes.insert(id, NodeChange::Modify { lon, lat, tags });
                }
            }
            Err(_) => {
                changeset.nodes.insert(id, NodeChange::Create { lon, lat, tags });
            }
        }
    }

    for i in 0..patch.way_count() {
        let id = patch.ways().id_of(i)?;
        let refs = patch.ways().refs_of(i)?.to_vec();
        let tags = patch.ways().tags_of(i, patch.strings())?;
        match base.get_way(id) {
            Ok(base_way) => {
                if base_way.refs != refs || base_way.tags != tags {
                    changeset.ways.insert(id, WayChange::Modify { refs, tags });
                }
            }
            Err(_) => {
                changeset.ways.insert(id, WayChange::Create { refs, tags });
            }
        }
    }

    for i in 0..patch.relation_count() {
        let id = patch.relations().id_of(i)?;
        let members = members_as_tuples(&patch.relations().get_members(i, patch.strings())?);
        let tags = patch.relations().tags_of(i, patch.strings())?;
        match base.get_relation(id) {
            Ok(base_relation) => {
                let base_members = members_as_tuples(&base_relation.members);
                if base_members != members || base_relation.tags != tags {
                    changeset.relations.insert(id, RelationChange::Modify { members, tags });
                }
            }
            Err(_) => {
                changeset.relations.insert(id, RelationChange::Create { members, tags });
            }
        }
    }

    Ok(changeset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_a_create() {
        let base = Osm::new();
        let mut patch = Osm::new();
        patch.add_node(1, 7.4, 43.7, std::iter::empty()).unwrap();
        let changeset = generate_direct_changes(&base, &patch).unwrap();
        assert!(matches!(changeset.nodes.get(&1), Some(NodeChange::Create { .. })));
    }

    #[test]
    fn unchanged_node_produces_no_change() {
        let mut base = Osm::new();
        base.add_node(1, 7.4, 43.7, [("name", "a")]).unwrap();
        base.finish().unwrap();
        let mut patch = Osm::new();
        patch.add_node(1, 7.4, 43.7, [("name", "a")]).unwrap();
        let changeset = generate_direct_changes(&base, &patch).unwrap();
        assert!(changeset.nodes.is_empty());
    }

    #[test]
    fn moved_node_is_a_modify() {
        let mut base = Osm::new();
        base.add_node(1, 7.4, 43.7, std::iter::empty()).unwrap();
        base.finish().unwrap();
        let mut patch = Osm::new();
        patch.add_node(1, 7.41, 43.7, std::iter::empty()).unwrap();
        let changeset = generate_direct_changes(&base, &patch).unwrap();
        assert!(matches!(changeset.nodes.get(&1), Some(NodeChange::Modify { .. })));
    }
}
