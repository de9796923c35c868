//! Coincident-node de-duplication.

use super::changeset::{Changeset, NodeChange, WayChange};
use crate::dataset::Osm;
use crate::error::Result;
use crate::relation_table::MemberType;

#[derive(Debug, Default)]
pub struct DedupStats {
    pub deduplicated_nodes: u64,
    pub deduplicated_nodes_replaced: u64,
}

/// For every patch node that lands exactly on an existing base node, deletes
/// the base node and rewrites every base way/relation that referenced it to
/// point at the patch node instead.
pub fn deduplicate_nodes(base: &Osm, patch: &Osm, changeset: &mut Changeset, stats: &mut DedupStats) -> Result<()> {
    for i in 0..patch.node_count() {
        let p_id = patch.nodes().id_of(i)?;
        let (lon, lat) = patch.nodes().coord_of(i)?;

        let coincident = base.nodes().within_radius(lon, lat, 0.0)?;
        let Some(&base_index) = coincident.first() else { continue };
        let b_id = base.nodes().id_of(base_index)?;
        if b_id == p_id {
            continue;
        }

        changeset.nodes.insert(b_id, NodeChange::Delete);
        stats.deduplicated_nodes += 1;

        for &way_index in &base.ways().neighbors(lon, lat, 10, 0.01)? {
            let refs = base.ways().refs_of(way_index)?;
            if !refs.contains(&b_id) {
                continue;
            }
            let way_id = base.ways().id_of(way_index)?;
            let new_refs: Vec<i64> = refs.iter().map(|&r| if r == b_id { p_id } else { r }).collect();
            let tags = base.ways().tags_of(way_index, base.strings())?;
            changeset.ways.insert(way_id, WayChange::Modify { refs: new_refs, tags });
            stats.deduplicated_nodes_replaced += 1;
        }

        for r_index in 0..base.relation_count() {
            if !base
                .relations()
                .includes_member(r_index, b_id, MemberType::Node, None, base.strings())?
            {
                continue;
            }
            let relation_id = base.relations().id_of(r_index)?;
            let members = base.relations().get_members(r_index, base.strings())?;
            let new_members = members
                .into_iter()
                .map(|m| {
                    let new_ref = if m.member_type == MemberType::Node && m.member_ref == b_id { p_id } else { m.member_ref };
                    (m.member_type.as_u8(), new_ref, m.role)
                })
                .collect();
            let tags = base.relations().tags_of(r_index, base.strings())?;
            changeset
                .relations
                .insert(relation_id, super::changeset::RelationChange::Modify { members: new_members, tags });
            stats.deduplicated_nodes_replaced += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coincident_node_deletes_base_and_rewrites_way() {
        let mut base = Osm::new();
        base.add_node(1, 7.40, 43.70, std::iter::empty()).unwrap();
        base.add_node(2, 7.41, 43.70, std::iter::empty()).unwrap();
        base.add_way(100, &[1, 2], [("highway", "residential")]).unwrap();
        base.finish().unwrap();

        let mut patch = Osm::new();
        patch.add_node(50, 7.40, 43.70, std::iter::empty()).unwrap();

        let mut changeset = Changeset::new();
        let mut stats = DedupStats::default();
        deduplicate_nodes(&base, &patch, &mut changeset, &mut stats).unwrap();

        assert!(matches!(changeset.nodes.get(&1), Some(NodeChange::Delete)));
        match changeset.ways.get(&100) {
            Some(WayChange::Modify { refs, .. }) => assert_eq!(refs, &vec![50, 2]),
            other => panic!("expected way 100 to be modified, got {other:?}"),
        }
        assert_eq!(stats.deduplicated_nodes, 1);
        assert_eq!(stats.deduplicated_nodes_replaced, 1);
    }
}
