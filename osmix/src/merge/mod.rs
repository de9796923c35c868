//! Merge / changeset engine: diff two datasets, de-duplicate
//! coincident nodes, synthesize missing intersections, and apply the result.

pub mod apply;
pub mod changeset;
pub mod connect;
pub mod dedup;
pub mod intersect;

pub use apply::apply_changes;
pub use changeset::{generate_direct_changes, Changeset, NodeChange, RelationChange, WayChange};
pub use connect::ways_should_connect;
pub use dedup::{deduplicate_nodes, DedupStats};
pub use intersect::{create_intersections, IntersectStats};

/// Aggregate stats across a full merge pipeline run, for callers that want
/// one struct to report rather than threading the per-pass stats structs
/// through individually.
#[derive(Debug, Default)]
pub struct MergeStats {
    pub deduplicated_nodes: u64,
    pub deduplicated_nodes_replaced: u64,
    pub intersection_points_found: u64,
}

/// Runs the full merge pipeline: direct diff, dedup, intersection
/// synthesis, then application. Returns the new dataset and the combined
/// stats.
pub fn merge(base: &crate::dataset::Osm, patch: &crate::dataset::Osm) -> crate::error::Result<(crate::dataset::Osm, MergeStats)> {
    let mut changeset = generate_direct_changes(base, patch)?;

    let mut dedup_stats = DedupStats::default();
    deduplicate_nodes(base, patch, &mut changeset, &mut dedup_stats)?;

    let mut intersect_stats = IntersectStats::default();
    create_intersections(base, patch, &mut changeset, &mut intersect_stats)?;

    let out = apply_changes(base, &changeset)?;

    Ok((
        out,
        MergeStats {
            deduplicated_nodes: dedup_stats.deduplicated_nodes,
            deduplicated_nodes_replaced: dedup_stats.deduplicated_nodes_replaced,
            intersection_points_found: intersect_stats.intersection_points_found,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Osm;

    #[test]
    fn merge_pipeline_combines_base_and_patch() {
        let mut base = Osm::new();
        base.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        base.add_node(2, 0.01, 0.0, std::iter::empty()).unwrap();
        base.add_way(100, &[1, 2], [("highway", "residential")]).unwrap();
        base.finish().unwrap();

        let mut patch = Osm::new();
        patch.add_node(10, 0.005, -0.01, std::iter::empty()).unwrap();
        patch.add_node(11, 0.005, 0.01, std::iter::empty()).unwrap();
        patch.add_way(200, &[10, 11], [("highway", "residential")]).unwrap();
        patch.finish().unwrap();

        let (out, stats) = merge(&base, &patch).unwrap();
        assert!(out.way_count() >= 2);
        assert_eq!(stats.intersection_points_found, 1);
    }
}
