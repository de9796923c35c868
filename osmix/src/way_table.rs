//! Id+tag+refs (CSR) columns for ways, with a per-way bbox column and an
//! R-tree over those bboxes.

use crate::column::Column;
use crate::error::{OsmError, Result};
use crate::id_index::IdIndex;
use crate::node_table::{BBox, NodeTable};
use crate::string_table::StringTable;
use crate::tag_table::TagTable;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
struct IndexedBBox {
    bbox: BBox,
    index: u32,
}

impl RTreeObject for IndexedBBox {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_lon, self.bbox.min_lat],
            [self.bbox.max_lon, self.bbox.max_lat],
        )
    }
}

impl rstar::PointDistance for IndexedBBox {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let nearest_lon = point[0].clamp(self.bbox.min_lon, self.bbox.max_lon);
        let nearest_lat = point[1].clamp(self.bbox.min_lat, self.bbox.max_lat);
        let dx = nearest_lon - point[0];
        let dy = nearest_lat - point[1];
        dx * dx + dy * dy
    }
}

pub struct WayTable {
    id: Column<i64>,
    ref_start: Column<u32>,
    ref_count: Column<u16>,
    refs: Column<i64>,
    tags: TagTable,
    ids_sorted_so_far: bool,
    last_id: i64,
    frozen: bool,
    id_index: Option<IdIndex>,
    bbox: Vec<BBox>,
    spatial: Option<RTree<IndexedBBox>>,
}

impl Default for WayTable {
    fn default() -> Self {
        Self::new()
    }
}

impl WayTable {
    pub fn new() -> Self {
        WayTable {
            id: Column::new(),
            ref_start: Column::new(),
            ref_count: Column::new(),
            refs: Column::new(),
            tags: TagTable::new(),
            ids_sorted_so_far: true,
            last_id: i64::MIN,
            frozen: false,
            id_index: None,
            bbox: Vec::new(),
            spatial: None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Appends a way. `refs` is the ordered node-id sequence (<= 2000 on
    /// the wire, not enforced here — callers ingesting real PBF data are
    /// trusted to respect the on-wire limit).
    pub fn add_way<'a, I>(
        &mut self,
        strings: &mut StringTable,
        id: i64,
        refs: &[i64],
        tags: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if self.frozen {
            return Err(OsmError::Frozen);
        }
        let index = self.id.len();
        if id < self.last_id {
            self.ids_sorted_so_far = false;
        }
        self.last_id = id;
        self.id.push(id);
        self.ref_start.push(self.refs.len() as u32);
        self.ref_count.push(refs.len() as u16);
        self.refs.push_many(refs);
        self.tags.add_tags(strings, tags)?;
        Ok(index)
    }

    /// Freezes the table: resolves every way's refs to node coordinates via
    /// `nodes`' id index to compute per-way bbox, then builds the R-tree.
    /// Fails `DanglingNodeRef` if any ref cannot be resolved.
    pub fn finish(&mut self, nodes: &NodeTable) -> Result<()> {
        if self.frozen {
            return Ok(());
        }
        self.id.compact();
        self.ref_start.compact();
        self.ref_count.compact();
        self.refs.compact();
        self.tags.compact();

        // each way's bbox only reads `nodes` and its own ref slice, so the
        // per-way scan is independent and safe to fan out across cores.
        self.bbox = (0..self.id.len())
            .into_par_iter()
            .map(|i| -> Result<BBox> {
                let start = self.ref_start.at(i)? as usize;
                let count = self.ref_count.at(i)? as usize;
                let mut bbox = BBox::empty();
                for r in start..start + count {
                    let node_id = self.refs.at(r)?;
                    let node_index = nodes.index_of(node_id).ok_or(OsmError::DanglingNodeRef {
                        way_id: self.id.at(i)?,
                        missing_node_id: node_id,
                    })?;
                    let (lon, lat) = nodes.coord_of(node_index)?;
                    bbox.expand(lon, lat);
                }
                Ok(bbox)
            })
            .collect::<Result<Vec<BBox>>>()?;

        self.id_index = Some(IdIndex::build(self.id.as_slice(), self.ids_sorted_so_far));
        let entries: Vec<IndexedBBox> = self
            .bbox
            .iter()
            .enumerate()
            .map(|(i, &bbox)| IndexedBBox {
                bbox,
                index: i as u32,
            })
            .collect();
        self.spatial = Some(RTree::bulk_load(entries));
        self.frozen = true;
        Ok(())
    }

    pub fn id_of(&self, index: usize) -> Result<i64> {
        self.id.at(index)
    }

    pub fn refs_of(&self, index: usize) -> Result<&[i64]> {
        let start = self.ref_start.at(index)? as usize;
        let count = self.ref_count.at(index)? as usize;
        Ok(&self.refs.as_slice()[start..start + count])
    }

    /// Interleaved lon/lat of every resolved node ref, in ref order.
    pub fn line_of(&self, index: usize, nodes: &NodeTable) -> Result<Vec<f64>> {
        let refs = self.refs_of(index)?;
        let mut out = Vec::with_capacity(refs.len() * 2);
        for &node_id in refs {
            if let Some(node_index) = nodes.index_of(node_id) {
                let (lon, lat) = nodes.coord_of(node_index)?;
                out.push(lon);
                out.push(lat);
            }
        }
        Ok(out)
    }

    pub fn bbox_of(&self, index: usize) -> Result<BBox> {
        self.bbox
            .get(index)
            .copied()
            .ok_or(OsmError::IndexOutOfRange {
                index,
                len: self.bbox.len(),
            })
    }

    pub fn tags_of(&self, index: usize, strings: &StringTable) -> Result<BTreeMap<String, String>> {
        self.tags.get_tags(index, strings)
    }

    pub fn tag_ids_of(&self, index: usize) -> Result<Vec<(u32, u32)>> {
        self.tags.tag_ids(index)
    }

    pub fn get_tag(&self, index: usize, key: &str, strings: &StringTable) -> Result<Option<String>> {
        self.tags.get_tag(index, key, strings)
    }

    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.id_index.as_ref()?.index_of(id)
    }

    /// Way indexes whose bbox intersects `bbox`.
    pub fn intersects(&self, bbox: &BBox) -> Result<Vec<usize>> {
        let tree = self.spatial.as_ref().ok_or(OsmError::Frozen)?;
        let envelope = AABB::from_corners([bbox.min_lon, bbox.min_lat], [bbox.max_lon, bbox.max_lat]);
        Ok(tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|e| e.index as usize)
            .collect())
    }

    /// Up to `max_results` way indexes whose bbox is within `max_dist` of
    /// `(lon, lat)`, nearest first.
    pub fn neighbors(&self, lon: f64, lat: f64, max_results: usize, max_dist: f64) -> Result<Vec<usize>> {
        use rstar::PointDistance;
        let tree = self.spatial.as_ref().ok_or(OsmError::Frozen)?;
        let max_dist2 = max_dist * max_dist;
        Ok(tree
            .nearest_neighbor_iter(&[lon, lat])
            .take_while(|e| e.distance_2(&[lon, lat]) <= max_dist2)
            .take(max_results)
            .map(|e| e.index as usize)
            .collect())
    }
}
