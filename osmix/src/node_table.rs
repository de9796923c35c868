//! Id+tag+coord columns for nodes, with a static spatial index over
//! `(lon, lat)`.

use crate::column::Column;
use crate::error::{OsmError, Result};
use crate::id_index::IdIndex;
use crate::string_table::StringTable;
use crate::tag_table::TagTable;
use rstar::{RTree, RTreeObject, AABB};
use std::collections::BTreeMap;

/// Axis-aligned bounding box in (lon, lat).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    pub fn empty() -> Self {
        BBox {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        }
    }

    pub fn expand(&mut self, lon: f64, lat: f64) {
        self.min_lon = self.min_lon.min(lon);
        self.min_lat = self.min_lat.min(lat);
        self.max_lon = self.max_lon.max(lon);
        self.max_lat = self.max_lat.max(lat);
    }

    pub fn expand_bbox(&mut self, other: &BBox) {
        self.min_lon = self.min_lon.min(other.min_lon);
        self.min_lat = self.min_lat.min(other.min_lat);
        self.max_lon = self.max_lon.max(other.max_lon);
        self.max_lat = self.max_lat.max(other.max_lat);
    }

    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }
}

/// A single point in the spatial index; `RTreeObject` over a degenerate
/// (zero-area) envelope gives us bbox/radius queries for the node point
/// cloud, mirroring how the way table leans on `rstar` for way bboxes.
#[derive(Debug, Clone, Copy)]
struct IndexedPoint {
    lon: f64,
    lat: f64,
    index: u32,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lon, self.lat])
    }
}

impl rstar::PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.lon - point[0];
        let dy = self.lat - point[1];
        dx * dx + dy * dy
    }
}

pub struct Node {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
    pub tags: BTreeMap<String, String>,
}

/// Open (append-only) or frozen node table. `finish()` is the only
/// one-way transition, building the id index and the point spatial index.
pub struct NodeTable {
    id: Column<i64>,
    lon: Column<f64>,
    lat: Column<f64>,
    tags: TagTable,
    ids_sorted_so_far: bool,
    last_id: i64,
    bbox: BBox,
    frozen: bool,
    id_index: Option<IdIndex>,
    spatial: Option<RTree<IndexedPoint>>,
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTable {
    pub fn new() -> Self {
        NodeTable {
            id: Column::new(),
            lon: Column::new(),
            lat: Column::new(),
            tags: TagTable::new(),
            ids_sorted_so_far: true,
            last_id: i64::MIN,
            bbox: BBox::empty(),
            frozen: false,
            id_index: None,
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

    /// Appends a single node. Fails `Frozen` if called after `finish()`.
    pub fn add_node<'a, I>(
        &mut self,
        strings: &mut StringTable,
        id: i64,
        lon: f64,
        lat: f64,
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
        self.lon.push(lon);
        self.lat.push(lat);
        self.bbox.expand(lon, lat);
        self.tags.add_tags(strings, tags)?;
        Ok(index)
    }

    /// Freezes the table: compacts columns, builds the id index, builds the
    /// point spatial index. One-way; subsequent `add_node` calls fail.
    pub fn finish(&mut self) {
        if self.frozen {
            return;
        }
        self.id.compact();
        self.lon.compact();
        self.lat.compact();
        self.tags.compact();
        self.id_index = Some(IdIndex::build(self.id.as_slice(), self.ids_sorted_so_far));
        let points: Vec<IndexedPoint> = (0..self.id.len())
            .map(|i| IndexedPoint {
                lon: self.lon[i],
                lat: self.lat[i],
                index: i as u32,
            })
            .collect();
        self.spatial = Some(RTree::bulk_load(points));
        self.frozen = true;
    }

    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn id_of(&self, index: usize) -> Result<i64> {
        self.id.at(index)
    }

    pub fn coord_of(&self, index: usize) -> Result<(f64, f64)> {
        Ok((self.lon.at(index)?, self.lat.at(index)?))
    }

    pub fn tags_of(&self, index: usize, strings: &StringTable) -> Result<BTreeMap<String, String>> {
        self.tags.get_tags(index, strings)
    }

    pub fn tag_ids_of(&self, index: usize) -> Result<Vec<(u32, u32)>> {
        self.tags.tag_ids(index)
    }

    /// O(log n) after `finish()`; `None` before.
    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.id_index.as_ref()?.index_of(id)
    }

    fn spatial_index(&self) -> Result<&RTree<IndexedPoint>> {
        self.spatial.as_ref().ok_or(OsmError::Frozen)
    }

    /// Nodes whose coordinates fall within `bbox`, inclusive.
    pub fn within_bbox(&self, bbox: &BBox) -> Result<Vec<usize>> {
        let tree = self.spatial_index()?;
        let envelope = AABB::from_corners([bbox.min_lon, bbox.min_lat], [bbox.max_lon, bbox.max_lat]);
        Ok(tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|p| p.index as usize)
            .collect())
    }

    /// Nodes within planar radius `r` (in the coordinate space's own units,
    /// decimal degrees — this is a planar radius, not a great-circle one)
    /// of `(lon, lat)`.
    pub fn within_radius(&self, lon: f64, lat: f64, r: f64) -> Result<Vec<usize>> {
        let tree = self.spatial_index()?;
        let r2 = r * r;
        Ok(tree
            .locate_within_distance([lon, lat], r2)
            .map(|p| p.index as usize)
            .collect())
    }

    /// Nodes within radius `r` of the node at `index`, excluding `index`
    /// itself.
    pub fn find_neighbors_within(&self, index: usize, r: f64) -> Result<Vec<usize>> {
        let (lon, lat) = self.coord_of(index)?;
        Ok(self
            .within_radius(lon, lat, r)?
            .into_iter()
            .filter(|&i| i != index)
            .collect())
    }

    pub fn compact(&mut self) {
        self.finish();
    }
}
