//! The `Osm` dataset façade: composes the four columnar tables, owns the
//! nodes-before-ways-before-relations ingest order, and wires the PBF
//! codec to them.

use crate::error::{OsmError, Result};
use crate::node_table::{BBox, NodeTable};
use crate::pbf::{
    self, decode_header_block, decode_primitive_block, encode_dense_node_block, encode_header_block,
    encode_relation_block, encode_way_block, DecodedDenseNodes, DecodedGroup, DecodedRelation,
    DecodedRelationMember, DecodedWay,
};
use crate::relation_table::{Member, MemberType, RelationTable};
use crate::string_table::StringTable;
use crate::way_table::WayTable;
use kdam::{term, Bar, BarExt};
use std::collections::{BTreeMap, HashMap};

/// Max entities per PrimitiveGroup the writer will emit; mirrors the
/// informal convention real `.osm.pbf` writers follow.
const WRITE_CHUNK: usize = 8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Nodes,
    Ways,
    Relations,
}

pub struct Node {
    pub id: i64,
    pub lon: f64,
    pub lat: f64,
    pub tags: BTreeMap<String, String>,
}

pub struct Way {
    pub id: i64,
    pub refs: Vec<i64>,
    pub tags: BTreeMap<String, String>,
}

pub struct Relation {
    pub id: i64,
    pub members: Vec<Member>,
    pub tags: BTreeMap<String, String>,
}

/// An in-memory OSM dataset: one shared string table plus the three
/// entity tables, with a single `finish()` freeze point.
pub struct Osm {
    strings: StringTable,
    nodes: NodeTable,
    ways: WayTable,
    relations: RelationTable,
    stage: Stage,
    frozen: bool,
}

impl Default for Osm {
    fn default() -> Self {
        Self::new()
    }
}

impl Osm {
    pub fn new() -> Self {
        Osm {
            strings: StringTable::new(),
            nodes: NodeTable::new(),
            ways: WayTable::new(),
            relations: RelationTable::new(),
            stage: Stage::Nodes,
            frozen: false,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn ways(&self) -> &WayTable {
        &self.ways
    }

    pub fn relations(&self) -> &RelationTable {
        &self.relations
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Appends a node. Fails `OutOfOrderEntity` once a way or relation has
    /// already been added.
    pub fn add_node<'a, I>(&mut self, id: i64, lon: f64, lat: f64, tags: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if self.stage != Stage::Nodes {
            return Err(OsmError::OutOfOrderEntity(format!(
                "node {id} appeared after the first way or relation"
            )));
        }
        self.nodes.add_node(&mut self.strings, id, lon, lat, tags)
    }

    /// Appends a way. Fails `OutOfOrderEntity` once a relation has already
    /// been added.
    pub fn add_way<'a, I>(&mut self, id: i64, refs: &[i64], tags: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        if self.stage == Stage::Relations {
            return Err(OsmError::OutOfOrderEntity(format!("way {id} appeared after the first relation")));
        }
        self.stage = Stage::Ways;
        self.ways.add_way(&mut self.strings, id, refs, tags)
    }

    pub fn add_relation<'a, I, M>(&mut self, id: i64, members: M, tags: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
        M: IntoIterator<Item = (MemberType, i64, &'a str)>,
    {
        self.stage = Stage::Relations;
        self.relations.add_relation(&mut self.strings, id, members, tags)
    }

    /// Freezes every table and builds every spatial/id index. One-way.
    pub fn finish(&mut self) -> Result<()> {
        if self.frozen {
            return Ok(());
        }
        self.nodes.finish();
        self.ways.finish(&self.nodes)?;
        self.relations.finish();
        self.strings.compact();
        self.frozen = true;
        Ok(())
    }

    pub fn get_node(&self, id: i64) -> Result<Node> {
        let index = self.nodes.index_of(id).ok_or(OsmError::NotFound { kind: "node", id })?;
        let (lon, lat) = self.nodes.coord_of(index)?;
        Ok(Node { id, lon, lat, tags: self.nodes.tags_of(index, &self.strings)? })
    }

    pub fn get_way(&self, id: i64) -> Result<Way> {
        let index = self.ways.index_of(id).ok_or(OsmError::NotFound { kind: "way", id })?;
        Ok(Way {
            id,
            refs: self.ways.refs_of(index)?.to_vec(),
            tags: self.ways.tags_of(index, &self.strings)?,
        })
    }

    pub fn get_relation(&self, id: i64) -> Result<Relation> {
        let index = self
            .relations
            .index_of(id)
            .ok_or(OsmError::NotFound { kind: "relation", id })?;
        Ok(Relation {
            id,
            members: self.relations.get_members(index, &self.strings)?,
            tags: self.relations.tags_of(index, &self.strings)?,
        })
    }

    pub fn get_node_coord(&self, id: i64) -> Result<(f64, f64)> {
        let index = self.nodes.index_of(id).ok_or(OsmError::NotFound { kind: "node", id })?;
        self.nodes.coord_of(index)
    }

    /// Decodes a full `.osm.pbf` byte buffer into a fresh, frozen `Osm`.
    pub fn load_from_pbf(bytes: &[u8]) -> Result<Osm> {
        let mut osm = Osm::new();
        let mut reader = pbf::BlobStreamReader::new();
        let blobs = reader.next_chunk(bytes)?;
        reader.finish()?;

        let _ = term::hide_cursor();
        let mut blob_bar = Bar::builder()
            .desc("decoding blobs")
            .total(blobs.len())
            .position(0)
            .build()
            .map_err(OsmError::ProgressBar)?;
        let mut nodes_bar = Bar::builder()
            .desc("nodes ingested")
            .position(1)
            .build()
            .map_err(OsmError::ProgressBar)?;
        let mut ways_bar = Bar::builder()
            .desc("ways ingested")
            .position(2)
            .build()
            .map_err(OsmError::ProgressBar)?;

        for blob in blobs {
            match blob.blob_type.as_str() {
                "OSMHeader" => {
                    let _header = decode_header_block(&blob.data)?;
                }
                "OSMData" => {
                    let block = decode_primitive_block(&blob.data)?;
                    for group in block.groups {
                        let nodes_before = osm.node_count();
                        let ways_before = osm.way_count();
                        apply_group(&mut osm, group, &block.stringtable)?;
                        let _ = nodes_bar.update(osm.node_count() - nodes_before);
                        let _ = ways_bar.update(osm.way_count() - ways_before);
                    }
                }
                other => {
                    return Err(OsmError::MalformedPbf(format!("unknown blob type '{other}'")));
                }
            }
            let _ = blob_bar.update(1);
        }
        eprintln!();
        eprintln!();
        eprintln!();
        let _ = term::show_cursor();

        osm.finish()?;
        Ok(osm)
    }

    /// Encodes this (frozen) dataset back to `.osm.pbf` bytes.
    pub fn write_pbf(&self) -> Result<Vec<u8>> {
        if !self.frozen {
            return Err(OsmError::Frozen);
        }
        let mut out = Vec::new();
        let required_features = ["OsmSchema-V0.6", "DenseNodes"];
        pbf::blob::write_blob(
            &mut out,
            "OSMHeader",
            &encode_header_block(&self.nodes.bbox(), &required_features),
        )?;

        for chunk_start in (0..self.nodes.len()).step_by(WRITE_CHUNK) {
            let chunk_end = (chunk_start + WRITE_CHUNK).min(self.nodes.len());
            let tag_maps: Vec<BTreeMap<String, String>> = (chunk_start..chunk_end)
                .map(|i| self.nodes.tags_of(i, &self.strings))
                .collect::<Result<_>>()?;
            let mut builder = BlockStringBuilder::new();
            let mut ids = Vec::with_capacity(chunk_end - chunk_start);
            let mut lons = Vec::with_capacity(chunk_end - chunk_start);
            let mut lats = Vec::with_capacity(chunk_end - chunk_start);
            let mut tags = Vec::with_capacity(chunk_end - chunk_start);
            for (offset, i) in (chunk_start..chunk_end).enumerate() {
                ids.push(self.nodes.id_of(i)?);
                let (lon, lat) = self.nodes.coord_of(i)?;
                lons.push(lon);
                lats.push(lat);
                tags.push(
                    tag_maps[offset]
                        .iter()
                        .map(|(k, v)| (builder.intern(k), builder.intern(v)))
                        .collect(),
                );
            }
            let dense = DecodedDenseNodes { ids, lons, lats, tags };
            pbf::blob::write_blob(&mut out, "OSMData", &encode_dense_node_block(&builder.list, &dense))?;
        }

        for chunk_start in (0..self.ways.len()).step_by(WRITE_CHUNK) {
            let chunk_end = (chunk_start + WRITE_CHUNK).min(self.ways.len());
            let tag_maps: Vec<BTreeMap<String, String>> = (chunk_start..chunk_end)
                .map(|i| self.ways.tags_of(i, &self.strings))
                .collect::<Result<_>>()?;
            let mut builder = BlockStringBuilder::new();
            let mut ways = Vec::with_capacity(chunk_end - chunk_start);
            for (offset, i) in (chunk_start..chunk_end).enumerate() {
                ways.push(DecodedWay {
                    id: self.ways.id_of(i)?,
                    refs: self.ways.refs_of(i)?.to_vec(),
                    tags: tag_maps[offset].iter().map(|(k, v)| (builder.intern(k), builder.intern(v))).collect(),
                });
            }
            pbf::blob::write_blob(&mut out, "OSMData", &encode_way_block(&builder.list, &ways))?;
        }

        for chunk_start in (0..self.relations.len()).step_by(WRITE_CHUNK) {
            let chunk_end = (chunk_start + WRITE_CHUNK).min(self.relations.len());
            let tag_maps: Vec<BTreeMap<String, String>> = (chunk_start..chunk_end)
                .map(|i| self.relations.tags_of(i, &self.strings))
                .collect::<Result<_>>()?;
            let member_lists: Vec<Vec<Member>> = (chunk_start..chunk_end)
                .map(|i| self.relations.get_members(i, &self.strings))
                .collect::<Result<_>>()?;
            let mut builder = BlockStringBuilder::new();
            let mut relations = Vec::with_capacity(chunk_end - chunk_start);
            for (offset, i) in (chunk_start..chunk_end).enumerate() {
                let members = member_lists[offset]
                    .iter()
                    .map(|m| DecodedRelationMember {
                        member_type: m.member_type.as_u8(),
                        member_ref: m.member_ref,
                        role_sid: builder.intern(&m.role),
                    })
                    .collect();
                relations.push(DecodedRelation {
                    id: self.relations.id_of(i)?,
                    members,
                    tags: tag_maps[offset].iter().map(|(k, v)| (builder.intern(k), builder.intern(v))).collect(),
                });
            }
            pbf::blob::write_blob(&mut out, "OSMData", &encode_relation_block(&builder.list, &relations))?;
        }

        Ok(out)
    }
}

fn block_string<'a>(table: &'a [Vec<u8>], id: u32) -> Result<&'a str> {
    let bytes = table
        .get(id as usize)
        .ok_or(OsmError::IdOutOfRange(id))?;
    std::str::from_utf8(bytes).map_err(|e| OsmError::MalformedPbf(e.to_string()))
}

fn apply_group(osm: &mut Osm, group: DecodedGroup, block_strings: &[Vec<u8>]) -> Result<()> {
    match group {
        DecodedGroup::Dense(dense) => {
            for i in 0..dense.ids.len() {
                let tags: Result<Vec<(&str, &str)>> = dense.tags[i]
                    .iter()
                    .map(|&(k, v)| Ok((block_string(block_strings, k)?, block_string(block_strings, v)?)))
                    .collect();
                osm.add_node(dense.ids[i], dense.lons[i], dense.lats[i], tags?)?;
            }
        }
        DecodedGroup::Ways(ways) => {
            for way in ways {
                let tags: Result<Vec<(&str, &str)>> = way
                    .tags
                    .iter()
                    .map(|&(k, v)| Ok((block_string(block_strings, k)?, block_string(block_strings, v)?)))
                    .collect();
                osm.add_way(way.id, &way.refs, tags?)?;
            }
        }
        DecodedGroup::Relations(relations) => {
            for relation in relations {
                let tags: Result<Vec<(&str, &str)>> = relation
                    .tags
                    .iter()
                    .map(|&(k, v)| Ok((block_string(block_strings, k)?, block_string(block_strings, v)?)))
                    .collect();
                let members: Result<Vec<(MemberType, i64, &str)>> = relation
                    .members
                    .iter()
                    .map(|m| {
                        Ok((
                            MemberType::from_u8(m.member_type)?,
                            m.member_ref,
                            block_string(block_strings, m.role_sid)?,
                        ))
                    })
                    .collect();
                osm.add_relation(relation.id, members?, tags?)?;
            }
        }
    }
    Ok(())
}

/// Interns `&str`s into 1-based local ids for a single outgoing block (local
/// id 0 is always the reserved empty string, matching `encode_stringtable`).
struct BlockStringBuilder<'a> {
    map: HashMap<&'a str, u32>,
    list: Vec<&'a str>,
}

impl<'a> BlockStringBuilder<'a> {
    fn new() -> Self {
        BlockStringBuilder { map: HashMap::new(), list: Vec::new() }
    }

    fn intern(&mut self, s: &'a str) -> u32 {
        if let Some(&id) = self.map.get(s) {
            return id;
        }
        let id = (self.list.len() + 1) as u32;
        self.list.push(s);
        self.map.insert(s, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_order_rejects_node_after_way() {
        let mut osm = Osm::new();
        osm.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        osm.add_node(2, 1.0, 1.0, std::iter::empty()).unwrap();
        osm.add_way(100, &[1, 2], std::iter::empty()).unwrap();
        let err = osm.add_node(3, 2.0, 2.0, std::iter::empty());
        assert!(matches!(err, Err(OsmError::OutOfOrderEntity(_))));
    }

    #[test]
    fn pbf_round_trip_preserves_nodes_ways_and_relations() {
        let mut osm = Osm::new();
        osm.add_node(1, 7.40, 43.70, [("name", "A")]).unwrap();
        osm.add_node(2, 7.41, 43.71, std::iter::empty()).unwrap();
        osm.add_way(100, &[1, 2], [("highway", "residential")]).unwrap();
        osm.add_relation(200, [(MemberType::Way, 100, "outer")], [("type", "multipolygon")])
            .unwrap();
        osm.finish().unwrap();

        let bytes = osm.write_pbf().unwrap();
        let reloaded = Osm::load_from_pbf(&bytes).unwrap();

        assert_eq!(reloaded.node_count(), 2);
        assert_eq!(reloaded.way_count(), 1);
        assert_eq!(reloaded.relation_count(), 1);
        let way = reloaded.get_way(100).unwrap();
        assert_eq!(way.refs, vec![1, 2]);
        assert_eq!(way.tags.get("highway").map(String::as_str), Some("residential"));
        let relation = reloaded.get_relation(200).unwrap();
        assert_eq!(relation.members[0].member_ref, 100);
    }

    #[test]
    fn get_way_reports_not_found_for_missing_id() {
        let mut osm = Osm::new();
        osm.add_node(1, 0.0, 0.0, std::iter::empty()).unwrap();
        osm.finish().unwrap();
        assert!(matches!(osm.get_way(999), Err(OsmError::NotFound { kind: "way", id: 999 })));
    }
}
