//! HeaderBlock / PrimitiveBlock message decode and encode.
//!
//! Works on the already-decompressed bytes a [`super::blob`] blob carries.
//! Decoded primitives still carry block-local string table ids; remapping
//! those into the dataset's shared string table is the caller's job (the
//! dataset façade.

use super::proto::{decode_zigzag, encode_zigzag, FieldReader, MessageWriter};
use crate::error::{OsmError, Result};
use crate::node_table::BBox;

const NANO: f64 = 1e-9;
const DEFAULT_GRANULARITY: i64 = 100;

/// `(offset + granularity * value) * 1e-9`: the dense/plain-node coordinate
/// formula shared by decode and encode.
fn scale_coord(value: i64, granularity: i64, offset: i64) -> f64 {
    (offset as f64 + granularity as f64 * value as f64) * NANO
}

/// Inverse of [`scale_coord`]: recovers the raw accumulated value a degree
/// was encoded from at the given granularity/offset.
fn unscale_coord(degree: f64, granularity: i64, offset: i64) -> i64 {
    ((degree / NANO - offset as f64) / granularity as f64).round() as i64
}

pub struct DecodedHeaderBlock {
    pub bbox: Option<BBox>,
    pub required_features: Vec<String>,
}

pub fn decode_header_block(bytes: &[u8]) -> Result<DecodedHeaderBlock> {
    let mut reader = FieldReader::new(bytes);
    let mut bbox = None;
    let mut required_features = Vec::new();
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => bbox = Some(decode_header_bbox(value.as_bytes()?)?),
            4 => required_features.push(value.as_str()?.to_string()),
            _ => {}
        }
    }
    Ok(DecodedHeaderBlock { bbox, required_features })
}

fn decode_header_bbox(bytes: &[u8]) -> Result<BBox> {
    let mut reader = FieldReader::new(bytes);
    let (mut left, mut right, mut top, mut bottom) = (0i64, 0i64, 0i64, 0i64);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => left = zigzag_i64(&value)?,
            2 => right = zigzag_i64(&value)?,
            3 => top = zigzag_i64(&value)?,
            4 => bottom = zigzag_i64(&value)?,
            _ => {}
        }
    }
    Ok(BBox {
        min_lon: left as f64 * NANO,
        max_lon: right as f64 * NANO,
        min_lat: bottom as f64 * NANO,
        max_lat: top as f64 * NANO,
    })
}

fn zigzag_i64(value: &super::proto::WireValue) -> Result<i64> {
    Ok(decode_zigzag(value.as_varint()?))
}

pub fn encode_header_block(bbox: &BBox, required_features: &[&str]) -> Vec<u8> {
    let mut w = MessageWriter::new();
    let mut bbox_msg = MessageWriter::new();
    bbox_msg.write_varint_field(1, encode_zigzag((bbox.min_lon / NANO) as i64));
    bbox_msg.write_varint_field(2, encode_zigzag((bbox.max_lon / NANO) as i64));
    bbox_msg.write_varint_field(3, encode_zigzag((bbox.max_lat / NANO) as i64));
    bbox_msg.write_varint_field(4, encode_zigzag((bbox.min_lat / NANO) as i64));
    w.write_message_field(1, &bbox_msg);
    for feature in required_features {
        w.write_string_field(4, feature);
    }
    w.into_bytes()
}

pub struct DecodedDenseNodes {
    pub ids: Vec<i64>,
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    /// per-node list of (key_string_id, value_string_id), block-local.
    pub tags: Vec<Vec<(u32, u32)>>,
}

pub struct DecodedWay {
    pub id: i64,
    pub refs: Vec<i64>,
    pub tags: Vec<(u32, u32)>,
}

pub struct DecodedRelationMember {
    pub member_type: u8,
    pub member_ref: i64,
    pub role_sid: u32,
}

pub struct DecodedRelation {
    pub id: i64,
    pub members: Vec<DecodedRelationMember>,
    pub tags: Vec<(u32, u32)>,
}

pub enum DecodedGroup {
    Dense(DecodedDenseNodes),
    Ways(Vec<DecodedWay>),
    Relations(Vec<DecodedRelation>),
}

pub struct DecodedPrimitiveBlock {
    pub stringtable: Vec<Vec<u8>>,
    pub granularity: i64,
    pub lat_offset: i64,
    pub lon_offset: i64,
    pub groups: Vec<DecodedGroup>,
}

pub fn decode_primitive_block(bytes: &[u8]) -> Result<DecodedPrimitiveBlock> {
    let mut reader = FieldReader::new(bytes);
    let mut stringtable = Vec::new();
    let mut group_bytes: Vec<&[u8]> = Vec::new();
    let mut granularity = 100i64;
    let mut lat_offset = 0i64;
    let mut lon_offset = 0i64;

    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => stringtable = decode_stringtable(value.as_bytes()?)?,
            2 => group_bytes.push(value.as_bytes()?),
            17 => granularity = value.as_i64()?,
            19 => lat_offset = value.as_i64()?,
            20 => lon_offset = value.as_i64()?,
            _ => {}
        }
    }

    let mut groups = Vec::with_capacity(group_bytes.len());
    for bytes in group_bytes {
        groups.push(decode_primitive_group(bytes, granularity, lat_offset, lon_offset)?);
    }

    Ok(DecodedPrimitiveBlock {
        stringtable,
        granularity,
        lat_offset,
        lon_offset,
        groups,
    })
}

fn decode_stringtable(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut reader = FieldReader::new(bytes);
    let mut out = Vec::new();
    while let Some((field, value)) = reader.next_field()? {
        if field == 1 {
            out.push(value.as_bytes()?.to_vec());
        }
    }
    Ok(out)
}

fn decode_primitive_group(
    bytes: &[u8],
    granularity: i64,
    lat_offset: i64,
    lon_offset: i64,
) -> Result<DecodedGroup> {
    let mut reader = FieldReader::new(bytes);
    while let Some((field, value)) = reader.next_field()? {
        match field {
            2 => {
                return Ok(DecodedGroup::Dense(decode_dense_nodes(
                    value.as_bytes()?,
                    granularity,
                    lat_offset,
                    lon_offset,
                )?))
            }
            3 => {
                let mut ways = vec![decode_way(value.as_bytes()?)?];
                while let Some((field, value)) = reader.next_field()? {
                    if field == 3 {
                        ways.push(decode_way(value.as_bytes()?)?);
                    }
                }
                return Ok(DecodedGroup::Ways(ways));
            }
            4 => {
                let mut relations = vec![decode_relation(value.as_bytes()?)?];
                while let Some((field, value)) = reader.next_field()? {
                    if field == 4 {
                        relations.push(decode_relation(value.as_bytes()?)?);
                    }
                }
                return Ok(DecodedGroup::Relations(relations));
            }
            1 => {
                // Plain (non-dense) Node messages: rare in practice; the
                // columnar store only ever emits DenseNodes, but an
                // input PBF may still use them. Fold into a one-node dense
                // group so the rest of the pipeline has one code path.
                let mut dense = DecodedDenseNodes { ids: Vec::new(), lons: Vec::new(), lats: Vec::new(), tags: Vec::new() };
                push_plain_node(&mut dense, value.as_bytes()?, granularity, lat_offset, lon_offset)?;
                while let Some((field, value)) = reader.next_field()? {
                    if field == 1 {
                        push_plain_node(&mut dense, value.as_bytes()?, granularity, lat_offset, lon_offset)?;
                    }
                }
                return Ok(DecodedGroup::Dense(dense));
            }
            _ => {}
        }
    }
    Err(OsmError::MalformedPbf("empty primitive group".into()))
}

fn push_plain_node(
    dense: &mut DecodedDenseNodes,
    bytes: &[u8],
    granularity: i64,
    lat_offset: i64,
    lon_offset: i64,
) -> Result<()> {
    let mut reader = FieldReader::new(bytes);
    let (mut id, mut lat, mut lon) = (0i64, 0i64, 0i64);
    let mut keys = Vec::new();
    let mut vals = Vec::new();
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => id = value.as_i64()?,
            2 => keys = value.as_packed_varints()?,
            3 => vals = value.as_packed_varints()?,
            8 => lat = decode_zigzag(value.as_varint()?),
            9 => lon = decode_zigzag(value.as_varint()?),
            _ => {}
        }
    }
    dense.ids.push(id);
    dense.lats.push(scale_coord(lat, granularity, lat_offset));
    dense.lons.push(scale_coord(lon, granularity, lon_offset));
    dense.tags.push(keys.into_iter().zip(vals).map(|(k, v)| (k as u32, v as u32)).collect());
    Ok(())
}

fn decode_dense_nodes(bytes: &[u8], granularity: i64, lat_offset: i64, lon_offset: i64) -> Result<DecodedDenseNodes> {
    let mut reader = FieldReader::new(bytes);
    let mut raw_ids = Vec::new();
    let mut raw_lats = Vec::new();
    let mut raw_lons = Vec::new();
    let mut keys_vals = Vec::new();
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => raw_ids = value.as_packed_varints()?.into_iter().map(decode_zigzag).collect(),
            8 => raw_lats = value.as_packed_varints()?.into_iter().map(decode_zigzag).collect(),
            9 => raw_lons = value.as_packed_varints()?.into_iter().map(decode_zigzag).collect(),
            10 => keys_vals = value.as_packed_varints()?,
            _ => {}
        }
    }
    if raw_ids.len() != raw_lats.len() || raw_ids.len() != raw_lons.len() {
        return Err(OsmError::MalformedPbf("dense node column length mismatch".into()));
    }

    let n = raw_ids.len();
    let mut ids = Vec::with_capacity(n);
    let mut lats = Vec::with_capacity(n);
    let mut lons = Vec::with_capacity(n);
    let (mut id_acc, mut lat_acc, mut lon_acc) = (0i64, 0i64, 0i64);
    for i in 0..n {
        id_acc += raw_ids[i];
        lat_acc += raw_lats[i];
        lon_acc += raw_lons[i];
        ids.push(id_acc);
        lats.push(scale_coord(lat_acc, granularity, lat_offset));
        lons.push(scale_coord(lon_acc, granularity, lon_offset));
    }

    // keys_vals is a flat stream of per-node (key_id, val_id) pairs
    // terminated by a lone 0 between nodes; a node with no tags contributes
    // just the terminating 0.
    let mut tags: Vec<Vec<(u32, u32)>> = Vec::with_capacity(n);
    let mut cursor = 0usize;
    for _ in 0..n {
        let mut node_tags = Vec::new();
        loop {
            let k = *keys_vals
                .get(cursor)
                .ok_or_else(|| OsmError::MalformedPbf("dense node keys_vals ran out".into()))?;
            cursor += 1;
            if k == 0 {
                break;
            }
            let v = *keys_vals
                .get(cursor)
                .ok_or_else(|| OsmError::MalformedPbf("dense node keys_vals missing value".into()))?;
            cursor += 1;
            node_tags.push((k as u32, v as u32));
        }
        tags.push(node_tags);
    }

    Ok(DecodedDenseNodes { ids, lons, lats, tags })
}

fn decode_way(bytes: &[u8]) -> Result<DecodedWay> {
    let mut reader = FieldReader::new(bytes);
    let mut id = 0i64;
    let mut keys = Vec::new();
    let mut vals = Vec::new();
    let mut raw_refs = Vec::new();
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => id = value.as_i64()?,
            2 => keys = value.as_packed_varints()?,
            3 => vals = value.as_packed_varints()?,
            8 => raw_refs = value.as_packed_varints()?.into_iter().map(decode_zigzag).collect(),
            _ => {}
        }
    }
    let mut refs = Vec::with_capacity(raw_refs.len());
    let mut acc = 0i64;
    for d in raw_refs {
        acc += d;
        refs.push(acc);
    }
    let tags = keys.into_iter().zip(vals).map(|(k, v)| (k as u32, v as u32)).collect();
    Ok(DecodedWay { id, refs, tags })
}

fn decode_relation(bytes: &[u8]) -> Result<DecodedRelation> {
    let mut reader = FieldReader::new(bytes);
    let mut id = 0i64;
    let mut keys = Vec::new();
    let mut vals = Vec::new();
    let mut roles_sid = Vec::new();
    let mut raw_memids = Vec::new();
    let mut types = Vec::new();
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => id = value.as_i64()?,
            2 => keys = value.as_packed_varints()?,
            3 => vals = value.as_packed_varints()?,
            8 => roles_sid = value.as_packed_varints()?.into_iter().map(decode_zigzag).collect(),
            9 => raw_memids = value.as_packed_varints()?.into_iter().map(decode_zigzag).collect(),
            10 => types = value.as_packed_varints()?,
            _ => {}
        }
    }
    if roles_sid.len() != raw_memids.len() || raw_memids.len() != types.len() {
        return Err(OsmError::MalformedPbf("relation member column length mismatch".into()));
    }
    let mut members = Vec::with_capacity(raw_memids.len());
    let mut acc = 0i64;
    for i in 0..raw_memids.len() {
        acc += raw_memids[i];
        members.push(DecodedRelationMember {
            member_type: types[i] as u8,
            member_ref: acc,
            role_sid: roles_sid[i] as u32,
        });
    }
    let tags = keys.into_iter().zip(vals).map(|(k, v)| (k as u32, v as u32)).collect();
    Ok(DecodedRelation { id, members, tags })
}

/// Encodes a stream of dense nodes (already carrying block-local string ids)
/// as a single PrimitiveBlock containing one PrimitiveGroup. Used by the
/// writer, which partitions entities into homogeneous, size-bounded
/// groups before calling this.
pub fn encode_dense_node_block(stringtable: &[&str], dense: &DecodedDenseNodes) -> Vec<u8> {
    let mut block = MessageWriter::new();
    block.write_message_field(1, &encode_stringtable(stringtable));

    let mut group = MessageWriter::new();
    let mut dense_msg = MessageWriter::new();

    let mut id_deltas = Vec::with_capacity(dense.ids.len());
    let mut lat_deltas = Vec::with_capacity(dense.ids.len());
    let mut lon_deltas = Vec::with_capacity(dense.ids.len());
    let (mut last_id, mut last_lat, mut last_lon) = (0i64, 0i64, 0i64);
    for i in 0..dense.ids.len() {
        let lat_raw = unscale_coord(dense.lats[i], DEFAULT_GRANULARITY, 0);
        let lon_raw = unscale_coord(dense.lons[i], DEFAULT_GRANULARITY, 0);
        id_deltas.push(encode_zigzag(dense.ids[i] - last_id));
        lat_deltas.push(encode_zigzag(lat_raw - last_lat));
        lon_deltas.push(encode_zigzag(lon_raw - last_lon));
        last_id = dense.ids[i];
        last_lat = lat_raw;
        last_lon = lon_raw;
    }
    dense_msg.write_packed_varints(1, &id_deltas);
    dense_msg.write_packed_varints(8, &lat_deltas);
    dense_msg.write_packed_varints(9, &lon_deltas);

    let mut keys_vals = Vec::new();
    for node_tags in &dense.tags {
        for (k, v) in node_tags {
            keys_vals.push(*k as u64);
            keys_vals.push(*v as u64);
        }
        keys_vals.push(0);
    }
    dense_msg.write_packed_varints(10, &keys_vals);

    group.write_message_field(2, &dense_msg);
    block.write_message_field(2, &group);
    block.write_i32_field(17, DEFAULT_GRANULARITY as i32);
    block.into_bytes()
}

pub fn encode_way_block(stringtable: &[&str], ways: &[DecodedWay]) -> Vec<u8> {
    let mut block = MessageWriter::new();
    block.write_message_field(1, &encode_stringtable(stringtable));

    let mut group = MessageWriter::new();
    for way in ways {
        let mut way_msg = MessageWriter::new();
        way_msg.write_i64_field(1, way.id);
        way_msg.write_packed_varints(2, &way.tags.iter().map(|(k, _)| *k as u64).collect::<Vec<_>>());
        way_msg.write_packed_varints(3, &way.tags.iter().map(|(_, v)| *v as u64).collect::<Vec<_>>());
        let mut ref_deltas = Vec::with_capacity(way.refs.len());
        let mut last = 0i64;
        for r in &way.refs {
            ref_deltas.push(encode_zigzag(r - last));
            last = *r;
        }
        way_msg.write_packed_varints(8, &ref_deltas);
        group.write_message_field(3, &way_msg);
    }
    block.write_message_field(2, &group);
    block.into_bytes()
}

pub fn encode_relation_block(stringtable: &[&str], relations: &[DecodedRelation]) -> Vec<u8> {
    let mut block = MessageWriter::new();
    block.write_message_field(1, &encode_stringtable(stringtable));

    let mut group = MessageWriter::new();
    for relation in relations {
        let mut rel_msg = MessageWriter::new();
        rel_msg.write_i64_field(1, relation.id);
        rel_msg.write_packed_varints(2, &relation.tags.iter().map(|(k, _)| *k as u64).collect::<Vec<_>>());
        rel_msg.write_packed_varints(3, &relation.tags.iter().map(|(_, v)| *v as u64).collect::<Vec<_>>());
        rel_msg.write_packed_varints(8, &relation.members.iter().map(|m| m.role_sid as u64).collect::<Vec<_>>());
        let mut memid_deltas = Vec::with_capacity(relation.members.len());
        let mut last = 0i64;
        for m in &relation.members {
            memid_deltas.push(encode_zigzag(m.member_ref - last));
            last = m.member_ref;
        }
        rel_msg.write_packed_varints(9, &memid_deltas);
        rel_msg.write_packed_varints(10, &relation.members.iter().map(|m| m.member_type as u64).collect::<Vec<_>>());
        group.write_message_field(4, &rel_msg);
    }
    block.write_message_field(2, &group);
    block.into_bytes()
}

fn encode_stringtable(strings: &[&str]) -> MessageWriter {
    let mut w = MessageWriter::new();
    w.write_string_field(1, ""); // id 0 reserved, mirrors StringTable's convention
    for s in strings {
        w.write_string_field(1, s);
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_nodes_round_trip_through_delta_encoding() {
        let dense = DecodedDenseNodes {
            ids: vec![10, 11, 20],
            lons: vec![7.4229, 7.4230, 7.4231],
            lats: vec![43.7371, 43.7372, 43.7373],
            tags: vec![vec![(1, 2)], vec![], vec![(3, 4)]],
        };
        let encoded = encode_dense_node_block(&["a", "b", "c", "d"], &dense);
        let decoded = decode_primitive_block(&encoded).unwrap();
        assert_eq!(decoded.granularity, DEFAULT_GRANULARITY);
        assert_eq!(decoded.stringtable.len(), 5); // reserved 0 + 4 strings
        match &decoded.groups[0] {
            DecodedGroup::Dense(d) => {
                assert_eq!(d.ids, dense.ids);
                for i in 0..3 {
                    assert!((d.lons[i] - dense.lons[i]).abs() < 1e-7);
                    assert!((d.lats[i] - dense.lats[i]).abs() < 1e-7);
                }
                assert_eq!(d.tags[0], vec![(1, 2)]);
                assert!(d.tags[1].is_empty());
                assert_eq!(d.tags[2], vec![(3, 4)]);
            }
            _ => panic!("expected dense group"),
        }
    }

    #[test]
    fn decode_applies_an_independently_constructed_blocks_granularity_and_offset() {
        // Hand-builds a PrimitiveBlock the way a third-party writer would,
        // independent of `encode_dense_node_block`, to pin down the decode
        // formula itself rather than a self-cancelling round trip.
        let mut dense_msg = MessageWriter::new();
        dense_msg.write_packed_varints(1, &[encode_zigzag(1)]);
        // raw accumulated value 123, granularity 100, offset 1_000_000_000
        // -> (1_000_000_000 + 100 * 123) * 1e-9 = 1.0000123
        dense_msg.write_packed_varints(8, &[encode_zigzag(123)]);
        dense_msg.write_packed_varints(9, &[encode_zigzag(123)]);
        dense_msg.write_packed_varints(10, &[0]);
        let mut group = MessageWriter::new();
        group.write_message_field(2, &dense_msg);
        let mut block = MessageWriter::new();
        block.write_message_field(1, &encode_stringtable(&[]));
        block.write_message_field(2, &group);
        block.write_i32_field(17, 100);
        block.write_i64_field(19, 1_000_000_000);
        block.write_i64_field(20, 1_000_000_000);

        let decoded = decode_primitive_block(&block.into_bytes()).unwrap();
        assert_eq!(decoded.granularity, 100);
        match &decoded.groups[0] {
            DecodedGroup::Dense(d) => {
                assert!((d.lats[0] - 1.0000123).abs() < 1e-9);
                assert!((d.lons[0] - 1.0000123).abs() < 1e-9);
            }
            _ => panic!("expected dense group"),
        }
    }

    #[test]
    fn way_refs_round_trip_through_delta_encoding() {
        let ways = vec![DecodedWay { id: 7, refs: vec![10, 11, 20, 10], tags: vec![(1, 2)] }];
        let encoded = encode_way_block(&["highway", "residential"], &ways);
        let decoded = decode_primitive_block(&encoded).unwrap();
        match &decoded.groups[0] {
            DecodedGroup::Ways(w) => {
                assert_eq!(w[0].id, 7);
                assert_eq!(w[0].refs, vec![10, 11, 20, 10]);
                assert_eq!(w[0].tags, vec![(1, 2)]);
            }
            _ => panic!("expected way group"),
        }
    }

    #[test]
    fn relation_members_round_trip_through_delta_encoding() {
        let relations = vec![DecodedRelation {
            id: 99,
            members: vec![
                DecodedRelationMember { member_type: 1, member_ref: 10, role_sid: 1 },
                DecodedRelationMember { member_type: 1, member_ref: 20, role_sid: 2 },
            ],
            tags: vec![],
        }];
        let encoded = encode_relation_block(&["outer", "inner"], &relations);
        let decoded = decode_primitive_block(&encoded).unwrap();
        match &decoded.groups[0] {
            DecodedGroup::Relations(r) => {
                assert_eq!(r[0].id, 99);
                assert_eq!(r[0].members[0].member_ref, 10);
                assert_eq!(r[0].members[1].member_ref, 20);
            }
            _ => panic!("expected relation group"),
        }
    }

    #[test]
    fn header_bbox_round_trips() {
        let bbox = BBox { min_lon: 7.408583, max_lon: 7.595671, min_lat: 43.483817, max_lat: 43.75293 };
        let encoded = encode_header_block(&bbox, &["OsmSchema-V0.6", "DenseNodes"]);
        let decoded = decode_header_block(&encoded).unwrap();
        let decoded_bbox = decoded.bbox.unwrap();
        assert!((decoded_bbox.min_lon - bbox.min_lon).abs() < 1e-6);
        assert!((decoded_bbox.max_lat - bbox.max_lat).abs() < 1e-6);
        assert_eq!(decoded.required_features, vec!["OsmSchema-V0.6", "DenseNodes"]);
    }
}
