//! OSM PBF wire format: framing, protobuf primitives, and primitive block
//! codecs.

pub mod blob;
pub mod primitive_block;
pub mod proto;

pub use blob::{BlobStreamReader, DecodedBlob};
pub use primitive_block::{
    decode_header_block, decode_primitive_block, encode_dense_node_block, encode_header_block,
    encode_relation_block, encode_way_block, DecodedDenseNodes, DecodedGroup, DecodedHeaderBlock,
    DecodedPrimitiveBlock, DecodedRelation, DecodedRelationMember, DecodedWay,
};
