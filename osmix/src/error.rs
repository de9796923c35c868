use thiserror::Error;

/// Errors produced by every subsystem of the columnar store, codec, merge
/// engine, and router. One enum for the whole crate, since call sites never
/// need to distinguish "which module" beyond what the variant already says.
#[derive(Error, Debug)]
pub enum OsmError {
    #[error("malformed PBF input: {0}")]
    MalformedPbf(String),

    #[error("unsupported blob compression: expected zlib_data, found none")]
    UnsupportedCompression,

    #[error("blob header too large: {size} bytes (hard limit 64 KiB)")]
    HeaderTooLarge { size: usize },

    #[error("blob too large: {size} bytes (hard limit 32 MiB)")]
    BlobTooLarge { size: usize },

    #[error("first blob in stream was not an OSMHeader")]
    MissingHeader,

    #[error("entity appeared out of order: {0}")]
    OutOfOrderEntity(String),

    #[error("dangling reference: way {way_id} references missing node {missing_node_id}")]
    DanglingNodeRef { way_id: i64, missing_node_id: i64 },

    #[error("dangling reference: relation {relation_id} references missing {member_type} {missing_ref}")]
    DanglingMemberRef {
        relation_id: i64,
        member_type: &'static str,
        missing_ref: i64,
    },

    #[error("mutation attempted on a frozen table")]
    Frozen,

    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("id {0} out of range for string table")]
    IdOutOfRange(u32),

    #[error("changeset tried to create over existing id {0}")]
    ConflictingCreate(i64),

    #[error("changeset contained a stale modify/delete for id {0} with no matching base entity")]
    StaleChange(i64),

    #[error("A* requires a coordinate lookup function when the heuristic needs node positions")]
    AStarRequiresCoords,

    #[error("entity not found: {kind} {id}")]
    NotFound { kind: &'static str, id: i64 },

    #[error("failure setting up ingest progress reporting: {0}")]
    ProgressBar(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OsmError>;
