//! Blob framing and the streaming reader state machine.

use super::proto::{FieldReader, MessageWriter};
use crate::error::{OsmError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

pub const MAX_HEADER_LEN: usize = 64 * 1024;
pub const MAX_BLOB_LEN: usize = 32 * 1024 * 1024;
/// Soft limit the writer targets; the reader only hard-fails past
/// `MAX_BLOB_LEN`.
pub const RECOMMENDED_MAX_BLOB_LEN: usize = 16 * 1024 * 1024;

pub struct DecodedBlob {
    pub blob_type: String,
    pub data: Vec<u8>,
}

enum State {
    ReadHeaderLength,
    ReadBlobHeader { needed: usize },
    ReadBlob { blob_type: String, needed: usize },
}

/// Explicit state-machine parser over an append-only byte buffer. Callers
/// push bytes as they arrive and receive every blob that became fully
/// available.
pub struct BlobStreamReader {
    buffer: Vec<u8>,
    state: State,
    seen_first_blob: bool,
}

impl Default for BlobStreamReader {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStreamReader {
    pub fn new() -> Self {
        BlobStreamReader {
            buffer: Vec::new(),
            state: State::ReadHeaderLength,
            seen_first_blob: false,
        }
    }

    pub fn next_chunk(&mut self, bytes: &[u8]) -> Result<Vec<DecodedBlob>> {
        self.buffer.extend_from_slice(bytes);
        let mut emitted = Vec::new();
        loop {
            match &self.state {
                State::ReadHeaderLength => {
                    if self.buffer.len() < 4 {
                        break;
                    }
                    let n = u32::from_be_bytes(self.buffer[0..4].try_into().unwrap()) as usize;
                    if n > MAX_HEADER_LEN {
                        return Err(OsmError::HeaderTooLarge { size: n });
                    }
                    self.buffer.drain(0..4);
                    self.state = State::ReadBlobHeader { needed: n };
                }
                State::ReadBlobHeader { needed } => {
                    let needed = *needed;
                    if self.buffer.len() < needed {
                        break;
                    }
                    let header_bytes: Vec<u8> = self.buffer.drain(0..needed).collect();
                    let (blob_type, datasize) = parse_blob_header(&header_bytes)?;
                    self.state = State::ReadBlob {
                        blob_type,
                        needed: datasize as usize,
                    };
                }
                State::ReadBlob { blob_type, needed } => {
                    let needed = *needed;
                    if needed > MAX_BLOB_LEN {
                        return Err(OsmError::BlobTooLarge { size: needed });
                    }
                    if self.buffer.len() < needed {
                        break;
                    }
                    let blob_type = blob_type.clone();
                    let blob_bytes: Vec<u8> = self.buffer.drain(0..needed).collect();
                    let data = decode_blob(&blob_bytes)?;
                    if !self.seen_first_blob {
                        self.seen_first_blob = true;
                        if blob_type != "OSMHeader" {
                            return Err(OsmError::MissingHeader);
                        }
                    }
                    emitted.push(DecodedBlob { blob_type, data });
                    self.state = State::ReadHeaderLength;
                }
            }
        }
        Ok(emitted)
    }

    /// Signals end of input; any bytes still buffered mid-blob are a
    /// truncation error.
    pub fn finish(&self) -> Result<()> {
        match &self.state {
            State::ReadHeaderLength if self.buffer.is_empty() => Ok(()),
            _ => Err(OsmError::MalformedPbf("input ended mid-blob".into())),
        }
    }
}

fn parse_blob_header(bytes: &[u8]) -> Result<(String, i32)> {
    let mut reader = FieldReader::new(bytes);
    let mut blob_type = None;
    let mut datasize = None;
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => blob_type = Some(value.as_str()?.to_string()),
            3 => datasize = Some(value.as_i32()?),
            _ => {}
        }
    }
    let blob_type = blob_type.ok_or_else(|| OsmError::MalformedPbf("BlobHeader missing type".into()))?;
    let datasize = datasize.ok_or_else(|| OsmError::MalformedPbf("BlobHeader missing datasize".into()))?;
    Ok((blob_type, datasize))
}

fn decode_blob(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut reader = FieldReader::new(bytes);
    let mut raw: Option<&[u8]> = None;
    let mut zlib_data: Option<&[u8]> = None;
    let mut raw_size: Option<i32> = None;
    while let Some((field, value)) = reader.next_field()? {
        match field {
            1 => raw_size = Some(value.as_i32()?),
            2 => raw = Some(value.as_bytes()?),
            3 => zlib_data = Some(value.as_bytes()?),
            _ => {}
        }
    }
    if let Some(zlib_bytes) = zlib_data {
        let expected = raw_size.unwrap_or(0).max(0) as usize;
        let mut out = Vec::with_capacity(expected);
        ZlibDecoder::new(zlib_bytes)
            .read_to_end(&mut out)
            .map_err(|e| OsmError::MalformedPbf(format!("zlib inflate failed: {e}")))?;
        Ok(out)
    } else if let Some(raw_bytes) = raw {
        Ok(raw_bytes.to_vec())
    } else {
        Err(OsmError::UnsupportedCompression)
    }
}

/// Encodes `data` (an already-serialized HeaderBlock or PrimitiveBlock) as a
/// zlib-compressed blob, preceded by its framing, appended to `out`.
pub fn write_blob(out: &mut Vec<u8>, blob_type: &str, data: &[u8]) -> Result<()> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| OsmError::MalformedPbf(format!("zlib deflate failed: {e}")))?;
    let zlib_data = encoder
        .finish()
        .map_err(|e| OsmError::MalformedPbf(format!("zlib deflate failed: {e}")))?;

    let mut blob = MessageWriter::new();
    blob.write_i32_field(1, data.len() as i32);
    blob.write_bytes_field(3, &zlib_data);
    let blob_bytes = blob.into_bytes();
    if blob_bytes.len() > MAX_BLOB_LEN {
        return Err(OsmError::BlobTooLarge { size: blob_bytes.len() });
    }
    if blob_bytes.len() > RECOMMENDED_MAX_BLOB_LEN {
        log::warn!(
            "writer produced a blob of {} bytes, above the recommended {} byte limit",
            blob_bytes.len(),
            RECOMMENDED_MAX_BLOB_LEN
        );
    }

    let mut header = MessageWriter::new();
    header.write_string_field(1, blob_type);
    header.write_i32_field(3, blob_bytes.len() as i32);
    let header_bytes = header.into_bytes();
    if header_bytes.len() > MAX_HEADER_LEN {
        return Err(OsmError::HeaderTooLarge { size: header_bytes.len() });
    }

    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&blob_bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_fixture_header_block() -> Vec<u8> {
        let mut block = MessageWriter::new();
        block.write_string_field(4, "OsmSchema-V0.6");
        block.write_string_field(4, "DenseNodes");
        block.into_bytes()
    }

    #[test]
    fn reads_a_single_framed_blob() {
        let mut out = Vec::new();
        write_blob(&mut out, "OSMHeader", &encode_fixture_header_block()).unwrap();

        let mut reader = BlobStreamReader::new();
        let blobs = reader.next_chunk(&out).unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].blob_type, "OSMHeader");
    }

    #[test]
    fn feeding_bytes_incrementally_still_yields_the_blob() {
        let mut out = Vec::new();
        write_blob(&mut out, "OSMHeader", &encode_fixture_header_block()).unwrap();

        let mut reader = BlobStreamReader::new();
        let mut emitted = Vec::new();
        for chunk in out.chunks(3) {
            emitted.extend(reader.next_chunk(chunk).unwrap());
        }
        assert_eq!(emitted.len(), 1);
    }

    #[test]
    fn non_header_first_blob_fails() {
        let mut out = Vec::new();
        write_blob(&mut out, "OSMData", &[]).unwrap();
        let mut reader = BlobStreamReader::new();
        assert!(matches!(reader.next_chunk(&out), Err(OsmError::MissingHeader)));
    }

    #[test]
    fn truncated_final_blob_is_malformed_on_finish() {
        let mut out = Vec::new();
        write_blob(&mut out, "OSMHeader", &encode_fixture_header_block()).unwrap();
        out.truncate(out.len() - 2);

        let mut reader = BlobStreamReader::new();
        let _ = reader.next_chunk(&out).unwrap();
        assert!(reader.finish().is_err());
    }
}
