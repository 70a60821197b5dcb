//! Storage encoding for large text columns.
//!
//! Payloads at or above [`CompressionPolicy::min_bytes`] are zlib-compressed
//! into a companion `BYTEA` column and the text column holds
//! [`COMPRESSED_SENTINEL`]. Compression is skipped when it would not shrink
//! the payload. Callers outside this crate only ever see plain text.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use canon_core::defaults::{COMPRESSED_SENTINEL, COMPRESSION_MIN_BYTES};
use canon_core::{Error, Result};

/// When to move a text payload into the compressed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    pub min_bytes: usize,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            min_bytes: COMPRESSION_MIN_BYTES,
        }
    }
}

/// Values for a `(text, text_compressed)` column pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub text: String,
    pub compressed: Option<Vec<u8>>,
}

impl CompressionPolicy {
    pub fn new(min_bytes: usize) -> Self {
        Self { min_bytes }
    }

    /// Encode a payload for storage.
    pub fn encode(&self, value: &str) -> Result<EncodedText> {
        // A literal sentinel must always go through the bytes column or it
        // would read back as a corrupt marker.
        let is_sentinel = value == COMPRESSED_SENTINEL;
        if value.len() < self.min_bytes && !is_sentinel {
            return Ok(plain(value));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(value.as_bytes())?;
        let compressed = encoder.finish()?;

        if compressed.len() >= value.len() && !is_sentinel {
            return Ok(plain(value));
        }
        Ok(EncodedText {
            text: COMPRESSED_SENTINEL.to_string(),
            compressed: Some(compressed),
        })
    }
}

fn plain(value: &str) -> EncodedText {
    EncodedText {
        text: value.to_string(),
        compressed: None,
    }
}

/// Decode a `(text, text_compressed)` pair read from `field`.
pub fn decode_text(field: &str, text: String, compressed: Option<Vec<u8>>) -> Result<String> {
    match compressed {
        None if text == COMPRESSED_SENTINEL => Err(Error::Storage(format!(
            "inconsistent compressed payload marker for {}: sentinel present without compressed bytes",
            field
        ))),
        None => Ok(text),
        Some(_) if text != COMPRESSED_SENTINEL => Err(Error::Storage(format!(
            "inconsistent compressed payload marker for {}: expected sentinel text value",
            field
        ))),
        Some(bytes) => {
            let mut decoded = String::new();
            ZlibDecoder::new(bytes.as_slice())
                .read_to_string(&mut decoded)
                .map_err(|e| {
                    Error::Storage(format!(
                        "failed to decompress storage payload for {}: {}",
                        field, e
                    ))
                })?;
            Ok(decoded)
        }
    }
}
