//! Record codec: JSON payloads, optionally gzip-compressed.
//!
//! Payloads are self-describing JSON. Compressed payloads are gzip streams;
//! the level only matters when encoding, decompression is level-independent.
//!
//! Decoding failures are data-integrity errors. Callers must treat them as a
//! corrupt record rather than retrying.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tierhouse_core::{CompressionLevel, Error, Record, Result};

/// Serialize a record, compressing it when a level is given.
pub fn encode(record: &Record, level: Option<CompressionLevel>) -> Result<Bytes> {
    let json = serde_json::to_vec(record).map_err(|e| Error::Decode(e.to_string()))?;

    match level {
        None => Ok(Bytes::from(json)),
        Some(level) => {
            let mut encoder = GzEncoder::new(
                Vec::with_capacity(json.len() / 2),
                Compression::new(level.get()),
            );
            encoder
                .write_all(&json)
                .map_err(|e| Error::Compression(e.to_string()))?;
            let compressed = encoder
                .finish()
                .map_err(|e| Error::Compression(e.to_string()))?;
            Ok(Bytes::from(compressed))
        }
    }
}

/// Deserialize a payload produced by [`encode`].
pub fn decode(data: &[u8], is_compressed: bool) -> Result<Record> {
    if is_compressed {
        let json = decompress(data)?;
        parse(&json)
    } else {
        parse(data)
    }
}

/// Inflate a gzip payload without parsing it.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Compression(e.to_string()))?;
    Ok(out)
}

fn parse(json: &[u8]) -> Result<Record> {
    serde_json::from_slice(json).map_err(|e| Error::Decode(e.to_string()))
}
