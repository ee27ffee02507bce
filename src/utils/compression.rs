//! Deflate compression for message bodies.
//!
//! A compressed body is a marker byte followed by a zlib-wrapped Deflate
//! stream: `[0x1f][zlib header][deflate data]`. A receiver recognises it by
//! the marker together with a valid zlib header, so plain bodies pass through
//! untouched.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::messaging::error::ReplyError;

/// Marker byte in front of every compressed body.
const MARKER_DEFLATE: u8 = 0x1f;

/// Compress `data` and prefix it with the marker.
///
/// # Errors
///
/// Returns `ReplyError::Compression` if the encoder fails.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, ReplyError> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    out.push(MARKER_DEFLATE);

    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| ReplyError::Compression(format!("deflate write failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| ReplyError::Compression(format!("deflate finish failed: {e}")))
}

/// Decompress a body produced by [`compress`].
///
/// # Errors
///
/// Returns `ReplyError::Compression` if `data` lacks the marker or is not a
/// valid stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, ReplyError> {
    let stream = match data.split_first() {
        Some((&MARKER_DEFLATE, stream)) => stream,
        _ => return Err(ReplyError::Compression("missing deflate marker".to_string())),
    };

    let mut decoder = ZlibDecoder::new(stream);
    let mut out = Vec::with_capacity(stream.len() * 2);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ReplyError::Compression(format!("deflate read failed: {e}")))?;
    Ok(out)
}

/// Whether `data` carries the marker followed by a zlib header.
pub fn is_compressed(data: &[u8]) -> bool {
    match data {
        [MARKER_DEFLATE, cmf, flg, ..] => {
            let method = cmf & 0x0f;
            let window = cmf >> 4;
            method == 8 && window <= 7 && (u16::from(*cmf) * 256 + u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}
