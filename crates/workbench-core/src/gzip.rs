//! Gzip helpers shared by the wire codec and file import/export

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Gzip magic bytes
pub const MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compress `data` into a complete gzip stream
///
/// # Errors
/// Returns the encoder's IO error
pub fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Largest decompressed size [`decompress`] accepts
pub const MAX_DECOMPRESSED_LEN: usize = 256 << 20;

/// Decompress a complete gzip stream of at most [`MAX_DECOMPRESSED_LEN`] bytes
///
/// # Errors
/// Same as [`decompress_limited`]
pub fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    decompress_limited(data, MAX_DECOMPRESSED_LEN)
}

/// Decompress a complete gzip stream, refusing output beyond `limit` bytes
///
/// # Errors
/// - `InvalidInput` if `data` does not start with a gzip header
/// - `InvalidData` if the output would exceed `limit`
/// - any IO error from a truncated or corrupt stream
pub fn decompress_limited(data: &[u8], limit: usize) -> io::Result<Vec<u8>> {
    if !has_header(data) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "missing gzip header",
        ));
    }
    let mut out = Vec::with_capacity(data.len().saturating_mul(4).min(limit));
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    GzDecoder::new(data).take(cap).read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed size exceeds {limit} bytes"),
        ));
    }
    Ok(out)
}

/// Whether `data` begins with the gzip magic bytes
#[inline]
#[must_use]
pub fn has_header(data: &[u8]) -> bool {
    data.starts_with(&MAGIC)
}
