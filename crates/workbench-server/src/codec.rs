//! Payload codec: gzip-compressed XML documents
//!
//! Every payload on the wire, in either direction, is one XML document
//! compressed as a single gzip stream. Lengths on the wire are always the
//! compressed length.

use crate::error::{DecodeError, EncodeError};
use crate::protocol::{self, PayloadKind};
use workbench_core::{gzip, Model, XmlDocument};

/// Decode a complete payload
///
/// # Errors
/// - `DecodeError::LengthMismatch` if `raw` is not exactly `declared_len` bytes
/// - `DecodeError::Gzip` for a missing/bad gzip header or corrupt stream
/// - `DecodeError::Xml` if the decompressed bytes are not one document
pub fn decode(raw: &[u8], declared_len: usize) -> Result<XmlDocument, DecodeError> {
    if raw.len() != declared_len {
        return Err(DecodeError::LengthMismatch {
            declared: declared_len,
            actual: raw.len(),
        });
    }
    let xml = gzip::decompress(raw).map_err(DecodeError::Gzip)?;
    Ok(XmlDocument::parse(xml.as_slice())?)
}

/// Compressed payload ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    bytes: Vec<u8>,
}

impl EncodedPayload {
    /// Compressed length, as announced in the header
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty (never true for encoder output)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Compressed bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Header line announcing this payload
    #[must_use]
    pub fn header(&self, kind: PayloadKind) -> String {
        protocol::payload_header(kind, self.len())
    }

    /// Take the bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Serialize and compress a document
///
/// # Errors
/// Returns `EncodeError` if writing or compressing fails
pub fn encode(document: &XmlDocument) -> Result<EncodedPayload, EncodeError> {
    let xml = document.to_bytes()?;
    let bytes = gzip::compress(&xml).map_err(EncodeError::Compress)?;
    Ok(EncodedPayload { bytes })
}

/// Serialize and compress a model
///
/// # Errors
/// Same as [`encode`]
pub fn encode_model(model: &dyn Model) -> Result<EncodedPayload, EncodeError> {
    encode(&XmlDocument::new(model.to_xml()))
}
