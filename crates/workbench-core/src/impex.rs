//! Import and export of models as XML files
//!
//! Files whose name ends in `gz` are gzip-compressed, anything else is plain
//! XML.

use crate::error::ImpexError;
use crate::gzip;
use crate::model::Model;
use crate::registry::ModelRegistry;
use crate::xml::XmlDocument;
use std::fs;
use std::path::Path;

/// Whether `path` names a compressed file
#[must_use]
pub fn is_compressed(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with("gz"))
}

/// Write `model` to `path`
///
/// # Errors
/// Returns `ImpexError` if serialization or the write fails
pub fn save_model(model: &dyn Model, path: impl AsRef<Path>) -> Result<(), ImpexError> {
    let path = path.as_ref();
    let xml = XmlDocument::new(model.to_xml())
        .to_bytes()
        .map_err(|source| ImpexError::Xml {
            path: path.to_path_buf(),
            source,
        })?;

    let bytes = if is_compressed(path) {
        gzip::compress(&xml).map_err(|e| ImpexError::io_error(path, e))?
    } else {
        xml
    };

    fs::write(path, bytes).map_err(|e| ImpexError::io_error(path, e))?;
    tracing::debug!(model = %model.id(), path = %path.display(), "model saved");
    Ok(())
}

/// Read a model from `path`
///
/// # Errors
/// Returns `ImpexError` if the file cannot be read, is not XML, or does not
/// describe a model known to `registry`
pub fn load_model(registry: &ModelRegistry, path: impl AsRef<Path>) -> Result<Box<dyn Model>, ImpexError> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| ImpexError::io_error(path, e))?;
    let xml = if is_compressed(path) {
        gzip::decompress(&raw).map_err(|e| ImpexError::io_error(path, e))?
    } else {
        raw
    };

    let document = XmlDocument::parse(xml.as_slice()).map_err(|source| ImpexError::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    let model = registry
        .deserialize(&document)
        .map_err(|source| ImpexError::Deserialize {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!(model = %model.id(), path = %path.display(), "model loaded");
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_by_suffix() {
        assert!(is_compressed(Path::new("a/b/image.xml.gz")));
        assert!(is_compressed(Path::new("image.xgz")));
        assert!(!is_compressed(Path::new("image.xml")));
        assert!(!is_compressed(Path::new("gz/image.xml")));
    }
}
