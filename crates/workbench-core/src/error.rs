//! Error types for Workbench Core
//!
//! Provides error handling for:
//! - XML parsing and writing
//! - Model/algorithm deserialization
//! - Workspace lookups
//! - File import/export

use crate::model::ModelId;
use std::path::PathBuf;

/// XML document errors
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Reader rejected the input
    #[error("xml parse error: {0}")]
    Parse(String),

    /// Well-formed events that do not make a single tree
    #[error("malformed document: {0}")]
    Malformed(String),

    /// No root element
    #[error("document has no root element")]
    Empty,

    /// Writer failed
    #[error("xml write error: {0}")]
    Write(String),
}

impl From<quick_xml::Error> for XmlError {
    fn from(value: quick_xml::Error) -> Self {
        Self::Parse(value.to_string())
    }
}

/// Errors turning an XML document into a model or algorithm
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    /// No deserializer registered for the root element
    #[error("unknown {kind} type: '{type_name}'")]
    UnknownType {
        /// "model" or "algorithm"
        kind: &'static str,
        /// Root element name of the document
        type_name: String,
    },

    /// Required attribute absent
    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        attribute: String,
    },

    /// Attribute or text content has the wrong shape
    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    /// Anything else the concrete type rejects
    #[error("{0}")]
    Invalid(String),
}

impl DeserializeError {
    /// Create missing attribute error
    pub fn missing_attribute(element: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            element: element.into(),
            attribute: attribute.into(),
        }
    }

    /// Create invalid value error
    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Workspace errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkspaceError {
    /// Referenced model is not in the workspace
    #[error("model not found: {0}")]
    ModelNotFound(ModelId),
}

/// File import/export errors
#[derive(Debug, thiserror::Error)]
pub enum ImpexError {
    /// IO error on the file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File content is not a usable XML document
    #[error("xml error in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: XmlError,
    },

    /// Document does not describe a known model
    #[error("cannot load model from {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: DeserializeError,
    },
}

impl ImpexError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
