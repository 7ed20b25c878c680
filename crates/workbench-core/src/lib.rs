//! Workbench Core - models, algorithms and the shared workspace
//!
//! The pieces every front end of the workbench shares:
//! - [`XmlDocument`] trees, the serialization contract of models and algorithms
//! - the [`Model`] and [`Algorithm`] traits plus their type [`Registry`]
//! - the [`Workspace`], a shared model store with one lock per model
//! - gzip helpers and file import/export ([`impex`])
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use workbench_core::{ModelRegistry, OpaqueModel, Workspace, XmlDocument};
//!
//! let registry = ModelRegistry::new("model").with_fallback(OpaqueModel::deserializer());
//! let workspace = Arc::new(Workspace::new());
//!
//! let doc = XmlDocument::parse(&b"<Image id=\"X\"/>"[..])?;
//! workspace.insert(registry.deserialize(&doc)?);
//! assert!(workspace.contains(&"X".into()));
//! ```

#![warn(unreachable_pub)]

pub mod algorithm;
pub mod error;
pub mod gzip;
pub mod impex;
pub mod model;
pub mod registry;
pub mod workspace;
pub mod xml;

pub use algorithm::{Algorithm, AlgorithmError};
pub use error::{DeserializeError, ImpexError, WorkspaceError, XmlError};
pub use model::{Model, ModelId, OpaqueModel};
pub use registry::{AlgorithmRegistry, Deserializer, ModelRegistry, Registry};
pub use workspace::{LockedModels, ModelEntry, ModelSet, Workspace};
pub use xml::{XmlDocument, XmlElement, XmlNode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
