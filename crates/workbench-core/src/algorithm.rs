//! Algorithms: operations over workspace models
//!
//! An algorithm names the models it touches up front ([`Algorithm::model_refs`]);
//! the caller locks all of them and hands the guards to [`Algorithm::run`].

use crate::model::{Model, ModelId};
use crate::workspace::LockedModels;
use crate::xml::XmlElement;
use std::fmt;

/// Failure an algorithm can explain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AlgorithmError {
    message: String,
}

impl AlgorithmError {
    /// Create with message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The explanation
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A configured operation producing result models
pub trait Algorithm: Send + fmt::Debug {
    /// Registry key and root element name
    fn type_name(&self) -> &str;

    /// Whether every required parameter has a value
    fn parameters_valid(&self) -> bool {
        true
    }

    /// Models read or mutated by [`Algorithm::run`]
    fn model_refs(&self) -> Vec<ModelId>;

    /// Execute with exclusive access to the referenced models
    ///
    /// Results are returned in the order they were produced.
    ///
    /// # Errors
    /// Returns `AlgorithmError` with a human readable explanation
    fn run(&mut self, models: &mut LockedModels<'_>) -> Result<Vec<Box<dyn Model>>, AlgorithmError>;

    /// Serialize parameters and model references into an element tree
    fn to_xml(&self) -> XmlElement;
}
