//! Type registries for deserialization
//!
//! A registry maps the root element name of a document to a function that
//! rebuilds the object. Plugins register their types at startup; how they are
//! discovered is up to the embedding application.

use crate::algorithm::Algorithm;
use crate::error::DeserializeError;
use crate::model::Model;
use crate::xml::{XmlDocument, XmlElement};
use std::collections::HashMap;
use std::fmt;

/// Rebuilds one object from its root element
pub type Deserializer<T> =
    Box<dyn Fn(&XmlElement) -> Result<Box<T>, DeserializeError> + Send + Sync>;

/// Registry of models
pub type ModelRegistry = Registry<dyn Model>;

/// Registry of algorithms
pub type AlgorithmRegistry = Registry<dyn Algorithm>;

/// Root element name -> deserializer
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Deserializer<T>>,
    fallback: Option<Deserializer<T>>,
}

impl<T: ?Sized> Registry<T> {
    /// Create empty registry; `kind` names the object kind in errors
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
            fallback: None,
        }
    }

    /// Register a deserializer, replacing any previous one for `type_name`
    pub fn register(&mut self, type_name: impl Into<String>, deserializer: Deserializer<T>) {
        let type_name = type_name.into();
        tracing::debug!(kind = self.kind, type_name = %type_name, "registered type");
        self.entries.insert(type_name, deserializer);
    }

    /// With registered deserializer
    #[must_use]
    pub fn with(mut self, type_name: impl Into<String>, deserializer: Deserializer<T>) -> Self {
        self.register(type_name, deserializer);
        self
    }

    /// With deserializer used for unregistered root elements
    #[must_use]
    pub fn with_fallback(mut self, deserializer: Deserializer<T>) -> Self {
        self.fallback = Some(deserializer);
        self
    }

    /// Whether `type_name` has its own entry
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    /// Registered type names, sorted
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Rebuild the object described by `document`
    ///
    /// # Errors
    /// - `DeserializeError::UnknownType` if neither an entry nor a fallback exists
    /// - whatever the selected deserializer reports
    pub fn deserialize(&self, document: &XmlDocument) -> Result<Box<T>, DeserializeError> {
        self.deserialize_element(&document.root)
    }

    /// Rebuild the object rooted at `element`
    ///
    /// # Errors
    /// Same as [`Registry::deserialize`]
    pub fn deserialize_element(&self, element: &XmlElement) -> Result<Box<T>, DeserializeError> {
        let deserializer = self
            .entries
            .get(&element.name)
            .or(self.fallback.as_ref())
            .ok_or_else(|| DeserializeError::UnknownType {
                kind: self.kind,
                type_name: element.name.clone(),
            })?;
        deserializer(element)
    }
}

impl<T: ?Sized> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("types", &self.type_names())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}
