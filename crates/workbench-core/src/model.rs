//! Models: the data algorithms read and produce
//!
//! The server never looks inside a model. It only needs the model's id (its
//! workspace key), its type name and its XML form.

use crate::error::DeserializeError;
use crate::registry::Deserializer;
use crate::xml::XmlElement;
use std::any::Any;
use std::fmt;

/// Workspace key of a model
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelId(pub String);

impl ModelId {
    /// Create from anything string-like
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ModelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A serializable domain object (image, graph, ...)
///
/// Implementations are rebuilt from XML through a [`crate::ModelRegistry`]
/// entry keyed by [`Model::type_name`], which must equal the root element
/// name written by [`Model::to_xml`].
pub trait Model: Any + Send + fmt::Debug {
    /// Registry key and root element name
    fn type_name(&self) -> &str;

    /// Workspace key
    fn id(&self) -> &ModelId;

    /// Serialize into an element tree
    fn to_xml(&self) -> XmlElement;

    /// Downcast support for algorithms that know the concrete type
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Model of a type this process has no code for
///
/// Keeps the element tree verbatim so it can be stored, handed to algorithms
/// and serialized back unchanged. Requires an `id` attribute on the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueModel {
    id: ModelId,
    element: XmlElement,
}

impl OpaqueModel {
    /// Attribute carrying the model id
    pub const ID_ATTRIBUTE: &'static str = "id";

    /// Rebuild from an element
    ///
    /// # Errors
    /// Returns `DeserializeError::MissingAttribute` without an `id` attribute
    pub fn from_xml(element: &XmlElement) -> Result<Self, DeserializeError> {
        let id = element
            .attr(Self::ID_ATTRIBUTE)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                DeserializeError::missing_attribute(element.name.clone(), Self::ID_ATTRIBUTE)
            })?;
        Ok(Self {
            id: ModelId::new(id),
            element: element.clone(),
        })
    }

    /// Registry entry building boxed opaque models
    #[must_use]
    pub fn deserializer() -> Deserializer<dyn Model> {
        Box::new(|element| Ok(Box::new(Self::from_xml(element)?) as Box<dyn Model>))
    }

    /// The stored element
    #[inline]
    #[must_use]
    pub fn element(&self) -> &XmlElement {
        &self.element
    }
}

impl Model for OpaqueModel {
    fn type_name(&self) -> &str {
        &self.element.name
    }

    fn id(&self) -> &ModelId {
        &self.id
    }

    fn to_xml(&self) -> XmlElement {
        self.element.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
