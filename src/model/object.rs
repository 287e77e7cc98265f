//! Semantic objects: the elements of a project's model

use super::ids::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<PropertyValue>),
    Object(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Text used when the value is displayed in a widget
    pub fn display(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Array(_) | Self::Object(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Properties collection, ordered by key so renderings are stable
pub type Properties = BTreeMap<String, PropertyValue>;

/// A labelled, directed reference from one object to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub target: ObjectId,
    #[serde(default)]
    pub label: String,
}

/// Object metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    /// Username of the last editor, when known
    pub modified_by: Option<String>,
}

/// An element of the semantic model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticObject {
    pub id: ObjectId,
    /// Kind of element within the project's metamodel (e.g. "class", "package")
    pub kind: String,
    pub label: String,
    /// Containing object; `None` for roots
    pub parent: Option<ObjectId>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(default)]
    pub metadata: ObjectMetadata,
}

impl SemanticObject {
    /// Create a new root object with a generated id
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            kind: kind.into(),
            label: label.into(),
            parent: None,
            properties: Properties::new(),
            references: Vec::new(),
            metadata: ObjectMetadata {
                created_at: Some(Utc::now()),
                ..Default::default()
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<ObjectId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_reference(mut self, target: ObjectId, label: impl Into<String>) -> Self {
        self.references.push(Reference {
            target,
            label: label.into(),
        });
        self
    }

    pub fn reference_to(&self, target: &ObjectId) -> Option<&Reference> {
        self.references.iter().find(|r| &r.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let parent = ObjectId::from("pkg");
        let obj = SemanticObject::new("class", "Person")
            .with_id("cls:person")
            .with_parent(parent.clone())
            .with_property("abstract", PropertyValue::Bool(false))
            .with_reference(ObjectId::from("cls:address"), "lives at");

        assert_eq!(obj.id.as_str(), "cls:person");
        assert_eq!(obj.parent, Some(parent));
        assert_eq!(obj.properties.get("abstract"), Some(&PropertyValue::Bool(false)));
        assert_eq!(
            obj.reference_to(&ObjectId::from("cls:address")).map(|r| r.label.as_str()),
            Some("lives at")
        );
    }

    #[test]
    fn property_display() {
        assert_eq!(PropertyValue::from("x").display(), "x");
        assert_eq!(PropertyValue::Int(3).display(), "3");
        assert_eq!(PropertyValue::Bool(true).display(), "true");
    }
}
