//! EditingContext: the live, mutable semantic model of one project

use super::ids::{ObjectId, ProjectId, RepresentationId};
use super::object::{PropertyValue, Reference, SemanticObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

/// Errors raised by editing context mutations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("object already exists: {0}")]
    DuplicateObject(ObjectId),

    #[error("representation not found: {0}")]
    RepresentationNotFound(RepresentationId),

    #[error("representation already exists: {0}")]
    DuplicateRepresentation(RepresentationId),

    #[error("{0} has no reference to {1}")]
    ReferenceNotFound(ObjectId, ObjectId),
}

/// Which family of representation a descriptor produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepresentationKind {
    Diagram,
    Form,
}

impl std::fmt::Display for RepresentationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diagram => write!(f, "diagram"),
            Self::Form => write!(f, "form"),
        }
    }
}

/// Position and size of a diagram node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// The persisted descriptor of a representation
///
/// The rendered content is derived; only what cannot be recomputed from the
/// semantic model (label, description, target, manual layout) is kept here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepresentationMetadata {
    pub id: RepresentationId,
    pub kind: RepresentationKind,
    pub label: String,
    /// Template that produced the representation
    pub description_id: String,
    /// Semantic element the representation is rooted on
    pub target_object_id: Option<ObjectId>,
    /// Manual node bounds keyed by node id
    #[serde(default)]
    pub layout: BTreeMap<String, Bounds>,
}

impl RepresentationMetadata {
    pub fn new(
        kind: RepresentationKind,
        label: impl Into<String>,
        description_id: impl Into<String>,
    ) -> Self {
        Self {
            id: RepresentationId::new(),
            kind,
            label: label.into(),
            description_id: description_id.into(),
            target_object_id: None,
            layout: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: RepresentationId) -> Self {
        self.id = id;
        self
    }

    pub fn with_target(mut self, target: ObjectId) -> Self {
        self.target_object_id = Some(target);
        self
    }
}

/// Metadata about an editing context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The semantic model of one project plus its representation descriptors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditingContext {
    pub project_id: ProjectId,
    pub project_name: String,
    pub objects: BTreeMap<ObjectId, SemanticObject>,
    pub representations: BTreeMap<RepresentationId, RepresentationMetadata>,
    pub metadata: ContextMetadata,
}

impl EditingContext {
    pub fn new(project_id: ProjectId, project_name: impl Into<String>) -> Self {
        Self {
            project_id,
            project_name: project_name.into(),
            objects: BTreeMap::new(),
            representations: BTreeMap::new(),
            metadata: ContextMetadata {
                created_at: Some(Utc::now()),
                ..Default::default()
            },
        }
    }

    fn touch(&mut self) {
        self.metadata.updated_at = Some(Utc::now());
    }

    // === Objects ===

    pub fn get_object(&self, id: &ObjectId) -> Option<&SemanticObject> {
        self.objects.get(id)
    }

    /// Add an object. Its parent, when set, must already exist.
    pub fn add_object(&mut self, object: SemanticObject) -> Result<ObjectId, ModelError> {
        if self.objects.contains_key(&object.id) {
            return Err(ModelError::DuplicateObject(object.id));
        }
        if let Some(parent) = &object.parent {
            if !self.objects.contains_key(parent) {
                return Err(ModelError::ObjectNotFound(parent.clone()));
            }
        }
        let id = object.id.clone();
        self.objects.insert(id.clone(), object);
        self.touch();
        Ok(id)
    }

    /// Objects contained by `parent`, or the roots when `parent` is `None`
    pub fn children_of(&self, parent: Option<&ObjectId>) -> Vec<&SemanticObject> {
        self.objects
            .values()
            .filter(|o| o.parent.as_ref() == parent)
            .collect()
    }

    pub fn roots(&self) -> Vec<&SemanticObject> {
        self.children_of(None)
    }

    /// Remove an object and everything it contains.
    ///
    /// References from surviving objects to removed ones are dropped.
    /// Returns the removed ids (empty when `id` is unknown).
    pub fn remove_object(&mut self, id: &ObjectId) -> Vec<ObjectId> {
        if !self.objects.contains_key(id) {
            return Vec::new();
        }

        let mut removed = Vec::new();
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(current) = queue.pop_front() {
            for child in self.children_of(Some(&current)) {
                queue.push_back(child.id.clone());
            }
            removed.push(current);
        }

        let gone: BTreeSet<&ObjectId> = removed.iter().collect();
        self.objects.retain(|k, _| !gone.contains(k));
        for object in self.objects.values_mut() {
            object.references.retain(|r| !gone.contains(&r.target));
        }

        self.touch();
        removed
    }

    fn object_mut(&mut self, id: &ObjectId) -> Result<&mut SemanticObject, ModelError> {
        self.objects
            .get_mut(id)
            .ok_or_else(|| ModelError::ObjectNotFound(id.clone()))
    }

    pub fn rename_object(
        &mut self,
        id: &ObjectId,
        label: impl Into<String>,
        by: Option<&str>,
    ) -> Result<(), ModelError> {
        let object = self.object_mut(id)?;
        object.label = label.into();
        object.metadata.modified_at = Some(Utc::now());
        object.metadata.modified_by = by.map(str::to_string);
        self.touch();
        Ok(())
    }

    pub fn set_property(
        &mut self,
        id: &ObjectId,
        key: impl Into<String>,
        value: PropertyValue,
        by: Option<&str>,
    ) -> Result<(), ModelError> {
        let object = self.object_mut(id)?;
        object.properties.insert(key.into(), value);
        object.metadata.modified_at = Some(Utc::now());
        object.metadata.modified_by = by.map(str::to_string);
        self.touch();
        Ok(())
    }

    /// Add a reference; an existing reference to the same target is relabelled
    pub fn add_reference(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
        label: impl Into<String>,
    ) -> Result<(), ModelError> {
        if !self.objects.contains_key(target) {
            return Err(ModelError::ObjectNotFound(target.clone()));
        }
        let label = label.into();
        let object = self.object_mut(source)?;
        match object.references.iter_mut().find(|r| &r.target == target) {
            Some(existing) => existing.label = label,
            None => object.references.push(Reference {
                target: target.clone(),
                label,
            }),
        }
        self.touch();
        Ok(())
    }

    pub fn set_reference_label(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
        label: impl Into<String>,
    ) -> Result<(), ModelError> {
        let object = self.object_mut(source)?;
        let reference = object
            .references
            .iter_mut()
            .find(|r| &r.target == target)
            .ok_or_else(|| ModelError::ReferenceNotFound(source.clone(), target.clone()))?;
        reference.label = label.into();
        self.touch();
        Ok(())
    }

    pub fn remove_reference(
        &mut self,
        source: &ObjectId,
        target: &ObjectId,
    ) -> Result<(), ModelError> {
        let object = self.object_mut(source)?;
        let before = object.references.len();
        object.references.retain(|r| &r.target != target);
        if object.references.len() == before {
            return Err(ModelError::ReferenceNotFound(source.clone(), target.clone()));
        }
        self.touch();
        Ok(())
    }

    // === Representation descriptors ===

    pub fn get_representation(&self, id: &RepresentationId) -> Option<&RepresentationMetadata> {
        self.representations.get(id)
    }

    /// Register a representation descriptor. A target object, when set, must exist.
    pub fn add_representation(
        &mut self,
        metadata: RepresentationMetadata,
    ) -> Result<RepresentationId, ModelError> {
        if self.representations.contains_key(&metadata.id) {
            return Err(ModelError::DuplicateRepresentation(metadata.id));
        }
        if let Some(target) = &metadata.target_object_id {
            if !self.objects.contains_key(target) {
                return Err(ModelError::ObjectNotFound(target.clone()));
            }
        }
        let id = metadata.id;
        self.representations.insert(id, metadata);
        self.touch();
        Ok(id)
    }

    pub fn remove_representation(
        &mut self,
        id: &RepresentationId,
    ) -> Option<RepresentationMetadata> {
        let removed = self.representations.remove(id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Drop the descriptors of representations rooted on any of `objects`
    pub fn remove_representations_targeting(
        &mut self,
        objects: &[ObjectId],
    ) -> Vec<RepresentationId> {
        let doomed: Vec<RepresentationId> = self
            .representations
            .values()
            .filter(|m| {
                m.target_object_id
                    .as_ref()
                    .is_some_and(|t| objects.contains(t))
            })
            .map(|m| m.id)
            .collect();
        for id in &doomed {
            self.representations.remove(id);
        }
        if !doomed.is_empty() {
            self.touch();
        }
        doomed
    }

    pub fn rename_representation(
        &mut self,
        id: &RepresentationId,
        label: impl Into<String>,
    ) -> Result<(), ModelError> {
        let metadata = self
            .representations
            .get_mut(id)
            .ok_or(ModelError::RepresentationNotFound(*id))?;
        metadata.label = label.into();
        self.touch();
        Ok(())
    }

    pub fn set_layout(
        &mut self,
        id: &RepresentationId,
        node_id: impl Into<String>,
        bounds: Bounds,
    ) -> Result<(), ModelError> {
        let metadata = self
            .representations
            .get_mut(id)
            .ok_or(ModelError::RepresentationNotFound(*id))?;
        metadata.layout.insert(node_id.into(), bounds);
        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EditingContext {
        let mut ctx = EditingContext::new(ProjectId::new(), "sample");
        ctx.add_object(SemanticObject::new("package", "root").with_id("pkg"))
            .unwrap();
        ctx.add_object(
            SemanticObject::new("class", "A")
                .with_id("a")
                .with_parent(ObjectId::from("pkg")),
        )
        .unwrap();
        ctx.add_object(
            SemanticObject::new("attribute", "name")
                .with_id("a.name")
                .with_parent(ObjectId::from("a")),
        )
        .unwrap();
        ctx.add_object(
            SemanticObject::new("class", "B")
                .with_id("b")
                .with_parent(ObjectId::from("pkg")),
        )
        .unwrap();
        ctx.add_reference(&ObjectId::from("b"), &ObjectId::from("a"), "uses")
            .unwrap();
        ctx
    }

    #[test]
    fn add_object_requires_existing_parent() {
        let mut ctx = EditingContext::new(ProjectId::new(), "p");
        let orphan = SemanticObject::new("class", "X").with_parent(ObjectId::from("nope"));
        assert_eq!(
            ctx.add_object(orphan),
            Err(ModelError::ObjectNotFound(ObjectId::from("nope")))
        );
    }

    #[test]
    fn add_object_rejects_duplicates() {
        let mut ctx = sample();
        let dup = SemanticObject::new("class", "again").with_id("a");
        assert!(matches!(ctx.add_object(dup), Err(ModelError::DuplicateObject(_))));
    }

    #[test]
    fn children_and_roots() {
        let ctx = sample();
        assert_eq!(ctx.roots().len(), 1);
        let children: Vec<&str> = ctx
            .children_of(Some(&ObjectId::from("pkg")))
            .iter()
            .map(|o| o.id.as_str())
            .collect();
        assert_eq!(children, vec!["a", "b"]);
    }

    #[test]
    fn remove_object_cascades_and_strips_references() {
        let mut ctx = sample();
        let removed = ctx.remove_object(&ObjectId::from("a"));

        assert_eq!(removed.len(), 2);
        assert!(ctx.get_object(&ObjectId::from("a.name")).is_none());
        let b = ctx.get_object(&ObjectId::from("b")).unwrap();
        assert!(b.references.is_empty());
    }

    #[test]
    fn remove_reference_requires_existing_reference() {
        let mut ctx = sample();
        let (a, b) = (ObjectId::from("a"), ObjectId::from("b"));
        ctx.remove_reference(&b, &a).unwrap();
        assert_eq!(
            ctx.remove_reference(&b, &a),
            Err(ModelError::ReferenceNotFound(b, a))
        );
    }

    #[test]
    fn remove_unknown_object_is_noop() {
        let mut ctx = sample();
        assert!(ctx.remove_object(&ObjectId::from("ghost")).is_empty());
        assert_eq!(ctx.objects.len(), 4);
    }

    #[test]
    fn rename_object_records_editor() {
        let mut ctx = sample();
        ctx.rename_object(&ObjectId::from("a"), "Alpha", Some("alice"))
            .unwrap();
        let a = ctx.get_object(&ObjectId::from("a")).unwrap();
        assert_eq!(a.label, "Alpha");
        assert_eq!(a.metadata.modified_by.as_deref(), Some("alice"));
    }

    #[test]
    fn representation_requires_existing_target() {
        let mut ctx = sample();
        let meta = RepresentationMetadata::new(RepresentationKind::Diagram, "d", "desc")
            .with_target(ObjectId::from("missing"));
        assert!(matches!(
            ctx.add_representation(meta),
            Err(ModelError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn remove_representations_targeting_removed_objects() {
        let mut ctx = sample();
        let on_a = RepresentationMetadata::new(RepresentationKind::Diagram, "a", "desc")
            .with_target(ObjectId::from("a"));
        let on_pkg = RepresentationMetadata::new(RepresentationKind::Form, "pkg", "desc")
            .with_target(ObjectId::from("pkg"));
        let a_id = ctx.add_representation(on_a).unwrap();
        ctx.add_representation(on_pkg).unwrap();

        let removed = ctx.remove_object(&ObjectId::from("a"));
        let doomed = ctx.remove_representations_targeting(&removed);

        assert_eq!(doomed, vec![a_id]);
        assert_eq!(ctx.representations.len(), 1);
    }

    #[test]
    fn layout_is_stored_per_node() {
        let mut ctx = sample();
        let meta = RepresentationMetadata::new(RepresentationKind::Diagram, "d", "desc");
        let id = ctx.add_representation(meta).unwrap();
        ctx.set_layout(&id, "a", Bounds::new(1.0, 2.0, 3.0, 4.0))
            .unwrap();
        assert_eq!(
            ctx.get_representation(&id).unwrap().layout.get("a"),
            Some(&Bounds::new(1.0, 2.0, 3.0, 4.0))
        );
    }
}
