//! What a handler reports back after processing an input

use super::payload::Payload;
use crate::representation::Representation;
use std::sync::Arc;

/// The kind of mutation that just happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The semantic model changed
    Semantic,
    ProjectRename,
    RepresentationCreation,
    RepresentationDeletion,
    RepresentationRename,
    /// Visual-only change (bounds) local to one representation
    RepresentationLayout,
    /// Transient representation state (e.g. widget focus)
    RepresentationState,
    Nothing,
}

/// Tags a mutation with its kind and the id of whatever originated it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDescription {
    pub kind: ChangeKind,
    /// Representation id for representation-local changes, project id otherwise
    pub source_id: String,
}

impl ChangeDescription {
    pub fn new(kind: ChangeKind, source_id: impl ToString) -> Self {
        Self {
            kind,
            source_id: source_id.to_string(),
        }
    }

    pub fn nothing() -> Self {
        Self::new(ChangeKind::Nothing, "")
    }

    pub fn is_semantic(&self) -> bool {
        self.kind == ChangeKind::Semantic
    }

    /// True when this change originated from the given source
    pub fn originates_from(&self, source_id: impl ToString) -> bool {
        self.source_id == source_id.to_string()
    }
}

/// Decides whether some other representation must refresh after a change
pub type RefreshPredicate = Arc<dyn Fn(&Representation) -> bool + Send + Sync>;

/// Result of one handler invocation.
#[derive(Clone)]
pub struct EventHandlerResponse {
    pub success: bool,
    pub change_description: ChangeDescription,
    pub should_refresh: RefreshPredicate,
    /// Returned to the submitting caller
    pub payload: Payload,
    /// The editing context was mutated and must be persisted
    pub editing_context_dirty: bool,
}

impl EventHandlerResponse {
    /// A successful response.
    ///
    /// Semantic changes mark the editing context dirty and ask every
    /// representation to refresh; anything else refreshes nothing and
    /// persists nothing until overridden with the builders below.
    pub fn success(change_description: ChangeDescription, payload: Payload) -> Self {
        let semantic = change_description.is_semantic();
        let should_refresh: RefreshPredicate = if semantic {
            Arc::new(|_| true)
        } else {
            Arc::new(|_| false)
        };
        Self {
            success: true,
            change_description,
            should_refresh,
            payload,
            editing_context_dirty: semantic,
        }
    }

    pub fn failure(payload: Payload) -> Self {
        Self {
            success: false,
            change_description: ChangeDescription::nothing(),
            should_refresh: Arc::new(|_| false),
            payload,
            editing_context_dirty: false,
        }
    }

    pub fn with_refresh_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Representation) -> bool + Send + Sync + 'static,
    {
        self.should_refresh = Arc::new(predicate);
        self
    }

    pub fn with_editing_context_dirty(mut self, dirty: bool) -> Self {
        self.editing_context_dirty = dirty;
        self
    }

    pub fn should_refresh(&self, representation: &Representation) -> bool {
        (self.should_refresh)(representation)
    }
}

impl std::fmt::Debug for EventHandlerResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandlerResponse")
            .field("success", &self.success)
            .field("change_description", &self.change_description)
            .field("payload", &self.payload)
            .field("editing_context_dirty", &self.editing_context_dirty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InputId, ProjectId};
    use crate::representation::Representation;

    fn payload() -> Payload {
        Payload::ProjectRenamed {
            project_id: ProjectId::new(),
            new_name: "n".into(),
        }
    }

    #[test]
    fn semantic_success_refreshes_everything_and_persists() {
        let response =
            EventHandlerResponse::success(ChangeDescription::new(ChangeKind::Semantic, "p"), payload());
        assert!(response.success);
        assert!(response.editing_context_dirty);
        assert!(response.should_refresh(&Representation::empty_diagram()));
    }

    #[test]
    fn layout_success_refreshes_nothing() {
        let response = EventHandlerResponse::success(
            ChangeDescription::new(ChangeKind::RepresentationLayout, "r"),
            payload(),
        );
        assert!(!response.editing_context_dirty);
        assert!(!response.should_refresh(&Representation::empty_diagram()));
    }

    #[test]
    fn failure_is_inert() {
        let response = EventHandlerResponse::failure(Payload::error(InputId::new(), "no"));
        assert!(!response.success);
        assert!(!response.editing_context_dirty);
        assert_eq!(response.change_description.kind, ChangeKind::Nothing);
    }

    #[test]
    fn builders_override_defaults() {
        let response = EventHandlerResponse::success(ChangeDescription::nothing(), payload())
            .with_refresh_predicate(|r| r.label == "target")
            .with_editing_context_dirty(true);
        let mut target = Representation::empty_diagram();
        target.label = "target".into();
        assert!(response.should_refresh(&target));
        assert!(!response.should_refresh(&Representation::empty_diagram()));
        assert!(response.editing_context_dirty);
    }

    #[test]
    fn change_origin() {
        let change = ChangeDescription::new(ChangeKind::RepresentationLayout, "abc");
        assert!(change.originates_from("abc"));
        assert!(!change.originates_from("xyz"));
    }
}
