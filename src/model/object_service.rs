//! Object lookup seam used by handlers and the dangling-representation check

use super::context::EditingContext;
use super::ids::ObjectId;
use super::object::SemanticObject;

/// Resolves object ids against an editing context.
pub trait ObjectService: Send + Sync {
    fn get_object<'a>(
        &self,
        editing_context: &'a EditingContext,
        object_id: &ObjectId,
    ) -> Option<&'a SemanticObject>;

    /// Label shown for an object
    fn get_label(&self, object: &SemanticObject) -> String {
        object.label.clone()
    }
}

/// Looks objects up directly in the editing context's object table.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultObjectService;

impl ObjectService for DefaultObjectService {
    fn get_object<'a>(
        &self,
        editing_context: &'a EditingContext,
        object_id: &ObjectId,
    ) -> Option<&'a SemanticObject> {
        editing_context.get_object(object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectId, SemanticObject};

    #[test]
    fn resolves_present_objects_only() {
        let mut ctx = EditingContext::new(ProjectId::new(), "p");
        ctx.add_object(SemanticObject::new("class", "A").with_id("a"))
            .unwrap();

        let service = DefaultObjectService;
        assert!(service.get_object(&ctx, &ObjectId::from("a")).is_some());
        assert!(service.get_object(&ctx, &ObjectId::from("b")).is_none());
    }
}
