use crate::dom::ElementId;

/// A hover or click delivered by the host event loop.
///
/// `related_target` carries the element the pointer moved to on mouse-out
/// events; it is what keeps the overlay up while the pointer travels between
/// parts of the same rendered expression.
#[derive(Debug, Clone, Copy)]
pub struct MouseEvent {
    pub target: ElementId,
    pub related_target: Option<ElementId>,
}

impl MouseEvent {
    pub fn over(target: ElementId) -> MouseEvent {
        MouseEvent {
            target,
            related_target: None,
        }
    }

    pub fn out(target: ElementId, related_target: Option<ElementId>) -> MouseEvent {
        MouseEvent {
            target,
            related_target,
        }
    }
}

/// One batch of structural DOM changes, as a mutation observer reports them.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// Roots of newly inserted subtrees.
    pub added: Vec<ElementId>,
}
