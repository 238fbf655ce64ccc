use log::trace;

use crate::dom::{Document, ElementId, Rect};

pub const OVERLAY_CLASS: &str = "hovertex-overlay";
pub const VISIBLE_CLASS: &str = "visible";
pub const COPIED_CLASS: &str = "copied";

pub const COPY_LABEL: &str = "Click to copy";
pub const COPIED_LABEL: &str = "Copied!";

/// How long the overlay shows the copied confirmation before reverting.
pub const REVERT_DELAY_MS: u64 = 1500;

/// Vertical gap between the overlay and the element it is anchored to.
const ANCHOR_GAP: f64 = 8.0;

/// Size used until the host measures the overlay element.
const DEFAULT_SIZE: (f64, f64) = (130.0, 36.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayPhase {
    #[default]
    Hidden,
    Visible,
    Copied,
}

/// The floating hover tooltip. At most one exists; it is created lazily,
/// appended to the body, and toggled through css classes from then on.
///
/// The copied confirmation reverts on a deadline checked by [`Overlay::tick`];
/// re-marking while a deadline is pending overwrites it, so there is never
/// more than one scheduled revert.
#[derive(Debug, Default)]
pub struct Overlay {
    element: Option<ElementId>,
    label: Option<ElementId>,
    phase: OverlayPhase,
    revert_at: Option<u64>,
    tex: Option<String>,
}

impl Overlay {
    pub fn new() -> Overlay {
        Overlay::default()
    }

    pub fn phase(&self) -> OverlayPhase {
        self.phase
    }

    pub fn element(&self) -> Option<ElementId> {
        self.element
    }

    /// The source string the overlay is currently presenting.
    pub fn tex(&self) -> Option<&str> {
        self.tex.as_deref()
    }

    fn ensure_element(&mut self, doc: &mut Document) -> ElementId {
        if let Some(el) = self.element {
            return el;
        }

        let el = doc.create_element("div");
        doc.add_class(el, OVERLAY_CLASS);
        doc.set_rect(el, Rect {
            top: 0.0,
            left: 0.0,
            width: DEFAULT_SIZE.0,
            height: DEFAULT_SIZE.1,
        });

        let icon = doc.create_element("svg");
        doc.append_child(el, icon);

        let label = doc.create_element("span");
        doc.set_text(label, COPY_LABEL);
        doc.append_child(el, label);

        doc.append_child(doc.body(), el);
        self.element = Some(el);
        self.label = Some(label);
        el
    }

    /// Shows the overlay anchored above `target`, horizontally centered on
    /// it, carrying `tex` for the click handler to copy.
    pub fn show(&mut self, doc: &mut Document, target: ElementId, tex: &str) {
        let el = self.ensure_element(doc);
        doc.set_attribute(el, "data-tex", tex);
        self.tex = Some(tex.to_string());

        let anchor = doc.rect(target);
        let own = doc.rect(el);
        let top = anchor.top + doc.scroll_y - own.height - ANCHOR_GAP;
        let left = anchor.left + doc.scroll_x + anchor.width / 2.0 - own.width / 2.0;
        doc.set_rect(el, Rect { top, left, ..own });

        doc.add_class(el, VISIBLE_CLASS);
        if self.phase == OverlayPhase::Hidden {
            self.phase = OverlayPhase::Visible;
        }
        trace!("overlay shown at ({}, {})", left, top);
    }

    /// Hides the overlay. Safe to call when nothing is shown.
    pub fn hide(&mut self, doc: &mut Document) {
        if let Some(el) = self.element {
            doc.remove_class(el, VISIBLE_CLASS);
        }
        self.phase = OverlayPhase::Hidden;
    }

    /// Switches to the copied confirmation and (re)schedules the revert.
    /// A second call before the deadline fires restarts the window instead
    /// of stacking a second one.
    pub fn mark_copied(&mut self, doc: &mut Document, now: u64) {
        let el = self.ensure_element(doc);
        doc.add_class(el, COPIED_CLASS);
        if let Some(label) = self.label {
            doc.set_text(label, COPIED_LABEL);
        }
        self.phase = OverlayPhase::Copied;
        self.revert_at = Some(now + REVERT_DELAY_MS);
    }

    pub fn revert_at(&self) -> Option<u64> {
        self.revert_at
    }

    /// Host-driven clock: reverts the copied confirmation once its deadline
    /// passes. Idempotent; a stale call with no pending deadline is a no-op.
    pub fn tick(&mut self, doc: &mut Document, now: u64) {
        let Some(at) = self.revert_at else {
            return;
        };
        if now < at {
            return;
        }

        self.revert_at = None;
        if let Some(el) = self.element {
            doc.remove_class(el, COPIED_CLASS);
        }
        if let Some(label) = self.label {
            doc.set_text(label, COPY_LABEL);
        }
        if self.phase == OverlayPhase::Copied {
            // Hidden in the meantime stays hidden; the revert only restores
            // the label and class.
            self.phase = OverlayPhase::Visible;
        }
    }
}
