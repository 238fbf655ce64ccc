use log::{debug, warn};

use crate::{
    classify::{any_matches, classify, default_sources, MathNode, MathSource, RouterContext},
    clipboard::{Clipboard, ClipboardError, WriteTicket},
    dom::{Document, ElementId},
    events::MouseEvent,
    overlay::Overlay,
    relay::{ContextId, RelaySlot},
};

/// Class marking the currently hovered math container.
pub const HOVER_CLASS: &str = "hovertex-hover";

/// The isolated-context side of the engine: classifies hover/click targets,
/// extracts their LaTeX (locally or through the relay slot), and drives the
/// overlay and the copy flow.
///
/// Everything is event-driven; the host forwards DOM events, pumps relayed
/// messages into [`Router::relay_mut`], completes clipboard writes through
/// [`Router::on_clipboard_result`], and advances time with [`Router::tick`].
pub struct Router<C: Clipboard> {
    sources: Vec<Box<dyn MathSource>>,
    relay: RelaySlot,
    overlay: Overlay,
    clipboard: C,
    active: Option<ElementId>,
    pending_copy: Option<WriteTicket>,
    page_script_loaded: bool,
}

impl<C: Clipboard> Router<C> {
    pub fn new(clipboard: C, window: ContextId) -> Router<C> {
        Router::with_sources(clipboard, window, default_sources())
    }

    /// Router with a custom rule chain. Order is priority order.
    pub fn with_sources(
        clipboard: C,
        window: ContextId,
        sources: Vec<Box<dyn MathSource>>,
    ) -> Router<C> {
        Router {
            sources,
            relay: RelaySlot::new(window),
            overlay: Overlay::new(),
            clipboard,
            active: None,
            pending_copy: None,
            page_script_loaded: false,
        }
    }

    pub fn relay(&self) -> &RelaySlot {
        &self.relay
    }

    /// The slot the host pumps channel messages into.
    pub fn relay_mut(&mut self) -> &mut RelaySlot {
        &mut self.relay
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// The element currently carrying the hover highlight.
    pub fn active(&self) -> Option<ElementId> {
        self.active
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    /// Called when the injected page script announces itself. Purely
    /// informational: an absent relayed value is always a handled state, so
    /// nothing waits on this.
    pub fn on_page_script_loaded(&mut self) {
        debug!("page script loaded");
        self.page_script_loaded = true;
    }

    pub fn page_script_loaded(&self) -> bool {
        self.page_script_loaded
    }

    fn classify_and_extract(&self, doc: &Document, target: ElementId) -> Option<(MathNode, String)> {
        let (idx, node) = classify(&self.sources, doc, target)?;
        let cx = RouterContext {
            doc,
            relay: &self.relay,
        };
        let tex = self.sources[idx].extract(&cx, node.element)?;
        Some((node, tex))
    }

    /// Hover entry. On a successful match the previous highlight is dropped
    /// first, then the new container is highlighted and the overlay shown —
    /// at most one element is ever active.
    pub fn on_mouse_over(&mut self, doc: &mut Document, ev: &MouseEvent) {
        let Some((node, tex)) = self.classify_and_extract(doc, ev.target) else {
            return;
        };

        debug!("hover matched {} container", node.kind.as_str());
        if let Some(prev) = self.active.take() {
            doc.remove_class(prev, HOVER_CLASS);
        }
        doc.add_class(node.element, HOVER_CLASS);
        self.active = Some(node.element);
        self.overlay.show(doc, node.element, &tex);
    }

    /// Hover exit. Deactivates only when the pointer did not move onto
    /// another element that still classifies as math.
    pub fn on_mouse_out(&mut self, doc: &mut Document, ev: &MouseEvent) {
        if self.active.is_none() {
            return;
        }
        let still_math = ev
            .related_target
            .is_some_and(|rt| any_matches(&self.sources, doc, rt));
        if still_math {
            return;
        }

        if let Some(prev) = self.active.take() {
            doc.remove_class(prev, HOVER_CLASS);
        }
        self.overlay.hide(doc);
    }

    /// Click: extract and request the clipboard write. The outcome arrives
    /// later through [`Router::on_clipboard_result`].
    pub fn on_click(&mut self, doc: &Document, ev: &MouseEvent) {
        let Some((node, tex)) = self.classify_and_extract(doc, ev.target) else {
            return;
        };

        debug!("copying {} chars from {} container", tex.len(), node.kind.as_str());
        let ticket = self.clipboard.write_text(&tex);
        self.pending_copy = Some(ticket);
    }

    /// Clipboard completion. Success flips the overlay to its copied state
    /// and (re)schedules the revert; failure is logged and leaves the
    /// overlay exactly as it was. Stale tickets are ignored.
    pub fn on_clipboard_result(
        &mut self,
        doc: &mut Document,
        ticket: WriteTicket,
        result: Result<(), ClipboardError>,
        now: u64,
    ) {
        if self.pending_copy != Some(ticket) {
            return;
        }
        self.pending_copy = None;

        match result {
            Ok(()) => self.overlay.mark_copied(doc, now),
            Err(err) => warn!("clipboard error: {}", err),
        }
    }

    /// Host-driven clock for the overlay's revert deadline.
    pub fn tick(&mut self, doc: &mut Document, now: u64) {
        self.overlay.tick(doc, now);
    }
}
