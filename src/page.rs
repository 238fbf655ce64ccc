use std::collections::HashSet;

use log::{debug, trace, warn};

use crate::{
    dom::{Document, ElementId},
    events::{MouseEvent, MutationRecord},
    mathjax::MathJaxRuntime,
    relay::{Channel, ContextId, SourceMessage},
    util::{collapse_whitespace, non_empty_trimmed},
};

/// How far the sibling scan walks in each direction before giving up.
const SIBLING_SCAN_LIMIT: usize = 8;

/// Container attributes probed as a last resort, in priority order.
const SOURCE_ATTRIBUTES: [&str; 4] = ["data-tex", "data-latex", "aria-label", "data-original"];

/// MathJax stamps this counter attribute on containers it has typeset; it is
/// the only per-container identifier cheap enough to forward, so it rides
/// along as the best-effort correlation id.
const CONTAINER_COUNTER_ATTRIBUTE: &str = "ctxtmenu_counter";

fn is_modern_container(doc: &Document, el: ElementId) -> bool {
    doc.tag(el) == "mjx-container"
}

fn is_tex_annotation(doc: &Document, el: ElementId) -> bool {
    doc.tag(el) == "annotation" && doc.get_attribute(el, "encoding") == Some("application/x-tex")
}

fn is_source_script(doc: &Document, el: ElementId) -> bool {
    doc.tag(el) == "script"
        && matches!(
            doc.get_attribute(el, "type"),
            Some("math/tex") | Some("math/tex; mode=display")
        )
}

/// Runs inside the page's own execution context, where MathJax's typeset
/// registry is reachable, and broadcasts every successful extraction over
/// the window channel for the isolated-context router to pick up.
///
/// Holds no references to the page: the host hands in the document, runtime,
/// and channel on every trigger, mirroring how a page script reaches for the
/// globals each time it runs.
#[derive(Debug)]
pub struct PageExtractor {
    window: ContextId,
}

impl PageExtractor {
    /// Activates only when a compatible MathJax (major version 3 or 4) is
    /// loaded; otherwise yields `None` so the host registers no listeners
    /// and the page's behavior is untouched.
    pub fn attach(runtime: &MathJaxRuntime, window: ContextId) -> Option<PageExtractor> {
        match runtime.major_version() {
            Some(3) | Some(4) => {
                debug!("page extractor ready (MathJax v{})", runtime.version());
                Some(PageExtractor { window })
            }
            other => {
                debug!("MathJax v3/v4 not detected (version {:?}), not attaching", other);
                None
            }
        }
    }

    /// Hover entry: extract for the container under the pointer, if any.
    pub fn on_mouse_over(
        &self,
        doc: &Document,
        runtime: &MathJaxRuntime,
        channel: &mut Channel,
        ev: &MouseEvent,
    ) {
        self.extract_and_post(doc, runtime, channel, ev.target);
    }

    /// Click: same chain as hover, re-run so the freshest result is relayed.
    pub fn on_click(
        &self,
        doc: &Document,
        runtime: &MathJaxRuntime,
        channel: &mut Channel,
        ev: &MouseEvent,
    ) {
        self.extract_and_post(doc, runtime, channel, ev.target);
    }

    /// Structural mutations: each added subtree is checked at its root and
    /// scanned for containers, once per newly-added container.
    pub fn on_mutations(
        &self,
        doc: &Document,
        runtime: &MathJaxRuntime,
        channel: &mut Channel,
        records: &[MutationRecord],
    ) {
        for record in records {
            for added in &record.added {
                if is_modern_container(doc, *added) || doc.has_class(*added, "MathJax") {
                    self.post_container(doc, runtime, channel, *added);
                }
                for el in doc.find_all(*added, |d, e| {
                    is_modern_container(d, e) || d.has_class(e, "MathJax")
                }) {
                    self.post_container(doc, runtime, channel, el);
                }
            }
        }
    }

    /// One full pass over the document at startup, once per existing
    /// container.
    pub fn initial_scan(&self, doc: &Document, runtime: &MathJaxRuntime, channel: &mut Channel) {
        let containers = doc.find_all(doc.root(), |d, e| {
            is_modern_container(d, e) || d.has_class(e, "MathJax") || d.has_class(e, "mjx-chtml")
        });
        trace!("initial scan over {} containers", containers.len());
        for el in containers {
            self.post_container(doc, runtime, channel, el);
        }
    }

    fn extract_and_post(
        &self,
        doc: &Document,
        runtime: &MathJaxRuntime,
        channel: &mut Channel,
        target: ElementId,
    ) {
        let Some(container) = doc.closest(target, is_modern_container) else {
            return;
        };
        self.post_container(doc, runtime, channel, container);
    }

    fn post_container(
        &self,
        doc: &Document,
        runtime: &MathJaxRuntime,
        channel: &mut Channel,
        container: ElementId,
    ) {
        match self.extract_for_container(doc, runtime, container) {
            Some(latex) => self.post(doc, channel, container, latex),
            None => trace!("no source found for container via any strategy"),
        }
    }

    /// The strategy chain, in fixed priority order; first success wins.
    pub fn extract_for_container(
        &self,
        doc: &Document,
        runtime: &MathJaxRuntime,
        container: ElementId,
    ) -> Option<String> {
        if let Some(tex) = from_registry(doc, runtime, container) {
            trace!("registry lookup matched");
            return Some(tex);
        }
        if let Some(tex) = from_annotation(doc, container) {
            trace!("annotation lookup matched");
            return Some(tex);
        }
        if let Some(tex) = from_script_sibling(doc, container) {
            trace!("sibling script lookup matched");
            return Some(tex);
        }
        if let Some(tex) = from_attributes(doc, container) {
            trace!("attribute lookup matched");
            return Some(tex);
        }
        None
    }

    fn post(&self, doc: &Document, channel: &mut Channel, container: ElementId, latex: String) {
        let mjx_id = doc
            .get_attribute(container, CONTAINER_COUNTER_ATTRIBUTE)
            .map(str::to_string);
        debug!("posting source ({} chars, mjx_id={:?})", latex.len(), mjx_id);
        match serde_json::to_value(SourceMessage::new(latex, mjx_id)) {
            Ok(data) => channel.post(self.window, data),
            Err(err) => warn!("failed to encode source message: {}", err),
        }
    }
}

/// Strategy 1: walk MathJax's registry of typeset items and return the
/// recorded source of the item whose rendered root matches `container`.
///
/// The list is internal, undocumented state; the walk tracks visited items
/// so a malformed circular list terminates instead of hanging the page.
fn from_registry(
    doc: &Document,
    runtime: &MathJaxRuntime,
    container: ElementId,
) -> Option<String> {
    let target = collapse_whitespace(&doc.inner_markup(container));
    if target.is_empty() {
        return None;
    }

    let mut seen = HashSet::new();
    let mut cur = runtime.head();
    while let Some(id) = cur {
        if !seen.insert(id) {
            warn!("registry list is circular, aborting walk");
            break;
        }
        let Some(item) = runtime.item(id) else {
            break;
        };

        if let Some(root) = item.typeset_root {
            if collapse_whitespace(&doc.inner_markup(root)) == target {
                if let Some(math) = non_empty_trimmed(item.math.as_deref()) {
                    return Some(math);
                }
                // Some builds keep the source on `input` instead.
                if let Some(input) = non_empty_trimmed(item.input.as_deref()) {
                    return Some(input);
                }
            }
        }

        cur = item.next;
    }

    None
}

/// Strategy 2: a `<annotation encoding="application/x-tex">` node left in
/// the rendered output, searched in the container's subtree, its shadow
/// subtree, and its root node when that is not the document itself.
fn from_annotation(doc: &Document, container: ElementId) -> Option<String> {
    if let Some(tex) = annotation_in(doc, container) {
        return Some(tex);
    }

    if let Some(shadow) = doc.shadow_root(container) {
        if let Some(tex) = annotation_in(doc, shadow) {
            return Some(tex);
        }
    }

    let root = doc.root_node(container);
    if root != doc.root() && root != container {
        if let Some(tex) = annotation_in(doc, root) {
            return Some(tex);
        }
    }

    // Embedded low-level math markup may carry the annotation even when the
    // container-level query misses it.
    for math in doc.find_all(container, |d, e| d.tag(e) == "math") {
        if let Some(ann) = doc.find_descendant(math, is_tex_annotation) {
            if let Some(tex) = non_empty_trimmed(Some(&doc.text_content(ann))) {
                return Some(tex);
            }
        }
    }

    None
}

fn annotation_in(doc: &Document, scope: ElementId) -> Option<String> {
    let ann = doc.find_descendant(scope, is_tex_annotation)?;
    non_empty_trimmed(Some(&doc.text_content(ann)))
}

/// Strategy 3: a legacy `<script type="math/tex">` sibling, scanned up to
/// [`SIBLING_SCAN_LIMIT`] elements forward, then the same distance backward.
fn from_script_sibling(doc: &Document, container: ElementId) -> Option<String> {
    let mut cur = container;
    for _ in 0..SIBLING_SCAN_LIMIT {
        match doc.next_element_sibling(cur) {
            Some(next) => {
                cur = next;
                if is_source_script(doc, cur) {
                    return non_empty_trimmed(Some(&doc.text_content(cur)));
                }
            }
            None => break,
        }
    }

    let mut cur = container;
    for _ in 0..SIBLING_SCAN_LIMIT {
        match doc.prev_element_sibling(cur) {
            Some(prev) => {
                cur = prev;
                if is_source_script(doc, cur) {
                    return non_empty_trimmed(Some(&doc.text_content(cur)));
                }
            }
            None => break,
        }
    }

    None
}

/// Strategy 4: source stashed on the container's own attributes.
fn from_attributes(doc: &Document, container: ElementId) -> Option<String> {
    SOURCE_ATTRIBUTES
        .iter()
        .find_map(|attr| non_empty_trimmed(doc.get_attribute(container, attr)))
}
