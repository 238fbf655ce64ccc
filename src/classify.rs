use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    dom::{Document, ElementId},
    relay::RelaySlot,
    util::non_empty_trimmed,
};

/// Which rendering library produced a matched container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathKind {
    Katex,
    MathJaxLegacy,
    MathJaxModern,
    WikipediaImage,
}

impl MathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MathKind::Katex => "katex",
            MathKind::MathJaxLegacy => "mathjax-legacy",
            MathKind::MathJaxModern => "mathjax-modern",
            MathKind::WikipediaImage => "wikipedia-image",
        }
    }
}

/// A container element the user is interacting with, tagged by the rule
/// that claimed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MathNode {
    pub element: ElementId,
    pub kind: MathKind,
}

/// What a router-side extraction can read: the page plus the last value the
/// page-context extractor relayed over.
pub struct RouterContext<'a> {
    pub doc: &'a Document,
    pub relay: &'a RelaySlot,
}

/// One rendering library's extraction logic: claim a container for an event
/// target, then recover the LaTeX source from it.
///
/// The router holds an ordered list of these and short-circuits on the first
/// rule that matches, so supporting another rendering library is additive.
pub trait MathSource {
    fn kind(&self) -> MathKind;

    /// The container this rule applies to for `target`, usually the nearest
    /// matching ancestor. `None` when the rule does not apply.
    fn matches(&self, doc: &Document, target: ElementId) -> Option<ElementId>;

    /// The LaTeX source for a container previously claimed by `matches`.
    fn extract(&self, cx: &RouterContext<'_>, container: ElementId) -> Option<String>;
}

/// The fixed rule chain, in evaluation order.
pub fn default_sources() -> Vec<Box<dyn MathSource>> {
    vec![
        Box::new(WikipediaImages),
        Box::new(KatexSpans),
        Box::new(MathJaxModern),
        Box::new(MathJaxLegacy),
    ]
}

/// First rule claiming `target`, with the container it claimed. Later rules
/// are not consulted once one matches.
pub fn classify(
    sources: &[Box<dyn MathSource>],
    doc: &Document,
    target: ElementId,
) -> Option<(usize, MathNode)> {
    sources.iter().enumerate().find_map(|(idx, source)| {
        source.matches(doc, target).map(|element| {
            (
                idx,
                MathNode {
                    element,
                    kind: source.kind(),
                },
            )
        })
    })
}

/// Whether any rule in the chain would claim `target`. This is the mouse-out
/// check: leaving for an element that still classifies keeps the overlay up.
pub fn any_matches(sources: &[Box<dyn MathSource>], doc: &Document, target: ElementId) -> bool {
    sources.iter().any(|s| s.matches(doc, target).is_some())
}

// ---------------------------------------------------------------------------
// Wikipedia math images
// ---------------------------------------------------------------------------

const WIKI_IMAGE_CLASSES: [&str; 3] = [
    "mwe-math",
    "mwe-math-fallback-image-inline",
    "mwe-math-fallback-image-display",
];

/// Wikipedia serves math as images whose alt text is the source, usually
/// wrapped in `{\displaystyle ...}`.
static DISPLAYSTYLE_WRAPPER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\\displaystyle\s*([\s\S]*?)\}$").unwrap());

fn is_wiki_host(hostname: &str) -> bool {
    hostname.ends_with(".wikipedia.org")
        || hostname == "www.wikiwand.com"
        || hostname == "wikimedia.org"
        || hostname.ends_with(".wikiversity.org")
        || hostname.ends_with(".wikibooks.org")
}

/// Strips the `{\displaystyle ...}` wrapper when present, otherwise returns
/// the alt text as-is.
pub(crate) fn strip_displaystyle(alt: &str) -> &str {
    let alt = alt.trim();
    match DISPLAYSTYLE_WRAPPER.captures(alt) {
        Some(caps) => caps.get(1).map_or(alt, |m| m.as_str().trim()),
        None => alt,
    }
}

pub struct WikipediaImages;

impl MathSource for WikipediaImages {
    fn kind(&self) -> MathKind {
        MathKind::WikipediaImage
    }

    fn matches(&self, doc: &Document, target: ElementId) -> Option<ElementId> {
        if !is_wiki_host(doc.hostname()) {
            return None;
        }
        if doc.tag(target) == "img"
            && WIKI_IMAGE_CLASSES.iter().any(|c| doc.has_class(target, c))
        {
            Some(target)
        } else {
            None
        }
    }

    fn extract(&self, cx: &RouterContext<'_>, container: ElementId) -> Option<String> {
        let alt = non_empty_trimmed(cx.doc.get_attribute(container, "alt"))?;
        Some(strip_displaystyle(&alt).to_string())
    }
}

// ---------------------------------------------------------------------------
// KaTeX
// ---------------------------------------------------------------------------

pub struct KatexSpans;

impl MathSource for KatexSpans {
    fn kind(&self) -> MathKind {
        MathKind::Katex
    }

    fn matches(&self, doc: &Document, target: ElementId) -> Option<ElementId> {
        doc.closest(target, |d, e| d.has_class(e, "katex"))
    }

    fn extract(&self, cx: &RouterContext<'_>, container: ElementId) -> Option<String> {
        let doc = cx.doc;

        // KaTeX keeps the source in the accessibility MathML it renders
        // alongside the visual output.
        if let Some(mathml) =
            doc.find_descendant(container, |d, e| d.has_class(e, "katex-mathml"))
        {
            if let Some(ann) = doc.find_descendant(mathml, |d, e| {
                d.tag(e) == "annotation"
                    && d.get_attribute(e, "encoding") == Some("application/x-tex")
            }) {
                if let Some(tex) = non_empty_trimmed(Some(&doc.text_content(ann))) {
                    return Some(tex);
                }
            }
        }

        ["data-tex", "data-latex", "aria-label"]
            .iter()
            .find_map(|attr| non_empty_trimmed(doc.get_attribute(container, attr)))
    }
}

// ---------------------------------------------------------------------------
// MathJax v3/v4
// ---------------------------------------------------------------------------

/// Siblings checked for a fallback script when no relayed value is present.
const MODERN_SIBLING_SCAN_LIMIT: usize = 5;

pub struct MathJaxModern;

impl MathSource for MathJaxModern {
    fn kind(&self) -> MathKind {
        MathKind::MathJaxModern
    }

    fn matches(&self, doc: &Document, target: ElementId) -> Option<ElementId> {
        doc.closest(target, |d, e| d.tag(e) == "mjx-container")
    }

    fn extract(&self, cx: &RouterContext<'_>, container: ElementId) -> Option<String> {
        // TODO: correlate with the container through mjx_id; hovering two
        // containers before a fresh relay arrives can show the other's source.
        if let Some(result) = cx.relay.latest() {
            return Some(result.latex.clone());
        }

        let mut cur = container;
        for _ in 0..MODERN_SIBLING_SCAN_LIMIT {
            match cx.doc.next_element_sibling(cur) {
                Some(next) => {
                    cur = next;
                    if is_legacy_script(cx.doc, cur, &["math/tex", "math/tex; mode=display"]) {
                        return non_empty_trimmed(Some(&cx.doc.text_content(cur)));
                    }
                }
                None => break,
            }
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Legacy MathJax (v1/v2)
// ---------------------------------------------------------------------------

const LEGACY_DISPLAY_CLASSES: [&str; 2] = ["MathJax_Display", "MJXc-display"];
const LEGACY_INLINE_CLASSES: [&str; 4] =
    ["MathJax", "mjx-chtml", "MathJax_CHTML", "MathJax_MathML"];

fn is_legacy_script(doc: &Document, el: ElementId, types: &[&str]) -> bool {
    doc.tag(el) == "script"
        && doc
            .get_attribute(el, "type")
            .is_some_and(|t| types.contains(&t))
}

/// Forward sibling scan, unbounded: legacy MathJax always leaves the source
/// script somewhere after the rendered span.
fn legacy_script_after(doc: &Document, from: ElementId, types: &[&str]) -> Option<String> {
    let mut cur = from;
    while let Some(next) = doc.next_element_sibling(cur) {
        cur = next;
        if is_legacy_script(doc, cur, types) {
            return non_empty_trimmed(Some(&doc.text_content(cur)));
        }
    }
    None
}

pub struct MathJaxLegacy;

impl MathSource for MathJaxLegacy {
    fn kind(&self) -> MathKind {
        MathKind::MathJaxLegacy
    }

    fn matches(&self, doc: &Document, target: ElementId) -> Option<ElementId> {
        doc.closest(target, |d, e| {
            LEGACY_DISPLAY_CLASSES.iter().any(|c| d.has_class(e, c))
        })
        .or_else(|| {
            doc.closest(target, |d, e| {
                LEGACY_INLINE_CLASSES.iter().any(|c| d.has_class(e, c))
            })
        })
    }

    fn extract(&self, cx: &RouterContext<'_>, container: ElementId) -> Option<String> {
        let doc = cx.doc;

        if LEGACY_DISPLAY_CLASSES.iter().any(|c| doc.has_class(container, c)) {
            return legacy_script_after(doc, container, &["math/tex; mode=display"]);
        }

        // Traditional MathJax stamps its elements with MathJax-Element ids;
        // those pair with a plain inline script.
        if doc
            .get_attribute(container, "id")
            .is_some_and(|id| id.contains("MathJax-Element-"))
        {
            if let Some(tex) = legacy_script_after(doc, container, &["math/tex"]) {
                return Some(tex);
            }
        }

        legacy_script_after(doc, container, &["math/tex", "math/tex; mode=display"])
    }
}
