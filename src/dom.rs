use std::collections::HashMap;

use crate::util;

// TODO: Vec of enum for common kinds?
pub type ClassList = Vec<String>;

pub type Attributes = HashMap<String, String>;

/// Returns the value that should go in `class="{}"`
pub(crate) fn class_attr(classes: &ClassList) -> Option<String> {
    if classes.is_empty() {
        None
    } else {
        Some(
            classes
                .iter()
                .filter(|c| !c.is_empty())
                .map(|class| util::escape(class.as_str()))
                .collect::<Vec<std::borrow::Cow<'_, str>>>()
                .join(" "),
        )
    }
}

/// Handle into a [`Document`]'s element arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

/// Layout box of an element, in page coordinates before scroll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    classes: ClassList,
    attributes: Attributes,
    /// Own text, serialized before any element children.
    text: String,
    children: Vec<ElementId>,
    parent: Option<ElementId>,
    /// Isolated subtree root, reachable only through [`Document::shadow_root`].
    shadow_root: Option<ElementId>,
    rect: Option<Rect>,
}

/// A page document the engine inspects: an element tree plus the handful of
/// window-level facts extraction depends on (hostname, scroll offsets).
///
/// Hosts and test fixtures build the tree; the engine reads it and only ever
/// writes the hover-highlight class and the transient overlay element.
#[derive(Debug)]
pub struct Document {
    elements: Vec<Element>,
    root: ElementId,
    body: ElementId,
    hostname: String,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Document {
    pub fn new(hostname: impl Into<String>) -> Document {
        let mut doc = Document {
            elements: Vec::new(),
            root: ElementId(0),
            body: ElementId(0),
            hostname: hostname.into(),
            scroll_x: 0.0,
            scroll_y: 0.0,
        };

        let root = doc.create_element("html");
        let body = doc.create_element("body");
        doc.append_child(root, body);
        doc.root = root;
        doc.body = body;

        doc
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn body(&self) -> ElementId {
        self.body
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0]
    }

    /// Creates a detached element. Tags are stored lowercased, matching how
    /// browsers report HTML tag names case-insensitively.
    pub fn create_element(&mut self, tag: impl Into<String>) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(Element {
            tag: tag.into().to_lowercase(),
            ..Element::default()
        });
        id
    }

    /// Appends `child` to `parent`'s child list, detaching it from any
    /// previous parent first.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        if let Some(old) = self.element(child).parent {
            let siblings = &mut self.element_mut(old).children;
            siblings.retain(|c| *c != child);
        }
        self.element_mut(child).parent = Some(parent);
        self.element_mut(parent).children.push(child);
    }

    /// Creates an isolated shadow subtree root under `host` and returns it.
    /// The subtree is not part of `host`'s children; descendant walks do not
    /// enter it.
    pub fn attach_shadow(&mut self, host: ElementId) -> ElementId {
        let shadow = self.create_element("#shadow-root");
        self.element_mut(host).shadow_root = Some(shadow);
        shadow
    }

    pub fn shadow_root(&self, id: ElementId) -> Option<ElementId> {
        self.element(id).shadow_root
    }

    pub fn tag(&self, id: ElementId) -> &str {
        &self.element(id).tag
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.element(id).parent
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        &self.element(id).children
    }

    pub fn set_attribute(&mut self, id: ElementId, key: impl Into<String>, value: impl Into<String>) {
        self.element_mut(id).attributes.insert(key.into(), value.into());
    }

    pub fn get_attribute(&self, id: ElementId, key: &str) -> Option<&str> {
        self.element(id).attributes.get(key).map(String::as_str)
    }

    pub fn add_class(&mut self, id: ElementId, class: &str) {
        if !self.has_class(id, class) {
            self.element_mut(id).classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, id: ElementId, class: &str) {
        self.element_mut(id).classes.retain(|c| c != class);
    }

    pub fn has_class(&self, id: ElementId, class: &str) -> bool {
        self.element(id).classes.iter().any(|c| c == class)
    }

    pub fn classes(&self, id: ElementId) -> &ClassList {
        &self.element(id).classes
    }

    pub fn set_text(&mut self, id: ElementId, text: impl Into<String>) {
        self.element_mut(id).text = text.into();
    }

    pub fn set_rect(&mut self, id: ElementId, rect: Rect) {
        self.element_mut(id).rect = Some(rect);
    }

    /// The element's layout box, like `getBoundingClientRect` reported before
    /// scrolling. Zero-sized when the host never measured the element.
    pub fn rect(&self, id: ElementId) -> Rect {
        self.element(id).rect.unwrap_or_default()
    }

    /// Own text plus the text of every descendant, in tree order.
    pub fn text_content(&self, id: ElementId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: ElementId, out: &mut String) {
        let el = self.element(id);
        out.push_str(&el.text);
        for child in &el.children {
            self.collect_text(*child, out);
        }
    }

    /// Nearest ancestor (starting from `id` itself) for which `pred` holds.
    /// Does not cross a shadow boundary, like the DOM `closest`.
    pub fn closest(&self, id: ElementId, pred: impl Fn(&Document, ElementId) -> bool) -> Option<ElementId> {
        let mut cur = Some(id);
        while let Some(el) = cur {
            if pred(self, el) {
                return Some(el);
            }
            cur = self.element(el).parent;
        }
        None
    }

    /// The topmost node reachable from `id` through parent links: the
    /// document root, a shadow subtree root, or a detached subtree root.
    pub fn root_node(&self, id: ElementId) -> ElementId {
        let mut cur = id;
        while let Some(parent) = self.element(cur).parent {
            cur = parent;
        }
        cur
    }

    pub fn next_element_sibling(&self, id: ElementId) -> Option<ElementId> {
        self.sibling_at_offset(id, 1)
    }

    pub fn prev_element_sibling(&self, id: ElementId) -> Option<ElementId> {
        self.sibling_at_offset(id, -1)
    }

    fn sibling_at_offset(&self, id: ElementId, offset: isize) -> Option<ElementId> {
        let parent = self.element(id).parent?;
        let siblings = &self.element(parent).children;
        let pos = siblings.iter().position(|c| *c == id)?;
        let idx = pos as isize + offset;
        if idx < 0 {
            None
        } else {
            siblings.get(idx as usize).copied()
        }
    }

    /// Pre-order descendants of `scope`, excluding `scope` itself and any
    /// shadow subtree.
    pub fn descendants(&self, scope: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        self.collect_descendants(scope, &mut out);
        out
    }

    fn collect_descendants(&self, id: ElementId, out: &mut Vec<ElementId>) {
        for child in &self.element(id).children {
            out.push(*child);
            self.collect_descendants(*child, out);
        }
    }

    /// First descendant of `scope` matching `pred`, in tree order.
    pub fn find_descendant(
        &self,
        scope: ElementId,
        pred: impl Fn(&Document, ElementId) -> bool,
    ) -> Option<ElementId> {
        self.descendants(scope)
            .into_iter()
            .find(|el| pred(self, *el))
    }

    /// Every descendant of `scope` matching `pred`, in tree order.
    pub fn find_all(
        &self,
        scope: ElementId,
        pred: impl Fn(&Document, ElementId) -> bool,
    ) -> Vec<ElementId> {
        self.descendants(scope)
            .into_iter()
            .filter(|el| pred(self, *el))
            .collect()
    }

    /// Serialized markup of the element's contents, the `innerHTML` the
    /// registry lookup compares against. Attributes are written in sorted
    /// order so two structurally equal trees serialize identically.
    pub fn inner_markup(&self, id: ElementId) -> String {
        let el = self.element(id);
        let mut markup = String::new();
        markup.push_str(&util::escape(&el.text));
        for child in &el.children {
            markup.push_str(&self.to_markup(*child));
        }
        markup
    }

    /// Serialized markup of the element itself, including its contents.
    pub fn to_markup(&self, id: ElementId) -> String {
        let el = self.element(id);
        let mut markup = format!("<{}", el.tag);

        let mut keys = el.attributes.keys().collect::<Vec<_>>();
        keys.sort();
        for key in keys {
            markup.push(' ');
            markup.push_str(key);
            markup.push_str("=\"");
            markup.push_str(&util::escape(&el.attributes[key]));
            markup.push('"');
        }

        if let Some(classes) = class_attr(&el.classes) {
            markup.push_str(" class=\"");
            markup.push_str(&classes);
            markup.push('"');
        }

        markup.push('>');
        markup.push_str(&self.inner_markup(id));
        markup.push_str("</");
        markup.push_str(&el.tag);
        markup.push('>');

        markup
    }
}

#[cfg(test)]
mod tests {
    use super::{Document, Rect};

    #[test]
    fn closest_walks_ancestors_but_not_shadow_boundaries() {
        let mut doc = Document::new("example.org");
        let outer = doc.create_element("div");
        doc.append_child(doc.body(), outer);
        doc.add_class(outer, "katex");
        let inner = doc.create_element("span");
        doc.append_child(outer, inner);

        assert_eq!(doc.closest(inner, |d, e| d.has_class(e, "katex")), Some(outer));

        let shadow = doc.attach_shadow(outer);
        let shadowed = doc.create_element("span");
        doc.append_child(shadow, shadowed);
        assert_eq!(doc.closest(shadowed, |d, e| d.has_class(e, "katex")), None);
        assert_eq!(doc.root_node(shadowed), shadow);
        assert_eq!(doc.parent(shadowed), Some(shadow));
        assert_eq!(doc.parent(shadow), None);
    }

    #[test]
    fn class_mutation_is_idempotent() {
        let mut doc = Document::new("example.org");
        let el = doc.create_element("div");
        doc.add_class(el, "a");
        doc.add_class(el, "a");
        assert_eq!(doc.classes(el).len(), 1);
        doc.remove_class(el, "a");
        doc.remove_class(el, "a");
        assert!(doc.classes(el).is_empty());
    }

    #[test]
    fn markup_is_deterministic_and_escaped() {
        let mut doc = Document::new("example.org");
        let el = doc.create_element("span");
        doc.set_attribute(el, "data-b", "2");
        doc.set_attribute(el, "data-a", "a<b");
        doc.add_class(el, "x");
        doc.set_text(el, "1 < 2");

        assert_eq!(
            doc.to_markup(el),
            r#"<span data-a="a&lt;b" data-b="2" class="x">1 &lt; 2</span>"#
        );
    }

    #[test]
    fn sibling_navigation() {
        let mut doc = Document::new("example.org");
        let a = doc.create_element("p");
        let b = doc.create_element("p");
        doc.append_child(doc.body(), a);
        doc.append_child(doc.body(), b);

        assert_eq!(doc.next_element_sibling(a), Some(b));
        assert_eq!(doc.prev_element_sibling(b), Some(a));
        assert_eq!(doc.next_element_sibling(b), None);
        assert_eq!(doc.prev_element_sibling(a), None);
    }

    #[test]
    fn rect_defaults_to_zero() {
        let mut doc = Document::new("example.org");
        let el = doc.create_element("div");
        assert_eq!(doc.rect(el), Rect::default());
        doc.set_rect(el, Rect { top: 1.0, left: 2.0, width: 3.0, height: 4.0 });
        assert_eq!(doc.rect(el).width, 3.0);
    }
}
