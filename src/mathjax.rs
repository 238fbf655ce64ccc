use crate::dom::ElementId;

/// Handle into a [`MathJaxRuntime`]'s item arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MathItemId(usize);

/// One typeset expression in MathJax's internal document registry.
///
/// The fields mirror what different MathJax builds actually expose: the
/// rendered root, the source in `math` on most builds, sometimes only in
/// `input`, and a `next` link forming the registry's linked list. Every
/// field is optional because none of this is documented API.
#[derive(Debug, Clone, Default)]
pub struct MathItem {
    pub typeset_root: Option<ElementId>,
    pub math: Option<String>,
    pub input: Option<String>,
    pub next: Option<MathItemId>,
}

/// Stand-in for the page-global MathJax object: a version string and the
/// linked list of typeset math items hanging off the startup document.
///
/// Only reachable from the page context, which is why the page-context
/// extractor exists at all.
#[derive(Debug)]
pub struct MathJaxRuntime {
    version: String,
    items: Vec<MathItem>,
    head: Option<MathItemId>,
}

impl MathJaxRuntime {
    pub fn new(version: impl Into<String>) -> MathJaxRuntime {
        MathJaxRuntime {
            version: version.into(),
            items: Vec::new(),
            head: None,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Leading number of the version string, if there is one.
    pub fn major_version(&self) -> Option<u32> {
        let digits: String = self
            .version
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    /// Appends an item to the registry list, linking it after the current
    /// tail. Returns its id so tests can rewire `next` links.
    pub fn push_item(&mut self, item: MathItem) -> MathItemId {
        let id = MathItemId(self.items.len());
        self.items.push(item);

        match self.tail() {
            Some(tail) => self.items[tail.0].next = Some(id),
            None => self.head = Some(id),
        }

        id
    }

    fn tail(&self) -> Option<MathItemId> {
        let mut cur = self.head?;
        // Bounded walk: a list rewired into a cycle has no tail.
        for _ in 0..self.items.len() {
            match self.items[cur.0].next {
                Some(next) => cur = next,
                None => return Some(cur),
            }
        }
        None
    }

    pub fn head(&self) -> Option<MathItemId> {
        self.head
    }

    pub fn item(&self, id: MathItemId) -> Option<&MathItem> {
        self.items.get(id.0)
    }

    /// Rewires an item's `next` link. Lets tests model the malformed,
    /// circular registries the extractor has to survive.
    pub fn set_next(&mut self, id: MathItemId, next: Option<MathItemId>) {
        if let Some(item) = self.items.get_mut(id.0) {
            item.next = next;
        }
    }
}
