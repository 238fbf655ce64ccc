//! Runtime core of a hover-to-copy LaTeX extension: find the rendered math
//! under the pointer, recover the source string that produced it, preview it
//! in an overlay, copy it on click.
//!
//! The source string lives in wildly different places depending on which
//! rendering library produced the markup (KaTeX annotations, MathJax's
//! internal typeset registry, legacy sibling scripts, Wikipedia image alt
//! text), so extraction is a layered set of heuristics tried in fixed
//! priority order — see [`page`] for the page-context chain and [`classify`]
//! for the per-library rules the router evaluates.

pub mod classify;
pub mod clipboard;
pub mod dom;
pub mod events;
pub mod mathjax;
pub mod overlay;
pub mod page;
pub mod relay;
pub mod router;
pub mod rules;
mod util;

pub use classify::{MathKind, MathNode, MathSource};
pub use dom::{Document, ElementId};
pub use page::PageExtractor;
pub use relay::{Channel, ContextId, ExtractionResult, RelaySlot};
pub use router::Router;
