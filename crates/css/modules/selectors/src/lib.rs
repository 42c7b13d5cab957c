//! Selectors Level 4: selector model, specificity, parsing and matching.
//! Reference: <https://drafts.csswg.org/selectors-4/>
//!
//! Supported subset:
//! - Type, universal, id, class and all attribute selector operators
//! - Combinators: descendant, child, next-sibling, subsequent-sibling
//! - Link, focus, user-action and tree-structural pseudo-classes
//! - `:is()`, `:where()`, `:not()`, `:has()`
//! - `::before`, `::after`, `::first-line`, `::first-letter`, `::marker`,
//!   `::placeholder`, `::selection`

#![forbid(unsafe_code)]

mod checker;
mod model;
mod parser;
mod specificity;

pub use checker::{SelectorChecker, SelectorCheckingContext, SelectorMatchResult};
pub use model::{
    AttrOperator, AttributeSelector, ComplexSelector, Component, PseudoClass, PseudoId, Relation,
    SelectorList, SimpleSelector,
};
pub use parser::{parse_complex_selector, parse_selector_list};
pub use specificity::Specificity;

/// DOM access needed by selector matching. Implement this for your DOM layer.
///
/// Tree accessors return elements only; text and comment nodes are skipped.
/// State queries default to `false` so a static document only has to provide
/// the structural methods.
pub trait ElementAdapter {
    type Handle: Copy + Eq;

    /// Parent element, `None` for the root element.
    fn parent(&self, element: Self::Handle) -> Option<Self::Handle>;

    fn previous_sibling_element(&self, element: Self::Handle) -> Option<Self::Handle>;

    fn next_sibling_element(&self, element: Self::Handle) -> Option<Self::Handle>;

    fn first_child_element(&self, element: Self::Handle) -> Option<Self::Handle>;

    /// Local name in ASCII lowercase.
    fn local_name(&self, element: Self::Handle) -> &str;

    fn element_id(&self, element: Self::Handle) -> Option<&str>;

    /// True if the element's class list contains `class` (case-sensitive).
    fn has_class(&self, element: Self::Handle, class: &str) -> bool;

    /// Attribute value by ASCII-lowercase local name.
    fn attribute(&self, element: Self::Handle, name: &str) -> Option<&str>;

    /// Anchor-like element with an `href`.
    fn is_link(&self, _element: Self::Handle) -> bool {
        false
    }

    fn is_visited(&self, _element: Self::Handle) -> bool {
        false
    }

    fn is_hovered(&self, _element: Self::Handle) -> bool {
        false
    }

    fn is_active(&self, _element: Self::Handle) -> bool {
        false
    }

    fn is_focused(&self, _element: Self::Handle) -> bool {
        false
    }

    fn is_focus_visible(&self, _element: Self::Handle) -> bool {
        false
    }

    fn has_focus_within(&self, _element: Self::Handle) -> bool {
        false
    }
}
