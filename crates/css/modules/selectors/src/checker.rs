//! Right-to-left selector matching.
//! Reference: <https://drafts.csswg.org/selectors-4/#match-against-element>

use crate::ElementAdapter;
use crate::model::{
    AttrOperator, AttributeSelector, ComplexSelector, Component, PseudoClass, PseudoId, Relation,
    SelectorList, SimpleSelector,
};

/// Inputs for one selector check.
pub struct SelectorCheckingContext<'sel, Handle> {
    /// Element being styled.
    pub element: Handle,
    /// Selector under test.
    pub selector: &'sel ComplexSelector,
    /// Pseudo-element being resolved; `None` means the element itself.
    pub pseudo_id: Option<PseudoId>,
}

impl<'sel, Handle> SelectorCheckingContext<'sel, Handle> {
    #[inline]
    pub const fn new(element: Handle, selector: &'sel ComplexSelector) -> Self {
        Self {
            element,
            selector,
            pseudo_id: None,
        }
    }

    /// Match for a pseudo-element of the element instead.
    #[inline]
    #[must_use]
    pub const fn with_pseudo_id(mut self, pseudo_id: Option<PseudoId>) -> Self {
        self.pseudo_id = pseudo_id;
        self
    }
}

/// Side information recorded by a successful match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SelectorMatchResult {
    /// Pseudo-element that the selector targeted.
    pub pseudo_id: Option<PseudoId>,
    /// A link-state pseudo-class took part in the match.
    pub link_dependent: bool,
}

/// Decides whether one complex selector matches one element.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelectorChecker;

impl SelectorChecker {
    #[inline]
    pub const fn new() -> Self {
        Self
    }

    /// Match `context.selector` against `context.element`.
    pub fn matches<A: ElementAdapter>(
        self,
        adapter: &A,
        context: &SelectorCheckingContext<'_, A::Handle>,
        result: &mut SelectorMatchResult,
    ) -> bool {
        if context.selector.pseudo_element() != context.pseudo_id {
            return false;
        }
        let mut walker = Walker {
            adapter,
            components: context.selector.components(),
            link_dependent: false,
        };
        if !walker.match_from(context.element, 0) {
            return false;
        }
        result.pseudo_id = context.pseudo_id;
        result.link_dependent |= walker.link_dependent;
        true
    }

    /// Match `selector` against `element` without recording a
    /// [`SelectorMatchResult`]. Combinators and the pseudo-element target
    /// are checked exactly as in [`Self::matches`].
    pub fn matches_element<A: ElementAdapter>(
        self,
        adapter: &A,
        element: A::Handle,
        selector: &ComplexSelector,
        pseudo_id: Option<PseudoId>,
    ) -> bool {
        if selector.pseudo_element() != pseudo_id {
            return false;
        }
        Walker {
            adapter,
            components: selector.components(),
            link_dependent: false,
        }
        .match_from(element, 0)
    }

    /// True if any selector in `list` matches the element itself.
    pub fn matches_list<A: ElementAdapter>(
        self,
        adapter: &A,
        element: A::Handle,
        list: &SelectorList,
    ) -> bool {
        list.iter()
            .any(|selector| self.matches_element(adapter, element, selector, None))
    }
}

/// Recursive state for one match.
struct Walker<'walk, A: ElementAdapter> {
    adapter: &'walk A,
    components: &'walk [Component],
    link_dependent: bool,
}

impl<A: ElementAdapter> Walker<'_, A> {
    /// Match the compound starting at `start` against `element`, then follow
    /// its relation to the rest of the selector. Descendant and indirect
    /// sibling relations backtrack over every candidate.
    fn match_from(&mut self, element: A::Handle, start: usize) -> bool {
        let mut index = start;
        let relation = loop {
            let Some(component) = self.components.get(index) else {
                return true;
            };
            if !self.match_simple(element, &component.simple, start == 0) {
                return false;
            }
            index = index.saturating_add(1);
            if component.relation != Relation::SubSelector {
                break component.relation;
            }
        };
        if index >= self.components.len() {
            return true;
        }
        let adapter = self.adapter;
        match relation {
            Relation::Child => adapter
                .parent(element)
                .is_some_and(|parent| self.match_from(parent, index)),
            Relation::DirectAdjacent => adapter
                .previous_sibling_element(element)
                .is_some_and(|sibling| self.match_from(sibling, index)),
            Relation::Descendant => {
                let mut candidate = adapter.parent(element);
                while let Some(ancestor) = candidate {
                    if self.match_from(ancestor, index) {
                        return true;
                    }
                    candidate = adapter.parent(ancestor);
                }
                false
            }
            Relation::IndirectAdjacent => {
                let mut candidate = adapter.previous_sibling_element(element);
                while let Some(sibling) = candidate {
                    if self.match_from(sibling, index) {
                        return true;
                    }
                    candidate = adapter.previous_sibling_element(sibling);
                }
                false
            }
            Relation::SubSelector => true,
        }
    }

    fn match_simple(&mut self, element: A::Handle, simple: &SimpleSelector, subject: bool) -> bool {
        let adapter = self.adapter;
        match simple {
            SimpleSelector::Universal => true,
            SimpleSelector::Tag(name) => adapter.local_name(element).eq_ignore_ascii_case(name),
            SimpleSelector::Id(id) => adapter.element_id(element) == Some(&**id),
            SimpleSelector::Class(class) => adapter.has_class(element, class),
            SimpleSelector::Attribute(attribute) => adapter
                .attribute(element, &attribute.name)
                .is_some_and(|value| attribute_matches(attribute, value)),
            // Pseudo-element equality with the request was checked up front.
            SimpleSelector::PseudoElement(_) => subject,
            SimpleSelector::PseudoClass(pseudo) => self.match_pseudo_class(element, pseudo),
        }
    }

    fn match_pseudo_class(&mut self, element: A::Handle, pseudo: &PseudoClass) -> bool {
        let adapter = self.adapter;
        match pseudo {
            PseudoClass::Link => {
                self.link_dependent = true;
                adapter.is_link(element) && !adapter.is_visited(element)
            }
            PseudoClass::Visited => {
                self.link_dependent = true;
                adapter.is_link(element) && adapter.is_visited(element)
            }
            PseudoClass::AnyLink => {
                self.link_dependent = true;
                adapter.is_link(element)
            }
            PseudoClass::Focus => adapter.is_focused(element),
            PseudoClass::FocusVisible => adapter.is_focus_visible(element),
            PseudoClass::FocusWithin => adapter.has_focus_within(element),
            PseudoClass::Hover => adapter.is_hovered(element),
            PseudoClass::Active => adapter.is_active(element),
            PseudoClass::Root => adapter.parent(element).is_none(),
            PseudoClass::Empty => adapter.first_child_element(element).is_none(),
            PseudoClass::FirstChild => adapter.previous_sibling_element(element).is_none(),
            PseudoClass::LastChild => adapter.next_sibling_element(element).is_none(),
            PseudoClass::OnlyChild => {
                adapter.previous_sibling_element(element).is_none()
                    && adapter.next_sibling_element(element).is_none()
            }
            PseudoClass::Is(list) | PseudoClass::Where(list) => self.any_matches(element, list),
            PseudoClass::Not(list) => !self.any_matches(element, list),
            PseudoClass::Has(list) => self.descendant_matches(element, list),
        }
    }

    fn any_matches(&mut self, element: A::Handle, list: &SelectorList) -> bool {
        list.iter().any(|selector| {
            if selector.pseudo_element().is_some() {
                return false;
            }
            let mut nested = Walker {
                adapter: self.adapter,
                components: selector.components(),
                link_dependent: false,
            };
            let matched = nested.match_from(element, 0);
            self.link_dependent |= nested.link_dependent;
            matched
        })
    }

    /// Depth-first search of the subtree below `element`.
    fn descendant_matches(&mut self, element: A::Handle, list: &SelectorList) -> bool {
        let adapter = self.adapter;
        let mut stack: Vec<A::Handle> = Vec::new();
        let mut child = adapter.first_child_element(element);
        while let Some(current) = child {
            stack.push(current);
            child = adapter.next_sibling_element(current);
        }
        while let Some(candidate) = stack.pop() {
            if self.any_matches(candidate, list) {
                return true;
            }
            let mut grandchild = adapter.first_child_element(candidate);
            while let Some(current) = grandchild {
                stack.push(current);
                grandchild = adapter.next_sibling_element(current);
            }
        }
        false
    }
}

/// Compare an attribute value against an attribute selector.
fn attribute_matches(selector: &AttributeSelector, value: &str) -> bool {
    let expected: &str = &selector.value;
    let equals = |left: &str, right: &str| {
        if selector.case_insensitive {
            left.eq_ignore_ascii_case(right)
        } else {
            left == right
        }
    };
    let folded = |text: &str| {
        if selector.case_insensitive {
            text.to_ascii_lowercase()
        } else {
            text.to_owned()
        }
    };
    match selector.operator {
        AttrOperator::Set => true,
        AttrOperator::Exact => equals(value, expected),
        AttrOperator::List => {
            !expected.is_empty()
                && !expected.contains(|character: char| character.is_ascii_whitespace())
                && value
                    .split_ascii_whitespace()
                    .any(|token| equals(token, expected))
        }
        AttrOperator::Hyphen => {
            equals(value, expected)
                || (value
                    .get(..expected.len())
                    .is_some_and(|prefix| equals(prefix, expected))
                    && value.as_bytes().get(expected.len()) == Some(&b'-'))
        }
        AttrOperator::Contain => !expected.is_empty() && folded(value).contains(&folded(expected)),
        AttrOperator::Begin => {
            !expected.is_empty() && folded(value).starts_with(&folded(expected))
        }
        AttrOperator::End => !expected.is_empty() && folded(value).ends_with(&folded(expected)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_complex_selector;

    /// Tiny fixed tree:
    /// ```text
    /// html
    ///   body.main
    ///     div#box.a.b [lang=en-US]
    ///       p.first
    ///       p.second (hovered)
    ///     a [href] (link)
    /// ```
    struct Tree;

    const HTML: usize = 0;
    const BODY: usize = 1;
    const DIV: usize = 2;
    const FIRST: usize = 3;
    const SECOND: usize = 4;
    const LINK: usize = 5;

    impl ElementAdapter for Tree {
        type Handle = usize;

        fn parent(&self, element: usize) -> Option<usize> {
            match element {
                BODY => Some(HTML),
                DIV | LINK => Some(BODY),
                FIRST | SECOND => Some(DIV),
                _ => None,
            }
        }

        fn previous_sibling_element(&self, element: usize) -> Option<usize> {
            match element {
                SECOND => Some(FIRST),
                LINK => Some(DIV),
                _ => None,
            }
        }

        fn next_sibling_element(&self, element: usize) -> Option<usize> {
            match element {
                FIRST => Some(SECOND),
                DIV => Some(LINK),
                _ => None,
            }
        }

        fn first_child_element(&self, element: usize) -> Option<usize> {
            match element {
                HTML => Some(BODY),
                BODY => Some(DIV),
                DIV => Some(FIRST),
                _ => None,
            }
        }

        fn local_name(&self, element: usize) -> &str {
            match element {
                HTML => "html",
                BODY => "body",
                DIV => "div",
                LINK => "a",
                _ => "p",
            }
        }

        fn element_id(&self, element: usize) -> Option<&str> {
            (element == DIV).then_some("box")
        }

        fn has_class(&self, element: usize, class: &str) -> bool {
            matches!(
                (element, class),
                (BODY, "main") | (DIV, "a" | "b") | (FIRST, "first") | (SECOND, "second")
            )
        }

        fn attribute(&self, element: usize, name: &str) -> Option<&str> {
            match (element, name) {
                (DIV, "lang") => Some("en-US"),
                (LINK, "href") => Some("/next"),
                _ => None,
            }
        }

        fn is_link(&self, element: usize) -> bool {
            element == LINK
        }

        fn is_hovered(&self, element: usize) -> bool {
            element == SECOND
        }
    }

    fn check(selector: &str, element: usize) -> bool {
        check_pseudo(selector, element, None)
    }

    fn check_pseudo(selector: &str, element: usize, pseudo: Option<PseudoId>) -> bool {
        let complex = parse_complex_selector(selector).unwrap();
        let context = SelectorCheckingContext::new(element, &complex).with_pseudo_id(pseudo);
        SelectorChecker::new().matches(&Tree, &context, &mut SelectorMatchResult::default())
    }

    #[test]
    fn compound_and_combinators() {
        assert!(check("div#box.a.b", DIV));
        assert!(!check("div.c", DIV));
        assert!(check("body > div p", SECOND));
        assert!(check("html p", FIRST));
        assert!(!check("body > p", FIRST));
        assert!(check("p + p", SECOND));
        assert!(!check("p + p", FIRST));
        assert!(check("div ~ a", LINK));
        assert!(!check("P.FIRST", FIRST));
        assert!(check("P.first", FIRST));
    }

    #[test]
    fn descendant_backtracks() {
        // `*` first matches div, whose parent is not html.
        assert!(check("html > * p", FIRST));
        assert!(check("html > .main div > p", FIRST));
        assert!(check("html > body p", FIRST));
        assert!(!check("html > div p", FIRST));
    }

    #[test]
    fn attributes() {
        assert!(check("[lang|=en]", DIV));
        assert!(check("[lang^=en]", DIV));
        assert!(check("[lang$=us i]", DIV));
        assert!(!check("[lang$=us]", DIV));
        assert!(check("[lang*='n-U']", DIV));
        assert!(check("a[href]", LINK));
        assert!(!check("div[href]", DIV));
    }

    #[test]
    fn structural_and_state() {
        assert!(check(":root", HTML));
        assert!(check("p:first-child", FIRST));
        assert!(check("p:last-child", SECOND));
        assert!(!check("p:only-child", SECOND));
        assert!(check("p:empty", FIRST));
        assert!(check("p:hover", SECOND));
        assert!(check("a:link", LINK));
        assert!(!check("a:visited", LINK));
        assert!(check("a:any-link", LINK));
    }

    #[test]
    fn functional_pseudo_classes() {
        assert!(check("p:is(.first, .other)", FIRST));
        assert!(check(":where(div) > p", FIRST));
        assert!(check("p:not(.second)", FIRST));
        assert!(!check("p:not(.first)", FIRST));
        assert!(check("div:has(.second)", DIV));
        assert!(check("body:has(p)", BODY));
        assert!(!check("p:has(p)", FIRST));
    }

    #[test]
    fn pseudo_elements_need_matching_request() {
        assert!(!check("p::before", FIRST));
        assert!(check_pseudo("p::before", FIRST, Some(PseudoId::Before)));
        assert!(!check_pseudo("p::after", FIRST, Some(PseudoId::Before)));
        assert!(!check_pseudo("p", FIRST, Some(PseudoId::Before)));
    }

    #[test]
    fn records_link_dependence() {
        let complex = parse_complex_selector("a:link").unwrap();
        let mut result = SelectorMatchResult::default();
        let context = SelectorCheckingContext::new(LINK, &complex);
        assert!(SelectorChecker::new().matches(&Tree, &context, &mut result));
        assert!(result.link_dependent);
    }

    #[test]
    fn element_check_agrees_with_full_match() {
        let checker = SelectorChecker::new();
        for (selector, element, pseudo) in [
            ("body > div p", SECOND, None),
            ("html > div p", FIRST, None),
            ("a:any-link", LINK, None),
            ("p::before", FIRST, Some(PseudoId::Before)),
            ("p::before", FIRST, None),
            ("div ~ a", LINK, None),
        ] {
            let complex = parse_complex_selector(selector).unwrap();
            assert_eq!(
                checker.matches_element(&Tree, element, &complex, pseudo),
                check_pseudo(selector, element, pseudo),
                "{selector}"
            );
        }
    }
}
