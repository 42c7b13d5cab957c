//! Selector data model.
//!
//! A complex selector is stored as a flat array of [`Component`]s read right
//! to left: the rightmost compound comes first and each component carries the
//! [`Relation`] that links it to the component after it. Inside a compound,
//! pseudo-elements are placed first, the other simple selectors keep source
//! order.

use crate::specificity::Specificity;
use core::slice::Iter;

/// How a component relates to the next component in the array.
/// Reference: <https://drafts.csswg.org/selectors-4/#combinators>
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Next component belongs to the same compound.
    SubSelector,
    /// `A B`
    Descendant,
    /// `A > B`
    Child,
    /// `A + B`
    DirectAdjacent,
    /// `A ~ B`
    IndirectAdjacent,
}

impl Relation {
    /// True for relations that walk up the tree.
    #[inline]
    pub const fn is_ancestor(self) -> bool {
        matches!(self, Self::Descendant | Self::Child)
    }

    /// True for relations that walk to earlier siblings.
    #[inline]
    pub const fn is_sibling(self) -> bool {
        matches!(self, Self::DirectAdjacent | Self::IndirectAdjacent)
    }
}

/// Attribute selector operators.
/// Reference: <https://drafts.csswg.org/selectors-4/#attribute-selectors>
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttrOperator {
    /// `[name]`
    Set,
    /// `[name=value]`
    Exact,
    /// `[name~=value]`
    List,
    /// `[name|=value]`
    Hyphen,
    /// `[name*=value]`
    Contain,
    /// `[name^=value]`
    Begin,
    /// `[name$=value]`
    End,
}

/// An attribute selector with its operator and comparison value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeSelector {
    /// Attribute local name, ASCII lowercase.
    pub name: Box<str>,
    /// Comparison applied to the attribute value.
    pub operator: AttrOperator,
    /// Empty for [`AttrOperator::Set`].
    pub value: Box<str>,
    /// Set by the trailing `i` flag.
    pub case_insensitive: bool,
}

/// Pseudo-element identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PseudoId {
    Before,
    After,
    FirstLine,
    FirstLetter,
    Marker,
    Placeholder,
    Selection,
}

impl PseudoId {
    /// Look up a pseudo-element by its name without the leading colons.
    pub fn from_name(name: &str) -> Option<Self> {
        let pseudo = match name.to_ascii_lowercase().as_str() {
            "before" => Self::Before,
            "after" => Self::After,
            "first-line" => Self::FirstLine,
            "first-letter" => Self::FirstLetter,
            "marker" => Self::Marker,
            "placeholder" => Self::Placeholder,
            "selection" => Self::Selection,
            _ => return None,
        };
        Some(pseudo)
    }

    /// True for the four pseudo-elements that CSS 2 allowed with a single colon.
    #[inline]
    pub const fn allows_legacy_syntax(self) -> bool {
        matches!(
            self,
            Self::Before | Self::After | Self::FirstLine | Self::FirstLetter
        )
    }

    /// Canonical name without colons.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::FirstLine => "first-line",
            Self::FirstLetter => "first-letter",
            Self::Marker => "marker",
            Self::Placeholder => "placeholder",
            Self::Selection => "selection",
        }
    }
}

/// Pseudo-classes understood by the checker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PseudoClass {
    Link,
    Visited,
    AnyLink,
    Focus,
    FocusVisible,
    FocusWithin,
    Hover,
    Active,
    Root,
    Empty,
    FirstChild,
    LastChild,
    OnlyChild,
    /// `:is(...)`, specificity of the most specific argument.
    Is(SelectorList),
    /// `:where(...)`, zero specificity.
    Where(SelectorList),
    /// `:not(...)`
    Not(SelectorList),
    /// `:has(...)`, matched against descendants.
    Has(SelectorList),
}

impl PseudoClass {
    /// Non-functional pseudo-class by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let pseudo = match name.to_ascii_lowercase().as_str() {
            "link" => Self::Link,
            "visited" => Self::Visited,
            "any-link" => Self::AnyLink,
            "focus" => Self::Focus,
            "focus-visible" => Self::FocusVisible,
            "focus-within" => Self::FocusWithin,
            "hover" => Self::Hover,
            "active" => Self::Active,
            "root" => Self::Root,
            "empty" => Self::Empty,
            "first-child" => Self::FirstChild,
            "last-child" => Self::LastChild,
            "only-child" => Self::OnlyChild,
            _ => return None,
        };
        Some(pseudo)
    }

    /// `:link`, `:visited` and `:any-link`.
    #[inline]
    pub const fn is_link_family(&self) -> bool {
        matches!(self, Self::Link | Self::Visited | Self::AnyLink)
    }

    /// `:focus`, `:focus-visible` and `:focus-within`.
    #[inline]
    pub const fn is_focus_family(&self) -> bool {
        matches!(self, Self::Focus | Self::FocusVisible | Self::FocusWithin)
    }

    /// Nested argument list for the functional pseudo-classes.
    #[inline]
    pub const fn selector_list(&self) -> Option<&SelectorList> {
        match self {
            Self::Is(list) | Self::Where(list) | Self::Not(list) | Self::Has(list) => Some(list),
            _ => None,
        }
    }
}

/// One simple selector.
/// Reference: <https://drafts.csswg.org/selectors-4/#simple>
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SimpleSelector {
    /// `*`
    Universal,
    /// Type selector, ASCII lowercase.
    Tag(Box<str>),
    Id(Box<str>),
    Class(Box<str>),
    Attribute(Box<AttributeSelector>),
    PseudoClass(PseudoClass),
    PseudoElement(PseudoId),
}

/// A simple selector plus its relation to the following component.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Component {
    pub simple: SimpleSelector,
    /// Relation to the next component in the array.
    pub relation: Relation,
}

impl Component {
    #[inline]
    pub const fn new(simple: SimpleSelector, relation: Relation) -> Self {
        Self { simple, relation }
    }
}

/// A complex selector in right-to-left flattened form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComplexSelector {
    components: Box<[Component]>,
    specificity: Specificity,
    source: Box<str>,
}

impl ComplexSelector {
    /// Build a complex selector from right-to-left components. Specificity is
    /// computed here and never changes afterwards.
    pub fn new(components: Vec<Component>, source: &str) -> Self {
        let specificity = Specificity::of_components(&components);
        Self {
            components: components.into_boxed_slice(),
            specificity,
            source: source.trim().into(),
        }
    }

    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Computed once at parse time.
    #[inline]
    pub const fn specificity(&self) -> Specificity {
        self.specificity
    }

    /// Selector text as written, trimmed.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Index one past the end of the compound that starts at `start`.
    pub fn compound_end(&self, start: usize) -> usize {
        let mut index = start;
        while let Some(component) = self.components.get(index) {
            index = index.saturating_add(1);
            if component.relation != Relation::SubSelector {
                break;
            }
        }
        index
    }

    /// The subject compound.
    #[inline]
    pub fn rightmost_compound(&self) -> &[Component] {
        let end = self.compound_end(0);
        self.components.get(..end).unwrap_or(&[])
    }

    /// Pseudo-element of the subject compound, if any.
    pub fn pseudo_element(&self) -> Option<PseudoId> {
        self.rightmost_compound()
            .iter()
            .find_map(|component| match component.simple {
                SimpleSelector::PseudoElement(pseudo) => Some(pseudo),
                _ => None,
            })
    }
}

/// Comma separated list of complex selectors.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct SelectorList {
    selectors: Box<[ComplexSelector]>,
}

impl SelectorList {
    #[inline]
    pub fn new(selectors: Vec<ComplexSelector>) -> Self {
        Self {
            selectors: selectors.into_boxed_slice(),
        }
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, ComplexSelector> {
        self.selectors.iter()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&ComplexSelector> {
        self.selectors.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Highest specificity among the list members, zero for an empty list.
    pub fn max_specificity(&self) -> Specificity {
        self.selectors
            .iter()
            .map(ComplexSelector::specificity)
            .max()
            .unwrap_or_default()
    }
}

impl<'list> IntoIterator for &'list SelectorList {
    type Item = &'list ComplexSelector;
    type IntoIter = Iter<'list, ComplexSelector>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.selectors.iter()
    }
}
