//! Selector specificity.
//! Reference: <https://drafts.csswg.org/selectors-4/#specificity-rules>

use crate::model::{Component, PseudoClass, SimpleSelector};

/// Specificity packed into 24 bits: ids in the high byte, class-like
/// selectors in the middle byte, type-like selectors in the low byte.
///
/// Each byte saturates at `0xFF`, so the packed integer order is the same as
/// the lexicographic `(a, b, c)` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Specificity(u32);

/// Bits used by the id component.
const ID_MASK: u32 = 0x00FF_0000;
/// Bits used by the class, attribute and pseudo-class component.
const CLASS_LIKE_MASK: u32 = 0x0000_FF00;
/// Bits used by the type and pseudo-element component.
const TAG_MASK: u32 = 0x0000_00FF;

impl Specificity {
    /// Weight of one id selector.
    pub const ID: Self = Self(0x01_0000);
    /// Weight of one class, attribute or pseudo-class selector.
    pub const CLASS_LIKE: Self = Self(0x00_0100);
    /// Weight of one type selector or pseudo-element.
    pub const TAG: Self = Self(0x00_0001);
    /// Specificity of `*` and of inline style.
    pub const ZERO: Self = Self(0);

    /// Build from `(a, b, c)` counts, saturating each at 255.
    #[inline]
    pub fn from_counts(ids: u32, classes: u32, tags: u32) -> Self {
        Self((ids.min(0xFF) << 16) | (classes.min(0xFF) << 8) | tags.min(0xFF))
    }

    /// Packed 24-bit value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// ID selector count.
    #[inline]
    pub const fn ids(self) -> u32 {
        (self.0 & ID_MASK) >> 16
    }

    #[inline]
    pub const fn classes(self) -> u32 {
        (self.0 & CLASS_LIKE_MASK) >> 8
    }

    #[inline]
    pub const fn tags(self) -> u32 {
        self.0 & TAG_MASK
    }

    /// Component-wise saturating sum.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self::from_counts(
            self.ids().saturating_add(other.ids()),
            self.classes().saturating_add(other.classes()),
            self.tags().saturating_add(other.tags()),
        )
    }

    /// Contribution of one simple selector.
    pub fn of_simple(simple: &SimpleSelector) -> Self {
        match simple {
            SimpleSelector::Universal => Self::ZERO,
            SimpleSelector::Id(_) => Self::ID,
            SimpleSelector::Class(_) | SimpleSelector::Attribute(_) => Self::CLASS_LIKE,
            SimpleSelector::Tag(_) | SimpleSelector::PseudoElement(_) => Self::TAG,
            SimpleSelector::PseudoClass(pseudo) => match pseudo {
                PseudoClass::Where(_) => Self::ZERO,
                PseudoClass::Is(list) | PseudoClass::Not(list) | PseudoClass::Has(list) => {
                    list.max_specificity()
                }
                PseudoClass::Link
                | PseudoClass::Visited
                | PseudoClass::AnyLink
                | PseudoClass::Focus
                | PseudoClass::FocusVisible
                | PseudoClass::FocusWithin
                | PseudoClass::Hover
                | PseudoClass::Active
                | PseudoClass::Root
                | PseudoClass::Empty
                | PseudoClass::FirstChild
                | PseudoClass::LastChild
                | PseudoClass::OnlyChild => Self::CLASS_LIKE,
            },
        }
    }

    /// Sum over every component of a complex selector.
    pub fn of_components(components: &[Component]) -> Self {
        components
            .iter()
            .fold(Self::ZERO, |total, component| {
                total.saturating_add(Self::of_simple(&component.simple))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_selector_list;

    fn specificity_of(text: &str) -> Specificity {
        let list = parse_selector_list(text).unwrap();
        list.get(0).unwrap().specificity()
    }

    #[test]
    fn packs_components() {
        assert_eq!(specificity_of("div").value(), 0x00_0001);
        assert_eq!(specificity_of(".x").value(), 0x00_0100);
        assert_eq!(specificity_of("#a").value(), 0x01_0000);
        assert_eq!(specificity_of("#a.b div[href]:hover::before").value(), 0x01_0302);
        assert_eq!(specificity_of("*").value(), 0);
    }

    #[test]
    fn functional_pseudo_classes() {
        assert_eq!(specificity_of(":where(#a, .b)"), Specificity::ZERO);
        assert_eq!(specificity_of(":is(#a, .b)"), Specificity::ID);
        assert_eq!(specificity_of("p:not(.a, div)").value(), 0x00_0101);
        assert_eq!(specificity_of("section:has(#x)").value(), 0x01_0001);
    }

    #[test]
    fn components_saturate_independently() {
        let many = Specificity::from_counts(0, 300, 2);
        assert_eq!(many.classes(), 0xFF);
        assert_eq!(many.ids(), 0);
        assert_eq!(many.tags(), 2);
        let summed = many.saturating_add(Specificity::CLASS_LIKE);
        assert_eq!(summed.classes(), 0xFF);
        assert_eq!(summed.ids(), 0);
    }

    #[test]
    fn ordering_follows_components() {
        assert!(Specificity::ID > Specificity::from_counts(0, 255, 255));
        assert!(Specificity::CLASS_LIKE > Specificity::from_counts(0, 0, 255));
    }
}
