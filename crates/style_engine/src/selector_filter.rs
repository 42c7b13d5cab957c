//! Ancestor Bloom filter for fast rejection of descendant selectors.
//!
//! Each stack entry is a 1024-bit filter holding the identifiers of one
//! element and all of its ancestors. A selector whose ancestor compounds
//! name an identifier missing from the top entry cannot match, so the full
//! right-to-left check is skipped. Answers are never false negatives.

use crate::element::StyleElement;
use core::hash::Hasher as _;
use core::ops::{Deref, DerefMut};
use css_selectors::{ComplexSelector, Component, PseudoClass, SimpleSelector};
use rustc_hash::FxHasher;

const FILTER_WORDS: usize = 16;
/// Bit positions are the top 10 bits of a 32-bit hash: 1024 bits.
const BIT_SHIFT: u32 = u32::BITS - 10;

const TAG_SALT: u32 = 13;
const ID_SALT: u32 = 17;
const CLASS_SALT: u32 = 19;
const ATTRIBUTE_SALT: u32 = 23;

fn identifier_hash(salt: u32, text: &str, fold_case: bool) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write_u32(salt);
    for byte in text.bytes() {
        hasher.write_u8(if fold_case {
            byte.to_ascii_lowercase()
        } else {
            byte
        });
    }
    hasher.finish() as u32
}

/// Attributes already covered by the id and class identifiers or too common
/// to be selective.
fn is_excluded_attribute(name: &str) -> bool {
    ["class", "id", "style"]
        .iter()
        .any(|excluded| name.eq_ignore_ascii_case(excluded))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct BloomFilter {
    words: [u64; FILTER_WORDS],
}

impl BloomFilter {
    const fn bit_positions(hash: u32) -> [u32; 2] {
        [
            hash.wrapping_mul(0x9E37_79B1) >> BIT_SHIFT,
            hash.wrapping_mul(0x85EB_CA77) >> BIT_SHIFT,
        ]
    }

    fn insert(&mut self, hash: u32) {
        for bit in Self::bit_positions(hash) {
            if let Some(word) = self.words.get_mut((bit / 64) as usize) {
                *word |= 1_u64 << (bit % 64);
            }
        }
    }

    fn might_contain(&self, hash: u32) -> bool {
        Self::bit_positions(hash).iter().all(|&bit| {
            self.words
                .get((bit / 64) as usize)
                .is_some_and(|word| word & (1_u64 << (bit % 64)) != 0)
        })
    }
}

/// Stack of cumulative ancestor filters, one entry per element on the
/// current traversal path.
#[derive(Clone, Debug, Default)]
pub struct SelectorFilter {
    stack: Vec<BloomFilter>,
}

impl SelectorFilter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements currently pushed.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Forget every pushed element.
    #[inline]
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Push `element` on top of the current path. Prefer [`Self::scoped`],
    /// which pops automatically.
    pub fn push_element<E: StyleElement>(&mut self, adapter: &E, element: E::Handle) {
        let mut filter = self.stack.last().copied().unwrap_or_default();
        let tag = adapter.local_name(element);
        if !tag.is_empty() {
            filter.insert(identifier_hash(TAG_SALT, tag, true));
        }
        if let Some(id) = adapter.element_id(element)
            && !id.is_empty()
        {
            filter.insert(identifier_hash(ID_SALT, id, false));
        }
        adapter.for_each_class(element, &mut |class| {
            if !class.is_empty() {
                filter.insert(identifier_hash(CLASS_SALT, class, false));
            }
        });
        adapter.for_each_attribute_name(element, &mut |name| {
            if !name.is_empty() && !is_excluded_attribute(name) {
                filter.insert(identifier_hash(ATTRIBUTE_SALT, name, true));
            }
        });
        self.stack.push(filter);
    }

    /// Drop the most recently pushed element.
    pub fn pop_element(&mut self) {
        debug_assert!(!self.stack.is_empty(), "unbalanced selector filter pop");
        self.stack.pop();
    }

    /// Push `element` for the lifetime of the returned guard.
    pub fn scoped<E: StyleElement>(
        &mut self,
        adapter: &E,
        element: E::Handle,
    ) -> SelectorFilterScope<'_> {
        self.push_element(adapter, element);
        SelectorFilterScope { filter: self }
    }

    /// `false` only if `selector` provably cannot match the element on top
    /// of the stack.
    pub fn might_match(&self, selector: &ComplexSelector) -> bool {
        let Some(filter) = self.stack.last() else {
            return true;
        };
        let components = selector.components();
        // The subject compound is covered by the bucket lookup.
        let mut start = selector.compound_end(0);
        while start < components.len() {
            let end = selector.compound_end(start);
            let reached_through_ancestor = start
                .checked_sub(1)
                .and_then(|previous| components.get(previous))
                .is_some_and(|previous| previous.relation.is_ancestor());
            if reached_through_ancestor
                && let Some(compound) = components.get(start..end)
                && !compound_might_match(filter, compound)
            {
                return false;
            }
            start = end;
        }
        true
    }
}

fn compound_might_match(filter: &BloomFilter, compound: &[Component]) -> bool {
    compound
        .iter()
        .all(|component| simple_might_match(filter, &component.simple))
}

fn simple_might_match(filter: &BloomFilter, simple: &SimpleSelector) -> bool {
    match simple {
        SimpleSelector::Tag(name) if !name.is_empty() => {
            filter.might_contain(identifier_hash(TAG_SALT, name, true))
        }
        SimpleSelector::Id(id) if !id.is_empty() => {
            filter.might_contain(identifier_hash(ID_SALT, id, false))
        }
        SimpleSelector::Class(class) if !class.is_empty() => {
            filter.might_contain(identifier_hash(CLASS_SALT, class, false))
        }
        SimpleSelector::Attribute(attribute)
            if !attribute.name.is_empty() && !is_excluded_attribute(&attribute.name) =>
        {
            filter.might_contain(identifier_hash(ATTRIBUTE_SALT, &attribute.name, true))
        }
        SimpleSelector::PseudoClass(PseudoClass::Is(list) | PseudoClass::Where(list)) => {
            match (list.len(), list.get(0)) {
                (1, Some(inner)) if inner.compound_end(0) >= inner.components().len() => {
                    compound_might_match(filter, inner.components())
                }
                _ => true,
            }
        }
        _ => true,
    }
}

/// Guard returned by [`SelectorFilter::scoped`]. Pops its element on drop
/// and derefs to the filter, so nested scopes can be opened through it.
#[derive(Debug)]
pub struct SelectorFilterScope<'filter> {
    filter: &'filter mut SelectorFilter,
}

impl Deref for SelectorFilterScope<'_> {
    type Target = SelectorFilter;

    fn deref(&self) -> &SelectorFilter {
        self.filter
    }
}

impl DerefMut for SelectorFilterScope<'_> {
    fn deref_mut(&mut self) -> &mut SelectorFilter {
        self.filter
    }
}

impl Drop for SelectorFilterScope<'_> {
    fn drop(&mut self) {
        self.filter.pop_element();
    }
}
