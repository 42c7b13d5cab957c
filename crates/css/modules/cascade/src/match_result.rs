//! Ordered matched declaration blocks handed to the cascade.

use crate::origin::{CascadeOrigin, LayerOrder};
use crate::property_set::StylePropertySet;
use core::slice::Iter;
use std::sync::Arc;

/// One matched declaration block with the cascade data baked into its
/// position.
#[derive(Clone, Debug)]
pub struct MatchedProperties {
    /// Shared with the rule; the cache compares blocks by pointer.
    pub properties: Arc<StylePropertySet>,
    /// Origin of the sheet the block came from.
    pub origin: CascadeOrigin,
    /// Layer the block was declared in.
    pub layer_order: LayerOrder,
    /// Set for the element's `style` attribute.
    pub is_inline_style: bool,
}

/// Matched blocks in ascending priority: later entries win ties.
#[derive(Clone, Debug, Default)]
pub struct MatchResult {
    matched_properties: Vec<MatchedProperties>,
}

impl MatchResult {
    #[inline]
    pub const fn new() -> Self {
        Self {
            matched_properties: Vec::new(),
        }
    }

    /// Append a rule's block. Callers append in final priority order.
    pub fn add_matched_properties(
        &mut self,
        properties: Arc<StylePropertySet>,
        origin: CascadeOrigin,
        layer_order: LayerOrder,
    ) {
        self.matched_properties.push(MatchedProperties {
            properties,
            origin,
            layer_order,
            is_inline_style: false,
        });
    }

    /// Append the element's inline style block.
    pub fn add_inline_style_properties(&mut self, properties: Arc<StylePropertySet>) {
        self.matched_properties.push(MatchedProperties {
            properties,
            origin: CascadeOrigin::Author,
            layer_order: LayerOrder::INLINE,
            is_inline_style: true,
        });
    }

    /// Entries in ascending priority.
    #[inline]
    pub fn matched_properties(&self) -> &[MatchedProperties] {
        &self.matched_properties
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, MatchedProperties> {
        self.matched_properties.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.matched_properties.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matched_properties.is_empty()
    }

    /// Drop all entries, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.matched_properties.clear();
    }
}

impl<'result> IntoIterator for &'result MatchResult {
    type Item = &'result MatchedProperties;
    type IntoIter = Iter<'result, MatchedProperties>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
