//! Cache from matched declaration blocks plus parent style to the computed
//! style they produce, so siblings with identical matches skip the cascade.
//!
//! A hit requires the same key, the identical parent style object and the
//! identical declaration blocks in the same order. Entries hold their parent
//! and blocks alive, so pointer identity cannot be reused while cached.

use crate::computed_style::ComputedStyle;
use css_cascade::{MatchResult, StylePropertySet};
use log::debug;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Default number of cached styles.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// What happens when an insert finds the cache full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheEvictionPolicy {
    /// Drop every entry.
    #[default]
    ClearAll,
    /// Drop the least recently used entry.
    Lru,
}

/// Lookup key for a cached style. Equal keys only make an entry a
/// candidate; the entry still checks its parent and blocks by identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatchedPropertiesCacheKey {
    matched_properties_hash: u32,
    parent_hash: u64,
    is_link: bool,
    is_visited: bool,
}

impl MatchedPropertiesCacheKey {
    /// Key for styling `match_result` under `parent` in the given link state.
    pub fn new(
        match_result: &MatchResult,
        parent: Option<&Arc<ComputedStyle>>,
        is_link: bool,
        is_visited: bool,
    ) -> Self {
        Self {
            matched_properties_hash: compute_matched_properties_hash(match_result),
            parent_hash: parent_identity_hash(parent),
            is_link,
            is_visited,
        }
    }

    /// See [`compute_matched_properties_hash`].
    #[inline]
    pub const fn matched_properties_hash(&self) -> u32 {
        self.matched_properties_hash
    }

    #[inline]
    pub const fn parent_hash(&self) -> u64 {
        self.parent_hash
    }
}

#[inline]
const fn fold(hash: u32, value: u32) -> u32 {
    (hash.rotate_left(5) ^ value).wrapping_mul(0x27D4_EB2D)
}

/// Rolling hash over the shape of `match_result`: entry count, then per
/// entry the property and custom property counts, the first three property
/// ids with their importance, the origin, the layer and the inline flag.
pub fn compute_matched_properties_hash(match_result: &MatchResult) -> u32 {
    let mut hash = fold(0, match_result.len() as u32);
    for entry in match_result {
        hash = fold(hash, entry.properties.property_count() as u32);
        hash = fold(hash, entry.properties.custom_property_count() as u32);
        for declaration in entry.properties.iter().take(3) {
            hash = fold(hash, declaration.id.index() as u32);
            hash = fold(hash, u32::from(declaration.important));
        }
        hash = fold(hash, entry.origin as u32);
        let layer = entry.layer_order.value();
        hash = fold(hash, (layer >> 32) as u32);
        hash = fold(hash, layer as u32);
        hash = fold(hash, u32::from(entry.is_inline_style));
    }
    hash
}

/// Identity of the parent style object; `0` for no parent.
pub fn parent_identity_hash(parent: Option<&Arc<ComputedStyle>>) -> u64 {
    parent.map_or(0, |style| Arc::as_ptr(style) as usize as u64)
}

/// Hit, miss and churn counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that returned a shared style.
    pub hits: u64,
    /// Lookups that found nothing or a stale entry.
    pub misses: u64,
    /// Styles stored.
    pub adds: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
}

#[derive(Debug)]
struct CachedEntry {
    style: Arc<ComputedStyle>,
    parent: Option<Arc<ComputedStyle>>,
    blocks: Vec<Arc<StylePropertySet>>,
    last_used: u64,
}

impl CachedEntry {
    fn is_valid_for(&self, parent: Option<&Arc<ComputedStyle>>, match_result: &MatchResult) -> bool {
        let same_parent = match (self.parent.as_ref(), parent) {
            (Some(stored), Some(current)) => Arc::ptr_eq(stored, current),
            (None, None) => true,
            _ => false,
        };
        same_parent
            && self.blocks.len() == match_result.len()
            && self
                .blocks
                .iter()
                .zip(match_result)
                .all(|(stored, entry)| Arc::ptr_eq(stored, &entry.properties))
    }
}

/// Shares computed styles between elements with the same parent and the
/// same matched declaration blocks.
#[derive(Debug)]
pub struct MatchedPropertiesCache {
    entries: FxHashMap<MatchedPropertiesCacheKey, CachedEntry>,
    capacity: usize,
    policy: CacheEvictionPolicy,
    enabled: bool,
    clock: u64,
    stats: CacheStats,
}

impl Default for MatchedPropertiesCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, CacheEvictionPolicy::ClearAll)
    }
}

impl MatchedPropertiesCache {
    /// Enabled cache holding at most `capacity` entries, at least one.
    pub fn new(capacity: usize, policy: CacheEvictionPolicy) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity: capacity.max(1),
            policy,
            enabled: true,
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// A disabled cache never stores and never hits.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.entries.clear();
        }
    }

    /// Cached style for `key`, if the entry was built from the same parent
    /// object and the same declaration blocks. A stale entry is evicted.
    pub fn find(
        &mut self,
        key: &MatchedPropertiesCacheKey,
        parent: Option<&Arc<ComputedStyle>>,
        match_result: &MatchResult,
    ) -> Option<Arc<ComputedStyle>> {
        if !self.enabled {
            return None;
        }
        self.clock = self.clock.saturating_add(1);
        let valid = match self.entries.get_mut(key) {
            Some(entry) if entry.is_valid_for(parent, match_result) => {
                entry.last_used = self.clock;
                Some(Arc::clone(&entry.style))
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.evictions = self.stats.evictions.saturating_add(1);
                None
            }
            None => None,
        };
        if valid.is_some() {
            self.stats.hits = self.stats.hits.saturating_add(1);
        } else {
            self.stats.misses = self.stats.misses.saturating_add(1);
        }
        valid
    }

    /// Store `style` for `key`, evicting per the policy when full.
    pub fn add(
        &mut self,
        key: MatchedPropertiesCacheKey,
        style: Arc<ComputedStyle>,
        parent: Option<&Arc<ComputedStyle>>,
        match_result: &MatchResult,
    ) {
        if !self.enabled {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict();
        }
        self.clock = self.clock.saturating_add(1);
        self.entries.insert(
            key,
            CachedEntry {
                style,
                parent: parent.map(Arc::clone),
                blocks: match_result
                    .iter()
                    .map(|entry| Arc::clone(&entry.properties))
                    .collect(),
                last_used: self.clock,
            },
        );
        self.stats.adds = self.stats.adds.saturating_add(1);
    }

    fn evict(&mut self) {
        match self.policy {
            CacheEvictionPolicy::ClearAll => {
                debug!("matched properties cache full, clearing {} entries", self.entries.len());
                self.stats.evictions = self
                    .stats
                    .evictions
                    .saturating_add(self.entries.len() as u64);
                self.entries.clear();
            }
            CacheEvictionPolicy::Lru => {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(key, _)| *key);
                if let Some(key) = oldest {
                    self.entries.remove(&key);
                    self.stats.evictions = self.stats.evictions.saturating_add(1);
                }
            }
        }
    }

    /// Drop all entries and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.clock = 0;
        self.stats = CacheStats::default();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub const fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use css_cascade::{CascadeOrigin, LayerOrder};

    fn block(css: &[(&str, &str, bool)]) -> Arc<StylePropertySet> {
        Arc::new(StylePropertySet::from_declarations(css.iter().copied()))
    }

    fn result_of(blocks: &[&Arc<StylePropertySet>]) -> MatchResult {
        let mut result = MatchResult::new();
        for properties in blocks {
            result.add_matched_properties(
                Arc::clone(properties),
                CascadeOrigin::Author,
                LayerOrder::IMPLICIT_OUTER,
            );
        }
        result
    }

    #[test]
    fn hash_depends_on_shape() {
        let red = block(&[("color", "red", false)]);
        let blue = block(&[("color", "blue", false)]);
        let important = block(&[("color", "red", true)]);
        assert_eq!(
            compute_matched_properties_hash(&result_of(&[&red])),
            compute_matched_properties_hash(&result_of(&[&blue]))
        );
        assert_ne!(
            compute_matched_properties_hash(&result_of(&[&red])),
            compute_matched_properties_hash(&result_of(&[&important]))
        );
        assert_ne!(
            compute_matched_properties_hash(&result_of(&[&red])),
            compute_matched_properties_hash(&result_of(&[&red, &red]))
        );
    }

    #[test]
    fn hit_requires_same_parent_and_blocks() {
        let red = block(&[("color", "red", false)]);
        let blue = block(&[("color", "blue", false)]);
        let parent = Arc::new(ComputedStyle::initial());
        let other_parent = Arc::new(ComputedStyle::initial());
        let style = Arc::new(ComputedStyle::initial());
        let mut cache = MatchedPropertiesCache::default();

        let red_result = result_of(&[&red]);
        let key = MatchedPropertiesCacheKey::new(&red_result, Some(&parent), false, false);
        assert!(cache.find(&key, Some(&parent), &red_result).is_none());
        cache.add(key, Arc::clone(&style), Some(&parent), &red_result);

        let hit = cache.find(&key, Some(&parent), &red_result);
        assert!(hit.is_some_and(|found| Arc::ptr_eq(&found, &style)));

        // Same shape, different block: the hash collides, identity does not.
        let blue_result = result_of(&[&blue]);
        let blue_key = MatchedPropertiesCacheKey::new(&blue_result, Some(&parent), false, false);
        assert_eq!(blue_key, key);
        assert!(cache.find(&blue_key, Some(&parent), &blue_result).is_none());
        assert!(cache.is_empty());

        cache.add(key, Arc::clone(&style), Some(&parent), &red_result);
        assert!(cache.find(&key, Some(&other_parent), &red_result).is_none());
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 3,
                adds: 2,
                evictions: 2,
            }
        );
    }

    #[test]
    fn eviction_policies() {
        let blocks: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|value| block(&[("content", value, false)]))
            .collect();
        let results: Vec<_> = blocks
            .iter()
            .enumerate()
            .map(|(index, properties)| {
                let mut result = MatchResult::new();
                result.add_matched_properties(
                    Arc::clone(properties),
                    CascadeOrigin::Author,
                    LayerOrder::top_level(index as u16),
                );
                result
            })
            .collect();
        let keys: Vec<_> = results
            .iter()
            .map(|result| MatchedPropertiesCacheKey::new(result, None, false, false))
            .collect();
        let style = Arc::new(ComputedStyle::initial());

        let mut clearing = MatchedPropertiesCache::new(2, CacheEvictionPolicy::ClearAll);
        for (key, result) in keys.iter().zip(&results) {
            clearing.add(*key, Arc::clone(&style), None, result);
        }
        assert_eq!(clearing.len(), 1);

        let mut lru = MatchedPropertiesCache::new(2, CacheEvictionPolicy::Lru);
        lru.add(keys[0], Arc::clone(&style), None, &results[0]);
        lru.add(keys[1], Arc::clone(&style), None, &results[1]);
        assert!(lru.find(&keys[0], None, &results[0]).is_some());
        lru.add(keys[2], Arc::clone(&style), None, &results[2]);
        assert_eq!(lru.len(), 2);
        assert!(lru.find(&keys[0], None, &results[0]).is_some());
        assert!(lru.find(&keys[1], None, &results[1]).is_none());
        assert_eq!(lru.stats().evictions, 1);
    }

    #[test]
    fn disabled_cache_never_stores() {
        let red = block(&[("color", "red", false)]);
        let result = result_of(&[&red]);
        let key = MatchedPropertiesCacheKey::new(&result, None, false, false);
        let mut cache = MatchedPropertiesCache::default();
        cache.set_enabled(false);
        cache.add(key, Arc::new(ComputedStyle::initial()), None, &result);
        assert!(cache.find(&key, None, &result).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), DEFAULT_CACHE_CAPACITY);
    }
}
