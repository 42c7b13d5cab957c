//! Runtime configuration for style resolution.
//!
//! Controls the matched properties cache, the ancestor selector filter and
//! rule collection limits. Configuration can be loaded from environment
//! variables or constructed programmatically.

use crate::element_rule_collector::DEFAULT_MAX_RULES_PER_LIST;
use crate::matched_properties_cache::{CacheEvictionPolicy, DEFAULT_CACHE_CAPACITY};
use std::env;

/// Tuning knobs for a [`crate::StyleResolver`] and its context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleEngineConfig {
    /// Whether resolved styles are shared through the matched properties cache
    pub matched_properties_cache_enabled: bool,
    /// Maximum number of cached styles (minimum 1)
    pub matched_properties_cache_capacity: usize,
    /// What the cache does when full
    pub cache_eviction: CacheEvictionPolicy,
    /// Cap on candidate rules examined per bucket list
    pub max_rules_per_list: usize,
    /// Whether tree resolution consults the ancestor Bloom filter
    pub use_selector_filter: bool,
    /// Whether rules with empty declaration blocks are indexed and matched
    pub include_empty_rules: bool,
}

impl Default for StyleEngineConfig {
    fn default() -> Self {
        Self {
            matched_properties_cache_enabled: true,
            matched_properties_cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_eviction: CacheEvictionPolicy::ClearAll,
            max_rules_per_list: DEFAULT_MAX_RULES_PER_LIST,
            use_selector_filter: true,
            include_empty_rules: false,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .and_then(|val| match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" => Some(true),
            "0" | "false" | "off" => Some(false),
            _ => None,
        })
}

fn env_usize(name: &str) -> Option<usize> {
    env::var(name)
        .ok()
        .and_then(|val| val.trim().parse::<usize>().ok())
}

impl StyleEngineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    ///
    /// Reads the following environment variables:
    /// - `VALOR_STYLE_MPC`: `0` disables the matched properties cache
    /// - `VALOR_STYLE_MPC_CAPACITY`: cache capacity (default: 1000)
    /// - `VALOR_STYLE_MPC_EVICTION`: `lru` or `clear` (default: `clear`)
    /// - `VALOR_STYLE_MAX_RULES_PER_LIST`: candidate cap per bucket (default: 1000)
    /// - `VALOR_STYLE_SELECTOR_FILTER`: `0` disables the ancestor filter
    /// - `VALOR_STYLE_INCLUDE_EMPTY_RULES`: `1` keeps empty rules
    ///
    /// # Returns
    ///
    /// A new `StyleEngineConfig` populated from environment variables
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cache_eviction = env::var("VALOR_STYLE_MPC_EVICTION")
            .ok()
            .and_then(|val| match val.trim().to_ascii_lowercase().as_str() {
                "lru" => Some(CacheEvictionPolicy::Lru),
                "clear" | "clear-all" => Some(CacheEvictionPolicy::ClearAll),
                _ => None,
            })
            .unwrap_or(defaults.cache_eviction);
        Self {
            matched_properties_cache_enabled: env_flag("VALOR_STYLE_MPC")
                .unwrap_or(defaults.matched_properties_cache_enabled),
            matched_properties_cache_capacity: env_usize("VALOR_STYLE_MPC_CAPACITY")
                .unwrap_or(defaults.matched_properties_cache_capacity)
                .max(1),
            cache_eviction,
            max_rules_per_list: env_usize("VALOR_STYLE_MAX_RULES_PER_LIST")
                .unwrap_or(defaults.max_rules_per_list)
                .max(1),
            use_selector_filter: env_flag("VALOR_STYLE_SELECTOR_FILTER")
                .unwrap_or(defaults.use_selector_filter),
            include_empty_rules: env_flag("VALOR_STYLE_INCLUDE_EMPTY_RULES")
                .unwrap_or(defaults.include_empty_rules),
        }
    }

    /// Same settings with the matched properties cache switched on or off.
    ///
    /// # Returns
    ///
    /// The updated configuration
    #[inline]
    #[must_use]
    pub const fn with_matched_properties_cache(mut self, enabled: bool) -> Self {
        self.matched_properties_cache_enabled = enabled;
        self
    }

    /// Same settings with the given cache capacity and eviction policy.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of cached styles (minimum 1)
    /// * `eviction` - Policy applied when an insert finds the cache full
    ///
    /// # Returns
    ///
    /// The updated configuration
    #[inline]
    #[must_use]
    pub const fn with_cache_capacity(mut self, capacity: usize, eviction: CacheEvictionPolicy) -> Self {
        self.matched_properties_cache_capacity = if capacity < 1 { 1 } else { capacity };
        self.cache_eviction = eviction;
        self
    }

    /// Same settings with the ancestor filter switched on or off.
    ///
    /// # Returns
    ///
    /// The updated configuration
    #[inline]
    #[must_use]
    pub const fn with_selector_filter(mut self, enabled: bool) -> Self {
        self.use_selector_filter = enabled;
        self
    }

    /// Same settings with empty rules kept or dropped.
    ///
    /// # Returns
    ///
    /// The updated configuration
    #[inline]
    #[must_use]
    pub const fn with_empty_rules(mut self, include: bool) -> Self {
        self.include_empty_rules = include;
        self
    }
}
