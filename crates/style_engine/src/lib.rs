//! Style resolution: rule indexing, ancestor filtering, rule collection,
//! the cascade and computed style sharing.
//!
//! [`StyleResolver`] styles any tree implementing [`StyleElement`] against
//! an immutable [`StyleEngineContext`]. [`StyleEngine`] wraps both around a
//! mirrored DOM fed by [`DomUpdate`] messages.

#![forbid(unsafe_code)]

mod computed_style;
mod config;
mod context;
mod dom;
mod element;
mod element_rule_collector;
mod matched_properties_cache;
mod resolver;
mod rule_set;
mod selector_filter;
mod stylesheet;
mod ua_stylesheet;

pub use computed_style::{ComputedStyle, ComputedStyleBuilder, Display};
pub use config::StyleEngineConfig;
pub use context::StyleEngineContext;
pub use dom::{DomSubscriber, DomUpdate, ElementState, NodeKey, StyleDom};
pub use element::{ChildElements, StyleElement};
pub use element_rule_collector::{
    CollectionStats, DEFAULT_MAX_RULES_PER_LIST, ElementRuleCollector, INLINE_STYLE_SHEET_INDEX,
    MatchRequest, MatchedRule,
};
pub use matched_properties_cache::{
    CacheEvictionPolicy, CacheStats, DEFAULT_CACHE_CAPACITY, MatchedPropertiesCache,
    MatchedPropertiesCacheKey, compute_matched_properties_hash, parent_identity_hash,
};
pub use resolver::{ResolverStats, StyleResolver};
pub use rule_set::{
    AddRuleFlags, BucketKey, LayerRegistry, RuleBucket, RuleData, RuleSet, find_best_bucket,
};
pub use selector_filter::{SelectorFilter, SelectorFilterScope};
pub use stylesheet::{SheetRule, StyleRule, StyleSheetContents};
pub use ua_stylesheet::USER_AGENT_STYLE_SHEET;

use anyhow::Result;
use css_media_queries::MediaValues;
use log::info;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Computed style per element.
pub type ComputedMap = FxHashMap<NodeKey, Arc<ComputedStyle>>;

/// `StyleEngine` is a DOM subscriber that mirrors the document, holds the
/// active stylesheets and keeps a computed style per element.
///
/// Updates only mark styles dirty. Styles are recomputed in one batch at
/// `EndOfDocument` or on an explicit [`StyleEngine::recompute_dirty`].
pub struct StyleEngine {
    dom: StyleDom,
    context: Arc<StyleEngineContext>,
    resolver: StyleResolver,
    computed: ComputedMap,
    dirty: bool,
    /// Sticky flag indicating whether computed styles changed since last check.
    style_changed: bool,
    /// Nodes whose computed styles changed in the last recompute; drained by `take_changed_nodes()`.
    changed_nodes: FxHashSet<NodeKey>,
    /// Increments whenever the active stylesheet set or media changes.
    rules_epoch: u64,
}

impl Default for StyleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleEngine {
    /// Create a new `StyleEngine` with the built-in user-agent stylesheet,
    /// no author sheets and configuration read from the environment.
    pub fn new() -> Self {
        Self::with_config(StyleEngineConfig::from_env())
    }

    /// Create a `StyleEngine` with an explicit configuration and default
    /// media values.
    pub fn with_config(config: StyleEngineConfig) -> Self {
        let context = StyleEngineContext::new(config, MediaValues::default());
        let resolver = StyleResolver::new(&context);
        Self {
            dom: StyleDom::new(),
            context: Arc::new(context),
            resolver,
            computed: ComputedMap::default(),
            dirty: false,
            style_changed: false,
            changed_nodes: FxHashSet::default(),
            rules_epoch: 0,
        }
    }

    fn install_context(&mut self, context: StyleEngineContext) {
        self.context = Arc::new(context);
        self.resolver.clear_cache();
        self.rules_epoch = self.rules_epoch.wrapping_add(1);
        self.dirty = true;
    }

    /// Replace every author stylesheet with the single sheet `css`.
    pub fn replace_author_stylesheet(&mut self, css: &str) {
        let sheet = Arc::new(StyleSheetContents::parse(css));
        info!(
            "StyleEngine: author stylesheet replaced ({} style rules)",
            sheet.style_rule_count()
        );
        let context = self.context.with_author_sheets(vec![sheet]);
        self.install_context(context);
    }

    /// Append an author stylesheet after the existing ones.
    pub fn add_author_stylesheet(&mut self, css: &str) {
        let context = self
            .context
            .with_author_sheet(Arc::new(StyleSheetContents::parse(css)));
        self.install_context(context);
    }

    /// Append a user stylesheet after the existing ones.
    pub fn add_user_stylesheet(&mut self, css: &str) {
        let context = self
            .context
            .with_user_sheet(Arc::new(StyleSheetContents::parse(css)));
        self.install_context(context);
    }

    /// Re-evaluate every sheet's media queries against `media_values`.
    pub fn set_media_values(&mut self, media_values: MediaValues) {
        if self.context.media_values() == &media_values {
            return;
        }
        let context = self.context.with_media_values(media_values);
        self.install_context(context);
    }

    /// Resolve every element from scratch, parents before children.
    pub fn recompute_all(&mut self) {
        let mut computed = ComputedMap::default();
        for &root in self.dom.top_level_elements() {
            computed.extend(
                self.resolver
                    .resolve_tree(&self.context, &self.dom, root, None),
            );
        }

        self.changed_nodes.clear();
        for (node, style) in &computed {
            let changed = self
                .computed
                .get(node)
                .is_none_or(|previous| !Arc::ptr_eq(previous, style) && previous != style);
            if changed {
                self.changed_nodes.insert(*node);
            }
        }
        if !self.changed_nodes.is_empty() || computed.len() != self.computed.len() {
            self.style_changed = true;
        }
        self.computed = computed;
        self.dirty = false;
    }

    /// Recompute if any update or stylesheet change arrived since the last
    /// recompute.
    pub fn recompute_dirty(&mut self) {
        if self.dirty {
            self.recompute_all();
        }
    }

    /// True if an update arrived since the last recompute.
    #[inline]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Computed style of `node` as of the last recompute.
    pub fn computed_style(&self, node: NodeKey) -> Option<&Arc<ComputedStyle>> {
        self.computed.get(&node)
    }

    /// Computed styles of every element as of the last recompute.
    #[inline]
    pub const fn computed_snapshot(&self) -> &ComputedMap {
        &self.computed
    }

    /// Return whether styles changed since the last check and clear the flag.
    pub fn take_and_clear_style_changed(&mut self) -> bool {
        let changed = self.style_changed;
        self.style_changed = false;
        changed
    }

    /// Drain the nodes whose computed styles changed during the last recompute.
    pub fn take_changed_nodes(&mut self) -> Vec<NodeKey> {
        let mut nodes: Vec<NodeKey> = self.changed_nodes.drain().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Current rules epoch value.
    #[inline]
    pub const fn current_rules_epoch(&self) -> u64 {
        self.rules_epoch
    }

    #[inline]
    pub const fn dom(&self) -> &StyleDom {
        &self.dom
    }

    /// Active stylesheets and media values.
    #[inline]
    pub fn context(&self) -> &Arc<StyleEngineContext> {
        &self.context
    }

    #[inline]
    pub const fn resolver(&self) -> &StyleResolver {
        &self.resolver
    }
}

impl DomSubscriber for StyleEngine {
    fn apply_update(&mut self, update: DomUpdate) -> Result<()> {
        let end_of_document = matches!(update, DomUpdate::EndOfDocument);
        self.dom.apply_update(update)?;
        self.dirty = true;
        if end_of_document {
            self.recompute_all();
        }
        Ok(())
    }
}
