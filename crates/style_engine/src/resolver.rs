//! Drives rule collection, the matched properties cache and the cascade for
//! single elements, pseudo-elements and whole subtrees.

use crate::computed_style::{ComputedStyle, ComputedStyleBuilder};
use crate::context::StyleEngineContext;
use crate::element::StyleElement;
use crate::element_rule_collector::{ElementRuleCollector, MatchedRule};
use crate::matched_properties_cache::{
    CacheStats, MatchedPropertiesCache, MatchedPropertiesCacheKey,
};
use crate::selector_filter::SelectorFilter;
use core::hash::Hash;
use core::mem;
use css_cascade::{MatchResult, StyleCascade};
use css_selectors::PseudoId;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::info_span;

/// Running totals across every resolution since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Elements and pseudo-elements resolved.
    pub elements_styled: u64,
    /// Resolutions answered by the matched-properties cache.
    pub cache_hits: u64,
    /// Rules matched, inline style included.
    pub matched_rules: u64,
    /// Candidates skipped by the ancestor filter.
    pub filter_rejections: u64,
}

/// Reusable state for resolving styles against a [`StyleEngineContext`].
#[derive(Debug)]
pub struct StyleResolver {
    selector_filter: SelectorFilter,
    matched_properties_cache: MatchedPropertiesCache,
    cascade: StyleCascade,
    matched_rules_buffer: Vec<MatchedRule>,
    stats: ResolverStats,
}

impl StyleResolver {
    /// Resolver sized by `context`'s configuration.
    pub fn new(context: &StyleEngineContext) -> Self {
        let config = context.config();
        let mut matched_properties_cache = MatchedPropertiesCache::new(
            config.matched_properties_cache_capacity,
            config.cache_eviction,
        );
        matched_properties_cache.set_enabled(config.matched_properties_cache_enabled);
        Self {
            selector_filter: SelectorFilter::new(),
            matched_properties_cache,
            cascade: StyleCascade::new(),
            matched_rules_buffer: Vec::new(),
            stats: ResolverStats::default(),
        }
    }

    /// Sorted match result for `element` without cascading it.
    pub fn match_result_for<E: StyleElement>(
        &mut self,
        context: &StyleEngineContext,
        adapter: &E,
        element: E::Handle,
        pseudo_id: Option<PseudoId>,
    ) -> MatchResult {
        self.collect(context, adapter, element, pseudo_id, None)
    }

    fn collect<E: StyleElement>(
        &mut self,
        context: &StyleEngineContext,
        adapter: &E,
        element: E::Handle,
        pseudo_id: Option<PseudoId>,
        filter: Option<&SelectorFilter>,
    ) -> MatchResult {
        let config = context.config();
        let buffer = mem::take(&mut self.matched_rules_buffer);
        let mut collector = ElementRuleCollector::with_buffer(adapter, element, buffer)
            .with_pseudo_id(pseudo_id)
            .with_selector_filter(filter)
            .with_include_empty_rules(config.include_empty_rules)
            .with_max_rules_per_list(config.max_rules_per_list);
        for request in &context.match_requests() {
            collector.collect_matching_rules(request);
        }
        if adapter.is_styled_element(element) {
            collector.add_element_style_properties(adapter.inline_style(element));
        }
        collector.sort_and_transfer_matched_rules();

        let collected = collector.stats();
        self.stats.matched_rules = self
            .stats
            .matched_rules
            .saturating_add(u64::from(collected.matches));
        self.stats.filter_rejections = self
            .stats
            .filter_rejections
            .saturating_add(u64::from(collected.filter_rejections));

        let match_result = collector.take_match_result();
        self.matched_rules_buffer = collector.into_buffer();
        match_result
    }

    /// Computed style of `element` given its parent's computed style.
    pub fn resolve_style<E: StyleElement>(
        &mut self,
        context: &StyleEngineContext,
        adapter: &E,
        element: E::Handle,
        parent: Option<&Arc<ComputedStyle>>,
    ) -> Arc<ComputedStyle> {
        self.resolve_with_filter(context, adapter, element, parent, None)
    }

    fn resolve_with_filter<E: StyleElement>(
        &mut self,
        context: &StyleEngineContext,
        adapter: &E,
        element: E::Handle,
        parent: Option<&Arc<ComputedStyle>>,
        filter: Option<&SelectorFilter>,
    ) -> Arc<ComputedStyle> {
        let match_result = self.collect(context, adapter, element, None, filter);
        self.stats.elements_styled = self.stats.elements_styled.saturating_add(1);

        let is_link = adapter.is_link(element);
        let is_visited = adapter.is_visited(element);
        let key = MatchedPropertiesCacheKey::new(&match_result, parent, is_link, is_visited);
        if let Some(style) = self
            .matched_properties_cache
            .find(&key, parent, &match_result)
        {
            self.stats.cache_hits = self.stats.cache_hits.saturating_add(1);
            return style;
        }

        let style = Arc::new(self.cascade_into_style(
            context,
            &match_result,
            parent,
            is_link,
            is_visited,
            None,
        ));
        self.matched_properties_cache
            .add(key, Arc::clone(&style), parent, &match_result);
        style
    }

    fn cascade_into_style(
        &mut self,
        context: &StyleEngineContext,
        match_result: &MatchResult,
        parent: Option<&Arc<ComputedStyle>>,
        is_link: bool,
        is_visited: bool,
        pseudo_id: Option<PseudoId>,
    ) -> ComputedStyle {
        let mut builder =
            ComputedStyleBuilder::new(parent.map(|style| &**style), context.initial_style())
                .with_link_state(is_link, is_visited)
                .with_pseudo_id(pseudo_id);
        self.cascade.reset();
        self.cascade.apply(match_result, &mut builder);
        builder.finish()
    }

    /// Style of `pseudo` on `element`, or `None` if no rule targets it.
    /// Inline style does not apply and the result is never cached.
    pub fn resolve_pseudo_element_style<E: StyleElement>(
        &mut self,
        context: &StyleEngineContext,
        adapter: &E,
        element: E::Handle,
        pseudo: PseudoId,
        parent: Option<&Arc<ComputedStyle>>,
    ) -> Option<Arc<ComputedStyle>> {
        let match_result = self.collect(context, adapter, element, Some(pseudo), None);
        if match_result.is_empty() {
            return None;
        }
        let style = self.cascade_into_style(
            context,
            &match_result,
            parent,
            adapter.is_link(element),
            adapter.is_visited(element),
            Some(pseudo),
        );
        Some(Arc::new(style))
    }

    /// Resolve `root` and every descendant element, parents before
    /// children. With the selector filter enabled, each element is pushed
    /// into the filter before it is matched, so the filter holds the
    /// element and all of its ancestors.
    pub fn resolve_tree<E: StyleElement>(
        &mut self,
        context: &StyleEngineContext,
        adapter: &E,
        root: E::Handle,
        parent: Option<&Arc<ComputedStyle>>,
    ) -> FxHashMap<E::Handle, Arc<ComputedStyle>>
    where
        E::Handle: Hash,
    {
        let _span = info_span!("style.resolve_tree").entered();
        let use_filter = context.config().use_selector_filter;
        let mut filter = mem::take(&mut self.selector_filter);
        filter.clear();

        let mut ancestors = Vec::new();
        let mut current = adapter.parent(root);
        while let Some(ancestor) = current {
            ancestors.push(ancestor);
            current = adapter.parent(ancestor);
        }
        for &ancestor in ancestors.iter().rev() {
            filter.push_element(adapter, ancestor);
        }

        let mut styles = FxHashMap::default();
        self.resolve_subtree(
            &SubtreeWalk {
                context,
                adapter,
                use_filter,
            },
            &mut filter,
            root,
            parent,
            &mut styles,
        );

        for _ in &ancestors {
            filter.pop_element();
        }
        debug_assert!(filter.is_empty(), "selector filter left unbalanced");
        self.selector_filter = filter;
        styles
    }

    fn resolve_subtree<E: StyleElement>(
        &mut self,
        walk: &SubtreeWalk<'_, E>,
        filter: &mut SelectorFilter,
        element: E::Handle,
        parent: Option<&Arc<ComputedStyle>>,
        styles: &mut FxHashMap<E::Handle, Arc<ComputedStyle>>,
    ) where
        E::Handle: Hash,
    {
        let mut scope = filter.scoped(walk.adapter, element);
        let style = self.resolve_with_filter(
            walk.context,
            walk.adapter,
            element,
            parent,
            walk.use_filter.then_some(&*scope),
        );
        for child in walk.adapter.child_elements(element) {
            self.resolve_subtree(walk, &mut scope, child, Some(&style), styles);
        }
        styles.insert(element, style);
    }

    /// Drop every cached style and reset the cache counters.
    pub fn clear_cache(&mut self) {
        self.matched_properties_cache.clear();
    }

    #[inline]
    pub const fn matched_properties_cache(&self) -> &MatchedPropertiesCache {
        &self.matched_properties_cache
    }

    #[inline]
    pub const fn cache_stats(&self) -> CacheStats {
        self.matched_properties_cache.stats()
    }

    /// Totals since construction.
    #[inline]
    pub const fn stats(&self) -> ResolverStats {
        self.stats
    }
}

/// Inputs shared by every level of one tree walk.
struct SubtreeWalk<'walk, E: StyleElement> {
    context: &'walk StyleEngineContext,
    adapter: &'walk E,
    use_filter: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomSubscriber as _, DomUpdate, NodeKey, StyleDom};
    use crate::stylesheet::StyleSheetContents;
    use anyhow::Result;
    use css_cascade::PropertyId;

    fn insert(dom: &mut StyleDom, parent: u64, node: u64, tag: &str) -> Result<()> {
        dom.apply_update(DomUpdate::InsertElement {
            parent: NodeKey(parent),
            node: NodeKey(node),
            tag: tag.to_owned(),
            pos: usize::MAX,
        })
    }

    fn set_attr(dom: &mut StyleDom, node: u64, name: &str, value: &str) -> Result<()> {
        dom.apply_update(DomUpdate::SetAttr {
            node: NodeKey(node),
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }

    fn context(css: &str) -> StyleEngineContext {
        StyleEngineContext::default()
            .with_author_sheets(vec![Arc::new(StyleSheetContents::parse(css))])
    }

    #[test]
    fn siblings_share_cached_style() -> Result<()> {
        let mut dom = StyleDom::new();
        insert(&mut dom, 0, 1, "ul")?;
        for node in 2..6 {
            insert(&mut dom, 1, node, "li")?;
        }
        let context = context("ul { color: navy } li { margin: 2px }");
        let mut resolver = StyleResolver::new(&context);
        let styles = resolver.resolve_tree(&context, &dom, NodeKey(1), None);

        assert_eq!(styles.len(), 5);
        let first = styles.get(&NodeKey(2)).map(Arc::clone);
        let last = styles.get(&NodeKey(5)).map(Arc::clone);
        assert!(first.as_ref().is_some_and(|style| style.color() == "navy"
            && style.get(PropertyId::Margin) == "2px"));
        assert!(matches!((first, last), (Some(first), Some(last)) if Arc::ptr_eq(&first, &last)));
        assert_eq!(resolver.stats().cache_hits, 3);
        assert_eq!(resolver.stats().elements_styled, 5);
        Ok(())
    }

    #[test]
    fn inline_style_defeats_sharing_and_wins() -> Result<()> {
        let mut dom = StyleDom::new();
        insert(&mut dom, 0, 1, "div")?;
        insert(&mut dom, 1, 2, "p")?;
        insert(&mut dom, 1, 3, "p")?;
        set_attr(&mut dom, 3, "style", "color: red")?;
        let context = context("p { color: blue }");
        let mut resolver = StyleResolver::new(&context);
        let styles = resolver.resolve_tree(&context, &dom, NodeKey(1), None);

        assert_eq!(styles.get(&NodeKey(2)).map(|style| style.color()), Some("blue"));
        assert_eq!(styles.get(&NodeKey(3)).map(|style| style.color()), Some("red"));
        assert_eq!(resolver.stats().cache_hits, 0);
        Ok(())
    }

    #[test]
    fn filter_does_not_change_results() -> Result<()> {
        let mut dom = StyleDom::new();
        insert(&mut dom, 0, 1, "main")?;
        insert(&mut dom, 1, 2, "section")?;
        insert(&mut dom, 2, 3, "p")?;
        insert(&mut dom, 1, 4, "p")?;
        set_attr(&mut dom, 2, "class", "card")?;
        let css = ".card p { color: green } article p { color: red } main > p { margin: 1px }";

        let filtered = context(css);
        let mut resolver = StyleResolver::new(&filtered);
        let with_filter = resolver.resolve_tree(&filtered, &dom, NodeKey(1), None);
        assert!(resolver.stats().filter_rejections > 0);

        let unfiltered = StyleEngineContext::new(
            filtered.config().clone().with_selector_filter(false),
            *filtered.media_values(),
        )
        .with_author_sheets(filtered.author_sheets().to_vec());
        let mut plain = StyleResolver::new(&unfiltered);
        let without_filter = plain.resolve_tree(&unfiltered, &dom, NodeKey(1), None);
        assert_eq!(plain.stats().filter_rejections, 0);

        for node in [1, 2, 3, 4] {
            let key = NodeKey(node);
            assert_eq!(
                with_filter.get(&key).map(|style| &**style),
                without_filter.get(&key).map(|style| &**style)
            );
        }
        assert_eq!(with_filter.get(&NodeKey(3)).map(|style| style.color()), Some("green"));
        assert_eq!(
            with_filter.get(&NodeKey(4)).map(|style| style.get(PropertyId::Margin)),
            Some("1px")
        );
        Ok(())
    }

    #[test]
    fn pseudo_elements_resolve_separately() -> Result<()> {
        let mut dom = StyleDom::new();
        insert(&mut dom, 0, 1, "p")?;
        set_attr(&mut dom, 1, "style", "color: red")?;
        let context = context("p::before { content: \"x\"; color: blue }");
        let mut resolver = StyleResolver::new(&context);
        let parent = resolver.resolve_style(&context, &dom, NodeKey(1), None);
        let before = resolver.resolve_pseudo_element_style(
            &context,
            &dom,
            NodeKey(1),
            PseudoId::Before,
            Some(&parent),
        );
        let after = resolver.resolve_pseudo_element_style(
            &context,
            &dom,
            NodeKey(1),
            PseudoId::After,
            Some(&parent),
        );

        assert_eq!(parent.color(), "red");
        assert!(before.is_some_and(|style| style.color() == "blue"
            && style.get(PropertyId::Content) == "\"x\""
            && style.pseudo_id() == Some(PseudoId::Before)));
        assert!(after.is_none());
        Ok(())
    }
}
