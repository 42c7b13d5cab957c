//! Rule collection for one element: look up the buckets that can match, run
//! the selector checker on each candidate, then sort the matches into
//! cascade order and hand their declaration blocks to a [`MatchResult`].

use crate::element::StyleElement;
use crate::rule_set::{RuleBucket, RuleData, RuleSet};
use crate::selector_filter::SelectorFilter;
use crate::stylesheet::StyleRule;
use core::mem;
use core::ptr;
use css_cascade::{CascadeOrigin, LayerOrder, MatchResult, StylePropertySet};
use css_selectors::{
    ComplexSelector, PseudoId, SelectorChecker, SelectorCheckingContext, SelectorMatchResult,
    Specificity,
};
use log::{trace, warn};
use smallvec::SmallVec;
use std::sync::Arc;

/// Default cap on candidates examined per bucket.
pub const DEFAULT_MAX_RULES_PER_LIST: usize = 1000;

/// Sheet index given to inline style so it sorts after every sheet.
pub const INLINE_STYLE_SHEET_INDEX: u32 = u32::MAX;

/// Rule sets to search for one origin and stylesheet.
#[derive(Clone, Debug)]
pub struct MatchRequest<'set> {
    rule_sets: SmallVec<&'set RuleSet, 4>,
    origin: CascadeOrigin,
    style_sheet_index: u32,
}

impl<'set> MatchRequest<'set> {
    /// Request matching against `rule_set` under `origin`. `style_sheet_index`
    /// breaks ties between equal rules from different sheets.
    pub fn new(rule_set: &'set RuleSet, origin: CascadeOrigin, style_sheet_index: u32) -> Self {
        let mut rule_sets = SmallVec::new();
        rule_sets.push(rule_set);
        Self {
            rule_sets,
            origin,
            style_sheet_index,
        }
    }

    /// Search `rule_set` too, under the same origin and sheet index.
    pub fn add_rule_set(&mut self, rule_set: &'set RuleSet) {
        self.rule_sets.push(rule_set);
    }

    /// Rule sets searched, in the order they were added.
    #[inline]
    pub fn rule_sets(&self) -> &[&'set RuleSet] {
        &self.rule_sets
    }

    #[inline]
    pub const fn origin(&self) -> CascadeOrigin {
        self.origin
    }

    #[inline]
    pub const fn style_sheet_index(&self) -> u32 {
        self.style_sheet_index
    }
}

/// A rule that matched, with its cascade sort data.
#[derive(Clone, Debug)]
pub struct MatchedRule {
    /// `None` for inline style.
    rule: Option<Arc<StyleRule>>,
    selector_index: u32,
    position: u32,
    properties: Arc<StylePropertySet>,
    specificity: Specificity,
    origin: CascadeOrigin,
    layer_order: LayerOrder,
    style_sheet_index: u32,
    cascade_order: u32,
    is_inline_style: bool,
}

impl MatchedRule {
    /// Owning style rule; `None` for inline style.
    #[inline]
    pub const fn rule(&self) -> Option<&Arc<StyleRule>> {
        self.rule.as_ref()
    }

    /// The selector that matched; `None` for inline style.
    pub fn selector(&self) -> Option<&ComplexSelector> {
        self.rule
            .as_ref()?
            .selectors()
            .get(self.selector_index as usize)
    }

    /// Declaration block applied by this match.
    #[inline]
    pub const fn properties(&self) -> &Arc<StylePropertySet> {
        &self.properties
    }

    #[inline]
    pub const fn specificity(&self) -> Specificity {
        self.specificity
    }

    #[inline]
    pub const fn origin(&self) -> CascadeOrigin {
        self.origin
    }

    /// Cascade layer; [`LayerOrder::INLINE`] for inline style.
    #[inline]
    pub const fn layer_order(&self) -> LayerOrder {
        self.layer_order
    }

    #[inline]
    pub const fn style_sheet_index(&self) -> u32 {
        self.style_sheet_index
    }

    #[inline]
    pub const fn position(&self) -> u32 {
        self.position
    }

    /// Insertion counter, the last sort key.
    #[inline]
    pub const fn cascade_order(&self) -> u32 {
        self.cascade_order
    }

    #[inline]
    pub const fn is_inline_style(&self) -> bool {
        self.is_inline_style
    }

    fn sort_key(&self) -> (CascadeOrigin, bool, LayerOrder, Specificity, u32, u32, u32) {
        (
            self.origin,
            self.is_inline_style,
            self.layer_order,
            self.specificity,
            self.style_sheet_index,
            self.position,
            self.cascade_order,
        )
    }
}

/// Counters for one collection run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Rules taken from a bucket, before any filtering.
    pub candidates: u32,
    /// Candidates the ancestor filter ruled out without a selector check.
    pub filter_rejections: u32,
    /// Rules appended to the matched list, inline style included.
    pub matches: u32,
    /// User agent matches that took the result-free check.
    pub user_agent_checks: u32,
}

/// Collects the rules matching one element, or one of its pseudo-elements.
pub struct ElementRuleCollector<'ctx, E: StyleElement> {
    adapter: &'ctx E,
    element: E::Handle,
    pseudo_id: Option<PseudoId>,
    selector_filter: Option<&'ctx SelectorFilter>,
    checker: SelectorChecker,
    matched_rules: Vec<MatchedRule>,
    match_result: MatchResult,
    next_cascade_order: u32,
    include_empty_rules: bool,
    max_rules_per_list: usize,
    link_dependent: bool,
    stats: CollectionStats,
}

impl<'ctx, E: StyleElement> ElementRuleCollector<'ctx, E> {
    /// Collector for `element` with default limits and no filter.
    pub fn new(adapter: &'ctx E, element: E::Handle) -> Self {
        Self::with_buffer(adapter, element, Vec::new())
    }

    /// Reuse `buffer`'s allocation for the matched rules.
    pub fn with_buffer(adapter: &'ctx E, element: E::Handle, mut buffer: Vec<MatchedRule>) -> Self {
        buffer.clear();
        Self {
            adapter,
            element,
            pseudo_id: None,
            selector_filter: None,
            checker: SelectorChecker::new(),
            matched_rules: buffer,
            match_result: MatchResult::new(),
            next_cascade_order: 0,
            include_empty_rules: false,
            max_rules_per_list: DEFAULT_MAX_RULES_PER_LIST,
            link_dependent: false,
            stats: CollectionStats::default(),
        }
    }

    /// Give the matched-rule buffer back for the next element.
    pub fn into_buffer(self) -> Vec<MatchedRule> {
        self.matched_rules
    }

    /// Collect for a pseudo-element of the element instead. Inline style is
    /// then ignored.
    #[must_use]
    pub fn with_pseudo_id(mut self, pseudo_id: Option<PseudoId>) -> Self {
        self.pseudo_id = pseudo_id;
        self
    }

    /// Consult `filter` before the full selector check. The filter must hold
    /// the element's ancestors.
    #[must_use]
    pub fn with_selector_filter(mut self, filter: Option<&'ctx SelectorFilter>) -> Self {
        self.selector_filter = filter;
        self
    }

    /// Accept matches whose declaration block is empty.
    #[must_use]
    pub fn with_include_empty_rules(mut self, include_empty_rules: bool) -> Self {
        self.include_empty_rules = include_empty_rules;
        self
    }

    /// Cap on candidates checked per bucket. Defaults to
    /// [`DEFAULT_MAX_RULES_PER_LIST`].
    #[must_use]
    pub fn with_max_rules_per_list(mut self, max_rules_per_list: usize) -> Self {
        self.max_rules_per_list = max_rules_per_list;
        self
    }

    #[inline]
    pub const fn is_collecting_for_pseudo_element(&self) -> bool {
        self.pseudo_id.is_some()
    }

    /// Search every bucket of every rule set in `request` that can hold rules
    /// for this element.
    pub fn collect_matching_rules(&mut self, request: &MatchRequest<'_>) {
        let adapter = self.adapter;
        let element = self.element;
        for &rule_set in request.rule_sets() {
            self.collect_matching_rules_for_list(
                rule_set.tag_rules(adapter.local_name(element)),
                request,
            );
            self.collect_matching_rules_for_list(rule_set.universal_rules(), request);
            if let Some(id) = adapter.element_id(element)
                && !id.is_empty()
            {
                self.collect_matching_rules_for_list(rule_set.id_rules(id), request);
            }
            let mut class_buckets: SmallVec<RuleBucket<'_>, 8> = SmallVec::new();
            adapter.for_each_class(element, &mut |class| {
                let bucket = rule_set.class_rules(class);
                // A repeated class must not match its rules twice.
                if !bucket.is_empty()
                    && !class_buckets
                        .iter()
                        .any(|seen| ptr::eq(seen.indices(), bucket.indices()))
                {
                    class_buckets.push(bucket);
                }
            });
            for bucket in class_buckets {
                self.collect_matching_rules_for_list(bucket, request);
            }
            self.collect_matching_rules_for_list(rule_set.link_pseudo_class_rules(), request);
            self.collect_matching_rules_for_list(rule_set.focus_pseudo_class_rules(), request);
        }
    }

    fn collect_matching_rules_for_list(
        &mut self,
        bucket: RuleBucket<'_>,
        request: &MatchRequest<'_>,
    ) {
        if bucket.is_empty() {
            return;
        }
        if bucket.len() > self.max_rules_per_list {
            warn!(
                "{} candidate rules in one bucket, only the first {} are checked",
                bucket.len(),
                self.max_rules_per_list
            );
        }
        // User agent rules match without result bookkeeping, link tracking
        // or tracing.
        let user_agent = request.origin() == CascadeOrigin::UserAgent;
        for rule_data in bucket.iter().take(self.max_rules_per_list) {
            self.stats.candidates = self.stats.candidates.saturating_add(1);
            let Some(selector) = rule_data.selector() else {
                continue;
            };
            if !self.include_empty_rules && rule_data.properties().is_empty() {
                continue;
            }
            if let Some(filter) = self.selector_filter
                && !filter.might_match(selector)
            {
                self.stats.filter_rejections = self.stats.filter_rejections.saturating_add(1);
                continue;
            }
            if user_agent {
                if !self.checker.matches_element(
                    self.adapter,
                    self.element,
                    selector,
                    self.pseudo_id,
                ) {
                    continue;
                }
                self.stats.user_agent_checks = self.stats.user_agent_checks.saturating_add(1);
                self.add_matched_rule(rule_data, request);
                continue;
            }
            let context =
                SelectorCheckingContext::new(self.element, selector).with_pseudo_id(self.pseudo_id);
            let mut result = SelectorMatchResult::default();
            if !self.checker.matches(self.adapter, &context, &mut result) {
                continue;
            }
            trace!(
                "matched {} ({:?}, sheet {})",
                selector.source(),
                request.origin(),
                request.style_sheet_index()
            );
            self.link_dependent |= result.link_dependent;
            self.add_matched_rule(rule_data, request);
        }
    }

    fn next_cascade_order(&mut self) -> u32 {
        let order = self.next_cascade_order;
        self.next_cascade_order = self.next_cascade_order.saturating_add(1);
        order
    }

    fn add_matched_rule(&mut self, rule_data: &RuleData, request: &MatchRequest<'_>) {
        let cascade_order = self.next_cascade_order();
        self.stats.matches = self.stats.matches.saturating_add(1);
        self.matched_rules.push(MatchedRule {
            rule: Some(Arc::clone(rule_data.rule())),
            selector_index: rule_data.selector_index(),
            position: rule_data.position(),
            properties: Arc::clone(rule_data.properties()),
            specificity: rule_data.specificity(),
            origin: request.origin(),
            layer_order: rule_data.layer_order(),
            style_sheet_index: request.style_sheet_index(),
            cascade_order,
            is_inline_style: false,
        });
    }

    /// Add the element's inline style. Ignored for pseudo-elements and for
    /// an absent or empty block.
    pub fn add_element_style_properties(&mut self, properties: Option<Arc<StylePropertySet>>) {
        if self.is_collecting_for_pseudo_element() {
            return;
        }
        let Some(properties) = properties.filter(|properties| !properties.is_empty()) else {
            return;
        };
        let cascade_order = self.next_cascade_order();
        self.matched_rules.push(MatchedRule {
            rule: None,
            selector_index: 0,
            position: 0,
            properties,
            specificity: Specificity::ZERO,
            origin: CascadeOrigin::Author,
            layer_order: LayerOrder::INLINE,
            style_sheet_index: INLINE_STYLE_SHEET_INDEX,
            cascade_order,
            is_inline_style: true,
        });
    }

    /// Stable sort into cascade order, then rebuild the match result from
    /// the sorted rules.
    pub fn sort_and_transfer_matched_rules(&mut self) {
        self.matched_rules.sort_by_key(MatchedRule::sort_key);
        self.match_result.clear();
        for rule in &self.matched_rules {
            if rule.is_inline_style {
                self.match_result
                    .add_inline_style_properties(Arc::clone(&rule.properties));
            } else {
                self.match_result.add_matched_properties(
                    Arc::clone(&rule.properties),
                    rule.origin,
                    rule.layer_order,
                );
            }
        }
    }

    /// Matches so far, sorted once `sort_and_transfer_matched_rules` ran.
    #[inline]
    pub fn matched_rules(&self) -> &[MatchedRule] {
        &self.matched_rules
    }

    /// Blocks transferred by the last sort, lowest priority first.
    #[inline]
    pub const fn match_result(&self) -> &MatchResult {
        &self.match_result
    }

    pub fn take_match_result(&mut self) -> MatchResult {
        mem::take(&mut self.match_result)
    }

    /// Forget all matches, keeping allocations.
    pub fn clear_matched_rules(&mut self) {
        self.matched_rules.clear();
        self.match_result.clear();
        self.next_cascade_order = 0;
        self.link_dependent = false;
        self.stats = CollectionStats::default();
    }

    /// A link-state pseudo-class took part in some match.
    #[inline]
    pub const fn link_dependent(&self) -> bool {
        self.link_dependent
    }

    /// Counters since construction or the last `clear_matched_rules`.
    #[inline]
    pub const fn stats(&self) -> CollectionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomSubscriber as _, DomUpdate, NodeKey, StyleDom};
    use crate::rule_set::AddRuleFlags;
    use crate::stylesheet::StyleSheetContents;
    use anyhow::Result;
    use css_media_queries::MediaQueryEvaluator;

    fn rule_set(css: &str) -> RuleSet {
        let mut set = RuleSet::new();
        set.add_rules_from_sheet(
            &StyleSheetContents::parse(css),
            &MediaQueryEvaluator::default(),
            AddRuleFlags::NONE,
        );
        set
    }

    /// `<div class="a a b" id=main style="color: black"><a href=x></a></div>`
    fn document() -> Result<StyleDom> {
        let mut dom = StyleDom::new();
        dom.apply_update(DomUpdate::InsertElement {
            parent: NodeKey::ROOT,
            node: NodeKey(1),
            tag: "div".to_owned(),
            pos: 0,
        })?;
        dom.apply_update(DomUpdate::InsertElement {
            parent: NodeKey(1),
            node: NodeKey(2),
            tag: "a".to_owned(),
            pos: 0,
        })?;
        for (node, name, value) in [
            (1, "class", "a a b"),
            (1, "id", "main"),
            (1, "style", "color: black"),
            (2, "href", "x"),
        ] {
            dom.apply_update(DomUpdate::SetAttr {
                node: NodeKey(node),
                name: name.to_owned(),
                value: value.to_owned(),
            })?;
        }
        Ok(dom)
    }

    fn colors(result: &MatchResult) -> Vec<String> {
        result
            .iter()
            .filter_map(|entry| entry.properties.iter().next())
            .map(|declaration| declaration.value.as_text().to_owned())
            .collect()
    }

    #[test]
    fn sorts_by_origin_specificity_and_position() -> Result<()> {
        let dom = document()?;
        let user_agent = rule_set("div { color: ua }");
        let author = rule_set(
            "#main { color: id } .a { color: class1 } div { color: tag } .b { color: class2 }",
        );
        let mut collector = ElementRuleCollector::new(&dom, NodeKey(1));
        collector.collect_matching_rules(&MatchRequest::new(&author, CascadeOrigin::Author, 1));
        collector.collect_matching_rules(&MatchRequest::new(
            &user_agent,
            CascadeOrigin::UserAgent,
            0,
        ));
        collector.add_element_style_properties(dom.inline_style(NodeKey(1)));
        collector.sort_and_transfer_matched_rules();

        assert_eq!(
            colors(collector.match_result()),
            vec!["ua", "tag", "class1", "class2", "id", "black"]
        );
        let last = collector.matched_rules().last();
        assert!(last.is_some_and(|rule| rule.is_inline_style() && rule.selector().is_none()));
        assert_eq!(collector.stats().matches, 5);
        Ok(())
    }

    #[test]
    fn link_bucket_is_searched() -> Result<()> {
        let dom = document()?;
        let author = rule_set(":link { color: blue } :focus { color: red }");
        let mut collector = ElementRuleCollector::new(&dom, NodeKey(2));
        collector.collect_matching_rules(&MatchRequest::new(&author, CascadeOrigin::Author, 0));
        collector.sort_and_transfer_matched_rules();
        assert_eq!(colors(collector.match_result()), vec!["blue"]);
        assert!(collector.link_dependent());
        Ok(())
    }

    #[test]
    fn user_agent_rules_skip_link_tracking() -> Result<()> {
        let dom = document()?;
        let user_agent =
            rule_set("div > a:link { color: ua } p a { color: no } a::before { color: no }");
        let mut collector = ElementRuleCollector::new(&dom, NodeKey(2));
        collector.collect_matching_rules(&MatchRequest::new(
            &user_agent,
            CascadeOrigin::UserAgent,
            0,
        ));
        collector.sort_and_transfer_matched_rules();
        assert_eq!(colors(collector.match_result()), vec!["ua"]);
        assert!(!collector.link_dependent());
        assert_eq!(collector.stats().user_agent_checks, 1);

        collector.clear_matched_rules();
        collector.collect_matching_rules(&MatchRequest::new(&user_agent, CascadeOrigin::User, 0));
        collector.sort_and_transfer_matched_rules();
        assert!(collector.link_dependent());
        assert_eq!(collector.stats().user_agent_checks, 0);
        Ok(())
    }

    #[test]
    fn pseudo_element_collection_skips_inline_style() -> Result<()> {
        let dom = document()?;
        let author = rule_set("div::before { content: 'x' } div { color: red }");
        let mut collector =
            ElementRuleCollector::new(&dom, NodeKey(1)).with_pseudo_id(Some(PseudoId::Before));
        collector.collect_matching_rules(&MatchRequest::new(&author, CascadeOrigin::Author, 0));
        collector.add_element_style_properties(dom.inline_style(NodeKey(1)));
        collector.sort_and_transfer_matched_rules();
        assert_eq!(collector.match_result().len(), 1);
        assert!(collector.is_collecting_for_pseudo_element());
        Ok(())
    }

    #[test]
    fn cap_and_empty_rules() -> Result<()> {
        let dom = document()?;
        let mut author = RuleSet::new();
        author.add_rules_from_sheet(
            &StyleSheetContents::parse("div { } div { color: one } div { color: two }"),
            &MediaQueryEvaluator::default(),
            AddRuleFlags::PRESERVE_EMPTY_RULES,
        );
        let request = MatchRequest::new(&author, CascadeOrigin::Author, 0);

        let mut collector = ElementRuleCollector::new(&dom, NodeKey(1)).with_max_rules_per_list(2);
        collector.collect_matching_rules(&request);
        collector.sort_and_transfer_matched_rules();
        assert_eq!(colors(collector.match_result()), vec!["one"]);

        let mut including = ElementRuleCollector::new(&dom, NodeKey(1))
            .with_include_empty_rules(true);
        including.collect_matching_rules(&request);
        including.sort_and_transfer_matched_rules();
        assert_eq!(including.match_result().len(), 3);

        including.clear_matched_rules();
        assert!(including.matched_rules().is_empty());
        assert!(including.match_result().is_empty());
        Ok(())
    }
}
