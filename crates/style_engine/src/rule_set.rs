//! Rule sets: every selector of a sheet, bucketed by its rightmost compound
//! so that collection only visits rules that can plausibly match.
//!
//! `RuleData` lives in one arena per set and buckets hold `u32` indices into
//! it. A set is built once and then shared read-only.

use crate::stylesheet::{SheetRule, StyleRule, StyleSheetContents};
use css_cascade::{LayerOrder, StylePropertySet};
use css_media_queries::MediaQueryEvaluator;
use css_selectors::{ComplexSelector, SimpleSelector, Specificity};
use log::{debug, trace};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// One selector of one style rule, with everything the collector needs
/// precomputed.
#[derive(Clone, Debug)]
pub struct RuleData {
    rule: Arc<StyleRule>,
    selector_index: u32,
    position: u32,
    specificity: Specificity,
    rightmost_tag: Option<Box<str>>,
    layer_order: LayerOrder,
}

impl RuleData {
    /// `None` when `selector_index` is out of range for `rule`.
    pub fn new(
        rule: Arc<StyleRule>,
        selector_index: u32,
        position: u32,
        layer_order: LayerOrder,
    ) -> Option<Self> {
        let selector = rule.selectors().get(selector_index as usize)?;
        let specificity = selector.specificity();
        let rightmost_tag = selector
            .rightmost_compound()
            .iter()
            .find_map(|component| match &component.simple {
                SimpleSelector::Tag(name) => Some(name.to_ascii_lowercase().into_boxed_str()),
                _ => None,
            });
        Some(Self {
            rule,
            selector_index,
            position,
            specificity,
            rightmost_tag,
            layer_order,
        })
    }

    /// Style rule this entry was built from.
    #[inline]
    pub const fn rule(&self) -> &Arc<StyleRule> {
        &self.rule
    }

    /// The one selector of the rule's list this entry indexes.
    #[inline]
    pub fn selector(&self) -> Option<&ComplexSelector> {
        self.rule.selectors().get(self.selector_index as usize)
    }

    #[inline]
    pub fn properties(&self) -> &Arc<StylePropertySet> {
        self.rule.properties()
    }

    /// Index of the selector within the rule's selector list.
    #[inline]
    pub const fn selector_index(&self) -> u32 {
        self.selector_index
    }

    /// Insertion position within the owning set.
    #[inline]
    pub const fn position(&self) -> u32 {
        self.position
    }

    #[inline]
    pub const fn specificity(&self) -> Specificity {
        self.specificity
    }

    #[inline]
    pub const fn has_rightmost_type(&self) -> bool {
        self.rightmost_tag.is_some()
    }

    #[inline]
    pub fn rightmost_tag(&self) -> Option<&str> {
        self.rightmost_tag.as_deref()
    }

    /// Layer the rule was declared in.
    #[inline]
    pub const fn layer_order(&self) -> LayerOrder {
        self.layer_order
    }
}

/// Options for [`RuleSet::add_rules_from_sheet`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddRuleFlags(u8);

impl AddRuleFlags {
    /// Default: empty rules are dropped.
    pub const NONE: Self = Self(0);
    /// Keep style rules whose declaration block is empty.
    pub const PRESERVE_EMPTY_RULES: Self = Self(1);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Bucket a selector is filed under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BucketKey {
    Id(Box<str>),
    Class(Box<str>),
    Tag(Box<str>),
    LinkPseudoClass,
    FocusPseudoClass,
    Universal,
}

/// Pick the most selective bucket for `selector` from its rightmost
/// compound: id, then class, then tag, then link and focus pseudo-classes,
/// then universal.
pub fn find_best_bucket(selector: &ComplexSelector) -> BucketKey {
    let mut class = None;
    let mut tag = None;
    let mut link = false;
    let mut focus = false;
    for component in selector.rightmost_compound() {
        match &component.simple {
            SimpleSelector::Id(id) => return BucketKey::Id(id.clone()),
            SimpleSelector::Class(name) if class.is_none() => class = Some(name),
            SimpleSelector::Tag(name) if tag.is_none() => tag = Some(name),
            SimpleSelector::PseudoClass(pseudo) if pseudo.is_link_family() => link = true,
            SimpleSelector::PseudoClass(pseudo) if pseudo.is_focus_family() => focus = true,
            _ => {}
        }
    }
    if let Some(name) = class {
        BucketKey::Class(name.clone())
    } else if let Some(name) = tag {
        BucketKey::Tag(name.to_ascii_lowercase().into_boxed_str())
    } else if link {
        BucketKey::LinkPseudoClass
    } else if focus {
        BucketKey::FocusPseudoClass
    } else {
        BucketKey::Universal
    }
}

/// Borrowed view of one bucket.
#[derive(Clone, Copy, Debug)]
pub struct RuleBucket<'set> {
    arena: &'set [RuleData],
    indices: &'set [u32],
}

impl<'set> RuleBucket<'set> {
    #[inline]
    const fn empty(arena: &'set [RuleData]) -> Self {
        Self { arena, indices: &[] }
    }

    #[inline]
    pub const fn len(self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.indices.is_empty()
    }

    /// Arena indices in insertion order.
    #[inline]
    pub const fn indices(self) -> &'set [u32] {
        self.indices
    }

    #[inline]
    pub fn get(self, offset: usize) -> Option<&'set RuleData> {
        let index = *self.indices.get(offset)?;
        self.arena.get(index as usize)
    }

    pub fn iter(self) -> impl Iterator<Item = &'set RuleData> {
        let arena = self.arena;
        self.indices
            .iter()
            .filter_map(move |&index| arena.get(index as usize))
    }
}

/// Cascade layer tree: every layer name with its [`LayerOrder`].
///
/// A layer's slot among its siblings is fixed the first time it is
/// declared, and nested layers order before their parent's own rules.
#[derive(Clone, Debug, Default)]
pub struct LayerRegistry {
    /// Fully qualified, dotted layer name to its order.
    orders: FxHashMap<Box<str>, LayerOrder>,
    /// Next sibling index under each parent; the implicit outer layer is
    /// the parent of top-level layers.
    next_child: FxHashMap<LayerOrder, u16>,
    anonymous_count: u32,
}

impl LayerRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Order of an already registered dotted name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<LayerOrder> {
        self.orders.get(name).copied()
    }

    /// Order of the dotted name `name`, registering it and any missing
    /// ancestor (`outer` for `outer.inner`) on first sight.
    pub fn register(&mut self, name: &str) -> LayerOrder {
        if let Some(order) = self.get(name) {
            return order;
        }
        let parent = match name.rsplit_once('.') {
            Some((parent, _)) => self.register(parent),
            None => LayerOrder::IMPLICIT_OUTER,
        };
        let order = self.allocate(parent, name);
        self.orders.insert(name.into(), order);
        order
    }

    /// Register a fresh anonymous layer nested in `parent` (a name returned
    /// by an earlier registration) and return its generated name and order.
    pub fn register_anonymous(&mut self, parent: Option<&str>) -> (String, LayerOrder) {
        self.anonymous_count = self.anonymous_count.saturating_add(1);
        let local = format!("#anonymous-{}", self.anonymous_count);
        let name = parent.map_or_else(|| local.clone(), |outer| format!("{outer}.{local}"));
        let parent_order = parent
            .and_then(|outer| self.get(outer))
            .unwrap_or(LayerOrder::IMPLICIT_OUTER);
        let order = self.allocate(parent_order, &name);
        self.orders.insert(name.as_str().into(), order);
        (name, order)
    }

    /// Number of layers registered, named and anonymous.
    #[inline]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    fn allocate(&mut self, parent: LayerOrder, name: &str) -> LayerOrder {
        let next = self.next_child.entry(parent).or_insert(0);
        let index = *next;
        *next = next.saturating_add(1).min(LayerOrder::MAX_SIBLING_INDEX);
        parent.child(index).unwrap_or_else(|| {
            debug!(
                "layer {name:?} nests deeper than {} levels; its rules join the enclosing layer",
                LayerOrder::MAX_DEPTH
            );
            parent
        })
    }
}

/// Layer the rules being added belong to.
#[derive(Clone, Copy)]
struct LayerScope<'name> {
    name: &'name str,
    order: LayerOrder,
}

fn qualified_layer_name(parent: Option<LayerScope<'_>>, name: &str) -> String {
    parent.map_or_else(
        || name.to_owned(),
        |scope| format!("{}.{name}", scope.name),
    )
}

/// Indexed rules of one or more stylesheets of the same origin.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<RuleData>,
    id_rules: FxHashMap<Box<str>, Vec<u32>>,
    class_rules: FxHashMap<Box<str>, Vec<u32>>,
    tag_rules: FxHashMap<Box<str>, Vec<u32>>,
    universal_rules: Vec<u32>,
    link_pseudo_class_rules: Vec<u32>,
    focus_pseudo_class_rules: Vec<u32>,
    style_rule_count: u32,
    layers: LayerRegistry,
}

impl RuleSet {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from layer orders already registered by earlier sheets of the
    /// same origin, so layer order stays global across sheets.
    pub fn with_layer_registry(layers: LayerRegistry) -> Self {
        Self {
            layers,
            ..Self::default()
        }
    }

    /// Add every style rule of `sheet` whose enclosing `@media` blocks match
    /// `evaluator`.
    pub fn add_rules_from_sheet(
        &mut self,
        sheet: &StyleSheetContents,
        evaluator: &MediaQueryEvaluator,
        flags: AddRuleFlags,
    ) {
        let before = self.rules.len();
        self.add_child_rules(sheet.child_rules(), evaluator, flags, None);
        self.compact();
        debug!(
            "rule set: {} selectors added, {} total, {} layers",
            self.rules.len().saturating_sub(before),
            self.rules.len(),
            self.layers.len()
        );
    }

    /// Add a single unlayered style rule.
    pub fn add_style_rule(&mut self, rule: &Arc<StyleRule>, flags: AddRuleFlags) {
        self.add_style_rule_in_layer(rule, flags, LayerOrder::IMPLICIT_OUTER);
    }

    fn add_child_rules(
        &mut self,
        rules: &[SheetRule],
        evaluator: &MediaQueryEvaluator,
        flags: AddRuleFlags,
        layer: Option<LayerScope<'_>>,
    ) {
        for rule in rules {
            match rule {
                SheetRule::Style(style) => {
                    let order = layer.map_or(LayerOrder::IMPLICIT_OUTER, |scope| scope.order);
                    self.add_style_rule_in_layer(style, flags, order);
                }
                SheetRule::Media {
                    queries,
                    rules: nested,
                } => {
                    if evaluator.eval(queries) {
                        self.add_child_rules(nested, evaluator, flags, layer);
                    }
                }
                SheetRule::Layer {
                    name,
                    rules: nested,
                } => {
                    let (path, order) = if let Some(name) = name {
                        let path = qualified_layer_name(layer, name);
                        let order = self.layers.register(&path);
                        (path, order)
                    } else {
                        self.layers
                            .register_anonymous(layer.map(|scope| scope.name))
                    };
                    let scope = LayerScope {
                        name: &path,
                        order,
                    };
                    self.add_child_rules(nested, evaluator, flags, Some(scope));
                }
                SheetRule::LayerStatement(names) => {
                    for name in names {
                        self.layers.register(&qualified_layer_name(layer, name));
                    }
                }
            }
        }
    }

    fn add_style_rule_in_layer(
        &mut self,
        rule: &Arc<StyleRule>,
        flags: AddRuleFlags,
        layer_order: LayerOrder,
    ) {
        if rule.selectors().is_empty() {
            return;
        }
        if rule.properties().is_empty() && !flags.contains(AddRuleFlags::PRESERVE_EMPTY_RULES) {
            trace!(
                "skipping empty rule {}",
                rule.selectors()
                    .iter()
                    .map(ComplexSelector::source)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return;
        }
        self.style_rule_count = self.style_rule_count.saturating_add(1);
        for (selector_index, selector) in rule.selectors().iter().enumerate() {
            let position = self.rules.len() as u32;
            let Some(data) =
                RuleData::new(Arc::clone(rule), selector_index as u32, position, layer_order)
            else {
                continue;
            };
            let bucket = find_best_bucket(selector);
            self.rules.push(data);
            match bucket {
                BucketKey::Id(key) => self.id_rules.entry(key).or_default().push(position),
                BucketKey::Class(key) => self.class_rules.entry(key).or_default().push(position),
                BucketKey::Tag(key) => self.tag_rules.entry(key).or_default().push(position),
                BucketKey::LinkPseudoClass => self.link_pseudo_class_rules.push(position),
                BucketKey::FocusPseudoClass => self.focus_pseudo_class_rules.push(position),
                BucketKey::Universal => self.universal_rules.push(position),
            }
        }
    }

    /// Release spare capacity after building.
    pub fn compact(&mut self) {
        self.rules.shrink_to_fit();
        for map in [
            &mut self.id_rules,
            &mut self.class_rules,
            &mut self.tag_rules,
        ] {
            map.shrink_to_fit();
            for indices in map.values_mut() {
                indices.shrink_to_fit();
            }
        }
        self.universal_rules.shrink_to_fit();
        self.link_pseudo_class_rules.shrink_to_fit();
        self.focus_pseudo_class_rules.shrink_to_fit();
    }

    fn bucket<'set>(&'set self, indices: Option<&'set Vec<u32>>) -> RuleBucket<'set> {
        indices.map_or(RuleBucket::empty(&self.rules), |indices| RuleBucket {
            arena: &self.rules,
            indices,
        })
    }

    /// Rules whose rightmost compound has `#id`.
    #[inline]
    pub fn id_rules(&self, id: &str) -> RuleBucket<'_> {
        self.bucket(self.id_rules.get(id))
    }

    /// Rules whose rightmost compound has `.class`.
    #[inline]
    pub fn class_rules(&self, class: &str) -> RuleBucket<'_> {
        self.bucket(self.class_rules.get(class))
    }

    /// Tag bucket lookup. Keys are lowercase, but a caller passing another
    /// case still finds its rules.
    pub fn tag_rules(&self, tag: &str) -> RuleBucket<'_> {
        if let Some(indices) = self.tag_rules.get(tag) {
            return self.bucket(Some(indices));
        }
        if tag.bytes().any(|byte| byte.is_ascii_uppercase())
            && let Some(indices) = self.tag_rules.get(tag.to_ascii_lowercase().as_str())
        {
            return self.bucket(Some(indices));
        }
        if tag.bytes().any(|byte| byte.is_ascii_lowercase())
            && let Some(indices) = self.tag_rules.get(tag.to_ascii_uppercase().as_str())
        {
            return self.bucket(Some(indices));
        }
        self.bucket(
            self.tag_rules
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(tag))
                .map(|(_, indices)| indices),
        )
    }

    /// Rules with no better key.
    #[inline]
    pub fn universal_rules(&self) -> RuleBucket<'_> {
        self.bucket(Some(&self.universal_rules))
    }

    /// Rules keyed on `:link`, `:visited` or `:any-link`.
    #[inline]
    pub fn link_pseudo_class_rules(&self) -> RuleBucket<'_> {
        self.bucket(Some(&self.link_pseudo_class_rules))
    }

    /// Rules keyed on `:focus` or `:focus-visible`.
    #[inline]
    pub fn focus_pseudo_class_rules(&self) -> RuleBucket<'_> {
        self.bucket(Some(&self.focus_pseudo_class_rules))
    }

    #[inline]
    pub fn rule_data(&self, index: u32) -> Option<&RuleData> {
        self.rules.get(index as usize)
    }

    /// Number of style rules added. A rule with several selectors counts
    /// once.
    #[inline]
    pub const fn rule_count(&self) -> u32 {
        self.style_rule_count
    }

    /// Number of `RuleData` entries, one per selector.
    #[inline]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Layers seen so far, including those inherited from earlier sheets.
    #[inline]
    pub const fn layers(&self) -> &LayerRegistry {
        &self.layers
    }
}
