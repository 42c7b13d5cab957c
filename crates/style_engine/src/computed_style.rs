//! Computed style storage and the cascade builder that fills it.

use css_cascade::{
    CascadeOrigin, CssValue, CustomPropertyDeclaration, PropertyDeclaration, PropertyId,
    StyleBuilder,
};
use css_selectors::PseudoId;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Custom property name (with `--`) to its computed value text.
type CustomPropertyMap = FxHashMap<Box<str>, Arc<str>>;

/// Outer display type, parsed from the computed `display` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    None,
    Block,
    #[default]
    Inline,
    InlineBlock,
    ListItem,
    Flex,
    Grid,
    Table,
    Contents,
}

impl Display {
    /// `None` for keywords this engine does not classify.
    pub fn parse(text: &str) -> Option<Self> {
        let display = match text.trim().to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "block" => Self::Block,
            "inline" => Self::Inline,
            "inline-block" => Self::InlineBlock,
            "list-item" => Self::ListItem,
            "flex" => Self::Flex,
            "grid" => Self::Grid,
            "table" => Self::Table,
            "contents" => Self::Contents,
            _ => return None,
        };
        Some(display)
    }
}

/// One value per known property, as CSS text, plus the custom properties
/// in scope.
///
/// Values are shared with the parent and the initial style through `Arc`,
/// so inheriting a property is a reference count bump. Custom properties
/// always inherit; their map is shared with the parent until a rule sets one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedStyle {
    values: Box<[Arc<str>]>,
    custom_properties: Arc<CustomPropertyMap>,
    is_link: bool,
    is_visited: bool,
    pseudo_id: Option<PseudoId>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self::initial()
    }
}

impl ComputedStyle {
    /// Every property at its initial value.
    pub fn initial() -> Self {
        Self {
            values: PropertyId::ALL
                .iter()
                .map(|property| Arc::from(property.initial_value()))
                .collect(),
            custom_properties: Arc::default(),
            is_link: false,
            is_visited: false,
            pseudo_id: None,
        }
    }

    /// Starting point for a child of `parent`: inherited properties copy the
    /// parent, the rest come from `initial`.
    pub fn inherit_from(parent: Option<&Self>, initial: &Self) -> Self {
        let Some(parent) = parent else {
            return initial.clone();
        };
        let values = PropertyId::ALL
            .iter()
            .map(|property| {
                let source = if property.is_inherited() {
                    parent
                } else {
                    initial
                };
                source.value_arc(*property)
            })
            .collect();
        Self {
            values,
            custom_properties: Arc::clone(&parent.custom_properties),
            is_link: false,
            is_visited: false,
            pseudo_id: None,
        }
    }

    /// Shared value of `property`, falling back to its initial value.
    fn value_arc(&self, property: PropertyId) -> Arc<str> {
        self.values
            .get(property.index())
            .map_or_else(|| Arc::from(property.initial_value()), Arc::clone)
    }

    /// Computed value text of `property`.
    #[inline]
    pub fn get(&self, property: PropertyId) -> &str {
        self.values.get(property.index()).map_or("", |value| &**value)
    }

    /// Store the computed value of `property`.
    #[inline]
    pub fn set(&mut self, property: PropertyId, value: Arc<str>) {
        if let Some(slot) = self.values.get_mut(property.index()) {
            *slot = value;
        }
    }

    /// Lookup by CSS name, for callers holding property names as text.
    /// `--*` names resolve against the custom properties.
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        if name.starts_with("--") {
            return self.custom_property(name);
        }
        PropertyId::from_name(name).map(|property| self.get(property))
    }

    /// Computed value of the custom property `name`, inherited or set.
    pub fn custom_property(&self, name: &str) -> Option<&str> {
        self.custom_properties.get(name).map(|value| &**value)
    }

    /// Every custom property in scope, in no particular order.
    pub fn custom_properties(&self) -> impl Iterator<Item = (&str, &str)> {
        self.custom_properties
            .iter()
            .map(|(name, value)| (&**name, &**value))
    }

    #[inline]
    pub fn custom_property_count(&self) -> usize {
        self.custom_properties.len()
    }

    /// Set or, with `None`, remove the custom property `name`. The map is
    /// copied on first write if it is still shared with the parent.
    pub fn set_custom_property(&mut self, name: &str, value: Option<Arc<str>>) {
        let Some(value) = value else {
            if self.custom_properties.contains_key(name) {
                Arc::make_mut(&mut self.custom_properties).remove(name);
            }
            return;
        };
        Arc::make_mut(&mut self.custom_properties).insert(name.into(), value);
    }

    fn custom_property_arc(&self, name: &str) -> Option<Arc<str>> {
        self.custom_properties.get(name).map(Arc::clone)
    }

    /// Parsed `display` value.
    pub fn display(&self) -> Display {
        Display::parse(self.get(PropertyId::Display)).unwrap_or_default()
    }

    #[inline]
    pub fn color(&self) -> &str {
        self.get(PropertyId::Color)
    }

    /// Link state this style was computed for.
    #[inline]
    pub const fn is_link(&self) -> bool {
        self.is_link
    }

    #[inline]
    pub const fn is_visited(&self) -> bool {
        self.is_visited
    }

    #[inline]
    pub const fn pseudo_id(&self) -> Option<PseudoId> {
        self.pseudo_id
    }

    /// Properties whose value differs from `other`.
    pub fn differing_properties(&self, other: &Self) -> Vec<PropertyId> {
        PropertyId::ALL
            .iter()
            .copied()
            .filter(|property| self.get(*property) != other.get(*property))
            .collect()
    }
}

/// Applies cascade winners on top of an inherited starting style.
pub struct ComputedStyleBuilder<'style> {
    style: ComputedStyle,
    parent: Option<&'style ComputedStyle>,
    initial: &'style ComputedStyle,
}

impl<'style> ComputedStyleBuilder<'style> {
    /// Builder seeded from `parent` for inherited properties and from
    /// `initial` for the rest.
    pub fn new(parent: Option<&'style ComputedStyle>, initial: &'style ComputedStyle) -> Self {
        Self {
            style: ComputedStyle::inherit_from(parent, initial),
            parent,
            initial,
        }
    }

    #[must_use]
    pub fn with_link_state(mut self, is_link: bool, is_visited: bool) -> Self {
        self.style.is_link = is_link;
        self.style.is_visited = is_visited;
        self
    }

    #[must_use]
    pub fn with_pseudo_id(mut self, pseudo_id: Option<PseudoId>) -> Self {
        self.style.pseudo_id = pseudo_id;
        self
    }

    fn inherited_value(&self, property: PropertyId) -> Arc<str> {
        self.parent.unwrap_or(self.initial).value_arc(property)
    }

    fn initial_value(&self, property: PropertyId) -> Arc<str> {
        self.initial.value_arc(property)
    }

    /// Take the built style.
    pub fn finish(self) -> ComputedStyle {
        self.style
    }
}

impl StyleBuilder for ComputedStyleBuilder<'_> {
    fn apply_property(&mut self, declaration: &PropertyDeclaration, _origin: CascadeOrigin) {
        let property = declaration.id;
        let value = match &declaration.value {
            CssValue::Inherit => self.inherited_value(property),
            CssValue::Initial => self.initial_value(property),
            // Per-origin rollback is not modeled; revert behaves as unset.
            CssValue::Unset | CssValue::Revert => {
                if property.is_inherited() {
                    self.inherited_value(property)
                } else {
                    self.initial_value(property)
                }
            }
            CssValue::Specified(text) => Arc::from(&**text),
        };
        self.style.set(property, value);
    }

    fn apply_custom_property(
        &mut self,
        declaration: &CustomPropertyDeclaration,
        _origin: CascadeOrigin,
    ) {
        let name = &*declaration.name;
        let value = match &declaration.value {
            // The initial value of a custom property is the guaranteed-invalid value.
            CssValue::Initial => None,
            CssValue::Inherit | CssValue::Unset | CssValue::Revert => self
                .parent
                .and_then(|parent| parent.custom_property_arc(name)),
            CssValue::Specified(text) => Some(Arc::from(&**text)),
        };
        self.style.set_custom_property(name, value);
    }
}
