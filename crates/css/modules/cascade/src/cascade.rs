//! Two-pass cascade application.
//!
//! Pass one applies normal declarations, pass two applies `!important`
//! declarations on top. Each pass visits `MatchResult` from the highest
//! priority entry down and lets the first declaration seen for a property
//! win, so a property is handed to the builder at most once per pass.
//! Custom properties go through the same passes, gated by name.

use crate::match_result::MatchResult;
use crate::origin::CascadeOrigin;
use crate::properties::PropertyId;
use crate::property_set::{CustomPropertyDeclaration, PropertyDeclaration, StylePropertySet};
use rustc_hash::{FxHashMap, FxHashSet};

/// Receives winning declarations. Implemented by computed style builders.
pub trait StyleBuilder {
    /// Apply one declaration. Called at most once per property and pass.
    fn apply_property(&mut self, declaration: &PropertyDeclaration, origin: CascadeOrigin);

    /// Apply one custom property declaration. Called at most once per name
    /// and pass.
    fn apply_custom_property(
        &mut self,
        declaration: &CustomPropertyDeclaration,
        origin: CascadeOrigin,
    );
}

/// Where a cascade instance is in its `apply` cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CascadeState {
    /// Not inside `apply`; the applied sets may still hold the last run.
    #[default]
    Idle,
    /// Applying normal declarations.
    NormalPass,
    /// Applying `!important` declarations over the normal winners.
    ImportantPass,
}

/// Fixed-size set of property ids.
#[derive(Clone, Debug)]
struct PropertyBitSet {
    words: Vec<u64>,
}

impl PropertyBitSet {
    fn new() -> Self {
        Self {
            words: vec![0; PropertyId::COUNT.div_ceil(64)],
        }
    }

    fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|word| word & (1_u64 << (index % 64)) != 0)
    }

    fn insert(&mut self, index: usize) {
        if index >= PropertyId::COUNT {
            return;
        }
        if let Some(word) = self.words.get_mut(index / 64) {
            *word |= 1_u64 << (index % 64);
        }
    }

    fn clear(&mut self) {
        self.words.fill(0);
    }
}

/// Per-element cascade driver. Cheap to construct; `reset` allows reuse.
#[derive(Clone, Debug)]
pub struct StyleCascade {
    applied_normal: PropertyBitSet,
    applied_important: PropertyBitSet,
    applied_custom_normal: FxHashSet<Box<str>>,
    applied_custom_important: FxHashSet<Box<str>>,
    applying_important: bool,
    state: CascadeState,
}

impl Default for StyleCascade {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleCascade {
    /// Cascade with both passes open and no property applied.
    pub fn new() -> Self {
        Self {
            applied_normal: PropertyBitSet::new(),
            applied_important: PropertyBitSet::new(),
            applied_custom_normal: FxHashSet::default(),
            applied_custom_important: FxHashSet::default(),
            applying_important: false,
            state: CascadeState::Idle,
        }
    }

    /// Run both passes over `match_result`, feeding winners to `builder`.
    pub fn apply<B: StyleBuilder>(&mut self, match_result: &MatchResult, builder: &mut B) {
        self.state = CascadeState::NormalPass;
        self.applying_important = false;
        self.apply_pass(match_result, builder);

        self.state = CascadeState::ImportantPass;
        self.applying_important = true;
        self.apply_pass(match_result, builder);

        self.state = CascadeState::Idle;
    }

    fn apply_pass<B: StyleBuilder>(&mut self, match_result: &MatchResult, builder: &mut B) {
        for entry in match_result.iter().rev() {
            for declaration in entry.properties.iter().rev() {
                if declaration.important != self.applying_important {
                    continue;
                }
                let index = declaration.id.index();
                if index >= PropertyId::COUNT || self.applied_in_current_pass(index) {
                    continue;
                }
                builder.apply_property(declaration, entry.origin);
                self.mark_property_as_applied(declaration.id);
            }
            for declaration in entry.properties.custom_properties().rev() {
                if declaration.important != self.applying_important {
                    continue;
                }
                let applied = if self.applying_important {
                    &mut self.applied_custom_important
                } else {
                    &mut self.applied_custom_normal
                };
                if applied.contains(&*declaration.name) {
                    continue;
                }
                applied.insert(declaration.name.clone());
                builder.apply_custom_property(declaration, entry.origin);
            }
        }
    }

    fn applied_in_current_pass(&self, index: usize) -> bool {
        if self.applying_important {
            self.applied_important.contains(index)
        } else {
            self.applied_normal.contains(index)
        }
    }

    /// True once either pass has applied `id`.
    pub fn has_applied_property(&self, id: PropertyId) -> bool {
        let index = id.index();
        self.applied_normal.contains(index) || self.applied_important.contains(index)
    }

    /// True once either pass has applied the custom property `name`.
    pub fn has_applied_custom_property(&self, name: &str) -> bool {
        self.applied_custom_normal.contains(name) || self.applied_custom_important.contains(name)
    }

    /// Record `id` as won in the current pass.
    pub fn mark_property_as_applied(&mut self, id: PropertyId) {
        if self.applying_important {
            self.applied_important.insert(id.index());
        } else {
            self.applied_normal.insert(id.index());
        }
    }

    /// Current pass, or `Idle` outside `apply`.
    #[inline]
    pub const fn state(&self) -> CascadeState {
        self.state
    }

    /// True while the important pass runs.
    #[inline]
    pub const fn applying_important(&self) -> bool {
        self.applying_important
    }

    /// Clear applied bits and the pass flag for reuse.
    pub fn reset(&mut self) {
        self.applied_normal.clear();
        self.applied_important.clear();
        self.applied_custom_normal.clear();
        self.applied_custom_important.clear();
        self.applying_important = false;
        self.state = CascadeState::Idle;
    }

    /// Winning declarations of `match_result` as one block, in property id
    /// order followed by custom properties in name order, with their
    /// importance kept.
    pub fn build_winning_property_set(&mut self, match_result: &MatchResult) -> StylePropertySet {
        self.reset();
        let mut collector = WinnerCollector {
            winners: vec![None; PropertyId::COUNT],
            custom_winners: FxHashMap::default(),
        };
        self.apply(match_result, &mut collector);
        let mut set = StylePropertySet::new();
        for declaration in collector.winners.into_iter().flatten() {
            set.push(declaration);
        }
        let mut custom: Vec<CustomPropertyDeclaration> =
            collector.custom_winners.into_values().collect();
        custom.sort_unstable_by(|left, right| left.name.cmp(&right.name));
        for declaration in custom {
            set.push_custom(declaration);
        }
        set
    }
}

/// Builder that records the last declaration applied per property.
struct WinnerCollector {
    winners: Vec<Option<PropertyDeclaration>>,
    custom_winners: FxHashMap<Box<str>, CustomPropertyDeclaration>,
}

impl StyleBuilder for WinnerCollector {
    fn apply_property(&mut self, declaration: &PropertyDeclaration, _origin: CascadeOrigin) {
        if let Some(slot) = self.winners.get_mut(declaration.id.index()) {
            *slot = Some(declaration.clone());
        }
    }

    fn apply_custom_property(
        &mut self,
        declaration: &CustomPropertyDeclaration,
        _origin: CascadeOrigin,
    ) {
        self.custom_winners
            .insert(declaration.name.clone(), declaration.clone());
    }
}
