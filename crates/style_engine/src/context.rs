//! Stylesheets, their indexed rule sets and the media environment one
//! style resolution runs against.
//!
//! A context is immutable once built. Changing sheets or media values
//! produces a new context, so a resolver can keep borrowing the old one
//! until it switches over.

use crate::computed_style::ComputedStyle;
use crate::config::StyleEngineConfig;
use crate::element_rule_collector::MatchRequest;
use crate::rule_set::{AddRuleFlags, RuleSet};
use crate::stylesheet::StyleSheetContents;
use crate::ua_stylesheet::USER_AGENT_STYLE_SHEET;
use css_cascade::CascadeOrigin;
use css_media_queries::{MediaQueryEvaluator, MediaValues};
use log::info;
use std::sync::Arc;
use tracing::info_span;

/// Everything rule matching needs besides the element itself.
#[derive(Debug)]
pub struct StyleEngineContext {
    config: StyleEngineConfig,
    media_values: MediaValues,
    user_agent_sheet: Arc<StyleSheetContents>,
    user_sheets: Vec<Arc<StyleSheetContents>>,
    author_sheets: Vec<Arc<StyleSheetContents>>,
    user_agent_rules: RuleSet,
    user_rules: Vec<RuleSet>,
    author_rules: Vec<RuleSet>,
    initial_style: Arc<ComputedStyle>,
}

impl Default for StyleEngineContext {
    fn default() -> Self {
        Self::new(StyleEngineConfig::default(), MediaValues::default())
    }
}

impl StyleEngineContext {
    /// Context with only the built-in user-agent sheet.
    pub fn new(config: StyleEngineConfig, media_values: MediaValues) -> Self {
        let user_agent_sheet = Arc::new(StyleSheetContents::parse(USER_AGENT_STYLE_SHEET));
        Self::build(
            config,
            media_values,
            user_agent_sheet,
            Vec::new(),
            Vec::new(),
        )
    }

    fn build(
        config: StyleEngineConfig,
        media_values: MediaValues,
        user_agent_sheet: Arc<StyleSheetContents>,
        user_sheets: Vec<Arc<StyleSheetContents>>,
        author_sheets: Vec<Arc<StyleSheetContents>>,
    ) -> Self {
        let _span = info_span!(
            "style.build_context",
            user_sheets = user_sheets.len(),
            author_sheets = author_sheets.len()
        )
        .entered();

        let evaluator = MediaQueryEvaluator::new(media_values);
        let flags = if config.include_empty_rules {
            AddRuleFlags::PRESERVE_EMPTY_RULES
        } else {
            AddRuleFlags::NONE
        };

        let mut user_agent_rules = RuleSet::new();
        user_agent_rules.add_rules_from_sheet(&user_agent_sheet, &evaluator, flags);
        let user_rules = build_origin_rules(&user_sheets, &evaluator, flags);
        let author_rules = build_origin_rules(&author_sheets, &evaluator, flags);

        info!(
            "style context: {} ua, {} user, {} author selectors",
            user_agent_rules.len(),
            user_rules.iter().map(RuleSet::len).sum::<usize>(),
            author_rules.iter().map(RuleSet::len).sum::<usize>()
        );

        Self {
            config,
            media_values,
            user_agent_sheet,
            user_sheets,
            author_sheets,
            user_agent_rules,
            user_rules,
            author_rules,
            initial_style: Arc::new(ComputedStyle::initial()),
        }
    }

    fn rebuilt(
        &self,
        media_values: MediaValues,
        user_sheets: Vec<Arc<StyleSheetContents>>,
        author_sheets: Vec<Arc<StyleSheetContents>>,
    ) -> Self {
        Self::build(
            self.config.clone(),
            media_values,
            Arc::clone(&self.user_agent_sheet),
            user_sheets,
            author_sheets,
        )
    }

    /// Append a user sheet and re-index.
    pub fn add_user_sheet(&mut self, sheet: Arc<StyleSheetContents>) {
        *self = self.with_user_sheet(sheet);
    }

    /// Append an author sheet and re-index. Author sheets share one layer
    /// order, so later sheets see the layers named by earlier ones.
    pub fn add_author_sheet(&mut self, sheet: Arc<StyleSheetContents>) {
        *self = self.with_author_sheet(sheet);
    }

    /// New context with `sheet` appended to the user sheets.
    #[must_use]
    pub fn with_user_sheet(&self, sheet: Arc<StyleSheetContents>) -> Self {
        let mut user_sheets = self.user_sheets.clone();
        user_sheets.push(sheet);
        self.rebuilt(self.media_values, user_sheets, self.author_sheets.clone())
    }

    /// New context with `sheet` appended to the author sheets.
    #[must_use]
    pub fn with_author_sheet(&self, sheet: Arc<StyleSheetContents>) -> Self {
        let mut author_sheets = self.author_sheets.clone();
        author_sheets.push(sheet);
        self.rebuilt(self.media_values, self.user_sheets.clone(), author_sheets)
    }

    /// Same sheets indexed for a different media environment.
    #[must_use]
    pub fn with_media_values(&self, media_values: MediaValues) -> Self {
        self.rebuilt(
            media_values,
            self.user_sheets.clone(),
            self.author_sheets.clone(),
        )
    }

    /// Same user sheets and media with the author sheets replaced.
    #[must_use]
    pub fn with_author_sheets(&self, author_sheets: Vec<Arc<StyleSheetContents>>) -> Self {
        self.rebuilt(self.media_values, self.user_sheets.clone(), author_sheets)
    }

    #[inline]
    pub const fn config(&self) -> &StyleEngineConfig {
        &self.config
    }

    #[inline]
    pub const fn media_values(&self) -> &MediaValues {
        &self.media_values
    }

    #[inline]
    pub fn author_sheets(&self) -> &[Arc<StyleSheetContents>] {
        &self.author_sheets
    }

    #[inline]
    pub fn user_sheets(&self) -> &[Arc<StyleSheetContents>] {
        &self.user_sheets
    }

    /// Rules of the built-in user-agent sheet.
    #[inline]
    pub const fn user_agent_rules(&self) -> &RuleSet {
        &self.user_agent_rules
    }

    /// One rule set per author sheet, in sheet order.
    #[inline]
    pub fn author_rules(&self) -> &[RuleSet] {
        &self.author_rules
    }

    /// One rule set per user sheet, in sheet order.
    #[inline]
    pub fn user_rules(&self) -> &[RuleSet] {
        &self.user_rules
    }

    /// Style every property starts from before inheritance.
    #[inline]
    pub const fn initial_style(&self) -> &Arc<ComputedStyle> {
        &self.initial_style
    }

    /// One request per indexed sheet in cascade order: the user-agent sheet
    /// first, then user sheets, then author sheets. Style sheet indices
    /// increase in that order.
    pub fn match_requests(&self) -> Vec<MatchRequest<'_>> {
        let mut requests =
            Vec::with_capacity(1 + self.user_rules.len() + self.author_rules.len());
        requests.push(MatchRequest::new(
            &self.user_agent_rules,
            CascadeOrigin::UserAgent,
            0,
        ));
        let user = self
            .user_rules
            .iter()
            .map(|rule_set| (rule_set, CascadeOrigin::User));
        let author = self
            .author_rules
            .iter()
            .map(|rule_set| (rule_set, CascadeOrigin::Author));
        for (index, (rule_set, origin)) in user.chain(author).enumerate() {
            requests.push(MatchRequest::new(rule_set, origin, index as u32 + 1));
        }
        requests
    }
}

fn build_origin_rules(
    sheets: &[Arc<StyleSheetContents>],
    evaluator: &MediaQueryEvaluator,
    flags: AddRuleFlags,
) -> Vec<RuleSet> {
    let mut rule_sets = Vec::<RuleSet>::with_capacity(sheets.len());
    for sheet in sheets {
        let layers = rule_sets
            .last()
            .map(|previous| previous.layers().clone())
            .unwrap_or_default();
        let mut rule_set = RuleSet::with_layer_registry(layers);
        rule_set.add_rules_from_sheet(sheet, evaluator, flags);
        rule_sets.push(rule_set);
    }
    rule_sets
}
