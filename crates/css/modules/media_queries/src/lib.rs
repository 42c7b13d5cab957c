//! Media Queries Level 4: parsing and evaluation of a practical subset.
//! Reference: <https://drafts.csswg.org/mediaqueries-4/>
//!
//! Supports media types, `not`/`only`, `and` chains of plain feature tests
//! and the features `width`, `height` (with `min-`/`max-` prefixes),
//! `orientation` and `prefers-color-scheme`. A query that cannot be parsed
//! or names an unknown feature never matches.

#![forbid(unsafe_code)]

use cssparser::{ParseError, Parser, ParserInput, Token};
use log::debug;

/// Pixels per `em` and `rem` when no font context exists.
const DEFAULT_FONT_SIZE_PX: f32 = 16.0;

/// Reference: <https://drafts.csswg.org/mediaqueries-4/#media-types>
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MediaType {
    #[default]
    All,
    Screen,
    Print,
    /// A media type this engine never renders to.
    Unknown,
}

impl MediaType {
    fn from_ident(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "all" => Self::All,
            "screen" => Self::Screen,
            "print" => Self::Print,
            _ => Self::Unknown,
        }
    }
}

/// Value of `prefers-color-scheme`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

/// Environment a media query is evaluated against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaValues {
    /// Medium being rendered to.
    pub media_type: MediaType,
    /// In CSS pixels.
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// User preference for light or dark.
    pub color_scheme: ColorScheme,
}

impl Default for MediaValues {
    fn default() -> Self {
        Self {
            media_type: MediaType::Screen,
            viewport_width: 1024.0,
            viewport_height: 768.0,
            color_scheme: ColorScheme::Light,
        }
    }
}

impl MediaValues {
    /// Screen media with the given viewport size.
    #[inline]
    #[must_use]
    pub fn screen(viewport_width: f32, viewport_height: f32) -> Self {
        Self {
            viewport_width,
            viewport_height,
            ..Self::default()
        }
    }
}

/// Leading `only` or `not` of a media query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Qualifier {
    Only,
    Not,
}

/// Range prefix of a feature name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Range {
    Min,
    Max,
    Exact,
}

/// A single `(feature: value)` test.
#[derive(Clone, Debug, PartialEq)]
pub enum MediaFeature {
    Width(Range, f32),
    Height(Range, f32),
    Orientation { portrait: bool },
    PrefersColorScheme(ColorScheme),
}

impl MediaFeature {
    fn matches(&self, values: &MediaValues) -> bool {
        match *self {
            Self::Width(range, length) => compare(range, values.viewport_width, length),
            Self::Height(range, length) => compare(range, values.viewport_height, length),
            Self::Orientation { portrait } => {
                (values.viewport_height >= values.viewport_width) == portrait
            }
            Self::PrefersColorScheme(scheme) => values.color_scheme == scheme,
        }
    }
}

fn compare(range: Range, actual: f32, expected: f32) -> bool {
    match range {
        Range::Min => actual >= expected,
        Range::Max => actual <= expected,
        Range::Exact => (actual - expected).abs() < f32::EPSILON,
    }
}

/// One comma separated member of a media query list.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaQuery {
    pub qualifier: Option<Qualifier>,
    pub media_type: MediaType,
    /// Conditions joined by `and`; all must hold.
    pub features: Vec<MediaFeature>,
}

impl MediaQuery {
    /// The query an invalid member turns into: `not all`.
    fn never() -> Self {
        Self {
            qualifier: Some(Qualifier::Not),
            media_type: MediaType::All,
            features: Vec::new(),
        }
    }

    fn parse<'input>(input: &mut Parser<'input, '_>) -> Result<Self, ParseError<'input, ()>> {
        let mut qualifier = None;
        let mut media_type = MediaType::All;
        let mut features = Vec::new();
        let mut expect_feature = true;
        if let Ok(ident) = input.try_parse(|parser| parser.expect_ident_cloned()) {
            if ident.eq_ignore_ascii_case("not") {
                qualifier = Some(Qualifier::Not);
            } else if ident.eq_ignore_ascii_case("only") {
                qualifier = Some(Qualifier::Only);
            } else {
                media_type = MediaType::from_ident(&ident);
            }
            if qualifier.is_some() {
                media_type = MediaType::from_ident(&input.expect_ident_cloned()?);
            }
            expect_feature = false;
        }
        loop {
            if !expect_feature {
                if input.is_exhausted() {
                    break;
                }
                input.expect_ident_matching("and")?;
            }
            features.push(parse_feature(input)?);
            expect_feature = false;
        }
        Ok(Self {
            qualifier,
            media_type,
            features,
        })
    }

    fn matches(&self, values: &MediaValues) -> bool {
        let type_matches = match self.media_type {
            MediaType::All => true,
            MediaType::Unknown => false,
            media_type => media_type == values.media_type,
        };
        let result = type_matches && self.features.iter().all(|feature| feature.matches(values));
        if self.qualifier == Some(Qualifier::Not) {
            !result
        } else {
            result
        }
    }
}

/// Parse `( name [: value] )`.
fn parse_feature<'input>(
    input: &mut Parser<'input, '_>,
) -> Result<MediaFeature, ParseError<'input, ()>> {
    input.expect_parenthesis_block()?;
    input.parse_nested_block(|block| {
        let location = block.current_source_location();
        let name = block.expect_ident_cloned()?.to_ascii_lowercase();
        block.expect_colon()?;
        let (range, base) = if let Some(rest) = name.strip_prefix("min-") {
            (Range::Min, rest)
        } else if let Some(rest) = name.strip_prefix("max-") {
            (Range::Max, rest)
        } else {
            (Range::Exact, name.as_str())
        };
        match base {
            "width" => Ok(MediaFeature::Width(range, parse_length(block)?)),
            "height" => Ok(MediaFeature::Height(range, parse_length(block)?)),
            "orientation" if range == Range::Exact => {
                let value = block.expect_ident_cloned()?;
                Ok(MediaFeature::Orientation {
                    portrait: value.eq_ignore_ascii_case("portrait"),
                })
            }
            "prefers-color-scheme" if range == Range::Exact => {
                let value = block.expect_ident_cloned()?;
                let scheme = if value.eq_ignore_ascii_case("dark") {
                    ColorScheme::Dark
                } else {
                    ColorScheme::Light
                };
                Ok(MediaFeature::PrefersColorScheme(scheme))
            }
            _ => Err(location.new_custom_error(())),
        }
    })
}

/// Length in CSS pixels from `px`, `em`, `rem` or unitless zero.
fn parse_length<'input>(input: &mut Parser<'input, '_>) -> Result<f32, ParseError<'input, ()>> {
    let location = input.current_source_location();
    match *input.next()? {
        Token::Dimension {
            value, ref unit, ..
        } => {
            if unit.eq_ignore_ascii_case("px") {
                Ok(value)
            } else if unit.eq_ignore_ascii_case("em") || unit.eq_ignore_ascii_case("rem") {
                Ok(value * DEFAULT_FONT_SIZE_PX)
            } else {
                Err(location.new_custom_error(()))
            }
        }
        Token::Number { value, .. } if value.abs() < f32::EPSILON => Ok(0.0),
        _ => Err(location.new_custom_error(())),
    }
}

/// Comma separated media queries. Empty matches everything.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MediaQueryList {
    /// Members; the list matches if any member does.
    pub queries: Vec<MediaQuery>,
}

impl MediaQueryList {
    /// Parse query list text. Invalid members become `not all`.
    pub fn parse(text: &str) -> Self {
        if text.trim().is_empty() {
            return Self::default();
        }
        let mut input = ParserInput::new(text);
        let mut parser = Parser::new(&mut input);
        let parsed = parser.parse_comma_separated::<_, _, ()>(|member| {
            let result = member.try_parse(MediaQuery::parse);
            Ok(result.unwrap_or_else(|_| {
                while member.next().is_ok() {}
                debug!("invalid media query in {text:?}");
                MediaQuery::never()
            }))
        });
        Self {
            queries: parsed.unwrap_or_else(|_| vec![MediaQuery::never()]),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Evaluates media query lists against fixed [`MediaValues`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MediaQueryEvaluator {
    values: MediaValues,
}

impl MediaQueryEvaluator {
    /// Evaluator for the environment `values`.
    #[inline]
    pub const fn new(values: MediaValues) -> Self {
        Self { values }
    }

    #[inline]
    pub const fn values(&self) -> &MediaValues {
        &self.values
    }

    /// True if any query in the list matches.
    pub fn eval(&self, list: &MediaQueryList) -> bool {
        list.is_empty() || list.queries.iter().any(|query| query.matches(&self.values))
    }

    /// Parse and evaluate in one step.
    pub fn eval_text(&self, text: &str) -> bool {
        self.eval(&MediaQueryList::parse(text))
    }
}
