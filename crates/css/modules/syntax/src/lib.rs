//! CSS Syntax Module Level 3: stylesheet parsing on top of `cssparser`.
//! Reference: <https://www.w3.org/TR/css-syntax-3/>
//!
//! Produces style rules with raw preludes, plus `@media` and `@layer` blocks
//! with their nested rules. Other at-rules are skipped.

#![forbid(unsafe_code)]

use cssparser::AtRuleParser as CssAtRuleParser;
use cssparser::BasicParseErrorKind;
use cssparser::CowRcStr;
use cssparser::DeclarationParser as CssDeclarationParser;
use cssparser::ParseError;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::ParserState;
use cssparser::QualifiedRuleParser as CssQualifiedRuleParser;
use cssparser::RuleBodyItemParser as CssRuleBodyItemParser;
use cssparser::RuleBodyParser as CssRuleBodyParser;
use cssparser::StyleSheetParser;

/// A single CSS declaration (property: value [!important]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Property name, lowercased unless it is a `--custom` property.
    pub name: String,
    /// Raw value text without the `!important` tail.
    pub value: String,
    /// Set when the value ended in `!important`.
    pub important: bool,
}

/// A style rule with a raw selector prelude.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRule {
    /// Raw prelude text, the selector list.
    pub prelude: String,
    /// Declarations in source order.
    pub declarations: Vec<Declaration>,
}

/// `@media <query> { ... }`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRule {
    /// Raw media query list text.
    pub query: String,
    pub rules: Vec<CssRule>,
}

/// `@layer [name] { ... }`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerBlockRule {
    /// `None` for an anonymous layer.
    pub name: Option<String>,
    pub rules: Vec<CssRule>,
}

/// Rules understood by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CssRule {
    Style(StyleRule),
    Media(MediaRule),
    Layer(LayerBlockRule),
    /// `@layer a, b.c;` declares layer order without content.
    LayerStatement(Vec<String>),
}

/// A parsed stylesheet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stylesheet {
    /// Top-level rules in source order.
    pub rules: Vec<CssRule>,
}

impl Stylesheet {
    /// Number of style rules, including nested ones.
    pub fn style_rule_count(&self) -> usize {
        count_style_rules(&self.rules)
    }
}

fn count_style_rules(rules: &[CssRule]) -> usize {
    rules
        .iter()
        .map(|rule| match rule {
            CssRule::Style(_) => 1,
            CssRule::Media(media) => count_style_rules(&media.rules),
            CssRule::Layer(layer) => count_style_rules(&layer.rules),
            CssRule::LayerStatement(_) => 0,
        })
        .sum()
}

/// Split a trailing `!important` (any case, optional space after `!`) off a
/// value, returning (`value_without_important`, `important_flag`).
pub fn split_important_tail(value: &str) -> (String, bool) {
    let trimmed = value.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if let Some(head) = lowered.strip_suffix("important")
        && let Some(bang) = head.trim_end().strip_suffix('!')
        && let Some(prefix) = trimmed.get(..bang.len())
    {
        return (prefix.trim_end().to_owned(), true);
    }
    (trimmed.to_owned(), false)
}

/// A declaration parser that records property name and its raw value.
struct BodyDeclParser;

impl CssDeclarationParser<'_> for BodyDeclParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'input>(
        &mut self,
        name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
        _decl_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'input, Self::Error>> {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        let (value, important) = split_important_tail(input.slice_from(start));
        // Custom property names are case-sensitive.
        let name = if name.starts_with("--") {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        };
        Ok(Declaration {
            name,
            value,
            important,
        })
    }
}

impl CssAtRuleParser<'_> for BodyDeclParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        _name: CowRcStr<'input>,
        _input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Ok(())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid))
    }

    #[inline]
    fn rule_without_block(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
    ) -> Result<Self::AtRule, Self::Error> {
        Err(())
    }
}

impl CssQualifiedRuleParser<'_> for BodyDeclParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        _prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::QualifiedRule, ParseError<'input, Self::Error>> {
        Err(input.new_error(BasicParseErrorKind::QualifiedRuleInvalid))
    }
}

impl CssRuleBodyItemParser<'_, Declaration, ()> for BodyDeclParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Preludes of the at-rules we keep.
enum AtPrelude {
    Media(String),
    /// Comma separated layer names; empty for an anonymous block.
    Layer(Vec<String>),
}

/// Rule-list parser used at top level and inside grouping rules.
struct RuleListParser;

impl CssAtRuleParser<'_> for RuleListParser {
    type Prelude = AtPrelude;
    type AtRule = CssRule;
    type Error = ();

    fn parse_prelude<'input>(
        &mut self,
        name: CowRcStr<'input>,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        let start = input.position();
        while input.next_including_whitespace_and_comments().is_ok() {}
        let raw = input.slice_from(start).trim();
        if name.eq_ignore_ascii_case("media") {
            return Ok(AtPrelude::Media(raw.to_owned()));
        }
        if name.eq_ignore_ascii_case("layer") {
            let names = raw
                .split(',')
                .map(str::trim)
                .filter(|layer| !layer.is_empty())
                .map(ToOwned::to_owned)
                .collect();
            return Ok(AtPrelude::Layer(names));
        }
        Err(input.new_error(BasicParseErrorKind::AtRuleInvalid(name)))
    }

    fn parse_block<'input>(
        &mut self,
        prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::AtRule, ParseError<'input, Self::Error>> {
        match prelude {
            AtPrelude::Media(query) => Ok(CssRule::Media(MediaRule {
                query,
                rules: parse_rule_list(input),
            })),
            AtPrelude::Layer(mut names) if names.len() <= 1 => Ok(CssRule::Layer(LayerBlockRule {
                name: names.pop(),
                rules: parse_rule_list(input),
            })),
            AtPrelude::Layer(_) => Err(input.new_error(BasicParseErrorKind::AtRuleBodyInvalid)),
        }
    }

    fn rule_without_block(
        &mut self,
        prelude: Self::Prelude,
        _state: &ParserState,
    ) -> Result<Self::AtRule, Self::Error> {
        match prelude {
            AtPrelude::Layer(names) if !names.is_empty() => Ok(CssRule::LayerStatement(names)),
            AtPrelude::Layer(_) | AtPrelude::Media(_) => Err(()),
        }
    }
}

impl CssQualifiedRuleParser<'_> for RuleListParser {
    type Prelude = String;
    type QualifiedRule = CssRule;
    type Error = ();

    #[inline]
    fn parse_prelude<'input>(
        &mut self,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::Prelude, ParseError<'input, Self::Error>> {
        let start = input.state();
        while input.next_including_whitespace_and_comments().is_ok() {}
        Ok(input.slice_from(start.position()).trim().to_owned())
    }

    #[inline]
    fn parse_block<'input>(
        &mut self,
        prelude: Self::Prelude,
        _state: &ParserState,
        input: &mut Parser<'input, '_>,
    ) -> Result<Self::QualifiedRule, ParseError<'input, Self::Error>> {
        Ok(CssRule::Style(StyleRule {
            prelude,
            declarations: parse_declarations_from_block(input),
        }))
    }
}

/// Parse declarations from a rule block using `cssparser` body parser.
fn parse_declarations_from_block(block: &mut Parser) -> Vec<Declaration> {
    let mut body = BodyDeclParser;
    CssRuleBodyParser::new(block, &mut body).flatten().collect()
}

/// Parse the rules inside a grouping rule's block.
fn parse_rule_list(block: &mut Parser) -> Vec<CssRule> {
    let mut nested = RuleListParser;
    StyleSheetParser::new(block, &mut nested).flatten().collect()
}

/// Parse a full stylesheet into a `Stylesheet` using cssparser.
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut top = RuleListParser;
    Stylesheet {
        rules: StyleSheetParser::new(&mut parser, &mut top)
            .flatten()
            .collect(),
    }
}

/// Parse a bare declaration list, as found in a `style` attribute.
pub fn parse_declaration_list(css: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parse_declarations_from_block(&mut parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(rule: &CssRule) -> &StyleRule {
        match rule {
            CssRule::Style(style_rule) => style_rule,
            other => panic!("expected style rule, got {other:?}"),
        }
    }

    #[test]
    fn style_rules_and_important() {
        let sheet = parse_stylesheet("div, p { color: red; margin: 0 !IMPORTANT } .x{}");
        assert_eq!(sheet.rules.len(), 2);
        let first = style(&sheet.rules[0]);
        assert_eq!(first.prelude, "div, p");
        assert_eq!(
            first.declarations,
            vec![
                Declaration {
                    name: "color".into(),
                    value: "red".into(),
                    important: false
                },
                Declaration {
                    name: "margin".into(),
                    value: "0".into(),
                    important: true
                },
            ]
        );
        assert!(style(&sheet.rules[1]).declarations.is_empty());
    }

    #[test]
    fn media_and_layer_blocks() {
        let sheet = parse_stylesheet(
            "@layer base, theme; @media (min-width: 600px) { p { color: blue } } \
             @layer theme { a { color: green } @media print { b { color: black } } } \
             @font-face { font-family: x } @layer { i { color: gray } }",
        );
        assert_eq!(sheet.rules.len(), 4);
        assert_eq!(
            sheet.rules[0],
            CssRule::LayerStatement(vec!["base".into(), "theme".into()])
        );
        let CssRule::Media(media) = &sheet.rules[1] else {
            panic!("expected @media");
        };
        assert_eq!(media.query, "(min-width: 600px)");
        assert_eq!(style(&media.rules[0]).prelude, "p");
        let CssRule::Layer(layer) = &sheet.rules[2] else {
            panic!("expected @layer block");
        };
        assert_eq!(layer.name.as_deref(), Some("theme"));
        assert_eq!(layer.rules.len(), 2);
        let CssRule::Layer(anonymous) = &sheet.rules[3] else {
            panic!("expected anonymous @layer");
        };
        assert_eq!(anonymous.name, None);
        assert_eq!(sheet.style_rule_count(), 4);
    }

    #[test]
    fn important_tail_variants() {
        assert_eq!(split_important_tail(" red ! important "), ("red".into(), true));
        assert_eq!(split_important_tail("red!important"), ("red".into(), true));
        assert_eq!(split_important_tail("important"), ("important".into(), false));
        assert_eq!(split_important_tail("blue"), ("blue".into(), false));
    }

    #[test]
    fn declaration_list() {
        let declarations = parse_declaration_list("color: red; ; bogus; Width: 10px !important");
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[1].name, "width");
        assert!(declarations[1].important);
    }

    #[test]
    fn custom_property_names_keep_case() {
        let declarations = parse_declaration_list("--Brand: Blue; COLOR: var(--Brand)");
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].name, "--Brand");
        assert_eq!(declarations[0].value, "Blue");
        assert_eq!(declarations[1].name, "color");
    }
}
