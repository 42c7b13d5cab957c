//! Parsed stylesheet contents with selectors and declaration blocks ready
//! for rule-set construction.

use css_cascade::StylePropertySet;
use css_media_queries::MediaQueryList;
use css_selectors::{SelectorList, parse_selector_list};
use css_syntax::{CssRule, Stylesheet, parse_stylesheet};
use log::debug;
use std::sync::Arc;

/// A style rule: a selector list sharing one declaration block.
#[derive(Debug)]
pub struct StyleRule {
    selectors: SelectorList,
    properties: Arc<StylePropertySet>,
}

impl StyleRule {
    #[inline]
    pub const fn new(selectors: SelectorList, properties: Arc<StylePropertySet>) -> Self {
        Self {
            selectors,
            properties,
        }
    }

    /// Selectors the rule applies to.
    #[inline]
    pub const fn selectors(&self) -> &SelectorList {
        &self.selectors
    }

    #[inline]
    pub const fn properties(&self) -> &Arc<StylePropertySet> {
        &self.properties
    }
}

/// Child rule of a sheet or of a grouping rule.
#[derive(Debug)]
pub enum SheetRule {
    Style(Arc<StyleRule>),
    Media {
        queries: MediaQueryList,
        rules: Vec<SheetRule>,
    },
    /// `@layer [name] { ... }`; `None` is an anonymous layer.
    Layer {
        name: Option<String>,
        rules: Vec<SheetRule>,
    },
    /// `@layer a, b;`
    LayerStatement(Vec<String>),
}

/// Rules of one stylesheet after selector and declaration parsing.
#[derive(Debug, Default)]
pub struct StyleSheetContents {
    rules: Vec<SheetRule>,
}

impl StyleSheetContents {
    /// Parse CSS text. Rules with an invalid selector list are dropped.
    pub fn parse(text: &str) -> Self {
        Self::from_stylesheet(&parse_stylesheet(text))
    }

    /// Build the rule tree from a parsed stylesheet. Rules whose selectors do
    /// not parse are dropped.
    pub fn from_stylesheet(sheet: &Stylesheet) -> Self {
        Self {
            rules: convert_rules(&sheet.rules),
        }
    }

    #[inline]
    pub fn child_rules(&self) -> &[SheetRule] {
        &self.rules
    }

    /// Number of style rules, including ones nested in grouping rules.
    pub fn style_rule_count(&self) -> usize {
        count_style_rules(&self.rules)
    }
}

fn convert_rules(rules: &[CssRule]) -> Vec<SheetRule> {
    let mut out = Vec::with_capacity(rules.len());
    for rule in rules {
        match rule {
            CssRule::Style(style) => {
                let Some(selectors) = parse_selector_list(&style.prelude) else {
                    debug!("dropping rule with invalid selector {:?}", style.prelude);
                    continue;
                };
                let properties =
                    StylePropertySet::from_declarations(style.declarations.iter().map(
                        |declaration| {
                            (
                                declaration.name.as_str(),
                                declaration.value.as_str(),
                                declaration.important,
                            )
                        },
                    ));
                out.push(SheetRule::Style(Arc::new(StyleRule::new(
                    selectors,
                    Arc::new(properties),
                ))));
            }
            CssRule::Media(media) => out.push(SheetRule::Media {
                queries: MediaQueryList::parse(&media.query),
                rules: convert_rules(&media.rules),
            }),
            CssRule::Layer(layer) => out.push(SheetRule::Layer {
                name: layer.name.clone(),
                rules: convert_rules(&layer.rules),
            }),
            CssRule::LayerStatement(names) => out.push(SheetRule::LayerStatement(names.clone())),
        }
    }
    out
}

fn count_style_rules(rules: &[SheetRule]) -> usize {
    rules
        .iter()
        .map(|rule| match rule {
            SheetRule::Style(_) => 1,
            SheetRule::Media { rules, .. } | SheetRule::Layer { rules, .. } => {
                count_style_rules(rules)
            }
            SheetRule::LayerStatement(_) => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selectors_drop_their_rule() {
        let sheet = StyleSheetContents::parse(
            "div { color: red } p:bogus-state { color: blue } .a, .b { margin: 0 }",
        );
        assert_eq!(sheet.style_rule_count(), 2);
        let second = match sheet.child_rules().get(1) {
            Some(SheetRule::Style(rule)) => Some(rule),
            _ => None,
        };
        assert!(second.is_some_and(|rule| rule.selectors().len() == 2
            && rule.properties().to_css_text() == "margin: 0"));
    }

    #[test]
    fn grouping_rules_nest() {
        let sheet = StyleSheetContents::parse(
            "@layer base; @media (min-width: 10px) { @layer base { a { color: red } } }",
        );
        assert_eq!(sheet.style_rule_count(), 1);
        assert!(matches!(sheet.child_rules()[0], SheetRule::LayerStatement(_)));
        assert!(matches!(sheet.child_rules()[1], SheetRule::Media { .. }));
    }
}
