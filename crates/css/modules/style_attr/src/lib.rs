//! CSS Style Attributes: `style="..."` attribute processing.
//! Reference: <https://www.w3.org/TR/css-style-attr/>

#![forbid(unsafe_code)]

use css_syntax::parse_declaration_list;

/// A single CSS declaration parsed from a style attribute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Property name normalized to ASCII lowercase; `--custom` names keep
    /// their case.
    pub property: String,
    /// Value trimmed of surrounding whitespace, without `!important`.
    pub value: String,
    /// Declared with `!important`.
    pub important: bool,
}

/// Parse the value of a `style` attribute into declarations.
///
/// The attribute body is a declaration list, so this goes through the
/// tokenizer-backed list parser: semicolons inside strings or functions do
/// not split declarations, and a trailing `!important` is recognised.
/// Items without a colon or with an empty value are skipped.
pub fn parse_style_attribute(input: &str) -> Vec<Declaration> {
    if input.trim_matches(is_ascii_whitespace).is_empty() {
        return Vec::new();
    }
    parse_declaration_list(input)
        .into_iter()
        .filter(|declaration| !declaration.value.is_empty())
        .map(|declaration| Declaration {
            property: declaration.name,
            value: declaration.value,
            important: declaration.important,
        })
        .collect()
}

/// ASCII whitespace per CSS Syntax (TAB, LF, FF, CR, SPACE).
const fn is_ascii_whitespace(character: char) -> bool {
    matches!(
        character,
        '\u{0009}' | '\u{000A}' | '\u{000C}' | '\u{000D}' | '\u{0020}'
    )
}
