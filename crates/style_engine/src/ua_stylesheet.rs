//! Built-in user-agent stylesheet.
//! Reference: <https://html.spec.whatwg.org/multipage/rendering.html>

/// Kept small; more tags can be added as layout grows.
pub const USER_AGENT_STYLE_SHEET: &str = r"
html, body, div, p, header, main, footer, section, article, aside, nav,
ul, ol, h1, h2, h3, h4, h5, h6, blockquote, pre, form, fieldset, figure,
address, hr, dl, dt, dd { display: block }
head, script, style, title, meta, link, template { display: none }
[hidden] { display: none }
li { display: list-item }
span, a, b, i, strong, em, code, small, label { display: inline }

body { margin: 8px }
p, blockquote, figure, dl, pre { margin-top: 1em; margin-bottom: 1em }
h1 { font-size: 2em; font-weight: bold; margin-top: 0.67em; margin-bottom: 0.67em }
h2 { font-size: 1.5em; font-weight: bold; margin-top: 0.83em; margin-bottom: 0.83em }
h3 { font-size: 1.17em; font-weight: bold; margin-top: 1em; margin-bottom: 1em }
h4, h5, h6 { font-weight: bold }
ul, ol { padding-left: 40px; margin-top: 1em; margin-bottom: 1em }
ol { list-style-type: decimal }
pre, code { font-family: monospace }
pre { white-space: pre }

b, strong { font-weight: bold }
i, em { font-style: italic }
a:any-link { color: linktext; text-decoration: underline; cursor: pointer }
:focus-visible { outline: auto }
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::StyleSheetContents;

    #[test]
    fn every_rule_parses() {
        let sheet = StyleSheetContents::parse(USER_AGENT_STYLE_SHEET);
        assert_eq!(sheet.style_rule_count(), 19);
    }
}
