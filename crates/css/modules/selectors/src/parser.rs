//! Selector parsing from prelude text.
//! Reference: <https://drafts.csswg.org/selectors-4/#grammar>
//!
//! The parser works over bytes and produces the right-to-left component form
//! used by matching. Any invalid complex selector invalidates the whole list,
//! which lets callers drop the owning style rule.

use crate::model::{
    AttrOperator, AttributeSelector, ComplexSelector, Component, PseudoClass, PseudoId, Relation,
    SelectorList, SimpleSelector,
};
use log::debug;

/// Parse a comma separated selector list. Returns `None` when any member is
/// invalid.
pub fn parse_selector_list(input: &str) -> Option<SelectorList> {
    let mut parser = SelectorParser::new(input);
    let selectors = parser.parse_list(false)?;
    if parser.peek().is_some() {
        debug!("selector list has trailing input: {input:?}");
        return None;
    }
    Some(SelectorList::new(selectors))
}

/// Parse a single complex selector.
pub fn parse_complex_selector(input: &str) -> Option<ComplexSelector> {
    let list = parse_selector_list(input)?;
    if list.len() != 1 {
        return None;
    }
    list.get(0).cloned()
}

/// Byte cursor over selector text.
struct SelectorParser<'src> {
    /// Full source text, used to slice selector sources for diagnostics.
    source: &'src str,
    bytes: &'src [u8],
    index: usize,
}

impl<'src> SelectorParser<'src> {
    #[inline]
    const fn new(source: &'src str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            index: 0,
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    #[inline]
    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.index.saturating_add(offset)).copied()
    }

    #[inline]
    fn advance(&mut self) {
        self.index = self.index.saturating_add(1);
    }

    /// Skip ASCII whitespace, returning whether any was consumed.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.index;
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.advance();
        }
        self.index != start
    }

    /// Parse complex selectors separated by commas. A nested list stops in
    /// front of the closing parenthesis.
    fn parse_list(&mut self, nested: bool) -> Option<Vec<ComplexSelector>> {
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.index;
            let complex = self.parse_complex()?;
            let text = self.source.get(start..self.index).unwrap_or_default();
            selectors.push(ComplexSelector::new(complex, text));
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.advance(),
                Some(b')') if nested => return Some(selectors),
                None if !nested => return Some(selectors),
                _ => return None,
            }
        }
    }

    /// Parse compounds and combinators, returning right-to-left components.
    fn parse_complex(&mut self) -> Option<Vec<Component>> {
        let mut compounds: Vec<Vec<SimpleSelector>> = Vec::new();
        let mut combinators: Vec<Relation> = Vec::new();
        loop {
            compounds.push(self.parse_compound()?);
            let saw_whitespace = self.skip_whitespace();
            let relation = match self.peek() {
                Some(b'>') => Relation::Child,
                Some(b'+') => Relation::DirectAdjacent,
                Some(b'~') => Relation::IndirectAdjacent,
                None | Some(b',' | b')') => break,
                Some(_) if saw_whitespace => Relation::Descendant,
                Some(_) => return None,
            };
            if relation != Relation::Descendant {
                self.advance();
                self.skip_whitespace();
            }
            combinators.push(relation);
        }
        Some(flatten(compounds, &combinators))
    }

    /// Parse one compound selector. Type and universal selectors are only
    /// accepted in first position.
    fn parse_compound(&mut self) -> Option<Vec<SimpleSelector>> {
        let mut simples = Vec::new();
        match self.peek() {
            Some(b'*') => {
                self.advance();
                simples.push(SimpleSelector::Universal);
            }
            Some(byte) if is_ident_start(byte) => {
                let name = self.consume_ident()?;
                simples.push(SimpleSelector::Tag(name.to_ascii_lowercase().into()));
            }
            _ => {}
        }
        loop {
            let simple = match self.peek() {
                Some(b'.') => {
                    self.advance();
                    SimpleSelector::Class(self.consume_ident()?.into())
                }
                Some(b'#') => {
                    self.advance();
                    SimpleSelector::Id(self.consume_ident()?.into())
                }
                Some(b'[') => self.consume_attribute()?,
                Some(b':') => self.consume_pseudo()?,
                _ => break,
            };
            simples.push(simple);
        }
        if simples.is_empty() {
            return None;
        }
        Some(simples)
    }

    /// Consume an identifier made of ASCII alphanumerics, `-`, `_`, escapes
    /// and non-ASCII bytes. Case is preserved.
    fn consume_ident(&mut self) -> Option<String> {
        let mut out = Vec::new();
        while let Some(byte) = self.peek() {
            if byte == b'\\' {
                self.advance();
                let escaped = self.peek()?;
                out.push(escaped);
                self.advance();
            } else if is_ident_byte(byte) {
                out.push(byte);
                self.advance();
            } else {
                break;
            }
        }
        if out.is_empty() || out.first().is_some_and(u8::is_ascii_digit) {
            return None;
        }
        String::from_utf8(out).ok()
    }

    /// `[name]`, `[name op value]`, `[name op value i]`
    fn consume_attribute(&mut self) -> Option<SimpleSelector> {
        self.advance();
        self.skip_whitespace();
        let name = self.consume_ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        let operator = match (self.peek(), self.peek_at(1)) {
            (Some(b']'), _) => AttrOperator::Set,
            (Some(b'='), _) => AttrOperator::Exact,
            (Some(b'~'), Some(b'=')) => AttrOperator::List,
            (Some(b'|'), Some(b'=')) => AttrOperator::Hyphen,
            (Some(b'*'), Some(b'=')) => AttrOperator::Contain,
            (Some(b'^'), Some(b'=')) => AttrOperator::Begin,
            (Some(b'$'), Some(b'=')) => AttrOperator::End,
            _ => return None,
        };
        let mut value = String::new();
        let mut case_insensitive = false;
        if operator != AttrOperator::Set {
            if operator != AttrOperator::Exact {
                self.advance();
            }
            self.advance();
            self.skip_whitespace();
            value = match self.peek() {
                Some(quote @ (b'"' | b'\'')) => {
                    self.advance();
                    self.consume_quoted(quote)?
                }
                _ => self.consume_ident()?,
            };
            self.skip_whitespace();
            if let Some(flag @ (b'i' | b'I' | b's' | b'S')) = self.peek() {
                case_insensitive = flag.eq_ignore_ascii_case(&b'i');
                self.advance();
                self.skip_whitespace();
            }
        }
        if self.peek() != Some(b']') {
            return None;
        }
        self.advance();
        Some(SimpleSelector::Attribute(Box::new(AttributeSelector {
            name: name.into(),
            operator,
            value: value.into(),
            case_insensitive,
        })))
    }

    /// Quoted string body, cursor positioned after the opening quote.
    fn consume_quoted(&mut self, quote: u8) -> Option<String> {
        let mut out = Vec::new();
        loop {
            let byte = self.peek()?;
            self.advance();
            if byte == quote {
                break;
            }
            if byte == b'\\' {
                out.push(self.peek()?);
                self.advance();
            } else {
                out.push(byte);
            }
        }
        String::from_utf8(out).ok()
    }

    /// `:name`, `:name(list)`, `::name`
    fn consume_pseudo(&mut self) -> Option<SimpleSelector> {
        self.advance();
        let is_element = self.peek() == Some(b':');
        if is_element {
            self.advance();
        }
        let name = self.consume_ident()?.to_ascii_lowercase();
        if is_element {
            return PseudoId::from_name(&name).map(SimpleSelector::PseudoElement);
        }
        if self.peek() == Some(b'(') {
            self.advance();
            let list = SelectorList::new(self.parse_list(true)?);
            if self.peek() != Some(b')') {
                return None;
            }
            self.advance();
            let pseudo = match name.as_str() {
                "is" | "matches" | "-webkit-any" => PseudoClass::Is(list),
                "where" => PseudoClass::Where(list),
                "not" => PseudoClass::Not(list),
                "has" => PseudoClass::Has(list),
                _ => {
                    debug!("unsupported functional pseudo-class :{name}()");
                    return None;
                }
            };
            return Some(SimpleSelector::PseudoClass(pseudo));
        }
        if let Some(pseudo) = PseudoClass::from_name(&name) {
            return Some(SimpleSelector::PseudoClass(pseudo));
        }
        match PseudoId::from_name(&name) {
            Some(pseudo) if pseudo.allows_legacy_syntax() => {
                Some(SimpleSelector::PseudoElement(pseudo))
            }
            _ => {
                debug!("unsupported pseudo-class :{name}");
                None
            }
        }
    }
}

/// Turn left-to-right compounds into right-to-left components. The last
/// simple selector of each compound carries the combinator to its left
/// neighbour; pseudo-elements move to the front of their compound.
fn flatten(compounds: Vec<Vec<SimpleSelector>>, combinators: &[Relation]) -> Vec<Component> {
    let mut components = Vec::new();
    for (position, mut compound) in compounds.into_iter().enumerate().rev() {
        compound.sort_by_key(|simple| !matches!(simple, SimpleSelector::PseudoElement(_)));
        let leftward = if position == 0 {
            Relation::SubSelector
        } else {
            combinators
                .get(position.saturating_sub(1))
                .copied()
                .unwrap_or(Relation::Descendant)
        };
        let last = compound.len().saturating_sub(1);
        for (offset, simple) in compound.into_iter().enumerate() {
            let relation = if offset == last {
                leftward
            } else {
                Relation::SubSelector
            };
            components.push(Component::new(simple, relation));
        }
    }
    components
}

#[inline]
fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'-' || byte == b'\\' || byte >= 0x80
}

#[inline]
fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || byte >= 0x80
}
