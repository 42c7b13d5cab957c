//! Declaration blocks.

use crate::properties::PropertyId;
use core::fmt::{self, Write as _};
use core::slice::Iter;
use log::trace;

/// CSS-wide keywords plus opaque specified text.
/// Reference: <https://drafts.csswg.org/css-cascade-4/#defaulting-keywords>
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CssValue {
    Inherit,
    Initial,
    Unset,
    Revert,
    /// Any other value, trimmed, as written.
    Specified(Box<str>),
}

impl CssValue {
    /// Classify value text. Empty text is not a value.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let keyword = match trimmed.to_ascii_lowercase().as_str() {
            "inherit" => Self::Inherit,
            "initial" => Self::Initial,
            "unset" => Self::Unset,
            "revert" => Self::Revert,
            _ => Self::Specified(trimmed.into()),
        };
        Some(keyword)
    }

    /// Value as written; CSS-wide keywords in lowercase.
    pub fn as_text(&self) -> &str {
        match self {
            Self::Inherit => "inherit",
            Self::Initial => "initial",
            Self::Unset => "unset",
            Self::Revert => "revert",
            Self::Specified(text) => text,
        }
    }
}

impl fmt::Display for CssValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_text())
    }
}

/// One `property: value [!important]` entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyDeclaration {
    /// Property being declared.
    pub id: PropertyId,
    /// Declared value, keyword or text.
    pub value: CssValue,
    /// Declared with `!important`.
    pub important: bool,
}

impl PropertyDeclaration {
    #[inline]
    pub const fn new(id: PropertyId, value: CssValue, important: bool) -> Self {
        Self {
            id,
            value,
            important,
        }
    }
}

/// One `--name: value [!important]` entry. Custom properties are keyed by
/// their case-sensitive name instead of a [`PropertyId`].
/// Reference: <https://drafts.csswg.org/css-variables-1/#defining-variables>
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CustomPropertyDeclaration {
    /// Name including the leading `--`.
    pub name: Box<str>,
    /// Declared value, never empty.
    pub value: CssValue,
    pub important: bool,
}

impl CustomPropertyDeclaration {
    #[inline]
    pub fn new(name: &str, value: CssValue, important: bool) -> Self {
        Self {
            name: name.into(),
            value,
            important,
        }
    }
}

/// True for `--*` names, which bypass the property table.
#[inline]
pub fn is_custom_property_name(name: &str) -> bool {
    name.len() > 2 && name.starts_with("--")
}

/// Ordered declaration block of a style rule or an inline `style` attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StylePropertySet {
    declarations: Vec<PropertyDeclaration>,
    /// Custom properties in source order, kept apart from the id-indexed
    /// declarations.
    custom_declarations: Vec<CustomPropertyDeclaration>,
}

impl StylePropertySet {
    #[inline]
    pub const fn new() -> Self {
        Self {
            declarations: Vec::new(),
            custom_declarations: Vec::new(),
        }
    }

    /// Build from `(name, value, important)` triples, dropping unknown
    /// properties and empty values. `--*` names become custom properties.
    pub fn from_declarations<'decl, I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = (&'decl str, &'decl str, bool)>,
    {
        let mut set = Self::new();
        for (name, value, important) in declarations {
            set.parse_declaration(name, value, important);
        }
        set
    }

    /// Append one declaration from text. Returns `false` if it was dropped.
    pub fn parse_declaration(&mut self, name: &str, value: &str, important: bool) -> bool {
        if is_custom_property_name(name) {
            let Some(parsed) = CssValue::parse(value) else {
                trace!("dropping empty value for {name}");
                return false;
            };
            self.push_custom(CustomPropertyDeclaration::new(name, parsed, important));
            return true;
        }
        let Some(id) = PropertyId::from_name(name) else {
            trace!("dropping declaration for unknown property {name:?}");
            return false;
        };
        let Some(parsed) = CssValue::parse(value) else {
            trace!("dropping empty value for {}", id.name());
            return false;
        };
        self.push(PropertyDeclaration::new(id, parsed, important));
        true
    }

    /// Append `declaration` after the existing ones.
    #[inline]
    pub fn push(&mut self, declaration: PropertyDeclaration) {
        self.declarations.push(declaration);
    }

    #[inline]
    pub fn push_custom(&mut self, declaration: CustomPropertyDeclaration) {
        self.custom_declarations.push(declaration);
    }

    /// Number of declarations of known properties.
    #[inline]
    pub fn property_count(&self) -> usize {
        self.declarations.len()
    }

    /// Number of `--*` declarations.
    #[inline]
    pub fn custom_property_count(&self) -> usize {
        self.custom_declarations.len()
    }

    /// True when the block holds neither known nor custom declarations.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty() && self.custom_declarations.is_empty()
    }

    #[inline]
    pub fn property_at(&self, index: usize) -> Option<&PropertyDeclaration> {
        self.declarations.get(index)
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, PropertyDeclaration> {
        self.declarations.iter()
    }

    /// Last declaration for `id`, which is the one that wins inside a block
    /// of equal importance.
    pub fn get(&self, id: PropertyId) -> Option<&PropertyDeclaration> {
        self.declarations
            .iter()
            .rev()
            .find(|declaration| declaration.id == id)
    }

    /// `--*` declarations in source order.
    #[inline]
    pub fn custom_properties(&self) -> Iter<'_, CustomPropertyDeclaration> {
        self.custom_declarations.iter()
    }

    /// Last declaration of the custom property `name`.
    pub fn get_custom(&self, name: &str) -> Option<&CustomPropertyDeclaration> {
        self.custom_declarations
            .iter()
            .rev()
            .find(|declaration| &*declaration.name == name)
    }

    /// Serialize as `name: value; name: value !important`, known properties
    /// first and custom properties after them.
    pub fn to_css_text(&self) -> String {
        let known = self
            .declarations
            .iter()
            .map(|declaration| (declaration.id.name(), &declaration.value, declaration.important));
        let custom = self
            .custom_declarations
            .iter()
            .map(|declaration| (&*declaration.name, &declaration.value, declaration.important));
        let mut out = String::new();
        for (position, (name, value, important)) in known.chain(custom).enumerate() {
            if position > 0 {
                out.push_str("; ");
            }
            let suffix = if important { " !important" } else { "" };
            let _ignored = write!(out, "{name}: {value}{suffix}");
        }
        out
    }
}

impl<'set> IntoIterator for &'set StylePropertySet {
    type Item = &'set PropertyDeclaration;
    type IntoIter = Iter<'set, PropertyDeclaration>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.declarations.iter()
    }
}
