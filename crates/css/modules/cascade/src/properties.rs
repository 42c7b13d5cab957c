//! Known property table.
//!
//! Every property gets a dense id so cascade bookkeeping can live in fixed
//! size bit sets. Shorthands are kept as their own ids; expansion belongs to
//! the value layer.

/// Generate [`PropertyId`] and its per-property metadata from one table.
macro_rules! define_properties {
    ($( $variant:ident => $name:literal, inherited: $inherited:literal, initial: $initial:literal; )*) => {
        /// Dense identifier of a known CSS property.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum PropertyId {
            $( $variant, )*
        }

        impl PropertyId {
            /// All properties in id order.
            pub const ALL: &'static [Self] = &[$( Self::$variant, )*];

            /// Number of known properties.
            pub const COUNT: usize = Self::ALL.len();

            /// CSS name, lowercase.
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            /// Whether the property inherits by default.
            pub const fn is_inherited(self) -> bool {
                match self {
                    $( Self::$variant => $inherited, )*
                }
            }

            /// Initial value as CSS text.
            pub const fn initial_value(self) -> &'static str {
                match self {
                    $( Self::$variant => $initial, )*
                }
            }
        }
    };
}

define_properties! {
    Color => "color", inherited: true, initial: "canvastext";
    Display => "display", inherited: false, initial: "inline";
    Position => "position", inherited: false, initial: "static";
    Float => "float", inherited: false, initial: "none";
    Clear => "clear", inherited: false, initial: "none";
    Visibility => "visibility", inherited: true, initial: "visible";
    Opacity => "opacity", inherited: false, initial: "1";
    ZIndex => "z-index", inherited: false, initial: "auto";
    Top => "top", inherited: false, initial: "auto";
    Right => "right", inherited: false, initial: "auto";
    Bottom => "bottom", inherited: false, initial: "auto";
    Left => "left", inherited: false, initial: "auto";
    Width => "width", inherited: false, initial: "auto";
    Height => "height", inherited: false, initial: "auto";
    MinWidth => "min-width", inherited: false, initial: "auto";
    MinHeight => "min-height", inherited: false, initial: "auto";
    MaxWidth => "max-width", inherited: false, initial: "none";
    MaxHeight => "max-height", inherited: false, initial: "none";
    BoxSizing => "box-sizing", inherited: false, initial: "content-box";
    Margin => "margin", inherited: false, initial: "0";
    MarginTop => "margin-top", inherited: false, initial: "0";
    MarginRight => "margin-right", inherited: false, initial: "0";
    MarginBottom => "margin-bottom", inherited: false, initial: "0";
    MarginLeft => "margin-left", inherited: false, initial: "0";
    Padding => "padding", inherited: false, initial: "0";
    PaddingTop => "padding-top", inherited: false, initial: "0";
    PaddingRight => "padding-right", inherited: false, initial: "0";
    PaddingBottom => "padding-bottom", inherited: false, initial: "0";
    PaddingLeft => "padding-left", inherited: false, initial: "0";
    Border => "border", inherited: false, initial: "medium none currentcolor";
    BorderWidth => "border-width", inherited: false, initial: "medium";
    BorderStyle => "border-style", inherited: false, initial: "none";
    BorderColor => "border-color", inherited: false, initial: "currentcolor";
    BorderRadius => "border-radius", inherited: false, initial: "0";
    Outline => "outline", inherited: false, initial: "medium none invert";
    Background => "background", inherited: false, initial: "none";
    BackgroundColor => "background-color", inherited: false, initial: "transparent";
    BackgroundImage => "background-image", inherited: false, initial: "none";
    Font => "font", inherited: true, initial: "medium serif";
    FontFamily => "font-family", inherited: true, initial: "serif";
    FontSize => "font-size", inherited: true, initial: "medium";
    FontStyle => "font-style", inherited: true, initial: "normal";
    FontWeight => "font-weight", inherited: true, initial: "normal";
    LineHeight => "line-height", inherited: true, initial: "normal";
    LetterSpacing => "letter-spacing", inherited: true, initial: "normal";
    WordSpacing => "word-spacing", inherited: true, initial: "normal";
    TextAlign => "text-align", inherited: true, initial: "start";
    TextDecoration => "text-decoration", inherited: false, initial: "none";
    TextTransform => "text-transform", inherited: true, initial: "none";
    TextIndent => "text-indent", inherited: true, initial: "0";
    WhiteSpace => "white-space", inherited: true, initial: "normal";
    VerticalAlign => "vertical-align", inherited: false, initial: "baseline";
    Direction => "direction", inherited: true, initial: "ltr";
    WritingMode => "writing-mode", inherited: true, initial: "horizontal-tb";
    ListStyleType => "list-style-type", inherited: true, initial: "disc";
    Cursor => "cursor", inherited: true, initial: "auto";
    Overflow => "overflow", inherited: false, initial: "visible";
    Content => "content", inherited: false, initial: "normal";
    FlexDirection => "flex-direction", inherited: false, initial: "row";
    FlexWrap => "flex-wrap", inherited: false, initial: "nowrap";
    JustifyContent => "justify-content", inherited: false, initial: "normal";
    AlignItems => "align-items", inherited: false, initial: "normal";
    Gap => "gap", inherited: false, initial: "normal";
    Transform => "transform", inherited: false, initial: "none";
}

impl PropertyId {
    /// Look up a property by name, ASCII case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|property| property.name().eq_ignore_ascii_case(trimmed))
    }

    /// Dense index in `0..COUNT`.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`Self::index`].
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_lookup() {
        for property in PropertyId::ALL {
            assert_eq!(PropertyId::from_name(property.name()), Some(*property));
            assert_eq!(PropertyId::from_index(property.index()), Some(*property));
        }
        assert_eq!(PropertyId::from_name("COLOR"), Some(PropertyId::Color));
        assert_eq!(PropertyId::from_name("--custom"), None);
        assert_eq!(PropertyId::from_index(PropertyId::COUNT), None);
    }

    #[test]
    fn inheritance_flags() {
        assert!(PropertyId::Color.is_inherited());
        assert!(PropertyId::FontSize.is_inherited());
        assert!(!PropertyId::Margin.is_inherited());
        assert!(!PropertyId::Display.is_inherited());
    }
}
