//! Cascade origins and layer order.
//! Reference: <https://drafts.csswg.org/css-cascade-5/#cascade-sort>

/// Where a declaration came from. Later variants win over earlier ones for
/// normal declarations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum CascadeOrigin {
    UserAgent,
    User,
    #[default]
    Author,
    Animation,
    Transition,
}

/// Position of a cascade layer in the layer tree.
///
/// The order packs the path of sibling indices from the outermost layer
/// down, 16 bits per level, with unused levels set to all ones. Comparing
/// the packed value therefore sorts earlier siblings first and places a
/// nested layer before the rules of the layer that contains it. Rules
/// outside any `@layer` have the empty path, which sorts after everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerOrder(u64);

impl Default for LayerOrder {
    fn default() -> Self {
        Self::IMPLICIT_OUTER
    }
}

impl LayerOrder {
    /// Order given to declarations outside any `@layer`. It sorts after every
    /// named layer.
    pub const IMPLICIT_OUTER: Self = Self(u64::MAX);

    /// Order used for inline style.
    pub const INLINE: Self = Self(0);

    /// Deepest nesting the packed path can represent.
    pub const MAX_DEPTH: usize = 4;

    /// Largest sibling index; the all-ones level value marks an unused level.
    pub const MAX_SIBLING_INDEX: u16 = u16::MAX - 1;

    const LEVEL_BITS: usize = 16;
    const LEVEL_MASK: u64 = 0xFFFF;

    /// Order of the `index`-th top-level layer.
    #[inline]
    pub const fn top_level(index: u16) -> Self {
        match Self::IMPLICIT_OUTER.child(index) {
            Some(order) => order,
            None => Self::IMPLICIT_OUTER,
        }
    }

    /// Order of the `index`-th layer nested directly in `self`, or `None`
    /// past [`Self::MAX_DEPTH`].
    pub const fn child(self, index: u16) -> Option<Self> {
        let depth = self.depth();
        if depth >= Self::MAX_DEPTH {
            return None;
        }
        let index = if index > Self::MAX_SIBLING_INDEX {
            Self::MAX_SIBLING_INDEX
        } else {
            index
        };
        let shift = (Self::MAX_DEPTH - 1 - depth) * Self::LEVEL_BITS;
        let cleared = self.0 & !(Self::LEVEL_MASK << shift);
        Some(Self(cleared | ((index as u64) << shift)))
    }

    /// Number of layers on the path, `0` for [`Self::IMPLICIT_OUTER`].
    pub const fn depth(self) -> usize {
        let mut depth = 0;
        while depth < Self::MAX_DEPTH {
            let shift = (Self::MAX_DEPTH - 1 - depth) * Self::LEVEL_BITS;
            if (self.0 >> shift) & Self::LEVEL_MASK == Self::LEVEL_MASK {
                break;
            }
            depth += 1;
        }
        depth
    }

    /// Packed path, comparable across every layer of one origin.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}
