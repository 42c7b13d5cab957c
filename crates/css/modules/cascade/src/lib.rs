//! CSS Cascading and Inheritance: origins, declaration blocks, matched
//! results and cascade application.
//! Reference: <https://drafts.csswg.org/css-cascade-5/>

#![forbid(unsafe_code)]

mod cascade;
mod match_result;
mod origin;
mod properties;
mod property_set;

pub use cascade::{CascadeState, StyleBuilder, StyleCascade};
pub use match_result::{MatchResult, MatchedProperties};
pub use origin::{CascadeOrigin, LayerOrder};
pub use properties::PropertyId;
pub use property_set::{
    CssValue, CustomPropertyDeclaration, PropertyDeclaration, StylePropertySet,
    is_custom_property_name,
};
