//! DOM access required by style resolution beyond selector matching.

use css_cascade::StylePropertySet;
use css_selectors::ElementAdapter;
use std::sync::Arc;

/// An element tree the resolver can style.
pub trait StyleElement: ElementAdapter {
    /// Visit every class in the element's class list.
    fn for_each_class(&self, element: Self::Handle, visit: &mut dyn FnMut(&str));

    /// Visit every attribute local name, ASCII lowercase.
    fn for_each_attribute_name(&self, element: Self::Handle, visit: &mut dyn FnMut(&str));

    /// Parsed `style` attribute, if any.
    fn inline_style(&self, element: Self::Handle) -> Option<Arc<StylePropertySet>>;

    /// Whether the element can carry inline style.
    fn is_styled_element(&self, _element: Self::Handle) -> bool {
        true
    }

    /// Children in document order.
    fn child_elements(&self, element: Self::Handle) -> ChildElements<'_, Self>
    where
        Self: Sized,
    {
        ChildElements {
            adapter: self,
            next: self.first_child_element(element),
        }
    }
}

/// Iterator over an element's children.
pub struct ChildElements<'adapter, E: StyleElement> {
    adapter: &'adapter E,
    next: Option<E::Handle>,
}

impl<E: StyleElement> Iterator for ChildElements<'_, E> {
    type Item = E::Handle;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.adapter.next_sibling_element(current);
        Some(current)
    }
}
