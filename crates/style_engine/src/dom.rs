//! Element tree mirror fed by DOM update messages.
//!
//! Only what style resolution reads is kept: tag, attributes with the id,
//! class list and parsed inline style pulled out, tree links and
//! interaction state. The document node is [`NodeKey::ROOT`] and is not an
//! element; elements inserted under it are top-level.

use crate::element::StyleElement;
use anyhow::{Result, anyhow};
use css_cascade::StylePropertySet;
use css_selectors::ElementAdapter;
use css_style_attr::parse_style_attribute;
use log::trace;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Stable identifier of a node in the mirrored document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u64);

impl NodeKey {
    /// The document itself.
    pub const ROOT: Self = Self(0);
}

/// Dynamic state consulted by user-action and link pseudo-classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ElementState {
    /// `:hover`
    pub hovered: bool,
    /// `:active`
    pub active: bool,
    /// `:focus`
    pub focused: bool,
    /// `:focus-visible`
    pub focus_visible: bool,
    /// `:visited`; only meaningful on links.
    pub visited: bool,
}

/// A change to the mirrored document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomUpdate {
    InsertElement {
        parent: NodeKey,
        node: NodeKey,
        tag: String,
        pos: usize,
    },
    SetAttr {
        node: NodeKey,
        name: String,
        value: String,
    },
    RemoveAttr {
        node: NodeKey,
        name: String,
    },
    SetElementState {
        node: NodeKey,
        state: ElementState,
    },
    /// Remove `node` and its whole subtree.
    RemoveNode {
        node: NodeKey,
    },
    /// Parsing finished; subscribers flush pending work.
    EndOfDocument,
}

/// Consumer of DOM updates.
pub trait DomSubscriber {
    /// Apply one update.
    ///
    /// # Errors
    /// Returns an error when the update names a node that is not in the
    /// document.
    fn apply_update(&mut self, update: DomUpdate) -> Result<()>;
}

#[derive(Clone, Debug, Default)]
struct NodeInfo {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    /// Lowercased name to value, in insertion order.
    attributes: Vec<(String, String)>,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
    state: ElementState,
    inline_style: Option<Arc<StylePropertySet>>,
}

impl NodeInfo {
    fn refresh_derived(&mut self, name: &str) {
        let value = self
            .attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, value)| value.as_str());
        match name {
            "id" => self.id = value.map(str::to_owned),
            "class" => {
                self.classes = value
                    .map(|list| list.split_ascii_whitespace().map(str::to_owned).collect())
                    .unwrap_or_default();
            }
            "style" => self.inline_style = value.and_then(parse_inline_style),
            _ => {}
        }
    }
}

fn parse_inline_style(text: &str) -> Option<Arc<StylePropertySet>> {
    let declarations = parse_style_attribute(text);
    let set = StylePropertySet::from_declarations(declarations.iter().map(|declaration| {
        (
            declaration.property.as_str(),
            declaration.value.as_str(),
            declaration.important,
        )
    }));
    (!set.is_empty()).then(|| Arc::new(set))
}

/// In-memory element tree implementing [`StyleElement`].
#[derive(Debug, Default)]
pub struct StyleDom {
    nodes: FxHashMap<NodeKey, NodeInfo>,
    top_level: Vec<NodeKey>,
    finished: bool,
}

impl StyleDom {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, node: NodeKey) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Elements whose parent is the document, in order.
    #[inline]
    pub fn top_level_elements(&self) -> &[NodeKey] {
        &self.top_level
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True once `EndOfDocument` was applied.
    #[inline]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Pseudo-class state of `node`, `None` if it is not mirrored.
    pub fn element_state(&self, node: NodeKey) -> Option<ElementState> {
        self.nodes.get(&node).map(|info| info.state)
    }

    fn info_mut(&mut self, node: NodeKey) -> Result<&mut NodeInfo> {
        self.nodes
            .get_mut(&node)
            .ok_or_else(|| anyhow!("unknown node {node:?}"))
    }

    fn siblings(&self, node: NodeKey) -> Option<&[NodeKey]> {
        match self.nodes.get(&node)?.parent {
            Some(parent) => self.nodes.get(&parent).map(|info| info.children.as_slice()),
            None => Some(&self.top_level),
        }
    }

    fn detach(&mut self, node: NodeKey) {
        let parent = self.nodes.get(&node).and_then(|info| info.parent);
        let siblings = match parent {
            Some(parent) => self.nodes.get_mut(&parent).map(|info| &mut info.children),
            None => Some(&mut self.top_level),
        };
        if let Some(siblings) = siblings {
            siblings.retain(|&sibling| sibling != node);
        }
    }

    fn insert_element(
        &mut self,
        parent: NodeKey,
        node: NodeKey,
        tag: &str,
        pos: usize,
    ) -> Result<()> {
        if node == NodeKey::ROOT {
            return Err(anyhow!("cannot insert the document node as an element"));
        }
        let parent_key = (parent != NodeKey::ROOT).then_some(parent);
        if let Some(parent) = parent_key
            && !self.nodes.contains_key(&parent)
        {
            return Err(anyhow!("insert {node:?}: unknown parent {parent:?}"));
        }
        if self.nodes.contains_key(&node) {
            trace!("moving {node:?} under {parent:?}");
            self.detach(node);
        }
        let info = self.nodes.entry(node).or_default();
        info.tag = tag.to_ascii_lowercase();
        info.parent = parent_key;
        let siblings = match parent_key {
            Some(parent) => &mut self.info_mut(parent)?.children,
            None => &mut self.top_level,
        };
        siblings.insert(pos.min(siblings.len()), node);
        Ok(())
    }

    fn set_attribute(&mut self, node: NodeKey, name: &str, value: String) -> Result<()> {
        let info = self.info_mut(node)?;
        let name = name.to_ascii_lowercase();
        if let Some(slot) = info
            .attributes
            .iter_mut()
            .find(|(attribute, _)| *attribute == name)
        {
            slot.1 = value;
        } else {
            info.attributes.push((name.clone(), value));
        }
        info.refresh_derived(&name);
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeKey, name: &str) -> Result<()> {
        let info = self.info_mut(node)?;
        let name = name.to_ascii_lowercase();
        info.attributes.retain(|(attribute, _)| *attribute != name);
        info.refresh_derived(&name);
        Ok(())
    }

    fn remove_node(&mut self, node: NodeKey) -> Result<()> {
        if !self.nodes.contains_key(&node) {
            return Err(anyhow!("remove: unknown node {node:?}"));
        }
        self.detach(node);
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if let Some(info) = self.nodes.remove(&current) {
                pending.extend(info.children);
            }
        }
        Ok(())
    }
}

impl DomSubscriber for StyleDom {
    fn apply_update(&mut self, update: DomUpdate) -> Result<()> {
        match update {
            DomUpdate::InsertElement {
                parent,
                node,
                tag,
                pos,
            } => self.insert_element(parent, node, &tag, pos),
            DomUpdate::SetAttr { node, name, value } => self.set_attribute(node, &name, value),
            DomUpdate::RemoveAttr { node, name } => self.remove_attribute(node, &name),
            DomUpdate::SetElementState { node, state } => {
                self.info_mut(node)?.state = state;
                Ok(())
            }
            DomUpdate::RemoveNode { node } => self.remove_node(node),
            DomUpdate::EndOfDocument => {
                self.finished = true;
                Ok(())
            }
        }
    }
}

impl ElementAdapter for StyleDom {
    type Handle = NodeKey;

    fn parent(&self, element: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&element)?.parent
    }

    fn previous_sibling_element(&self, element: NodeKey) -> Option<NodeKey> {
        let siblings = self.siblings(element)?;
        let index = siblings.iter().position(|&sibling| sibling == element)?;
        siblings.get(index.checked_sub(1)?).copied()
    }

    fn next_sibling_element(&self, element: NodeKey) -> Option<NodeKey> {
        let siblings = self.siblings(element)?;
        let index = siblings.iter().position(|&sibling| sibling == element)?;
        siblings.get(index.saturating_add(1)).copied()
    }

    fn first_child_element(&self, element: NodeKey) -> Option<NodeKey> {
        self.nodes.get(&element)?.children.first().copied()
    }

    fn local_name(&self, element: NodeKey) -> &str {
        self.nodes.get(&element).map_or("", |info| info.tag.as_str())
    }

    fn element_id(&self, element: NodeKey) -> Option<&str> {
        self.nodes.get(&element)?.id.as_deref()
    }

    fn has_class(&self, element: NodeKey, class: &str) -> bool {
        self.nodes
            .get(&element)
            .is_some_and(|info| info.classes.iter().any(|candidate| candidate == class))
    }

    fn attribute(&self, element: NodeKey, name: &str) -> Option<&str> {
        self.nodes
            .get(&element)?
            .attributes
            .iter()
            .find(|(attribute, _)| attribute == name)
            .map(|(_, value)| value.as_str())
    }

    fn is_link(&self, element: NodeKey) -> bool {
        matches!(self.local_name(element), "a" | "area" | "link")
            && self.attribute(element, "href").is_some()
    }

    fn is_visited(&self, element: NodeKey) -> bool {
        self.is_link(element)
            && self
                .nodes
                .get(&element)
                .is_some_and(|info| info.state.visited)
    }

    fn is_hovered(&self, element: NodeKey) -> bool {
        self.nodes
            .get(&element)
            .is_some_and(|info| info.state.hovered)
    }

    fn is_active(&self, element: NodeKey) -> bool {
        self.nodes
            .get(&element)
            .is_some_and(|info| info.state.active)
    }

    fn is_focused(&self, element: NodeKey) -> bool {
        self.nodes
            .get(&element)
            .is_some_and(|info| info.state.focused)
    }

    fn is_focus_visible(&self, element: NodeKey) -> bool {
        self.nodes
            .get(&element)
            .is_some_and(|info| info.state.focused && info.state.focus_visible)
    }

    fn has_focus_within(&self, element: NodeKey) -> bool {
        let mut pending = vec![element];
        while let Some(current) = pending.pop() {
            let Some(info) = self.nodes.get(&current) else {
                continue;
            };
            if info.state.focused {
                return true;
            }
            pending.extend(info.children.iter().copied());
        }
        false
    }
}

impl StyleElement for StyleDom {
    fn for_each_class(&self, element: NodeKey, visit: &mut dyn FnMut(&str)) {
        if let Some(info) = self.nodes.get(&element) {
            for class in &info.classes {
                visit(class);
            }
        }
    }

    fn for_each_attribute_name(&self, element: NodeKey, visit: &mut dyn FnMut(&str)) {
        if let Some(info) = self.nodes.get(&element) {
            for (name, _) in &info.attributes {
                visit(name);
            }
        }
    }

    fn inline_style(&self, element: NodeKey) -> Option<Arc<StylePropertySet>> {
        self.nodes
            .get(&element)?
            .inline_style
            .as_ref()
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(dom: &mut StyleDom, parent: u64, node: u64, tag: &str) -> Result<()> {
        dom.apply_update(DomUpdate::InsertElement {
            parent: NodeKey(parent),
            node: NodeKey(node),
            tag: tag.to_owned(),
            pos: usize::MAX,
        })
    }

    fn set_attr(dom: &mut StyleDom, node: u64, name: &str, value: &str) -> Result<()> {
        dom.apply_update(DomUpdate::SetAttr {
            node: NodeKey(node),
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }

    #[test]
    fn tree_links_and_attributes() -> Result<()> {
        let mut dom = StyleDom::new();
        insert(&mut dom, 0, 1, "HTML")?;
        insert(&mut dom, 1, 2, "body")?;
        insert(&mut dom, 2, 3, "p")?;
        insert(&mut dom, 2, 4, "a")?;
        set_attr(&mut dom, 3, "CLASS", "intro  lead")?;
        set_attr(&mut dom, 3, "id", "first")?;
        set_attr(&mut dom, 4, "href", "/next")?;

        assert_eq!(dom.top_level_elements(), &[NodeKey(1)]);
        assert_eq!(dom.local_name(NodeKey(1)), "html");
        assert_eq!(dom.parent(NodeKey(1)), None);
        assert_eq!(dom.parent(NodeKey(3)), Some(NodeKey(2)));
        assert_eq!(dom.next_sibling_element(NodeKey(3)), Some(NodeKey(4)));
        assert_eq!(dom.previous_sibling_element(NodeKey(3)), None);
        assert!(dom.has_class(NodeKey(3), "lead"));
        assert_eq!(dom.element_id(NodeKey(3)), Some("first"));
        assert!(dom.is_link(NodeKey(4)));
        assert!(!dom.is_link(NodeKey(3)));

        let mut names = Vec::new();
        dom.for_each_attribute_name(NodeKey(3), &mut |name| names.push(name.to_owned()));
        assert_eq!(names, vec!["class".to_owned(), "id".to_owned()]);
        Ok(())
    }

    #[test]
    fn inline_style_follows_attribute() -> Result<()> {
        let mut dom = StyleDom::new();
        insert(&mut dom, 0, 1, "div")?;
        set_attr(&mut dom, 1, "style", "color: red; bogus: 1")?;
        let style = dom.inline_style(NodeKey(1)).map(|set| set.to_css_text());
        assert_eq!(style.as_deref(), Some("color: red"));
        dom.apply_update(DomUpdate::RemoveAttr {
            node: NodeKey(1),
            name: "style".to_owned(),
        })?;
        assert!(dom.inline_style(NodeKey(1)).is_none());
        Ok(())
    }

    #[test]
    fn unknown_nodes_are_errors() -> Result<()> {
        let mut dom = StyleDom::new();
        let orphan = insert(&mut dom, 9, 1, "div").err().map(|error| error.to_string());
        assert!(orphan.is_some_and(|message| message.contains("unknown parent")));
        assert!(set_attr(&mut dom, 5, "id", "x").err().is_some());
        insert(&mut dom, 0, 1, "div")?;
        insert(&mut dom, 1, 2, "span")?;
        dom.apply_update(DomUpdate::RemoveNode { node: NodeKey(1) })?;
        assert!(dom.is_empty());
        assert!(dom.top_level_elements().is_empty());
        let removed_twice = dom.apply_update(DomUpdate::RemoveNode { node: NodeKey(2) });
        assert!(removed_twice.err().is_some());
        Ok(())
    }

    #[test]
    fn focus_within_sees_descendants() -> Result<()> {
        let mut dom = StyleDom::new();
        insert(&mut dom, 0, 1, "form")?;
        insert(&mut dom, 1, 2, "input")?;
        dom.apply_update(DomUpdate::SetElementState {
            node: NodeKey(2),
            state: ElementState {
                focused: true,
                ..ElementState::default()
            },
        })?;
        assert!(dom.has_focus_within(NodeKey(1)));
        assert!(dom.is_focused(NodeKey(2)));
        assert!(!dom.is_focused(NodeKey(1)));
        Ok(())
    }
}
