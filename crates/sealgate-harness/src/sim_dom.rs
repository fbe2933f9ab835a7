//! In-memory DOM implementing [`UiEngine`].

use sealgate_core::UiEngine;

/// Handle to a node in a [`SimDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    markup: String,
    children: Vec<NodeId>,
    processed: bool,
}

/// Arena of nodes. Nodes are never freed; detached nodes just become
/// unreachable from their former parent.
#[derive(Debug, Clone, Default)]
pub struct SimDom {
    nodes: Vec<Node>,
}

impl SimDom {
    /// Empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node with the given markup.
    pub fn create_element(&mut self, markup: &str) -> NodeId {
        self.nodes.push(Node { markup: markup.to_string(), children: Vec::new(), processed: false });
        NodeId(self.nodes.len() - 1)
    }

    /// Children of `id`, in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    /// Own markup of `id`.
    pub fn markup(&self, id: NodeId) -> &str {
        self.nodes.get(id.0).map_or("", |n| n.markup.as_str())
    }

    /// Whether the engine's processing step ran on `id`.
    pub fn is_processed(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.processed)
    }

    /// Markup of `id` followed by its rendered children.
    pub fn render(&self, id: NodeId) -> String {
        let mut out = self.markup(id).to_string();
        for child in self.children(id) {
            out.push_str(&self.render(*child));
        }
        out
    }
}

impl UiEngine for SimDom {
    type Element = NodeId;

    fn create_container(&mut self, markup: &str) -> NodeId {
        self.create_element(markup)
    }

    fn process(&mut self, element: &NodeId) {
        if let Some(node) = self.nodes.get_mut(element.0) {
            node.processed = true;
        }
    }

    fn clear_children(&mut self, target: &NodeId) {
        if let Some(node) = self.nodes.get_mut(target.0) {
            node.children.clear();
        }
    }

    fn append_child(&mut self, target: &NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(target.0) {
            node.children.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_concatenates_children() {
        let mut dom = SimDom::new();
        let root = dom.create_element("");
        let a = dom.create_element("<p>a</p>");
        let b = dom.create_element("<p>b</p>");
        dom.append_child(&root, a);
        dom.append_child(&root, b);

        assert_eq!(dom.render(root), "<p>a</p><p>b</p>");

        dom.clear_children(&root);
        assert_eq!(dom.render(root), "");
        assert!(dom.children(root).is_empty());
    }
}
