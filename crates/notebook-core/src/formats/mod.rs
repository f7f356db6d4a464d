//! Document trees and the formats that read and write them.

mod markdown;

pub use markdown::MarkdownFormat;

/// Turns page source text into a [`ParseTree`] and back.
pub trait Format: Send + Sync {
    fn parse(&self, text: &str) -> ParseTree;
    fn dump(&self, tree: &ParseTree) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Source text kept as written.
    Text(String),
    Link(LinkNode),
    Heading(HeadingNode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    pub href: String,
    pub text: String,
}

impl LinkNode {
    pub fn new(href: &str) -> Self {
        Self {
            href: href.to_string(),
            text: href.to_string(),
        }
    }

    pub fn with_text(href: &str, text: &str) -> Self {
        Self {
            href: href.to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingNode {
    pub level: u8,
    pub text: String,
    /// Original markup, dropped once the heading is edited.
    pub(crate) source: Option<String>,
}

impl HeadingNode {
    pub fn new(level: u8, text: &str) -> Self {
        Self {
            level,
            text: text.to_string(),
            source: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Link,
    Heading,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Text(_) => NodeKind::Text,
            Node::Link(_) => NodeKind::Link,
            Node::Heading(_) => NodeKind::Heading,
        }
    }
}

/// Result of a [`ParseTree::replace`] visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visit {
    Replace(Node),
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseTree {
    nodes: Vec<Node>,
}

impl ParseTree {
    pub fn new(nodes: Vec<Node>) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        for node in nodes {
            tree.push(node);
        }
        tree
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Append a node, merging adjacent text.
    pub fn push(&mut self, node: Node) {
        if let Node::Text(text) = &node {
            if text.is_empty() {
                return;
            }
            if let Some(Node::Text(last)) = self.nodes.last_mut() {
                last.push_str(text);
                return;
            }
        }
        self.nodes.push(node);
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkNode> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Link(link) => Some(link),
            _ => None,
        })
    }

    /// Visit every node of `kind` and swap in whatever the visitor returns.
    /// Returns the number of replaced nodes.
    pub fn replace(&mut self, kind: NodeKind, mut visitor: impl FnMut(&Node) -> Visit) -> usize {
        let mut replaced = 0;
        let old = std::mem::take(&mut self.nodes);
        for node in old {
            if node.kind() != kind {
                self.push(node);
                continue;
            }
            match visitor(&node) {
                Visit::Replace(new_node) => {
                    replaced += 1;
                    self.push(new_node);
                }
                Visit::Skip => self.push(node),
            }
        }
        replaced
    }

    /// First heading of the document.
    pub fn heading(&self) -> Option<&HeadingNode> {
        self.nodes.iter().find_map(|node| match node {
            Node::Heading(heading) => Some(heading),
            _ => None,
        })
    }

    /// Replace the text of the first heading, or insert a level 1 heading
    /// at the top when there is none.
    pub fn set_heading(&mut self, text: &str) {
        for node in self.nodes.iter_mut() {
            if let Node::Heading(heading) = node {
                heading.text = text.to_string();
                heading.source = None;
                return;
            }
        }
        let mut nodes = vec![Node::Heading(HeadingNode::new(1, text)), Node::Text("\n\n".to_string())];
        nodes.append(&mut self.nodes);
        *self = Self::new(nodes);
    }

    /// Text content with links reduced to their label.
    pub fn plain_text(&self) -> String {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Text(text) => text.as_str(),
                Node::Link(link) => link.text.as_str(),
                Node::Heading(heading) => heading.text.as_str(),
            })
            .collect()
    }
}
