//! Ordered, schema-filtered trees produced by the decoders

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered string-keyed map
pub type Tree = IndexMap<String, Node>;

/// A decoded value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<Node>),
    Tree(Tree),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn empty_tree() -> Self {
        Node::Tree(Tree::new())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Node::Tree(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut Tree> {
        match self {
            Node::Tree(t) => Some(t),
            _ => None,
        }
    }

    /// Child by key when this node is a tree
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_tree().and_then(|t| t.get(key))
    }

    /// Text of a child, treating empty strings as absent
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Node::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Repeated elements decode to a list, singletons to a bare record.
    /// This yields both shapes as a slice of records.
    pub fn items(&self) -> Vec<&Node> {
        match self {
            Node::List(items) => items.iter().collect(),
            Node::Null => Vec::new(),
            other => vec![other],
        }
    }

    /// Falsy in the sense of "carries no data"
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Null => true,
            Node::Text(s) => s.is_empty(),
            Node::List(items) => items.is_empty(),
            Node::Tree(t) => t.is_empty(),
            Node::Bool(_) | Node::Int(_) => false,
        }
    }
}

impl From<Tree> for Node {
    fn from(tree: Tree) -> Self {
        Node::Tree(tree)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_string())
    }
}

/// Output of one decoder call on one file: `{label: body}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTree {
    pub label: String,
    pub body: Node,
}

impl DecodedTree {
    pub fn new(label: impl Into<String>, body: impl Into<Node>) -> Self {
        Self {
            label: label.into(),
            body: body.into(),
        }
    }
}

/// A key found by [`find_keys`] along with the path that leads to it
#[derive(Debug, Clone, PartialEq)]
pub struct KeyMatch<'a> {
    pub path: Vec<String>,
    pub value: &'a Node,
}

/// Recursive, case-sensitive key search. List elements contribute their index
/// to the path. Matches nested below a match are reported too.
pub fn find_keys<'a>(root: &'a Tree, key: &str) -> Vec<KeyMatch<'a>> {
    let mut found = Vec::new();
    let mut path = Vec::new();
    walk_tree(root, key, &mut path, &mut found);
    found
}

fn walk_tree<'a>(tree: &'a Tree, key: &str, path: &mut Vec<String>, found: &mut Vec<KeyMatch<'a>>) {
    for (k, v) in tree {
        path.push(k.clone());
        if k == key {
            found.push(KeyMatch {
                path: path.clone(),
                value: v,
            });
        }
        walk_node(v, key, path, found);
        path.pop();
    }
}

fn walk_node<'a>(node: &'a Node, key: &str, path: &mut Vec<String>, found: &mut Vec<KeyMatch<'a>>) {
    match node {
        Node::Tree(t) => walk_tree(t, key, path, found),
        Node::List(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(index.to_string());
                walk_node(item, key, path, found);
                path.pop();
            }
        }
        _ => {}
    }
}
