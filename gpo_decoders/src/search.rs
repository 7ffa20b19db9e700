//! Case-insensitive regex search over decoded settings

use crate::tree::{Node, Tree};
use regex::{Regex, RegexBuilder};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
#[error("Invalid search pattern: {0}")]
pub struct SearchError(#[from] regex::Error);

/// Hits of one search
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    /// Matching keys as `/`-joined paths, or `{path: enclosing record}` with records shown
    #[serde(rename = "Paths", skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<Node>,
    /// Matching scalar values keyed by their parent path
    #[serde(rename = "Values", skip_serializing_if = "Tree::is_empty")]
    pub values: Tree,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty() && self.values.is_empty()
    }
}

struct Searcher<'a> {
    pattern: &'a Regex,
    show_record: bool,
    results: SearchResults,
}

impl<'a> Searcher<'a> {
    fn tree(&mut self, tree: &Tree, path: &[String]) {
        let parent = path.join("/");

        for (key, value) in tree {
            let mut current = path.to_vec();
            current.push(key.clone());

            if self.pattern.is_match(key) {
                let joined = current.join("/");
                let hit = if self.show_record {
                    let mut record = Tree::new();
                    record.insert(joined, Node::Tree(tree.clone()));
                    Node::Tree(record)
                } else {
                    Node::text(joined)
                };
                self.results.paths.push(hit);
            }

            match value {
                Node::Tree(child) => self.tree(child, &current),
                Node::List(items) => self.list(items, &current),
                Node::Text(text) if !path.is_empty() && self.pattern.is_match(text) => {
                    let shown = if self.show_record {
                        Node::Tree(tree.clone())
                    } else {
                        value.clone()
                    };
                    let entry = self
                        .results
                        .values
                        .entry(parent.clone())
                        .or_insert_with(Node::empty_tree);
                    if let Some(entry) = entry.as_tree_mut() {
                        entry.insert(key.clone(), shown);
                    }
                }
                _ => {}
            }
        }
    }

    fn list(&mut self, items: &[Node], path: &[String]) {
        for (index, item) in items.iter().enumerate() {
            match item {
                Node::Tree(child) => {
                    let mut current = path.to_vec();
                    current.push(index.to_string());
                    self.tree(child, &current);
                }
                Node::List(nested) => {
                    let mut current = path.to_vec();
                    current.push(index.to_string());
                    self.list(nested, &current);
                }
                Node::Text(text) if !path.is_empty() && self.pattern.is_match(text) => {
                    let shown = if self.show_record {
                        Node::List(items.to_vec())
                    } else {
                        item.clone()
                    };
                    self.results.values.insert(path.join("/"), shown);
                }
                _ => {}
            }
        }
    }
}

/// Search keys and string values of `tree` for `pattern`, ignoring case
pub fn search(tree: &Tree, pattern: &str, show_record: bool) -> Result<SearchResults, SearchError> {
    let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
    let mut searcher = Searcher {
        pattern: &pattern,
        show_record,
        results: SearchResults::default(),
    };
    searcher.tree(tree, &[]);
    Ok(searcher.results)
}
