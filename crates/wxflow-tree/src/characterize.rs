//! Leaf classification: complete, empty, or still template-bearing.

use crate::{KeyPath, Node};

/// The three leaf classes of a tree, each a list of dotted key-paths.
///
/// Null and empty-string leaves form a distinct *empty* class; everything
/// that is neither empty nor template-bearing is *complete*.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Characterization {
    pub complete: Vec<KeyPath>,
    pub empty: Vec<KeyPath>,
    pub template: Vec<KeyPath>,
}

impl Characterization {
    /// True when no leaf still carries a template marker.
    pub fn is_fully_rendered(&self) -> bool {
        self.template.is_empty()
    }
}

/// Classify every leaf of `tree` by dotted key-path.
///
/// Sequence elements classify under their enclosing key's path.
pub fn characterize(tree: &Node) -> Characterization {
    let mut result = Characterization::default();
    walk(tree, &KeyPath::new(), &mut result);
    result
}

fn walk(node: &Node, path: &KeyPath, out: &mut Characterization) {
    match node {
        Node::Map(m) => {
            for (key, value) in m {
                walk(value, &path.child(key.clone()), out);
            }
        }
        Node::Seq(items) => {
            for item in items {
                walk(item, path, out);
            }
        }
        leaf => classify(leaf, path, out),
    }
}

fn classify(leaf: &Node, path: &KeyPath, out: &mut Characterization) {
    if leaf.is_template_bearing() {
        out.template.push(path.clone());
    } else {
        match leaf {
            Node::Null => out.empty.push(path.clone()),
            Node::Str(s) if s.is_empty() => out.empty.push(path.clone()),
            _ => out.complete.push(path.clone()),
        }
    }
}
