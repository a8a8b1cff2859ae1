//! Structural comparison of trees, reported as a flat diff table.

use crate::Node;
use std::collections::BTreeMap;
use std::fmt;

/// One differing key in a tree comparison.
///
/// `section` is the dotted path of the enclosing mapping and `key` the
/// leaf key. A side missing the key renders with an empty value and the
/// type `missing`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
    pub section: String,
    pub key: String,
    pub left_value: String,
    pub left_type: String,
    pub right_value: String,
    pub right_type: String,
}

impl fmt::Display for DiffRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:<20} {:<20} {:<8} {:<20} {:<8}",
            self.section,
            self.key,
            self.left_value,
            self.left_type,
            self.right_value,
            self.right_type
        )
    }
}

/// Compare two trees and report every differing or one-sided key.
///
/// Rows are lexicographically sorted by (section, key). An empty result
/// means the trees are structurally equal (mapping order ignored).
pub fn diff(left: &Node, right: &Node) -> Vec<DiffRow> {
    let mut left_leaves = BTreeMap::new();
    flatten(left, String::new(), &mut left_leaves);
    let mut right_leaves = BTreeMap::new();
    flatten(right, String::new(), &mut right_leaves);

    let mut keys: Vec<(String, String)> = left_leaves.keys().cloned().collect();
    for key in right_leaves.keys() {
        if !left_leaves.contains_key(key) {
            keys.push(key.clone());
        }
    }
    keys.sort();

    let mut rows = Vec::new();
    for (section, key) in keys {
        let l = left_leaves.get(&(section.clone(), key.clone()));
        let r = right_leaves.get(&(section.clone(), key.clone()));
        if l == r {
            continue;
        }
        let (left_value, left_type) = describe(l);
        let (right_value, right_type) = describe(r);
        rows.push(DiffRow {
            section,
            key,
            left_value,
            left_type,
            right_value,
            right_type,
        });
    }
    rows
}

fn describe(node: Option<&Node>) -> (String, String) {
    match node {
        Some(n) => (n.to_string(), n.type_name().to_string()),
        None => (String::new(), "missing".to_string()),
    }
}

/// Flatten a tree to (section, key) -> leaf. Non-empty mappings recurse;
/// everything else (sequences included) is a leaf.
fn flatten(node: &Node, section: String, out: &mut BTreeMap<(String, String), Node>) {
    if let Node::Map(m) = node {
        for (key, value) in m {
            match value {
                Node::Map(child) if !child.is_empty() => {
                    let nested = if section.is_empty() {
                        key.clone()
                    } else {
                        format!("{section}.{key}")
                    };
                    flatten(value, nested, out);
                }
                _ => {
                    out.insert((section.clone(), key.clone()), value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_trees_have_no_rows() {
        let a = Node::from([("s", Node::from([("k", Node::from(1))]))]);
        let b = Node::from([("s", Node::from([("k", Node::from(1))]))]);
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn test_differing_value() {
        let a = Node::from([("s", Node::from([("k", Node::from(1))]))]);
        let b = Node::from([("s", Node::from([("k", Node::from("x"))]))]);
        let rows = diff(&a, &b);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].section, "s");
        assert_eq!(rows[0].key, "k");
        assert_eq!(rows[0].left_type, "integer");
        assert_eq!(rows[0].right_type, "string");
    }

    #[test]
    fn test_missing_key_renders_missing() {
        let a = Node::from([("s", Node::from([("k", Node::from(1))]))]);
        let b = Node::from([("s", Node::map())]);
        let rows = diff(&a, &b);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].right_value, "");
        assert_eq!(rows[0].right_type, "missing");
    }

    #[test]
    fn test_rows_sorted() {
        let a = Node::from([
            ("z", Node::from([("b", Node::from(1)), ("a", Node::from(1))])),
            ("m", Node::from([("c", Node::from(1))])),
        ]);
        let b = Node::map();
        let rows = diff(&a, &b);
        let order: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.section.clone(), r.key.clone()))
            .collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_symmetric() {
        let a = Node::from([("s", Node::from([("k", Node::from(1))]))]);
        let b = Node::from([("s", Node::from([("k", Node::from(2))]))]);
        let ab = diff(&a, &b);
        let ba = diff(&b, &a);
        assert_eq!(ab.len(), ba.len());
        assert_eq!(ab[0].left_value, ba[0].right_value);
    }
}
