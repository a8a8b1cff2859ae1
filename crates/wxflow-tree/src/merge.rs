//! Deep merge-update of configuration trees.

use crate::Node;

/// Update `dst` with the contents of `src`.
///
/// For every key in `src`: when both sides hold mappings, the merge
/// recurses; otherwise the source value replaces the destination value
/// wholesale. Sequences are never concatenated. Keys new to `dst` append
/// in source order.
pub fn deep_update(dst: &mut Node, src: &Node) {
    match (dst, src) {
        (Node::Map(dst_map), Node::Map(src_map)) => {
            for (key, src_value) in src_map {
                match dst_map.get_mut(key) {
                    Some(dst_value) if dst_value.is_map() && src_value.is_map() => {
                        deep_update(dst_value, src_value);
                    }
                    _ => {
                        dst_map.insert(key.clone(), src_value.clone());
                    }
                }
            }
        }
        (dst, src) => *dst = src.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_merge() {
        let mut dst = Node::from([(
            "s",
            Node::from([("a", Node::from(1)), ("b", Node::from(2))]),
        )]);
        let src = Node::from([("s", Node::from([("b", Node::from(3))]))]);
        deep_update(&mut dst, &src);
        assert_eq!(
            dst,
            Node::from([(
                "s",
                Node::from([("a", Node::from(1)), ("b", Node::from(3))]),
            )])
        );
    }

    #[test]
    fn test_sequences_replaced_wholesale() {
        let mut dst = Node::from([("l", Node::Seq(vec![Node::from(1), Node::from(2)]))]);
        let src = Node::from([("l", Node::Seq(vec![Node::from(3)]))]);
        deep_update(&mut dst, &src);
        assert_eq!(dst, Node::from([("l", Node::Seq(vec![Node::from(3)]))]));
    }

    #[test]
    fn test_scalar_replaces_mapping() {
        let mut dst = Node::from([("k", Node::from([("x", Node::from(1))]))]);
        let src = Node::from([("k", Node::from("flat"))]);
        deep_update(&mut dst, &src);
        assert_eq!(dst, Node::from([("k", Node::from("flat"))]));
    }

    #[test]
    fn test_associativity_for_mappings() {
        let a = Node::from([("k", Node::from([("x", Node::from(1))]))]);
        let b = Node::from([("k", Node::from([("y", Node::from(2))]))]);
        let c = Node::from([("k", Node::from([("x", Node::from(9))]))]);

        // merge(merge(a, b), c)
        let mut left = a.clone();
        deep_update(&mut left, &b);
        deep_update(&mut left, &c);

        // merge(a, merge(b, c))
        let mut bc = b.clone();
        deep_update(&mut bc, &c);
        let mut right = a.clone();
        deep_update(&mut right, &bc);

        assert_eq!(left, right);
    }
}
