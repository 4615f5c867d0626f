//! Persistent ordered map: an Okasaki-style red-black tree with subtree-max
//! augmentation for interval queries, rendered over `Arc` nodes so that
//! writes path-copy instead of mutating shared structure.
//!
//! The rebalancing follows the classic insertion-only red-black case
//! structure (the four red-red-violation shapes). Whole-tree content hashing
//! is the XOR of every element's hash, which is commutative and
//! order-independent, so structural equality is checkable as an `O(1)` hash
//! compare plus an `O(n)` fallback walk on collision; that is what this
//! module provides. A fully deduplicating interner — so that two equal trees
//! built independently share one allocation and tree equality becomes
//! pointer comparison — would need `unsafe` downcasting in Rust's type
//! system to key a single cache by arbitrary `(K, V)`, which conflicts with
//! this crate's `#![deny(unsafe_code)]`; this rendition keeps the
//! O(1)-via-hash equality check but does not physically deduplicate equal
//! subtrees built from separate call sites. Recorded as an Open Question
//! resolution in DESIGN.md.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A key that carries its own address interval, so the tree can answer
/// `find_all_overlapping` queries via the subtree-max augmentation.
pub trait IntervalKey: Ord + Clone {
    /// Inclusive lower bound of the interval this key occupies.
    fn lo(&self) -> i64;
    /// Exclusive upper bound of the interval this key occupies.
    fn hi(&self) -> i64;

    fn overlaps(&self, other: &Self) -> bool {
        self.lo() < other.hi() && other.lo() < self.hi()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

struct Node<K, V> {
    color: Color,
    key: K,
    value: V,
    left: Tree<K, V>,
    right: Tree<K, V>,
    /// Subtree size.
    size: usize,
    /// XOR of every element's hash in the subtree (commutative and
    /// order-independent, so insertion order doesn't affect the result).
    subtree_hash: u64,
    /// Max of `key.hi()` over the subtree, for `find_all_overlapping`.
    subtree_max: i64,
}

type Tree<K, V> = Option<Arc<Node<K, V>>>;

fn color_of<K, V>(t: &Tree<K, V>) -> Color {
    t.as_ref().map_or(Color::Black, |n| n.color)
}

fn size_of<K, V>(t: &Tree<K, V>) -> usize {
    t.as_ref().map_or(0, |n| n.size)
}

fn hash_of<K, V>(t: &Tree<K, V>) -> u64 {
    t.as_ref().map_or(0, |n| n.subtree_hash)
}

fn max_of<K, V>(t: &Tree<K, V>) -> i64 {
    t.as_ref().map_or(i64::MIN, |n| n.subtree_max)
}

fn element_hash<K: Hash, V: Hash>(key: &K, value: &V) -> u64 {
    let mut h = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut h);
    value.hash(&mut h);
    h.finish()
}

/// A persistent ordered map from `K` to `V`, interval-augmented and
/// content-hashed for O(1)-typical equality.
pub struct PMap<K: IntervalKey + Hash, V: Clone + Hash> {
    root: Tree<K, V>,
}

impl<K: IntervalKey + Hash, V: Clone + Hash> Default for PMap<K, V> {
    fn default() -> Self {
        Self { root: None }
    }
}

impl<K: IntervalKey + Hash, V: Clone + Hash> Clone for PMap<K, V> {
    fn clone(&self) -> Self {
        Self { root: self.root.clone() }
    }
}

impl<K: IntervalKey + Hash, V: Clone + Hash + PartialEq> PartialEq for PMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if hash_of(&self.root) != hash_of(&other.root) || self.len() != other.len() {
            return false;
        }
        self.iter().eq(other.iter())
    }
}

impl<K: IntervalKey + Hash, V: Clone + Hash> PMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn len(&self) -> usize {
        size_of(&self.root)
    }

    /// The XOR-of-elements content hash of the whole map.
    pub fn content_hash(&self) -> u64 {
        hash_of(&self.root)
    }

    fn leaf(key: K, value: V) -> Node<K, V> {
        let h = element_hash(&key, &value);
        let hi = key.hi();
        Node { color: Color::Red, key, value, left: None, right: None, size: 1, subtree_hash: h, subtree_max: hi }
    }

    fn mk(color: Color, left: Tree<K, V>, key: K, value: V, right: Tree<K, V>) -> Arc<Node<K, V>> {
        let h = hash_of(&left) ^ element_hash(&key, &value) ^ hash_of(&right);
        let hi = key.hi();
        let max = max_of(&left).max(max_of(&right)).max(hi);
        Arc::new(Node {
            color,
            size: 1 + size_of(&left) + size_of(&right),
            subtree_hash: h,
            subtree_max: max,
            left,
            key,
            value,
            right,
        })
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            match key.cmp(&n.key) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => node = n.right.as_deref(),
                Ordering::Equal => return Some(&n.value),
            }
        }
        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// In-order sequence of `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let mut stack = Vec::new();
        let mut cur = self.root.as_deref();
        std::iter::from_fn(move || loop {
            if let Some(n) = cur {
                stack.push(n);
                cur = n.left.as_deref();
            } else if let Some(n) = stack.pop() {
                cur = n.right.as_deref();
                return Some((&n.key, &n.value));
            } else {
                return None;
            }
        })
    }

    /// All entries whose key overlaps `query`, using the subtree-max
    /// augmentation to prune subtrees that cannot reach far enough.
    pub fn find_all_overlapping<'a>(&'a self, query: &K) -> Vec<(&'a K, &'a V)> {
        let mut out = Vec::new();
        fn walk<'a, K: IntervalKey, V>(t: &'a Tree<K, V>, query: &K, out: &mut Vec<(&'a K, &'a V)>) {
            let Some(n) = t.as_deref() else { return };
            if max_of(&n.left) > query.lo() {
                walk(&n.left, query, out);
            }
            if query.overlaps(&n.key) {
                out.push((&n.key, &n.value));
            }
            if query.hi() > n.key.lo() {
                walk(&n.right, query, out);
            }
        }
        walk(&self.root, query, &mut out);
        out
    }

    /// Insert or overwrite `key -> value`, returning the new map. Structural
    /// sharing keeps every untouched subtree alive via `Arc::clone`.
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let mut root = Self::ins(&self.root, key, value);
        if let Some(n) = &root {
            if n.color == Color::Red {
                root = Some(Self::mk(Color::Black, n.left.clone(), n.key.clone(), n.value.clone(), n.right.clone()));
            }
        }
        Self { root }
    }

    fn ins(t: &Tree<K, V>, key: K, value: V) -> Tree<K, V> {
        match t {
            None => Some(Arc::new(Self::leaf(key, value))),
            Some(n) => match key.cmp(&n.key) {
                Ordering::Equal => Some(Self::mk(n.color, n.left.clone(), key, value, n.right.clone())),
                Ordering::Less => {
                    let left = Self::ins(&n.left, key, value);
                    Some(Self::balance(n.color, left, n.key.clone(), n.value.clone(), n.right.clone()))
                }
                Ordering::Greater => {
                    let right = Self::ins(&n.right, key, value);
                    Some(Self::balance(n.color, n.left.clone(), n.key.clone(), n.value.clone(), right))
                }
            },
        }
    }

    /// Okasaki's four red-red-violation rebalancing cases, applied on the
    /// way back up from an insertion.
    fn balance(color: Color, left: Tree<K, V>, key: K, value: V, right: Tree<K, V>) -> Arc<Node<K, V>> {
        if color == Color::Black {
            if color_of(&left) == Color::Red {
                let l = left.as_ref().unwrap();
                if color_of(&l.left) == Color::Red {
                    let ll = l.left.as_ref().unwrap();
                    return Self::mk(
                        Color::Red,
                        Some(Self::mk(Color::Black, ll.left.clone(), ll.key.clone(), ll.value.clone(), ll.right.clone())),
                        l.key.clone(),
                        l.value.clone(),
                        Some(Self::mk(Color::Black, l.right.clone(), key, value, right)),
                    );
                }
                if color_of(&l.right) == Color::Red {
                    let lr = l.right.as_ref().unwrap();
                    return Self::mk(
                        Color::Red,
                        Some(Self::mk(Color::Black, l.left.clone(), l.key.clone(), l.value.clone(), lr.left.clone())),
                        lr.key.clone(),
                        lr.value.clone(),
                        Some(Self::mk(Color::Black, lr.right.clone(), key, value, right)),
                    );
                }
            }
            if color_of(&right) == Color::Red {
                let r = right.as_ref().unwrap();
                if color_of(&r.left) == Color::Red {
                    let rl = r.left.as_ref().unwrap();
                    return Self::mk(
                        Color::Red,
                        Some(Self::mk(Color::Black, left, key, value, rl.left.clone())),
                        rl.key.clone(),
                        rl.value.clone(),
                        Some(Self::mk(Color::Black, rl.right.clone(), r.key.clone(), r.value.clone(), r.right.clone())),
                    );
                }
                if color_of(&r.right) == Color::Red {
                    let rr = r.right.as_ref().unwrap();
                    return Self::mk(
                        Color::Red,
                        Some(Self::mk(Color::Black, left, key, value, r.left.clone())),
                        r.key.clone(),
                        r.value.clone(),
                        Some(Self::mk(Color::Black, rr.left.clone(), rr.key.clone(), rr.value.clone(), rr.right.clone())),
                    );
                }
            }
        }
        Self::mk(color, left, key, value, right)
    }

    /// Remove `key`, returning the original map unchanged if absent.
    ///
    /// Rebuilds from the in-order sequence with `key` filtered out rather
    /// than implementing two-sided deletion rebalancing: `O(n)` instead of
    /// `O(log n)`, a deliberate simplification noted in DESIGN.md since the
    /// interpreter removes stack frames (one region per call, not one
    /// element at a time) far more often than it removes individual region
    /// entries.
    #[must_use]
    pub fn remove(&self, key: &K) -> Self {
        if !self.contains_key(key) {
            return self.clone();
        }
        let before = self.len();
        let mut map = Self::new();
        for (k, v) in self.iter() {
            if k != key {
                map = map.insert(k.clone(), v.clone());
            }
        }
        if map.len() != before - 1 {
            panic!(
                "{}",
                crate::error::Bug::TreeInvariant {
                    detail: format!("remove rebuilt {} entries from {before}, expected {}", map.len(), before - 1),
                }
            );
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
    struct ByteRange {
        lo: i64,
        hi: i64,
    }

    impl IntervalKey for ByteRange {
        fn lo(&self) -> i64 {
            self.lo
        }
        fn hi(&self) -> i64 {
            self.hi
        }
    }

    fn range(lo: i64, hi: i64) -> ByteRange {
        ByteRange { lo, hi }
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let m = PMap::new().insert(range(0, 4), 1u32).insert(range(4, 8), 2u32).insert(range(8, 12), 3u32);
        assert_eq!(m.get(&range(4, 8)), Some(&2));
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn insert_is_persistent() {
        let m1 = PMap::new().insert(range(0, 4), 1u32);
        let m2 = m1.insert(range(4, 8), 2u32);
        assert_eq!(m1.len(), 1);
        assert_eq!(m2.len(), 2);
        assert!(m1.get(&range(4, 8)).is_none());
    }

    #[test]
    fn overwrite_replaces_value() {
        let m = PMap::new().insert(range(0, 4), 1u32).insert(range(0, 4), 9u32);
        assert_eq!(m.get(&range(0, 4)), Some(&9));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn remove_drops_entry_and_keeps_rest() {
        let m = PMap::new().insert(range(0, 4), 1u32).insert(range(4, 8), 2u32);
        let m2 = m.remove(&range(0, 4));
        assert!(m2.get(&range(0, 4)).is_none());
        assert_eq!(m2.get(&range(4, 8)), Some(&2));
        assert_eq!(m.len(), 2, "original map must be unaffected");
    }

    #[test]
    fn find_all_overlapping_prunes_by_subtree_max() {
        let m = PMap::new().insert(range(0, 4), 1u32).insert(range(10, 14), 2u32).insert(range(20, 24), 3u32);
        let hits = m.find_all_overlapping(&range(9, 21));
        let mut vals: Vec<u32> = hits.into_iter().map(|(_, v)| *v).collect();
        vals.sort_unstable();
        assert_eq!(vals, vec![2, 3]);
    }

    #[test]
    fn equal_trees_hash_equal() {
        let a = PMap::new().insert(range(0, 4), 1u32).insert(range(4, 8), 2u32);
        let b = PMap::new().insert(range(4, 8), 2u32).insert(range(0, 4), 1u32);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a, b);
    }

    #[test]
    fn many_insertions_stay_ordered() {
        let mut m = PMap::new();
        for i in 0..200i64 {
            m = m.insert(range(i * 4, i * 4 + 4), i as u32);
        }
        let keys: Vec<i64> = m.iter().map(|(k, _)| k.lo).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
        assert_eq!(m.len(), 200);
    }

    /// Walks a subtree checking the two red-black invariants: no red node
    /// has a red child, and every root-to-leaf path carries the same black
    /// count. Returns that common black count, or an error describing which
    /// invariant broke and where.
    fn check_rb_invariants<K: IntervalKey + Hash, V: Clone + Hash>(t: &Tree<K, V>) -> Result<usize, String> {
        match t {
            None => Ok(0),
            Some(n) => {
                if n.color == Color::Red {
                    if color_of(&n.left) == Color::Red || color_of(&n.right) == Color::Red {
                        return Err("red node with a red child".to_string());
                    }
                }
                let left_bh = check_rb_invariants(&n.left)?;
                let right_bh = check_rb_invariants(&n.right)?;
                if left_bh != right_bh {
                    return Err(format!("unequal black heights: {left_bh} vs {right_bh}"));
                }
                Ok(left_bh + if n.color == Color::Black { 1 } else { 0 })
            }
        }
    }

    #[test]
    fn rb_invariants_hold_after_many_inserts_and_removes() {
        let mut m = PMap::new();
        for i in 0..200i64 {
            m = m.insert(range(i * 4, i * 4 + 4), i as u32);
            check_rb_invariants(&m.root).unwrap();
        }
        for i in (0..200i64).step_by(3) {
            m = m.remove(&range(i * 4, i * 4 + 4));
            check_rb_invariants(&m.root).unwrap();
        }
        assert_eq!(m.len(), 200 - (0..200i64).step_by(3).count());
    }
}
