//! Intrusive-in-spirit, value-owning order-statistic AVL tree.
//!
//! Ported from `avl/cxx/avl.cxx` / `avl/c/avl.c`: `update`, `rotateLeft`,
//! `rotateRight`, `fixLeft`, `fixRight` and the two-case `del` are carried
//! over with the same rebalance-case selection. The original walks back to
//! the root via live `parent` pointers after every structural change; this
//! tree instead rebalances on the way back up a recursive call (the
//! Rust-ownership-respecting equivalent spec.md §9 invites), and answers
//! rank queries ([`AvlTree::rank_of`], [`AvlTree::select`]) by redescending
//! from the root rather than following a stored back-link. See DESIGN.md.

use std::cmp::Ordering;

type Link<T> = Option<Box<Node<T>>>;

struct Node<T> {
    value: T,
    height: u32,
    size: u32,
    left: Link<T>,
    right: Link<T>,
}

impl<T> Node<T> {
    fn leaf(value: T) -> Box<Node<T>> {
        Box::new(Node { value, height: 1, size: 1, left: None, right: None })
    }
}

fn height<T>(link: &Link<T>) -> u32 {
    link.as_ref().map_or(0, |n| n.height)
}

fn size<T>(link: &Link<T>) -> u32 {
    link.as_ref().map_or(0, |n| n.size)
}

fn update<T>(node: &mut Node<T>) {
    node.height = 1 + height(&node.left).max(height(&node.right));
    node.size = 1 + size(&node.left) + size(&node.right);
}

/// Standard single left rotation. `node.right` must be `Some`.
fn rotate_left<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    let mut new_root = node.right.take().expect("rotate_left needs a right child");
    node.right = new_root.left.take();
    update(&mut node);
    new_root.left = Some(node);
    update(&mut new_root);
    new_root
}

/// Standard single right rotation. `node.left` must be `Some`.
fn rotate_right<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    let mut new_root = node.left.take().expect("rotate_right needs a left child");
    node.left = new_root.right.take();
    update(&mut node);
    new_root.right = Some(node);
    update(&mut new_root);
    new_root
}

/// The left subtree is two deeper than the right; rotate to fix.
fn fix_left<T>(mut root: Box<Node<T>>) -> Box<Node<T>> {
    let left = root.left.take().expect("fix_left needs a left child");
    if height(&left.left) < height(&left.right) {
        root.left = Some(rotate_left(left));
    } else {
        root.left = Some(left);
    }
    rotate_right(root)
}

/// The right subtree is two deeper than the left; rotate to fix.
fn fix_right<T>(mut root: Box<Node<T>>) -> Box<Node<T>> {
    let right = root.right.take().expect("fix_right needs a right child");
    if height(&right.right) < height(&right.left) {
        root.right = Some(rotate_right(right));
    } else {
        root.right = Some(right);
    }
    rotate_left(root)
}

/// Recompute height/size and rebalance a single node after a structural
/// change directly below it.
fn fix<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    update(&mut node);
    let l = height(&node.left);
    let r = height(&node.right);
    if l == r + 2 {
        fix_left(node)
    } else if l + 2 == r {
        fix_right(node)
    } else {
        node
    }
}

/// Remove the minimum node of `link`, returning the popped value and the
/// resulting (rebalanced) subtree.
fn remove_min<T>(mut link: Box<Node<T>>) -> (Box<Node<T>>, Link<T>) {
    match link.left.take() {
        None => {
            let right = link.right.take();
            (link, right)
        }
        Some(left) => {
            let (min_node, new_left) = remove_min(left);
            link.left = new_left;
            (min_node, Some(fix(link)))
        }
    }
}

/// Delete the root of `node`, returning the rebalanced replacement subtree
/// together with the removed value.
fn delete_root<T>(node: Box<Node<T>>) -> (Link<T>, T) {
    let Node { value, left, right, .. } = *node;
    match right {
        None => (left, value),
        Some(right) => {
            let (successor, new_right) = remove_min(right);
            let mut successor = successor;
            successor.left = left;
            successor.right = new_right;
            (Some(fix(successor)), value)
        }
    }
}

/// Order-statistic AVL tree. `Cmp` orders two values the same way
/// throughout a tree's lifetime — changing it between calls on the same
/// tree breaks every invariant.
pub struct AvlTree<T> {
    root: Link<T>,
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AvlTree<T> {
    pub fn new() -> Self {
        AvlTree { root: None }
    }

    pub fn len(&self) -> usize {
        size(&self.root) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert `value` according to `cmp`. No duplicate handling: the
    /// caller (`SortedSet`) is responsible for checking existence first.
    pub fn insert(&mut self, value: T, cmp: &impl Fn(&T, &T) -> Ordering) {
        self.root = Some(Self::insert_into(self.root.take(), value, cmp));
    }

    fn insert_into(
        link: Link<T>,
        value: T,
        cmp: &impl Fn(&T, &T) -> Ordering,
    ) -> Box<Node<T>> {
        match link {
            None => Node::leaf(value),
            Some(mut node) => {
                match cmp(&value, &node.value) {
                    Ordering::Less => {
                        node.left = Some(Self::insert_into(node.left.take(), value, cmp));
                    }
                    _ => {
                        node.right = Some(Self::insert_into(node.right.take(), value, cmp));
                    }
                }
                fix(node)
            }
        }
    }

    /// Remove the value equal (under `cmp`) to `target`, returning it.
    pub fn remove(&mut self, target: &T, cmp: &impl Fn(&T, &T) -> Ordering) -> Option<T> {
        let (new_root, removed) = Self::remove_from(self.root.take(), target, cmp);
        self.root = new_root;
        removed
    }

    fn remove_from(
        link: Link<T>,
        target: &T,
        cmp: &impl Fn(&T, &T) -> Ordering,
    ) -> (Link<T>, Option<T>) {
        match link {
            None => (None, None),
            Some(mut node) => match cmp(target, &node.value) {
                Ordering::Less => {
                    let (new_left, removed) = Self::remove_from(node.left.take(), target, cmp);
                    node.left = new_left;
                    (Some(fix(node)), removed)
                }
                Ordering::Greater => {
                    let (new_right, removed) = Self::remove_from(node.right.take(), target, cmp);
                    node.right = new_right;
                    (Some(fix(node)), removed)
                }
                Ordering::Equal => {
                    let (new_root, value) = delete_root(node);
                    (new_root, Some(value))
                }
            },
        }
    }

    /// The smallest value with `cmp(value, &candidate) != Greater`, i.e.
    /// the least value that is `>= candidate` under `cmp`'s ordering.
    pub fn ceiling(&self, candidate: &T, cmp: &impl Fn(&T, &T) -> Ordering) -> Option<&T> {
        let mut found: Option<&T> = None;
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            if cmp(&node.value, candidate) == Ordering::Less {
                cursor = node.right.as_deref();
            } else {
                found = Some(&node.value);
                cursor = node.left.as_deref();
            }
        }
        found
    }

    /// 0-based in-order rank of the value equal to `target` under `cmp`.
    pub fn rank_of(&self, target: &T, cmp: &impl Fn(&T, &T) -> Ordering) -> Option<usize> {
        let mut cursor = self.root.as_deref();
        let mut rank = 0usize;
        while let Some(node) = cursor {
            match cmp(target, &node.value) {
                Ordering::Less => cursor = node.left.as_deref(),
                Ordering::Greater => {
                    rank += size(&node.left) as usize + 1;
                    cursor = node.right.as_deref();
                }
                Ordering::Equal => return Some(rank + size(&node.left) as usize),
            }
        }
        None
    }

    /// The value at 0-based in-order position `k`, if `k < len()`.
    pub fn select(&self, k: usize) -> Option<&T> {
        let mut cursor = self.root.as_deref();
        let mut k = k;
        while let Some(node) = cursor {
            let left_size = size(&node.left) as usize;
            match k.cmp(&left_size) {
                Ordering::Less => cursor = node.left.as_deref(),
                Ordering::Equal => return Some(&node.value),
                Ordering::Greater => {
                    k -= left_size + 1;
                    cursor = node.right.as_deref();
                }
            }
        }
        None
    }

    /// `rank_of(member) + delta`, bounds-checked, per spec.md's rank walk.
    pub fn offset(
        &self,
        member: &T,
        delta: i64,
        cmp: &impl Fn(&T, &T) -> Ordering,
    ) -> Option<&T> {
        let rank = self.rank_of(member, cmp)? as i64;
        let target = rank + delta;
        if target < 0 {
            return None;
        }
        self.select(target as usize)
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        fn walk<T>(link: &Link<T>) -> (u32, u32) {
            match link {
                None => (0, 0),
                Some(node) => {
                    let (lh, ls) = walk(&node.left);
                    let (rh, rs) = walk(&node.right);
                    assert_eq!(node.height, 1 + lh.max(rh));
                    assert_eq!(node.size, 1 + ls + rs);
                    assert!(lh.abs_diff(rh) <= 1);
                    (node.height, node.size)
                }
            }
        }
        walk(&self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp_i32(a: &i32, b: &i32) -> Ordering {
        a.cmp(b)
    }

    #[test]
    fn insert_maintains_invariants_and_order() {
        let mut t = AvlTree::new();
        for v in [5, 3, 8, 1, 4, 7, 9, 2, 6, 0] {
            t.insert(v, &cmp_i32);
            t.check_invariants();
        }
        assert_eq!(t.len(), 10);
        let mut collected = Vec::new();
        for i in 0..10 {
            collected.push(*t.select(i).unwrap());
        }
        assert_eq!(collected, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn rank_and_select_are_inverses() {
        let mut t = AvlTree::new();
        let n = 200;
        for v in 0..n {
            t.insert(v, &cmp_i32);
        }
        for i in 0..n {
            assert_eq!(t.rank_of(&i, &cmp_i32), Some(i as usize));
            assert_eq!(t.select(i as usize), Some(&i));
        }
    }

    #[test]
    fn offset_walks_and_reports_out_of_range() {
        let mut t = AvlTree::new();
        let n = 50i32;
        for v in 0..n {
            t.insert(v, &cmp_i32);
        }
        for i in 0..n {
            for j in 0..n {
                assert_eq!(t.offset(&i, (j - i) as i64, &cmp_i32), Some(&j));
            }
            assert_eq!(t.offset(&i, -(i as i64) - 1, &cmp_i32), None);
            assert_eq!(t.offset(&i, (n - i) as i64, &cmp_i32), None);
        }
    }

    #[test]
    fn remove_keeps_invariants() {
        let mut t = AvlTree::new();
        for v in 0..100 {
            t.insert(v, &cmp_i32);
        }
        for v in (0..100).step_by(2) {
            assert_eq!(t.remove(&v, &cmp_i32), Some(v));
            t.check_invariants();
        }
        assert_eq!(t.len(), 50);
        for v in 0..100 {
            if v % 2 == 0 {
                assert_eq!(t.rank_of(&v, &cmp_i32), None);
            } else {
                assert!(t.rank_of(&v, &cmp_i32).is_some());
            }
        }
    }

    #[test]
    fn ceiling_finds_smallest_not_less() {
        let mut t = AvlTree::new();
        for v in [10, 20, 30, 40] {
            t.insert(v, &cmp_i32);
        }
        assert_eq!(t.ceiling(&25, &cmp_i32), Some(&30));
        assert_eq!(t.ceiling(&40, &cmp_i32), Some(&40));
        assert_eq!(t.ceiling(&41, &cmp_i32), None);
        assert_eq!(t.ceiling(&0, &cmp_i32), Some(&10));
    }
}
