//! Ordered index backed by a red-black tree.
//!
//! The tree is generic over key, value, and an ordering comparator
//! injected once at construction; every ordering decision goes through
//! that comparator. Nodes live in a slot arena addressed by [`NodeId`],
//! with a sentinel id standing in for the black nil leaf, so the whole
//! structure is safe code with no raw pointers.
//!
//! Ownership contract: the tree owns its nodes, but a key/value pair
//! displaced by a duplicate insert or removed by [`RbTree::remove`] is
//! handed back to the caller rather than dropped internally. Removing
//! a node invalidates only that node's position; every other
//! outstanding [`NodeId`] stays valid.

use std::cmp::Ordering;

/// Position of a live node in the index.
///
/// Returned by insert/find/scan and consumed by the accessors and
/// [`RbTree::remove`]. A position is valid until the node it names is
/// removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(u32);

/// Sentinel standing in for the black nil leaf.
const NIL: NodeId = NodeId(u32::MAX);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    color: Color,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
}

#[derive(Debug)]
enum Slot<K, V> {
    Occupied(Node<K, V>),
    Vacant { next_free: NodeId },
}

/// Outcome of a successful insert.
#[derive(Debug)]
pub enum InsertOutcome<K, V> {
    /// The key was new; a node was created at this position.
    Inserted(NodeId),
    /// An equal key already existed. The new key and value were swapped
    /// into the node and the displaced pair is returned for disposal.
    Replaced {
        node: NodeId,
        previous_key: K,
        previous_value: V,
    },
}

/// Errors from index operations.
///
/// Duplicate keys are a normal outcome ([`InsertOutcome::Replaced`]),
/// not an error; only allocation exhaustion is.
#[derive(Debug, PartialEq, Eq)]
pub enum IndexError {
    /// Memory for a new node could not be reserved.
    AllocationExhausted,
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllocationExhausted => write!(f, "index node allocation exhausted"),
        }
    }
}

impl std::error::Error for IndexError {}

/// A red-black tree keyed by an injected comparator.
pub struct RbTree<K, V, C> {
    slots: Vec<Slot<K, V>>,
    free_head: NodeId,
    root: NodeId,
    len: usize,
    cmp: C,
}

impl<K, V, C> RbTree<K, V, C>
where
    C: Fn(&K, &K) -> Ordering,
{
    /// Create an empty tree ordered by `cmp`.
    pub const fn new(cmp: C) -> Self {
        Self {
            slots: Vec::new(),
            free_head: NIL,
            root: NIL,
            len: 0,
            cmp,
        }
    }

    /// Number of live records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a key/value pair.
    ///
    /// If an equal key exists the new pair is swapped into the node and
    /// the previous pair is returned via [`InsertOutcome::Replaced`];
    /// the tree structure does not change in that case.
    pub fn insert(&mut self, key: K, value: V) -> Result<InsertOutcome<K, V>, IndexError> {
        let mut parent = NIL;
        let mut cur = self.root;
        let mut dir = Ordering::Equal;

        while cur != NIL {
            dir = (self.cmp)(&key, &self.node(cur).key);
            match dir {
                Ordering::Equal => {
                    let node = self.node_mut(cur);
                    let previous_key = std::mem::replace(&mut node.key, key);
                    let previous_value = std::mem::replace(&mut node.value, value);
                    return Ok(InsertOutcome::Replaced {
                        node: cur,
                        previous_key,
                        previous_value,
                    });
                }
                Ordering::Less => {
                    parent = cur;
                    cur = self.node(cur).left;
                }
                Ordering::Greater => {
                    parent = cur;
                    cur = self.node(cur).right;
                }
            }
        }

        let id = self.allocate(Node {
            key,
            value,
            color: Color::Red,
            parent,
            left: NIL,
            right: NIL,
        })?;

        if parent == NIL {
            self.root = id;
        } else if dir == Ordering::Less {
            self.node_mut(parent).left = id;
        } else {
            self.node_mut(parent).right = id;
        }

        self.len += 1;
        self.insert_fixup(id);
        Ok(InsertOutcome::Inserted(id))
    }

    /// Exact-match lookup using the tree's own comparator.
    pub fn find(&self, key: &K) -> Option<NodeId> {
        self.find_by(|stored| (self.cmp)(key, stored))
    }

    /// Exact-match lookup with a caller-supplied probe.
    ///
    /// `probe` must return the ordering of the probe key relative to
    /// the stored key, and must be consistent with the tree's
    /// comparator. This lets a borrowed probe key search without
    /// building an owned key.
    pub fn find_by<F>(&self, probe: F) -> Option<NodeId>
    where
        F: Fn(&K) -> Ordering,
    {
        let mut cur = self.root;
        while cur != NIL {
            match probe(&self.node(cur).key) {
                Ordering::Equal => return Some(cur),
                Ordering::Less => cur = self.node(cur).left,
                Ordering::Greater => cur = self.node(cur).right,
            }
        }
        None
    }

    /// Position of the smallest stored key that is >= the probe key
    /// (inclusive lower bound), or `None` if all stored keys are
    /// smaller. `probe` follows the [`RbTree::find_by`] convention.
    pub fn lower_bound_by<F>(&self, probe: F) -> Option<NodeId>
    where
        F: Fn(&K) -> Ordering,
    {
        let mut cur = self.root;
        let mut best = None;
        while cur != NIL {
            match probe(&self.node(cur).key) {
                Ordering::Greater => cur = self.node(cur).right,
                _ => {
                    best = Some(cur);
                    cur = self.node(cur).left;
                }
            }
        }
        best
    }

    /// Position of the first node in comparator order.
    #[must_use]
    pub fn first(&self) -> Option<NodeId> {
        if self.root == NIL {
            None
        } else {
            Some(self.minimum(self.root))
        }
    }

    /// In-order successor of `id`.
    #[must_use]
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        let right = self.node(id).right;
        if right != NIL {
            return Some(self.minimum(right));
        }
        let mut cur = id;
        let mut parent = self.node(cur).parent;
        while parent != NIL && self.node(parent).right == cur {
            cur = parent;
            parent = self.node(cur).parent;
        }
        if parent == NIL { None } else { Some(parent) }
    }

    #[must_use]
    pub fn key(&self, id: NodeId) -> &K {
        &self.node(id).key
    }

    #[must_use]
    pub fn value(&self, id: NodeId) -> &V {
        &self.node(id).value
    }

    #[must_use]
    pub fn key_value(&self, id: NodeId) -> (&K, &V) {
        let node = self.node(id);
        (&node.key, &node.value)
    }

    /// Swap a new value into the node, returning the previous one.
    pub fn replace_value(&mut self, id: NodeId, value: V) -> V {
        std::mem::replace(&mut self.node_mut(id).value, value)
    }

    /// Remove the node at `id`, rebalance, and return its key/value
    /// pair to the caller. Only `id` is invalidated.
    pub fn remove(&mut self, z: NodeId) -> (K, V) {
        let z_left = self.node(z).left;
        let z_right = self.node(z).right;
        let mut removed_color = self.node(z).color;
        let x;
        let x_parent;

        if z_left == NIL {
            x = z_right;
            x_parent = self.node(z).parent;
            self.transplant(z, z_right);
        } else if z_right == NIL {
            x = z_left;
            x_parent = self.node(z).parent;
            self.transplant(z, z_left);
        } else {
            // Two children: splice the in-order successor into z's
            // structural position by relinking, so no other NodeId moves.
            let y = self.minimum(z_right);
            removed_color = self.node(y).color;
            x = self.node(y).right;
            if self.node(y).parent == z {
                x_parent = y;
            } else {
                x_parent = self.node(y).parent;
                let y_right = self.node(y).right;
                self.transplant(y, y_right);
                self.node_mut(y).right = z_right;
                self.node_mut(z_right).parent = y;
            }
            self.transplant(z, y);
            self.node_mut(y).left = z_left;
            self.node_mut(z_left).parent = y;
            let z_color = self.node(z).color;
            self.node_mut(y).color = z_color;
        }

        if removed_color == Color::Black {
            self.remove_fixup(x, x_parent);
        }

        self.len -= 1;
        let slot = std::mem::replace(
            &mut self.slots[z.0 as usize],
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = z;
        match slot {
            Slot::Occupied(node) => (node.key, node.value),
            Slot::Vacant { .. } => unreachable!("removed position was vacant"),
        }
    }

    fn node(&self, id: NodeId) -> &Node<K, V> {
        match &self.slots[id.0 as usize] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!("position referenced a vacant slot"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        match &mut self.slots[id.0 as usize] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!("position referenced a vacant slot"),
        }
    }

    /// Color of a node, treating the nil sentinel as black.
    fn color(&self, id: NodeId) -> Color {
        if id == NIL {
            Color::Black
        } else {
            self.node(id).color
        }
    }

    fn set_color(&mut self, id: NodeId, color: Color) {
        self.node_mut(id).color = color;
    }

    fn allocate(&mut self, node: Node<K, V>) -> Result<NodeId, IndexError> {
        if self.free_head == NIL {
            if self.slots.len() >= u32::MAX as usize {
                return Err(IndexError::AllocationExhausted);
            }
            self.slots
                .try_reserve(1)
                .map_err(|_| IndexError::AllocationExhausted)?;
            #[allow(clippy::cast_possible_truncation)] // bounded by the check above
            let id = NodeId(self.slots.len() as u32);
            self.slots.push(Slot::Occupied(node));
            Ok(id)
        } else {
            let id = self.free_head;
            let next_free = match &self.slots[id.0 as usize] {
                Slot::Vacant { next_free } => *next_free,
                Slot::Occupied(_) => unreachable!("free list pointed at an occupied slot"),
            };
            self.free_head = next_free;
            self.slots[id.0 as usize] = Slot::Occupied(node);
            Ok(id)
        }
    }

    fn minimum(&self, mut cur: NodeId) -> NodeId {
        while self.node(cur).left != NIL {
            cur = self.node(cur).left;
        }
        cur
    }

    fn rotate_left(&mut self, x: NodeId) {
        let y = self.node(x).right;
        let y_left = self.node(y).left;
        self.node_mut(x).right = y_left;
        if y_left != NIL {
            self.node_mut(y_left).parent = x;
        }
        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if self.node(x_parent).left == x {
            self.node_mut(x_parent).left = y;
        } else {
            self.node_mut(x_parent).right = y;
        }
        self.node_mut(y).left = x;
        self.node_mut(x).parent = y;
    }

    fn rotate_right(&mut self, x: NodeId) {
        let y = self.node(x).left;
        let y_right = self.node(y).right;
        self.node_mut(x).left = y_right;
        if y_right != NIL {
            self.node_mut(y_right).parent = x;
        }
        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        if x_parent == NIL {
            self.root = y;
        } else if self.node(x_parent).right == x {
            self.node_mut(x_parent).right = y;
        } else {
            self.node_mut(x_parent).left = y;
        }
        self.node_mut(y).right = x;
        self.node_mut(x).parent = y;
    }

    /// Replace the subtree rooted at `u` with the one rooted at `v`.
    fn transplant(&mut self, u: NodeId, v: NodeId) {
        let parent = self.node(u).parent;
        if parent == NIL {
            self.root = v;
        } else if self.node(parent).left == u {
            self.node_mut(parent).left = v;
        } else {
            self.node_mut(parent).right = v;
        }
        if v != NIL {
            self.node_mut(v).parent = parent;
        }
    }

    fn insert_fixup(&mut self, mut z: NodeId) {
        while self.color(self.node(z).parent) == Color::Red {
            let parent = self.node(z).parent;
            // A red parent is never the root, so the grandparent exists.
            let grand = self.node(parent).parent;
            if parent == self.node(grand).left {
                let uncle = self.node(grand).right;
                if self.color(uncle) == Color::Red {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grand, Color::Red);
                    z = grand;
                } else {
                    if z == self.node(parent).right {
                        z = parent;
                        self.rotate_left(z);
                    }
                    let parent = self.node(z).parent;
                    let grand = self.node(parent).parent;
                    self.set_color(parent, Color::Black);
                    self.set_color(grand, Color::Red);
                    self.rotate_right(grand);
                }
            } else {
                let uncle = self.node(grand).left;
                if self.color(uncle) == Color::Red {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grand, Color::Red);
                    z = grand;
                } else {
                    if z == self.node(parent).left {
                        z = parent;
                        self.rotate_right(z);
                    }
                    let parent = self.node(z).parent;
                    let grand = self.node(parent).parent;
                    self.set_color(parent, Color::Black);
                    self.set_color(grand, Color::Red);
                    self.rotate_left(grand);
                }
            }
        }
        let root = self.root;
        self.set_color(root, Color::Black);
    }

    /// Restore the black-height invariant after removing a black node.
    ///
    /// `x` may be the nil sentinel, so its parent is tracked explicitly.
    fn remove_fixup(&mut self, mut x: NodeId, mut x_parent: NodeId) {
        while x != self.root && self.color(x) == Color::Black {
            if x_parent == NIL {
                break;
            }
            if x == self.node(x_parent).left {
                let mut w = self.node(x_parent).right;
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(x_parent, Color::Red);
                    self.rotate_left(x_parent);
                    w = self.node(x_parent).right;
                }
                if self.color(self.node(w).left) == Color::Black
                    && self.color(self.node(w).right) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = x_parent;
                    x_parent = self.node(x).parent;
                } else {
                    if self.color(self.node(w).right) == Color::Black {
                        let w_left = self.node(w).left;
                        self.set_color(w_left, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_right(w);
                        w = self.node(x_parent).right;
                    }
                    let parent_color = self.color(x_parent);
                    self.set_color(w, parent_color);
                    self.set_color(x_parent, Color::Black);
                    let w_right = self.node(w).right;
                    if w_right != NIL {
                        self.set_color(w_right, Color::Black);
                    }
                    self.rotate_left(x_parent);
                    x = self.root;
                    x_parent = NIL;
                }
            } else {
                let mut w = self.node(x_parent).left;
                if self.color(w) == Color::Red {
                    self.set_color(w, Color::Black);
                    self.set_color(x_parent, Color::Red);
                    self.rotate_right(x_parent);
                    w = self.node(x_parent).left;
                }
                if self.color(self.node(w).left) == Color::Black
                    && self.color(self.node(w).right) == Color::Black
                {
                    self.set_color(w, Color::Red);
                    x = x_parent;
                    x_parent = self.node(x).parent;
                } else {
                    if self.color(self.node(w).left) == Color::Black {
                        let w_right = self.node(w).right;
                        self.set_color(w_right, Color::Black);
                        self.set_color(w, Color::Red);
                        self.rotate_left(w);
                        w = self.node(x_parent).left;
                    }
                    let parent_color = self.color(x_parent);
                    self.set_color(w, parent_color);
                    self.set_color(x_parent, Color::Black);
                    let w_left = self.node(w).left;
                    if w_left != NIL {
                        self.set_color(w_left, Color::Black);
                    }
                    self.rotate_right(x_parent);
                    x = self.root;
                    x_parent = NIL;
                }
            }
        }
        if x != NIL {
            self.set_color(x, Color::Black);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    type Tree = RbTree<u32, u32, fn(&u32, &u32) -> Ordering>;

    fn new_tree() -> Tree {
        RbTree::new(Ord::cmp)
    }

    fn collect_keys(tree: &Tree) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cur = tree.first();
        while let Some(id) = cur {
            out.push(*tree.key(id));
            cur = tree.next(id);
        }
        out
    }

    impl Tree {
        /// Check the red-black invariants: root black, no red node with
        /// a red child, equal black count on every root-to-nil path.
        fn validate(&self) {
            assert_eq!(self.color(self.root), Color::Black, "root must be black");
            self.validate_subtree(self.root);
        }

        fn validate_subtree(&self, id: NodeId) -> usize {
            if id == NIL {
                return 1;
            }
            let node = self.node(id);
            if node.color == Color::Red {
                assert_eq!(self.color(node.left), Color::Black, "red node with red child");
                assert_eq!(self.color(node.right), Color::Black, "red node with red child");
            }
            let left_height = self.validate_subtree(node.left);
            let right_height = self.validate_subtree(node.right);
            assert_eq!(left_height, right_height, "black height mismatch");
            left_height + usize::from(node.color == Color::Black)
        }
    }

    #[test]
    fn test_insert_then_find() {
        let mut tree = new_tree();
        let id = match tree.insert(7, 70).expect("insert") {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::Replaced { .. } => panic!("unexpected replace"),
        };
        assert_eq!(tree.find(&7), Some(id));
        assert_eq!(tree.value(id), &70);
        assert_eq!(tree.find(&8), None);
    }

    #[test]
    fn test_duplicate_insert_replaces_and_returns_previous() {
        let mut tree = new_tree();
        tree.insert(5, 50).expect("insert");
        match tree.insert(5, 51).expect("insert") {
            InsertOutcome::Replaced {
                node,
                previous_key,
                previous_value,
            } => {
                assert_eq!(previous_key, 5);
                assert_eq!(previous_value, 50);
                assert_eq!(tree.value(node), &51);
            }
            InsertOutcome::Inserted(_) => panic!("expected replace"),
        }
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_remove_then_find_misses() {
        let mut tree = new_tree();
        for k in [3u32, 1, 4, 1, 5, 9, 2, 6] {
            tree.insert(k, k * 10).expect("insert");
        }
        let id = tree.find(&4).expect("find 4");
        let (key, value) = tree.remove(id);
        assert_eq!((key, value), (4, 40));
        assert_eq!(tree.find(&4), None);
        tree.validate();
    }

    #[test]
    fn test_iteration_is_sorted_after_random_inserts() {
        let mut rng = rand::rng();
        let mut keys: Vec<u32> = (0..500).collect();
        keys.shuffle(&mut rng);

        let mut tree = new_tree();
        for &k in &keys {
            tree.insert(k, k).expect("insert");
        }
        assert_eq!(tree.len(), 500);
        tree.validate();

        let visited = collect_keys(&tree);
        let expected: Vec<u32> = (0..500).collect();
        assert_eq!(visited, expected, "in-order walk must be ascending, each key once");
    }

    #[test]
    fn test_random_churn_preserves_invariants() {
        let mut rng = rand::rng();
        let mut keys: Vec<u32> = (0..300).collect();
        keys.shuffle(&mut rng);

        let mut tree = new_tree();
        for &k in &keys {
            tree.insert(k, k).expect("insert");
        }

        // Remove a random half, validating along the way.
        keys.shuffle(&mut rng);
        for &k in keys.iter().take(150) {
            let id = tree.find(&k).expect("key present");
            tree.remove(id);
            tree.validate();
        }
        assert_eq!(tree.len(), 150);

        // The survivors still iterate in order.
        let mut expected: Vec<u32> = keys[150..].to_vec();
        expected.sort_unstable();
        assert_eq!(collect_keys(&tree), expected);
    }

    #[test]
    fn test_remove_keeps_other_positions_valid() {
        let mut tree = new_tree();
        let mut ids = Vec::new();
        for k in 0..20u32 {
            match tree.insert(k, k).expect("insert") {
                InsertOutcome::Inserted(id) => ids.push((k, id)),
                InsertOutcome::Replaced { .. } => panic!("unexpected replace"),
            }
        }
        let (_, doomed) = ids[10];
        tree.remove(doomed);
        for &(k, id) in ids.iter().filter(|(k, _)| *k != 10) {
            assert_eq!(tree.key(id), &k, "surviving position must stay valid");
        }
    }

    #[test]
    fn test_lower_bound() {
        let mut tree = new_tree();
        for k in [10u32, 20, 30] {
            tree.insert(k, k).expect("insert");
        }
        let probe = |target: u32| tree.lower_bound_by(|k| target.cmp(k)).map(|id| *tree.key(id));
        assert_eq!(probe(5), Some(10));
        assert_eq!(probe(10), Some(10), "lower bound is inclusive");
        assert_eq!(probe(11), Some(20));
        assert_eq!(probe(30), Some(30));
        assert_eq!(probe(31), None);
    }

    #[test]
    fn test_replace_value_in_place() {
        let mut tree = new_tree();
        let id = match tree.insert(1, 10).expect("insert") {
            InsertOutcome::Inserted(id) => id,
            InsertOutcome::Replaced { .. } => panic!("unexpected replace"),
        };
        assert_eq!(tree.replace_value(id, 11), 10);
        assert_eq!(tree.value(id), &11);
    }

    #[test]
    fn test_slot_reuse_after_remove() {
        let mut tree = new_tree();
        for k in 0..50u32 {
            tree.insert(k, k).expect("insert");
        }
        for k in 0..50u32 {
            let id = tree.find(&k).expect("present");
            tree.remove(id);
        }
        assert!(tree.is_empty());
        for k in 0..50u32 {
            tree.insert(k, k).expect("insert");
        }
        // Freed slots were recycled rather than growing the arena.
        assert_eq!(tree.slots.len(), 50);
        tree.validate();
    }
}
