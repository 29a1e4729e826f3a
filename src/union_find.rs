//! Union-Find (disjoint set) structure used to merge stop clusters.
//!
//! Generic over the element type, with path compression and union by rank.
//! Ties are broken on `Ord` so repeated runs over the same input produce the
//! same roots and [`UnionFind::groups`] output is deterministic.

use std::collections::HashMap;
use std::hash::Hash;

/// Disjoint-set forest over elements of type `T`.
#[derive(Debug, Clone, Default)]
pub struct UnionFind<T> {
    parent: HashMap<T, T>,
    rank: HashMap<T, usize>,
}

impl<T> UnionFind<T>
where
    T: Clone + Eq + Hash + Ord,
{
    /// Create an empty structure.
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
            rank: HashMap::new(),
        }
    }

    /// Register an element as its own singleton set. No-op when already
    /// present.
    pub fn make_set(&mut self, item: T) {
        if !self.parent.contains_key(&item) {
            self.parent.insert(item.clone(), item.clone());
            self.rank.insert(item, 0);
        }
    }

    /// Find the root of the set containing `item`, compressing the path.
    ///
    /// Unknown elements are registered as singletons first.
    pub fn find(&mut self, item: &T) -> T {
        if !self.parent.contains_key(item) {
            self.make_set(item.clone());
            return item.clone();
        }

        // Walk to the root, then point every visited node directly at it.
        let mut root = item.clone();
        while self.parent[&root] != root {
            root = self.parent[&root].clone();
        }

        let mut current = item.clone();
        while current != root {
            let next = self.parent[&current].clone();
            self.parent.insert(current, root.clone());
            current = next;
        }

        root
    }

    /// Merge the sets containing `a` and `b`.
    pub fn union(&mut self, a: &T, b: &T) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }

        let rank_a = self.rank[&root_a];
        let rank_b = self.rank[&root_b];

        // Attach the shallower tree under the deeper one; on equal ranks the
        // smaller element stays root so results are order-independent.
        let (new_root, child) = if rank_a > rank_b {
            (root_a, root_b)
        } else if rank_b > rank_a {
            (root_b, root_a)
        } else if root_a < root_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };

        self.parent.insert(child, new_root.clone());
        if rank_a == rank_b {
            *self.rank.get_mut(&new_root).unwrap() += 1;
        }
    }

    /// Whether both elements belong to the same set.
    pub fn connected(&mut self, a: &T, b: &T) -> bool {
        self.find(a) == self.find(b)
    }

    /// All sets, keyed by root, members sorted.
    pub fn groups(&mut self) -> HashMap<T, Vec<T>> {
        let items: Vec<T> = self.parent.keys().cloned().collect();
        let mut groups: HashMap<T, Vec<T>> = HashMap::new();
        for item in items {
            let root = self.find(&item);
            groups.entry(root).or_default().push(item);
        }
        for members in groups.values_mut() {
            members.sort();
        }
        groups
    }
}
