//! Grid-hash trie over vectors with components normalized to [0, 1].
//!
//! Each level buckets one vector dimension into `bins` equal-width bins;
//! a full descent consumes every dimension and lands in a leaf bag. After
//! all insertions, a one-time [`GridTrie::link`] pass wires the leaves into
//! a circular ring in traversal order, enabling radius-bounded neighbor
//! expansion along the ring without re-descending the tree. Linking
//! invalidates further insertion.


/// A nearest-value answer from the trie.
#[derive(Debug, Clone, PartialEq)]
pub struct TrieMatch {
    /// Index of the vector in insertion order.
    pub id: usize,
    /// Euclidean distance from the query.
    pub distance: f32,
    /// Stored vectors compared while answering this query.
    pub comparisons: usize,
}

#[derive(Debug)]
struct TrieNode {
    /// Child node per bin; allocated on demand during insertion.
    children: Box<[Option<usize>]>,
    /// Leaf bag of inserted vector ids; empty for branch nodes.
    values: Vec<usize>,
    /// Ring neighbors, wired by `link()`.
    left: Option<usize>,
    right: Option<usize>,
}

impl TrieNode {
    fn new(bins: usize) -> Self {
        Self {
            children: vec![None; bins].into_boxed_slice(),
            values: Vec::new(),
            left: None,
            right: None,
        }
    }
}

/// Grid-hash trie index.
#[derive(Debug)]
pub struct GridTrie {
    bins: usize,
    dims: usize,
    nodes: Vec<TrieNode>,
    vectors: Vec<Vec<f32>>,
    linked: bool,
}

impl GridTrie {
    /// Empty trie for `dims`-dimensional vectors bucketed into `bins` bins
    /// per dimension.
    pub fn new(bins: usize, dims: usize) -> Self {
        assert!(bins >= 2, "bins must be at least 2, got {bins}");
        assert!(dims >= 1, "dims must be at least 1, got {dims}");
        Self {
            bins,
            dims,
            nodes: vec![TrieNode::new(bins)],
            vectors: Vec::new(),
            linked: false,
        }
    }

    /// Number of inserted vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// The coordinates of a stored vector.
    pub fn vector(&self, id: usize) -> &[f32] {
        &self.vectors[id]
    }

    /// Insert a vector, descending one level per dimension and creating
    /// child nodes on demand.
    ///
    /// Panics after [`GridTrie::link`] has run, on a dimensionality
    /// mismatch, or on components outside [0, 1]; all three are programming
    /// errors.
    pub fn insert(&mut self, vector: Vec<f32>) {
        assert!(!self.linked, "insertion after link() is not permitted");
        assert_eq!(
            vector.len(),
            self.dims,
            "vector must have {} dimensions",
            self.dims
        );

        let mut node = 0usize;
        for level in 0..self.dims {
            let bin = self.bin_index(vector[level]);
            node = match self.nodes[node].children[bin] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::new(self.bins));
                    self.nodes[node].children[bin] = Some(child);
                    child
                }
            };
        }

        let id = self.vectors.len();
        self.vectors.push(vector);
        self.nodes[node].values.push(id);
    }

    /// Wire all leaves into a circular ring in pre-order traversal order.
    ///
    /// Must run exactly once, after the final insertion; the ring is what
    /// makes radius expansion possible at query time.
    pub fn link(&mut self) {
        assert!(!self.linked, "link() must run exactly once");

        let leaves = self.collect_leaves();
        let count = leaves.len();
        for (i, &leaf) in leaves.iter().enumerate() {
            let next = leaves[(i + 1) % count];
            self.nodes[leaf].right = Some(next);
            self.nodes[next].left = Some(leaf);
        }

        for &leaf in &leaves {
            debug_assert!(self.nodes[leaf].left.is_some());
            debug_assert!(self.nodes[leaf].right.is_some());
        }

        self.linked = true;
        tracing::debug!(leaves = count, "trie leaves linked");
    }

    /// Pre-order leaf enumeration with an explicit stack.
    fn collect_leaves(&self) -> Vec<usize> {
        let mut leaves = Vec::new();
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            if !self.nodes[node].values.is_empty() {
                leaves.push(node);
                continue;
            }
            // Push children in reverse so bin 0 is expanded first.
            for child in self.nodes[node].children.iter().rev().flatten() {
                stack.push(*child);
            }
        }
        leaves
    }

    /// Number of leaves currently holding values.
    pub fn leaf_count(&self) -> usize {
        self.collect_leaves().len()
    }

    /// Nearest stored vector, scanning the candidate leaf and `radius`
    /// ring neighbors on each side.
    ///
    /// Approximate: the candidate leaf is found by descending to the
    /// closest existing child at every level, so the true nearest vector
    /// may live in a leaf outside the scanned window.
    pub fn nearest(&self, query: &[f32], radius: usize) -> Option<TrieMatch> {
        self.check_query(query, radius);
        let mut comparisons = 0usize;
        let start = self.candidate_leaf(query)?;

        let mut best = self.nearest_in_bag(start, query, &mut comparisons);

        let mut left = start;
        let mut right = start;
        for _ in 0..radius {
            left = self.nodes[left].left.expect("ring is closed after link()");
            right = self.nodes[right].right.expect("ring is closed after link()");

            for leaf in [left, right] {
                if let Some(candidate) = self.nearest_in_bag(leaf, query, &mut comparisons)
                    && candidate.1 < best.map_or(f32::INFINITY, |b| b.1)
                {
                    best = Some(candidate);
                }
            }
            if left == right {
                // The window wrapped all the way around the ring.
                break;
            }
        }

        best.map(|(id, distance)| TrieMatch {
            id,
            distance,
            comparisons,
        })
    }

    /// Ring-expansion search that returns the first match within
    /// `max_distance`, or `None` when the window holds no such vector.
    pub fn nearest_within(
        &self,
        query: &[f32],
        max_distance: f32,
        radius: usize,
    ) -> Option<TrieMatch> {
        self.check_query(query, radius);
        let mut comparisons = 0usize;
        let start = self.candidate_leaf(query)?;

        if let Some((id, distance)) = self.nearest_in_bag(start, query, &mut comparisons)
            && distance <= max_distance
        {
            return Some(TrieMatch {
                id,
                distance,
                comparisons,
            });
        }

        let mut left = start;
        let mut right = start;
        for _ in 0..radius {
            left = self.nodes[left].left.expect("ring is closed after link()");
            right = self.nodes[right].right.expect("ring is closed after link()");

            for leaf in [left, right] {
                if let Some((id, distance)) = self.nearest_in_bag(leaf, query, &mut comparisons)
                    && distance <= max_distance
                {
                    return Some(TrieMatch {
                        id,
                        distance,
                        comparisons,
                    });
                }
            }
            if left == right {
                break;
            }
        }

        None
    }

    /// The k nearest vectors found within the ring window, ascending by
    /// distance. The list is bounded: insertion-sorted with capacity k.
    pub fn k_nearest(&self, query: &[f32], k: usize, radius: usize) -> Vec<TrieMatch> {
        self.check_query(query, radius);
        if k == 0 {
            return Vec::new();
        }

        let mut comparisons = 0usize;
        let Some(start) = self.candidate_leaf(query) else {
            return Vec::new();
        };

        let mut best = BoundedBestList::new(k);
        self.scan_bag_into(start, query, &mut best, &mut comparisons);

        let mut left = start;
        let mut right = start;
        for _ in 0..radius {
            left = self.nodes[left].left.expect("ring is closed after link()");
            right = self.nodes[right].right.expect("ring is closed after link()");
            self.scan_bag_into(left, query, &mut best, &mut comparisons);
            if right != left {
                self.scan_bag_into(right, query, &mut best, &mut comparisons);
            }
            if left == right {
                break;
            }
        }

        best.into_matches(comparisons)
    }

    fn check_query(&self, query: &[f32], radius: usize) {
        assert_eq!(
            query.len(),
            self.dims,
            "query must have {} dimensions",
            self.dims
        );
        assert!(
            self.linked || radius == 0,
            "radius expansion requires link()"
        );
    }

    /// Descend to a leaf following the query's bin at every level, falling
    /// back to the circularly closest existing child when the exact bin is
    /// empty.
    fn candidate_leaf(&self, query: &[f32]) -> Option<usize> {
        if self.vectors.is_empty() {
            return None;
        }
        let mut node = 0usize;
        for level in 0..self.dims {
            let bin = self.bin_index(query[level]);
            node = self.closest_child(node, bin)?;
        }
        Some(node)
    }

    /// The child in the given bin, or the existing child with the smallest
    /// circular bin distance.
    fn closest_child(&self, node: usize, bin: usize) -> Option<usize> {
        let children = &self.nodes[node].children;
        if let Some(child) = children[bin] {
            return Some(child);
        }

        let mut best_distance = usize::MAX;
        let mut best_child = None;
        for (j, child) in children.iter().enumerate() {
            let Some(child) = child else { continue };
            let distance = self.bin_distance(bin, j);
            if distance < best_distance {
                best_distance = distance;
                best_child = Some(*child);
            }
        }
        best_child
    }

    fn nearest_in_bag(
        &self,
        leaf: usize,
        query: &[f32],
        comparisons: &mut usize,
    ) -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for &id in &self.nodes[leaf].values {
            *comparisons += 1;
            let distance = euclidean(query, &self.vectors[id]);
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((id, distance));
            }
        }
        best
    }

    fn scan_bag_into(
        &self,
        leaf: usize,
        query: &[f32],
        best: &mut BoundedBestList,
        comparisons: &mut usize,
    ) {
        for &id in &self.nodes[leaf].values {
            *comparisons += 1;
            best.insert(id, euclidean(query, &self.vectors[id]));
        }
    }

    /// Bin for a component value in [0, 1]: `round(value * (bins - 1))`.
    ///
    /// Out-of-range components are a programming error: the trie indexes
    /// pre-normalized vectors only.
    fn bin_index(&self, value: f32) -> usize {
        assert!(
            (0.0..=1.0).contains(&value),
            "component {value} outside [0, 1]; vectors must be pre-normalized"
        );
        ((value * (self.bins - 1) as f32).round() as usize).min(self.bins - 1)
    }

    /// Circular distance between two bins.
    fn bin_distance(&self, a: usize, b: usize) -> usize {
        let d = a.abs_diff(b);
        d.min(self.bins - d)
    }
}

#[inline]
fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

/// Insertion-sorted best-k list with fixed capacity.
#[derive(Debug)]
struct BoundedBestList {
    capacity: usize,
    items: Vec<(usize, f32)>,
}

impl BoundedBestList {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    fn insert(&mut self, id: usize, distance: f32) {
        let position = self
            .items
            .partition_point(|&(_, d)| d <= distance);
        if position >= self.capacity {
            return;
        }
        self.items.insert(position, (id, distance));
        self.items.truncate(self.capacity);
    }

    fn into_matches(self, comparisons: usize) -> Vec<TrieMatch> {
        self.items
            .into_iter()
            .map(|(id, distance)| TrieMatch {
                id,
                distance,
                comparisons,
            })
            .collect()
    }
}
