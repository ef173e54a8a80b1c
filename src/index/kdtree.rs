//! Balanced k-d tree over k-dimensional points.
//!
//! Built once with a median-of-axis split (axis cycles with depth mod k) and
//! read-only afterwards. Duplicate pivot values are partitioned
//! deterministically: everything equal to the pivot on the split axis goes
//! left, the right subtree is strictly greater. Supports exact depth-first
//! search and approximate best-bin-first search; both expose a query-local
//! visited-node counter for diagnostics.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A nearest-neighbor answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    /// Index of the point in the build-time point set.
    pub id: usize,
    /// Euclidean distance from the query.
    pub distance: f32,
    /// Tree nodes visited while answering this query.
    pub visited: usize,
}

#[derive(Debug, Clone)]
struct KdNode {
    /// Index into the point set.
    point: usize,
    left: Option<usize>,
    right: Option<usize>,
    axis: usize,
}

/// Balanced binary space-partition tree.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<Vec<f32>>,
    dims: usize,
}

impl KdTree {
    /// Build a tree from a point set. Returns `None` for an empty set.
    ///
    /// Panics if the points do not all share the same dimensionality; a
    /// ragged point set is a programming error.
    pub fn build(points: Vec<Vec<f32>>) -> Option<Self> {
        let dims = points.first()?.len();
        assert!(dims > 0, "points must have at least one dimension");
        for point in &points {
            assert_eq!(point.len(), dims, "all points must have {dims} dimensions");
        }

        let mut indices: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        Self::build_recursive(&points, &mut indices, 0, dims, &mut nodes);

        Some(Self {
            nodes,
            points,
            dims,
        })
    }

    fn build_recursive(
        points: &[Vec<f32>],
        indices: &mut [usize],
        depth: usize,
        dims: usize,
        nodes: &mut Vec<KdNode>,
    ) -> Option<usize> {
        if indices.is_empty() {
            return None;
        }

        let axis = depth % dims;
        indices.sort_by(|&a, &b| points[a][axis].total_cmp(&points[b][axis]));

        // Advance the split index past duplicates of the pivot value so the
        // right subtree is strictly greater than the pivot.
        let mut median = indices.len() / 2;
        let pivot = points[indices[median]][axis];
        while median + 1 < indices.len() && points[indices[median + 1]][axis] == pivot {
            median += 1;
        }

        let node_idx = nodes.len();
        nodes.push(KdNode {
            point: indices[median],
            left: None,
            right: None,
            axis,
        });

        let (left_indices, right_part) = indices.split_at_mut(median);
        let right_indices = &mut right_part[1..];

        let left = Self::build_recursive(points, left_indices, depth + 1, dims, nodes);
        let right = Self::build_recursive(points, right_indices, depth + 1, dims, nodes);
        nodes[node_idx].left = left;
        nodes[node_idx].right = right;

        Some(node_idx)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// The coordinates of a stored point.
    pub fn point(&self, id: usize) -> &[f32] {
        &self.points[id]
    }

    /// Exact nearest neighbor via depth-first descent.
    ///
    /// Visits the near child first and prunes the far child whenever the
    /// axis distance to the pivot exceeds the best distance found so far.
    pub fn find_exact(&self, query: &[f32]) -> Option<Neighbor> {
        assert_eq!(query.len(), self.dims, "query dimensionality mismatch");
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = Best {
            id: 0,
            distance_sq: f32::INFINITY,
            visited: 0,
        };
        self.find_exact_recursive(0, query, &mut best);

        Some(Neighbor {
            id: best.id,
            distance: best.distance_sq.sqrt(),
            visited: best.visited,
        })
    }

    fn find_exact_recursive(&self, node_idx: usize, query: &[f32], best: &mut Best) {
        let node = &self.nodes[node_idx];
        best.visited += 1;

        let distance_sq = distance_squared(query, &self.points[node.point]);
        if distance_sq < best.distance_sq {
            best.id = node.point;
            best.distance_sq = distance_sq;
        }

        let diff = query[node.axis] - self.points[node.point][node.axis];
        let (near, far) = if diff <= 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(near_idx) = near {
            self.find_exact_recursive(near_idx, query, best);
        }
        if let Some(far_idx) = far
            && diff * diff < best.distance_sq
        {
            self.find_exact_recursive(far_idx, query, best);
        }
    }

    /// The k exact nearest neighbors, sorted by ascending distance.
    pub fn k_nearest(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        assert_eq!(query.len(), self.dims, "query dimensionality mismatch");
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut heap = BoundedMaxHeap::new(k);
        let mut visited = 0usize;
        self.k_nearest_recursive(0, query, &mut heap, &mut visited);

        let mut result: Vec<Neighbor> = heap
            .into_vec()
            .into_iter()
            .map(|(id, distance_sq)| Neighbor {
                id,
                distance: distance_sq.sqrt(),
                visited,
            })
            .collect();
        result.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        result
    }

    fn k_nearest_recursive(
        &self,
        node_idx: usize,
        query: &[f32],
        heap: &mut BoundedMaxHeap,
        visited: &mut usize,
    ) {
        let node = &self.nodes[node_idx];
        *visited += 1;

        let distance_sq = distance_squared(query, &self.points[node.point]);
        heap.push(node.point, distance_sq);

        let diff = query[node.axis] - self.points[node.point][node.axis];
        let (near, far) = if diff <= 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(near_idx) = near {
            self.k_nearest_recursive(near_idx, query, heap, visited);
        }
        if let Some(far_idx) = far
            && (!heap.is_full() || diff * diff < heap.max_distance())
        {
            self.k_nearest_recursive(far_idx, query, heap, visited);
        }
    }

    /// Approximate nearest neighbor via best-bin-first search.
    ///
    /// Descends the near-first leaf path, deferring every far branch into a
    /// priority queue keyed by its axis distance to the query. Branches are
    /// then expanded closest-first, re-pruned against the current best,
    /// until the queue empties or `max_visits` nodes have been visited.
    /// The returned distance is never below the exact answer.
    pub fn find_approximate(&self, query: &[f32], max_visits: usize) -> Option<Neighbor> {
        assert_eq!(query.len(), self.dims, "query dimensionality mismatch");
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = Best {
            id: 0,
            distance_sq: f32::INFINITY,
            visited: 0,
        };
        let mut deferred: BinaryHeap<DeferredBranch> = BinaryHeap::new();

        self.descend_near_first(0, query, &mut best, &mut deferred, max_visits);

        while let Some(branch) = deferred.pop() {
            if best.visited >= max_visits {
                break;
            }
            if branch.axis_distance * branch.axis_distance >= best.distance_sq {
                continue;
            }
            self.descend_near_first(branch.node, query, &mut best, &mut deferred, max_visits);
        }

        Some(Neighbor {
            id: best.id,
            distance: best.distance_sq.sqrt(),
            visited: best.visited,
        })
    }

    /// Walk down from `node_idx` following the near child, deferring far
    /// children for later expansion.
    fn descend_near_first(
        &self,
        node_idx: usize,
        query: &[f32],
        best: &mut Best,
        deferred: &mut BinaryHeap<DeferredBranch>,
        max_visits: usize,
    ) {
        let mut current = Some(node_idx);
        while let Some(idx) = current {
            if best.visited >= max_visits && best.distance_sq.is_finite() {
                return;
            }
            let node = &self.nodes[idx];
            best.visited += 1;

            let distance_sq = distance_squared(query, &self.points[node.point]);
            if distance_sq < best.distance_sq {
                best.id = node.point;
                best.distance_sq = distance_sq;
            }

            let diff = query[node.axis] - self.points[node.point][node.axis];
            let (near, far) = if diff <= 0.0 {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };

            if let Some(far_idx) = far {
                deferred.push(DeferredBranch {
                    axis_distance: diff.abs(),
                    node: far_idx,
                });
            }
            current = near;
        }
    }
}

#[derive(Debug)]
struct Best {
    id: usize,
    distance_sq: f32,
    visited: usize,
}

/// A far branch deferred during best-bin-first descent, ordered so the
/// smallest axis distance pops first.
#[derive(Debug)]
struct DeferredBranch {
    axis_distance: f32,
    node: usize,
}

impl PartialEq for DeferredBranch {
    fn eq(&self, other: &Self) -> bool {
        self.axis_distance == other.axis_distance
    }
}

impl Eq for DeferredBranch {}

impl PartialOrd for DeferredBranch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeferredBranch {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for closest-first popping.
        other.axis_distance.total_cmp(&self.axis_distance)
    }
}

#[inline]
fn distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Bounded max-heap keeping the k smallest distances seen so far.
#[derive(Debug)]
struct BoundedMaxHeap {
    capacity: usize,
    items: Vec<(usize, f32)>,
}

impl BoundedMaxHeap {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity + 1),
        }
    }

    fn push(&mut self, id: usize, distance_sq: f32) {
        if self.items.len() < self.capacity {
            self.items.push((id, distance_sq));
            self.sift_up(self.items.len() - 1);
        } else if distance_sq < self.items[0].1 {
            self.items[0] = (id, distance_sq);
            self.sift_down(0);
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    fn max_distance(&self) -> f32 {
        if self.items.is_empty() {
            f32::INFINITY
        } else {
            self.items[0].1
        }
    }

    fn into_vec(self) -> Vec<(usize, f32)> {
        self.items
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.items[idx].1 > self.items[parent].1 {
                self.items.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut largest = idx;

            if left < self.items.len() && self.items[left].1 > self.items[largest].1 {
                largest = left;
            }
            if right < self.items.len() && self.items[right].1 > self.items[largest].1 {
                largest = right;
            }

            if largest == idx {
                break;
            }
            self.items.swap(idx, largest);
            idx = largest;
        }
    }
}
