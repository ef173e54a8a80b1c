use super::*;
use crate::testing::{brute_force_nearest, random_points};

/// Walk the tree verifying the split invariant at every node: left subtree
/// values on the split axis are <= pivot, right subtree values strictly
/// greater.
fn check_split_invariant(tree: &KdTree) {
    fn subtree_points(tree: &KdTree, node: Option<usize>, out: &mut Vec<usize>) {
        let Some(idx) = node else { return };
        let node = &tree.nodes[idx];
        out.push(node.point);
        subtree_points(tree, node.left, out);
        subtree_points(tree, node.right, out);
    }

    fn check(tree: &KdTree, idx: usize) {
        let node = &tree.nodes[idx];
        let pivot = tree.points[node.point][node.axis];

        let mut left_points = Vec::new();
        subtree_points(tree, node.left, &mut left_points);
        for p in left_points {
            assert!(
                tree.points[p][node.axis] <= pivot,
                "left subtree violates axis {} split at pivot {pivot}",
                node.axis
            );
        }

        let mut right_points = Vec::new();
        subtree_points(tree, node.right, &mut right_points);
        for p in right_points {
            assert!(
                tree.points[p][node.axis] > pivot,
                "right subtree violates axis {} split at pivot {pivot}",
                node.axis
            );
        }

        if let Some(left) = node.left {
            check(tree, left);
        }
        if let Some(right) = node.right {
            check(tree, right);
        }
    }

    if !tree.nodes.is_empty() {
        check(tree, 0);
    }
}

#[test]
fn build_returns_none_for_empty_input() {
    assert!(KdTree::build(Vec::new()).is_none());
}

#[test]
fn split_invariant_holds_for_random_point_sets() {
    for (count, seed) in [(1usize, 7u64), (2, 8), (17, 9), (100, 10), (501, 11)] {
        let points = random_points(count, 4, seed);
        let tree = KdTree::build(points).unwrap();
        assert_eq!(tree.len(), count);
        check_split_invariant(&tree);
    }
}

#[test]
fn split_invariant_holds_with_heavy_duplication() {
    // Many points collapse onto the same coordinates; the stable split must
    // still partition them deterministically.
    let mut points = Vec::new();
    for i in 0..60 {
        let v = (i % 3) as f32;
        points.push(vec![v, 1.0 - v, 0.5]);
    }
    let tree = KdTree::build(points).unwrap();
    check_split_invariant(&tree);

    // Every stored point must still be findable at distance zero.
    for id in 0..tree.len() {
        let query: Vec<f32> = tree.point(id).to_vec();
        let nearest = tree.find_exact(&query).unwrap();
        assert!(nearest.distance < 1e-6);
    }
}

#[test]
fn exact_search_agrees_with_brute_force() {
    let points = random_points(300, 6, 42);
    let tree = KdTree::build(points.clone()).unwrap();

    for query in random_points(200, 6, 43) {
        let (expected_id, expected_distance) = brute_force_nearest(&points, &query);
        let found = tree.find_exact(&query).unwrap();
        assert!(
            (found.distance - expected_distance).abs() < 1e-5,
            "distance mismatch: {} vs {}",
            found.distance,
            expected_distance
        );
        // Ties can resolve to another id at the same distance.
        if found.id != expected_id {
            let alt = brute_force_nearest(&[points[found.id].clone()], &query).1;
            assert!((alt - expected_distance).abs() < 1e-5);
        }
    }
}

#[test]
fn k_nearest_is_sorted_and_complete() {
    let points = random_points(120, 3, 5);
    let tree = KdTree::build(points.clone()).unwrap();

    let query = vec![0.5, 0.5, 0.5];
    let neighbors = tree.k_nearest(&query, 10);
    assert_eq!(neighbors.len(), 10);
    for pair in neighbors.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }

    // The first of the k matches the single exact nearest.
    let exact = tree.find_exact(&query).unwrap();
    assert!((neighbors[0].distance - exact.distance).abs() < 1e-6);
}

#[test]
fn k_nearest_caps_at_point_count() {
    let points = random_points(4, 2, 77);
    let tree = KdTree::build(points).unwrap();
    assert_eq!(tree.k_nearest(&[0.1, 0.9], 10).len(), 4);
}

#[test]
fn approximate_distance_never_beats_exact() {
    let points = random_points(1000, 10, 21);
    let tree = KdTree::build(points).unwrap();

    for query in random_points(300, 10, 22) {
        let exact = tree.find_exact(&query).unwrap();
        let approximate = tree.find_approximate(&query, 40).unwrap();
        assert!(
            approximate.distance >= exact.distance - 1e-6,
            "approximate {} beat exact {}",
            approximate.distance,
            exact.distance
        );
    }
}

#[test]
fn approximate_search_is_usually_exact() {
    // Regression guard over 1000 queries on 1000 10-D points: with a
    // moderate visit budget, best-bin-first must find the true nearest
    // neighbor at least 95% of the time and keep the squared error small.
    let points = random_points(1000, 10, 31);
    let tree = KdTree::build(points).unwrap();

    let mut exact_hits = 0usize;
    let mut squared_error = 0.0f64;
    let queries = random_points(1000, 10, 32);
    for query in &queries {
        let exact = tree.find_exact(query).unwrap();
        let approximate = tree.find_approximate(query, 200).unwrap();
        if (approximate.distance - exact.distance).abs() < 1e-6 {
            exact_hits += 1;
        }
        let err = (approximate.distance - exact.distance) as f64;
        squared_error += err * err;
    }

    let hit_rate = exact_hits as f64 / queries.len() as f64;
    let mse = squared_error / queries.len() as f64;
    assert!(hit_rate >= 0.95, "exact-match rate too low: {hit_rate}");
    assert!(mse < 0.01, "mean squared error regressed: {mse}");
}

#[test]
fn visited_counters_are_query_local_and_bounded() {
    let points = random_points(500, 8, 51);
    let tree = KdTree::build(points).unwrap();

    let query = vec![0.5; 8];
    let first = tree.find_approximate(&query, 30).unwrap();
    let second = tree.find_approximate(&query, 30).unwrap();
    // Same query, same budget: the counter restarts every query.
    assert_eq!(first.visited, second.visited);

    let exact = tree.find_exact(&query).unwrap();
    assert!(exact.visited <= tree.len());

    // A tighter budget visits no more nodes than a looser one.
    let tight = tree.find_approximate(&query, 10).unwrap();
    let loose = tree.find_approximate(&query, 400).unwrap();
    assert!(tight.visited <= loose.visited);
}

#[test]
#[should_panic(expected = "dimensionality")]
fn mismatched_query_dimensions_panic() {
    let tree = KdTree::build(vec![vec![0.0, 1.0]]).unwrap();
    let _ = tree.find_exact(&[0.5]);
}

#[test]
#[should_panic(expected = "dimensions")]
fn ragged_point_sets_panic() {
    let _ = KdTree::build(vec![vec![0.0, 1.0], vec![0.5]]);
}
