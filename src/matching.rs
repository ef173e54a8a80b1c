//! Descriptor matching between images.
//!
//! Applies the nearest / second-nearest ratio test over quantized feature
//! distances, either brute-force over a descriptor slice or through a
//! [`KdTree`] built from the target features. A whole-image score
//! aggregates accepted correspondences for image-to-image ranking.

use rayon::prelude::*;

use crate::config::MatchConfig;
use crate::detect::Descriptor;
use crate::index::KdTree;

/// An accepted descriptor correspondence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index into the source descriptor set.
    pub source: usize,
    /// Index into the target descriptor set.
    pub target: usize,
    /// Feature distance between the pair.
    pub distance: f32,
}

/// Match every source descriptor against the target set by exhaustive scan.
///
/// A correspondence is accepted iff the nearest target is closer than
/// `absolute_threshold` and closer than `relative_threshold` times the
/// second-nearest distance. Empty inputs yield an empty correspondence
/// list.
pub fn match_descriptors(
    source: &[Descriptor],
    target: &[Descriptor],
    config: &MatchConfig,
) -> Vec<Correspondence> {
    config.validate();
    if source.is_empty() || target.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<Correspondence> = source
        .par_iter()
        .enumerate()
        .filter_map(|(i, descriptor)| {
            let mut nearest = f32::INFINITY;
            let mut second = f32::INFINITY;
            let mut nearest_idx = usize::MAX;

            for (j, candidate) in target.iter().enumerate() {
                let distance = Descriptor::distance(descriptor, candidate);
                if distance < nearest {
                    second = nearest;
                    nearest = distance;
                    nearest_idx = j;
                } else if distance < second {
                    second = distance;
                }
            }

            accept(i, nearest_idx, nearest, second, config)
        })
        .collect();

    matches.sort_by_key(|m| m.source);
    tracing::debug!(
        source = source.len(),
        target = target.len(),
        accepted = matches.len(),
        "descriptor matching complete"
    );
    matches
}

/// Build a [`KdTree`] over a target set's quantized features.
///
/// Returns `None` for an empty descriptor set.
pub fn descriptor_index(target: &[Descriptor]) -> Option<KdTree> {
    let points: Vec<Vec<f32>> = target
        .iter()
        .map(|d| d.features.iter().map(|&f| f as f32).collect())
        .collect();
    KdTree::build(points)
}

/// Match every source descriptor through a prebuilt target index.
///
/// Equivalent to [`match_descriptors`] but resolves the two nearest targets
/// with an exact 2-nearest tree query instead of a linear scan.
pub fn match_with_index(
    source: &[Descriptor],
    index: &KdTree,
    config: &MatchConfig,
) -> Vec<Correspondence> {
    config.validate();
    if source.is_empty() || index.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<Correspondence> = source
        .par_iter()
        .enumerate()
        .filter_map(|(i, descriptor)| {
            let query: Vec<f32> = descriptor.features.iter().map(|&f| f as f32).collect();
            let neighbors = index.k_nearest(&query, 2);
            let nearest = neighbors.first()?;
            let second = neighbors.get(1).map_or(f32::INFINITY, |n| n.distance);
            accept(i, nearest.id, nearest.distance, second, config)
        })
        .collect();

    matches.sort_by_key(|m| m.source);
    matches
}

fn accept(
    source: usize,
    target: usize,
    nearest: f32,
    second: f32,
    config: &MatchConfig,
) -> Option<Correspondence> {
    if target == usize::MAX {
        return None;
    }
    if nearest >= config.absolute_threshold {
        return None;
    }
    if nearest >= second * config.relative_threshold {
        return None;
    }
    Some(Correspondence {
        source,
        target,
        distance: nearest,
    })
}

/// Whole-image similarity: accepted correspondences normalized by the
/// larger descriptor-set size. Ranges over [0, 1]; 0 when either set is
/// empty.
pub fn similarity_score(
    source: &[Descriptor],
    target: &[Descriptor],
    config: &MatchConfig,
) -> f32 {
    if source.is_empty() || target.is_empty() {
        return 0.0;
    }
    let accepted = match_descriptors(source, target, config).len();
    accepted as f32 / source.len().max(target.len()) as f32
}
