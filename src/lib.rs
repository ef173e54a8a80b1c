//! Parallax - scale-invariant feature detection and matching.
//!
//! This library implements the classic SIFT pipeline plus two
//! nearest-neighbor index structures for matching descriptors between
//! images:
//! - Difference-of-Gaussians scale-space construction
//! - Scale-space extremum detection and sub-pixel keypoint localization
//! - Dominant-orientation assignment and descriptor extraction
//! - Exact and approximate nearest-neighbor search (k-d tree, grid trie)
//! - Ratio-test correspondence matching and image similarity scoring
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use parallax::{Image, SiftDetector, MatchConfig, match_descriptors};
//!
//! // Decoded single-channel float images from the loading layer.
//! let left = Image::from_pixels(width, height, left_pixels);
//! let right = Image::from_pixels(width, height, right_pixels);
//!
//! let detector = SiftDetector::new();
//! let a = detector.detect(&left);
//! let b = detector.detect(&right);
//!
//! let matches = match_descriptors(&a.descriptors, &b.descriptors, &MatchConfig::default());
//! println!("{} correspondences", matches.len());
//! ```
//!
//! Image kernels run through the [`ComputeBackend`] trait; the bundled
//! [`CpuBackend`] is the reference path and a GPU implementation can be
//! injected without touching the detection code.

pub mod backend;
mod config;
pub(crate) mod constants;
mod detect;
mod image;
mod index;
mod matching;
mod scale_space;

#[cfg(test)]
pub mod testing;

// ============================================================================
// Core types
// ============================================================================

pub use backend::{ComputeBackend, CpuBackend};
pub use image::Image;

// ============================================================================
// Detection
// ============================================================================

pub use config::SiftConfig;
pub use detect::{
    Descriptor, DetectionResult, Diagnostics, Keypoint, RawExtremum, Rejection, SiftDetector,
};
pub use scale_space::{Octave, ScaleSpace, ScaleSpaceBuilder};

// ============================================================================
// Indexing and matching
// ============================================================================

pub use config::MatchConfig;
pub use index::{GridTrie, KdTree, Neighbor, TrieMatch};
pub use matching::{
    Correspondence, descriptor_index, match_descriptors, match_with_index, similarity_score,
};
