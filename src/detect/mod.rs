//! Keypoint detection pipeline.
//!
//! Stages, in dependency order:
//!
//! 1. **Scale space**: Gaussian/DoG octave pyramid via backend kernels.
//! 2. **Extrema**: strict 3×3×3 scale-space extrema per octave.
//! 3. **Localization**: Newton refinement with contrast/edge rejection.
//! 4. **Orientation**: smoothed gradient histograms, one angle per peak.
//! 5. **Descriptors**: rotated-grid feature vectors per orientation.
//!
//! Scale-space planes are realized once per octave and read-only afterwards,
//! so the per-keypoint stages parallelize freely across keypoints.

pub(crate) mod descriptor;
pub(crate) mod extrema;
pub(crate) mod localize;
pub(crate) mod orientation;


pub use descriptor::Descriptor;
pub use extrema::RawExtremum;
pub use localize::{Keypoint, Rejection};

use rayon::prelude::*;

use crate::backend::{ComputeBackend, CpuBackend};
use crate::config::SiftConfig;
use crate::image::Image;
use crate::scale_space::ScaleSpaceBuilder;

/// Keypoint detector wrapping a configuration and a compute backend.
#[derive(Debug, Default)]
pub struct SiftDetector<B = CpuBackend> {
    config: SiftConfig,
    backend: B,
}

impl SiftDetector<CpuBackend> {
    /// Detector with default configuration on the CPU reference backend.
    pub fn new() -> Self {
        Self::from_config(SiftConfig::default())
    }

    /// Detector with a custom configuration on the CPU reference backend.
    pub fn from_config(config: SiftConfig) -> Self {
        config.validate();
        Self {
            config,
            backend: CpuBackend::new(),
        }
    }
}

impl<B: ComputeBackend> SiftDetector<B> {
    /// Detector running its image kernels on the given backend.
    pub fn with_backend(config: SiftConfig, backend: B) -> Self {
        config.validate();
        Self { config, backend }
    }

    pub fn config(&self) -> &SiftConfig {
        &self.config
    }

    /// Run the full pipeline on a grayscale image.
    ///
    /// An image yielding no keypoints produces an empty result, not an
    /// error; per-stage rejection counts are reported in
    /// [`DetectionResult::diagnostics`].
    pub fn detect(&self, image: &Image<f32>) -> DetectionResult {
        let scale_space = ScaleSpaceBuilder::new(&self.config, &self.backend).build(image);

        let mut keypoints = Vec::new();
        let mut descriptors = Vec::new();
        let mut diagnostics = Diagnostics::default();

        for octave in &scale_space.octaves {
            let raw = extrema::detect_extrema(&self.backend, octave);
            diagnostics.raw_extrema += raw.len();

            let localized: Vec<Result<Keypoint, Rejection>> = raw
                .par_iter()
                .map(|extremum| localize::localize(octave, &self.config, extremum))
                .collect();

            let mut octave_keypoints = Vec::new();
            for outcome in localized {
                match outcome {
                    Ok(keypoint) => octave_keypoints.push(keypoint),
                    Err(Rejection::LowContrast) => diagnostics.rejected_low_contrast += 1,
                    Err(Rejection::OnEdge) => diagnostics.rejected_on_edge += 1,
                    Err(Rejection::OutOfBounds) => diagnostics.rejected_out_of_bounds += 1,
                    Err(Rejection::NotConverged) => diagnostics.rejected_not_converged += 1,
                }
            }

            let octave_descriptors: Vec<Vec<Descriptor>> = octave_keypoints
                .par_iter()
                .map(|keypoint| {
                    let orientations =
                        orientation::assign_orientations(octave, keypoint, &self.config);
                    orientations
                        .into_iter()
                        .filter_map(|theta| {
                            descriptor::extract_descriptor(octave, keypoint, theta, &self.config)
                        })
                        .collect()
                })
                .collect();

            for extracted in &octave_descriptors {
                if extracted.is_empty() {
                    diagnostics.keypoints_without_descriptor += 1;
                }
            }

            tracing::debug!(
                octave = octave.index,
                keypoints = octave_keypoints.len(),
                descriptors = octave_descriptors.iter().map(Vec::len).sum::<usize>(),
                "octave processed"
            );

            keypoints.extend(octave_keypoints);
            descriptors.extend(octave_descriptors.into_iter().flatten());
        }

        diagnostics.keypoints = keypoints.len();
        diagnostics.descriptors = descriptors.len();
        tracing::debug!(
            keypoints = diagnostics.keypoints,
            descriptors = diagnostics.descriptors,
            "detection complete"
        );

        DetectionResult {
            keypoints,
            descriptors,
            diagnostics,
        }
    }
}

/// Output of the detection pipeline.
#[derive(Debug, Clone, Default)]
pub struct DetectionResult {
    /// Accepted keypoints, grouped by ascending octave.
    pub keypoints: Vec<Keypoint>,
    /// Descriptors, one per accepted (keypoint, orientation) pair.
    pub descriptors: Vec<Descriptor>,
    /// Per-stage counters.
    pub diagnostics: Diagnostics,
}

impl DetectionResult {
    /// True when the image yielded no descriptors at all.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Keypoints detected in the given octave.
    pub fn octave_keypoints(&self, octave: usize) -> impl Iterator<Item = &Keypoint> {
        self.keypoints.iter().filter(move |k| k.octave == octave)
    }

    /// Descriptors extracted in the given octave.
    pub fn octave_descriptors(&self, octave: usize) -> impl Iterator<Item = &Descriptor> {
        self.descriptors
            .iter()
            .filter(move |d| d.keypoint.octave == octave)
    }
}

/// Counters from each stage of the pipeline.
///
/// Rejections are normal filtering outcomes; they are tallied here for
/// tuning and never logged as failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    /// Discrete extrema found across all octaves.
    pub raw_extrema: usize,
    /// Candidates below the contrast threshold (raw or interpolated).
    pub rejected_low_contrast: usize,
    /// Candidates failing the curvature-ratio edge test.
    pub rejected_on_edge: usize,
    /// Candidates that left the valid interior during refinement.
    pub rejected_out_of_bounds: usize,
    /// Candidates exhausting the refinement iteration budget.
    pub rejected_not_converged: usize,
    /// Keypoints whose orientation window or descriptor patch never fit.
    pub keypoints_without_descriptor: usize,
    /// Accepted keypoints.
    pub keypoints: usize,
    /// Extracted descriptors.
    pub descriptors: usize,
}
