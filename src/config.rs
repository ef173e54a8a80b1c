//! Configuration types for detection and matching.
//!
//! Flat config structs with documented defaults. `validate()` panics on
//! malformed parameters: configuration mistakes are programming errors and
//! fail fast at construction, unlike data-dependent filtering outcomes which
//! are silent.

use crate::constants::MIN_OCTAVE_EXTENT;

/// Parameters of the scale-space and keypoint detection pipeline.
///
/// Defaults follow the published reference algorithm: a half-pixel sampling
/// grid (`delta_min = 0.5`), seed blur 0.8, three scales per octave.
#[derive(Debug, Clone)]
pub struct SiftConfig {
    // ------------------------------------------------------------------
    // Scale space
    // ------------------------------------------------------------------
    /// Blur level of the seed image (first Gaussian of octave 0).
    pub sigma_min: f32,
    /// Sampling distance of octave 0 in image pixels. 0.5 corresponds to a
    /// 2× initial upsampling.
    pub delta_min: f32,
    /// Assumed blur level already present in the input image.
    pub sigma_input: f32,
    /// Number of octaves. `None` derives the count from the image size so
    /// the coarsest octave keeps at least 12 pixels per side.
    pub num_octaves: Option<usize>,
    /// Scales sampled per octave. Gaussians per octave = this + 3,
    /// differences per octave = this + 2.
    pub scales_per_octave: usize,

    // ------------------------------------------------------------------
    // Keypoint filtering
    // ------------------------------------------------------------------
    /// Threshold over the interpolated DoG response.
    pub dog_threshold: f32,
    /// Threshold over the ratio of principal curvatures (edgeness).
    pub edge_threshold: f32,
    /// Margin in octave pixels; keypoints must stay this far from every
    /// octave edge.
    pub image_border: usize,
    /// Iteration budget for the sub-pixel Newton refinement.
    pub max_interpolation_iterations: usize,

    // ------------------------------------------------------------------
    // Orientation
    // ------------------------------------------------------------------
    /// Size factor of the orientation accumulation window.
    pub lambda_ori: f32,
    /// Number of bins in the circular orientation histogram.
    pub orientation_bins: usize,
    /// A histogram bin is a principal orientation when it exceeds this
    /// fraction of the histogram maximum (and both circular neighbors).
    pub orientation_threshold: f32,
    /// Passes of 3-tap circular averaging applied before peak extraction.
    pub orientation_smoothing_iterations: usize,

    // ------------------------------------------------------------------
    // Descriptor
    // ------------------------------------------------------------------
    /// Size factor of the descriptor patch.
    pub lambda_descr: f32,
    /// Spatial grid side: the descriptor has `grid_size²` cells.
    pub grid_size: usize,
    /// Orientation bins per descriptor cell.
    pub descriptor_bins: usize,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            sigma_min: 0.8,
            delta_min: 0.5,
            sigma_input: 0.5,
            num_octaves: None,
            scales_per_octave: 3,
            dog_threshold: 0.015,
            edge_threshold: 10.0,
            image_border: 5,
            max_interpolation_iterations: 5,
            lambda_ori: 1.5,
            orientation_bins: 36,
            orientation_threshold: 0.8,
            orientation_smoothing_iterations: 6,
            lambda_descr: 6.0,
            grid_size: 4,
            descriptor_bins: 8,
        }
    }
}

impl SiftConfig {
    /// Validate the configuration, panicking on malformed parameters.
    pub fn validate(&self) {
        assert!(
            self.sigma_min > 0.0,
            "sigma_min must be positive, got {}",
            self.sigma_min
        );
        assert!(
            self.delta_min > 0.0 && self.delta_min <= 1.0,
            "delta_min must be in (0, 1], got {}",
            self.delta_min
        );
        assert!(
            self.sigma_input >= 0.0 && self.sigma_input < self.sigma_min,
            "sigma_input ({}) must be non-negative and below sigma_min ({})",
            self.sigma_input,
            self.sigma_min
        );
        assert!(
            self.scales_per_octave >= 1,
            "scales_per_octave must be at least 1"
        );
        if let Some(n) = self.num_octaves {
            assert!(n >= 1, "num_octaves must be at least 1");
        }
        assert!(
            self.dog_threshold > 0.0,
            "dog_threshold must be positive, got {}",
            self.dog_threshold
        );
        assert!(
            self.edge_threshold > 0.0,
            "edge_threshold must be positive, got {}",
            self.edge_threshold
        );
        assert!(
            self.image_border >= 1,
            "image_border must be at least 1 for finite differences"
        );
        assert!(
            self.max_interpolation_iterations >= 1,
            "max_interpolation_iterations must be at least 1"
        );
        assert!(self.lambda_ori > 0.0, "lambda_ori must be positive");
        assert!(
            self.orientation_bins >= 4,
            "orientation_bins must be at least 4, got {}",
            self.orientation_bins
        );
        assert!(
            self.orientation_threshold > 0.0 && self.orientation_threshold <= 1.0,
            "orientation_threshold must be in (0, 1], got {}",
            self.orientation_threshold
        );
        assert!(self.lambda_descr > 0.0, "lambda_descr must be positive");
        assert!(self.grid_size >= 1, "grid_size must be at least 1");
        assert!(self.descriptor_bins >= 2, "descriptor_bins must be at least 2");
    }

    /// Octave count for a given input size: each octave halves the sampling
    /// rate, and the coarsest one keeps [`MIN_OCTAVE_EXTENT`] pixels per
    /// side.
    pub fn num_octaves_for(&self, width: usize, height: usize) -> usize {
        if let Some(n) = self.num_octaves {
            return n;
        }
        let extent = width.min(height) as f32 / self.delta_min / MIN_OCTAVE_EXTENT as f32;
        if extent <= 1.0 {
            return 1;
        }
        extent.log2().floor() as usize + 1
    }

    /// Constant ratio between adjacent per-octave sigmas: 2^(1/scales).
    pub fn sigma_ratio(&self) -> f32 {
        2.0f32.powf(1.0 / self.scales_per_octave as f32)
    }

    /// Length of the descriptor feature vector.
    pub fn descriptor_length(&self) -> usize {
        self.grid_size * self.grid_size * self.descriptor_bins
    }
}

/// Parameters of the nearest/second-nearest ratio test.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    /// Upper bound on the nearest-neighbor feature distance, in quantized
    /// feature units.
    pub absolute_threshold: f32,
    /// Lowe's ratio: accept only when the nearest distance is below
    /// `second_nearest * relative_threshold`.
    pub relative_threshold: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            absolute_threshold: 300.0,
            relative_threshold: 0.6,
        }
    }
}

impl MatchConfig {
    /// Validate the configuration, panicking on malformed parameters.
    pub fn validate(&self) {
        assert!(
            self.absolute_threshold > 0.0,
            "absolute_threshold must be positive, got {}",
            self.absolute_threshold
        );
        assert!(
            self.relative_threshold > 0.0 && self.relative_threshold <= 1.0,
            "relative_threshold must be in (0, 1], got {}",
            self.relative_threshold
        );
    }
}
