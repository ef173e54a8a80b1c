//! Shared constants for the detection pipeline.
//!
//! Centralizes the fixed numeric policies of the reference algorithm so the
//! stages stay consistent; tunable parameters live in [`crate::SiftConfig`].

/// Fraction of the DoG threshold applied to raw extrema before refinement.
///
/// Candidates below `CONTRAST_PREFILTER_RATIO * dog_threshold` are dropped
/// without running the Newton step.
pub const CONTRAST_PREFILTER_RATIO: f32 = 0.8;

/// Interpolation offset magnitude below which the Newton step has converged.
///
/// Offsets at or above this bound shift the integer sample position by one
/// pixel (or one scale slot) and retry.
pub const MAX_INTERPOLATION_OFFSET: f32 = 0.6;

/// Kernel radius in sigmas for Gaussian blurs: ceil(3σ) captures 99.7% of
/// the kernel mass.
pub const GAUSSIAN_KERNEL_RADIUS_SIGMAS: f32 = 3.0;

/// Orientation window radius in units of `lambda_ori * sigma`.
pub const ORIENTATION_RADIUS_SIGMAS: f32 = 3.0;

/// Clipping bound applied to normalized descriptor components.
pub const DESCRIPTOR_CLIP: f32 = 0.2;

/// Scale factor used when quantizing descriptor components to bytes.
pub const DESCRIPTOR_QUANTIZATION_SCALE: f32 = 512.0;

/// Smallest octave extent (pixels) considered useful for detection.
///
/// Bounds the octave count: ⌊log2(min(w, h) / delta_min / 12)⌋ + 1.
pub const MIN_OCTAVE_EXTENT: usize = 12;

/// Determinant magnitude below which the 3×3 DoG Hessian is treated as
/// singular and the candidate is discarded.
pub const HESSIAN_DETERMINANT_EPSILON: f32 = 1e-12;
