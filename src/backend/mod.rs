//! Compute backend abstraction for the image kernels of the pipeline.
//!
//! The pipeline never dispatches device work directly; it issues a sequence
//! of named image-to-image kernels against this trait and reads results back
//! after [`ComputeBackend::synchronize`]. The bundled [`CpuBackend`] is the
//! reference path; a GPU implementation can map each method onto a compute
//! pipeline without touching the detection code.

mod cpu;

pub use cpu::CpuBackend;

use glam::Vec2;

use crate::image::Image;

/// Image-to-image kernels consumed by the scale-space and detection stages.
///
/// Implementations may queue work internally, but every output image must be
/// fully realized once `synchronize` returns; the pipeline calls it before
/// reading any plane produced by a kernel.
pub trait ComputeBackend: Send + Sync {
    /// Gaussian blur with the given sigma (in destination pixels).
    fn blur(&self, src: &Image<f32>, sigma: f32, dst: &mut Image<f32>);

    /// Per-pixel difference `dst = a - b`.
    fn subtract(&self, a: &Image<f32>, b: &Image<f32>, dst: &mut Image<f32>);

    /// Nearest-neighbor downsample by a factor of two.
    fn downsample_half(&self, src: &Image<f32>, dst: &mut Image<f32>);

    /// Bilinear upsample to the destination dimensions.
    fn upsample_bilinear(&self, src: &Image<f32>, dst: &mut Image<f32>);

    /// Central-difference gradient; `dst` holds (dx, dy) per pixel.
    fn gradient(&self, src: &Image<f32>, dst: &mut Image<Vec2>);

    /// 3×3×3 strict extremum test over three adjacent difference planes.
    ///
    /// Writes +1 where `center` is strictly greater than all 26 neighbors,
    /// -1 where strictly less, 0 elsewhere. Border pixels are always 0.
    fn extrema_3x3x3(
        &self,
        below: &Image<f32>,
        center: &Image<f32>,
        above: &Image<f32>,
        dst: &mut Image<i8>,
    );

    /// Barrier: returns once all previously issued kernels have completed.
    fn synchronize(&self) {}
}
