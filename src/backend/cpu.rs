//! CPU reference implementation of the compute backend.
//!
//! Gaussian blurs use separable row/column convolution, O(n×k) instead of
//! O(n×k²) for kernel size k, with mirror boundary handling. All kernels
//! parallelize over row chunks; kernels execute eagerly, so the synchronize
//! barrier is a no-op.

use glam::Vec2;
use rayon::prelude::*;

use super::ComputeBackend;
use crate::constants::GAUSSIAN_KERNEL_RADIUS_SIGMAS;
use crate::image::Image;

/// Rows per parallel chunk. Multiple rows per chunk keep each thread on a
/// distinct memory region and reduce false sharing on narrow images.
const ROWS_PER_CHUNK: usize = 8;

/// Eager, rayon-parallel backend; the default for the pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeBackend for CpuBackend {
    fn blur(&self, src: &Image<f32>, sigma: f32, dst: &mut Image<f32>) {
        assert_eq!(src.width(), dst.width(), "width mismatch");
        assert_eq!(src.height(), dst.height(), "height mismatch");

        let kernel = gaussian_kernel_1d(sigma);
        let width = src.width();
        let height = src.height();

        let mut temp = Image::<f32>::new(width, height);
        convolve_rows(src, &mut temp, &kernel);
        convolve_cols(&temp, dst, &kernel);
    }

    fn subtract(&self, a: &Image<f32>, b: &Image<f32>, dst: &mut Image<f32>) {
        assert_eq!(a.len(), b.len(), "operand size mismatch");
        assert_eq!(a.len(), dst.len(), "output size mismatch");

        dst.pixels_mut()
            .par_chunks_mut(a.width() * ROWS_PER_CHUNK)
            .enumerate()
            .for_each(|(chunk_idx, out)| {
                let start = chunk_idx * a.width() * ROWS_PER_CHUNK;
                for (i, value) in out.iter_mut().enumerate() {
                    *value = a.pixels()[start + i] - b.pixels()[start + i];
                }
            });
    }

    fn downsample_half(&self, src: &Image<f32>, dst: &mut Image<f32>) {
        assert_eq!(dst.width(), src.width() / 2, "downsample width mismatch");
        assert_eq!(dst.height(), src.height() / 2, "downsample height mismatch");

        let dst_width = dst.width();
        dst.pixels_mut()
            .par_chunks_mut(dst_width * ROWS_PER_CHUNK)
            .enumerate()
            .for_each(|(chunk_idx, out)| {
                let y_start = chunk_idx * ROWS_PER_CHUNK;
                for (local_y, out_row) in out.chunks_mut(dst_width).enumerate() {
                    let src_row = src.row((y_start + local_y) * 2);
                    for (x, value) in out_row.iter_mut().enumerate() {
                        *value = src_row[x * 2];
                    }
                }
            });
    }

    fn upsample_bilinear(&self, src: &Image<f32>, dst: &mut Image<f32>) {
        assert!(
            dst.width() >= src.width() && dst.height() >= src.height(),
            "upsample target must not shrink the image"
        );

        let scale_x = src.width() as f32 / dst.width() as f32;
        let scale_y = src.height() as f32 / dst.height() as f32;
        let dst_width = dst.width();

        dst.pixels_mut()
            .par_chunks_mut(dst_width * ROWS_PER_CHUNK)
            .enumerate()
            .for_each(|(chunk_idx, out)| {
                let y_start = chunk_idx * ROWS_PER_CHUNK;
                for (local_y, out_row) in out.chunks_mut(dst_width).enumerate() {
                    let sy = (y_start + local_y) as f32 * scale_y;
                    for (x, value) in out_row.iter_mut().enumerate() {
                        *value = src.sample_bilinear(x as f32 * scale_x, sy);
                    }
                }
            });
    }

    fn gradient(&self, src: &Image<f32>, dst: &mut Image<Vec2>) {
        assert_eq!(src.width(), dst.width(), "width mismatch");
        assert_eq!(src.height(), dst.height(), "height mismatch");

        let width = src.width();
        dst.pixels_mut()
            .par_chunks_mut(width * ROWS_PER_CHUNK)
            .enumerate()
            .for_each(|(chunk_idx, out)| {
                let y_start = chunk_idx * ROWS_PER_CHUNK;
                for (local_y, out_row) in out.chunks_mut(width).enumerate() {
                    let y = (y_start + local_y) as isize;
                    for (x, value) in out_row.iter_mut().enumerate() {
                        let x = x as isize;
                        let dx = 0.5 * (src.get_clamped(x + 1, y) - src.get_clamped(x - 1, y));
                        let dy = 0.5 * (src.get_clamped(x, y + 1) - src.get_clamped(x, y - 1));
                        *value = Vec2::new(dx, dy);
                    }
                }
            });
    }

    fn extrema_3x3x3(
        &self,
        below: &Image<f32>,
        center: &Image<f32>,
        above: &Image<f32>,
        dst: &mut Image<i8>,
    ) {
        assert_eq!(below.len(), center.len(), "plane size mismatch");
        assert_eq!(above.len(), center.len(), "plane size mismatch");
        assert_eq!(dst.len(), center.len(), "mask size mismatch");

        let width = center.width();
        let height = center.height();

        dst.pixels_mut()
            .par_chunks_mut(width * ROWS_PER_CHUNK)
            .enumerate()
            .for_each(|(chunk_idx, out)| {
                let y_start = chunk_idx * ROWS_PER_CHUNK;
                for (local_y, out_row) in out.chunks_mut(width).enumerate() {
                    let y = y_start + local_y;
                    if y == 0 || y + 1 >= height {
                        out_row.fill(0);
                        continue;
                    }
                    out_row[0] = 0;
                    out_row[width - 1] = 0;
                    for x in 1..width - 1 {
                        out_row[x] = classify_extremum(below, center, above, x, y);
                    }
                }
            });
    }
}

/// Strict 26-neighbor comparison at an interior pixel.
fn classify_extremum(
    below: &Image<f32>,
    center: &Image<f32>,
    above: &Image<f32>,
    x: usize,
    y: usize,
) -> i8 {
    let value = *center.get(x, y);
    let mut is_max = true;
    let mut is_min = true;

    for plane in [below, center, above] {
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if std::ptr::eq(plane, center) && nx == x && ny == y {
                    continue;
                }
                let neighbor = *plane.get(nx, ny);
                if value <= neighbor {
                    is_max = false;
                }
                if value >= neighbor {
                    is_min = false;
                }
                if !is_max && !is_min {
                    return 0;
                }
            }
        }
    }

    if is_max {
        1
    } else if is_min {
        -1
    } else {
        0
    }
}

/// Normalized 1-D Gaussian kernel with radius ceil(3σ).
pub(crate) fn gaussian_kernel_1d(sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "sigma must be positive, got {sigma}");

    let radius = (GAUSSIAN_KERNEL_RADIUS_SIGMAS * sigma).ceil() as usize;
    let mut kernel = vec![0.0f32; 2 * radius + 1];

    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        let value = (-x * x / two_sigma_sq).exp();
        *k = value;
        sum += value;
    }
    for v in &mut kernel {
        *v /= sum;
    }

    kernel
}

/// Mirror a signed coordinate into [0, len).
#[inline]
fn mirror(i: isize, len: usize) -> usize {
    let len = len as isize;
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = (2 * len - 2 - i).max(0);
    }
    i as usize
}

fn convolve_rows(input: &Image<f32>, output: &mut Image<f32>, kernel: &[f32]) {
    let width = input.width();
    let radius = kernel.len() / 2;

    output
        .pixels_mut()
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out.chunks_mut(width).enumerate() {
                let in_row = input.row(y_start + local_y);
                for (x, value) in out_row.iter_mut().enumerate() {
                    let mut sum = 0.0f32;
                    for (k, &kval) in kernel.iter().enumerate() {
                        let sx = mirror(x as isize + k as isize - radius as isize, width);
                        sum += in_row[sx] * kval;
                    }
                    *value = sum;
                }
            }
        });
}

fn convolve_cols(input: &Image<f32>, output: &mut Image<f32>, kernel: &[f32]) {
    let width = input.width();
    let height = input.height();
    let radius = kernel.len() / 2;

    output
        .pixels_mut()
        .par_chunks_mut(width * ROWS_PER_CHUNK)
        .enumerate()
        .for_each(|(chunk_idx, out)| {
            let y_start = chunk_idx * ROWS_PER_CHUNK;
            for (local_y, out_row) in out.chunks_mut(width).enumerate() {
                let y = y_start + local_y;
                for (x, value) in out_row.iter_mut().enumerate() {
                    let mut sum = 0.0f32;
                    for (k, &kval) in kernel.iter().enumerate() {
                        let sy = mirror(y as isize + k as isize - radius as isize, height);
                        sum += input.pixels()[sy * width + x] * kval;
                    }
                    *value = sum;
                }
            }
        });
}
