//! Descriptor extraction.
//!
//! For each (keypoint, orientation) pair, accumulates gradient orientations
//! over a rotated patch into a spatial grid of orientation histograms with
//! trilinear soft assignment, then normalizes, clips, re-normalizes and
//! quantizes the concatenated vector.

use std::f32::consts::TAU;

use glam::Vec2;

use crate::config::SiftConfig;
use crate::constants::{DESCRIPTOR_CLIP, DESCRIPTOR_QUANTIZATION_SCALE};
use crate::detect::localize::Keypoint;
use crate::scale_space::Octave;

/// A rotation- and scale-normalized feature vector for one keypoint
/// orientation. Immutable once built.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// The keypoint this descriptor was extracted around.
    pub keypoint: Keypoint,
    /// Dominant orientation the patch was rotated by, radians in [0, τ).
    pub theta: f32,
    /// Normalized, clipped, re-normalized features (pre-quantization),
    /// retained for continuous-distance consumers.
    pub raw_features: Vec<f32>,
    /// Quantized features: `raw * 512`, clamped to 0..=255.
    pub features: Vec<u8>,
}

impl Descriptor {
    /// Euclidean distance over quantized features.
    pub fn distance(a: &Descriptor, b: &Descriptor) -> f32 {
        assert_eq!(a.features.len(), b.features.len(), "descriptor length mismatch");
        let mut total: i64 = 0;
        for (&fa, &fb) in a.features.iter().zip(&b.features) {
            let d = fb as i64 - fa as i64;
            total += d * d;
        }
        (total as f32).sqrt()
    }
}

/// Extract the descriptor for one (keypoint, orientation) pair.
///
/// Returns `None` when the rotated patch would leave the octave interior;
/// like every other filtering outcome this is silent, not an error.
pub fn extract_descriptor(
    octave: &Octave,
    keypoint: &Keypoint,
    theta: f32,
    config: &SiftConfig,
) -> Option<Descriptor> {
    let n_hist = config.grid_size;
    let n_bins = config.descriptor_bins;

    let x = keypoint.position.x / octave.delta;
    let y = keypoint.position.y / octave.delta;
    let sigma = keypoint.sigma / octave.delta;

    // Half-side of the (unrotated) accumulation square, and the radius that
    // bounds it under any rotation.
    let half_side = config.lambda_descr * sigma * (n_hist + 1) as f32 / n_hist as f32;
    let radius = (std::f32::consts::SQRT_2 * half_side).ceil() as isize;

    let cx = x.round() as isize;
    let cy = y.round() as isize;
    if cx - radius < 0
        || cx + radius >= octave.width as isize
        || cy - radius < 0
        || cy + radius >= octave.height as isize
    {
        return None;
    }

    let gradients = &octave.gradients[keypoint.scale];
    let (sin_t, cos_t) = theta.sin_cos();
    let l = config.lambda_descr * sigma;
    let two_l_sq = 2.0 * l * l;
    // Width of one spatial cell in octave pixels.
    let cell = 2.0 * l / n_hist as f32;

    let mut accumulator = vec![0.0f32; n_hist * n_hist * n_bins];

    for py in cy - radius..=cy + radius {
        for px in cx - radius..=cx + radius {
            let dx = px as f32 - x;
            let dy = py as f32 - y;

            // Rotate the offset into the keypoint frame (by -theta).
            let u = dx * cos_t + dy * sin_t;
            let v = -dx * sin_t + dy * cos_t;
            if u.abs() >= half_side || v.abs() >= half_side {
                continue;
            }

            let gradient = *gradients.get(px as usize, py as usize);
            let magnitude = gradient.length();
            if magnitude == 0.0 {
                continue;
            }

            let weight = (-(dx * dx + dy * dy) / two_l_sq).exp();
            let angle = (gradient.y.atan2(gradient.x) - theta).rem_euclid(TAU);

            // Continuous cell coordinates in [-0.5, n_hist - 0.5].
            let uc = u / cell + (n_hist as f32 - 1.0) / 2.0;
            let vc = v / cell + (n_hist as f32 - 1.0) / 2.0;
            let oc = angle / TAU * n_bins as f32;

            soft_assign(
                &mut accumulator,
                n_hist,
                n_bins,
                Vec2::new(uc, vc),
                oc,
                weight * magnitude,
            );
        }
    }

    let raw_features = normalize_clip_renormalize(accumulator)?;
    let features = quantize(&raw_features);

    Some(Descriptor {
        keypoint: *keypoint,
        theta,
        raw_features,
        features,
    })
}

/// Trilinear distribution of one sample across the two nearest spatial cells
/// per axis and the two nearest orientation bins.
fn soft_assign(
    accumulator: &mut [f32],
    n_hist: usize,
    n_bins: usize,
    cell: Vec2,
    orientation: f32,
    value: f32,
) {
    let i0 = cell.x.floor() as isize;
    let j0 = cell.y.floor() as isize;
    let fu = cell.x - i0 as f32;
    let fv = cell.y - j0 as f32;

    let o0 = orientation.floor() as usize;
    let fo = orientation - o0 as f32;

    for (di, wu) in [(0isize, 1.0 - fu), (1, fu)] {
        let i = i0 + di;
        if i < 0 || i >= n_hist as isize {
            continue;
        }
        for (dj, wv) in [(0isize, 1.0 - fv), (1, fv)] {
            let j = j0 + dj;
            if j < 0 || j >= n_hist as isize {
                continue;
            }
            for (dk, wo) in [(0usize, 1.0 - fo), (1, fo)] {
                let k = (o0 + dk) % n_bins;
                let index = (j as usize * n_hist + i as usize) * n_bins + k;
                accumulator[index] += value * wu * wv * wo;
            }
        }
    }
}

/// L2-normalize, clip each component at 0.2, then re-normalize.
///
/// Returns `None` for a degenerate (zero-gradient) accumulation.
pub(crate) fn normalize_clip_renormalize(mut features: Vec<f32>) -> Option<Vec<f32>> {
    let norm = l2_norm(&features);
    if norm <= f32::EPSILON {
        return None;
    }
    for f in &mut features {
        *f = (*f / norm).min(DESCRIPTOR_CLIP);
    }

    let norm = l2_norm(&features);
    if norm <= f32::EPSILON {
        return None;
    }
    for f in &mut features {
        *f /= norm;
    }
    Some(features)
}

fn quantize(features: &[f32]) -> Vec<u8> {
    features
        .iter()
        .map(|&f| (f * DESCRIPTOR_QUANTIZATION_SCALE).floor().clamp(0.0, 255.0) as u8)
        .collect()
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}
