//! Dominant-orientation assignment.
//!
//! Accumulates a Gaussian-weighted circular histogram of gradient
//! orientations around a keypoint, smooths it, and extracts every peak above
//! the orientation threshold. One keypoint yields zero or more orientations.

use std::f32::consts::TAU;

use smallvec::SmallVec;

use crate::config::SiftConfig;
use crate::constants::ORIENTATION_RADIUS_SIGMAS;
use crate::detect::localize::Keypoint;
use crate::scale_space::Octave;

/// Principal orientations of a keypoint, in radians in [0, τ).
pub type Orientations = SmallVec<[f32; 2]>;

/// Build the orientation histogram and extract its principal peaks.
///
/// All radii and boundary checks are octave-relative: the window radius is
/// computed in octave pixels and compared against octave dimensions. Returns
/// an empty set when the window leaves the octave interior.
pub fn assign_orientations(
    octave: &Octave,
    keypoint: &Keypoint,
    config: &SiftConfig,
) -> Orientations {
    let x = keypoint.position.x / octave.delta;
    let y = keypoint.position.y / octave.delta;
    let sigma = keypoint.sigma / octave.delta;

    let radius = (ORIENTATION_RADIUS_SIGMAS * config.lambda_ori * sigma).ceil() as isize;
    let cx = x.round() as isize;
    let cy = y.round() as isize;
    if cx - radius < 0
        || cx + radius >= octave.width as isize
        || cy - radius < 0
        || cy + radius >= octave.height as isize
    {
        return Orientations::new();
    }

    let mut histogram = vec![0.0f32; config.orientation_bins];
    let gradients = &octave.gradients[keypoint.scale];
    let bins = histogram.len() as f32;
    let two_lambda_sigma_sq = 2.0 * (config.lambda_ori * sigma) * (config.lambda_ori * sigma);

    for py in cy - radius..=cy + radius {
        for px in cx - radius..=cx + radius {
            let du = px as f32 - x;
            let dv = py as f32 - y;
            let weight = (-(du * du + dv * dv) / two_lambda_sigma_sq).exp();

            let gradient = *gradients.get(px as usize, py as usize);
            let magnitude = gradient.length();
            if magnitude == 0.0 {
                continue;
            }

            let angle = gradient.y.atan2(gradient.x).rem_euclid(TAU);
            let bin = ((angle / TAU * bins).round() as usize) % histogram.len();
            histogram[bin] += weight * magnitude;
        }
    }

    for _ in 0..config.orientation_smoothing_iterations {
        smooth_circular(&mut histogram);
    }

    extract_peaks(&histogram, config.orientation_threshold)
}

/// One pass of 3-tap circular averaging.
fn smooth_circular(histogram: &mut [f32]) {
    let n = histogram.len();
    let previous: Vec<f32> = histogram.to_vec();
    for i in 0..n {
        histogram[i] =
            (previous[(i + n - 1) % n] + previous[i] + previous[(i + 1) % n]) / 3.0;
    }
}

/// Bins that exceed both circular neighbors and `threshold * max`, refined
/// by parabolic interpolation of the three values around the peak.
fn extract_peaks(histogram: &[f32], threshold: f32) -> Orientations {
    let n = histogram.len();
    let max = histogram.iter().cloned().fold(0.0f32, f32::max);
    let mut peaks = Orientations::new();
    if max <= 0.0 {
        return peaks;
    }

    for i in 0..n {
        let value = histogram[i];
        let prev = histogram[(i + n - 1) % n];
        let next = histogram[(i + 1) % n];
        if value <= prev || value <= next || value < threshold * max {
            continue;
        }

        let denominator = prev - 2.0 * value + next;
        let offset = if denominator.abs() > f32::EPSILON {
            0.5 * (prev - next) / denominator
        } else {
            0.0
        };
        let angle = TAU * (i as f32 + offset) / n as f32;
        peaks.push(angle.rem_euclid(TAU));
    }

    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothing_conserves_total_mass() {
        let mut histogram = vec![0.0f32; 36];
        histogram[7] = 9.0;
        histogram[20] = 3.0;
        let before: f32 = histogram.iter().sum();
        for _ in 0..6 {
            smooth_circular(&mut histogram);
        }
        let after: f32 = histogram.iter().sum();
        assert!((before - after).abs() < 1e-4);
    }

    #[test]
    fn single_peak_is_extracted_at_its_bin() {
        let mut histogram = vec![0.1f32; 36];
        histogram[9] = 1.0;
        let peaks = extract_peaks(&histogram, 0.8);
        assert_eq!(peaks.len(), 1);
        let expected = TAU * 9.0 / 36.0;
        assert!((peaks[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn secondary_peaks_below_threshold_are_ignored() {
        let mut histogram = vec![0.0f32; 36];
        histogram[4] = 1.0;
        histogram[22] = 0.5;
        let peaks = extract_peaks(&histogram, 0.8);
        assert_eq!(peaks.len(), 1);
    }

    #[test]
    fn symmetric_twin_peaks_both_survive() {
        let mut histogram = vec![0.0f32; 36];
        histogram[4] = 1.0;
        histogram[22] = 0.95;
        let peaks = extract_peaks(&histogram, 0.8);
        assert_eq!(peaks.len(), 2);
    }

    #[test]
    fn parabolic_refinement_shifts_toward_heavier_neighbor() {
        let mut histogram = vec![0.0f32; 36];
        histogram[9] = 1.0;
        histogram[10] = 0.8;
        histogram[8] = 0.2;
        let peaks = extract_peaks(&histogram, 0.5);
        assert_eq!(peaks.len(), 1);
        let center = TAU * 9.0 / 36.0;
        assert!(peaks[0] > center, "peak should lean toward bin 10");
    }
}
