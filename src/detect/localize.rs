//! Sub-pixel / sub-scale keypoint localization.
//!
//! Refines each raw extremum with Newton's method on the local quadratic
//! model of the DoG response, then applies the contrast and edge-response
//! rejection tests. All finite differences are pure reads of the immutable
//! difference planes.

use glam::{Mat3, Vec2, Vec3};

use crate::config::SiftConfig;
use crate::constants::{
    CONTRAST_PREFILTER_RATIO, HESSIAN_DETERMINANT_EPSILON, MAX_INTERPOLATION_OFFSET,
};
use crate::detect::extrema::RawExtremum;
use crate::image::Image;
use crate::scale_space::Octave;

/// A localized, filtered keypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// Octave the keypoint was detected in.
    pub octave: usize,
    /// Integer scale slot within the octave.
    pub scale: usize,
    /// Sub-scale offset in [-1, 1).
    pub scale_offset: f32,
    /// Integer position in octave pixels.
    pub x: usize,
    pub y: usize,
    /// Absolute position in input-image coordinates.
    pub position: Vec2,
    /// Effective blur level in input-image units.
    pub sigma: f32,
    /// Interpolated DoG response at the refined position.
    pub contrast: f32,
}

/// Why a candidate was dropped. Rejections are expected filtering outcomes,
/// counted for diagnostics and never treated as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Raw or interpolated response below the DoG threshold.
    LowContrast,
    /// Curvature ratio indicates a ridge rather than a blob.
    OnEdge,
    /// Refinement walked outside the valid interior region.
    OutOfBounds,
    /// Offsets never settled below the convergence bound, or the local
    /// Hessian was singular.
    NotConverged,
}

/// Refine one raw extremum into a keypoint, or reject it.
pub fn localize(
    octave: &Octave,
    config: &SiftConfig,
    extremum: &RawExtremum,
) -> Result<Keypoint, Rejection> {
    if extremum.value.abs() <= CONTRAST_PREFILTER_RATIO * config.dog_threshold {
        return Err(Rejection::LowContrast);
    }

    let border = config.image_border;
    if octave.width <= 2 * border || octave.height <= 2 * border {
        return Err(Rejection::OutOfBounds);
    }

    let mut x = extremum.x;
    let mut y = extremum.y;
    let mut s = extremum.scale;
    if !in_interior(octave, config, x, y, s) {
        return Err(Rejection::OutOfBounds);
    }

    let mut alpha = Vec3::ZERO;
    let mut gradient = Vec3::ZERO;
    let mut converged = false;

    for _ in 0..config.max_interpolation_iterations {
        gradient = dog_gradient(octave, x, y, s);
        let hessian = dog_hessian(octave, x, y, s);
        if hessian.determinant().abs() < HESSIAN_DETERMINANT_EPSILON {
            return Err(Rejection::NotConverged);
        }
        alpha = -(hessian.inverse() * gradient);

        if alpha.x.abs() < MAX_INTERPOLATION_OFFSET
            && alpha.y.abs() < MAX_INTERPOLATION_OFFSET
            && alpha.z.abs() < MAX_INTERPOLATION_OFFSET
        {
            converged = true;
            break;
        }

        // Unit step along every axis whose offset overshoots; the offset
        // itself is never rounded into the step.
        let (mut nx, mut ny, mut ns) = (x as isize, y as isize, s as isize);
        if alpha.x > MAX_INTERPOLATION_OFFSET {
            nx += 1;
        } else if alpha.x < -MAX_INTERPOLATION_OFFSET {
            nx -= 1;
        }
        if alpha.y > MAX_INTERPOLATION_OFFSET {
            ny += 1;
        } else if alpha.y < -MAX_INTERPOLATION_OFFSET {
            ny -= 1;
        }
        if alpha.z > MAX_INTERPOLATION_OFFSET {
            ns += 1;
        } else if alpha.z < -MAX_INTERPOLATION_OFFSET {
            ns -= 1;
        }

        if ns < 1
            || ns as usize > octave.scales()
            || nx < border as isize
            || nx as usize >= octave.width - border
            || ny < border as isize
            || ny as usize >= octave.height - border
        {
            return Err(Rejection::OutOfBounds);
        }
        x = nx as usize;
        y = ny as usize;
        s = ns as usize;
    }

    if !converged {
        return Err(Rejection::NotConverged);
    }

    let response = *octave.differences[s].get(x, y);
    let contrast = response + 0.5 * gradient.dot(alpha);
    if contrast.abs() <= config.dog_threshold {
        return Err(Rejection::LowContrast);
    }

    if is_on_edge(&octave.differences[s], x, y, config.edge_threshold) {
        return Err(Rejection::OnEdge);
    }

    let sigma_ratio = config.sigma_ratio();
    let sigma = octave.sigmas[s] * sigma_ratio.powf(alpha.z);
    let position = Vec2::new(
        (x as f32 + alpha.x) * octave.delta,
        (y as f32 + alpha.y) * octave.delta,
    );

    Ok(Keypoint {
        octave: extremum.octave,
        scale: s,
        scale_offset: alpha.z,
        x,
        y,
        position,
        sigma,
        contrast,
    })
}

fn in_interior(octave: &Octave, config: &SiftConfig, x: usize, y: usize, s: usize) -> bool {
    let border = config.image_border;
    s >= 1
        && s <= octave.scales()
        && x >= border
        && x < octave.width - border
        && y >= border
        && y < octave.height - border
}

/// Finite-difference gradient of the DoG response in (x, y, scale).
fn dog_gradient(octave: &Octave, x: usize, y: usize, s: usize) -> Vec3 {
    let d = &octave.differences;
    let dx = 0.5 * (d[s].get(x + 1, y) - d[s].get(x - 1, y));
    let dy = 0.5 * (d[s].get(x, y + 1) - d[s].get(x, y - 1));
    let ds = 0.5 * (d[s + 1].get(x, y) - d[s - 1].get(x, y));
    Vec3::new(dx, dy, ds)
}

/// Finite-difference 3×3 Hessian of the DoG response in (x, y, scale).
fn dog_hessian(octave: &Octave, x: usize, y: usize, s: usize) -> Mat3 {
    let d = &octave.differences;
    let center = *d[s].get(x, y);

    let hxx = d[s].get(x + 1, y) + d[s].get(x - 1, y) - 2.0 * center;
    let hyy = d[s].get(x, y + 1) + d[s].get(x, y - 1) - 2.0 * center;
    let hss = d[s + 1].get(x, y) + d[s - 1].get(x, y) - 2.0 * center;

    let hxy = 0.25
        * (d[s].get(x + 1, y + 1) - d[s].get(x + 1, y - 1) - d[s].get(x - 1, y + 1)
            + d[s].get(x - 1, y - 1));
    let hxs = 0.25
        * (d[s + 1].get(x + 1, y) - d[s + 1].get(x - 1, y) - d[s - 1].get(x + 1, y)
            + d[s - 1].get(x - 1, y));
    let hys = 0.25
        * (d[s + 1].get(x, y + 1) - d[s + 1].get(x, y - 1) - d[s - 1].get(x, y + 1)
            + d[s - 1].get(x, y - 1));

    Mat3::from_cols(
        Vec3::new(hxx, hxy, hxs),
        Vec3::new(hxy, hyy, hys),
        Vec3::new(hxs, hys, hss),
    )
}

/// Edge-response test on the 2×2 spatial Hessian: reject saddles and points
/// whose curvature ratio exceeds `(t + 1)² / t`.
fn is_on_edge(plane: &Image<f32>, x: usize, y: usize, edge_threshold: f32) -> bool {
    let center = *plane.get(x, y);
    let hxx = plane.get(x + 1, y) + plane.get(x - 1, y) - 2.0 * center;
    let hyy = plane.get(x, y + 1) + plane.get(x, y - 1) - 2.0 * center;
    let hxy = 0.25
        * (plane.get(x + 1, y + 1) - plane.get(x + 1, y - 1) - plane.get(x - 1, y + 1)
            + plane.get(x - 1, y - 1));

    let trace = hxx + hyy;
    let det = hxx * hyy - hxy * hxy;
    if det <= 0.0 {
        return true;
    }
    let bound = (edge_threshold + 1.0) * (edge_threshold + 1.0) / edge_threshold;
    trace * trace / det >= bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::scale_space::ScaleSpaceBuilder;
    use crate::testing::gaussian_blob_image;

    fn blob_octave() -> Octave {
        let config = SiftConfig {
            num_octaves: Some(1),
            ..SiftConfig::default()
        };
        let backend = CpuBackend::new();
        let image = gaussian_blob_image(64, 64, 32.0, 32.0, 2.0, 1.0);
        let mut space = ScaleSpaceBuilder::new(&config, &backend).build(&image);
        space.octaves.remove(0)
    }

    #[test]
    fn weak_candidates_are_prefiltered() {
        let octave = blob_octave();
        let config = SiftConfig::default();
        let weak = RawExtremum {
            octave: 0,
            scale: 1,
            x: 20,
            y: 20,
            value: 0.8 * config.dog_threshold,
        };
        assert_eq!(
            localize(&octave, &config, &weak),
            Err(Rejection::LowContrast)
        );
    }

    #[test]
    fn candidates_near_the_border_are_rejected() {
        let octave = blob_octave();
        let config = SiftConfig::default();
        let edge = RawExtremum {
            octave: 0,
            scale: 1,
            x: 1,
            y: 1,
            value: 1.0,
        };
        assert_eq!(
            localize(&octave, &config, &edge),
            Err(Rejection::OutOfBounds)
        );
    }

    #[test]
    fn saddle_points_fail_the_edge_test() {
        // D(x, y) = x² - y² has det(H) < 0 everywhere.
        let mut pixels = Vec::with_capacity(49);
        for y in 0..7i32 {
            for x in 0..7i32 {
                let cx = (x - 3) as f32;
                let cy = (y - 3) as f32;
                pixels.push(cx * cx - cy * cy);
            }
        }
        let plane = Image::from_pixels(7, 7, pixels);
        assert!(is_on_edge(&plane, 3, 3, 10.0));
    }

    #[test]
    fn isotropic_peaks_pass_the_edge_test() {
        // D(x, y) = -(x² + y²) has equal principal curvatures.
        let mut pixels = Vec::with_capacity(49);
        for y in 0..7i32 {
            for x in 0..7i32 {
                let cx = (x - 3) as f32;
                let cy = (y - 3) as f32;
                pixels.push(-(cx * cx + cy * cy));
            }
        }
        let plane = Image::from_pixels(7, 7, pixels);
        assert!(!is_on_edge(&plane, 3, 3, 10.0));
    }
}
