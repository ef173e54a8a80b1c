//! Synthetic image generation for tests.

use crate::image::Image;

/// Add an isotropic Gaussian blob to an image.
pub fn add_gaussian_blob(image: &mut Image<f32>, cx: f32, cy: f32, sigma: f32, amplitude: f32) {
    let two_sigma_sq = 2.0 * sigma * sigma;
    // Render out to 5 sigma; beyond that the contribution is negligible.
    let radius = (5.0 * sigma).ceil() as isize;
    let x0 = ((cx - radius as f32).floor().max(0.0)) as usize;
    let y0 = ((cy - radius as f32).floor().max(0.0)) as usize;
    let x1 = ((cx + radius as f32).ceil() as usize).min(image.width() - 1);
    let y1 = ((cy + radius as f32).ceil() as usize).min(image.height() - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            *image.get_mut(x, y) += amplitude * (-(dx * dx + dy * dy) / two_sigma_sq).exp();
        }
    }
}

/// A flat image holding a single Gaussian blob.
pub fn gaussian_blob_image(
    width: usize,
    height: usize,
    cx: f32,
    cy: f32,
    sigma: f32,
    amplitude: f32,
) -> Image<f32> {
    let mut image = Image::new(width, height);
    add_gaussian_blob(&mut image, cx, cy, sigma, amplitude);
    image
}

/// Uniformly random points in the unit cube, deterministic per seed.
pub fn random_points(count: usize, dims: usize, seed: u64) -> Vec<Vec<f32>> {
    use rand::prelude::*;

    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dims).map(|_| rng.random::<f32>()).collect())
        .collect()
}

/// Brute-force nearest neighbor, the oracle for index tests.
pub fn brute_force_nearest(points: &[Vec<f32>], query: &[f32]) -> (usize, f32) {
    let mut best = (0usize, f32::INFINITY);
    for (i, point) in points.iter().enumerate() {
        let distance = point
            .iter()
            .zip(query)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt();
        if distance < best.1 {
            best = (i, distance);
        }
    }
    best
}
