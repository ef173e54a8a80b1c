//! Gaussian / difference-of-Gaussians scale-space construction.
//!
//! The scale space is a sequence of octaves, each holding `scales + 3`
//! Gaussian planes, `scales + 2` difference planes and one gradient plane
//! per Gaussian slot. Octave 0 is seeded by upsampling the input to the
//! `delta_min` grid and blurring it up to `sigma_min`; each later octave is
//! seeded by nearest-neighbor half-downsampling the previous octave's
//! Gaussian plane at slot `scales`. Within an octave, plane `s` is obtained
//! from plane `s - 1` with an incremental blur whose variance closes the gap
//! of the geometric sigma schedule
//! `sigma(o, s) = delta(o) / delta_min * sigma_min * 2^(s / scales)`.

#[cfg(test)]
mod tests;

use glam::Vec2;

use crate::backend::ComputeBackend;
use crate::config::SiftConfig;
use crate::image::Image;

/// One doubling-of-blur level of the scale space.
#[derive(Debug)]
pub struct Octave {
    /// Octave index.
    pub index: usize,
    /// Sampling distance: image pixels per octave pixel.
    pub delta: f32,
    /// Octave width in pixels.
    pub width: usize,
    /// Octave height in pixels.
    pub height: usize,
    /// Blur level per Gaussian slot, strictly increasing.
    pub sigmas: Vec<f32>,
    /// Gaussian planes, one per slot.
    pub gaussians: Vec<Image<f32>>,
    /// Difference planes: `gaussians[s + 1] - gaussians[s]`.
    pub differences: Vec<Image<f32>>,
    /// Per-pixel (dx, dy) of each Gaussian plane.
    pub gradients: Vec<Image<Vec2>>,
}

impl Octave {
    /// Number of scales sampled in this octave (difference planes minus 2).
    pub fn scales(&self) -> usize {
        self.differences.len() - 2
    }
}

/// The full multi-octave pyramid, immutable after construction.
#[derive(Debug)]
pub struct ScaleSpace {
    pub octaves: Vec<Octave>,
}

impl ScaleSpace {
    pub fn num_octaves(&self) -> usize {
        self.octaves.len()
    }
}

/// Builds a [`ScaleSpace`] from a grayscale image via backend kernels.
pub struct ScaleSpaceBuilder<'a, B: ComputeBackend> {
    config: &'a SiftConfig,
    backend: &'a B,
}

impl<'a, B: ComputeBackend> ScaleSpaceBuilder<'a, B> {
    pub fn new(config: &'a SiftConfig, backend: &'a B) -> Self {
        config.validate();
        Self { config, backend }
    }

    /// Build the pyramid. Every plane is realized before this returns.
    pub fn build(&self, input: &Image<f32>) -> ScaleSpace {
        assert!(!input.is_empty(), "input image must not be empty");

        let config = self.config;
        let seed = self.build_seed(input);

        let num_octaves = config.num_octaves_for(input.width(), input.height());
        let mut octaves: Vec<Octave> = Vec::with_capacity(num_octaves);

        for o in 0..num_octaves {
            let delta = config.delta_min * 2.0f32.powi(o as i32);
            let width = (input.width() as f32 / delta) as usize;
            let height = (input.height() as f32 / delta) as usize;
            if width < 3 || height < 3 {
                tracing::debug!(octave = o, width, height, "octave too small, stopping");
                break;
            }

            let sigmas = self.octave_sigmas(delta);
            let gaussians = match octaves.last() {
                None => self.build_gaussians(seed.clone(), &sigmas, delta),
                Some(previous) => {
                    let source = &previous.gaussians[config.scales_per_octave];
                    let mut first = Image::<f32>::new(width, height);
                    self.backend.downsample_half(source, &mut first);
                    self.build_gaussians(first, &sigmas, delta)
                }
            };

            let differences = self.build_differences(&gaussians);
            let gradients = self.build_gradients(&gaussians);
            self.backend.synchronize();

            tracing::debug!(
                octave = o,
                width,
                height,
                delta,
                sigma_min = sigmas.first().copied().unwrap_or(0.0),
                sigma_max = sigmas.last().copied().unwrap_or(0.0),
                "octave realized"
            );

            octaves.push(Octave {
                index: o,
                delta,
                width,
                height,
                sigmas,
                gaussians,
                differences,
                gradients,
            });
        }

        ScaleSpace { octaves }
    }

    /// Upsample the input to the `delta_min` grid and blur it to `sigma_min`.
    fn build_seed(&self, input: &Image<f32>) -> Image<f32> {
        let config = self.config;
        let seed_width = (input.width() as f32 / config.delta_min) as usize;
        let seed_height = (input.height() as f32 / config.delta_min) as usize;

        let mut scaled = Image::<f32>::new(seed_width, seed_height);
        if seed_width == input.width() && seed_height == input.height() {
            scaled = input.clone();
        } else {
            self.backend.upsample_bilinear(input, &mut scaled);
        }

        let sigma_seed = (config.sigma_min * config.sigma_min
            - config.sigma_input * config.sigma_input)
            .sqrt()
            / config.delta_min;
        let mut seed = Image::<f32>::new(seed_width, seed_height);
        self.backend.blur(&scaled, sigma_seed, &mut seed);
        self.backend.synchronize();
        seed
    }

    /// Geometric sigma schedule for one octave.
    fn octave_sigmas(&self, delta: f32) -> Vec<f32> {
        let config = self.config;
        let num_gaussians = config.scales_per_octave + 3;
        (0..num_gaussians)
            .map(|s| {
                let exponent = s as f32 / config.scales_per_octave as f32;
                delta / config.delta_min * config.sigma_min * 2.0f32.powf(exponent)
            })
            .collect()
    }

    /// Chain incremental blurs so the cumulative blur of slot `s` matches
    /// `sigmas[s]`: the incremental kernel has
    /// `rho = sqrt(sigmas[s]² - sigmas[s-1]²) / delta`.
    fn build_gaussians(&self, first: Image<f32>, sigmas: &[f32], delta: f32) -> Vec<Image<f32>> {
        let mut gaussians = Vec::with_capacity(sigmas.len());
        gaussians.push(first);
        for s in 1..sigmas.len() {
            let sa = sigmas[s - 1];
            let sb = sigmas[s];
            let rho = (sb * sb - sa * sa).sqrt() / delta;
            let previous = &gaussians[s - 1];
            let mut next = Image::<f32>::new(previous.width(), previous.height());
            self.backend.blur(previous, rho, &mut next);
            gaussians.push(next);
        }
        gaussians
    }

    fn build_differences(&self, gaussians: &[Image<f32>]) -> Vec<Image<f32>> {
        let mut differences = Vec::with_capacity(gaussians.len() - 1);
        for s in 0..gaussians.len() - 1 {
            let mut plane = Image::<f32>::new(gaussians[s].width(), gaussians[s].height());
            self.backend.subtract(&gaussians[s + 1], &gaussians[s], &mut plane);
            differences.push(plane);
        }
        differences
    }

    fn build_gradients(&self, gaussians: &[Image<f32>]) -> Vec<Image<Vec2>> {
        gaussians
            .iter()
            .map(|plane| {
                let mut gradient = Image::<Vec2>::new(plane.width(), plane.height());
                self.backend.gradient(plane, &mut gradient);
                gradient
            })
            .collect()
    }
}
