use glam::Vec2;

use crate::backend::{ComputeBackend, CpuBackend};
use crate::config::SiftConfig;
use crate::image::Image;
use crate::scale_space::ScaleSpaceBuilder;
use crate::testing::gaussian_blob_image;

fn test_config(octaves: usize) -> SiftConfig {
    SiftConfig {
        num_octaves: Some(octaves),
        ..SiftConfig::default()
    }
}

fn test_image() -> Image<f32> {
    gaussian_blob_image(64, 48, 30.0, 22.0, 3.0, 1.0)
}

#[test]
fn octave_plane_counts_follow_scales_per_octave() {
    let config = test_config(3);
    let backend = CpuBackend::new();
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&test_image());

    assert_eq!(space.num_octaves(), 3);
    for octave in &space.octaves {
        assert_eq!(octave.gaussians.len(), config.scales_per_octave + 3);
        assert_eq!(octave.differences.len(), config.scales_per_octave + 2);
        assert_eq!(octave.gradients.len(), config.scales_per_octave + 3);
        assert_eq!(octave.scales(), config.scales_per_octave);
    }
}

#[test]
fn sigmas_are_strictly_increasing_within_each_octave() {
    let config = test_config(3);
    let backend = CpuBackend::new();
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&test_image());

    for octave in &space.octaves {
        for pair in octave.sigmas.windows(2) {
            assert!(
                pair[1] > pair[0],
                "octave {} sigmas not increasing: {:?}",
                octave.index,
                octave.sigmas
            );
        }
    }
}

#[test]
fn sigma_schedule_is_geometric() {
    let config = test_config(2);
    let backend = CpuBackend::new();
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&test_image());

    let ratio = config.sigma_ratio();
    for octave in &space.octaves {
        for pair in octave.sigmas.windows(2) {
            assert!((pair[1] / pair[0] - ratio).abs() < 1e-5);
        }
        // First sigma of the octave follows delta / delta_min * sigma_min.
        let expected = octave.delta / config.delta_min * config.sigma_min;
        assert!((octave.sigmas[0] - expected).abs() < 1e-5);
    }
}

#[test]
fn octave_dimensions_halve_and_delta_doubles() {
    let config = test_config(3);
    let backend = CpuBackend::new();
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&test_image());

    for pair in space.octaves.windows(2) {
        assert_eq!(pair[1].width, pair[0].width / 2);
        assert_eq!(pair[1].height, pair[0].height / 2);
        assert!((pair[1].delta / pair[0].delta - 2.0).abs() < 1e-6);
    }
    assert!((space.octaves[0].delta - config.delta_min).abs() < 1e-6);
}

#[test]
fn next_octave_is_seeded_by_downsampling_the_previous() {
    let config = test_config(2);
    let backend = CpuBackend::new();
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&test_image());

    let source = &space.octaves[0].gaussians[config.scales_per_octave];
    let seeded = &space.octaves[1].gaussians[0];

    let mut expected = Image::<f32>::new(seeded.width(), seeded.height());
    backend.downsample_half(source, &mut expected);

    for (a, b) in seeded.pixels().iter().zip(expected.pixels()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn differences_are_adjacent_gaussian_pairs() {
    let config = test_config(1);
    let backend = CpuBackend::new();
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&test_image());

    let octave = &space.octaves[0];
    for s in 0..octave.differences.len() {
        for (i, d) in octave.differences[s].pixels().iter().enumerate() {
            let expected = octave.gaussians[s + 1].pixels()[i] - octave.gaussians[s].pixels()[i];
            assert!((d - expected).abs() < 1e-6);
        }
    }
}

#[test]
fn gradient_planes_match_central_differences() {
    let config = test_config(1);
    let backend = CpuBackend::new();
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&test_image());

    let octave = &space.octaves[0];
    let plane = &octave.gaussians[1];
    let gradient = &octave.gradients[1];
    for y in 1..octave.height - 1 {
        for x in 1..octave.width - 1 {
            let expected = Vec2::new(
                0.5 * (plane.get(x + 1, y) - plane.get(x - 1, y)),
                0.5 * (plane.get(x, y + 1) - plane.get(x, y - 1)),
            );
            let actual = *gradient.get(x, y);
            assert!((actual - expected).length() < 1e-6);
        }
    }
}

#[test]
fn blur_accumulates_across_slots() {
    // Increasing blur spreads the blob: the peak value of each successive
    // Gaussian plane must decrease.
    let config = test_config(1);
    let backend = CpuBackend::new();
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&test_image());

    let octave = &space.octaves[0];
    let peaks: Vec<f32> = octave
        .gaussians
        .iter()
        .map(|g| g.pixels().iter().cloned().fold(0.0f32, f32::max))
        .collect();
    for pair in peaks.windows(2) {
        assert!(
            pair[1] < pair[0],
            "blur did not accumulate: peaks {peaks:?}"
        );
    }
}

#[test]
fn tiny_images_stop_producing_octaves() {
    let config = test_config(8);
    let backend = CpuBackend::new();
    let image = gaussian_blob_image(16, 16, 8.0, 8.0, 1.5, 1.0);
    let space = ScaleSpaceBuilder::new(&config, &backend).build(&image);

    // 16 px at delta_min 0.5 is a 32 px seed; halving stops before 3 px.
    assert!(space.num_octaves() < 8);
    for octave in &space.octaves {
        assert!(octave.width >= 3 && octave.height >= 3);
    }
}
