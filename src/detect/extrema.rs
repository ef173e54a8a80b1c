//! Scale-space extremum detection.
//!
//! Runs the backend's 3×3×3 extremum kernel over every interior difference
//! slot of an octave and collects the sparse candidate list.

use crate::backend::ComputeBackend;
use crate::image::Image;
use crate::scale_space::Octave;

/// A discrete scale-space extremum, prior to sub-pixel refinement.
#[derive(Debug, Clone, Copy)]
pub struct RawExtremum {
    pub octave: usize,
    /// Interior difference-plane slot, in `[1, scales]`.
    pub scale: usize,
    pub x: usize,
    pub y: usize,
    /// DoG response at the discrete position.
    pub value: f32,
}

/// Collect all strict 26-neighbor extrema of an octave.
///
/// Interior slots only: slot `i` compares difference planes `i - 1`, `i`,
/// `i + 1`, so candidates live in `1..=scales`.
pub fn detect_extrema<B: ComputeBackend>(backend: &B, octave: &Octave) -> Vec<RawExtremum> {
    let mut extrema = Vec::new();
    let mut mask = Image::<i8>::new(octave.width, octave.height);

    for slot in 1..=octave.scales() {
        backend.extrema_3x3x3(
            &octave.differences[slot - 1],
            &octave.differences[slot],
            &octave.differences[slot + 1],
            &mut mask,
        );
        backend.synchronize();

        for y in 1..octave.height - 1 {
            let row = mask.row(y);
            for (x, &flag) in row.iter().enumerate() {
                if flag != 0 {
                    extrema.push(RawExtremum {
                        octave: octave.index,
                        scale: slot,
                        x,
                        y,
                        value: *octave.differences[slot].get(x, y),
                    });
                }
            }
        }
    }

    tracing::debug!(
        octave = octave.index,
        count = extrema.len(),
        "raw extrema collected"
    );
    extrema
}
