//! Feature-wise RGB mean of a dataset.

use std::path::PathBuf;

use image::imageops::{self, FilterType};

use facesr_core::{Error, ImageShape, Result};

use crate::sampler::load_rgb;

/// Per-channel mean over every image resized to `shape`.
///
/// The result is in the same normalized `[-1, 1]` units the sampler
/// produces, so it can be passed straight to [`crate::Sampler::with_rgb_mean`].
pub fn rgb_mean(shape: ImageShape, paths: &[PathBuf]) -> Result<[f32; 3]> {
    if paths.is_empty() {
        return Err(Error::InsufficientData {
            required: 1,
            available: 0,
        });
    }

    let mut sums = [0.0f64; 3];
    let mut count = 0u64;

    for (i, path) in paths.iter().enumerate() {
        let image = load_rgb(path)?;
        let image = imageops::resize(
            &image,
            shape.width as u32,
            shape.height as u32,
            FilterType::Triangle,
        );

        for pixel in image.pixels() {
            for c in 0..3 {
                sums[c] += pixel[c] as f64 / 127.5 - 1.0;
            }
        }
        count += (shape.height * shape.width) as u64;

        if (i + 1) % 1000 == 0 {
            tracing::debug!(processed = i + 1, total = paths.len(), "Computing RGB mean");
        }
    }

    let mean = [
        (sums[0] / count as f64) as f32,
        (sums[1] / count as f64) as f32,
        (sums[2] / count as f64) as f32,
    ];
    tracing::info!(?mean, images = paths.len(), "Computed RGB mean");

    Ok(mean)
}
