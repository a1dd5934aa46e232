//! Preview images of generator output during training.

use std::fs;
use std::path::{Path, PathBuf};

use candle_core::Device;
use image::imageops::{self, FilterType};
use image::RgbImage;

use facesr_core::{Error, Result};
use facesr_data::{to_rgb_image, ImageBatch};
use facesr_model::SuperResolver;

use crate::tensors::{batch_tensors, tensor_images};

/// Upscale every LR sample of `batch` and write a comparison grid to `path`.
///
/// One row per sample; columns are the LR input (nearest-neighbour enlarged),
/// the generator output and the HR target.
pub fn generate_images(
    generator: &dyn SuperResolver,
    batch: &ImageBatch,
    device: &Device,
    path: &Path,
) -> Result<PathBuf> {
    if batch.is_empty() {
        return Err(Error::InsufficientData {
            required: 1,
            available: 0,
        });
    }

    let (lr, _) = batch_tensors(batch, 0..batch.len, device)?;
    let sr = generator.forward_t(&lr, false)?;
    let sr_images = tensor_images(&sr)?;

    let (w, h) = (batch.hr_shape.width as u32, batch.hr_shape.height as u32);
    let mut canvas = RgbImage::new(w * 3, h * batch.len as u32);

    for (i, sr_data) in sr_images.iter().enumerate() {
        let lr_img = to_rgb_image(batch.sample_lr(i), batch.lr_shape, batch.rgb_mean)?;
        let lr_img = imageops::resize(&lr_img, w, h, FilterType::Nearest);
        let sr_img = to_rgb_image(sr_data, batch.hr_shape, batch.rgb_mean)?;
        let hr_img = to_rgb_image(batch.sample_hr(i), batch.hr_shape, batch.rgb_mean)?;

        let y = (i as u32 * h) as i64;
        imageops::replace(&mut canvas, &lr_img, 0, y);
        imageops::replace(&mut canvas, &sr_img, w as i64, y);
        imageops::replace(&mut canvas, &hr_img, 2 * w as i64, y);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    canvas.save(path)?;

    tracing::debug!(path = %path.display(), samples = batch.len, "Wrote preview");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};
    use facesr_core::{ImageShape, NetworkKind};
    use facesr_model::build_generator;

    #[test]
    fn test_preview_grid_dimensions() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let generator = build_generator(NetworkKind::Edsr, 2, 4, 1, vb)?;

        let lr_shape = ImageShape::rgb(4, 4);
        let hr_shape = ImageShape::rgb(8, 8);
        let batch = ImageBatch {
            lr: vec![0.0; 2 * lr_shape.len()],
            hr: vec![0.0; 2 * hr_shape.len()],
            lr_shape,
            hr_shape,
            len: 2,
            sources: Vec::new(),
            rgb_mean: None,
        };

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("previews").join("epoch_000000.png");
        generate_images(generator.as_ref(), &batch, &device, &path)?;

        let written = image::open(&path)?;
        assert_eq!((written.width(), written.height()), (24, 16));
        Ok(())
    }
}
