//! Single-image inference with trained generator weights.

use std::fs;
use std::path::Path;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use image::RgbImage;

use facesr_core::{Error, ImageShape, NetworkKind, Result};
use facesr_data::{load_rgb, to_chw, to_rgb_image};
use facesr_model::{build_generator, SuperResolver};

use crate::tensors::{image_tensor, tensor_images};

/// A generator loaded for inference
pub struct Upscaler {
    generator: Box<dyn SuperResolver>,
    device: Device,
}

impl Upscaler {
    /// Build the generator and load weights saved by training.
    ///
    /// `kind`, `scale`, `filters` and `res_blocks` must match the run that
    /// produced the weights.
    pub fn load<P: AsRef<Path>>(
        weights: P,
        kind: NetworkKind,
        scale: usize,
        filters: usize,
        res_blocks: usize,
        device: &Device,
    ) -> Result<Self> {
        let weights = weights.as_ref();
        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let generator = build_generator(kind, scale, filters, res_blocks, vb)?;

        varmap
            .load(weights)
            .map_err(|e| Error::Checkpoint(format!("{}: {}", weights.display(), e)))?;

        tracing::info!(
            network = %kind,
            scale,
            weights = %weights.display(),
            "Loaded generator"
        );

        Ok(Self {
            generator,
            device: device.clone(),
        })
    }

    pub fn from_generator(generator: Box<dyn SuperResolver>, device: &Device) -> Self {
        Self {
            generator,
            device: device.clone(),
        }
    }

    pub fn scale(&self) -> usize {
        self.generator.scale()
    }

    /// Super-resolve one image of any size
    pub fn upscale(&self, image: &RgbImage) -> Result<RgbImage> {
        let shape = ImageShape::rgb(image.height() as usize, image.width() as usize);
        if shape.is_empty() {
            return Err(Error::InvalidInput("empty input image".into()));
        }

        let lr = image_tensor(&to_chw(image, None), shape, &self.device)?;
        let sr = self.generator.forward_t(&lr, false)?;
        let data = tensor_images(&sr)?
            .pop()
            .ok_or_else(|| Error::Framework("generator returned an empty batch".into()))?;

        to_rgb_image(&data, shape.upsample(self.scale()), None)
    }

    /// Read `input`, super-resolve it and write the result to `output`
    pub fn upscale_file(&self, input: &Path, output: &Path) -> Result<ImageShape> {
        let image = load_rgb(input)?;
        let upscaled = self.upscale(&image)?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        upscaled.save(output)?;

        let shape = ImageShape::rgb(upscaled.height() as usize, upscaled.width() as usize);
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            size = %shape,
            "Upscaled image"
        );
        Ok(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_upscale_with_saved_weights() -> Result<()> {
        let device = Device::Cpu;
        let dir = tempfile::tempdir()?;
        let weights = dir.path().join("generator.safetensors");

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let trained = build_generator(NetworkKind::Edsr, 2, 4, 1, vb)?;
        varmap.save(&weights)?;

        let upscaler = Upscaler::load(&weights, NetworkKind::Edsr, 2, 4, 1, &device)?;
        assert_eq!(upscaler.scale(), 2);

        let input = RgbImage::from_fn(6, 5, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 128]));
        let output = upscaler.upscale(&input)?;
        assert_eq!(output.dimensions(), (12, 10));

        // Reloaded weights reproduce the saved generator
        let expected = Upscaler::from_generator(trained, &device).upscale(&input)?;
        assert_eq!(output, expected);

        let input_path = dir.path().join("face.png");
        input.save(&input_path)?;
        let out_path = dir.path().join("out").join("face_x2.png");
        let shape = upscaler.upscale_file(&input_path, &out_path)?;
        assert_eq!(shape, ImageShape::rgb(10, 12));
        assert!(out_path.exists());
        Ok(())
    }

    #[test]
    fn test_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        let result = Upscaler::load(
            dir.path().join("missing.safetensors"),
            NetworkKind::Srgan,
            4,
            8,
            1,
            &Device::Cpu,
        );
        assert!(result.is_err());
    }
}
