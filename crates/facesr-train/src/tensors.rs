//! Conversion between sampled image batches and NCHW tensors.

use std::ops::Range;

use candle_core::{Device, Tensor};

use facesr_core::{Error, ImageShape, Result};
use facesr_data::ImageBatch;

/// LR and HR tensors for samples `range` of a batch
pub fn batch_tensors(
    batch: &ImageBatch,
    range: Range<usize>,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    if range.start >= range.end || range.end > batch.len {
        return Err(Error::InvalidInput(format!(
            "sample range {:?} outside batch of {}",
            range, batch.len
        )));
    }

    let n = range.len();
    let (lr_n, hr_n) = (batch.lr_shape.len(), batch.hr_shape.len());

    let lr = Tensor::from_slice(
        &batch.lr[range.start * lr_n..range.end * lr_n],
        batch.lr_shape.nchw(n),
        device,
    )?;
    let hr = Tensor::from_slice(
        &batch.hr[range.start * hr_n..range.end * hr_n],
        batch.hr_shape.nchw(n),
        device,
    )?;

    Ok((lr, hr))
}

/// Single-sample LR and HR tensors `[1, 3, h, w]`
pub fn sample_tensors(batch: &ImageBatch, index: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    batch_tensors(batch, index..index + 1, device)
}

/// Tensor `[1, 3, h, w]` for one normalized CHW image
pub fn image_tensor(data: &[f32], shape: ImageShape, device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(data, shape.nchw(1), device)?)
}

/// Split a `[batch, 3, h, w]` tensor into per-image CHW vectors
pub fn tensor_images(tensor: &Tensor) -> Result<Vec<Vec<f32>>> {
    let (batch, _, _, _) = tensor.dims4()?;
    let tensor = tensor.to_dtype(candle_core::DType::F32)?;

    (0..batch)
        .map(|i| -> Result<Vec<f32>> { Ok(tensor.get(i)?.flatten_all()?.to_vec1::<f32>()?) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn batch(len: usize) -> ImageBatch {
        let lr_shape = ImageShape::rgb(2, 2);
        let hr_shape = ImageShape::rgb(4, 4);
        ImageBatch {
            lr: (0..len * lr_shape.len()).map(|v| v as f32).collect(),
            hr: vec![0.5; len * hr_shape.len()],
            lr_shape,
            hr_shape,
            len,
            sources: vec![PathBuf::from("x.png"); len],
            rgb_mean: None,
        }
    }

    #[test]
    fn test_sample_tensors() -> Result<()> {
        let batch = batch(3);
        let (lr, hr) = sample_tensors(&batch, 1, &Device::Cpu)?;
        assert_eq!(lr.dims(), &[1, 3, 2, 2]);
        assert_eq!(hr.dims(), &[1, 3, 4, 4]);

        let first: f32 = lr.flatten_all()?.get(0)?.to_scalar()?;
        assert_eq!(first, 12.0);
        Ok(())
    }

    #[test]
    fn test_range_checks() {
        let batch = batch(2);
        assert!(batch_tensors(&batch, 0..3, &Device::Cpu).is_err());
        assert!(batch_tensors(&batch, 1..1, &Device::Cpu).is_err());
    }

    #[test]
    fn test_tensor_images_roundtrip() -> Result<()> {
        let batch = batch(2);
        let (lr, _) = batch_tensors(&batch, 0..2, &Device::Cpu)?;
        let images = tensor_images(&lr)?;
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].as_slice(), batch.sample_lr(1));
        Ok(())
    }
}
