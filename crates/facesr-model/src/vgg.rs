//! Frozen VGG19 feature extractor for perceptual content loss.
//!
//! Weights are read from a safetensors file using torchvision naming
//! (`features.{index}.weight` / `features.{index}.bias`). Features are taken
//! after `relu5_4`, the layer used by the SRGAN paper's VGG54 loss.

use std::path::Path;

use candle_core::{DType, Device, Module, Result, Tensor};
use candle_nn::{Conv2d, VarBuilder};

use crate::blocks::same_conv;

/// Channels and conv count of each VGG19 stage
const VGG19_STAGES: [(usize, usize); 5] = [(64, 2), (128, 2), (256, 4), (512, 4), (512, 4)];

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// VGG19 convolutional trunk up to `relu5_4`
#[derive(Debug, Clone)]
pub struct VggFeatures {
    /// Convs per stage; stages are separated by 2x2 max pooling
    stages: Vec<Vec<Conv2d>>,
    mean: Tensor,
    std: Tensor,
}

impl VggFeatures {
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let vb = vb.pp("features");
        let mut stages = Vec::with_capacity(VGG19_STAGES.len());

        // torchvision index: conv, relu, conv, relu, ..., maxpool
        let mut index = 0;
        let mut in_channels = 3;
        for (channels, n_convs) in VGG19_STAGES {
            let mut convs = Vec::with_capacity(n_convs);
            for _ in 0..n_convs {
                convs.push(same_conv(in_channels, channels, 3, 1, vb.pp(index.to_string()))?);
                in_channels = channels;
                index += 2;
            }
            index += 1;
            stages.push(convs);
        }

        let device = vb.device();
        let mean = Tensor::new(&IMAGENET_MEAN, device)?.reshape((1, 3, 1, 1))?;
        let std = Tensor::new(&IMAGENET_STD, device)?.reshape((1, 3, 1, 1))?;

        Ok(Self { stages, mean, std })
    }

    /// Load pretrained weights from a safetensors file
    pub fn load<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self> {
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path.as_ref()], DType::F32, device)? };
        let vgg = Self::new(vb)?;
        tracing::info!(path = %path.as_ref().display(), "Loaded VGG19 feature extractor");
        Ok(vgg)
    }

    /// Features of images in `[-1, 1]`, shape `[batch, 512, h/16, w/16]`
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // [-1, 1] -> [0, 1] -> ImageNet normalization
        let x = ((xs + 1.0)? * 0.5)?;
        let mut x = x.broadcast_sub(&self.mean)?.broadcast_div(&self.std)?;

        let last = self.stages.len() - 1;
        for (i, stage) in self.stages.iter().enumerate() {
            for conv in stage {
                x = conv.forward(&x)?.relu()?;
            }
            if i < last {
                x = x.max_pool2d(2)?;
            }
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    #[test]
    fn test_vgg_feature_shape() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let vgg = VggFeatures::new(vb)?;
        let x = Tensor::zeros((1, 3, 32, 32), DType::F32, &device)?;
        assert_eq!(vgg.forward(&x)?.dims(), &[1, 512, 2, 2]);
        Ok(())
    }

    #[test]
    fn test_vgg_torchvision_names() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let _vgg = VggFeatures::new(vb)?;

        let data = varmap.data().lock().unwrap();
        assert!(data.contains_key("features.0.weight"));
        assert!(data.contains_key("features.5.weight"));
        assert!(data.contains_key("features.34.weight"));
        assert!(!data.contains_key("features.36.weight"));
        Ok(())
    }
}
