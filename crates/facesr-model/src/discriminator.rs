//! SRGAN discriminator.
//!
//! Classifies HR-sized images as real (dataset) or fake (generator output).

use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{linear, Conv2d, Linear, VarBuilder};

use facesr_core::ImageShape;

use crate::blocks::{same_conv, DiscriminatorBlock, LEAKY_SLOPE};

/// Discriminator configuration
#[derive(Debug, Clone)]
pub struct DiscriminatorConfig {
    /// Input image shape
    pub input_shape: ImageShape,
    /// Channels of the first convolution
    pub base_filters: usize,
    /// Width of the hidden dense layer
    pub dense_units: usize,
}

impl Default for DiscriminatorConfig {
    fn default() -> Self {
        Self {
            input_shape: ImageShape::rgb(256, 256),
            base_filters: 64,
            dense_units: 1024,
        }
    }
}

impl DiscriminatorConfig {
    pub fn new(input_shape: ImageShape) -> Self {
        Self {
            input_shape,
            ..Default::default()
        }
    }

    /// (filter multiplier, stride) of each discriminator block
    pub const BLOCKS: [(usize, usize); 7] =
        [(1, 2), (2, 1), (2, 2), (4, 1), (4, 2), (8, 1), (8, 2)];

    /// Flattened feature size after the convolutional trunk
    pub fn flat_features(&self) -> usize {
        let (mut h, mut w) = (self.input_shape.height, self.input_shape.width);
        for (_, stride) in Self::BLOCKS {
            h = h.div_ceil(stride);
            w = w.div_ceil(stride);
        }
        let (last_mult, _) = Self::BLOCKS[Self::BLOCKS.len() - 1];
        h * w * self.base_filters * last_mult
    }
}

/// Real-vs-fake image classifier
#[derive(Debug, Clone)]
pub struct Discriminator {
    stem: Conv2d,
    blocks: Vec<DiscriminatorBlock>,
    dense: Linear,
    output: Linear,
    config: DiscriminatorConfig,
}

impl Discriminator {
    pub fn new(config: DiscriminatorConfig, vb: VarBuilder) -> Result<Self> {
        let f = config.base_filters;

        let stem = same_conv(config.input_shape.channels, f, 3, 1, vb.pp("stem"))?;

        let mut blocks = Vec::with_capacity(DiscriminatorConfig::BLOCKS.len());
        let mut channels = f;
        for (i, (mult, stride)) in DiscriminatorConfig::BLOCKS.into_iter().enumerate() {
            blocks.push(DiscriminatorBlock::new(
                channels,
                f * mult,
                stride,
                vb.pp(format!("block_{}", i)),
            )?);
            channels = f * mult;
        }

        let dense = linear(config.flat_features(), config.dense_units, vb.pp("dense"))?;
        let output = linear(config.dense_units, 1, vb.pp("output"))?;

        Ok(Self {
            stem,
            blocks,
            dense,
            output,
            config,
        })
    }

    /// Real-vs-fake logits `[batch, 1]`
    pub fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let x = self.stem.forward(xs)?;
        let mut x = candle_nn::ops::leaky_relu(&x, LEAKY_SLOPE)?;

        for block in &self.blocks {
            x = block.forward_t(&x, train)?;
        }

        let x = x.flatten_from(1)?;
        let x = self.dense.forward(&x)?;
        let x = candle_nn::ops::leaky_relu(&x, LEAKY_SLOPE)?;
        self.output.forward(&x)
    }

    /// Probability that each image is real
    pub fn probability(&self, xs: &Tensor) -> Result<Tensor> {
        let logits = self.forward_t(xs, false)?;
        candle_nn::ops::sigmoid(&logits)
    }

    pub fn config(&self) -> &DiscriminatorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_flat_features() {
        let config = DiscriminatorConfig::default();
        assert_eq!(config.flat_features(), 16 * 16 * 512);

        let odd = DiscriminatorConfig::new(ImageShape::rgb(20, 36));
        // 20 -> 10 -> 5 -> 3 -> 2, 36 -> 18 -> 9 -> 5 -> 3
        assert_eq!(odd.flat_features(), 2 * 3 * 512);
    }

    #[test]
    fn test_discriminator_outputs() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let config = DiscriminatorConfig {
            input_shape: ImageShape::rgb(32, 32),
            base_filters: 4,
            dense_units: 16,
        };
        let disc = Discriminator::new(config, vb)?;

        let x = Tensor::randn(0f32, 1.0, (3, 3, 32, 32), &device)?;
        let logits = disc.forward_t(&x, true)?;
        assert_eq!(logits.dims(), &[3, 1]);

        let probs: Vec<f32> = disc.probability(&x)?.flatten_all()?.to_vec1()?;
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        Ok(())
    }
}
