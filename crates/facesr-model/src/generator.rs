//! SRGAN generator and the generator abstraction shared with EDSR.

use candle_core::{bail, Module, ModuleT, Result, Tensor};
use candle_nn::{BatchNorm, Conv2d, PReLU, VarBuilder};

use facesr_core::NetworkKind;

use crate::blocks::{
    channel_prelu, keras_batch_norm, same_conv, ResidualBlock, UpsamplingBlock,
};
use crate::edsr::{EdsrConfig, EdsrGenerator};

/// A network mapping LR images `[batch, 3, h, w]` to SR images
/// `[batch, 3, h * scale, w * scale]` in `[-1, 1]`
pub trait SuperResolver {
    /// Forward pass; `train` selects batch statistics vs running statistics
    fn forward_t(&self, lr: &Tensor, train: bool) -> Result<Tensor>;

    /// Upscaling factor
    fn scale(&self) -> usize;

    /// Architecture of this generator
    fn kind(&self) -> NetworkKind;
}

/// SRGAN generator configuration
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Number of residual blocks
    pub residual_blocks: usize,
    /// Feature channels in the residual trunk
    pub filters: usize,
    /// Channels of the upsampling convolutions
    pub upsample_filters: usize,
    /// Number of x2 upsampling blocks
    pub upsample_blocks: usize,
    /// Output channels (RGB)
    pub out_channels: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            residual_blocks: 16,
            filters: 64,
            upsample_filters: 256,
            upsample_blocks: 2,
            out_channels: 3,
        }
    }
}

impl GeneratorConfig {
    /// Configuration for a power-of-two scale factor
    pub fn for_scale(scale: usize, filters: usize, residual_blocks: usize) -> Result<Self> {
        if scale < 2 || !scale.is_power_of_two() {
            bail!("SRGAN generator needs a power-of-two scale, got {}", scale);
        }
        Ok(Self {
            residual_blocks,
            filters,
            upsample_blocks: scale.trailing_zeros() as usize,
            ..Default::default()
        })
    }
}

/// SRGAN generator
#[derive(Debug, Clone)]
pub struct SrganGenerator {
    stem_conv: Conv2d,
    stem_prelu: PReLU,
    residual_blocks: Vec<ResidualBlock>,
    trunk_conv: Conv2d,
    trunk_bn: BatchNorm,
    upsampling: Vec<UpsamplingBlock>,
    output_conv: Conv2d,
    config: GeneratorConfig,
}

impl SrganGenerator {
    pub fn new(config: GeneratorConfig, vb: VarBuilder) -> Result<Self> {
        let f = config.filters;

        // 9x9 stem
        let stem_conv = same_conv(3, f, 9, 1, vb.pp("stem_conv"))?;
        let stem_prelu = channel_prelu(f, vb.pp("stem_prelu"))?;

        let residual_blocks = (0..config.residual_blocks)
            .map(|i| ResidualBlock::new(f, vb.pp(format!("res_{}", i))))
            .collect::<Result<Vec<_>>>()?;

        let trunk_conv = same_conv(f, f, 3, 1, vb.pp("trunk_conv"))?;
        let trunk_bn = keras_batch_norm(f, 0.8, vb.pp("trunk_bn"))?;

        let mut upsampling = Vec::with_capacity(config.upsample_blocks);
        let mut channels = f;
        for i in 0..config.upsample_blocks {
            upsampling.push(UpsamplingBlock::new(
                channels,
                config.upsample_filters,
                vb.pp(format!("upsample_{}", i)),
            )?);
            channels = config.upsample_filters;
        }

        let output_conv = same_conv(channels, config.out_channels, 9, 1, vb.pp("output_conv"))?;

        Ok(Self {
            stem_conv,
            stem_prelu,
            residual_blocks,
            trunk_conv,
            trunk_bn,
            upsampling,
            output_conv,
            config,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl SuperResolver for SrganGenerator {
    fn forward_t(&self, lr: &Tensor, train: bool) -> Result<Tensor> {
        let stem = self.stem_conv.forward(lr)?;
        let stem = self.stem_prelu.forward(&stem)?;

        let mut x = stem.clone();
        for block in &self.residual_blocks {
            x = block.forward_t(&x, train)?;
        }

        let x = self.trunk_conv.forward(&x)?;
        let x = self.trunk_bn.forward_t(&x, train)?;
        let mut x = (x + &stem)?;

        for block in &self.upsampling {
            x = block.forward(&x)?;
        }

        self.output_conv.forward(&x)?.tanh()
    }

    fn scale(&self) -> usize {
        1 << self.config.upsample_blocks
    }

    fn kind(&self) -> NetworkKind {
        NetworkKind::Srgan
    }
}

/// Build the generator selected by `kind`.
///
/// `filters` and `residual_blocks` size the residual trunk of either
/// architecture.
pub fn build_generator(
    kind: NetworkKind,
    scale: usize,
    filters: usize,
    residual_blocks: usize,
    vb: VarBuilder,
) -> Result<Box<dyn SuperResolver>> {
    let generator: Box<dyn SuperResolver> = match kind {
        NetworkKind::Srgan => {
            let config = GeneratorConfig::for_scale(scale, filters, residual_blocks)?;
            Box::new(SrganGenerator::new(config, vb)?)
        }
        NetworkKind::Edsr => {
            let config = EdsrConfig {
                filters,
                res_blocks: residual_blocks,
                scale,
                ..Default::default()
            };
            Box::new(EdsrGenerator::new(config, vb)?)
        }
    };

    tracing::info!(
        network = %kind,
        scale,
        filters,
        residual_blocks,
        "Built generator"
    );

    Ok(generator)
}
