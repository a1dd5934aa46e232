//! EDSR generator (Enhanced Deep Super-Resolution).
//!
//! Differs from the SRGAN generator in three ways: no batch normalization,
//! scaled residual branches, and sub-pixel convolution (pixel shuffle) for
//! upsampling.

use candle_core::{bail, Module, Result, Tensor};
use candle_nn::{Conv2d, VarBuilder};

use facesr_core::NetworkKind;

use crate::blocks::{same_conv, EdsrResBlock};
use crate::generator::SuperResolver;

/// EDSR configuration
#[derive(Debug, Clone)]
pub struct EdsrConfig {
    /// Feature channels
    pub filters: usize,
    /// Number of residual blocks
    pub res_blocks: usize,
    /// Upscaling factor (2, 3, 4 or 8)
    pub scale: usize,
    /// Multiplier applied to each residual branch
    pub res_scale: f64,
}

impl Default for EdsrConfig {
    fn default() -> Self {
        Self {
            filters: 64,
            res_blocks: 16,
            scale: 4,
            res_scale: 0.1,
        }
    }
}

/// One conv + pixel shuffle stage
#[derive(Debug, Clone)]
struct SubpixelStage {
    conv: Conv2d,
    factor: usize,
}

impl Module for SubpixelStage {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let out = self.conv.forward(xs)?;
        candle_nn::ops::pixel_shuffle(&out, self.factor)
    }
}

/// Shuffle factors composing a scale
fn subpixel_factors(scale: usize) -> Result<Vec<usize>> {
    match scale {
        2 | 4 | 8 => Ok(vec![2; scale.trailing_zeros() as usize]),
        3 => Ok(vec![3]),
        other => bail!("EDSR supports scales 2, 3, 4 and 8, got {}", other),
    }
}

/// EDSR generator
#[derive(Debug, Clone)]
pub struct EdsrGenerator {
    head: Conv2d,
    body: Vec<EdsrResBlock>,
    body_conv: Conv2d,
    upsample: Vec<SubpixelStage>,
    tail: Conv2d,
    config: EdsrConfig,
}

impl EdsrGenerator {
    pub fn new(config: EdsrConfig, vb: VarBuilder) -> Result<Self> {
        let f = config.filters;
        let factors = subpixel_factors(config.scale)?;

        let head = same_conv(3, f, 3, 1, vb.pp("head"))?;

        let body = (0..config.res_blocks)
            .map(|i| EdsrResBlock::new(f, config.res_scale, vb.pp(format!("body_{}", i))))
            .collect::<Result<Vec<_>>>()?;
        let body_conv = same_conv(f, f, 3, 1, vb.pp("body_conv"))?;

        let upsample = factors
            .iter()
            .enumerate()
            .map(|(i, &factor)| -> Result<SubpixelStage> {
                let out_channels = f * factor * factor;
                let conv = same_conv(f, out_channels, 3, 1, vb.pp(format!("upsample_{}", i)))?;
                Ok(SubpixelStage { conv, factor })
            })
            .collect::<Result<Vec<_>>>()?;

        let tail = same_conv(f, 3, 3, 1, vb.pp("tail"))?;

        Ok(Self {
            head,
            body,
            body_conv,
            upsample,
            tail,
            config,
        })
    }

    pub fn config(&self) -> &EdsrConfig {
        &self.config
    }
}

impl SuperResolver for EdsrGenerator {
    fn forward_t(&self, lr: &Tensor, _train: bool) -> Result<Tensor> {
        let head = self.head.forward(lr)?;

        let mut x = head.clone();
        for block in &self.body {
            x = block.forward(&x)?;
        }
        let x = self.body_conv.forward(&x)?;
        let mut x = (x + &head)?;

        for stage in &self.upsample {
            x = stage.forward(&x)?;
        }

        self.tail.forward(&x)?.tanh()
    }

    fn scale(&self) -> usize {
        self.config.scale
    }

    fn kind(&self) -> NetworkKind {
        NetworkKind::Edsr
    }
}
