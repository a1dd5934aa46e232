//! Building blocks shared by the generators and the discriminator.
//!
//! All convolutions use "same" padding (`kernel / 2`), so stride 1 keeps the
//! spatial size and stride 2 halves it (rounding up).

use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{
    batch_norm, conv2d, BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig, Init, PReLU,
    VarBuilder,
};

/// Negative slope of every LeakyReLU in the discriminator
pub const LEAKY_SLOPE: f64 = 0.2;

/// Conv2d with "same" padding
pub fn same_conv(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    vb: VarBuilder,
) -> Result<Conv2d> {
    let config = Conv2dConfig {
        padding: kernel / 2,
        stride,
        ..Default::default()
    };
    conv2d(in_channels, out_channels, kernel, config, vb)
}

/// Batch norm configured with a Keras-style momentum.
///
/// Keras keeps `momentum` of the running statistic per update, candle keeps
/// `1 - momentum`, hence the conversion.
pub fn keras_batch_norm(channels: usize, keras_momentum: f64, vb: VarBuilder) -> Result<BatchNorm> {
    let config = BatchNormConfig {
        eps: 1e-3,
        momentum: 1.0 - keras_momentum,
        ..Default::default()
    };
    batch_norm(channels, config, vb)
}

/// Per-channel PReLU with slopes initialized to zero
pub fn channel_prelu(channels: usize, vb: VarBuilder) -> Result<PReLU> {
    let weight = vb.get_with_hints(channels, "weight", Init::Const(0.0))?;
    Ok(PReLU::new(weight, false))
}

/// SRGAN residual block: conv-BN-PReLU-conv-BN plus identity
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    conv1: Conv2d,
    bn1: BatchNorm,
    prelu: PReLU,
    conv2: Conv2d,
    bn2: BatchNorm,
}

impl ResidualBlock {
    pub fn new(channels: usize, vb: VarBuilder) -> Result<Self> {
        let momentum = 0.8;

        Ok(Self {
            conv1: same_conv(channels, channels, 3, 1, vb.pp("conv1"))?,
            bn1: keras_batch_norm(channels, momentum, vb.pp("bn1"))?,
            prelu: channel_prelu(channels, vb.pp("prelu"))?,
            conv2: same_conv(channels, channels, 3, 1, vb.pp("conv2"))?,
            bn2: keras_batch_norm(channels, momentum, vb.pp("bn2"))?,
        })
    }
}

impl ModuleT for ResidualBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let out = self.conv1.forward(xs)?;
        let out = self.bn1.forward_t(&out, train)?;
        let out = self.prelu.forward(&out)?;
        let out = self.conv2.forward(&out)?;
        let out = self.bn2.forward_t(&out, train)?;
        out + xs
    }
}

/// SRGAN upsampling block: conv, nearest-neighbour x2, PReLU
#[derive(Debug, Clone)]
pub struct UpsamplingBlock {
    conv: Conv2d,
    prelu: PReLU,
}

impl UpsamplingBlock {
    pub fn new(in_channels: usize, out_channels: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            conv: same_conv(in_channels, out_channels, 3, 1, vb.pp("conv"))?,
            prelu: channel_prelu(out_channels, vb.pp("prelu"))?,
        })
    }
}

impl Module for UpsamplingBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let out = self.conv.forward(xs)?;
        let (_batch, _channels, h, w) = out.dims4()?;
        let out = out.upsample_nearest2d(h * 2, w * 2)?;
        self.prelu.forward(&out)
    }
}

/// Discriminator block: strided conv, BN, LeakyReLU
#[derive(Debug, Clone)]
pub struct DiscriminatorBlock {
    conv: Conv2d,
    bn: BatchNorm,
    stride: usize,
}

impl DiscriminatorBlock {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        Ok(Self {
            conv: same_conv(in_channels, out_channels, 3, stride, vb.pp("conv"))?,
            bn: keras_batch_norm(out_channels, 0.5, vb.pp("bn"))?,
            stride,
        })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl ModuleT for DiscriminatorBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let out = self.conv.forward(xs)?;
        let out = self.bn.forward_t(&out, train)?;
        candle_nn::ops::leaky_relu(&out, LEAKY_SLOPE)
    }
}

/// EDSR residual block: conv-ReLU-conv, scaled, plus identity (no batch norm)
#[derive(Debug, Clone)]
pub struct EdsrResBlock {
    conv1: Conv2d,
    conv2: Conv2d,
    res_scale: f64,
}

impl EdsrResBlock {
    pub fn new(channels: usize, res_scale: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            conv1: same_conv(channels, channels, 3, 1, vb.pp("conv1"))?,
            conv2: same_conv(channels, channels, 3, 1, vb.pp("conv2"))?,
            res_scale,
        })
    }
}

impl Module for EdsrResBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let out = self.conv1.forward(xs)?.relu()?;
        let out = self.conv2.forward(&out)?;
        (out * self.res_scale)? + xs
    }
}
