//! # facesr-model
//!
//! Super-resolution networks for face upscaling.
//!
//! ## Architecture Overview
//!
//! 1. **SRGAN generator**: 9x9 stem, batch-normalized residual blocks with
//!    PReLU, global skip, nearest-neighbour upsampling blocks, `tanh` output
//! 2. **EDSR generator**: residual blocks without batch norm, residual
//!    scaling and sub-pixel (pixel shuffle) upsampling
//! 3. **Discriminator**: strided conv / BN / LeakyReLU blocks followed by a
//!    dense classifier producing one real-vs-fake logit
//! 4. **VGG features**: frozen VGG19 trunk for perceptual content loss
//!
//! ## Training Objective
//!
//! L_G = L_content + 0.001 * L_adv
//! L_D = BCE(D(hr), 1) + BCE(D(sr), 0)

pub mod blocks;
pub mod discriminator;
pub mod edsr;
pub mod generator;
pub mod loss;
pub mod vgg;

pub use blocks::*;
pub use discriminator::*;
pub use edsr::*;
pub use generator::*;
pub use loss::*;
pub use vgg::*;
