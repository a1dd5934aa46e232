//! Command-line interface.
//!
//! ```bash
//! facesr train --config train.toml
//! facesr train --config train.toml --resume
//! facesr upscale --weights metrics/results/generator_<run>.safetensors \
//!     --input face.png --output face_x4.png
//! facesr rgb-mean --config train.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use facesr_core::NetworkKind;

use crate::config::DeviceType;

/// Face super-resolution training and inference
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "facesr")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train a generator and discriminator
    Train(TrainArgs),

    /// Super-resolve an image with trained generator weights
    Upscale(UpscaleArgs),

    /// Compute the dataset RGB mean of the training split
    RgbMean(RgbMeanArgs),
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Resume from the latest checkpoint
    #[arg(long)]
    pub resume: bool,

    /// Evaluate the final generator on the validation split
    #[arg(long)]
    pub evaluate: bool,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct UpscaleArgs {
    /// Generator weights (safetensors)
    #[arg(short, long)]
    pub weights: PathBuf,

    /// Low resolution input image
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to write the upscaled image
    #[arg(short, long)]
    pub output: PathBuf,

    /// Generator architecture the weights belong to
    #[arg(long, default_value = "EDSR")]
    pub network: NetworkKind,

    #[arg(long, default_value_t = 4)]
    pub scale: usize,

    #[arg(long, default_value_t = 64)]
    pub filters: usize,

    #[arg(long, default_value_t = 16)]
    pub res_blocks: usize,

    #[arg(long, default_value = "cpu")]
    pub device: DeviceType,
}

#[derive(Parser, Debug, Clone, PartialEq)]
pub struct RgbMeanArgs {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,
}
