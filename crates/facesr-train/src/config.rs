//! Training configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use candle_core::Device;
use serde::{Deserialize, Serialize};

use facesr_core::{Error, ImageShape, NetworkKind, Result};

/// Complete training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Dataset roots, walked recursively
    pub dataset_dirs: Vec<PathBuf>,

    /// Root of logs, results, previews and checkpoints
    pub output_dir: PathBuf,

    /// Generator architecture
    pub network: NetworkKind,

    /// Subtract the dataset RGB mean from training samples
    pub use_rgb_mean: bool,

    /// Upscaling factor
    pub scale: usize,

    /// High resolution height
    pub hr_height: usize,

    /// High resolution width
    pub hr_width: usize,

    /// Images sampled per epoch
    pub batch_size: usize,

    /// Fraction of the listing used for training
    pub split_ratio: f64,

    /// Number of images held out for validation
    pub validation_size: usize,

    /// Residual blocks in the generator
    pub res_blocks: usize,

    /// Feature channels in the generator
    pub filters: usize,

    /// Number of epochs
    pub epochs: usize,

    /// Adam learning rate (both networks)
    pub learning_rate: f64,

    /// Adam first moment decay
    pub beta1: f64,

    /// Weight of the adversarial term in the perceptual loss
    pub adversarial_weight: f64,

    /// Epochs between checkpoints
    pub checkpoint_every: usize,

    /// Epochs between preview images (0 disables previews)
    pub preview_every: usize,

    /// RNG seed for shuffling and sampling
    pub seed: Option<u64>,

    /// VGG19 safetensors for perceptual content loss
    pub vgg_weights: Option<PathBuf>,

    /// Compute device
    pub device: DeviceType,

    /// Resume from the latest checkpoint
    pub resume: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataset_dirs: Vec::new(),
            output_dir: PathBuf::from("metrics"),
            network: NetworkKind::Edsr,
            use_rgb_mean: false,
            scale: 4,
            hr_height: 256,
            hr_width: 256,
            batch_size: 16,
            split_ratio: 0.9,
            validation_size: 100,
            res_blocks: 16,
            filters: 64,
            epochs: 300_000,
            learning_rate: 2e-4,
            beta1: 0.5,
            adversarial_weight: 1e-3,
            checkpoint_every: 10_000,
            preview_every: 1,
            seed: None,
            vgg_weights: None,
            device: DeviceType::Cpu,
            resume: false,
        }
    }
}

impl TrainConfig {
    /// Load configuration from a file, with `FACESR_*` environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("FACESR")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("dataset_dirs"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FACESR")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("dataset_dirs"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// High resolution image shape
    pub fn hr_shape(&self) -> ImageShape {
        ImageShape::rgb(self.hr_height, self.hr_width)
    }

    /// Low resolution image shape
    pub fn lr_shape(&self) -> Result<ImageShape> {
        self.hr_shape().downsample(self.scale)
    }

    /// Check the configuration for values training cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".into()));
        }
        if self.epochs == 0 {
            return Err(Error::Config("epochs must be positive".into()));
        }
        if self.checkpoint_every == 0 {
            return Err(Error::Config("checkpoint_every must be positive".into()));
        }
        if !(self.split_ratio > 0.0 && self.split_ratio <= 1.0) {
            return Err(Error::Config(format!(
                "split_ratio must be in (0, 1], got {}",
                self.split_ratio
            )));
        }
        if self.filters == 0 {
            return Err(Error::Config("filters must be positive".into()));
        }
        self.lr_shape()
            .map_err(|e| Error::Config(format!("invalid HR shape for scale: {}", e)))?;

        let scale_ok = match self.network {
            NetworkKind::Srgan => self.scale >= 2 && self.scale.is_power_of_two(),
            NetworkKind::Edsr => matches!(self.scale, 2 | 3 | 4 | 8),
        };
        if !scale_ok {
            return Err(Error::Config(format!(
                "{} does not support scale {}",
                self.network, self.scale
            )));
        }

        Ok(())
    }
}

/// Device to train or run inference on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceType {
    Cpu,
    Cuda(usize),
    Metal,
}

impl DeviceType {
    pub fn device(&self) -> Result<Device> {
        let device = match self {
            DeviceType::Cpu => Device::Cpu,
            DeviceType::Cuda(ordinal) => Device::new_cuda(*ordinal)?,
            DeviceType::Metal => Device::new_metal(0)?,
        };
        Ok(device)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => f.write_str("cpu"),
            DeviceType::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            DeviceType::Metal => f.write_str("metal"),
        }
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(DeviceType::Cpu),
            "metal" => Ok(DeviceType::Metal),
            "cuda" => Ok(DeviceType::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|n| n.parse().ok())
                .map(DeviceType::Cuda)
                .ok_or_else(|| Error::Config(format!("unknown device: {}", other))),
        }
    }
}

impl TryFrom<String> for DeviceType {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<DeviceType> for String {
    fn from(d: DeviceType) -> Self {
        d.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrainConfig::default();
        assert_eq!(config.network, NetworkKind::Edsr);
        assert_eq!(config.hr_shape(), ImageShape::rgb(256, 256));
        assert_eq!(config.lr_shape().unwrap(), ImageShape::rgb(64, 64));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_scale = TrainConfig {
            hr_height: 250,
            ..Default::default()
        };
        assert!(bad_scale.validate().is_err());

        let srgan_x3 = TrainConfig {
            network: NetworkKind::Srgan,
            scale: 3,
            hr_height: 96,
            hr_width: 96,
            ..Default::default()
        };
        assert!(srgan_x3.validate().is_err());

        let edsr_x3 = TrainConfig {
            scale: 3,
            hr_height: 96,
            hr_width: 96,
            ..Default::default()
        };
        assert!(edsr_x3.validate().is_ok());

        let no_batch = TrainConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(no_batch.validate().is_err());
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("train.toml");
        std::fs::write(
            &path,
            r#"
dataset_dirs = ["/data/ffhq-512", "/data/celeba_hq"]
network = "SRGAN"
batch_size = 4
device = "cuda:1"
seed = 42
"#,
        )?;

        let config = TrainConfig::from_file(&path)?;
        assert_eq!(config.dataset_dirs.len(), 2);
        assert_eq!(config.network, NetworkKind::Srgan);
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.device, DeviceType::Cuda(1));
        assert_eq!(config.seed, Some(42));
        // Untouched keys keep their defaults
        assert_eq!(config.epochs, 300_000);
        Ok(())
    }

    #[test]
    fn test_device_parse() {
        assert_eq!("CPU".parse::<DeviceType>().unwrap(), DeviceType::Cpu);
        assert_eq!("cuda".parse::<DeviceType>().unwrap(), DeviceType::Cuda(0));
        assert_eq!("cuda:2".parse::<DeviceType>().unwrap(), DeviceType::Cuda(2));
        assert!("tpu".parse::<DeviceType>().is_err());
        assert_eq!(DeviceType::Cuda(3).to_string(), "cuda:3");
    }
}
