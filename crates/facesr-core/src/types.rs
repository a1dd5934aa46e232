//! Fundamental types for the facesr training system.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Wall-clock time in nanoseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_nanos_opt().unwrap_or(0))
    }

    /// Seconds since the Unix epoch, as logged in summaries
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }
}

/// Identifier of one training run, formatted `YYYYmmdd-HHMMSS`.
///
/// Used to name the summary log directory and the best-generator file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn now() -> Self {
        Self(Local::now().format("%Y%m%d-%H%M%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Height x width x channels shape of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageShape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// RGB shape with the given spatial size
    pub const fn rgb(height: usize, width: usize) -> Self {
        Self::new(height, width, 3)
    }

    /// Number of scalar values in one image
    pub fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Low resolution shape for a scale factor.
    ///
    /// The scale must divide both spatial dimensions exactly.
    pub fn downsample(&self, scale: usize) -> Result<Self> {
        if scale == 0 {
            return Err(Error::InvalidInput("scale factor must be positive".into()));
        }
        if self.height % scale != 0 || self.width % scale != 0 {
            return Err(Error::InvalidInput(format!(
                "scale {} does not divide {}x{}",
                scale, self.height, self.width
            )));
        }
        Ok(Self::new(self.height / scale, self.width / scale, self.channels))
    }

    /// High resolution shape for a scale factor
    pub fn upsample(&self, scale: usize) -> Self {
        Self::new(self.height * scale, self.width * scale, self.channels)
    }

    /// Dimensions in NCHW order for a batch
    pub fn nchw(&self, batch: usize) -> (usize, usize, usize, usize) {
        (batch, self.channels, self.height, self.width)
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.height, self.width, self.channels)
    }
}

/// Generator architecture selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkKind {
    /// SRGAN generator: batch-normalized residual blocks, nearest upsampling
    #[serde(rename = "SRGAN", alias = "srgan")]
    Srgan,
    /// EDSR generator: scaled residual blocks without batch norm, sub-pixel upsampling
    #[serde(rename = "EDSR", alias = "edsr")]
    Edsr,
}

impl NetworkKind {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkKind::Srgan => "SRGAN",
            NetworkKind::Edsr => "EDSR",
        }
    }
}

impl Default for NetworkKind {
    fn default() -> Self {
        NetworkKind::Edsr
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SRGAN" => Ok(NetworkKind::Srgan),
            "EDSR" => Ok(NetworkKind::Edsr),
            other => Err(Error::InvalidInput(format!("unknown network: {}", other))),
        }
    }
}
