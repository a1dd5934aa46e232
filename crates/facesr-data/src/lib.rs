//! # facesr-data
//!
//! Dataset plumbing for super-resolution training.
//!
//! ## Pipeline Stages
//!
//! 1. **Listing**: Walk dataset roots and collect image files in sorted order
//! 2. **Split**: Shuffle once, then slice into train / test / validation sets
//! 3. **Sampling**: Draw random batches, crop or resize to the HR shape and
//!    downsample to the LR shape
//! 4. **RGB mean**: Optional per-channel dataset mean for input centering

pub mod listing;
pub mod rgb_mean;
pub mod sampler;
pub mod split;

pub use listing::*;
pub use rgb_mean::*;
pub use sampler::*;
pub use split::*;
