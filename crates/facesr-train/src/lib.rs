//! # facesr-train
//!
//! Adversarial training of the face super-resolution networks.
//!
//! ## Pipeline
//!
//! 1. List, shuffle and split the dataset
//! 2. Build the generator (SRGAN or EDSR) and the discriminator
//! 3. Each epoch: sample a train and a test batch, write a preview, run one
//!    adversarial update per training image and log the four losses
//! 4. Keep the generator with the lowest perceptual loss and write periodic
//!    checkpoints of both networks
//!
//! ## Output layout
//!
//! ```text
//! <output_dir>/
//!   logs/<run>/scalars.jsonl
//!   results/generator_<run>.safetensors
//!   previews/epoch_<n>.png
//!   training_checkpoints/ckpt-<n>/{generator,discriminator}.safetensors, state.json
//! ```

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod preview;
pub mod summary;
pub mod tensors;
pub mod trainer;
pub mod upscale;

pub use checkpoint::*;
pub use config::*;
pub use preview::*;
pub use summary::*;
pub use tensors::*;
pub use trainer::*;
pub use upscale::*;
