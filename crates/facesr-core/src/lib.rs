//! # facesr-core
//!
//! Core types and utilities shared by the facesr super-resolution
//! training crates.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
