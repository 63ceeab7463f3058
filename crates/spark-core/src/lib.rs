//! Spark Core - Foundational types for the Spark game client
//!
//! This crate provides the types that all other Spark crates depend on:
//! - `ImageHandle` - Shared slot for an image that may still be loading
//! - Error types and Result alias

mod error;
mod image;

pub use error::{Result, SparkError};
pub use image::ImageHandle;
