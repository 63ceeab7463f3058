//! Spark Asset - Resource loading pipeline
//!
//! This crate fetches everything the engine is constructed from:
//! the texture list and the map (strictly in that order) plus the tile and
//! effect images (all at once, fire-and-forget).

mod file;
mod http;
mod pipeline;
mod table;
mod transport;

pub use file::FileTransport;
pub use http::HttpTransport;
pub use pipeline::{LoadPlan, PipelineStatus, ResourcePipeline, Stage};
pub use table::{AssetTable, EffectPaths, ImageSet};
pub use transport::{TextCallback, Transport};
