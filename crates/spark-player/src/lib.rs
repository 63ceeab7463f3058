//! Spark Player - headless game client library
//!
//! Wires the resource pipeline, the input tracker and the frame scheduler
//! together and provides a stand-in engine for running without graphics.

pub mod bootstrap;
pub mod config;
pub mod keyboard;
pub mod logging;
pub mod probe;

pub use bootstrap::{Bootstrap, BootstrapOptions, RunPhase};
pub use config::PlayerConfig;
pub use keyboard::KeyboardSource;
pub use logging::{init_logging, LogOptions};
pub use probe::{ProbeEngine, ProbeFactory};
