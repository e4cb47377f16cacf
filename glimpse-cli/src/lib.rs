//! # glimpse: image and video-frame analysis
//!
//! Drives [`glimpse_client::VisionClient`] over a stream of stills:
//!
//! - `settings`: settings file (`glimpse.toml` or a legacy `config.json`)
//! - `prompt`: the built-in analysis prompts
//! - `frames`: uniform frame sampling from video (FFmpeg, `video` feature)
//! - `analyze`: one request per image/frame, strictly sequential
//! - `report`: JSON records written after a run
//! - `cli`: the `glimpse` command line

pub mod analyze;
pub mod cli;
pub mod frames;
pub mod prompt;
pub mod report;
pub mod settings;

pub use cli::{Cli, Commands, execute};
pub use settings::Settings;
