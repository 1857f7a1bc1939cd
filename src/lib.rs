//! MoodMirror emotion detection service library

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod service;

pub use config::Config;
pub use error::{PredictError, PredictResult};
