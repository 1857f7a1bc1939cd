//! Service layer module

pub mod assembler;
pub mod decoder;
pub mod emotion_service;
pub mod types;

pub use emotion_service::EmotionService;
pub use types::*;
