//! API module: REST surface over the emotion service

pub mod dto;
pub mod error;
pub mod rest;
