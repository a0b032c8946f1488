//! Core business logic for the resource guardian.

pub mod config;
pub mod engine;
pub mod sampler;
