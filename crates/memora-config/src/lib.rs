//! # Memora Config
//!
//! Configuration management for Memora.
//! Supports layered configuration from TOML files and environment
//! variables, validation, and runtime reload.

mod app_config;
mod loader;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use validation::*;
