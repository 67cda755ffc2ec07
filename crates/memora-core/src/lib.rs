//! # Memora Core
//!
//! Error definitions, result aliases and tracing setup shared by every
//! Memora crate.

pub mod error;
pub mod result;
pub mod telemetry;

pub use error::*;
pub use result::*;
