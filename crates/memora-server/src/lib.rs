//! # Memora Server Library
//!
//! Application wiring for the Memora example server: configuration,
//! cache lifecycle, routing and a memoized demo endpoint.

pub mod app;
pub mod demo;
pub mod startup;
