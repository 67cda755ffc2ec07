//! # Memora REST
//!
//! Axum glue for services that memoize through Memora: the error handler,
//! CORS from settings, rate limiting, request logging, Prometheus metrics
//! and token-protected cache admin routes.

pub mod controllers;
pub mod cors;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::*;
pub use router::*;
pub use state::*;
