//! Result type aliases for Memora.

use crate::MemoraError;

/// A specialized `Result` type for Memora operations.
pub type MemoraResult<T> = Result<T, MemoraError>;
