//! Unified error types for xcf_engine

use thiserror::Error;

use crate::Compression;

/// Main error type for XCF save operations
#[derive(Debug, Error)]
pub enum XcfError {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Saving Errors ===
    #[error("{compression:?} compression is not implemented, use None or Rle")]
    UnsupportedCompression { compression: Compression },

    #[error("Pixel data size mismatch: expected {expected} bytes, got {actual}")]
    PixelDataLengthMismatch { expected: usize, actual: usize },
}

/// Result type alias for xcf_engine operations
pub type Result<T> = std::result::Result<T, XcfError>;
