//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`ForgeError`] covers all failure modes including:
//! - Unrecognized model idents and versions
//! - Reads past the end of a binary section
//! - File system lookups and image decoding
//! - Resources whose loader failed
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, ForgeError>`.
//!
//! ```rust,ignore
//! use forge::errors::{ForgeError, Result};
//!
//! fn load_model() -> Result<()> {
//!     Err(ForgeError::Format("Unknown MD2 model ident: 42".to_string()))
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for model decoding and resource processing.
///
/// Parsers never return a partially decoded model: any of these variants
/// means the whole load was rejected.
#[derive(Error, Debug)]
pub enum ForgeError {
    // ========================================================================
    // Format & Parsing Errors
    // ========================================================================
    /// Unrecognized ident, version or structurally invalid binary data.
    #[error("{0}")]
    Format(String),

    /// Syntax error in a text based model format.
    #[error("At line {line}, column {column}: {message}")]
    Parse {
        /// 1-based line of the offending token
        line: usize,
        /// 1-based column of the offending token
        column: usize,
        /// What went wrong
        message: String,
    },

    /// No parser accepted the file.
    #[error("Unknown model format: {0}")]
    UnknownFormat(PathBuf),

    // ========================================================================
    // Binary Reader Errors
    // ========================================================================
    /// A read or seek left the bounds of the reader.
    #[error("Cannot access {len} bytes at offset {offset}, reader size is {size}")]
    Reader {
        /// Position of the access relative to the reader's start
        offset: usize,
        /// Number of bytes requested
        len: usize,
        /// Size of the reader
        size: usize,
    },

    // ========================================================================
    // File System & I/O Errors
    // ========================================================================
    /// The requested path does not exist in the file system.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Image & Palette Errors
    // ========================================================================
    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// Palette data could not be loaded.
    #[error("Palette error: {0}")]
    Palette(String),

    // ========================================================================
    // Bridged Formats
    // ========================================================================
    /// glTF parsing or loading error.
    #[error("glTF error: {0}")]
    Gltf(String),

    /// Wavefront OBJ loading error.
    #[error("OBJ error: {0}")]
    Obj(String),

    /// Settings could not be deserialized.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A resource loader reported a failure.
    #[error("Resource failed: {0}")]
    ResourceFailed(String),

    /// The worker executing a task went away before producing a result.
    #[error("Task was cancelled before it completed")]
    TaskCancelled,
}

impl ForgeError {
    /// Creates a [`ForgeError::Format`] from anything printable.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for ForgeError {
    fn from(err: image::ImageError) -> Self {
        ForgeError::ImageDecode(err.to_string())
    }
}

impl From<gltf::Error> for ForgeError {
    fn from(err: gltf::Error) -> Self {
        ForgeError::Gltf(err.to_string())
    }
}

impl From<tobj::LoadError> for ForgeError {
    fn from(err: tobj::LoadError) -> Self {
        ForgeError::Obj(err.to_string())
    }
}

impl From<base64::DecodeError> for ForgeError {
    fn from(err: base64::DecodeError) -> Self {
        ForgeError::Gltf(format!("Invalid data URI: {err}"))
    }
}

/// Alias for `Result<T, ForgeError>`.
pub type Result<T> = std::result::Result<T, ForgeError>;
