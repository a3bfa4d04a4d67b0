//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`RigError`] covers all failure modes including:
//! - Asset loading and import errors
//! - Resource pool and cache errors
//! - Native file format errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, RigError>`.
//!
//! Import and IO failures never escape the resource manager boundary: a
//! failed background load marks the target resource `Invalid` and notifies
//! waiting instances, so callers only meet [`RigError`] on the synchronous
//! paths (file save/load, motion allocation).

use thiserror::Error;

/// The main error type for the Rig engine.
#[derive(Error, Debug)]
pub enum RigError {
    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The requested asset was not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// No importer is registered for the requested source format.
    #[error("No importer registered for: {0}")]
    ImporterMissing(String),

    /// An importer reported a failure.
    #[error("Import failed for {path}: {reason}")]
    ImportFailed {
        /// Source path handed to the importer
        path: String,
        /// Importer-reported reason
        reason: String,
    },

    // ========================================================================
    // Resource Pool Errors
    // ========================================================================
    /// A fixed-capacity pool has no free slots left.
    #[error("Resource pool exhausted: {0}")]
    PoolExhausted(&'static str),

    // ========================================================================
    // Native Format Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A native binary file does not match the expected layout.
    #[error("Malformed asset: {0}")]
    MalformedAsset(String),

    /// A string field in a native binary file is not valid UTF-8.
    #[error("Invalid UTF-8 in asset string: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),
}

/// Alias for `Result<T, RigError>`.
pub type Result<T> = std::result::Result<T, RigError>;
