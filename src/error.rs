// THEORY:
// This module defines the single error taxonomy for the whole analysis core.
// The guiding rule (and the reason this is one enum rather than per-module
// error types) is that every failure in the system falls into one of a small
// number of shapes with very different blast radii:
//
// 1.  **Frame-level failures** (`FrameLoad`) poison the whole capture cycle:
//     if the chamber photo cannot be decoded, no snippet downstream of it is
//     valid, so callers abort the cycle.
// 2.  **Snippet-level failures** (`SnippetLoad`, `SnippetNotFound`) are local
//     to one plate. The pipeline reports them, skips that plate, and keeps
//     processing its siblings.
// 3.  **Input-validation failures** (`ConfigParse`, `LengthMismatch`) are
//     bad inputs caught at the boundary, before any file is written or
//     uploaded.
// 4.  **Plumbing failures** (`Io`, `Encode`) wrap the underlying library
//     errors so callers can still see the root cause.
//
// "Nothing to do" conditions (empty contour list, empty time-lapse directory)
// are deliberately NOT errors; they are expressed as zero values or typed
// skip outcomes by the modules that produce them.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the plate analysis core.
#[derive(Debug, Error)]
pub enum VisionError {
    /// The raw chamber frame could not be decoded. Aborts the whole cycle.
    #[error("unable to load chamber frame {path}: {source}")]
    FrameLoad {
        path: PathBuf,
        #[source]
        source: image::error::ImageError,
    },

    /// A plate snippet could not be decoded. Local to one plate.
    #[error("unable to load snippet {path}: {source}")]
    SnippetLoad {
        path: PathBuf,
        #[source]
        source: image::error::ImageError,
    },

    /// A snippet path does not exist on disk.
    #[error("snippet not found: {0}")]
    SnippetNotFound(PathBuf),

    /// A chamber config file did not deserialize.
    #[error("unable to parse chamber config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Parallel per-plate sequences were not aligned. Caught at the
    /// boundary, before any partial output is written.
    #[error("per-plate sequence length mismatch: {what} has {got} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    /// An image could not be encoded or written.
    #[error("unable to encode image {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::error::ImageError,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VisionError>;
