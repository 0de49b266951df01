//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`ArborError`] covers all failure modes including:
//! - GPU initialization failures
//! - Shader compilation and linking failures
//! - Resource lookup and decoding errors
//! - Traversal protocol violations detected in debug builds
//!
//! Setup errors are fatal: they abort scene assembly and are reported at the
//! application boundary. A uniform the active shader does not use is never an
//! error, the value is simply skipped.
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, ArborError>`.
//!
//! ```rust,ignore
//! use arbor::errors::{ArborError, Result};
//!
//! fn assemble() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Shader pipeline stage, used for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// The main error type for the Arbor engine.
#[derive(Error, Debug)]
pub enum ArborError {
    // ========================================================================
    // GPU & Windowing Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The presentation surface could not provide a frame.
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Event loop error (winit).
    #[error("Event loop error: {0}")]
    EventLoopError(#[from] winit::error::EventLoopError),

    /// The window could not be created.
    #[error("Failed to create window: {0}")]
    WindowCreateFailed(String),

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// A shader stage failed to compile.
    #[error("Compiler exception ({stage}): {message}")]
    ShaderCompile {
        /// Stage that failed
        stage: ShaderStage,
        /// Diagnostic from the shader compiler
        message: String,
    },

    /// Vertex and fragment stages could not be linked into one program.
    #[error("Linker exception: {0}")]
    ShaderLink(String),

    /// Shader source text was not found in the resource table.
    #[error("Shader source not found: {0}")]
    ShaderSourceMissing(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A named resource is missing from the resource table.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A resource exists but holds a different kind of content.
    #[error("Resource '{path}' is not {expected}")]
    ResourceKind {
        /// Logical resource path
        path: String,
        /// What the caller asked for
        expected: &'static str,
    },

    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed OBJ text.
    #[error("OBJ parse error at line {line}: {message}")]
    ObjParse {
        /// 1-based source line
        line: usize,
        /// What went wrong
        message: String,
    },

    /// A GPU handle no longer refers to a live resource.
    #[error("Invalid {0} handle")]
    InvalidHandle(&'static str),

    // ========================================================================
    // Traversal Errors
    // ========================================================================
    /// A draw was issued with no shader on the stack.
    #[error("No active shader on the stack")]
    NoActiveShader,

    /// A mesh has no `position` buffer to size its draw call.
    #[error("Mesh has no '{0}' attribute")]
    MissingAttribute(String),

    /// A traversal left graph state different from how it found it.
    #[error("Unbalanced traversal: {what} was {before} before and {after} after")]
    UnbalancedTraversal {
        /// Which piece of graph state leaked
        what: &'static str,
        /// Value before the root visit
        before: usize,
        /// Value after the root visit
        after: usize,
    },

    /// `pop_uniforms` was called on the root scope.
    #[error("Uniform scope popped past the root")]
    ScopeUnderflow,

    // ========================================================================
    // XR Errors
    // ========================================================================
    /// A stereo frame was requested without an XR session.
    #[error("No XR session is attached")]
    XrUnavailable,
}

/// Alias for `Result<T, ArborError>`.
pub type Result<T> = std::result::Result<T, ArborError>;
