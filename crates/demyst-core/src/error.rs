//! # Error Types
//!
//! General error handling for trace demystification.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! None of these errors escape the public `format_*` entry points: each stage
//! degrades its own output instead (see the variant docs for how).

use thiserror::Error;

use crate::types::MethodId;

/// Main error type for demystification operations
///
/// ## Error Categories
///
/// 1. **Resolution**: metadata for a frame is incomplete
/// 2. **Formatting**: a resolved structure is malformed
/// 3. **Transform**: the post-processor could not translate the sentinels of a trace
/// 4. **Aggregation**: an exception chain could not be walked
/// 5. **Input**: invalid arguments, JSON and I/O errors at the boundary
#[derive(Error, Debug)]
pub enum DemystError
{
    /// Metadata for a method is missing or incomplete
    ///
    /// This happens when:
    /// - The binary was stripped or obfuscated
    /// - The metadata provider cannot answer a query (parameters, types)
    ///
    /// The frame degrades to its raw text; the rest of the trace is unaffected.
    #[error("Failed to resolve method {method}: {reason}")]
    Resolution
    {
        /// Identity of the method being resolved
        method: MethodId,
        /// What was missing
        reason: String,
    },

    /// A resolved structure could not be rendered
    ///
    /// The offending fragment is replaced by a `?` placeholder.
    #[error("Failed to format frame: {0}")]
    Formatting(String),

    /// The post-processor met sentinels it could not translate
    ///
    /// Post-processing is abandoned for the whole trace; the untransformed
    /// text is returned together with this error.
    #[error("Failed to post-process line {line}: {reason}")]
    Transform
    {
        /// One-based line number (after empty-line filtering)
        line: usize,
        /// Description of the malformed input
        reason: String,
    },

    /// An exception chain could not be aggregated
    ///
    /// Examples:
    /// - The causal chain is cyclic or deeper than the configured limit
    #[error("Failed to aggregate exception chain: {0}")]
    Aggregation(String),

    /// Invalid argument passed to a demystifier function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed JSON trace record
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (for reading trace files, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DemystError
{
    /// Build a [`DemystError::Resolution`] for `method`.
    pub fn resolution(method: MethodId, reason: impl Into<String>) -> Self
    {
        DemystError::Resolution {
            method,
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for `Result<T, DemystError>`
///
/// ```rust
/// use demyst_core::error::DemystResult;
/// fn foo() -> DemystResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type DemystResult<T> = std::result::Result<T, DemystError>;
