//! Raw and resolved frame types.

use std::fmt;
use std::sync::Arc;

use super::method::MethodIdentity;
use super::resolved::ResolvedMethod;
use crate::native;

/// Source code location for a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// Absolute or project-relative path.
    pub file: String,
    /// Line number, if known.
    pub line: Option<u32>,
}

impl SourceLocation
{
    /// Helper to build a location when only a file is known.
    pub fn from_file(file: impl Into<String>) -> Self
    {
        Self {
            file: file.into(),
            line: None,
        }
    }
}

impl fmt::Display for SourceLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.line {
            Some(line) => write!(f, "{}:{line}", self.file),
            None => write!(f, "{}", self.file),
        }
    }
}

/// One captured call-stack entry as supplied by the frame source.
#[derive(Debug, Clone)]
pub struct RawFrame
{
    /// Method metadata handle, absent for native or unknown frames.
    pub method: Option<Arc<dyn MethodIdentity>>,
    /// Source file, if debug information was available.
    pub file_name: Option<String>,
    /// Source line; `0` from some runtimes means unknown and is treated as `None`.
    pub line_number: Option<u32>,
    /// The runtime's own rendering of the frame, used verbatim on fallback.
    pub raw_text: String,
    /// The source marked this frame as not resolvable.
    pub unresolved: bool,
}

impl RawFrame
{
    /// A frame backed by method metadata.
    pub fn new(method: Arc<dyn MethodIdentity>) -> Self
    {
        let raw_text = format!("at {}", method.name());
        Self {
            method: Some(method),
            file_name: None,
            line_number: None,
            raw_text,
            unresolved: false,
        }
    }

    /// A frame that is emitted verbatim.
    pub fn unresolved(raw_text: impl Into<String>) -> Self
    {
        Self {
            method: None,
            file_name: None,
            line_number: None,
            raw_text: raw_text.into(),
            unresolved: true,
        }
    }

    /// A native frame; the symbol is demangled when possible.
    pub fn native(symbol: &str, address: Option<u64>) -> Self
    {
        Self::unresolved(native::native_frame_text(symbol, address))
    }

    /// Attach a source location.
    #[must_use]
    pub fn with_location(mut self, file: impl Into<String>, line: Option<u32>) -> Self
    {
        self.file_name = Some(file.into());
        self.line_number = line.filter(|&line| line != 0);
        self
    }

    /// Override the fallback text.
    #[must_use]
    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self
    {
        self.raw_text = raw_text.into();
        self
    }

    /// Location, when a file name is known.
    pub fn location(&self) -> Option<SourceLocation>
    {
        self.file_name
            .as_ref()
            .filter(|file| !file.is_empty())
            .map(|file| SourceLocation {
                file: file.clone(),
                line: self.line_number.filter(|&line| line != 0),
            })
    }
}

/// A frame after resolution. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrame
{
    /// Demystified method with optional location.
    Resolved
    {
        /// Shared with the resolution cache.
        method: Arc<ResolvedMethod>,
        /// Source location.
        location: Option<SourceLocation>,
    },
    /// Raw text emitted verbatim.
    Unresolved(String),
}

impl ResolvedFrame
{
    /// Resolved method, if any.
    pub fn method(&self) -> Option<&ResolvedMethod>
    {
        match self {
            ResolvedFrame::Resolved { method, .. } => Some(method),
            ResolvedFrame::Unresolved(_) => None,
        }
    }

    /// Convenience helper to test for raw frames.
    pub fn is_unresolved(&self) -> bool
    {
        matches!(self, ResolvedFrame::Unresolved(_))
    }
}
