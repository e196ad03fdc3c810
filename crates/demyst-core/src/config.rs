//! # Trace Options
//!
//! Configuration shared by the resolver, formatter, post-processor and
//! aggregator.
//!
//! ## Environment Variables
//!
//! [`TraceOptions::from_env`] starts from the defaults and applies:
//!
//! - `DEMYST_FULL_PARAMS`: render `(type name, ...)` instead of one letter per parameter
//! - `DEMYST_NO_MARKUP`: emit no sentinels and no markup
//! - `DEMYST_NO_CACHE`: resolve every frame from metadata
//! - `DEMYST_NO_POSTPROCESS`: return decorated text untouched
//! - `DEMYST_BOUNDARY`: drop every line from the first frame starting with this text
//! - `DEMYST_PATH_STYLE`: `unix`, `windows` or `preserve`
//! - `DEMYST_MARKUP`: `rich` or `ansi`
//! - `DEMYST_FONT_SIZE`: font size of the file region in rich markup
//!
//! Boolean variables accept `1`, `true`, `yes` and `on` (case-insensitive);
//! anything else reads as false.

use std::env;
use std::fmt;
use std::str::FromStr;

use crate::cache::DEFAULT_CAPACITY;
use crate::error::{DemystError, DemystResult};

/// Default continuation marker prefixed to every post-processed line.
pub const DEFAULT_CONTINUATION_MARKER: &str = "│ ";

/// Default font size of the file region in rich markup.
pub const DEFAULT_FILE_FONT_SIZE: u32 = 8;

/// Default bound on exception chain length.
pub const DEFAULT_MAX_EXCEPTION_DEPTH: usize = 64;

/// Path separator normalization applied by the post-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathStyle
{
    /// Rewrite `\` to `/`.
    #[default]
    Unix,
    /// Rewrite `/` to `\` inside file regions.
    Windows,
    /// Leave paths untouched.
    Preserve,
}

impl FromStr for PathStyle
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "unix" | "posix" | "forward" => Ok(PathStyle::Unix),
            "windows" | "win" | "backward" => Ok(PathStyle::Windows),
            "preserve" | "none" | "native" => Ok(PathStyle::Preserve),
            _ => Err(format!("Unknown path style: {s}. Use 'unix', 'windows' or 'preserve'")),
        }
    }
}

impl fmt::Display for PathStyle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            PathStyle::Unix => "unix",
            PathStyle::Windows => "windows",
            PathStyle::Preserve => "preserve",
        };
        write!(f, "{label}")
    }
}

/// Markup vocabulary produced by the post-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkupStyle
{
    /// Rich-text tags (`<i>`, `<b>`, `<size=N>`) for log consoles.
    #[default]
    Rich,
    /// ANSI SGR escapes for terminals.
    Ansi,
}

impl FromStr for MarkupStyle
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "rich" | "tags" | "unity" => Ok(MarkupStyle::Rich),
            "ansi" | "terminal" | "term" => Ok(MarkupStyle::Ansi),
            _ => Err(format!("Unknown markup style: {s}. Use 'rich' or 'ansi'")),
        }
    }
}

impl fmt::Display for MarkupStyle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            MarkupStyle::Rich => "rich",
            MarkupStyle::Ansi => "ansi",
        };
        write!(f, "{label}")
    }
}

/// Options for one demystification pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceOptions
{
    /// Emit sentinels around return type, name and file regions.
    pub markup_enabled: bool,
    /// Render parameters as `(type name, ...)`.
    pub full_params: bool,
    /// Skip the resolution cache.
    pub cache_disabled: bool,
    /// Return decorated text without post-processing.
    pub postprocess_disabled: bool,
    /// Lines from the first frame starting with this text onward are dropped.
    ///
    /// The frame may start with `at ` or a return type before the marker.
    pub internal_boundary_marker: Option<String>,
    /// Path separator normalization.
    pub path_style: PathStyle,
    /// Markup vocabulary.
    pub markup_style: MarkupStyle,
    /// Font size of the file region in rich markup.
    pub file_font_size: u32,
    /// Prefix of every post-processed line.
    pub continuation_marker: String,
    /// Strongly retained cache entries.
    pub cache_capacity: usize,
    /// Longest exception chain walked before giving up.
    pub max_exception_depth: usize,
}

impl Default for TraceOptions
{
    fn default() -> Self
    {
        Self {
            markup_enabled: true,
            full_params: false,
            cache_disabled: false,
            postprocess_disabled: false,
            internal_boundary_marker: None,
            path_style: PathStyle::Unix,
            markup_style: MarkupStyle::Rich,
            file_font_size: DEFAULT_FILE_FONT_SIZE,
            continuation_marker: DEFAULT_CONTINUATION_MARKER.to_string(),
            cache_capacity: DEFAULT_CAPACITY,
            max_exception_depth: DEFAULT_MAX_EXCEPTION_DEPTH,
        }
    }
}

impl TraceOptions
{
    /// Defaults overridden by `DEMYST_*` environment variables.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::InvalidArgument`] for unparsable values.
    pub fn from_env() -> DemystResult<Self>
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`, keyed like the environment.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::InvalidArgument`] for unparsable values.
    pub fn from_lookup<F>(lookup: F) -> DemystResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        let flag = |key: &str| lookup(key).is_some_and(|value| parse_flag(&value));

        options.full_params = flag("DEMYST_FULL_PARAMS");
        options.markup_enabled = !flag("DEMYST_NO_MARKUP");
        options.cache_disabled = flag("DEMYST_NO_CACHE");
        options.postprocess_disabled = flag("DEMYST_NO_POSTPROCESS");
        options.internal_boundary_marker = lookup("DEMYST_BOUNDARY").filter(|marker| !marker.is_empty());

        if let Some(style) = lookup("DEMYST_PATH_STYLE") {
            options.path_style = style.parse().map_err(DemystError::InvalidArgument)?;
        }
        if let Some(style) = lookup("DEMYST_MARKUP") {
            options.markup_style = style.parse().map_err(DemystError::InvalidArgument)?;
        }
        if let Some(size) = lookup("DEMYST_FONT_SIZE") {
            options.file_font_size = size
                .trim()
                .parse()
                .map_err(|_| DemystError::InvalidArgument(format!("Invalid font size: {size}")))?;
        }

        Ok(options)
    }

    /// Set full parameter rendering.
    #[must_use]
    pub fn with_full_params(mut self, full_params: bool) -> Self
    {
        self.full_params = full_params;
        self
    }

    /// Enable or disable sentinels.
    #[must_use]
    pub fn with_markup(mut self, enabled: bool) -> Self
    {
        self.markup_enabled = enabled;
        self
    }

    /// Enable or disable the resolution cache.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self
    {
        self.cache_disabled = !enabled;
        self
    }

    /// Enable or disable post-processing.
    #[must_use]
    pub fn with_postprocess(mut self, enabled: bool) -> Self
    {
        self.postprocess_disabled = !enabled;
        self
    }

    /// Truncate at the first frame starting with `marker`.
    #[must_use]
    pub fn with_boundary_marker(mut self, marker: impl Into<String>) -> Self
    {
        self.internal_boundary_marker = Some(marker.into());
        self
    }

    /// Set the path style.
    #[must_use]
    pub fn with_path_style(mut self, style: PathStyle) -> Self
    {
        self.path_style = style;
        self
    }

    /// Set the markup style.
    #[must_use]
    pub fn with_markup_style(mut self, style: MarkupStyle) -> Self
    {
        self.markup_style = style;
        self
    }

    /// Set the rich-markup file font size.
    #[must_use]
    pub fn with_file_font_size(mut self, size: u32) -> Self
    {
        self.file_font_size = size;
        self
    }

    /// Set the continuation marker.
    #[must_use]
    pub fn with_continuation_marker(mut self, marker: impl Into<String>) -> Self
    {
        self.continuation_marker = marker.into();
        self
    }

    /// Set the cache capacity.
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self
    {
        self.cache_capacity = capacity;
        self
    }

    /// Set the exception chain bound.
    #[must_use]
    pub fn with_max_exception_depth(mut self, depth: usize) -> Self
    {
        self.max_exception_depth = depth;
        self
    }
}

fn parse_flag(value: &str) -> bool
{
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
