//! # Trace Aggregation
//!
//! Builds documents out of raw frames and whole traces out of exception
//! chains.
//!
//! ## Layout
//!
//! ```text
//! <outer exception frames>
//!  ---> InnerException: message (rethrown as OuterException)
//! <inner exception frames>
//!  ===> captured at:
//! <call-site frames>
//! ```
//!
//! All resolution happens while a document is built; indexing a document or
//! reading its text afterwards does no metadata work.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::cache::ResolutionCache;
use crate::config::TraceOptions;
use crate::error::{DemystError, DemystResult};
use crate::format::Formatter;
use crate::postprocess::PostProcessor;
use crate::resolve::FrameResolver;
use crate::types::{RawFrame, ResolvedFrame, ResolvedMethod};

/// An exception as seen by the aggregator.
pub trait ExceptionLike
{
    /// Exception type name.
    fn type_name(&self) -> &str;

    /// Message; may be empty.
    fn message(&self) -> &str;

    /// The exception this one wraps.
    fn cause(&self) -> Option<&dyn ExceptionLike>;

    /// Captured frames, innermost call first.
    fn frames(&self) -> Vec<RawFrame>;

    /// Text used when the trace cannot be built.
    fn display_text(&self) -> String
    {
        headline(self.type_name(), self.message())
    }
}

/// `Type: message`, or `Type` for an empty message.
pub fn headline(type_name: &str, message: &str) -> String
{
    if message.is_empty() {
        type_name.to_string()
    } else {
        format!("{type_name}: {message}")
    }
}

/// Immutable, indexable sequence of resolved frames.
#[derive(Debug, Clone)]
pub struct StackTraceDocument
{
    frames: Vec<ResolvedFrame>,
    formatter: Formatter,
    plain: OnceCell<String>,
    decorated: OnceCell<String>,
}

impl StackTraceDocument
{
    /// Document over already resolved frames.
    pub fn new(frames: Vec<ResolvedFrame>, formatter: Formatter) -> Self
    {
        Self {
            frames,
            formatter,
            plain: OnceCell::new(),
            decorated: OnceCell::new(),
        }
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize
    {
        self.frames.len()
    }

    /// Whether the document has no frames.
    pub fn is_empty(&self) -> bool
    {
        self.frames.is_empty()
    }

    /// Frame at `index`.
    pub fn frame(&self, index: usize) -> Option<&ResolvedFrame>
    {
        self.frames.get(index)
    }

    /// All frames.
    pub fn frames(&self) -> &[ResolvedFrame]
    {
        &self.frames
    }

    /// Iterate over frames.
    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedFrame>
    {
        self.frames.iter()
    }

    /// Frames rendered without markers, one per line.
    pub fn plain_text(&self) -> &str
    {
        self.plain.get_or_init(|| {
            let lines: Vec<String> = self.frames.iter().map(|frame| self.formatter.format_plain(frame)).collect();
            lines.join("\n")
        })
    }

    /// Frames rendered with sentinels, one per line.
    pub fn decorated_text(&self) -> &str
    {
        self.decorated.get_or_init(|| {
            let lines: Vec<String> = self
                .frames
                .iter()
                .map(|frame| self.formatter.format_decorated(frame))
                .collect();
            lines.join("\n")
        })
    }
}

impl<'a> IntoIterator for &'a StackTraceDocument
{
    type Item = &'a ResolvedFrame;
    type IntoIter = std::slice::Iter<'a, ResolvedFrame>;

    fn into_iter(self) -> Self::IntoIter
    {
        self.frames.iter()
    }
}

/// Separator line between documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner
{
    /// The following frames belong to an inner exception.
    Inner
    {
        /// Inner exception type.
        type_name: String,
        /// Inner exception message.
        message: String,
        /// Type of the exception that wrapped it.
        rethrown_as: String,
    },
    /// The following frames are where the exception was observed.
    CallSite,
}

impl fmt::Display for Banner
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Banner::Inner {
                type_name,
                message,
                rethrown_as,
            } => write!(f, " ---> {} (rethrown as {rethrown_as})", headline(type_name, message)),
            Banner::CallSite => write!(f, " ===> captured at:"),
        }
    }
}

/// One document and the banner introducing it.
#[derive(Debug, Clone)]
pub struct TraceSection
{
    /// `None` for the outermost exception.
    pub banner: Option<Banner>,
    /// Frames of this section.
    pub document: StackTraceDocument,
}

/// Every section of an exception's trace.
#[derive(Debug, Clone)]
pub struct ExceptionTrace
{
    headline: String,
    sections: Vec<TraceSection>,
    /// `(section, index in section)` of every frame, in trace order.
    index: Vec<(usize, usize)>,
}

impl ExceptionTrace
{
    fn new(headline: String, sections: Vec<TraceSection>) -> Self
    {
        let index = sections
            .iter()
            .enumerate()
            .flat_map(|(section, entry)| (0..entry.document.frame_count()).map(move |frame| (section, frame)))
            .collect();
        Self {
            headline,
            sections,
            index,
        }
    }

    /// `Type: message` of the outermost exception.
    pub fn headline(&self) -> &str
    {
        &self.headline
    }

    /// Sections, outermost exception first.
    pub fn sections(&self) -> &[TraceSection]
    {
        &self.sections
    }

    /// Total frames across sections.
    pub fn frame_count(&self) -> usize
    {
        self.index.len()
    }

    /// Frame at `index`, counting across sections in order.
    pub fn frame(&self, index: usize) -> Option<&ResolvedFrame>
    {
        let &(section, frame) = self.index.get(index)?;
        self.sections[section].document.frame(frame)
    }

    /// Sections rendered without markers.
    pub fn plain_text(&self) -> String
    {
        self.compose(StackTraceDocument::plain_text)
    }

    /// Sections rendered with sentinels.
    pub fn decorated_text(&self) -> String
    {
        self.compose(StackTraceDocument::decorated_text)
    }

    fn compose<F>(&self, text: F) -> String
    where
        F: Fn(&StackTraceDocument) -> &str,
    {
        let mut parts = Vec::with_capacity(self.sections.len() * 2);
        for section in &self.sections {
            if let Some(banner) = &section.banner {
                parts.push(banner.to_string());
            }
            if !section.document.is_empty() {
                parts.push(text(&section.document).to_string());
            }
        }
        parts.join("\n")
    }
}

/// Headline and final trace text of an exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedException
{
    /// `Type: message`, or the failure notice.
    pub message: String,
    /// Post-processed trace, or the error text.
    pub stack_trace: String,
}

/// Front door of the library: resolves, formats and post-processes traces.
#[derive(Debug, Clone)]
pub struct TraceAggregator
{
    options: TraceOptions,
    resolver: FrameResolver,
    formatter: Formatter,
    postprocessor: PostProcessor,
}

impl Default for TraceAggregator
{
    fn default() -> Self
    {
        Self::new(TraceOptions::default())
    }
}

impl TraceAggregator
{
    /// Aggregator with its own cache (unless disabled in `options`).
    pub fn new(options: TraceOptions) -> Self
    {
        let resolver = FrameResolver::new(&options);
        Self::with_resolver(options, resolver)
    }

    /// Aggregator sharing `cache`, unless `options.cache_disabled`.
    pub fn with_cache(options: TraceOptions, cache: Arc<ResolutionCache<ResolvedMethod>>) -> Self
    {
        let resolver = if options.cache_disabled {
            FrameResolver::without_cache()
        } else {
            FrameResolver::with_cache(cache)
        };
        Self::with_resolver(options, resolver)
    }

    fn with_resolver(options: TraceOptions, resolver: FrameResolver) -> Self
    {
        Self {
            formatter: Formatter::new(&options),
            postprocessor: PostProcessor::new(&options),
            resolver,
            options,
        }
    }

    /// Options in use.
    pub fn options(&self) -> &TraceOptions
    {
        &self.options
    }

    /// Resolver in use.
    pub fn resolver(&self) -> &FrameResolver
    {
        &self.resolver
    }

    /// Post-processor in use.
    pub fn postprocessor(&self) -> &PostProcessor
    {
        &self.postprocessor
    }

    /// Formatter in use.
    pub fn formatter(&self) -> &Formatter
    {
        &self.formatter
    }

    /// Resolve `frames` into a document.
    pub fn document(&self, frames: &[RawFrame]) -> StackTraceDocument
    {
        StackTraceDocument::new(self.resolver.resolve_all(frames), self.formatter)
    }

    /// Build the trace of `exception` and its causes.
    ///
    /// `call_site` frames are appended under a capture banner when given.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::Aggregation`] when the cause chain is longer
    /// than `max_exception_depth`, which is how cyclic chains show up.
    pub fn aggregate(&self, exception: &dyn ExceptionLike, call_site: Option<&[RawFrame]>) -> DemystResult<ExceptionTrace>
    {
        let chain = self.cause_chain(exception)?;
        debug!(exceptions = chain.len(), "aggregating exception chain");

        let mut sections = Vec::with_capacity(chain.len() + 1);
        let mut outer: Option<&dyn ExceptionLike> = None;
        for current in chain {
            let banner = outer.map(|outer| Banner::Inner {
                type_name: current.type_name().to_string(),
                message: current.message().to_string(),
                rethrown_as: outer.type_name().to_string(),
            });
            sections.push(TraceSection {
                banner,
                document: self.document(&current.frames()),
            });
            outer = Some(current);
        }

        if let Some(frames) = call_site {
            sections.push(TraceSection {
                banner: Some(Banner::CallSite),
                document: self.document(frames),
            });
        }

        Ok(ExceptionTrace::new(headline(exception.type_name(), exception.message()), sections))
    }

    fn cause_chain<'e>(&self, exception: &'e dyn ExceptionLike) -> DemystResult<Vec<&'e dyn ExceptionLike>>
    {
        let limit = self.options.max_exception_depth.max(1);
        let mut chain = vec![exception];
        let mut current = exception.cause();
        while let Some(inner) = current {
            if chain.len() >= limit {
                return Err(DemystError::Aggregation(format!(
                    "cause chain of {} exceeds {limit} exceptions",
                    exception.type_name()
                )));
            }
            chain.push(inner);
            current = inner.cause();
        }
        Ok(chain)
    }

    /// Final text for a plain frame list. Never fails.
    pub fn format_trace(&self, frames: &[RawFrame]) -> String
    {
        self.finish(self.document(frames).decorated_text())
    }

    /// Headline and final trace text for `exception`. Never fails.
    ///
    /// When the chain cannot be walked, the message carries the exception's
    /// display text and a failure notice, and the trace carries the error.
    pub fn format_exception(&self, exception: &dyn ExceptionLike, call_site: Option<&[RawFrame]>) -> FormattedException
    {
        match self.aggregate(exception, call_site) {
            Ok(trace) => FormattedException {
                stack_trace: self.finish(&trace.decorated_text()),
                message: trace.headline,
            },
            Err(err) => {
                warn!(error = %err, exception = exception.type_name(), "unable to extract stack trace");
                FormattedException {
                    message: format!(
                        "{}\n\nDemystifier: Unable to extract stack trace from exception: {}.",
                        exception.display_text(),
                        exception.type_name()
                    ),
                    stack_trace: err.to_string(),
                }
            }
        }
    }

    fn finish(&self, decorated: &str) -> String
    {
        self.postprocessor.process(decorated)
    }
}
