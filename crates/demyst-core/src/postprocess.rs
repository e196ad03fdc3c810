//! # Post-processing
//!
//! Line-oriented transform from sentinel-decorated trace text to final
//! markup.
//!
//! For each line of input:
//!
//! 1. Empty lines are dropped.
//! 2. A line starting with the boundary marker stops processing; it and every
//!    later line are dropped. The marker may follow an `at ` prefix or the
//!    return type region.
//! 3. The continuation marker is prefixed.
//! 4. Path separators are normalized.
//! 5. Sentinels become markup for the configured [`MarkupStyle`].
//!
//! Line terminators are kept as found, so a trace without a trailing newline
//! comes out without one.

use std::borrow::Cow;

use tracing::warn;

use crate::config::{MarkupStyle, PathStyle, TraceOptions};
use crate::error::{DemystError, DemystResult};
use crate::format::{strip_sentinels, Marker};

/// What to do with one input line.
#[derive(Debug, PartialEq, Eq)]
enum LineAction
{
    Emit(String),
    Stop,
}

/// Opening and closing markup of each region.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Markup
{
    italic: (&'static str, &'static str),
    bold: (&'static str, &'static str),
    file: (String, &'static str),
}

impl Markup
{
    fn new(style: MarkupStyle, font_size: u32) -> Self
    {
        match style {
            MarkupStyle::Rich => Self {
                italic: ("<i>", "</i>"),
                bold: ("<b><i>", "</i></b>"),
                file: (format!("<size={font_size}>"), "</size>"),
            },
            MarkupStyle::Ansi => Self {
                italic: ("\x1b[3m", "\x1b[23m"),
                bold: ("\x1b[1m", "\x1b[22m"),
                file: ("\x1b[2m".to_string(), "\x1b[22m"),
            },
        }
    }
}

/// Converts decorated trace text into final text.
#[derive(Debug, Clone)]
pub struct PostProcessor
{
    disabled: bool,
    boundary: Option<String>,
    continuation: String,
    path_style: PathStyle,
    markup: Markup,
}

impl Default for PostProcessor
{
    fn default() -> Self
    {
        Self::new(&TraceOptions::default())
    }
}

impl PostProcessor
{
    /// Post-processor configured from `options`.
    pub fn new(options: &TraceOptions) -> Self
    {
        Self {
            disabled: options.postprocess_disabled,
            boundary: options.internal_boundary_marker.clone().filter(|marker| !marker.is_empty()),
            continuation: options.continuation_marker.clone(),
            path_style: options.path_style,
            markup: Markup::new(options.markup_style, options.file_font_size),
        }
    }

    /// Transform `input`. Never fails.
    ///
    /// When the transform fails the untransformed input is returned together
    /// with the error text. When post-processing is disabled the input is
    /// returned unchanged.
    pub fn process(&self, input: &str) -> String
    {
        if self.disabled {
            return input.to_string();
        }

        match self.try_process(input) {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "post-processing failed, returning decorated text");
                format!("Failed to post-process stack trace:\n{input}\n=== Post-processing error: ===\n{err}")
            }
        }
    }

    /// Transform `input`, reporting malformed sentinels.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::Transform`] when a line carries unbalanced or
    /// nested region markers.
    pub fn try_process(&self, input: &str) -> DemystResult<String>
    {
        let mut output = String::with_capacity(input.len() + input.len() / 4);
        let mut line_number = 0;

        for line in input.split_inclusive('\n') {
            let (body, terminator) = split_terminator(line);
            if body.is_empty() {
                continue;
            }
            line_number += 1;

            match self.process_line(line_number, body)? {
                LineAction::Emit(text) => {
                    output.push_str(&text);
                    output.push_str(terminator);
                }
                LineAction::Stop => break,
            }
        }

        Ok(output)
    }

    fn process_line(&self, line_number: usize, body: &str) -> DemystResult<LineAction>
    {
        if let Some(boundary) = &self.boundary {
            if starts_with_boundary(body, boundary) {
                return Ok(LineAction::Stop);
            }
        }

        let body = match self.path_style {
            PathStyle::Unix if body.contains('\\') => Cow::Owned(body.replace('\\', "/")),
            PathStyle::Windows if body.contains('/') => Cow::Owned(body.replace('/', "\\")),
            _ => Cow::Borrowed(body),
        };
        let body = with_legacy_bold_start(&body);

        let mut out = String::with_capacity(self.continuation.len() + body.len() + 32);
        out.push_str(&self.continuation);
        self.translate(line_number, &body, &mut out)?;
        Ok(LineAction::Emit(out))
    }

    fn translate(&self, line_number: usize, body: &str, out: &mut String) -> DemystResult<()>
    {
        let fail = |reason: &str| DemystError::Transform {
            line: line_number,
            reason: reason.to_string(),
        };

        let mut italic_open = false;
        let mut bold_open = false;
        let mut file_open = false;

        for ch in body.chars() {
            match Marker::from_sentinel(ch) {
                Some(Marker::ReturnTypeStart) => {
                    if italic_open || bold_open {
                        return Err(fail("return type region opened inside another region"));
                    }
                    italic_open = true;
                    out.push_str(self.markup.italic.0);
                }
                Some(Marker::ReturnTypeEnd) => {
                    if !italic_open {
                        return Err(fail("return type region closed without being opened"));
                    }
                    italic_open = false;
                    out.push_str(self.markup.italic.1);
                }
                Some(Marker::NameBoldStart) => {
                    if bold_open || italic_open {
                        return Err(fail("name region opened inside another region"));
                    }
                    bold_open = true;
                    out.push_str(self.markup.bold.0);
                }
                Some(Marker::NameBoldEnd) => {
                    if !bold_open {
                        return Err(fail("name region closed without being opened"));
                    }
                    bold_open = false;
                    out.push_str(self.markup.bold.1);
                }
                Some(Marker::FilePathStart) => {
                    if file_open {
                        return Err(fail("file region opened twice"));
                    }
                    file_open = true;
                    out.push_str(&self.markup.file.0);
                }
                Some(Marker::FilePathEnd) => {
                    if !file_open {
                        return Err(fail("file region closed without being opened"));
                    }
                    file_open = false;
                    out.push_str(self.markup.file.1);
                }
                None => out.push(ch),
            }
        }

        if italic_open {
            return Err(fail("return type region left open"));
        }
        if bold_open {
            return Err(fail("name region left open"));
        }
        // The file region runs to the end of the line when its end is missing.
        if file_open {
            out.push_str(self.markup.file.1);
        }
        Ok(())
    }
}

/// Whether the frame on `body` starts with `boundary`.
///
/// The frame text is checked as is, after an `at ` prefix, and after the
/// return type region, so a marker mentioned later on the line (a parameter
/// type, say) does not truncate.
fn starts_with_boundary(body: &str, boundary: &str) -> bool
{
    let return_end = Marker::ReturnTypeEnd.sentinel();
    let after_return = body.find(return_end).map(|end| &body[end + return_end.len_utf8()..]);

    [Some(body), after_return].into_iter().flatten().any(|text| {
        let stripped = strip_sentinels(text);
        let line = stripped.trim_start();
        line.starts_with(boundary) || line.strip_prefix("at ").is_some_and(|rest| rest.starts_with(boundary))
    })
}

/// Split `line` into its body and its `\n` / `\r\n` terminator.
fn split_terminator(line: &str) -> (&str, &str)
{
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Insert a bold start for a line that only marks where the bold name ends.
///
/// The name starts after the nearest `.` or `+` before the end marker, or at
/// the start of the line.
fn with_legacy_bold_start(body: &str) -> Cow<'_, str>
{
    let start_sentinel = Marker::NameBoldStart.sentinel();
    if body.contains(start_sentinel) {
        return Cow::Borrowed(body);
    }
    let Some(end) = body.find(Marker::NameBoldEnd.sentinel()) else {
        return Cow::Borrowed(body);
    };

    let start = body[..end].rfind(|ch| ch == '.' || ch == '+').map_or(0, |index| index + 1);
    let mut patched = String::with_capacity(body.len() + start_sentinel.len_utf8());
    patched.push_str(&body[..start]);
    patched.push(start_sentinel);
    patched.push_str(&body[start..]);
    Cow::Owned(patched)
}
