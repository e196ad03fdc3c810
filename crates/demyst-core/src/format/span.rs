//! Tagged spans and their sentinel serialization.
//!
//! The formatter produces a [`SpanLine`]: text runs interleaved with region
//! markers. Plain output drops the markers. Decorated output writes each
//! marker as a private-use code point so the post-processor can find region
//! boundaries with a plain character scan.

use std::borrow::Cow;

/// Region boundary inside a rendered frame line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker
{
    /// Start of the `async Ret` region.
    ReturnTypeStart,
    /// End of the `async Ret` region.
    ReturnTypeEnd,
    /// Start of the emphasized method name.
    NameBoldStart,
    /// End of the emphasized method name (and lambda suffix).
    NameBoldEnd,
    /// Start of the `(at file:line)` region.
    FilePathStart,
    /// End of the `(at file:line)` region.
    FilePathEnd,
}

impl Marker
{
    /// Every marker, in sentinel order.
    pub const ALL: [Marker; 6] = [
        Marker::ReturnTypeStart,
        Marker::ReturnTypeEnd,
        Marker::NameBoldStart,
        Marker::NameBoldEnd,
        Marker::FilePathStart,
        Marker::FilePathEnd,
    ];

    /// Private-use code point written for this marker.
    pub const fn sentinel(self) -> char
    {
        match self {
            Marker::ReturnTypeStart => '\u{E000}',
            Marker::ReturnTypeEnd => '\u{E001}',
            Marker::NameBoldStart => '\u{E002}',
            Marker::NameBoldEnd => '\u{E003}',
            Marker::FilePathStart => '\u{E004}',
            Marker::FilePathEnd => '\u{E005}',
        }
    }

    /// Marker for a sentinel code point.
    pub const fn from_sentinel(ch: char) -> Option<Marker>
    {
        match ch {
            '\u{E000}' => Some(Marker::ReturnTypeStart),
            '\u{E001}' => Some(Marker::ReturnTypeEnd),
            '\u{E002}' => Some(Marker::NameBoldStart),
            '\u{E003}' => Some(Marker::NameBoldEnd),
            '\u{E004}' => Some(Marker::FilePathStart),
            '\u{E005}' => Some(Marker::FilePathEnd),
            _ => None,
        }
    }
}

/// Whether `ch` is one of the marker sentinels.
pub const fn is_sentinel(ch: char) -> bool
{
    Marker::from_sentinel(ch).is_some()
}

/// `text` with every sentinel removed. Borrows when there is nothing to strip.
pub fn strip_sentinels(text: &str) -> Cow<'_, str>
{
    if text.chars().any(is_sentinel) {
        Cow::Owned(text.chars().filter(|&ch| !is_sentinel(ch)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

/// One element of a rendered line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span
{
    /// Literal text.
    Text(String),
    /// Region boundary.
    Marker(Marker),
}

/// A rendered frame line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanLine
{
    spans: Vec<Span>,
}

impl SpanLine
{
    /// Empty line.
    pub fn new() -> Self
    {
        Self::default()
    }

    /// A line holding only `text`.
    pub fn text(text: impl Into<String>) -> Self
    {
        let mut line = Self::new();
        line.push_text(text.into());
        line
    }

    /// Append text, merging with a preceding text span.
    pub fn push_text(&mut self, text: impl AsRef<str>)
    {
        let text = text.as_ref();
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(Span::Text(last)) => last.push_str(text),
            _ => self.spans.push(Span::Text(text.to_string())),
        }
    }

    /// Append a marker.
    pub fn push_marker(&mut self, marker: Marker)
    {
        self.spans.push(Span::Marker(marker));
    }

    /// The spans in order.
    pub fn spans(&self) -> &[Span]
    {
        &self.spans
    }

    /// Whether the line has no spans.
    pub fn is_empty(&self) -> bool
    {
        self.spans.is_empty()
    }

    /// Text without markers.
    pub fn to_plain(&self) -> String
    {
        let mut out = String::new();
        for span in &self.spans {
            if let Span::Text(text) = span {
                out.push_str(text);
            }
        }
        out
    }

    /// Text with markers written as sentinels.
    pub fn to_decorated(&self) -> String
    {
        let mut out = String::new();
        for span in &self.spans {
            match span {
                Span::Text(text) => out.push_str(text),
                Span::Marker(marker) => out.push(marker.sentinel()),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_sentinel_mapping_is_bijective()
    {
        for marker in Marker::ALL {
            assert_eq!(Marker::from_sentinel(marker.sentinel()), Some(marker));
        }
        assert_eq!(Marker::from_sentinel('a'), None);
    }

    #[test]
    fn test_plain_and_decorated()
    {
        let mut line = SpanLine::new();
        line.push_text("My");
        line.push_text("Class.");
        line.push_marker(Marker::NameBoldStart);
        line.push_text("Run");
        line.push_marker(Marker::NameBoldEnd);

        assert_eq!(line.spans().len(), 4);
        assert_eq!(line.to_plain(), "MyClass.Run");
        assert_eq!(line.to_decorated(), "MyClass.\u{E002}Run\u{E003}");
        assert_eq!(strip_sentinels(&line.to_decorated()), "MyClass.Run");
    }

    #[test]
    fn test_strip_sentinels_borrows_clean_text()
    {
        assert!(matches!(strip_sentinels("at Foo"), Cow::Borrowed("at Foo")));
    }
}
