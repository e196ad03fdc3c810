//! # Frame Formatting
//!
//! Renders [`ResolvedFrame`]s into single lines.
//!
//! ## Layout
//!
//! ```text
//! [async Ret ]Decl.Name<G>(params)[ (at file:line)]
//! [async Ret ]Decl.Host<G>()+Sub(lambda-params)=>{…}[ [n]][ (at file:line)]
//! new Decl(params)
//! ```
//!
//! The return region, the bold name region and the file region are delimited
//! with [`Marker`]s; see [`span`] for how they are serialized.

pub mod span;

use std::fmt::Write as _;

use tracing::debug;

pub use self::span::{is_sentinel, strip_sentinels, Marker, Span, SpanLine};
use crate::config::TraceOptions;
use crate::error::DemystError;
use crate::types::{MethodKind, ResolvedFrame, ResolvedMethod, ResolvedParameter, SourceLocation};

/// Placeholder for fragments that cannot be rendered.
pub const PLACEHOLDER: &str = "?";

/// Stateless line renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Formatter
{
    full_params: bool,
    markup_enabled: bool,
}

impl Default for Formatter
{
    fn default() -> Self
    {
        Self::new(&TraceOptions::default())
    }
}

impl Formatter
{
    /// Formatter configured from `options`.
    pub fn new(options: &TraceOptions) -> Self
    {
        Self {
            full_params: options.full_params,
            markup_enabled: options.markup_enabled,
        }
    }

    /// Whether parameters render as `(type name, ...)`.
    pub fn full_params(&self) -> bool
    {
        self.full_params
    }

    /// Whether decorated output carries sentinels.
    pub fn markup_enabled(&self) -> bool
    {
        self.markup_enabled
    }

    /// Render a frame into spans.
    pub fn render(&self, frame: &ResolvedFrame) -> SpanLine
    {
        match frame {
            // Raw text never carries markers of its own
            ResolvedFrame::Unresolved(raw) => SpanLine::text(strip_sentinels(raw)),
            ResolvedFrame::Resolved { method, location } => self.render_method(method, location.as_ref()),
        }
    }

    /// Render a frame without markers.
    pub fn format_plain(&self, frame: &ResolvedFrame) -> String
    {
        self.render(frame).to_plain()
    }

    /// Render a frame with sentinels, unless markup is disabled.
    pub fn format_decorated(&self, frame: &ResolvedFrame) -> String
    {
        let line = self.render(frame);
        if self.markup_enabled {
            line.to_decorated()
        } else {
            line.to_plain()
        }
    }

    /// Render a resolved method and optional location into spans.
    pub fn render_method(&self, method: &ResolvedMethod, location: Option<&SourceLocation>) -> SpanLine
    {
        let mut line = SpanLine::new();

        if let Some(region) = return_region(method) {
            line.push_marker(Marker::ReturnTypeStart);
            line.push_text(region);
            line.push_marker(Marker::ReturnTypeEnd);
            line.push_text(" ");
        }

        match method.kind {
            MethodKind::Constructor | MethodKind::StaticConstructor => {
                line.push_text(if method.kind == MethodKind::Constructor { "new " } else { "static " });
                line.push_marker(Marker::NameBoldStart);
                line.push_text(fragment(method.declaring_type_name.as_deref(), "declaring type"));
                line.push_marker(Marker::NameBoldEnd);
                line.push_text(self.parameter_list(Some(method.parameters.as_slice())));
            }
            MethodKind::Method => {
                if let Some(declaring) = method.declaring_type_name.as_deref().filter(|name| !name.is_empty()) {
                    line.push_text(declaring);
                    line.push_text(".");
                }
                line.push_marker(Marker::NameBoldStart);
                line.push_text(fragment(Some(method.name.as_str()), "method name"));
                if let Some(generics) = &method.generic_argument_display {
                    line.push_text(generics);
                }

                if method.has_sub_method() {
                    line.push_text("()+");
                    line.push_text(fragment(method.sub_method_name.as_deref(), "sub-method name"));
                    line.push_text(self.parameter_list(method.sub_method_parameters.as_deref()));
                    line.push_text("=>{…}");
                    line.push_marker(Marker::NameBoldEnd);
                    if let Some(ordinal) = method.ordinal {
                        line.push_text(format!(" [{ordinal}]"));
                    }
                } else {
                    line.push_marker(Marker::NameBoldEnd);
                    line.push_text(self.parameter_list(Some(method.parameters.as_slice())));
                }
            }
        }

        if let Some(location) = location {
            line.push_text(" ");
            line.push_marker(Marker::FilePathStart);
            line.push_text(format!("(at {location})"));
            line.push_marker(Marker::FilePathEnd);
        }

        line
    }

    /// `(…)` for `parameters`; `(?)` when they are unknown.
    fn parameter_list(&self, parameters: Option<&[ResolvedParameter]>) -> String
    {
        let Some(parameters) = parameters else {
            return format!("({PLACEHOLDER})");
        };

        let mut out = String::from("(");
        for (index, parameter) in parameters.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            if self.full_params {
                write_full_parameter(&mut out, parameter);
            } else {
                out.push(compact_letter(parameter, index));
            }
        }
        out.push(')');
        out
    }
}

/// `async Ret`, `async`, `Ret`, or nothing.
fn return_region(method: &ResolvedMethod) -> Option<String>
{
    let return_type = match method.kind {
        MethodKind::Method => method.return_parameter.as_ref().map(parameter_type_text),
        MethodKind::Constructor | MethodKind::StaticConstructor => None,
    };

    match (method.is_async, return_type) {
        (true, Some(ty)) => Some(format!("async {ty}")),
        (true, None) => Some("async".to_string()),
        (false, Some(ty)) => Some(ty),
        (false, None) => None,
    }
}

/// First letter of the parameter name, else the positional letter (`0` → `a`).
fn compact_letter(parameter: &ResolvedParameter, index: usize) -> char
{
    parameter
        .name
        .as_deref()
        .and_then(|name| name.chars().next())
        .unwrap_or_else(|| positional_letter(index))
}

fn positional_letter(index: usize) -> char
{
    const LETTERS: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";
    char::from(LETTERS[index % LETTERS.len()])
}

fn write_full_parameter(out: &mut String, parameter: &ResolvedParameter)
{
    if let Some(prefix) = &parameter.prefix {
        let _ = write!(out, "{prefix} ");
    }
    out.push_str(&parameter_type_text(parameter));
    if let Some(name) = &parameter.name {
        let _ = write!(out, " {name}");
    }
}

/// Type text of a parameter, with tuple element names spliced in.
fn parameter_type_text(parameter: &ResolvedParameter) -> String
{
    let Some(tuple) = &parameter.tuple else {
        return fragment(Some(parameter.type_display_name.as_str()), "parameter type").to_string();
    };

    let mut elements = String::from("(");
    for (index, element_type) in tuple.element_types.iter().enumerate() {
        if index > 0 {
            elements.push_str(", ");
        }
        elements.push_str(fragment(Some(element_type.as_str()), "tuple element type"));
        if let Some(Some(name)) = tuple.element_names.get(index) {
            let _ = write!(elements, " {name}");
        }
    }
    elements.push(')');

    match &tuple.wrapper {
        Some(wrapper) => format!("{wrapper}<{elements}>"),
        None => elements,
    }
}

/// `text`, or the placeholder when it is missing or empty.
fn fragment<'a>(text: Option<&'a str>, what: &str) -> &'a str
{
    match text.filter(|text| !text.is_empty()) {
        Some(text) => text,
        None => {
            debug!(error = %DemystError::Formatting(format!("missing {what}")), "placeholder substituted");
            PLACEHOLDER
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::Arc;

    use super::*;
    use crate::types::{ParameterList, TupleShape};

    fn param(name: Option<&str>, ty: &str) -> ResolvedParameter
    {
        ResolvedParameter {
            name: name.map(str::to_string),
            type_display_name: ty.to_string(),
            prefix: None,
            tuple: None,
        }
    }

    fn method(name: &str, parameters: Vec<ResolvedParameter>) -> ResolvedMethod
    {
        ResolvedMethod {
            declaring_type_name: Some("MyClass".to_string()),
            name: name.to_string(),
            parameters: parameters.into_iter().collect(),
            ..ResolvedMethod::default()
        }
    }

    fn compact() -> Formatter
    {
        Formatter::new(&TraceOptions::default())
    }

    fn full() -> Formatter
    {
        Formatter::new(&TraceOptions::default().with_full_params(true))
    }

    #[test]
    fn test_compact_letters()
    {
        let m = method("Run", vec![param(None, "int"), param(Some("bar"), "string"), param(None, "bool")]);
        assert_eq!(compact().render_method(&m, None).to_plain(), "MyClass.Run(a, b, c)");
    }

    #[test]
    fn test_full_parameters_with_prefix()
    {
        let mut value = param(Some("value"), "int");
        value.prefix = Some("out".to_string());
        let m = method("TryGet", vec![param(Some("key"), "string"), value]);
        assert_eq!(full().render_method(&m, None).to_plain(), "MyClass.TryGet(string key, out int value)");
    }

    #[test]
    fn test_tuple_parameter_rendering()
    {
        let mut pair = param(Some("pair"), "(int, string)");
        pair.tuple = Some(TupleShape {
            wrapper: None,
            element_types: vec!["int".to_string(), "string".to_string()],
            element_names: vec![Some("x".to_string()), None],
        });
        let m = method("Take", vec![pair]);
        assert_eq!(full().render_method(&m, None).to_plain(), "MyClass.Take((int x, string) pair)");
    }

    #[test]
    fn test_wrapped_tuple_parameter_rendering()
    {
        let mut rows = param(Some("rows"), "IEnumerable<(int, string)>");
        rows.tuple = Some(TupleShape {
            wrapper: Some("IEnumerable".to_string()),
            element_types: vec!["int".to_string(), "string".to_string()],
            element_names: vec![Some("id".to_string()), None],
        });
        let m = method("Load", vec![rows]);
        assert_eq!(full().render_method(&m, None).to_plain(), "MyClass.Load(IEnumerable<(int id, string)> rows)");
        assert_eq!(compact().render_method(&m, None).to_plain(), "MyClass.Load(r)");
    }

    #[test]
    fn test_decorated_regions()
    {
        let mut m = method("Run", Vec::new());
        m.return_parameter = Some(param(None, "int"));
        let location = SourceLocation {
            file: "/src/a.cs".to_string(),
            line: Some(3),
        };

        let decorated = compact().render_method(&m, Some(&location)).to_decorated();
        assert_eq!(
            decorated,
            "\u{E000}int\u{E001} MyClass.\u{E002}Run\u{E003}() \u{E004}(at /src/a.cs:3)\u{E005}"
        );
    }

    #[test]
    fn test_lambda_suffix_and_ordinal()
    {
        let mut m = method("Start", Vec::new());
        m.is_async = true;
        m.is_lambda = true;
        m.ordinal = Some(2);
        m.return_parameter = Some(param(None, "void"));
        m.sub_method_name = Some("<Start>b__0_2".to_string());
        m.sub_method_parameters = Some(ParameterList::from_vec(vec![param(Some("x"), "int")]));

        let line = compact().render_method(&m, None);
        assert_eq!(line.to_plain(), "async void MyClass.Start()+<Start>b__0_2(x)=>{…} [2]");
        assert!(line.to_decorated().contains("\u{E002}Start()+<Start>b__0_2(x)=>{…}\u{E003} [2]"));

        m.sub_method_parameters = None;
        assert!(compact().render_method(&m, None).to_plain().contains("<Start>b__0_2(?)=>{…}"));
    }

    #[test]
    fn test_constructors_and_placeholders()
    {
        let mut ctor = method(".ctor", vec![param(Some("size"), "int")]);
        ctor.kind = MethodKind::Constructor;
        assert_eq!(compact().render_method(&ctor, None).to_plain(), "new MyClass(s)");

        let mut cctor = method(".cctor", Vec::new());
        cctor.kind = MethodKind::StaticConstructor;
        assert_eq!(compact().render_method(&cctor, None).to_plain(), "static MyClass()");

        let nameless = ResolvedMethod::default();
        assert_eq!(compact().render_method(&nameless, None).to_plain(), "?()");
    }

    #[test]
    fn test_markup_disabled_and_unresolved()
    {
        let formatter = Formatter::new(&TraceOptions::default().with_markup(false));
        let frame = ResolvedFrame::Resolved {
            method: Arc::new(method("Run", Vec::new())),
            location: Some(SourceLocation::from_file("a.cs")),
        };
        let text = formatter.format_decorated(&frame);
        assert_eq!(text, "MyClass.Run() (at a.cs)");
        assert!(!text.chars().any(is_sentinel));

        let raw = ResolvedFrame::Unresolved("at native_frame_0x1234".to_string());
        assert_eq!(formatter.format_plain(&raw), "at native_frame_0x1234");
    }

    #[test]
    fn test_raw_text_cannot_inject_markers()
    {
        let raw = ResolvedFrame::Unresolved("at weird\u{E003}name\u{E004}".to_string());
        assert_eq!(compact().format_decorated(&raw), "at weirdname");
        assert_eq!(compact().format_plain(&raw), "at weirdname");
    }
}
