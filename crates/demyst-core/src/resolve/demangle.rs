//! Compiler-generated name recovery.
//!
//! Compilers hide async methods, iterators, lambdas and local functions behind
//! synthesized members whose names follow a fixed convention:
//!
//! | construct        | synthesized member                         |
//! |------------------|--------------------------------------------|
//! | state machine    | `MoveNext` on type `<Host>d__5`            |
//! | lambda           | `<Host>b__0_2` on `<>c` / `<>c__DisplayClass0_0` |
//! | local function   | `<Host>g__Local|0_0`                       |
//!
//! This module parses those names and combines them with the metadata's own
//! [`Synthesis`] classification. Detection runs in a fixed order: state
//! machines first, then closures, so an async lambda resolves both ways.

use std::sync::Arc;

use tracing::debug;

use crate::types::{MethodIdentity, StateMachineKind, Synthesis, TypeRef};

/// Kind letter following the closing bracket of a generated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedNameKind
{
    /// `d`: async or iterator state machine type.
    StateMachineType,
    /// `b`: lambda body.
    LambdaMethod,
    /// `g`: local function body.
    LocalFunction,
    /// `c`: closure display class.
    DisplayClass,
    /// Any other letter.
    Other(char),
}

impl GeneratedNameKind
{
    fn from_char(ch: char) -> Self
    {
        match ch {
            'd' => GeneratedNameKind::StateMachineType,
            'b' => GeneratedNameKind::LambdaMethod,
            'g' => GeneratedNameKind::LocalFunction,
            'c' => GeneratedNameKind::DisplayClass,
            other => GeneratedNameKind::Other(other),
        }
    }
}

/// A parsed `<host>k__suffix` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedName<'a>
{
    /// Text between the outer brackets; may itself be a generated name.
    pub host: &'a str,
    /// Kind letter, if any follows the brackets.
    pub kind: Option<GeneratedNameKind>,
    /// Everything after the kind letter (`__0_2`).
    pub suffix: &'a str,
}

/// Parse a compiler-generated name. Brackets nest (`<<Start>b__0_2>d__0`).
pub fn parse_generated_name(name: &str) -> Option<GeneratedName<'_>>
{
    let rest = name.strip_prefix('<')?;
    let mut depth = 1usize;
    let mut close = None;
    for (index, ch) in rest.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            _ => {}
        }
    }

    let close = close?;
    let tail = &rest[close + 1..];
    let mut chars = tail.chars();
    let kind = chars.next().map(GeneratedNameKind::from_char);
    Some(GeneratedName {
        host: &rest[..close],
        kind,
        suffix: chars.as_str(),
    })
}

/// Lambda ordinal from a `b` suffix: `__0_2` yields `2`, `__3` yields `3`.
pub fn lambda_ordinal(suffix: &str) -> Option<u32>
{
    let digits = suffix.strip_prefix("__")?;
    let digits = digits.split_once('_').map_or(digits, |(_, tail)| tail);
    digits.parse().ok()
}

/// Local function name from a `g` suffix: `__Local|0_0` yields `Local`.
pub fn local_function_name(suffix: &str) -> Option<&str>
{
    let body = suffix.strip_prefix("__")?;
    let end = body.find('|')?;
    Some(&body[..end]).filter(|name| !name.is_empty())
}

/// Lambda or local function details recovered for a frame.
#[derive(Debug, Clone)]
pub struct ClosureInfo
{
    /// Name shown after the host (`<Start>b__0_2`, or `Local` for local functions).
    pub sub_method_name: String,
    /// Lambda ordinal, when the name carries one.
    pub ordinal: Option<u32>,
    /// Host method metadata, when the provider links it.
    pub host: Option<Arc<dyn MethodIdentity>>,
}

/// Outcome of demystifying one method identity.
#[derive(Debug, Clone)]
pub struct Demystification
{
    /// Metadata describing the code the frame runs (origin of a state
    /// machine, the lambda body, or the method itself). `None` when only
    /// names could be recovered.
    pub target: Option<Arc<dyn MethodIdentity>>,
    /// Host method name as written in source.
    pub name: String,
    /// Declaring type with compiler-generated types stripped.
    pub declaring_type: Option<TypeRef>,
    /// State machine kind, when known.
    pub state_machine: Option<StateMachineKind>,
    /// Lambda/local function details.
    pub closure: Option<ClosureInfo>,
}

/// Stateless classifier for compiler-generated methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameDemystifier;

impl NameDemystifier
{
    /// Create a demystifier.
    pub const fn new() -> Self
    {
        Self
    }

    /// Recover the source-level shape of `method`.
    pub fn demystify(&self, method: &Arc<dyn MethodIdentity>) -> Demystification
    {
        let mut target = Some(Arc::clone(method));
        let mut name = method.name().to_string();
        let mut declaring = method.declaring_type().cloned();
        let mut state_machine = None;

        let synthesis = method.synthesis();
        let target_synthesis = match synthesis {
            Synthesis::StateMachine { kind, origin } => {
                state_machine = Some(kind);
                match origin {
                    Some(origin) => {
                        debug!(method = %method.id(), origin = origin.name(), "state machine linked to origin");
                        name = origin.name().to_string();
                        declaring = origin.declaring_type().cloned();
                        let origin_synthesis = origin.synthesis();
                        target = Some(origin);
                        origin_synthesis
                    }
                    None => {
                        if let Some((host, outer)) = state_machine_host(method.declaring_type()) {
                            name = host;
                            declaring = outer;
                        }
                        target = None;
                        Synthesis::Unknown
                    }
                }
            }
            Synthesis::Unknown if method.name() == "MoveNext" => match state_machine_host(method.declaring_type()) {
                Some((host, outer)) => {
                    debug!(method = %method.id(), host = %host, "state machine recognised by name");
                    name = host;
                    declaring = outer;
                    target = None;
                    Synthesis::Unknown
                }
                None => Synthesis::Unknown,
            },
            other => other,
        };

        let closure = match target_synthesis {
            Synthesis::Closure { host } => {
                let (host_name, info) = closure_from_name(&name, host.clone())
                    .unwrap_or_else(|| (host.as_ref().map_or_else(|| name.clone(), |h| h.name().to_string()), ClosureInfo {
                        sub_method_name: name.clone(),
                        ordinal: None,
                        host: host.clone(),
                    }));
                if let Some(host_type) = host.as_ref().and_then(|h| h.declaring_type()) {
                    declaring = Some(host_type.clone());
                }
                name = host_name;
                Some(info)
            }
            Synthesis::Unknown => match closure_from_name(&name, None) {
                Some((host_name, info)) => {
                    name = host_name;
                    Some(info)
                }
                None => None,
            },
            Synthesis::Plain | Synthesis::StateMachine { .. } => None,
        };

        if let Some(info) = &closure {
            debug!(
                method = %method.id(),
                host = %name,
                sub_method = %info.sub_method_name,
                ordinal = ?info.ordinal,
                "closure recognised"
            );
        }

        Demystification {
            target,
            name,
            declaring_type: declaring.and_then(|ty| ty.source_type().cloned()),
            state_machine,
            closure,
        }
    }
}

/// Host name and enclosing type of a state machine type named `<Host>d__N`.
fn state_machine_host(ty: Option<&TypeRef>) -> Option<(String, Option<TypeRef>)>
{
    let ty = ty?;
    let parsed = parse_generated_name(ty.simple_name())?;
    if parsed.kind != Some(GeneratedNameKind::StateMachineType) || parsed.host.is_empty() {
        return None;
    }
    Some((parsed.host.to_string(), ty.enclosing.as_deref().cloned()))
}

/// Host name and closure details from a `<Host>b__X_N` or `<Host>g__Name|X_N` method name.
fn closure_from_name(name: &str, host: Option<Arc<dyn MethodIdentity>>) -> Option<(String, ClosureInfo)>
{
    let parsed = parse_generated_name(name)?;
    if parsed.host.is_empty() {
        return None;
    }

    let (sub_method_name, ordinal) = match parsed.kind? {
        GeneratedNameKind::LambdaMethod => (name.to_string(), lambda_ordinal(parsed.suffix)),
        GeneratedNameKind::LocalFunction => (
            local_function_name(parsed.suffix).unwrap_or(name).to_string(),
            None,
        ),
        _ => return None,
    };

    Some((parsed.host.to_string(), ClosureInfo {
        sub_method_name,
        ordinal,
        host,
    }))
}
