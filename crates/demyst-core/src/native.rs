//! Native frame text.
//!
//! Frames without method metadata (runtime internals, native libraries) reach
//! the core as raw text. When the frame source only has a linkage symbol, this
//! module turns it into that text, demangling Rust symbols on the way.
//!
//! ## Language Detection
//!
//! - Rust symbols: accepted by `rustc_demangle`, or unmangled paths with `::`
//! - C++ symbols: other `_Z` names (Itanium mangling, including `_ZN` nested names)
//! - C symbols: everything else

use std::fmt;

use rustc_demangle::try_demangle;

/// Programming language associated with a native symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLanguage
{
    /// Rust symbol (detected via mangling or namespace patterns).
    Rust,
    /// C++ symbol (Itanium mangling without Rust extensions).
    Cpp,
    /// Unknown, C, or unmangled global.
    Unknown,
}

impl fmt::Display for SymbolLanguage
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            SymbolLanguage::Rust => "rust",
            SymbolLanguage::Cpp => "c++",
            SymbolLanguage::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Guess the language of a raw symbol.
///
/// A `_ZN` prefix is shared by Rust legacy mangling and C++ nested names, so
/// mangled symbols count as Rust only when they actually demangle.
pub fn detect_language(raw: &str) -> SymbolLanguage
{
    if try_demangle(raw).is_ok() || (!raw.starts_with("_Z") && raw.contains("::")) {
        SymbolLanguage::Rust
    } else if raw.starts_with("_Z") {
        SymbolLanguage::Cpp
    } else {
        SymbolLanguage::Unknown
    }
}

/// Demangle a Rust symbol, dropping the trailing hash.
///
/// Returns `None` for symbols `rustc_demangle` does not recognise, which
/// includes plain C++ symbols.
pub fn demangle_symbol(raw: &str) -> Option<String>
{
    try_demangle(raw).ok().map(|demangled| format!("{demangled:#}"))
}

/// Render a native symbol as raw frame text (`at core::panicking::panic [0x1234]`).
pub fn native_frame_text(symbol: &str, address: Option<u64>) -> String
{
    let name = demangle_symbol(symbol).unwrap_or_else(|| symbol.to_string());

    match address {
        Some(address) => format!("at {name} [0x{address:x}]"),
        None => format!("at {name}"),
    }
}
