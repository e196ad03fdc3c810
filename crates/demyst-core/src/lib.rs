//! # demyst-core
//!
//! Readable stack traces for compiler-generated code.
//!
//! Async methods, iterators, lambdas and local functions run inside methods
//! the compiler synthesizes (`MoveNext` on `<Start>d__5`, `<Start>b__0_2` on
//! `<>c`). This crate maps such frames back to the methods a programmer wrote
//! and renders them as trace lines:
//!
//! ```text
//! async void MyClass.Start()+<Start>b__0_2(x)=>{…} [2] (at /src/my.cs:18)
//! ```
//!
//! ## Pipeline
//!
//! 1. [`resolve::FrameResolver`] turns [`types::RawFrame`]s into
//!    [`types::ResolvedFrame`]s, memoized in a [`cache::ResolutionCache`]
//! 2. [`format::Formatter`] renders each frame with region sentinels
//! 3. [`postprocess::PostProcessor`] turns sentinels into markup
//! 4. [`trace::TraceAggregator`] drives the above for frame lists and
//!    exception chains
//!
//! Metadata enters through the [`types::MethodIdentity`] trait; the
//! [`metadata`] module implements it for JSON records.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use demyst_core::prelude::*;
//!
//! let method = MethodRecord::new(1, "DoWork")
//!     .declared_by(TypeRef::named("MyClass"))
//!     .parameter(ParameterInfo::new("count", TypeRef::qualified("System", "Int32")));
//! let frame = RawFrame::new(Arc::new(method)).with_location("/src/my.cs", Some(42));
//!
//! let aggregator = TraceAggregator::new(TraceOptions::default().with_markup(false));
//! assert_eq!(aggregator.document(&[frame]).plain_text(), "MyClass.DoWork(c) (at /src/my.cs:42)");
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod metadata;
pub mod native;
pub mod postprocess;
pub mod prelude;
pub mod resolve;
pub mod trace;
pub mod types;

// Re-export commonly used types
pub use config::TraceOptions;
pub use error::{DemystError, DemystResult};
pub use trace::{ExceptionLike, FormattedException, StackTraceDocument, TraceAggregator};
