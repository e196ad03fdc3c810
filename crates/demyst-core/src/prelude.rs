//! Common module for library exports

pub use crate::cache::ResolutionCache;
pub use crate::config::{MarkupStyle, PathStyle, TraceOptions};
pub use crate::error::{DemystError, DemystResult};
pub use crate::format::{Formatter, Marker, SpanLine};
pub use crate::metadata::{ExceptionRecord, FrameRecord, MethodRecord, MethodTable, SynthesisRecord, TraceFile};
pub use crate::postprocess::PostProcessor;
pub use crate::resolve::{FrameResolver, NameDemystifier};
pub use crate::trace::{ExceptionLike, ExceptionTrace, FormattedException, StackTraceDocument, TraceAggregator};
pub use crate::types::{
    MethodId,
    MethodIdentity,
    ParameterInfo,
    ParameterModifier,
    RawFrame,
    ResolvedFrame,
    ResolvedMethod,
    SourceLocation,
    TypeRef,
};
