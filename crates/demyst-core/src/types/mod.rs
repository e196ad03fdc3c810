//! # Types
//!
//! Runtime-agnostic types shared by every stage of the pipeline.
//!
//! Metadata comes in through [`MethodIdentity`] and [`TypeRef`], frames are
//! supplied as [`RawFrame`]s, and resolution produces [`ResolvedFrame`]s
//! carrying [`ResolvedMethod`]s.

pub mod frame;
pub mod method;
pub mod resolved;
pub mod typeref;

// Re-export all public types
pub use frame::{RawFrame, ResolvedFrame, SourceLocation};
pub use method::{MethodId, MethodIdentity, ParameterInfo, ParameterModifier, StateMachineKind, Synthesis};
pub use resolved::{MethodKind, ParameterList, ResolvedMethod, ResolvedParameter, TupleShape};
pub use typeref::{TypeRef, TypeShape};
