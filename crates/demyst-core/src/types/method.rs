//! Method identity capability.
//!
//! The core never inspects a runtime directly. Everything it knows about a
//! method comes through [`MethodIdentity`], so the same resolution logic works
//! on top of native reflection, parsed debug information, or the JSON records
//! in [`crate::metadata`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::typeref::TypeRef;
use crate::error::DemystResult;

/// Stable numeric identity of a method, used as the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId(u64);

impl MethodId
{
    /// Wrap a raw identity (metadata token, handle address, ...).
    pub const fn new(value: u64) -> Self
    {
        Self(value)
    }

    /// Raw `u64` value.
    pub const fn value(self) -> u64
    {
        self.0
    }
}

impl From<u64> for MethodId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for MethodId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

/// How a parameter is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterModifier
{
    /// Passed by value.
    #[default]
    None,
    /// `ref`
    Ref,
    /// `out`
    Out,
    /// `in`
    In,
    /// `params` array
    Params,
}

impl ParameterModifier
{
    /// Source keyword, if the modifier has one.
    pub const fn keyword(self) -> Option<&'static str>
    {
        match self {
            ParameterModifier::None => None,
            ParameterModifier::Ref => Some("ref"),
            ParameterModifier::Out => Some("out"),
            ParameterModifier::In => Some("in"),
            ParameterModifier::Params => Some("params"),
        }
    }
}

/// Parameter (or return value) metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo
{
    /// Source name; absent when symbol metadata is unavailable.
    #[serde(default)]
    pub name: Option<String>,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Passing modifier.
    #[serde(default)]
    pub modifier: ParameterModifier,
    /// Source-level element names when `ty` is (or wraps) a value tuple.
    #[serde(default)]
    pub tuple_element_names: Option<Vec<Option<String>>>,
}

impl ParameterInfo
{
    /// A named parameter.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self
    {
        Self {
            name: Some(name.into()),
            ty,
            modifier: ParameterModifier::None,
            tuple_element_names: None,
        }
    }

    /// A parameter whose name is not known.
    pub fn unnamed(ty: TypeRef) -> Self
    {
        Self {
            name: None,
            ty,
            modifier: ParameterModifier::None,
            tuple_element_names: None,
        }
    }

    /// Set the passing modifier.
    #[must_use]
    pub fn with_modifier(mut self, modifier: ParameterModifier) -> Self
    {
        self.modifier = modifier;
        self
    }

    /// Attach tuple element names.
    #[must_use]
    pub fn with_tuple_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.tuple_element_names = Some(names.into_iter().map(|name| name.map(Into::into)).collect());
        self
    }
}

/// Kind of compiler-generated state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMachineKind
{
    /// `async` method.
    Async,
    /// Iterator (`yield`) method.
    Iterator,
}

/// Metadata classification of a method.
#[derive(Debug, Clone, Default)]
pub enum Synthesis
{
    /// The provider has no opinion; naming conventions decide.
    #[default]
    Unknown,
    /// The provider asserts this is an ordinary method.
    Plain,
    /// Resume method of a state machine type.
    StateMachine
    {
        /// Async or iterator.
        kind: StateMachineKind,
        /// The method the state machine was generated for, if linked.
        origin: Option<Arc<dyn MethodIdentity>>,
    },
    /// Body of a lambda or local function.
    Closure
    {
        /// The method that declared the closure, if linked.
        host: Option<Arc<dyn MethodIdentity>>,
    },
}

/// Read-only view of a method's metadata.
///
/// Implementations must be cheap to query repeatedly; the resolver calls each
/// accessor at most a few times per frame and caches the result by [`id`].
///
/// [`id`]: MethodIdentity::id
pub trait MethodIdentity: fmt::Debug + Send + Sync
{
    /// Stable identity used as the cache key.
    fn id(&self) -> MethodId;

    /// Metadata name (`DoWork`, `MoveNext`, `<Start>b__0_2`, `.ctor`).
    fn name(&self) -> &str;

    /// Type that declares the method at runtime.
    fn declaring_type(&self) -> Option<&TypeRef>;

    /// Return value metadata; `None` for constructors or when unknown.
    fn return_parameter(&self) -> Option<ParameterInfo>;

    /// Parameter metadata, in declaration order.
    ///
    /// ## Errors
    ///
    /// Returns [`DemystError::Resolution`](crate::error::DemystError::Resolution)
    /// when the metadata is incomplete (stripped or obfuscated binaries).
    fn parameters(&self) -> DemystResult<Vec<ParameterInfo>>;

    /// Generic arguments of a generic method instantiation.
    fn generic_arguments(&self) -> &[TypeRef]
    {
        &[]
    }

    /// Compiler-synthesis classification.
    fn synthesis(&self) -> Synthesis
    {
        Synthesis::Unknown
    }
}
