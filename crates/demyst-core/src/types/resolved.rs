//! Resolved (demystified) method structure.

use smallvec::SmallVec;

/// Parameter list storage; most methods take a handful of parameters.
pub type ParameterList = SmallVec<[ResolvedParameter; 4]>;

/// Element types and source names of a value tuple parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleShape
{
    /// Display name of the generic type wrapping the tuple (`IEnumerable`), if unwrapped.
    pub wrapper: Option<String>,
    /// Display names of the element types.
    pub element_types: Vec<String>,
    /// Source names, aligned with `element_types`.
    pub element_names: Vec<Option<String>>,
}

/// A parameter or return value ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter
{
    /// Source name, if symbol metadata provided one.
    pub name: Option<String>,
    /// Short type name with generics rendered (`List<int>`, `(int, string)`).
    pub type_display_name: String,
    /// Passing keyword (`ref`, `out`, `in`, `params`).
    pub prefix: Option<String>,
    /// Present only for value tuple parameters with element names.
    pub tuple: Option<TupleShape>,
}

impl ResolvedParameter
{
    /// Tuple element names, if this is a tuple parameter.
    pub fn tuple_element_names(&self) -> Option<&[Option<String>]>
    {
        self.tuple.as_ref().map(|shape| shape.element_names.as_slice())
    }
}

/// What sort of member the host method is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MethodKind
{
    /// Ordinary method.
    #[default]
    Method,
    /// Instance constructor (`.ctor`).
    Constructor,
    /// Type initializer (`.cctor`).
    StaticConstructor,
}

/// Structured, demystified view of one frame's method.
///
/// `name` is always the host method as written in source. When the frame
/// executes a lambda or local function, `sub_method_name` names it and the
/// renderer appends it after the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedMethod
{
    /// Source declaring type, compiler-generated types already stripped.
    pub declaring_type_name: Option<String>,
    /// Host method name.
    pub name: String,
    /// Rendered generic arguments including brackets (`<int, T>`).
    pub generic_argument_display: Option<String>,
    /// Return value.
    pub return_parameter: Option<ResolvedParameter>,
    /// Host method parameters.
    pub parameters: ParameterList,
    /// The frame runs inside an async state machine.
    pub is_async: bool,
    /// The frame runs a lambda or local function body.
    pub is_lambda: bool,
    /// Lambda ordinal inside the host method.
    pub ordinal: Option<u32>,
    /// Lambda or local function name.
    pub sub_method_name: Option<String>,
    /// Lambda parameters; `None` when metadata for the lambda itself is unknown.
    pub sub_method_parameters: Option<ParameterList>,
    /// Constructor classification.
    pub kind: MethodKind,
}

impl ResolvedMethod
{
    /// Whether a lambda/local function suffix will be rendered.
    pub fn has_sub_method(&self) -> bool
    {
        self.is_lambda || self.sub_method_name.as_deref().is_some_and(|name| !name.is_empty())
    }
}
