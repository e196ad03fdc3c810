//! # Frame Resolution
//!
//! Turns raw frames into [`ResolvedFrame`]s.
//!
//! The resolver asks the [`NameDemystifier`] which method a frame really
//! belongs to, reads return type, parameters and generic arguments from the
//! metadata, and memoizes the result in a shared [`ResolutionCache`].
//!
//! ## Degradation
//!
//! A frame whose metadata cannot be read never fails the trace. It becomes
//! [`ResolvedFrame::Unresolved`] carrying the runtime's own text.

pub mod demangle;
pub mod typename;

use std::sync::Arc;

use tracing::debug;

pub use self::demangle::{ClosureInfo, Demystification, GeneratedName, GeneratedNameKind, NameDemystifier};
use self::typename::{generic_argument_list, generic_type_name, type_display_name};
use crate::cache::ResolutionCache;
use crate::config::TraceOptions;
use crate::error::DemystResult;
use crate::types::{
    MethodIdentity,
    MethodKind,
    ParameterInfo,
    ParameterList,
    RawFrame,
    ResolvedFrame,
    ResolvedMethod,
    ResolvedParameter,
    StateMachineKind,
    TupleShape,
    TypeRef,
    TypeShape,
};

/// Resolves raw frames, optionally through a shared cache.
#[derive(Debug, Clone)]
pub struct FrameResolver
{
    demystifier: NameDemystifier,
    cache: Option<Arc<ResolutionCache<ResolvedMethod>>>,
}

impl Default for FrameResolver
{
    fn default() -> Self
    {
        Self::new(&TraceOptions::default())
    }
}

impl FrameResolver
{
    /// Create a resolver with a private cache sized by `options`
    /// (no cache when `options.cache_disabled`).
    pub fn new(options: &TraceOptions) -> Self
    {
        let cache = (!options.cache_disabled).then(|| Arc::new(ResolutionCache::new(options.cache_capacity)));
        Self {
            demystifier: NameDemystifier::new(),
            cache,
        }
    }

    /// Create a resolver sharing `cache` with other resolvers.
    pub fn with_cache(cache: Arc<ResolutionCache<ResolvedMethod>>) -> Self
    {
        Self {
            demystifier: NameDemystifier::new(),
            cache: Some(cache),
        }
    }

    /// Create a resolver that recomputes every frame.
    pub fn without_cache() -> Self
    {
        Self {
            demystifier: NameDemystifier::new(),
            cache: None,
        }
    }

    /// The cache in use, if any.
    pub fn cache(&self) -> Option<&Arc<ResolutionCache<ResolvedMethod>>>
    {
        self.cache.as_ref()
    }

    /// Resolve one frame. Never fails.
    pub fn resolve(&self, frame: &RawFrame) -> ResolvedFrame
    {
        let method = match &frame.method {
            Some(method) if !frame.unresolved => method,
            _ => return ResolvedFrame::Unresolved(frame.raw_text.clone()),
        };

        match self.resolve_method(method) {
            Ok(resolved) => ResolvedFrame::Resolved {
                method: resolved,
                location: frame.location(),
            },
            Err(err) => {
                debug!(method = %method.id(), error = %err, "frame left unresolved");
                ResolvedFrame::Unresolved(frame.raw_text.clone())
            }
        }
    }

    /// Resolve many frames, preserving order.
    pub fn resolve_all(&self, frames: &[RawFrame]) -> Vec<ResolvedFrame>
    {
        frames.iter().map(|frame| self.resolve(frame)).collect()
    }

    /// Resolve a method identity, consulting the cache first.
    ///
    /// ## Errors
    ///
    /// Propagates [`DemystError::Resolution`](crate::error::DemystError::Resolution)
    /// from the metadata provider. Failures are not cached.
    pub fn resolve_method(&self, method: &Arc<dyn MethodIdentity>) -> DemystResult<Arc<ResolvedMethod>>
    {
        match &self.cache {
            Some(cache) => cache.get_or_try_compute(method.id(), |_| self.build(method).map(Arc::new)),
            None => self.build(method).map(Arc::new),
        }
    }

    fn build(&self, method: &Arc<dyn MethodIdentity>) -> DemystResult<ResolvedMethod>
    {
        let plan = self.demystifier.demystify(method);
        let runtime_type = method.declaring_type();

        let mut resolved = ResolvedMethod {
            declaring_type_name: plan.declaring_type.as_ref().map(|ty| type_display_name(ty, true)),
            name: plan.name.clone(),
            is_async: plan.state_machine == Some(StateMachineKind::Async),
            ..ResolvedMethod::default()
        };

        if let Some(target) = &plan.target {
            resolved.return_parameter = target.return_parameter().map(|info| resolve_parameter(&info));
        }

        match plan.closure {
            Some(closure) => {
                resolved.is_lambda = true;
                resolved.ordinal = closure.ordinal;
                resolved.sub_method_name = Some(closure.sub_method_name);
                resolved.sub_method_parameters = match &plan.target {
                    Some(target) => Some(resolve_parameters(target.as_ref())?),
                    None => None,
                };

                if let Some(host) = &closure.host {
                    resolved.parameters = resolve_parameters(host.as_ref()).unwrap_or_else(|err| {
                        debug!(method = %host.id(), error = %err, "host parameters unavailable");
                        ParameterList::new()
                    });
                }

                let generic_source = closure.host.as_ref().or(plan.target.as_ref());
                resolved.generic_argument_display =
                    generic_source.and_then(|source| generic_display(source.generic_arguments(), runtime_type));
            }
            None => {
                resolved.kind = method_kind(&plan.name);
                if let Some(target) = &plan.target {
                    resolved.parameters = resolve_parameters(target.as_ref())?;
                    resolved.generic_argument_display = generic_display(target.generic_arguments(), runtime_type);
                }
            }
        }

        Ok(resolved)
    }
}

fn method_kind(name: &str) -> MethodKind
{
    match name {
        ".ctor" => MethodKind::Constructor,
        ".cctor" => MethodKind::StaticConstructor,
        _ => MethodKind::Method,
    }
}

fn resolve_parameters(method: &dyn MethodIdentity) -> DemystResult<ParameterList>
{
    Ok(method.parameters()?.iter().map(resolve_parameter).collect())
}

/// Resolve one parameter (or return value) for display.
///
/// By-reference types without an explicit modifier get the `ref` prefix.
/// Tuple element names are recorded when the type is a value tuple, or wraps
/// one as its single generic argument.
pub fn resolve_parameter(info: &ParameterInfo) -> ResolvedParameter
{
    let (ty, implicit_ref) = match &info.ty.shape {
        TypeShape::ByRef { element } => (element.as_ref(), true),
        _ => (&info.ty, false),
    };

    let prefix = info
        .modifier
        .keyword()
        .or(implicit_ref.then_some("ref"))
        .map(str::to_string);

    ResolvedParameter {
        name: info.name.clone().filter(|name| !name.is_empty()),
        type_display_name: type_display_name(ty, false),
        prefix,
        tuple: info
            .tuple_element_names
            .as_deref()
            .and_then(|names| tuple_shape(ty, names)),
    }
}

fn tuple_shape(ty: &TypeRef, names: &[Option<String>]) -> Option<TupleShape>
{
    let (wrapper, tuple) = if ty.is_value_tuple() {
        (None, ty)
    } else {
        match ty.generic_arguments.as_slice() {
            [inner] if inner.is_value_tuple() => (Some(generic_type_name(ty, false)), inner),
            _ => return None,
        }
    };

    let element_types: Vec<String> = tuple
        .generic_arguments
        .iter()
        .map(|element| type_display_name(element, false))
        .collect();
    let element_names = (0..element_types.len())
        .map(|index| names.get(index).cloned().flatten().filter(|name| !name.is_empty()))
        .collect();

    Some(TupleShape {
        wrapper,
        element_types,
        element_names,
    })
}

/// Render generic arguments, substituting open parameters from the
/// instantiation of a compiler-generated runtime type.
///
/// Generated types repeat the method's generic parameters at the end of
/// their own argument list, so the trailing `arguments.len()` entries line up.
fn generic_display(arguments: &[TypeRef], runtime_type: Option<&TypeRef>) -> Option<String>
{
    if arguments.is_empty() {
        return None;
    }

    let substitutions = runtime_type
        .filter(|ty| ty.is_compiler_generated())
        .map(|ty| ty.generic_arguments.as_slice())
        .filter(|instantiated| instantiated.len() >= arguments.len())
        .map(|instantiated| &instantiated[instantiated.len() - arguments.len()..]);

    let chosen: Vec<&TypeRef> = arguments
        .iter()
        .enumerate()
        .map(|(index, argument)| match substitutions {
            Some(instantiated) if argument.is_generic_parameter() && !instantiated[index].is_generic_parameter() => {
                &instantiated[index]
            }
            _ => argument,
        })
        .collect();

    generic_argument_list(chosen)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::metadata::{MethodRecord, SynthesisRecord};
    use crate::types::ParameterModifier;

    fn system(name: &str) -> TypeRef
    {
        TypeRef::qualified("System", name)
    }

    fn arc(record: MethodRecord) -> Arc<dyn MethodIdentity>
    {
        Arc::new(record)
    }

    #[test]
    fn test_resolve_plain_method()
    {
        let method = arc(MethodRecord::new(1, "DoWork")
            .declared_by(TypeRef::qualified("App", "Worker"))
            .returns(system("Int32"))
            .parameter(ParameterInfo::new("count", system("Int32")))
            .parameter(ParameterInfo::new("label", system("String")).with_modifier(ParameterModifier::Out)));

        let resolved = FrameResolver::without_cache().resolve_method(&method).unwrap();
        assert_eq!(resolved.declaring_type_name.as_deref(), Some("App.Worker"));
        assert_eq!(resolved.name, "DoWork");
        assert_eq!(resolved.return_parameter.as_ref().unwrap().type_display_name, "int");
        assert_eq!(resolved.parameters.len(), 2);
        assert_eq!(resolved.parameters[1].prefix.as_deref(), Some("out"));
        assert!(!resolved.is_async);
        assert!(!resolved.is_lambda);
    }

    #[test]
    fn test_resolve_async_lambda()
    {
        let display_class = TypeRef::named("<>c__DisplayClass0_0").nested_in(TypeRef::named("MyClass"));
        let host = arc(MethodRecord::new(10, "Start").declared_by(TypeRef::named("MyClass")));
        let lambda = arc(MethodRecord::new(11, "<Start>b__0_2")
            .declared_by(display_class.clone())
            .returns(system("Void"))
            .parameter(ParameterInfo::new("x", system("Int32")))
            .with_synthesis(SynthesisRecord::closure(Some(10)))
            .linked_to(host));
        let machine = arc(MethodRecord::new(12, "MoveNext")
            .declared_by(TypeRef::named("<<Start>b__0_2>d").nested_in(display_class))
            .with_synthesis(SynthesisRecord::async_state_machine(Some(11)))
            .linked_to(lambda));

        let resolved = FrameResolver::without_cache().resolve_method(&machine).unwrap();
        assert!(resolved.is_async);
        assert!(resolved.is_lambda);
        assert_eq!(resolved.name, "Start");
        assert_eq!(resolved.declaring_type_name.as_deref(), Some("MyClass"));
        assert_eq!(resolved.sub_method_name.as_deref(), Some("<Start>b__0_2"));
        assert_eq!(resolved.ordinal, Some(2));
        assert_eq!(resolved.sub_method_parameters.as_ref().map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_stripped_metadata_degrades_frame()
    {
        let method = arc(MethodRecord::new(5, "Broken").stripped());
        let frame = RawFrame::new(method).with_raw_text("at Broken (raw)");

        let resolved = FrameResolver::without_cache().resolve(&frame);
        assert_eq!(resolved, ResolvedFrame::Unresolved("at Broken (raw)".to_string()));
    }

    #[test]
    fn test_constructor_kinds()
    {
        let ctor = arc(MethodRecord::new(1, ".ctor").declared_by(TypeRef::named("Widget")));
        let cctor = arc(MethodRecord::new(2, ".cctor").declared_by(TypeRef::named("Widget")));
        let resolver = FrameResolver::without_cache();

        assert_eq!(resolver.resolve_method(&ctor).unwrap().kind, MethodKind::Constructor);
        assert_eq!(resolver.resolve_method(&cctor).unwrap().kind, MethodKind::StaticConstructor);
    }

    #[test]
    fn test_tuple_parameter_names()
    {
        let tuple = TypeRef::value_tuple(vec![system("Int32"), system("String")]);
        let named = resolve_parameter(&ParameterInfo::new("pair", tuple.clone()).with_tuple_names([Some("x"), Some("y")]));
        let shape = named.tuple.unwrap();
        assert_eq!(shape.wrapper, None);
        assert_eq!(shape.element_names, vec![Some("x".to_string()), Some("y".to_string())]);

        let partial = resolve_parameter(&ParameterInfo::new("pair", tuple.clone()).with_tuple_names([Some("x")]));
        assert_eq!(partial.tuple_element_names(), Some(&[Some("x".to_string()), None][..]));

        let wrapped = TypeRef::qualified("System.Collections.Generic", "IEnumerable`1").with_generic_arguments(vec![tuple]);
        let unwrapped = resolve_parameter(&ParameterInfo::new("items", wrapped).with_tuple_names([Some("id"), None::<&str>]));
        assert_eq!(unwrapped.tuple.unwrap().wrapper.as_deref(), Some("IEnumerable"));
    }

    #[test]
    fn test_by_ref_gets_implicit_prefix()
    {
        let param = resolve_parameter(&ParameterInfo::new("value", TypeRef::by_ref(system("Int32"))));
        assert_eq!(param.prefix.as_deref(), Some("ref"));
        assert_eq!(param.type_display_name, "int");
    }

    #[test]
    fn test_generic_substitution_from_runtime_type()
    {
        let args = [TypeRef::generic_parameter("T")];
        let machine = TypeRef::named("<Run>d__3`1").with_generic_arguments(vec![system("String")]);
        assert_eq!(generic_display(&args, Some(&machine)).as_deref(), Some("<string>"));
        assert_eq!(generic_display(&args, None).as_deref(), Some("<T>"));
        assert_eq!(generic_display(&[], Some(&machine)), None);
    }
}
