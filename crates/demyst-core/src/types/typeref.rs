//! Metadata type references.

use serde::{Deserialize, Serialize};

/// Structural shape of a [`TypeRef`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeShape
{
    /// Ordinary named type, possibly a generic instantiation.
    #[default]
    Named,
    /// Open generic parameter such as `T`.
    GenericParameter,
    /// Array of `element` with the given rank.
    Array
    {
        /// Element type.
        element: Box<TypeRef>,
        /// Number of dimensions (1 for `T[]`).
        rank: u8,
    },
    /// Unmanaged pointer to `element`.
    Pointer
    {
        /// Pointee type.
        element: Box<TypeRef>,
    },
    /// Managed reference to `element` (`ref`/`out`/`in` parameters).
    ByRef
    {
        /// Referenced type.
        element: Box<TypeRef>,
    },
}

/// Reference to a type as reported by the metadata provider.
///
/// Names are stored without the generic arity suffix some runtimes append
/// (`List`1`); the display layer strips it if a provider leaves it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef
{
    /// Namespace, if any (`System.Collections.Generic`).
    #[serde(default)]
    pub namespace: Option<String>,
    /// Simple name (`List`, `<Start>d__5`).
    pub name: String,
    /// Generic arguments of this instantiation, in declaration order.
    #[serde(default)]
    pub generic_arguments: Vec<TypeRef>,
    /// Enclosing type for nested types.
    #[serde(default)]
    pub enclosing: Option<Box<TypeRef>>,
    /// Structural shape.
    #[serde(default)]
    pub shape: TypeShape,
}

impl TypeRef
{
    /// A named type without namespace.
    pub fn named(name: impl Into<String>) -> Self
    {
        Self {
            namespace: None,
            name: name.into(),
            generic_arguments: Vec::new(),
            enclosing: None,
            shape: TypeShape::Named,
        }
    }

    /// A named type inside `namespace`.
    pub fn qualified(namespace: impl Into<String>, name: impl Into<String>) -> Self
    {
        Self {
            namespace: Some(namespace.into()),
            ..Self::named(name)
        }
    }

    /// An open generic parameter (`T`).
    pub fn generic_parameter(name: impl Into<String>) -> Self
    {
        Self {
            shape: TypeShape::GenericParameter,
            ..Self::named(name)
        }
    }

    /// `element[]` (rank 1) or `element[,]` (rank 2) and so on.
    pub fn array_of(element: TypeRef, rank: u8) -> Self
    {
        Self {
            shape: TypeShape::Array {
                element: Box::new(element),
                rank: rank.max(1),
            },
            ..Self::named("")
        }
    }

    /// `element*`.
    pub fn pointer_to(element: TypeRef) -> Self
    {
        Self {
            shape: TypeShape::Pointer {
                element: Box::new(element),
            },
            ..Self::named("")
        }
    }

    /// `ref element`.
    pub fn by_ref(element: TypeRef) -> Self
    {
        Self {
            shape: TypeShape::ByRef {
                element: Box::new(element),
            },
            ..Self::named("")
        }
    }

    /// A `System.ValueTuple` over `elements`.
    pub fn value_tuple(elements: Vec<TypeRef>) -> Self
    {
        Self::qualified("System", "ValueTuple").with_generic_arguments(elements)
    }

    /// Replace the generic arguments.
    #[must_use]
    pub fn with_generic_arguments(mut self, arguments: Vec<TypeRef>) -> Self
    {
        self.generic_arguments = arguments;
        self
    }

    /// Mark this type as nested inside `outer`.
    #[must_use]
    pub fn nested_in(mut self, outer: TypeRef) -> Self
    {
        self.enclosing = Some(Box::new(outer));
        self
    }

    /// Name with the generic arity suffix removed.
    pub fn simple_name(&self) -> &str
    {
        match self.name.find('`') {
            Some(tick) => &self.name[..tick],
            None => &self.name,
        }
    }

    /// Whether the compiler synthesized this type (closure, state machine).
    pub fn is_compiler_generated(&self) -> bool
    {
        self.name.starts_with('<')
    }

    /// Whether this is an open generic parameter.
    pub fn is_generic_parameter(&self) -> bool
    {
        matches!(self.shape, TypeShape::GenericParameter)
    }

    /// Whether this is a `System.ValueTuple` instantiation.
    pub fn is_value_tuple(&self) -> bool
    {
        matches!(self.shape, TypeShape::Named)
            && self.namespace.as_deref() == Some("System")
            && self.simple_name() == "ValueTuple"
            && !self.generic_arguments.is_empty()
    }

    /// Whether this is `System.Nullable<T>`.
    pub fn is_nullable(&self) -> bool
    {
        matches!(self.shape, TypeShape::Named)
            && self.namespace.as_deref() == Some("System")
            && self.simple_name() == "Nullable"
            && self.generic_arguments.len() == 1
    }

    /// Nearest enclosing type the compiler did not generate, starting with `self`.
    ///
    /// Closures and state machines are nested inside the type that declared
    /// the original method.
    pub fn source_type(&self) -> Option<&TypeRef>
    {
        let mut current = Some(self);
        while let Some(ty) = current {
            if !ty.is_compiler_generated() {
                return Some(ty);
            }
            current = ty.enclosing.as_deref();
        }
        None
    }
}
