//! Source-level type names.
//!
//! Metadata spells types the way the runtime sees them (`System.Int32`,
//! `Nullable<T>`, `ValueTuple<T1, T2>`, nested `Outer+Inner`). Traces read
//! better with the names a programmer wrote, so this module renders keyword
//! aliases, `T?`, `(T1, T2)` and dotted nesting.

use std::fmt::Write as _;

use crate::types::{TypeRef, TypeShape};

/// Keyword aliases for `System` primitive types.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("Void", "void"),
    ("Boolean", "bool"),
    ("Byte", "byte"),
    ("SByte", "sbyte"),
    ("Char", "char"),
    ("Decimal", "decimal"),
    ("Double", "double"),
    ("Single", "float"),
    ("Int16", "short"),
    ("Int32", "int"),
    ("Int64", "long"),
    ("UInt16", "ushort"),
    ("UInt32", "uint"),
    ("UInt64", "ulong"),
    ("Object", "object"),
    ("String", "string"),
];

fn builtin_alias(ty: &TypeRef) -> Option<&'static str>
{
    if ty.namespace.as_deref() != Some("System") || ty.enclosing.is_some() {
        return None;
    }
    let name = ty.simple_name();
    BUILTIN_ALIASES
        .iter()
        .find_map(|(runtime, alias)| (*runtime == name).then_some(*alias))
}

/// Render `ty` for display.
///
/// With `full_name`, named types are prefixed with their enclosing types and
/// namespace (`System.Collections.Generic.List<int>`); otherwise only the
/// enclosing types are kept (`Outer.Inner`). Keyword aliases never carry a
/// namespace.
pub fn type_display_name(ty: &TypeRef, full_name: bool) -> String
{
    let mut out = String::new();
    write_type(&mut out, ty, full_name);
    out
}

/// Render `ty` without its generic argument list (`IEnumerable` for `IEnumerable<(int, string)>`).
pub fn generic_type_name(ty: &TypeRef, full_name: bool) -> String
{
    let mut out = String::new();
    write_qualifier(&mut out, ty, full_name);
    out.push_str(ty.simple_name());
    out
}

/// Render a list of types as `<A, B>`; `None` for an empty list.
pub fn generic_argument_list<'a, I>(arguments: I) -> Option<String>
where
    I: IntoIterator<Item = &'a TypeRef>,
{
    let mut out = String::from("<");
    let mut first = true;
    for argument in arguments {
        if !first {
            out.push_str(", ");
        }
        first = false;
        write_type(&mut out, argument, false);
    }
    if first {
        return None;
    }
    out.push('>');
    Some(out)
}

fn write_type(out: &mut String, ty: &TypeRef, full_name: bool)
{
    match &ty.shape {
        TypeShape::GenericParameter => out.push_str(ty.simple_name()),
        TypeShape::ByRef { element } => write_type(out, element, full_name),
        TypeShape::Pointer { element } => {
            write_type(out, element, full_name);
            out.push('*');
        }
        TypeShape::Array { element, rank } => {
            write_type(out, element, full_name);
            out.push('[');
            for _ in 1..*rank {
                out.push(',');
            }
            out.push(']');
        }
        TypeShape::Named => write_named(out, ty, full_name),
    }
}

fn write_named(out: &mut String, ty: &TypeRef, full_name: bool)
{
    if let Some(alias) = builtin_alias(ty) {
        out.push_str(alias);
        return;
    }

    if ty.is_nullable() {
        write_type(out, &ty.generic_arguments[0], false);
        out.push('?');
        return;
    }

    if ty.is_value_tuple() {
        out.push('(');
        for (index, element) in ty.generic_arguments.iter().enumerate() {
            if index > 0 {
                out.push_str(", ");
            }
            write_type(out, element, false);
        }
        out.push(')');
        return;
    }

    write_qualifier(out, ty, full_name);
    out.push_str(ty.simple_name());
    if let Some(arguments) = generic_argument_list(&ty.generic_arguments) {
        out.push_str(&arguments);
    }
}

fn write_qualifier(out: &mut String, ty: &TypeRef, full_name: bool)
{
    if let Some(outer) = ty.enclosing.as_deref() {
        write_type(out, outer, full_name);
        out.push('.');
    } else if full_name {
        if let Some(namespace) = ty.namespace.as_deref().filter(|ns| !ns.is_empty()) {
            let _ = write!(out, "{namespace}.");
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn system(name: &str) -> TypeRef
    {
        TypeRef::qualified("System", name)
    }

    #[test]
    fn test_builtin_aliases()
    {
        assert_eq!(type_display_name(&system("Int32"), true), "int");
        assert_eq!(type_display_name(&system("String"), false), "string");
        assert_eq!(type_display_name(&system("Guid"), true), "System.Guid");
        assert_eq!(type_display_name(&system("Guid"), false), "Guid");
    }

    #[test]
    fn test_generic_and_nested_types()
    {
        let list = TypeRef::qualified("System.Collections.Generic", "List`1").with_generic_arguments(vec![system("Int32")]);
        assert_eq!(type_display_name(&list, false), "List<int>");
        assert_eq!(type_display_name(&list, true), "System.Collections.Generic.List<int>");

        let inner = TypeRef::named("Inner").nested_in(TypeRef::qualified("App", "Outer"));
        assert_eq!(type_display_name(&inner, true), "App.Outer.Inner");
        assert_eq!(type_display_name(&inner, false), "Outer.Inner");
    }

    #[test]
    fn test_nullable_tuple_array_pointer()
    {
        let nullable = system("Nullable").with_generic_arguments(vec![system("Int32")]);
        assert_eq!(type_display_name(&nullable, true), "int?");

        let tuple = TypeRef::value_tuple(vec![system("Int32"), system("String")]);
        assert_eq!(type_display_name(&tuple, true), "(int, string)");

        let matrix = TypeRef::array_of(system("Double"), 2);
        assert_eq!(type_display_name(&matrix, false), "double[,]");

        let pointer = TypeRef::pointer_to(system("Byte"));
        assert_eq!(type_display_name(&pointer, false), "byte*");

        let by_ref = TypeRef::by_ref(TypeRef::generic_parameter("T"));
        assert_eq!(type_display_name(&by_ref, false), "T");
    }

    #[test]
    fn test_generic_argument_list()
    {
        let none: [TypeRef; 0] = [];
        assert_eq!(generic_argument_list(&none), None);
        let args = [system("Int32"), TypeRef::generic_parameter("TValue")];
        assert_eq!(generic_argument_list(&args).as_deref(), Some("<int, TValue>"));
    }
}
