//! Plain-old-data classification.

use crate::{Program, Type};

/// Is this type plain old data, i.e. is its static size its entire memory footprint?
///
/// Only structs and basic types can be POD. A struct is POD iff all of its fields are;
/// a basic type is POD unless it is a string or an `unsafe.Pointer`. Named types are
/// classified by their underlying type.
pub fn is_pod(program: &Program, typ: &Type) -> bool {
    match typ {
        Type::Struct(st) => st.fields.iter().all(|field| is_pod(program, &field.typ)),
        Type::Basic(kind) => !kind.is_string() && !kind.is_unsafe_pointer(),
        Type::Named(_) => {
            let underlying = program.underlying(typ);
            !matches!(underlying, Type::Named(_)) && is_pod(program, underlying)
        }
        Type::Pointer(_)
        | Type::Slice(_)
        | Type::Array { .. }
        | Type::Map { .. }
        | Type::Interface(_)
        | Type::Chan(_)
        | Type::Func => false,
    }
}
