//! Finding the implementations of an interface within a package.

use crate::{InterfaceType, Package, Program, TypeName};

/// Every named type declared in `scope` whose value or pointer form satisfies `iface`,
/// in declaration order.
///
/// This includes interface types whose method set covers `iface`, and `iface`'s own
/// declaration if it is named; callers filter for the kinds they care about.
pub fn implementations_in(
    program: &Program,
    scope: &Package,
    iface: &InterfaceType,
) -> Vec<TypeName> {
    scope
        .types
        .iter()
        .map(|decl| scope.type_name(decl))
        .filter(|name| program.satisfies(name, iface))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasicKind, Module, TargetLayout, Type, TypeDecl};

    const PKG: &str = "example.com/app/expr";

    #[test]
    fn finds_value_and_pointer_implementations_in_order() {
        let pkg = Package::new(PKG, "expr")
            .with_type(TypeDecl::new("Expr", Type::interface(["Eval", "String"])))
            .with_type(
                TypeDecl::new("Literal", Type::structure([("v", Type::basic(BasicKind::Int))]))
                    .with_method("Eval", false)
                    .with_method("String", false),
            )
            .with_type(
                TypeDecl::new(
                    "Binary",
                    Type::structure([("op", Type::basic(BasicKind::String))]),
                )
                .with_method("Eval", true)
                .with_method("String", true),
            )
            .with_type(
                TypeDecl::new("Partial", Type::structure([("x", Type::basic(BasicKind::Int))]))
                    .with_method("Eval", false),
            );
        let program = Program::new(
            Module::new("example.com/app", "/src/app"),
            TargetLayout::amd64(),
            [pkg],
        )
        .unwrap();

        let scope = program.package(PKG).unwrap();
        let Type::Interface(iface) = &scope.lookup("Expr").unwrap().underlying else {
            panic!("Expr should be an interface");
        };

        let names = implementations_in(&program, scope, iface)
            .into_iter()
            .map(|name| name.name)
            .collect::<Vec<_>>();
        assert_eq!(names, ["Expr", "Literal", "Binary"]);
    }
}
