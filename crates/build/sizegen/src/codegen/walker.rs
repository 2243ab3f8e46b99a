//! Builds the statements that account for a single field.

use crate::{
    InterfaceType, Package, Program, Reporter, StructType, Type, TypeName, TypeRegistry,
    codegen::{
        CACHED_OBJECT, CACHED_SIZE, CodeFlags,
        go::{Expr, Stmt},
    },
    implementations::implementations_in,
};

/// Produces, for a field of a given type, the statement adding its footprint to `size`.
///
/// Every named type the walk runs into is registered in the [`TypeRegistry`], which is how
/// the driver learns about types that still need a method of their own.
pub struct SizeStmtBuilder<'a, 'r> {
    pub(crate) program: &'a Program,
    pub(crate) known: &'r mut TypeRegistry,
    pub(crate) reporter: &'r Reporter,

    /// The package the method is generated in.
    pub(crate) scope: &'a Package,

    /// Precede every field statement with a `// field <name> <type>` comment.
    pub(crate) field_comments: bool,

    /// Named non-struct types currently being walked through, innermost last.
    walking: Vec<TypeName>,
}

fn size() -> Expr {
    Expr::ident("size")
}

fn add_size(rhs: Expr) -> Stmt {
    Stmt::AddAssign { lhs: size(), rhs }
}

fn not_nil(field: &Expr) -> Expr {
    field.binary("!=", &Expr::ident("nil"))
}

fn int64(expr: Expr) -> Expr {
    Expr::call("int64", [expr])
}

fn bool_lit(value: bool) -> Expr {
    Expr::ident(if value { "true" } else { "false" })
}

impl<'a, 'r> SizeStmtBuilder<'a, 'r> {
    pub fn new(
        program: &'a Program,
        known: &'r mut TypeRegistry,
        reporter: &'r Reporter,
        scope: &'a Package,
        field_comments: bool,
    ) -> Self {
        Self {
            program,
            known,
            reporter,
            scope,
            field_comments,
            walking: Vec::new(),
        }
    }

    /// The statement accounting for `field` of type `typ`, if it contributes anything.
    ///
    /// `alloc` is set when `field` was reached through a pointer, in which case the
    /// pointed-to allocation is charged as well.
    pub fn size_stmt_for_type(
        &mut self,
        field: &Expr,
        typ: &Type,
        alloc: bool,
    ) -> (Option<Stmt>, CodeFlags) {
        if self.program.size_of(typ) == 0 {
            return (None, CodeFlags::empty());
        }

        match typ {
            Type::Slice(elem) => self.size_stmt_for_slice(field, elem),

            Type::Map { key, value } => self.size_stmt_for_map(field, key, value),

            Type::Pointer(elem) => self.size_stmt_for_type(field, elem, true),

            Type::Named(name) => self.size_stmt_for_named(field, typ, name, alloc),

            Type::Interface(iface) => {
                if iface.is_empty() {
                    return (None, CodeFlags::empty());
                }
                self.register_implementations(iface);
                Self::size_stmt_for_interface(field)
            }

            Type::Struct(st) => self.size_stmt_for_anonymous_struct(field, typ, st, alloc),

            Type::Basic(kind) => {
                if alloc {
                    (
                        Some(add_size(Expr::int64_lit(self.program.size_of(typ)))),
                        CodeFlags::empty(),
                    )
                } else if kind.is_string() {
                    (
                        Some(add_size(int64(Expr::call("len", [field.clone()])))),
                        CodeFlags::empty(),
                    )
                } else {
                    (None, CodeFlags::empty())
                }
            }

            Type::Array { .. } | Type::Chan(_) | Type::Func => {
                self.reporter.warn(
                    &self.scope.path,
                    format!("unhandled type {typ} for {field}, assuming it holds no heap memory"),
                );
                (None, CodeFlags::empty())
            }
        }
    }

    fn size_stmt_for_slice(&mut self, field: &Expr, elem: &Type) -> (Option<Stmt>, CodeFlags) {
        let elem_size = self.program.size_of(elem);
        let capacity = int64(Expr::call("cap", [field.clone()]));

        match elem_size {
            0 => (None, CodeFlags::empty()),

            1 => (Some(add_size(capacity)), CodeFlags::empty()),

            _ => {
                let elem_var = Expr::ident("elem");
                let (elem_stmt, flags) = self.size_stmt_for_type(&elem_var, elem, false);

                let mut body = vec![add_size(
                    capacity.binary("*", &Expr::int64_lit(elem_size)),
                )];
                if let Some(elem_stmt) = elem_stmt {
                    body.push(Stmt::Range {
                        vars: vec!["_".to_owned(), "elem".to_owned()],
                        over: field.clone(),
                        body: vec![elem_stmt],
                    });
                }

                (Some(Stmt::Block(body)), flags)
            }
        }
    }

    fn size_stmt_for_map(
        &mut self,
        field: &Expr,
        key: &Type,
        value: &Type,
    ) -> (Option<Stmt>, CodeFlags) {
        let (key_stmt, key_flags) = self.size_stmt_for_type(&Expr::ident("k"), key, false);
        let (value_stmt, value_flags) = self.size_stmt_for_type(&Expr::ident("v"), value, false);

        let mut body = self.map_header_stmts(field, key, value);

        let vars = match (&key_stmt, &value_stmt) {
            (Some(_), Some(_)) => Some(vec!["k", "v"]),
            (None, Some(_)) => Some(vec!["_", "v"]),
            (Some(_), None) => Some(vec!["k"]),
            (None, None) => None,
        };
        if let Some(vars) = vars {
            body.push(Stmt::Range {
                vars: vars.into_iter().map(str::to_owned).collect(),
                over: field.clone(),
                body: key_stmt.into_iter().chain(value_stmt).collect(),
            });
        }

        (
            Some(Stmt::if_(not_nil(field), body)),
            CodeFlags::UNSAFE | key_flags | value_flags,
        )
    }

    /// Charges the header and the bucket arrays of a live map.
    ///
    /// The bucket counts are read straight from the runtime's map header, see
    /// [`crate::MapHeaderLayout`].
    fn map_header_stmts(&self, field: &Expr, key: &Type, value: &Type) -> Vec<Stmt> {
        let layout = self.program.layout();
        let header = layout.map_header;
        let bucket_size =
            layout.map_bucket_size(self.program.size_of(key), self.program.size_of(value));

        let probe = |typ: &str, offset: i64| {
            format!("*(*{typ})(unsafe.Pointer(hmap.Pointer() + uintptr({offset})))")
        };
        let bucket_log = probe("uint8", header.bucket_log_offset);
        let old_buckets = probe("uint16", header.old_bucket_count_offset);

        let num_buckets = Expr::ident("numBuckets");
        let num_old_buckets = Expr::ident("numOldBuckets");

        vec![
            add_size(Expr::int64_lit(header.size)),
            Stmt::Define {
                lhs: Expr::ident("hmap"),
                rhs: Expr::call("reflect.ValueOf", [field.clone()]),
            },
            Stmt::Define {
                lhs: num_buckets.clone(),
                rhs: Expr::raw(format!("int(math.Pow(2, float64({bucket_log})))")),
            },
            Stmt::Define {
                lhs: num_old_buckets.clone(),
                rhs: Expr::raw(format!("int({old_buckets})")),
            },
            add_size(int64(num_old_buckets).binary("*", &Expr::int64_lit(bucket_size))),
            Stmt::if_(
                Expr::call("len", [field.clone()])
                    .binary(">", &Expr::lit(0))
                    .binary("||", &num_buckets.binary(">", &Expr::lit(1))),
                vec![add_size(
                    int64(num_buckets).binary("*", &Expr::int64_lit(bucket_size)),
                )],
            ),
        ]
    }

    fn size_stmt_for_named(
        &mut self,
        field: &Expr,
        typ: &Type,
        name: &TypeName,
        alloc: bool,
    ) -> (Option<Stmt>, CodeFlags) {
        let program = self.program;
        let state = self.known.get_known_type(program, name);
        let underlying = program.underlying(typ);

        if state.pod || !state.local {
            if !alloc {
                return (None, CodeFlags::empty());
            }
            if !state.local {
                self.reporter.warn(
                    &name.to_string(),
                    "size of external type cannot be fully calculated",
                );
            }
            return (
                Some(Stmt::if_(
                    not_nil(field),
                    vec![add_size(Expr::int64_lit(program.size_of(underlying)))],
                )),
                CodeFlags::empty(),
            );
        }

        match underlying {
            // Has (or will have) a method of its own.
            Type::Struct(_) => (
                Some(add_size(field.method(CACHED_SIZE, [bool_lit(alloc)]))),
                CodeFlags::empty(),
            ),

            // Implementations are picked up when the driver gets to the interface itself.
            Type::Interface(iface) if !iface.is_empty() => Self::size_stmt_for_interface(field),

            // e.g. `type Tree map[string]Tree`: only the outer level is accounted for.
            _ if self.walking.contains(name) => {
                self.reporter.warn(
                    &name.to_string(),
                    "recursive type, values nested inside itself are not accounted for",
                );
                if alloc {
                    (
                        Some(Stmt::if_(
                            not_nil(field),
                            vec![add_size(Expr::int64_lit(program.size_of(underlying)))],
                        )),
                        CodeFlags::empty(),
                    )
                } else {
                    (None, CodeFlags::empty())
                }
            }

            _ => {
                self.walking.push(name.clone());
                let result = self.size_stmt_for_type(field, underlying, alloc);
                self.walking.pop();
                result
            }
        }
    }

    fn size_stmt_for_interface(field: &Expr) -> (Option<Stmt>, CodeFlags) {
        let cc = Expr::ident("cc");
        (
            Some(Stmt::If {
                init: Some(Box::new(Stmt::Define {
                    lhs: Expr::raw("cc, ok"),
                    rhs: field.assert(CACHED_OBJECT),
                })),
                cond: Expr::ident("ok"),
                body: vec![add_size(cc.method(CACHED_SIZE, [bool_lit(true)]))],
            }),
            CodeFlags::INTERFACE,
        )
    }

    /// An interface literal has no declaring scope of its own: look for implementations
    /// next to the struct that holds it.
    fn register_implementations(&mut self, iface: &InterfaceType) {
        let implementations = implementations_in(self.program, self.scope, iface)
            .into_iter()
            .filter(|name| {
                self.program
                    .decl(name)
                    .is_some_and(|decl| matches!(decl.underlying, Type::Struct(_)))
            })
            .collect::<Vec<_>>();

        if implementations.is_empty() {
            self.reporter.warn(
                &self.scope.path,
                format!(
                    "no struct in the package implements {}; values stored in it will not be accounted for",
                    Type::Interface(iface.clone())
                ),
            );
        }

        for name in &implementations {
            self.known.get_known_type(self.program, name);
        }
    }

    /// Go can't attach methods to an unnamed struct, so walk its fields in place.
    fn size_stmt_for_anonymous_struct(
        &mut self,
        field: &Expr,
        typ: &Type,
        st: &StructType,
        alloc: bool,
    ) -> (Option<Stmt>, CodeFlags) {
        let mut body = Vec::new();
        let mut flags = CodeFlags::empty();

        if alloc {
            body.push(add_size(Expr::int64_lit(self.program.size_of(typ))));
        }
        for sub_field in &st.fields {
            let (stmt, sub_flags) =
                self.size_stmt_for_type(&field.dot(&sub_field.name), &sub_field.typ, false);
            body.extend(stmt);
            flags |= sub_flags;
        }

        if body.is_empty() {
            (None, flags)
        } else if alloc {
            (Some(Stmt::if_(not_nil(field), body)), flags)
        } else {
            (Some(Stmt::Block(body)), flags)
        }
    }
}
