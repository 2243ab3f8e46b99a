use crate::{
    StructType, Type, TypeName,
    codegen::{
        CACHED_SIZE, CodeFlags, SizeStmtBuilder,
        go::{Expr, Method, Stmt},
    },
};

impl SizeStmtBuilder<'_, '_> {
    /// The `CachedSize` method of the local struct `name`.
    ///
    /// Returns `None` for zero-size structs, which never own any memory.
    pub fn size_impl_for_struct(
        &mut self,
        name: &TypeName,
        st: &StructType,
    ) -> Option<(Method, CodeFlags)> {
        let static_size = self.program.size_of(&Type::Struct(st.clone()));
        if static_size == 0 {
            log::debug!("{name} is zero-sized, skipping");
            return None;
        }

        let receiver = Expr::ident("cached");
        let size = Expr::ident("size");

        let mut body = vec![
            Stmt::if_(
                receiver.binary("==", &Expr::ident("nil")),
                vec![Stmt::Return(Expr::int64_lit(0))],
            ),
            Stmt::Define {
                lhs: size.clone(),
                rhs: Expr::int64_lit(0),
            },
            Stmt::if_(
                Expr::ident("alloc"),
                vec![Stmt::AddAssign {
                    lhs: size.clone(),
                    rhs: Expr::int64_lit(static_size),
                }],
            ),
        ];

        let mut flags = CodeFlags::empty();
        for field in &st.fields {
            let (stmt, field_flags) =
                self.size_stmt_for_type(&receiver.dot(&field.name), &field.typ, false);
            let Some(stmt) = stmt else {
                continue;
            };

            if self.field_comments {
                body.push(Stmt::Comment(format!("field {} {}", field.name, field.typ)));
            }
            body.push(stmt);
            flags |= field_flags;
        }

        body.push(Stmt::Return(size));

        let method = Method {
            receiver: "cached".to_owned(),
            receiver_type: format!("*{}", name.name),
            name: CACHED_SIZE.to_owned(),
            params: "alloc bool".to_owned(),
            results: "int64".to_owned(),
            body,
        };

        Some((method, flags))
    }
}
