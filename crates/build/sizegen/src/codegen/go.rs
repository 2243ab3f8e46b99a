//! A tiny Go syntax tree, just big enough for the code we emit, and its printer.
//!
//! Output is laid out the way `gofmt` would print it, so generated files are stable
//! byte-for-byte without running an external formatter.

use std::collections::BTreeSet;
use std::fmt::Write as _;

/// A Go expression, kept as source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr(String);

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Untyped constant: `8`.
    pub fn lit(value: i64) -> Self {
        Self(value.to_string())
    }

    /// Typed constant: `int64(8)`.
    pub fn int64_lit(value: i64) -> Self {
        Self(format!("int64({value})"))
    }

    /// `x.name`
    pub fn dot(&self, name: &str) -> Self {
        Self(format!("{}.{name}", self.0))
    }

    /// `f(args...)`
    pub fn call(func: &str, args: impl IntoIterator<Item = Self>) -> Self {
        let args = args
            .into_iter()
            .map(|arg| arg.0)
            .collect::<Vec<_>>()
            .join(", ");
        Self(format!("{func}({args})"))
    }

    /// `x.method(args...)`
    pub fn method(&self, method: &str, args: impl IntoIterator<Item = Self>) -> Self {
        Self::call(&format!("{}.{method}", self.0), args)
    }

    /// `x <op> y`
    pub fn binary(&self, op: &str, rhs: &Self) -> Self {
        Self(format!("{} {op} {}", self.0, rhs.0))
    }

    /// `x.(T)`
    pub fn assert(&self, typ: &str) -> Self {
        Self(format!("{}.({typ})", self.0))
    }

    /// Arbitrary source text, for the few expressions not worth modelling.
    pub fn raw(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Go statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `// text`
    Comment(String),

    /// `lhs := rhs`
    Define { lhs: Expr, rhs: Expr },

    /// `lhs += rhs`
    AddAssign { lhs: Expr, rhs: Expr },

    /// `return value`
    Return(Expr),

    /// `if init; cond { body }`
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: Vec<Stmt>,
    },

    /// `for vars := range over { body }`
    Range {
        vars: Vec<String>,
        over: Expr,
        body: Vec<Stmt>,
    },

    /// `{ body }`
    Block(Vec<Stmt>),
}

impl Stmt {
    pub fn if_(cond: Expr, body: Vec<Self>) -> Self {
        Self::If {
            init: None,
            cond,
            body,
        }
    }

    pub fn render(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        match self {
            Self::Comment(text) => {
                writeln!(out, "{indent}// {text}").ok();
            }
            Self::Define { lhs, rhs } => {
                writeln!(out, "{indent}{lhs} := {rhs}").ok();
            }
            Self::AddAssign { lhs, rhs } => {
                writeln!(out, "{indent}{lhs} += {rhs}").ok();
            }
            Self::Return(value) => {
                writeln!(out, "{indent}return {value}").ok();
            }
            Self::If { init, cond, body } => {
                let init = init.as_deref().map(Self::render_simple).unwrap_or_default();
                writeln!(out, "{indent}if {init}{cond} {{").ok();
                render_body(out, body, depth + 1);
                writeln!(out, "{indent}}}").ok();
            }
            Self::Range { vars, over, body } => {
                writeln!(out, "{indent}for {} := range {over} {{", vars.join(", ")).ok();
                render_body(out, body, depth + 1);
                writeln!(out, "{indent}}}").ok();
            }
            Self::Block(body) => {
                writeln!(out, "{indent}{{").ok();
                render_body(out, body, depth + 1);
                writeln!(out, "{indent}}}").ok();
            }
        }
    }

    /// A simple statement as it appears in an `if` header, including the `; `.
    fn render_simple(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        format!("{}; ", out.trim_end())
    }
}

fn render_body(out: &mut String, body: &[Stmt], depth: usize) {
    for stmt in body {
        stmt.render(out, depth);
    }
}

/// A method declaration: `func (recv *Type) Name(params) results { body }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub receiver: String,
    pub receiver_type: String,
    pub name: String,
    pub params: String,
    pub results: String,
    pub body: Vec<Stmt>,
}

impl Method {
    pub fn render(&self, out: &mut String) {
        let Self {
            receiver,
            receiver_type,
            name,
            params,
            results,
            body,
        } = self;
        writeln!(
            out,
            "func ({receiver} {receiver_type}) {name}({params}) {results} {{"
        )
        .ok();
        render_body(out, body, 1);
        out.push_str("}\n");
    }
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    /// `type name interface { methods... }`
    Interface { name: String, methods: Vec<String> },

    /// A method, optionally preceded by compiler directives such as `//go:nocheckptr`.
    Method {
        directives: Vec<String>,
        method: Method,
    },
}

/// A whole Go source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    pub header_comments: Vec<String>,
    pub package: String,
    pub imports: BTreeSet<String>,
    pub decls: Vec<Decl>,
}

impl File {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Default::default()
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        for comment in &self.header_comments {
            if comment.contains('\n') {
                writeln!(out, "/*\n{}\n*/", comment.trim_end()).ok();
            } else {
                writeln!(out, "// {comment}").ok();
            }
        }
        if !self.header_comments.is_empty() {
            out.push('\n');
        }

        writeln!(out, "package {}", self.package).ok();

        match self.imports.len() {
            0 => {}
            1 => {
                for import in &self.imports {
                    writeln!(out, "\nimport {import:?}").ok();
                }
            }
            _ => {
                out.push_str("\nimport (\n");
                for import in &self.imports {
                    writeln!(out, "\t{import:?}").ok();
                }
                out.push_str(")\n");
            }
        }

        for decl in &self.decls {
            out.push('\n');
            match decl {
                Decl::Interface { name, methods } => {
                    writeln!(out, "type {name} interface {{").ok();
                    for method in methods {
                        writeln!(out, "\t{method}").ok();
                    }
                    out.push_str("}\n");
                }
                Decl::Method { directives, method } => {
                    for directive in directives {
                        writeln!(out, "{directive}").ok();
                    }
                    method.render(&mut out);
                }
            }
        }

        out
    }
}
