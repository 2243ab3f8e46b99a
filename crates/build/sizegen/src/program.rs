//! The read-only program graph the generator works on.
//!
//! A [`Program`] is a set of loaded packages, each with the named type declarations of its
//! top-level scope, plus the module descriptor and the [`TargetLayout`] that every size query
//! is answered against.
//!
//! Programs are usually produced by [`crate::loader`] from package dumps, but can also be
//! assembled by hand through [`Program::new`].

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context as _;
use camino::Utf8PathBuf;
use itertools::Itertools as _;

use crate::TargetLayout;

// ---

/// Identity of a named type: its declaring package path and its name.
///
/// Two named types are the same type iff their `TypeName`s are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TypeName {
    pub package: String,
    pub name: String,
}

impl TypeName {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self { package, name } = self;
        write!(f, "{package}.{name}")
    }
}

/// The predeclared Go types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,
}

impl BasicKind {
    pub fn is_string(self) -> bool {
        self == Self::String
    }

    pub fn is_unsafe_pointer(self) -> bool {
        self == Self::UnsafePointer
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// The name of the type in Go source.
    pub fn go_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Uintptr => "uintptr",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::String => "string",
            Self::UnsafePointer => "unsafe.Pointer",
        }
    }
}

/// A structural type expression.
///
/// Named types are referenced through [`Type::Named`]; their definition lives in the
/// declaring [`Package`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Basic(BasicKind),
    Named(TypeName),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array { len: u64, elem: Box<Type> },
    Map { key: Box<Type>, value: Box<Type> },
    Struct(StructType),
    Interface(InterfaceType),
    Chan(Box<Type>),
    Func,
}

impl Type {
    pub fn basic(kind: BasicKind) -> Self {
        Self::Basic(kind)
    }

    pub fn named(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named(TypeName::new(package, name))
    }

    pub fn pointer(elem: Self) -> Self {
        Self::Pointer(Box::new(elem))
    }

    pub fn slice(elem: Self) -> Self {
        Self::Slice(Box::new(elem))
    }

    pub fn array(len: u64, elem: Self) -> Self {
        Self::Array {
            len,
            elem: Box::new(elem),
        }
    }

    pub fn map(key: Self, value: Self) -> Self {
        Self::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, Self)>) -> Self {
        Self::Struct(StructType {
            fields: fields
                .into_iter()
                .map(|(name, typ)| Field {
                    name: name.into(),
                    typ,
                })
                .collect(),
        })
    }

    pub fn interface<N: Into<String>>(methods: impl IntoIterator<Item = N>) -> Self {
        Self::Interface(InterfaceType {
            methods: methods.into_iter().map(Into::into).collect(),
        })
    }
}

/// Prints the type the way Go's type checker does, with named types qualified by their
/// full package path.
impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic(kind) => f.write_str(kind.go_name()),
            Self::Named(name) => write!(f, "{name}"),
            Self::Pointer(elem) => write!(f, "*{elem}"),
            Self::Slice(elem) => write!(f, "[]{elem}"),
            Self::Array { len, elem } => write!(f, "[{len}]{elem}"),
            Self::Map { key, value } => write!(f, "map[{key}]{value}"),
            Self::Struct(st) => {
                let fields = st
                    .fields
                    .iter()
                    .map(|field| format!("{} {}", field.name, field.typ))
                    .join("; ");
                write!(f, "struct{{{fields}}}")
            }
            Self::Interface(iface) => {
                let methods = iface.methods.iter().map(|m| format!("{m}()")).join("; ");
                write!(f, "interface{{{methods}}}")
            }
            Self::Chan(elem) => write!(f, "chan {elem}"),
            Self::Func => f.write_str("func()"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StructType {
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(rename = "type")]
    pub typ: Type,
}

/// An interface, described by the names of the methods in its method set.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InterfaceType {
    #[serde(default)]
    pub methods: Vec<String>,
}

impl InterfaceType {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// A method declared on a named type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MethodDecl {
    pub name: String,

    /// Declared on `*T` rather than `T`; only part of the pointer form's method set.
    #[serde(default)]
    pub pointer_receiver: bool,
}

/// A top-level named type declaration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TypeDecl {
    pub name: String,

    /// Never [`Type::Named`] once the declaration is part of a [`Program`].
    pub underlying: Type,

    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, underlying: Type) -> Self {
        Self {
            name: name.into(),
            underlying,
            methods: Vec::new(),
        }
    }

    pub fn with_method(mut self, name: impl Into<String>, pointer_receiver: bool) -> Self {
        self.methods.push(MethodDecl {
            name: name.into(),
            pointer_receiver,
        });
        self
    }
}

/// A loaded package and its lexical top-level scope.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Package {
    /// Full import path, e.g. `example.com/app/tree`.
    pub path: String,

    /// Short name used in the `package` clause, e.g. `tree`.
    pub name: String,

    /// The named types of the top-level scope, in declaration order.
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

impl Package {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, decl: TypeDecl) -> Self {
        self.types.push(decl);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|decl| decl.name == name)
    }

    pub fn type_name(&self, decl: &TypeDecl) -> TypeName {
        TypeName::new(self.path.clone(), decl.name.clone())
    }
}

/// The module the generated code belongs to.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Module {
    /// Module root path, e.g. `example.com/app`.
    pub path: String,

    /// Local directory of the module root; generated files are placed relative to it.
    pub dir: Utf8PathBuf,
}

impl Module {
    pub fn new(path: impl Into<String>, dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            dir: dir.into(),
        }
    }

    /// Is the package with this path part of the module?
    pub fn owns(&self, package_path: &str) -> bool {
        package_path
            .strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// The package path relative to the module root, without a leading slash.
    pub fn relative_path<'p>(&self, package_path: &'p str) -> &'p str {
        package_path
            .strip_prefix(self.path.as_str())
            .unwrap_or(package_path)
            .trim_start_matches('/')
    }
}

// ---

/// The result of loading: every package, resolved and validated.
#[derive(Debug)]
pub struct Program {
    module: Module,
    layout: TargetLayout,
    packages: BTreeMap<String, Package>,
}

impl Program {
    /// Validates and resolves the given packages.
    ///
    /// Fails if a named type reference points nowhere, if a declaration aliases itself
    /// (`type A B; type B A`), or if a type contains itself by value.
    pub fn new(
        module: Module,
        layout: TargetLayout,
        packages: impl IntoIterator<Item = Package>,
    ) -> anyhow::Result<Self> {
        let mut by_path = BTreeMap::new();
        for pkg in packages {
            anyhow::ensure!(
                !by_path.contains_key(&pkg.path),
                "package {:?} is defined more than once",
                pkg.path
            );
            by_path.insert(pkg.path.clone(), pkg);
        }

        let mut this = Self {
            module,
            layout,
            packages: by_path,
        };

        this.check_references()?;
        this.resolve_underlying_names()?;
        this.check_value_cycles()?;

        Ok(this)
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    /// All loaded packages, ordered by path.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.get(path)
    }

    pub fn decl(&self, name: &TypeName) -> Option<&TypeDecl> {
        self.package(&name.package)?.lookup(&name.name)
    }

    /// Strips any number of names off the type.
    ///
    /// Unknown names are returned as-is; [`Program::new`] makes sure there are none.
    pub fn underlying<'t>(&'t self, typ: &'t Type) -> &'t Type {
        match typ {
            Type::Named(name) => self
                .decl(name)
                .map_or(typ, |decl| self.underlying(&decl.underlying)),
            _ => typ,
        }
    }

    /// Static size of a value of this type, in bytes, under the program's [`TargetLayout`].
    pub fn size_of(&self, typ: &Type) -> i64 {
        self.layout.size_of(self, typ)
    }

    /// Does the value form or the pointer form of `name` satisfy `iface`?
    pub fn satisfies(&self, name: &TypeName, iface: &InterfaceType) -> bool {
        let Some(decl) = self.decl(name) else {
            return false;
        };

        if let Type::Interface(own) = &decl.underlying {
            return iface.methods.iter().all(|m| own.methods.contains(m));
        }

        // The pointer form's method set is a superset of the value form's, so checking it
        // covers both.
        let method_set: BTreeSet<&str> = decl.methods.iter().map(|m| m.name.as_str()).collect();
        iface.methods.iter().all(|m| method_set.contains(m.as_str()))
    }

    // ---

    fn check_references(&self) -> anyhow::Result<()> {
        for pkg in self.packages.values() {
            for decl in &pkg.types {
                let mut missing = None;
                visit_names(&decl.underlying, &mut |name| {
                    if missing.is_none() && self.decl(name).is_none() {
                        missing = Some(name.clone());
                    }
                });
                if let Some(missing) = missing {
                    anyhow::bail!(
                        "{}.{}: reference to unknown type {missing}",
                        pkg.path,
                        decl.name
                    );
                }
            }
        }
        Ok(())
    }

    /// `type A B` has the underlying type of `B`.
    fn resolve_underlying_names(&mut self) -> anyhow::Result<()> {
        let mut resolved = Vec::new();

        for pkg in self.packages.values() {
            for (index, decl) in pkg.types.iter().enumerate() {
                let Type::Named(target) = &decl.underlying else {
                    continue;
                };

                let mut seen = BTreeSet::from([pkg.type_name(decl)]);
                let mut current = target.clone();
                let underlying = loop {
                    anyhow::ensure!(
                        seen.insert(current.clone()),
                        "{}.{}: invalid recursive type definition",
                        pkg.path,
                        decl.name
                    );
                    let next = self
                        .decl(&current)
                        .with_context(|| format!("unknown type {current}"))?;
                    match &next.underlying {
                        Type::Named(name) => current = name.clone(),
                        other => break other.clone(),
                    }
                };

                resolved.push((pkg.path.clone(), index, underlying));
            }
        }

        for (path, index, underlying) in resolved {
            if let Some(decl) = self
                .packages
                .get_mut(&path)
                .and_then(|pkg| pkg.types.get_mut(index))
            {
                decl.underlying = underlying;
            }
        }

        Ok(())
    }

    /// A type may only contain itself through an indirection (pointer, slice, map, ...).
    fn check_value_cycles(&self) -> anyhow::Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            InProgress,
            Done,
        }

        fn visit(
            program: &Program,
            name: &TypeName,
            marks: &mut BTreeMap<TypeName, Mark>,
        ) -> anyhow::Result<()> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::InProgress) => {
                    anyhow::bail!("{name}: invalid recursive type (contains itself by value)")
                }
                None => {}
            }
            marks.insert(name.clone(), Mark::InProgress);

            if let Some(decl) = program.decl(name) {
                let mut embedded = Vec::new();
                collect_embedded_names(&decl.underlying, &mut embedded);
                for embedded in embedded {
                    visit(program, embedded, marks)?;
                }
            }

            marks.insert(name.clone(), Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for pkg in self.packages.values() {
            for decl in &pkg.types {
                visit(self, &pkg.type_name(decl), &mut marks)?;
            }
        }
        Ok(())
    }
}

/// Calls `f` on every named type referenced anywhere in `typ`.
fn visit_names(typ: &Type, f: &mut impl FnMut(&TypeName)) {
    match typ {
        Type::Named(name) => f(name),
        Type::Pointer(elem) | Type::Slice(elem) | Type::Chan(elem) => visit_names(elem, f),
        Type::Array { elem, .. } => visit_names(elem, f),
        Type::Map { key, value } => {
            visit_names(key, f);
            visit_names(value, f);
        }
        Type::Struct(st) => {
            for field in &st.fields {
                visit_names(&field.typ, f);
            }
        }
        Type::Basic(_) | Type::Interface(_) | Type::Func => {}
    }
}

/// Named types stored inline in a value of `typ` (no indirection).
fn collect_embedded_names<'t>(typ: &'t Type, out: &mut Vec<&'t TypeName>) {
    match typ {
        Type::Named(name) => out.push(name),
        Type::Array { elem, .. } => collect_embedded_names(elem, out),
        Type::Struct(st) => {
            for field in &st.fields {
                collect_embedded_names(&field.typ, out);
            }
        }
        Type::Basic(_)
        | Type::Pointer(_)
        | Type::Slice(_)
        | Type::Map { .. }
        | Type::Interface(_)
        | Type::Chan(_)
        | Type::Func => {}
    }
}
