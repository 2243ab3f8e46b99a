//! Generation of `CachedSize` methods.

pub mod go;
mod method;
mod walker;

pub use self::walker::SizeStmtBuilder;

/// First line of every generated file, in the form `go generate` tooling recognizes.
pub const AUTOGEN_WARNING: &str = "Code generated by sizegen. DO NOT EDIT.";

/// Name of the file generated in every package directory.
pub const GENERATED_FILE_NAME: &str = "cached_size.go";

/// The generated method.
pub const CACHED_SIZE: &str = "CachedSize";

/// The interface through which interface-typed fields are accounted for.
pub const CACHED_OBJECT: &str = "cachedObject";

/// Disables `-d=checkptr` instrumentation for the map header probe.
pub const NOCHECKPTR_DIRECTIVE: &str = "//go:nocheckptr";

/// Packages the map header probe needs.
pub const UNSAFE_IMPORTS: [&str; 3] = ["math", "reflect", "unsafe"];

bitflags::bitflags! {
    /// What a generated method needs from the file it ends up in.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct CodeFlags: u32 {
        /// Calls through the shared [`CACHED_OBJECT`] interface.
        const INTERFACE = 1 << 0;

        /// Probes a live map header through `unsafe`.
        const UNSAFE = 1 << 1;
    }
}

/// The shared capability declaration, emitted once per file that needs it.
pub fn cached_object_decl() -> go::Decl {
    go::Decl::Interface {
        name: CACHED_OBJECT.to_owned(),
        methods: vec![format!("{CACHED_SIZE}(alloc bool) int64")],
    }
}

/// One generated method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeImpl {
    /// Fully qualified name of the receiver type; the sort key within a file.
    pub name: String,
    pub flags: CodeFlags,
    pub method: go::Method,
}

/// Everything generated for one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFile {
    /// Short package name, for the `package` clause.
    pub pkg_name: String,
    pub impls: Vec<CodeImpl>,
}

impl CodeFile {
    pub fn new(pkg_name: impl Into<String>) -> Self {
        Self {
            pkg_name: pkg_name.into(),
            impls: Vec::new(),
        }
    }
}
