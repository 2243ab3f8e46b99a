//! This crate implements `sizegen`: it generates `CachedSize` methods for Go types.
//!
//! A generated method reports the retained heap footprint of a live value, in bytes: the
//! allocation the value lives in (when asked to), plus everything reachable through its
//! strings, slices, maps, pointers and interfaces.
//!
//! ```go
//! func (cached *T) CachedSize(alloc bool) int64
//! ```
//!
//! ### Pipeline
//!
//! 1. Package dumps are loaded into a read-only [`Program`] (see [`loader`]).
//! 2. Every root type is handed to a [`Sizegen`] run, which walks the fields of each struct
//!    and registers every named type it runs into in a [`TypeRegistry`].
//! 3. The run keeps generating whatever the registry says is still pending, until nothing is:
//!    this closes over field types and interface implementations alike, and terminates on
//!    cyclic type graphs since every type is generated at most once.
//! 4. Methods are grouped by declaring package, sorted, and written to one
//!    `cached_size.go` per package through a [`FileWriter`].
//!
//! ### Plain old data
//!
//! A type whose static size is its entire footprint (no strings, slices, maps, pointers or
//! interfaces anywhere inside) never gets a method: whoever holds it accounts for it with its
//! static size alone. See [`classify::is_pod`].
//!
//! ### Target layout
//!
//! All sizes, including the layout of the runtime's map header that the generated code probes,
//! come from a [`TargetLayout`] fixed for the whole run.

pub mod classify;
pub mod codegen;
pub mod loader;

mod implementations;
mod layout;
mod output;
mod program;
mod registry;
mod report;
mod sizegen;
mod writer;

pub use self::implementations::implementations_in;
pub use self::layout::{MapHeaderLayout, TargetLayout};
pub use self::output::{OutputOptions, render_code_file, write_generated_code};
pub use self::program::{
    BasicKind, Field, InterfaceType, MethodDecl, Module, Package, Program, StructType, Type,
    TypeDecl, TypeName,
};
pub use self::registry::{TypeRegistry, TypeState};
pub use self::report::{Diagnostics, Report, Reporter, init as init_report};
pub use self::sizegen::{GeneratedCode, Sizegen, SizegenOptions};
pub use self::writer::{CheckFs, FileSink, FileWriter, MemoryFs, RealFs, write_file};

// ---

/// Errors that abort a run before anything is written.
#[derive(thiserror::Error, Debug)]
pub enum SizegenError {
    #[error("unexpected input type: {0} (expected <package path>.<TypeName>)")]
    UnexpectedInput(String),

    #[error("no package found for type {0}")]
    UnknownPackage(String),

    #[error("no type called {name} found in {package}")]
    UnknownType { name: String, package: String },

    #[error("failed to load packages: {0:#}")]
    Load(anyhow::Error),
}

/// Loads every package dump matched by `patterns`, see [`loader`].
pub fn load_program(
    patterns: &[impl AsRef<str>],
    layout: TargetLayout,
) -> Result<Program, SizegenError> {
    loader::load_program(patterns, layout).map_err(SizegenError::Load)
}

/// Generates the methods of every root, and of everything they reach.
///
/// Roots are `<package path>.<TypeName>`, e.g. `example.com/app/tree.Node`.
pub fn generate_code(
    program: &Program,
    roots: &[impl AsRef<str>],
    options: SizegenOptions,
    reporter: &Reporter,
) -> Result<GeneratedCode, SizegenError> {
    let mut sizegen = Sizegen::new(program, reporter.clone(), options);
    sizegen.generate_roots(roots)?;

    let registry = sizegen.registry();
    log::debug!("{} named type(s) seen while walking the roots", registry.len());

    Ok(sizegen.generate_remaining_known_types())
}
