//! The fixpoint driver: from root types to per-package collections of methods.

use std::collections::BTreeMap;

use crate::{
    Module, Program, Reporter, SizegenError, Type, TypeName, TypeRegistry,
    codegen::{CodeFile, CodeImpl, SizeStmtBuilder},
    implementations::implementations_in,
};

/// Knobs of the generator itself. Output-side options live in [`crate::OutputOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizegenOptions {
    /// Precede every field statement with a `// field <name> <type>` comment.
    pub field_comments: bool,
}

impl Default for SizegenOptions {
    fn default() -> Self {
        Self {
            field_comments: true,
        }
    }
}

/// Everything generated by one run, keyed by declaring package path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub module: Module,
    pub files: BTreeMap<String, CodeFile>,
}

/// State of a single generator run.
///
/// The registry and the collected code are owned by the run; nothing is shared across runs.
pub struct Sizegen<'a> {
    program: &'a Program,
    reporter: Reporter,
    options: SizegenOptions,
    known: TypeRegistry,
    codegen: BTreeMap<String, CodeFile>,
}

impl<'a> Sizegen<'a> {
    pub fn new(program: &'a Program, reporter: Reporter, options: SizegenOptions) -> Self {
        Self {
            program,
            reporter,
            options,
            known: TypeRegistry::new(program.module().clone()),
            codegen: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.known
    }

    /// Resolves every `<package path>.<TypeName>` root and generates it.
    ///
    /// Stops at the first root that does not name a loaded type.
    pub fn generate_roots(&mut self, roots: &[impl AsRef<str>]) -> Result<(), SizegenError> {
        let program = self.program;

        for root in roots {
            let root = root.as_ref();

            let (package, name) = root
                .rsplit_once('.')
                .ok_or_else(|| SizegenError::UnexpectedInput(root.to_owned()))?;

            let pkg = program
                .package(package)
                .ok_or_else(|| SizegenError::UnknownPackage(root.to_owned()))?;

            let decl = pkg.lookup(name).ok_or_else(|| SizegenError::UnknownType {
                name: name.to_owned(),
                package: package.to_owned(),
            })?;

            self.generate_known_type(&pkg.type_name(decl));
        }

        Ok(())
    }

    /// Generates `name` into the collection of its declaring package.
    pub fn generate_known_type(&mut self, name: &TypeName) {
        let Some(pkg) = self.program.package(&name.package) else {
            log::debug!("{name} is not part of any loaded package");
            return;
        };

        self.codegen
            .entry(pkg.path.clone())
            .or_insert_with(|| CodeFile::new(pkg.name.clone()));

        self.generate_type(name);
    }

    fn generate_type(&mut self, name: &TypeName) {
        let program = self.program;

        let state = self.known.get_known_type(program, name);
        if !self.known.mark_emitted(name) {
            return;
        }

        let (Some(pkg), Some(decl)) = (program.package(&name.package), program.decl(name)) else {
            return;
        };

        match &decl.underlying {
            Type::Struct(st) => {
                if state.pod {
                    log::debug!("{name} is plain old data, no method needed");
                    return;
                }

                let mut builder = SizeStmtBuilder::new(
                    program,
                    &mut self.known,
                    &self.reporter,
                    pkg,
                    self.options.field_comments,
                );
                if let Some((method, flags)) = builder.size_impl_for_struct(name, st) {
                    log::debug!("generated {name}");
                    self.codegen
                        .entry(pkg.path.clone())
                        .or_insert_with(|| CodeFile::new(pkg.name.clone()))
                        .impls
                        .push(CodeImpl {
                            name: name.to_string(),
                            flags,
                            method,
                        });
                }
            }

            // Everything satisfies `interface{}`, and a value stored in it is never accounted for.
            Type::Interface(iface) if iface.is_empty() => {
                log::debug!("{name} is an empty interface, nothing to generate");
            }

            Type::Interface(iface) => {
                let implementations = implementations_in(program, pkg, iface)
                    .into_iter()
                    .filter(|implementation| {
                        program
                            .decl(implementation)
                            .is_some_and(|decl| matches!(decl.underlying, Type::Struct(_)))
                    })
                    .collect::<Vec<_>>();

                if implementations.is_empty() {
                    self.reporter.warn(
                        &name.to_string(),
                        "no struct in the package implements this interface; \
                         values stored in it will not be accounted for",
                    );
                }

                for implementation in &implementations {
                    self.generate_type(implementation);
                }
            }

            _ => {
                log::debug!("{name} is neither a struct nor an interface, nothing to generate");
            }
        }
    }

    /// Runs until every local, non-POD type the registry knows about has been generated.
    pub fn generate_remaining_known_types(mut self) -> GeneratedCode {
        loop {
            let pending = self.known.pending();
            if pending.is_empty() {
                break;
            }
            log::debug!("{} types left to generate", pending.len());

            for name in &pending {
                self.generate_known_type(name);
            }
        }

        GeneratedCode {
            module: self.program.module().clone(),
            files: self.codegen,
        }
    }
}
