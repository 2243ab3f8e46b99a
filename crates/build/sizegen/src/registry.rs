//! Bookkeeping for every named type the generator has come across.

use std::collections::BTreeMap;

use crate::{Module, Program, Type, TypeName, classify::is_pod};

/// What we know about a named type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeState {
    /// Declared inside the module we generate code for.
    pub local: bool,

    /// Plain old data: its static size is all there is to it.
    pub pod: bool,

    /// A `CachedSize` method has been (or will never be) generated for it.
    pub emitted: bool,
}

impl TypeState {
    /// Still needs to go through the generator.
    pub fn is_pending(&self) -> bool {
        self.local && !self.pod && !self.emitted
    }
}

/// Lazily populated map of every named type seen so far.
///
/// Entries are never removed; the only mutation is [`TypeRegistry::mark_emitted`].
#[derive(Debug)]
pub struct TypeRegistry {
    module: Module,
    known: BTreeMap<TypeName, TypeState>,
}

impl TypeRegistry {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            known: BTreeMap::new(),
        }
    }

    /// Returns the state of `name`, classifying it on first sight.
    pub fn get_known_type(&mut self, program: &Program, name: &TypeName) -> TypeState {
        if let Some(state) = self.known.get(name) {
            return *state;
        }

        let state = TypeState {
            local: self.module.owns(&name.package),
            pod: is_pod(program, &Type::Named(name.clone())),
            emitted: false,
        };
        log::debug!(
            "new type {name}: local={} pod={}",
            state.local,
            state.pod
        );
        self.known.insert(name.clone(), state);
        state
    }

    /// Returns `false` if it was already marked.
    pub fn mark_emitted(&mut self, name: &TypeName) -> bool {
        match self.known.get_mut(name) {
            Some(state) if state.emitted => false,
            Some(state) => {
                state.emitted = true;
                true
            }
            None => {
                log::debug!("marking unknown type {name} as emitted");
                false
            }
        }
    }

    /// Local, non-POD types that haven't been through the generator yet, in name order.
    pub fn pending(&self) -> Vec<TypeName> {
        self.known
            .iter()
            .filter(|(_, state)| state.is_pending())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasicKind, Package, TargetLayout, TypeDecl};

    const LOCAL: &str = "example.com/app/store";
    const FOREIGN: &str = "golang.org/x/text";

    fn program() -> Program {
        let local = Package::new(LOCAL, "store")
            .with_type(TypeDecl::new(
                "Entry",
                Type::structure([("key", Type::basic(BasicKind::String))]),
            ))
            .with_type(TypeDecl::new(
                "Offset",
                Type::structure([("at", Type::basic(BasicKind::Int64))]),
            ));
        let foreign = Package::new(FOREIGN, "text").with_type(TypeDecl::new(
            "Tag",
            Type::structure([("s", Type::basic(BasicKind::String))]),
        ));
        Program::new(
            Module::new("example.com/app", "/src/app"),
            TargetLayout::amd64(),
            [local, foreign],
        )
        .unwrap()
    }

    #[test]
    fn classifies_on_first_lookup() {
        let program = program();
        let mut registry = TypeRegistry::new(program.module().clone());
        assert!(registry.is_empty());

        let entry = registry.get_known_type(&program, &TypeName::new(LOCAL, "Entry"));
        assert_eq!(
            entry,
            TypeState {
                local: true,
                pod: false,
                emitted: false
            }
        );

        let offset = registry.get_known_type(&program, &TypeName::new(LOCAL, "Offset"));
        assert!(offset.local && offset.pod);

        let tag = registry.get_known_type(&program, &TypeName::new(FOREIGN, "Tag"));
        assert!(!tag.local && !tag.pod);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.pending(), vec![TypeName::new(LOCAL, "Entry")]);
    }

    #[test]
    fn emitted_is_sticky() {
        let program = program();
        let mut registry = TypeRegistry::new(program.module().clone());
        let entry = TypeName::new(LOCAL, "Entry");

        registry.get_known_type(&program, &entry);
        assert!(registry.mark_emitted(&entry));
        assert!(!registry.mark_emitted(&entry));

        // Looking it up again must not reset it.
        assert!(registry.get_known_type(&program, &entry).emitted);
        assert!(registry.pending().is_empty());
    }
}
