//! Loads a [`Program`] from package dumps.
//!
//! A dump is a JSON document describing a module and some of its (and its dependencies')
//! packages:
//!
//! ```json
//! {
//!   "module": { "path": "example.com/app", "dir": "/src/app" },
//!   "packages": [
//!     {
//!       "path": "example.com/app/tree",
//!       "name": "tree",
//!       "types": [
//!         {
//!           "name": "Node",
//!           "underlying": { "struct": { "fields": [
//!             { "name": "next", "type": { "pointer": { "named": { "package": "example.com/app/tree", "name": "Node" } } } }
//!           ] } },
//!           "methods": [ { "name": "Len", "pointer_receiver": true } ]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context as _;
use camino::{Utf8Path, Utf8PathBuf};

use crate::{Module, Package, Program, TargetLayout};

/// The contents of one dump file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PackageDump {
    pub module: Module,

    #[serde(default)]
    pub packages: Vec<Package>,
}

/// Loads every dump matched by `patterns`.
///
/// Every pattern must match at least one file. Files matched by several patterns are
/// only read once.
pub fn load_program(patterns: &[impl AsRef<str>], layout: TargetLayout) -> anyhow::Result<Program> {
    anyhow::ensure!(!patterns.is_empty(), "no input patterns given");

    let mut paths = BTreeSet::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();

        let mut matched = false;
        for entry in glob::glob(pattern).with_context(|| format!("Bad pattern {pattern:?}"))? {
            let path = entry.with_context(|| format!("Failed to read a match of {pattern:?}"))?;
            let path = Utf8PathBuf::from_path_buf(path)
                .map_err(|path| anyhow::anyhow!("Non UTF-8 path {path:?}"))?;
            paths.insert(path);
            matched = true;
        }
        anyhow::ensure!(matched, "pattern {pattern:?} matched no files");
    }

    let dumps = paths
        .iter()
        .map(|path| read_dump(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    program_from_dumps(dumps, layout)
}

pub fn read_dump(path: &Utf8Path) -> anyhow::Result<PackageDump> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let dump = serde_json::from_str(&contents).with_context(|| format!("Failed to parse {path}"))?;
    log::debug!("read {path}");
    Ok(dump)
}

/// Merges dumps into a single [`Program`].
///
/// The module comes from the first dump; every other dump must agree with it. A package
/// may appear in several dumps as long as it is the same every time.
pub fn program_from_dumps(
    dumps: impl IntoIterator<Item = PackageDump>,
    layout: TargetLayout,
) -> anyhow::Result<Program> {
    let mut module: Option<Module> = None;
    let mut packages: BTreeMap<String, Package> = BTreeMap::new();

    for dump in dumps {
        match &module {
            None => module = Some(dump.module),
            Some(module) => anyhow::ensure!(
                *module == dump.module,
                "dumps disagree about the module: {:?} at {} vs. {:?} at {}",
                module.path,
                module.dir,
                dump.module.path,
                dump.module.dir,
            ),
        }

        for pkg in dump.packages {
            if let Some(existing) = packages.get(&pkg.path) {
                anyhow::ensure!(
                    *existing == pkg,
                    "package {:?} differs between dumps",
                    pkg.path
                );
                continue;
            }
            packages.insert(pkg.path.clone(), pkg);
        }
    }

    let module = module.context("no package dumps given")?;
    log::debug!(
        "loaded {} package(s) of module {}",
        packages.len(),
        module.path
    );

    Program::new(module, layout, packages.into_values())
}
