//! Grouping the generated methods into files and writing them out.

use std::io::Write as _;

use anyhow::Context as _;
use camino::Utf8PathBuf;

use crate::{
    FileWriter, GeneratedCode, Reporter,
    codegen::{
        AUTOGEN_WARNING, CodeFile, CodeFlags, GENERATED_FILE_NAME, NOCHECKPTR_DIRECTIVE,
        UNSAFE_IMPORTS, cached_object_decl, go,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Placed in a block comment at the very top of every file.
    pub license_header: Option<String>,
}

/// Renders the Go source of one package's file.
///
/// Methods are sorted by the fully qualified name of their receiver type.
pub fn render_code_file(file: &CodeFile, options: &OutputOptions) -> String {
    let mut impls = file.impls.iter().collect::<Vec<_>>();
    impls.sort_by(|a, b| a.name.cmp(&b.name));

    let flags = impls
        .iter()
        .fold(CodeFlags::empty(), |flags, imp| flags | imp.flags);

    let mut out = go::File::new(file.pkg_name.clone());

    if let Some(license) = options
        .license_header
        .as_deref()
        .map(str::trim)
        .filter(|license| !license.is_empty())
    {
        // Always a block comment, even for a single line.
        out.header_comments.push(format!("{license}\n"));
    }
    out.header_comments.push(AUTOGEN_WARNING.to_owned());

    if flags.contains(CodeFlags::UNSAFE) {
        out.imports
            .extend(UNSAFE_IMPORTS.iter().map(|import| (*import).to_owned()));
    }

    if flags.contains(CodeFlags::INTERFACE) {
        out.decls.push(cached_object_decl());
    }

    for imp in impls {
        let directives = if imp.flags.contains(CodeFlags::UNSAFE) {
            vec![NOCHECKPTR_DIRECTIVE.to_owned()]
        } else {
            Vec::new()
        };
        out.decls.push(go::Decl::Method {
            directives,
            method: imp.method.clone(),
        });
    }

    out.render()
}

/// Writes one file per package that got any methods, returning the paths written.
///
/// Packages outside the module are skipped with a warning. A failure to write stops
/// everything; a failure to close a file is reported and the remaining files are still
/// written.
pub fn write_generated_code(
    code: &GeneratedCode,
    options: &OutputOptions,
    writer: &mut dyn FileWriter,
    reporter: &Reporter,
) -> anyhow::Result<Vec<Utf8PathBuf>> {
    let mut written = Vec::new();

    for (pkg, file) in &code.files {
        if file.impls.is_empty() {
            log::debug!("nothing generated for {pkg}");
            continue;
        }

        if !code.module.owns(pkg) {
            reporter.warn(
                pkg,
                format!(
                    "package is not part of module {}, skipping its {} generated method(s)",
                    code.module.path,
                    file.impls.len()
                ),
            );
            continue;
        }

        let full_path = code
            .module
            .dir
            .join(code.module.relative_path(pkg))
            .join(GENERATED_FILE_NAME);

        let source = render_code_file(file, options);

        let mut sink = writer
            .for_file(&full_path)
            .with_context(|| format!("Failed to open {full_path}"))?;

        if let Err(err) = sink.write_all(source.as_bytes()) {
            sink.close().ok();
            return Err(err).with_context(|| format!("Failed to save {full_path}"));
        }

        if let Err(err) = sink.close() {
            reporter.error_file(&full_path, format!("{err:#}"));
            continue;
        }

        log::info!("saved {pkg} at {full_path}");
        written.push(full_path);
    }

    Ok(written)
}
