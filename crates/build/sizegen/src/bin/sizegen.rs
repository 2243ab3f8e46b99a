//! Generates `cached_size.go` files for the given root types.
//!
//! ```text
//! sizegen --in 'dumps/*.json' --gen example.com/app/tree.Node
//! ```

use anyhow::Context as _;
use camino::Utf8PathBuf;
use clap::Parser;

use sizegen::{
    CheckFs, OutputOptions, RealFs, SizegenOptions, TargetLayout, generate_code, init_report,
    load_program, write_generated_code,
};

#[derive(Debug, Clone, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Package dumps to load (glob pattern, repeatable).
    #[clap(long = "in", value_name = "PATTERN", required = true)]
    patterns: Vec<String>,

    /// Root type to generate for, as `<package path>.<TypeName>` (repeatable).
    #[clap(long = "gen", value_name = "TYPE")]
    roots: Vec<String>,

    /// `GOARCH` whose type sizes the generated code assumes.
    #[clap(long, default_value = "amd64")]
    arch: String,

    /// File whose contents are placed in a comment at the top of every generated file.
    #[clap(long)]
    license_header: Option<Utf8PathBuf>,

    /// Don't precede field statements with a `// field <name> <type>` comment.
    #[clap(long)]
    no_field_comments: bool,

    /// Don't write anything, fail if any generated file is out of date.
    #[clap(long)]
    check: bool,

    /// Treat warnings as errors.
    #[clap(long)]
    warnings_as_errors: bool,
}

/// Set `RUST_LOG` to `info`, unless set.
fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn main() -> anyhow::Result<()> {
    setup_logging();

    let args = Args::parse();

    let layout = TargetLayout::for_arch(&args.arch).with_context(|| {
        format!(
            "unknown architecture {:?}, expected one of: {}",
            args.arch,
            TargetLayout::KNOWN_ARCHS.join(", ")
        )
    })?;

    let license_header = args
        .license_header
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
        })
        .transpose()?;

    let program = load_program(&args.patterns, layout)?;

    let (report, reporter) = init_report();

    let options = SizegenOptions {
        field_comments: !args.no_field_comments,
    };
    let code = generate_code(&program, &args.roots, options, &reporter)?;

    let output_options = OutputOptions { license_header };
    if args.check {
        let mut check = CheckFs::default();
        write_generated_code(&code, &output_options, &mut check, &reporter)?;

        let stale = check.stale_files();
        for path in &stale {
            reporter.error_file(path, "out of date, rerun sizegen");
        }
        if stale.is_empty() {
            log::info!("all generated files are up to date");
        }
    } else {
        write_generated_code(&code, &output_options, &mut RealFs, &reporter)?;
    }

    anyhow::ensure!(
        report.finalize(args.warnings_as_errors),
        "sizegen finished with errors"
    );

    Ok(())
}
