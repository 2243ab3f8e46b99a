//! End-to-end runs: in-memory programs in, Go source out.

use camino::{Utf8Path, Utf8PathBuf};
use sizegen::{
    BasicKind, CheckFs, MemoryFs, Module, OutputOptions, Package, Program, RealFs,
    SizegenOptions, TargetLayout, Type, TypeDecl, generate_code, init_report,
    write_generated_code,
};

const MODULE: &str = "example.com/app";
const PKG: &str = "example.com/app/model";
const OUTPUT: &str = "/src/app/model/cached_size.go";

fn module(dir: impl Into<Utf8PathBuf>) -> Module {
    Module::new(MODULE, dir)
}

fn model(decls: impl IntoIterator<Item = TypeDecl>) -> Package {
    decls
        .into_iter()
        .fold(Package::new(PKG, "model"), Package::with_type)
}

fn program(packages: impl IntoIterator<Item = Package>) -> Program {
    Program::new(module("/src/app"), TargetLayout::amd64(), packages).unwrap()
}

fn named(name: &str) -> Type {
    Type::named(PKG, name)
}

fn string() -> Type {
    Type::basic(BasicKind::String)
}

struct Output {
    files: std::collections::BTreeMap<Utf8PathBuf, String>,
    warnings: Vec<String>,
}

impl Output {
    fn file(&self, path: &str) -> &str {
        self.files
            .get(Utf8Path::new(path))
            .unwrap_or_else(|| panic!("{path} was not written, got {:?}", self.files.keys()))
    }
}

fn run(program: &Program, roots: &[&str]) -> Output {
    let (report, reporter) = init_report();
    let code = generate_code(program, roots, SizegenOptions::default(), &reporter).unwrap();

    let mut fs = MemoryFs::default();
    write_generated_code(&code, &OutputOptions::default(), &mut fs, &reporter).unwrap();

    let diagnostics = report.collect();
    assert!(diagnostics.errors.is_empty(), "{:?}", diagnostics.errors);
    Output {
        files: fs.files(),
        warnings: diagnostics.warnings,
    }
}

/// Indented Go source, four spaces to a tab.
fn go(source: &str) -> String {
    let source = unindent::unindent(source);
    format!("{}\n", source.trim_end().replace("    ", "\t"))
}

#[test]
fn pod_root_writes_nothing() {
    let program = program([model([TypeDecl::new(
        "Leaf",
        Type::structure([
            ("a", Type::basic(BasicKind::Int32)),
            ("b", Type::basic(BasicKind::Int32)),
        ]),
    )])]);

    let output = run(&program, &["example.com/app/model.Leaf"]);
    assert!(output.files.is_empty(), "{:?}", output.files);
    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
}

#[test]
fn slice_of_words() {
    let program = program([model([TypeDecl::new(
        "WithSlice",
        Type::structure([("xs", Type::slice(Type::basic(BasicKind::Int64)))]),
    )])]);

    let output = run(&program, &["example.com/app/model.WithSlice"]);
    similar_asserts::assert_eq!(
        output.file(OUTPUT),
        go("
            // Code generated by sizegen. DO NOT EDIT.

            package model

            func (cached *WithSlice) CachedSize(alloc bool) int64 {
                if cached == nil {
                    return int64(0)
                }
                size := int64(0)
                if alloc {
                    size += int64(24)
                }
                // field xs []int64
                {
                    size += int64(cap(cached.xs)) * int64(8)
                }
                return size
            }
        ")
    );
}

#[test]
fn self_referential_struct() {
    let program = program([model([TypeDecl::new(
        "Recursive",
        Type::structure([
            ("next", Type::pointer(named("Recursive"))),
            ("payload", string()),
        ]),
    )])]);

    let output = run(&program, &["example.com/app/model.Recursive"]);
    similar_asserts::assert_eq!(
        output.file(OUTPUT),
        go("
            // Code generated by sizegen. DO NOT EDIT.

            package model

            func (cached *Recursive) CachedSize(alloc bool) int64 {
                if cached == nil {
                    return int64(0)
                }
                size := int64(0)
                if alloc {
                    size += int64(24)
                }
                // field next *example.com/app/model.Recursive
                size += cached.next.CachedSize(true)
                // field payload string
                size += int64(len(cached.payload))
                return size
            }
        ")
    );
}

#[test]
fn nested_structs_delegate() {
    let program = program([model([
        TypeDecl::new("Parent", Type::structure([("child", named("Child"))])),
        TypeDecl::new("Child", Type::structure([("name", string())])),
    ])]);

    let output = run(
        &program,
        &["example.com/app/model.Parent", "example.com/app/model.Child"],
    );
    similar_asserts::assert_eq!(
        output.file(OUTPUT),
        go("
            // Code generated by sizegen. DO NOT EDIT.

            package model

            func (cached *Child) CachedSize(alloc bool) int64 {
                if cached == nil {
                    return int64(0)
                }
                size := int64(0)
                if alloc {
                    size += int64(16)
                }
                // field name string
                size += int64(len(cached.name))
                return size
            }

            func (cached *Parent) CachedSize(alloc bool) int64 {
                if cached == nil {
                    return int64(0)
                }
                size := int64(0)
                if alloc {
                    size += int64(16)
                }
                // field child example.com/app/model.Child
                size += cached.child.CachedSize(false)
                return size
            }
        ")
    );
}

fn interface_program() -> Program {
    program([model([
        TypeDecl::new("Holder", Type::structure([("v", named("Iface"))])),
        TypeDecl::new("Iface", Type::interface(["Describe"])),
        TypeDecl::new("ImplA", Type::structure([("label", string())])).with_method("Describe", false),
        TypeDecl::new("ImplB", Type::structure([("tags", Type::slice(string()))]))
            .with_method("Describe", true),
    ])])
}

#[test]
fn interface_field_pulls_in_implementations() {
    let output = run(&interface_program(), &["example.com/app/model.Holder"]);
    similar_asserts::assert_eq!(
        output.file(OUTPUT),
        go("
            // Code generated by sizegen. DO NOT EDIT.

            package model

            type cachedObject interface {
                CachedSize(alloc bool) int64
            }

            func (cached *Holder) CachedSize(alloc bool) int64 {
                if cached == nil {
                    return int64(0)
                }
                size := int64(0)
                if alloc {
                    size += int64(16)
                }
                // field v example.com/app/model.Iface
                if cc, ok := cached.v.(cachedObject); ok {
                    size += cc.CachedSize(true)
                }
                return size
            }

            func (cached *ImplA) CachedSize(alloc bool) int64 {
                if cached == nil {
                    return int64(0)
                }
                size := int64(0)
                if alloc {
                    size += int64(16)
                }
                // field label string
                size += int64(len(cached.label))
                return size
            }

            func (cached *ImplB) CachedSize(alloc bool) int64 {
                if cached == nil {
                    return int64(0)
                }
                size := int64(0)
                if alloc {
                    size += int64(24)
                }
                // field tags []string
                {
                    size += int64(cap(cached.tags)) * int64(16)
                    for _, elem := range cached.tags {
                        size += int64(len(elem))
                    }
                }
                return size
            }
        ")
    );
    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
}

#[test]
fn map_of_strings() {
    let program = program([model([TypeDecl::new(
        "Bag",
        Type::structure([(
            "m",
            Type::map(string(), Type::basic(BasicKind::Int32)),
        )]),
    )])]);

    let output = run(&program, &["example.com/app/model.Bag"]);
    similar_asserts::assert_eq!(
        output.file(OUTPUT),
        go("
            // Code generated by sizegen. DO NOT EDIT.

            package model

            import (
                \"math\"
                \"reflect\"
                \"unsafe\"
            )

            //go:nocheckptr
            func (cached *Bag) CachedSize(alloc bool) int64 {
                if cached == nil {
                    return int64(0)
                }
                size := int64(0)
                if alloc {
                    size += int64(8)
                }
                // field m map[string]int32
                if cached.m != nil {
                    size += int64(48)
                    hmap := reflect.ValueOf(cached.m)
                    numBuckets := int(math.Pow(2, float64(*(*uint8)(unsafe.Pointer(hmap.Pointer() + uintptr(9))))))
                    numOldBuckets := int(*(*uint16)(unsafe.Pointer(hmap.Pointer() + uintptr(10))))
                    size += int64(numOldBuckets) * int64(176)
                    if len(cached.m) > 0 || numBuckets > 1 {
                        size += int64(numBuckets) * int64(176)
                    }
                    for k := range cached.m {
                        size += int64(len(k))
                    }
                }
                return size
            }
        ")
    );
}

#[test]
fn map_header_follows_the_target() {
    let bag = model([TypeDecl::new(
        "Bag",
        Type::structure([("m", Type::map(string(), Type::basic(BasicKind::Int32)))]),
    )]);
    let program = Program::new(
        module("/src/app"),
        TargetLayout::for_arch("386").unwrap(),
        [bag],
    )
    .unwrap();

    let output = run(&program, &["example.com/app/model.Bag"]);
    let source = output.file(OUTPUT);
    // 8 tophash bytes, 8 strings of 8 bytes, 8 int32s, one overflow pointer
    assert!(source.contains("\t\tsize += int64(numOldBuckets) * int64(108)\n"), "{source}");
    assert!(source.contains("\t\tsize += int64(28)\n"), "{source}");
    assert!(source.contains("uintptr(5)"), "{source}");
    assert!(source.contains("uintptr(6)"), "{source}");
}

#[test]
fn one_byte_slices_have_no_loop() {
    let program = program([model([TypeDecl::new(
        "Buffer",
        Type::structure([("data", Type::slice(Type::basic(BasicKind::Uint8)))]),
    )])]);

    let output = run(&program, &["example.com/app/model.Buffer"]);
    let source = output.file(OUTPUT);
    assert!(source.contains("\tsize += int64(cap(cached.data))\n"), "{source}");
    assert!(!source.contains("range"), "{source}");
}

#[test]
fn zero_size_types_get_no_method() {
    let program = program([model([
        TypeDecl::new("Empty", Type::structure(Vec::<(String, Type)>::new())),
        TypeDecl::new(
            "Wrapper",
            Type::structure([
                ("e", named("Empty")),
                ("s", Type::slice(named("Empty"))),
            ]),
        ),
    ])]);

    let output = run(
        &program,
        &["example.com/app/model.Empty", "example.com/app/model.Wrapper"],
    );
    let source = output.file(OUTPUT);
    assert!(!source.contains("*Empty"), "{source}");
    assert!(source.contains("func (cached *Wrapper) CachedSize"), "{source}");
    assert!(!source.contains("// field"), "{source}");
}

#[test]
fn mutual_recursion_terminates() {
    let program = program([model([
        TypeDecl::new(
            "A",
            Type::structure([("b", Type::pointer(named("B"))), ("name", string())]),
        ),
        TypeDecl::new(
            "B",
            Type::structure([("a", Type::pointer(named("A"))), ("bs", Type::slice(named("B")))]),
        ),
    ])]);

    let output = run(&program, &["example.com/app/model.A"]);
    let source = output.file(OUTPUT);
    assert_eq!(source.matches("func (cached *A) CachedSize").count(), 1, "{source}");
    assert_eq!(source.matches("func (cached *B) CachedSize").count(), 1, "{source}");
}

#[test]
fn recursive_named_map_stops_at_itself() {
    let program = program([model([
        TypeDecl::new("Tree", Type::map(string(), named("Tree"))),
        TypeDecl::new("Doc", Type::structure([("root", named("Tree"))])),
    ])]);

    let output = run(&program, &["example.com/app/model.Doc"]);
    let source = output.file(OUTPUT);
    // 8 tophash bytes, 8 strings, 8 map pointers, one overflow pointer
    assert!(source.contains("\t\tsize += int64(numOldBuckets) * int64(208)\n"), "{source}");
    assert!(
        source.contains("\t\tfor k := range cached.root {\n\t\t\tsize += int64(len(k))\n\t\t}\n"),
        "{source}"
    );
    assert_eq!(source.matches("range").count(), 1, "{source}");
    assert_eq!(
        output.warnings,
        ["example.com/app/model.Tree: recursive type, values nested inside itself are not accounted for"]
    );
}

#[test]
fn recursive_named_slice_stops_at_itself() {
    let program = program([model([
        TypeDecl::new("L", Type::slice(named("L"))),
        TypeDecl::new("Forest", Type::structure([("trees", named("L"))])),
    ])]);

    let output = run(&program, &["example.com/app/model.Forest"]);
    let source = output.file(OUTPUT);
    assert!(
        source.contains("\t{\n\t\tsize += int64(cap(cached.trees)) * int64(24)\n\t}\n"),
        "{source}"
    );
    assert!(!source.contains("range"), "{source}");
    assert_eq!(output.warnings.len(), 1, "{:?}", output.warnings);
    assert!(output.warnings[0].starts_with("example.com/app/model.L: recursive type"));
}

#[test]
fn output_is_deterministic() {
    let roots = [
        "example.com/app/model.ImplB",
        "example.com/app/model.Holder",
        "example.com/app/model.ImplA",
    ];
    let mut reversed = roots;
    reversed.reverse();

    let first = run(&interface_program(), &roots);
    let second = run(&interface_program(), &reversed);
    assert_eq!(first.files, second.files);
}

#[test]
fn foreign_types() {
    const FOREIGN: &str = "github.com/other/lib";

    let lib = Package::new(FOREIGN, "lib").with_type(TypeDecl::new(
        "Thing",
        Type::structure([("names", Type::slice(string()))]),
    ));
    let local = model([TypeDecl::new(
        "Owner",
        Type::structure([("thing", Type::pointer(Type::named(FOREIGN, "Thing")))]),
    )]);
    let program = program([lib, local]);

    let output = run(
        &program,
        &["example.com/app/model.Owner", "github.com/other/lib.Thing"],
    );

    // Only the local package gets a file.
    assert_eq!(
        output.files.keys().map(|path| path.as_str()).collect::<Vec<_>>(),
        [OUTPUT]
    );
    let source = output.file(OUTPUT);
    assert!(
        source.contains("\tif cached.thing != nil {\n\t\tsize += int64(24)\n\t}\n"),
        "{source}"
    );

    assert_eq!(output.warnings.len(), 2, "{:?}", output.warnings);
    assert!(output.warnings[0].starts_with("github.com/other/lib.Thing: size of external type"));
    assert!(output.warnings[1].starts_with("github.com/other/lib: package is not part of module"));
}

#[test]
fn rerunning_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8Path::from_path(dir.path()).unwrap();
    let program = Program::new(
        module(root),
        TargetLayout::amd64(),
        [model([
            TypeDecl::new("Holder", Type::structure([("v", named("Iface"))])),
            TypeDecl::new("Iface", Type::interface(["Describe"])),
            TypeDecl::new("ImplA", Type::structure([("label", string())]))
                .with_method("Describe", false),
        ])],
    )
    .unwrap();

    let options = OutputOptions {
        license_header: Some("Copyright 2024 The App Authors.\nAll rights reserved.".to_owned()),
    };
    let (report, reporter) = init_report();
    let code = generate_code(
        &program,
        &["example.com/app/model.Holder"],
        SizegenOptions::default(),
        &reporter,
    )
    .unwrap();

    let written = write_generated_code(&code, &options, &mut RealFs, &reporter).unwrap();
    assert_eq!(written, [root.join("model").join("cached_size.go")]);
    let source = std::fs::read_to_string(&written[0]).unwrap();
    assert!(
        source.starts_with(
            "/*\nCopyright 2024 The App Authors.\nAll rights reserved.\n*/\n\
             // Code generated by sizegen. DO NOT EDIT.\n"
        ),
        "{source}"
    );

    let mut check = CheckFs::default();
    write_generated_code(&code, &options, &mut check, &reporter).unwrap();
    assert!(check.stale_files().is_empty());

    // The same run without field comments renders differently.
    let code = generate_code(
        &program,
        &["example.com/app/model.Holder"],
        SizegenOptions {
            field_comments: false,
        },
        &reporter,
    )
    .unwrap();
    let mut check = CheckFs::default();
    write_generated_code(&code, &options, &mut check, &reporter).unwrap();
    assert_eq!(check.stale_files(), written);

    assert!(report.finalize(true));
}
