//! Static sizes and alignments of the target architecture.
//!
//! Sizes follow the Go `gc` toolchain: structs are padded to their alignment, a trailing
//! zero-size field takes up one byte, and complex numbers are aligned to half their size.

use crate::{Program, Type};

/// Layout of the runtime's hash map header (`runtime.hmap`, pre swiss-tables):
///
/// ```text
/// type hmap struct {
///     count      int
///     flags      uint8
///     B          uint8  // log_2 of # of buckets
///     noverflow  uint16 // approximate number of overflow buckets
///     hash0      uint32
///     buckets    unsafe.Pointer
///     oldbuckets unsafe.Pointer
///     nevacuate  uintptr
///     extra      *mapextra
/// }
/// ```
///
/// The generated code reads `B` and `noverflow` straight out of the live header, so this
/// must match the runtime the generated code is compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapHeaderLayout {
    /// `sizeof(hmap)`.
    pub size: i64,

    /// Byte offset of `B`.
    pub bucket_log_offset: i64,

    /// Byte offset of the 16-bit `noverflow` counter.
    pub old_bucket_count_offset: i64,

    /// Number of key/value slots per bucket.
    pub bucket_count: i64,
}

impl MapHeaderLayout {
    fn for_word_size(word_size: i64) -> Self {
        Self {
            size: 5 * word_size + 8,
            bucket_log_offset: word_size + 1,
            old_bucket_count_offset: word_size + 2,
            bucket_count: 8,
        }
    }
}

/// The fixed set of static sizes assumed by one generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    pub arch: String,
    pub word_size: i64,
    pub max_align: i64,
    pub map_header: MapHeaderLayout,
}

impl TargetLayout {
    /// The `GOARCH` values we know the `gc` sizes of.
    pub const KNOWN_ARCHS: [&'static str; 14] = [
        "386", "amd64", "arm", "arm64", "loong64", "mips", "mips64", "mips64le", "mipsle",
        "ppc64", "ppc64le", "riscv64", "s390x", "wasm",
    ];

    pub fn amd64() -> Self {
        Self::with_word_size("amd64", 8)
    }

    /// Layout for a `GOARCH`, or `None` if it isn't one of [`Self::KNOWN_ARCHS`].
    pub fn for_arch(arch: &str) -> Option<Self> {
        let word_size = match arch {
            "386" | "arm" | "mips" | "mipsle" => 4,
            "amd64" | "arm64" | "loong64" | "mips64" | "mips64le" | "ppc64" | "ppc64le"
            | "riscv64" | "s390x" | "wasm" => 8,
            _ => return None,
        };
        Some(Self::with_word_size(arch, word_size))
    }

    fn with_word_size(arch: &str, word_size: i64) -> Self {
        Self {
            arch: arch.to_owned(),
            word_size,
            max_align: word_size,
            map_header: MapHeaderLayout::for_word_size(word_size),
        }
    }

    pub fn pointer_size(&self) -> i64 {
        self.word_size
    }

    pub fn slice_header_size(&self) -> i64 {
        3 * self.word_size
    }

    /// Size of one map bucket: tophash bytes, then the keys, then the values, then the
    /// overflow pointer.
    pub fn map_bucket_size(&self, key_size: i64, value_size: i64) -> i64 {
        let slots = self.map_header.bucket_count;
        slots + slots * key_size + slots * value_size + self.pointer_size()
    }

    pub fn size_of(&self, program: &Program, typ: &Type) -> i64 {
        match typ {
            Type::Basic(kind) => {
                use crate::BasicKind as K;
                match kind {
                    K::Bool | K::Int8 | K::Uint8 => 1,
                    K::Int16 | K::Uint16 => 2,
                    K::Int32 | K::Uint32 | K::Float32 => 4,
                    K::Int64 | K::Uint64 | K::Float64 | K::Complex64 => 8,
                    K::Complex128 => 16,
                    K::Int | K::Uint | K::Uintptr | K::UnsafePointer => self.word_size,
                    K::String => 2 * self.word_size,
                }
            }
            Type::Named(_) => {
                let underlying = program.underlying(typ);
                if matches!(underlying, Type::Named(_)) {
                    log::debug!("no definition for {typ}, assuming it has no size");
                    0
                } else {
                    self.size_of(program, underlying)
                }
            }
            Type::Pointer(_) | Type::Map { .. } | Type::Chan(_) | Type::Func => self.word_size,
            Type::Slice(_) => self.slice_header_size(),
            Type::Interface(_) => 2 * self.word_size,
            Type::Array { len, elem } => {
                let len = i64::try_from(*len).unwrap_or(i64::MAX);
                if len == 0 {
                    return 0;
                }
                let elem_size = self.size_of(program, elem);
                let elem_align = self.align_of(program, elem);
                align(elem_size, elem_align)
                    .saturating_mul(len - 1)
                    .saturating_add(elem_size)
            }
            Type::Struct(st) => {
                if st.fields.is_empty() {
                    return 0;
                }

                let mut offset = 0;
                let mut last_offset = 0;
                let mut last_size = 0;
                for field in &st.fields {
                    offset = align(offset, self.align_of(program, &field.typ));
                    last_offset = offset;
                    last_size = self.size_of(program, &field.typ);
                    offset += last_size;
                }

                let mut size = last_offset + last_size;
                if last_offset > 0 && last_size == 0 {
                    // A pointer to a trailing zero-size field must not point past the struct.
                    size += 1;
                }
                align(size, self.align_of(program, typ))
            }
        }
    }

    pub fn align_of(&self, program: &Program, typ: &Type) -> i64 {
        match typ {
            Type::Named(_) => {
                let underlying = program.underlying(typ);
                if matches!(underlying, Type::Named(_)) {
                    1
                } else {
                    self.align_of(program, underlying)
                }
            }
            Type::Array { elem, .. } => self.align_of(program, elem),
            Type::Struct(st) => st
                .fields
                .iter()
                .map(|field| self.align_of(program, &field.typ))
                .max()
                .unwrap_or(1)
                .max(1),
            Type::Slice(_) | Type::Interface(_) => self.word_size,
            Type::Basic(kind) if kind.is_string() => self.word_size,
            Type::Basic(kind) => {
                let mut size = self.size_of(program, typ);
                if kind.is_complex() {
                    size /= 2;
                }
                size.clamp(1, self.max_align)
            }
            Type::Pointer(_) | Type::Map { .. } | Type::Chan(_) | Type::Func => {
                self.size_of(program, typ).clamp(1, self.max_align)
            }
        }
    }
}

/// Rounds `x` up to a multiple of `a`.
fn align(x: i64, a: i64) -> i64 {
    let y = x + a - 1;
    y - y % a
}
