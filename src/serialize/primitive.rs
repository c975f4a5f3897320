//! The primitive-kind/value pair every format plugin writes and reads.
//!
//! The source exposes one free function per primitive kind
//! (`Char_serialize`, `SInt_serialize`, …, `original_source/SerializeTypes.h`).
//! This crate keeps the "one call site per kind" contract at the
//! [`crate::serialize::Serialize`] API (`write_char`, `write_s_int`, …) but
//! collapses the format-plugin side onto a single tagged
//! `write_primitive`/`read_primitive` pair, the same compression
//! `serde::Serializer`'s `serialize_i8`/`serialize_u8`/… family makes
//! reasonable in idiomatic Rust — each kind keeps its own entry point, the
//! plugin just dispatches on an enum instead of a sea of near-identical
//! `extern` functions.

/// One entry per kind in `original_source/SerializeTypes.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Char,
    SChar,
    UChar,
    SInt,
    USInt,
    Int,
    UInt,
    LInt,
    ULInt,
    LL,
    ULL,
    Float,
    Double,
    /// Rust has no portable 80/128-bit extended float; aliased to `f64`
    /// per `SPEC_FULL.md` §4.3, carrying forward the source's own
    /// "not really working!!!" caveat about this kind's portability.
    LDouble,
    String,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Char => "Char",
            PrimitiveKind::SChar => "SChar",
            PrimitiveKind::UChar => "UChar",
            PrimitiveKind::SInt => "SInt",
            PrimitiveKind::USInt => "USInt",
            PrimitiveKind::Int => "Int",
            PrimitiveKind::UInt => "UInt",
            PrimitiveKind::LInt => "LInt",
            PrimitiveKind::ULInt => "ULInt",
            PrimitiveKind::LL => "LL",
            PrimitiveKind::ULL => "ULL",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Double => "Double",
            PrimitiveKind::LDouble => "LDouble",
            PrimitiveKind::String => "String",
        }
    }
}

/// The boxed value that crosses the `Serialize` → `Format` boundary for a
/// single leaf. `String`'s declared max length travels alongside the value
/// on write (to bound the wire encoding) and is supplied by the caller on
/// read.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Char(u8),
    SChar(i8),
    UChar(u8),
    SInt(i16),
    USInt(u16),
    Int(i32),
    UInt(u32),
    LInt(i64),
    ULInt(u64),
    LL(i64),
    ULL(u64),
    Float(f32),
    Double(f64),
    LDouble(f64),
    String(String),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Char(_) => PrimitiveKind::Char,
            Primitive::SChar(_) => PrimitiveKind::SChar,
            Primitive::UChar(_) => PrimitiveKind::UChar,
            Primitive::SInt(_) => PrimitiveKind::SInt,
            Primitive::USInt(_) => PrimitiveKind::USInt,
            Primitive::Int(_) => PrimitiveKind::Int,
            Primitive::UInt(_) => PrimitiveKind::UInt,
            Primitive::LInt(_) => PrimitiveKind::LInt,
            Primitive::ULInt(_) => PrimitiveKind::ULInt,
            Primitive::LL(_) => PrimitiveKind::LL,
            Primitive::ULL(_) => PrimitiveKind::ULL,
            Primitive::Float(_) => PrimitiveKind::Float,
            Primitive::Double(_) => PrimitiveKind::Double,
            Primitive::LDouble(_) => PrimitiveKind::LDouble,
            Primitive::String(_) => PrimitiveKind::String,
        }
    }
}
