//! Declared marshalling types for native entry points.

use std::fmt;

/// Primitive kinds a record field may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    I32,
    I64,
    F32,
    F64,
}

impl ScalarKind {
    /// Parse a kind from its textual name, accepting the usual C aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "i32" | "int" | "int32" => Some(ScalarKind::I32),
            "i64" | "int64" | "long" => Some(ScalarKind::I64),
            "f32" | "float" => Some(ScalarKind::F32),
            "f64" | "double" => Some(ScalarKind::F64),
            _ => None,
        }
    }

    pub fn byte_width(self) -> usize {
        match self {
            ScalarKind::I32 | ScalarKind::F32 => 4,
            ScalarKind::I64 | ScalarKind::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
        }
    }
}

/// One field of a record layout.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub kind: ScalarKind,
}

impl RecordField {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A named, fixed-order record layout.
///
/// The layout must match the native `struct` definition bit-for-bit; decode
/// walks the fields in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub name: String,
    pub fields: Vec<RecordField>,
}

impl RecordLayout {
    pub fn new(name: impl Into<String>, fields: Vec<RecordField>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// The two field kinds of a pair layout, if this is one.
    pub fn kind_pair(&self) -> Option<(ScalarKind, ScalarKind)> {
        match self.fields.as_slice() {
            [first, second] => Some((first.kind, second.kind)),
            _ => None,
        }
    }

    /// Total size in bytes under C layout rules: each field aligned to its
    /// own width, the whole record padded out to the widest field.
    pub fn byte_width(&self) -> usize {
        let mut offset = 0usize;
        let mut max_align = 1usize;
        for field in &self.fields {
            let width = field.kind.byte_width();
            max_align = max_align.max(width);
            offset = (offset + width - 1) / width * width + width;
        }
        (offset + max_align - 1) / max_align * max_align
    }
}

/// A declared native type in argument or return position.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeType {
    I32,
    I64,
    F32,
    F64,
    /// Single byte, marshalled from a one-character host value.
    Char,
    /// Null-terminated byte string, borrowed for the duration of the call.
    CStr,
    /// Caller-owned `u64` output buffer passed by mutable pointer.
    MutBufU64,
    /// By-value record return. Return position only.
    Record(RecordLayout),
    /// Return position only.
    Void,
}

impl NativeType {
    /// Parse a type from its textual name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(kind) = ScalarKind::parse(s) {
            return Some(NativeType::from_scalar(kind));
        }
        match s.to_lowercase().as_str() {
            "char" => Some(NativeType::Char),
            "cstr" | "string" => Some(NativeType::CStr),
            "ptr_mut<u64>" | "ptr_mut<uint64>" => Some(NativeType::MutBufU64),
            "void" => Some(NativeType::Void),
            _ => None,
        }
    }

    pub fn from_scalar(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::I32 => NativeType::I32,
            ScalarKind::I64 => NativeType::I64,
            ScalarKind::F32 => NativeType::F32,
            ScalarKind::F64 => NativeType::F64,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::I32 => write!(f, "i32"),
            NativeType::I64 => write!(f, "i64"),
            NativeType::F32 => write!(f, "f32"),
            NativeType::F64 => write!(f, "f64"),
            NativeType::Char => write!(f, "char"),
            NativeType::CStr => write!(f, "cstr"),
            NativeType::MutBufU64 => write!(f, "ptr_mut<u64>"),
            NativeType::Record(layout) => write!(f, "{}", layout.name),
            NativeType::Void => write!(f, "void"),
        }
    }
}

/// A declared entry-point signature.
///
/// The declared types must match the native function's actual calling
/// convention exactly; there is no way to verify this at runtime and a
/// mismatch is undefined behavior at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Entry-point name in the native library.
    pub name: String,
    pub args: Vec<NativeType>,
    pub ret: NativeType,
}

impl Signature {
    pub fn new(name: impl Into<String>, args: Vec<NativeType>, ret: NativeType) -> Self {
        Self {
            name: name.into(),
            args,
            ret,
        }
    }

    /// Signature of a unary scalar function: (f64) -> f64
    pub fn scalar_unary(name: impl Into<String>) -> Self {
        Self::new(name, vec![NativeType::F64], NativeType::F64)
    }

    /// Signature of a binary scalar function: (f64, f64) -> f64
    pub fn scalar_binary(name: impl Into<String>) -> Self {
        Self::new(name, vec![NativeType::F64, NativeType::F64], NativeType::F64)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}
