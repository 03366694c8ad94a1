//! Foreign function interface boundary for dynamic-typed host values.
//!
//! This crate loads native shared libraries (.dll/.so/.dylib), declares each
//! entry point's argument and return marshalling contract, and invokes the
//! entry points with automatic conversion between [`Value`]s and native
//! representations: integers, floats, single characters, null-terminated
//! strings, by-value records decoded field-by-field, and caller-owned output
//! buffers written in place by the native side.
//!
//! # Example
//!
//! ```no_run
//! use natcall::{ffi_call, ffi_load, ffi_load_signatures, Value};
//!
//! # fn main() -> Result<(), natcall::FfiError> {
//! let lib = Value::Str("cfunctions".into());
//! ffi_load(&lib)?;
//! ffi_load_signatures(&lib, &Value::Str("cfunctions.ffi".into()))?;
//!
//! let mut args = vec![Value::Int(9)];
//! let result = ffi_call(&lib, &Value::Str("fib".into()), &mut args)?;
//! assert_eq!(result, Value::Int(34));
//! # Ok(())
//! # }
//! ```
//!
//! # Signature Files
//!
//! Marshalling contracts live in `.ffi` signature files:
//!
//! ```text
//! # cfunctions.ffi
//! record Result { N: i32, L: f32 }
//!
//! fib: (i32) -> i32
//! weird_function: (i32, f32, char) -> f64
//! hello: (cstr) -> void
//! simulate: (f32, f32) -> Result
//! fib_sequence: (i32, ptr_mut<u64>, ptr_mut<u64>) -> i32
//! ```
//!
//! Load with `ffi_load_signatures`, or build [`Signature`]s in code and bind
//! them with [`NativeLibrary::bind`].
//!
//! # Supported Call Shapes
//!
//! Calls are dispatched over an enumerated table of ABI shapes (all-f64
//! scalar functions up to five arguments, unary integer functions, the
//! mixed `(i32, f32, char) -> f64` shape, string-consuming void functions,
//! two-field record returns, and paired u64 output buffers). A declared
//! signature outside the table is rejected with
//! [`FfiError::UnsupportedSignature`] before any native code runs.
//!
//! # Safety
//!
//! The declared types fix how values cross the boundary, but nothing can
//! verify them against the native library's actual definitions. A wrong
//! declaration is undefined behavior at call time: the process may return
//! garbage or fault. Loading and symbol resolution, by contrast, fail with
//! recoverable errors ([`FfiError::Load`], [`FfiError::SymbolNotFound`]).

mod call;
mod error;
mod library;
mod parser;
mod registry;
mod types;
mod value;

pub mod builtins;

pub use builtins::{ffi_call, ffi_load, ffi_load_signatures};
pub use error::FfiError;
pub use library::{platform_library_name, BoundFunction, NativeLibrary};
pub use parser::{ParseError, SignatureFile};
pub use registry::{
    attach_signatures, global_registry, load_library, register_library, signature_for,
    LibraryRegistry,
};
pub use types::{NativeType, RecordField, RecordLayout, ScalarKind, Signature};
pub use value::{RecordValue, Value};
