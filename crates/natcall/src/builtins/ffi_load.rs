//! `ffi_load` - Load a native library.

use super::want_name;
use crate::error::FfiError;
use crate::registry;
use crate::value::Value;

/// Load a native shared library for later `ffi_call` use.
///
/// `ffi_load(&Value::Str("cfunctions".into()))` maps the base name to the
/// platform file name (`libcfunctions.so`, `libcfunctions.dylib`,
/// `cfunctions.dll`) and registers the handle process-wide. Loading an
/// already registered name is a no-op.
pub fn ffi_load(lib_name: &Value) -> Result<Value, FfiError> {
    let name = want_name(lib_name, "ffi_load", 0, "a library name string")?;
    registry::load_library(&name)?;
    Ok(Value::Bool(true))
}

/// Attach a `.ffi` signature file to a library name.
///
/// Subsequent `ffi_call`s against `lib_name` are dispatched through the
/// declared signatures; record layouts named in the file drive record
/// decoding.
pub fn ffi_load_signatures(lib_name: &Value, path: &Value) -> Result<Value, FfiError> {
    let name = want_name(lib_name, "ffi_load_signatures", 0, "a library name string")?;
    let path = want_name(path, "ffi_load_signatures", 1, "a signature file path")?;
    registry::attach_signatures(&name, &path)?;
    Ok(Value::Bool(true))
}
