//! `ffi_call` - Call a declared function in a native library.

use super::want_name;
use crate::error::FfiError;
use crate::registry;
use crate::value::Value;

/// Call a function in a native shared library.
///
/// The library is loaded on first use if `ffi_load` has not run yet. The
/// function must have a declared signature (see
/// [`ffi_load_signatures`](super::ffi_load_signatures)); undeclared
/// functions are rejected rather than guessed at.
///
/// Arguments are taken as a mutable slice so output-buffer parameters can be
/// written in place: after the call returns, the caller observes the native
/// writes through the same `Value`s.
pub fn ffi_call(
    lib_name: &Value,
    func_name: &Value,
    args: &mut [Value],
) -> Result<Value, FfiError> {
    let library_name = want_name(lib_name, "ffi_call", 0, "a library name string")?;
    let function_name = want_name(func_name, "ffi_call", 1, "a function name string")?;

    registry::load_library(&library_name)?;

    let signature = registry::signature_for(&library_name, &function_name)?.ok_or_else(|| {
        FfiError::UnknownSignature {
            library: library_name.clone(),
            function: function_name.clone(),
        }
    })?;

    let registry = registry::lock()?;
    let library = registry.get(&library_name).ok_or_else(|| {
        FfiError::Registry(format!("library '{library_name}' missing from registry"))
    })?;

    let bound = library.bind(signature)?;
    bound.call(args)
}
