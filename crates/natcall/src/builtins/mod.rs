//! Dynamic-typed entry points over the global registry.

mod ffi_call;
mod ffi_load;

pub use ffi_call::ffi_call;
pub use ffi_load::{ffi_load, ffi_load_signatures};

use crate::error::FfiError;
use crate::value::Value;

fn want_name(
    value: &Value,
    function: &str,
    index: usize,
    expected: &'static str,
) -> Result<String, FfiError> {
    match value {
        Value::Str(s) => Ok(s.clone()),
        other => Err(FfiError::ArgumentType {
            function: function.to_string(),
            index,
            expected,
            got: other.kind().to_string(),
        }),
    }
}
