//! Error taxonomy for the native call boundary.
//!
//! Only two kinds are recoverable in the sense of the boundary contract:
//! [`FfiError::Load`] and [`FfiError::SymbolNotFound`]. The remaining
//! variants are host-side rejections raised *before* any native code runs.
//! A declared signature that does not match the true native calling
//! convention is not detectable here and faults the process instead.

use thiserror::Error;

use crate::parser::ParseError;

#[derive(Debug, Error)]
pub enum FfiError {
    /// The artifact is missing or incompatible with the current process.
    #[error("failed to load library '{path}': {source}")]
    Load {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// The entry point is absent from the loaded library.
    #[error("function '{symbol}' not found in '{library}': {source}")]
    SymbolNotFound {
        symbol: String,
        library: String,
        #[source]
        source: libloading::Error,
    },

    /// The symbol name contains an interior NUL byte.
    #[error("invalid function name: {0}")]
    InvalidSymbolName(String),

    /// A signature file failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// `ffi_call` on a function with no declared signature.
    #[error("no declared signature for '{function}' in library '{library}'")]
    UnknownSignature { library: String, function: String },

    #[error("function '{function}' expects {expected} arguments, got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {index} of '{function}' must be {expected}, got {got}")]
    ArgumentType {
        function: String,
        index: usize,
        expected: &'static str,
        got: String,
    },

    /// An output buffer is shorter than the declared element count.
    #[error("buffer argument {index} of '{function}' holds {got} elements, call needs {need}")]
    BufferLength {
        function: String,
        index: usize,
        need: usize,
        got: usize,
    },

    /// The declared signature is outside the supported dispatch table.
    #[error("unsupported signature for '{function}': {signature}")]
    UnsupportedSignature { function: String, signature: String },

    #[error("{0}")]
    Registry(String),
}
