//! Native library loading and entry-point binding.

use libloading::{Library, Symbol};
use std::ffi::{c_void, CString};
use std::path::{Path, PathBuf};

use crate::call;
use crate::error::FfiError;
use crate::types::Signature;
use crate::value::Value;

/// A loaded native library.
///
/// Handles live until dropped; libraries placed in the global registry are
/// never dropped and persist to process exit.
#[derive(Debug)]
pub struct NativeLibrary {
    /// The underlying library handle
    library: Library,
    /// Path to the library (for diagnostics)
    path: String,
}

impl NativeLibrary {
    /// Load a native library from an exact path.
    ///
    /// Fails with [`FfiError::Load`] when the path does not exist or the
    /// artifact is incompatible with the current process architecture.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FfiError> {
        let path = path.as_ref();
        log::debug!("loading native library '{}'", path.display());

        let library = unsafe { Library::new(path) }.map_err(|e| FfiError::Load {
            path: path.display().to_string(),
            source: e,
        })?;

        Ok(Self {
            library,
            path: path.display().to_string(),
        })
    }

    /// Load a library by base name, searching standard paths.
    ///
    /// The name maps to the platform file name (`libname.so`, `libname.dylib`,
    /// `name.dll`). Candidate directories are the current directory and each
    /// entry of `NATCALL_LIBRARY_PATH`; the system loader is the last resort.
    pub fn load_by_name(name: &str) -> Result<Self, FfiError> {
        let file_name = platform_library_name(name);

        for dir in search_dirs() {
            let candidate = dir.join(&file_name);
            if candidate.exists() {
                return Self::load(candidate);
            }
        }

        log::debug!("'{file_name}' not on the search path, trying the system loader");
        let library = unsafe { Library::new(&file_name) }.map_err(|e| FfiError::Load {
            path: file_name.clone(),
            source: e,
        })?;

        Ok(Self {
            library,
            path: file_name,
        })
    }

    /// Resolve the entry point named by `signature` and fix its marshalling
    /// contract.
    ///
    /// Fails with [`FfiError::SymbolNotFound`] when the entry point is
    /// absent. The declared types cannot be checked against the native
    /// definition; a mismatch is undefined behavior at call time.
    pub fn bind(&self, signature: Signature) -> Result<BoundFunction<'_>, FfiError> {
        unsafe {
            self.get::<*mut c_void>(&signature.name)?;
        }
        log::debug!(
            "bound '{}' in '{}' as {}",
            signature.name,
            self.path,
            signature
        );
        Ok(BoundFunction {
            library: self,
            signature,
        })
    }

    /// Get a typed symbol from the library.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the type `F` matches the actual native
    /// definition of the symbol.
    pub unsafe fn get<F>(&self, name: &str) -> Result<Symbol<'_, F>, FfiError> {
        let c_name =
            CString::new(name).map_err(|_| FfiError::InvalidSymbolName(name.to_string()))?;

        self.library
            .get(c_name.as_bytes_with_nul())
            .map_err(|e| FfiError::SymbolNotFound {
                symbol: name.to_string(),
                library: self.path.clone(),
                source: e,
            })
    }

    /// Get the path this library was loaded from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A resolved entry point paired with its declared signature.
#[derive(Debug)]
pub struct BoundFunction<'lib> {
    library: &'lib NativeLibrary,
    signature: Signature,
}

impl BoundFunction<'_> {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Invoke the entry point.
    ///
    /// Each argument is converted to its declared native representation, the
    /// call blocks until the native function returns, and the return value
    /// is converted back (`Value::Unit` for void). Output-buffer arguments
    /// are written in place and observed through `args` afterwards.
    ///
    /// Marshalling problems (arity, value types, buffer lengths, shapes
    /// outside the dispatch table) fail before any native code runs. A
    /// declared signature that does not match the native definition faults
    /// the process instead.
    pub fn call(&self, args: &mut [Value]) -> Result<Value, FfiError> {
        call::dispatch(self.library, &self.signature, args)
    }
}

/// The platform-specific file name for a library base name.
pub fn platform_library_name(name: &str) -> String {
    #[cfg(target_os = "windows")]
    {
        format!("{name}.dll")
    }
    #[cfg(target_os = "macos")]
    {
        format!("lib{name}.dylib")
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        format!("lib{name}.so")
    }
}

/// Directories probed by [`NativeLibrary::load_by_name`], in order.
fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(".")];
    if let Ok(raw) = std::env::var("NATCALL_LIBRARY_PATH") {
        dirs.extend(std::env::split_paths(&raw));
    }
    dirs
}
