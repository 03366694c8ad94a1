//! Process-global registry of loaded libraries and declared signatures.
//!
//! Libraries placed here are never unloaded; the handle is process-wide
//! state that persists until exit.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::FfiError;
use crate::library::NativeLibrary;
use crate::parser::SignatureFile;
use crate::types::Signature;

/// Loaded libraries and their signature files, keyed by base name.
#[derive(Default)]
pub struct LibraryRegistry {
    libraries: HashMap<String, NativeLibrary>,
    signatures: HashMap<String, SignatureFile>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&NativeLibrary> {
        self.libraries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.libraries.contains_key(name)
    }

    pub fn insert(&mut self, name: String, library: NativeLibrary) {
        self.libraries.insert(name, library);
    }

    pub fn signatures(&self, name: &str) -> Option<&SignatureFile> {
        self.signatures.get(name)
    }

    pub fn attach_signatures(&mut self, name: String, file: SignatureFile) {
        self.signatures.insert(name, file);
    }
}

static REGISTRY: Lazy<Mutex<LibraryRegistry>> = Lazy::new(|| Mutex::new(LibraryRegistry::new()));

/// The process-global registry.
pub fn global_registry() -> &'static Mutex<LibraryRegistry> {
    &REGISTRY
}

pub(crate) fn lock() -> Result<MutexGuard<'static, LibraryRegistry>, FfiError> {
    REGISTRY
        .lock()
        .map_err(|_| FfiError::Registry("failed to acquire library registry lock".to_string()))
}

/// Load a library by base name into the global registry. Idempotent: a name
/// that is already registered is left untouched.
pub fn load_library(name: &str) -> Result<(), FfiError> {
    let mut registry = lock()?;
    if registry.contains(name) {
        return Ok(());
    }
    let library = NativeLibrary::load_by_name(name)?;
    log::debug!("registered '{}' from '{}'", name, library.path());
    registry.insert(name.to_string(), library);
    Ok(())
}

/// Register an already loaded library under `name`, replacing any previous
/// entry. Lets embedders preload from exact paths.
pub fn register_library(name: &str, library: NativeLibrary) -> Result<(), FfiError> {
    let mut registry = lock()?;
    log::debug!("registered '{}' from '{}'", name, library.path());
    registry.insert(name.to_string(), library);
    Ok(())
}

/// Parse a signature file and attach it to `name`.
pub fn attach_signatures(name: &str, path: impl AsRef<Path>) -> Result<(), FfiError> {
    let file = SignatureFile::parse_file(path)?;
    let mut registry = lock()?;
    registry.attach_signatures(name.to_string(), file);
    Ok(())
}

/// The declared signature of `function` in `library`, if any.
pub fn signature_for(library: &str, function: &str) -> Result<Option<Signature>, FfiError> {
    let registry = lock()?;
    Ok(registry
        .signatures(library)
        .and_then(|file| file.get(function))
        .cloned())
}
