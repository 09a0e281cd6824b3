//! Dynamic library loading for plugin shared objects.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use thiserror::Error;
use tracing::debug;

use rotor_core::plugin::{PLUGIN_FACTORY_SYMBOL, PluginFactory};

/// Errors from opening a shared object or resolving its symbols. Both carry
/// the OS diagnostic.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open library '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("failed to resolve symbol '{symbol}' in '{path}': {source}")]
    Symbol {
        path: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },
}

/// An owned handle to a loaded shared object.
///
/// The handle closes the library on drop. Anything the library vended
/// (plugins above all) must be dropped first; the runtime enforces this by
/// holding its libraries in a vector destroyed after its plugins.
#[derive(Debug)]
pub struct DynamicLib {
    library: Library,
    path: PathBuf,
}

impl DynamicLib {
    /// Opens the shared object at `path` with lazy symbol binding and local
    /// visibility.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = path.into();
        let library = open_library(&path).map_err(|source| LoadError::Open {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "loaded library");
        Ok(Self { library, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves a typed symbol.
    ///
    /// # Safety
    ///
    /// The caller must supply the symbol's true type; the library cannot be
    /// unloaded while the symbol is in use.
    pub unsafe fn get<T>(&self, symbol: &[u8]) -> Result<Symbol<'_, T>, LoadError> {
        unsafe { self.library.get(symbol) }.map_err(|source| LoadError::Symbol {
            path: self.path.clone(),
            symbol: String::from_utf8_lossy(symbol).into_owned(),
            source,
        })
    }

    /// Resolves the plugin factory this library must export.
    ///
    /// The returned function pointer is only valid while this library stays
    /// open.
    pub fn plugin_factory(&self) -> Result<PluginFactory, LoadError> {
        let symbol: Symbol<'_, PluginFactory> =
            unsafe { self.get(PLUGIN_FACTORY_SYMBOL) }?;
        Ok(*symbol)
    }
}

impl Drop for DynamicLib {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "closing library");
    }
}

#[cfg(unix)]
fn open_library(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix;
    unsafe { unix::Library::open(Some(path), unix::RTLD_LAZY | unix::RTLD_LOCAL) }.map(Into::into)
}

#[cfg(not(unix))]
fn open_library(path: &Path) -> Result<Library, libloading::Error> {
    unsafe { Library::new(path) }
}
