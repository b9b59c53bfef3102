//! Package loading: finding, filtering, parsing and checking the files of a
//! package and its imports, with a shared cache.
//!
//! [`PackageCache`] is the entry point. It resolves an import path or a
//! directory to a [`Package`], building each package at most once per cache
//! key even when many threads ask for it at the same time.

mod cache;
pub mod config;
pub mod constraint;
pub mod filter;
pub mod fs;
mod package;
pub mod resolver;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

pub use cache::{CacheKey, CacheStats, PackageCache};
pub use config::BuildConfig;
pub use filter::{DefaultFilter, FileFilter};
pub use fs::{FileSystem, MemFs, OsFs};
pub use package::{Package, Report};
pub use resolver::{DefaultResolver, ImportResolver};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("no buildable Go source files in {dir}")]
    NoGoFiles { dir: String },

    #[error("invalid import path: {path:?}")]
    InvalidImportPath { path: String },

    #[error("cannot find package {path:?}")]
    NotFound { path: String, searched: Vec<String> },

    #[error("import cycle not allowed: {}", .cycle.join(" -> "))]
    ImportCycle { cycle: Vec<String> },

    #[error("found packages {first} and {second} in {dir}")]
    MixedPackages {
        dir: String,
        first: String,
        second: String,
    },

    #[error("{file}: {message}")]
    Constraint { file: String, message: String },

    #[error("checking {path}: {message}")]
    Check { path: String, message: String },

    #[error("cannot start worker pool: {0}")]
    Pool(String),
}

impl BuildError {
    pub(crate) fn io(path: &Path, e: &std::io::Error) -> Self {
        BuildError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    }
}

/// Loads the package in `dir` from the real file system with a fresh cache
/// and returns it with its diagnostics as reports.
pub fn load(dir: &Path, cfg: BuildConfig) -> Result<(Arc<Package>, Vec<Report>), BuildError> {
    let cache = PackageCache::new(cfg, Arc::new(OsFs))?;
    let pkg = cache.load_dir(dir)?;
    let reports = pkg.reports();
    Ok((pkg, reports))
}
