//! Import path validation and lookup.

use std::path::{Path, PathBuf};

use tracing::trace;

use super::fs::FileSystem;
use super::BuildError;

pub trait ImportResolver: Send + Sync {
    /// Directory holding the package `path` imported from `from_dir`.
    /// `go_minor` is the language version of the importing package.
    fn resolve(
        &self,
        fs: &dyn FileSystem,
        from_dir: &Path,
        path: &str,
        go_minor: u32,
    ) -> Result<PathBuf, BuildError>;
}

/// Characters never allowed in an import path besides spaces and control
/// characters.
const BAD_CHARS: &str = "!\"#$%&'()*,:;<=>?[\\]^`{|}";

pub fn validate_import_path(path: &str) -> Result<(), BuildError> {
    let invalid = || BuildError::InvalidImportPath {
        path: path.to_string(),
    };
    if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
        return Err(invalid());
    }
    if path
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '\u{FFFD}' || BAD_CHARS.contains(c))
    {
        return Err(invalid());
    }
    if path.split('/').any(|el| el.is_empty() || el == "..") {
        return Err(invalid());
    }
    Ok(())
}

/// Looks in `<root>/src/<path>`, then in `<p>/src/<path>` and
/// `<p>/pkg/mod/<path>` for every dependency tree `p`. Paths starting with
/// `./` are relative to the importing directory.
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver {
    pub root: Option<PathBuf>,
    pub deps: Vec<PathBuf>,
}

impl DefaultResolver {
    pub fn new(root: Option<PathBuf>, deps: Vec<PathBuf>) -> Self {
        Self { root, deps }
    }

    fn candidates(&self, from_dir: &Path, path: &str) -> Vec<PathBuf> {
        if let Some(rel) = path.strip_prefix("./") {
            return vec![from_dir.join(rel)];
        }
        let mut out = Vec::with_capacity(1 + 2 * self.deps.len());
        if let Some(root) = &self.root {
            out.push(root.join("src").join(path));
        }
        for p in &self.deps {
            out.push(p.join("src").join(path));
            out.push(p.join("pkg").join("mod").join(path));
        }
        out
    }
}

impl ImportResolver for DefaultResolver {
    fn resolve(
        &self,
        fs: &dyn FileSystem,
        from_dir: &Path,
        path: &str,
        _go_minor: u32,
    ) -> Result<PathBuf, BuildError> {
        let checked = path.strip_prefix("./").unwrap_or(path);
        validate_import_path(checked)?;
        let candidates = self.candidates(from_dir, path);
        for dir in &candidates {
            if fs.metadata(dir).is_ok_and(|m| m.is_dir) {
                trace!(path, dir = %dir.display(), "resolved import");
                return Ok(dir.clone());
            }
        }
        Err(BuildError::NotFound {
            path: path.to_string(),
            searched: candidates.iter().map(|d| d.display().to_string()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::fs::MemFs;

    #[test]
    fn path_validation() {
        for ok in ["fmt", "net/http", "github.com/a-b/c_d.v2", "example.com/x~y"] {
            assert!(validate_import_path(ok).is_ok(), "{ok}");
        }
        for bad in ["", "/abs", "a/../b", "a//b", "a b", "a:b", "trailing/", "q\"uote", "tab\tx"] {
            assert!(
                matches!(validate_import_path(bad), Err(BuildError::InvalidImportPath { .. })),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn search_order() {
        let fs = MemFs::new();
        fs.insert("/goroot/src/fmt/print.go", "package fmt");
        fs.insert("/gopath/src/fmt/other.go", "package fmt");
        fs.insert("/gopath/pkg/mod/example.com/m/m.go", "package m");
        let r = DefaultResolver::new(Some("/goroot".into()), vec!["/gopath".into()]);
        let here = Path::new("/work");
        assert_eq!(r.resolve(&fs, here, "fmt", 25).unwrap(), PathBuf::from("/goroot/src/fmt"));
        assert_eq!(
            r.resolve(&fs, here, "example.com/m", 25).unwrap(),
            PathBuf::from("/gopath/pkg/mod/example.com/m")
        );
        match r.resolve(&fs, here, "missing/pkg", 25) {
            Err(BuildError::NotFound { searched, .. }) => assert_eq!(searched.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
