//! Loaded packages and the steps that build one from a directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use super::config::BuildConfig;
use super::constraint;
use super::filter::FileFilter;
use super::fs::{FileMeta, FileSystem};
use super::BuildError;
use crate::check::PackageInfo;
use crate::cst::{Spec, TopLevelDecl};
use crate::error::{DiagKind, DiagList, FileId, Span};
use crate::literal;
use crate::parser::{self, ParsedFile};
use crate::source::Source;

/// A parsed and, in check mode, type checked package.
#[derive(Debug)]
pub struct Package {
    pub name: Arc<str>,
    pub path: Arc<str>,
    pub dir: PathBuf,
    /// Every file that took part, in name order; `files[i].file` is
    /// `FileId(i)`. Files that failed to parse have no syntax tree.
    pub files: Vec<ParsedFile>,
    /// Distinct import paths in order of first appearance.
    pub imports: Vec<Arc<str>>,
    /// Imports that loaded.
    pub deps: IndexMap<Arc<str>, Arc<Package>>,
    /// Checked package-level objects, when checking was requested.
    pub info: Option<Arc<PackageInfo>>,
    pub diags: DiagList,
    /// Metadata of the directory and of every file read, for staleness.
    pub(crate) snapshot: Vec<(PathBuf, FileMeta)>,
}

/// A diagnostic resolved to a reported file position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
    pub kind: DiagKind,
    pub message: String,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: ", self.file, self.line, self.column)?;
        if !matches!(self.kind, DiagKind::Type | DiagKind::Declaration) {
            write!(f, "{}: ", self.kind.as_str())?;
        }
        f.write_str(&self.message)
    }
}

impl Package {
    pub fn file(&self, id: FileId) -> Option<&ParsedFile> {
        self.files.get(id.0 as usize)
    }

    /// Files that did not produce a syntax tree.
    pub fn failed_files(&self) -> impl Iterator<Item = &ParsedFile> {
        self.files.iter().filter(|f| f.cst.is_none())
    }

    pub fn has_errors(&self) -> bool {
        self.diags.has_errors()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.diags
            .iter()
            .map(|d| match self.file(d.file) {
                Some(pf) => {
                    let pos = pf.position(d.span.start);
                    Report {
                        file: pos.file,
                        line: pos.line,
                        column: pos.column,
                        kind: d.kind,
                        message: d.message.clone(),
                    }
                }
                None => Report {
                    file: self.dir.display().to_string().into(),
                    line: 0,
                    column: 0,
                    kind: d.kind,
                    message: d.message.clone(),
                },
            })
            .collect()
    }

    /// Whether any recorded file or the directory changed since loading.
    pub(crate) fn is_stale(&self, fs: &dyn FileSystem) -> bool {
        self.snapshot.iter().any(|(path, meta)| match fs.metadata(path) {
            Ok(now) => now != *meta,
            Err(_) => true,
        })
    }
}

/// Sources of a directory that pass the file filter and build constraints.
pub(crate) struct DirSources {
    pub sources: Vec<Source>,
    pub snapshot: Vec<(PathBuf, FileMeta)>,
}

pub(crate) fn read_sources(
    fs: &dyn FileSystem,
    filter: &dyn FileFilter,
    cfg: &BuildConfig,
    dir: &Path,
) -> Result<DirSources, BuildError> {
    let dir_meta = fs.metadata(dir).map_err(|e| BuildError::io(dir, &e))?;
    let entries = fs.read_dir(dir).map_err(|e| BuildError::io(dir, &e))?;
    let mut snapshot = vec![(dir.to_path_buf(), dir_meta)];
    let mut sources = Vec::new();
    for entry in entries {
        if entry.is_dir || !filter.keep(&entry.name, cfg) {
            continue;
        }
        let path = dir.join(&entry.name);
        let meta = fs.metadata(&path).map_err(|e| BuildError::io(&path, &e))?;
        let bytes = fs.read_file(&path).map_err(|e| BuildError::io(&path, &e))?;
        snapshot.push((path.clone(), meta));
        let keep = constraint::should_build(&bytes, &|t| cfg.satisfies(t)).map_err(|e| {
            BuildError::Constraint {
                file: path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        if !keep {
            trace!(file = %path.display(), "excluded by build constraint");
            continue;
        }
        sources.push(Source::new(path.display().to_string(), bytes));
    }
    if sources.is_empty() {
        return Err(BuildError::NoGoFiles {
            dir: dir.display().to_string(),
        });
    }
    Ok(DirSources { sources, snapshot })
}

/// Parses every source, in parallel on the current pool.
pub(crate) fn parse_all(sources: Vec<Source>, cfg: &BuildConfig) -> Vec<ParsedFile> {
    sources
        .into_par_iter()
        .enumerate()
        .map(|(i, src)| parser::parse_file(FileId(i as u32), src, &cfg.parse))
        .collect()
}

/// The package name shared by the files. External test files
/// (`package p_test`) are dropped; any other disagreement is an error.
pub(crate) fn package_name(
    files: &mut Vec<ParsedFile>,
    dir: &Path,
) -> Result<Arc<str>, BuildError> {
    let mut names: Vec<&str> = files.iter().filter_map(ParsedFile::package_name).collect();
    names.sort_unstable();
    names.dedup();
    let name: Arc<str> = match names.as_slice() {
        [] => {
            // Nothing parsed far enough to name the package.
            let fallback = dir.file_name().map_or_else(|| "main".to_string(), |n| n.to_string_lossy().into_owned());
            return Ok(fallback.into());
        }
        [one] => (*one).into(),
        [a, b] if *b == format!("{a}_test") => (*a).into(),
        [a, b, ..] => {
            return Err(BuildError::MixedPackages {
                dir: dir.display().to_string(),
                first: a.to_string(),
                second: b.to_string(),
            })
        }
    };
    let external = format!("{name}_test");
    let before = files.len();
    files.retain(|f| f.package_name() != Some(external.as_str()));
    if files.len() != before {
        debug!(package = %name, dropped = before - files.len(), "dropped external test files");
        for (i, f) in files.iter_mut().enumerate() {
            renumber(f, FileId(i as u32));
        }
    }
    Ok(name)
}

fn renumber(f: &mut ParsedFile, id: FileId) {
    if f.file == id {
        return;
    }
    f.file = id;
    for d in &mut f.diags {
        d.file = id;
    }
}

/// Import paths of one file with the span of each import spec.
pub(crate) fn file_imports(pf: &ParsedFile) -> Vec<(Arc<str>, Span)> {
    let Some(cst) = &pf.cst else {
        return Vec::new();
    };
    let a = &cst.arena;
    let mut out = Vec::new();
    for d in a.top_decls(cst.root.decls) {
        let TopLevelDecl::Decl(id) = *d else {
            continue;
        };
        for spec in a.specs_list(a.decls[id].specs) {
            let Spec::Import(spec) = *spec else {
                continue;
            };
            let raw = pf.tok_text(a.import_specs[spec].path);
            match literal::unquote_string(&raw).map(String::from_utf8) {
                Ok(Ok(path)) => out.push((path.into(), a.import_specs.span(spec))),
                _ => warn!(file = %pf.name(), "import path is not a valid string"),
            }
        }
    }
    out
}

/// Distinct imports of a package in order of first appearance, with the
/// first place each one is imported.
pub(crate) fn package_imports(files: &[ParsedFile]) -> IndexMap<Arc<str>, (FileId, Span)> {
    let mut out = IndexMap::new();
    for pf in files {
        for (path, span) in file_imports(pf) {
            out.entry(path).or_insert((pf.file, span));
        }
    }
    out
}
