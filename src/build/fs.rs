//! File system access for the loader.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// What the cache compares to decide whether a package is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub mode: u32,
    pub is_dir: bool,
}

pub trait FileSystem: Send + Sync {
    /// Entries of a directory, sorted by name.
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;
}

/// The real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

#[cfg(unix)]
fn mode_of(m: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    m.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(m: &std::fs::Metadata) -> u32 {
    u32::from(m.permissions().readonly())
}

impl FileSystem for OsFs {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            // Follows symlinks so linked package files are seen as files.
            let is_dir = std::fs::metadata(entry.path()).is_ok_and(|m| m.is_dir());
            out.push(DirEntry { name, is_dir });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let m = std::fs::metadata(path)?;
        Ok(FileMeta {
            size: m.len(),
            modified: m.modified().ok(),
            mode: mode_of(&m),
            is_dir: m.is_dir(),
        })
    }
}

#[derive(Debug, Clone)]
struct MemFile {
    data: Vec<u8>,
    stamp: u64,
}

/// In-memory file system. Directories exist implicitly above every file.
/// Every change advances a clock that stands in for modification times,
/// and reads are counted per path.
#[derive(Debug, Default)]
pub struct MemFs {
    files: RwLock<BTreeMap<PathBuf, MemFile>>,
    clock: AtomicU64,
    reads: Mutex<HashMap<PathBuf, usize>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Creates or replaces a file.
    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        let stamp = self.tick();
        self.files.write().insert(
            path.into(),
            MemFile {
                data: data.into(),
                stamp,
            },
        );
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.tick();
        self.files.write().remove(path).is_some()
    }

    /// Marks a file as modified without changing its contents.
    pub fn touch(&self, path: &Path) -> bool {
        let stamp = self.tick();
        match self.files.write().get_mut(path) {
            Some(f) => {
                f.stamp = stamp;
                true
            }
            None => false,
        }
    }

    /// How many times `path` was read.
    pub fn reads(&self, path: &Path) -> usize {
        self.reads.lock().get(path).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.reads.lock().values().sum()
    }

    fn stamp_time(stamp: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_nanos(stamp)
    }
}

impl FileSystem for MemFs {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let files = self.files.read();
        let mut out: BTreeMap<String, bool> = BTreeMap::new();
        for path in files.keys() {
            let Ok(rest) = path.strip_prefix(dir) else {
                continue;
            };
            let mut parts = rest.components();
            let Some(first) = parts.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let is_dir = parts.next().is_some();
            *out.entry(name).or_insert(is_dir) |= is_dir;
        }
        if out.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such directory", dir.display()),
            ));
        }
        Ok(out
            .into_iter()
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        let data = self.files.read().get(path).map(|f| f.data.clone());
        match data {
            Some(d) => {
                *self.reads.lock().entry(path.to_path_buf()).or_insert(0) += 1;
                Ok(d)
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such file", path.display()),
            )),
        }
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let files = self.files.read();
        if let Some(f) = files.get(path) {
            return Ok(FileMeta {
                size: f.data.len() as u64,
                modified: Some(Self::stamp_time(f.stamp)),
                mode: 0o644,
                is_dir: false,
            });
        }
        // A directory changes when any file directly inside it does.
        let mut newest = None;
        for (p, f) in files.iter() {
            if p.starts_with(path) && p != path {
                if p.parent() == Some(path) {
                    newest = newest.max(Some(f.stamp));
                } else {
                    newest = newest.max(Some(0));
                }
            }
        }
        match newest {
            Some(stamp) => Ok(FileMeta {
                size: 0,
                modified: Some(Self::stamp_time(stamp)),
                mode: 0o755,
                is_dir: true,
            }),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", path.display()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_implied() {
        let fs = MemFs::new();
        fs.insert("/root/src/a/a.go", "package a");
        fs.insert("/root/src/a/sub/b.go", "package b");
        let names: Vec<_> = fs
            .read_dir(Path::new("/root/src/a"))
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.is_dir))
            .collect();
        assert_eq!(names, vec![("a.go".to_string(), false), ("sub".to_string(), true)]);
        assert!(fs.metadata(Path::new("/root/src")).unwrap().is_dir);
        assert!(fs.read_dir(Path::new("/nope")).is_err());
    }

    #[test]
    fn reads_are_counted_and_touch_changes_metadata() {
        let fs = MemFs::new();
        let p = Path::new("/x/a.go");
        fs.insert(p, "package a");
        let before = fs.metadata(p).unwrap();
        let dir_before = fs.metadata(Path::new("/x")).unwrap();
        fs.read_file(p).unwrap();
        fs.read_file(p).unwrap();
        assert_eq!(fs.reads(p), 2);
        assert!(fs.touch(p));
        assert_ne!(fs.metadata(p).unwrap(), before);
        assert_ne!(fs.metadata(Path::new("/x")).unwrap(), dir_before);
        assert_eq!(fs.total_reads(), 2);
    }
}
