//! The package cache.
//!
//! Entries live in an LRU-ordered map behind one lock. Each entry is a
//! slot that is filled exactly once: the first caller builds the package
//! with the lock released and later callers for the same key wait on the
//! slot and share the result. Failed builds are not kept, so a later
//! request tries again.
//!
//! The imports of a package load on their own threads, so a wait on a
//! slot never blocks a parsing worker. Before waiting, the requester
//! checks the in-flight import edges: if the slot's builder already
//! depends on the requester, the wait would never end and the requester
//! reports an import cycle instead.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::config::BuildConfig;
use super::filter::{DefaultFilter, FileFilter};
use super::fs::FileSystem;
use super::package::{self, DirSources, Package};
use super::resolver::{DefaultResolver, ImportResolver};
use super::BuildError;
use crate::check::{self, CheckConfig, Importer, PackageInfo};
use crate::error::{Diag, DiagKind, DiagList};

/// Everything a built package depends on besides file contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tags: String,
    pub dir: PathBuf,
    pub goarch: String,
    pub goos: String,
    pub paths: String,
    pub import_path: Arc<str>,
    pub check: bool,
    pub include_tests: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Packages actually built; at most one per key while it stays cached.
    pub builds: usize,
    pub evictions: usize,
    pub invalidations: usize,
    pub entries: usize,
}

type BuildResult = Result<Arc<Package>, BuildError>;

#[derive(Debug)]
enum SlotState {
    Building,
    Done(BuildResult),
}

#[derive(Debug)]
struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    fn building() -> Self {
        Self {
            state: Mutex::new(SlotState::Building),
            ready: Condvar::new(),
        }
    }

    fn peek(&self) -> Option<BuildResult> {
        match &*self.state.lock() {
            SlotState::Done(r) => Some(r.clone()),
            SlotState::Building => None,
        }
    }

    fn publish(&self, result: BuildResult) {
        *self.state.lock() = SlotState::Done(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> BuildResult {
        let mut state = self.state.lock();
        loop {
            if let SlotState::Done(r) = &*state {
                return r.clone();
            }
            self.ready.wait(&mut state);
        }
    }
}

/// Fails the slot if its builder unwinds, so waiters wake up.
struct Unpublished<'s>(Option<&'s Slot>);

impl Drop for Unpublished<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.0.take() {
            slot.publish(Err(BuildError::Pool("package build panicked".into())));
        }
    }
}

/// Imports requested by packages that are still being built.
#[derive(Debug, Default)]
struct InFlight {
    edges: HashMap<CacheKey, Vec<CacheKey>>,
}

impl InFlight {
    fn add(&mut self, from: &CacheKey, to: &CacheKey) {
        self.edges.entry(from.clone()).or_default().push(to.clone());
    }

    fn remove(&mut self, from: &CacheKey, to: &CacheKey) {
        let Some(out) = self.edges.get_mut(from) else {
            return;
        };
        if let Some(i) = out.iter().position(|k| k == to) {
            out.swap_remove(i);
        }
        if out.is_empty() {
            self.edges.remove(from);
        }
    }

    /// Shortest chain of in-flight imports leading from `start` to `goal`.
    fn path(&self, start: &CacheKey, goal: &CacheKey) -> Option<Vec<CacheKey>> {
        let mut prev: HashMap<&CacheKey, &CacheKey> = HashMap::new();
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(k) = queue.pop_front() {
            if k == goal {
                let mut path = vec![k.clone()];
                let mut cur = k;
                while let Some(&p) = prev.get(cur) {
                    path.push(p.clone());
                    cur = p;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.edges.get(k).into_iter().flatten() {
                if seen.insert(next) {
                    prev.insert(next, k);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

pub struct PackageCache {
    cfg: BuildConfig,
    fs: Arc<dyn FileSystem>,
    resolver: Box<dyn ImportResolver>,
    filter: Box<dyn FileFilter>,
    pool: rayon::ThreadPool,
    entries: Mutex<IndexMap<CacheKey, Arc<Slot>>>,
    inflight: Mutex<InFlight>,
    stats: Mutex<CacheStats>,
}

impl PackageCache {
    pub fn new(cfg: BuildConfig, fs: Arc<dyn FileSystem>) -> Result<Self, BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.workers.max(1))
            .thread_name(|i| format!("gofront-{i}"))
            .build()
            .map_err(|e| BuildError::Pool(e.to_string()))?;
        let resolver = DefaultResolver::new(cfg.goroot.clone(), cfg.gopath.clone());
        Ok(Self {
            cfg,
            fs,
            resolver: Box::new(resolver),
            filter: Box::new(DefaultFilter),
            pool,
            entries: Mutex::new(IndexMap::new()),
            inflight: Mutex::new(InFlight::default()),
            stats: Mutex::new(CacheStats::default()),
        })
    }

    pub fn with_resolver(mut self, resolver: impl ImportResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_filter(mut self, filter: impl FileFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.cfg
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().len();
        CacheStats {
            entries,
            ..*self.stats.lock()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn key(&self, dir: &Path, import_path: &str) -> CacheKey {
        CacheKey {
            tags: self.cfg.tag_signature(),
            dir: dir.to_path_buf(),
            goarch: self.cfg.goarch.clone(),
            goos: self.cfg.goos.clone(),
            paths: self.cfg.path_signature(),
            import_path: import_path.into(),
            check: self.cfg.check,
            include_tests: self.cfg.include_tests,
        }
    }

    /// Import path of a directory: its path below `<root>/src` or a
    /// dependency tree when it lies in one, else the directory itself.
    fn import_path_of(&self, dir: &Path) -> String {
        let trees = self.cfg.goroot.iter().chain(&self.cfg.gopath);
        for tree in trees {
            for base in [tree.join("src"), tree.join("pkg").join("mod")] {
                if let Ok(rel) = dir.strip_prefix(&base) {
                    if !rel.as_os_str().is_empty() {
                        return rel
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                    }
                }
            }
        }
        dir.display().to_string()
    }

    /// Loads the package in `dir`.
    pub fn load_dir(&self, dir: &Path) -> BuildResult {
        let path = self.import_path_of(dir);
        self.get(dir, &path, &[], None)
    }

    /// Loads the package imported as `path` from `from_dir`.
    pub fn import(&self, from_dir: &Path, path: &str) -> BuildResult {
        self.import_from(from_dir, path, &[], None)
    }

    fn import_from(
        &self,
        from_dir: &Path,
        path: &str,
        chain: &[Arc<str>],
        from: Option<&CacheKey>,
    ) -> BuildResult {
        if let Some(i) = chain.iter().position(|p| &**p == path) {
            let mut cycle: Vec<String> = chain[i..].iter().map(|p| p.to_string()).collect();
            cycle.push(path.to_string());
            return Err(BuildError::ImportCycle { cycle });
        }
        let dir = self
            .resolver
            .resolve(&*self.fs, from_dir, path, self.cfg.go_minor)?;
        self.get(&dir, path, chain, from)
    }

    /// `from` is the package whose build asked for this one, if any.
    fn get(&self, dir: &Path, path: &str, chain: &[Arc<str>], from: Option<&CacheKey>) -> BuildResult {
        let key = self.key(dir, path);
        loop {
            let (slot, fresh) = self.slot(&key);
            let result = if fresh {
                {
                    let mut stats = self.stats.lock();
                    stats.misses += 1;
                    stats.builds += 1;
                }
                if let Some(from) = from {
                    self.inflight.lock().add(from, &key);
                }
                let mut guard = Unpublished(Some(&*slot));
                let result = self.build(dir, path, chain, &key);
                guard.0 = None;
                slot.publish(result.clone());
                if let Some(from) = from {
                    self.inflight.lock().remove(from, &key);
                }
                result
            } else {
                match slot.peek() {
                    Some(Ok(pkg)) if pkg.is_stale(&*self.fs) => {
                        debug!(path, dir = %dir.display(), "package changed on disk, rebuilding");
                        self.stats.lock().invalidations += 1;
                        self.forget(&key, &slot);
                        continue;
                    }
                    Some(result) => {
                        trace!(path, "package cache hit");
                        self.stats.lock().hits += 1;
                        result
                    }
                    None => {
                        self.stats.lock().hits += 1;
                        self.wait_for(&key, &slot, from)
                    }
                }
            };
            if result.is_err() {
                self.forget(&key, &slot);
            }
            return result;
        }
    }

    /// Waits for another request to finish building `key`, unless that
    /// build already depends on `from`.
    fn wait_for(&self, key: &CacheKey, slot: &Slot, from: Option<&CacheKey>) -> BuildResult {
        let Some(from) = from else {
            return slot.wait();
        };
        {
            let mut inflight = self.inflight.lock();
            if let Some(path) = inflight.path(key, from) {
                let mut cycle: Vec<String> = path.iter().map(|k| k.import_path.to_string()).collect();
                cycle.push(key.import_path.to_string());
                debug!(cycle = %cycle.join(" -> "), "import cycle across concurrent builds");
                return Err(BuildError::ImportCycle { cycle });
            }
            inflight.add(from, key);
        }
        let result = slot.wait();
        self.inflight.lock().remove(from, key);
        result
    }

    /// The slot for `key`, marked most recently used; `true` when it was
    /// just created and the caller has to build it.
    fn slot(&self, key: &CacheKey) -> (Arc<Slot>, bool) {
        let mut map = self.entries.lock();
        if let Some(i) = map.get_index_of(key) {
            let last = map.len() - 1;
            map.move_index(i, last);
            return (map[last].clone(), false);
        }
        let slot = Arc::new(Slot::building());
        map.insert(key.clone(), slot.clone());
        let cap = self.cfg.cache_capacity.max(1);
        while map.len() > cap {
            if let Some((old, _)) = map.shift_remove_index(0) {
                debug!(path = %old.import_path, "evicted package");
                self.stats.lock().evictions += 1;
            }
        }
        (slot, true)
    }

    /// Drops `key` if it still maps to `slot`.
    fn forget(&self, key: &CacheKey, slot: &Arc<Slot>) {
        let mut map = self.entries.lock();
        if map.get(key).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            map.shift_remove(key);
        }
    }

    /// Loads the imports of the package `from`, the first on this thread
    /// and each other one on a thread of its own.
    fn import_all(
        &self,
        dir: &Path,
        wanted: &[Arc<str>],
        chain: &[Arc<str>],
        from: &CacheKey,
    ) -> Vec<(Arc<str>, BuildResult)> {
        let load = |p: &Arc<str>| (p.clone(), self.import_from(dir, p, chain, Some(from)));
        let Some((first, rest)) = wanted.split_first() else {
            return Vec::new();
        };
        thread::scope(|s| {
            let pending: Vec<_> = rest
                .iter()
                .map(|p| {
                    let spawned = thread::Builder::new()
                        .name(format!("gofront-import-{p}"))
                        .spawn_scoped(s, move || load(p));
                    (p, spawned)
                })
                .collect();
            let mut out = Vec::with_capacity(wanted.len());
            out.push(load(first));
            for (p, spawned) in pending {
                out.push(match spawned {
                    Ok(h) => h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)),
                    Err(e) => (p.clone(), Err(BuildError::Pool(e.to_string()))),
                });
            }
            out
        })
    }

    fn build(&self, dir: &Path, path: &str, chain: &[Arc<str>], key: &CacheKey) -> BuildResult {
        debug!(path, dir = %dir.display(), "building package");
        let DirSources { sources, snapshot } =
            package::read_sources(&*self.fs, &*self.filter, &self.cfg, dir)?;
        let mut files = self.pool.install(|| package::parse_all(sources, &self.cfg));
        let name = package::package_name(&mut files, dir)?;
        let imports = package::package_imports(&files);

        let mut chain = chain.to_vec();
        chain.push(path.into());
        let wanted: Vec<Arc<str>> = imports
            .keys()
            .filter(|p| !matches!(&***p, "unsafe" | "C"))
            .cloned()
            .collect();
        let loaded = self.import_all(dir, &wanted, &chain, key);
        if let Some((_, Err(e))) = loaded
            .iter()
            .find(|(_, r)| matches!(r, Err(BuildError::ImportCycle { .. })))
        {
            return Err(e.clone());
        }

        let mut diags = DiagList::new();
        for f in &files {
            diags.extend(f.diags.iter().cloned());
        }
        let results: HashMap<Arc<str>, BuildResult> = loaded.into_iter().collect();
        let info = if self.cfg.check {
            let importer = DepImporter { deps: &results };
            let ccfg = CheckConfig::new(path, self.cfg.word_size());
            let out = check::check_package(&files, &importer, &ccfg).map_err(|e| BuildError::Check {
                path: path.to_string(),
                message: e.to_string(),
            })?;
            diags.extend(out.diags.into_vec());
            Some(out.info)
        } else {
            for (p, r) in &results {
                if let (Err(e), Some(&(f, span))) = (r, imports.get(p)) {
                    diags.push(Diag::new(
                        DiagKind::Import,
                        f,
                        span,
                        format!("could not import {p} ({e})"),
                    ));
                }
            }
            None
        };
        let mut deps = IndexMap::new();
        for p in imports.keys() {
            if let Some(Ok(dep)) = results.get(p) {
                deps.insert(p.clone(), dep.clone());
            }
        }
        debug!(
            path,
            package = %name,
            files = files.len(),
            deps = deps.len(),
            diags = diags.len(),
            "built package"
        );
        Ok(Arc::new(Package {
            name,
            path: path.into(),
            dir: dir.to_path_buf(),
            files,
            imports: imports.keys().cloned().collect(),
            deps,
            info,
            diags,
            snapshot,
        }))
    }
}

/// Hands the checker the dependencies loaded for one package.
struct DepImporter<'d> {
    deps: &'d HashMap<Arc<str>, BuildResult>,
}

impl Importer for DepImporter<'_> {
    fn import(&self, path: &str) -> Result<Arc<PackageInfo>, String> {
        match self.deps.get(path) {
            Some(Ok(pkg)) => pkg
                .info
                .clone()
                .ok_or_else(|| format!("package {path} was not checked")),
            Some(Err(e)) => Err(e.to_string()),
            None => Err(format!("package {path} was not loaded")),
        }
    }
}

/// Imports resolved from the current directory, loading through the cache.
impl Importer for PackageCache {
    fn import(&self, path: &str) -> Result<Arc<PackageInfo>, String> {
        let pkg = PackageCache::import(self, Path::new("."), path).map_err(|e| e.to_string())?;
        pkg.info
            .clone()
            .ok_or_else(|| format!("package {path} was not checked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::fs::MemFs;

    fn cache(fs: &Arc<MemFs>, check: bool) -> PackageCache {
        let cfg = BuildConfig {
            goos: "linux".into(),
            goarch: "amd64".into(),
            goroot: Some("/go".into()),
            check,
            workers: 2,
            ..BuildConfig::default()
        };
        let fs: Arc<dyn FileSystem> = fs.clone();
        PackageCache::new(cfg, fs).unwrap()
    }

    #[test]
    fn second_load_is_a_hit() {
        let fs = Arc::new(MemFs::new());
        fs.insert("/go/src/a/a.go", "package a\n\nconst X = 1\n");
        let c = cache(&fs, true);
        let first = c.load_dir(Path::new("/go/src/a")).unwrap();
        let second = c.import(Path::new("/"), "a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(&*first.path, "a");
        assert_eq!(fs.reads(Path::new("/go/src/a/a.go")), 1);
        let stats = c.stats();
        assert_eq!((stats.builds, stats.hits), (1, 1));
    }

    #[test]
    fn changed_files_are_reloaded() {
        let fs = Arc::new(MemFs::new());
        let file = Path::new("/go/src/a/a.go");
        fs.insert(file, "package a\n");
        let c = cache(&fs, false);
        let first = c.import(Path::new("/"), "a").unwrap();
        fs.touch(file);
        let second = c.import(Path::new("/"), "a").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(fs.reads(file), 2);
        assert_eq!(c.stats().invalidations, 1);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let fs = Arc::new(MemFs::new());
        for p in ["a", "b", "c"] {
            fs.insert(format!("/go/src/{p}/{p}.go"), format!("package {p}\n"));
        }
        let mut cfg = cache(&fs, false).config().clone();
        cfg.cache_capacity = 2;
        let fs_dyn: Arc<dyn FileSystem> = fs.clone();
        let c = PackageCache::new(cfg, fs_dyn).unwrap();
        let root = Path::new("/");
        c.import(root, "a").unwrap();
        c.import(root, "b").unwrap();
        c.import(root, "a").unwrap();
        c.import(root, "c").unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c.stats().evictions, 1);
        c.import(root, "a").unwrap();
        assert_eq!(fs.reads(Path::new("/go/src/a/a.go")), 1);
        c.import(root, "b").unwrap();
        assert_eq!(fs.reads(Path::new("/go/src/b/b.go")), 2);
    }

    #[test]
    fn dependencies_feed_the_checker() {
        let fs = Arc::new(MemFs::new());
        fs.insert("/go/src/lib/lib.go", "package lib\n\nconst Max = 10\nfunc Twice(n int) int { return 2 * n }\n");
        fs.insert(
            "/go/src/app/main.go",
            "package main\n\nimport \"lib\"\n\nvar x int8 = lib.Max * 20\nvar y string = lib.Twice(1)\nfunc main() {}\n",
        );
        let c = cache(&fs, true);
        let pkg = c.load_dir(Path::new("/go/src/app")).unwrap();
        assert_eq!(pkg.deps.len(), 1);
        let msgs: Vec<String> = pkg.diags.iter().map(|d| d.message.clone()).collect();
        assert!(msgs.iter().any(|m| m.contains("(overflows)")), "{msgs:?}");
        assert!(
            msgs.iter().any(|m| m.contains("cannot use lib.Twice(1) (value of type int) as string value")),
            "{msgs:?}"
        );
    }

    #[test]
    fn import_cycles_are_reported() {
        let fs = Arc::new(MemFs::new());
        fs.insert("/go/src/a/a.go", "package a\n\nimport _ \"b\"\n");
        fs.insert("/go/src/b/b.go", "package b\n\nimport _ \"a\"\n");
        let c = cache(&fs, false);
        match c.import(Path::new("/"), "a") {
            Err(BuildError::ImportCycle { cycle }) => assert_eq!(cycle, ["a", "b", "a"]),
            other => panic!("expected a cycle, got {other:?}"),
        }
        assert!(c.is_empty());
    }

    /// Runs `f` on another thread and fails the test if it does not
    /// return in time.
    fn within<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(f());
        });
        rx.recv_timeout(std::time::Duration::from_secs(30))
            .expect("load did not finish")
    }

    fn padded(name: &str, imports: &[&str]) -> String {
        let mut src = format!("package {name}\n\n");
        for i in imports {
            src.push_str(&format!("import _ \"{i}\"\n"));
        }
        for n in 0..2000 {
            src.push_str(&format!("var v{n} = {n}\n"));
        }
        src
    }

    fn assert_cycle_through_b_and_c(r: &BuildResult) {
        match r {
            Err(BuildError::ImportCycle { cycle }) => {
                assert_eq!(cycle.first(), cycle.last(), "{cycle:?}");
                assert!(cycle.iter().any(|p| p == "b") && cycle.iter().any(|p| p == "c"), "{cycle:?}");
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn sibling_imports_that_form_a_cycle_do_not_hang() {
        let fs = Arc::new(MemFs::new());
        fs.insert("/go/src/a/a.go", "package a\n\nimport (\n\t_ \"b\"\n\t_ \"c\"\n)\n");
        fs.insert("/go/src/b/b.go", padded("b", &["c"]));
        fs.insert("/go/src/c/c.go", padded("c", &["b"]));
        for _ in 0..10 {
            let mut cfg = cache(&fs, false).config().clone();
            cfg.workers = 4;
            let fs_dyn: Arc<dyn FileSystem> = fs.clone();
            let c = Arc::new(PackageCache::new(cfg, fs_dyn).unwrap());
            let r = within(move || c.import(Path::new("/"), "a"));
            assert_cycle_through_b_and_c(&r);
        }
    }

    #[test]
    fn concurrent_requests_for_both_halves_of_a_cycle_fail() {
        let fs = Arc::new(MemFs::new());
        fs.insert("/go/src/b/b.go", padded("b", &["c"]));
        fs.insert("/go/src/c/c.go", padded("c", &["b"]));
        for _ in 0..10 {
            let c = Arc::new(cache(&fs, false));
            let (c1, c2) = (c.clone(), c.clone());
            let (rb, rc) = within(move || {
                let t = std::thread::spawn(move || c1.import(Path::new("/"), "b"));
                let rc = c2.import(Path::new("/"), "c");
                (t.join().unwrap(), rc)
            });
            assert_cycle_through_b_and_c(&rb);
            assert_cycle_through_b_and_c(&rc);
            assert!(c.is_empty());
        }
    }

    #[test]
    fn in_flight_paths_follow_import_edges() {
        let c = cache(&Arc::new(MemFs::new()), false);
        let k = |p: &str| c.key(Path::new("/"), p);
        let mut g = InFlight::default();
        g.add(&k("a"), &k("b"));
        g.add(&k("b"), &k("c"));
        g.add(&k("a"), &k("d"));
        let path: Vec<_> = g
            .path(&k("a"), &k("c"))
            .unwrap()
            .iter()
            .map(|k| k.import_path.to_string())
            .collect();
        assert_eq!(path, ["a", "b", "c"]);
        assert!(g.path(&k("c"), &k("a")).is_none());
        g.remove(&k("b"), &k("c"));
        assert!(g.path(&k("a"), &k("c")).is_none());
    }

    #[test]
    fn missing_imports_become_diagnostics() {
        let fs = Arc::new(MemFs::new());
        fs.insert("/go/src/a/a.go", "package a\n\nimport \"nowhere\"\n");
        let c = cache(&fs, false);
        let pkg = c.import(Path::new("/"), "a").unwrap();
        let reports = pkg.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, DiagKind::Import);
        assert_eq!(reports[0].line, 3);
        assert!(reports[0].message.starts_with("could not import nowhere"));
    }
}
