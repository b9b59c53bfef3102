//! Build configuration: target platform, tags and loader limits.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::debug;

use crate::parser::ParseOptions;

/// Operating systems the file name and constraint matchers know about.
pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

const ARCH_64: &[&str] = &[
    "amd64", "arm64", "arm64be", "loong64", "mips64", "mips64le", "ppc64", "ppc64le", "riscv64",
    "s390x", "sparc64", "wasm",
];

/// Highest `go1.N` release tag satisfied by default.
pub const DEFAULT_GO_MINOR: u32 = 25;

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub goos: String,
    pub goarch: String,
    /// `gc` or `gccgo`.
    pub compiler: String,
    /// Extra tags enabled with `-tags`.
    pub tags: BTreeSet<String>,
    /// `go1.N` tags are satisfied for every `N <= go_minor`.
    pub go_minor: u32,
    /// Root of the standard library tree (`GOROOT`).
    pub goroot: Option<PathBuf>,
    /// Dependency trees searched after the root (`GOPATH`).
    pub gopath: Vec<PathBuf>,
    pub include_tests: bool,
    /// Type check packages after parsing them.
    pub check: bool,
    /// Per-file parser and lexer limits.
    pub parse: ParseOptions,
    pub workers: usize,
    /// Packages kept by the cache before the least recently used is dropped.
    pub cache_capacity: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            goos: host_os().to_string(),
            goarch: host_arch().to_string(),
            compiler: "gc".to_string(),
            tags: BTreeSet::new(),
            go_minor: DEFAULT_GO_MINOR,
            goroot: None,
            gopath: Vec::new(),
            include_tests: false,
            check: false,
            parse: ParseOptions::default(),
            workers: std::thread::available_parallelism().map_or(4, |n| n.get()),
            cache_capacity: 256,
        }
    }
}

impl BuildConfig {
    /// Defaults overridden by `GOOS`, `GOARCH`, `GOROOT`, `GOPATH` and the
    /// `-tags` flag in `GOFLAGS`.
    pub fn from_env() -> Self {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let set = |k: &str| var(k).filter(|v| !v.is_empty());
        if let Some(os) = set("GOOS") {
            cfg.goos = os;
        }
        if let Some(arch) = set("GOARCH") {
            cfg.goarch = arch;
        }
        cfg.goroot = set("GOROOT").map(PathBuf::from);
        if let Some(p) = set("GOPATH") {
            cfg.gopath = std::env::split_paths(&p).filter(|p| !p.as_os_str().is_empty()).collect();
        }
        if let Some(flags) = set("GOFLAGS") {
            for flag in flags.split_whitespace() {
                let list = flag
                    .strip_prefix("-tags=")
                    .or_else(|| flag.strip_prefix("--tags="));
                if let Some(list) = list {
                    cfg.tags.extend(parse_tag_list(list));
                }
            }
        }
        debug!(goos = %cfg.goos, goarch = %cfg.goarch, tags = ?cfg.tags, "build config from environment");
        cfg
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Whether a build constraint tag holds for this configuration.
    pub fn satisfies(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch || tag == self.compiler || self.tags.contains(tag) {
            return true;
        }
        match tag {
            "unix" => return UNIX_OS.contains(&self.goos.as_str()),
            "linux" if self.goos == "android" => return true,
            "solaris" if self.goos == "illumos" => return true,
            "darwin" if self.goos == "ios" => return true,
            _ => {}
        }
        tag.strip_prefix("go1.")
            .and_then(|n| n.parse::<u32>().ok())
            .is_some_and(|n| n <= self.go_minor)
    }

    /// Size of `int`, `uint` and pointers in bytes.
    pub fn word_size(&self) -> u64 {
        if ARCH_64.contains(&self.goarch.as_str()) {
            8
        } else {
            4
        }
    }

    /// Canonical text of the enabled tags, used in cache keys.
    pub fn tag_signature(&self) -> String {
        self.tags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }

    /// Canonical text of the dependency trees, used in cache keys.
    pub fn path_signature(&self) -> String {
        let mut parts: Vec<String> = self.goroot.iter().map(|p| p.display().to_string()).collect();
        parts.extend(self.gopath.iter().map(|p| p.display().to_string()));
        parts.join("\u{0}")
    }
}

/// Splits a `-tags` value; both commas and spaces separate tags.
pub fn parse_tag_list(list: &str) -> impl Iterator<Item = String> + '_ {
    list.split([',', ' '])
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        os => os,
    }
}

fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "loongarch64" => "loong64",
        "powerpc" => "ppc",
        "powerpc64" => "ppc64",
        arch => arch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |k| pairs.iter().find(|(n, _)| *n == k).map(|(_, v)| v.to_string())
    }

    #[test]
    fn environment_overrides_defaults() {
        let cfg = BuildConfig::from_vars(vars(&[
            ("GOOS", "windows"),
            ("GOARCH", "386"),
            ("GOROOT", "/usr/lib/go"),
            ("GOFLAGS", "-mod=mod -tags=foo,bar"),
        ]));
        assert_eq!(cfg.goos, "windows");
        assert_eq!(cfg.goarch, "386");
        assert_eq!(cfg.goroot, Some(PathBuf::from("/usr/lib/go")));
        assert_eq!(cfg.tag_signature(), "bar,foo");
        assert_eq!(cfg.word_size(), 4);
    }

    #[test]
    fn tag_satisfaction() {
        let cfg = BuildConfig {
            goos: "android".into(),
            goarch: "arm64".into(),
            ..BuildConfig::default()
        }
        .with_tags(["integration"]);
        for tag in ["android", "linux", "unix", "arm64", "gc", "integration", "go1.1", "go1.25"] {
            assert!(cfg.satisfies(tag), "{tag}");
        }
        for tag in ["windows", "amd64", "gccgo", "go1.26", "cgo"] {
            assert!(!cfg.satisfies(tag), "{tag}");
        }
        assert_eq!(cfg.word_size(), 8);
    }
}
