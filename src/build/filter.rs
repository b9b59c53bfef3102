//! Which directory entries are package source files.

use super::config::{BuildConfig, KNOWN_ARCH, KNOWN_OS};

pub trait FileFilter: Send + Sync {
    fn keep(&self, name: &str, cfg: &BuildConfig) -> bool;
}

/// `.go` files that are not hidden, not tests (unless tests are included)
/// and whose `_GOOS`, `_GOARCH` or `_GOOS_GOARCH` suffix matches the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFilter;

impl FileFilter for DefaultFilter {
    fn keep(&self, name: &str, cfg: &BuildConfig) -> bool {
        let Some(stem) = name.strip_suffix(".go") else {
            return false;
        };
        if stem.is_empty() || name.starts_with(['_', '.']) {
            return false;
        }
        let stem = match stem.strip_suffix("_test") {
            Some(_) if !cfg.include_tests => return false,
            Some(s) => s,
            None => stem,
        };
        platform_matches(stem, cfg)
    }
}

/// Checks the platform suffix of a file name stem. The part before the
/// first `_` is never a suffix, so `linux.go` builds everywhere.
fn platform_matches(stem: &str, cfg: &BuildConfig) -> bool {
    let Some(i) = stem.find('_') else {
        return true;
    };
    let parts: Vec<&str> = stem[i + 1..].split('_').collect();
    let n = parts.len();
    let last = parts[n - 1];
    if n >= 2 {
        let prev = parts[n - 2];
        if KNOWN_OS.contains(&prev) && KNOWN_ARCH.contains(&last) {
            return cfg.satisfies(prev) && cfg.satisfies(last);
        }
    }
    if KNOWN_OS.contains(&last) || KNOWN_ARCH.contains(&last) {
        return cfg.satisfies(last);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux_amd64() -> BuildConfig {
        BuildConfig {
            goos: "linux".into(),
            goarch: "amd64".into(),
            ..BuildConfig::default()
        }
    }

    #[test]
    fn names_and_suffixes() {
        let cfg = linux_amd64();
        let f = DefaultFilter;
        for keep in ["a.go", "linux.go", "file_linux.go", "x_amd64.go", "y_linux_amd64.go", "z_unix.go"] {
            assert!(f.keep(keep, &cfg), "{keep}");
        }
        for drop in [
            "a.c",
            "_a.go",
            ".a.go",
            "a_test.go",
            "file_windows.go",
            "x_arm64.go",
            "y_linux_arm.go",
            "y_darwin_amd64.go",
        ] {
            assert!(!f.keep(drop, &cfg), "{drop}");
        }
    }

    #[test]
    fn tests_are_opt_in() {
        let cfg = BuildConfig {
            include_tests: true,
            ..linux_amd64()
        };
        assert!(DefaultFilter.keep("a_test.go", &cfg));
        assert!(!DefaultFilter.keep("a_windows_test.go", &cfg));
    }
}
