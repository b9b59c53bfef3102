//! Loads each package directory, prints its diagnostics and exits with
//! status 1 when any error was reported (2 for usage errors).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use go125_frontend::build::{BuildConfig, OsFs, PackageCache};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Parses Go package directories and reports their diagnostics
#[derive(Parser, Debug)]
#[command(name = "gofront", version, long_about = None)]
struct Cli {
    /// Type-check packages and their imports
    #[arg(long)]
    check: bool,

    /// Include _test.go files
    #[arg(long)]
    tests: bool,

    /// Build tags, replacing those from GOFLAGS
    #[arg(long, value_name = "TAG", value_delimiter = ',')]
    tags: Option<Vec<String>>,

    /// Target operating system [default: $GOOS or the host's]
    #[arg(long, value_name = "OS")]
    goos: Option<String>,

    /// Target architecture [default: $GOARCH or the host's]
    #[arg(long, value_name = "ARCH")]
    goarch: Option<String>,

    /// Package directories
    #[arg(value_name = "DIR", required = true)]
    dirs: Vec<PathBuf>,
}

impl Cli {
    /// Applies the flags on top of the environment's configuration.
    fn config(&self, mut cfg: BuildConfig) -> BuildConfig {
        cfg.check |= self.check;
        cfg.include_tests |= self.tests;
        if let Some(tags) = &self.tags {
            cfg.tags = tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(goos) = &self.goos {
            cfg.goos = goos.clone();
        }
        if let Some(goarch) = &self.goarch {
            cfg.goarch = goarch.clone();
        }
        cfg
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();
    let cfg = cli.config(BuildConfig::from_env());
    debug!(goos = %cfg.goos, goarch = %cfg.goarch, check = cfg.check, "configured");
    let cache = match PackageCache::new(cfg, Arc::new(OsFs)) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let mut failed = false;
    for dir in &cli.dirs {
        match cache.load_dir(dir) {
            Ok(pkg) => {
                for r in pkg.reports() {
                    println!("{r}");
                }
                failed |= pkg.has_errors();
            }
            Err(e) => {
                eprintln!("{}: {e}", dir.display());
                failed = true;
            }
        }
    }
    let stats = cache.stats();
    debug!(builds = stats.builds, hits = stats.hits, "done");
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(list: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("gofront").chain(list.iter().copied()))
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_and_dirs() {
        let cli = parse(&["--check", "--tags", "a,b", "--goos=windows", "x", "y"]).unwrap();
        let cfg = cli.config(BuildConfig::default());
        assert!(cfg.check);
        assert!(!cfg.include_tests);
        assert_eq!(cfg.tags.iter().map(String::as_str).collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(cfg.goos, "windows");
        assert_eq!(cli.dirs, [PathBuf::from("x"), PathBuf::from("y")]);
    }

    #[test]
    fn environment_defaults_survive_missing_flags() {
        let base = BuildConfig {
            goos: "plan9".into(),
            goarch: "arm64".into(),
            tags: ["netgo".to_string()].into_iter().collect(),
            ..BuildConfig::default()
        };
        let cfg = parse(&["--tests", "pkg"]).unwrap().config(base);
        assert_eq!((cfg.goos.as_str(), cfg.goarch.as_str()), ("plan9", "arm64"));
        assert!(cfg.tags.contains("netgo"));
        assert!(cfg.include_tests);
    }

    #[test]
    fn usage_errors() {
        assert_eq!(
            parse(&[]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert!(parse(&["--goarch"]).is_err());
        assert_eq!(
            parse(&["--bogus", "x"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
    }
}
