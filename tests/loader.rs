use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use go125_frontend::build::{self, BuildConfig, BuildError, FileSystem, MemFs, OsFs, PackageCache};

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, text).expect("write");
}

fn linux_amd64(root: &Path) -> BuildConfig {
    BuildConfig {
        goos: "linux".into(),
        goarch: "amd64".into(),
        goroot: Some(root.to_path_buf()),
        workers: 4,
        ..BuildConfig::default()
    }
}

fn file_names(pkg: &build::Package) -> Vec<String> {
    pkg.files
        .iter()
        .map(|f| {
            Path::new(f.name())
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .collect()
}

#[test]
fn loads_a_directory_from_disk() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    write(root, "src/app/main.go", "package main\n\nfunc main() {}\n");
    write(root, "src/app/util_linux.go", "package main\n\nconst OS = \"linux\"\n");
    write(root, "src/app/util_windows.go", "package main\n\nconst OS = \"windows\"\n");
    write(root, "src/app/gated.go", "//go:build ignore\n\npackage main\n\nconst OS = 1\n");
    write(root, "src/app/extra_test.go", "package main\n");
    write(root, "src/app/_hidden.go", "package main\n\nconst OS = 2\n");
    write(root, "src/app/README.md", "not go\n");

    let cfg = BuildConfig {
        check: true,
        ..linux_amd64(root)
    };
    let (pkg, reports) = build::load(&root.join("src/app"), cfg).expect("loaded");
    assert_eq!(&*pkg.name, "main");
    assert_eq!(&*pkg.path, "app");
    assert_eq!(file_names(&pkg), ["main.go", "util_linux.go"]);
    assert!(reports.is_empty(), "{reports:?}");
}

#[test]
fn windows_picks_the_other_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    write(root, "src/app/util_linux.go", "package app\n");
    write(root, "src/app/util_windows.go", "package app\n");
    let cfg = BuildConfig {
        goos: "windows".into(),
        ..linux_amd64(root)
    };
    let (pkg, _) = build::load(&root.join("src/app"), cfg).expect("loaded");
    assert_eq!(file_names(&pkg), ["util_windows.go"]);
}

#[test]
fn imports_resolve_under_the_root_and_are_checked() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    write(root, "src/example.com/shapes/shapes.go", "package shapes\n\ntype Square struct{ Side int }\n\nfunc (s Square) Area() int { return s.Side * s.Side }\n");
    write(
        root,
        "src/app/main.go",
        "package main\n\nimport \"example.com/shapes\"\n\nfunc main() {\n\tvar s shapes.Square\n\tvar n string = s.Area()\n\t_ = n\n}\n",
    );
    let cfg = BuildConfig {
        check: true,
        ..linux_amd64(root)
    };
    let (pkg, reports) = build::load(&root.join("src/app"), cfg).expect("loaded");
    assert_eq!(pkg.deps.len(), 1);
    assert_eq!(reports.len(), 1, "{reports:?}");
    let r = &reports[0];
    assert_eq!((r.line, r.column), (7, 17));
    assert!(r.message.starts_with("cannot use s.Area() (value of type int) as string value"), "{}", r.message);
    assert!(r.to_string().contains("main.go:7:17: cannot use"), "{r}");
}

#[test]
fn empty_and_missing_directories() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    write(root, "src/docs/README.md", "nothing here\n");
    let err = build::load(&root.join("src/docs"), linux_amd64(root)).unwrap_err();
    assert!(matches!(err, BuildError::NoGoFiles { .. }), "{err}");
    let err = build::load(&root.join("src/absent"), linux_amd64(root)).unwrap_err();
    assert!(matches!(err, BuildError::Io { .. }), "{err}");
}

#[test]
fn mixed_package_names_are_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    write(root, "src/mix/a.go", "package a\n");
    write(root, "src/mix/b.go", "package b\n");
    let err = build::load(&root.join("src/mix"), linux_amd64(root)).unwrap_err();
    assert!(matches!(err, BuildError::MixedPackages { .. }), "{err}");
}

#[test]
fn concurrent_requests_share_one_build() {
    let fs = Arc::new(MemFs::new());
    fs.insert("/go/src/lib/lib.go", "package lib\n\nconst N = 1\n");
    for i in 0..8 {
        fs.insert(
            format!("/go/src/app{i}/main.go"),
            format!("package app{i}\n\nimport \"lib\"\n\nconst M = lib.N + {i}\n"),
        );
    }
    let cfg = BuildConfig {
        check: true,
        ..linux_amd64(Path::new("/go"))
    };
    let dyn_fs: Arc<dyn FileSystem> = fs.clone();
    let cache = PackageCache::new(cfg, dyn_fs).expect("cache");

    let pkgs: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = &cache;
                s.spawn(move || cache.load_dir(Path::new(&format!("/go/src/app{i}"))))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread").expect("loaded"))
            .collect()
    });

    let lib = pkgs[0].deps.get("lib").expect("lib dependency");
    for p in &pkgs {
        assert!(p.diags.is_empty(), "{:?}", p.reports());
        assert!(Arc::ptr_eq(p.deps.get("lib").expect("lib"), lib));
    }
    assert_eq!(fs.reads(Path::new("/go/src/lib/lib.go")), 1);
    let stats = cache.stats();
    assert_eq!(stats.builds, 9);
    assert_eq!(stats.entries, 9);
}

#[test]
fn os_and_memory_file_systems_agree() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let root = tmp.path();
    write(root, "pkg/a.go", "package a\n");
    write(root, "pkg/sub/b.go", "package b\n");
    let mem = MemFs::new();
    mem.insert(root.join("pkg/a.go"), "package a\n");
    mem.insert(root.join("pkg/sub/b.go"), "package b\n");
    let dir = root.join("pkg");
    assert_eq!(OsFs.read_dir(&dir).expect("os"), mem.read_dir(&dir).expect("mem"));
    assert_eq!(
        OsFs.read_file(&dir.join("a.go")).expect("os"),
        mem.read_file(&dir.join("a.go")).expect("mem")
    );
}
