use go125_frontend::{parse_file, FileId, ParseOptions, Source};
use walkdir::WalkDir;

/// Parses every `.go` file under `$GO125_FRONTEND_CORPUS` (for example a
/// Go distribution's `src`) and checks that each one parses cleanly and
/// reconstructs byte for byte.
#[test]
fn parses_go_corpus_if_configured() {
    let Some(root) = std::env::var_os("GO125_FRONTEND_CORPUS") else {
        eprintln!("GO125_FRONTEND_CORPUS not set; skipping corpus test");
        return;
    };

    let mut total = 0usize;
    for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("go") {
            continue;
        }
        // testdata holds deliberately broken files.
        if path.components().any(|c| c.as_os_str() == "testdata") {
            continue;
        }
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };

        total += 1;
        let src = Source::new(path.display().to_string(), bytes.clone());
        let f = parse_file(FileId(0), src, &ParseOptions::default());
        assert_eq!(
            f.tokens.reconstruct(&f.source, false),
            bytes,
            "{} does not reconstruct",
            path.display()
        );
        if f.has_errors() {
            for d in f.diags.iter().take(8) {
                let pos = f.position(d.span.start);
                eprintln!("  {}:{}:{}: {}", pos.file, pos.line, pos.column, d.message);
            }
            panic!("{} failed to parse after {total} files", path.display());
        }
    }

    eprintln!("Parsed {total} Go files successfully.");
}
