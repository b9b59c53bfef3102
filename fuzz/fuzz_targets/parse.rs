#![no_main]

use go125_frontend::{parse_file, FileId, ParseOptions, Source};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let opts = ParseOptions {
        budget: 1 << 16,
        ..ParseOptions::default()
    };
    let f = parse_file(FileId(0), Source::new("fuzz.go", data.to_vec()), &opts);

    // Lossless whatever happened.
    assert_eq!(f.tokens.reconstruct(&f.source, false), data);
    assert!(f.tokens_consumed <= opts.budget);

    let mut last_end = 0u32;
    for t in f.tokens.iter() {
        let sep = f.tokens.separator_span(t);
        let span = f.tokens.span(t);
        assert_eq!(sep.start, last_end);
        assert!(sep.end == span.start && span.start <= span.end);
        last_end = span.end;
    }
    for d in &f.diags {
        assert!(d.span.start <= d.span.end && d.span.end as usize <= data.len());
    }
});
