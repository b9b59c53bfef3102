use go125_frontend::{tokenize, FileId, LexOptions, Lexer, Source};
use proptest::prelude::*;

const GO_ALPHABET: &str = r#"[a-z0-9 \n\t"'`/*+\-<>=!&|^%.,;:(){}\[\]_xXeEpPi]*"#;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn never_panics_and_progresses(s in ".*") {
        let src = Source::from_text("p.go", &s);
        let mut last_end = 0usize;
        let max_steps = s.len().saturating_mul(4) + 64;
        for (steps, (start, kind, end)) in Lexer::new(&src, FileId(0), LexOptions::default()).enumerate() {
            prop_assert!(start <= end, "start>end: ({start},{end}) {kind:?} input={s:?}");
            prop_assert!(end <= s.len(), "end out of bounds: ({start},{end}) input={s:?}");
            prop_assert!(start >= last_end, "token moved backwards at {start} input={s:?}");
            last_end = end;
            prop_assert!(steps <= max_steps, "too many steps input={s:?}");
        }
    }

    #[test]
    fn reconstruction_is_lossless(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let src = Source::new("p.go", bytes.clone());
        let (table, _) = tokenize(&src, FileId(0), LexOptions { max_errors: usize::MAX });
        prop_assert_eq!(table.reconstruct(&src, false), bytes);
    }

    #[test]
    fn goish_text_round_trips(s in GO_ALPHABET) {
        let src = Source::from_text("p.go", &s);
        let (table, _) = tokenize(&src, FileId(0), LexOptions::default());
        prop_assert_eq!(table.reconstruct(&src, false), s.as_bytes());
    }

    #[test]
    fn normalizing_twice_changes_nothing(s in GO_ALPHABET) {
        let opts = LexOptions { max_errors: usize::MAX };
        let src = Source::from_text("p.go", &s);
        let (table, _) = tokenize(&src, FileId(0), opts);
        let once = table.reconstruct(&src, true);
        let again = Source::new("p.go", once.clone());
        let (table2, _) = tokenize(&again, FileId(0), opts);
        let kinds = |t: &go125_frontend::token::TokenTable| t.iter().map(|k| t.kind(k)).collect::<Vec<_>>();
        prop_assert_eq!(kinds(&table), kinds(&table2));
        prop_assert_eq!(table2.reconstruct(&again, true), once);
    }
}
