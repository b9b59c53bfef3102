use go125_frontend::literal::{parse_float, parse_imag, parse_int, unquote_rune, unquote_string};
use go125_frontend::token::TokKind;
use go125_frontend::{tokenize, Diag, FileId, LexOptions, Source};
use num_bigint::BigInt;
use num_rational::BigRational;

/// Kind of the first token and the lexical diagnostics.
fn lex1(input: &str) -> (TokKind, Vec<Diag>) {
    let src = Source::from_text("lit.go", input);
    let (table, diags) = tokenize(&src, FileId(0), LexOptions::default());
    let first = table.iter().next().map_or(TokKind::Eof, |t| table.kind(t));
    (first, diags)
}

#[test]
fn strings_and_escapes() {
    for s in [r#""\n""#, r#""\t""#, r#""\\\"""#, r#""\x41""#, r#""A""#, r#""\U00000041""#, r#""\101""#] {
        let (k, diags) = lex1(s);
        assert!(diags.is_empty(), "{s} produced diags: {diags:?}");
        assert_eq!(k, TokKind::StringLit, "{s}");
    }
    assert_eq!(lex1("`a\\n\nb`").0, TokKind::RawStringLit);
    assert_eq!(unquote_string(r#""\x41é\n""#).unwrap(), "Aé\n".as_bytes());
    assert_eq!(unquote_string("`a\r\nb`").unwrap(), b"a\nb");
    assert_eq!(unquote_string(r#""\xff""#).unwrap(), [0xff]);
}

#[test]
fn invalid_escapes_are_errors() {
    for s in [r#""\'""#, r#""\q""#, r#""\400""#, r#""\uD800""#, r#""\U00110000""#] {
        let (k, diags) = lex1(s);
        assert_eq!(k, TokKind::Error, "{s}");
        assert_eq!(diags.len(), 1, "{s}: {diags:?}");
    }
}

#[test]
fn runes() {
    for (s, want) in [("'a'", 97), (r"'\n'", 10), (r"'\x41'", 65), (r"'é'", 0xe9), (r"'\141'", 97), ("'é'", 0xe9)] {
        let (k, diags) = lex1(s);
        assert!(diags.is_empty(), "{s}: {diags:?}");
        assert_eq!(k, TokKind::RuneLit, "{s}");
        assert_eq!(unquote_rune(s).unwrap(), want, "{s}");
    }
    for s in ["''", "'ab'", r#"'\"'"#] {
        assert_eq!(lex1(s).0, TokKind::Error, "{s}");
    }
}

#[test]
fn number_kinds() {
    let cases: &[(&str, TokKind)] = &[
        ("0", TokKind::IntLit),
        ("0x_FF", TokKind::IntLit),
        ("0o17", TokKind::IntLit),
        ("0b1010", TokKind::IntLit),
        ("1_000_000", TokKind::IntLit),
        ("1.", TokKind::FloatLit),
        (".5", TokKind::FloatLit),
        ("1e-3", TokKind::FloatLit),
        ("0x1p4", TokKind::FloatLit),
        ("3i", TokKind::ImagLit),
        ("0x1p-2i", TokKind::ImagLit),
        ("1__2", TokKind::Error),
        ("0x", TokKind::Error),
        ("0b102", TokKind::Error),
        ("0x1.0", TokKind::Error),
    ];
    for (s, want) in cases {
        assert_eq!(lex1(s).0, *want, "{s}");
    }
}

#[test]
fn number_values() {
    assert_eq!(parse_int("0x_FF"), Some(BigInt::from(255)));
    assert_eq!(parse_int("017"), Some(BigInt::from(15)));
    assert_eq!(parse_int("0b1010"), Some(BigInt::from(10)));
    assert_eq!(
        parse_int("18446744073709551616"),
        Some(BigInt::from(u64::MAX) + 1)
    );
    assert_eq!(parse_float("0x1p-2"), Some(BigRational::new(1.into(), 4.into())));
    assert_eq!(parse_float("1.5e2"), Some(BigRational::from_integer(150.into())));
    assert_eq!(parse_imag("2.5i"), Some(BigRational::new(5.into(), 2.into())));
}
