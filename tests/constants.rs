use go125_frontend::check::{check_package, CheckConfig, CheckOutput, Entity, NoImports};
use go125_frontend::{parse_file, FileId, ParseOptions, Source};

fn check_with(src: &str, word: u64) -> CheckOutput {
    let f = parse_file(FileId(0), Source::from_text("c.go", src), &ParseOptions::default());
    assert!(!f.has_errors(), "{:?}", f.diags);
    check_package(&[f], &NoImports, &CheckConfig::new("c", word)).expect("checked")
}

fn messages(src: &str, word: u64) -> Vec<String> {
    check_with(src, word).diags.iter().map(|d| d.message.clone()).collect()
}

fn value(out: &CheckOutput, name: &str) -> String {
    match out.info.lookup(name) {
        Some(Entity::Const { val, .. }) => val.to_string(),
        other => panic!("{name} is not a constant: {other:?}"),
    }
}

const BOUNDS: &[(&str, &str, &str)] = &[
    ("int8", "-128", "127"),
    ("int16", "-32768", "32767"),
    ("int32", "-2147483648", "2147483647"),
    ("int64", "-9223372036854775808", "9223372036854775807"),
    ("uint8", "0", "255"),
    ("uint16", "0", "65535"),
    ("uint32", "0", "4294967295"),
    ("uint64", "0", "18446744073709551615"),
];

#[test]
fn sized_integers_accept_exactly_their_range() {
    for (typ, min, max) in BOUNDS {
        let ok = format!("package c\nconst lo {typ} = {min}\nconst hi {typ} = {max}\n");
        let msgs = messages(&ok, 8);
        assert!(msgs.is_empty(), "{typ}: {msgs:?}");

        let over = format!("package c\nconst x {typ} = {max} + 1\n");
        let msgs = messages(&over, 8);
        assert!(
            msgs.iter().any(|m| m.contains(&format!("as {typ} value")) && m.ends_with("(overflows)")),
            "{typ}: {msgs:?}"
        );

        let under = format!("package c\nconst x {typ} = {min} - 1\n");
        let msgs = messages(&under, 8);
        assert!(msgs.iter().any(|m| m.ends_with("(overflows)")), "{typ}: {msgs:?}");
    }
}

#[test]
fn int_and_uintptr_follow_the_word_size() {
    let src = "package c\nconst a int = 1 << 31\nconst b uint = 1 << 32\nconst p uintptr = 1 << 32\n";
    assert!(messages(src, 8).is_empty());
    assert_eq!(messages(src, 4).len(), 3, "{:?}", messages(src, 4));
}

#[test]
fn typed_arithmetic_overflow() {
    let msgs = messages("package c\nconst x = int8(127) + 1\n", 8);
    assert!(msgs.iter().any(|m| m == "constant 128 overflows int8"), "{msgs:?}");
    let msgs = messages("package c\nconst x = uint8(0) - 1\n", 8);
    assert!(msgs.iter().any(|m| m == "constant -1 overflows uint8"), "{msgs:?}");
}

#[test]
fn untyped_constants_are_exact() {
    let out = check_with(
        "package c\nconst huge = 1 << 100\nconst back = huge >> 98\nconst third = 1.0 / 3\nconst one = third * 3\nconst s = \"go\" + \"pher\"\n",
        8,
    );
    assert!(out.diags.is_empty());
    assert_eq!(value(&out, "back"), "4");
    assert_eq!(value(&out, "one"), "1");
    assert_eq!(value(&out, "s"), "\"gopher\"");
}

#[test]
fn float_to_integer_truncation() {
    let msgs = messages("package c\nconst x int = 1.5\n", 8);
    assert!(msgs.iter().any(|m| m.ends_with("(truncated)")), "{msgs:?}");
    assert!(messages("package c\nconst x int = 2.0\n", 8).is_empty());
}
