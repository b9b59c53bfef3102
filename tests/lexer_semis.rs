use go125_frontend::token::{TokKind, TokenTable};
use go125_frontend::{tokenize, FileId, LexOptions, Source};

fn lex(input: &str) -> (Source, TokenTable) {
    let src = Source::from_text("semis.go", input);
    let (table, _) = tokenize(&src, FileId(0), LexOptions::default());
    (src, table)
}

fn tok_name(t: TokKind) -> &'static str {
    use TokKind::*;
    match t {
        Ident => "IDENT",
        IntLit => "INT",
        FloatLit => "FLOAT",
        ImagLit => "IMAG",
        RuneLit => "CHAR",
        StringLit | RawStringLit => "STRING",
        Semi => ";",
        Plus => "+",
        Minus => "-",
        Star => "*",
        Slash => "/",
        Percent => "%",
        Amp => "&",
        Pipe => "|",
        Caret => "^",
        Shl => "<<",
        Shr => ">>",
        AndNot => "&^",
        AddAssign => "+=",
        SubAssign => "-=",
        MulAssign => "*=",
        DivAssign => "/=",
        ModAssign => "%=",
        AndAssign => "&=",
        OrAssign => "|=",
        XorAssign => "^=",
        ShlAssign => "<<=",
        ShrAssign => ">>=",
        AndNotAssign => "&^=",
        LAnd => "&&",
        LOr => "||",
        Arrow => "<-",
        Inc => "++",
        Dec => "--",
        EqEq => "==",
        Lt => "<",
        Gt => ">",
        Assign => "=",
        Bang => "!",
        NotEq => "!=",
        Le => "<=",
        Ge => ">=",
        Define => ":=",
        Ellipsis => "...",
        LParen => "(",
        LBrack => "[",
        LBrace => "{",
        Comma => ",",
        Dot => ".",
        RParen => ")",
        RBrack => "]",
        RBrace => "}",
        Colon => ":",
        Tilde => "~",
        KwBreak => "break",
        KwCase => "case",
        KwChan => "chan",
        KwConst => "const",
        KwContinue => "continue",
        KwDefault => "default",
        KwDefer => "defer",
        KwElse => "else",
        KwFallthrough => "fallthrough",
        KwFor => "for",
        KwFunc => "func",
        KwGo => "go",
        KwGoto => "goto",
        KwIf => "if",
        KwImport => "import",
        KwInterface => "interface",
        KwMap => "map",
        KwPackage => "package",
        KwRange => "range",
        KwReturn => "return",
        KwSelect => "select",
        KwStruct => "struct",
        KwSwitch => "switch",
        KwType => "type",
        KwVar => "var",
        Error => "ERROR",
        Eof => "EOF",
    }
}

fn names(input: &str) -> String {
    let (_, table) = lex(input);
    table
        .iter()
        .map(|t| table.kind(t))
        .filter(|k| *k != TokKind::Eof)
        .map(tok_name)
        .collect::<Vec<_>>()
        .join(" ")
}

fn injected(input: &str) -> usize {
    let (_, table) = lex(input);
    table.iter().filter(|&t| table.is_injected(t)).count()
}

#[rustfmt::skip]
const SEMICOLON_TESTS: &[(&str, &str)] = &[
    ("", ""),
    ("\u{FEFF};", ";"),
    (";", ";"),

    ("foo\n", "IDENT ;"),
    ("123\n", "INT ;"),
    ("1.2\n", "FLOAT ;"),
    ("2i\n", "IMAG ;"),
    ("'x'\n", "CHAR ;"),
    ("\"x\"\n", "STRING ;"),
    ("`x`\n", "STRING ;"),

    ("+\n", "+"),
    ("-\n", "-"),
    ("*\n", "*"),
    ("/\n", "/"),
    ("%\n", "%"),
    ("&\n", "&"),
    ("|\n", "|"),
    ("^\n", "^"),
    ("<<\n", "<<"),
    (">>\n", ">>"),
    ("&^\n", "&^"),
    ("+=\n", "+="),
    ("&^=\n", "&^="),
    ("&&\n", "&&"),
    ("||\n", "||"),
    ("<-\n", "<-"),
    ("++\n", "++ ;"),
    ("--\n", "-- ;"),
    ("==\n", "=="),
    (":=\n", ":="),
    ("...\n", "..."),
    ("~\n", "~"),

    ("(\n", "("),
    ("[\n", "["),
    ("{\n", "{"),
    (",\n", ","),
    (".\n", "."),
    (")\n", ") ;"),
    ("]\n", "] ;"),
    ("}\n", "} ;"),
    (";\n", ";"),
    (":\n", ":"),

    ("break\n", "break ;"),
    ("case\n", "case"),
    ("chan\n", "chan"),
    ("continue\n", "continue ;"),
    ("fallthrough\n", "fallthrough ;"),
    ("func\n", "func"),
    ("return\n", "return ;"),
    ("var\n", "var"),

    ("foo//comment\n", "IDENT ;"),
    ("foo//comment", "IDENT ;"),
    ("foo/*comment*/\n", "IDENT ;"),
    ("foo/*\n*/", "IDENT ;"),
    ("foo/*comment*/    \n", "IDENT ;"),
    ("foo/*\n*/    ", "IDENT ;"),
    ("foo    // comment\n", "IDENT ;"),
    ("foo    /*comment*/\n", "IDENT ;"),

    (
        "package main\n\nfunc main() {\n\tif {\n\t\treturn /* */ }\n}\n",
        "package IDENT ; func IDENT ( ) { if { return } ; } ;",
    ),
    ("package main", "package IDENT ;"),
];

#[test]
fn semicolon_table() {
    for (input, want) in SEMICOLON_TESTS {
        assert_eq!(names(input), *want, "input={input:?}");
        // Trailing newlines never change the result.
        let mut trimmed = *input;
        while let Some(t) = trimmed.strip_suffix('\n') {
            trimmed = t;
            assert_eq!(names(trimmed), *want, "input={trimmed:?}");
        }
    }
}

#[test]
fn injected_semicolons_are_zero_width() {
    let (src, table) = lex("x := 1\nx++\n");
    let semis: Vec<_> = table.iter().filter(|&t| table.kind(t) == TokKind::Semi).collect();
    assert_eq!(semis.len(), 2);
    for t in semis {
        assert!(table.is_injected(t));
        assert_eq!(table.text(&src, t), "");
    }
    let (src, table) = lex("x; y");
    let explicit = table.iter().find(|&t| table.kind(t) == TokKind::Semi).unwrap();
    assert!(!table.is_injected(explicit));
    assert_eq!(table.text(&src, explicit), ";");
}

#[test]
fn comment_newline_equivalence() {
    assert_eq!(injected("x/*\n*/y"), injected("x\ny"));
    assert_eq!(names("x/*\n*/y"), names("x\ny"));
    assert_eq!(names("x/* */y"), "IDENT IDENT ;");
}

#[test]
fn crlf_line_endings() {
    assert_eq!(names("a\r\nb\r\n"), "IDENT ; IDENT ;");
    assert_eq!(names("return\r\n}"), "return ; } ;");
}

#[test]
fn statements_in_a_function() {
    let src = "package p\nfunc f() {\n\tx := 1\n\tx++\n\tif x > 0 {\n\t\treturn\n\t} else {\n\t\tx--\n\t}\n}\n";
    assert_eq!(injected(src), 7);
}
