use go125_frontend::{parse_file, DiagKind, FileId, ParseOptions, ParsedFile, Source};

fn parse(src: &str) -> ParsedFile {
    parse_file(FileId(0), Source::from_text("snippet.go", src), &ParseOptions::default())
}

fn assert_parses(src: &str) -> ParsedFile {
    let f = parse(src);
    if f.cst.is_none() || f.has_errors() {
        panic!("expected parse ok, got diagnostics: {:#?}", f.diags);
    }
    f
}

fn node_counts(f: &ParsedFile) -> [usize; 6] {
    let a = &f.cst.as_ref().expect("parsed").arena;
    [
        a.decls.len(),
        a.funcs.len(),
        a.stmts.len(),
        a.exprs.len(),
        a.types.len(),
        f.scopes.len(),
    ]
}

/// Re-parsing the whitespace-normalized rendering of a file yields the
/// same tokens and the same tree shape.
fn assert_idempotent(src: &str) {
    let first = assert_parses(src);
    let normalized = first.tokens.reconstruct(&first.source, true);
    let text = String::from_utf8(normalized).expect("normalized text is UTF-8");
    let second = assert_parses(&text);
    let kinds = |f: &ParsedFile| f.tokens.iter().map(|t| f.tokens.kind(t)).collect::<Vec<_>>();
    assert_eq!(kinds(&first), kinds(&second));
    assert_eq!(node_counts(&first), node_counts(&second));
    assert_eq!(second.tokens.reconstruct(&second.source, true), text.as_bytes());
}

const DECLS: &str = r#"
package main

import (
    "fmt"
    . "math"
    _ "net/http"
)

const (
    A = 1
    B int = 2
)

var (
    x = 1
    y, z int
)

type (
    T = int
    U[T any] struct { F T }
    V interface {
        M(x int) int
        ~int | ~string
    }
)

func main() {
    fmt.Println(Sqrt(4))
}
"#;

const STATEMENTS: &str = r#"
package p

func f(x int, ch chan int) int {
    if x < 0 { return -x }
    for i := 0; i < 10; i++ {
        if i == 5 { break }
        continue
    }
    for range []int{1,2,3} {
    }
outer:
    for k, v := range map[string]int{} {
        _, _ = k, v
        break outer
    }
    switch x {
    case 0, 1:
        x++
        fallthrough
    default:
        x = 3
    }
    switch t := any(x).(type) {
    case int, string:
        _ = t
    case nil:
    }
    select {
    case ch <- x:
        return x
    case v, ok := <-ch:
        _, _ = v, ok
    default:
        return 0
    }
    go func() {}()
    defer func() { recover() }()
    goto end
end:
    return x
}
"#;

const EXPRESSIONS: &str = r#"
package p

func f(a, b, c int, ch chan<- int, fs ...func(int) int) {
    _ = a + b*c - (a<<2)
    _ = a == b || a < c && b <= c
    _ = &a
    _ = []int{1,2,3}[0]
    _ = []int{1,2,3}[1:]
    _ = []int{1,2,3}[:2]
    _ = []int{1,2,3}[0:2:3]
    _ = map[string]int{"a":1, "b":2}["a"]
    _ = struct{ X, Y int }{1, 2}
    _ = [...]string{2: "b", 0: "a"}
    _ = fs[0](a)
    _ = func(x int) int { return x * 2 }(a)
    _ = any(a).(int)
    _ = 1.5e3 + 0x1p-2 + 2i
    _ = 'x' + '\n'
    _ = `raw
string`
    ch <- a
}
"#;

const GENERICS: &str = r#"
package p

type Number interface {
    ~int | ~int64 | ~float64
}

type List[T any] struct {
    items []T
}

func (l *List[T]) Push(v T) { l.items = append(l.items, v) }

func Map[T, U any](xs []T, f func(T) U) []U {
    out := make([]U, 0, len(xs))
    for _, x := range xs {
        out = append(out, f(x))
    }
    return out
}

func Sum[T Number](xs ...T) (s T) {
    for _, x := range xs {
        s += x
    }
    return
}

var l List[int]
var m = Map[int, string]
var a [4]int
var s = Sum[float64](1, 2)
"#;

#[test]
fn parses_imports_and_decls() {
    let f = assert_parses(DECLS);
    assert_eq!(f.package_name(), Some("main"));
}

#[test]
fn parses_statements() {
    assert_parses(STATEMENTS);
}

#[test]
fn parses_expressions() {
    assert_parses(EXPRESSIONS);
}

#[test]
fn parses_generics() {
    assert_parses(GENERICS);
}

#[test]
fn composite_literal_in_condition_needs_parens() {
    assert_parses("package p\ntype T struct{ x int }\nfunc f(t T) { if t == (T{}) {} }\n");
    let f = parse("package p\ntype T struct{ x int }\nfunc f(t T) { if t == T{} {} }\n");
    assert!(f.diags.iter().any(|d| d.kind == DiagKind::Syntax), "{:?}", f.diags);
}

#[test]
fn reparse_is_idempotent() {
    for src in [DECLS, STATEMENTS, EXPRESSIONS, GENERICS] {
        assert_idempotent(src);
    }
}

#[test]
fn syntax_errors_do_not_panic() {
    for src in [
        "package",
        "package p\nfunc (",
        "package p\nvar x = [",
        "package p\ntype T struct {",
        "package p\nfunc f() { for { }",
        "package p\nfunc f() { x := }",
        "package p\nimport \"a\nvar x int",
    ] {
        let f = parse(src);
        assert!(f.has_errors(), "{src:?} parsed cleanly");
        assert_eq!(f.tokens.reconstruct(&f.source, false), src.as_bytes());
    }
}

#[test]
fn positions_follow_line_directives() {
    let f = parse("package p\n//line gen.y:40\nvar x = 1 + ;\n");
    let d = f.diags.iter().find(|d| d.kind == DiagKind::Syntax).expect("syntax error");
    let pos = f.position(d.span.start);
    assert_eq!(&*pos.file, "gen.y");
    assert_eq!(pos.line, 40);
}
