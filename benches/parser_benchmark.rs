use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use go125_frontend::check::{check_package, CheckConfig, NoImports};
use go125_frontend::cst::Interner;
use go125_frontend::{parse_file, tokenize, FileId, LexOptions, Lexer, ParseOptions, Source};
use std::hint::black_box as bb;

// =============================================================================
// Corpus
// =============================================================================

const SMALL_HELLO_WORLD: &str = r#"
package main

func main() {
    println("Hello, World!")
}
"#;

const MEDIUM_STRUCT_METHODS: &str = r#"
package geometry

type Point struct {
    X, Y float64
}

func (p Point) Dot(q Point) float64 {
    return p.X*q.X + p.Y*q.Y
}

func (p *Point) Scale(f float64) {
    p.X = p.X * f
    p.Y = p.Y * f
}

type Rectangle struct {
    Min, Max Point
}

func (r Rectangle) Area() float64 {
    return (r.Max.X - r.Min.X) * (r.Max.Y - r.Min.Y)
}

func (r *Rectangle) Grow(delta float64) {
    r.Max.X += delta
    r.Max.Y += delta
}

const (
    KB = 1 << (10 * (iota + 1))
    MB
    GB
)

func Sum[T ~int | ~float64](xs ...T) T {
    var s T
    for _, x := range xs {
        s += x
    }
    return s
}
"#;

const LARGE_COMPLEX: &str = r#"
package compiler

import (
    "fmt"
    "strings"
)

type TokenKind int

const (
    TokEOF TokenKind = iota
    TokIdent
    TokNumber
    TokString
)

type Token struct {
    Kind TokenKind
    Text string
    Line int
}

type Lexer struct {
    input  []byte
    pos    int
    line   int
    tokens []Token
}

func NewLexer(source string) *Lexer {
    return &Lexer{
        input: []byte(source),
        pos:   0,
        line:  1,
    }
}

func (l *Lexer) NextToken() Token {
    if l.pos >= len(l.input) {
        return Token{Kind: TokEOF, Line: l.line}
    }

    ch := l.input[l.pos]
    if isLetter(ch) {
        return l.readIdent()
    }
    if isDigit(ch) {
        return l.readNumber()
    }

    l.pos++
    return Token{Kind: TokIdent, Text: string(ch), Line: l.line}
}

func (l *Lexer) readIdent() Token {
    start := l.pos
    for l.pos < len(l.input) && isLetter(l.input[l.pos]) {
        l.pos++
    }
    return Token{
        Kind: TokIdent,
        Text: string(l.input[start:l.pos]),
        Line: l.line,
    }
}

func (l *Lexer) readNumber() Token {
    start := l.pos
    for l.pos < len(l.input) && isDigit(l.input[l.pos]) {
        l.pos++
    }
    return Token{
        Kind: TokNumber,
        Text: string(l.input[start:l.pos]),
        Line: l.line,
    }
}

func isLetter(ch byte) bool {
    return (ch >= 'a' && ch <= 'z') || (ch >= 'A' && ch <= 'Z') || ch == '_'
}

func isDigit(ch byte) bool {
    return ch >= '0' && ch <= '9'
}
"#;

fn generated(n: usize) -> String {
    let mut s = String::from("package gen\n\ntype T struct{ a, b int }\n\n");
    for i in 0..n {
        s.push_str(&format!(
            "func f{i}(t *T, xs []int) (int, bool) {{\n\tsum := t.a * {i}\n\tfor i, x := range xs {{\n\t\tif x > i {{\n\t\t\tsum += x << 2\n\t\t}}\n\t}}\n\treturn sum, sum%2 == 0\n}}\n\n"
        ));
    }
    s
}

fn source(name: &str, text: &str) -> Source {
    Source::new(name, text.as_bytes().to_vec())
}

// =============================================================================
// Benchmark 1: Lexer
//  - iterate: scanning plus semicolon insertion, no table
//  - tokenize: the lossless table the parser consumes
// =============================================================================

fn bench_lexer(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer");
    let corpora = [
        ("small", SMALL_HELLO_WORLD),
        ("medium", MEDIUM_STRUCT_METHODS),
        ("large", LARGE_COMPLEX),
    ];
    for (name, text) in corpora {
        let src = source(name, text);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("iterate", name), &src, |b, src| {
            b.iter(|| {
                let mut acc = 0usize;
                for (l, _, r) in Lexer::new(bb(src), FileId(0), LexOptions::default()) {
                    acc = acc.wrapping_add(l ^ r);
                }
                bb(acc);
            });
        });
        group.bench_with_input(BenchmarkId::new("tokenize", name), &src, |b, src| {
            b.iter(|| bb(tokenize(bb(src), FileId(0), LexOptions::default())));
        });
    }
    group.finish();
}

// =============================================================================
// Benchmark 2: Parser (tokens, CST and scopes)
// =============================================================================

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    let opts = ParseOptions::default();
    let corpora = [
        ("small", SMALL_HELLO_WORLD),
        ("medium", MEDIUM_STRUCT_METHODS),
        ("large", LARGE_COMPLEX),
    ];
    for (name, text) in corpora {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_file", name), &text, |b, text| {
            b.iter_batched(
                || source(name, text),
                |src| bb(parse_file(FileId(0), src, &opts)),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

// =============================================================================
// Benchmark 3: Checker on a parsed file
// =============================================================================

fn bench_checker(c: &mut Criterion) {
    let mut group = c.benchmark_group("checker");
    let parsed = vec![parse_file(
        FileId(0),
        source("geometry.go", MEDIUM_STRUCT_METHODS),
        &ParseOptions::default(),
    )];
    let cfg = CheckConfig::new("geometry", 8);
    group.bench_function("check_package_medium", |b| {
        b.iter(|| bb(check_package(bb(&parsed), &NoImports, &cfg)));
    });
    group.finish();
}

// =============================================================================
// Benchmark 4: Scalability with file size
// =============================================================================

fn bench_scalability(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalability");
    group.sample_size(20);
    for &n in &[10usize, 100, 1000] {
        let text = generated(n);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", n), &text, |b, text| {
            b.iter_batched(
                || source("gen.go", text),
                |src| bb(parse_file(FileId(0), src, &ParseOptions::default())),
                criterion::BatchSize::LargeInput,
            );
        });
        let parsed = vec![parse_file(FileId(0), source("gen.go", &text), &ParseOptions::default())];
        let cfg = CheckConfig::new("gen", 8);
        group.bench_with_input(BenchmarkId::new("check", n), &parsed, |b, parsed| {
            b.iter(|| bb(check_package(parsed, &NoImports, &cfg)));
        });
        let names: Vec<String> = (0..n * 10).map(|i| format!("name{}", i % (n + 1))).collect();
        group.bench_with_input(BenchmarkId::new("interner", n), &names, |b, names| {
            b.iter(|| {
                let mut interner = Interner::new();
                for s in names {
                    bb(interner.intern(s));
                }
                bb(interner);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lexer, bench_parser, bench_checker, bench_scalability);
criterion_main!(benches);
