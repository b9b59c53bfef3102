//! Backtracking recursive-descent parser.
//!
//! Every production is a method returning [`PResult`]: `Ok(Some(node))` on
//! success, `Ok(None)` when the input does not match (the caller may try an
//! alternative), and `Err(Abort)` when the parse has to stop altogether.
//! Alternatives are tried through [`Parser::attempt`], which rewinds the
//! cursor, the scope journal and the diagnostics on failure. Nodes allocated
//! by a failed attempt stay in the arena but are never referenced.
//!
//! Tokens are pulled from the lexer only as far as lookahead requires.

mod analyzer;
mod decl;
mod expr;
mod stmt;
mod types;

use std::borrow::Cow;
use std::sync::Arc;

use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::cst::{Cst, CstArena, IdentName, Interner, SourceFile, Symbol};
use crate::error::{Diag, DiagKind, FileId, Span};
use crate::lexer::{LexOptions, TokenStream};
use crate::scope::{Binding, DeclRef, ScopeArena, ScopeId, ScopeKind, ScopeMark};
use crate::source::{Position, Source};
use crate::token::{Tok, TokKind, TokenTable};

pub use analyzer::{Analyzer, SiteStats};

pub type PResult<T> = Result<Option<T>, Abort>;

/// Unwraps a successful match or propagates "no match" to the caller.
macro_rules! req {
    ($e:expr) => {
        match $e? {
            Some(v) => v,
            None => return Ok(None),
        }
    };
}
pub(crate) use req;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Abort {
    #[error("parse budget of {0} tokens exhausted")]
    Budget(u64),
    #[error("nesting exceeds {0} levels")]
    TooDeep(u32),
}

/// Token consumption allowance shared by every attempt of one parse.
///
/// Backtracking re-consumes tokens; the budget bounds the total work on
/// pathological input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    limit: u64,
    consumed: u64,
}

impl Budget {
    pub const fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }

    pub const fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    #[inline]
    pub fn consume(&mut self, n: u64) -> Result<(), Abort> {
        match self.consumed.checked_add(n) {
            Some(c) if c <= self.limit => {
                self.consumed = c;
                Ok(())
            }
            _ => {
                self.consumed = self.limit;
                Err(Abort::Budget(self.limit))
            }
        }
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.limit - self.consumed
    }

    #[inline]
    pub fn exhausted(&self) -> bool {
        self.consumed >= self.limit
    }

    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Token budget for one file.
    pub budget: u64,
    /// Maximum nesting of expressions, types, statements and blocks.
    pub max_depth: u32,
    pub lex: LexOptions,
    /// Collect per-site backtracking statistics.
    pub analyze: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            budget: 1 << 24,
            max_depth: 200,
            lex: LexOptions::default(),
            analyze: false,
        }
    }
}

/// Saved parser state for backtracking.
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint {
    pos: Tok,
    scope_mark: ScopeMark,
    diag_len: usize,
}

/// Everything produced for one file.
#[derive(Debug)]
pub struct ParsedFile {
    pub file: FileId,
    pub source: Arc<Source>,
    pub tokens: TokenTable,
    /// `None` when the file failed to parse.
    pub cst: Option<Cst>,
    pub scopes: ScopeArena,
    pub interner: Interner,
    /// Lexical, syntax and declaration diagnostics, in order.
    pub diags: Vec<Diag>,
    pub analysis: Option<Analyzer>,
    pub tokens_consumed: u64,
}

impl ParsedFile {
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Reported position of a byte offset, with line directives applied.
    pub fn position(&self, offset: u32) -> Position {
        self.source.position_mapped(offset, self.tokens.directives())
    }

    pub fn tok_text(&self, t: Tok) -> Cow<'_, str> {
        self.tokens.text(&self.source, t)
    }

    #[inline]
    pub fn ident(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    pub fn package_name(&self) -> Option<&str> {
        self.cst.as_ref().map(|c| self.ident(c.root.name.sym))
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| d.kind.is_error())
    }
}

/// Parses one file. Never fails: problems are reported in
/// [`ParsedFile::diags`], and a file that does not parse has no CST.
pub fn parse_file(file: FileId, source: Source, opts: &ParseOptions) -> ParsedFile {
    let mut budget = Budget::new(opts.budget);
    parse_file_with_budget(file, source, opts, &mut budget)
}

pub fn parse_file_with_budget(
    file: FileId,
    source: Source,
    opts: &ParseOptions,
    budget: &mut Budget,
) -> ParsedFile {
    let (tokens, cst, scopes, interner, diags, analysis) = {
        let mut p = Parser::new(file, &source, opts, budget);
        let root = p.source_file();
        let cst = match root {
            Ok(Some(root)) => Some(root),
            Ok(None) => {
                let d = p.syntax_error();
                p.diags.push(d);
                None
            }
            Err(abort) => {
                debug!(file = %source.name(), %abort, "parse aborted");
                p.peek();
                let span = p.tok_span(p.pos);
                p.diags.push(Diag::new(DiagKind::Resource, file, span, abort.to_string()));
                None
            }
        };
        p.finish(cst)
    };
    debug!(
        file = %source.name(),
        tokens = tokens.len(),
        consumed = budget.consumed(),
        ok = cst.is_some(),
        "parsed"
    );
    ParsedFile {
        file,
        source: Arc::new(source),
        tokens,
        cst,
        scopes,
        interner,
        diags,
        analysis,
        tokens_consumed: budget.consumed(),
    }
}

pub struct Parser<'src, 'b> {
    file: FileId,
    source: &'src Source,
    toks: TokenStream<'src>,
    pos: Tok,
    arena: CstArena,
    interner: Interner,
    scopes: ScopeArena,
    cur_scope: ScopeId,
    blank: Symbol,
    diags: Vec<Diag>,
    budget: &'b mut Budget,
    depth: u32,
    max_depth: u32,
    /// `{` after an operand does not start a composite literal
    /// (`if`/`for`/`switch` headers).
    no_composite: bool,
    /// `x.(type)` is accepted (type switch guard only).
    type_guard: bool,
    furthest: Tok,
    expected: SmallVec<[&'static str; 4]>,
    analyzer: Option<Analyzer>,
}

type Finished = (
    TokenTable,
    Option<Cst>,
    ScopeArena,
    Interner,
    Vec<Diag>,
    Option<Analyzer>,
);

impl<'src, 'b> Parser<'src, 'b> {
    pub fn new(
        file: FileId,
        source: &'src Source,
        opts: &ParseOptions,
        budget: &'b mut Budget,
    ) -> Self {
        let mut interner = Interner::new();
        let blank = interner.intern("_");
        Self {
            file,
            source,
            toks: TokenStream::new(source, file, opts.lex),
            pos: Tok(0),
            arena: CstArena::new(),
            interner,
            scopes: ScopeArena::new(Some(blank)),
            cur_scope: ScopeId::FILE,
            blank,
            diags: Vec::new(),
            budget,
            depth: 0,
            max_depth: opts.max_depth,
            no_composite: false,
            type_guard: false,
            furthest: Tok(0),
            expected: SmallVec::new(),
            analyzer: opts.analyze.then(Analyzer::default),
        }
    }

    fn finish(self, root: Option<SourceFile>) -> Finished {
        let Parser {
            toks,
            arena,
            interner,
            mut scopes,
            diags: parse_diags,
            analyzer,
            ..
        } = self;
        let (tokens, lex_diags) = toks.finish();
        scopes.seal();
        // Lexical problems come first; they usually explain syntax errors.
        let mut diags = lex_diags;
        diags.extend(parse_diags);
        let cst = root.map(|root| Cst { arena, root });
        (tokens, cst, scopes, interner, diags, analyzer)
    }

    // -------------------------------------------------------------------------
    // Cursor
    // -------------------------------------------------------------------------

    #[inline]
    fn peek(&mut self) -> TokKind {
        self.toks.kind(self.pos)
    }

    #[inline]
    fn peek_at(&mut self, n: u32) -> TokKind {
        self.toks.kind(Tok(self.pos.0 + n))
    }

    #[inline]
    fn at(&mut self, kind: TokKind) -> bool {
        self.peek() == kind
    }

    /// Consumes the current token, charging the budget.
    fn bump(&mut self) -> Result<Tok, Abort> {
        self.budget.consume(1)?;
        let t = self.pos;
        if self.toks.kind(t) != TokKind::Eof {
            self.pos = t.next();
        }
        Ok(t)
    }

    fn eat(&mut self, kind: TokKind) -> PResult<Tok> {
        if self.at(kind) {
            self.bump().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Like [`eat`](Self::eat), but records `kind` as expected on mismatch.
    fn expect(&mut self, kind: TokKind) -> PResult<Tok> {
        if self.at(kind) {
            self.bump().map(Some)
        } else {
            self.fail(kind.as_str())
        }
    }

    /// No match here; remembers what was expected at the furthest position.
    fn fail<T>(&mut self, what: &'static str) -> PResult<T> {
        if self.pos > self.furthest {
            self.furthest = self.pos;
            self.expected.clear();
        }
        if self.pos == self.furthest && !self.expected.contains(&what) {
            self.expected.push(what);
        }
        Ok(None)
    }

    /// Statement terminator: `;`, or nothing before a closing `)`/`}`.
    fn semi(&mut self) -> PResult<()> {
        match self.peek() {
            TokKind::Semi => {
                self.bump()?;
                Ok(Some(()))
            }
            TokKind::RParen | TokKind::RBrace | TokKind::Eof => Ok(Some(())),
            _ => self.fail("; or newline"),
        }
    }

    fn ident(&mut self) -> PResult<IdentName> {
        if !self.at(TokKind::Ident) {
            return self.fail("name");
        }
        let tok = self.bump()?;
        let sym = self.intern_tok(tok);
        Ok(Some(IdentName { sym, tok }))
    }

    fn intern_tok(&mut self, tok: Tok) -> Symbol {
        let text = self.toks.table().text(self.source, tok);
        self.interner.intern(&text)
    }

    #[inline]
    fn tok_span(&self, t: Tok) -> Span {
        self.toks.table().span(t)
    }

    /// Span from the start of `start` to the end of the last consumed token.
    fn span_from(&self, start: Tok) -> Span {
        let s = self.tok_span(start);
        if self.pos <= start {
            return Span::empty_at(s.start as usize);
        }
        s.to(self.tok_span(Tok(self.pos.0 - 1)))
    }

    /// Last consumed token.
    #[inline]
    fn prev(&self) -> Tok {
        Tok(self.pos.0.saturating_sub(1))
    }

    // -------------------------------------------------------------------------
    // Backtracking
    // -------------------------------------------------------------------------

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            scope_mark: self.scopes.mark(),
            diag_len: self.diags.len(),
        }
    }

    fn restore(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.scopes.rollback(cp.scope_mark);
        self.diags.truncate(cp.diag_len);
    }

    /// Runs `f`; on no match, rewinds to where it started.
    fn attempt<T>(
        &mut self,
        site: &'static str,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        let cp = self.checkpoint();
        let scope = self.cur_scope;
        let before = self.budget.consumed();
        let r = f(self)?;
        let matched = r.is_some();
        if !matched {
            self.restore(cp);
            self.cur_scope = scope;
        }
        if let Some(a) = &mut self.analyzer {
            a.record(site, matched, self.budget.consumed() - before);
        }
        Ok(r)
    }

    /// Runs `f` with a fresh child scope as the current scope.
    fn with_scope<T>(
        &mut self,
        kind: ScopeKind,
        f: impl FnOnce(&mut Self, ScopeId) -> PResult<T>,
    ) -> PResult<T> {
        let outer = self.cur_scope;
        let inner = self.scopes.open(outer, kind);
        self.cur_scope = inner;
        let r = f(self, inner);
        self.cur_scope = outer;
        r
    }

    /// Guards recursion depth.
    fn descend<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= self.max_depth {
            return Err(Abort::TooDeep(self.max_depth));
        }
        self.depth += 1;
        let r = f(self);
        self.depth -= 1;
        r
    }

    /// Inside brackets: composite literals allowed again, no type guard.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let saved = (self.no_composite, self.type_guard);
        self.no_composite = false;
        self.type_guard = false;
        let r = f(self);
        (self.no_composite, self.type_guard) = saved;
        r
    }

    /// Statement header of `if`/`for`/`switch`.
    fn header<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let saved = self.no_composite;
        self.no_composite = true;
        let r = f(self);
        self.no_composite = saved;
        r
    }

    // -------------------------------------------------------------------------
    // Declarations into scopes
    // -------------------------------------------------------------------------

    fn declare(&mut self, scope: ScopeId, name: IdentName, decl: DeclRef, visible_from: Tok) {
        let binding = Binding {
            decl,
            name: name.tok,
            visible_from,
        };
        if let Some(prev) = self.scopes.declare(scope, name.sym, binding) {
            let msg = format!("{} redeclared in this block", self.interner.resolve(name.sym));
            let d = Diag::new(DiagKind::Declaration, self.file, self.tok_span(name.tok), msg)
                .with_related(self.file, self.tok_span(prev.name));
            self.diags.push(d);
        }
    }

    /// At top level the current scope is the file scope, so that nested
    /// scopes see imports; declarations still go into the package block.
    fn decl_scope(&self) -> ScopeId {
        if self.cur_scope == ScopeId::FILE {
            ScopeId::PACKAGE
        } else {
            self.cur_scope
        }
    }

    /// Visibility start for a declaration ending before the current token:
    /// package-level names are visible everywhere.
    fn visible_after(&self) -> Tok {
        if self.cur_scope == ScopeId::FILE {
            Tok(0)
        } else {
            self.pos
        }
    }

    fn is_blank(&self, name: IdentName) -> bool {
        name.sym == self.blank
    }

    // -------------------------------------------------------------------------
    // Errors
    // -------------------------------------------------------------------------

    fn syntax_error(&mut self) -> Diag {
        let t = self.furthest;
        let kind = self.toks.kind(t);
        let found = match kind {
            TokKind::Eof => "EOF".to_string(),
            TokKind::Semi if self.toks.table().is_injected(t) => "newline".to_string(),
            TokKind::Ident => format!("name {}", self.toks.table().text(self.source, t)),
            k if k.is_literal() => format!("literal {}", self.toks.table().text(self.source, t)),
            k if k.is_keyword() => format!("keyword {k}"),
            TokKind::Error => "invalid token".to_string(),
            _ => self.toks.table().text(self.source, t).into_owned(),
        };
        let mut msg = format!("syntax error: unexpected {found}");
        if !self.expected.is_empty() {
            msg.push_str(", expected ");
            msg.push_str(&self.expected.join(" or "));
        }
        Diag::new(DiagKind::Syntax, self.file, self.tok_span(t), msg)
    }

    /// Reports a problem found while parsing that does not reject the input.
    fn report(&mut self, kind: DiagKind, span: Span, msg: impl Into<String>) {
        self.diags.push(Diag::new(kind, self.file, span, msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn parse(src: &str) -> ParsedFile {
        parse_file(FileId(0), Source::from_text("t.go", src), &ParseOptions::default())
    }

    #[test]
    fn options_compare_by_value() {
        let tight = ParseOptions {
            lex: LexOptions { max_errors: 1 },
            ..ParseOptions::default()
        };
        assert_ne!(tight, ParseOptions::default());
        assert_eq!(ParseOptions::default(), ParseOptions::default());
    }

    #[test]
    fn budget_counts_and_refuses() {
        let mut b = Budget::new(3);
        assert!(b.consume(2).is_ok());
        assert_eq!(b.remaining(), 1);
        assert_eq!(b.consume(2), Err(Abort::Budget(3)));
        assert!(b.exhausted());
    }

    #[test]
    fn missing_package_clause_is_one_syntax_error() {
        let f = parse("func main() {}\n");
        assert!(f.cst.is_none());
        let syntax: Vec<_> = f.diags.iter().filter(|d| d.kind == DiagKind::Syntax).collect();
        assert_eq!(syntax.len(), 1);
        assert!(syntax[0].message.contains("expected package"), "{}", syntax[0].message);
    }

    #[test]
    fn error_is_reported_at_furthest_token() {
        let src = "package p\nfunc f() { x := 1 +; }\n";
        let f = parse(src);
        assert!(f.cst.is_none());
        let d = f.diags.iter().find(|d| d.kind == DiagKind::Syntax).unwrap();
        assert_eq!(&src[d.span.start as usize..d.span.end as usize], ";");
    }

    /// `a, a, ... = g()` is first tried as a short variable declaration, so
    /// the names are consumed twice.
    fn rewound_assignment(names: usize) -> String {
        let lhs = vec!["a"; names].join(", ");
        format!("package p\nfunc f() {{\n\t{lhs} = g()\n}}\n")
    }

    #[test]
    fn backtracking_charges_the_budget_again() {
        let src = rewound_assignment(40);
        let f = parse(&src);
        assert!(f.cst.is_some(), "{:?}", f.diags);
        assert!(f.tokens_consumed > f.tokens.len() as u64);
    }

    #[test]
    fn budget_exhaustion_is_a_resource_error() {
        let src = rewound_assignment(40);
        let tokens = parse(&src).tokens.len() as u64;
        let opts = ParseOptions {
            budget: tokens,
            ..ParseOptions::default()
        };
        let f = parse_file(FileId(0), Source::from_text("t.go", &src), &opts);
        assert!(f.cst.is_none());
        let d = f.diags.iter().find(|d| d.kind == DiagKind::Resource).unwrap();
        assert!(!f.diags.iter().any(|d| d.kind == DiagKind::Syntax), "{:?}", f.diags);
        assert!(d.span.end as usize <= src.len());
        assert!(f.tokens_consumed <= tokens);
    }

    #[test]
    fn deep_nesting_aborts() {
        for depth in [250, 5000] {
            let src = format!("package p\nvar x = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
            let f = parse(&src);
            assert!(f.cst.is_none());
            let d = f.diags.iter().find(|d| d.kind == DiagKind::Resource).unwrap();
            assert!(d.message.contains("nesting"));
            assert!(d.span.end as usize <= src.len());
        }
    }

    #[test]
    fn unlexed_tokens_have_an_empty_span_at_the_end() {
        let f = parse("package p\n");
        let past = Tok(f.tokens.len() as u32 + 5);
        let end = f.tokens.span(f.tokens.last().unwrap()).end;
        assert_eq!(f.tokens.span(past), Span { start: end, end });
    }

    #[test]
    fn analyzer_records_backtracking() {
        let opts = ParseOptions {
            analyze: true,
            ..ParseOptions::default()
        };
        let src = "package p\nfunc f(int, string) { a, b = 1, 2 }\n";
        let f = parse_file(FileId(0), Source::from_text("t.go", src), &opts);
        assert!(f.cst.is_some());
        let a = f.analysis.unwrap();
        assert!(a.sites().any(|(_, s)| s.backtracks > 0));
    }
}
