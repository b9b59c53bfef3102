//! Token kinds and the per-file token table.
//!
//! Tokens are plain indices ([`Tok`]) into a [`TokenTable`]. Each entry
//! records where the separator run before the token starts, and where the
//! token's own text starts and ends. Separators are never dropped: the bytes
//! between the previous token's end and this token's start (whitespace,
//! comments, a BOM) belong to this token, and the `Eof` entry owns whatever
//! trails the last real token. Concatenating separator + text over the whole
//! table therefore reproduces the input exactly.

use std::borrow::Cow;
use std::fmt;

use crate::error::Span;
use crate::source::{LineDirective, Source};

/// Index of a token in its file's [`TokenTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Tok(pub u32);

impl Tok {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn next(self) -> Tok {
        Tok(self.0 + 1)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokKind {
    Ident,
    IntLit,
    FloatLit,
    ImagLit,
    RuneLit,
    StringLit,
    RawStringLit,

    // Keywords
    KwBreak,
    KwCase,
    KwChan,
    KwConst,
    KwContinue,
    KwDefault,
    KwDefer,
    KwElse,
    KwFallthrough,
    KwFor,
    KwFunc,
    KwGo,
    KwGoto,
    KwIf,
    KwImport,
    KwInterface,
    KwMap,
    KwPackage,
    KwRange,
    KwReturn,
    KwSelect,
    KwStruct,
    KwSwitch,
    KwType,
    KwVar,

    // Operators / Delimiters
    Ellipsis,
    ShlAssign,
    ShrAssign,
    AndNotAssign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    Shl,
    Shr,
    AndNot,
    LAnd,
    LOr,
    EqEq,
    NotEq,
    Le,
    Ge,
    Inc,
    Dec,
    Define,
    Arrow,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Lt,
    Gt,
    LParen,
    RParen,
    LBrack,
    RBrack,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    Dot,

    Error,
    Eof,
}

impl TokKind {
    pub const fn is_literal(self) -> bool {
        matches!(
            self,
            TokKind::IntLit
                | TokKind::FloatLit
                | TokKind::ImagLit
                | TokKind::RuneLit
                | TokKind::StringLit
                | TokKind::RawStringLit
        )
    }

    pub const fn is_keyword(self) -> bool {
        (self as u8) >= (TokKind::KwBreak as u8) && (self as u8) <= (TokKind::KwVar as u8)
    }

    /// Compound assignment operators (`+=`, `<<=`, ...).
    pub const fn is_op_assign(self) -> bool {
        (self as u8) >= (TokKind::ShlAssign as u8) && (self as u8) <= (TokKind::XorAssign as u8)
    }

    /// Fixed spelling of keywords and punctuation; a descriptive name otherwise.
    pub const fn as_str(self) -> &'static str {
        use TokKind::*;
        match self {
            Ident => "name",
            IntLit | FloatLit | ImagLit | RuneLit | StringLit | RawStringLit => "literal",
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
            Ellipsis => "...",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            AndNotAssign => "&^=",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            DivAssign => "/=",
            ModAssign => "%=",
            AndAssign => "&=",
            OrAssign => "|=",
            XorAssign => "^=",
            Shl => "<<",
            Shr => ">>",
            AndNot => "&^",
            LAnd => "&&",
            LOr => "||",
            EqEq => "==",
            NotEq => "!=",
            Le => "<=",
            Ge => ">=",
            Inc => "++",
            Dec => "--",
            Define => ":=",
            Arrow => "<-",
            Assign => "=",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Amp => "&",
            Pipe => "|",
            Caret => "^",
            Tilde => "~",
            Bang => "!",
            Lt => "<",
            Gt => ">",
            LParen => "(",
            RParen => ")",
            LBrack => "[",
            RBrack => "]",
            LBrace => "{",
            RBrace => "}",
            Comma => ",",
            Semi => ";",
            Colon => ":",
            Dot => ".",
            Error => "invalid token",
            Eof => "EOF",
        }
    }
}

impl fmt::Display for TokKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Struct-of-arrays token storage for one file.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    kinds: Vec<TokKind>,
    sep_starts: Vec<u32>,
    starts: Vec<u32>,
    ends: Vec<u32>,
    directives: Vec<LineDirective>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, kind: TokKind, sep_start: usize, start: usize, end: usize) -> Tok {
        debug_assert!(sep_start <= start && start <= end);
        debug_assert!(self.ends.last().map_or(true, |&e| e as usize <= sep_start));
        let t = Tok(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.sep_starts.push(sep_start as u32);
        self.starts.push(start as u32);
        self.ends.push(end as u32);
        t
    }

    pub(crate) fn push_directive(&mut self, d: LineDirective) {
        self.directives.push(d);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    #[inline]
    pub fn kind(&self, t: Tok) -> TokKind {
        self.kinds.get(t.index()).copied().unwrap_or(TokKind::Eof)
    }

    /// Span of `t`. Tokens not lexed yet map to an empty span after the
    /// last one.
    #[inline]
    pub fn span(&self, t: Tok) -> Span {
        match (self.starts.get(t.index()), self.ends.get(t.index())) {
            (Some(&start), Some(&end)) => Span { start, end },
            _ => {
                let end = self.ends.last().copied().unwrap_or_default();
                Span { start: end, end }
            }
        }
    }

    #[inline]
    pub fn separator_span(&self, t: Tok) -> Span {
        Span {
            start: self.sep_starts[t.index()],
            end: self.starts[t.index()],
        }
    }

    /// Zero-width `;` produced by automatic statement termination.
    #[inline]
    pub fn is_injected(&self, t: Tok) -> bool {
        self.kind(t) == TokKind::Semi && self.starts[t.index()] == self.ends[t.index()]
    }

    pub fn directives(&self) -> &[LineDirective] {
        &self.directives
    }

    pub fn last(&self) -> Option<Tok> {
        self.kinds.len().checked_sub(1).map(|i| Tok(i as u32))
    }

    pub fn iter(&self) -> impl Iterator<Item = Tok> + '_ {
        (0..self.kinds.len() as u32).map(Tok)
    }

    /// Token text, honouring text patches.
    pub fn text<'s>(&self, src: &'s Source, t: Tok) -> Cow<'s, str> {
        if let Some(p) = src.text_patch(t) {
            return Cow::Borrowed(p);
        }
        let sp = self.span(t);
        src.slice(sp.start, sp.end)
    }

    /// Separator text before `t`, honouring separator patches.
    pub fn separator<'s>(&self, src: &'s Source, t: Tok) -> Cow<'s, str> {
        if let Some(p) = src.separator_patch(t) {
            return Cow::Borrowed(p);
        }
        let sp = self.separator_span(t);
        src.slice(sp.start, sp.end)
    }

    /// Rebuilds the file from its tokens.
    ///
    /// Without patches and without normalization the result is byte-for-byte
    /// the original input. With `normalize`, a separator containing a newline
    /// becomes one newline, any other non-empty separator becomes one space.
    pub fn reconstruct(&self, src: &Source, normalize: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(src.len());
        for t in self.iter() {
            let sep_patched = src.separator_patch(t);
            let sp = self.separator_span(t);
            let raw_sep = &src.bytes()[sp.start as usize..sp.end as usize];
            match (normalize, sep_patched) {
                (_, Some(p)) if !normalize => out.extend_from_slice(p.as_bytes()),
                (false, _) => out.extend_from_slice(raw_sep),
                (true, p) => {
                    let sep = p.map(str::as_bytes).unwrap_or(raw_sep);
                    if memchr::memchr(b'\n', sep).is_some() {
                        out.push(b'\n');
                    } else if !sep.is_empty() {
                        out.push(b' ');
                    }
                }
            }
            match src.text_patch(t) {
                Some(p) => out.extend_from_slice(p.as_bytes()),
                None => {
                    let sp = self.span(t);
                    out.extend_from_slice(&src.bytes()[sp.start as usize..sp.end as usize]);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_and_assign_ranges() {
        assert!(TokKind::KwBreak.is_keyword());
        assert!(TokKind::KwVar.is_keyword());
        assert!(!TokKind::Ident.is_keyword());
        assert!(TokKind::AddAssign.is_op_assign());
        assert!(!TokKind::Assign.is_op_assign());
        assert!(!TokKind::Shl.is_op_assign());
    }
}
