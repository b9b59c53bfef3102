//! Lossless Go tokenizer.
//!
//! A logos-generated scanner ([`RawTok`]) recognises raw lexemes, trivia
//! included. [`Lexer`] wraps it and adds what a DFA cannot do on its own:
//! automatic semicolon insertion, the imaginary suffix lookahead, BOM
//! placement, line directive recording and the error budget. It yields
//! `(start, kind, end)` triples and never drops bytes: anything between two
//! yielded tokens is separator text.
//!
//! [`TokenStream`] pulls from the lexer on demand and appends to a
//! [`TokenTable`], so the parser only lexes as far as its lookahead reaches.

use std::collections::VecDeque;
use std::ops::Range;

use logos::{Lexer as LogosLexer, Logos};

use crate::error::{Diag, DiagKind, FileId, LexError, LexErrorKind, Span};
use crate::literal;
use crate::source::{parse_line_directive, LineDirective, Source};
use crate::token::{Tok, TokKind, TokenTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexOptions {
    /// Diagnostics tolerated before the stream is closed early.
    pub max_errors: usize,
}

impl Default for LexOptions {
    fn default() -> Self {
        Self { max_errors: 10 }
    }
}

// =============================================================================
// Scanner callbacks
// =============================================================================

#[inline(always)]
const fn is_dec_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

#[inline(always)]
const fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

/// `0123i`-style mantissa: decimal digits with single underscores between them.
const fn is_decimal_digits_with_underscores(bytes: &[u8]) -> bool {
    if bytes.is_empty() || !is_dec_digit(bytes[0]) {
        return false;
    }
    let mut prev_digit = true;
    let mut i = 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'_' {
            if !prev_digit {
                return false;
            }
            prev_digit = false;
        } else if is_dec_digit(b) {
            prev_digit = true;
        } else {
            return false;
        }
        i += 1;
    }
    prev_digit
}

fn lex_block_comment(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let rem = lex.remainder().as_bytes();
    match memchr::memmem::find(rem, b"*/") {
        Some(pos) => {
            lex.bump(pos + 2);
            Ok(())
        }
        None => {
            lex.bump(rem.len());
            Err(LexErrorKind::UnterminatedComment)
        }
    }
}

fn check_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    literal::unquote_string(lex.slice()).map(drop)
}

fn check_rune(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    literal::unquote_rune(lex.slice()).map(drop)
}

/// Bumps to the end of the current line (newline excluded).
fn bump_to_line_end(lex: &mut LogosLexer<'_, RawTok>) {
    let rem = lex.remainder().as_bytes();
    let n = memchr::memchr(b'\n', rem).unwrap_or(rem.len());
    lex.bump(n);
}

fn unterminated_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    bump_to_line_end(lex);
    Err(LexErrorKind::UnterminatedString)
}

fn unterminated_raw_string(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    let n = lex.remainder().len();
    lex.bump(n);
    Err(LexErrorKind::UnterminatedRawString)
}

fn bad_rune(lex: &mut LogosLexer<'_, RawTok>) -> Result<(), LexErrorKind> {
    // `''` is an empty rune literal, not an unterminated one.
    if lex.remainder().starts_with('\'') {
        lex.bump(1);
        return Err(LexErrorKind::InvalidRune);
    }
    bump_to_line_end(lex);
    Err(LexErrorKind::UnterminatedRune)
}

// =============================================================================
// Numbers: table-driven validation plus maximal munch
// =============================================================================

mod num {
    use super::*;

    #[repr(u8)]
    #[derive(Clone, Copy)]
    enum Class {
        Other = 0,
        Zero = 1,
        One = 2,
        Oct = 3,
        Dec = 4,
        Dot = 5,
        Us = 6,
        E = 7,
        P = 8,
        X = 9,
        O = 10,
        B = 11,
        Hex = 12,
        Sign = 13,
    }
    const NCLASS: usize = 14;

    #[repr(u8)]
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Err = 0,
        Start,
        Zero,
        DecInt,
        DecIntUs,
        LegacyOct,
        LegacyOctUs,
        // `09`: only legal if it turns out to be a float mantissa.
        BadLead,
        BadLeadUs,
        PreHex,
        HexInt,
        HexIntUs,
        HexDotNoDig,
        HexDotHaveDig,
        HexFrac,
        HexFracUs,
        HexExpStart,
        HexExpSign,
        HexExp,
        HexExpUs,
        PreOct,
        OctInt,
        OctIntUs,
        PreBin,
        BinInt,
        BinIntUs,
        DotStart,
        DecDot,
        DecFrac,
        DecFracUs,
        DecExpStart,
        DecExpSign,
        DecExp,
        DecExpUs,
    }
    const NSTATE: usize = State::DecExpUs as usize + 1;

    const CLASS_OF: [u8; 256] = {
        let mut t = [Class::Other as u8; 256];
        t[b'0' as usize] = Class::Zero as u8;
        t[b'1' as usize] = Class::One as u8;
        let mut i = b'2';
        while i <= b'7' {
            t[i as usize] = Class::Oct as u8;
            i += 1;
        }
        t[b'8' as usize] = Class::Dec as u8;
        t[b'9' as usize] = Class::Dec as u8;
        t[b'.' as usize] = Class::Dot as u8;
        t[b'_' as usize] = Class::Us as u8;
        let hex = b"acdfACDF";
        let mut i = 0;
        while i < hex.len() {
            t[hex[i] as usize] = Class::Hex as u8;
            i += 1;
        }
        t[b'e' as usize] = Class::E as u8;
        t[b'E' as usize] = Class::E as u8;
        t[b'p' as usize] = Class::P as u8;
        t[b'P' as usize] = Class::P as u8;
        t[b'x' as usize] = Class::X as u8;
        t[b'X' as usize] = Class::X as u8;
        t[b'o' as usize] = Class::O as u8;
        t[b'O' as usize] = Class::O as u8;
        t[b'b' as usize] = Class::B as u8;
        t[b'B' as usize] = Class::B as u8;
        t[b'+' as usize] = Class::Sign as u8;
        t[b'-' as usize] = Class::Sign as u8;
        t
    };

    static TRANS: [[u8; NCLASS]; NSTATE] = {
        let mut t = [[State::Err as u8; NCLASS]; NSTATE];

        macro_rules! on {
            ($st:ident, [$($c:ident),+] => $to:ident) => {{
                $( t[State::$st as usize][Class::$c as usize] = State::$to as u8; )+
            }};
        }

        on!(Start, [Zero] => Zero);
        on!(Start, [One, Oct, Dec] => DecInt);
        on!(Start, [Dot] => DotStart);

        on!(Zero, [X] => PreHex);
        on!(Zero, [O] => PreOct);
        on!(Zero, [B] => PreBin);
        on!(Zero, [Dot] => DecDot);
        on!(Zero, [E] => DecExpStart);
        on!(Zero, [Zero, One, Oct] => LegacyOct);
        on!(Zero, [Us] => LegacyOctUs);
        on!(Zero, [Dec] => BadLead);

        on!(DecInt, [Zero, One, Oct, Dec] => DecInt);
        on!(DecInt, [Us] => DecIntUs);
        on!(DecInt, [Dot] => DecDot);
        on!(DecInt, [E] => DecExpStart);
        on!(DecIntUs, [Zero, One, Oct, Dec] => DecInt);

        on!(LegacyOct, [Zero, One, Oct] => LegacyOct);
        on!(LegacyOct, [Us] => LegacyOctUs);
        on!(LegacyOct, [Dec] => BadLead);
        on!(LegacyOct, [Dot] => DecDot);
        on!(LegacyOct, [E] => DecExpStart);
        on!(LegacyOctUs, [Zero, One, Oct] => LegacyOct);
        on!(LegacyOctUs, [Dec] => BadLead);

        on!(BadLead, [Zero, One, Oct, Dec] => BadLead);
        on!(BadLead, [Us] => BadLeadUs);
        on!(BadLead, [Dot] => DecDot);
        on!(BadLead, [E] => DecExpStart);
        on!(BadLeadUs, [Zero, One, Oct, Dec] => BadLead);

        on!(DotStart, [Zero, One, Oct, Dec] => DecFrac);
        on!(DecDot, [Zero, One, Oct, Dec] => DecFrac);
        on!(DecDot, [E] => DecExpStart);
        on!(DecFrac, [Zero, One, Oct, Dec] => DecFrac);
        on!(DecFrac, [Us] => DecFracUs);
        on!(DecFrac, [E] => DecExpStart);
        on!(DecFracUs, [Zero, One, Oct, Dec] => DecFrac);

        on!(DecExpStart, [Sign] => DecExpSign);
        on!(DecExpStart, [Zero, One, Oct, Dec] => DecExp);
        on!(DecExpSign, [Zero, One, Oct, Dec] => DecExp);
        on!(DecExp, [Zero, One, Oct, Dec] => DecExp);
        on!(DecExp, [Us] => DecExpUs);
        on!(DecExpUs, [Zero, One, Oct, Dec] => DecExp);

        on!(PreHex, [Us] => HexIntUs);
        on!(PreHex, [Zero, One, Oct, Dec, Hex, B, E] => HexInt);
        on!(PreHex, [Dot] => HexDotNoDig);
        on!(HexInt, [Zero, One, Oct, Dec, Hex, B, E] => HexInt);
        on!(HexInt, [Us] => HexIntUs);
        on!(HexInt, [Dot] => HexDotHaveDig);
        on!(HexInt, [P] => HexExpStart);
        on!(HexIntUs, [Zero, One, Oct, Dec, Hex, B, E] => HexInt);
        on!(HexDotNoDig, [Zero, One, Oct, Dec, Hex, B, E] => HexFrac);
        on!(HexDotHaveDig, [Zero, One, Oct, Dec, Hex, B, E] => HexFrac);
        on!(HexDotHaveDig, [P] => HexExpStart);
        on!(HexFrac, [Zero, One, Oct, Dec, Hex, B, E] => HexFrac);
        on!(HexFrac, [Us] => HexFracUs);
        on!(HexFrac, [P] => HexExpStart);
        on!(HexFracUs, [Zero, One, Oct, Dec, Hex, B, E] => HexFrac);
        on!(HexExpStart, [Sign] => HexExpSign);
        on!(HexExpStart, [Zero, One, Oct, Dec] => HexExp);
        on!(HexExpSign, [Zero, One, Oct, Dec] => HexExp);
        on!(HexExp, [Zero, One, Oct, Dec] => HexExp);
        on!(HexExp, [Us] => HexExpUs);
        on!(HexExpUs, [Zero, One, Oct, Dec] => HexExp);

        on!(PreOct, [Us] => OctIntUs);
        on!(PreOct, [Zero, One, Oct] => OctInt);
        on!(OctInt, [Zero, One, Oct] => OctInt);
        on!(OctInt, [Us] => OctIntUs);
        on!(OctIntUs, [Zero, One, Oct] => OctInt);

        on!(PreBin, [Us] => BinIntUs);
        on!(PreBin, [Zero, One] => BinInt);
        on!(BinInt, [Zero, One] => BinInt);
        on!(BinInt, [Us] => BinIntUs);
        on!(BinIntUs, [Zero, One] => BinInt);

        t
    };

    const ACCEPT: u8 = 1;
    const FLOAT: u8 = 2;

    static PROPS: [u8; NSTATE] = {
        let mut t = [0u8; NSTATE];
        t[State::Zero as usize] = ACCEPT;
        t[State::DecInt as usize] = ACCEPT;
        t[State::LegacyOct as usize] = ACCEPT;
        t[State::HexInt as usize] = ACCEPT;
        t[State::OctInt as usize] = ACCEPT;
        t[State::BinInt as usize] = ACCEPT;
        t[State::DecDot as usize] = ACCEPT | FLOAT;
        t[State::DecFrac as usize] = ACCEPT | FLOAT;
        t[State::DecExp as usize] = ACCEPT | FLOAT;
        // A hex mantissa needs its `p` exponent to be a float.
        t[State::HexExp as usize] = ACCEPT | FLOAT;
        t
    };

    /// `Ok(true)` for a float literal, `Ok(false)` for an integer.
    pub const fn classify_number(lit: &[u8]) -> Result<bool, LexErrorKind> {
        let mut state = State::Start as u8;
        let mut i = 0;
        while i < lit.len() {
            state = TRANS[state as usize][CLASS_OF[lit[i] as usize] as usize];
            if state == State::Err as u8 {
                return Err(LexErrorKind::InvalidNumber);
            }
            i += 1;
        }
        let props = PROPS[state as usize];
        if props & ACCEPT == 0 {
            return Err(LexErrorKind::InvalidNumber);
        }
        Ok(props & FLOAT != 0)
    }

    // Digit ranges are not restricted per base here: `0b2` must stay one
    // token so that it is rejected as a whole.
    const fn skip_digits(src: &[u8], mut i: usize, hex: bool) -> usize {
        while i < src.len() {
            let b = src[i];
            let ok = if hex { is_hex_digit(b) } else { is_dec_digit(b) };
            if !ok && b != b'_' {
                break;
            }
            i += 1;
        }
        i
    }

    /// Extends a number token to its maximal munch.
    pub fn lex_number(lex: &mut LogosLexer<'_, super::RawTok>) -> Result<(), LexErrorKind> {
        let src = lex.source().as_bytes();
        let start = lex.span().start;
        let mut i = start;
        let mut hex = false;

        if src[i] == b'.' {
            i = skip_digits(src, i + 1, false);
        } else {
            if src[i] == b'0' && i + 1 < src.len() {
                match src[i + 1] | 0x20 {
                    b'x' => {
                        hex = true;
                        i += 1;
                    }
                    b'o' | b'b' => i += 1,
                    _ => {}
                }
            }
            i = skip_digits(src, i + 1, hex);

            // Fraction, but leave `..`/`...` alone.
            if src.get(i) == Some(&b'.') && src.get(i + 1) != Some(&b'.') {
                i = skip_digits(src, i + 1, hex);
            }
        }

        if let Some(&b) = src.get(i) {
            let exp = b | 0x20;
            if exp == b'p' || (exp == b'e' && !hex) {
                i += 1;
                if matches!(src.get(i), Some(b'+' | b'-')) {
                    i += 1;
                }
                i = skip_digits(src, i, false);
            }
        }

        let already = lex.span().end;
        if i > already {
            lex.bump(i - already);
        }
        Ok(())
    }
}

// =============================================================================
// Raw scanner
// =============================================================================

#[repr(u8)]
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\r]+")]
#[rustfmt::skip]
enum RawTok {
    #[token("\u{FEFF}")] Bom,

    // Trivia
    #[token("\n")] Newline,
    #[regex(r"//[^\n]*", allow_greedy = true)] LineComment,
    #[token("/*", lex_block_comment)] BlockComment,

    #[token("break")] KwBreak,
    #[token("case")] KwCase,
    #[token("chan")] KwChan,
    #[token("const")] KwConst,
    #[token("continue")] KwContinue,
    #[token("default")] KwDefault,
    #[token("defer")] KwDefer,
    #[token("else")] KwElse,
    #[token("fallthrough")] KwFallthrough,
    #[token("for")] KwFor,
    #[token("func")] KwFunc,
    #[token("go")] KwGo,
    #[token("goto")] KwGoto,
    #[token("if")] KwIf,
    #[token("import")] KwImport,
    #[token("interface")] KwInterface,
    #[token("map")] KwMap,
    #[token("package")] KwPackage,
    #[token("range")] KwRange,
    #[token("return")] KwReturn,
    #[token("select")] KwSelect,
    #[token("struct")] KwStruct,
    #[token("switch")] KwSwitch,
    #[token("type")] KwType,
    #[token("var")] KwVar,

    #[regex(r"[_\p{L}][_\p{L}\p{Nd}]*")] Ident,

    #[regex(r"[0-9]|\.[0-9]", num::lex_number)] Number,

    #[regex(r"`[^`]*`")] RawString,
    #[token("`", unterminated_raw_string)] RawStringOpen,
    #[regex(r#""([^"\\\n]|\\.)*""#, check_string)] String,
    #[token("\"", unterminated_string)] StringOpen,
    #[regex(r"'([^'\\\n]|\\.)+'", check_rune)] Rune,
    #[token("'", bad_rune)] RuneOpen,

    #[token("...")] Ellipsis,
    #[token("<<=")] ShlAssign,
    #[token(">>=")] ShrAssign,
    #[token("&^=")] AndNotAssign,
    #[token("+=")] AddAssign,
    #[token("-=")] SubAssign,
    #[token("*=")] MulAssign,
    #[token("/=")] DivAssign,
    #[token("%=")] ModAssign,
    #[token("&=")] AndAssign,
    #[token("|=")] OrAssign,
    #[token("^=")] XorAssign,
    #[token("<<")] Shl,
    #[token(">>")] Shr,
    #[token("&^")] AndNot,
    #[token("&&")] LAnd,
    #[token("||")] LOr,
    #[token("==")] EqEq,
    #[token("!=")] NotEq,
    #[token("<=")] Le,
    #[token(">=")] Ge,
    #[token("++")] Inc,
    #[token("--")] Dec,
    #[token(":=")] Define,
    #[token("<-")] Arrow,
    #[token("=")] Assign,
    #[token("+")] Plus,
    #[token("-")] Minus,
    #[token("*")] Star,
    #[token("/")] Slash,
    #[token("%")] Percent,
    #[token("&")] Amp,
    #[token("|")] Pipe,
    #[token("^")] Caret,
    #[token("~")] Tilde,
    #[token("!")] Bang,
    #[token("<")] Lt,
    #[token(">")] Gt,

    #[token("(")] LParen,
    #[token(")")] RParen,
    #[token("[")] LBrack,
    #[token("]")] RBrack,
    #[token("{")] LBrace,
    #[token("}")] RBrace,
    #[token(",")] Comma,
    #[token(";")] Semi,
    #[token(":")] Colon,
    #[token(".")] Dot,

    #[regex(r".", priority = 0)] Error,
}

macro_rules! gen_lookup_table {
    (bool, $($variant:ident),* $(,)?) => {{
        let mut table = [false; 256];
        $(table[RawTok::$variant as usize] = true;)*
        table
    }};
}

const SEMI_INSERT_TABLE: [bool; 256] = gen_lookup_table!(
    bool,
    Ident,
    Number,
    Rune,
    String,
    RawString,
    KwBreak,
    KwContinue,
    KwFallthrough,
    KwReturn,
    Inc,
    Dec,
    RParen,
    RBrack,
    RBrace,
);

impl RawTok {
    #[inline(always)]
    const fn can_insert_semicolon(self) -> bool {
        SEMI_INSERT_TABLE[self as usize]
    }

    /// Token kind for lexemes that map one-to-one. Trivia, numbers and BOMs
    /// are handled by the wrapper.
    #[rustfmt::skip]
    const fn simple_kind(self) -> Option<TokKind> {
        macro_rules! same {
            ($($name:ident),* $(,)?) => {
                match self {
                    $(Self::$name => Some(TokKind::$name),)*
                    Self::Ident => Some(TokKind::Ident),
                    Self::Rune => Some(TokKind::RuneLit),
                    Self::String => Some(TokKind::StringLit),
                    Self::RawString => Some(TokKind::RawStringLit),
                    _ => None,
                }
            };
        }
        same! {
            KwBreak, KwCase, KwChan, KwConst, KwContinue, KwDefault, KwDefer, KwElse,
            KwFallthrough, KwFor, KwFunc, KwGo, KwGoto, KwIf, KwImport, KwInterface,
            KwMap, KwPackage, KwRange, KwReturn, KwSelect, KwStruct, KwSwitch, KwType, KwVar,
            Ellipsis, ShlAssign, ShrAssign, AndNotAssign, AddAssign, SubAssign, MulAssign,
            DivAssign, ModAssign, AndAssign, OrAssign, XorAssign, Shl, Shr, AndNot, LAnd, LOr,
            EqEq, NotEq, Le, Ge, Inc, Dec, Define, Arrow, Assign, Plus, Minus, Star, Slash,
            Percent, Amp, Pipe, Caret, Tilde, Bang, Lt, Gt,
            LParen, RParen, LBrack, RBrack, LBrace, RBrace, Comma, Semi, Colon, Dot,
        }
    }
}

// =============================================================================
// Wrapper: semicolon insertion, imaginary suffix, directives, error budget
// =============================================================================

pub type SpannedTok = (usize, TokKind, usize);

pub struct Lexer<'src> {
    logos: LogosLexer<'src, RawTok>,
    file: FileId,
    pending: VecDeque<SpannedTok>,
    diags: Vec<Diag>,
    directives: Vec<LineDirective>,
    last_can_insert_semi: bool,
    /// Length of the lexable (valid UTF-8) prefix.
    text_len: usize,
    /// Length of the whole buffer; bytes past `text_len` are invalid UTF-8.
    src_len: usize,
    errors: usize,
    max_errors: usize,
    eof_done: bool,
    closed: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src Source, file: FileId, opts: LexOptions) -> Self {
        let text = source.text();
        Self {
            logos: RawTok::lexer(text),
            file,
            pending: VecDeque::with_capacity(2),
            diags: Vec::new(),
            directives: Vec::new(),
            last_can_insert_semi: false,
            text_len: text.len(),
            src_len: source.len(),
            errors: 0,
            max_errors: opts.max_errors,
            eof_done: false,
            closed: false,
        }
    }

    pub fn take_diags(&mut self) -> Vec<Diag> {
        std::mem::take(&mut self.diags)
    }

    pub fn take_directives(&mut self) -> Vec<LineDirective> {
        std::mem::take(&mut self.directives)
    }

    /// Whether the error budget cut the stream short.
    pub fn was_closed_early(&self) -> bool {
        self.closed
    }

    fn push_lex_diag(&mut self, kind: LexErrorKind, span: Range<usize>) {
        let span = Span::from_range(span);
        self.diags.push(LexError { kind, span }.diag(self.file));
        self.errors += 1;
        if self.errors >= self.max_errors && !self.closed {
            self.closed = true;
            self.diags.push(Diag::new(
                DiagKind::Lex,
                self.file,
                Span::empty_at(span.end as usize),
                "too many errors",
            ));
        }
    }

    fn error_token(&mut self, kind: LexErrorKind, span: Range<usize>) -> SpannedTok {
        self.push_lex_diag(kind, span.clone());
        self.last_can_insert_semi = false;
        (span.start, TokKind::Error, span.end)
    }

    #[inline]
    fn emit_semi_at(&mut self, pos: usize) {
        self.last_can_insert_semi = false;
        self.pending.push_back((pos, TokKind::Semi, pos));
    }

    fn record_line_directive(&mut self, span: &Range<usize>, slice: &str) {
        let src = self.logos.source().as_bytes();
        let (payload, offset) = if let Some(p) = slice.strip_prefix("//line ") {
            let at_col_one = span.start == 0 || src[span.start - 1] == b'\n';
            // Applies from the next line on; a directive on the last line is inert.
            if !at_col_one || src.get(span.end) != Some(&b'\n') {
                return;
            }
            (p, span.end + 1)
        } else if let Some(p) = slice.strip_prefix("/*line ") {
            match p.strip_suffix("*/") {
                Some(p) => (p, span.end),
                None => return,
            }
        } else {
            return;
        };

        if let Some((file, line, column)) = parse_line_directive(payload.trim_end_matches('\r')) {
            self.directives.push(LineDirective {
                offset: offset as u32,
                file,
                line,
                column,
            });
        }
    }

    /// Returns `true` when `raw` was trivia and has been consumed.
    fn handle_trivia(&mut self, raw: RawTok, span: &Range<usize>, slice: &str) -> bool {
        match raw {
            RawTok::Newline => {
                if self.last_can_insert_semi {
                    self.emit_semi_at(span.start);
                }
                true
            }
            RawTok::LineComment => {
                self.record_line_directive(span, slice);
                true
            }
            RawTok::BlockComment => {
                if self.last_can_insert_semi && memchr::memchr(b'\n', slice.as_bytes()).is_some() {
                    self.emit_semi_at(span.start);
                }
                self.record_line_directive(span, slice);
                true
            }
            _ => false,
        }
    }

    fn handle_eof(&mut self) {
        self.eof_done = true;
        if self.last_can_insert_semi {
            self.emit_semi_at(self.text_len);
        }
        if self.text_len < self.src_len {
            let span = self.text_len..self.src_len;
            let tok = self.error_token(LexErrorKind::InvalidUtf8, span);
            self.pending.push_back(tok);
        }
    }

    fn handle_lex_error(&mut self, kind: LexErrorKind) -> SpannedTok {
        let span = self.logos.span();
        // An unterminated comment still ends a statement if it spans lines.
        if kind == LexErrorKind::UnterminatedComment
            && self.last_can_insert_semi
            && self.logos.slice().contains('\n')
        {
            self.emit_semi_at(span.start);
            let tok = self.error_token(kind, span);
            self.pending.push_back(tok);
            return self.pending.pop_front().unwrap_or(tok);
        }
        self.error_token(kind, span)
    }

    fn handle_raw_token(&mut self, raw: RawTok) -> Option<SpannedTok> {
        let span = self.logos.span();
        let slice = self.logos.slice();

        if raw == RawTok::Bom {
            // Leading BOM is separator text; anywhere else it is an error.
            return if span.start == 0 {
                None
            } else {
                Some(self.error_token(LexErrorKind::MisplacedBom, span))
            };
        }

        if self.handle_trivia(raw, &span, slice) {
            return None;
        }

        if raw == RawTok::Error {
            return Some(self.error_token(LexErrorKind::InvalidToken, span));
        }

        if raw == RawTok::Number {
            return Some(self.handle_number_token(span));
        }

        match raw.simple_kind() {
            Some(kind) => {
                self.last_can_insert_semi = raw.can_insert_semicolon();
                Some((span.start, kind, span.end))
            }
            None => Some(self.error_token(LexErrorKind::InvalidToken, span)),
        }
    }

    fn handle_number_token(&mut self, span: Range<usize>) -> SpannedTok {
        let src = self.logos.source().as_bytes();
        let bytes = &src[span.clone()];

        if src.get(span.end) == Some(&b'i') {
            let valid = num::classify_number(bytes).is_ok() || is_decimal_digits_with_underscores(bytes);
            self.logos.bump(1);
            let span = span.start..span.end + 1;
            if !valid {
                return self.error_token(LexErrorKind::InvalidNumber, span);
            }
            self.last_can_insert_semi = true;
            return (span.start, TokKind::ImagLit, span.end);
        }

        match num::classify_number(bytes) {
            Ok(is_float) => {
                self.last_can_insert_semi = true;
                let kind = if is_float { TokKind::FloatLit } else { TokKind::IntLit };
                (span.start, kind, span.end)
            }
            Err(kind) => self.error_token(kind, span),
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = SpannedTok;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return Some(tok);
            }
            if self.eof_done || self.closed {
                return None;
            }
            match self.logos.next() {
                None => self.handle_eof(),
                Some(Err(kind)) => return Some(self.handle_lex_error(kind)),
                Some(Ok(raw)) => {
                    if let Some(item) = self.handle_raw_token(raw) {
                        return Some(item);
                    }
                }
            }
        }
    }
}

// =============================================================================
// Pull-based token table
// =============================================================================

/// Lexes lazily into a [`TokenTable`]; the parser asks for token `n` and the
/// stream scans exactly as far as needed.
pub struct TokenStream<'src> {
    lexer: Lexer<'src>,
    table: TokenTable,
    last_end: usize,
    src_len: usize,
    done: bool,
}

impl<'src> TokenStream<'src> {
    pub fn new(source: &'src Source, file: FileId, opts: LexOptions) -> Self {
        Self {
            lexer: Lexer::new(source, file, opts),
            table: TokenTable::new(),
            last_end: 0,
            src_len: source.len(),
            done: false,
        }
    }

    fn pull(&mut self) {
        match self.lexer.next() {
            Some((start, kind, end)) => {
                self.table.push(kind, self.last_end, start, end);
                self.last_end = end;
            }
            None => {
                // The Eof entry owns everything after the last token, which
                // covers input abandoned by the error budget.
                self.table.push(TokKind::Eof, self.last_end, self.src_len, self.src_len);
                self.last_end = self.src_len;
                self.done = true;
            }
        }
    }

    /// Kind of token `t`, lexing up to it if necessary.
    #[inline]
    pub fn kind(&mut self, t: Tok) -> TokKind {
        while !self.done && self.table.len() <= t.index() {
            self.pull();
        }
        self.table.kind(t)
    }

    /// Tokens produced so far.
    #[inline]
    pub fn table(&self) -> &TokenTable {
        &self.table
    }

    /// Index of the `Eof` entry (lexes the rest of the input).
    pub fn eof(&mut self) -> Tok {
        while !self.done {
            self.pull();
        }
        Tok(self.table.len() as u32 - 1)
    }

    /// Lexes whatever remains and returns the complete table and the lexical
    /// diagnostics.
    pub fn finish(mut self) -> (TokenTable, Vec<Diag>) {
        self.eof();
        for d in self.lexer.take_directives() {
            self.table.push_directive(d);
        }
        (self.table, self.lexer.take_diags())
    }
}

/// Tokenizes a whole file eagerly.
pub fn tokenize(source: &Source, file: FileId, opts: LexOptions) -> (TokenTable, Vec<Diag>) {
    TokenStream::new(source, file, opts).finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokKind> {
        let s = Source::from_text("t.go", src);
        let (table, _) = tokenize(&s, FileId(0), LexOptions::default());
        table.iter().map(|t| table.kind(t)).collect()
    }

    #[test]
    fn classify_number_table() {
        let cases: &[(&str, Result<bool, LexErrorKind>)] = &[
            ("0", Ok(false)),
            ("0x_1f", Ok(false)),
            ("0b101", Ok(false)),
            ("0o17", Ok(false)),
            ("0777", Ok(false)),
            ("1_000", Ok(false)),
            ("09", Err(LexErrorKind::InvalidNumber)),
            ("09.5", Ok(true)),
            ("1e10", Ok(true)),
            ("0x1p-2", Ok(true)),
            ("0x1.8", Err(LexErrorKind::InvalidNumber)),
            ("1__0", Err(LexErrorKind::InvalidNumber)),
            ("1_", Err(LexErrorKind::InvalidNumber)),
            ("0b2", Err(LexErrorKind::InvalidNumber)),
        ];
        for (lit, want) in cases {
            assert_eq!(num::classify_number(lit.as_bytes()), *want, "{lit}");
        }
    }

    #[test]
    fn semicolon_after_return_and_ident() {
        use TokKind::*;
        assert_eq!(
            kinds("return\nx\n"),
            vec![KwReturn, Semi, Ident, Semi, Eof]
        );
        assert_eq!(kinds("x /* a\n b */ y"), vec![Ident, Semi, Ident, Semi, Eof]);
        assert_eq!(kinds("x /* a */ y"), vec![Ident, Ident, Semi, Eof]);
    }

    #[test]
    fn imaginary_suffix_and_ranges() {
        use TokKind::*;
        assert_eq!(kinds("0123i"), vec![ImagLit, Semi, Eof]);
        assert_eq!(kinds("1.5e3i"), vec![ImagLit, Semi, Eof]);
        assert_eq!(kinds("x[1:]"), vec![Ident, LBrack, IntLit, Colon, RBrack, Semi, Eof]);
    }

    #[test]
    fn unterminated_string_stops_at_line_end() {
        let s = Source::from_text("t.go", "x := \"abc\ny := 1\n");
        let (table, diags) = tokenize(&s, FileId(0), LexOptions::default());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "string literal not terminated");
        let ks: Vec<_> = table.iter().map(|t| table.kind(t)).collect();
        assert!(ks.contains(&TokKind::Error));
        assert_eq!(ks.iter().filter(|k| **k == TokKind::Define).count(), 2);
    }

    #[test]
    fn error_budget_closes_the_stream() {
        let text = "@".repeat(50);
        let s = Source::from_text("t.go", &text);
        let (table, diags) = tokenize(&s, FileId(0), LexOptions { max_errors: 3 });
        assert_eq!(diags.len(), 4);
        assert_eq!(diags[3].message, "too many errors");
        let eof = table.last().unwrap();
        assert_eq!(table.kind(eof), TokKind::Eof);
        assert_eq!(table.reconstruct(&s, false), text.as_bytes());
    }

    #[test]
    fn line_directives_are_recorded() {
        let s = Source::from_text("t.go", "package p\n//line gen.y:10\nvar x int\n/*line a.y:3:4*/var y int\n");
        let (table, _) = tokenize(&s, FileId(0), LexOptions::default());
        let dirs = table.directives();
        assert_eq!(dirs.len(), 2);
        assert_eq!((&*dirs[0].file, dirs[0].line, dirs[0].column), ("gen.y", 10, None));
        assert_eq!((&*dirs[1].file, dirs[1].line, dirs[1].column), ("a.y", 3, Some(4)));
    }

    #[test]
    fn leading_bom_is_separator() {
        let s = Source::from_text("t.go", "\u{FEFF}package p");
        let (table, diags) = tokenize(&s, FileId(0), LexOptions::default());
        assert!(diags.is_empty());
        assert_eq!(table.kind(Tok(0)), TokKind::KwPackage);
        assert_eq!(table.separator(&s, Tok(0)), "\u{FEFF}");
    }

    #[test]
    fn invalid_utf8_tail_is_one_error_token() {
        let s = Source::new("t.go", b"x \xff\xfe y".to_vec());
        let (table, diags) = tokenize(&s, FileId(0), LexOptions::default());
        assert_eq!(diags[0].message, "invalid UTF-8 encoding");
        assert_eq!(table.reconstruct(&s, false), s.bytes());
        let kinds: Vec<_> = table.iter().map(|t| table.kind(t)).collect();
        assert_eq!(kinds, vec![TokKind::Ident, TokKind::Semi, TokKind::Error, TokKind::Eof]);
    }
}
