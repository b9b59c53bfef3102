use indexmap::IndexSet;
use thiserror::Error;

/// Compact byte-span used across the front end.
///
/// Offsets are `u32`; inputs larger than 4GiB are clamped rather than
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32, // exclusive
}

impl Span {
    #[inline]
    pub const fn new(start: usize, end: usize) -> Self {
        let s = if start > u32::MAX as usize {
            u32::MAX
        } else {
            start as u32
        };
        let e = if end > u32::MAX as usize {
            u32::MAX
        } else {
            end as u32
        };
        Self { start: s, end: e }
    }

    #[inline]
    pub const fn empty_at(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    pub const fn from_range(range: std::ops::Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }

    /// Smallest span covering both `self` and `other`.
    #[inline]
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index of a file inside a package, assigned by the loader in directory
/// order. Standalone parses use `FileId(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FileId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagKind {
    Lex,
    Syntax,
    Declaration,
    Type,
    /// Parser budget or nesting depth exhausted: degenerate input, not a
    /// malformed one.
    Resource,
    Import,
    /// Construct the checker recognises but deliberately does not handle.
    Unsupported,
}

impl DiagKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            DiagKind::Lex => "lexical error",
            DiagKind::Syntax => "syntax error",
            DiagKind::Declaration => "declaration error",
            DiagKind::Type => "type error",
            DiagKind::Resource => "resource exhausted",
            DiagKind::Import => "import error",
            DiagKind::Unsupported => "unsupported",
        }
    }

    /// Whether the diagnostic makes the package unusable for downstream
    /// consumers. `Unsupported` only marks a gap in the checker.
    pub const fn is_error(self) -> bool {
        !matches!(self, DiagKind::Unsupported)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diag {
    pub kind: DiagKind,
    pub file: FileId,
    pub span: Span,
    pub message: String,
    /// Secondary location, e.g. the previous declaration of a redeclared name.
    pub related: Option<(FileId, Span)>,
}

impl Diag {
    pub fn new(kind: DiagKind, file: FileId, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            file,
            span,
            message: message.into(),
            related: None,
        }
    }

    pub fn with_related(mut self, file: FileId, span: Span) -> Self {
        self.related = Some((file, span));
        self
    }
}

/// Ordered, de-duplicated diagnostic list.
///
/// Backtracking and repeated lookups can report the same problem more than
/// once; the first occurrence keeps its position in the list.
#[derive(Debug, Clone, Default)]
pub struct DiagList {
    items: IndexSet<Diag>,
}

impl DiagList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an identical diagnostic was already recorded.
    pub fn push(&mut self, d: Diag) -> bool {
        self.items.insert(d)
    }

    pub fn extend(&mut self, ds: impl IntoIterator<Item = Diag>) {
        for d in ds {
            self.items.insert(d);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diag> {
        self.items.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.kind.is_error())
    }

    pub fn of_kind(&self, kind: DiagKind) -> impl Iterator<Item = &Diag> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn into_vec(self) -> Vec<Diag> {
        self.items.into_iter().collect()
    }
}

impl FromIterator<Diag> for DiagList {
    fn from_iter<I: IntoIterator<Item = Diag>>(iter: I) -> Self {
        let mut list = DiagList::new();
        list.extend(iter);
        list
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexErrorKind {
    #[default]
    #[error("invalid character")]
    InvalidToken,
    #[error("invalid numeric literal")]
    InvalidNumber,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("invalid rune literal")]
    InvalidRune,
    #[error("string literal not terminated")]
    UnterminatedString,
    #[error("raw string literal not terminated")]
    UnterminatedRawString,
    #[error("rune literal not terminated")]
    UnterminatedRune,
    #[error("comment not terminated")]
    UnterminatedComment,
    #[error("invalid BOM in the middle of the file")]
    MisplacedBom,
    #[error("invalid UTF-8 encoding")]
    InvalidUtf8,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind}: {span:?}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

impl LexError {
    #[inline]
    pub fn diag(&self, file: FileId) -> Diag {
        Diag::new(DiagKind::Lex, file, self.span, self.kind.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diag_list_keeps_first_occurrence_order() {
        let a = Diag::new(DiagKind::Type, FileId(0), Span::new(4, 5), "a");
        let b = Diag::new(DiagKind::Lex, FileId(0), Span::new(0, 1), "b");

        let mut list = DiagList::new();
        assert!(list.push(a.clone()));
        assert!(list.push(b.clone()));
        assert!(!list.push(a.clone()));

        let got: Vec<_> = list.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(got, ["a", "b"]);
    }

    #[test]
    fn unsupported_is_not_an_error() {
        let mut list = DiagList::new();
        list.push(Diag::new(
            DiagKind::Unsupported,
            FileId(0),
            Span::default(),
            "x",
        ));
        assert!(!list.has_errors());
    }
}
