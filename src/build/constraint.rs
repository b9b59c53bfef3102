//! Build constraints: `//go:build` expressions and legacy `// +build` lines.
//!
//! Only comments in the file header count, that is the comments and blank
//! lines before the package clause. A `//go:build` line takes precedence
//! over `// +build` lines in the same header.

use memchr::memmem;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("unexpected token {0:?} in build constraint")]
    Unexpected(String),
    #[error("unexpected end of build constraint")]
    UnexpectedEnd,
    #[error("invalid tag {0:?} in build constraint")]
    InvalidTag(String),
    #[error("multiple //go:build comments")]
    Multiple,
}

impl Constraint {
    pub fn eval(&self, ok: &impl Fn(&str) -> bool) -> bool {
        match self {
            Constraint::Tag(t) => ok(t),
            Constraint::Not(c) => !c.eval(ok),
            Constraint::And(a, b) => a.eval(ok) && b.eval(ok),
            Constraint::Or(a, b) => a.eval(ok) || b.eval(ok),
        }
    }

    fn and(a: Constraint, b: Constraint) -> Constraint {
        Constraint::And(Box::new(a), Box::new(b))
    }

    fn or(a: Constraint, b: Constraint) -> Constraint {
        Constraint::Or(Box::new(a), Box::new(b))
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'s> {
    Tag(&'s str),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(s: &str) -> Result<Vec<Token<'_>>, ConstraintError> {
    let mut out = Vec::new();
    let mut rest = s.trim_start();
    while let Some(c) = rest.chars().next() {
        let (tok, len) = match c {
            '!' => (Token::Not, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '&' if rest.starts_with("&&") => (Token::And, 2),
            '|' if rest.starts_with("||") => (Token::Or, 2),
            c if is_tag_char(c) => {
                let len = rest.find(|c: char| !is_tag_char(c)).unwrap_or(rest.len());
                (Token::Tag(&rest[..len]), len)
            }
            _ => {
                let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
                return Err(ConstraintError::Unexpected(rest[..len].to_string()));
            }
        };
        out.push(tok);
        rest = rest[len..].trim_start();
    }
    Ok(out)
}

struct ExprParser<'s> {
    toks: Vec<Token<'s>>,
    pos: usize,
}

impl<'s> ExprParser<'s> {
    fn peek(&self) -> Option<&Token<'s>> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Token<'s>> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn or(&mut self) -> Result<Constraint, ConstraintError> {
        let mut x = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            x = Constraint::or(x, self.and()?);
        }
        Ok(x)
    }

    fn and(&mut self) -> Result<Constraint, ConstraintError> {
        let mut x = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            x = Constraint::and(x, self.not()?);
        }
        Ok(x)
    }

    fn not(&mut self) -> Result<Constraint, ConstraintError> {
        match self.next() {
            Some(Token::Not) => Ok(Constraint::Not(Box::new(self.not()?))),
            Some(Token::LParen) => {
                let x = self.or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(x),
                    Some(t) => Err(unexpected(&t)),
                    None => Err(ConstraintError::UnexpectedEnd),
                }
            }
            Some(Token::Tag(t)) => Ok(Constraint::Tag(t.to_string())),
            Some(t) => Err(unexpected(&t)),
            None => Err(ConstraintError::UnexpectedEnd),
        }
    }
}

fn unexpected(t: &Token<'_>) -> ConstraintError {
    let text = match t {
        Token::Tag(s) => s,
        Token::Not => "!",
        Token::And => "&&",
        Token::Or => "||",
        Token::LParen => "(",
        Token::RParen => ")",
    };
    ConstraintError::Unexpected(text.to_string())
}

/// Parses the expression of a `//go:build` line.
pub fn parse_expr(s: &str) -> Result<Constraint, ConstraintError> {
    let mut p = ExprParser {
        toks: tokenize(s)?,
        pos: 0,
    };
    let x = p.or()?;
    match p.next() {
        None => Ok(x),
        Some(t) => Err(unexpected(&t)),
    }
}

/// Parses the arguments of one `// +build` line: space-separated options
/// are ORed, comma-separated terms ANDed, `!` negates a term.
pub fn parse_plus_build(s: &str) -> Result<Option<Constraint>, ConstraintError> {
    let mut line: Option<Constraint> = None;
    for option in s.split_whitespace() {
        let mut clause: Option<Constraint> = None;
        for term in option.split(',') {
            let (neg, tag) = match term.strip_prefix('!') {
                Some(t) => (true, t),
                None => (false, term),
            };
            if tag.is_empty() || tag.starts_with('!') || !tag.chars().all(is_tag_char) {
                return Err(ConstraintError::InvalidTag(term.to_string()));
            }
            let mut c = Constraint::Tag(tag.to_string());
            if neg {
                c = Constraint::Not(Box::new(c));
            }
            clause = Some(match clause {
                Some(prev) => Constraint::and(prev, c),
                None => c,
            });
        }
        if let Some(clause) = clause {
            line = Some(match line {
                Some(prev) => Constraint::or(prev, clause),
                None => clause,
            });
        }
    }
    Ok(line)
}

/// Comment lines of the header, each without its `//` marker.
fn header_comments(src: &[u8]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = src;
    loop {
        let skip = rest.iter().take_while(|b| b.is_ascii_whitespace()).count();
        rest = &rest[skip..];
        if let Some(after) = rest.strip_prefix(b"//") {
            let end = memchr::memchr(b'\n', after).unwrap_or(after.len());
            if let Ok(line) = std::str::from_utf8(&after[..end]) {
                out.push(line.trim_end_matches('\r'));
            }
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix(b"/*") {
            match memmem::find(after, b"*/") {
                Some(end) => rest = &after[end + 2..],
                None => break,
            }
        } else {
            break;
        }
    }
    out
}

/// The constraint a file's header places on it, if any.
pub fn file_constraint(src: &[u8]) -> Result<Option<Constraint>, ConstraintError> {
    let comments = header_comments(src);
    let mut go_build = None;
    for c in &comments {
        if let Some(expr) = c.strip_prefix("go:build") {
            if !expr.is_empty() && !expr.starts_with([' ', '\t']) {
                continue;
            }
            if go_build.is_some() {
                return Err(ConstraintError::Multiple);
            }
            go_build = Some(parse_expr(expr)?);
        }
    }
    if go_build.is_some() {
        return Ok(go_build);
    }
    let mut all: Option<Constraint> = None;
    for c in &comments {
        let Some(args) = c.trim_start().strip_prefix("+build") else {
            continue;
        };
        if !args.is_empty() && !args.starts_with([' ', '\t']) {
            continue;
        }
        if let Some(line) = parse_plus_build(args)? {
            all = Some(match all {
                Some(prev) => Constraint::and(prev, line),
                None => line,
            });
        }
    }
    Ok(all)
}

/// Whether a file with this source should be built when `ok` decides tags.
pub fn should_build(src: &[u8], ok: &impl Fn(&str) -> bool) -> Result<bool, ConstraintError> {
    Ok(file_constraint(src)?.map_or(true, |c| c.eval(ok)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(tags: &'static [&'static str]) -> impl Fn(&str) -> bool {
        move |t| tags.contains(&t)
    }

    #[test]
    fn expression_precedence() {
        let c = parse_expr("linux && amd64 || !cgo").unwrap();
        assert!(c.eval(&with(&["linux", "amd64", "cgo"])));
        assert!(c.eval(&with(&["windows"])));
        assert!(!c.eval(&with(&["linux", "cgo"])));
        let c = parse_expr("linux && (amd64 || arm64)").unwrap();
        assert!(c.eval(&with(&["linux", "arm64"])));
        assert!(!c.eval(&with(&["darwin", "arm64"])));
    }

    #[test]
    fn malformed_expressions() {
        assert_eq!(parse_expr("linux &&"), Err(ConstraintError::UnexpectedEnd));
        assert!(matches!(parse_expr("(linux"), Err(ConstraintError::UnexpectedEnd)));
        assert!(matches!(parse_expr("linux amd64"), Err(ConstraintError::Unexpected(_))));
        assert!(matches!(parse_expr("linux & amd64"), Err(ConstraintError::Unexpected(_))));
    }

    #[test]
    fn legacy_lines() {
        let src = b"// +build linux,amd64 darwin\n// +build !purego\n\npackage p\n";
        assert!(should_build(src, &with(&["linux", "amd64"])).unwrap());
        assert!(should_build(src, &with(&["darwin"])).unwrap());
        assert!(!should_build(src, &with(&["darwin", "purego"])).unwrap());
        assert!(!should_build(src, &with(&["linux"])).unwrap());
    }

    #[test]
    fn go_build_wins_over_plus_build() {
        let src = b"//go:build windows\n// +build linux\n\npackage p\n";
        assert!(should_build(src, &with(&["windows"])).unwrap());
        assert!(!should_build(src, &with(&["linux"])).unwrap());
    }

    #[test]
    fn only_the_header_counts() {
        let src = b"/* license */\n\n// Package p.\npackage p\n\n//go:build ignore\n";
        assert_eq!(file_constraint(src).unwrap(), None);
        let src = b"//go:buildignore\npackage p\n";
        assert_eq!(file_constraint(src).unwrap(), None);
        let src = b"//go:build a\n//go:build b\npackage p\n";
        assert_eq!(file_constraint(src), Err(ConstraintError::Multiple));
    }
}
