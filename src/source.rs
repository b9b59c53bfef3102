//! Source buffers and position lookup.
//!
//! A [`Source`] owns the bytes of one compilation unit and a line-offset
//! index. Tokens never copy text out of it; they store offsets and the
//! buffer is consulted on demand. Two sparse patch maps let a consumer edit
//! the textual form of individual tokens (or the separator before them)
//! without re-lexing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::token::Tok;

/// Human-facing location. Lines and columns are 1-based, columns count bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    pub file: Arc<str>,
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// `//line file:line[:col]` or `/*line file:line[:col]*/` directive.
///
/// `offset` is the first byte the directive applies to: the start of the
/// next line for the `//` form, the byte after the comment for the `/* */`
/// form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDirective {
    pub offset: u32,
    pub file: Arc<str>,
    pub line: u32,
    pub column: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Source {
    name: Arc<str>,
    bytes: Box<[u8]>,
    /// Length of the longest valid UTF-8 prefix of `bytes`.
    valid_len: usize,
    line_starts: Vec<u32>,
    separator_patches: HashMap<Tok, String>,
    text_patches: HashMap<Tok, String>,
}

impl Source {
    pub fn new(name: impl Into<Arc<str>>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Box<[u8]> = bytes.into().into_boxed_slice();
        let valid_len = match std::str::from_utf8(&bytes) {
            Ok(_) => bytes.len(),
            Err(e) => e.valid_up_to(),
        };
        let line_starts = line_starts(&bytes);
        Self {
            name: name.into(),
            bytes,
            valid_len,
            line_starts,
            separator_patches: HashMap::new(),
            text_patches: HashMap::new(),
        }
    }

    pub fn from_text(name: impl Into<Arc<str>>, text: &str) -> Self {
        Self::new(name, text.as_bytes().to_vec())
    }

    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The valid UTF-8 prefix of the buffer; this is what the lexer scans.
    #[inline]
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.valid_len]).unwrap_or_default()
    }

    #[inline]
    pub fn valid_utf8_len(&self) -> usize {
        self.valid_len
    }

    /// Raw bytes in `start..end`, lossily decoded.
    pub fn slice(&self, start: u32, end: u32) -> std::borrow::Cow<'_, str> {
        let s = (start as usize).min(self.bytes.len());
        let e = (end as usize).clamp(s, self.bytes.len());
        String::from_utf8_lossy(&self.bytes[s..e])
    }

    /// 1-based (line, column) of a byte offset, ignoring line directives.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[idx];
        (idx as u32 + 1, offset - line_start + 1)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn line_start(&self, line: u32) -> Option<u32> {
        self.line_starts.get(line.checked_sub(1)? as usize).copied()
    }

    pub fn position(&self, offset: u32) -> Position {
        let (line, column) = self.line_col(offset);
        Position {
            file: self.name.clone(),
            offset,
            line,
            column,
        }
    }

    /// Position of `offset` after applying the last directive at or before it.
    pub fn position_mapped(&self, offset: u32, directives: &[LineDirective]) -> Position {
        let idx = directives.partition_point(|d| d.offset <= offset);
        let Some(dir) = idx.checked_sub(1).map(|i| &directives[i]) else {
            return self.position(offset);
        };

        let (line, column) = self.line_col(offset);
        let (dline, dcol) = self.line_col(dir.offset);
        let mapped_line = dir.line + (line - dline);
        let mapped_col = match dir.column {
            Some(c) if line == dline => c + (column - dcol),
            _ => column,
        };
        Position {
            file: dir.file.clone(),
            offset,
            line: mapped_line,
            column: mapped_col,
        }
    }

    pub fn patch_separator(&mut self, tok: Tok, text: impl Into<String>) {
        self.separator_patches.insert(tok, text.into());
    }

    pub fn patch_text(&mut self, tok: Tok, text: impl Into<String>) {
        self.text_patches.insert(tok, text.into());
    }

    pub fn separator_patch(&self, tok: Tok) -> Option<&str> {
        self.separator_patches.get(&tok).map(String::as_str)
    }

    pub fn text_patch(&self, tok: Tok) -> Option<&str> {
        self.text_patches.get(&tok).map(String::as_str)
    }

    pub fn has_patches(&self) -> bool {
        !self.separator_patches.is_empty() || !self.text_patches.is_empty()
    }
}

fn line_starts(bytes: &[u8]) -> Vec<u32> {
    let mut starts = Vec::with_capacity(bytes.len() / 32 + 1);
    starts.push(0);
    starts.extend(memchr::memchr_iter(b'\n', bytes).map(|i| (i + 1) as u32));
    starts
}

/// Parses the payload of a line directive (`file:line` or `file:line:col`).
///
/// The file name may itself contain colons (Windows drive letters), so the
/// numeric fields are split from the right.
pub(crate) fn parse_line_directive(payload: &str) -> Option<(Arc<str>, u32, Option<u32>)> {
    let payload = payload.trim_end();
    let (rest, last) = payload.rsplit_once(':')?;
    let last: u32 = last.parse().ok()?;
    if let Some((file, mid)) = rest.rsplit_once(':') {
        if let Ok(line) = mid.parse::<u32>() {
            if line == 0 || last == 0 || file.is_empty() {
                return None;
            }
            return Some((file.into(), line, Some(last)));
        }
    }
    if last == 0 || rest.is_empty() {
        return None;
    }
    Some((rest.into(), last, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        let src = Source::from_text("a.go", "ab\ncd\n\nx");
        assert_eq!(src.line_col(0), (1, 1));
        assert_eq!(src.line_col(1), (1, 2));
        assert_eq!(src.line_col(3), (2, 1));
        assert_eq!(src.line_col(6), (3, 1));
        assert_eq!(src.line_col(7), (4, 1));
    }

    #[test]
    fn directive_relocates_following_lines() {
        let src = Source::from_text("a.go", "x\ny\nz\n");
        let dirs = [LineDirective {
            offset: 2,
            file: "gen.y".into(),
            line: 40,
            column: None,
        }];
        assert_eq!(src.position_mapped(0, &dirs).line, 1);
        let p = src.position_mapped(4, &dirs);
        assert_eq!((&*p.file, p.line, p.column), ("gen.y", 41, 1));
    }

    #[test]
    fn directive_payload_forms() {
        assert_eq!(
            parse_line_directive("foo.go:10"),
            Some(("foo.go".into(), 10, None))
        );
        assert_eq!(
            parse_line_directive("c:\\dir\\foo.go:10:3"),
            Some(("c:\\dir\\foo.go".into(), 10, Some(3)))
        );
        assert_eq!(parse_line_directive("foo.go"), None);
        assert_eq!(parse_line_directive(":0"), None);
    }

    #[test]
    fn invalid_utf8_prefix_is_tracked() {
        let src = Source::new("a.go", b"ab\xffcd".to_vec());
        assert_eq!(src.valid_utf8_len(), 2);
        assert_eq!(src.text(), "ab");
    }
}
