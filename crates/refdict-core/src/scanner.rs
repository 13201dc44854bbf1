//! Placeholder scanning
//!
//! Finds `${path}` tokens inside a string scalar:
//! - `data/${dataset}/out` - partial: each token is rendered as text and spliced in
//! - `${load.paths}$` - full match: the whole string is replaced by the
//!   referenced value, keeping its type
//!
//! Tokens do not nest; the first `}` after `${` closes the token.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::path::Path;

const OPEN: &str = "${";
const CLOSE: char = '}';
const FULL_MATCH_SUFFIX: char = '$';
const DEFAULT_SEPARATOR: char = ':';

/// How the placeholders of a string are substituted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Tokens are rendered to text and spliced into the string
    Partial,
    /// The string is exactly `${path}$` and takes the referenced value verbatim
    FullMatch,
}

/// A reference located inside a string
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    /// Byte range of the token, including `${`, `}` and, for a full match, the trailing `$`
    pub span: Range<usize>,
    /// Referenced path
    pub path: Path,
    /// Fallback literal (only when default parsing is enabled)
    pub default: Option<String>,
}

/// Result of scanning one string
#[derive(Debug, Clone, PartialEq)]
pub struct Scan {
    pub mode: Mode,
    pub placeholders: Vec<Placeholder>,
}

impl Scan {
    /// True when the string holds no placeholders at all
    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }
}

/// Scanner for a single string value
pub struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    defaults: bool,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given input
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            defaults: false,
        }
    }

    /// Split `path:default` inside tokens
    pub fn with_defaults(mut self, enabled: bool) -> Self {
        self.defaults = enabled;
        self
    }

    /// Scan the entire input string
    pub fn scan(mut self) -> Result<Scan> {
        let mut placeholders = Vec::new();

        while let Some(start) = self.next_open() {
            placeholders.push(self.parse_token(start)?);
        }

        let mode = if self.is_full_match(&placeholders) {
            placeholders[0].span.end = self.input.len();
            Mode::FullMatch
        } else {
            Mode::Partial
        };

        Ok(Scan { mode, placeholders })
    }

    /// Byte offset of the next `${`, advancing past it
    fn next_open(&mut self) -> Option<usize> {
        let offset = self.input[self.pos..].find(OPEN)?;
        let start = self.pos + offset;
        self.pos = start + OPEN.len();
        Some(start)
    }

    /// Parse a token whose `${` starts at `start`
    fn parse_token(&mut self, start: usize) -> Result<Placeholder> {
        let close = self.input[self.pos..]
            .find(CLOSE)
            .map(|offset| self.pos + offset)
            .ok_or_else(|| {
                Error::path_syntax(&self.input[start..], "unterminated '${' placeholder")
            })?;

        let content = &self.input[self.pos..close];
        self.pos = close + CLOSE.len_utf8();

        let (path_text, default) = match content.split_once(DEFAULT_SEPARATOR) {
            Some((path, default)) if self.defaults => (path, Some(default.to_string())),
            _ => (content, None),
        };

        Ok(Placeholder {
            span: start..self.pos,
            path: Path::parse(path_text)?,
            default,
        })
    }

    /// The string is exactly one token followed by `$`
    fn is_full_match(&self, placeholders: &[Placeholder]) -> bool {
        match placeholders {
            [only] => {
                only.span.start == 0
                    && only.span.end + FULL_MATCH_SUFFIX.len_utf8() == self.input.len()
                    && self.input.ends_with(FULL_MATCH_SUFFIX)
            }
            _ => false,
        }
    }
}

/// Scan a string for placeholders
pub fn scan(input: &str) -> Result<Scan> {
    Scanner::new(input).scan()
}

/// Cheap check for whether a string needs scanning at all
pub fn contains_placeholder(input: &str) -> bool {
    input.contains(OPEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(scan: &Scan) -> Vec<String> {
        scan.placeholders.iter().map(|p| p.path.render()).collect()
    }

    #[test]
    fn test_scan_plain_string() {
        let result = scan("hello world").unwrap();
        assert!(result.is_empty());
        assert_eq!(result.mode, Mode::Partial);
    }

    #[test]
    fn test_scan_dollar_without_brace() {
        assert!(scan("costs $5 and {braces}").unwrap().is_empty());
        assert!(!contains_placeholder("just $dollar"));
    }

    #[test]
    fn test_scan_single_partial() {
        let input = "data/${dataset}/out";
        let result = scan(input).unwrap();

        assert_eq!(result.mode, Mode::Partial);
        assert_eq!(paths(&result), vec!["dataset"]);
        assert_eq!(&input[result.placeholders[0].span.clone()], "${dataset}");
    }

    #[test]
    fn test_scan_full_match() {
        let input = "${load.paths}$";
        let result = scan(input).unwrap();

        assert_eq!(result.mode, Mode::FullMatch);
        assert_eq!(paths(&result), vec!["load.paths"]);
        assert_eq!(result.placeholders[0].span, 0..input.len());
    }

    #[test]
    fn test_scan_bare_token_is_partial() {
        let result = scan("${dataset}").unwrap();
        assert_eq!(result.mode, Mode::Partial);
        assert_eq!(result.placeholders[0].span, 0..10);
    }

    #[test]
    fn test_scan_suffix_without_full_string_is_partial() {
        for input in ["x${a}$", "${a}$ ", "${a}$$", "${a}${b}$"] {
            let result = scan(input).unwrap();
            assert_eq!(result.mode, Mode::Partial, "input {:?}", input);
        }
    }

    #[test]
    fn test_scan_multiple_tokens() {
        let input = "${a}-${b.c}$${d}";
        let result = scan(input).unwrap();

        assert_eq!(result.mode, Mode::Partial);
        assert_eq!(paths(&result), vec!["a", "b.c", "d"]);
        let spans: Vec<_> = result.placeholders.iter().map(|p| p.span.clone()).collect();
        assert_eq!(spans, vec![0..4, 5..11, 12..16]);
    }

    #[test]
    fn test_scan_dollar_before_token() {
        let result = scan("$${a}").unwrap();
        assert_eq!(result.placeholders[0].span, 1..5);
    }

    #[test]
    fn test_scan_malformed_paths() {
        for input in ["${}", "${.b}", "${a.}", "${a..b}", "x ${}$"] {
            let err = scan(input).unwrap_err();
            assert!(err.is_path_syntax(), "input {:?}", input);
        }
    }

    #[test]
    fn test_scan_unterminated() {
        let err = scan("prefix ${dataset").unwrap_err();
        assert!(err.is_path_syntax());
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn test_scan_nested_open_is_rejected() {
        let err = scan("${a${b}}").unwrap_err();
        assert!(err.is_path_syntax());
    }

    #[test]
    fn test_scan_colon_is_a_segment_character_by_default() {
        let result = scan("${a:b}").unwrap();
        assert_eq!(paths(&result), vec!["a:b"]);
        assert_eq!(result.placeholders[0].default, None);
    }

    #[test]
    fn test_scan_with_defaults() {
        let result = Scanner::new("${a.b:fallback:x}").with_defaults(true).scan().unwrap();
        assert_eq!(paths(&result), vec!["a.b"]);
        assert_eq!(result.placeholders[0].default.as_deref(), Some("fallback:x"));

        let empty = Scanner::new("${a:}").with_defaults(true).scan().unwrap();
        assert_eq!(empty.placeholders[0].default.as_deref(), Some(""));
    }

    #[test]
    fn test_scan_multibyte_text() {
        let input = "→${a}←";
        let result = scan(input).unwrap();
        assert_eq!(&input[result.placeholders[0].span.clone()], "${a}");
    }
}
