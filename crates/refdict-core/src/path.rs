//! Dotted reference paths
//!
//! A path such as `load.base_path` or `servers.0.host` is an ordered,
//! non-empty list of segments. Segments either name a mapping key or, when
//! they are all decimal digits, may address a sequence position. Paths always
//! resolve from the tree root.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Segment delimiter
pub const DELIMITER: char = '.';

/// A parsed dotted path
///
/// Holds at least one segment; every segment is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse the dotted form, rejecting empty text, empty segments
    /// (leading, trailing or doubled delimiters) and braces.
    pub fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::path_syntax(text, "path is empty"));
        }

        let mut segments = Vec::new();
        for segment in text.split(DELIMITER) {
            if segment.is_empty() {
                let reason = if text.starts_with(DELIMITER) {
                    "leading '.'"
                } else if text.ends_with(DELIMITER) {
                    "trailing '.'"
                } else {
                    "empty segment between '.' delimiters"
                };
                return Err(Error::path_syntax(text, reason));
            }
            if let Some(c) = segment
                .chars()
                .find(|c| matches!(c, '{' | '}') || c.is_control())
            {
                return Err(Error::path_syntax(
                    text,
                    format!("invalid character {:?} in segment '{}'", c, segment),
                ));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// Build a path from already-split segments
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        Self::parse(&segments.join("."))
    }

    /// Render back to the canonical dotted form
    pub fn render(&self) -> String {
        self.segments.join(".")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The path made of the first `len` segments
    ///
    /// `len` is clamped to `1..=self.len()`.
    pub fn prefix(&self, len: usize) -> Path {
        let len = len.clamp(1, self.segments.len());
        Path {
            segments: self.segments[..len].to_vec(),
        }
    }

    /// Interpret a segment as a sequence index
    pub fn index_of(segment: &str) -> Option<usize> {
        if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        segment.parse().ok()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}
