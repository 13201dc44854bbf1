//! Error types for refdict
//!
//! Errors are structured: a kind, the tree location whose placeholder
//! failed, an optional cause and an actionable help message.

use std::fmt;

/// Result type alias for refdict operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for refdict operations
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Location in the tree where the failing placeholder lives (e.g., "load.dev_path")
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Malformed dotted path text or placeholder token
    #[error("Invalid path syntax: {text:?}")]
    PathSyntax { text: String },
    /// A path segment could not be resolved against the current node
    #[error("Path not found: {path} (failed at segment '{segment}')")]
    PathNotFound { path: String, segment: String },
    /// Resolving a path re-entered that same path
    #[error("Circular reference detected")]
    CircularReference { chain: Vec<String> },
    /// A dynamic source failed to produce a value
    #[error("Dynamic source '{name}' failed: {message}")]
    DynamicSource { name: String, message: String },
    /// Error reading YAML/JSON into a tree
    #[error("Parse error")]
    Parse,
    /// I/O error (file not found, etc.)
    #[error("I/O error")]
    Io,
}

impl Error {
    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            help: None,
            cause: None,
        }
    }

    /// Create a path syntax error
    pub fn path_syntax(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            cause: Some(reason.into()),
            help: Some(
                "A path is one or more non-empty segments separated by '.', e.g. ${load.base_path}"
                    .into(),
            ),
            ..Self::from_kind(ErrorKind::PathSyntax { text: text.into() })
        }
    }

    /// Create a path not found error
    pub fn path_not_found(path: impl Into<String>, segment: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            help: Some(format!("Check that '{}' exists in the configuration", path)),
            ..Self::from_kind(ErrorKind::PathNotFound {
                path,
                segment: segment.into(),
            })
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(chain: Vec<String>) -> Self {
        Self {
            cause: Some(format!("Chain: {}", chain.join(" → "))),
            help: Some("Break the circular dependency by removing one of the references".into()),
            ..Self::from_kind(ErrorKind::CircularReference { chain })
        }
    }

    /// Create a dynamic source failure
    pub fn dynamic_source(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            help: Some(format!("Check the '{}' source implementation", name)),
            ..Self::from_kind(ErrorKind::DynamicSource {
                name,
                message: message.into(),
            })
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::from_kind(ErrorKind::Parse)
        }
    }

    /// Create an I/O error
    pub fn io(file: impl AsRef<std::path::Path>, err: &std::io::Error) -> Self {
        Self {
            cause: Some(format!("{}: {}", file.as_ref().display(), err)),
            ..Self::from_kind(ErrorKind::Io)
        }
    }

    /// Add location context to the error, keeping the innermost location
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        if self.path.is_none() {
            self.path = Some(path.into());
        }
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_path_syntax(&self) -> bool {
        matches!(self.kind, ErrorKind::PathSyntax { .. })
    }

    pub fn is_path_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::PathNotFound { .. })
    }

    pub fn is_circular_reference(&self) -> bool {
        matches!(self.kind, ErrorKind::CircularReference { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
