//! refdict-core: reference resolution for nested configuration trees
//!
//! String values may refer to other parts of the same tree by dotted path:
//! `${load.base_path}` is replaced by the referenced value's text, while a
//! string that is exactly `${load.splits}$` is replaced by the referenced
//! value itself, keeping its type. References may chain and may pass through
//! dynamic sources mounted in the tree.
//!
//! # Example
//!
//! ```rust
//! use refdict_core::{parse, Value};
//!
//! let tree: Value = serde_yaml::from_str(r#"
//! dataset: spotify
//! splits: [train, dev]
//! load:
//!   base_path: ~/data/${dataset}
//!   dev_path: ${load.base_path}/dev
//!   splits: ${splits}$
//! "#).unwrap();
//!
//! let resolved = parse(&tree).unwrap();
//! assert_eq!(resolved["load"]["dev_path"].as_str(), Some("~/data/spotify/dev"));
//! assert_eq!(resolved["load"]["splits"][1].as_str(), Some("dev"));
//! ```

pub mod document;
pub mod engine;
pub mod error;
pub mod locator;
pub mod path;
pub mod scanner;
pub mod source;
pub mod value;

pub use document::Document;
pub use engine::{Engine, ParseOptions, ParseReport, Unresolved};
pub use error::{Error, ErrorKind, Result};
pub use path::Path;
pub use source::{Dynamic, DynamicSource, EnvSource, FnSource, RandomString, SourceRegistry};
pub use value::Value;

/// Resolve every placeholder in `tree`, failing on the first error
pub fn parse(tree: &Value) -> Result<Value> {
    parse_with(tree, &ParseOptions::default())
}

/// Resolve with explicit options
pub fn parse_with(tree: &Value, options: &ParseOptions) -> Result<Value> {
    parse_report(tree, options).map(|report| report.value)
}

/// Resolve what can be resolved, leaving missing references in place
pub fn partial_parse(tree: &Value) -> Result<Value> {
    parse_with(tree, &ParseOptions::lenient())
}

/// Resolve leniently over several passes; 0 repeats until nothing changes
pub fn iterative_parse(tree: &Value, iterations: usize) -> Result<Value> {
    parse_with(tree, &ParseOptions::lenient().with_iterations(iterations))
}

/// Resolve and report the references that were left in place
pub fn parse_report(tree: &Value, options: &ParseOptions) -> Result<ParseReport> {
    engine::run(tree, options)
}
