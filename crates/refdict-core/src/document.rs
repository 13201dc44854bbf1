//! Document type for refdict
//!
//! A `Document` holds a raw (unresolved) tree together with the options used
//! to resolve it. Files are loaded and merged, overrides and dynamic sources
//! are placed into the raw tree, and resolution happens on demand.

use std::path::Path as FsPath;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::engine::{self, ParseOptions, ParseReport};
use crate::error::{Error, Result};
use crate::path::Path;
use crate::source::{Dynamic, DynamicSource, SourceRegistry};
use crate::value::Value;

/// A raw tree plus resolution options
#[derive(Debug, Clone, Default)]
pub struct Document {
    raw: Value,
    options: ParseOptions,
}

impl Document {
    /// Wrap a raw tree with default options
    pub fn new(raw: Value) -> Self {
        Self {
            raw,
            options: ParseOptions::default(),
        }
    }

    /// Replace the resolution options
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Load a document from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;
        Ok(Self::new(value))
    }

    /// Load a document from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::parse(e.to_string()))?;
        Ok(Self::new(value))
    }

    /// Load a document from a file; `.json` files are read as JSON, anything else as YAML
    pub fn from_file(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, &e))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };
        parsed.map_err(|e| e.with_path(path.display().to_string()))
    }

    /// Load and merge multiple files
    ///
    /// Files are merged in order, later files overriding earlier ones:
    /// - Mappings are deep-merged
    /// - Everything else is replaced
    /// - Null values remove keys
    pub fn load_merged<P: AsRef<FsPath>>(paths: &[P]) -> Result<Self> {
        let mut merged: Option<Value> = None;

        for path in paths {
            let doc = Self::from_file(path)?;
            log::debug!("loaded {}", path.as_ref().display());
            match &mut merged {
                Some(base) => base.merge(doc.raw),
                None => merged = Some(doc.raw),
            }
        }

        Ok(Self::new(
            merged.unwrap_or_else(|| Value::Mapping(IndexMap::new())),
        ))
    }

    /// Merge another document into this one
    pub fn merge(&mut self, other: Document) {
        self.raw.merge(other.raw);
    }

    /// Override the value at a dotted path before resolution
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let path = Path::parse(path)?;
        self.raw.set_path(&path, value)
    }

    /// Bind a dynamic source at a dotted path
    pub fn mount(&mut self, path: &str, source: Arc<dyn DynamicSource>) -> Result<()> {
        self.set(path, Value::Dynamic(Dynamic::new(source)))
    }

    /// Bind every source in `registry` under the mapping at `path`
    ///
    /// Existing keys at `path` are kept unless a source has the same name.
    pub fn mount_registry(&mut self, path: &str, registry: &SourceRegistry) -> Result<()> {
        let base = Path::parse(path)?;
        for name in registry.names() {
            let Some(source) = registry.get(name) else {
                continue;
            };
            let target = Path::from_segments(base.segments().iter().map(String::as_str).chain([name]))?;
            self.raw
                .set_path(&target, Value::Dynamic(Dynamic::new(Arc::clone(source))))?;
        }
        Ok(())
    }

    /// The unresolved tree
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Resolve the whole tree
    pub fn resolve(&self) -> Result<Value> {
        self.resolve_report().map(|report| report.value)
    }

    /// Resolve the whole tree, reporting references left in place
    pub fn resolve_report(&self) -> Result<ParseReport> {
        engine::run(&self.raw, &self.options)
    }

    /// Get a resolved value at a dotted path
    pub fn get(&self, path: &str) -> Result<Value> {
        let path = Path::parse(path)?;
        let resolved = self.resolve()?;
        crate::locator::locate(&resolved, &path).map(|found| found.into_owned())
    }

    /// Export the document as a value
    ///
    /// # Arguments
    /// * `resolve` - If true, resolve placeholders. If false, show them as written.
    pub fn to_value(&self, resolve: bool) -> Result<Value> {
        if resolve {
            self.resolve()
        } else {
            Ok(self.raw.clone())
        }
    }

    /// Export the document as YAML
    pub fn to_yaml(&self, resolve: bool) -> Result<String> {
        let value = self.to_value(resolve)?;
        serde_yaml::to_string(&value).map_err(|e| Error::parse(e.to_string()))
    }

    /// Export the document as JSON
    pub fn to_json(&self, resolve: bool) -> Result<String> {
        let value = self.to_value(resolve)?;
        serde_json::to_string_pretty(&value).map_err(|e| Error::parse(e.to_string()))
    }
}
