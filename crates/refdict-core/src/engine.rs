//! Reference resolution
//!
//! The engine walks a tree and rebuilds it with every placeholder replaced.
//! Each referenced path is resolved at most once per run: its raw node is
//! located, fully resolved (recursively, so chains of references settle
//! first), and memoized. A path that is re-entered while still in progress is
//! a cycle.

use std::borrow::Cow;
use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::locator;
use crate::path::Path;
use crate::scanner::{Mode, Placeholder, Scan, Scanner};
use crate::value::Value;

/// Passes run when `iterations` is 0
pub const MAX_PASSES: usize = 100;

/// Options controlling a resolution run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Fail on references that cannot be found (otherwise leave them in place)
    pub strict: bool,
    /// Whole-tree passes; 0 means repeat until nothing changes (bounded by [`MAX_PASSES`])
    pub iterations: usize,
    /// Accept `${path:default}` fallbacks
    pub defaults: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            strict: true,
            iterations: 1,
            defaults: false,
        }
    }
}

impl ParseOptions {
    /// Leave unresolvable references in place instead of failing
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_defaults(mut self, defaults: bool) -> Self {
        self.defaults = defaults;
        self
    }

    fn passes(&self) -> usize {
        if self.iterations == 0 {
            MAX_PASSES
        } else {
            self.iterations
        }
    }
}

/// A placeholder left in place by a lenient run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// Where the placeholder lives ("<root>" for the root itself)
    pub location: String,
    /// The path it refers to
    pub reference: Path,
}

/// Outcome of a resolution run
#[derive(Debug, Clone, PartialEq)]
pub struct ParseReport {
    pub value: Value,
    pub unresolved: Vec<Unresolved>,
}

impl ParseReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[derive(Debug)]
enum Slot {
    InProgress,
    Done(Value),
}

/// Per-run memo table and cycle guard
#[derive(Debug, Default)]
pub(crate) struct ResolutionState {
    slots: HashMap<Path, Slot>,
    stack: Vec<Path>,
}

impl ResolutionState {
    /// The chain from the first visit of `path` back to `path`
    fn cycle_through(&self, path: &Path) -> Vec<String> {
        let start = self.stack.iter().position(|p| p == path).unwrap_or(0);
        self.stack[start..]
            .iter()
            .chain(std::iter::once(path))
            .map(Path::render)
            .collect()
    }
}

/// One resolution pass over a tree
pub struct Engine<'a> {
    root: &'a Value,
    options: &'a ParseOptions,
    state: ResolutionState,
    location: Vec<String>,
    unresolved: Vec<Unresolved>,
}

impl<'a> Engine<'a> {
    pub fn new(root: &'a Value, options: &'a ParseOptions) -> Self {
        Self {
            root,
            options,
            state: ResolutionState::default(),
            location: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Resolve the whole tree
    pub fn run(mut self) -> Result<ParseReport> {
        let root = self.root;
        let value = self.resolve_value(root)?;
        Ok(ParseReport {
            value,
            unresolved: self.unresolved,
        })
    }

    /// Resolve a single path against the tree, memoized and cycle-guarded
    pub fn resolve_path(&mut self, path: &Path) -> Result<Value> {
        match self.state.slots.get(path) {
            Some(Slot::Done(value)) => {
                trace!("memo hit for {}", path);
                return Ok(value.clone());
            }
            Some(Slot::InProgress) => {
                return Err(Error::circular_reference(self.state.cycle_through(path)));
            }
            None => {}
        }

        trace!("resolving {}", path);
        self.state.slots.insert(path.clone(), Slot::InProgress);
        self.state.stack.push(path.clone());

        let result = self.lookup(path).and_then(|raw| {
            let outer = std::mem::replace(&mut self.location, path.segments().to_vec());
            let resolved = self.resolve_value(&raw);
            self.location = outer;
            resolved
        });

        self.state.stack.pop();
        match result {
            Ok(value) => {
                self.state
                    .slots
                    .insert(path.clone(), Slot::Done(value.clone()));
                Ok(value)
            }
            Err(e) => {
                self.state.slots.remove(path);
                Err(e)
            }
        }
    }

    /// Rebuild `node` with all placeholders replaced
    fn resolve_value(&mut self, node: &Value) -> Result<Value> {
        match node {
            Value::Mapping(map) => {
                let mut resolved = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    self.location.push(key.clone());
                    let item = self.resolve_value(value);
                    self.location.pop();
                    resolved.insert(key.clone(), item?);
                }
                Ok(Value::Mapping(resolved))
            }
            Value::Sequence(seq) => {
                let mut resolved = Vec::with_capacity(seq.len());
                for (i, value) in seq.iter().enumerate() {
                    self.location.push(i.to_string());
                    let item = self.resolve_value(value);
                    self.location.pop();
                    resolved.push(item?);
                }
                Ok(Value::Sequence(resolved))
            }
            Value::String(s) => self.resolve_string(s),
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&mut self, s: &str) -> Result<Value> {
        let scan = self.scan(s).map_err(|e| e.with_path(self.location_text()))?;
        if scan.is_empty() {
            return Ok(Value::String(s.to_string()));
        }

        match scan.mode {
            Mode::FullMatch => {
                let resolved = self.resolve_placeholder(&scan.placeholders[0])?;
                Ok(resolved.unwrap_or_else(|| Value::String(s.to_string())))
            }
            Mode::Partial => {
                let mut out = String::with_capacity(s.len());
                let mut last = 0;
                for placeholder in &scan.placeholders {
                    out.push_str(&s[last..placeholder.span.start]);
                    match self.resolve_placeholder(placeholder)? {
                        Some(value) => out.push_str(&value.render_inline()),
                        None => out.push_str(&s[placeholder.span.clone()]),
                    }
                    last = placeholder.span.end;
                }
                out.push_str(&s[last..]);
                Ok(Value::String(out))
            }
        }
    }

    /// `Ok(None)` means the reference was left in place (lenient runs only)
    fn resolve_placeholder(&mut self, placeholder: &Placeholder) -> Result<Option<Value>> {
        let err = match self.resolve_path(&placeholder.path) {
            // a source only stands for its keys, never for a value of its own
            Ok(Value::Dynamic(source)) => {
                let path = placeholder.path.render();
                Error::path_not_found(&path, "<key>").with_help(format!(
                    "'{}' is the dynamic source '{}'; reference one of its keys, e.g. ${{{}.<key>}}",
                    path,
                    source.name(),
                    path
                ))
            }
            Ok(value) => return Ok(Some(value)),
            Err(err) => err,
        };

        let own_path_missing = matches!(
            &err.kind,
            ErrorKind::PathNotFound { path, .. } if *path == placeholder.path.render()
        );
        if !own_path_missing {
            return Err(err.with_path(self.location_text()));
        }

        if let Some(default) = &placeholder.default {
            trace!("{} not found, using default {:?}", placeholder.path, default);
            return Ok(Some(default_value(default)));
        }

        if self.options.strict {
            return Err(err.with_path(self.location_text()));
        }

        let unresolved = Unresolved {
            location: self.location_text(),
            reference: placeholder.path.clone(),
        };
        if !self.unresolved.contains(&unresolved) {
            warn!(
                "leaving unresolved reference ${{{}}} at {}",
                unresolved.reference, unresolved.location
            );
            self.unresolved.push(unresolved);
        }
        Ok(None)
    }

    /// Locate the raw node at `path`, following full-match references met on the way
    ///
    /// With `b: ${c}$`, the path `b.x` continues into whatever `c` resolves to.
    fn lookup(&mut self, path: &Path) -> Result<Value> {
        let root = self.root;
        let mut current = Cow::Borrowed(root);

        for (depth, segment) in path.segments().iter().enumerate() {
            let redirect = match current.as_ref() {
                Value::String(s) if depth > 0 => self.scan(s)?.mode == Mode::FullMatch,
                _ => false,
            };
            if redirect {
                current = Cow::Owned(self.resolve_path(&path.prefix(depth))?);
            }

            current = locator::step(current, segment)?
                .ok_or_else(|| Error::path_not_found(path.render(), segment.clone()))?;
        }

        Ok(current.into_owned())
    }

    fn scan(&self, s: &str) -> Result<Scan> {
        Scanner::new(s).with_defaults(self.options.defaults).scan()
    }

    fn location_text(&self) -> String {
        if self.location.is_empty() {
            "<root>".to_string()
        } else {
            self.location.join(".")
        }
    }
}

/// Run every pass requested by `options` over `tree`
pub(crate) fn run(tree: &Value, options: &ParseOptions) -> Result<ParseReport> {
    let passes = options.passes();
    let mut options = options.clone();
    if passes > 1 && options.strict {
        warn!("{} passes requested; unresolved references will be left in place", passes);
        options.strict = false;
    }

    debug!("resolution pass 1 of at most {}", passes);
    let mut report = Engine::new(tree, &options).run()?;

    for pass in 2..=passes {
        debug!("resolution pass {} of at most {}", pass, passes);
        let next = Engine::new(&report.value, &options).run()?;
        let settled = next.value == report.value;
        report = next;
        if settled {
            debug!("tree settled after {} passes", pass);
            break;
        }
    }

    Ok(report)
}

/// Typed literal for a `${path:default}` fallback
fn default_value(text: &str) -> Value {
    match text.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(text.to_string())
}
