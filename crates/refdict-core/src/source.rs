//! Dynamic lookup sources
//!
//! A dynamic source sits in the tree like any other node but computes its
//! children on demand from the requested key, e.g. `${utils.rand.8}` asks the
//! `rand` source for an eight character string. Sources are consulted by the
//! tree locator one segment at a time and are never expanded into the
//! resolved tree themselves.

use std::fmt;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::path::Path;
use crate::value::Value;

/// Trait for dynamic source implementations
pub trait DynamicSource: Send + Sync {
    /// Name used in diagnostics and as the registry key
    fn name(&self) -> &str;

    /// Whether `key` can be looked up in this source
    fn contains(&self, key: &str) -> bool;

    /// Compute the value for `key`
    ///
    /// Only called after `contains(key)` returned true.
    fn get(&self, key: &str) -> Result<Value>;
}

/// A dynamic source stored in the tree
///
/// Two handles are equal when they point at the same source instance.
#[derive(Clone)]
pub struct Dynamic(Arc<dyn DynamicSource>);

impl Dynamic {
    pub fn new(source: Arc<dyn DynamicSource>) -> Self {
        Self(source)
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn get(&self, key: &str) -> Result<Value> {
        self.0.get(key)
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dynamic").field(&self.name()).finish()
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<S: DynamicSource + 'static> From<S> for Dynamic {
    fn from(source: S) -> Self {
        Dynamic(Arc::new(source))
    }
}

/// A source built from a pair of closures
pub struct FnSource<C, G>
where
    C: Fn(&str) -> bool + Send + Sync,
    G: Fn(&str) -> Result<Value> + Send + Sync,
{
    name: String,
    contains: C,
    get: G,
}

impl<C, G> FnSource<C, G>
where
    C: Fn(&str) -> bool + Send + Sync,
    G: Fn(&str) -> Result<Value> + Send + Sync,
{
    /// Create a new closure-backed source
    pub fn new(name: impl Into<String>, contains: C, get: G) -> Self {
        Self {
            name: name.into(),
            contains,
            get,
        }
    }
}

impl<C, G> DynamicSource for FnSource<C, G>
where
    C: Fn(&str) -> bool + Send + Sync,
    G: Fn(&str) -> Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn contains(&self, key: &str) -> bool {
        (self.contains)(key)
    }

    fn get(&self, key: &str) -> Result<Value> {
        (self.get)(key)
    }
}

/// Random alphanumeric strings keyed by length
///
/// Usage:
///   ${utils.rand.8}    - eight random ASCII letters and digits
pub struct RandomString {
    rng: Mutex<StdRng>,
}

impl RandomString {
    /// Longest string the source will produce
    pub const MAX_LENGTH: usize = 4096;

    /// Create a source seeded from the OS
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a source with a reproducible stream
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn length_of(key: &str) -> Option<usize> {
        Path::index_of(key).filter(|len| (1..=Self::MAX_LENGTH).contains(len))
    }
}

impl Default for RandomString {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicSource for RandomString {
    fn name(&self) -> &str {
        "rand"
    }

    fn contains(&self, key: &str) -> bool {
        Self::length_of(key).is_some()
    }

    fn get(&self, key: &str) -> Result<Value> {
        let len = Self::length_of(key).ok_or_else(|| {
            Error::dynamic_source(
                self.name(),
                format!(
                    "'{}' is not a length between 1 and {}",
                    key,
                    Self::MAX_LENGTH
                ),
            )
        })?;
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| Error::dynamic_source(self.name(), "generator lock poisoned"))?;
        let text: String = (0..len)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();
        Ok(Value::String(text))
    }
}

/// Environment variables
///
/// Usage:
///   ${utils.env.HOME}  - value of $HOME, not found if unset
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl DynamicSource for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    fn contains(&self, key: &str) -> bool {
        std::env::var_os(key).is_some()
    }

    fn get(&self, key: &str) -> Result<Value> {
        std::env::var(key).map(Value::String).map_err(|e| {
            Error::dynamic_source(
                self.name(),
                format!("environment variable '{}': {}", key, e),
            )
        })
    }
}

/// Registry of named dynamic sources
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: IndexMap<String, Arc<dyn DynamicSource>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in sources (rand, env)
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(RandomString::new()));
        registry.register(Arc::new(EnvSource));
        registry
    }

    /// Register a source, returning any source previously registered under its name
    pub fn register(&mut self, source: Arc<dyn DynamicSource>) -> Option<Arc<dyn DynamicSource>> {
        self.sources.insert(source.name().to_string(), source)
    }

    /// Get a source by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn DynamicSource>> {
        self.sources.get(name)
    }

    /// Check if a source is registered
    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// A mapping of name to source node, ready to be placed in a tree
    pub fn to_value(&self) -> Value {
        Value::Mapping(
            self.sources
                .iter()
                .map(|(name, source)| {
                    (
                        name.clone(),
                        Value::Dynamic(Dynamic::new(Arc::clone(source))),
                    )
                })
                .collect(),
        )
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sources.keys()).finish()
    }
}
