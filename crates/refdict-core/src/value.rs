//! Configuration tree values
//!
//! A tree is made of mappings, sequences and scalars, plus dynamic source
//! nodes whose children are computed on lookup. String scalars may contain
//! `${path}` placeholders until the tree has been resolved.

use std::borrow::Cow;
use std::fmt;
use std::ops::Index;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::locator;
use crate::path::Path;
use crate::source::Dynamic;

static NULL: Value = Value::Null;

/// A node in a configuration tree
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value (may contain placeholders like ${load.base_path})
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(IndexMap<String, Value>),
    /// Source computing its children on demand
    Dynamic(Dynamic),
}

impl Value {
    /// Wrap a dynamic source as a tree node
    pub fn dynamic(source: impl Into<Dynamic>) -> Self {
        Value::Dynamic(source.into())
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a string
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Check if this value is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_))
    }

    /// Check if this value is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Check if this value is a dynamic source
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Value::Dynamic(_))
    }

    /// Get as boolean if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float or Integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as slice if this is a Sequence
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Child by mapping key or sequence index (decimal text)
    ///
    /// Dynamic sources are not consulted; use [`Value::get_path`] for that.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Mapping(map) => map.get(key),
            Value::Sequence(seq) => Path::index_of(key).and_then(|i| seq.get(i)),
            _ => None,
        }
    }

    /// Get a value by dotted path (e.g., "load.base_path" or "servers.0.host")
    ///
    /// Lookups through dynamic sources produce owned values.
    pub fn get_path(&self, path: &str) -> Result<Cow<'_, Value>> {
        let path = Path::parse(path)?;
        locator::locate(self, &path)
    }

    /// Set a value at a path, creating intermediate mappings as needed
    ///
    /// Null nodes along the way are replaced by mappings. Existing sequence
    /// elements may be replaced but sequences are never extended.
    pub fn set_path(&mut self, path: &Path, value: Value) -> Result<()> {
        let segments = path.segments();
        let mut current = self;

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i == segments.len() - 1;

            if current.is_null() {
                *current = Value::Mapping(IndexMap::new());
            }

            current = match current {
                Value::Mapping(map) => {
                    if is_last {
                        map.insert(segment.clone(), value);
                        return Ok(());
                    }
                    map.entry(segment.clone()).or_insert(Value::Null)
                }
                Value::Sequence(seq) => {
                    let slot = Path::index_of(segment)
                        .and_then(|idx| seq.get_mut(idx))
                        .ok_or_else(|| Error::path_not_found(path.render(), segment.clone()))?;
                    if is_last {
                        *slot = value;
                        return Ok(());
                    }
                    slot
                }
                _ => return Err(Error::path_not_found(path.render(), segment.clone())),
            };
        }

        Ok(())
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Dynamic(_) => "dynamic",
        }
    }

    /// Text used when this value is spliced into a larger string
    ///
    /// Strings are inserted verbatim and null becomes empty text; everything
    /// else uses the `Display` form.
    pub fn render_inline(&self) -> Cow<'_, str> {
        match self {
            Value::String(s) => Cow::Borrowed(s),
            Value::Null => Cow::Borrowed(""),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Merge another value into this one
    ///
    /// Merge semantics:
    /// - Mappings: Deep merge recursively
    /// - Null in other: Removes the key
    /// - Anything else: `other` replaces
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) => {
                for (key, overlay_value) in overlay {
                    if overlay_value.is_null() {
                        base.shift_remove(&key);
                    } else if let Some(base_value) = base.get_mut(&key) {
                        base_value.merge(overlay_value);
                    } else {
                        base.insert(key, overlay_value);
                    }
                }
            }
            (this, other) => {
                *this = other;
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n)
                if n.is_finite() && *n != 0.0 && (n.abs() >= 1e16 || n.abs() < 1e-5) =>
            {
                write!(f, "{:e}", n)
            }
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{:.1}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Dynamic(d) => write!(f, "<dynamic:{}>", d.name()),
        }
    }
}

/// Attribute-style read access: `tree["load"]["dev_path"]`
///
/// Missing keys yield `Value::Null` rather than panicking.
impl Index<&str> for Value {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, idx: usize) -> &Value {
        match self {
            Value::Sequence(seq) => seq.get(idx).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(seq) => seq.serialize(serializer),
            Value::Mapping(map) => map.serialize(serializer),
            Value::Dynamic(d) => serializer.collect_str(&format_args!("<dynamic:{}>", d.name())),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(i64::try_from(v).map_or(Value::Float(v as f64), Value::Integer))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Value, A::Error> {
        let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(key) = access.next_key::<Value>()? {
            // YAML allows scalar keys of any type; store their text form
            let key = match key {
                Value::String(s) => s,
                Value::Sequence(_) | Value::Mapping(_) => {
                    return Err(de::Error::custom("mapping keys must be scalars"))
                }
                other => other.to_string(),
            };
            let value = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Value::Mapping(map))
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Mapping(m)
    }
}

impl From<Dynamic> for Value {
    fn from(d: Dynamic) -> Self {
        Value::Dynamic(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EnvSource;
    use pretty_assertions::assert_eq;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_deserialize_yaml() {
        let value = yaml(
            r#"
dataset: spotify
size: 3
ratio: 0.5
flag: true
nothing: ~
items: [a, 1]
"#,
        );

        assert_eq!(value["dataset"].as_str(), Some("spotify"));
        assert_eq!(value["size"].as_i64(), Some(3));
        assert_eq!(value["ratio"].as_f64(), Some(0.5));
        assert_eq!(value["flag"].as_bool(), Some(true));
        assert!(value["nothing"].is_null());
        assert_eq!(value["items"][1].as_i64(), Some(1));
    }

    #[test]
    fn test_deserialize_keeps_key_order_and_scalar_keys() {
        let value = yaml("z: 1\na: 2\n3: three\n");
        let keys: Vec<_> = value.as_mapping().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "3"]);
    }

    #[test]
    fn test_deserialize_json() {
        let value: Value = serde_json::from_str(r#"{"a": [1, 2.5, null, "x"]}"#).unwrap();
        assert_eq!(
            value["a"],
            Value::Sequence(vec![
                Value::Integer(1),
                Value::Float(2.5),
                Value::Null,
                Value::from("x"),
            ])
        );
    }

    #[test]
    fn test_index_missing_is_null() {
        let value = yaml("a: {b: 1}");
        assert!(value["missing"].is_null());
        assert!(value["a"]["b"]["c"].is_null());
        assert!(value[3].is_null());
    }

    #[test]
    fn test_get_by_index_segment() {
        let value = yaml("servers: [alpha, beta]");
        assert_eq!(value["servers"].get("1").and_then(Value::as_str), Some("beta"));
        assert_eq!(value["servers"].get("x"), None);
    }

    #[test]
    fn test_get_path() {
        let value = yaml("load: {paths: [a, b]}");
        assert_eq!(
            value.get_path("load.paths.0").unwrap().as_str(),
            Some("a")
        );
        assert!(value.get_path("load.nope").unwrap_err().is_path_not_found());
        assert!(value.get_path("load..paths").unwrap_err().is_path_syntax());
    }

    #[test]
    fn test_display_canonical_forms() {
        assert_eq!(Value::Float(1.0).to_string(), "1.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Integer(-4).to_string(), "-4");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(yaml("{x: 1, y: [a, b]}").to_string(), "{x: 1, y: [a, b]}");
        assert_eq!(Value::dynamic(EnvSource).to_string(), "<dynamic:env>");
    }

    #[test]
    fn test_display_extreme_floats_use_exponent() {
        assert_eq!(Value::Float(1.0e300).to_string(), "1e300");
        assert_eq!(Value::Float(-2.5e20).to_string(), "-2.5e20");
        assert_eq!(Value::Float(1e-7).to_string(), "1e-7");
        assert_eq!(Value::Float(0.0025).to_string(), "0.0025");
        assert_eq!(Value::Float(0.0).to_string(), "0.0");
        assert_eq!(Value::Float(123456.0).to_string(), "123456.0");
    }

    #[test]
    fn test_render_inline() {
        assert_eq!(Value::Null.render_inline(), "");
        assert_eq!(Value::from("text").render_inline(), "text");
        assert_eq!(Value::Integer(7).render_inline(), "7");
        assert_eq!(Value::Bool(true).render_inline(), "true");
    }

    #[test]
    fn test_serialize_dynamic_as_marker() {
        let mut map = IndexMap::new();
        map.insert("env".to_string(), Value::dynamic(EnvSource));
        let json = serde_json::to_string(&Value::Mapping(map)).unwrap();
        assert_eq!(json, r#"{"env":"<dynamic:env>"}"#);
    }

    #[test]
    fn test_set_path_creates_mappings() {
        let mut value = Value::Null;
        value
            .set_path(&Path::parse("a.b.c").unwrap(), Value::Integer(1))
            .unwrap();
        assert_eq!(value["a"]["b"]["c"].as_i64(), Some(1));
    }

    #[test]
    fn test_set_path_into_sequence() {
        let mut value = yaml("items: [a, {name: b}]");
        value
            .set_path(&Path::parse("items.1.name").unwrap(), Value::from("c"))
            .unwrap();
        value
            .set_path(&Path::parse("items.0").unwrap(), Value::from("z"))
            .unwrap();
        assert_eq!(value["items"][1]["name"].as_str(), Some("c"));
        assert_eq!(value["items"][0].as_str(), Some("z"));

        let err = value
            .set_path(&Path::parse("items.5").unwrap(), Value::Null)
            .unwrap_err();
        assert!(err.is_path_not_found());
    }

    #[test]
    fn test_set_path_through_scalar_fails() {
        let mut value = yaml("a: 1");
        let err = value
            .set_path(&Path::parse("a.b").unwrap(), Value::Null)
            .unwrap_err();
        assert!(err.is_path_not_found());
    }

    #[test]
    fn test_merge_deep() {
        let mut base = yaml("load: {base_path: /data, workers: 2}");
        base.merge(yaml("load: {base_path: /scratch}"));

        assert_eq!(base["load"]["base_path"].as_str(), Some("/scratch"));
        assert_eq!(base["load"]["workers"].as_i64(), Some(2));
    }

    #[test]
    fn test_merge_null_removes_key() {
        let mut base = yaml("feature: {enabled: true, config: value}");
        base.merge(yaml("feature: {config: null}"));

        assert_eq!(base["feature"]["enabled"].as_bool(), Some(true));
        assert!(base["feature"].get("config").is_none());
    }

    #[test]
    fn test_merge_sequence_replaces() {
        let mut base = yaml("servers: [a, b]");
        base.merge(yaml("servers: [c]"));
        assert_eq!(base["servers"], Value::from(vec!["c"]));
    }
}
