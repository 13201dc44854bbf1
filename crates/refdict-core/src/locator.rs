//! Tree navigation by path
//!
//! Walks a tree one segment at a time: mapping keys, sequence indexes, and
//! dynamic sources (which consume exactly one segment per lookup).

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::path::Path;
use crate::source::Dynamic;
use crate::value::Value;

/// Find the node at `path`, starting from `root`
///
/// Nodes inside the tree are borrowed; anything produced by a dynamic source
/// is owned.
pub fn locate<'a>(root: &'a Value, path: &Path) -> Result<Cow<'a, Value>> {
    let mut current = Cow::Borrowed(root);
    for segment in path.segments() {
        current = step(current, segment)?
            .ok_or_else(|| Error::path_not_found(path.render(), segment.clone()))?;
    }
    Ok(current)
}

/// Descend one segment from `current`
///
/// Returns `Ok(None)` when the segment does not exist: a missing key, an
/// index that is not a decimal in range, a dynamic source that does not
/// contain the key, or any scalar.
pub fn step<'a>(current: Cow<'a, Value>, segment: &str) -> Result<Option<Cow<'a, Value>>> {
    let next = match current {
        Cow::Borrowed(node) => match node {
            Value::Mapping(map) => map.get(segment).map(Cow::Borrowed),
            Value::Sequence(seq) => Path::index_of(segment)
                .and_then(|i| seq.get(i))
                .map(Cow::Borrowed),
            Value::Dynamic(source) => lookup(source, segment)?.map(Cow::Owned),
            _ => None,
        },
        Cow::Owned(node) => match node {
            Value::Mapping(mut map) => map.swap_remove(segment).map(Cow::Owned),
            Value::Sequence(mut seq) => Path::index_of(segment)
                .filter(|&i| i < seq.len())
                .map(|i| Cow::Owned(seq.swap_remove(i))),
            Value::Dynamic(source) => lookup(&source, segment)?.map(Cow::Owned),
            _ => None,
        },
    };
    Ok(next)
}

fn lookup(source: &Dynamic, key: &str) -> Result<Option<Value>> {
    if !source.contains(key) {
        return Ok(None);
    }
    log::trace!("dynamic source '{}' producing '{}'", source.name(), key);
    source.get(key).map(Some)
}
