//! Merge discovered host facts with operator metadata.
//!
//! Operator-supplied values always win. Mappings present on both sides are
//! merged key by key; any other conflict (scalar, sequence, or a type
//! mismatch) takes the authoritative value whole. Sequences are never
//! concatenated.

use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{KEY_HOSTNAME, KEY_LOCAL_HOSTNAME, MetadataDocument};

/// Recursively merge `authoritative` over `discovered`.
pub fn deep_merge(discovered: Value, authoritative: Value) -> Value {
    match (discovered, authoritative) {
        (Value::Object(base), Value::Object(over)) => Value::Object(merge_maps(base, over)),
        (_, authoritative) => authoritative,
    }
}

fn merge_maps(mut base: Map<String, Value>, over: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in over {
        let merged = match base.get_mut(&key) {
            Some(existing) => deep_merge(existing.take(), value),
            None => value,
        };
        base.insert(key, merged);
    }
    base
}

/// Merge host facts with resolved metadata and bring `hostname` in line
/// with `local-hostname`.
///
/// When `local-hostname` is absent after the merge, `hostname` is left as
/// merged.
pub fn merge(discovered: MetadataDocument, authoritative: MetadataDocument) -> MetadataDocument {
    let mut merged =
        MetadataDocument::from_map(merge_maps(discovered.into_map(), authoritative.into_map()));

    if let Some(local) = merged.get(KEY_LOCAL_HOSTNAME).cloned() {
        merged.insert(KEY_HOSTNAME, local);
    } else {
        debug!("no local-hostname after merge, leaving hostname unchanged");
    }
    merged
}
