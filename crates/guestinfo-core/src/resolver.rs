//! Builds the metadata document from raw guestinfo keys.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::codec;
use crate::document::{KEY_CONFIG, KEY_NETWORK, KEY_NETWORK_ENCODING, MetadataDocument};
use crate::error::{Error, Result};
use crate::parser;

/// guestinfo key holding the metadata document.
pub const METADATA_KEY: &str = "metadata";
/// guestinfo key holding cloud-init user-data.
pub const USERDATA_KEY: &str = "userdata";
/// guestinfo key holding cloud-init vendor-data.
pub const VENDORDATA_KEY: &str = "vendordata";

/// Key/value transport to the hypervisor.
///
/// Implementations return `None` both for keys that do not exist and for
/// transport failures; the resolver treats the two the same way.
pub trait GuestInfoSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl<F> GuestInfoSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// A raw guestinfo value together with its declared encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawValue {
    pub data: Option<String>,
    pub encoding: Option<String>,
}

impl RawValue {
    /// Fetch `key` and, if it has a value, its `<key>.encoding` sibling.
    /// An empty value counts as absent.
    pub fn fetch(source: &dyn GuestInfoSource, key: &str) -> Self {
        let data = source.get(key).filter(|v| !v.is_empty());
        let encoding = match data {
            Some(_) => source.get(&format!("{}.encoding", key)),
            None => None,
        };
        Self { data, encoding }
    }

    pub fn is_absent(&self) -> bool {
        self.data.is_none()
    }

    /// Decode into text. `key` is used for diagnostics only.
    pub fn decode(&self, key: &str) -> Result<Option<String>> {
        self.data
            .as_deref()
            .map(|data| codec::decode(key, self.encoding.as_deref(), data))
            .transpose()
    }
}

/// Fetch and decode a guestinfo value that is not parsed further
/// (user-data, vendor-data).
pub fn fetch_decoded(source: &dyn GuestInfoSource, key: &str) -> Result<Option<String>> {
    RawValue::fetch(source, key).decode(&format!("guestinfo.{}", key))
}

/// Resolve `guestinfo.metadata` into a [`MetadataDocument`].
pub fn resolve(source: &dyn GuestInfoSource) -> Result<MetadataDocument> {
    let raw = RawValue::fetch(source, METADATA_KEY);
    if raw.is_absent() {
        debug!("no metadata found in guestinfo");
        return Ok(MetadataDocument::new());
    }

    let text = raw.decode(&format!("guestinfo.{}", METADATA_KEY))?;
    let doc = resolve_text(text.as_deref())?;
    debug!(keys = doc.as_map().len(), "loaded metadata");
    Ok(doc)
}

/// Parse already-decoded metadata text and unpack its `network` entry.
pub fn resolve_text(text: Option<&str>) -> Result<MetadataDocument> {
    let mut data = match parser::parse(text)? {
        Value::Object(map) => map,
        other => {
            return Err(Error::invalid(
                METADATA_KEY,
                format!("expected a mapping, got {}", type_name(&other)),
            ));
        }
    };

    let network = data.shift_remove(KEY_NETWORK);
    let network_enc = data.shift_remove(KEY_NETWORK_ENCODING);

    if let Some(network) = network {
        if let Some(wrapped) = unpack_network(network, network_enc.as_ref())? {
            debug!(network = %wrapped, "network data found");
            data.insert(KEY_NETWORK.to_string(), wrapped);
        }
    }

    Ok(MetadataDocument::from_map(data))
}

/// Wrap the `network` value as `{config: ...}`, decoding it first when it
/// is an encoded string. `None` means the entry carries no config.
fn unpack_network(network: Value, enc: Option<&Value>) -> Result<Option<Value>> {
    let config = match network {
        Value::Object(inline) => {
            debug!("network data copied to 'config' key");
            Value::Object(inline)
        }
        Value::String(encoded) if encoded.is_empty() => {
            debug!("network data is empty, ignoring");
            return Ok(None);
        }
        Value::String(encoded) => {
            let enc = match enc {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.as_str()),
                Some(other) => {
                    warn!(
                        encoding = %other,
                        "network.encoding is not a string, treating network as plain text"
                    );
                    None
                }
            };
            let decoded = codec::decode("metadata.network", enc, &encoded)?;
            parser::parse(Some(&decoded))?
        }
        Value::Null => {
            debug!("network data is null, ignoring");
            return Ok(None);
        }
        other => {
            return Err(Error::invalid(
                KEY_NETWORK,
                format!(
                    "expected a mapping or an encoded string, got {}",
                    type_name(&other)
                ),
            ));
        }
    };

    let mut wrapped = Map::new();
    wrapped.insert(KEY_CONFIG.to_string(), config);
    Ok(Some(Value::Object(wrapped)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
