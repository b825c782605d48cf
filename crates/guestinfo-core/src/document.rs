use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Operator-assigned instance identifier.
pub const KEY_INSTANCE_ID: &str = "instance-id";
/// Hostname the provisioning framework applies.
pub const KEY_LOCAL_HOSTNAME: &str = "local-hostname";
/// Kept in sync with `local-hostname` after merge.
pub const KEY_HOSTNAME: &str = "hostname";
/// Network section: `config` from metadata, `interfaces` from host facts.
pub const KEY_NETWORK: &str = "network";
/// Sibling key declaring the encoding of an embedded `network` string.
pub const KEY_NETWORK_ENCODING: &str = "network.encoding";
/// Key under `network` holding the v1/v2 network config.
pub const KEY_CONFIG: &str = "config";

/// Resolved metadata: an insertion-ordered mapping of arbitrary values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataDocument(Map<String, Value>);

impl MetadataDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.get_str(KEY_INSTANCE_ID)
    }

    pub fn local_hostname(&self) -> Option<&str> {
        self.get_str(KEY_LOCAL_HOSTNAME)
    }

    pub fn hostname(&self) -> Option<&str> {
        self.get_str(KEY_HOSTNAME)
    }

    /// `network.config`, when the operator supplied one.
    pub fn network_config(&self) -> Option<&Value> {
        self.0.get(KEY_NETWORK)?.get(KEY_CONFIG)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.0)
    }
}
