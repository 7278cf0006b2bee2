use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Identifier of a user record.
///
/// The remote service is free to use any JSON number or a string. Numbers and
/// strings are distinct keys (`1` and `"1"` never collide), while numerically
/// equal numbers are the same key (`1` and `1.0`). Equality, ordering and
/// hashing all follow `storage_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(Number),
    Text(String),
}

/// Canonical text for a number. `f64`'s `Display` never uses an exponent and
/// prints integral values without a fraction, so `1.0` and `1` agree.
fn canonical_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

impl UserId {
    /// Canonical storage key: numbers in canonical decimal form, strings as
    /// quoted JSON text.
    pub fn storage_key(&self) -> String {
        match self {
            UserId::Number(n) => canonical_number(n),
            UserId::Text(s) => Value::String(s.clone()).to_string(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            UserId::Number(n) => n.as_i64(),
            UserId::Text(_) => None,
        }
    }

    /// Parse an arbitrary JSON value as an id. Only numbers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(UserId::Number(n.clone())),
            Value::String(s) => Some(UserId::Text(s.clone())),
            _ => None,
        }
    }
}

impl PartialEq for UserId {
    fn eq(&self, other: &Self) -> bool {
        self.storage_key() == other.storage_key()
    }
}

impl Eq for UserId {}

impl Hash for UserId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.storage_key().hash(state);
    }
}

impl Ord for UserId {
    /// Numbers before strings, numbers by value
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (UserId::Number(a), UserId::Number(b)) => {
                let (fa, fb) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                fa.total_cmp(&fb)
                    .then_with(|| self.storage_key().cmp(&other.storage_key()))
            }
            (UserId::Number(_), UserId::Text(_)) => Ordering::Less,
            (UserId::Text(_), UserId::Number(_)) => Ordering::Greater,
            (UserId::Text(a), UserId::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for UserId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{}", canonical_number(n)),
            UserId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for UserId {
    fn from(n: i64) -> Self {
        UserId::Number(n.into())
    }
}

impl From<i32> for UserId {
    fn from(n: i32) -> Self {
        UserId::Number(n.into())
    }
}

impl From<u64> for UserId {
    fn from(n: u64) -> Self {
        UserId::Number(n.into())
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId::Text(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        UserId::Text(s)
    }
}

/// A user as returned by the remote service.
///
/// Only `id` is interpreted. Every other field is carried through untouched,
/// so a record serializes back to the same JSON object it was parsed from.
/// The typed `id` is authoritative: an `"id"` entry in `fields` is never
/// written out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Serialize for UserRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        for (name, value) in self.fields.iter().filter(|(name, _)| name.as_str() != "id") {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl UserRecord {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter. Setting `"id"` replaces the record's id
    /// when the value is a number or string, and is ignored otherwise.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == "id" {
            if let Some(id) = UserId::from_value(&value) {
                self.id = id;
            }
        } else {
            self.fields.insert(name, value);
        }
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Convenience accessor for the common `name` field
    pub fn name(&self) -> Option<&str> {
        self.field("name").and_then(Value::as_str)
    }
}
