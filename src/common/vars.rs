//! JSON object used for instance variables, node configuration and outputs.

use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// An ordered string-keyed map of JSON values.
///
/// Later writes to the same key overwrite earlier ones; keys are never
/// removed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(
        mut self,
        key: &str,
        value: impl Serialize,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key` to the JSON form of `value`.
    pub fn set(
        &mut self,
        key: &str,
        value: impl Serialize,
    ) {
        let value = serde_json::to_value(value).unwrap_or_default();
        self.inner.insert(key.to_string(), value);
    }

    /// Get `key` deserialized as `T`.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<T> {
        self.inner.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Resolve a dotted path such as `order.customer.name`.
    ///
    /// A key that literally contains dots wins over the nested lookup.
    pub fn get_path(
        &self,
        path: &str,
    ) -> Option<&Value> {
        if let Some(v) = self.inner.get(path) {
            return Some(v);
        }
        let mut parts = path.split('.');
        let mut current = self.inner.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(obj) => obj.get(part)?,
                Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Merge `other` into `self`; keys from `other` win.
    pub fn merge(
        &mut self,
        other: &Vars,
    ) {
        for (k, v) in other.inner.iter() {
            self.inner.insert(k.clone(), v.clone());
        }
    }

    /// Returns a new map with `other` merged over `self`.
    pub fn merged(
        &self,
        other: &Vars,
    ) -> Vars {
        let mut out = self.clone();
        out.merge(other);
        out
    }
}

impl Deref for Vars {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Vars {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl From<Value> for Vars {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(inner) => Self {
                inner,
            },
            _ => Self::default(),
        }
    }
}

impl From<Map<String, Value>> for Vars {
    fn from(inner: Map<String, Value>) -> Self {
        Self {
            inner,
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}

impl FromIterator<(String, Value)> for Vars {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
