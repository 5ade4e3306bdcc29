//! Request and notification parameters with `_meta` extraction.

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::{Meta, META_KEY};

/// Parameters of a request or notification.
///
/// The reserved `_meta` key is lifted into [`Params::meta`]; every other key
/// stays in [`Params::fields`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    pub meta: Option<Meta>,
    pub fields: Map<String, Value>,
}

impl Params {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { meta: None, fields }
    }

    /// Split a raw params object into metadata and fields.
    ///
    /// A `_meta` value that is not an object is treated as absent metadata.
    pub fn from_object(mut object: Map<String, Value>) -> Self {
        let meta = match object.remove(META_KEY) {
            Some(Value::Object(meta)) => Some(meta),
            Some(other) => {
                tracing::debug!("Ignoring non-object {META_KEY}: {other}");
                None
            }
            None => None,
        };
        Self {
            meta,
            fields: object,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Deserialize the dynamic fields into a typed parameter struct.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }

    /// Reassemble the wire object, re-inserting `_meta` when present.
    pub fn into_value(self) -> Value {
        let mut object = self.fields;
        if let Some(meta) = self.meta {
            object.insert(META_KEY.to_string(), Value::Object(meta));
        }
        Value::Object(object)
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(meta) = &self.meta {
            map.serialize_entry(META_KEY, meta)?;
        }
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_meta_is_extracted() {
        let params = Params::from_object(object(json!({"_meta": {"a": 1}, "b": 2})));
        assert_eq!(params.meta, Some(object(json!({"a": 1}))));
        assert_eq!(params.fields, object(json!({"b": 2})));
    }

    #[test]
    fn test_without_meta() {
        let params = Params::from_object(object(json!({"name": "x"})));
        assert!(params.meta.is_none());
        assert_eq!(params.get("name"), Some(&json!("x")));
    }

    #[test]
    fn test_into_value_restores_meta() {
        let params = Params::from_object(object(json!({"_meta": {"k": true}, "b": 2})));
        assert_eq!(params.into_value(), json!({"_meta": {"k": true}, "b": 2}));
    }

    #[test]
    fn test_parse_typed() {
        #[derive(serde::Deserialize)]
        struct Call {
            name: String,
        }
        let params = Params::from_object(object(json!({"_meta": {}, "name": "echo"})));
        let call: Call = params.parse().unwrap();
        assert_eq!(call.name, "echo");
    }
}
