//! Message classifier: decoded JSON payload -> typed [`JsonRpcMessage`].
//!
//! The shape of a JSON-RPC message is decided by which of `method`, `id`,
//! `result` and `error` are present. The checks below run in a fixed order
//! because those predicates overlap: an `error` member always wins, so a
//! payload carrying both `error` and `method` is an error message.
//!
//! `_meta` is handled asymmetrically. In request and notification `params`
//! it is lifted into [`Params::meta`]; in a response `result` it is dropped.

use serde_json::{Map, Value};

use crate::params::Params;
use crate::types::{
    ErrorObject, JsonRpcMessage, ProtocolError, ProtocolResult, RequestId, JSONRPC_VERSION,
    META_KEY,
};

/// Failure while building a message from a payload whose shape was already
/// recognised. Surfaces to callers as [`ProtocolError::ParseError`].
#[derive(Debug)]
struct BuildError(String);

impl From<BuildError> for ProtocolError {
    fn from(e: BuildError) -> Self {
        ProtocolError::ParseError(e.0)
    }
}

enum Built {
    Message(JsonRpcMessage),
    Protocol(ProtocolError),
    Failed(BuildError),
}

/// Classify a decoded JSON object into one of the four message kinds.
pub fn classify(payload: &Map<String, Value>) -> ProtocolResult<JsonRpcMessage> {
    if payload.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(ProtocolError::InvalidRequest(
            "jsonrpc version must be 2.0".to_string(),
        ));
    }

    let has_method = payload.contains_key("method");
    let has_id = payload.contains_key("id");
    let has_result = payload.contains_key("result");
    let has_error = payload.contains_key("error");

    let built = if has_error {
        build_error(payload)
    } else if has_method && has_id && !has_result {
        build_request(payload)
    } else if has_method && !has_id && !has_result && !has_error {
        build_notification(payload)
    } else if has_id && has_result && !has_method && !has_error {
        build_response(payload)
    } else {
        return Err(ProtocolError::InvalidRequest(
            "could not determine message type".to_string(),
        ));
    };

    match built {
        Built::Message(msg) => Ok(msg),
        Built::Protocol(e) => Err(e),
        Built::Failed(e) => Err(e.into()),
    }
}

/// Classify any JSON value. Only objects can be messages.
pub fn classify_value(value: &Value) -> ProtocolResult<JsonRpcMessage> {
    match value {
        Value::Object(payload) => classify(payload),
        // Batches included.
        _ => Err(ProtocolError::InvalidRequest(
            "message must be a JSON object".to_string(),
        )),
    }
}

/// Best-effort id lookup on a raw payload, for addressing error replies.
pub fn recover_id(value: &Value) -> Option<RequestId> {
    value.get("id").and_then(RequestId::from_value)
}

fn build_error(payload: &Map<String, Value>) -> Built {
    let id = match payload.get("id") {
        None | Some(Value::Null) => RequestId::empty(),
        Some(raw) => match RequestId::from_value(raw) {
            Some(id) => id,
            None => return Built::Failed(BuildError(format!("invalid id: {raw}"))),
        },
    };

    let Some(error) = payload.get("error").and_then(Value::as_object) else {
        return Built::Protocol(ProtocolError::InvalidRequest(
            "error must be an object".to_string(),
        ));
    };

    let Some(code) = error.get("code").and_then(Value::as_i64) else {
        return Built::Protocol(ProtocolError::InvalidRequest(
            "error object requires an integer code".to_string(),
        ));
    };
    let Some(message) = error.get("message").and_then(Value::as_str) else {
        return Built::Protocol(ProtocolError::InvalidRequest(
            "error object requires a string message".to_string(),
        ));
    };
    let Ok(code) = i32::try_from(code) else {
        return Built::Failed(BuildError(format!("error code out of range: {code}")));
    };

    Built::Message(JsonRpcMessage::Error {
        id,
        error: ErrorObject {
            code,
            message: message.to_string(),
            data: error.get("data").cloned(),
        },
    })
}

fn build_request(payload: &Map<String, Value>) -> Built {
    let raw_id = payload.get("id").unwrap_or(&Value::Null);
    let Some(id) = RequestId::from_value(raw_id) else {
        return Built::Failed(BuildError(format!(
            "request id must be a string or integer, got {raw_id}"
        )));
    };
    match method_and_params(payload) {
        Ok((method, params)) => Built::Message(JsonRpcMessage::Request { id, method, params }),
        Err(e) => Built::Failed(e),
    }
}

fn build_notification(payload: &Map<String, Value>) -> Built {
    match method_and_params(payload) {
        Ok((method, params)) => Built::Message(JsonRpcMessage::Notification { method, params }),
        Err(e) => Built::Failed(e),
    }
}

fn build_response(payload: &Map<String, Value>) -> Built {
    let raw_id = payload.get("id").unwrap_or(&Value::Null);
    let Some(id) = RequestId::from_value(raw_id) else {
        return Built::Failed(BuildError(format!(
            "response id must be a string or integer, got {raw_id}"
        )));
    };
    let Some(raw_result) = payload.get("result").and_then(Value::as_object) else {
        return Built::Failed(BuildError("result must be an object".to_string()));
    };

    let result = raw_result
        .iter()
        .filter(|(key, _)| key.as_str() != META_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Built::Message(JsonRpcMessage::Response { id, result })
}

fn method_and_params(
    payload: &Map<String, Value>,
) -> Result<(String, Option<Params>), BuildError> {
    let method = match payload.get("method") {
        Some(Value::String(m)) => m.clone(),
        other => {
            return Err(BuildError(format!(
                "method must be a string, got {}",
                other.unwrap_or(&Value::Null)
            )))
        }
    };

    let params = match payload.get("params") {
        None => None,
        Some(Value::Object(object)) => Some(Params::from_object(object.clone())),
        Some(other) => {
            return Err(BuildError(format!("params must be an object, got {other}")));
        }
    };

    Ok((method, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(value: Value) -> ProtocolResult<JsonRpcMessage> {
        classify_value(&value)
    }

    #[test]
    fn test_request_without_params() {
        let msg = run(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).unwrap();
        assert_eq!(
            msg,
            JsonRpcMessage::Request {
                id: RequestId::Number(1),
                method: "tools/list".to_string(),
                params: None,
            }
        );
    }

    #[test]
    fn test_error_takes_precedence_over_method() {
        let msg = run(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "x",
            "error": {"code": -1, "message": "boom"}
        }))
        .unwrap();
        match msg {
            JsonRpcMessage::Error { id, error } => {
                assert_eq!(id, RequestId::Number(2));
                assert_eq!(error.code, -1);
                assert_eq!(error.message, "boom");
                assert!(error.data.is_none());
            }
            other => panic!("expected error message, got {other:?}"),
        }
    }

    #[test]
    fn test_bare_envelope_is_rejected() {
        let err = run(json!({"jsonrpc": "2.0"})).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidRequest("could not determine message type".to_string())
        );
    }

    #[test]
    fn test_wrong_version_is_rejected_first() {
        let err = run(json!({"jsonrpc": "1.0", "id": 1, "method": "x"})).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidRequest("jsonrpc version must be 2.0".to_string())
        );

        let missing = run(json!({"id": 1, "method": "x"})).unwrap_err();
        assert_eq!(missing.code(), -32600);
    }

    #[test]
    fn test_response_drops_meta() {
        let msg = run(json!({"jsonrpc": "2.0", "id": 3, "result": {"_meta": {"a": 1}, "b": 2}}))
            .unwrap();
        match msg {
            JsonRpcMessage::Response { id, result } => {
                assert_eq!(id, RequestId::Number(3));
                assert_eq!(Value::Object(result), json!({"b": 2}));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_request_keeps_meta() {
        let msg = run(json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "x",
            "params": {"_meta": {"a": 1}, "b": 2}
        }))
        .unwrap();
        let JsonRpcMessage::Request { params: Some(params), .. } = msg else {
            panic!("expected request with params");
        };
        assert_eq!(params.meta.map(Value::Object), Some(json!({"a": 1})));
        assert_eq!(Value::Object(params.fields), json!({"b": 2}));
    }

    #[test]
    fn test_notification() {
        let msg = run(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(msg.is_notification());
        assert_eq!(msg.method(), Some("notifications/initialized"));
        assert!(msg.id().is_none());
    }

    #[test]
    fn test_error_without_id_defaults_to_empty_string() {
        let msg = run(json!({"jsonrpc": "2.0", "error": {"code": -32000, "message": "m", "data": [1]}}))
            .unwrap();
        match msg {
            JsonRpcMessage::Error { id, error } => {
                assert_eq!(id, RequestId::String(String::new()));
                assert_eq!(error.data, Some(json!([1])));
            }
            other => panic!("expected error message, got {other:?}"),
        }

        let null_id = run(json!({"jsonrpc": "2.0", "id": null, "error": {"code": 1, "message": "m"}}))
            .unwrap();
        assert_eq!(null_id.id(), Some(&RequestId::empty()));
    }

    #[test]
    fn test_malformed_error_object_is_invalid_request() {
        let no_code = run(json!({"jsonrpc": "2.0", "id": 1, "error": {"message": "m"}})).unwrap_err();
        assert_eq!(no_code.code(), -32600);

        let no_message = run(json!({"jsonrpc": "2.0", "id": 1, "error": {"code": 1}})).unwrap_err();
        assert_eq!(no_message.code(), -32600);

        let not_object = run(json!({"jsonrpc": "2.0", "id": 1, "error": "bad"})).unwrap_err();
        assert_eq!(not_object.code(), -32600);
    }

    #[test]
    fn test_construction_failures_are_parse_errors() {
        let bad_params = run(json!({"jsonrpc": "2.0", "id": 1, "method": "x", "params": [1, 2]}))
            .unwrap_err();
        assert!(matches!(bad_params, ProtocolError::ParseError(ref m) if m.contains("params")));

        let bad_id = run(json!({"jsonrpc": "2.0", "id": {"x": 1}, "method": "x"})).unwrap_err();
        assert_eq!(bad_id.code(), -32700);

        let bad_method = run(json!({"jsonrpc": "2.0", "id": 1, "method": 5})).unwrap_err();
        assert_eq!(bad_method.code(), -32700);

        let bad_result = run(json!({"jsonrpc": "2.0", "id": 1, "result": "ok"})).unwrap_err();
        assert_eq!(bad_result.code(), -32700);
    }

    #[test]
    fn test_ambiguous_shapes() {
        // method + result: neither request nor response
        let err = run(json!({"jsonrpc": "2.0", "id": 1, "method": "x", "result": {}})).unwrap_err();
        assert_eq!(err.code(), -32600);

        // result without id
        let err = run(json!({"jsonrpc": "2.0", "result": {}})).unwrap_err();
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn test_non_object_payloads() {
        let expected = ProtocolError::InvalidRequest("message must be a JSON object".to_string());
        assert_eq!(run(json!([1, 2])).unwrap_err(), expected);
        assert_eq!(run(json!("hi")).unwrap_err(), expected);
    }

    #[test]
    fn test_recover_id() {
        assert_eq!(recover_id(&json!({"id": "a"})), Some(RequestId::from("a")));
        assert_eq!(recover_id(&json!({"id": [1]})), None);
        assert_eq!(recover_id(&json!(5)), None);
    }
}
