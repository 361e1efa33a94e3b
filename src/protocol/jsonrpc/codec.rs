// Copyright (c) 2025 MCP Link Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! Encoding and decoding of JSON-RPC 2.0 frames.
//!
//! Outbound frames are built from [`ClientMessage`] values. Inbound frames are
//! validated field by field before they are turned into an [`InboundMessage`]:
//! - the payload must be a JSON object (or, for [`decode_frame`], an array of objects)
//! - `jsonrpc` must be present and equal to "2.0"
//! - `id`, if present, must be a string, an integer or null
//! - `params`, if present, must be an object, an array or null
//! - a message without `method` must carry exactly one of `result` and `error`

use serde::Serialize;
use serde_json::{Map, Value};

use super::error::JsonRpcError;
use super::methods::{ClientMethod, ServerNotificationMethod};
use super::types::{
    ClientMessage, Id, InboundMessage, Params, Request, Response, ServerNotification,
    JSONRPC_VERSION,
};
use crate::error::{McpError, McpResult, ProtocolError};

/// Converts caller supplied parameters into a JSON object.
///
/// Unit and `null` encode as absent params. Anything that is not a JSON object
/// after serialization is rejected.
pub fn params_to_object<P: Serialize + ?Sized>(params: &P) -> McpResult<Option<Params>> {
    let value = serde_json::to_value(params)
        .map_err(|e| McpError::Encoding(format!("params are not serializable: {}", e)))?;

    match value {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => Err(McpError::Encoding(format!(
            "params must serialize to a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

/// Encodes a request frame for `method` with correlation id `id`.
pub fn encode_request<P: Serialize + ?Sized>(
    method: ClientMethod,
    params: &P,
    id: i64,
) -> McpResult<Vec<u8>> {
    if method.is_notification() {
        return Err(ProtocolError::InvalidMethod(format!(
            "{} must be sent as a notification",
            method
        ))
        .into());
    }

    encode_message(&ClientMessage::Request {
        id,
        method,
        params: params_to_object(params)?,
    })
}

/// Encodes a notification frame. The frame never carries an `id`.
pub fn encode_notification<P: Serialize + ?Sized>(
    method: ClientMethod,
    params: &P,
) -> McpResult<Vec<u8>> {
    if !method.is_notification() {
        return Err(ProtocolError::InvalidMethod(format!(
            "{} must be sent as a request",
            method
        ))
        .into());
    }

    encode_message(&ClientMessage::Notification {
        method,
        params: params_to_object(params)?,
    })
}

/// Encodes an already built client message.
pub fn encode_message(message: &ClientMessage) -> McpResult<Vec<u8>> {
    serde_json::to_vec(&message.to_wire()).map_err(|e| McpError::Encoding(e.to_string()))
}

/// Encodes a response the client sends back for a server-initiated request.
pub fn encode_response(response: &Response) -> McpResult<Vec<u8>> {
    serde_json::to_vec(response).map_err(|e| McpError::Encoding(e.to_string()))
}

/// Decodes a single inbound JSON-RPC message.
///
/// A JSON array is rejected here; use [`decode_frame`] for frames that may be batches.
pub fn decode(bytes: &[u8]) -> Result<InboundMessage, ProtocolError> {
    let value = parse_json(bytes)?;
    decode_value(value)
}

/// Decodes a frame that is either one message or a batch of messages.
///
/// Each element of a batch is validated on its own, so one bad element does not
/// hide the others. Only structural problems with the frame itself (bad JSON,
/// empty batch) fail the whole frame.
pub fn decode_frame(bytes: &[u8]) -> Result<Vec<Result<InboundMessage, ProtocolError>>, ProtocolError> {
    match parse_json(bytes)? {
        Value::Array(elements) => {
            if elements.is_empty() {
                return Err(ProtocolError::InvalidMessage(
                    "empty batch frames are invalid".to_string(),
                ));
            }
            Ok(elements.into_iter().map(decode_value).collect())
        }
        single => Ok(vec![decode_value(single)]),
    }
}

/// Decodes one already parsed JSON value.
pub fn decode_value(value: Value) -> Result<InboundMessage, ProtocolError> {
    let mut object = into_object(value)?;
    check_version(&object)?;

    let id = match object.remove("id") {
        Some(raw) => Some(parse_id(raw)?),
        None => None,
    };

    match object.remove("method") {
        Some(method) => {
            let method = parse_method_name(method)?;
            let params = parse_params(object.remove("params"))?;

            match id {
                Some(id) => Ok(InboundMessage::Request(Request::new(method, params, Some(id)))),
                None => Ok(InboundMessage::Notification(ServerNotification {
                    method: ServerNotificationMethod::from_wire(&method),
                    params,
                })),
            }
        }
        None => decode_response(object, id),
    }
}

fn decode_response(mut object: Map<String, Value>, id: Option<Id>) -> Result<InboundMessage, ProtocolError> {
    let result = object.remove("result");
    let error = object.remove("error");

    let id = id.ok_or_else(|| ProtocolError::MissingField("id".to_string()))?;

    let response = match (result, error) {
        (Some(_), Some(_)) => {
            return Err(ProtocolError::InvalidMessage(
                "response carries both result and error".to_string(),
            ))
        }
        (None, None) => {
            return Err(ProtocolError::MissingField(
                "method, result or error".to_string(),
            ))
        }
        (Some(result), None) => Response::success(id, result),
        (None, Some(error)) => {
            let error: JsonRpcError = serde_json::from_value(error)
                .map_err(|e| ProtocolError::InvalidMessage(format!("invalid error object: {}", e)))?;
            Response::error(id, error)
        }
    };

    Ok(InboundMessage::Response(response))
}

impl ClientMessage {
    /// Decodes an outbound-shaped message, as written by this client.
    ///
    /// Fails with [`ProtocolError::InvalidMethod`] when the method is not a
    /// [`ClientMethod`].
    pub fn decode(bytes: &[u8]) -> Result<ClientMessage, ProtocolError> {
        let mut object = into_object(parse_json(bytes)?)?;
        check_version(&object)?;

        let method = object
            .remove("method")
            .ok_or_else(|| ProtocolError::MissingField("method".to_string()))?;
        let method: ClientMethod = parse_method_name(method)?.parse()?;

        let params = match parse_params(object.remove("params"))? {
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(ProtocolError::InvalidParams(
                    "client params must be an object".to_string(),
                ))
            }
            None => None,
        };

        match object.remove("id") {
            Some(raw) => match parse_id(raw)? {
                Id::Number(id) => Ok(ClientMessage::Request { id, method, params }),
                other => Err(ProtocolError::InvalidMessage(format!(
                    "client request ids are integers, got {}",
                    other
                ))),
            },
            None => Ok(ClientMessage::Notification { method, params }),
        }
    }
}

fn parse_json(bytes: &[u8]) -> Result<Value, ProtocolError> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::MalformedJson(e.to_string()))
}

fn into_object(value: Value) -> Result<Map<String, Value>, ProtocolError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ProtocolError::InvalidMessage(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn check_version(object: &Map<String, Value>) -> Result<(), ProtocolError> {
    match object.get("jsonrpc") {
        None => Err(ProtocolError::MissingField("jsonrpc".to_string())),
        Some(Value::String(version)) if version == JSONRPC_VERSION => Ok(()),
        Some(other) => Err(ProtocolError::UnsupportedVersion(other.to_string())),
    }
}

fn parse_id(raw: Value) -> Result<Id, ProtocolError> {
    match raw {
        Value::Null => Ok(Id::Null),
        Value::String(s) => Ok(Id::String(s)),
        Value::Number(n) => n
            .as_i64()
            .map(Id::Number)
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("id must be an integer, got {}", n))),
        other => Err(ProtocolError::InvalidMessage(format!(
            "id must be a string, an integer or null, got {}",
            json_type_name(&other)
        ))),
    }
}

fn parse_method_name(raw: Value) -> Result<String, ProtocolError> {
    match raw {
        Value::String(method) if !method.is_empty() => Ok(method),
        Value::String(_) => Err(ProtocolError::InvalidMessage("method cannot be empty".to_string())),
        other => Err(ProtocolError::InvalidMessage(format!(
            "method must be a string, got {}",
            json_type_name(&other)
        ))),
    }
}

fn parse_params(raw: Option<Value>) -> Result<Option<Value>, ProtocolError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(params @ Value::Object(_)) | Some(params @ Value::Array(_)) => Ok(Some(params)),
        Some(other) => Err(ProtocolError::InvalidParams(format!(
            "params must be an object, array, or null, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_encode_request_shape() {
        let bytes = encode_request(ClientMethod::ToolsCall, &json!({"name": "echo"}), 7).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {"name": "echo"}})
        );
    }

    #[test]
    fn test_encode_request_without_params_omits_field() {
        let bytes = encode_request(ClientMethod::Ping, &(), 1).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
    }

    #[test]
    fn test_encode_notification_never_has_id() {
        let bytes = encode_notification(ClientMethod::NotificationInitialized, &()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["method"], "notifications/initialized");
    }

    #[test]
    fn test_encode_rejects_non_object_params() {
        let err = encode_request(ClientMethod::ToolsCall, &json!([1, 2]), 1).unwrap_err();
        assert!(matches!(err, McpError::Encoding(_)));

        let err = encode_notification(ClientMethod::NotificationCancelled, &"text").unwrap_err();
        assert!(matches!(err, McpError::Encoding(_)));
    }

    #[test]
    fn test_encode_rejects_unserializable_params() {
        // JSON object keys must be strings
        let mut params = HashMap::new();
        params.insert(vec![1u8, 2], 3);
        let err = encode_request(ClientMethod::ToolsCall, &params, 1).unwrap_err();
        assert!(matches!(err, McpError::Encoding(_)));
    }

    #[test]
    fn test_encode_rejects_wrong_shape() {
        assert!(matches!(
            encode_request(ClientMethod::NotificationCancelled, &(), 1),
            Err(McpError::Protocol(ProtocolError::InvalidMethod(_)))
        ));
        assert!(matches!(
            encode_notification(ClientMethod::Ping, &()),
            Err(McpError::Protocol(ProtocolError::InvalidMethod(_)))
        ));
    }

    #[test]
    fn test_decode_success_response() {
        let message = decode(br#"{"jsonrpc":"2.0","id":1,"result":{}}"#).unwrap();
        match message {
            InboundMessage::Response(response) => {
                assert_eq!(response.id, Id::Number(1));
                assert_eq!(response.into_outcome().unwrap(), json!({}));
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_null_result_is_success() {
        let message = decode(br#"{"jsonrpc":"2.0","id":4,"result":null}"#).unwrap();
        match message {
            InboundMessage::Response(response) => {
                assert_eq!(response.into_outcome().unwrap(), Value::Null);
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_response() {
        let frame = br#"{"jsonrpc":"2.0","id":"2","error":{"code":-32602,"message":"bad","data":[1]}}"#;
        match decode(frame).unwrap() {
            InboundMessage::Response(response) => {
                assert_eq!(response.id.as_number(), Some(2));
                let error = response.into_outcome().unwrap_err();
                assert_eq!(error.code, -32602);
                assert_eq!(error.data, Some(json!([1])));
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_server_request_and_notification() {
        match decode(br#"{"jsonrpc":"2.0","id":"srv-1","method":"ping"}"#).unwrap() {
            InboundMessage::Request(request) => {
                assert_eq!(request.id, Some(Id::String("srv-1".to_string())));
                assert_eq!(request.method, "ping");
            }
            other => panic!("Expected request, got {:?}", other),
        }

        let frame = br#"{"jsonrpc":"2.0","method":"notifications/resources/updated","params":{"uri":"x"}}"#;
        match decode(frame).unwrap() {
            InboundMessage::Notification(notification) => {
                assert_eq!(
                    notification.method,
                    ServerNotificationMethod::Other("notifications/resources/updated".to_string())
                );
                assert_eq!(notification.params, Some(json!({"uri": "x"})));
            }
            other => panic!("Expected notification, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejections() {
        assert!(matches!(decode(b"{not json"), Err(ProtocolError::MalformedJson(_))));
        assert!(matches!(decode(b"42"), Err(ProtocolError::InvalidMessage(_))));
        assert!(matches!(
            decode(br#"{"id":1,"result":{}}"#),
            Err(ProtocolError::MissingField(_))
        ));
        assert!(matches!(
            decode(br#"{"jsonrpc":"1.0","id":1,"result":{}}"#),
            Err(ProtocolError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            decode(br#"{"jsonrpc":"2.0","id":1}"#),
            Err(ProtocolError::MissingField(_))
        ));
        assert!(matches!(
            decode(br#"{"jsonrpc":"2.0","id":1,"result":1,"error":{"code":1,"message":"x"}}"#),
            Err(ProtocolError::InvalidMessage(_))
        ));
        assert!(matches!(
            decode(br#"{"jsonrpc":"2.0","method":"x","params":5}"#),
            Err(ProtocolError::InvalidParams(_))
        ));
        assert!(matches!(
            decode(br#"{"jsonrpc":"2.0","id":1.5,"result":{}}"#),
            Err(ProtocolError::InvalidMessage(_))
        ));
        assert!(matches!(
            decode(br#"{"jsonrpc":"2.0","id":true,"result":{}}"#),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_decode_frame_batch() {
        let frame = br#"[
            {"jsonrpc":"2.0","id":1,"result":{}},
            {"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info","data":"x"}},
            {"jsonrpc":"1.0","id":3,"result":{}}
        ]"#;
        let messages = decode_frame(frame).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], Ok(InboundMessage::Response(_))));
        assert!(matches!(messages[1], Ok(InboundMessage::Notification(_))));
        assert!(matches!(messages[2], Err(ProtocolError::UnsupportedVersion(_))));

        assert!(matches!(decode_frame(b"[]"), Err(ProtocolError::InvalidMessage(_))));
        assert_eq!(decode_frame(br#"{"jsonrpc":"2.0","id":1,"result":2}"#).unwrap().len(), 1);
    }

    #[test]
    fn test_client_message_decode() {
        let bytes = encode_request(ClientMethod::ToolsList, &json!({"cursor": "c"}), 9).unwrap();
        let message = ClientMessage::decode(&bytes).unwrap();
        assert_eq!(message.id(), Some(9));
        assert_eq!(message.method(), ClientMethod::ToolsList);
        assert_eq!(message.params().unwrap()["cursor"], "c");

        let unknown = br#"{"jsonrpc":"2.0","id":1,"method":"sampling/createMessage"}"#;
        assert!(matches!(
            ClientMessage::decode(unknown),
            Err(ProtocolError::InvalidMethod(_))
        ));
    }
}
