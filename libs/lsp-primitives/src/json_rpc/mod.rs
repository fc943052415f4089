pub mod error;

use rand::rngs::OsRng;
use rand::RngCore;

use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lsps0::parameter_validation;
pub use crate::no_params::NoParams;
pub use error::{DefaultError, ErrorData};

pub const JSON_RPC_VERSION: &str = "2.0";

/// The id of a json-rpc request.
///
/// LSPS0 requires ids to be strings. The codec treats them as opaque
/// and never generates one by itself, see [`generate_random_rpc_id`].
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct JsonRpcId(String);

impl JsonRpcId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id used when replying to a request that couldn't be parsed
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq<serde_json::Value> for JsonRpcId {
    fn eq(&self, value: &serde_json::Value) -> bool {
        value == self.0.as_str()
    }
}

impl PartialEq<&str> for JsonRpcId {
    fn eq(&self, value: &&str) -> bool {
        self.0 == *value
    }
}

impl From<&str> for JsonRpcId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JsonRpcId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for JsonRpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a random json_rpc_id string that follows the requirements of LSPS0
///
/// - Should be a String
/// - Should be generated using at least 80 bits of randomness
///
/// The bytes are drawn from the OS random number generator. A failing
/// generator is reported to the caller instead of producing a weak id.
pub fn generate_random_rpc_id() -> Result<JsonRpcId, rand::Error> {
    let mut seed = [0u8; 10];
    OsRng.try_fill_bytes(&mut seed)?;
    let str_id = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(seed);
    Ok(JsonRpcId(str_id))
}

/// Defines a json-rpc method and describes the schema
/// of the input I, output O and error-type E.
///
/// The error-type can be serialized and deserialized
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcMethod<'a, I, O, E> {
    pub method: &'a str,
    #[serde(skip_serializing)]
    request: std::marker::PhantomData<I>,
    #[serde(skip_serializing)]
    return_type: std::marker::PhantomData<O>,
    #[serde(skip_serializing)]
    error_type: std::marker::PhantomData<E>,
}

// Derived impls would require I, O and E to be Copy
impl<I, O, E> Clone for JsonRpcMethod<'_, I, O, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, O, E> Copy for JsonRpcMethod<'_, I, O, E> {}

impl<'a, I, O, E> JsonRpcMethod<'a, I, O, E> {
    pub const fn new(method: &'a str) -> Self {
        Self {
            method,
            request: std::marker::PhantomData,
            return_type: std::marker::PhantomData,
            error_type: std::marker::PhantomData,
        }
    }

    pub const fn name(&self) -> &'a str {
        self.method
    }

    /// Creates a JsonRpcRequest with parameters for the given method
    pub fn create_request(&self, params: I, json_rpc_id: JsonRpcId) -> JsonRpcRequest<I> {
        JsonRpcRequest::<I> {
            jsonrpc: String::from(JSON_RPC_VERSION),
            id: json_rpc_id,
            method: self.method.into(),
            params,
        }
    }

    pub fn create_ok_response<P>(&self, request: &JsonRpcRequest<P>, result: O) -> JsonRpcResponse<O, E> {
        JsonRpcResponse::success(request.id.clone(), result)
    }

    /// Interprets the params of an untyped request.
    ///
    /// Unknown fields are rejected and reported by name.
    pub fn into_typed_request(
        &self,
        request: JsonRpcRequest<serde_json::Value>,
    ) -> Result<JsonRpcRequest<I>, ErrorData>
    where
        I: DeserializeOwned + parameter_validation::ExpectedFields,
    {
        let params: I = parameter_validation::from_value(request.params)?;

        Ok(JsonRpcRequest::<I> {
            id: request.id,
            jsonrpc: request.jsonrpc,
            method: request.method,
            params,
        })
    }
}

impl<O, E> JsonRpcMethod<'_, NoParams, O, E> {
    pub fn create_request_no_params(&self, json_rpc_id: JsonRpcId) -> JsonRpcRequest<NoParams> {
        self.create_request(NoParams, json_rpc_id)
    }
}

impl<'a, I, O, E> std::convert::From<&'a JsonRpcMethod<'a, I, O, E>> for String {
    fn from(value: &JsonRpcMethod<I, O, E>) -> Self {
        value.method.into()
    }
}

impl<I, O, E> JsonRpcMethod<'_, I, O, E>
where
    O: DeserializeOwned,
    E: DeserializeOwned,
{
    pub fn parse_json_response_str(
        &self,
        json_str: &str,
    ) -> Result<JsonRpcResponse<O, E>, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    pub fn parse_json_response_value(
        &self,
        json_value: serde_json::Value,
    ) -> Result<JsonRpcResponse<O, E>, serde_json::Error> {
        serde_json::from_value(json_value)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(bound(deserialize = "I: Deserialize<'de> + Default"))]
pub struct JsonRpcRequest<I> {
    pub jsonrpc: String,
    pub id: JsonRpcId,
    pub method: String,
    #[serde(default, skip_serializing_if = "params_are_absent")]
    pub params: I,
}

/// A request without params decodes to `null` and encodes without the field
fn params_are_absent<I: Serialize>(params: &I) -> bool {
    matches!(serde_json::to_value(params), Ok(Value::Null))
}

impl JsonRpcRequest<serde_json::Value> {
    pub fn deserialize<I>(self) -> Result<JsonRpcRequest<I>, serde_json::Error>
    where
        I: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: self.jsonrpc,
            id: self.id,
            method: self.method,
            params: serde_json::from_value(self.params)?,
        };
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponseSuccess<O> {
    pub id: JsonRpcId,
    pub result: O,
    pub jsonrpc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponseFailure<E> {
    pub id: JsonRpcId,
    pub error: ErrorData<E>,
    pub jsonrpc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponse<O, E> {
    Error(JsonRpcResponseFailure<E>),
    Ok(JsonRpcResponseSuccess<O>),
}

impl<O, E> JsonRpcResponse<O, E> {
    pub fn success(id: JsonRpcId, output: O) -> Self {
        JsonRpcResponse::Ok(JsonRpcResponseSuccess {
            id,
            result: output,
            jsonrpc: String::from(JSON_RPC_VERSION),
        })
    }

    pub fn error(id: JsonRpcId, error: ErrorData<E>) -> Self {
        JsonRpcResponse::Error(JsonRpcResponseFailure {
            id,
            error,
            jsonrpc: String::from(JSON_RPC_VERSION),
        })
    }

    pub fn jsonrpc(&self) -> &str {
        match self {
            JsonRpcResponse::Ok(j) => &j.jsonrpc,
            JsonRpcResponse::Error(j) => &j.jsonrpc,
        }
    }

    pub fn id(&self) -> &JsonRpcId {
        match self {
            JsonRpcResponse::Ok(j) => &j.id,
            JsonRpcResponse::Error(j) => &j.id,
        }
    }

    pub fn into_result(self) -> Result<O, ErrorData<E>> {
        match self {
            JsonRpcResponse::Ok(ok) => Ok(ok.result),
            JsonRpcResponse::Error(err) => Err(err.error),
        }
    }
}

/// An incoming envelope that is either a request or a response.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest<Value>),
    Response(JsonRpcResponse<Value, Value>),
}

/// Describes why an incoming envelope was rejected.
///
/// The id is recovered whenever the envelope carried a string id,
/// so a malformed response can still be matched with its request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Malformed {}{}: {}", message_kind(.is_request), quoted_id(.id), .reason)]
pub struct MalformedMessage {
    pub id: Option<JsonRpcId>,
    pub is_request: bool,
    pub reason: String,
}

impl MalformedMessage {
    fn new(id: Option<JsonRpcId>, is_request: bool, reason: impl Into<String>) -> Self {
        Self {
            id,
            is_request,
            reason: reason.into(),
        }
    }
}

fn message_kind(is_request: &bool) -> &'static str {
    if *is_request {
        "request"
    } else {
        "response"
    }
}

fn quoted_id(id: &Option<JsonRpcId>) -> String {
    match id {
        Some(id) => format!(" with id '{}'", id),
        None => String::new(),
    }
}

impl JsonRpcMessage {
    /// Decodes the payload of an LSPS message.
    ///
    /// An envelope that carries a `method` is a request. Everything else
    /// is interpreted as a response.
    pub fn from_slice(payload: &[u8]) -> Result<Self, MalformedMessage> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| MalformedMessage::new(None, true, format!("Invalid json: {}", e)))?;

        let mut map = match value {
            Value::Object(map) => map,
            _ => return Err(MalformedMessage::new(None, true, "Expected a json-object")),
        };

        let is_request = map.contains_key("method");
        let id = match map.get("id") {
            Some(Value::String(id)) => Some(JsonRpcId::new(id.as_str())),
            _ => None,
        };

        match map.get("jsonrpc") {
            Some(Value::String(v)) if v == JSON_RPC_VERSION => {}
            _ => {
                return Err(MalformedMessage::new(
                    id,
                    is_request,
                    "Field 'jsonrpc' must be \"2.0\"",
                ))
            }
        }

        if is_request {
            Self::request_from_map(map, id)
        } else {
            let id = id.ok_or_else(|| {
                MalformedMessage::new(None, false, "Field 'id' must be a string")
            })?;
            let result = map.remove("result");
            let error = map.remove("error");
            match (result, error) {
                (Some(result), None) => Ok(Self::Response(JsonRpcResponse::success(id, result))),
                (None, Some(error)) => {
                    let error: ErrorData<Value> = serde_json::from_value(error).map_err(|e| {
                        MalformedMessage::new(Some(id.clone()), false, format!("Invalid error: {}", e))
                    })?;
                    Ok(Self::Response(JsonRpcResponse::error(id, error)))
                }
                (Some(_), Some(_)) => Err(MalformedMessage::new(
                    Some(id),
                    false,
                    "Response has both 'result' and 'error'",
                )),
                (None, None) => Err(MalformedMessage::new(
                    Some(id),
                    false,
                    "Response has neither 'result' nor 'error'",
                )),
            }
        }
    }

    fn request_from_map(
        mut map: Map<String, Value>,
        id: Option<JsonRpcId>,
    ) -> Result<Self, MalformedMessage> {
        let method = match map.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            _ => {
                return Err(MalformedMessage::new(
                    id,
                    true,
                    "Field 'method' must be a non-empty string",
                ))
            }
        };

        let id = match id {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(MalformedMessage::new(
                    None,
                    true,
                    "Field 'id' must be a non-empty string",
                ))
            }
        };

        Ok(Self::Request(JsonRpcRequest {
            jsonrpc: String::from(JSON_RPC_VERSION),
            id,
            method,
            params: map.remove("params").unwrap_or(Value::Null),
        }))
    }
}
