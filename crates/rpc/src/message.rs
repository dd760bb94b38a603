//! JSON-RPC 2.0 message shapes.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Marker for the `"jsonrpc": "2.0"` member; rejects any other version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Version;

impl Version {
	const TEXT: &'static str = "2.0";
}

impl Serialize for Version {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(Self::TEXT)
	}
}

impl<'de> Deserialize<'de> for Version {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
		if text == Self::TEXT {
			Ok(Self)
		} else {
			Err(de::Error::invalid_value(de::Unexpected::Str(&text), &Self::TEXT))
		}
	}
}

/// A request ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
	/// Numeric ID.
	Number(i64),
	/// String ID.
	String(String),
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Number(n) => write!(f, "{n}"),
			Self::String(s) => write!(f, "{s:?}"),
		}
	}
}

/// One inbound message: a notification, or a request when `id` is present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundMessage {
	#[serde(rename = "jsonrpc")]
	_version: Version,
	/// Method name: a dynamic key with a dispatch suffix, or a dotted method path.
	pub method: String,
	/// Positional parameters.
	#[serde(default)]
	pub params: Vec<JsonValue>,
	/// Present when the peer expects a response.
	#[serde(default)]
	pub id: Option<RequestId>,
}

impl InboundMessage {
	/// Builds an inbound message directly, mostly for tests and loopback use.
	pub fn new(method: impl Into<String>, params: Vec<JsonValue>, id: Option<RequestId>) -> Self {
		Self {
			_version: Version,
			method: method.into(),
			params,
			id,
		}
	}

	/// Parses one frame body.
	pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
		serde_json::from_slice(body)
	}
}

/// An outbound notification with positional parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification<'a, P> {
	jsonrpc: Version,
	/// Namespaced method name.
	pub method: &'a str,
	/// Positional parameters.
	pub params: P,
}

impl<'a, P: Serialize> Notification<'a, P> {
	/// Creates a notification.
	pub fn new(method: &'a str, params: P) -> Self {
		Self {
			jsonrpc: Version,
			method,
			params,
		}
	}
}

/// A response to an inbound request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
	jsonrpc: Version,
	/// Result on success. `Some(Null)` serializes as an explicit `null`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<JsonValue>,
	/// Error on failure.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ResponseError>,
	/// The request ID this answers.
	pub id: RequestId,
}

impl Response {
	/// Successful response.
	pub fn ok(id: RequestId, result: JsonValue) -> Self {
		Self {
			jsonrpc: Version,
			result: Some(result),
			error: None,
			id,
		}
	}

	/// Error response.
	pub fn err(id: RequestId, error: ResponseError) -> Self {
		Self {
			jsonrpc: Version,
			result: None,
			error: Some(error),
			id,
		}
	}
}

/// A JSON-RPC error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
	/// Invalid JSON was received.
	pub const PARSE_ERROR: Self = Self(-32700);
	/// The JSON sent is not a valid request object.
	pub const INVALID_REQUEST: Self = Self(-32600);
	/// The method does not exist or is not available.
	pub const METHOD_NOT_FOUND: Self = Self(-32601);
	/// Invalid method parameters.
	pub const INVALID_PARAMS: Self = Self(-32602);
	/// Internal error while handling the request.
	pub const INTERNAL_ERROR: Self = Self(-32603);
}

/// Error member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} ({code:?})")]
pub struct ResponseError {
	/// Error code.
	pub code: ErrorCode,
	/// Short description.
	pub message: String,
	/// Optional structured detail.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<JsonValue>,
}

impl ResponseError {
	/// Creates an error without detail data.
	pub fn new(code: ErrorCode, message: impl fmt::Display) -> Self {
		Self {
			code,
			message: message.to_string(),
			data: None,
		}
	}
}
