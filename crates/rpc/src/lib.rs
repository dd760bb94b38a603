//! JSON-RPC framing for keyhole sessions.
//!
//! This crate provides the wire layer underneath a session:
//! * [`Protocol`]: trait binding a session loop to a concrete wire format
//! * [`JsonRpcProtocol`]: `Content-Length` framed JSON-RPC 2.0
//! * [`Frame`]: an outbound message split across buffer segments
//! * [`message`]: inbound/outbound JSON-RPC shapes

#![warn(missing_docs)]

pub mod error;
pub mod frame;
pub mod message;
pub mod protocol;

pub use error::{Error, Result};
pub use frame::Frame;
pub use message::{ErrorCode, InboundMessage, Notification, RequestId, Response, ResponseError};
pub use protocol::{JsonRpcProtocol, Protocol};
