//! Error types for the XML-RPC client.
//!
//! # Design
//! Every failure a call can hit is one variant of `XmlRpcError`, so callers
//! branch on the kind with a plain `match`. `Fault` gets a dedicated variant
//! because it is the only kind where the call reached the server and the
//! remote procedure itself said no. Transport failures carry their own enum
//! so "server unreachable" stays distinct from "server replied with garbage"
//! (`Protocol`).

use std::fmt;

use thiserror::Error;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, XmlRpcError>;

/// A fault reported by the remote procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: i32,
    pub message: String,
}

impl Fault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}: {}", self.code, self.message)
    }
}

/// Errors returned by `XmlRpcClient` and the codec functions.
#[derive(Debug, Error)]
pub enum XmlRpcError {
    /// Caller misuse: empty method name, invalid endpoint URL.
    #[error("usage error: {0}")]
    Usage(String),

    /// The argument cannot be represented in XML-RPC type-space.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// The HTTP round-trip did not complete with a 2xx response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response body is not a valid `methodResponse` document.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The returned value does not fit the caller's result type.
    #[error("decoding failed: {0}")]
    Decoding(String),

    /// The remote procedure reported a fault.
    #[error("remote {0}")]
    Fault(Fault),
}

impl XmlRpcError {
    pub fn is_fault(&self) -> bool {
        matches!(self, XmlRpcError::Fault(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, XmlRpcError::Transport(_))
    }

    /// The remote fault, if this error is one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            XmlRpcError::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    pub(crate) fn protocol(msg: impl fmt::Display) -> Self {
        XmlRpcError::Protocol(msg.to_string())
    }
}

impl From<Fault> for XmlRpcError {
    fn from(fault: Fault) -> Self {
        XmlRpcError::Fault(fault)
    }
}

impl serde::ser::Error for XmlRpcError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        XmlRpcError::Encoding(msg.to_string())
    }
}

impl serde::de::Error for XmlRpcError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        XmlRpcError::Decoding(msg.to_string())
    }
}

/// Reasons an HTTP round-trip failed before a response document arrived.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The configured timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be read.
    #[error("unreadable response body: {0}")]
    Body(String),

    /// Any other failure reported by the HTTP stack.
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_display_includes_code_and_message() {
        let err = XmlRpcError::from(Fault::new(4, "Too many parameters."));
        assert_eq!(err.to_string(), "remote fault 4: Too many parameters.");
        assert!(err.is_fault());
        assert_eq!(err.fault().map(|f| f.code), Some(4));
    }

    #[test]
    fn transport_errors_convert() {
        let err: XmlRpcError = TransportError::Timeout.into();
        assert!(err.is_transport());
        assert!(!err.is_fault());
        assert!(err.fault().is_none());
    }

    #[test]
    fn serde_custom_maps_to_codec_kinds() {
        let enc = <XmlRpcError as serde::ser::Error>::custom("bad");
        assert!(matches!(enc, XmlRpcError::Encoding(_)));
        let dec = <XmlRpcError as serde::de::Error>::custom("bad");
        assert!(matches!(dec, XmlRpcError::Decoding(_)));
    }
}
