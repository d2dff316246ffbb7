//! Blocking XML-RPC client.
//!
//! # Overview
//! `XmlRpcClient::call` encodes a native argument into XML-RPC values,
//! wraps it in a `methodCall`, POSTs it to a fixed endpoint, parses the
//! `methodResponse` and decodes the result into the caller's type. A
//! remote fault comes back as `XmlRpcError::Fault`, distinct from transport,
//! protocol and codec failures.
//!
//! # Design
//! - Native values cross into XML-RPC through serde (`ser`, `de`), with
//!   `Value` as the intermediate tree. Integers are range-checked to 32 bits.
//! - The request and response halves are usable without the network
//!   (`build_call` / `parse_call`), so the HTTP round-trip can be executed
//!   by the host; `call` runs it through a `Transport` (ureq by default).
//! - The client holds only an immutable `Endpoint` and a shared transport.
//!   No globals, no per-call shared state, no retries.
//!
//! ```no_run
//! use xmlrpc_core::XmlRpcClient;
//!
//! let client = XmlRpcClient::new("http://localhost:5001/")?;
//! let shout: String = client.call("TestServer.Upcase", "xmlrpc")?;
//! let sum: i32 = client.call("TestServer.Sum", &[2, 3])?;
//! # Ok::<(), xmlrpc_core::XmlRpcError>(())
//! ```

pub mod client;
pub mod de;
pub mod error;
pub mod http;
pub mod request;
pub mod response;
pub mod ser;
pub mod transport;
pub mod value;

mod xml;

pub use client::{ClientBuilder, Endpoint, XmlRpcClient, DEFAULT_TIMEOUT};
pub use de::from_value;
pub use error::{Fault, Result, TransportError, XmlRpcError};
pub use http::{HttpRequest, HttpResponse};
pub use request::{build_method_call, parse_method_call, MethodCall};
pub use response::{build_fault, build_response, parse_response, Response};
pub use ser::{to_params, to_value};
pub use transport::{Transport, UreqTransport};
pub use value::{Bytes, DateTime, Struct, Value};
