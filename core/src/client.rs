//! The call dispatcher.
//!
//! # Design
//! `XmlRpcClient` owns an immutable `Endpoint` and a shared `Transport`, and
//! keeps no state between calls, so one client can serve any number of
//! threads at once. Like a host-does-IO client, each call is split into
//! `build_call` (encode and produce an `HttpRequest`) and `parse_call`
//! (check status, parse, decode). `call` runs both around the configured
//! transport.
//!
//! Every failure stops the call where it is detected. Nothing is retried,
//! and `call_into` only writes the destination once the whole pipeline has
//! succeeded.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::de::from_value;
use crate::error::{Result, TransportError, XmlRpcError};
use crate::http::{HttpRequest, HttpResponse, CONTENT_TYPE_XML};
use crate::request::build_method_call;
use crate::response::{parse_response, Response};
use crate::ser::to_params;
use crate::transport::{Transport, UreqTransport};
use crate::value::Value;

/// Timeout used when the builder is not given one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where calls go and how long they may take. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    timeout: Duration,
    user_agent: String,
}

impl Endpoint {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

fn validate_url(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(XmlRpcError::Usage("endpoint URL is empty".to_string()));
    }
    let uri: ureq::http::Uri = url
        .parse()
        .map_err(|e| XmlRpcError::Usage(format!("invalid endpoint URL {url:?}: {e}")))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => {
            return Err(XmlRpcError::Usage(format!(
                "endpoint URL {url:?} must use http or https"
            )))
        }
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(XmlRpcError::Usage(format!("endpoint URL {url:?} has no host")));
    }
    Ok(url.to_string())
}

/// Configures an `XmlRpcClient`.
pub struct ClientBuilder {
    url: String,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            timeout: None,
            user_agent: None,
            transport: None,
        }
    }

    /// Upper bound for a whole round-trip. Defaults to `DEFAULT_TIMEOUT`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replace the default ureq transport. The timeout is then the
    /// transport's responsibility.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn build(self) -> Result<XmlRpcClient> {
        let url = validate_url(&self.url)?;
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(XmlRpcError::Usage("timeout must be non-zero".to_string()));
        }
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| concat!("xmlrpc-core/", env!("CARGO_PKG_VERSION")).to_string());
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(UreqTransport::new(timeout)));

        Ok(XmlRpcClient {
            endpoint: Arc::new(Endpoint {
                url,
                timeout,
                user_agent,
            }),
            transport,
        })
    }
}

/// Blocking XML-RPC client bound to one endpoint.
#[derive(Clone)]
pub struct XmlRpcClient {
    endpoint: Arc<Endpoint>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for XmlRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlRpcClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl XmlRpcClient {
    /// Client with the default transport and timeout.
    pub fn new(url: &str) -> Result<Self> {
        Self::builder(url).build()
    }

    pub fn builder(url: &str) -> ClientBuilder {
        ClientBuilder::new(url)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Call `method` and decode its return value as `R`.
    ///
    /// `args` that serialize to nothing (`()`, `None`) send an empty param
    /// list; anything else is sent as the single param.
    pub fn call<A, R>(&self, method: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.build_call(method, args)?;
        let response = self.send(method, &request)?;
        self.parse_call(response)
    }

    /// Like `call`, writing into `result` on success. `result` is left as
    /// it was on every error path.
    pub fn call_into<A, R>(&self, method: &str, args: &A, result: &mut R) -> Result<()>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        *result = self.call(method, args)?;
        Ok(())
    }

    /// Call with an explicit param list and get the raw returned value.
    pub fn call_values(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        check_method(method)?;
        let request = self.build_request(method, &params);
        let response = self.send(method, &request)?;
        self.parse_value(response)
    }

    pub fn build_call<A>(&self, method: &str, args: &A) -> Result<HttpRequest>
    where
        A: Serialize + ?Sized,
    {
        check_method(method)?;
        let params = to_params(args)?;
        Ok(self.build_request(method, &params))
    }

    pub fn parse_call<R: DeserializeOwned>(&self, response: HttpResponse) -> Result<R> {
        let value = self.parse_value(response)?;
        from_value(value)
    }

    fn build_request(&self, method: &str, params: &[Value]) -> HttpRequest {
        HttpRequest {
            url: self.endpoint.url.clone(),
            headers: vec![
                ("content-type".to_string(), CONTENT_TYPE_XML.to_string()),
                ("user-agent".to_string(), self.endpoint.user_agent.clone()),
            ],
            body: build_method_call(method, params),
        }
    }

    fn send(&self, method: &str, request: &HttpRequest) -> Result<HttpResponse> {
        tracing::debug!(method, url = %self.endpoint.url, "dispatching XML-RPC call");
        self.transport.send(request).map_err(|err| {
            tracing::warn!(method, url = %self.endpoint.url, error = %err, "XML-RPC transport failure");
            XmlRpcError::from(err)
        })
    }

    fn parse_value(&self, response: HttpResponse) -> Result<Value> {
        check_status(&response)?;
        match parse_response(&response.body)? {
            Response::Success(value) => {
                tracing::debug!(url = %self.endpoint.url, kind = value.type_name(), "XML-RPC call returned");
                Ok(value)
            }
            Response::Fault(fault) => {
                tracing::debug!(url = %self.endpoint.url, code = fault.code, message = %fault.message, "XML-RPC fault");
                Err(XmlRpcError::Fault(fault))
            }
        }
    }
}

fn check_method(method: &str) -> Result<()> {
    if method.trim().is_empty() {
        return Err(XmlRpcError::Usage("method name is empty".to_string()));
    }
    Ok(())
}

/// Non-2xx statuses are transport failures, whatever the body says.
fn check_status(response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    Err(TransportError::Status {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;
    use crate::response::{build_fault, build_response};
    use crate::value::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "http://localhost:5001/";

    fn reply(status: u16, body: Vec<u8>) -> impl Transport {
        move |_: &HttpRequest| -> std::result::Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.clone(),
            })
        }
    }

    fn client_with(transport: impl Transport + 'static) -> XmlRpcClient {
        XmlRpcClient::builder(URL).transport(transport).build().unwrap()
    }

    fn counting(calls: Arc<AtomicUsize>) -> impl Transport {
        move |_: &HttpRequest| -> std::result::Result<HttpResponse, TransportError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: build_response(&Value::Nil),
            })
        }
    }

    #[test]
    fn build_call_produces_post_body_and_headers() {
        let client = client_with(reply(200, Vec::new()));
        let req = client.build_call("TestServer.Upcase", "xmlrpc").unwrap();
        assert_eq!(req.url, URL);
        assert_eq!(req.header("content-type"), Some("text/xml"));
        assert!(req.header("user-agent").unwrap().starts_with("xmlrpc-core/"));
        let body = String::from_utf8(req.body).unwrap();
        assert!(body.contains("<methodName>TestServer.Upcase</methodName>"));
        assert!(body.contains("<param><value><string>xmlrpc</string></value></param>"));
    }

    #[test]
    fn no_args_sends_empty_params() {
        let client = client_with(reply(200, Vec::new()));
        let req = client.build_call("TestServer.Time", &()).unwrap();
        let body = String::from_utf8(req.body).unwrap();
        assert!(body.contains("<params></params>"));
    }

    #[test]
    fn rejects_bad_endpoints() {
        for url in ["", "   ", "not a url", "ftp://example.com/", "/RPC2"] {
            assert!(
                matches!(XmlRpcClient::new(url), Err(XmlRpcError::Usage(_))),
                "{url:?}"
            );
        }
        assert!(matches!(
            XmlRpcClient::builder(URL).timeout(Duration::ZERO).build(),
            Err(XmlRpcError::Usage(_))
        ));
    }

    #[test]
    fn endpoint_keeps_configuration() {
        let client = XmlRpcClient::builder("https://rpc.example.com/RPC2")
            .timeout(Duration::from_secs(3))
            .user_agent("probe/1")
            .build()
            .unwrap();
        assert_eq!(client.endpoint().url(), "https://rpc.example.com/RPC2");
        assert_eq!(client.endpoint().timeout(), Duration::from_secs(3));
        assert_eq!(client.endpoint().user_agent(), "probe/1");
        let default = XmlRpcClient::new(URL).unwrap();
        assert_eq!(default.endpoint().timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn empty_method_fails_before_any_io() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = client_with(counting(calls.clone()));
        let err = client.call::<_, ()>("", &()).unwrap_err();
        assert!(matches!(err, XmlRpcError::Usage(_)));
        let err = client.call_values(" ", Vec::new()).unwrap_err();
        assert!(matches!(err, XmlRpcError::Usage(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn encoding_errors_fail_before_any_io() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = client_with(counting(calls.clone()));
        let err = client.call::<_, ()>("m", &u64::MAX).unwrap_err();
        assert!(matches!(err, XmlRpcError::Encoding(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn success_decodes_into_result() {
        let client = client_with(reply(200, build_response(&Value::Int(5))));
        let sum: i32 = client.call("TestServer.Sum", &[2, 3]).unwrap();
        assert_eq!(sum, 5);
    }

    #[test]
    fn fault_leaves_result_untouched() {
        let client = client_with(reply(200, build_fault(&Fault::new(1, "Server error"))));
        let mut result = 17;
        let err = client.call_into("TestServer.Error", &(), &mut result).unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::new(1, "Server error")));
        assert_eq!(result, 17);
    }

    #[test]
    fn malformed_response_is_protocol_error() {
        let client = client_with(reply(200, b"<methodResponse><oops/></methodResponse>".to_vec()));
        let mut result = String::from("initial");
        let err = client.call_into("m", &(), &mut result).unwrap_err();
        assert!(matches!(err, XmlRpcError::Protocol(_)));
        assert_eq!(result, "initial");
    }

    #[test]
    fn non_2xx_is_transport_error() {
        let client = client_with(reply(500, build_response(&Value::Int(1))));
        let err = client.call::<_, i32>("m", &()).unwrap_err();
        assert!(matches!(
            err,
            XmlRpcError::Transport(TransportError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn transport_errors_pass_through() {
        let client = client_with(
            |_: &HttpRequest| -> std::result::Result<HttpResponse, TransportError> {
                Err(TransportError::Timeout)
            },
        );
        let mut when = DateTime::default();
        let err = client.call_into("TestServer.Time", &(), &mut when).unwrap_err();
        assert!(matches!(err, XmlRpcError::Transport(TransportError::Timeout)));
        assert_eq!(when, DateTime::default());
    }

    #[test]
    fn shape_mismatch_is_decoding_error() {
        let client = client_with(reply(200, build_response(&Value::from("five"))));
        let mut result = 0i32;
        let err = client.call_into("m", &(), &mut result).unwrap_err();
        assert!(matches!(err, XmlRpcError::Decoding(_)));
        assert_eq!(result, 0);
    }

    #[test]
    fn call_values_sends_every_param() {
        let client = client_with(|req: &HttpRequest| -> std::result::Result<HttpResponse, TransportError> {
            let call = crate::request::parse_method_call(&req.body).unwrap();
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: build_response(&Value::Int(call.params.len() as i32)),
            })
        });
        let count = client
            .call_values("m", vec![Value::Int(1), Value::from("a"), Value::Nil])
            .unwrap();
        assert_eq!(count, Value::Int(3));
    }

    #[test]
    fn parse_call_works_without_a_transport_round_trip() {
        let client = XmlRpcClient::new(URL).unwrap();
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: build_response(&Value::from("XMLRPC")),
        };
        let out: String = client.parse_call(response).unwrap();
        assert_eq!(out, "XMLRPC");
    }

    #[test]
    fn client_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<XmlRpcClient>();
    }
}
