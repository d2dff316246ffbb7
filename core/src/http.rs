//! HTTP round-trip described as plain data.
//!
//! # Design
//! The client builds an `HttpRequest` and parses an `HttpResponse`; whatever
//! sits in between is a `Transport`. Keeping both ends as plain data means
//! a caller can run the round-trip on its own HTTP stack (or in a test,
//! with no network at all) and still reuse the XML-RPC halves unchanged.

/// Content type for XML-RPC requests.
pub const CONTENT_TYPE_XML: &str = "text/xml";

/// An XML-RPC POST, ready to send.
///
/// Built by `XmlRpcClient::build_call`. XML-RPC only ever POSTs, so there is
/// no method field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// What came back from the server.
///
/// Passed to `XmlRpcClient::parse_call` for status checking and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            url: "http://localhost/".to_string(),
            headers: vec![("Content-Type".to_string(), CONTENT_TYPE_XML.to_string())],
            body: Vec::new(),
        };
        assert_eq!(req.header("content-type"), Some("text/xml"));
        assert_eq!(req.header("user-agent"), None);
    }

    #[test]
    fn success_covers_2xx_only() {
        let mut resp = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: Vec::new(),
        };
        assert!(resp.is_success());
        resp.status = 301;
        assert!(!resp.is_success());
        resp.status = 199;
        assert!(!resp.is_success());
    }
}
