//! `methodCall` documents.
//!
//! `build_method_call` is the client's half. `parse_method_call` is its
//! inverse, for servers and test doubles that need to read what a client
//! sent.

use crate::error::{Result, XmlRpcError};
use crate::value::Value;
use crate::xml;

/// A decoded `methodCall`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    pub params: Vec<Value>,
}

/// Serialize a call. The method name is written verbatim apart from XML
/// text escaping; params keep their order. An empty slice produces an
/// empty `<params>` list.
pub fn build_method_call(method: &str, params: &[Value]) -> Vec<u8> {
    let mut out = String::from(r#"<?xml version="1.0"?>"#);
    out.push_str("<methodCall><methodName>");
    xml::write_text(&mut out, method);
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        xml::write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out.into_bytes()
}

pub fn parse_method_call(body: &[u8]) -> Result<MethodCall> {
    let root = xml::parse_document(body)?;
    if root.name != "methodCall" {
        return Err(XmlRpcError::Protocol(format!(
            "expected <methodCall>, found <{}>",
            root.name
        )));
    }

    let mut method = None;
    let mut params = None;
    for child in root.elements()? {
        match child.name.as_str() {
            "methodName" if method.is_none() => method = Some(child.text()),
            "params" if params.is_none() => params = Some(xml::read_params(child)?),
            other => {
                return Err(XmlRpcError::Protocol(format!(
                    "unexpected <{other}> inside <methodCall>"
                )))
            }
        }
    }

    let method = method
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| XmlRpcError::Protocol("missing <methodName>".to_string()))?;
    Ok(MethodCall {
        method,
        params: params.unwrap_or_default(),
    })
}
