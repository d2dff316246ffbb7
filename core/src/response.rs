//! `methodResponse` documents.
//!
//! # Design
//! A response is either one return value or a fault, never both. Anything
//! else (both, neither, a fault without its code or message, broken XML)
//! is a `Protocol` error, so a garbled reply can never turn into a silent
//! zero-value result. `build_response` and `build_fault` write the same
//! format for test servers.

use crate::error::{Fault, Result, XmlRpcError};
use crate::value::{Struct, Value};
use crate::xml::{self, Element};

/// The outcome carried by a `methodResponse`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The returned value. An empty `<params>` yields `Value::Nil`.
    Success(Value),
    Fault(Fault),
}

pub fn parse_response(body: &[u8]) -> Result<Response> {
    let root = xml::parse_document(body)?;
    if root.name != "methodResponse" {
        return Err(XmlRpcError::Protocol(format!(
            "expected <methodResponse>, found <{}>",
            root.name
        )));
    }

    match root.elements()?.as_slice() {
        [only] if only.name == "params" => read_success(only),
        [only] if only.name == "fault" => read_fault(only),
        _ => Err(XmlRpcError::Protocol("malformed response".to_string())),
    }
}

fn read_success(params: &Element) -> Result<Response> {
    let mut values = xml::read_params(params)?;
    if values.len() > 1 {
        return Err(XmlRpcError::Protocol(format!(
            "methodResponse carries {} params, expected at most one",
            values.len()
        )));
    }
    Ok(Response::Success(values.pop().unwrap_or(Value::Nil)))
}

fn read_fault(fault: &Element) -> Result<Response> {
    let members = match xml::read_value(fault.only_child("value")?)? {
        Value::Struct(members) => members,
        other => {
            return Err(XmlRpcError::Protocol(format!(
                "fault value must be a struct, found {}",
                other.type_name()
            )))
        }
    };
    let code = match members.get("faultCode") {
        Some(Value::Int(code)) => *code,
        Some(other) => {
            return Err(XmlRpcError::Protocol(format!(
                "faultCode must be an int, found {}",
                other.type_name()
            )))
        }
        None => return Err(XmlRpcError::Protocol("fault without faultCode".to_string())),
    };
    let message = match members.get("faultString") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => {
            return Err(XmlRpcError::Protocol(format!(
                "faultString must be a string, found {}",
                other.type_name()
            )))
        }
        None => return Err(XmlRpcError::Protocol("fault without faultString".to_string())),
    };
    Ok(Response::Fault(Fault { code, message }))
}

/// Serialize a successful response carrying `value`.
pub fn build_response(value: &Value) -> Vec<u8> {
    let mut out = String::from(r#"<?xml version="1.0"?>"#);
    out.push_str("<methodResponse><params><param>");
    xml::write_value(&mut out, value);
    out.push_str("</param></params></methodResponse>");
    out.into_bytes()
}

/// Serialize a fault response.
pub fn build_fault(fault: &Fault) -> Vec<u8> {
    let mut members = Struct::new();
    members.insert("faultCode", Value::Int(fault.code));
    members.insert("faultString", Value::String(fault.message.clone()));

    let mut out = String::from(r#"<?xml version="1.0"?>"#);
    out.push_str("<methodResponse><fault>");
    xml::write_value(&mut out, &Value::Struct(members));
    out.push_str("</fault></methodResponse>");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAULT: &str = "<?xml version=\"1.0\"?>\n<methodResponse>\n  <fault>\n    <value>\n      <struct>\n        <member><name>faultCode</name><value><int>4</int></value></member>\n        <member><name>faultString</name><value><string>Too many parameters.</string></value></member>\n      </struct>\n    </value>\n  </fault>\n</methodResponse>\n";

    #[test]
    fn parses_success_with_whitespace() {
        let body = b"<?xml version=\"1.0\"?>\n<methodResponse>\n  <params>\n    <param>\n      <value><string>South Dakota</string></value>\n    </param>\n  </params>\n</methodResponse>\n";
        assert_eq!(
            parse_response(body).unwrap(),
            Response::Success(Value::from("South Dakota"))
        );
    }

    #[test]
    fn parses_fault() {
        assert_eq!(
            parse_response(FAULT.as_bytes()).unwrap(),
            Response::Fault(Fault::new(4, "Too many parameters."))
        );
    }

    #[test]
    fn empty_params_is_nil() {
        let body = b"<methodResponse><params/></methodResponse>";
        assert_eq!(parse_response(body).unwrap(), Response::Success(Value::Nil));
    }

    #[test]
    fn neither_or_both_is_malformed() {
        for body in [
            "<methodResponse/>",
            "<methodResponse><bogus/></methodResponse>",
            "<methodResponse><params/><fault><value/></fault></methodResponse>",
        ] {
            match parse_response(body.as_bytes()) {
                Err(XmlRpcError::Protocol(msg)) => assert_eq!(msg, "malformed response"),
                other => panic!("{body}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_wrong_root_and_extra_params() {
        assert!(matches!(
            parse_response(b"<methodCall/>"),
            Err(XmlRpcError::Protocol(_))
        ));
        let two = b"<methodResponse><params>\
            <param><value>a</value></param><param><value>b</value></param>\
            </params></methodResponse>";
        assert!(matches!(parse_response(two), Err(XmlRpcError::Protocol(_))));
        assert!(matches!(
            parse_response(b"not xml at all <"),
            Err(XmlRpcError::Protocol(_))
        ));
    }

    #[test]
    fn fault_requires_code_and_string() {
        let no_code = "<methodResponse><fault><value><struct>\
            <member><name>faultString</name><value>x</value></member>\
            </struct></value></fault></methodResponse>";
        let no_string = "<methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value><int>1</int></value></member>\
            </struct></value></fault></methodResponse>";
        let bad_code = "<methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value>one</value></member>\
            <member><name>faultString</name><value>x</value></member>\
            </struct></value></fault></methodResponse>";
        let not_struct = "<methodResponse><fault><value><int>1</int></value></fault></methodResponse>";
        for body in [no_code, no_string, bad_code, not_struct] {
            assert!(
                matches!(parse_response(body.as_bytes()), Err(XmlRpcError::Protocol(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn built_documents_parse_back() {
        let value = Value::Array(vec![Value::Int(1), Value::Boolean(false)]);
        assert_eq!(
            parse_response(&build_response(&value)).unwrap(),
            Response::Success(value)
        );
        let fault = Fault::new(-32601, "method <x> not found");
        assert_eq!(
            parse_response(&build_fault(&fault)).unwrap(),
            Response::Fault(fault)
        );
    }
}
