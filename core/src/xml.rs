//! XML plumbing shared by requests and responses.
//!
//! # Design
//! quick-xml does the tokenizing; this module folds its events into a small
//! element tree and walks that tree to read `<value>` elements. Writing goes
//! straight into a `String` with quick-xml's escaper, since XML-RPC documents
//! are small and fully known up front.
//!
//! Attributes and namespaces are not part of XML-RPC and are ignored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, XmlRpcError};
use crate::value::{DateTime, Struct, Value};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    pub name: String,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            children: Vec::new(),
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    /// All character data directly under this element.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let Node::Text(text) = child {
                out.push_str(text);
            }
        }
        out
    }

    /// Child elements of a structural element. Non-whitespace text in a
    /// structural position is a protocol violation.
    pub fn elements(&self) -> Result<Vec<&Element>> {
        let mut out = Vec::new();
        for child in &self.children {
            match child {
                Node::Element(el) => out.push(el),
                Node::Text(text) if text.trim().is_empty() => {}
                Node::Text(text) => {
                    return Err(XmlRpcError::Protocol(format!(
                        "unexpected text {:?} inside <{}>",
                        text.trim(),
                        self.name
                    )))
                }
            }
        }
        Ok(out)
    }

    /// The single child element named `name`.
    pub fn only_child(&self, name: &str) -> Result<&Element> {
        match self.elements()?.as_slice() {
            [only] if only.name == name => Ok(*only),
            [only] => Err(XmlRpcError::Protocol(format!(
                "expected <{name}> inside <{}>, found <{}>",
                self.name, only.name
            ))),
            children => Err(XmlRpcError::Protocol(format!(
                "expected exactly one <{name}> inside <{}>, found {} elements",
                self.name,
                children.len()
            ))),
        }
    }
}

/// Parse a whole document into its root element.
pub(crate) fn parse_document(input: &[u8]) -> Result<Element> {
    let text = std::str::from_utf8(input).map_err(XmlRpcError::protocol)?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(XmlRpcError::protocol)? {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(XmlRpcError::Protocol(
                        "content after the root element".to_string(),
                    ));
                }
                let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                stack.push(Element::new(name));
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    XmlRpcError::Protocol("closing tag without an open element".to_string())
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(XmlRpcError::protocol)?;
                match stack.last_mut() {
                    Some(parent) => parent.push_text(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(XmlRpcError::Protocol(
                            "text outside the root element".to_string(),
                        ))
                    }
                }
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.push_text(&text),
                    None => {
                        return Err(XmlRpcError::Protocol(
                            "CDATA outside the root element".to_string(),
                        ))
                    }
                }
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(XmlRpcError::Protocol(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| XmlRpcError::Protocol("empty document".to_string()))
}

fn child_elements(element: &Element) -> Vec<&Element> {
    element
        .children
        .iter()
        .filter_map(|child| match child {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
        .collect()
}

fn scalar_text(element: &Element) -> Result<String> {
    // a scalar carries text only
    if let Some(child) = child_elements(element).first() {
        return Err(XmlRpcError::Protocol(format!(
            "unexpected <{}> inside <{}>",
            child.name, element.name
        )));
    }
    Ok(element.text())
}

fn parse_int(element: &Element) -> Result<i32> {
    let text = scalar_text(element)?;
    text.trim().parse().map_err(|_| {
        XmlRpcError::Protocol(format!("invalid <{}> value {:?}", element.name, text.trim()))
    })
}

/// Read a `<value>` element.
pub(crate) fn read_value(element: &Element) -> Result<Value> {
    if element.name != "value" {
        return Err(XmlRpcError::Protocol(format!(
            "expected <value>, found <{}>",
            element.name
        )));
    }
    let typed = match child_elements(element).as_slice() {
        [] => return Ok(Value::String(element.text())),
        [typed] => {
            // no stray text around the type tag
            element.elements()?;
            *typed
        }
        many => {
            return Err(XmlRpcError::Protocol(format!(
                "<value> holds {} elements, expected one",
                many.len()
            )))
        }
    };

    match typed.name.as_str() {
        "int" | "i4" => parse_int(typed).map(Value::Int),
        "boolean" => match scalar_text(typed)?.trim() {
            "0" => Ok(Value::Boolean(false)),
            "1" => Ok(Value::Boolean(true)),
            other => Err(XmlRpcError::Protocol(format!("invalid <boolean> value {other:?}"))),
        },
        "string" => scalar_text(typed).map(Value::String),
        "double" => {
            let text = scalar_text(typed)?;
            text.trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(Value::Double)
                .ok_or_else(|| {
                    XmlRpcError::Protocol(format!("invalid <double> value {:?}", text.trim()))
                })
        }
        "dateTime.iso8601" => {
            let text = scalar_text(typed)?;
            DateTime::parse(&text).map(Value::DateTime).ok_or_else(|| {
                XmlRpcError::Protocol(format!("invalid <dateTime.iso8601> value {:?}", text.trim()))
            })
        }
        "base64" => {
            let text = scalar_text(typed)?;
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            STANDARD
                .decode(compact.as_bytes())
                .map(Value::Base64)
                .map_err(|e| XmlRpcError::Protocol(format!("invalid <base64> value: {e}")))
        }
        "array" => {
            let data = typed.only_child("data")?;
            data.elements()?
                .into_iter()
                .map(read_value)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "struct" => {
            let mut members = Struct::new();
            for member in typed.elements()? {
                let (name, value) = read_member(member)?;
                members.insert(name, value);
            }
            Ok(Value::Struct(members))
        }
        "nil" => Ok(Value::Nil),
        other => Err(XmlRpcError::Protocol(format!("unknown value type <{other}>"))),
    }
}

fn read_member(member: &Element) -> Result<(String, Value)> {
    if member.name != "member" {
        return Err(XmlRpcError::Protocol(format!(
            "expected <member> inside <struct>, found <{}>",
            member.name
        )));
    }
    let mut name = None;
    let mut value = None;
    for child in member.elements()? {
        match child.name.as_str() {
            "name" if name.is_none() => name = Some(scalar_text(child)?),
            "value" if value.is_none() => value = Some(read_value(child)?),
            other => {
                return Err(XmlRpcError::Protocol(format!(
                    "unexpected <{other}> inside <member>"
                )))
            }
        }
    }
    match (name, value) {
        (Some(name), Some(value)) => Ok((name, value)),
        (None, _) => Err(XmlRpcError::Protocol("<member> without <name>".to_string())),
        (Some(name), None) => Err(XmlRpcError::Protocol(format!(
            "<member> {name:?} without <value>"
        ))),
    }
}

/// Read the values out of a `<params>` element, in order.
pub(crate) fn read_params(params: &Element) -> Result<Vec<Value>> {
    params
        .elements()?
        .into_iter()
        .map(|param| {
            if param.name != "param" {
                return Err(XmlRpcError::Protocol(format!(
                    "expected <param> inside <params>, found <{}>",
                    param.name
                )));
            }
            read_value(param.only_child("value")?)
        })
        .collect()
}

/// Append `<value>...</value>` for `value`.
pub(crate) fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Int(i) => {
            out.push_str("<int>");
            out.push_str(&i.to_string());
            out.push_str("</int>");
        }
        Value::Boolean(b) => {
            out.push_str(if *b { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" });
        }
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::Double(d) => {
            out.push_str("<double>");
            out.push_str(&d.to_string());
            out.push_str("</double>");
        }
        Value::DateTime(dt) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&dt.to_iso8601());
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(bytes) => {
            out.push_str("<base64>");
            out.push_str(&STANDARD.encode(bytes));
            out.push_str("</base64>");
        }
        Value::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members.iter() {
                out.push_str("<member><name>");
                out.push_str(&escape(name));
                out.push_str("</name>");
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        Value::Nil => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

/// Append `text` with XML special characters escaped.
pub(crate) fn write_text(out: &mut String, text: &str) {
    out.push_str(&escape(text));
}
