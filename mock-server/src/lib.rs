//! XML-RPC test server.
//!
//! # Design
//! One axum route, `POST /`, reads a `methodCall` and answers with a
//! `methodResponse`. Dispatch is a plain `match` on the method name. As with
//! the usual Go-style RPC services, a missing argument decodes to its zero
//! value, so `TestServer.Sum` called without params reaches the method and
//! faults there rather than failing to decode.

use axum::{
    body::Bytes,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use xmlrpc_core::{
    build_fault, build_response, from_value, parse_method_call, DateTime, Fault, MethodCall,
    Value,
};

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const APPLICATION_ERROR: i32 = 1;

pub fn app() -> Router {
    Router::new().route("/", post(handle))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn handle(body: Bytes) -> impl IntoResponse {
    let payload = match parse_method_call(&body) {
        Ok(call) => match dispatch(&call) {
            Ok(value) => build_response(&value),
            Err(fault) => build_fault(&fault),
        },
        Err(err) => {
            tracing::warn!(error = %err, "unparsable methodCall");
            build_fault(&Fault::new(PARSE_ERROR, err.to_string()))
        }
    };
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], payload)
}

/// First param decoded as `T`, or `T`'s default when there is none.
fn arg<T: DeserializeOwned + Default>(params: &[Value]) -> Result<T, Fault> {
    match params.first() {
        None => Ok(T::default()),
        Some(value) => from_value(value.clone())
            .map_err(|err| Fault::new(INVALID_PARAMS, err.to_string())),
    }
}

pub fn dispatch(call: &MethodCall) -> Result<Value, Fault> {
    tracing::info!(method = %call.method, params = call.params.len(), "dispatching");
    match call.method.as_str() {
        "TestServer.Time" => Ok(Value::DateTime(DateTime::now())),
        "TestServer.Upcase" => {
            let input: String = arg(&call.params)?;
            Ok(Value::String(input.to_uppercase()))
        }
        "TestServer.Sum" => {
            let input: Vec<i32> = arg(&call.params)?;
            if input.len() != 2 {
                return Err(Fault::new(APPLICATION_ERROR, "You can only sum two elements"));
            }
            input[0]
                .checked_add(input[1])
                .map(Value::Int)
                .ok_or_else(|| Fault::new(APPLICATION_ERROR, "sum overflows int"))
        }
        "TestServer.Error" => Err(Fault::new(APPLICATION_ERROR, "Server error")),
        "TestServer.Echo" => Ok(call.params.first().cloned().unwrap_or(Value::Nil)),
        other => Err(Fault::new(
            METHOD_NOT_FOUND,
            format!("method {other} not found"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(method: &str, params: Vec<Value>) -> MethodCall {
        MethodCall {
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn upcase_returns_upper_case() {
        let out = dispatch(&call("TestServer.Upcase", vec![Value::from("xmlrpc")])).unwrap();
        assert_eq!(out, Value::from("XMLRPC"));
    }

    #[test]
    fn sum_adds_exactly_two() {
        let pair = Value::Array(vec![Value::Int(2), Value::Int(3)]);
        assert_eq!(dispatch(&call("TestServer.Sum", vec![pair])).unwrap(), Value::Int(5));

        let fault = dispatch(&call("TestServer.Sum", Vec::new())).unwrap_err();
        assert_eq!(fault.code, APPLICATION_ERROR);
        assert_eq!(fault.message, "You can only sum two elements");
    }

    #[test]
    fn sum_rejects_wrong_param_types() {
        let fault = dispatch(&call("TestServer.Sum", vec![Value::from("2,3")])).unwrap_err();
        assert_eq!(fault.code, INVALID_PARAMS);
    }

    #[test]
    fn sum_reports_overflow() {
        let pair = Value::Array(vec![Value::Int(i32::MAX), Value::Int(1)]);
        let fault = dispatch(&call("TestServer.Sum", vec![pair])).unwrap_err();
        assert_eq!(fault.code, APPLICATION_ERROR);
    }

    #[test]
    fn time_returns_a_datetime() {
        let out = dispatch(&call("TestServer.Time", Vec::new())).unwrap();
        assert!(matches!(out, Value::DateTime(_)));
    }

    #[test]
    fn error_and_unknown_methods_fault() {
        let fault = dispatch(&call("TestServer.Error", Vec::new())).unwrap_err();
        assert_eq!(fault, Fault::new(APPLICATION_ERROR, "Server error"));
        let fault = dispatch(&call("TestServer.Nope", Vec::new())).unwrap_err();
        assert_eq!(fault.code, METHOD_NOT_FOUND);
    }

    #[test]
    fn echo_returns_first_param() {
        let out = dispatch(&call("TestServer.Echo", vec![Value::Int(1), Value::Int(2)])).unwrap();
        assert_eq!(out, Value::Int(1));
        assert_eq!(dispatch(&call("TestServer.Echo", Vec::new())).unwrap(), Value::Nil);
    }
}
