//! Client calls against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port on a background tokio runtime,
//! then drives `XmlRpcClient` over real HTTP: zero-arg, one-arg and array
//! calls, back-to-back calls, faults, and transport failures.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use xmlrpc_core::{DateTime, TransportError, Value, XmlRpcClient, XmlRpcError};

/// Start the mock server and return its address.
fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn client() -> XmlRpcClient {
    let addr = start_server();
    XmlRpcClient::new(&format!("http://{addr}/")).unwrap()
}

/// A port with nothing listening on it.
fn dead_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[test]
fn call_without_args() {
    let client = client();
    let before = DateTime::now();
    let result: DateTime = client.call("TestServer.Time", &()).unwrap();
    assert!(result >= before);
    assert!(result.as_naive() - before.as_naive() < chrono::Duration::seconds(60));
}

#[test]
fn call_with_one_arg() {
    let client = client();
    let result: String = client.call("TestServer.Upcase", "xmlrpc").unwrap();
    assert_eq!(result, "XMLRPC");
}

#[test]
fn call_with_two_args() {
    let client = client();
    let sum: i32 = client.call("TestServer.Sum", &[2, 3]).unwrap();
    assert_eq!(sum, 5);
}

#[test]
fn one_field_result_wrapper() {
    #[derive(Deserialize)]
    struct Out {
        out: String,
    }

    let client = client();
    let result: Out = client.call("TestServer.Upcase", "wrapped").unwrap();
    assert_eq!(result.out, "WRAPPED");
}

#[test]
fn two_calls() {
    let client = client();

    let mut upcase = String::new();
    client
        .call_into("TestServer.Upcase", "xmlrpc", &mut upcase)
        .unwrap();

    let mut sum = 0;
    client.call_into("TestServer.Sum", &[2, 3], &mut sum).unwrap();

    assert_eq!(upcase, "XMLRPC");
    assert_eq!(sum, 5);
}

#[test]
fn failed_call() {
    let client = client();
    let mut result = 42;
    let err = client
        .call_into("TestServer.Error", &(), &mut result)
        .unwrap_err();
    let fault = err.fault().expect("expected a remote fault");
    assert_eq!(fault.message, "Server error");
    assert_eq!(result, 42);
}

#[test]
fn sum_without_args_is_a_fault() {
    let client = client();
    let mut sum = -1;
    let err = client.call_into("TestServer.Sum", &(), &mut sum).unwrap_err();
    assert!(err.is_fault(), "{err:?}");
    assert_eq!(err.fault().unwrap().message, "You can only sum two elements");
    assert_eq!(sum, -1);
}

#[test]
fn unknown_method_is_a_fault() {
    let client = client();
    let err = client.call::<_, ()>("TestServer.Missing", &()).unwrap_err();
    assert_eq!(err.fault().map(|f| f.code), Some(mock_server::METHOD_NOT_FOUND));
}

#[test]
fn records_round_trip_through_echo() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        scores: Vec<i32>,
        ratio: f64,
        seen: DateTime,
        nested: Option<Box<Entry>>,
    }

    let entry = Entry {
        name: "a & <b>".to_string(),
        scores: vec![3, 1, 2],
        ratio: 0.5,
        seen: DateTime::parse("20240102T03:04:05").unwrap(),
        nested: Some(Box::new(Entry {
            name: "inner".to_string(),
            scores: Vec::new(),
            ratio: -2.0,
            seen: DateTime::default(),
            nested: None,
        })),
    };

    let client = client();
    let back: Entry = client.call("TestServer.Echo", &entry).unwrap();
    assert_eq!(back, entry);
}

#[test]
fn multi_param_call_values() {
    let client = client();
    let out = client
        .call_values("TestServer.Echo", vec![Value::Int(7), Value::from("ignored")])
        .unwrap();
    assert_eq!(out, Value::Int(7));
}

#[test]
fn shape_mismatch_is_decoding_error() {
    let client = client();
    let mut result = 0i32;
    let err = client
        .call_into("TestServer.Upcase", "xmlrpc", &mut result)
        .unwrap_err();
    assert!(matches!(err, XmlRpcError::Decoding(_)), "{err:?}");
    assert_eq!(result, 0);
}

#[test]
fn no_listener_is_transport_error() {
    let client = XmlRpcClient::builder(&format!("http://127.0.0.1:{}/", dead_port()))
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let mut result = String::from("untouched");
    let err = client
        .call_into("TestServer.Upcase", "xmlrpc", &mut result)
        .unwrap_err();
    assert!(err.is_transport(), "{err:?}");
    assert_eq!(result, "untouched");
}

#[test]
fn wrong_path_is_status_error() {
    let addr = start_server();
    let client = XmlRpcClient::new(&format!("http://{addr}/RPC2")).unwrap();
    let err = client.call::<_, String>("TestServer.Upcase", "x").unwrap_err();
    assert!(
        matches!(
            err,
            XmlRpcError::Transport(TransportError::Status { status: 404, .. })
        ),
        "{err:?}"
    );
}

#[test]
fn concurrent_calls_do_not_interfere() {
    let client = client();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let client = client.clone();
            std::thread::spawn(move || {
                let word = format!("word{i}");
                let upper: String = client.call("TestServer.Upcase", &word).unwrap();
                let sum: i32 = client.call("TestServer.Sum", &[i, i]).unwrap();
                (i, upper, sum)
            })
        })
        .collect();

    for handle in handles {
        let (i, upper, sum) = handle.join().unwrap();
        assert_eq!(upper, format!("WORD{i}"));
        assert_eq!(sum, 2 * i);
    }
}
