//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use soapwire::config::SoapwireConfig;
use soapwire::lifecycle::{self, RunningServer};
use soapwire::soap::{EchoService, SoapWebService};
use soapwire::HttpClient;

pub const SERVICE_URI: &str = "urn:soapwire:echo";
pub const WSDL_PATH: &str = "/echo?wsdl";

/// Read one request head and as much of its declared body as arrives.
pub async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let Ok(n) = socket.read(&mut buf).await else { break };
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw);
        if let Some(end) = text.find("\r\n\r\n") {
            let declared = text[..end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if raw.len() >= end + 4 + declared {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// Start a backend whose reply is computed from the request text. Every
/// request seen is recorded.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<String>>>)
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<u8>> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let recorded = Arc::clone(&seen);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = Arc::clone(&f);
            let recorded = Arc::clone(&recorded);
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request.clone());
                let reply = f(request).await;
                let _ = socket.write_all(&reply).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (addr, seen)
}

/// Start a backend that always answers with `response`.
pub async fn start_scripted_backend(response: impl Into<Vec<u8>>) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let response = Arc::new(response.into());
    start_programmable_backend(move |_| {
        let response = Arc::clone(&response);
        async move { response.as_ref().clone() }
    })
    .await
}

/// A `200 OK` with a declared body and extra header lines.
pub fn ok_response(extra_headers: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{extra_headers}Connection: close\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

/// Port that refuses connections.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn client() -> HttpClient {
    let mut config = SoapwireConfig::default();
    config.client.connect_timeout_ms = 2_000;
    HttpClient::from_config(&config).unwrap()
}

pub fn test_config(continue_interval_ms: u64) -> SoapwireConfig {
    let mut config = SoapwireConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.soap.continue_interval_ms = continue_interval_ms;
    config.soap.service_uri = SERVICE_URI.into();
    config.soap.wsdl_path = WSDL_PATH.into();
    config
}

/// Start the real server with the echo service.
pub async fn start_echo_server(continue_interval_ms: u64) -> RunningServer {
    start_server(
        continue_interval_ms,
        Arc::new(EchoService::new(SERVICE_URI, WSDL_PATH)),
    )
    .await
}

pub async fn start_server(
    continue_interval_ms: u64,
    service: Arc<dyn SoapWebService>,
) -> RunningServer {
    lifecycle::start(&test_config(continue_interval_ms), service)
        .await
        .unwrap()
}

/// A request envelope for one method of the echo service.
pub fn envelope(method: &str, params: &[(&str, &str)]) -> String {
    let params: String = params
        .iter()
        .map(|(name, value)| format!("<{name}>{value}</{name}>"))
        .collect();
    format!(
        "<?xml version=\"1.0\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\
         <s:Body><m:{method} xmlns:m=\"{SERVICE_URI}\">{params}</m:{method}></s:Body>\
         </s:Envelope>"
    )
}

/// A raw POST of `body` with extra header lines.
pub fn soap_post(body: &str, extra_headers: &str) -> String {
    format!(
        "POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Type: text/xml; charset=utf-8\r\n\
         Content-Length: {}\r\n{extra_headers}\r\n{body}",
        body.len()
    )
}

/// Write `request` and read until the server closes.
pub async fn raw_exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut reply))
        .await
        .expect("server did not close the connection")
        .unwrap();
    reply
}

/// Read until `marker` has been seen; returns everything read.
pub async fn read_until(stream: &mut TcpStream, marker: &str) -> String {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    while !String::from_utf8_lossy(&raw).contains(marker) {
        let n = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut buf))
            .await
            .expect("timed out waiting for marker")
            .unwrap();
        assert!(n > 0, "connection closed before {marker:?}");
        raw.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&raw).into_owned()
}

/// Split a raw reply at the end of its final header block.
pub fn split_final(reply: &[u8]) -> (String, Vec<u8>) {
    let marker = b"\r\n\r\n";
    let mut start = 0;
    loop {
        let end = reply[start..]
            .windows(4)
            .position(|w| w == marker)
            .map(|p| start + p)
            .expect("no header block");
        let head = String::from_utf8_lossy(&reply[start..end]).into_owned();
        if !head.starts_with("HTTP/1.1 100 ") {
            return (head, reply[end + 4..].to_vec());
        }
        start = end + 4;
    }
}

pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
