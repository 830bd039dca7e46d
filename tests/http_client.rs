//! Outbound client behavior against scripted backends.

use std::time::Duration;

use soapwire::http::{ClientError, HttpClient, MessageExchange, Request};
use soapwire::net::{ConnectError, Endpoint, Scheme, TlsTrust, TransportConnector};
use soapwire::transform::gzip;
use uuid::Uuid;

mod common;

fn url(addr: std::net::SocketAddr) -> String {
    format!("http://{addr}")
}

#[tokio::test]
async fn get_returns_body_of_success() {
    let (addr, seen) = common::start_scripted_backend(common::ok_response("", "hello")).await;

    let body = common::client()
        .get_content(&url(addr), "/greeting")
        .await
        .unwrap();
    assert_eq!(body.as_deref(), Some("hello"));

    let requests = seen.lock().unwrap();
    let request = &requests[0];
    assert!(request.starts_with("GET /greeting HTTP/1.1\r\n"));
    assert!(request.contains("Host: 127.0.0.1:"));
    assert!(request.contains("User-Agent: soapwire http client 1.0\r\n"));
    assert!(request.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn get_yields_none_for_non_success() {
    let (addr, _) = common::start_scripted_backend(
        "HTTP/1.1 404 Not Found\r\nContent-Length: 4\r\n\r\nnope",
    )
    .await;
    assert_eq!(
        common::client().get_content(&url(addr), "/").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn informational_responses_are_transparent() {
    let (addr, _) = common::start_scripted_backend(
        b"HTTP/1.1 100 Continue\r\n\r\n\
          HTTP/1.1 100 Continue\r\n\r\n\
          HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nfinal"
            .to_vec(),
    )
    .await;

    let client = common::client();
    let mut connection = client.connect(&url(addr), 0).await.unwrap();
    let mut exchange = MessageExchange::new(&mut connection);
    HttpClient::send_request(&mut exchange, Request::get("/", "localhost", "test"))
        .await
        .unwrap();
    let response = HttpClient::receive_response_header(&mut exchange)
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(exchange.informational_drained(), 2);
    assert_eq!(
        exchange.receive_body_string(&response.fields).await.unwrap(),
        "final"
    );
    connection.disconnect().await;
}

#[tokio::test]
async fn gzip_bodies_are_decoded() {
    let packed = gzip::encode(b"compressed reply").unwrap();
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
        packed.len()
    )
    .into_bytes();
    response.extend_from_slice(&packed);
    let (addr, seen) = common::start_scripted_backend(response).await;

    assert_eq!(
        common::client().get_content(&url(addr), "/").await.unwrap().as_deref(),
        Some("compressed reply")
    );
    assert!(seen.lock().unwrap()[0].contains("Accept-Encoding: gzip\r\n"));
}

#[tokio::test]
async fn unreachable_get_is_none_but_post_is_an_error() {
    let addr = common::refused_addr().await;
    let client = common::client();

    assert_eq!(client.get_content(&url(addr), "/").await.unwrap(), None);

    match client.post_with_retries(&url(addr), "<x/>", "text/xml", 3).await {
        Err(ClientError::Connect(e)) => assert_eq!(e.attempts(), 4),
        other => panic!("expected a connect error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_url_is_reported_immediately() {
    let client = common::client();
    assert!(client.get_content("not a url", "/").await.is_err());
    assert!(matches!(
        client.post("ftp://example.org/", "<x/>").await,
        Err(ClientError::Endpoint(_))
    ));
}

#[tokio::test]
async fn connector_attempts_retries_plus_one() {
    let addr = common::refused_addr().await;
    let connector = TransportConnector::new(TlsTrust::TrustAny).unwrap();
    let endpoint = Endpoint::new("127.0.0.1", addr.port(), Scheme::Plain);

    for retries in [0, 1, 5] {
        let err = connector
            .connect(&endpoint, Duration::from_secs(1), retries, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Exhausted { .. }));
        assert_eq!(err.attempts(), retries + 1);
    }
}

#[tokio::test]
async fn post_sends_declared_body_and_reads_reply() {
    let (addr, seen) = common::start_programmable_backend(|request| async move {
        let body = request.split("\r\n\r\n").nth(1).unwrap_or("").to_uppercase();
        common::ok_response("Content-Type: text/plain\r\n", &body)
    })
    .await;

    let reply = common::client()
        .post(&format!("http://{addr}/svc?x=1"), "<ping/>")
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("<PING/>"));

    let request = seen.lock().unwrap()[0].clone();
    assert!(request.starts_with("POST /svc?x=1 HTTP/1.1\r\n"));
    assert!(request.contains("Content-Type: text/xml; charset=utf-8\r\n"));
    assert!(request.contains("Content-Length: 7\r\n"));
}

#[tokio::test]
async fn post_non_success_is_none() {
    let (addr, _) = common::start_scripted_backend(
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n",
    )
    .await;
    assert_eq!(
        common::client().post(&url(addr), "<x/>").await.unwrap(),
        None
    );
}

fn scratch_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("soapwire-test-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn file_is_named_by_content_disposition() {
    let (addr, _) = common::start_scripted_backend(common::ok_response(
        "Content-Disposition: attachment; filename=\"report.csv\"\r\n",
        "a,b\n1,2\n",
    ))
    .await;
    let dir = scratch_dir();

    let saved = common::client()
        .get_file(&url(addr), "/export", &dir)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved, dir.join("report.csv"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "a,b\n1,2\n");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn file_without_disposition_gets_a_unique_name() {
    let (addr, _) = common::start_scripted_backend(common::ok_response("", "payload")).await;
    let dir = scratch_dir();
    let client = common::client();

    let first = client.get_file(&url(addr), "/", &dir).await.unwrap().unwrap();
    let second = client.get_file(&url(addr), "/", &dir).await.unwrap().unwrap();

    assert_ne!(first, second);
    for saved in [&first, &second] {
        assert_eq!(saved.parent(), Some(dir.as_path()));
        assert_eq!(std::fs::read_to_string(saved).unwrap(), "payload");
    }

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn failed_file_retrieval_is_none() {
    let (addr, _) = common::start_scripted_backend(
        "HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n",
    )
    .await;
    let dir = scratch_dir();

    assert_eq!(
        common::client().get_file(&url(addr), "/", &dir).await.unwrap(),
        None
    );
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

    std::fs::remove_dir_all(&dir).unwrap();
}
