// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the relay submit path, exercised against a local
//! mock HTTP server.

use futures::future::{AbortHandle, Abortable, Aborted};
use qr_relay::errors::RelayError;
use qr_relay::relay::submit;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve exactly one request with a canned response; resolves to the raw
/// request text so tests can assert on what was sent.
async fn mock_server(
    status_line: &'static str,
    content_type: &'static str,
    body: &'static str,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();

        String::from_utf8_lossy(&request).into_owned()
    });

    (format!("http://{addr}"), handle)
}

/// A request is complete once the headers are terminated and the declared
/// Content-Length worth of body has arrived.
fn request_complete(bytes: &[u8]) -> bool {
    let text = String::from_utf8_lossy(bytes);
    let Some(split) = text.find("\r\n\r\n") else {
        return false;
    };
    let body_len = text[..split]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    bytes.len() >= split + 4 + body_len
}

#[tokio::test]
async fn test_submit_success_returns_reply_data() {
    let (endpoint, server) = mock_server("200 OK", "application/json", r#"{"data":"ok"}"#).await;

    let client = reqwest::Client::new();
    let reply = submit(&client, &endpoint, "ABC123").await.unwrap();
    assert_eq!(reply, "ok");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /"), "Payload must be POSTed");

    let body = request
        .split_once("\r\n\r\n")
        .expect("request should have a body")
        .1;
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(
        json["scannedText"], "ABC123",
        "Body must carry the scanned text: {body}"
    );
}

#[tokio::test]
async fn test_submit_server_error_carries_status_and_body() {
    let (endpoint, server) = mock_server("500 Internal Server Error", "text/plain", "boom").await;

    let client = reqwest::Client::new();
    let err = submit(&client, &endpoint, "XYZ").await.unwrap_err();
    match err {
        RelayError::Status { code, message } => {
            assert_eq!(code, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("Expected status error, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_submit_rejects_malformed_reply() {
    let (endpoint, server) = mock_server("200 OK", "text/plain", "not json").await;

    let client = reqwest::Client::new();
    let err = submit(&client, &endpoint, "XYZ").await.unwrap_err();
    assert!(
        matches!(err, RelayError::InvalidReply(_)),
        "Expected invalid reply error, got {err:?}"
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_submit_connection_refused_is_connect_error() {
    // Bind then drop the listener so the port is almost certainly closed
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = reqwest::Client::new();
    let err = submit(&client, &endpoint, "XYZ").await.unwrap_err();
    assert!(
        matches!(err, RelayError::Connect(_)),
        "Expected connect error, got {err:?}"
    );
}

#[tokio::test]
async fn test_aborted_submit_maps_to_cancelled() {
    // A server that accepts but never responds, so the request only ends
    // through the abort handle
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    let server = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        futures::future::pending::<()>().await;
    });

    let client = reqwest::Client::new();
    let (abort, registration) = AbortHandle::new_pair();
    let request = Abortable::new(
        async move { submit(&client, &endpoint, "ABC123").await },
        registration,
    );

    let driver = tokio::spawn(request);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    abort.abort();

    let outcome = driver.await.unwrap();
    let result = match outcome {
        Ok(settled) => settled,
        Err(Aborted) => Err(RelayError::Cancelled),
    };
    assert_eq!(result, Err(RelayError::Cancelled));
    server.abort();
}
