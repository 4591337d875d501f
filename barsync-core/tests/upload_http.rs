//! Integration tests for HttpUploader against a loopback HTTP server.

use barsync_core::bar::Bar;
use barsync_core::encode::{decode, encode, EncodedHistory};
use barsync_core::upload::{HttpUploader, UploadError, Uploader};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

// ── Minimal HTTP/1.1 capture server ─────────────────────────────────

struct CapturedRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut tmp).unwrap();
        assert!(n > 0, "connection closed mid-request");
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos;
        }
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = header_text.lines();
    let request_line = lines.next().unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap().to_string();
    let path = parts.next().unwrap().to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut tmp).unwrap();
        assert!(n > 0, "connection closed mid-body");
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(content_length);

    CapturedRequest {
        method,
        path,
        headers,
        body,
    }
}

fn respond(stream: &mut TcpStream, status: u16, reason: &str, body: &str) {
    let resp = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(resp.as_bytes()).unwrap();
    stream.flush().unwrap();
}

/// Accept exactly one request, answer with the given status, and hand
/// the captured request back through the join handle.
fn one_shot_server(
    status: u16,
    reason: &'static str,
    body: &'static str,
) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let req = read_request(&mut stream);
        respond(&mut stream, status, reason, body);
        req
    });
    (format!("http://{addr}/ingest"), handle)
}

fn sample_payload() -> (Vec<Bar>, EncodedHistory) {
    let bars = vec![
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            open: 10.0,
            high: 11.0,
            low: 9.5,
            close: 10.5,
            volume: 120_000,
            amount: 1_260_000.0,
        },
        Bar {
            date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            open: 10.5,
            high: 10.9,
            low: 10.1,
            close: 10.2,
            volume: 95_000,
            amount: 969_000.0,
        },
    ];
    let payload = encode(&bars).unwrap();
    (bars, payload)
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn upload_posts_payload_with_expected_headers() {
    let (bars, payload) = sample_payload();
    let (endpoint, server) = one_shot_server(200, "OK", "stored");

    let uploader = HttpUploader::new(endpoint, "test-key");
    uploader.upload("sh.600000", &payload).unwrap();

    let req = server.join().unwrap();
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/ingest");
    assert_eq!(req.headers.get("x-api-key").map(String::as_str), Some("test-key"));
    assert_eq!(
        req.headers.get("x-stock-code").map(String::as_str),
        Some("sh.600000")
    );
    assert_eq!(
        req.headers.get("content-type").map(String::as_str),
        Some("application/octet-stream")
    );
    assert!(
        req.headers
            .get("user-agent")
            .is_some_and(|ua| ua.starts_with("barsync/")),
        "user agent: {:?}",
        req.headers.get("user-agent")
    );

    // The body must be the exact payload, still decodable.
    assert_eq!(req.body, payload.bytes());
    assert_eq!(decode(&req.body).unwrap(), bars);
}

#[test]
fn non_success_status_maps_to_status_error() {
    let (_, payload) = sample_payload();
    let (endpoint, server) = one_shot_server(500, "Internal Server Error", "ingest exploded");

    let uploader = HttpUploader::new(endpoint, "test-key");
    let err = uploader.upload("sh.600000", &payload).unwrap_err();

    match err {
        UploadError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "ingest exploded");
        }
        other => panic!("expected Status error, got: {other:?}"),
    }

    server.join().unwrap();
}

#[test]
fn client_rejection_keeps_response_body_for_diagnosis() {
    let (_, payload) = sample_payload();
    let (endpoint, server) = one_shot_server(401, "Unauthorized", "bad api key");

    let uploader = HttpUploader::new(endpoint, "wrong-key");
    let err = uploader.upload("sh.600000", &payload).unwrap_err();

    match err {
        UploadError::Status { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad api key");
        }
        other => panic!("expected Status error, got: {other:?}"),
    }

    server.join().unwrap();
}

#[test]
fn connection_failure_maps_to_transport_error() {
    let (_, payload) = sample_payload();

    // Nothing listens on port 1.
    let uploader = HttpUploader::new("http://127.0.0.1:1/ingest", "test-key");
    let err = uploader.upload("sh.600000", &payload).unwrap_err();

    assert!(matches!(err, UploadError::Transport(_)), "got {err:?}");
}
