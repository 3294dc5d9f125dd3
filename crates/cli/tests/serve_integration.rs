//! Integration tests for the `siad serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port,
//! makes HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

const ADMIN_EMAIL: &str = "admin@siad.test";
const ADMIN_PASSWORD: &str = "integration-pass-1";

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Helper: start `siad serve` on the given port.
fn start_server(port: u16, extra_args: &[&str]) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_siad"));
    cmd.arg("serve").arg("--port").arg(port.to_string());
    cmd.args(extra_args);
    cmd.env("SIAD_ADMIN_EMAIL", ADMIN_EMAIL);
    cmd.env("SIAD_ADMIN_PASSWORD", ADMIN_PASSWORD);
    cmd.env("RUST_LOG", "warn");
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());

    let child = cmd.spawn().expect("failed to start siad serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            return child;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    child
}

/// Helper: send a raw HTTP request and return (status, headers, body).
fn http_request(
    port: u16,
    method: &str,
    path: &str,
    extra_headers: &[(&str, &str)],
    body: Option<&str>,
) -> (u16, String, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    if let Some(body) = body {
        header_lines.push_str(&format!(
            "Content-Type: application/json\r\nContent-Length: {}\r\n",
            body.len()
        ));
    }

    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Connection: close\r\n\r\n{}",
        method,
        path,
        port,
        header_lines,
        body.unwrap_or("")
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response(&response)
}

/// Extract a header value from raw headers string.
fn extract_header<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    let name_lower = name.to_lowercase();
    for line in headers.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().to_lowercase() == name_lower {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Parse an HTTP response into (status_code, headers_string, body).
fn parse_http_response(response: &str) -> (u16, String, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status_line = headers.lines().next().unwrap_or("");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    let body = if headers.to_lowercase().contains("transfer-encoding: chunked") {
        decode_chunked(&body)
    } else {
        body
    };

    (status, headers, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }

    result
}

fn login(port: u16) -> String {
    let body = format!(
        r#"{{"email":"{}","password":"{}"}}"#,
        ADMIN_EMAIL, ADMIN_PASSWORD
    );
    let (status, _, body) = http_request(port, "POST", "/api/auth/login", &[], Some(&body));
    assert_eq!(status, 200, "login failed: {}", body);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    json["data"]["token"].as_str().unwrap().to_string()
}

#[test]
fn health_returns_envelope_with_version() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let (status, _, body) = http_request(port, "GET", "/api/health", &[], None);
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["version"], env!("CARGO_PKG_VERSION"));

    child.kill().ok();
    child.wait().ok();
}

#[test]
fn favicon_carries_cache_header() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let (status, headers, body) = http_request(port, "GET", "/favicon.ico", &[], None);
    assert_eq!(status, 200);
    assert_eq!(
        extract_header(&headers, "cache-control"),
        Some("public, max-age=3600")
    );
    assert!(body.contains("<svg"));

    child.kill().ok();
    child.wait().ok();
}

#[test]
fn dashboard_without_cookie_redirects_to_login() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let (status, headers, _) = http_request(port, "GET", "/dashboard/documents", &[], None);
    assert_eq!(status, 307);
    assert_eq!(extract_header(&headers, "location"), Some("/login"));

    let (status, headers, _) = http_request(port, "GET", "/", &[], None);
    assert_eq!(status, 307);
    assert_eq!(extract_header(&headers, "location"), Some("/login"));

    child.kill().ok();
    child.wait().ok();
}

#[test]
fn api_requires_session_and_accepts_cookie() {
    let port = next_port();
    let mut child = start_server(port, &[]);

    let (status, _, body) = http_request(port, "GET", "/api/archivadores", &[], None);
    assert_eq!(status, 401);
    assert!(body.contains("\"status\":\"error\""));

    let token = login(port);
    let cookie = format!("access_token={}", token);
    let (status, _, body) =
        http_request(port, "GET", "/api/archivadores", &[("Cookie", &cookie)], None);
    assert_eq!(status, 200, "{}", body);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["pagination"]["page"], 1);

    child.kill().ok();
    child.wait().ok();
}

#[test]
fn rate_limit_rejects_excess_requests() {
    let port = next_port();
    let mut child = start_server(port, &["--rate-limit", "3"]);

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let (status, headers, _) = http_request(port, "GET", "/api/health", &[], None);
        if status == 429 {
            assert!(extract_header(&headers, "retry-after").is_some());
        }
        statuses.push(status);
    }
    assert!(statuses.contains(&429), "statuses: {:?}", statuses);

    child.kill().ok();
    child.wait().ok();
}
