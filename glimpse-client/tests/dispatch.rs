//! Dispatch Tests: fallback order, response normalization and time bounds
//! against a loopback fake of the model server and shell-script stand-ins
//! for the local inference program.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use glimpse_client::{ClientConfig, InferenceError, InferenceRequest, VisionClient};
use serde_json::{Value, json};
use serial_test::serial;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// ---------------------------------------------------------------------------
// Fake model server
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Reply {
    Status(u16, String),
    Hang,
}

type Log = Arc<Mutex<Vec<(String, String)>>>;

struct FakeServer {
    base_url: String,
    log: Log,
}

impl FakeServer {
    async fn start(routes: Vec<(&'static str, Reply)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let base_url = format!("http://{}", listener.local_addr().expect("addr"));
        let log: Log = Arc::default();
        let server_log = Arc::clone(&log);
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = Arc::clone(&routes);
                let log = Arc::clone(&server_log);
                tokio::spawn(async move { serve(stream, &routes, &log).await });
            }
        });

        Self { base_url, log }
    }

    /// POSTed paths in arrival order.
    fn posted(&self) -> Vec<String> {
        self.log
            .lock()
            .expect("log")
            .iter()
            .filter(|(path, _)| path != "/")
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn body_for(&self, path: &str) -> Value {
        let log = self.log.lock().expect("log");
        let (_, body) = log.iter().find(|(p, _)| p == path).expect("request logged");
        serde_json::from_str(body).expect("json body")
    }
}

async fn serve(mut stream: TcpStream, routes: &[(&'static str, Reply)], log: &Log) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let Ok(n) = stream.read(&mut chunk).await else { return };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);
    while buf.len() < head_end + content_length {
        let Ok(n) = stream.read(&mut chunk).await else { return };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[head_end..]).to_string();
    log.lock().expect("log").push((path.clone(), body));

    let reply = routes
        .iter()
        .find(|(route, _)| *route == path)
        .map(|(_, reply)| reply.clone())
        .unwrap_or_else(|| Reply::Status(200, "Ollama is running".into()));

    match reply {
        Reply::Hang => tokio::time::sleep(Duration::from_secs(3600)).await,
        Reply::Status(code, body) => {
            let response = format!(
                "HTTP/1.1 {code} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    }
}

fn ok(body: Value) -> Reply {
    Reply::Status(200, body.to_string())
}

/// A base URL with nothing listening behind it.
fn dead_url() -> String {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .expect("bind")
        .local_addr()
        .expect("addr")
        .port();
    format!("http://127.0.0.1:{port}")
}

fn http_only(base_url: &str) -> ClientConfig {
    ClientConfig {
        process_fallback: false,
        request_timeout_ms: 2_000,
        ..ClientConfig::for_model("vl:test").with_base_url(base_url)
    }
}

fn with_program(base_url: &str, program: &str) -> ClientConfig {
    ClientConfig {
        program: program.to_string(),
        process_timeout_ms: 5_000,
        ..ClientConfig::for_model("vl:test").with_base_url(base_url)
    }
}

#[cfg(unix)]
fn stub_program(dir: &tempfile::TempDir, script: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("fake-ollama");
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).expect("write stub");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// HTTP chain
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completion_answers_after_chat_rejects() {
    let server = FakeServer::start(vec![
        ("/api/chat", Reply::Status(500, r#"{"error":"boom"}"#.into())),
        ("/api/generate", ok(json!({ "response": "hello" }))),
    ])
    .await;
    let client = VisionClient::new(http_only(&server.base_url));

    let response = client
        .generate(&InferenceRequest::new("Say hello"))
        .await
        .expect("answer");

    assert_eq!(response.text, "hello");
    assert_eq!(response.transport, "completion");
    assert_eq!(server.posted(), vec!["/api/chat", "/api/generate"]);
}

#[tokio::test]
async fn chat_success_skips_completion() {
    let server = FakeServer::start(vec![(
        "/api/chat",
        ok(json!({ "message": { "role": "assistant", "content": "a red bicycle" } })),
    )])
    .await;
    let client = VisionClient::new(http_only(&server.base_url));

    let response = client
        .generate(&InferenceRequest::new("describe").with_image(b"img".to_vec()))
        .await
        .expect("answer");

    assert_eq!(response.text, "a red bicycle");
    assert_eq!(server.posted(), vec!["/api/chat"]);
}

#[tokio::test]
async fn empty_chat_content_falls_back_to_thinking() {
    let server = FakeServer::start(vec![(
        "/api/chat",
        ok(json!({ "message": { "content": "", "thinking": "reasoning text" } })),
    )])
    .await;
    let client = VisionClient::new(http_only(&server.base_url));

    let response = client
        .generate(&InferenceRequest::new("describe"))
        .await
        .expect("answer");
    assert_eq!(response.text, "reasoning text");
}

#[tokio::test]
async fn unrecognised_body_is_returned_whole() {
    let body = json!({ "done": true, "eval_count": 12, "output": { "text": "x" } });
    let server = FakeServer::start(vec![("/api/chat", ok(body.clone()))]).await;
    let client = VisionClient::new(http_only(&server.base_url));

    let response = client
        .generate(&InferenceRequest::new("describe"))
        .await
        .expect("answer");
    let reparsed: Value = serde_json::from_str(&response.text).expect("json");
    assert_eq!(reparsed, body);
}

#[tokio::test]
async fn malformed_success_body_is_a_parse_error() {
    let server = FakeServer::start(vec![(
        "/api/chat",
        Reply::Status(200, "<html>not json</html>".into()),
    )])
    .await;
    let client = VisionClient::new(http_only(&server.base_url));

    match client.generate(&InferenceRequest::new("describe")).await {
        Err(InferenceError::ResponseParse { raw, .. }) => assert_eq!(raw, "<html>not json</html>"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(server.posted(), vec!["/api/chat"]);
}

#[tokio::test]
async fn both_payload_shapes_carry_image_and_sampling() {
    let server = FakeServer::start(vec![
        ("/api/chat", Reply::Status(404, String::new())),
        ("/api/generate", Reply::Status(404, String::new())),
    ])
    .await;
    let client = VisionClient::new(http_only(&server.base_url));

    let err = client
        .generate(
            &InferenceRequest::new("describe")
                .with_image(b"abc".to_vec())
                .with_max_output_tokens(512),
        )
        .await
        .expect_err("both rejected");
    assert!(matches!(err, InferenceError::Exhausted { attempts: 2, .. }));

    let chat = server.body_for("/api/chat");
    assert_eq!(chat["model"], "vl:test");
    assert_eq!(chat["stream"], false);
    assert_eq!(chat["messages"][0]["content"], "describe");
    assert_eq!(chat["messages"][0]["images"], json!(["YWJj"]));
    assert_eq!(chat["options"]["num_predict"], 512);
    assert_eq!(chat["options"]["top_k"], 20);

    let completion = server.body_for("/api/generate");
    assert_eq!(completion["prompt"], "describe");
    assert_eq!(completion["images"], json!(["YWJj"]));
    assert_eq!(completion["options"], chat["options"]);
}

#[tokio::test]
async fn liveness_probe_reports_server_state() {
    let server = FakeServer::start(Vec::new()).await;
    assert!(VisionClient::new(http_only(&server.base_url)).http_available().await);
    assert!(!VisionClient::new(http_only(&dead_url())).http_available().await);
}

#[tokio::test]
async fn hanging_endpoints_time_out_in_bounded_time() {
    let server = FakeServer::start(vec![("/api/chat", Reply::Hang), ("/api/generate", Reply::Hang)]).await;
    let config = ClientConfig {
        request_timeout_ms: 300,
        ..http_only(&server.base_url)
    };
    let bound = config.worst_case();
    let client = VisionClient::new(config);

    let started = Instant::now();
    let err = client
        .generate(&InferenceRequest::new("describe"))
        .await
        .expect_err("timeouts");
    let elapsed = started.elapsed();

    assert!(matches!(err, InferenceError::Exhausted { attempts: 2, .. }), "{err}");
    assert!(err.to_string().contains("timed out"));
    assert!(elapsed >= Duration::from_millis(600), "{elapsed:?}");
    assert!(elapsed <= bound + Duration::from_millis(500), "{elapsed:?} > {bound:?}");
}

// ---------------------------------------------------------------------------
// Local process fallback
// ---------------------------------------------------------------------------

#[tokio::test]
#[serial]
async fn nothing_available_reports_missing_backend() {
    let client = VisionClient::new(with_program(&dead_url(), "glimpse-no-such-program"));

    let err = client
        .generate(&InferenceRequest::new("Say hello"))
        .await
        .expect_err("no backend");
    assert!(matches!(err, InferenceError::SubprocessMissing { .. }));
    assert!(err.to_string().contains("not available"));
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn process_fallback_returns_stdout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = stub_program(&dir, "exec cat -");
    let client = VisionClient::new(with_program(&dead_url(), &program));

    let prompt = "Describe the scene.\nBe concise.";
    let response = client
        .generate(&InferenceRequest::new(prompt).with_image(b"ignored".to_vec()))
        .await
        .expect("answer");
    assert_eq!(response.text, prompt);
    assert_eq!(response.transport, "process");
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn process_fallback_passes_model_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = stub_program(&dir, r#"cat - >/dev/null; echo "$1 $2""#);
    let client = VisionClient::new(with_program(&dead_url(), &program));

    let response = client
        .generate(&InferenceRequest::new("hi"))
        .await
        .expect("answer");
    assert_eq!(response.text.trim(), "run vl:test");
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn process_failure_carries_stderr() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = stub_program(&dir, "echo 'model not loaded' >&2; exit 3");
    let client = VisionClient::new(with_program(&dead_url(), &program));

    match client.generate(&InferenceRequest::new("hi")).await {
        Err(InferenceError::SubprocessFailed { status, stderr, .. }) => {
            assert_eq!(status, Some(3));
            assert!(stderr.contains("model not loaded"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn slow_process_is_killed_at_the_bound() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = stub_program(&dir, "exec sleep 30");
    let config = ClientConfig {
        process_timeout_ms: 300,
        ..with_program(&dead_url(), &program)
    };
    let client = VisionClient::new(config);

    let started = Instant::now();
    let err = client
        .generate(&InferenceRequest::new("hi"))
        .await
        .expect_err("timeout");
    assert!(matches!(err, InferenceError::Exhausted { .. }), "{err}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn http_answer_wins_over_process() {
    let dir = tempfile::tempdir().expect("tempdir");
    let program = stub_program(&dir, "echo from-process");
    let server = FakeServer::start(vec![("/api/chat", ok(json!({ "response": "from-http" })))]).await;
    let client = VisionClient::new(with_program(&server.base_url, &program));

    let response = client
        .generate(&InferenceRequest::new("hi"))
        .await
        .expect("answer");
    assert_eq!(response.text, "from-http");
}
