//! Wire-format tests: point the gateway at a one-shot HTTP/1.1 server on
//! loopback, issue a call, and assert the request it sent.
//!
//! No external network access is needed.

use std::collections::HashMap;
use std::time::Duration;

use paperdesk_core::models::{ChatRequest, TaskStatus};
use paperdesk_core::{ApiClient, ClientConfig};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

// ── Minimal HTTP/1.1 server ─────────────────────────────────────────────

#[derive(Debug)]
struct CapturedRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl CapturedRequest {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let params = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |s: &str| {
                urlencoding::decode(&s.replace('+', " "))
                    .unwrap()
                    .into_owned()
            };
            (decode(k), decode(v))
        })
        .collect();
    (path.to_string(), params)
}

/// Accept exactly one request on a random loopback port, capture it, and
/// answer with `200` and the given JSON body. Returns a client aimed at the
/// server's `/api` prefix and a receiver for the captured request.
async fn serve_once(resp_body: &'static str) -> (ApiClient, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = oneshot::channel::<CapturedRequest>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).await.unwrap();
        let mut parts = request_line.trim().splitn(3, ' ');
        let method = parts.next().unwrap_or("").to_string();
        let (path, query) = split_target(parts.next().unwrap_or(""));

        let mut headers = HashMap::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some((k, v)) = trimmed.split_once(": ") {
                let key = k.to_lowercase();
                if key == "content-length" {
                    content_length = v.parse().unwrap_or(0);
                }
                headers.insert(key, v.to_string());
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await.unwrap();

        let _ = tx.send(CapturedRequest {
            method,
            path,
            query,
            headers,
            body,
        });

        let http_resp = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            resp_body.len(),
            resp_body,
        );
        let _ = write_half.write_all(http_resp.as_bytes()).await;
    });

    let client = ApiClient::new(ClientConfig {
        base_url: format!("http://127.0.0.1:{port}/api"),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    (client, rx)
}

const TICKET: &str = r#"{"task_id":"t1","status":"pending","message":"queued"}"#;

// ── Upload & parse ──────────────────────────────────────────────────────

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let (client, rx) = serve_once(TICKET).await;

    let resp = client
        .upload_paper("attention.pdf", b"%PDF-1.4 body".to_vec())
        .await
        .unwrap();
    let req = rx.await.unwrap();

    assert_eq!(resp.task_id, "t1");
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/api/upload");
    assert!(
        req.headers["content-type"].starts_with("multipart/form-data; boundary="),
        "content-type was {}",
        req.headers["content-type"]
    );
    let body = req.body_text();
    assert!(body.contains(r#"name="file""#), "body: {body}");
    assert!(body.contains(r#"filename="attention.pdf""#), "body: {body}");
    assert!(body.contains("application/pdf"));
    assert!(body.contains("%PDF-1.4 body"));
}

#[tokio::test]
async fn parse_url_passes_url_as_query() {
    let (client, rx) = serve_once(TICKET).await;

    client
        .parse_url("https://arxiv.org/pdf/1706.03762?v=7&x=1")
        .await
        .unwrap();
    let req = rx.await.unwrap();

    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/api/parse_url");
    assert_eq!(req.query["url"], "https://arxiv.org/pdf/1706.03762?v=7&x=1");
}

#[tokio::test]
async fn parse_status_path() {
    let (client, rx) = serve_once(r#"{"task_id":"t1","status":"processing","progress":40}"#).await;

    let status = client.parse_status("t1").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(status.progress, Some(40));
    assert_eq!((req.method.as_str(), req.path.as_str()), ("GET", "/api/parse_status/t1"));
}

// ── Papers ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_paper_encodes_path_segment() {
    let (client, rx) = serve_once(r#"{"paper_id":"a b/c"}"#).await;

    client.get_paper("a b/c").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(req.method, "GET");
    assert_eq!(req.path, "/api/paper/a%20b%2Fc");
}

#[tokio::test]
async fn list_papers_path() {
    let (client, rx) = serve_once(r#"{"total":0,"papers":[]}"#).await;

    client.list_papers().await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!((req.method.as_str(), req.path.as_str()), ("GET", "/api/papers/list"));
}

#[tokio::test]
async fn delete_paper_path() {
    let (client, rx) = serve_once(r#"{"message":"deleted"}"#).await;

    let ack = client.delete_paper("p1").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(ack.message.as_deref(), Some("deleted"));
    assert_eq!((req.method.as_str(), req.path.as_str()), ("DELETE", "/api/paper/p1"));
}

// ── Translation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn translate_sends_language_query() {
    let (client, rx) = serve_once(TICKET).await;

    client.translate_paper("p1", "英文", "中文").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!((req.method.as_str(), req.path.as_str()), ("POST", "/api/translate/p1"));
    assert_eq!(req.query["source_lang"], "英文");
    assert_eq!(req.query["target_lang"], "中文");
}

#[tokio::test]
async fn translation_status_path() {
    let (client, rx) = serve_once(r#"{"status":"completed","progress":100}"#).await;

    let progress = client.translation_status("p1_translation").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(progress.status, TaskStatus::Completed);
    assert_eq!(
        (req.method.as_str(), req.path.as_str()),
        ("GET", "/api/translate/status/p1_translation")
    );
}

#[tokio::test]
async fn get_translation_path() {
    let (client, rx) = serve_once(r#"{"paper_id":"p1","segments":[],"status":"completed"}"#).await;

    client.get_translation("p1").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(
        (req.method.as_str(), req.path.as_str()),
        ("GET", "/api/translate/result/p1")
    );
}

// ── Summary ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_summary_sends_type_query() {
    let (client, rx) = serve_once(TICKET).await;

    client.generate_summary("p1", "comprehensive").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!((req.method.as_str(), req.path.as_str()), ("POST", "/api/summary/p1"));
    assert_eq!(req.query["summary_type"], "comprehensive");
}

#[tokio::test]
async fn get_summary_path() {
    let (client, rx) = serve_once(r#"{"paper_id":"p1","overall_summary":"short"}"#).await;

    let summary = client.get_summary("p1").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(summary.overall_summary, "short");
    assert_eq!((req.method.as_str(), req.path.as_str()), ("GET", "/api/summary/p1"));
    assert!(req.query.is_empty());
}

// ── Chat ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_chat_session_path() {
    let (client, rx) = serve_once(r#"{"session_id":"s1","paper_id":"p1"}"#).await;

    let created = client.create_chat_session("p1").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(created.session_id, "s1");
    assert_eq!(
        (req.method.as_str(), req.path.as_str()),
        ("POST", "/api/chat/new_session/p1")
    );
}

#[tokio::test]
async fn chat_sends_json_body() {
    let (client, rx) = serve_once(r#"{"session_id":"s1","message":{"role":"assistant","content":"hi"}}"#).await;

    let request = ChatRequest {
        paper_id: "p1".into(),
        message: "hello".into(),
        session_id: Some("s1".into()),
        stream: false,
    };
    let reply = client.chat("p1", &request).await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(reply.content_text().as_deref(), Some("hi"));
    assert_eq!((req.method.as_str(), req.path.as_str()), ("POST", "/api/chat/p1"));
    assert!(req.headers["content-type"].starts_with("application/json"));
    assert_eq!(
        req.json(),
        json!({"paper_id": "p1", "message": "hello", "session_id": "s1", "stream": false})
    );
}

#[tokio::test]
async fn chat_history_path() {
    let (client, rx) = serve_once(r#"{"session_id":"s1","messages":[]}"#).await;

    client.chat_history("s1").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(
        (req.method.as_str(), req.path.as_str()),
        ("GET", "/api/chat/history/s1")
    );
}

#[tokio::test]
async fn delete_chat_session_path() {
    let (client, rx) = serve_once(r#"{"message":"ok"}"#).await;

    client.delete_chat_session("s1").await.unwrap();
    let req = rx.await.unwrap();

    assert_eq!(
        (req.method.as_str(), req.path.as_str()),
        ("DELETE", "/api/chat/session/s1")
    );
}
