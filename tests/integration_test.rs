use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

// Use atomic counter to give each test a unique port
static PORT_COUNTER: AtomicU16 = AtomicU16::new(9400);

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct InfoResponse {
    version: String,
    engine: Option<Value>,
    available_engines: Vec<String>,
    script_hint: String,
    completion_configured: bool,
    supported_formats: Vec<String>,
    max_file_size_bytes: usize,
}

struct TestServer {
    child: Child,
    port: u16,
}

impl TestServer {
    /// Server with recognition and text completion disabled
    async fn start(extra_args: &[&str]) -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);

        let child = Command::new(env!("CARGO_BIN_EXE_docscan-ocr-server"))
            .args([
                "--host",
                "127.0.0.1",
                "--port",
                &port.to_string(),
                "--engine",
                "none",
                "--llm-api-keys=",
            ])
            .args(extra_args)
            .spawn()
            .expect("Failed to start server");

        let server = Self { child, port };
        server.wait_ready().await;
        server
    }

    async fn wait_ready(&self) {
        let client = reqwest::Client::new();
        for _ in 0..100 {
            if client
                .get(format!("{}/health", self.base_url()))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready on port {}", self.port);
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

async fn upload(server: &TestServer, form: Form) -> (reqwest::StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/extract", server.base_url()))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status();
    (status, response.json().await.expect("Failed to parse response"))
}

fn file_part(bytes: Vec<u8>, filename: &str, mime: &str) -> Part {
    Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime)
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start(&[]).await;

    let response: HealthResponse = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response.status, "ok");
    assert!(!response.version.is_empty());
}

#[tokio::test]
async fn test_info_endpoint() {
    let server = TestServer::start(&["--languages", "ara+eng+fra"]).await;

    let info: InfoResponse = reqwest::get(format!("{}/info", server.base_url()))
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert!(info.engine.is_none());
    assert_eq!(info.script_hint, "ara+eng+fra");
    assert!(!info.completion_configured);
    assert!(info.supported_formats.contains(&"application/pdf".to_string()));
    assert_eq!(info.max_file_size_bytes, 52_428_800);
}

#[tokio::test]
async fn test_plain_text_upload() {
    let server = TestServer::start(&[]).await;
    let text = "السلام عليكم\nPlain text passes through unchanged.";
    let form = Form::new().part("file", file_part(text.as_bytes().to_vec(), "notes.txt", "text/plain"));

    let (status, json) = upload(&server, form).await;

    assert_eq!(status, 200);
    assert_eq!(json["text"], text);
    assert_eq!(json["kind"], "plain_text");
    assert!(json.get("notice").is_none());
}

#[tokio::test]
async fn test_structure_without_completion_is_single_section() {
    let server = TestServer::start(&[]).await;
    let text = "Chapter one\nIt was a long document. ".repeat(10);
    let form = Form::new()
        .part("file", file_part(text.clone().into_bytes(), "doc.txt", "text/plain"))
        .text("structure", "true");

    let (status, json) = upload(&server, form).await;

    assert_eq!(status, 200);
    let sections = json["sections"].as_array().unwrap();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0]["type"], "main");
    assert_eq!(sections[0]["content"], text.trim());
}

#[tokio::test]
async fn test_unsupported_type_gets_notice() {
    let server = TestServer::start(&[]).await;
    let form = Form::new().part(
        "file",
        file_part(
            b"PK\x03\x04\x14\x00\x06\x00 not really a docx".to_vec(),
            "report.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
    );

    let (status, json) = upload(&server, form).await;

    assert_eq!(status, 200);
    assert_eq!(json["notice"], "unsupported_file_type");
    assert_eq!(json["text"], "Could not read this file type.");
}

#[tokio::test]
async fn test_image_without_engine_reports_failure() {
    let server = TestServer::start(&[]).await;
    let png = {
        let image = image::GrayImage::from_pixel(8, 8, image::Luma([255u8]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageLuma8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    };
    let form = Form::new().part("file", file_part(png, "scan.png", "image/png"));

    let (status, json) = upload(&server, form).await;

    assert_eq!(status, 200);
    assert_eq!(json["kind"], "image");
    assert_eq!(json["notice"], "extraction_failed");
}

#[tokio::test]
async fn test_missing_file_returns_400() {
    let server = TestServer::start(&[]).await;
    let form = Form::new().text("structure", "false");

    let (status, json) = upload(&server, form).await;

    assert_eq!(status, 400);
    assert_eq!(json["code"], "MISSING_FILE");
}

#[tokio::test]
async fn test_oversized_file_returns_413() {
    let server = TestServer::start(&["--max-file-size", "1000"]).await;
    let form = Form::new().part("file", file_part(vec![b'x'; 5000], "big.txt", "text/plain"));

    let (status, json) = upload(&server, form).await;

    assert_eq!(status, 413);
    assert_eq!(json["code"], "FILE_TOO_LARGE");
}
