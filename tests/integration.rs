//! Binary-level tests: run `docwiki` against scratch directories and a mock
//! chat-completions server.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::write_spec;

fn docwiki_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docwiki");
    path
}

fn setup_test_env(base_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();
    fs::create_dir_all(root.join("docs")).unwrap();

    let config_content = format!(
        r#"[llm]
base_url = "{}"
api_key_env = "DOCWIKI_TEST_KEY"

[output]
dir = "{}/kb"
"#,
        base_url,
        root.display()
    );
    let config_path = root.join("docwiki.toml");
    fs::write(&config_path, config_content).unwrap();
    (tmp, config_path)
}

async fn run_docwiki(
    config_path: &Path,
    api_key: Option<&str>,
    args: &[&str],
) -> (String, String, bool) {
    let binary = docwiki_binary();
    let mut cmd = tokio::process::Command::new(&binary);
    cmd.arg("--config")
        .arg(config_path)
        .args(args)
        .current_dir(config_path.parent().unwrap())
        .env_remove("DOCWIKI_TEST_KEY")
        .env_remove("RUST_LOG");
    if let Some(key) = api_key {
        cmd.env("DOCWIKI_TEST_KEY", key);
    }
    let output = cmd
        .output()
        .await
        .unwrap_or_else(|e| panic!("Failed to run docwiki binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

async fn mock_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("extract its metadata"))
        .respond_with(completion(
            "```json\n{\"products\": [\"QMS\", \"BULKmetrix\"], \"client_name\": null, \
             \"document_type\": \"Technical Specification\", \"document_category\": \"Controls\"}\n```",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("knowledge about BULKmetrix"))
        .respond_with(completion("INSUFFICIENT_INFORMATION"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("knowledge about QMS"))
        .respond_with(completion("## Overview\n\nQMS tracks quality per plant."))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("INSUFFICIENT_INFORMATION"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn status_on_empty_knowledge_base() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9");
    let (stdout, _, ok) = run_docwiki(&config, None, &["status"]).await;
    assert!(ok);
    assert!(stdout.contains("knowledge base"));
    assert!(stdout.contains("empty"));
}

#[tokio::test]
async fn build_without_api_key_fails() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9");
    let doc = write_spec(&tmp.path().join("docs"), "spec.docx", Some("2020-07-15T14:30:00Z"));
    let (_, stderr, ok) = run_docwiki(&config, None, &["build", doc.to_str().unwrap()]).await;
    assert!(!ok);
    assert!(stderr.contains("DOCWIKI_TEST_KEY"), "stderr: {}", stderr);
}

#[tokio::test]
async fn build_without_inputs_fails() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9");
    let (_, stderr, ok) = run_docwiki(&config, Some("sk-test"), &["build"]).await;
    assert!(!ok);
    assert!(stderr.contains("Nothing to build"));
}

#[tokio::test]
async fn invalid_progress_mode_is_rejected() {
    let (_tmp, config) = setup_test_env("http://127.0.0.1:9");
    let (_, stderr, ok) =
        run_docwiki(&config, Some("sk-test"), &["build", "--progress", "loud"]).await;
    assert!(!ok);
    assert!(stderr.contains("invalid progress mode"));
}

#[tokio::test]
async fn ping_reports_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(completion("OK"))
        .mount(&server)
        .await;
    let (_tmp, config) = setup_test_env(&server.uri());
    let (stdout, _, ok) = run_docwiki(&config, Some("sk-test"), &["ping"]).await;
    assert!(ok);
    assert!(stdout.contains("reply: OK"));
}

#[tokio::test]
async fn build_directory_then_rebuild_is_idempotent() {
    let server = mock_backend().await;
    let (tmp, config) = setup_test_env(&server.uri());
    let docs = tmp.path().join("docs");
    write_spec(&docs, "spec.docx", Some("2020-07-15T14:30:00Z"));
    fs::write(docs.join("~$spec.docx"), b"lock").unwrap();
    let docs_arg = docs.to_str().unwrap();

    let args = ["build", "--dir", docs_arg, "--yes", "--progress", "json"];
    let (stdout, stderr, ok) = run_docwiki(&config, Some("sk-test"), &args).await;
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("documents: 1"));
    assert!(stdout.contains("articles written: 1"));
    assert!(stderr.contains("\"event\":\"written\""));
    assert!(stderr.contains("insufficient information"));

    let article = tmp.path().join("kb/Products/QMS/overview.md");
    let text = fs::read_to_string(&article).unwrap();
    assert!(text.contains("source_document_modified: \"2020-07-15T14:30:00\""));
    assert!(!tmp.path().join("kb/Products/BULKmetrix").exists());

    let (stdout, _, ok) = run_docwiki(&config, Some("sk-test"), &args).await;
    assert!(ok);
    assert!(stdout.contains("articles written: 0"));
    assert!(stdout.contains("up to date: 1"));

    let (stdout, _, ok) = run_docwiki(&config, None, &["status"]).await;
    assert!(ok);
    assert!(stdout.contains("2020-07-15T14:30:00  Products/QMS/overview.md"));
}

#[tokio::test]
async fn directory_prompt_declined_processes_nothing() {
    let (tmp, config) = setup_test_env("http://127.0.0.1:9");
    write_spec(&tmp.path().join("docs"), "spec.docx", Some("2020-07-15T14:30:00Z"));
    let docs_arg = tmp.path().join("docs");
    // stdin is not connected, so the prompt reads end-of-input.
    let (stdout, _, ok) = run_docwiki(
        &config,
        Some("sk-test"),
        &["build", "--dir", docs_arg.to_str().unwrap()],
    )
    .await;
    assert!(ok);
    assert!(stdout.contains("1. spec.docx"));
    assert!(stdout.contains("no documents selected"));
}

#[tokio::test]
async fn default_progress_reports_skips_on_stderr() {
    let server = mock_backend().await;
    let (tmp, config) = setup_test_env(&server.uri());
    let doc = write_spec(&tmp.path().join("docs"), "spec.docx", Some("2020-07-15T14:30:00Z"));
    let args = ["build", doc.to_str().unwrap()];

    let (_, stderr, ok) = run_docwiki(&config, Some("sk-test"), &args).await;
    assert!(ok, "stderr: {}", stderr);
    assert!(stderr.contains("BULKmetrix (Product Overview): insufficient information"));

    let (stdout, stderr, ok) = run_docwiki(&config, Some("sk-test"), &args).await;
    assert!(ok);
    assert!(stdout.contains("up to date: 1"));
    assert!(
        stderr.contains("QMS (Product Overview) is up-to-date (source: 2020-07-15T14:30:00)"),
        "stderr: {}",
        stderr
    );
}

#[tokio::test]
async fn failed_document_exits_non_zero() {
    let server = mock_backend().await;
    let (tmp, config) = setup_test_env(&server.uri());
    let broken = tmp.path().join("docs/broken.docx");
    fs::write(&broken, b"not a zip").unwrap();

    let (stdout, stderr, ok) =
        run_docwiki(&config, Some("sk-test"), &["build", broken.to_str().unwrap()]).await;
    assert!(!ok);
    assert!(stdout.contains("documents failed: 1"));
    assert!(stdout.contains("done with errors"));
    assert!(stderr.contains("Build incomplete"));
}
