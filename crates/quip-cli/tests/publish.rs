//! Publishing a markdown note from a vault on disk.

use quip_cli::native_host;
use quip_sync::{vault, CommandOutcome, QuipPlugin, Settings};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn publish_markdown_note_links_front_matter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/threads/new-document"))
        .and(body_string_contains("format=html"))
        .and(body_string_contains("%3Ch1%3ETitle%3C%2Fh1%3E"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "thread": {
                "id": "T1",
                "title": "Title",
                "link": "https://acme.quip.com/AbC123"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Note.md"), "# Title\nHello").unwrap();
    let host = native_host(dir.path().to_path_buf());
    let files = host.vault.clone();
    let settings = Settings {
        hostname: server.uri(),
        token: "test-token".to_string(),
        ..Settings::default()
    };
    let plugin = QuipPlugin::new(settings, host);

    let outcome = plugin.publish_html("Note.md").await.unwrap();
    assert!(matches!(outcome, CommandOutcome::Published { ref link, .. } if link == "https://acme.quip.com/AbC123"));

    let link = vault::frontmatter_string(files.as_ref(), "Note.md", "quip").await.unwrap();
    assert_eq!(link.as_deref(), Some("https://acme.quip.com/AbC123"));
    let raw = std::fs::read_to_string(dir.path().join("Note.md")).unwrap();
    assert!(raw.ends_with("# Title\nHello"));
}
