//! End-to-end command flows against a mock Quip server.

use async_trait::async_trait;
use quip_api::{DocumentHandle, QuipClient};
use quip_sync::{
    vault, CommandOutcome, GfmConverter, Host, Importer, MemoryVault, Notifier, QuipPlugin,
    Reconciler, RenderError, Renderer, Settings, Vault, VaultIndex,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Note bodies in these tests are already HTML.
struct HtmlBodies;

#[async_trait]
impl Renderer for HtmlBodies {
    async fn render(&self, markdown: &str, _source_path: &str) -> Result<String, RenderError> {
        Ok(obsidian_fs::split_frontmatter(markdown).1.to_string())
    }
}

#[derive(Default)]
struct Messages(Mutex<Vec<String>>);

impl Notifier for Messages {
    fn notice(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }

    fn success(&self, message: &str, link: &str) {
        self.0.lock().unwrap().push(format!("{}: {}", message, link));
    }
}

fn settings_for(server: &MockServer) -> Settings {
    Settings {
        hostname: server.uri(),
        token: "test-token".to_string(),
        ..Settings::default()
    }
}

fn plugin_with(
    settings: Settings,
    vault: Arc<MemoryVault>,
) -> (QuipPlugin, Arc<Messages>) {
    let messages = Arc::new(Messages::default());
    let vault: Arc<dyn Vault> = vault;
    let host = Host {
        resolver: Arc::new(VaultIndex::new(vault.clone())),
        vault,
        renderer: Arc::new(HtmlBodies),
        converter: Arc::new(GfmConverter::default()),
        notifier: messages.clone(),
    };
    (QuipPlugin::new(settings, host), messages)
}

fn thread_json(id: &str, title: &str, link: &str) -> serde_json::Value {
    json!({
        "thread": {
            "id": id,
            "title": title,
            "link": link,
            "updated_usec": 1700000000000000i64
        }
    })
}

#[tokio::test]
async fn publish_creates_one_document_and_links_note() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/threads/new-document"))
        .and(body_string_contains("format=html"))
        .and(body_string_contains("content=%3Cp%3EHello%3C%2Fp%3E"))
        .respond_with(ResponseTemplate::new(200).set_body_json(thread_json(
            "T1",
            "Note",
            "https://acme.quip.com/AbC123",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let files = Arc::new(MemoryVault::with_files([("Note.md", "<p>Hello</p>")]));
    let (plugin, messages) = plugin_with(settings_for(&server), files.clone());

    let outcome = plugin.publish_html("Note.md").await.unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::Published {
            path: "Note.md".to_string(),
            link: "https://acme.quip.com/AbC123".to_string(),
        }
    );

    let link = vault::frontmatter_string(files.as_ref(), "Note.md", "quip").await.unwrap();
    assert_eq!(link.as_deref(), Some("https://acme.quip.com/AbC123"));
    assert!(files.read_to_string("Note.md").await.unwrap().ends_with("<p>Hello</p>"));

    let messages = messages.0.lock().unwrap().clone();
    assert_eq!(
        messages.last().map(String::as_str),
        Some("Published to Quip: https://acme.quip.com/AbC123")
    );
}

#[tokio::test]
async fn publish_without_add_link_leaves_note_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/threads/new-document"))
        .and(body_string_contains("title=Note"))
        .respond_with(ResponseTemplate::new(200).set_body_json(thread_json(
            "T1",
            "Note",
            "https://acme.quip.com/AbC123",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let settings = Settings {
        add_link: false,
        prepend_title: true,
        ..settings_for(&server)
    };
    let files = Arc::new(MemoryVault::with_files([("Note.md", "<p>Hello</p>")]));
    let (plugin, _) = plugin_with(settings, files.clone());

    plugin.publish_html("Note.md").await.unwrap();
    assert!(files.written_paths().await.is_empty());
}

#[tokio::test]
async fn update_replaces_old_sections() {
    let server = MockServer::start().await;
    let after_prepend = "<h1 id='n1'>New</h1><p>fresh</p>\
        <h1 id='m1'>DELETE1</h1><p><em>Delete after this marker</em></p>\
        <h1 id='s1'>Old</h1><p>stale</p>";

    Mock::given(method("POST"))
        .and(path("/1/threads/edit-document"))
        .and(body_string_contains("location=1&"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "thread": { "id": "T1", "link": "https://acme.quip.com/AbC123" },
            "html": after_prepend
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/threads/edit-document"))
        .and(body_string_contains("section_id=s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "thread": { "id": "T1", "link": "https://acme.quip.com/AbC123" },
            "html": "<h1 id='n1'>New</h1><p>fresh</p><h1 id='m1'>DELETE1</h1>"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1/threads/edit-document"))
        .and(body_string_contains("document_range=DELETE1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "thread": { "id": "T1", "link": "https://acme.quip.com/AbC123" },
            "html": "<h1 id='n1'>New</h1><p>fresh</p>"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = QuipClient::new(&server.uri(), "test-token").unwrap();
    let report = Reconciler::new(&client)
        .reconcile_with_marker(
            &DocumentHandle::SecretPath("AbC123".to_string()),
            "<h1 id='n1'>New</h1><p>fresh</p>",
            "DELETE1",
        )
        .await
        .unwrap();

    assert_eq!(report.removed_sections, 1);
    assert_eq!(report.html, "<h1 id='n1'>New</h1><p>fresh</p>");
}

#[tokio::test]
async fn import_downloads_images_and_links_known_notes() {
    let server = MockServer::start().await;
    let html = format!(
        "<h1>Plan</h1><p>See <a href=\"{}/XyZ789/Budget\">Budget</a></p>\
         <p><img src=\"/blob/T1/img1\"></p><script>alert(1)</script>",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123/html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "html": html, "response_metadata": {} })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(thread_json(
            "T1",
            "Q3 Plan",
            "https://acme.quip.com/AbC123",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/blob/T1/img1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .expect(1)
        .mount(&server)
        .await;

    let files = Arc::new(MemoryVault::with_files([(
        "Budget.md",
        "---\nquip: https://acme.quip.com/XyZ789\n---\nnumbers",
    )]));
    let shared: Arc<dyn Vault> = files.clone();
    let index = VaultIndex::new(shared);
    let client = QuipClient::new(&server.uri(), "test-token").unwrap();
    let converter = GfmConverter::default();
    let link = format!("{}/AbC123", server.uri());

    let note = Importer::new(&client, files.as_ref(), &index, &converter)
        .import(&link, "Imports")
        .await
        .unwrap();

    assert_eq!(note.path, "Imports/Q3 Plan.md");
    assert_eq!(note.attachments, vec!["Imports/Q3_Plan-blob-T1-img1.png"]);
    assert_eq!(
        files.read("Imports/Q3_Plan-blob-T1-img1.png").await.unwrap(),
        vec![0x89, b'P', b'N', b'G']
    );

    let raw = files.read_to_string("Imports/Q3 Plan.md").await.unwrap();
    assert!(raw.contains("![](Q3_Plan-blob-T1-img1.png)"));
    assert!(raw.contains("[Budget](Budget.md)"));
    assert!(!raw.contains("alert"));

    let fm = vault::read_frontmatter(files.as_ref(), "Imports/Q3 Plan.md").await.unwrap();
    assert_eq!(fm["title"], "Q3 Plan");
    assert_eq!(fm["quip"], link.as_str());
    assert_eq!(fm["quip_thread_imported"]["id"], "T1");
    assert_eq!(fm["quip_thread_imported"]["updated_usec"], 1700000000000000i64);
}

#[tokio::test]
async fn refresh_keeps_user_front_matter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123/html"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "html": "<p>v2</p>" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(thread_json(
            "T1",
            "Plan",
            "https://acme.quip.com/AbC123",
        )))
        .mount(&server)
        .await;

    let link = format!("{}/AbC123", server.uri());
    let files = Arc::new(MemoryVault::with_files([(
        "Work/Plan.md".to_string(),
        format!("---\nquip: {}\ntags: [plans]\n---\nv1", link),
    )]));
    let (plugin, _) = plugin_with(settings_for(&server), files.clone());

    let outcome = plugin.refresh("Work/Plan.md").await.unwrap();
    assert!(matches!(outcome, CommandOutcome::Imported(ref note) if note.path == "Work/Plan.md"));

    let raw = files.read_to_string("Work/Plan.md").await.unwrap();
    assert!(raw.ends_with("v2\n"));
    let fm = vault::read_frontmatter(files.as_ref(), "Work/Plan.md").await.unwrap();
    assert_eq!(fm["tags"], json!(["plans"]));
    assert_eq!(fm["title"], "Plan");
}
