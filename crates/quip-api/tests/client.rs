//! HTTP-level tests against a mock Quip server.

use quip_api::{
    ApiError, DocumentFormat, DocumentHandle, EditOperation, ErrorKind, QuipClient,
};
use serde_json::json;
use wiremock::matchers::{
    body_string_contains, header, method, path, query_param, query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "test-token";

fn client_for(server: &MockServer) -> QuipClient {
    QuipClient::new(&server.uri(), TOKEN).unwrap()
}

fn handle() -> DocumentHandle {
    DocumentHandle::SecretPath("AbC123".to_string())
}

fn thread_json(id: &str) -> serde_json::Value {
    json!({
        "thread": {
            "id": id,
            "title": "Doc",
            "link": format!("https://acme.quip.com/{}", id),
            "updated_usec": 1700000000000000i64
        }
    })
}

/// Mount `pages` so that page i is served for cursor `c{i}` (page 0 has no cursor).
async fn mount_pages(server: &MockServer, pages: &[&str]) {
    for (i, page) in pages.iter().enumerate() {
        let next = if i + 1 < pages.len() {
            json!({ "next_cursor": format!("c{}", i + 1) })
        } else {
            json!({})
        };
        let body = json!({ "html": page, "response_metadata": next });
        let mock = Mock::given(method("GET")).and(path("/2/threads/AbC123/html"));
        let mock = if i == 0 {
            mock.and(query_param_is_missing("cursor"))
        } else {
            mock.and(query_param("cursor", format!("c{}", i)))
        };
        mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn requests_carry_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(thread_json("AbC123")))
        .expect(1)
        .mount(&server)
        .await;

    let thread = client_for(&server).get_thread(&handle()).await.unwrap();
    assert_eq!(thread.thread.id, "AbC123");
}

#[tokio::test]
async fn single_page_html() {
    let server = MockServer::start().await;
    mount_pages(&server, &["<h1>Only</h1><p>page</p>"]).await;

    let html = client_for(&server).fetch_full_html(&handle()).await.unwrap();
    assert_eq!(html, "<h1>Only</h1><p>page</p>");
}

#[tokio::test]
async fn two_pages_concatenate_in_order() {
    let server = MockServer::start().await;
    let whole = "<h1>A</h1><p>first half</p><h1>B</h1><p>second half</p>";
    let (left, right) = whole.split_at(20);
    mount_pages(&server, &[left, right]).await;

    let html = client_for(&server).fetch_full_html(&handle()).await.unwrap();
    assert_eq!(html, whole);
}

#[tokio::test]
async fn many_pages_reproduce_the_whole_document() {
    let server = MockServer::start().await;
    let whole: String = (0..40).map(|i| format!("<p>para {}</p>", i)).collect();
    let chunks: Vec<String> = whole
        .as_bytes()
        .chunks(7)
        .map(|c| String::from_utf8(c.to_vec()).unwrap())
        .collect();
    let pages: Vec<&str> = chunks.iter().map(String::as_str).collect();
    mount_pages(&server, &pages).await;

    let html = client_for(&server).fetch_full_html(&handle()).await.unwrap();
    assert_eq!(html, whole);
}

#[tokio::test]
async fn empty_cursor_ends_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123/html"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "html": "<p>x</p>", "response_metadata": { "next_cursor": "" } }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let html = client_for(&server).fetch_full_html(&handle()).await.unwrap();
    assert_eq!(html, "<p>x</p>");
}

#[tokio::test]
async fn repeated_cursor_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123/html"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "html": "<p>a</p>", "response_metadata": { "next_cursor": "c1" } }),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123/html"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "html": "<p>b</p>", "response_metadata": { "next_cursor": "c1" } }),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_full_html(&handle()).await.unwrap_err();
    assert!(matches!(&err, ApiError::CursorLoop(cursor) if cursor == "c1"), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn failed_page_discards_partial_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123/html"))
        .and(query_param_is_missing("cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "html": "<p>first</p>", "response_metadata": { "next_cursor": "c1" } }),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/threads/AbC123/html"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_full_html(&handle()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn status_401_is_authentication() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_thread(&handle()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.to_string(), "Quip authorization failed");
}

#[tokio::test]
async fn status_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server).fetch_full_html(&handle()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn status_500_is_server_error_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/threads/edit-document"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .delete_range(&handle(), "Intro")
        .await
        .unwrap_err();
    match err {
        ApiError::Server { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "internal");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn status_400_is_validation_with_diagnostic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Bad Request",
            "error_code": 400,
            "error_description": "Invalid section_id"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .delete_section(&handle(), "nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.diagnostic().as_deref(), Some("Invalid section_id"));
}

#[tokio::test]
async fn configuration_errors_never_reach_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = QuipClient::new(&server.uri(), "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    let err = QuipClient::new("platform.quip.com", TOKEN).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn create_document_posts_html_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/threads/new-document"))
        .and(body_string_contains("format=html"))
        .and(body_string_contains("title=My+Note"))
        .respond_with(ResponseTemplate::new(200).set_body_json(thread_json("NEW1")))
        .expect(1)
        .mount(&server)
        .await;

    let created = client_for(&server)
        .create_document("<p>Hello</p>", DocumentFormat::Html, Some("My Note"))
        .await
        .unwrap();
    assert_eq!(created.thread.link, "https://acme.quip.com/NEW1");
}

#[tokio::test]
async fn prepend_sends_numeric_location() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/1/threads/edit-document"))
        .and(body_string_contains("thread_id=AbC123"))
        .and(body_string_contains("location=1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "thread": thread_json("AbC123")["thread"],
            "html": "<p>new</p>"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .edit_document(&handle(), EditOperation::Prepend("<p>new</p>".to_string()))
        .await
        .unwrap();
    assert_eq!(response.html, "<p>new</p>");
}

#[tokio::test]
async fn blob_without_content_type_defaults_to_png() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/blob/T1/img1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
        .expect(1)
        .mount(&server)
        .await;

    let blob = client_for(&server).fetch_blob("/blob/T1/img1").await.unwrap();
    assert_eq!(blob.bytes, vec![1, 2, 3]);
    assert_eq!(blob.content_type, "image/png");
}

#[tokio::test]
async fn blob_keeps_served_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/blob/T1/img2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/svg+xml")
                .set_body_bytes(b"<svg/>".to_vec()),
        )
        .mount(&server)
        .await;

    let blob = client_for(&server).fetch_blob("/blob/T1/img2").await.unwrap();
    assert_eq!(blob.content_type, "image/svg+xml");
    assert_eq!(blob.extension(), "svg");
}

#[tokio::test]
async fn search_and_recent_listings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/1/threads/search"))
        .and(query_param("only_match_titles", "true"))
        .and(query_param("query", "road map"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([thread_json("S1")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/1/threads/recent"))
        .and(query_param("count", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "R1": thread_json("R1"),
            "R2": thread_json("R2")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let found = client.search_titles("road map").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].thread.id, "S1");

    let recent = client.recent_threads(quip_api::RECENT_THREAD_COUNT).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent["R2"].thread.id, "R2");
}
