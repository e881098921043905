use super::*;
use crate::config::ExtractionConfig;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARTICLE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Test Article</title></head>
<body>
  <nav><a href="/">Home</a></nav>
  <article>
    <h2>Intro</h2>
    <p>The first paragraph of the article.</p>
    <p>See <a href="/related">the related piece</a>.</p>
  </article>
</body>
</html>"#;

fn html_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

fn extractor() -> HttpExtractor {
    HttpExtractor::new(&ExtractionConfig::default()).unwrap()
}

fn url(server: &MockServer, route: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), route)).unwrap()
}

#[tokio::test]
async fn fetches_and_normalizes_article() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/story"))
        .respond_with(html_response(ARTICLE))
        .expect(1)
        .mount(&server)
        .await;

    let doc = extractor().extract(&url(&server, "/story")).await.unwrap();

    assert_eq!(doc.title, "Test Article");
    assert!(doc.body.contains("<p>The first paragraph of the article.</p>"));
    assert!(doc.body.contains(&format!("href=\"{}/related\"", server.uri())));
    assert!(!doc.body.contains("Home"));
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = extractor()
        .extract(&url(&server, "/missing"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 404, .. }));
}

#[tokio::test]
async fn non_html_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .mount(&server)
        .await;

    let err = extractor()
        .extract(&url(&server, "/image"))
        .await
        .unwrap_err();

    match err {
        FetchError::UnsupportedContent { content_type, .. } => assert_eq!(content_type, "image/png"),
        other => panic!("expected UnsupportedContent, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    let big = format!("<html><body><p>{}</p></body></html>", "x".repeat(4096));
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(html_response(&big))
        .mount(&server)
        .await;

    let config = ExtractionConfig {
        max_body_bytes: 1024,
        ..Default::default()
    };
    let err = HttpExtractor::new(&config)
        .unwrap()
        .extract(&url(&server, "/big"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::TooLarge { limit: 1024 }));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_response(ARTICLE).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let config = ExtractionConfig {
        request_timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let err = HttpExtractor::new(&config)
        .unwrap()
        .extract(&url(&server, "/slow"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn page_without_text_has_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(html_response("<html><body><script>1</script></body></html>"))
        .mount(&server)
        .await;

    let err = extractor()
        .extract(&url(&server, "/empty"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::NoContent { .. }));
}

#[tokio::test]
async fn relative_links_resolve_against_final_redirect_target() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new/place", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new/place"))
        .respond_with(html_response(
            r#"<html><body><p><a href="sibling">next</a></p></body></html>"#,
        ))
        .mount(&server)
        .await;

    let doc = extractor().extract(&url(&server, "/old")).await.unwrap();

    assert!(doc.body.contains(&format!("href=\"{}/new/sibling\"", server.uri())));
}

#[tokio::test]
async fn unreachable_host_is_a_request_error() {
    // Bind then drop a listener so the port is very likely closed
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let target = Url::parse(&format!("http://{addr}/")).unwrap();
    let err = extractor().extract(&target).await.unwrap_err();

    assert!(matches!(err, FetchError::Request { .. }), "got {err:?}");
}

#[test]
fn extractor_reports_its_name() {
    assert_eq!(extractor().name(), "http");
}
