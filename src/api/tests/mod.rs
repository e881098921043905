use super::*;
use crate::pipeline::test_helpers::{
    Behavior, MockExtractor, TestPipeline, cleaned, start, start_with,
};
use crate::status_cache::NOT_FOUND_MESSAGE;
use crate::types::{StatusReport, SubmitResponse};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceExt;

fn router_for(test: &TestPipeline) -> Router {
    let pipeline = Arc::new(test.pipeline.clone());
    let config = test.pipeline.config().clone();
    create_router(pipeline, config)
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn submit_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/ajax/submit.json")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;

    let mut config = (**test.pipeline.config()).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let pipeline = Arc::new(test.pipeline.clone());
        async move { start_api_server(pipeline, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server exited early");
    api_handle.abort();
}

#[tokio::test]
async fn submit_accepts_valid_article() {
    let mut test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let response = app
        .oneshot(submit_request(
            r#"{"email":"reader@kindle.com","url":"http://example.com/article"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: SubmitResponse = json_body(response).await;
    assert_eq!(body.message, SubmitResponse::ACCEPTED);
    let id = body.id.expect("accepted submissions carry an id");

    let done = cleaned(&mut test.events, 1).await;
    assert_eq!(done[0].0.to_string(), id);
    assert!(done[0].1);
    assert_eq!(test.mailer.sent()[0].to, "reader@kindle.com");
}

#[tokio::test]
async fn submit_rejection_is_still_http_200() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let response = app
        .oneshot(submit_request(
            r#"{"email":"reader@kindle.com","url":"ftp://example.com/article"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: SubmitResponse = json_body(response).await;
    assert!(body.id.is_none());
    assert!(body.message.contains("only http and https"));
}

#[tokio::test]
async fn submit_blacklisted_host_is_rejected() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let response = app
        .oneshot(submit_request(
            r#"{"email":"reader@kindle.com","url":"https://blocked.example/story"}"#,
        ))
        .await
        .unwrap();

    let body: SubmitResponse = json_body(response).await;
    assert!(body.id.is_none());
    assert_eq!(
        body.message,
        "Sorry, articles from blocked.example are blacklisted."
    );
}

#[tokio::test]
async fn undecodable_body_is_rejected_by_validation() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let response = app.oneshot(submit_request("not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: SubmitResponse = json_body(response).await;
    assert!(body.id.is_none());
    assert_eq!(body.message, "Please enter an email address.");
}

#[tokio::test]
async fn legacy_get_submission_is_accepted() {
    let mut test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/ajax/submit.json?email=reader%40kindle.com&url=http%3A%2F%2Fexample.com%2Fstory")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let body: SubmitResponse = json_body(response).await;
    assert!(body.id.is_some());
    cleaned(&mut test.events, 1).await;
    assert_eq!(test.extractor.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn status_strips_json_suffix() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    test.pipeline
        .status_cache()
        .set("abc123", "Done! Your article should arrive shortly.");
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/ajax/status/abc123.json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: StatusReport = json_body(response).await;
    assert_eq!(body.message, "Done! Your article should arrive shortly.");
    assert!(body.done);
}

#[tokio::test]
async fn status_in_progress_is_not_done() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    test.pipeline.status_cache().set("abc123", "Converting...");
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/ajax/status/abc123.json")
        .body(Body::empty())
        .unwrap();
    let body: StatusReport = json_body(app.oneshot(request).await.unwrap()).await;

    assert_eq!(body.message, "Converting...");
    assert!(!body.done);
}

#[tokio::test]
async fn status_of_unknown_job_is_done() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/ajax/status/no-such-job.json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: StatusReport = json_body(response).await;
    assert_eq!(body.message, NOT_FOUND_MESSAGE);
    assert!(body.done);
}

#[tokio::test]
async fn health_reports_accepting() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["accepting"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn health_reports_not_accepting_after_shutdown() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    test.pipeline.shutdown().await.unwrap();
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let body: serde_json::Value = json_body(app.oneshot(request).await.unwrap()).await;

    assert_eq!(body["accepting"], false);
}

#[tokio::test]
async fn test_cors_enabled() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://news.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS headers should be present"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let test = start_with(
        MockExtractor::default(),
        Behavior::Succeed,
        Behavior::Succeed,
        |config| config.server.api.cors_enabled = false,
    )
    .await;
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://news.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn rate_limited_submission_gets_message_body() {
    let test = start_with(
        MockExtractor::default(),
        Behavior::Succeed,
        Behavior::Succeed,
        |config| {
            let limit = &mut config.server.api.rate_limit;
            limit.enabled = true;
            limit.requests_per_second = 1;
            limit.burst_size = 1;
            limit.exempt_ips.clear();
        },
    )
    .await;
    let app = router_for(&test);
    let client: SocketAddr = "10.1.2.3:40000".parse().unwrap();

    let request = |client| {
        let mut request = submit_request(
            r#"{"email":"reader@kindle.com","url":"http://example.com/article"}"#,
        );
        request.extensions_mut().insert(ConnectInfo::<SocketAddr>(client));
        request
    };

    let first: SubmitResponse =
        json_body(app.clone().oneshot(request(client)).await.unwrap()).await;
    assert!(first.id.is_some());

    let response = app.clone().oneshot(request(client)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let second: SubmitResponse = json_body(response).await;
    assert!(second.id.is_none());
    assert_eq!(second.message, "Rate limited. Try again in 1 seconds.");
}

#[tokio::test]
async fn rate_limit_does_not_apply_to_status_polls() {
    let test = start_with(
        MockExtractor::default(),
        Behavior::Succeed,
        Behavior::Succeed,
        |config| {
            let limit = &mut config.server.api.rate_limit;
            limit.enabled = true;
            limit.burst_size = 1;
            limit.exempt_ips.clear();
        },
    )
    .await;
    let app = router_for(&test);

    // No ConnectInfo is attached: polling must not go through the limiter
    for _ in 0..5 {
        let request = Request::builder()
            .uri("/ajax/status/whatever.json")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn openapi_spec_lists_job_routes() {
    let test = start(Behavior::Succeed, Behavior::Succeed).await;
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/openapi.json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let spec: serde_json::Value = json_body(response).await;
    let paths = spec["paths"].as_object().unwrap();
    assert!(paths.contains_key("/ajax/submit.json"));
    assert!(paths.contains_key("/ajax/status/{id}.json"));
    assert!(paths.contains_key("/health"));
    assert!(spec["components"]["schemas"]["SubmitResponse"].is_object());
}

#[tokio::test]
async fn swagger_ui_is_served_when_enabled() {
    let test = start_with(
        MockExtractor::default(),
        Behavior::Succeed,
        Behavior::Succeed,
        |config| config.server.api.swagger_ui = true,
    )
    .await;
    let app = router_for(&test);

    let request = Request::builder()
        .uri("/api-docs/openapi.json")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
