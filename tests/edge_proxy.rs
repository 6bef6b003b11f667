//! End-to-end tests: client → edge server → mock origin.

use std::time::Duration;

use addons_inject::config::EdgeConfig;
use addons_inject::http::HttpServer;
use addons_inject::lifecycle::Shutdown;
use addons_inject::transform::rules::{SCRIPT_ADDONS, SEARCHTOOLS_PATCH};
use tokio::sync::mpsc;

mod common;
use common::{client, start_edge, start_mock_origin, start_static_origin, MockResponse};

const EMPTY_PAGE: &str = "<html><head></head><body></body></html>";

#[tokio::test]
async fn test_disabled_addons_passthrough() {
    let origin = start_static_origin(
        MockResponse::ok("text/html", "<html></html>")
            .header("X-RTD-Force-Addons", false)
            .header("X-RTD-Hosting-Integrations", false),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let res = client().get(edge.url("/en/latest/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "<html></html>");
    edge.shutdown.trigger();
}

#[tokio::test]
async fn test_html_injection_without_rewrites() {
    let origin = start_static_origin(
        MockResponse::ok("text/html", EMPTY_PAGE)
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", false),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let res = client().get(edge.url("/en/latest/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.text().await.unwrap(),
        format!("<html><head>{}</head><body></body></html>", SCRIPT_ADDONS)
    );
}

#[tokio::test]
async fn test_injects_project_and_version_metadata() {
    let origin = start_static_origin(
        MockResponse::ok("text/html", EMPTY_PAGE)
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", false)
            .header("X-RTD-Project", "test-builds")
            .header("X-RTD-Version", "latest"),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let body = client()
        .get(edge.url("/en/latest/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains(SCRIPT_ADDONS));
    assert!(body.contains(r#"<meta name="readthedocs-project-slug" content="test-builds" />"#));
    assert!(body.contains(r#"<meta name="readthedocs-version-slug" content="latest" />"#));
    assert!(body.contains(r#"<meta name="readthedocs-http-status" content="200" />"#));
}

#[tokio::test]
async fn test_removes_legacy_flyout_assets() {
    let scripts = [
        r#"<script src="/_/static/javascript/readthedocs-analytics.js"></script>"#,
        r#"<script src="/_/static/javascript/readthedocs-doc-embed.js"></script>"#,
        r#"<script src="/_/static/core/js/readthedocs-doc-embed.js"></script>"#,
        r#"<script src="https://assets.readthedocs.org/static/javascript/readthedocs-analytics.js"></script>"#,
        r#"<script src="https://assets.readthedocs.org/static/javascript/readthedocs-doc-embed.js"></script>"#,
        r#"<script src="https://assets.readthedocs.org/static/core/js/readthedocs-doc-embed.js"></script>"#,
    ];
    let links = [
        r#"<link rel="stylesheet" href="/_/static/css/readthedocs-doc-embed.css" />"#,
        r#"<link rel="stylesheet" href="https://assets.readthedocs.org/static/css/readthedocs-doc-embed.css" />"#,
        r#"<link rel="stylesheet" href="https://assets.readthedocs.org/static/css/badge_only.css" />"#,
        r#"<link rel="stylesheet" href="/_/static/css/badge_only.css" />"#,
    ];
    let elements = [
        r#"<div role="main"><div x-ref="outer"><div class="admonition warning" x-ref="inner"></div></div></div>"#,
        r#"<div role="main" x-ref="outer-furo"><div class="admonition warning" x-ref="inner-furo"></div></div>"#,
        r#"<div id="main-content"><div><div><article x-ref="outer-book"><div class="admonition warning" x-ref="inner-book"></div></article></div></div></div>"#,
        r#"<div class="rst-versions" x-ref="flyout"></div>"#,
    ];
    let page = format!(
        r#"
        <html>
          <head>
            {}
            {}
            <script src="https://example.com"></script>
          </head>
          <body>
            {}
          </body>
        </html>"#,
        scripts.concat(),
        links.concat(),
        elements.concat()
    );

    let origin = start_static_origin(
        MockResponse::ok("text/html", page)
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", false),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let res = client().get(edge.url("/en/latest/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body = res.text().await.unwrap();

    assert!(body.contains(SCRIPT_ADDONS));
    assert!(body.contains(r#"<script src="https://example.com"></script>"#));
    for asset in scripts.iter().chain(links.iter()) {
        assert!(!body.contains(asset), "still present: {}", asset);
    }
    assert!(body.contains(r#"x-ref="outer""#));
    assert!(!body.contains(r#"x-ref="inner""#));
    assert!(body.contains(r#"x-ref="outer-furo""#));
    assert!(!body.contains(r#"x-ref="inner-furo""#));
    assert!(body.contains(r#"x-ref="outer-book""#));
    assert!(!body.contains(r#"x-ref="inner-book""#));
    assert!(!body.contains(r#"x-ref="flyout""#));
}

#[tokio::test]
async fn test_skips_javascript_other_than_searchtools() {
    let origin = start_static_origin(
        MockResponse::ok("application/javascript", "console.log(true);")
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", true),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let res = client()
        .get(edge.url("/en/latest/_static/foo.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/javascript");
    assert_eq!(res.text().await.unwrap(), "console.log(true);");
}

#[tokio::test]
async fn test_patches_searchtools() {
    let origin = start_static_origin(
        MockResponse::ok("application/javascript", SEARCHTOOLS_PATCH.pattern)
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", true)
            .header("X-RTD-Test-Passthrough", 42),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let res = client()
        .get(edge.url("/en/latest/_static/searchtools.js"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/javascript");
    assert_eq!(res.headers()["x-rtd-test-passthrough"], "42");
    let body = res.text().await.unwrap();
    assert!(body.contains(SEARCHTOOLS_PATCH.replacement));
    assert!(!body.contains(SEARCHTOOLS_PATCH.pattern));
}

#[tokio::test]
async fn test_error_returns_original_response() {
    let origin = start_static_origin(
        MockResponse::ok("text/html", EMPTY_PAGE)
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", false)
            .header("X-RTD-Test-Passthrough", 42)
            .header("X-RTD-Throw-Error", true),
    )
    .await;
    let edge = start_edge(origin, |c| c.transform.allow_fault_injection = true).await;

    let res = client().get(edge.url("/en/latest/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-rtd-test-passthrough"], "42");
    assert_eq!(res.text().await.unwrap(), EMPTY_PAGE);
}

#[tokio::test]
async fn test_throw_error_ignored_when_injection_disallowed() {
    let origin = start_static_origin(
        MockResponse::ok("text/html", EMPTY_PAGE)
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", false)
            .header("X-RTD-Throw-Error", true),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let body = client()
        .get(edge.url("/en/latest/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains(SCRIPT_ADDONS));
}

#[tokio::test]
async fn test_binary_content_untouched() {
    let png: Vec<u8> = vec![137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82];
    let origin = start_static_origin(
        MockResponse::ok("image/png", png.clone())
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", false)
            .header("X-RTD-Project", "test-builds")
            .header("X-RTD-Version", "latest"),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let res = client()
        .get(edge.url("/en/latest/_/static/images/test.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "image/png");
    let bytes = res.bytes().await.unwrap();
    assert_eq!(bytes.len(), 16);
    assert_eq!(bytes.as_ref(), png.as_slice());
}

#[tokio::test]
async fn test_both_flags_leave_html_untouched() {
    let origin = start_static_origin(
        MockResponse::ok("text/html", EMPTY_PAGE)
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", true),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let body = client()
        .get(edge.url("/en/latest/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, EMPTY_PAGE);
}

#[tokio::test]
async fn test_hosting_integrations_keeps_legacy_assets() {
    let page = r#"<html><head><script src="/_/static/javascript/readthedocs-doc-embed.js"></script></head><body></body></html>"#;
    let origin = start_static_origin(
        MockResponse::ok("text/html; charset=utf-8", page)
            .header("X-RTD-Force-Addons", false)
            .header("X-RTD-Hosting-Integrations", true),
    )
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let body = client()
        .get(edge.url("/en/latest/"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("readthedocs-doc-embed.js"));
    assert!(body.contains(SCRIPT_ADDONS));
}

#[tokio::test]
async fn test_status_and_path_forwarded() {
    let origin = start_mock_origin(|path| async move {
        MockResponse::ok("text/plain", format!("path={}", path)).status(404)
    })
    .await;
    let edge = start_edge(origin, |_| {}).await;

    let res = client()
        .get(edge.url("/en/latest/missing.html?q=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "path=/en/latest/missing.html?q=1");
}

#[tokio::test]
async fn test_request_id_returned() {
    let origin = start_static_origin(MockResponse::ok("text/plain", "ok")).await;
    let edge = start_edge(origin, |_| {}).await;

    let res = client()
        .get(edge.url("/"))
        .header("x-request-id", "edge-test-1")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "edge-test-1");

    let res = client().get(edge.url("/")).send().await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_origin_unreachable_is_bad_gateway() {
    let unused = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = unused.local_addr().unwrap();
    drop(unused);

    let edge = start_edge(origin, |_| {}).await;
    let res = client().get(edge.url("/en/latest/")).send().await.unwrap();
    assert_eq!(res.status(), 502);
}

#[tokio::test]
async fn test_config_reload_disables_transform() {
    let origin = start_static_origin(
        MockResponse::ok("text/html", EMPTY_PAGE)
            .header("X-RTD-Force-Addons", true)
            .header("X-RTD-Hosting-Integrations", false),
    )
    .await;

    let mut config = EdgeConfig::default();
    config.origin.url = format!("http://{}", origin);
    config.observability.metrics_enabled = false;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config.clone());
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(async move {
        server.run(listener, updates_rx, server_shutdown).await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let url = format!("http://{}/en/latest/", addr);
    let body = client().get(&url).send().await.unwrap().text().await.unwrap();
    assert!(body.contains(SCRIPT_ADDONS));

    config.transform.enabled = false;
    updates_tx.send(config).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let body = client().get(&url).send().await.unwrap().text().await.unwrap();
    assert_eq!(body, EMPTY_PAGE);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), server_task).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}
