//! Integration tests for the built-in HTTP extractors against a mock server.

use std::sync::Arc;

use digestor_core::{
    BrowserProfile, ExtractContext, ExtractRequest, ExtractionOutcome, Extractor, ExtractorError,
    HttpExtractor, RoutingDefaults, build_default_catalog,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::executor_for;
use support::socket_guard::start_mock_server_or_skip;

fn article_html(title: &str) -> String {
    let body = "Readable paragraph text for the extractor to find. ".repeat(8);
    format!(
        "<html><head><title>{title}</title><script>track()</script></head>\
         <body><nav>Home | About</nav><article><p>{body}</p></article></body></html>"
    )
}

fn html_response(title: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(article_html(title), "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_desktop_extractor_reads_article_and_title() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/post"))
        .respond_with(html_response("Mock Post"))
        .mount(&server)
        .await;

    let extractor = HttpExtractor::new(BrowserProfile::Desktop).unwrap();
    let request = ExtractRequest::basic(format!("{}/post", server.uri()), ExtractContext::new());
    let content = extractor.extract(&request).await.unwrap();

    assert!(content.text.starts_with("Readable paragraph text"));
    assert!(!content.text.contains("Home | About"));
    assert!(!content.text.contains("track()"));
    assert_eq!(content.title(), Some("Mock Post"));
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let extractor = HttpExtractor::new(BrowserProfile::Desktop).unwrap();
    let request = ExtractRequest::basic(format!("{}/blocked", server.uri()), ExtractContext::new());
    let err = extractor.extract(&request).await.unwrap_err();

    assert!(
        matches!(err, ExtractorError::HttpStatus { status: 503, .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_binary_body_is_a_parse_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let mut pdf = b"%PDF-1.7\n".to_vec();
    for _ in 0..200 {
        pdf.extend_from_slice(&[0xff, 0xfe, 0x01]);
        pdf.extend_from_slice(b" word ");
    }
    Mock::given(method("GET"))
        .and(path("/paper.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pdf, "application/pdf"))
        .mount(&server)
        .await;

    let extractor = HttpExtractor::new(BrowserProfile::Desktop).unwrap();
    let request =
        ExtractRequest::basic(format!("{}/paper.pdf", server.uri()), ExtractContext::new());
    let err = extractor.extract(&request).await.unwrap_err();

    assert!(
        matches!(err, ExtractorError::Parse { .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_invalid_utf8_html_is_a_parse_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let mut body = article_html("Latin").into_bytes();
    body.extend_from_slice(&[0xe9, 0xe8, 0xff]);
    Mock::given(method("GET"))
        .and(path("/latin"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let extractor = HttpExtractor::new(BrowserProfile::Desktop).unwrap();
    let request = ExtractRequest::basic(format!("{}/latin", server.uri()), ExtractContext::new());
    let err = extractor.extract(&request).await.unwrap_err();

    assert!(
        matches!(err, ExtractorError::Parse { ref reason, .. } if reason.contains("UTF-8")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_mobile_extractor_sends_search_referer() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/walled"))
        .and(header("referer", "https://www.google.com/"))
        .respond_with(html_response("Walled"))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = HttpExtractor::new(BrowserProfile::Mobile).unwrap();
    let request = ExtractRequest::basic(format!("{}/walled", server.uri()), ExtractContext::new());
    assert!(extractor.extract(&request).await.is_ok());
}

#[tokio::test]
async fn test_default_catalog_falls_back_to_mobile_when_desktop_is_blocked() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    // Only requests carrying the mobile profile's referer get through.
    Mock::given(method("GET"))
        .and(path("/story"))
        .and(header("referer", "https://www.google.com/"))
        .respond_with(html_response("Story"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/story"))
        .respond_with(ResponseTemplate::new(403))
        .with_priority(2)
        .mount(&server)
        .await;

    let catalog = build_default_catalog(RoutingDefaults::default(), Vec::new());
    let executor = Arc::new(executor_for(catalog));
    let outcome = executor
        .extract(&format!("{}/story", server.uri()), &ExtractContext::new())
        .await
        .unwrap();

    let ExtractionOutcome::Extracted(article) = outcome else {
        panic!("expected mobile fallback to succeed");
    };
    assert_eq!(article.extractor, "http-mobile");
    assert_eq!(article.title(), Some("Story"));
    assert_eq!(article.attempts[0].extractor_name, "http");
    assert!(!article.attempts[0].success);
}
