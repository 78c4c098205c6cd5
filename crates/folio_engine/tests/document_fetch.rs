use std::time::Duration;

use folio_engine::{DocumentFetcher, DocumentSettings, FailureKind, ReqwestDocumentFetcher};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

#[tokio::test]
async fn downloads_pdf_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/docs/q3.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PDF, "application/pdf"))
        .mount(&server)
        .await;

    let fetcher = ReqwestDocumentFetcher::new(DocumentSettings::default());
    let bytes = fetcher
        .fetch(&format!("{}/docs/q3.pdf", server.uri()))
        .await
        .expect("fetch ok");
    assert_eq!(bytes, PDF);
}

#[tokio::test]
async fn blob_storage_octet_stream_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PDF, "application/octet-stream"))
        .mount(&server)
        .await;

    let fetcher = ReqwestDocumentFetcher::new(DocumentSettings::default());
    assert!(fetcher.fetch(&format!("{}/blob", server.uri())).await.is_ok());
}

#[tokio::test]
async fn html_error_pages_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>sign in</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestDocumentFetcher::new(DocumentSettings::default());
    let err = fetcher
        .fetch(&format!("{}/login", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind,
        FailureKind::UnsupportedContentType { ref content_type } if content_type.starts_with("text/html")
    ));
}

#[tokio::test]
async fn missing_document_fails_on_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestDocumentFetcher::new(DocumentSettings::default());
    let err = fetcher
        .fetch(&format!("{}/gone.pdf", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert_eq!(err.to_string(), "http status 404");
}

#[tokio::test]
async fn oversized_document_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PDF, "application/pdf"))
        .mount(&server)
        .await;

    let settings = DocumentSettings {
        max_bytes: 16,
        ..DocumentSettings::default()
    };
    let fetcher = ReqwestDocumentFetcher::new(settings);
    let err = fetcher
        .fetch(&format!("{}/big.pdf", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 16,
            actual: Some(PDF.len() as u64)
        }
    );
}

#[tokio::test]
async fn slow_download_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.pdf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_raw(PDF, "application/pdf"),
        )
        .mount(&server)
        .await;

    let settings = DocumentSettings {
        request_timeout: Duration::from_millis(50),
        ..DocumentSettings::default()
    };
    let fetcher = ReqwestDocumentFetcher::new(settings);
    let err = fetcher
        .fetch(&format!("{}/slow.pdf", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn non_http_urls_are_refused() {
    let fetcher = ReqwestDocumentFetcher::new(DocumentSettings::default());
    let err = fetcher.fetch("file:///etc/passwd").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
