//! Integration tests for the sync stage against a mock publisher

use njleg_pipeline::fetch::ArchiveFetcher;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetch_completes_when_one_file_is_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2026data/DB2026.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip one".as_slice()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2026data/DB2026_TEXT.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip two".as_slice()))
        .mount(&server)
        .await;

    // Readme.txt does not exist for this session year
    Mock::given(method("GET"))
        .and(path("/2026data/Readme.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher =
        ArchiveFetcher::with_base_url(&server.uri(), Duration::from_secs(5)).unwrap();

    let outcome = fetcher.fetch_year(2026, dir.path()).await.unwrap();

    assert_eq!(outcome.fetched.len(), 2);
    assert_eq!(outcome.skipped, vec!["Readme.txt".to_string()]);
    assert!(dir.path().join("DB2026.zip").exists());
    assert!(dir.path().join("DB2026_TEXT.zip").exists());
    assert!(!dir.path().join("Readme.txt").exists());
}

#[tokio::test]
async fn fetch_writes_response_bodies_to_disk() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/2024data/DB2024.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive bytes".as_slice()))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2024data/DB2024_TEXT.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/2024data/Readme.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fetcher =
        ArchiveFetcher::with_base_url(&server.uri(), Duration::from_secs(5)).unwrap();

    let outcome = fetcher.fetch_year(2024, dir.path()).await.unwrap();

    assert_eq!(outcome.fetched, vec!["DB2024.zip".to_string()]);
    let body = std::fs::read(dir.path().join("DB2024.zip")).unwrap();
    assert_eq!(body, b"archive bytes");
}

#[tokio::test]
async fn fetch_fails_when_publisher_is_unreachable() {
    // Nothing listens on this port; the transport itself is down.
    let dir = tempfile::tempdir().unwrap();
    let fetcher =
        ArchiveFetcher::with_base_url("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

    let result = fetcher.fetch_year(2026, dir.path()).await;
    assert!(result.is_err());
}
