use std::time::Duration;

use harvester_engine::{
    EngineEvent, FailureKind, FetchSettings, Fetcher, JobProgress, ReqwestFetcher, Stage,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::RecordingSink;

#[tokio::test]
async fn item_page_is_fetched_with_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asset/wave/abc"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><ul><li>Creator: Hokusai</li></ul></html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let sink = RecordingSink::default();
    let url = format!("{}/asset/wave/abc", server.uri());

    let output = fetcher.fetch(1, &url, &sink).await.expect("fetch ok");
    assert_eq!(output.metadata.final_url, url);
    assert_eq!(output.metadata.redirect_count, 0);
    assert_eq!(output.metadata.byte_len, output.bytes.len() as u64);

    let stages: Vec<Stage> = sink
        .events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            EngineEvent::Progress(JobProgress { stage, .. }) => Some(*stage),
            _ => None,
        })
        .collect();
    assert!(stages.contains(&Stage::Downloading));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asset/gone"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/asset/gone", server.uri());
    let err = fetcher
        .fetch(4, &url, &RecordingSink::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(503));
}

#[tokio::test]
async fn slow_item_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asset/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_string("late"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    });
    let url = format!("{}/asset/slow", server.uri());
    let err = fetcher
        .fetch(2, &url, &RecordingSink::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn image_settings_accept_images_and_refuse_markup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xFF, 0xD8, 0xFF], "image/jpeg"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default().for_images());
    let sink = RecordingSink::default();

    let image = fetcher
        .fetch(1, &format!("{}/img/abc", server.uri()), &sink)
        .await
        .expect("image fetch");
    assert_eq!(image.bytes, vec![0xFF, 0xD8, 0xFF]);

    let err = fetcher
        .fetch(2, &format!("{}/img/page", server.uri()), &sink)
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "text/html".to_string()
        }
    );
}

#[tokio::test]
async fn oversized_response_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/asset/huge"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("0123456789abcdef"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings {
        max_bytes: 8,
        ..FetchSettings::default()
    });
    let url = format!("{}/asset/huge", server.uri());
    let err = fetcher
        .fetch(3, &url, &RecordingSink::default())
        .await
        .unwrap_err();
    assert!(matches!(err.kind, FailureKind::TooLarge { max_bytes: 8, .. }));
}

#[tokio::test]
async fn malformed_url_is_reported() {
    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher
        .fetch(9, "not a url", &RecordingSink::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
