use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::orchestrator::test_helpers::*;
use crate::store::{BlobStore, MemoryJobStore};
use crate::types::{FetchErrorCode, JobStatus};

#[tokio::test]
async fn all_successful_urls_finish_done_with_one_artifact_each() {
    let server = MockServer::start().await;
    for name in ["a", "b", "c"] {
        Mock::given(method("GET"))
            .and(path(format!("/{name}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(format!("body-{name}"), "text/plain"),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    let t = create_test_orchestrator(|_| {});
    let urls: Vec<String> = ["a", "b", "c"]
        .iter()
        .map(|name| format!("{}/{name}", server.uri()))
        .collect();

    let job = t
        .orchestrator
        .start_job(Duration::from_secs(5), urls.clone())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::InProgress);
    assert!(job.items.is_empty());

    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;
    assert_eq!(finished.status, JobStatus::Done);
    assert_eq!(finished.items.len(), 3);
    assert_eq!(t.blobs.len().await, 3);

    for item in &finished.items {
        assert!(urls.contains(&item.url));
        let file_id = item.file_id().expect("every item should carry a file id");
        let artifact = t.blobs.get(file_id).await.unwrap();
        let expected = format!("body-{}", item.url.rsplit('/').next().unwrap());
        assert_eq!(artifact.data, Bytes::from(expected));
        assert_eq!(artifact.metadata.mime_type, "text/plain");
    }
}

#[tokio::test]
async fn failing_status_is_recorded_and_job_still_done() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fine".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let t = create_test_orchestrator(|_| {});
    let ok_url = format!("{}/ok", server.uri());
    let broken_url = format!("{}/broken", server.uri());

    let job = t
        .orchestrator
        .start_job(Duration::from_secs(5), vec![ok_url.clone(), broken_url.clone()])
        .await
        .unwrap();
    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Done);
    assert_eq!(finished.items.len(), 2);
    let ok = finished.items.iter().find(|i| i.url == ok_url).unwrap();
    assert!(ok.file_id().is_some());
    let broken = finished.items.iter().find(|i| i.url == broken_url).unwrap();
    assert_eq!(
        broken.error(),
        Some(FetchErrorCode::HttpError { status: Some(500) })
    );
    assert_eq!(t.blobs.len().await, 1);
}

#[tokio::test]
async fn deadline_before_response_fails_job_without_artifact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    let t = create_test_orchestrator(|_| {});

    let job = t
        .orchestrator
        .start_job(Duration::from_millis(10), vec![server.uri()])
        .await
        .unwrap();
    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Failed);
    assert!(finished.items.len() <= 1);
    for item in &finished.items {
        assert_eq!(item.error(), Some(FetchErrorCode::Timeout));
    }

    // Give a straggling response time to arrive; it must not be stored
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(t.blobs.is_empty().await);
}

#[tokio::test]
async fn deadline_keeps_items_recorded_before_abort() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"quick".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stuck"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let t = create_test_orchestrator(|_| {});
    let fast = format!("{}/fast", server.uri());

    let job = t
        .orchestrator
        .start_job(
            Duration::from_millis(300),
            vec![fast.clone(), format!("{}/stuck", server.uri())],
        )
        .await
        .unwrap();
    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Failed);
    let kept = finished.items.iter().find(|i| i.url == fast).unwrap();
    assert!(kept.file_id().is_some());
    assert!(finished.items.len() <= 2);
}

#[tokio::test]
async fn oversized_body_is_rejected_as_413_and_job_done() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 15 * 1024 * 1024]))
        .mount(&server)
        .await;
    let t = create_test_orchestrator(|_| {});

    let job = t
        .orchestrator
        .start_job(Duration::from_secs(10), vec![server.uri()])
        .await
        .unwrap();
    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Done);
    assert_eq!(finished.items.len(), 1);
    assert_eq!(
        finished.items[0].error(),
        Some(FetchErrorCode::HttpError { status: Some(413) })
    );
    assert!(t.blobs.is_empty().await);
}

#[tokio::test]
async fn empty_url_list_finishes_done_immediately() {
    let t = create_test_orchestrator(|_| {});

    let job = t
        .orchestrator
        .start_job(Duration::from_secs(5), Vec::new())
        .await
        .unwrap();
    assert!(job.items.is_empty());

    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;
    assert_eq!(finished.status, JobStatus::Done);
    assert!(finished.items.is_empty());
    assert!(t.blobs.is_empty().await);
}

#[tokio::test]
async fn unreachable_and_invalid_urls_are_classified() {
    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let refused = format!("http://127.0.0.1:{port}/");
    let invalid = "not a url".to_string();
    let t = create_test_orchestrator(|_| {});

    let job = t
        .orchestrator
        .start_job(Duration::from_secs(5), vec![refused.clone(), invalid.clone()])
        .await
        .unwrap();
    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Done);
    let refused_item = finished.items.iter().find(|i| i.url == refused).unwrap();
    assert_eq!(
        refused_item.error(),
        Some(FetchErrorCode::HttpError { status: None })
    );
    let invalid_item = finished.items.iter().find(|i| i.url == invalid).unwrap();
    assert_eq!(invalid_item.error(), Some(FetchErrorCode::Unknown));
}

#[tokio::test]
async fn request_timeout_is_recorded_without_failing_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    let t = create_test_orchestrator(|config| {
        config.fetch.request_timeout = Duration::from_secs(1);
    });

    let job = t
        .orchestrator
        .start_job(Duration::from_secs(10), vec![server.uri()])
        .await
        .unwrap();
    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Done);
    assert_eq!(finished.items[0].error(), Some(FetchErrorCode::Timeout));
}

#[tokio::test]
async fn in_flight_fetches_never_exceed_configured_ceiling() {
    let (base, gauge) = spawn_gauged_upstream().await;
    let t = create_test_orchestrator(|config| {
        config.fetch.max_concurrent_fetches = 3;
    });
    let urls: Vec<String> = (0..9).map(|i| format!("{base}/slow/{i}")).collect();

    let job = t
        .orchestrator
        .start_job(Duration::from_secs(10), urls)
        .await
        .unwrap();
    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Done);
    assert_eq!(finished.items.len(), 9);
    assert_eq!(gauge.served(), 9);
    assert!(gauge.peak() <= 3, "peak in-flight was {}", gauge.peak());
}

#[tokio::test]
async fn default_ceiling_is_ten() {
    let (base, gauge) = spawn_gauged_upstream().await;
    let t = create_test_orchestrator(|_| {});
    let urls: Vec<String> = (0..25).map(|i| format!("{base}/slow/{i}")).collect();

    let job = t
        .orchestrator
        .start_job(Duration::from_secs(10), urls)
        .await
        .unwrap();
    let finished = wait_for_terminal(&t.orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Done);
    assert_eq!(finished.items.len(), 25);
    assert!(gauge.peak() <= 10, "peak in-flight was {}", gauge.peak());
    assert!(gauge.peak() > 1, "fetches should overlap");
}

#[tokio::test]
async fn jobs_run_independently() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .mount(&server)
        .await;
    let t = create_test_orchestrator(|_| {});

    let first = t
        .orchestrator
        .start_job(Duration::from_secs(5), vec![server.uri()])
        .await
        .unwrap();
    let second = t
        .orchestrator
        .start_job(Duration::from_secs(5), vec![server.uri(), server.uri()])
        .await
        .unwrap();
    assert_ne!(first.id, second.id);

    let first = wait_for_terminal(&t.orchestrator, &first.id).await;
    let second = wait_for_terminal(&t.orchestrator, &second.id).await;
    assert_eq!(first.items.len(), 1);
    assert_eq!(second.items.len(), 2);
    assert_eq!(t.blobs.len().await, 3);
}

#[tokio::test]
async fn panicking_fetch_still_records_unknown_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .mount(&server)
        .await;
    let orchestrator = Orchestrator::new(
        Config::default(),
        Arc::new(MemoryJobStore::new()),
        Arc::new(PanickingBlobStore),
    )
    .unwrap();
    let urls = vec![format!("{}/a", server.uri()), format!("{}/b", server.uri())];

    let job = orchestrator
        .start_job(Duration::from_secs(5), urls.clone())
        .await
        .unwrap();
    let finished = wait_for_terminal(&orchestrator, &job.id).await;

    assert_eq!(finished.status, JobStatus::Done);
    assert_eq!(finished.items.len(), urls.len());
    for item in &finished.items {
        assert!(urls.contains(&item.url));
        assert_eq!(item.error(), Some(FetchErrorCode::Unknown));
    }
}
