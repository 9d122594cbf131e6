//! Common test utilities for batch-fetch integration tests

#![allow(dead_code)]

use batch_fetch::{Event, Job, JobId, JobStatus, Orchestrator};
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Outcome of waiting for a job to finish
#[derive(Debug, PartialEq)]
pub enum WaitResult {
    /// The job reached this terminal status
    Finished(JobStatus),
    /// The event channel closed first
    ChannelClosed,
    /// Nothing arrived in time
    Timeout,
}

/// Wait for the `JobFinished` event of `id` on a receiver subscribed before submission
pub async fn wait_for_finish(
    events: &mut broadcast::Receiver<Event>,
    id: &JobId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::JobFinished {
                    id: event_id,
                    status,
                    ..
                }) if &event_id == id => return WaitResult::Finished(status),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Poll the job store until the job's terminal state is visible
pub async fn wait_for_persisted(orchestrator: &Orchestrator, id: &JobId) -> Job {
    let poll = async {
        loop {
            let job = orchestrator.get_job(id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), poll)
        .await
        .expect("job state was not persisted within 10s")
}

/// Mount `GET /{name}` answering 200 with `body` as `content_type`
pub async fn mount_file(server: &MockServer, name: &str, body: &str, content_type: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), content_type))
        .mount(server)
        .await;
}

/// Mount `GET /{name}` answering with `status` and no body
pub async fn mount_status(server: &MockServer, name: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/{name}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Mount `GET /{name}` that answers only after `delay`
pub async fn mount_slow(server: &MockServer, name: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/{name}")))
        .respond_with(ResponseTemplate::new(200).set_delay(delay))
        .mount(server)
        .await;
}
