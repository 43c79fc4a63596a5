mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    channel_link, channel_url, fixed_clock, init_logging, target, test_settings, ChannelPage,
    FakeSite,
};
use pretty_assertions::assert_eq;
use subsweep_core::{
    ChannelTarget, ContextId, JobEnd, JobSummary, PendingJob, PersistedState, RequestError,
    SessionState, StatusSnapshot,
};
use subsweep_engine::{
    DetachingNavigator, JobEvent, MemoryStateStore, OrchestratorDeps, OrchestratorError,
    OrchestratorHandle, OrchestratorRequest, OrchestratorResponse, ReadinessBoard, StateStore,
};
use tokio::sync::broadcast;

const CTX: ContextId = ContextId(2);

struct Harness {
    site: Arc<FakeSite>,
    store: Arc<MemoryStateStore>,
    handle: OrchestratorHandle,
}

fn harness(store: MemoryStateStore) -> Harness {
    init_logging();
    let site = FakeSite::new(CTX);
    let board = ReadinessBoard::new();
    let link = channel_link(&site, &board);
    let store = Arc::new(store);
    let handle = OrchestratorHandle::spawn(OrchestratorDeps {
        navigator: Arc::new(DetachingNavigator::new(site.clone(), link.clone())),
        link: Arc::new(link),
        board,
        store: store.clone(),
        settings: test_settings(),
        clock: fixed_clock("2024-05-01T10:00:00Z"),
    });
    Harness {
        site,
        store,
        handle,
    }
}

async fn finished(events: &mut broadcast::Receiver<JobEvent>) -> JobSummary {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(JobEvent::Finished(summary)) => return summary,
                Ok(JobEvent::Progress(_)) => continue,
                Err(err) => panic!("event stream failed: {err}"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(3600), wait)
        .await
        .expect("job finishes")
}

fn last_status(store: &MemoryStateStore) -> StatusSnapshot {
    store.load().unwrap().expect("state saved").status
}

#[tokio::test(start_paused = true)]
async fn job_processes_targets_in_order_and_records_failures() {
    let h = harness(MemoryStateStore::new());
    h.site.add_channel("alpha", ChannelPage::subscribed());
    h.site.add_channel("beta", ChannelPage::without_button());
    h.site.add_channel(
        "gamma",
        ChannelPage {
            with_dialog: true,
            ..ChannelPage::subscribed()
        },
    );
    let mut events = h.handle.subscribe();

    let total = h
        .handle
        .start(vec![target("alpha"), target("beta"), target("gamma")], CTX)
        .await
        .unwrap();
    assert_eq!(total, 3);

    let summary = finished(&mut events).await;
    assert_eq!(
        summary,
        JobSummary {
            end: JobEnd::Completed,
            total: 3,
            processed: 3,
            success_count: 2,
            error_count: 1,
        }
    );
    assert_eq!(
        h.site.navigations(),
        vec![channel_url("alpha"), channel_url("beta"), channel_url("gamma")]
    );
    assert_eq!(
        h.site.clicked_urls(),
        vec![channel_url("alpha"), channel_url("gamma")]
    );
    assert!(!h.site.is_subscribed("alpha"));
    assert!(!h.site.is_subscribed("gamma"));

    let status = last_status(&h.store);
    assert!(status.completed);
    assert!(!status.is_running);
    assert_eq!(status.processed, 3);
    assert_eq!(status.completed_at.as_deref(), Some("2024-05-01T10:00:00Z"));

    // Every saved snapshot keeps the counters consistent.
    for saved in h.store.history() {
        let s = saved.status;
        assert_eq!(s.success_count + s.error_count, s.processed);
        assert!(s.processed <= s.total_channels);
    }
    assert_eq!(h.handle.view().await.unwrap().session, SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn unreachable_page_counts_as_item_error() {
    let h = harness(MemoryStateStore::new());
    h.site.add_channel("ok", ChannelPage::subscribed());
    h.site.break_navigation_to("missing");
    let mut events = h.handle.subscribe();

    h.handle
        .start(vec![target("missing"), target("ok")], CTX)
        .await
        .unwrap();
    let summary = finished(&mut events).await;

    assert_eq!(summary.error_count, 1);
    assert_eq!(summary.success_count, 1);
    assert!(!h.site.is_subscribed("ok"));
}

#[tokio::test(start_paused = true)]
async fn invalid_and_concurrent_starts_are_rejected() {
    let h = harness(MemoryStateStore::new());
    h.site.add_channel("a", ChannelPage::subscribed());

    assert_eq!(
        h.handle.start(Vec::new(), CTX).await,
        Err(OrchestratorError::Rejected(RequestError::EmptyTargets))
    );
    h.handle.start(vec![target("a")], CTX).await.unwrap();
    assert_eq!(
        h.handle.start(vec![target("a")], ContextId(8)).await,
        Err(OrchestratorError::Rejected(RequestError::AlreadyRunning))
    );
}

#[tokio::test(start_paused = true)]
async fn stop_halts_before_next_target() {
    let h = harness(MemoryStateStore::new());
    for name in ["one", "two", "three"] {
        h.site.add_channel(name, ChannelPage::subscribed());
    }
    let mut events = h.handle.subscribe();

    h.handle
        .start(vec![target("one"), target("two"), target("three")], CTX)
        .await
        .unwrap();
    let message = h.handle.stop().await.unwrap();
    assert_eq!(message, "Unsubscribe process stopped");

    // Stop is visible to observers before the in-flight step drains.
    let status = last_status(&h.store);
    assert!(!status.is_running);
    assert!(status.stopped);

    let summary = finished(&mut events).await;
    assert_eq!(summary.end, JobEnd::Stopped);
    assert_eq!(summary.processed, 0);
    assert!(h.site.clicks().is_empty());
    assert!(h.site.is_subscribed("two"));
    assert_eq!(h.site.navigations(), vec![channel_url("one")]);

    assert_eq!(
        h.handle.stop().await,
        Err(OrchestratorError::Rejected(RequestError::NoActiveJob))
    );
    assert_eq!(h.handle.view().await.unwrap().session, SessionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn interrupted_job_resumes_where_it_left_off() {
    let targets: Vec<ChannelTarget> = vec![target("done"), target("next")];
    let persisted = PersistedState {
        status: StatusSnapshot {
            is_running: true,
            total_channels: 2,
            start_time: Some("2024-04-30T09:00:00Z".to_string()),
            processed: 1,
            success_count: 1,
            ..StatusSnapshot::default()
        },
        pending: Some(PendingJob {
            owner: ContextId(1),
            targets,
        }),
    };
    let h = harness(MemoryStateStore::with_state(persisted.clone()));
    h.site.add_channel("next", ChannelPage::subscribed());
    let mut events = h.handle.subscribe();

    let saved = h.store.load().unwrap().unwrap();
    assert!(saved.is_resumable());
    assert_eq!(h.handle.resume(saved, CTX).await.unwrap(), 2);

    let summary = finished(&mut events).await;
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.success_count, 2);
    assert_eq!(h.site.navigations(), vec![channel_url("next")]);
    assert_eq!(
        last_status(&h.store).start_time.as_deref(),
        Some("2024-04-30T09:00:00Z")
    );
}

#[tokio::test(start_paused = true)]
async fn wire_requests_get_wire_responses() {
    let h = harness(MemoryStateStore::new());

    let response = h
        .handle
        .respond(OrchestratorRequest::StartJob {
            targets: Vec::new(),
            context: CTX,
        })
        .await;
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        serde_json::json!({
            "accepted": false,
            "total": 0,
            "error": "invalid request: target list is empty"
        })
    );

    let response = h.handle.respond(OrchestratorRequest::StopJob).await;
    assert_eq!(
        response,
        OrchestratorResponse::Stop {
            success: false,
            message: "invalid request: no unsubscribe job is running".to_string()
        }
    );

    let request: OrchestratorRequest = serde_json::from_value(serde_json::json!({
        "action": "startJob",
        "targets": [{ "name": "a", "url": "https://video.example/@a" }],
        "context": 2
    }))
    .unwrap();
    h.site.add_channel("a", ChannelPage::subscribed());
    assert_eq!(
        h.handle.respond(request).await,
        OrchestratorResponse::Start {
            accepted: true,
            total: 1,
            error: None
        }
    );
}
