use std::sync::Once;

use pretty_assertions::assert_eq;
use subsweep_core::{
    update, ActionOutcome, ChannelTarget, ContextId, ControlRole, Coordinator, Effect,
    FailureReason, JobEnd, JobSummary, Msg, Phase, Reply, RequestError, SessionState,
};

const OWNER: ContextId = ContextId(7);

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(sweep_logging::initialize_for_tests);
}

fn targets(names: &[&str]) -> Vec<ChannelTarget> {
    names
        .iter()
        .map(|name| ChannelTarget::new(*name, format!("https://video.example/@{name}")))
        .collect()
}

fn start(names: &[&str]) -> (Coordinator, Vec<Effect>) {
    update(
        Coordinator::new(),
        Msg::StartRequested {
            targets: targets(names),
            owner: OWNER,
            at: "2024-05-01T10:00:00Z".to_string(),
        },
    )
}

/// Walks the current item through navigation and readiness up to dispatch.
fn reach_dispatch(state: Coordinator) -> (Coordinator, Vec<Effect>) {
    let index = state.job().expect("job").cursor();
    let (state, effects) = update(state, Msg::NavigationCompleted { context: OWNER });
    assert_eq!(
        effects,
        vec![Effect::EnsureReady {
            context: OWNER,
            index
        }]
    );
    update(
        state,
        Msg::ExecutorReady {
            context: OWNER,
            index,
        },
    )
}

fn finish_item(state: Coordinator, outcome: ActionOutcome) -> (Coordinator, Vec<Effect>) {
    let index = state.job().expect("job").cursor();
    update(
        state,
        Msg::ActionFinished {
            context: OWNER,
            index,
            outcome,
        },
    )
}

fn pace(state: Coordinator) -> (Coordinator, Vec<Effect>) {
    update(
        state,
        Msg::PacingElapsed {
            at: "2024-05-01T10:05:00Z".to_string(),
        },
    )
}

fn assert_counter_invariant(state: &Coordinator) {
    if let Some(job) = state.job() {
        assert_eq!(job.success_count() + job.error_count(), job.cursor());
        assert!(job.cursor() <= job.targets().len());
    }
    let status = state.status();
    assert_eq!(status.success_count + status.error_count, status.processed);
    assert!(status.processed <= status.total_channels);
}

#[test]
fn start_persists_then_navigates_to_first_target() {
    init_logging();
    let (state, effects) = start(&["a", "b"]);

    assert_eq!(effects.len(), 3);
    assert_eq!(effects[0], Effect::Reply(Reply::Accepted { total: 2 }));
    match &effects[1] {
        Effect::Persist(persisted) => {
            assert!(persisted.status.is_running);
            assert_eq!(persisted.status.total_channels, 2);
            assert_eq!(
                persisted.status.start_time.as_deref(),
                Some("2024-05-01T10:00:00Z")
            );
            assert_eq!(persisted.pending.as_ref().map(|p| p.targets.len()), Some(2));
        }
        other => panic!("expected persist, got {other:?}"),
    }
    assert_eq!(
        effects[2],
        Effect::Navigate {
            context: OWNER,
            index: 0,
            url: "https://video.example/@a".to_string(),
        }
    );
    assert_eq!(state.session(), SessionState::Running);
    assert_eq!(state.job().map(|job| job.phase()), Some(Phase::Navigating));
}

#[test]
fn empty_start_is_rejected() {
    init_logging();
    let (state, effects) = start(&[]);
    assert_eq!(
        effects,
        vec![Effect::Reply(Reply::Rejected(RequestError::EmptyTargets))]
    );
    assert_eq!(state.session(), SessionState::Idle);
}

#[test]
fn second_start_is_rejected_while_running() {
    init_logging();
    let (state, _) = start(&["a"]);
    let before = state.clone();
    let (state, effects) = update(
        state,
        Msg::StartRequested {
            targets: targets(&["z"]),
            owner: ContextId(99),
            at: "2024-05-01T10:01:00Z".to_string(),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::Reply(Reply::Rejected(RequestError::AlreadyRunning))]
    );
    assert_eq!(state, before);
}

#[test]
fn targets_are_dispatched_in_order_with_pacing_between() {
    init_logging();
    let (mut state, _) = start(&["a", "b", "c"]);
    let mut dispatched = Vec::new();

    for _ in 0..3 {
        let (next, effects) = reach_dispatch(state);
        for effect in effects {
            if let Effect::DispatchAction { index, target, .. } = effect {
                dispatched.push((index, target.name));
            }
        }
        let (next, effects) = finish_item(next, ActionOutcome::Success);
        assert_eq!(effects.last(), Some(&Effect::SchedulePacing));
        assert_counter_invariant(&next);
        let (next, _) = pace(next);
        assert_counter_invariant(&next);
        state = next;
    }

    assert_eq!(
        dispatched,
        vec![
            (0, "a".to_string()),
            (1, "b".to_string()),
            (2, "c".to_string())
        ]
    );
    assert_eq!(state.session(), SessionState::Completed);
}

#[test]
fn success_then_control_not_found_completes_with_one_of_each() {
    init_logging();
    let (state, _) = start(&["A", "B"]);
    let (state, _) = reach_dispatch(state);
    let (state, _) = finish_item(state, ActionOutcome::Success);
    let (state, _) = pace(state);
    let (state, _) = reach_dispatch(state);
    let (state, _) = finish_item(
        state,
        ActionOutcome::failure(FailureReason::ControlNotFound {
            role: ControlRole::Subscription,
        }),
    );
    let (state, effects) = pace(state);

    let status = state.status();
    assert_eq!(status.success_count, 1);
    assert_eq!(status.error_count, 1);
    assert_eq!(status.processed, 2);
    assert!(status.completed);
    assert!(!status.is_running);
    assert_eq!(status.completed_at.as_deref(), Some("2024-05-01T10:05:00Z"));

    assert_eq!(
        effects.last(),
        Some(&Effect::Finished(JobSummary {
            end: JobEnd::Completed,
            total: 2,
            processed: 2,
            success_count: 1,
            error_count: 1,
        }))
    );
    match &effects[0] {
        Effect::Persist(persisted) => assert!(persisted.pending.is_none()),
        other => panic!("expected final persist, got {other:?}"),
    }
}

#[test]
fn navigation_and_readiness_failures_count_as_item_errors() {
    init_logging();
    let (state, _) = start(&["a", "b"]);
    let (state, effects) = update(
        state,
        Msg::NavigationFailed {
            context: OWNER,
            reason: FailureReason::Navigation {
                message: "tab closed".to_string(),
            },
        },
    );
    assert_eq!(effects.last(), Some(&Effect::SchedulePacing));
    assert_eq!(state.status().error_count, 1);

    let (state, _) = pace(state);
    let (state, _) = update(state, Msg::NavigationCompleted { context: OWNER });
    let (state, _) = update(
        state,
        Msg::ReadinessFailed {
            context: OWNER,
            index: 1,
            reason: FailureReason::Unreachable,
        },
    );
    assert_eq!(state.status().error_count, 2);
    assert_eq!(state.status().processed, 2);
    assert_counter_invariant(&state);
}

#[test]
fn signals_from_foreign_contexts_are_ignored() {
    init_logging();
    let (state, _) = start(&["a"]);
    let before = state.clone();

    let (state, effects) = update(
        state,
        Msg::NavigationCompleted {
            context: ContextId(1),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state, before);

    let (state, _) = update(state, Msg::NavigationCompleted { context: OWNER });
    let (state, effects) = update(
        state,
        Msg::ExecutorReady {
            context: ContextId(1),
            index: 0,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(
        state.job().map(|job| job.phase()),
        Some(Phase::AwaitingReadiness)
    );
}

#[test]
fn duplicate_ready_and_stale_results_are_ignored() {
    init_logging();
    let (state, _) = start(&["a", "b"]);
    let (state, _) = reach_dispatch(state);

    // A late announcement after the probe already succeeded.
    let (state, effects) = update(
        state,
        Msg::ExecutorReady {
            context: OWNER,
            index: 0,
        },
    );
    assert!(effects.is_empty());

    // A result for an index that is not the current one.
    let (state, effects) = update(
        state,
        Msg::ActionFinished {
            context: OWNER,
            index: 1,
            outcome: ActionOutcome::Success,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.status().processed, 0);
}

#[test]
fn noop_leaves_state_untouched() {
    let state = Coordinator::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn readiness_failure_for_a_finished_item_does_not_fail_the_next_one() {
    init_logging();
    let (state, _) = start(&["a", "b"]);

    // The announcement moves item 0 on while its readiness probe is still running.
    let (state, _) = reach_dispatch(state);
    let (state, _) = finish_item(state, ActionOutcome::Success);
    let (state, _) = pace(state);
    let (state, effects) = update(state, Msg::NavigationCompleted { context: OWNER });
    assert_eq!(
        effects,
        vec![Effect::EnsureReady {
            context: OWNER,
            index: 1
        }]
    );

    // The probe for item 0 gives up late.
    let (state, effects) = update(
        state,
        Msg::ReadinessFailed {
            context: OWNER,
            index: 0,
            reason: FailureReason::Unreachable,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.status().error_count, 0);
    assert_eq!(
        state.job().map(|job| job.phase()),
        Some(Phase::AwaitingReadiness)
    );

    // Item 1 still gets its action.
    let (_, effects) = update(
        state,
        Msg::ExecutorReady {
            context: OWNER,
            index: 1,
        },
    );
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::DispatchAction { index: 1, target, .. } if target.name == "b"
    )));
}
