use crate::state::Job;
use crate::{
    ActionOutcome, ContextId, Coordinator, Effect, JobEnd, Msg, Phase, Reply, RequestError,
    StatusSnapshot,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages from a context other than the job owner, arriving in the wrong phase or
/// reporting on a target other than the current one are stale and produce no effects.
pub fn update(mut state: Coordinator, msg: Msg) -> (Coordinator, Vec<Effect>) {
    let mut effects = Vec::new();
    match msg {
        Msg::StartRequested { targets, owner, at } => {
            if state.job().is_some() {
                return rejected(state, RequestError::AlreadyRunning);
            }
            if targets.is_empty() {
                return rejected(state, RequestError::EmptyTargets);
            }
            let total = targets.len();
            state.begin(Job::new(targets, owner), StatusSnapshot::running(total, &at));
            effects.push(Effect::Reply(Reply::Accepted { total }));
            effects.push(Effect::Persist(state.persisted()));
            step(&mut state, &at, &mut effects);
        }
        Msg::ResumeRequested {
            persisted,
            owner,
            at,
        } => {
            if state.job().is_some() {
                return rejected(state, RequestError::AlreadyRunning);
            }
            if !persisted.is_resumable() {
                return rejected(state, RequestError::NothingToResume);
            }
            let status = persisted.status;
            let Some(pending) = persisted.pending else {
                return rejected(state, RequestError::NothingToResume);
            };
            // A record whose counters disagree with its cursor cannot be trusted.
            if status.success_count + status.error_count != status.processed {
                return rejected(state, RequestError::NothingToResume);
            }
            let total = pending.targets.len();
            let job = Job::restored(
                pending.targets,
                owner,
                status.success_count,
                status.error_count,
            );
            let start_time = status.start_time.unwrap_or_else(|| at.clone());
            let mut snapshot = StatusSnapshot::running(total, &start_time);
            snapshot.processed = status.processed;
            snapshot.success_count = status.success_count;
            snapshot.error_count = status.error_count;
            state.begin(job, snapshot);
            effects.push(Effect::Reply(Reply::Accepted { total }));
            effects.push(Effect::Persist(state.persisted()));
            step(&mut state, &at, &mut effects);
        }
        Msg::StopRequested { at } => {
            let active = state.job().filter(|job| !job.is_cancelled()).map(|job| job.phase());
            let Some(phase) = active else {
                return rejected(state, RequestError::NoActiveJob);
            };
            let idle = phase == Phase::Pacing;
            state.mark_stopped(&at);
            effects.push(Effect::Reply(Reply::Stopped {
                message: "Unsubscribe process stopped".to_string(),
            }));
            effects.push(Effect::Persist(state.persisted()));
            // Nothing is in flight between items, so the job can end right away.
            if idle {
                finish(&mut state, JobEnd::Stopped, &at, &mut effects);
            }
        }
        Msg::NavigationCompleted { context } => {
            if !expects(&state, context, Phase::Navigating) {
                return (state, effects);
            }
            if state.job().is_some_and(Job::is_cancelled) {
                finish_cancelled(&mut state, &mut effects);
            } else if let Some(job) = state.job_mut() {
                job.set_phase(Phase::AwaitingReadiness);
                effects.push(Effect::EnsureReady {
                    context,
                    index: job.cursor(),
                });
            }
        }
        Msg::NavigationFailed { context, reason } => {
            if expects(&state, context, Phase::Navigating) {
                record(&mut state, ActionOutcome::failure(reason), &mut effects);
            }
        }
        Msg::ExecutorReady { context, index } => {
            if !expects_item(&state, context, index, Phase::AwaitingReadiness) {
                return (state, effects);
            }
            if state.job().is_some_and(Job::is_cancelled) {
                finish_cancelled(&mut state, &mut effects);
            } else if let Some(job) = state.job_mut() {
                job.set_phase(Phase::Acting);
                if let Some(target) = job.current().cloned() {
                    effects.push(Effect::DispatchAction {
                        context,
                        index,
                        target,
                    });
                }
            }
        }
        Msg::ReadinessFailed {
            context,
            index,
            reason,
        } => {
            if expects_item(&state, context, index, Phase::AwaitingReadiness) {
                record(&mut state, ActionOutcome::failure(reason), &mut effects);
            }
        }
        Msg::ActionFinished {
            context,
            index,
            outcome,
        } => {
            if expects_item(&state, context, index, Phase::Acting) {
                record(&mut state, outcome, &mut effects);
            }
        }
        Msg::PacingElapsed { at } => {
            if state.job().is_some_and(|job| job.phase() == Phase::Pacing) {
                step(&mut state, &at, &mut effects);
            }
        }
        Msg::NoOp => {}
    }

    (state, effects)
}

fn rejected(state: Coordinator, reason: RequestError) -> (Coordinator, Vec<Effect>) {
    (state, vec![Effect::Reply(Reply::Rejected(reason))])
}

fn expects(state: &Coordinator, context: ContextId, phase: Phase) -> bool {
    state.job().is_some_and(|job| job.expects(context, phase))
}

/// Like `expects`, and the result must also belong to the current target.
fn expects_item(state: &Coordinator, context: ContextId, index: usize, phase: Phase) -> bool {
    state
        .job()
        .is_some_and(|job| job.cursor() == index && job.expects(context, phase))
}

/// Loop body: finish when cancelled or exhausted, otherwise navigate to the next target.
fn step(state: &mut Coordinator, at: &str, effects: &mut Vec<Effect>) {
    let Some(job) = state.job_mut() else {
        return;
    };
    if job.is_cancelled() {
        finish(state, JobEnd::Stopped, at, effects);
        return;
    }
    if job.is_exhausted() {
        finish(state, JobEnd::Completed, at, effects);
        return;
    }
    job.set_phase(Phase::Navigating);
    let context = job.owner();
    let index = job.cursor();
    if let Some(target) = job.current() {
        effects.push(Effect::Navigate {
            context,
            index,
            url: target.url.clone(),
        });
    }
}

fn record(state: &mut Coordinator, outcome: ActionOutcome, effects: &mut Vec<Effect>) {
    let Some(job) = state.job_mut() else {
        return;
    };
    job.record(&outcome);
    if job.is_cancelled() {
        finish_cancelled(state, effects);
        return;
    }
    job.set_phase(Phase::Pacing);
    state.sync_counts();
    effects.push(Effect::Persist(state.persisted()));
    effects.push(Effect::SchedulePacing);
}

/// Ends a job whose stop was already recorded, keeping the stop timestamp.
fn finish_cancelled(state: &mut Coordinator, effects: &mut Vec<Effect>) {
    let at = state.status().completed_at.clone().unwrap_or_default();
    finish(state, JobEnd::Stopped, &at, effects);
}

fn finish(state: &mut Coordinator, end: JobEnd, at: &str, effects: &mut Vec<Effect>) {
    if let Some(summary) = state.finish(end, at) {
        effects.push(Effect::Persist(state.persisted()));
        effects.push(Effect::Finished(summary));
    }
}
