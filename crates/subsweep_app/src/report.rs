use subsweep_core::{ChannelTarget, JobEnd, JobSummary, PersistedState, StatusSnapshot};

pub fn progress_line(status: &StatusSnapshot) -> String {
    let percent = if status.total_channels == 0 {
        0
    } else {
        status.processed * 100 / status.total_channels
    };
    format!(
        "{}/{} ({percent}%) - {} unsubscribed, {} failed",
        status.processed, status.total_channels, status.success_count, status.error_count
    )
}

pub fn summary_line(summary: &JobSummary) -> String {
    let verb = match summary.end {
        JobEnd::Completed => "Completed",
        JobEnd::Stopped => "Stopped",
    };
    format!(
        "{verb}: {} of {} processed, {} unsubscribed, {} failed",
        summary.processed, summary.total, summary.success_count, summary.error_count
    )
}

pub fn status_report(state: Option<&PersistedState>) -> String {
    let Some(state) = state else {
        return "No job has run yet.".to_string();
    };
    let status = &state.status;
    let headline = if status.is_running {
        if state.is_resumable() {
            "Interrupted (run `subsweep resume` to continue)"
        } else {
            "Running"
        }
    } else if status.stopped {
        "Stopped"
    } else if status.completed {
        "Completed"
    } else {
        "Idle"
    };
    let mut lines = vec![headline.to_string(), progress_line(status)];
    if let Some(started) = &status.start_time {
        lines.push(format!("Started:  {started}"));
    }
    if let Some(ended) = &status.completed_at {
        lines.push(format!("Finished: {ended}"));
    }
    lines.join("\n")
}

pub fn selection_report(targets: &[ChannelTarget]) -> String {
    let mut lines = vec![format!(
        "{} channel(s) marked for unsubscription",
        targets.len()
    )];
    lines.extend(
        targets
            .iter()
            .enumerate()
            .map(|(i, target)| format!("{:>4}. {} <{}>", i + 1, target.name, target.url)),
    );
    lines.join("\n")
}
