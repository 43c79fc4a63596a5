use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use subsweep_core::{ChannelTarget, JobSummary};
use subsweep_engine::{
    parse_records, select_targets, write_export, JobEvent, OrchestratorHandle, RonStateStore,
    Settings, StateStore,
};
use sweep_logging::{sweep_debug, sweep_info, sweep_warn};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::cli::{BrowserArgs, Cli, Command};
use crate::report::{progress_line, selection_report, status_report, summary_line};
use crate::session::{load_engine_settings, utc_date, Session, TAB};

pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_engine_settings(cli.settings.as_deref())?;
    match cli.command {
        Command::Export { out } => export(&cli.browser, settings, &out).await,
        Command::Select { csv } => {
            let targets = read_targets(&csv)?;
            println!("{}", selection_report(&targets));
            Ok(())
        }
        Command::Unsubscribe { csv, yes } => {
            unsubscribe(&cli.browser, settings, &cli.state_dir, &csv, yes).await
        }
        Command::Status => {
            let state = RonStateStore::new(cli.state_dir.clone()).load()?;
            println!("{}", status_report(state.as_ref()));
            Ok(())
        }
        Command::Resume => resume(&cli.browser, settings, &cli.state_dir).await,
    }
}

fn read_targets(csv: &Path) -> Result<Vec<ChannelTarget>> {
    let text =
        fs::read_to_string(csv).with_context(|| format!("reading {}", csv.display()))?;
    let records = parse_records(&text).with_context(|| format!("parsing {}", csv.display()))?;
    let targets = select_targets(&records);
    sweep_info!(
        "{} of {} rows in {} are marked for unsubscription",
        targets.len(),
        records.len(),
        csv.display()
    );
    Ok(targets)
}

async fn export(browser: &BrowserArgs, settings: Settings, out: &Path) -> Result<()> {
    let listing = settings.engine.listing_url.clone();
    let session = Session::open(browser, settings, &listing).await?;
    let records = session.export().await;
    session.close().await;

    let records = records?;
    let summary = write_export(out, &records, &(utc_date())())?;
    println!(
        "Exported {} subscriptions to {}",
        summary.count,
        summary.path.display()
    );
    Ok(())
}

async fn unsubscribe(
    browser: &BrowserArgs,
    settings: Settings,
    state_dir: &Path,
    csv: &Path,
    yes: bool,
) -> Result<()> {
    let targets = read_targets(csv)?;
    if targets.is_empty() {
        bail!("no channels are marked for unsubscription; put \"yes\" in the unsubscribe column");
    }
    if let Some(previous) = RonStateStore::new(state_dir.to_path_buf()).load()? {
        if previous.is_resumable() {
            sweep_warn!("An interrupted job will be replaced by this one");
        }
    }
    if !yes && !confirm(targets.len())? {
        println!("Cancelled.");
        return Ok(());
    }

    let session = Session::open(browser, settings, "about:blank").await?;
    let handle = session.orchestrator(state_dir);
    let events = handle.subscribe();
    let result = match handle.start(targets, TAB).await {
        Ok(total) => {
            println!("Unsubscribing from {total} channel(s). Press Ctrl-C to stop.");
            follow(&handle, events).await
        }
        Err(err) => Err(err.into()),
    };
    session.close().await;

    println!("{}", summary_line(&result?));
    Ok(())
}

async fn resume(browser: &BrowserArgs, settings: Settings, state_dir: &Path) -> Result<()> {
    let state = RonStateStore::new(state_dir.to_path_buf())
        .load()?
        .filter(|state| state.is_resumable());
    let Some(state) = state else {
        bail!("there is no interrupted job to resume");
    };

    let session = Session::open(browser, settings, "about:blank").await?;
    let handle = session.orchestrator(state_dir);
    let events = handle.subscribe();
    let result = match handle.resume(state, TAB).await {
        Ok(total) => {
            println!("Resuming job over {total} channel(s). Press Ctrl-C to stop.");
            follow(&handle, events).await
        }
        Err(err) => Err(err.into()),
    };
    session.close().await;

    println!("{}", summary_line(&result?));
    Ok(())
}

/// Prints progress until the job ends. The first Ctrl-C requests a stop; the
/// channel in flight still finishes.
async fn follow(
    handle: &OrchestratorHandle,
    mut events: broadcast::Receiver<JobEvent>,
) -> Result<JobSummary> {
    let mut stop_requested = false;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(JobEvent::Progress(status)) => println!("{}", progress_line(&status)),
                Ok(JobEvent::Finished(summary)) => return Ok(summary),
                Err(RecvError::Lagged(skipped)) => {
                    sweep_debug!("Skipped {skipped} progress events");
                }
                Err(RecvError::Closed) => bail!("the orchestrator stopped before the job ended"),
            },
            signal = tokio::signal::ctrl_c(), if !stop_requested => {
                signal.context("listening for Ctrl-C")?;
                stop_requested = true;
                match handle.stop().await {
                    Ok(message) => println!("{message}; finishing the current channel..."),
                    Err(err) => sweep_warn!("Stop was not accepted: {err}"),
                }
            }
        }
    }
}

fn confirm(count: usize) -> Result<bool> {
    print!("Unsubscribe from {count} channel(s)? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
