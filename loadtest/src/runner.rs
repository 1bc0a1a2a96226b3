//! Run simulated users concurrently against a remote file storage service.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::http::HttpRemote;
use crate::metrics::{Report, Transfer};
use crate::session::{Action, Upload, User};
use crate::workload::Workload;

/// Runs the users of `workload` concurrently against the remote for `duration`.
///
/// Every user first uploads a seed file, then repeatedly performs a randomly chosen action and
/// waits for its think-time. All users stop at the deadline, including those in the middle of a
/// request. Failed requests are recorded and never retried.
pub async fn run(remote: HttpRemote, workload: Workload, duration: Duration) -> Result<Report> {
    let remote = Arc::new(remote);
    let workload = Arc::new(workload);
    let report = Arc::new(Mutex::new(Report::default()));

    let bar = ProgressBar::new_spinner()
        .with_style(ProgressStyle::with_template("{spinner} {msg} {elapsed}")?)
        .with_message(format!("Running load test with {} users:", workload.users));
    bar.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let started_at = tokio::time::Instant::now();
    let deadline = started_at + duration;

    tracing::info!(users = workload.users, ?duration, "starting load test");

    let tasks: Vec<_> = (0..workload.users)
        .map(|id| {
            let user = User::new(id, Arc::clone(&workload));
            let start_at = started_at + workload.start_delay(id);
            tokio::spawn(run_user(
                Arc::clone(&remote),
                user,
                Arc::clone(&report),
                start_at,
                deadline,
            ))
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        if let Err(err) = result {
            tracing::error!(error = &err as &dyn std::error::Error, "user task panicked");
        }
    }
    bar.finish_and_clear();

    let mut report = std::mem::take(&mut *report.lock().unwrap());
    report.set_duration(start.elapsed());

    tracing::info!(
        requests = report.total().requests(),
        failures = report.total().failures(),
        "load test finished"
    );

    Ok(report)
}

async fn run_user(
    remote: Arc<HttpRemote>,
    mut user: User,
    report: Arc<Mutex<Report>>,
    start_at: tokio::time::Instant,
    deadline: tokio::time::Instant,
) {
    // See <https://docs.rs/tokio/latest/tokio/time/struct.Sleep.html#examples>
    let sleep = tokio::time::sleep_until(deadline);
    tokio::pin!(sleep);

    let session = async {
        tokio::time::sleep_until(start_at).await;
        tracing::debug!(user = user.id(), "user started");

        let action = user.seed_upload();
        perform(&remote, &mut user, action, &report).await;

        while tokio::time::Instant::now() < deadline {
            let action = user.next_action();
            perform(&remote, &mut user, action, &report).await;

            let think_time = user.think_time();
            tokio::time::sleep(think_time).await;
        }
    };

    tokio::select! {
        _ = session => {}
        _ = &mut sleep => {}
    }

    tracing::debug!(
        user = user.id(),
        known_files = user.known_files().len(),
        "user stopped"
    );
}

/// Performs a single action and records its outcome.
async fn perform(remote: &HttpRemote, user: &mut User, action: Action, report: &Mutex<Report>) {
    let name = action.name();
    let start = Instant::now();

    let outcome = match action {
        Action::Upload(Upload { filename, contents }) => {
            let size = contents.len() as u64;
            match remote.upload(&filename, contents).await {
                Ok(()) => {
                    user.uploaded(filename);
                    Ok(Transfer::sent(size))
                }
                Err(err) => Err(err),
            }
        }
        Action::Download(filename) => remote.download(&filename).await.map(Transfer::received),
        Action::List => match remote.list().await {
            Ok(files) => {
                user.listed(files);
                Ok(Transfer::default())
            }
            Err(err) => Err(err),
        },
        Action::Health => remote.get("/health").await.map(Transfer::received),
        Action::Metrics => remote.get("/metrics").await.map(Transfer::received),
        Action::Root => remote.get("/").await.map(Transfer::received),
    };
    let elapsed = start.elapsed();

    let mut report = report.lock().unwrap();
    match outcome {
        Ok(transfer) => report.record_success(name, elapsed, transfer),
        Err(err) => {
            tracing::debug!(
                user = user.id(),
                request = name,
                error = &err as &dyn std::error::Error,
                "request failed"
            );
            report.record_failure(name, elapsed, err.to_string());
        }
    }
}
