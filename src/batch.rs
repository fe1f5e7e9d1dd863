//! Concurrent mirror downloads
//! Fixed-size worker pool draining a shared job queue; one result is
//! collected per job and a failing download never aborts its siblings.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{mpsc, Mutex};
use std::thread;

use log::{error, info};

use crate::config::FileDownload;
use crate::error::Result;
use crate::fetch::Fetcher;

/// Default number of concurrent download workers.
pub const DEFAULT_WORKERS: usize = 5;

#[derive(Debug, Default)]
pub struct MirrorReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl MirrorReport {
    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run `run` over every job with at most `workers` threads.
/// Failures come back as values; nothing here short-circuits the batch.
pub fn run_batch<J, F>(jobs: Vec<J>, workers: usize, run: F) -> Vec<(J, Result<()>)>
where
    J: Send,
    F: Fn(&J) -> Result<()> + Sync,
{
    if jobs.is_empty() {
        return Vec::new();
    }

    let worker_count = workers.max(1).min(jobs.len());
    let queue = Mutex::new(VecDeque::from(jobs));
    let (tx, rx) = mpsc::channel();

    thread::scope(|s| {
        for _ in 0..worker_count {
            let tx = tx.clone();
            let queue = &queue;
            let run = &run;
            s.spawn(move || loop {
                let job = match queue.lock() {
                    Ok(mut q) => q.pop_front(),
                    Err(_) => None,
                };
                let Some(job) = job else { break };
                let result = run(&job);
                if tx.send((job, result)).is_err() {
                    break;
                }
            });
        }
        drop(tx);
        rx.iter().collect()
    })
}

/// Download every configured file into `output_dir`, logging per-file
/// outcomes. Destination paths are distinct per job, so workers share no
/// mutable state.
pub fn mirror(
    fetcher: &Fetcher,
    downloads: &[FileDownload],
    output_dir: &Path,
    workers: usize,
) -> MirrorReport {
    let jobs: Vec<FileDownload> = downloads.to_vec();
    let results = run_batch(jobs, workers, |job| {
        fetcher
            .fetch_to_file_with_retry(&job.url, &output_dir.join(&job.file_name))
            .map(|_| ())
    });

    let mut report = MirrorReport::default();
    for (job, result) in results {
        match result {
            Ok(()) => report.succeeded.push(job.file_name),
            Err(e) => {
                error!("Failed to download {}: {}", job.file_name, e);
                report.failed.push(job.file_name);
            }
        }
    }

    info!(
        "Mirror finished: {} ok, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    report
}
