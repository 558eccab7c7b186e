// File: orchestrator.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use colored::Colorize;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use log::{debug, warn};

use crate::config::ScanConfig;
use crate::error::ProbeError;
use crate::httpspec::RequestSpec;
use crate::resilience::deliver_with_retry;
use crate::samples::{Sample, SampleClass};
use crate::transport::{ClientTransport, RawTransport, Transport};
use crate::verdict::{classify, failure_verdict, Verdict};
use crate::wire::{resolve_destination, EffectiveRequest};

/// Aggregate over all completed verdicts of one run. Owned by the single
/// collector; workers never touch it.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    total: usize,
    correct: usize,
    black_total: usize,
    black_correct: usize,
    white_total: usize,
    white_incorrect: usize,
    elapsed: Duration,
}

impl RunStatistics {
    pub fn new(total: usize) -> Self {
        RunStatistics {
            total,
            correct: 0,
            black_total: 0,
            black_correct: 0,
            white_total: 0,
            white_incorrect: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Folds one verdict in; each verdict contributes exactly once.
    pub fn record(&mut self, verdict: &Verdict) {
        if verdict.correct {
            self.correct += 1;
        }
        match verdict.sample.class {
            SampleClass::Black => {
                self.black_total += 1;
                if verdict.correct {
                    self.black_correct += 1;
                }
            }
            SampleClass::White => {
                self.white_total += 1;
                if !verdict.correct {
                    self.white_incorrect += 1;
                }
            }
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.black_total + self.white_total
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn incorrect(&self) -> usize {
        self.completed() - self.correct
    }

    pub fn black_total(&self) -> usize {
        self.black_total
    }

    pub fn black_correct(&self) -> usize {
        self.black_correct
    }

    pub fn white_total(&self) -> usize {
        self.white_total
    }

    pub fn white_incorrect(&self) -> usize {
        self.white_incorrect
    }

    /// Fraction of black samples correctly blocked, in percent.
    pub fn detection_rate(&self) -> f64 {
        percentage(self.black_correct, self.black_total)
    }

    /// Fraction of white samples incorrectly blocked, in percent.
    pub fn false_positive_rate(&self) -> f64 {
        percentage(self.white_incorrect, self.white_total)
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn samples_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.completed() as f64 / secs
        } else {
            0.0
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

#[derive(Debug)]
pub struct RunOutput {
    pub verdicts: Vec<Verdict>,
    pub stats: RunStatistics,
    pub status: RunStatus,
}

/// Live handle to a run. `stop` only prevents samples that have not yet
/// been submitted to a worker; in-flight deliveries finish naturally.
pub struct RunHandle {
    stop: Arc<AtomicBool>,
    status: Arc<Mutex<RunStatus>>,
    task: tokio::task::JoinHandle<RunOutput>,
}

impl RunHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// A detached stop trigger, e.g. for a signal handler.
    pub fn stopper(&self) -> StopSignal {
        StopSignal(Arc::clone(&self.stop))
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock().expect("status lock poisoned")
    }

    pub async fn wait(self) -> anyhow::Result<RunOutput> {
        Ok(self.task.await?)
    }
}

#[derive(Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct Orchestrator {
    config: Arc<ScanConfig>,
    transport: Arc<dyn Transport>,
}

impl Orchestrator {
    pub fn new(config: ScanConfig) -> Result<Self, ProbeError> {
        let transport: Arc<dyn Transport> = if config.use_client_transport {
            Arc::new(
                ClientTransport::new(config.protocol, config.timeouts)
                    .map_err(|e| ProbeError::config(e.to_string()))?,
            )
        } else {
            Arc::new(RawTransport::new(config.protocol, config.timeouts))
        };
        Ok(Orchestrator {
            config: Arc::new(config),
            transport,
        })
    }

    /// Same orchestrator with the transport swapped out; used by tests to
    /// script delivery behavior.
    pub fn with_transport(config: ScanConfig, transport: Arc<dyn Transport>) -> Self {
        Orchestrator {
            config: Arc::new(config),
            transport,
        }
    }

    /// Fans the samples out across the worker pool and returns
    /// immediately with a handle to the running batch.
    pub fn start(&self, samples: Vec<Sample>) -> RunHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let status = Arc::new(Mutex::new(RunStatus::Running));
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.config),
            Arc::clone(&self.transport),
            samples,
            Arc::clone(&stop),
            Arc::clone(&status),
        ));
        RunHandle { stop, status, task }
    }
}

async fn run_loop(
    config: Arc<ScanConfig>,
    transport: Arc<dyn Transport>,
    samples: Vec<Sample>,
    stop: Arc<AtomicBool>,
    status: Arc<Mutex<RunStatus>>,
) -> RunOutput {
    let total = samples.len();
    let start = Instant::now();
    let mut stats = RunStatistics::new(total);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(config.workers));
    let progress = if config.debug {
        None
    } else {
        Some(progress_bar(total as u64))
    };

    let mut futures = FuturesUnordered::new();
    for sample in samples {
        let config = Arc::clone(&config);
        let transport = Arc::clone(&transport);
        let semaphore = Arc::clone(&semaphore);
        let stop = Arc::clone(&stop);
        futures.push(tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            if stop.load(Ordering::SeqCst) {
                debug!("skipping {} (stop requested)", sample.name);
                return None;
            }
            Some(probe_sample(&*transport, &config, sample).await)
        }));
    }

    // Single consumer: verdicts fold into the statistics in arrival
    // order, each exactly once.
    let mut verdicts = Vec::with_capacity(total);
    while let Some(joined) = futures.next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                warn!("worker task failed: {e}");
                continue;
            }
        };
        let Some(verdict) = result else { continue };
        stats.record(&verdict);
        if let Some(pb) = &progress {
            pb.inc(1);
        } else {
            print_progress_line(&verdict, stats.completed(), total);
        }
        verdicts.push(verdict);
    }

    if let Some(pb) = &progress {
        pb.finish();
    }
    stats.set_elapsed(start.elapsed());

    let final_status = if stop.load(Ordering::SeqCst) {
        RunStatus::Aborted
    } else {
        RunStatus::Completed
    };
    *status.lock().expect("status lock poisoned") = final_status;

    RunOutput {
        verdicts,
        stats,
        status: final_status,
    }
}

/// One worker's whole pipeline for one sample: read, parse, resolve,
/// deliver with retry, classify. Every failure is contained in the
/// returned verdict.
async fn probe_sample(transport: &dyn Transport, config: &ScanConfig, sample: Sample) -> Verdict {
    let content = match tokio::fs::read(&sample.path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => return failure_verdict(&sample, format!("cannot read sample: {e}")),
    };

    let spec = match RequestSpec::parse(&content) {
        Ok(spec) => spec,
        Err(e) => return failure_verdict(&sample, e.to_string()),
    };

    let destination = match resolve_destination(&spec, Some(&config.target), config.protocol) {
        Ok(destination) => destination,
        Err(e) => return failure_verdict(&sample, e.to_string()),
    };

    let request = EffectiveRequest::new(spec, destination);
    let outcome = deliver_with_retry(transport, &request, &config.retry).await;
    classify(&sample, outcome, &config.policy)
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap()
        .with_key("eta", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            write!(w, "{:.1}s", state.eta().as_secs_f64()).unwrap()
        })
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb
}

fn print_progress_line(verdict: &Verdict, completed: usize, total: usize) {
    let mark = if verdict.correct {
        "✓ expected".green().to_string()
    } else {
        "✗ unexpected".red().to_string()
    };
    let observed = if verdict.outcome.status != 0 {
        let mut s = verdict.outcome.status.to_string();
        if !verdict.outcome.reason.is_empty() {
            let _ = write!(s, " ({})", verdict.outcome.reason);
        }
        s
    } else {
        verdict.outcome.reason.clone()
    };
    println!(
        "[{}/{}] {} ({}) - {} - {}",
        completed, total, verdict.sample.name, verdict.sample.class.label(), mark, observed
    );
}
