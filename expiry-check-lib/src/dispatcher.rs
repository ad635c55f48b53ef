//! Bounded-concurrency work dispatcher.
//!
//! [`WorkDispatcher`] reads domain names line by line, lets the
//! [`InputPolicy`] decide what to do with each line, and schedules exactly one
//! probe per accepted domain. At most `budget` probes run at once: when every
//! slot is taken, the *reader* waits, never a worker. Once input ends the
//! dispatcher waits for every scheduled unit of work before returning.

use crate::concurrent::{CompletionBarrier, CompletionToken, ConcurrencyBudget, ConcurrencySlot};
use crate::error::ExpiryCheckError;
use crate::probes::ExpiryProbe;
use crate::reporter::ResultReporter;
use crate::types::{ProbeOutcome, ProbeResult};
use crate::validation::{is_valid_domain, probe_host};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// What to do with blank or syntactically invalid input lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum InputPolicy {
    /// Stop reading at the first blank or invalid line. Later lines are
    /// never scheduled, even if they are valid.
    #[default]
    StopOnFirstAnomaly,

    /// Log and skip blank or invalid lines, keep reading.
    SkipAnomalies,
}

/// Decision for one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Probe this entry
    Schedule,
    /// Ignore this line and read the next one
    Skip(StopReason),
    /// Stop reading input
    Stop(StopReason),
}

/// Why input consumption ended (or why a line was skipped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// Every line was read
    EndOfInput,
    /// An empty line
    BlankLine { line: usize },
    /// A line that is not a plausible domain
    MalformedEntry { line: usize, entry: String },
    /// Reading the input failed
    ReadError { line: usize, message: String },
}

impl InputPolicy {
    /// Decide what happens to `entry`, found on 1-based line `line`.
    pub fn admit(&self, line: usize, entry: &str) -> Admission {
        let anomaly = if entry.is_empty() {
            StopReason::BlankLine { line }
        } else if !is_valid_domain(entry) {
            StopReason::MalformedEntry {
                line,
                entry: entry.to_string(),
            }
        } else {
            return Admission::Schedule;
        };

        match self {
            Self::StopOnFirstAnomaly => Admission::Stop(anomaly),
            Self::SkipAnomalies => Admission::Skip(anomaly),
        }
    }
}

impl StopReason {
    /// The input error this reason corresponds to, if any.
    pub fn as_error(&self) -> Option<ExpiryCheckError> {
        match self {
            Self::MalformedEntry { line, entry } => {
                Some(ExpiryCheckError::malformed_input(*line, entry.clone()))
            }
            Self::ReadError { message, .. } => {
                Some(ExpiryCheckError::file_error("input", message.clone()))
            }
            Self::EndOfInput | Self::BlankLine { .. } => None,
        }
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    /// Units of work launched (one per accepted line)
    pub scheduled: usize,
    /// Input lines read, including the one that stopped the run
    pub lines_read: usize,
    /// Lines skipped under [`InputPolicy::SkipAnomalies`]
    pub skipped: Vec<StopReason>,
    /// Why reading stopped
    pub stop_reason: StopReason,
}

/// Schedules one probe per accepted domain under a fixed concurrency budget.
pub struct WorkDispatcher {
    probe: Arc<dyn ExpiryProbe>,
    reporter: Arc<dyn ResultReporter>,
    budget: ConcurrencyBudget,
    barrier: CompletionBarrier,
    policy: InputPolicy,
}

impl WorkDispatcher {
    /// Create a dispatcher running `probe` with at most `budget` probes in
    /// flight. A zero budget is a configuration error.
    pub fn new(
        probe: Arc<dyn ExpiryProbe>,
        reporter: Arc<dyn ResultReporter>,
        budget: usize,
    ) -> Result<Self, ExpiryCheckError> {
        Ok(Self {
            probe,
            reporter,
            budget: ConcurrencyBudget::new(budget)?,
            barrier: CompletionBarrier::new(),
            policy: InputPolicy::default(),
        })
    }

    pub fn with_input_policy(mut self, policy: InputPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn budget(&self) -> &ConcurrencyBudget {
        &self.budget
    }

    /// Read `source` to its end (or to the point the input policy stops it),
    /// schedule one probe per accepted line, and wait until every scheduled
    /// probe has reported.
    ///
    /// A read error stops input the same way an anomaly does; it is returned
    /// only after the in-flight probes have drained.
    pub async fn run<R>(self, source: R) -> Result<DispatchSummary, ExpiryCheckError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = source.lines();
        let mut lines_read = 0usize;
        let mut scheduled = 0usize;
        let mut skipped = Vec::new();

        info!(
            mode = %self.probe.mode(),
            budget = self.budget.capacity(),
            "dispatch started"
        );

        let stop_reason = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break StopReason::EndOfInput,
                Err(e) => {
                    break StopReason::ReadError {
                        line: lines_read + 1,
                        message: e.to_string(),
                    }
                }
            };
            lines_read += 1;

            match self.policy.admit(lines_read, &line) {
                Admission::Schedule => {}
                Admission::Skip(reason) => {
                    warn!(?reason, "skipping input line");
                    skipped.push(reason);
                    continue;
                }
                Admission::Stop(reason) => break reason,
            }

            // back-pressure point: waits here while the budget is used up
            let slot = match self.budget.acquire().await {
                Ok(slot) => slot,
                Err(e) => {
                    break StopReason::ReadError {
                        line: lines_read,
                        message: e.to_string(),
                    }
                }
            };
            let token = self.barrier.add();

            debug!(domain = %line, line = lines_read, "scheduling probe");
            self.spawn_unit(line, slot, token);
            scheduled += 1;
        };

        // drain: no new units may start, wait for the launched ones
        drop(lines);
        self.budget.close();

        if stop_reason != StopReason::EndOfInput {
            warn!(
                ?stop_reason,
                "input consumption stopped early; later lines were not scheduled"
            );
        }

        self.barrier.wait().await;
        info!(scheduled, lines_read, "dispatch finished");

        if let StopReason::ReadError { .. } = &stop_reason {
            if let Some(err) = stop_reason.as_error() {
                return Err(err);
            }
        }

        Ok(DispatchSummary {
            scheduled,
            lines_read,
            skipped,
            stop_reason,
        })
    }

    /// Launch one unit of work. The slot and token are released when the
    /// task ends, however it ends.
    fn spawn_unit(&self, domain: String, slot: ConcurrencySlot, token: CompletionToken) {
        let probe = self.probe.clone();
        let reporter = self.reporter.clone();

        tokio::spawn(async move {
            let result = execute_unit(probe.as_ref(), domain).await;
            reporter.report(result);
            drop(slot);
            drop(token);
        });
    }
}

/// Run the probe for one entry and wrap whatever happens in a [`ProbeResult`].
async fn execute_unit(probe: &dyn ExpiryProbe, domain: String) -> ProbeResult {
    let start = Instant::now();
    let host = probe_host(&domain);

    let outcome = match AssertUnwindSafe(probe.days_remaining(host))
        .catch_unwind()
        .await
    {
        Ok(result) => ProbeOutcome::from(result),
        Err(panic) => ProbeOutcome::Failure {
            error: ExpiryCheckError::internal(format!(
                "probe panicked: {}",
                panic_message(panic.as_ref())
            )),
        },
    };

    debug!(domain = %domain, ?outcome, "probe finished");

    ProbeResult {
        domain,
        mode: probe.mode(),
        outcome,
        check_duration: Some(start.elapsed()),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
