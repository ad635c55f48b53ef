//! Result sinks.
//!
//! Units of work hand each [`ProbeResult`] to a [`ResultReporter`] as soon as
//! the probe finishes. After that, the reporter owns the result.

use crate::types::ProbeResult;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Consumer of probe results. Called concurrently from many units of work.
pub trait ResultReporter: Send + Sync {
    fn report(&self, result: ProbeResult);
}

/// Forwards results over an unbounded channel, so a consumer can render them
/// as they complete. The receiver sees the end of the stream once the
/// dispatcher (and with it the last reporter handle) is dropped.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<ProbeResult>,
}

impl ChannelReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProbeResult>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ResultReporter for ChannelReporter {
    fn report(&self, result: ProbeResult) {
        // a closed receiver means nobody is listening any more
        let _ = self.sender.send(result);
    }
}

/// Keeps every result in memory, in completion order.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    results: Mutex<Vec<ProbeResult>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the results reported so far.
    pub fn results(&self) -> Vec<ProbeResult> {
        self.results
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.results().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultReporter for CollectingReporter {
    fn report(&self, result: ProbeResult) {
        match self.results.lock() {
            Ok(mut guard) => guard.push(result),
            Err(poisoned) => poisoned.into_inner().push(result),
        }
    }
}
