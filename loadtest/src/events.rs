//! Progress signals emitted while a benchmark runs.
//!
//! The load test never prints anything itself. Callers that want to show progress create a
//! channel with [`Events::channel`] and render the received [`Event`]s however they like.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::phase::PhaseKind;

/// A progress signal.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The preflight check passed.
    Connected,
    /// A phase is about to release its first work item.
    PhaseStarted {
        /// The phase that started.
        phase: PhaseKind,
        /// Number of requests the phase will run.
        requests: u64,
        /// Number of workers.
        concurrency: usize,
    },
    /// One request of the running phase completed.
    RequestCompleted {
        /// The running phase.
        phase: PhaseKind,
        /// Whether the request succeeded.
        success: bool,
    },
    /// All outcomes of a phase have been collected.
    PhaseFinished {
        /// The phase that finished.
        phase: PhaseKind,
        /// Wall-clock duration of the phase.
        elapsed: Duration,
        /// Number of successful requests.
        success_count: u64,
        /// Number of failed requests.
        error_count: u64,
    },
}

/// A cheap, cloneable handle to emit [`Event`]s.
///
/// Emitting never blocks and never fails; events are dropped if nobody listens.
#[derive(Clone, Debug, Default)]
pub struct Events {
    sender: Option<mpsc::UnboundedSender<Event>>,
}

impl Events {
    /// A handle that discards all events.
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a handle along with the receiving end for its events.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let events = Self {
            sender: Some(sender),
        };
        (events, receiver)
    }

    /// Emits an event.
    pub fn emit(&self, event: Event) {
        if let Some(sender) = &self.sender {
            sender.send(event).ok();
        }
    }
}
