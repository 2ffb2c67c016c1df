// ABOUTME: Test utilities for spool, including a scripted upload transport.
// ABOUTME: Used in tests to simulate delivery outcomes without a network.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::entry::Entry;
use crate::transport::UploadTransport;

/// A transport that returns pre-configured outcomes and records every attempt.
///
/// Outcomes queued with [`ScriptedTransport::with_outcomes`] are consumed in
/// order; once they run out, the default outcome applies. An optional delay
/// holds each attempt open so tests can observe overlapping deliveries via
/// [`ScriptedTransport::max_in_flight`].
#[derive(Debug)]
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<bool>>,
    default_outcome: AtomicBool,
    delay: Option<Duration>,
    attempts: Mutex<Vec<Entry>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    fn new(default_outcome: bool) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            default_outcome: AtomicBool::new(default_outcome),
            delay: None,
            attempts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every attempt succeeds.
    pub fn succeeding() -> Self {
        Self::new(true)
    }

    /// Every attempt fails.
    pub fn failing() -> Self {
        Self::new(false)
    }

    /// Queue explicit outcomes that are used before the default.
    pub fn with_outcomes(self, outcomes: impl IntoIterator<Item = bool>) -> Self {
        self.outcomes
            .lock()
            .expect("outcomes lock poisoned")
            .extend(outcomes);
        self
    }

    /// Hold every attempt open for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change the outcome used once the scripted queue is empty.
    pub fn set_default_outcome(&self, outcome: bool) {
        self.default_outcome.store(outcome, Ordering::SeqCst);
    }

    /// Every attempt made so far, successful or not, in call order.
    pub fn attempts(&self) -> Vec<Entry> {
        self.attempts.lock().expect("attempts lock poisoned").clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().expect("attempts lock poisoned").len()
    }

    /// Highest number of attempts that were in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadTransport for ScriptedTransport {
    async fn attempt_delivery(&self, destination: &str, body: &str) -> bool {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        self.attempts
            .lock()
            .expect("attempts lock poisoned")
            .push(Entry::new(destination, body));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .outcomes
            .lock()
            .expect("outcomes lock poisoned")
            .pop_front()
            .unwrap_or_else(|| self.default_outcome.load(Ordering::SeqCst));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
