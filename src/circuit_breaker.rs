//! # Circuit Breaker Module
//!
//! Guards the completion service: after repeated failures the breaker opens
//! and questions are answered with the retry-later message without calling
//! the service until the reset period has elapsed.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::BreakerConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
    trial_started: Option<Instant>,
}

/// Circuit breaker for completion requests
///
/// - **Closed**: requests pass through
/// - **Open**: `threshold` consecutive failures seen less than `reset_secs` ago
/// - **Half-open**: after the reset period a single trial request is let
///   through while concurrent callers still see the breaker open; a success
///   closes the breaker, a failure re-opens it. A trial that never reports
///   back is replaced after another reset period.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: BreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    /// Check if the breaker is open (blocking requests)
    pub fn is_open(&self) -> bool {
        let mut state = self.lock();
        if state.failure_count < self.config.threshold {
            return false;
        }
        let reset = Duration::from_secs(self.config.reset_secs);
        match state.last_failure_time {
            Some(last) if last.elapsed() < reset => true,
            _ => match state.trial_started {
                Some(started) if started.elapsed() < reset => true,
                _ => {
                    state.trial_started = Some(Instant::now());
                    false
                }
            },
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_time = Some(Instant::now());
        state.trial_started = None;
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        state.failure_count = 0;
        state.last_failure_time = None;
        state.trial_started = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // A poisoned lock only means a panic mid-update of the counters
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
