//! Process-wide request pacing.
//!
//! Slot grants are serialized through a single async gate: each grant waits out
//! any active cooldown, then keeps at least `min_interval + jitter` between
//! consecutive grants. Two rate-limit signals in a row without an intervening
//! success start a cooldown.
//!
//! `last_request_at` is stamped when the slot is granted, so the gap is measured
//! from grant time forward rather than from when the caller arrived.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};

use crate::policy::FetchPolicy;

/// Consecutive rate-limit signals that trigger a cooldown.
const COOLDOWN_THRESHOLD: u32 = 2;

/// Mutable pacing state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleState {
    pub last_request_at: Option<Instant>,
    pub cooldown_until: Option<Instant>,
    pub consecutive_rate_limit_count: u32,
}

impl ThrottleState {
    /// Whether a cooldown is active at `now`.
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }
}

/// Cooperative rate limiter shared by every upstream fetch.
#[derive(Debug)]
pub struct RequestThrottler {
    min_interval: Duration,
    jitter_seconds: f64,
    cooldown: Duration,
    gate: tokio::sync::Mutex<()>,
    state: Mutex<ThrottleState>,
}

impl RequestThrottler {
    pub fn new(policy: &FetchPolicy) -> Self {
        Self {
            min_interval: policy.min_interval(),
            jitter_seconds: policy.jitter_seconds.max(0.0),
            cooldown: policy.cooldown(),
            gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(ThrottleState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ThrottleState {
        *self.state()
    }

    fn target_gap(&self) -> Duration {
        let jitter = rand::random::<f64>() * self.jitter_seconds;
        self.min_interval + Duration::from_secs_f64(jitter)
    }

    /// Wait until a request may be issued, then record the grant.
    pub async fn wait_for_slot(&self) {
        let _gate = self.gate.lock().await;

        let cooldown_until = self.state().cooldown_until;
        if let Some(until) = cooldown_until
            && Instant::now() < until
        {
            tracing::info!(remaining_ms = (until - Instant::now()).as_millis() as u64, "waiting out cooldown");
            sleep_until(until).await;
        }

        let target_gap = self.target_gap();
        let last = self.state().last_request_at;
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < target_gap {
                sleep(target_gap - elapsed).await;
            }
        }

        self.state().last_request_at = Some(Instant::now());
    }

    /// Reset the consecutive rate-limit counter.
    pub fn register_success(&self) {
        self.state().consecutive_rate_limit_count = 0;
    }

    /// Record a rate-limit signal. Returns true when this signal started a cooldown.
    pub fn register_rate_limit(&self) -> bool {
        let mut state = self.state();
        state.consecutive_rate_limit_count += 1;
        if state.consecutive_rate_limit_count >= COOLDOWN_THRESHOLD {
            state.cooldown_until = Some(Instant::now() + self.cooldown);
            tracing::warn!(
                consecutive = state.consecutive_rate_limit_count,
                cooldown_secs = self.cooldown.as_secs(),
                "repeated rate limiting, entering cooldown"
            );
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FetchMethod;

    fn throttler(method: FetchMethod) -> RequestThrottler {
        RequestThrottler::new(&FetchPolicy::for_method(method))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_slot_is_immediate() {
        let t = throttler(FetchMethod::Library);
        let start = Instant::now();
        t.wait_for_slot().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(t.snapshot().last_request_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_slots_respect_min_interval() {
        let policy = FetchPolicy::for_method(FetchMethod::Library);
        let t = RequestThrottler::new(&policy);

        t.wait_for_slot().await;
        let first = t.snapshot().last_request_at.unwrap();
        t.wait_for_slot().await;
        let second = t.snapshot().last_request_at.unwrap();

        let gap = second - first;
        assert!(gap >= policy.min_interval());
        let slack = Duration::from_secs_f64(policy.jitter_seconds) + Duration::from_millis(2);
        assert!(gap <= policy.min_interval() + slack);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_period_admits_immediately() {
        let t = throttler(FetchMethod::Api);
        t.wait_for_slot().await;
        tokio::time::advance(Duration::from_secs(60)).await;

        let start = Instant::now();
        t.wait_for_slot().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rate_limits_start_cooldown() {
        let policy = FetchPolicy::for_method(FetchMethod::Api);
        let t = RequestThrottler::new(&policy);

        assert!(!t.register_rate_limit());
        let before = Instant::now();
        assert!(t.register_rate_limit());

        let state = t.snapshot();
        assert_eq!(state.consecutive_rate_limit_count, 2);
        assert!(state.cooldown_until.unwrap() >= before + policy.cooldown());
        assert!(state.is_cooling_down(Instant::now()));

        let start = Instant::now();
        t.wait_for_slot().await;
        assert!(start.elapsed() >= policy.cooldown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_between_rate_limits_prevents_cooldown() {
        let t = throttler(FetchMethod::Api);
        t.register_rate_limit();
        t.register_success();
        assert!(!t.register_rate_limit());

        let state = t.snapshot();
        assert_eq!(state.consecutive_rate_limit_count, 1);
        assert!(state.cooldown_until.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_rate_limit_then_success_never_cools_down() {
        let t = throttler(FetchMethod::Scrape);
        t.register_rate_limit();
        t.register_success();

        let state = t.snapshot();
        assert_eq!(state.consecutive_rate_limit_count, 0);
        assert!(!state.is_cooling_down(Instant::now()));
    }
}
