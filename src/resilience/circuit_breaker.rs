//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: cooldown elapsed, a single probe is in flight
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: permission check after reset_timeout since last failure
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails
//! ```
//!
//! # Design Decisions
//! - One breaker per upstream, shared via `Arc` by every caller
//! - Recovery is checked lazily on the next permission check; no timer task
//! - Transition logic is a pure function; the breaker only applies its effects
//!   under the mutex
//! - Time comes from an injected `Clock`
//! - A failure reported while Open still counts and restarts the cooldown

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::clock::{Clock, SystemClock};

/// Circuit breaker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge value (0=Closed, 1=Open, 2=HalfOpen).
    pub fn as_metric_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerEvent {
    /// A caller asks to dispatch.
    PermissionCheck { cooldown_elapsed: bool },
    /// A dispatched call succeeded.
    Success,
    /// A dispatched call failed; `failures` already counts this one.
    Failure { failures: u32, threshold: u32 },
    /// An admitted probe resolved without a success or failure being recorded.
    ProbeAbandoned,
}

/// Side effect the breaker applies alongside the new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Let the call through.
    Admit,
    /// Fail fast.
    Reject,
    /// Clear the consecutive-failure counter.
    ResetFailures,
    /// Increment the counter and stamp the failure time.
    CountFailure,
    /// Nothing changes.
    Ignore,
}

/// Pure transition function.
pub fn transition(state: CircuitState, event: BreakerEvent) -> (CircuitState, Effect) {
    use BreakerEvent::*;
    use CircuitState::*;

    match (state, event) {
        (Closed, PermissionCheck { .. }) => (Closed, Effect::Admit),
        (Open, PermissionCheck { cooldown_elapsed: true }) => (HalfOpen, Effect::Admit),
        (Open, PermissionCheck { cooldown_elapsed: false }) => (Open, Effect::Reject),
        (HalfOpen, PermissionCheck { .. }) => (HalfOpen, Effect::Reject),

        (Closed, Success) | (HalfOpen, Success) => (Closed, Effect::ResetFailures),
        (Open, Success) => (Open, Effect::Ignore),

        (Closed, Failure { failures, threshold }) if failures >= threshold => (Open, Effect::CountFailure),
        (Closed, Failure { .. }) => (Closed, Effect::CountFailure),
        (HalfOpen, Failure { .. }) => (Open, Effect::CountFailure),
        (Open, Failure { .. }) => (Open, Effect::CountFailure),

        (HalfOpen, ProbeAbandoned) => (Open, Effect::Ignore),
        (state, ProbeAbandoned) => (state, Effect::Ignore),
    }
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
    /// Remaining cooldown in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
}

/// Shared circuit breaker guarding one upstream.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        metrics::record_breaker_state(CircuitState::Closed);
        Self {
            failure_threshold: config.failure_threshold,
            reset_timeout: config.reset_timeout(),
            clock,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
            }),
        }
    }

    // Every write under the lock is a whole transition, so a poisoned guard
    // still holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one event through the state machine under the lock.
    fn apply(&self, make_event: impl FnOnce(&BreakerState) -> BreakerEvent) -> (CircuitState, Effect) {
        let mut st = self.lock();
        let event = make_event(&st);
        let from = st.state;
        let (to, effect) = transition(from, event);

        match effect {
            Effect::ResetFailures => st.failure_count = 0,
            Effect::CountFailure => {
                st.failure_count = st.failure_count.saturating_add(1);
                st.last_failure = Some(self.clock.now());
            }
            Effect::Admit | Effect::Reject | Effect::Ignore => {}
        }
        st.state = to;
        drop(st);

        if from != to {
            log_transition(from, to, event);
            metrics::record_breaker_transition(to);
        }
        (to, effect)
    }

    fn cooldown_elapsed(&self, st: &BreakerState) -> bool {
        match st.last_failure {
            Some(at) => self.clock.now().saturating_duration_since(at) >= self.reset_timeout,
            None => true,
        }
    }

    fn check(&self) -> Admission {
        let (state, effect) = self.apply(|st| BreakerEvent::PermissionCheck {
            cooldown_elapsed: st.state == CircuitState::Open && self.cooldown_elapsed(st),
        });

        match (effect, state) {
            (Effect::Admit, CircuitState::HalfOpen) => Admission::Probe,
            (Effect::Admit, _) => Admission::Admitted,
            _ => {
                metrics::record_breaker_rejection();
                tracing::debug!(state = state.as_str(), "Circuit breaker rejected request");
                Admission::Rejected
            }
        }
    }

    /// Ask whether a call may be dispatched now.
    ///
    /// In Open, the first check after the cooldown flips the breaker to
    /// Half-Open and is the only one that receives `true`; that caller is the
    /// probe and must report back via [`record_success`](Self::record_success)
    /// or [`record_failure`](Self::record_failure).
    pub fn allow_request(&self) -> bool {
        !matches!(self.check(), Admission::Rejected)
    }

    /// Like [`allow_request`](Self::allow_request), but returns a permit that
    /// hands the probe slot back if it is dropped unresolved.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let probe = match self.check() {
            Admission::Rejected => return None,
            Admission::Admitted => false,
            Admission::Probe => true,
        };
        Some(Permit {
            breaker: self,
            probe,
            resolved: false,
        })
    }

    /// Report a successful call.
    pub fn record_success(&self) {
        self.apply(|_| BreakerEvent::Success);
    }

    /// Report a failed call.
    pub fn record_failure(&self) {
        let threshold = self.failure_threshold;
        self.apply(|st| BreakerEvent::Failure {
            failures: st.failure_count.saturating_add(1),
            threshold,
        });
    }

    fn abandon_probe(&self) {
        self.apply(|_| BreakerEvent::ProbeAbandoned);
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let st = self.lock();
        let open_remaining_ms = match (st.state, st.last_failure) {
            (CircuitState::Open, Some(at)) => {
                let elapsed = self.clock.now().saturating_duration_since(at);
                Some(self.reset_timeout.saturating_sub(elapsed).as_millis() as u64)
            }
            _ => None,
        };
        CircuitBreakerSnapshot {
            state: st.state,
            failure_count: st.failure_count,
            failure_threshold: self.failure_threshold,
            reset_timeout_ms: self.reset_timeout.as_millis() as u64,
            open_remaining_ms,
        }
    }
}

fn log_transition(from: CircuitState, to: CircuitState, event: BreakerEvent) {
    match (from, to) {
        (_, CircuitState::Open) if event == BreakerEvent::ProbeAbandoned => {
            tracing::info!(from = from.as_str(), to = to.as_str(), "Probe abandoned, circuit breaker reopened")
        }
        (_, CircuitState::Open) => {
            tracing::warn!(from = from.as_str(), to = to.as_str(), "Circuit breaker opened")
        }
        _ => tracing::info!(from = from.as_str(), to = to.as_str(), "Circuit breaker state changed"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Rejected,
    Admitted,
    Probe,
}

/// Permission to dispatch one call.
///
/// Resolve it with [`success`](Self::success) or [`failure`](Self::failure).
/// Dropping an unresolved probe permit reopens the breaker with its original
/// failure time, so the next permission check becomes the new probe.
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    resolved: bool,
}

impl Permit<'_> {
    /// True if this call is the Half-Open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.record_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.resolved {
            self.breaker.abandon_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;
    use std::thread;

    fn breaker(threshold: u32, reset_secs: u64) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::new();
        let config = CircuitBreakerConfig {
            failure_threshold: threshold,
            reset_timeout_secs: reset_secs,
        };
        (CircuitBreaker::with_clock(&config, Arc::new(clock.clone())), clock)
    }

    fn trip(cb: &CircuitBreaker) {
        while cb.state() != CircuitState::Open {
            cb.record_failure();
        }
    }

    #[test]
    fn test_transition_table() {
        use BreakerEvent::*;
        use CircuitState::*;

        let check = |elapsed| PermissionCheck { cooldown_elapsed: elapsed };
        let fail = |failures| Failure { failures, threshold: 3 };

        assert_eq!(transition(Closed, check(false)), (Closed, Effect::Admit));
        assert_eq!(transition(Open, check(false)), (Open, Effect::Reject));
        assert_eq!(transition(Open, check(true)), (HalfOpen, Effect::Admit));
        assert_eq!(transition(HalfOpen, check(true)), (HalfOpen, Effect::Reject));

        assert_eq!(transition(Closed, Success), (Closed, Effect::ResetFailures));
        assert_eq!(transition(HalfOpen, Success), (Closed, Effect::ResetFailures));
        assert_eq!(transition(Open, Success), (Open, Effect::Ignore));

        assert_eq!(transition(Closed, fail(2)), (Closed, Effect::CountFailure));
        assert_eq!(transition(Closed, fail(3)), (Open, Effect::CountFailure));
        assert_eq!(transition(HalfOpen, fail(1)), (Open, Effect::CountFailure));
        assert_eq!(transition(Open, fail(9)), (Open, Effect::CountFailure));

        assert_eq!(transition(HalfOpen, ProbeAbandoned), (Open, Effect::Ignore));
        assert_eq!(transition(Closed, ProbeAbandoned), (Closed, Effect::Ignore));
    }

    #[test]
    fn test_initial_state() {
        let (cb, _) = breaker(3, 10);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.allow_request());
    }

    #[test]
    fn test_opens_exactly_at_threshold() {
        let (cb, _) = breaker(3, 10);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_success_resets_streak() {
        let (cb, _) = breaker(3, 10);

        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_rejects_until_cooldown_then_admits_once() {
        let (cb, clock) = breaker(3, 10);
        trip(&cb);

        clock.advance(Duration::from_secs(9));
        assert!(!cb.allow_request());
        assert!(!cb.allow_request());
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(2));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(!cb.allow_request());
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let (cb, clock) = breaker(1, 10);
        cb.record_failure();

        clock.advance(Duration::from_secs(10));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_success_closes() {
        let (cb, clock) = breaker(3, 10);
        trip(&cb);
        clock.advance(Duration::from_secs(11));
        assert!(cb.allow_request());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.allow_request());
    }

    #[test]
    fn test_half_open_failure_reopens_and_restarts_cooldown() {
        let (cb, clock) = breaker(3, 10);
        trip(&cb);
        clock.advance(Duration::from_secs(11));
        assert!(cb.allow_request());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 4);

        clock.advance(Duration::from_secs(5));
        assert!(!cb.allow_request());
        clock.advance(Duration::from_secs(5));
        assert!(cb.allow_request());
    }

    #[test]
    fn test_success_while_open_is_ignored() {
        let (cb, clock) = breaker(2, 10);
        trip(&cb);
        let count = cb.failure_count();

        clock.advance(Duration::from_secs(6));
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), count);

        clock.advance(Duration::from_secs(4));
        assert!(cb.allow_request());
    }

    #[test]
    fn test_late_failure_while_open_extends_cooldown() {
        let (cb, clock) = breaker(3, 10);
        trip(&cb);

        // A call admitted before the trip fails after it.
        clock.advance(Duration::from_secs(6));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 4);

        clock.advance(Duration::from_secs(4));
        assert!(!cb.allow_request());
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(6));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_abandoned_probe_hands_slot_to_next_caller() {
        let (cb, clock) = breaker(1, 10);
        cb.record_failure();
        clock.advance(Duration::from_secs(10));

        let permit = cb.try_acquire().unwrap();
        assert!(permit.is_probe());
        assert!(cb.try_acquire().is_none());
        drop(permit);

        assert_eq!(cb.state(), CircuitState::Open);
        let next = cb.try_acquire().unwrap();
        assert!(next.is_probe());
        next.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_resolved_permits_do_not_abandon() {
        let (cb, clock) = breaker(1, 10);
        cb.record_failure();
        clock.advance(Duration::from_secs(10));

        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_none());

        // Non-probe permits never touch state on drop.
        let (cb, _) = breaker(3, 10);
        drop(cb.try_acquire().unwrap());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_snapshot() {
        let (cb, clock) = breaker(2, 10);
        cb.record_failure();
        let snap = cb.snapshot();
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 1);
        assert_eq!(snap.failure_threshold, 2);
        assert_eq!(snap.reset_timeout_ms, 10_000);
        assert!(snap.open_remaining_ms.is_none());

        cb.record_failure();
        clock.advance(Duration::from_secs(4));
        assert_eq!(cb.snapshot().open_remaining_ms, Some(6_000));
    }

    #[test]
    fn test_exactly_one_concurrent_probe() {
        let (cb, clock) = breaker(1, 10);
        cb.record_failure();
        clock.advance(Duration::from_secs(10));

        let cb = Arc::new(cb);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cb = Arc::clone(&cb);
                thread::spawn(move || cb.allow_request())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_concurrent_failures_counted() {
        let (cb, _) = breaker(1000, 10);
        let cb = Arc::new(cb);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cb = Arc::clone(&cb);
                thread::spawn(move || {
                    for _ in 0..5 {
                        cb.record_failure();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cb.failure_count(), 50);
    }
}
