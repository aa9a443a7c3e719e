//! Scan sessions: first-wins acceptance with a settle delay before delivery.
//!
//! A session turns the noisy stream of [`DecodeAttempt`]s coming off the
//! capture thread into a single [`ResultDelivery`]:
//!
//! ```text
//! Idle --submit(valid)--> Accepted --settle delay--> Delivered
//!   ^                        |
//!   +-------- cancel --------+
//! ```
//!
//! The first attempt that passes the confidence filter wins; everything after
//! it is ignored. Delivery happens `settle_delay` after acceptance on the
//! session's timer thread and is handed to an [`Executor`] (the interaction
//! context) to run the consumer. `cancel` and the timer take the same lock, so
//! a cancel that lands before the deadline always prevents delivery.

use crate::config::{ConfigError, ScanConfig};
use crate::decoder::DecodeAttempt;
use crate::dispatch::Executor;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// The accepted payload, handed to the consumer once per session.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDelivery {
    /// Accepted payload.
    pub payload: String,
    /// Confidence of the accepted attempt, if the engine scored it.
    pub confidence: Option<f32>,
    /// When the session accepted the attempt.
    pub accepted_at: Instant,
    /// When the settle delay elapsed and delivery was dispatched.
    pub delivered_at: Instant,
}

impl ResultDelivery {
    /// Time between acceptance and delivery.
    #[must_use]
    pub fn settle_time(&self) -> Duration {
        self.delivered_at.saturating_duration_since(self.accepted_at)
    }
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for an acceptable attempt.
    Idle,
    /// A payload is accepted and its delivery is pending.
    Accepted,
    /// The payload has been dispatched to the consumer.
    Delivered,
}

/// What `submit` did with an attempt. Anything but `Accepted` left the
/// session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The attempt was accepted and delivery scheduled.
    Accepted,
    /// The session already holds a payload.
    AlreadyAccepted,
    /// Confidence missing or not above the threshold.
    BelowConfidence,
    /// The payload was empty.
    EmptyPayload,
}

/// Failure to construct a session.
#[derive(Debug)]
pub enum SessionError {
    /// The configuration was rejected.
    InvalidConfig(ConfigError),
    /// The timer thread could not be started.
    Spawn(std::io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfig(err) => write!(f, "Invalid scan configuration: {err}"),
            Self::Spawn(err) => write!(f, "Failed to start session timer: {err}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidConfig(err) => Some(err),
            Self::Spawn(err) => Some(err),
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig(err)
    }
}

type Consumer = Box<dyn FnOnce(ResultDelivery) + Send + 'static>;

struct Pending {
    payload: String,
    confidence: Option<f32>,
    accepted_at: Instant,
    deadline: Instant,
}

enum State {
    Idle,
    Accepted(Pending),
    Delivered(String),
}

struct Inner {
    state: State,
    consumer: Option<Consumer>,
    shutdown: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One scanning screen's worth of debouncing.
///
/// All methods take `&self` and may be called from any thread; `submit`
/// never waits for anything but the state lock.
pub struct ScanSession {
    shared: Arc<Shared>,
    config: ScanConfig,
    timer: Option<JoinHandle<()>>,
}

impl ScanSession {
    /// Create a session that delivers through `executor` to `on_result`.
    pub fn new<F>(
        config: ScanConfig,
        executor: Arc<dyn Executor>,
        on_result: F,
    ) -> Result<Self, SessionError>
    where
        F: FnOnce(ResultDelivery) + Send + 'static,
    {
        config.validate()?;

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: State::Idle,
                consumer: Some(Box::new(on_result)),
                shutdown: false,
            }),
            wake: Condvar::new(),
        });

        let timer = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("scan-session-timer".to_owned())
                .spawn(move || run_timer(&shared, executor.as_ref()))
                .map_err(SessionError::Spawn)?
        };

        debug!(
            settle_ms = config.settle_delay.as_millis(),
            min_confidence = ?config.min_confidence,
            "Scan session created"
        );

        Ok(Self {
            shared,
            config,
            timer: Some(timer),
        })
    }

    /// The session's configuration.
    #[must_use]
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Offer an attempt. The first one that passes the filters wins.
    pub fn submit(&self, attempt: DecodeAttempt) -> Submission {
        if attempt.payload.is_empty() {
            return Submission::EmptyPayload;
        }
        if let Some(threshold) = self.config.min_confidence {
            if !attempt.confidence.is_some_and(|c| c > threshold) {
                trace!(
                    confidence = ?attempt.confidence,
                    threshold,
                    "Discarding low confidence attempt"
                );
                return Submission::BelowConfidence;
            }
        }

        let mut inner = self.shared.lock();
        if !matches!(inner.state, State::Idle) {
            return Submission::AlreadyAccepted;
        }

        let accepted_at = Instant::now();
        info!(
            len = attempt.payload.len(),
            confidence = ?attempt.confidence,
            "Accepted payload, delivering after settle delay"
        );
        inner.state = State::Accepted(Pending {
            payload: attempt.payload,
            confidence: attempt.confidence,
            accepted_at,
            deadline: accepted_at + self.config.settle_delay,
        });
        drop(inner);

        self.shared.wake.notify_all();
        Submission::Accepted
    }

    /// Drop a pending delivery and go back to idle.
    ///
    /// Returns `true` if a delivery was cancelled. Calling it when idle or
    /// after delivery does nothing.
    pub fn cancel(&self) -> bool {
        let mut inner = self.shared.lock();
        if !matches!(inner.state, State::Accepted(_)) {
            return false;
        }
        inner.state = State::Idle;
        drop(inner);

        debug!("Pending delivery cancelled");
        self.shared.wake.notify_all();
        true
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self.shared.lock().state {
            State::Idle => Phase::Idle,
            State::Accepted(_) => Phase::Accepted,
            State::Delivered(_) => Phase::Delivered,
        }
    }

    /// Whether the result has been dispatched.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        self.phase() == Phase::Delivered
    }

    /// The accepted payload, pending or delivered.
    #[must_use]
    pub fn accepted(&self) -> Option<String> {
        match &self.shared.lock().state {
            State::Idle => None,
            State::Accepted(pending) => Some(pending.payload.clone()),
            State::Delivered(payload) => Some(payload.clone()),
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        {
            let mut inner = self.shared.lock();
            inner.shutdown = true;
            if matches!(inner.state, State::Accepted(_)) {
                debug!("Session dropped with a pending delivery");
                inner.state = State::Idle;
            }
        }
        self.shared.wake.notify_all();

        if let Some(timer) = self.timer.take() {
            if timer.thread().id() == thread::current().id() {
                return;
            }
            if timer.join().is_err() {
                warn!("Session timer thread panicked");
            }
        }
    }
}

/// Timer loop: sleep until the pending deadline, then deliver exactly once.
fn run_timer(shared: &Shared, executor: &dyn Executor) {
    let mut inner = shared.lock();
    loop {
        if inner.shutdown {
            return;
        }

        let deadline = match &inner.state {
            State::Accepted(pending) => Some(pending.deadline),
            State::Idle | State::Delivered(_) => None,
        };
        let Some(deadline) = deadline else {
            inner = shared.wake.wait(inner).unwrap_or_else(PoisonError::into_inner);
            continue;
        };

        let now = Instant::now();
        if now < deadline {
            inner = shared
                .wake
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            continue;
        }

        let State::Accepted(pending) = std::mem::replace(&mut inner.state, State::Idle) else {
            continue;
        };
        inner.state = State::Delivered(pending.payload.clone());
        let consumer = inner.consumer.take();
        drop(inner);

        let delivery = ResultDelivery {
            payload: pending.payload,
            confidence: pending.confidence,
            accepted_at: pending.accepted_at,
            delivered_at: now,
        };
        info!(
            settle_ms = delivery.settle_time().as_millis(),
            "Delivering scan result"
        );
        if let Some(consumer) = consumer {
            executor.execute(Box::new(move || consumer(delivery)));
        }

        inner = shared.lock();
    }
}
