//! API key rotation with per-key cooldown

use crate::error::FailureKind;
use std::fmt;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Consecutive transient failures before a key is rested
const TRANSIENT_FAILURE_LIMIT: u32 = 3;

/// Time source for cooldown bookkeeping
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A key handed out by [`KeyPool::acquire`]
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    index: usize,
    key: String,
}

impl Credential {
    pub fn secret(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(#{})", self.index)
    }
}

/// Result of using a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(FailureKind),
}

#[derive(Debug)]
struct KeyState {
    key: String,
    cooldown_until: Option<Instant>,
    disabled: bool,
    consecutive_failures: u32,
}

impl KeyState {
    fn available(&self, now: Instant) -> bool {
        !self.disabled && self.cooldown_until.map_or(true, |until| now >= until)
    }

    fn rest(&mut self, index: usize, now: Instant, rest: Duration) {
        self.consecutive_failures += 1;
        self.cooldown_until = Some(now + rest);
        tracing::warn!("API key #{} rate limited, resting for {:?}", index, rest);
    }
}

#[derive(Debug)]
struct PoolState {
    keys: Vec<KeyState>,
    next: usize,
}

/// Round-robin pool of API keys.
///
/// Rate-limited keys rest for the provider's `Retry-After` when it sends one
/// and for the cooldown period otherwise. Rejected keys are
/// disabled for the life of the pool, and repeated transient failures also
/// earn a cooldown.
pub struct KeyPool {
    state: Mutex<PoolState>,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
}

impl KeyPool {
    pub fn new(keys: Vec<String>, cooldown: Duration) -> Self {
        Self::with_clock(keys, cooldown, Arc::new(SystemClock))
    }

    pub fn with_clock(keys: Vec<String>, cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        let keys = keys
            .into_iter()
            .map(|key| KeyState {
                key,
                cooldown_until: None,
                disabled: false,
                consecutive_failures: 0,
            })
            .collect();
        Self {
            state: Mutex::new(PoolState { keys, next: 0 }),
            cooldown,
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next usable key in rotation, or `None` if every key is resting or disabled
    pub fn acquire(&self) -> Option<Credential> {
        let now = self.clock.now();
        let mut state = self.lock();
        let count = state.keys.len();

        for offset in 0..count {
            let index = (state.next + offset) % count;
            if state.keys[index].available(now) {
                state.next = (index + 1) % count;
                return Some(Credential {
                    index,
                    key: state.keys[index].key.clone(),
                });
            }
        }
        None
    }

    /// Time until some key can be acquired: zero if one is usable now,
    /// `None` if every key is disabled.
    pub fn next_available_in(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.lock()
            .keys
            .iter()
            .filter(|key| !key.disabled)
            .map(|key| {
                key.cooldown_until
                    .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
            })
            .min()
    }

    /// Rest a rate-limited key, for `retry_after` if the provider named a delay
    pub fn report_rate_limited(&self, credential: &Credential, retry_after: Option<Duration>) {
        let now = self.clock.now();
        let rest = retry_after.unwrap_or(self.cooldown);
        let mut state = self.lock();
        let Some(key) = state.keys.get_mut(credential.index) else {
            return;
        };

        key.rest(credential.index, now, rest);
    }

    pub fn report_outcome(&self, credential: &Credential, outcome: Outcome) {
        let now = self.clock.now();
        let cooldown = self.cooldown;
        let mut state = self.lock();
        let Some(key) = state.keys.get_mut(credential.index) else {
            return;
        };

        match outcome {
            Outcome::Success => {
                key.consecutive_failures = 0;
                key.cooldown_until = None;
            }
            Outcome::Failure(FailureKind::RateLimited) => key.rest(credential.index, now, cooldown),
            Outcome::Failure(FailureKind::Unauthorized) => {
                key.disabled = true;
                tracing::warn!("API key #{} rejected, disabling it", credential.index);
            }
            Outcome::Failure(FailureKind::Transient) => {
                key.consecutive_failures += 1;
                if key.consecutive_failures >= TRANSIENT_FAILURE_LIMIT {
                    key.cooldown_until = Some(now + cooldown);
                    tracing::warn!(
                        "API key #{} failed {} times in a row, resting for {:?}",
                        credential.index,
                        key.consecutive_failures,
                        cooldown
                    );
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
