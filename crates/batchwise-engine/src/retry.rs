//! Bounded-retry fault-tolerance policy and per-chunk retry bookkeeping.
//!
//! A [`RetryPolicy`] enrolls error kinds and caps how many failures a
//! single chunk may absorb. The [`ChunkRetryState`] counts those failures
//! and is reset at every chunk boundary, so budget never carries over.

use std::collections::BTreeSet;
use std::time::Duration;

use batchwise_types::error::{BatchError, ErrorKind};

/// Exponential delay between attempts. The default waits zero time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    pub const NONE: Self = Self {
        initial: Duration::ZERO,
        max: Duration::ZERO,
    };

    /// `initial * 2^(attempt - 1)`, capped at `max`.
    #[must_use]
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Delay before re-attempting after the `attempt`-th failure (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        if self.initial.is_zero() {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Fault-tolerance policy attached to a step.
///
/// [`RetryPolicy::none`] is the absent policy: any error is fatal on the
/// first attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    retry_limit: u32,
    retry_on: BTreeSet<ErrorKind>,
    reprocess_same_item: bool,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Policy with the given limit and no enrolled kinds yet.
    #[must_use]
    pub fn new(retry_limit: u32) -> Self {
        Self {
            retry_limit,
            retry_on: BTreeSet::new(),
            reprocess_same_item: true,
            backoff: Backoff::NONE,
        }
    }

    /// Enroll an error kind. `configuration` is never enrolled.
    #[must_use]
    pub fn retry_on(mut self, kind: ErrorKind) -> Self {
        if kind != ErrorKind::Configuration {
            self.retry_on.insert(kind);
        }
        self
    }

    #[must_use]
    pub fn retry_on_all(self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        kinds.into_iter().fold(self, Self::retry_on)
    }

    /// When `false`, an item-level failure within budget drops the failing
    /// item instead of re-presenting it.
    #[must_use]
    pub fn reprocess_same_item(mut self, reprocess: bool) -> Self {
        self.reprocess_same_item = reprocess;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    #[must_use]
    pub fn retryable_kinds(&self) -> &BTreeSet<ErrorKind> {
        &self.retry_on
    }

    #[must_use]
    pub fn reprocesses_same_item(&self) -> bool {
        self.reprocess_same_item
    }

    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    #[must_use]
    pub fn retries(&self, kind: ErrorKind) -> bool {
        self.retry_on.contains(&kind)
    }

    /// `true` when at least one failure can be absorbed.
    #[must_use]
    pub fn is_fault_tolerant(&self) -> bool {
        self.retry_limit > 0 && !self.retry_on.is_empty()
    }
}

/// Outcome of offering an error to the policy.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Re-attempt the same item, or the same flush, after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Drop the failing item and continue with the next one.
    Skip { attempt: u32 },
    /// Fatal for the step.
    Fail(BatchError),
}

impl RetryDecision {
    #[must_use]
    pub fn delay(&self) -> Duration {
        match self {
            Self::Retry { delay, .. } => *delay,
            Self::Skip { .. } | Self::Fail(_) => Duration::ZERO,
        }
    }
}

/// Attempt counter and last error for the chunk in progress.
#[derive(Debug, Default)]
pub struct ChunkRetryState {
    attempts: u32,
    last_error: Option<BatchError>,
}

impl ChunkRetryState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new chunk with a full budget.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.last_error = None;
    }

    /// Failures absorbed or rejected in the current chunk.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&BatchError> {
        self.last_error.as_ref()
    }

    /// Count `err` against the chunk budget and decide how to proceed.
    ///
    /// Kinds outside the policy fail immediately without consuming budget.
    pub fn on_error(&mut self, policy: &RetryPolicy, err: BatchError) -> RetryDecision {
        if !policy.retries(err.kind) {
            self.last_error = Some(err.clone());
            return RetryDecision::Fail(err);
        }

        self.attempts += 1;
        let attempt = self.attempts;
        self.last_error = Some(err.clone());

        if attempt > policy.retry_limit {
            return RetryDecision::Fail(err);
        }
        if err.kind.is_item_level() && !policy.reprocess_same_item {
            return RetryDecision::Skip { attempt };
        }
        RetryDecision::Retry {
            attempt,
            delay: policy.backoff.delay(attempt),
        }
    }
}
