//! Explicit, injectable faults for exercising retry behaviour.
//!
//! A [`FaultPlan`] decides per invocation whether a component fails. The
//! plan is the only mutable state involved: the wrapped processor stays a
//! pure function of its input.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use batchwise_types::error::{BatchError, ErrorKind};

use crate::item::ItemProcessor;

#[derive(Debug)]
enum Schedule {
    Never,
    Always,
    /// 1-based invocation numbers that fail.
    On(BTreeSet<u64>),
}

/// Pass/fail schedule keyed by invocation number.
///
/// Clones share the invocation counter, so a test can keep a clone to
/// inspect how often the component was called.
#[derive(Debug, Clone)]
pub struct FaultPlan {
    schedule: Arc<Schedule>,
    invocations: Arc<AtomicU64>,
}

impl FaultPlan {
    fn with_schedule(schedule: Schedule) -> Self {
        Self {
            schedule: Arc::new(schedule),
            invocations: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn never() -> Self {
        Self::with_schedule(Schedule::Never)
    }

    #[must_use]
    pub fn always() -> Self {
        Self::with_schedule(Schedule::Always)
    }

    /// Fail exactly on the given 1-based invocation numbers.
    #[must_use]
    pub fn fail_on(invocations: impl IntoIterator<Item = u64>) -> Self {
        Self::with_schedule(Schedule::On(invocations.into_iter().collect()))
    }

    /// Count one invocation and report whether it fails.
    pub fn next_fails(&self) -> bool {
        let n = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        match self.schedule.as_ref() {
            Schedule::Never => false,
            Schedule::Always => true,
            Schedule::On(failing) => failing.contains(&n),
        }
    }

    /// Invocations counted so far.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }
}

/// Processor wrapper that fails according to a [`FaultPlan`].
pub struct FaultInjectingProcessor<P> {
    inner: P,
    plan: FaultPlan,
    kind: ErrorKind,
}

impl<P> FaultInjectingProcessor<P> {
    /// Injected failures are `processing` errors unless overridden with
    /// [`with_kind`](Self::with_kind).
    #[must_use]
    pub fn new(inner: P, plan: FaultPlan) -> Self {
        Self {
            inner,
            plan,
            kind: ErrorKind::Processing,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl<I, O, P> ItemProcessor<I, O> for FaultInjectingProcessor<P>
where
    P: ItemProcessor<I, O>,
{
    fn process(&self, item: &I) -> Result<O, BatchError> {
        if self.plan.next_fails() {
            return Err(BatchError::new(
                self.kind,
                "INJECTED_FAULT",
                format!("invocation #{} failed by fault plan", self.plan.invocations()),
            ));
        }
        self.inner.process(item)
    }
}
