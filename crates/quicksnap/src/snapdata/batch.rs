//! Cooperative, time-sliced batch processing.
//!
//! Indexing runs on the host's event loop. A [`BatchProducer`] is resumable:
//! it is driven one batch at a time until either it finishes or the tick's
//! [`TimeBudget`] runs out, and continues from the same place next tick.

use std::time::{Duration, Instant};

use super::store::PointStore;

/// Work that fills a [`PointStore`] one batch at a time
pub trait BatchProducer {
    fn is_done(&self) -> bool;

    /// Copy at most `batch_size` points into `store`, returning how many
    fn produce_next(&mut self, store: &mut PointStore, batch_size: usize) -> usize;
}

/// Wall-clock budget of one tick
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    start: Instant,
    limit: Option<Duration>,
}

impl TimeBudget {
    pub fn new(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit: Some(limit),
        }
    }

    /// Budget that never runs out
    pub fn unlimited() -> Self {
        Self {
            start: Instant::now(),
            limit: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.start.elapsed() >= limit)
    }
}

/// How a drive call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    Finished,
    /// Budget ran out before the producer was done
    Yielded,
}

/// Run `producer` until done or out of budget. At least one batch runs per
/// call, so progress is guaranteed even with a zero budget.
pub fn drive<P: BatchProducer + ?Sized>(
    producer: &mut P,
    store: &mut PointStore,
    batch_size: usize,
    budget: &TimeBudget,
) -> DriveOutcome {
    loop {
        if producer.is_done() {
            return DriveOutcome::Finished;
        }
        producer.produce_next(store, batch_size);
        if producer.is_done() {
            return DriveOutcome::Finished;
        }
        if budget.exhausted() {
            return DriveOutcome::Yielded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        remaining: usize,
        calls: usize,
    }

    impl BatchProducer for Counter {
        fn is_done(&self) -> bool {
            self.remaining == 0
        }

        fn produce_next(&mut self, _store: &mut PointStore, batch_size: usize) -> usize {
            let n = batch_size.min(self.remaining);
            self.remaining -= n;
            self.calls += 1;
            n
        }
    }

    #[test]
    fn test_zero_budget_runs_one_batch_per_call() {
        let mut store = PointStore::new(0);
        let mut counter = Counter { remaining: 2500, calls: 0 };
        let budget = TimeBudget::new(Duration::ZERO);

        assert_eq!(drive(&mut counter, &mut store, 1000, &budget), DriveOutcome::Yielded);
        assert_eq!(drive(&mut counter, &mut store, 1000, &budget), DriveOutcome::Yielded);
        assert_eq!(drive(&mut counter, &mut store, 1000, &budget), DriveOutcome::Finished);
        assert_eq!(counter.calls, 3);
    }

    #[test]
    fn test_unlimited_budget_finishes() {
        let mut store = PointStore::new(0);
        let mut counter = Counter { remaining: 2500, calls: 0 };
        assert_eq!(
            drive(&mut counter, &mut store, 1000, &TimeBudget::unlimited()),
            DriveOutcome::Finished
        );
        assert_eq!(counter.calls, 3);
        assert!(!TimeBudget::unlimited().exhausted());
    }
}
