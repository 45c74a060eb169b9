//! Hierarchical timer queue: an ordered set of expiring callbacks, kept per
//! [`EventLoop`](crate::event_loop::EventLoop).
//!
//! Grounded on `original_source`'s `Timer`/`TimerQueue`
//! (`Server/BaseLib/include/Timers.h`): a `std::set<(Timestamp, Timer*)>` for
//! earliest-first iteration plus a `std::map<TimerId, Timer*>` for O(log n)
//! cancellation, with a "currently calling expired timers" guard that defers
//! self-cancellation until after the callback returns.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

static NEXT_TIMER_ID: AtomicI64 = AtomicI64::new(1);

/// Identifies a scheduled timer, stable across re-arming of repeating
/// timers.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TimerId(pub i64);

pub(crate) type TimerCallback = Box<dyn FnMut() + Send>;

pub(crate) struct TimerEntry {
    expiration: Instant,
    interval_ms: i64,
    callback: TimerCallback,
}

impl TimerEntry {
    fn repeat(&self) -> bool {
        self.interval_ms > 0
    }
}

/// Order key for the ordered set: earliest expiration first, ties broken on
/// `TimerId` so timers sharing an expiration still coexist (spec.md §3).
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
struct OrderKey(Instant, TimerIdOrd);

#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
struct TimerIdOrd(i64);

pub struct TimerQueue {
    ordered: BTreeSet<OrderKey>,
    entries: HashMap<TimerId, TimerEntry>,
    calling_expired: bool,
    canceling_timers: Vec<TimerId>,
}

impl Default for TimerQueue {
    fn default() -> TimerQueue {
        TimerQueue::new()
    }
}

impl TimerQueue {
    pub fn new() -> TimerQueue {
        TimerQueue {
            ordered: BTreeSet::new(),
            entries: HashMap::new(),
            calling_expired: false,
            canceling_timers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invariant check used in tests: the ordered set and the id map always
    /// agree on cardinality (spec.md §8).
    #[cfg(test)]
    fn invariant_holds(&self) -> bool {
        self.ordered.len() == self.entries.len()
    }

    pub fn add_at(&mut self, expiration: Instant, interval_ms: i64, callback: TimerCallback) -> TimerId {
        let id = TimerId(NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed));
        self.ordered.insert(OrderKey(expiration, TimerIdOrd(id.0)));
        self.entries.insert(
            id,
            TimerEntry {
                expiration,
                interval_ms,
                callback,
            },
        );
        id
    }

    pub fn add_after(&mut self, delay: Duration, interval_ms: i64, callback: TimerCallback) -> TimerId {
        self.add_at(Instant::now() + delay, interval_ms, callback)
    }

    /// Cancels a timer. A timer still sitting in the maps is removed right
    /// away. If the queue is in the middle of invoking expired callbacks
    /// (`calling_expired`), `id` is *also* recorded in `canceling_timers`
    /// regardless of whether it's still present in the maps — a timer
    /// cancelling itself from its own callback has already been removed by
    /// `extract_expired` by the time the callback runs, so checking
    /// `entries` alone would miss exactly that case and let it re-arm.
    pub fn cancel(&mut self, id: TimerId) {
        if let Some(entry) = self.entries.remove(&id) {
            self.ordered.remove(&OrderKey(entry.expiration, TimerIdOrd(id.0)));
        }
        if self.calling_expired {
            self.canceling_timers.push(id);
        }
    }

    pub fn nearest_expiration(&self) -> Option<Instant> {
        self.ordered.iter().next().map(|key| key.0)
    }

    /// Batch-extracts every timer whose expiration has passed `now`,
    /// removing each from both maps. Sets `calling_expired` so a cancel
    /// arriving while the extracted batch's callbacks are being invoked
    /// (from this thread or another) defers into `canceling_timers` instead
    /// of mutating maps the caller is about to touch again in
    /// [`finish_expired`](Self::finish_expired).
    ///
    /// Callers must invoke every extracted entry's callback with **no**
    /// `TimerQueue` lock held — a callback is free to call `cancel`/
    /// `execute_*` again, including for this same loop, and those re-lock
    /// whatever mutex guards the queue.
    pub(crate) fn extract_expired(&mut self, now: Instant) -> Vec<(TimerId, TimerEntry)> {
        self.calling_expired = true;
        self.canceling_timers.clear();

        let mut expired = Vec::new();
        while let Some(&key) = self.ordered.iter().next() {
            if key.0 > now {
                break;
            }
            self.ordered.remove(&key);
            let id = TimerId(key.1 .0);
            if let Some(entry) = self.entries.remove(&id) {
                expired.push((id, entry));
            }
        }
        expired
    }

    /// Re-arms whichever of `expired`'s repeating timers were not cancelled
    /// (from their own callback or another's) while their callbacks ran,
    /// then clears `calling_expired`. Pairs with
    /// [`extract_expired`](Self::extract_expired).
    pub(crate) fn finish_expired(&mut self, expired: Vec<(TimerId, TimerEntry)>, now: Instant) {
        for (id, mut entry) in expired {
            if entry.repeat() && !self.canceling_timers.contains(&id) {
                entry.expiration = now + Duration::from_millis(entry.interval_ms as u64);
                self.ordered.insert(OrderKey(entry.expiration, TimerIdOrd(id.0)));
                self.entries.insert(id, entry);
            }
        }
        self.calling_expired = false;
    }

    /// Convenience used by tests and by any caller with no reentrancy to
    /// worry about: extracts, invokes, and re-arms in one call. Real loop
    /// dispatch (`EventLoop::run`) must not use this — it needs to release
    /// its `TimerQueue` lock between extraction and invocation, which this
    /// single call cannot do.
    #[cfg(test)]
    pub(crate) fn process_expired(&mut self, now: Instant) {
        let mut expired = self.extract_expired(now);
        invoke_expired(&mut expired);
        self.finish_expired(expired, now);
    }
}

/// Runs every extracted timer's callback, catching and logging a panic so
/// one bad callback cannot take the whole loop thread (or caller) down.
/// Must be called with no `TimerQueue` lock held (see
/// [`TimerQueue::extract_expired`]).
pub(crate) fn invoke_expired(expired: &mut [(TimerId, TimerEntry)]) {
    for (id, entry) in expired.iter_mut() {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            (entry.callback)();
        }));
        if let Err(panic) = result {
            log::error!("timer {:?} callback panicked: {:?}", id, panic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn ordered_set_and_id_map_stay_in_sync() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let a = q.add_at(now, 0, Box::new(|| {}));
        let _b = q.add_at(now, 0, Box::new(|| {}));
        assert!(q.invariant_holds());
        q.cancel(a);
        assert!(q.invariant_holds());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn earliest_expiration_fires_first() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        q.add_at(now + Duration::from_millis(20), 0, Box::new(move || o2.lock().unwrap().push(2)));
        q.add_at(now, 0, Box::new(move || o1.lock().unwrap().push(1)));
        q.process_expired(now + Duration::from_millis(50));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn cancel_on_fired_one_shot_is_a_no_op() {
        let mut q = TimerQueue::new();
        let now = Instant::now();
        let id = q.add_at(now, 0, Box::new(|| {}));
        q.process_expired(now);
        assert!(q.is_empty());
        q.cancel(id); // must not panic
    }

    /// Drives the queue the way `EventLoop::run_expired_timers` does: the
    /// queue's lock (here a real `Mutex`, matching how `EventLoop` guards
    /// its `TimerQueue`) is released between `extract_expired` and
    /// `invoke_expired`, so the callback's own `cancel` call — for its own
    /// timer id — re-locks the same mutex instead of deadlocking, and
    /// reaches `cancel` while the entry is already out of `entries`.
    #[test]
    fn cancel_self_during_callback_prevents_rearm() {
        let queue = Arc::new(std::sync::Mutex::new(TimerQueue::new()));
        let now = Instant::now();
        let fire_count = Arc::new(AtomicUsize::new(0));
        let self_id: Arc<std::sync::Mutex<Option<TimerId>>> = Arc::new(std::sync::Mutex::new(None));

        let q_for_cb = queue.clone();
        let fc = fire_count.clone();
        let id_for_cb = self_id.clone();
        let id = queue.lock().unwrap().add_at(
            now,
            100,
            Box::new(move || {
                let n = fc.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 3 {
                    if let Some(this_id) = *id_for_cb.lock().unwrap() {
                        q_for_cb.lock().unwrap().cancel(this_id);
                    }
                }
            }),
        );
        *self_id.lock().unwrap() = Some(id);

        for tick in 0..5u32 {
            let tick_now = now + Duration::from_millis(100 * u64::from(tick));
            let mut expired = queue.lock().unwrap().extract_expired(tick_now);
            invoke_expired(&mut expired);
            queue.lock().unwrap().finish_expired(expired, tick_now);
        }

        assert_eq!(fire_count.load(Ordering::SeqCst), 3);
        assert!(queue.lock().unwrap().is_empty());
    }
}
