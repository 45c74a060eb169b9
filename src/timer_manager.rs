//! Process-wide timer facility: a single background [`EventLoop`] that runs
//! nothing but timer callbacks, for code that wants to schedule work without
//! owning (or being near) a [`TcpEventLoop`](crate::loop_pool::TcpEventLoop)
//! of its own.
//!
//! Grounded on `original_source`'s global `TimerManager`
//! (`Server/BaseLib/include/Timers.h`'s free-function wrappers around a
//! process-lifetime `EventLoop` instance), reachable here through a
//! lazily-started `OnceLock`.

use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::event_loop::EventLoop;
use crate::timer::{TimerCallback, TimerId};

struct GlobalTimerManager {
    event_loop: Arc<EventLoop>,
    // Keeps the background thread alive for the life of the process; never
    // joined, since the manager has no shutdown path by design.
    _handle: JoinHandle<()>,
}

static MANAGER: OnceLock<GlobalTimerManager> = OnceLock::new();

fn manager() -> &'static GlobalTimerManager {
    MANAGER.get_or_init(|| {
        let event_loop = Arc::new(
            EventLoop::new(|_events| {
                unreachable!("the global timer manager's loop never registers I/O sources")
            })
            .expect("failed to create global timer manager's event loop"),
        );
        let handle = event_loop.clone().start();
        log::debug!("global timer manager started");
        GlobalTimerManager {
            event_loop,
            _handle: handle,
        }
    })
}

/// Schedules `callback` to run once, at `at`, on the global timer manager's
/// own background thread.
pub fn execute_at(at: Instant, callback: impl FnMut() + Send + 'static) -> TimerId {
    manager().event_loop.execute_at(at, Box::new(callback) as TimerCallback)
}

/// Schedules `callback` to run once, `delay` from now.
pub fn execute_after(delay: Duration, callback: impl FnMut() + Send + 'static) -> TimerId {
    manager().event_loop.execute_after(delay, Box::new(callback) as TimerCallback)
}

/// Schedules `callback` to run every `interval`, starting one `interval`
/// from now.
pub fn execute_every(interval: Duration, callback: impl FnMut() + Send + 'static) -> TimerId {
    manager().event_loop.execute_every(interval, Box::new(callback) as TimerCallback)
}

/// Cancels a timer previously returned by `execute_at`/`execute_after`/
/// `execute_every`. A no-op if it already fired (and was not repeating) or
/// was already cancelled.
pub fn cancel_timer(id: TimerId) {
    manager().event_loop.cancel_timer(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn one_shot_timer_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        execute_after(Duration::from_millis(10), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelling_a_repeating_timer_stops_it() {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let id = execute_every(Duration::from_millis(10), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(35));
        cancel_timer(id);
        let count_at_cancel = fired.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(fired.load(Ordering::SeqCst), count_at_cancel);
    }
}
