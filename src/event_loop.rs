//! The single-threaded run loop: owns a [`Demultiplexer`], a queue of
//! functions delegated to it from other threads, a finalizer queue, and a
//! [`TimerQueue`].
//!
//! Grounded on `original_source`'s `EventLoop`/`OsEventLoop`
//! (`EventLoop.h`): `start`/`stop(force, wait_for)`, `execute_in_loop`,
//! `delegate_to_loop`, `add_finalizer`, and the one-iteration algorithm
//! (`runLoop`) of calc-timeout → `doLoopWork` → drain delegated functors →
//! drain finalizers → process expired timers.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crate::demux::DemuxEvent;
use crate::sys;
use crate::timer::{invoke_expired, TimerCallback, TimerId, TimerQueue};
use crate::token::WAKE_TOKEN;

type LoopFn = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct FunctorList {
    items: Mutex<Vec<LoopFn>>,
}

impl FunctorList {
    fn push(&self, f: LoopFn) {
        self.items.lock().unwrap().push(f);
    }

    /// Swaps the queue out under the lock and runs everything outside it,
    /// so a functor that itself calls back into the loop cannot deadlock.
    fn drain_and_run(&self) {
        let drained = std::mem::take(&mut *self.items.lock().unwrap());
        for f in drained {
            f();
        }
    }
}

/// Handle kept by other threads to submit work to a running loop.
pub struct EventLoopConfig {
    pub poll_event_capacity: usize,
}

impl Default for EventLoopConfig {
    fn default() -> EventLoopConfig {
        EventLoopConfig {
            poll_event_capacity: 256,
        }
    }
}

pub struct EventLoop {
    selector: Arc<sys::Selector>,
    #[cfg(unix)]
    waker: sys::Waker,
    delegated: FunctorList,
    finalizers: FunctorList,
    timers: Mutex<TimerQueue>,
    running: AtomicBool,
    loop_thread_id: Mutex<Option<ThreadId>>,
    dispatch: Box<dyn Fn(&[DemuxEvent]) + Send + Sync>,
    poll_event_capacity: usize,
}

impl EventLoop {
    /// `dispatch` receives every non-wakeup event reported by a `poll`
    /// call; `TcpEventLoop` (see `crate::loop_pool`) plugs in connection
    /// routing here. Uses [`EventLoopConfig::default`].
    pub fn new(dispatch: impl Fn(&[DemuxEvent]) + Send + Sync + 'static) -> io::Result<EventLoop> {
        Self::with_config(EventLoopConfig::default(), dispatch)
    }

    pub fn with_config(
        config: EventLoopConfig,
        dispatch: impl Fn(&[DemuxEvent]) + Send + Sync + 'static,
    ) -> io::Result<EventLoop> {
        let selector = Arc::new(sys::Selector::new()?);
        #[cfg(unix)]
        let waker = sys::Waker::new(&selector, WAKE_TOKEN)?;
        Ok(EventLoop {
            selector,
            #[cfg(unix)]
            waker,
            delegated: FunctorList::default(),
            finalizers: FunctorList::default(),
            timers: Mutex::new(TimerQueue::new()),
            running: AtomicBool::new(false),
            loop_thread_id: Mutex::new(None),
            dispatch: Box::new(dispatch),
            poll_event_capacity: config.poll_event_capacity,
        })
    }

    pub fn selector(&self) -> &Arc<sys::Selector> {
        &self.selector
    }

    /// Interrupts a blocked `poll`, on whichever thread is currently
    /// running it. Unix wakes via a registered pipe; Windows posts directly
    /// to the completion port the selector already owns.
    #[cfg(unix)]
    fn wake(&self) -> io::Result<()> {
        self.waker.wake()
    }

    #[cfg(windows)]
    fn wake(&self) -> io::Result<()> {
        self.selector.wake()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_in_loop_thread(&self) -> bool {
        *self.loop_thread_id.lock().unwrap() == Some(thread::current().id())
    }

    /// Runs `f` immediately if called from the loop thread, otherwise
    /// queues it and wakes the loop.
    pub fn execute_in_loop(&self, f: impl FnOnce() + Send + 'static) {
        if self.is_in_loop_thread() {
            f();
        } else {
            self.delegate_to_loop(f);
        }
    }

    /// Always queues `f` to run on the next iteration, even from the loop
    /// thread itself.
    pub fn delegate_to_loop(&self, f: impl FnOnce() + Send + 'static) {
        self.delegated.push(Box::new(f));
        let _ = self.wake();
    }

    /// Runs `f` once the current iteration's dispatch has fully returned;
    /// used to destroy a connection only after its callback chain unwinds.
    pub fn add_finalizer(&self, f: impl FnOnce() + Send + 'static) {
        self.finalizers.push(Box::new(f));
    }

    pub fn execute_at(&self, at: Instant, callback: TimerCallback) -> TimerId {
        let id = self.timers.lock().unwrap().add_at(at, 0, callback);
        let _ = self.wake();
        id
    }

    pub fn execute_after(&self, delay: Duration, callback: TimerCallback) -> TimerId {
        let id = self.timers.lock().unwrap().add_after(delay, 0, callback);
        let _ = self.wake();
        id
    }

    pub fn execute_every(&self, interval: Duration, callback: TimerCallback) -> TimerId {
        let id = self
            .timers
            .lock()
            .unwrap()
            .add_after(interval, interval.as_millis() as i64, callback);
        let _ = self.wake();
        id
    }

    pub fn cancel_timer(&self, id: TimerId) {
        self.timers.lock().unwrap().cancel(id);
    }

    /// Spawns the dedicated OS thread and blocks the caller until the loop
    /// has recorded its thread id, mirroring `EventLoop::start` synchronous
    /// handoff semantics.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let loop_ref = self.clone();
        thread::spawn(move || {
            *loop_ref.loop_thread_id.lock().unwrap() = Some(thread::current().id());
            loop_ref.running.store(true, Ordering::Release);
            loop_ref.run();
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let _ = self.wake();
    }

    fn run(&self) {
        let mut events = Vec::with_capacity(self.poll_event_capacity);
        while self.running.load(Ordering::Acquire) {
            events.clear();
            let timeout = self.calc_wait_timeout();
            log::trace!("event loop polling with timeout {:?}", timeout);

            if let Err(e) = self.selector.select(&mut events, timeout) {
                if e.kind() != io::ErrorKind::Interrupted {
                    log::error!("demultiplexer poll failed: {}", e);
                }
                continue;
            }

            let (wake_events, io_events): (Vec<_>, Vec<_>) =
                events.drain(..).partition(|e| e.token == WAKE_TOKEN);
            #[cfg(unix)]
            if !wake_events.is_empty() {
                self.waker.drain();
            }
            #[cfg(windows)]
            let _ = wake_events;

            if !io_events.is_empty() {
                self.run_guarded(|| (self.dispatch)(&io_events));
            }

            self.delegated.drain_and_run();
            self.finalizers.drain_and_run();
            self.run_expired_timers();
        }
    }

    /// Extracts due timers, invokes their callbacks with the `timers` lock
    /// released, then re-locks to re-arm repeats. A callback that calls
    /// `cancel_timer`/`execute_*` for this loop (spec §8 scenario 5: a
    /// repeating timer cancelling itself) re-locks `self.timers` from the
    /// loop thread; holding the lock across the callback invocation would
    /// deadlock that re-entrant lock attempt.
    fn run_expired_timers(&self) {
        let now = Instant::now();
        let mut expired = self.timers.lock().unwrap().extract_expired(now);
        invoke_expired(&mut expired);
        self.timers.lock().unwrap().finish_expired(expired, now);
    }

    fn calc_wait_timeout(&self) -> Option<Duration> {
        let nearest = self.timers.lock().unwrap().nearest_expiration();
        nearest.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Runs `f`, catching and logging a panic so one bad callback cannot
    /// take the whole loop thread down.
    fn run_guarded(&self, f: impl FnOnce() + std::panic::UnwindSafe) {
        if let Err(payload) = std::panic::catch_unwind(f) {
            log::error!("event loop dispatch panicked: {:?}", payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn delegated_work_runs_on_loop_thread() {
        let seen_thread = Arc::new(Mutex::new(None));
        let st = seen_thread.clone();
        let event_loop = Arc::new(
            EventLoop::new(move |_events| {
                let _ = &st;
            })
            .unwrap(),
        );
        let handle = event_loop.clone().start();
        // Give the loop thread a moment to record its id.
        std::thread::sleep(Duration::from_millis(20));

        let done = Arc::new(AtomicUsize::new(0));
        let done2 = done.clone();
        event_loop.delegate_to_loop(move || {
            done2.fetch_add(1, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(done.load(Ordering::SeqCst), 1);

        event_loop.stop();
        handle.join().unwrap();
    }

    #[test]
    fn timer_fires_and_wakes_idle_loop() {
        let event_loop = Arc::new(EventLoop::new(|_events| {}).unwrap());
        let handle = event_loop.clone().start();
        std::thread::sleep(Duration::from_millis(20));

        let fired = Arc::new(AtomicUsize::new(0));
        let f2 = fired.clone();
        event_loop.execute_after(Duration::from_millis(10), Box::new(move || {
            f2.fetch_add(1, Ordering::SeqCst);
        }));

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        event_loop.stop();
        handle.join().unwrap();
    }
}
