//! The global timer manager's `execute_every`/`cancel_timer`: a repeating
//! timer that cancels itself from inside its own callback stops rearming
//! rather than firing once more.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proactor::timers::{cancel_timer, execute_every};
use proactor::TimerId;

#[test]
fn repeating_timer_cancelling_itself_does_not_fire_again() {
    let fire_count = Arc::new(AtomicUsize::new(0));
    let self_id: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));

    let fc = fire_count.clone();
    let sid = self_id.clone();
    let id = execute_every(Duration::from_millis(15), move || {
        let n = fc.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 2 {
            if let Some(id) = *sid.lock().unwrap() {
                cancel_timer(id);
            }
        }
    });
    *self_id.lock().unwrap() = Some(id);

    std::thread::sleep(Duration::from_millis(200));
    let final_count = fire_count.load(Ordering::SeqCst);
    assert_eq!(final_count, 2);

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fire_count.load(Ordering::SeqCst), final_count);
}
