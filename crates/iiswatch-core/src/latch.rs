//! One-shot / resettable latches used for the discovery-done signal and the
//! global stop event (spec §5): "process-wide, one-shot latched semantics
//! (set by any thread; observed by waiters; discovery-done is explicitly
//! cleared by Checker before each request)".

use std::sync::{Condvar, Mutex};

#[derive(Default)]
pub struct Latch {
    flag: Mutex<bool>,
    cv: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        let mut flag = self.flag.lock().expect("latch lock poisoned");
        *flag = true;
        self.cv.notify_all();
    }

    /// Blocks until [`Latch::signal`] is called. If already signaled,
    /// returns immediately.
    pub fn wait(&self) {
        let mut flag = self.flag.lock().expect("latch lock poisoned");
        while !*flag {
            flag = self.cv.wait(flag).expect("latch lock poisoned");
        }
    }

    /// Required before each new discovery request: a missed reset here
    /// causes the next `wait` to return immediately on stale state (spec §9).
    pub fn clear(&self) {
        let mut flag = self.flag.lock().expect("latch lock poisoned");
        *flag = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.flag.lock().expect("latch lock poisoned")
    }
}
