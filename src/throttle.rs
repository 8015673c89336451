use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Minimum-delay gate shared by all requests to one external service; more
/// callers never relax the aggregate rate.
#[derive(Debug)]
pub struct Throttle {
    min_delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last: Mutex::new(None),
        }
    }

    pub fn wait(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let mut last = self.last.lock().unwrap();
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_delay {
                thread::sleep(self.min_delay - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}
