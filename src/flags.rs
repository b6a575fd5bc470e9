use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// The three single-owner coordination flags described in §3.
///
/// Writers are the control loop (the sole clearer of all three), the session listener (sets
/// `refresh`/`recreate`), the membership watcher (sets `refresh`), and the signal handler (sets
/// `should_stop`). Reads never take a lock: each flag is one `AtomicBool`, and a transient missed
/// wakeup is recovered on the loop's next long-sleep tick (§5).
#[derive(Clone)]
pub struct Flags {
    refresh: Arc<AtomicBool>,
    recreate: Arc<AtomicBool>,
    should_stop: Arc<AtomicBool>,
}

impl Flags {
    /// Construct flags in their startup state: both `refresh` and `recreate` set, since the
    /// control loop must register the membership node and build its first table before it can
    /// do anything useful (mirrors the original's `EZKRuntime.__init__`).
    pub fn new() -> Flags {
        Flags {
            refresh: Arc::new(AtomicBool::new(true)),
            recreate: Arc::new(AtomicBool::new(true)),
            should_stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_refresh(&self) {
        self.refresh.store(true, Ordering::SeqCst);
    }

    pub fn take_refresh(&self) -> bool {
        self.refresh.swap(false, Ordering::SeqCst)
    }

    pub fn refresh(&self) -> bool {
        self.refresh.load(Ordering::SeqCst)
    }

    pub fn set_recreate(&self) {
        self.recreate.store(true, Ordering::SeqCst);
    }

    pub fn take_recreate(&self) -> bool {
        self.recreate.swap(false, Ordering::SeqCst)
    }

    pub fn recreate(&self) -> bool {
        self.recreate.load(Ordering::SeqCst)
    }

    pub fn set_should_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }
}

impl Default for Flags {
    fn default() -> Flags {
        Flags::new()
    }
}

#[cfg(test)]
mod tests {
    use super::Flags;

    #[test]
    fn starts_with_refresh_and_recreate_set() {
        let flags = Flags::new();
        assert!(flags.refresh());
        assert!(flags.recreate());
        assert!(!flags.should_stop());
    }

    #[test]
    fn take_clears_and_reports_previous_value() {
        let flags = Flags::new();
        assert!(flags.take_refresh());
        assert!(!flags.refresh());
        assert!(!flags.take_refresh());
    }

    #[test]
    fn clone_shares_state() {
        let flags = Flags::new();
        let clone = flags.clone();
        clone.set_should_stop();
        assert!(flags.should_stop());
    }
}
