use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Interrupted,
}

/// Blocking inter-tick delay that another thread can cut short.
pub trait Pacer: Send {
    fn wait(&self, interval: Duration) -> WaitOutcome;
}
