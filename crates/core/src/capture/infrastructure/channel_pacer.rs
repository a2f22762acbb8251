use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::capture::domain::pacer::{Pacer, WaitOutcome};

/// [`Pacer`] that sleeps in `recv_timeout` on a cancellation channel.
///
/// Interrupts coalesce: several interrupts before the next wait cancel that
/// one wait only.
pub struct ChannelPacer {
    tx: Sender<()>,
    rx: Receiver<()>,
}

/// Cloneable handle that cancels the pacer's current or next wait.
#[derive(Clone)]
pub struct PacerInterrupt {
    tx: Sender<()>,
}

impl PacerInterrupt {
    pub fn interrupt(&self) {
        // full means an interrupt is already pending
        let _ = self.tx.try_send(());
    }
}

impl ChannelPacer {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    pub fn interrupt_handle(&self) -> PacerInterrupt {
        PacerInterrupt {
            tx: self.tx.clone(),
        }
    }
}

impl Default for ChannelPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacer for ChannelPacer {
    fn wait(&self, interval: Duration) -> WaitOutcome {
        match self.rx.recv_timeout(interval) {
            Ok(()) => WaitOutcome::Interrupted,
            Err(RecvTimeoutError::Timeout) => WaitOutcome::Elapsed,
            // unreachable while `self.tx` is alive
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_elapses() {
        let pacer = ChannelPacer::new();
        let start = Instant::now();
        assert_eq!(pacer.wait(Duration::from_millis(30)), WaitOutcome::Elapsed);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_interrupt_from_other_thread() {
        let pacer = ChannelPacer::new();
        let handle = pacer.interrupt_handle();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            handle.interrupt();
        });
        let start = Instant::now();
        assert_eq!(pacer.wait(Duration::from_secs(10)), WaitOutcome::Interrupted);
        assert!(start.elapsed() < Duration::from_secs(5));
        t.join().unwrap();
    }

    #[test]
    fn test_interrupts_coalesce_and_cancel_one_wait() {
        let pacer = ChannelPacer::new();
        let handle = pacer.interrupt_handle();
        handle.interrupt();
        handle.interrupt();
        assert_eq!(pacer.wait(Duration::from_secs(10)), WaitOutcome::Interrupted);
        assert_eq!(pacer.wait(Duration::from_millis(5)), WaitOutcome::Elapsed);
    }
}
