//! Interrupt-to-worker signaling
//!
//! A single-slot channel acts as a binary semaphore. The interrupt side only
//! ever calls [`SignalGiver::give`], which never blocks, performs no I/O and
//! does not log. Edges that arrive while a signal is already pending collapse
//! into it: the worker learns "at least one event is pending", not how many.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::time::Duration;

/// Result of waiting on the signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least one edge arrived since the last take
    Signaled,
    /// The timeout elapsed with nothing pending
    TimedOut,
    /// Every giver was dropped
    Closed,
}

#[derive(Debug, Default)]
struct EdgeCounters {
    raised: AtomicU64,
    coalesced: AtomicU64,
}

/// Create a signal pair
pub fn interrupt_signal() -> (SignalGiver, SignalTaker) {
    let (tx, rx) = mpsc::sync_channel(1);
    let counters = Arc::new(EdgeCounters::default());
    (
        SignalGiver {
            tx,
            counters: counters.clone(),
        },
        SignalTaker {
            rx,
            counters,
            rearmed: Cell::new(false),
        },
    )
}

/// Interrupt-context half of the signal
#[derive(Debug, Clone)]
pub struct SignalGiver {
    tx: SyncSender<()>,
    counters: Arc<EdgeCounters>,
}

impl SignalGiver {
    /// Raise the signal
    ///
    /// Returns `true` if this edge moved the signal from idle to signaled,
    /// `false` if a signal was already pending or the worker is gone.
    pub fn give(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => {
                self.counters.raised.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(())) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Worker half of the signal; the only consumer
#[derive(Debug)]
pub struct SignalTaker {
    rx: Receiver<()>,
    counters: Arc<EdgeCounters>,
    rearmed: Cell<bool>,
}

impl SignalTaker {
    /// Leave a signal pending for the next take without an edge
    ///
    /// Used when the interrupt line stays asserted after a cycle: a rising
    /// edge will not come again, so the worker signals itself. Any edge
    /// already pending is absorbed into the re-armed signal.
    pub fn rearm(&self) {
        self.rearmed.set(true);
    }

    pub fn is_rearmed(&self) -> bool {
        self.rearmed.get()
    }

    fn take_rearmed(&self) -> bool {
        if self.rearmed.replace(false) {
            let _ = self.rx.try_recv();
            true
        } else {
            false
        }
    }

    /// Block until signaled
    pub fn take(&self) -> WaitOutcome {
        if self.take_rearmed() {
            return WaitOutcome::Signaled;
        }
        match self.rx.recv() {
            Ok(()) => WaitOutcome::Signaled,
            Err(_) => WaitOutcome::Closed,
        }
    }

    /// Block until signaled or until `timeout` elapses
    pub fn take_timeout(&self, timeout: Duration) -> WaitOutcome {
        if self.take_rearmed() {
            return WaitOutcome::Signaled;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(()) => WaitOutcome::Signaled,
            Err(RecvTimeoutError::Timeout) => WaitOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => WaitOutcome::Closed,
        }
    }

    /// Consume a pending signal without blocking
    pub fn try_take(&self) -> WaitOutcome {
        if self.take_rearmed() {
            return WaitOutcome::Signaled;
        }
        match self.rx.try_recv() {
            Ok(()) => WaitOutcome::Signaled,
            Err(TryRecvError::Empty) => WaitOutcome::TimedOut,
            Err(TryRecvError::Disconnected) => WaitOutcome::Closed,
        }
    }

    /// Edges that raised a new signal
    pub fn raised(&self) -> u64 {
        self.counters.raised.load(Ordering::Relaxed)
    }

    /// Edges that arrived while a signal was already pending
    pub fn coalesced(&self) -> u64 {
        self.counters.coalesced.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_burst_of_edges_collapses_to_one_signal() {
        let (giver, taker) = interrupt_signal();

        assert!(giver.give());
        for _ in 0..9 {
            assert!(!giver.give());
        }

        assert_eq!(taker.try_take(), WaitOutcome::Signaled);
        assert_eq!(taker.try_take(), WaitOutcome::TimedOut);
        assert_eq!(taker.raised(), 1);
        assert_eq!(taker.coalesced(), 9);
    }

    #[test]
    fn test_signal_rearms_after_take() {
        let (giver, taker) = interrupt_signal();
        giver.give();
        assert_eq!(taker.take(), WaitOutcome::Signaled);

        assert!(giver.give());
        assert_eq!(taker.take(), WaitOutcome::Signaled);
        assert_eq!(taker.raised(), 2);
    }

    #[test]
    fn test_take_blocks_until_another_thread_gives() {
        let (giver, taker) = interrupt_signal();
        let start = Instant::now();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            giver.give();
        });

        assert_eq!(taker.take(), WaitOutcome::Signaled);
        assert!(start.elapsed() >= Duration::from_millis(20));
        handle.join().unwrap();
    }

    #[test]
    fn test_take_timeout_reports_idle() {
        let (_giver, taker) = interrupt_signal();
        assert_eq!(
            taker.take_timeout(Duration::from_millis(5)),
            WaitOutcome::TimedOut
        );
    }

    #[test]
    fn test_dropping_every_giver_closes_the_signal() {
        let (giver, taker) = interrupt_signal();
        let clone = giver.clone();
        drop(giver);
        drop(clone);
        assert_eq!(taker.take(), WaitOutcome::Closed);
    }

    #[test]
    fn test_pending_signal_survives_giver_drop() {
        let (giver, taker) = interrupt_signal();
        giver.give();
        drop(giver);
        assert_eq!(taker.take(), WaitOutcome::Signaled);
        assert_eq!(taker.take(), WaitOutcome::Closed);
    }

    #[test]
    fn test_rearm_leaves_one_signal_pending() {
        let (giver, taker) = interrupt_signal();
        taker.rearm();
        assert!(taker.is_rearmed());
        // An edge arriving meanwhile folds into the re-armed signal
        giver.give();

        assert_eq!(taker.try_take(), WaitOutcome::Signaled);
        assert!(!taker.is_rearmed());
        assert_eq!(taker.try_take(), WaitOutcome::TimedOut);
    }

    #[test]
    fn test_rearmed_signal_is_taken_before_close() {
        let (giver, taker) = interrupt_signal();
        drop(giver);
        taker.rearm();
        assert_eq!(taker.take(), WaitOutcome::Signaled);
        assert_eq!(taker.take(), WaitOutcome::Closed);
    }

    #[test]
    fn test_give_after_worker_exit_is_harmless() {
        let (giver, taker) = interrupt_signal();
        drop(taker);
        assert!(!giver.give());
    }
}
