//! Periodic callback on a dedicated thread.
//!
//! Drives visualization redraws while audio runs. Cancellation is immediate
//! (the thread selects on a stop channel next to its tick) and idempotent;
//! dropping a `Ticker` cancels it.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use crate::error::GraphError;

/// Default redraw period, about one display frame.
pub const DEFAULT_TICK: Duration = Duration::from_millis(16);

pub struct Ticker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Call `on_tick` every `interval` until cancelled.
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Result<Self, GraphError>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticks = tick(interval.max(Duration::from_millis(1)));
        let handle = thread::Builder::new()
            .name("windhum-ticker".into())
            .spawn(move || loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticks) -> _ => on_tick(),
                }
            })
            .map_err(|source| GraphError::Spawn { what: "ticker", source })?;
        Ok(Self { stop: Some(stop_tx), handle: Some(handle) })
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop ticking and join the thread. Returns once no further tick can run.
    pub fn cancel(&mut self) {
        // Dropping the sender wakes the select even if a send would block.
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("ticker callback panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn ticks_until_cancelled() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let mut t = Ticker::spawn(Duration::from_millis(2), move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(60));
        t.cancel();
        let after_cancel = count.load(Ordering::SeqCst);
        assert!(after_cancel > 0);
        assert!(!t.is_running());

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
        t.cancel();
    }

    #[test]
    fn drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let t = Ticker::spawn(Duration::from_millis(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(10));
        drop(t);
        let n = count.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), n);
    }
}
