//! Background worker threads with bounded shutdown
//!
//! A worker reports its outcome once through a completion channel. Shutdown
//! sets the stop flag, optionally nudges the thread out of a blocking call,
//! and waits on that channel for at most the shutdown bound. A worker that
//! misses the bound is a fatal `ShutdownTimeout`.

use crate::error::{Result, TransportError};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Upper bound on how long `finalize` waits for a worker to exit
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);

/// Interval between interrupt re-deliveries while waiting for exit
pub const INTERRUPT_RETRY: Duration = Duration::from_millis(10);

/// Cooperative stop request, checked by the worker between iterations
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct Worker {
    name: String,
    stop: StopFlag,
    done: Receiver<Result<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns a named thread running `body` until it returns.
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Result<Self>
    where
        F: FnOnce(StopFlag) -> Result<()> + Send + 'static,
    {
        let name = name.into();
        let stop = StopFlag::new();
        let (done_tx, done) = bounded(1);
        let thread_stop = stop.clone();
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let outcome = body(thread_stop);
                // finalize may already have given up on us
                let _ = done_tx.send(outcome);
            })
            .map_err(|e| TransportError::Io {
                message: format!("spawn worker {name}"),
                source: e,
            })?;
        debug!("Spawned worker {}", name);
        Ok(Self {
            name,
            stop,
            done,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.set();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops the worker and waits for it within `timeout`.
    ///
    /// `nudge` runs immediately and then every [`INTERRUPT_RETRY`] until the
    /// worker reports completion. It closes the window where an interrupt
    /// lands between the stop-flag check and the blocking call.
    pub fn finalize_with<N>(mut self, timeout: Duration, mut nudge: N) -> Result<()>
    where
        N: FnMut(),
    {
        self.stop.set();
        let deadline = Instant::now() + timeout;
        let outcome = loop {
            nudge();
            let now = Instant::now();
            if now >= deadline {
                break Err(RecvTimeoutError::Timeout);
            }
            match self.done.recv_timeout(INTERRUPT_RETRY.min(deadline - now)) {
                Err(RecvTimeoutError::Timeout) => continue,
                other => break other,
            }
        };

        match outcome {
            Ok(result) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        return Err(TransportError::worker_failed(&self.name, "panicked"));
                    }
                }
                debug!("Worker {} exited", self.name);
                result
            }
            Err(RecvTimeoutError::Disconnected) => {
                // body panicked before reporting
                self.handle.take();
                error!("Worker {} terminated without reporting", self.name);
                Err(TransportError::worker_failed(&self.name, "panicked"))
            }
            Err(RecvTimeoutError::Timeout) => {
                self.handle.take();
                error!(
                    "Worker {} did not exit within {}ms",
                    self.name,
                    timeout.as_millis()
                );
                Err(TransportError::ShutdownTimeout {
                    worker: self.name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// [`finalize_with`](Self::finalize_with) without a nudge, bounded by [`SHUTDOWN_TIMEOUT`].
    pub fn finalize(self) -> Result<()> {
        self.finalize_with(SHUTDOWN_TIMEOUT, || {})
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            // detached: joining here could block without bound
            self.stop.set();
            warn!("Worker {} dropped without finalize", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_returns_body_outcome() {
        let worker = Worker::spawn("ok", |stop| {
            while !stop.is_set() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        })
        .unwrap();
        worker.finalize().unwrap();

        let failing = Worker::spawn("fails", |_| {
            Err(TransportError::worker_failed("fails", "boom"))
        })
        .unwrap();
        assert!(matches!(
            failing.finalize(),
            Err(TransportError::WorkerFailed { .. })
        ));
    }

    #[test]
    fn stuck_worker_times_out() {
        let (release_tx, release_rx) = bounded::<()>(1);
        let worker = Worker::spawn("stuck", move |_| {
            let _ = release_rx.recv();
            Ok(())
        })
        .unwrap();
        let started = Instant::now();
        let err = worker
            .finalize_with(Duration::from_millis(50), || {})
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(started.elapsed() < Duration::from_millis(500));
        release_tx.send(()).unwrap();
    }

    #[test]
    fn nudge_repeats_until_exit() {
        let (wake_tx, wake_rx) = bounded::<()>(8);
        let worker = Worker::spawn("nudged", move |stop| {
            loop {
                let _ = wake_rx.recv();
                if stop.is_set() {
                    return Ok(());
                }
            }
        })
        .unwrap();
        worker
            .finalize_with(SHUTDOWN_TIMEOUT, || {
                let _ = wake_tx.try_send(());
            })
            .unwrap();
    }

    #[test]
    fn panicking_worker_reports_failure() {
        let worker = Worker::spawn("panics", |_| -> Result<()> { panic!("boom") }).unwrap();
        assert!(matches!(
            worker.finalize(),
            Err(TransportError::WorkerFailed { .. })
        ));
    }
}
