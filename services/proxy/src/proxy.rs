//! Proxy lifecycle
//!
//! ```text
//! start():  exchanges ─► registry ─► monitor ─► notifier ─► listener
//! stop():   set every stop flag, interrupt the listener
//! finalize(): join listener, monitor, notifier (200ms each), drop sessions
//! ```

use crate::dispatch::Dispatcher;
use crate::error::{ProxyError, Result};
use crate::registry::Registry;
use crate::session::SessionTable;
use crate::source::ClockSource;
use crate::status::{clock_configuration, clock_status, ClockStatus, StatusTable};
use crate::workers::{run_monitor, run_notifier};
use config::ProxyConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use transport::{Listener, ListenerHandle, SharedBackend, TransportError, Worker};
use types::{SessionId, TimeBaseCfg};

pub struct Proxy {
    queue_name: String,
    time_bases: Vec<TimeBaseCfg>,
    registry: Arc<Mutex<Registry>>,
    status: ClockStatus,
    listener: ListenerHandle,
    monitor: Worker,
    notifier: Worker,
}

impl Proxy {
    /// Opens the proxy queue and starts the dispatch, monitor and notifier threads.
    pub fn start(
        backend: SharedBackend,
        config: &ProxyConfig,
        source: Box<dyn ClockSource>,
    ) -> Result<Self> {
        let settings = &config.proxy;
        let time_bases = config.time_base_table();
        let poll = Duration::from_millis(settings.notify_poll_ms.max(1));
        let ptp_available = source.ptp_available();

        let status = clock_status(time_bases.len());
        let configuration = clock_configuration(time_bases.len());
        let (status_producer, status_consumer) = status.producer().zip(status.consumer()).ok_or(
            TransportError::worker_failed("proxy", "clock status exchange already in use"),
        )?;
        let (interest_producer, interest_consumer) = configuration
            .producer()
            .zip(configuration.consumer())
            .ok_or(TransportError::worker_failed(
                "proxy",
                "clock configuration exchange already in use",
            ))?;

        let registry = Arc::new(Mutex::new(Registry::new(
            SessionTable::new(settings.max_clients),
            interest_producer,
            time_bases.len(),
            settings.max_send_failures,
        )));

        let monitor = Worker::spawn("monitor", move |stop| {
            run_monitor(stop, source, status_producer, interest_consumer, poll)
        })?;

        let notifier = {
            let registry = Arc::clone(&registry);
            match Worker::spawn("notifier", move |stop| {
                run_notifier(stop, registry, status_consumer, poll)
            }) {
                Ok(worker) => worker,
                Err(e) => {
                    abandon_worker("monitor", monitor);
                    return Err(e.into());
                }
            }
        };

        let opened = Listener::open(&backend, &settings.queue_name, settings.max_clients);
        let listener = match opened {
            Ok(listener) => {
                let mut dispatcher = Dispatcher::new(
                    Arc::clone(&backend),
                    Arc::clone(&registry),
                    status.clone(),
                    time_bases.clone(),
                    ptp_available,
                );
                listener.spawn(move |bytes| {
                    if let Err(e) = dispatcher.handle(bytes) {
                        warn!("Dropped message ({}): {}", e.category(), e);
                    }
                })
            }
            Err(e) => Err(e),
        };
        let listener = match listener {
            Ok(listener) => listener,
            Err(e) => {
                abandon_worker("monitor", monitor);
                abandon_worker("notifier", notifier);
                return Err(e.into());
            }
        };

        info!(
            "Proxy listening on {} with {} time base(s), up to {} clients",
            settings.queue_name,
            time_bases.len(),
            settings.max_clients
        );
        Ok(Self {
            queue_name: settings.queue_name.clone(),
            time_bases,
            registry,
            status,
            listener,
            monitor,
            notifier,
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn time_bases(&self) -> &[TimeBaseCfg] {
        &self.time_bases
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids = self.registry.lock().sessions().ids();
        ids.sort_unstable();
        ids
    }

    pub fn session_count(&self) -> usize {
        self.registry.lock().sessions().len()
    }

    /// Last committed clock status
    pub fn status(&self, timeout: Duration) -> Option<StatusTable> {
        self.status.snapshot(timeout)
    }

    /// True once any worker has exited on its own
    pub fn has_failed(&self) -> bool {
        self.listener.is_finished() || self.monitor.is_finished() || self.notifier.is_finished()
    }

    /// Asks every thread to stop and wakes the listener. Does not wait.
    pub fn stop(&self) {
        info!("Stopping proxy on {}", self.queue_name);
        self.monitor.request_stop();
        self.notifier.request_stop();
        self.listener.stop();
    }

    /// Joins every thread and removes the proxy queue.
    ///
    /// Each join is bounded by the shutdown timeout. The first failure is
    /// returned; a `ShutdownTimeout` among them is fatal to the process.
    pub fn finalize(self) -> Result<()> {
        let Proxy {
            queue_name,
            registry,
            listener,
            monitor,
            notifier,
            ..
        } = self;

        let outcomes = [
            ("listener", listener.finalize()),
            ("monitor", monitor.finalize()),
            ("notifier", notifier.finalize()),
        ];
        registry.lock().clear();

        let mut first: Option<TransportError> = None;
        for (name, outcome) in outcomes {
            if let Err(e) = outcome {
                error!("Proxy {} shutdown failed: {}", name, e);
                let fatal = matches!(e, TransportError::ShutdownTimeout { .. });
                match &first {
                    Some(TransportError::ShutdownTimeout { .. }) => {}
                    Some(_) if !fatal => {}
                    _ => first = Some(e),
                }
            }
        }
        match first {
            Some(e) => Err(ProxyError::Transport(e)),
            None => {
                info!("Proxy on {} shut down", queue_name);
                Ok(())
            }
        }
    }
}

/// Joins a worker left behind by a failed start, logging what it reports.
fn abandon_worker(name: &str, worker: Worker) {
    if let Err(e) = worker.finalize() {
        error!("Proxy {} did not shut down after failed start: {}", name, e);
    }
}
