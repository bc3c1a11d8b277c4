use config::constants::{queues, timing};
use std::time::Duration;

/// Connection settings; the defaults match the proxy's defaults
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub proxy_queue: String,
    /// Listen queue name. Derived from the proxy queue and pid when unset.
    pub client_queue: Option<String>,
    pub connect_timeout: Duration,
    pub subscribe_timeout: Duration,
    pub liveness_interval: Duration,
    pub liveness_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            proxy_queue: queues::DEFAULT_PROXY_QUEUE.to_string(),
            client_queue: None,
            connect_timeout: timing::CONNECT_TIMEOUT,
            subscribe_timeout: timing::SUBSCRIBE_TIMEOUT,
            liveness_interval: timing::LIVENESS_INTERVAL,
            liveness_timeout: timing::LIVENESS_TIMEOUT,
        }
    }
}

impl ClientOptions {
    pub fn with_proxy_queue(mut self, name: impl Into<String>) -> Self {
        self.proxy_queue = name.into();
        self
    }

    pub fn with_client_queue(mut self, name: impl Into<String>) -> Self {
        self.client_queue = Some(name.into());
        self
    }

    pub fn client_queue_name(&self) -> String {
        self.client_queue
            .clone()
            .unwrap_or_else(|| queues::client_queue_name(&self.proxy_queue, std::process::id()))
    }
}
