//! Protocol constants and defaults
//!
//! Values shared by the proxy and client sides. Both ends must agree on the
//! queue naming scheme; the timeouts are client-side policy.

/// Queue naming and sizing
pub mod queues {
    /// Proxy listen queue used when neither config nor command line names one
    pub const DEFAULT_PROXY_QUEUE: &str = "/clocklink";

    /// Outstanding messages a client listen queue holds
    pub const CLIENT_QUEUE_DEPTH: usize = 2;

    /// Outstanding messages the proxy listen queue holds by default
    pub const PROXY_QUEUE_DEPTH: usize = 8;

    /// Name of a client's listen queue: `<proxy queue>.<pid>`
    pub fn client_queue_name(proxy_queue: &str, pid: u32) -> String {
        format!("{proxy_queue}.{pid}")
    }
}

/// Client-side protocol timeouts
pub mod timing {
    use std::time::Duration;

    /// Wait for the connect reply
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Wait for the subscribe reply
    pub const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Idle time after which `status_wait` probes the proxy
    pub const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

    /// Wait for the probe reply
    pub const LIVENESS_TIMEOUT: Duration = Duration::from_millis(200);

    /// Bound on joining a worker thread during shutdown
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);
}

/// Proxy defaults
pub mod proxy {
    /// How often the notifier re-checks its stop flag while idle
    pub const NOTIFY_POLL_MS: u64 = 50;

    /// Consecutive transmit failures before a session is destroyed
    pub const MAX_SEND_FAILURES: u32 = 3;

    pub const PTP4L_UDS_ADDR: &str = "/var/run/ptp/ptp4l";
    pub const CHRONY_UDS_ADDR: &str = "/var/run/chrony/chronyd.sock";

    /// Time base used when the proxy runs without a config file
    pub const DEFAULT_TIME_BASE_NAME: &str = "default";
    pub const DEFAULT_INTERFACE: &str = "eth0";
}
