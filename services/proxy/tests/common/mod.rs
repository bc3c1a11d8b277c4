//! Shared fixtures: a proxy on the in-process backend, fed through a channel

#![allow(dead_code)]

use client::{ClientOptions, ClockClient};
use config::ProxyConfig;
use crossbeam_channel::{Receiver, Sender};
use proxy::{ChannelClockSource, InterestTable, Proxy};
use std::sync::Arc;
use std::time::Duration;
use transport::{LocalBackend, SharedBackend};
use types::{ClockIdentity, EventMask, PtpSample, Subscription};

pub const PROXY_QUEUE: &str = "/clocklink-test";

pub const GM_A: ClockIdentity = [0x00, 0x1b, 0x21, 0xff, 0xfe, 0x00, 0x00, 0x01];
pub const GM_B: ClockIdentity = [0x00, 0x1b, 0x21, 0xff, 0xfe, 0x00, 0x00, 0x02];

pub struct Harness {
    pub local: Arc<LocalBackend>,
    pub backend: SharedBackend,
    pub proxy: Proxy,
    pub feed: Sender<(i32, PtpSample)>,
    pub interest: Receiver<InterestTable>,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ProxyConfig) -> Self {
        let local = Arc::new(LocalBackend::new());
        let backend: SharedBackend = local.clone();
        let (feed, source) = ChannelClockSource::channel();
        let (interest_tx, interest) = crossbeam_channel::unbounded();
        let source = source.with_interest_sink(interest_tx);
        let proxy = Proxy::start(Arc::clone(&backend), &config, Box::new(source))
            .expect("proxy starts");
        Self {
            local,
            backend,
            proxy,
            feed,
            interest,
        }
    }

    pub fn client(&self, client_queue: &str) -> ClockClient {
        ClockClient::new(Arc::clone(&self.backend), client_options(client_queue))
    }

    pub fn push(&self, index: i32, sample: PtpSample) {
        self.feed.send((index, sample)).expect("monitor is running");
    }

    /// Waits until an interest update satisfies `accept`.
    pub fn wait_for_interest(&self, accept: impl Fn(&InterestTable) -> bool) -> InterestTable {
        loop {
            let table = self
                .interest
                .recv_timeout(Duration::from_secs(2))
                .expect("interest update");
            if accept(&table) {
                return table;
            }
        }
    }

    pub fn shutdown(self) {
        self.proxy.stop();
        self.proxy.finalize().expect("clean shutdown");
    }
}

pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.proxy.queue_name = PROXY_QUEUE.to_string();
    config.proxy.notify_poll_ms = 10;
    config
}

pub fn client_options(client_queue: &str) -> ClientOptions {
    let mut options = ClientOptions::default()
        .with_proxy_queue(PROXY_QUEUE)
        .with_client_queue(client_queue);
    options.connect_timeout = Duration::from_secs(2);
    options.subscribe_timeout = Duration::from_secs(2);
    options
}

pub fn offset_range(upper: i32, lower: i32) -> Subscription {
    let mut subscription = Subscription::new(EventMask::OFFSET_IN_RANGE);
    subscription
        .define_threshold(0, upper, lower)
        .expect("slot 0 exists");
    subscription
}

pub fn sample(offset: i64, gm: ClockIdentity) -> PtpSample {
    PtpSample {
        master_offset: offset,
        gm_identity: gm,
        synced_to_primary_clock: true,
        as_capable: true,
        timestamp_ns: 1,
    }
}
