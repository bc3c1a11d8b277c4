//! Client against a scripted proxy on the in-process backend

use client::{ClientError, ClientOptions, ClockClient, WaitStatus};
use codec::{
    ConnectReply, Message, MessageCodec, Notify, Payload, SubscribeReply, WireBuffer,
};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use transport::{LocalBackend, QueueBackend, SendMode, SharedBackend};
use types::{ClockState, EventCounts, EventMask, MsgAck, Subscription, MAX_MESSAGE_SIZE};

const PROXY_QUEUE: &str = "/scripted-proxy";
const CLIENT_QUEUE: &str = "/scripted-proxy.1";
const SESSION: u16 = 7;

fn options() -> ClientOptions {
    let mut options = ClientOptions::default()
        .with_proxy_queue(PROXY_QUEUE)
        .with_client_queue(CLIENT_QUEUE);
    options.connect_timeout = Duration::from_millis(500);
    options.subscribe_timeout = Duration::from_millis(500);
    options
}

/// Answers `requests` messages, then exits. Every subscribe is followed by
/// two notifications with one offset transition each.
fn scripted_proxy(backend: &SharedBackend, connect_ack: MsgAck, requests: usize) -> JoinHandle<()> {
    let mut queue = backend.listen(PROXY_QUEUE, 4).unwrap();
    let backend = Arc::clone(backend);
    thread::spawn(move || {
        let codec = MessageCodec::proxy();
        let mut raw = vec![0u8; MAX_MESSAGE_SIZE];
        let mut rx = WireBuffer::new();
        let mut tx = WireBuffer::new();
        for _ in 0..requests {
            let n = queue.receive(&mut raw).unwrap();
            rx.load(&raw[..n]).unwrap();
            let message = codec.decode(&mut rx).unwrap();
            let (_, payload) = message.into_parts();
            let mut replies = Vec::new();
            let client_id = match payload {
                Payload::ConnectRequest(request) => {
                    replies.push(Message::new(ConnectReply::default(), connect_ack, SESSION));
                    request.client_id
                }
                Payload::SubscribeRequest(request) => {
                    let index = request.time_base_index;
                    replies.push(Message::new(
                        SubscribeReply {
                            time_base_index: index,
                            state: ClockState::default(),
                        },
                        MsgAck::Success,
                        SESSION,
                    ));
                    for offset in [10, 20] {
                        let notify = Notify {
                            time_base_index: index,
                            state: ClockState {
                                clock_offset: offset,
                                offset_in_range: offset == 10,
                                ..Default::default()
                            },
                            counts: EventCounts {
                                offset_in_range: 1,
                                ..Default::default()
                            },
                        };
                        replies.push(Message::new(notify, MsgAck::None, SESSION));
                    }
                    request.client_id
                }
                Payload::Disconnect(_) => continue,
                other => panic!("unexpected {}", other.msg_id()),
            };
            let sender = backend.connect(&client_id, SendMode::Blocking).unwrap();
            for reply in replies {
                MessageCodec::encode(&reply, &mut tx).unwrap();
                sender.send(tx.as_bytes()).unwrap();
            }
        }
    })
}

#[test_log::test]
fn connect_subscribe_and_accumulate_counts() {
    let local = Arc::new(LocalBackend::new());
    let backend: SharedBackend = local.clone();
    let proxy = scripted_proxy(&backend, MsgAck::Success, 3);

    let mut client = ClockClient::new(Arc::clone(&backend), options());
    assert_eq!(client.connect().unwrap(), SESSION);
    assert!(local.exists(CLIENT_QUEUE));
    assert!(matches!(
        client.connect(),
        Err(ClientError::AlreadyConnected { session_id: SESSION })
    ));

    let subscription = Subscription::new(EventMask::OFFSET_IN_RANGE);
    let initial = client.subscribe(1, subscription).unwrap();
    assert_eq!(initial, ClockState::default());

    // both notifications may already be in; counts add up either way
    let mut transitions = 0;
    let mut last = None;
    while transitions < 2 {
        match client.status_wait(1, Duration::from_millis(500)).unwrap() {
            WaitStatus::Updated { state, counts } => {
                transitions += counts.offset_in_range;
                last = Some(state);
            }
            other => panic!("expected an update, got {other:?}"),
        }
    }
    assert_eq!(transitions, 2);
    assert_eq!(last.map(|s| s.clock_offset), Some(20));

    client.disconnect().unwrap();
    assert!(!client.is_connected());
    assert!(!local.exists(CLIENT_QUEUE));
    proxy.join().unwrap();
}

#[test_log::test]
fn rejected_connect_leaves_nothing_behind() {
    let local = Arc::new(LocalBackend::new());
    let backend: SharedBackend = local.clone();
    let proxy = scripted_proxy(&backend, MsgAck::Fail, 1);

    let mut client = ClockClient::new(Arc::clone(&backend), options());
    assert!(matches!(
        client.connect(),
        Err(ClientError::Rejected {
            operation: "connect"
        })
    ));
    assert!(!client.is_connected());
    assert_eq!(client.session_id(), None);
    assert!(!local.exists(CLIENT_QUEUE));
    proxy.join().unwrap();
}

#[test_log::test]
fn silent_proxy_times_out() {
    let local = Arc::new(LocalBackend::new());
    let backend: SharedBackend = local.clone();
    let _queue = backend.listen(PROXY_QUEUE, 4).unwrap();

    let mut client = ClockClient::new(Arc::clone(&backend), options());
    match client.connect() {
        Err(e @ ClientError::Timeout { .. }) => assert!(!e.is_fatal()),
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert!(!local.exists(CLIENT_QUEUE));
}

#[test_log::test]
fn missing_proxy_queue_fails_fast() {
    let backend: SharedBackend = Arc::new(LocalBackend::new());
    let mut client = ClockClient::new(backend, options());
    assert!(matches!(client.connect(), Err(ClientError::Transport(_))));
    assert!(matches!(
        client.subscribe(1, Subscription::default()),
        Err(ClientError::NotConnected)
    ));
    assert!(matches!(
        client.status_wait(1, Duration::ZERO),
        Ok(WaitStatus::Disconnected)
    ));
}
