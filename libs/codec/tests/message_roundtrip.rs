//! Round-trip properties for every message kind
//!
//! Encoding then decoding with the receiving role's registry must return the
//! original message, and every reserved byte must be zero on the wire.

use codec::{
    ConnectReply, ConnectRequest, Disconnect, Message, MessageCodec, Notify, Payload,
    SubscribeReply, SubscribeRequest, WireBuffer,
};
use proptest::prelude::*;
use types::{
    ClockState, EventCounts, EventMask, MsgAck, Subscription, Threshold, TimeBaseCfg,
    THRESHOLD_MAX,
};

fn clock_state() -> impl Strategy<Value = ClockState> {
    (
        any::<[u8; 8]>(),
        any::<[bool; 5]>(),
        any::<i64>(),
        any::<u64>(),
    )
        .prop_map(|(gm_identity, flags, clock_offset, notification_timestamp)| ClockState {
            gm_identity,
            as_capable: flags[0],
            offset_in_range: flags[1],
            synced_to_primary_clock: flags[2],
            gm_changed: flags[3],
            composite_event: flags[4],
            clock_offset,
            notification_timestamp,
        })
}

fn event_counts() -> impl Strategy<Value = EventCounts> {
    any::<[u32; 5]>().prop_map(|c| EventCounts {
        offset_in_range: c[0],
        synced_to_primary_clock: c[1],
        as_capable: c[2],
        gm_changed: c[3],
        composite: c[4],
    })
}

fn subscription() -> impl Strategy<Value = Subscription> {
    (
        0u32..=EventMask::ALL.bits(),
        0u32..=EventMask::COMPOSITE_ELIGIBLE.bits(),
        any::<[(i32, i32); THRESHOLD_MAX]>(),
    )
        .prop_map(|(events, composite, limits)| {
            let mut thresholds = [Threshold::default(); THRESHOLD_MAX];
            for (slot, (upper, lower)) in thresholds.iter_mut().zip(limits) {
                *slot = Threshold::new(upper, lower);
            }
            Subscription {
                event_mask: EventMask::from_bits(events).unwrap_or_default(),
                composite_mask: EventMask::from_bits(composite & EventMask::COMPOSITE_ELIGIBLE.bits())
                    .unwrap_or_default(),
                thresholds,
            }
        })
}

fn client_id() -> impl Strategy<Value = String> {
    "/[a-z]{1,16}\\.[0-9]{1,7}"
}

fn time_base() -> impl Strategy<Value = TimeBaseCfg> {
    (1i32..64, "[A-Za-z ]{1,63}", "[a-z0-9]{0,15}", any::<u8>(), any::<u8>()).prop_map(
        |(index, name, interface_name, transport_specific, domain_number)| TimeBaseCfg {
            index,
            name,
            interface_name,
            transport_specific,
            domain_number,
        },
    )
}

fn proxy_bound() -> impl Strategy<Value = Message> {
    prop_oneof![
        (client_id(), any::<u16>())
            .prop_map(|(client_id, sid)| Message::request(ConnectRequest { client_id }, sid)),
        (client_id(), any::<u16>(), any::<i32>(), subscription()).prop_map(
            |(client_id, sid, time_base_index, subscription)| Message::request(
                SubscribeRequest {
                    client_id,
                    time_base_index,
                    subscription,
                },
                sid
            )
        ),
        (client_id(), any::<u16>())
            .prop_map(|(client_id, sid)| Message::request(Disconnect { client_id }, sid)),
    ]
}

fn ack() -> impl Strategy<Value = MsgAck> {
    prop_oneof![Just(MsgAck::None), Just(MsgAck::Success), Just(MsgAck::Fail)]
}

fn client_bound() -> impl Strategy<Value = Message> {
    prop_oneof![
        (
            any::<bool>(),
            proptest::collection::vec(time_base(), 0..=types::MAX_TIME_BASES),
            ack(),
            any::<u16>()
        )
            .prop_map(|(ptp_available, time_bases, ack, sid)| Message::new(
                ConnectReply {
                    ptp_available,
                    time_bases
                },
                ack,
                sid
            )),
        (any::<i32>(), clock_state(), ack(), any::<u16>()).prop_map(
            |(time_base_index, state, ack, sid)| Message::new(
                SubscribeReply {
                    time_base_index,
                    state
                },
                ack,
                sid
            )
        ),
        (any::<i32>(), clock_state(), event_counts(), any::<u16>()).prop_map(
            |(time_base_index, state, counts, sid)| Message::new(
                Notify {
                    time_base_index,
                    state,
                    counts
                },
                MsgAck::None,
                sid
            )
        ),
    ]
}

/// Byte ranges that must be zero for each encoded message
fn reserved_ranges(msg: &Message, raw: &[u8]) -> Vec<std::ops::Range<usize>> {
    const HDR: usize = 4;
    const STATE_RSV: std::ops::Range<usize> = 13..16;
    const COUNTS_RSV: std::ops::Range<usize> = 20..32;
    let shift = |r: std::ops::Range<usize>, by: usize| (r.start + by)..(r.end + by);
    match msg.payload() {
        Payload::ConnectReply(reply) => {
            let mut ranges = vec![(HDR + 1)..(HDR + 2)];
            for i in 0..reply.time_bases.len() {
                let entry = HDR + 4 + i * 136;
                ranges.push((entry + 134)..(entry + 136));
            }
            ranges
        }
        Payload::SubscribeReply(_) => vec![(HDR + 4)..(HDR + 8), shift(STATE_RSV, HDR + 8)],
        Payload::Notify(_) => vec![
            (HDR + 4)..(HDR + 8),
            shift(STATE_RSV, HDR + 8),
            shift(COUNTS_RSV, HDR + 40),
        ],
        Payload::ConnectRequest(ConnectRequest { client_id })
        | Payload::Disconnect(Disconnect { client_id })
        | Payload::SubscribeRequest(SubscribeRequest { client_id, .. }) => {
            vec![(HDR + client_id.len())..(HDR + types::CLIENT_ID_LEN).min(raw.len())]
        }
    }
}

fn round_trip(msg: &Message, codec: &MessageCodec) -> (Message, Vec<u8>) {
    let mut buf = WireBuffer::new();
    MessageCodec::encode(msg, &mut buf).unwrap();
    let raw = buf.as_bytes().to_vec();
    buf.load(&raw).unwrap();
    (codec.decode(&mut buf).unwrap(), raw)
}

proptest! {
    #[test]
    fn requests_round_trip(msg in proxy_bound()) {
        let (decoded, raw) = round_trip(&msg, &MessageCodec::proxy());
        prop_assert_eq!(&decoded, &msg);
        for range in reserved_ranges(&msg, &raw) {
            prop_assert!(raw[range.clone()].iter().all(|b| *b == 0), "range {:?}", range);
        }
    }

    #[test]
    fn replies_round_trip(msg in client_bound()) {
        let (decoded, raw) = round_trip(&msg, &MessageCodec::client());
        prop_assert_eq!(&decoded, &msg);
        for range in reserved_ranges(&msg, &raw) {
            prop_assert!(raw[range.clone()].iter().all(|b| *b == 0), "range {:?}", range);
        }
    }
}

#[test]
fn buffer_reuse_does_not_leak_previous_bytes() {
    let mut buf = WireBuffer::new();
    let long = Message::request(
        ConnectRequest {
            client_id: "/a-rather-long-client-queue-name.123456".into(),
        },
        1,
    );
    MessageCodec::encode(&long, &mut buf).unwrap();

    let short = Message::request(
        ConnectRequest {
            client_id: "/c.1".into(),
        },
        1,
    );
    MessageCodec::encode(&short, &mut buf).unwrap();
    assert!(buf.as_bytes()[4 + 4..].iter().all(|b| *b == 0));
}
