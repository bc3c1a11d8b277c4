//! Message type registry
//!
//! The registry maps a header tag to the body parser for the local role. The
//! same tag means different bodies depending on direction (a Connect from a
//! client carries its queue name, a Connect from the proxy carries the time
//! base table), so each role builds its own registry.
//!
//! Decode never branches on the concrete type: it resolves the tag through
//! the registry and hands back a `Payload`.

use crate::buffers::WireBuffer;
use crate::error::{CodecError, CodecResult};
use crate::header::MessageHeader;
use crate::messages::{
    ConnectReply, ConnectRequest, Disconnect, Message, MessageBody, Notify, Payload,
    SubscribeReply, SubscribeRequest,
};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;
use types::MsgId;

/// Parses a body into the payload union
pub type BodyParser = fn(&mut WireBuffer) -> CodecResult<Payload>;

/// Which end of the protocol is decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Proxy,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Proxy => f.write_str("proxy"),
            Role::Client => f.write_str("client"),
        }
    }
}

fn parse_as<B: MessageBody>(buf: &mut WireBuffer) -> CodecResult<Payload> {
    B::parse_body(buf).map(Into::into)
}

pub struct MessageCodec {
    role: Role,
    parsers: HashMap<MsgId, BodyParser>,
}

impl MessageCodec {
    /// An empty registry
    pub fn new(role: Role) -> Self {
        Self {
            role,
            parsers: HashMap::new(),
        }
    }

    /// Registry for the proxy, which decodes client requests
    pub fn proxy() -> Self {
        let mut codec = Self::new(Role::Proxy);
        codec.insert::<ConnectRequest>();
        codec.insert::<SubscribeRequest>();
        codec.insert::<Disconnect>();
        codec
    }

    /// Registry for a client, which decodes proxy replies and notifications
    pub fn client() -> Self {
        let mut codec = Self::new(Role::Client);
        codec.insert::<ConnectReply>();
        codec.insert::<SubscribeReply>();
        codec.insert::<Notify>();
        codec
    }

    fn insert<B: MessageBody>(&mut self) {
        self.parsers.insert(B::MSG_ID, parse_as::<B>);
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn register_type(&mut self, msg_id: MsgId, parser: BodyParser) -> CodecResult<()> {
        if self.parsers.contains_key(&msg_id) {
            return Err(CodecError::DuplicateType { msg_id });
        }
        self.parsers.insert(msg_id, parser);
        Ok(())
    }

    pub fn register<B: MessageBody>(&mut self) -> CodecResult<()> {
        self.register_type(B::MSG_ID, parse_as::<B>)
    }

    pub fn is_registered(&self, msg_id: MsgId) -> bool {
        self.parsers.contains_key(&msg_id)
    }

    /// Decodes the message loaded in `buf`.
    ///
    /// An unregistered or unknown tag yields `UnknownMessageType`; the caller
    /// drops the buffer.
    pub fn decode(&self, buf: &mut WireBuffer) -> CodecResult<Message> {
        let raw_id = buf.get_u8()?;
        let (msg_id, parser) = MsgId::try_from(raw_id)
            .ok()
            .and_then(|id| self.parsers.get(&id).map(|parser| (id, *parser)))
            .ok_or(CodecError::UnknownMessageType { msg_id: raw_id })?;

        let header = MessageHeader::parse_rest(msg_id, buf)?;
        let payload = parser(buf)?;
        if buf.remaining() != 0 {
            return Err(CodecError::TrailingBytes {
                msg_id,
                count: buf.remaining(),
            });
        }
        trace!(role = %self.role, "decoded {}", msg_id);
        Ok(Message::from_parts(header, payload))
    }

    /// Resets `buf` and writes the header followed by the body.
    pub fn encode(message: &Message, buf: &mut WireBuffer) -> CodecResult<()> {
        buf.reset();
        message.header().build(buf)?;
        message.payload().build_body(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{ClockState, MsgAck, INVALID_SESSION_ID};

    fn disconnect_bytes(session_id: u16) -> Vec<u8> {
        let msg = Message::request(
            Disconnect {
                client_id: "/clk.1".into(),
            },
            session_id,
        );
        let mut buf = WireBuffer::new();
        MessageCodec::encode(&msg, &mut buf).unwrap();
        buf.as_bytes().to_vec()
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut codec = MessageCodec::new(Role::Proxy);
        codec.register::<ConnectRequest>().unwrap();
        assert_eq!(
            codec.register::<ConnectReply>(),
            Err(CodecError::DuplicateType {
                msg_id: MsgId::Connect
            })
        );
    }

    #[test]
    fn unknown_tag_is_reported() {
        let codec = MessageCodec::proxy();
        let mut buf = WireBuffer::new();
        buf.load(&[0x7E, 0, 0xFF, 0xFF]).unwrap();
        assert_eq!(
            codec.decode(&mut buf),
            Err(CodecError::UnknownMessageType { msg_id: 0x7E })
        );
    }

    #[test]
    fn tag_not_registered_for_role_is_unknown() {
        let notify = Message::new(
            Notify::default(),
            MsgAck::None,
            3,
        );
        let mut buf = WireBuffer::new();
        MessageCodec::encode(&notify, &mut buf).unwrap();
        let raw = buf.as_bytes().to_vec();
        buf.load(&raw).unwrap();
        assert_eq!(
            MessageCodec::proxy().decode(&mut buf),
            Err(CodecError::UnknownMessageType {
                msg_id: MsgId::Notify.into()
            })
        );
    }

    #[test]
    fn same_tag_decodes_per_role() {
        let request = Message::request(
            ConnectRequest {
                client_id: "/clk.1234".into(),
            },
            INVALID_SESSION_ID,
        );
        let mut buf = WireBuffer::new();
        MessageCodec::encode(&request, &mut buf).unwrap();
        let raw = buf.as_bytes().to_vec();
        buf.load(&raw).unwrap();
        let decoded = MessageCodec::proxy().decode(&mut buf).unwrap();
        assert_eq!(decoded, request);

        let reply = Message::new(ConnectReply::default(), MsgAck::Success, 7);
        MessageCodec::encode(&reply, &mut buf).unwrap();
        let raw = buf.as_bytes().to_vec();
        buf.load(&raw).unwrap();
        let decoded = MessageCodec::client().decode(&mut buf).unwrap();
        assert_eq!(decoded.session_id(), 7);
        assert!(matches!(decoded.payload(), Payload::ConnectReply(_)));
    }

    #[test]
    fn unknown_session_disconnect_still_decodes() {
        let mut buf = WireBuffer::new();
        buf.load(&disconnect_bytes(9999)).unwrap();
        let msg = MessageCodec::proxy().decode(&mut buf).unwrap();
        assert_eq!(msg.session_id(), 9999);
    }

    #[test]
    fn invalid_ack_rejected() {
        let mut raw = disconnect_bytes(1);
        raw[1] = 0x42;
        let mut buf = WireBuffer::new();
        buf.load(&raw).unwrap();
        assert_eq!(
            MessageCodec::proxy().decode(&mut buf),
            Err(CodecError::InvalidAck { value: 0x42 })
        );
    }

    #[test]
    fn trailing_bytes_rejected() {
        let msg = Message::new(
            SubscribeReply {
                time_base_index: 1,
                state: ClockState::default(),
            },
            MsgAck::Success,
            1,
        );
        let mut buf = WireBuffer::new();
        MessageCodec::encode(&msg, &mut buf).unwrap();
        let mut raw = buf.as_bytes().to_vec();
        raw.push(0);
        buf.load(&raw).unwrap();
        assert!(matches!(
            MessageCodec::client().decode(&mut buf),
            Err(CodecError::TrailingBytes { count: 1, .. })
        ));
    }
}
