//! Message bodies
//!
//! Each body type knows its own tag and layout. `Payload` is the closed set
//! the registry decodes into; handlers dispatch with a `match` on it.

pub mod connect;
pub mod disconnect;
pub mod fields;
pub mod notify;
pub mod subscribe;

pub use connect::{ConnectReply, ConnectRequest};
pub use disconnect::Disconnect;
pub use fields::WireFormat;
pub use notify::Notify;
pub use subscribe::{SubscribeReply, SubscribeRequest};

use crate::buffers::WireBuffer;
use crate::error::CodecResult;
use crate::header::MessageHeader;
use types::{MsgAck, MsgId, SessionId};

/// Body of one message kind
pub trait MessageBody: Sized + Into<Payload> {
    const MSG_ID: MsgId;

    fn parse_body(buf: &mut WireBuffer) -> CodecResult<Self>;
    fn build_body(&self, buf: &mut WireBuffer) -> CodecResult<()>;
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    ConnectRequest(ConnectRequest),
    ConnectReply(ConnectReply),
    SubscribeRequest(SubscribeRequest),
    SubscribeReply(SubscribeReply),
    Notify(Notify),
    Disconnect(Disconnect),
}

impl Payload {
    pub fn msg_id(&self) -> MsgId {
        match self {
            Payload::ConnectRequest(_) => ConnectRequest::MSG_ID,
            Payload::ConnectReply(_) => ConnectReply::MSG_ID,
            Payload::SubscribeRequest(_) => SubscribeRequest::MSG_ID,
            Payload::SubscribeReply(_) => SubscribeReply::MSG_ID,
            Payload::Notify(_) => Notify::MSG_ID,
            Payload::Disconnect(_) => Disconnect::MSG_ID,
        }
    }

    pub fn build_body(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        match self {
            Payload::ConnectRequest(body) => body.build_body(buf),
            Payload::ConnectReply(body) => body.build_body(buf),
            Payload::SubscribeRequest(body) => body.build_body(buf),
            Payload::SubscribeReply(body) => body.build_body(buf),
            Payload::Notify(body) => body.build_body(buf),
            Payload::Disconnect(body) => body.build_body(buf),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Payload::ConnectRequest(body) => body.describe(),
            Payload::ConnectReply(body) => body.describe(),
            Payload::SubscribeRequest(body) => body.describe(),
            Payload::SubscribeReply(body) => body.describe(),
            Payload::Notify(body) => body.describe(),
            Payload::Disconnect(body) => body.describe(),
        }
    }
}

macro_rules! impl_into_payload {
    ($($body:ident),* $(,)?) => {
        $(
            impl From<$body> for Payload {
                fn from(body: $body) -> Self {
                    Payload::$body(body)
                }
            }
        )*
    };
}

impl_into_payload!(
    ConnectRequest,
    ConnectReply,
    SubscribeRequest,
    SubscribeReply,
    Notify,
    Disconnect,
);

/// A decoded or to-be-encoded message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    header: MessageHeader,
    payload: Payload,
}

impl Message {
    /// Builds a message whose header tag always matches the payload.
    pub fn new(payload: impl Into<Payload>, msg_ack: MsgAck, session_id: SessionId) -> Self {
        let payload = payload.into();
        let header = MessageHeader {
            msg_id: payload.msg_id(),
            msg_ack,
            session_id,
        };
        Self { header, payload }
    }

    /// A client request; the proxy fills in the ack on its reply.
    pub fn request(payload: impl Into<Payload>, session_id: SessionId) -> Self {
        Self::new(payload, MsgAck::None, session_id)
    }

    pub(crate) fn from_parts(header: MessageHeader, payload: Payload) -> Self {
        Self { header, payload }
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_parts(self) -> (MessageHeader, Payload) {
        (self.header, self.payload)
    }

    pub fn session_id(&self) -> SessionId {
        self.header.session_id
    }

    pub fn ack(&self) -> MsgAck {
        self.header.msg_ack
    }

    pub fn describe(&self) -> String {
        format!(
            "{} ack={:?} session={} {}",
            self.header.msg_id,
            self.header.msg_ack,
            self.header.session_id,
            self.payload.describe()
        )
    }
}
