//! Subscribe request and reply

use super::fields::{get_client_id, put_client_id, WireFormat};
use super::MessageBody;
use crate::buffers::WireBuffer;
use crate::error::CodecResult;
use types::{ClockState, MsgId, Subscription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub client_id: String,
    pub time_base_index: i32,
    pub subscription: Subscription,
}

impl MessageBody for SubscribeRequest {
    const MSG_ID: MsgId = MsgId::Subscribe;

    fn parse_body(buf: &mut WireBuffer) -> CodecResult<Self> {
        Ok(Self {
            client_id: get_client_id(buf)?,
            time_base_index: buf.get_i32()?,
            subscription: Subscription::get(buf)?,
        })
    }

    fn build_body(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        put_client_id(buf, &self.client_id)?;
        buf.put_i32(self.time_base_index)?;
        self.subscription.put(buf)
    }

    fn describe(&self) -> String {
        let range = self.subscription.offset_threshold();
        format!(
            "client_id={} time_base={} events={} composite={} offset_range=({}, {})",
            self.client_id,
            self.time_base_index,
            self.subscription.event_mask,
            self.subscription.composite_mask,
            range.lower,
            range.upper
        )
    }
}

/// Initial snapshot returned to a new subscriber
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribeReply {
    pub time_base_index: i32,
    pub state: ClockState,
}

impl MessageBody for SubscribeReply {
    const MSG_ID: MsgId = MsgId::Subscribe;

    fn parse_body(buf: &mut WireBuffer) -> CodecResult<Self> {
        let time_base_index = buf.get_i32()?;
        buf.expect_zeros(4, "subscribe reply")?;
        Ok(Self {
            time_base_index,
            state: ClockState::get(buf)?,
        })
    }

    fn build_body(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        buf.put_i32(self.time_base_index)?;
        buf.put_zeros(4)?;
        self.state.put(buf)
    }

    fn describe(&self) -> String {
        format!("time_base={} {}", self.time_base_index, self.state)
    }
}
