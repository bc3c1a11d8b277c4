//! Status notification pushed by the proxy

use super::fields::WireFormat;
use super::MessageBody;
use crate::buffers::WireBuffer;
use crate::error::CodecResult;
use types::{ClockState, EventCounts, MsgId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notify {
    pub time_base_index: i32,
    pub state: ClockState,
    /// Transitions observed since the previous notification to this session
    pub counts: EventCounts,
}

impl MessageBody for Notify {
    const MSG_ID: MsgId = MsgId::Notify;

    fn parse_body(buf: &mut WireBuffer) -> CodecResult<Self> {
        let time_base_index = buf.get_i32()?;
        buf.expect_zeros(4, "notify")?;
        Ok(Self {
            time_base_index,
            state: ClockState::get(buf)?,
            counts: EventCounts::get(buf)?,
        })
    }

    fn build_body(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        buf.put_i32(self.time_base_index)?;
        buf.put_zeros(4)?;
        self.state.put(buf)?;
        self.counts.put(buf)
    }

    fn describe(&self) -> String {
        format!(
            "time_base={} {} counts={:?}",
            self.time_base_index, self.state, self.counts
        )
    }
}
