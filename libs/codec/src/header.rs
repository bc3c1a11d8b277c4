//! Message header
//!
//! ```text
//! ┌────────┬─────────┬────────────────┬─────────────────────┐
//! │ msg_id │ msg_ack │ session_id     │ body (per msg_id)   │
//! │ u8     │ u8      │ u16            │                     │
//! └────────┴─────────┴────────────────┴─────────────────────┘
//! ```

use crate::buffers::WireBuffer;
use crate::error::{CodecError, CodecResult};
use types::{MsgAck, MsgId, SessionId, INVALID_SESSION_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub msg_id: MsgId,
    pub msg_ack: MsgAck,
    pub session_id: SessionId,
}

impl MessageHeader {
    pub const SIZE: usize = 4;

    pub fn new(msg_id: MsgId) -> Self {
        Self {
            msg_id,
            msg_ack: MsgAck::None,
            session_id: INVALID_SESSION_ID,
        }
    }

    pub fn build(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        buf.put_u8(self.msg_id.into())?;
        buf.put_u8(self.msg_ack.into())?;
        buf.put_u16(self.session_id)
    }

    /// Reads the ack and session fields once the tag byte has been resolved.
    pub(crate) fn parse_rest(msg_id: MsgId, buf: &mut WireBuffer) -> CodecResult<Self> {
        let raw_ack = buf.get_u8()?;
        let msg_ack =
            MsgAck::try_from(raw_ack).map_err(|_| CodecError::InvalidAck { value: raw_ack })?;
        let session_id = buf.get_u16()?;
        Ok(Self {
            msg_id,
            msg_ack,
            session_id,
        })
    }
}
