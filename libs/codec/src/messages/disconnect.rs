use super::fields::{get_client_id, put_client_id};
use super::MessageBody;
use crate::buffers::WireBuffer;
use crate::error::CodecResult;
use types::MsgId;

/// Session teardown; the session id travels in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub client_id: String,
}

impl MessageBody for Disconnect {
    const MSG_ID: MsgId = MsgId::Disconnect;

    fn parse_body(buf: &mut WireBuffer) -> CodecResult<Self> {
        Ok(Self {
            client_id: get_client_id(buf)?,
        })
    }

    fn build_body(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        put_client_id(buf, &self.client_id)
    }

    fn describe(&self) -> String {
        format!("client_id={}", self.client_id)
    }
}
