//! Connect handshake
//!
//! A request with the invalid session id asks for a new session. A request
//! carrying a live id is a liveness probe for that session.

use super::fields::{get_client_id, put_client_id, WireFormat};
use super::MessageBody;
use crate::buffers::WireBuffer;
use crate::error::{CodecError, CodecResult};
use types::{MsgId, TimeBaseCfg, MAX_TIME_BASES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Name of the queue the client listens on
    pub client_id: String,
}

impl MessageBody for ConnectRequest {
    const MSG_ID: MsgId = MsgId::Connect;

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

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectReply {
    pub ptp_available: bool,
    pub time_bases: Vec<TimeBaseCfg>,
}

impl MessageBody for ConnectReply {
    const MSG_ID: MsgId = MsgId::Connect;

    fn parse_body(buf: &mut WireBuffer) -> CodecResult<Self> {
        let ptp_available = buf.get_bool("ptp_available")?;
        buf.expect_zeros(1, "connect reply")?;
        let count = usize::from(buf.get_u16()?);
        if count > MAX_TIME_BASES {
            return Err(CodecError::invalid_field(
                "time_base_count",
                format!("{count} exceeds {MAX_TIME_BASES}"),
            ));
        }
        let time_bases = (0..count)
            .map(|_| TimeBaseCfg::get(buf))
            .collect::<CodecResult<Vec<_>>>()?;
        Ok(Self {
            ptp_available,
            time_bases,
        })
    }

    fn build_body(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        if self.time_bases.len() > MAX_TIME_BASES {
            return Err(CodecError::invalid_field(
                "time_base_count",
                format!("{} exceeds {MAX_TIME_BASES}", self.time_bases.len()),
            ));
        }
        buf.put_bool(self.ptp_available)?;
        buf.put_zeros(1)?;
        // bounded by MAX_TIME_BASES above
        buf.put_u16(self.time_bases.len() as u16)?;
        for time_base in &self.time_bases {
            time_base.put(buf)?;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.time_bases.iter().map(|tb| tb.name.as_str()).collect();
        format!(
            "ptp_available={} time_bases={:?}",
            self.ptp_available, names
        )
    }
}
