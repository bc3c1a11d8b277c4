//! Fixed-width encodings of the shared value types
//!
//! Layout of each type is fixed; reserved tails are zero on build and
//! checked on parse.

use crate::buffers::WireBuffer;
use crate::error::{CodecError, CodecResult};
use types::{
    ClockState, EventCounts, EventMask, Subscription, Threshold, TimeBaseCfg, CLIENT_ID_LEN,
    STRING_SIZE_MAX, THRESHOLD_MAX,
};

/// A value with a fixed wire layout
pub trait WireFormat: Sized {
    const WIRE_SIZE: usize;

    fn put(&self, buf: &mut WireBuffer) -> CodecResult<()>;
    fn get(buf: &mut WireBuffer) -> CodecResult<Self>;
}

pub(crate) fn put_client_id(buf: &mut WireBuffer, client_id: &str) -> CodecResult<()> {
    buf.put_fixed_str("client_id", client_id, CLIENT_ID_LEN)
}

pub(crate) fn get_client_id(buf: &mut WireBuffer) -> CodecResult<String> {
    let id = buf.get_fixed_str("client_id", CLIENT_ID_LEN)?;
    if id.is_empty() {
        return Err(CodecError::invalid_field("client_id", "empty"));
    }
    Ok(id)
}

// gm_identity[8] flags[5] reserved[3] offset i64 timestamp u64
impl WireFormat for ClockState {
    const WIRE_SIZE: usize = 32;

    fn put(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        buf.put_bytes(&self.gm_identity)?;
        buf.put_bool(self.as_capable)?;
        buf.put_bool(self.offset_in_range)?;
        buf.put_bool(self.synced_to_primary_clock)?;
        buf.put_bool(self.gm_changed)?;
        buf.put_bool(self.composite_event)?;
        buf.put_zeros(3)?;
        buf.put_i64(self.clock_offset)?;
        buf.put_u64(self.notification_timestamp)
    }

    fn get(buf: &mut WireBuffer) -> CodecResult<Self> {
        let gm_identity = buf.get_array::<8>()?;
        let as_capable = buf.get_bool("as_capable")?;
        let offset_in_range = buf.get_bool("offset_in_range")?;
        let synced_to_primary_clock = buf.get_bool("synced_to_primary_clock")?;
        let gm_changed = buf.get_bool("gm_changed")?;
        let composite_event = buf.get_bool("composite_event")?;
        buf.expect_zeros(3, "clock state")?;
        Ok(Self {
            gm_identity,
            as_capable,
            offset_in_range,
            synced_to_primary_clock,
            gm_changed,
            composite_event,
            clock_offset: buf.get_i64()?,
            notification_timestamp: buf.get_u64()?,
        })
    }
}

const EVENT_COUNT_RESERVED: usize = 3;

impl WireFormat for EventCounts {
    const WIRE_SIZE: usize = 32;

    fn put(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        buf.put_u32(self.offset_in_range)?;
        buf.put_u32(self.synced_to_primary_clock)?;
        buf.put_u32(self.as_capable)?;
        buf.put_u32(self.gm_changed)?;
        buf.put_u32(self.composite)?;
        buf.put_zeros(EVENT_COUNT_RESERVED * 4)
    }

    fn get(buf: &mut WireBuffer) -> CodecResult<Self> {
        let counts = Self {
            offset_in_range: buf.get_u32()?,
            synced_to_primary_clock: buf.get_u32()?,
            as_capable: buf.get_u32()?,
            gm_changed: buf.get_u32()?,
            composite: buf.get_u32()?,
        };
        buf.expect_zeros(EVENT_COUNT_RESERVED * 4, "event counts")?;
        Ok(counts)
    }
}

fn get_mask(buf: &mut WireBuffer, field: &'static str) -> CodecResult<EventMask> {
    let bits = buf.get_u32()?;
    EventMask::from_bits(bits)
        .ok_or_else(|| CodecError::invalid_field(field, format!("reserved bits in {bits:#x}")))
}

fn check_composite(mask: EventMask) -> CodecResult<()> {
    if mask.bits() & !EventMask::COMPOSITE_ELIGIBLE.bits() != 0 {
        return Err(CodecError::invalid_field(
            "composite_mask",
            format!("{mask} cannot be combined"),
        ));
    }
    Ok(())
}

impl WireFormat for Subscription {
    const WIRE_SIZE: usize = 8 + THRESHOLD_MAX * 8;

    fn put(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        check_composite(self.composite_mask)?;
        buf.put_u32(self.event_mask.bits())?;
        buf.put_u32(self.composite_mask.bits())?;
        for threshold in &self.thresholds {
            buf.put_i32(threshold.upper)?;
            buf.put_i32(threshold.lower)?;
        }
        Ok(())
    }

    fn get(buf: &mut WireBuffer) -> CodecResult<Self> {
        let event_mask = get_mask(buf, "event_mask")?;
        let composite_mask = get_mask(buf, "composite_mask")?;
        check_composite(composite_mask)?;
        let mut thresholds = [Threshold::default(); THRESHOLD_MAX];
        for slot in thresholds.iter_mut() {
            let upper = buf.get_i32()?;
            let lower = buf.get_i32()?;
            *slot = Threshold::new(upper, lower);
        }
        Ok(Self {
            event_mask,
            composite_mask,
            thresholds,
        })
    }
}

impl WireFormat for TimeBaseCfg {
    const WIRE_SIZE: usize = 4 + 2 * STRING_SIZE_MAX + 4;

    fn put(&self, buf: &mut WireBuffer) -> CodecResult<()> {
        buf.put_i32(self.index)?;
        buf.put_fixed_str("time_base_name", &self.name, STRING_SIZE_MAX)?;
        buf.put_fixed_str("interface_name", &self.interface_name, STRING_SIZE_MAX)?;
        buf.put_u8(self.transport_specific)?;
        buf.put_u8(self.domain_number)?;
        buf.put_zeros(2)
    }

    fn get(buf: &mut WireBuffer) -> CodecResult<Self> {
        let index = buf.get_i32()?;
        let name = buf.get_fixed_str("time_base_name", STRING_SIZE_MAX)?;
        let interface_name = buf.get_fixed_str("interface_name", STRING_SIZE_MAX)?;
        let transport_specific = buf.get_u8()?;
        let domain_number = buf.get_u8()?;
        buf.expect_zeros(2, "time base")?;
        Ok(Self {
            index,
            name,
            interface_name,
            transport_specific,
            domain_number,
        })
    }
}
