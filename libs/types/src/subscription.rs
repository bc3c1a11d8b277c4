//! Event subscription model
//!
//! A client subscribes to a set of events on one time base. The proxy keeps
//! the subscription for the lifetime of the session and evaluates every clock
//! sample against it.

use std::fmt;
use std::ops::BitOr;
use thiserror::Error;

/// Number of threshold slots carried by a subscription
pub const THRESHOLD_MAX: usize = 8;

/// Threshold slot holding the clock offset range
pub const OFFSET_THRESHOLD: usize = 0;

/// Bitset of subscribable events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventMask(u32);

impl EventMask {
    pub const NONE: Self = Self(0);
    pub const OFFSET_IN_RANGE: Self = Self(1 << 0);
    pub const SYNCED_TO_PRIMARY: Self = Self(1 << 1);
    pub const AS_CAPABLE: Self = Self(1 << 2);
    pub const GM_CHANGED: Self = Self(1 << 3);
    pub const COMPOSITE: Self = Self(1 << 4);

    /// Every defined event bit. Higher bits are reserved.
    pub const ALL: Self = Self(0x1F);

    /// Conditions that may be combined into the composite event
    pub const COMPOSITE_ELIGIBLE: Self =
        Self(Self::OFFSET_IN_RANGE.0 | Self::SYNCED_TO_PRIMARY.0 | Self::AS_CAPABLE.0);

    /// Accepts only masks without reserved bits set.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL.0 == 0 {
            Some(Self(bits))
        } else {
            None
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(EventMask, &str); 5] = [
            (EventMask::OFFSET_IN_RANGE, "offset_in_range"),
            (EventMask::SYNCED_TO_PRIMARY, "synced_to_primary"),
            (EventMask::AS_CAPABLE, "as_capable"),
            (EventMask::GM_CHANGED, "gm_changed"),
            (EventMask::COMPOSITE, "composite"),
        ];
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Open interval `(lower, upper)` a tracked value must stay inside
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Threshold {
    pub upper: i32,
    pub lower: i32,
}

impl Threshold {
    pub const fn new(upper: i32, lower: i32) -> Self {
        Self { upper, lower }
    }

    /// Both bounds are exclusive.
    pub fn in_range(&self, value: i64) -> bool {
        value > i64::from(self.lower) && value < i64::from(self.upper)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Threshold index {index} out of range (max {max})")]
    ThresholdIndex { index: usize, max: usize },

    #[error("Composite mask {mask:#x} contains events that cannot be combined")]
    CompositeMask { mask: u32 },
}

/// What a session wants to hear about on one time base
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub event_mask: EventMask,
    pub composite_mask: EventMask,
    pub thresholds: [Threshold; THRESHOLD_MAX],
}

impl Subscription {
    pub fn new(event_mask: EventMask) -> Self {
        Self {
            event_mask,
            ..Self::default()
        }
    }

    /// Selects the conditions ANDed into the composite event.
    ///
    /// Setting a non-empty mask also subscribes to [`EventMask::COMPOSITE`].
    pub fn with_composite(mut self, mask: EventMask) -> Result<Self, SubscriptionError> {
        if mask.bits() & !EventMask::COMPOSITE_ELIGIBLE.bits() != 0 {
            return Err(SubscriptionError::CompositeMask { mask: mask.bits() });
        }
        self.composite_mask = mask;
        if !mask.is_empty() {
            self.event_mask.insert(EventMask::COMPOSITE);
        }
        Ok(self)
    }

    pub fn define_threshold(
        &mut self,
        index: usize,
        upper: i32,
        lower: i32,
    ) -> Result<(), SubscriptionError> {
        let slot = self
            .thresholds
            .get_mut(index)
            .ok_or(SubscriptionError::ThresholdIndex {
                index,
                max: THRESHOLD_MAX,
            })?;
        *slot = Threshold::new(upper, lower);
        Ok(())
    }

    pub fn offset_threshold(&self) -> Threshold {
        self.thresholds[OFFSET_THRESHOLD]
    }

    pub fn wants(&self, event: EventMask) -> bool {
        self.event_mask.contains(event)
    }
}
