//! Creation and inspection of CAN arbitration identifiers, standard (11-bit)
//! or extended (29-bit), with conversions to and from `embedded_can::Id`.
use crate::error::CanIdError;
use embedded_can::{ExtendedId, Id, StandardId};

/// Highest value representable by a standard identifier.
pub const MAX_STANDARD_ID: u16 = 0x7FF;
/// Highest value representable by an extended identifier.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Arbitration identifier of a frame. The format is part of the identity:
/// standard `0x123` and extended `0x123` are different identifiers on the bus.
pub struct CanId {
    raw: u32,
    extended: bool,
}

impl CanId {
    /// Build an 11-bit identifier.
    pub const fn standard(raw: u16) -> Result<Self, CanIdError> {
        if raw > MAX_STANDARD_ID {
            return Err(CanIdError::StandardOutOfRange { raw });
        }
        Ok(Self {
            raw: raw as u32,
            extended: false,
        })
    }

    /// Build a 29-bit identifier.
    pub const fn extended(raw: u32) -> Result<Self, CanIdError> {
        if raw > MAX_EXTENDED_ID {
            return Err(CanIdError::ExtendedOutOfRange { raw });
        }
        Ok(Self {
            raw,
            extended: true,
        })
    }

    /// Numeric value of the identifier.
    pub const fn raw(&self) -> u32 {
        self.raw
    }

    /// `true` for 29-bit identifiers.
    pub const fn is_extended(&self) -> bool {
        self.extended
    }
}

impl From<StandardId> for CanId {
    fn from(id: StandardId) -> Self {
        Self {
            raw: id.as_raw() as u32,
            extended: false,
        }
    }
}

impl From<ExtendedId> for CanId {
    fn from(id: ExtendedId) -> Self {
        Self {
            raw: id.as_raw(),
            extended: true,
        }
    }
}

impl From<Id> for CanId {
    fn from(id: Id) -> Self {
        match id {
            Id::Standard(id) => id.into(),
            Id::Extended(id) => id.into(),
        }
    }
}

impl From<CanId> for Id {
    fn from(id: CanId) -> Self {
        // Range was validated at construction, both branches always succeed.
        if id.extended {
            Id::Extended(ExtendedId::new(id.raw).unwrap_or(ExtendedId::MAX))
        } else {
            Id::Standard(StandardId::new(id.raw as u16).unwrap_or(StandardId::MAX))
        }
    }
}
