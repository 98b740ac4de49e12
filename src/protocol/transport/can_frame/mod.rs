//! In-memory representation of a classic CAN data frame.
use crate::protocol::transport::can_id::CanId;
use embedded_can::Id;

/// Payload capacity of a classic CAN frame.
pub const CAN_FRAME_CAPACITY: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Owned CAN frame. The payload is always copied in, never borrowed, so a
/// frame handed to a driver outlives whatever buffer it was built from.
pub struct CanFrame {
    /// Arbitration identifier.
    pub id: CanId,
    /// Payload buffer. Bytes past `len` are zero.
    pub data: [u8; CAN_FRAME_CAPACITY],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
}

impl CanFrame {
    /// Copy up to eight bytes of `payload` into a new frame.
    ///
    /// Longer payloads are truncated to eight bytes.
    pub fn new(id: CanId, payload: &[u8]) -> Self {
        let len = payload.len().min(CAN_FRAME_CAPACITY);
        let mut data = [0u8; CAN_FRAME_CAPACITY];
        data[..len].copy_from_slice(&payload[..len]);
        Self { id, data, len }
    }

    /// Rebuild a frame from a driver buffer, clamping the reported DLC to eight.
    pub fn from_raw(id: CanId, data: [u8; CAN_FRAME_CAPACITY], dlc: usize) -> Self {
        Self {
            id,
            data,
            len: dlc.min(CAN_FRAME_CAPACITY),
        }
    }

    /// Valid payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > CAN_FRAME_CAPACITY {
            return None;
        }
        Some(CanFrame::new(CanId::from(id.into()), data))
    }

    // Remote frames carry no payload and are never exchanged by the transport.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        self.id.is_extended()
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        self.id.into()
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
