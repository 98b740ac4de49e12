//! Contract of the ISO-TP link object serviced by the adapter.
//!
//! The link owns segmentation state, timers and buffers. It is sans-IO: frames
//! it wants on the bus (First/Consecutive frames, Flow Control) are queued
//! internally and handed out through [`IsoTpLink::next_outgoing`]; the adapter
//! transmits them. Time is passed in explicitly so the link never reads a clock.
use crate::protocol::transport::{can_frame::CanFrame, can_id::CanId};

/// Progress of the segmented send currently owned by the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendStatus {
    /// No transfer in flight; the previous one (if any) completed.
    Idle,
    /// A segmented transfer is still being emitted.
    InProgress,
    /// The last transfer was aborted (flow-control timeout, overflow...).
    Error,
}

/// ISO-TP link object. Construction (outbound identifier, send and receive
/// buffers) is implementation specific and happens before the adapter takes it.
pub trait IsoTpLink {
    type Error: core::fmt::Debug;

    /// Identifier the link transmits on.
    fn outbound_id(&self) -> CanId;

    /// Identifier the link expects its peer to answer on.
    fn inbound_control_id(&self) -> CanId;

    /// Decouple the inbound identifier from the outbound one after construction.
    fn set_inbound_control_id(&mut self, id: CanId);

    /// Queue an application message for segmented transmission.
    fn send(&mut self, payload: &[u8]) -> Result<(), Self::Error>;

    /// Feed the raw payload of a frame received on the inbound identifier.
    fn on_can_message(&mut self, data: &[u8], now_ms: u64);

    /// Drive timers, consecutive-frame pacing and flow-control emission.
    fn poll(&mut self, now_ms: u64);

    /// Next frame the link wants transmitted, if any.
    fn next_outgoing(&mut self) -> Option<CanFrame>;

    /// Copy a completed inbound message into `dest`.
    ///
    /// Returns the message length, or `None` when nothing is ready.
    fn receive(&mut self, dest: &mut [u8]) -> Option<usize>;

    /// State of the outbound transfer.
    fn send_status(&self) -> SendStatus;
}
