//! ISO-TP adapter: the long-running cycle that moves frames between a
//! [`FramePort`](crate::protocol::transport::frame_port::FramePort) and an
//! [`IsoTpLink`](crate::protocol::transport::traits::isotp_link::IsoTpLink),
//! services the link timers on a fixed cadence and hands completed messages
//! to the application.
//!
//! * [`transport_adapter`] holds the cycle itself and owns the link;
//! * [`service`] wraps it with pre-allocated channels so other tasks can queue
//!   sends and receive messages without touching the link.
use crate::error::RoleMappingError;
use crate::protocol::transport::{
    can_id::CanId, ADAPTER_CYCLE_YIELD_MS, ADAPTER_RECV_TIMEOUT_MS, ADAPTER_SERVICE_INTERVAL_MS,
    CAN_SEND_TIMEOUT_MS, MAX_TP_MESSAGE_LEN, REFERENCE_CONTROL_ID, REFERENCE_PAYLOAD_ID,
};

pub mod poll_cadence;
pub mod service;
pub mod transport_adapter;

//==================================================================================ROLE_MAPPING
/// Identifier pair of one adapter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoleMapping {
    /// Identifier this side transmits on.
    pub outbound_id: CanId,
    /// Only frames on this identifier reach the link.
    pub inbound_control_id: CanId,
}

impl RoleMapping {
    /// Sending side: emits payload frames, listens for flow control.
    pub const fn sender(payload_id: CanId, control_id: CanId) -> Self {
        Self {
            outbound_id: payload_id,
            inbound_control_id: control_id,
        }
    }

    /// Receiving side: emits flow control, listens for payload frames.
    pub const fn receiver(payload_id: CanId, control_id: CanId) -> Self {
        Self {
            outbound_id: control_id,
            inbound_control_id: payload_id,
        }
    }

    /// Sender of the reference deployment: data on 0x789, flow control on 0x787.
    pub const fn reference_sender() -> Self {
        Self::sender(REFERENCE_PAYLOAD_ID, REFERENCE_CONTROL_ID)
    }

    /// Receiver of the reference deployment.
    pub const fn reference_receiver() -> Self {
        Self::receiver(REFERENCE_PAYLOAD_ID, REFERENCE_CONTROL_ID)
    }

    /// Reject pairings that would make the adapter talk to itself.
    pub fn validate(&self) -> Result<(), RoleMappingError> {
        if self.outbound_id == self.inbound_control_id {
            return Err(RoleMappingError::SelfTalk {
                id: self.outbound_id,
            });
        }
        Ok(())
    }
}

//==================================================================================CONFIG
/// Timing and identifiers of one adapter instance. Fixed once the adapter is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdapterConfig {
    pub roles: RoleMapping,
    /// Frame-read timeout of one cycle (ms).
    pub recv_timeout_ms: u32,
    /// Minimum interval between two link service calls (ms).
    pub service_interval_ms: u32,
    /// Sleep at the end of each cycle (ms).
    pub cycle_yield_ms: u32,
    /// Per-frame transmit timeout for frames emitted by the link (ms).
    pub send_timeout_ms: u32,
}

impl AdapterConfig {
    /// Defaults from [`crate::protocol::transport`] for the given roles.
    pub const fn new(roles: RoleMapping) -> Self {
        Self {
            roles,
            recv_timeout_ms: ADAPTER_RECV_TIMEOUT_MS,
            service_interval_ms: ADAPTER_SERVICE_INTERVAL_MS,
            cycle_yield_ms: ADAPTER_CYCLE_YIELD_MS,
            send_timeout_ms: CAN_SEND_TIMEOUT_MS,
        }
    }

    pub fn with_recv_timeout_ms(mut self, millis: u32) -> Self {
        self.recv_timeout_ms = millis;
        self
    }

    pub fn with_service_interval_ms(mut self, millis: u32) -> Self {
        self.service_interval_ms = millis;
        self
    }

    pub fn with_cycle_yield_ms(mut self, millis: u32) -> Self {
        self.cycle_yield_ms = millis;
        self
    }

    pub fn with_send_timeout_ms(mut self, millis: u32) -> Self {
        self.send_timeout_ms = millis;
        self
    }
}

//==================================================================================MESSAGE
/// Complete application message, copied out of the link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TpMessage {
    /// Message bytes; only the first `len` are meaningful.
    pub payload: [u8; MAX_TP_MESSAGE_LEN],
    /// Effective message length.
    pub len: usize,
}

impl Default for TpMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl TpMessage {
    pub const fn new() -> Self {
        Self {
            payload: [0; MAX_TP_MESSAGE_LEN],
            len: 0,
        }
    }

    /// Copy `bytes` into a message; `None` when they do not fit.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_TP_MESSAGE_LEN {
            return None;
        }
        let mut message = Self::new();
        message.payload[..bytes.len()].copy_from_slice(bytes);
        message.len = bytes.len();
        Some(message)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.payload[..self.len]
    }
}

//==================================================================================STATE
/// Adapter state: `Servicing` while a segmented send is in flight in the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdapterState {
    Idle,
    Servicing,
}

/// What happened to the frame read during a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameDisposition {
    /// The read timed out.
    #[default]
    NoFrame,
    /// Frame on the inbound-control identifier, fed to the link.
    Forwarded,
    /// Frame on any other identifier, dropped without side effects.
    Discarded,
    /// The driver failed; the cycle went on.
    DriverError,
}

/// Outcome of one adapter cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub frame: FrameDisposition,
    /// The link service call ran during this cycle.
    pub serviced: bool,
    /// Frames emitted by the link and accepted by the driver.
    pub transmitted: usize,
    /// Message completed by the link during this cycle.
    pub message: Option<TpMessage>,
}

/// Running counters of an adapter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdapterStats {
    pub frames_received: u32,
    pub frames_forwarded: u32,
    pub frames_discarded: u32,
    pub receive_errors: u32,
    pub polls: u32,
    pub frames_transmitted: u32,
    pub transmit_failures: u32,
    pub messages_received: u32,
    pub messages_dropped: u32,
}
