//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (identifier validation,
//! frame I/O, reassembly input checks, link send path, controller bring-up).
use crate::protocol::transport::can_id::CanId;
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur while building an 11-bit or 29-bit CAN identifier.
pub enum CanIdError {
    /// Value does not fit in the 11 bits of a standard identifier.
    #[error("Standard identifier out of range: {raw:#X}")]
    StandardOutOfRange { raw: u16 },
    /// Value does not fit in the 29 bits of an extended identifier.
    #[error("Extended identifier out of range: {raw:#X}")]
    ExtendedOutOfRange { raw: u32 },
}

//==================================================================================FRAME_IO_ERROR
#[derive(Error, Debug)]
/// Outcome of a failed single-frame transmit or receive.
pub enum FrameIoError<E: core::fmt::Debug> {
    /// Nothing was transmitted or received before the deadline.
    #[error("Frame I/O timed out")]
    Timeout,
    /// The CAN driver reported a failure (queue full, bus-off, etc.).
    #[error("CAN driver error: {0:?}")]
    Driver(E),
}

impl<E: core::fmt::Debug> FrameIoError<E> {
    /// `true` when the failure is a timeout rather than a driver fault.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameIoError::Timeout)
    }
}

//==================================================================================REASSEMBLY_ERROR
#[derive(Error, Debug)]
/// Errors raised by `read_bytes`. Running out of time is not one of them:
/// a timeout returns the partial byte count instead.
pub enum ReadBytesError<E: core::fmt::Debug> {
    /// A zero-length read was requested.
    #[error("Requested length must be greater than zero")]
    ZeroLength,
    /// The destination cannot hold the requested length.
    #[error("Buffer too small -> requested: {requested}, capacity: {capacity}")]
    BufferTooSmall { requested: usize, capacity: usize },
    /// The CAN driver failed while waiting for frames.
    #[error("CAN driver error: {0:?}")]
    Driver(E),
}

//==================================================================================ADAPTER_ERRORS
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Invalid identifier pairing for an adapter instance.
pub enum RoleMappingError {
    /// Outbound and inbound-control identifiers are identical: the adapter would
    /// feed its own transmissions back into the link.
    #[error("Outbound and inbound-control identifiers are both {id:?}")]
    SelfTalk { id: CanId },
    /// The link transmits on a different identifier than the role mapping declares.
    #[error("Link sends on {link:?} but the role mapping expects {expected:?}")]
    OutboundMismatch { link: CanId, expected: CanId },
}

#[derive(Error, Debug)]
/// Errors surfaced to whoever requested a segmented send.
pub enum AdapterSendError<E: core::fmt::Debug> {
    /// Nothing to send.
    #[error("Payload is empty: nothing to send")]
    EmptyPayload,
    /// Payload exceeds the adapter message capacity.
    #[error("Payload too large -> len: {len}, max: {max}")]
    PayloadTooLarge { len: usize, max: usize },
    /// The link object refused the message (transfer in progress, overflow...).
    #[error("Link protocol failure: {0:?}")]
    Protocol(E),
}

//==================================================================================SHARED_BUS_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failures while handing out shared bus handles.
pub enum SharedBusError {
    /// Every handle slot of the shared bus is in use.
    #[error("Shared bus already has {max} handles")]
    TooManyHandles { max: usize },
}

//==================================================================================CONTROLLER_ERROR
#[derive(Error, Debug)]
/// Failures while bringing the CAN controller up.
pub enum ControllerError<E: core::fmt::Debug> {
    /// Driver installation was rejected.
    #[error("Controller install failed: {0:?}")]
    Install(E),
    /// The installed driver did not start.
    #[error("Controller start failed: {0:?}")]
    Start(E),
}
