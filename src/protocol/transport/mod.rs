//! CAN transport layer: identifiers, owned frames, the timed frame port,
//! the raw multi-frame reassembler, controller bring-up and the driver/link
//! abstraction traits.
//!
//! ## Timing Constants
//!
//! These constants define the default delays and timeouts used by the frame
//! port and the adapter loop. They are defaults, not protocol constants:
//! [`AdapterConfig`](crate::protocol::adapter::AdapterConfig) overrides them per instance.

pub mod can_frame;
pub mod can_id;
pub mod controller;
pub mod frame_port;
pub mod reassembler;
pub mod shared_bus;
pub mod traits;

use can_id::CanId;

/// Recommended timeout for sending a single CAN frame (ms).
///
/// Prevents indefinite blocking when the bus is faulty, disconnected, or saturated.
///
/// # Timeout rationale
///
/// On a classic CAN bus @ 500 kbps:
/// - Maximum time for one frame (8 bytes): ~0.25 ms (no contention)
/// - With arbitration and retransmissions: ~10–20 ms
/// - Safety margin → 100 ms
pub const CAN_SEND_TIMEOUT_MS: u32 = 100;

/// Default frame-read timeout of one adapter cycle (ms).
///
/// Bounds how long the adapter can be kept away from servicing the link timers.
/// Must stay well below the link's own timer granularity (ISO-TP N_Bs / N_Cr are
/// typically in the hundreds of milliseconds).
pub const ADAPTER_RECV_TIMEOUT_MS: u32 = 10;

/// Default minimum interval between two link service calls (ms).
///
/// # Recommended Values
///
/// - **5 ms**: Tight STmin handling on fast peers.
/// - **10 ms**: Default, matches the reference receiver.
/// - **20 ms**: Conservative choice for busy single-core targets.
pub const ADAPTER_SERVICE_INTERVAL_MS: u32 = 10;

/// Default scheduler yield at the end of each adapter cycle (ms).
pub const ADAPTER_CYCLE_YIELD_MS: u32 = 2;

/// Largest application message the adapter can queue or deliver (bytes).
///
/// Matches the send/receive buffers handed to the link in the reference deployment.
pub const MAX_TP_MESSAGE_LEN: usize = 1024;

/// Identifier carrying payload-bearing frames (First/Consecutive frames) in the
/// reference deployment.
pub const REFERENCE_PAYLOAD_ID: CanId = match CanId::standard(0x789) {
    Ok(id) => id,
    Err(_) => panic!("0x789 is a valid standard identifier"),
};

/// Identifier carrying flow-control frames in the reference deployment.
pub const REFERENCE_CONTROL_ID: CanId = match CanId::standard(0x787) {
    Ok(id) => id,
    Err(_) => panic!("0x787 is a valid standard identifier"),
};
