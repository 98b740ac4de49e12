//! `twai-tp` library: glue between a raw CAN controller and a segmented
//! transport in a `no_std` environment. The crate exposes the transport
//! primitives (identifiers, frames, a timed frame port, a raw multi-frame
//! reassembler) and the adapter loop that services an ISO-TP link object.
#![no_std]
//==================================================================================
/// Error types shared by the transport primitives and the adapter
/// (identifier validation, frame I/O, reassembly, link send path).
pub mod error;
/// Transport primitives and the ISO-TP adapter loop.
pub mod protocol;
//==================================================================================
