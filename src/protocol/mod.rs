//! High-level components: CAN transport primitives (identifiers, frames,
//! frame port, raw reassembler, driver traits) and the ISO-TP adapter loop.
pub mod adapter;
pub mod transport;
