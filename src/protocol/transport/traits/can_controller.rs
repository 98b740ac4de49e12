//! Driver lifecycle of the CAN peripheral: install with a configuration, then start.
use crate::protocol::transport::controller::ControllerConfig;

/// Bring-up half of the driver contract; frame traffic goes through
/// [`CanBus`](super::can_bus::CanBus) once the controller runs.
pub trait CanController {
    type Error: core::fmt::Debug;
    /// Install the driver with pins, mode, bit timing and acceptance filter.
    fn install(&mut self, config: &ControllerConfig) -> Result<(), Self::Error>;
    /// Start participating in bus traffic.
    fn start(&mut self) -> Result<(), Self::Error>;
}
