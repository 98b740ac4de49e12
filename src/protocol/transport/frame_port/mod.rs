//! Frame I/O port: single-frame transmit and receive bounded by a caller
//! supplied timeout, on top of any [`CanBus`] and [`TpTimer`].
use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::error::FrameIoError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::traits::{can_bus::CanBus, tp_timer::TpTimer};

/// Owns the bus and the timer used to bound every operation on it.
pub struct FramePort<C: CanBus, T: TpTimer> {
    bus: C,
    timer: T,
}

impl<C: CanBus, T: TpTimer> FramePort<C, T>
where
    C::Error: core::fmt::Debug,
{
    pub fn new(bus: C, timer: T) -> Self {
        Self { bus, timer }
    }

    /// Send `payload` on `id`, giving up after `timeout_ms`.
    ///
    /// The payload is copied into an owned frame before the driver sees it, so
    /// `payload` may be reused as soon as this call returns. Payloads longer than
    /// eight bytes are truncated to eight.
    pub async fn send(
        &mut self,
        id: CanId,
        payload: &[u8],
        timeout_ms: u32,
    ) -> Result<(), FrameIoError<C::Error>> {
        let frame = CanFrame::new(id, payload);
        self.transmit(&frame, timeout_ms).await
    }

    /// Transmit an already built frame, giving up after `timeout_ms`.
    pub async fn transmit(
        &mut self,
        frame: &CanFrame,
        timeout_ms: u32,
    ) -> Result<(), FrameIoError<C::Error>> {
        let send = self.bus.send(frame);
        let deadline = self.timer.delay_ms(timeout_ms);
        pin_mut!(send);
        pin_mut!(deadline);

        match select(send, deadline).await {
            Either::Left((result, _)) => result.map_err(FrameIoError::Driver),
            Either::Right(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Transmit timed out after {} ms on {}", timeout_ms, frame.id);
                Err(FrameIoError::Timeout)
            }
        }
    }

    /// Wait up to `timeout_ms` for the next frame.
    ///
    /// The driver is polled before the timer, so `timeout_ms = 0` still returns
    /// a frame that is already queued.
    pub async fn receive(&mut self, timeout_ms: u32) -> Result<CanFrame, FrameIoError<C::Error>> {
        let recv = self.bus.recv();
        let deadline = self.timer.delay_ms(timeout_ms);
        pin_mut!(recv);
        pin_mut!(deadline);

        match select(recv, deadline).await {
            Either::Left((Ok(frame), _)) => {
                #[cfg(feature = "defmt")]
                defmt::trace!(
                    "RX CAN: ID={} DLC={} Data={:X}",
                    frame.id,
                    frame.len,
                    frame.payload()
                );
                Ok(frame)
            }
            Either::Left((Err(e), _)) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("CAN receive error: {:?}", defmt::Debug2Format(&e));
                Err(FrameIoError::Driver(e))
            }
            Either::Right(_) => Err(FrameIoError::Timeout),
        }
    }

    /// Current time of the port's clock (ms).
    pub fn now_ms(&self) -> u64 {
        self.timer.now_ms()
    }

    /// Sleep on the port's timer.
    pub async fn sleep_ms(&mut self, millis: u32) {
        self.timer.delay_ms(millis).await
    }

    /// Give the bus and timer back.
    pub fn into_inner(self) -> (C, T) {
        (self.bus, self.timer)
    }
}
