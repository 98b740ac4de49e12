//! Bus shared by several adapters on one controller.
//!
//! CAN hardware exposes a single transmit/receive queue. [`SharedBus`] owns the
//! driver behind an [`embassy_sync::mutex::Mutex`] and hands out one
//! [`SharedCanBus`] per adapter:
//!
//! * every frame read from the driver is published to all handles, so each
//!   adapter applies its own identifier filter to the full bus traffic;
//! * whichever handle is waiting runs the driver receive on behalf of all;
//! * a transmit preempts a pending driver receive instead of waiting for its
//!   timeout.
//!
//! A handle that stops reading falls behind; once `CAP` frames are pending the
//! oldest ones are dropped for it.
use core::cell::Cell;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};

use embassy_sync::blocking_mutex::{raw::RawMutex, Mutex as BlockingMutex};
use embassy_sync::mutex::Mutex;
use embassy_sync::pubsub::{PubSubChannel, Subscriber};
use embassy_sync::signal::Signal;
use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::error::SharedBusError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::traits::can_bus::CanBus;

/// Driver shared between up to `SUBS` handles, buffering `CAP` frames per handle.
pub struct SharedBus<M: RawMutex, C: CanBus, const CAP: usize, const SUBS: usize> {
    bus: Mutex<M, C>,
    frames: PubSubChannel<M, CanFrame, CAP, SUBS, 1>,
    tx_pending: BlockingMutex<M, Cell<usize>>,
    tx_request: Signal<M, ()>,
}

impl<M: RawMutex, C: CanBus, const CAP: usize, const SUBS: usize> SharedBus<M, C, CAP, SUBS> {
    pub const fn new(bus: C) -> Self {
        Self {
            bus: Mutex::new(bus),
            frames: PubSubChannel::new(),
            tx_pending: BlockingMutex::new(Cell::new(0)),
            tx_request: Signal::new(),
        }
    }

    /// New handle. It sees every frame received from now on.
    pub fn handle(&self) -> Result<SharedCanBus<'_, M, C, CAP, SUBS>, SharedBusError> {
        let frames = self
            .frames
            .subscriber()
            .map_err(|_| SharedBusError::TooManyHandles { max: SUBS })?;
        Ok(SharedCanBus {
            shared: self,
            frames,
        })
    }

    fn pending_transmits(&self) -> usize {
        self.tx_pending.lock(|count| count.get())
    }

    async fn transmit(&self, frame: &CanFrame) -> Result<(), C::Error> {
        let pending = PendingTransmit::register(&self.tx_pending);
        self.tx_request.signal(());
        let mut bus = self.bus.lock().await;
        drop(pending);
        bus.send(frame).await
    }

    /// Read one frame from the driver and publish it to every handle.
    async fn fetch(&self) -> Result<(), C::Error> {
        loop {
            if self.pending_transmits() > 0 {
                YieldNow::default().await;
                continue;
            }

            let mut bus = self.bus.lock().await;
            // Reset before checking, so a transmit registering later still preempts.
            self.tx_request.reset();
            if self.pending_transmits() > 0 {
                drop(bus);
                YieldNow::default().await;
                continue;
            }

            let received = {
                let recv = bus.recv();
                let preempt = self.tx_request.wait();
                pin_mut!(recv);
                pin_mut!(preempt);
                match select(recv, preempt).await {
                    Either::Left((result, _)) => Some(result),
                    Either::Right(_) => None,
                }
            };

            match received {
                Some(Ok(frame)) => {
                    self.frames.immediate_publisher().publish_immediate(frame);
                    return Ok(());
                }
                Some(Err(e)) => return Err(e),
                // A transmit is waiting for the driver; release it and start over.
                None => {}
            }
        }
    }
}

/// [`CanBus`] handle on a [`SharedBus`].
pub struct SharedCanBus<'a, M: RawMutex, C: CanBus, const CAP: usize, const SUBS: usize> {
    shared: &'a SharedBus<M, C, CAP, SUBS>,
    frames: Subscriber<'a, M, CanFrame, CAP, SUBS, 1>,
}

impl<'a, M: RawMutex, C: CanBus, const CAP: usize, const SUBS: usize>
    SharedCanBus<'a, M, C, CAP, SUBS>
{
    async fn next_frame(&mut self) -> Result<CanFrame, C::Error> {
        loop {
            if let Some(frame) = self.frames.try_next_message_pure() {
                return Ok(frame);
            }

            let mine = self.frames.next_message_pure();
            let fetch = self.shared.fetch();
            pin_mut!(mine);
            pin_mut!(fetch);

            match select(mine, fetch).await {
                Either::Left((frame, _)) => return Ok(frame),
                // Our own copy is now queued; pick it up on the next turn.
                Either::Right((Ok(()), _)) => {}
                Either::Right((Err(e), _)) => return Err(e),
            }
        }
    }
}

impl<M: RawMutex, C: CanBus, const CAP: usize, const SUBS: usize> CanBus
    for SharedCanBus<'_, M, C, CAP, SUBS>
{
    type Error = C::Error;

    fn send<'b>(
        &'b mut self,
        frame: &'b CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'b {
        self.shared.transmit(frame)
    }

    fn recv<'b>(&'b mut self) -> impl Future<Output = Result<CanFrame, Self::Error>> + 'b {
        self.next_frame()
    }
}

/// Counts a transmit waiting for the driver, even if its future is dropped.
struct PendingTransmit<'a, M: RawMutex> {
    count: &'a BlockingMutex<M, Cell<usize>>,
}

impl<'a, M: RawMutex> PendingTransmit<'a, M> {
    fn register(count: &'a BlockingMutex<M, Cell<usize>>) -> Self {
        count.lock(|c| c.set(c.get() + 1));
        Self { count }
    }
}

impl<M: RawMutex> Drop for PendingTransmit<'_, M> {
    fn drop(&mut self) {
        self.count.lock(|c| c.set(c.get().saturating_sub(1)));
    }
}

/// Gives the executor one turn before continuing.
#[derive(Default)]
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
