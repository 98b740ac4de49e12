//! Transport service built on top of [`TransportAdapter`].
//!
//! The runner is the only owner of the link. Other tasks talk to it through:
//!
//! * send handles (`TransportHandle`, cloneable) queueing payloads and
//!   waiting for the link's verdict on their own reply slot;
//! * a message receiver (`TransportMessages`) pulling completed messages.
//!
//! Firmware decides which features it needs by providing pre-allocated
//! [`SendQueue`] / [`embassy_sync::channel::Channel`] instances. No allocation
//! is performed by the library.

use core::cell::Cell;
use core::fmt::Debug;

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex as BlockingMutex},
    channel::{Channel, Receiver, TrySendError},
    signal::Signal,
};

use crate::error::AdapterSendError;
use crate::protocol::adapter::transport_adapter::{validate_payload, TransportAdapter};
use crate::protocol::adapter::{CycleReport, TpMessage};
use crate::protocol::transport::traits::{can_bus::CanBus, isotp_link::IsoTpLink, tp_timer::TpTimer};
use crate::protocol::transport::MAX_TP_MESSAGE_LEN;

/// Commands queued by producer tasks.
#[derive(Clone)]
pub enum AdapterCommand {
    Send {
        seq: u32,
        /// Reply slot of the requesting handle.
        slot: usize,
        len: usize,
        payload: [u8; MAX_TP_MESSAGE_LEN],
    },
}

/// Verdict of the link for the command tagged `seq`.
#[derive(Debug)]
pub struct SendReply<E: Debug> {
    pub seq: u32,
    pub result: Result<(), AdapterSendError<E>>,
}

/// Pre-allocated command queue and reply slots backing [`TransportHandle`]s.
///
/// At most `CAP` requests are in flight at once, each owning one reply slot;
/// further callers wait for a slot to free up.
pub struct SendQueue<E: Debug, const CAP: usize> {
    commands: Channel<CriticalSectionRawMutex, AdapterCommand, CAP>,
    replies: [Signal<CriticalSectionRawMutex, SendReply<E>>; CAP],
    free_slots: Channel<CriticalSectionRawMutex, usize, CAP>,
    /// Slots handed out at least once; indices below it cycle through `free_slots`.
    issued: BlockingMutex<CriticalSectionRawMutex, Cell<usize>>,
    next_seq: BlockingMutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl<E: Debug, const CAP: usize> Default for SendQueue<E, CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Debug, const CAP: usize> SendQueue<E, CAP> {
    pub const fn new() -> Self {
        Self {
            commands: Channel::new(),
            replies: [const { Signal::new() }; CAP],
            free_slots: Channel::new(),
            issued: BlockingMutex::new(Cell::new(0)),
            next_seq: BlockingMutex::new(Cell::new(0)),
        }
    }

    async fn acquire_slot(&self) -> ReplySlot<'_, E, CAP> {
        let fresh = self.issued.lock(|issued| {
            let n = issued.get();
            if n < CAP {
                issued.set(n + 1);
                Some(n)
            } else {
                None
            }
        });
        let index = match fresh {
            Some(index) => index,
            None => self.free_slots.receive().await,
        };
        ReplySlot { queue: self, index }
    }

    fn take_seq(&self) -> u32 {
        self.next_seq.lock(|next| {
            let seq = next.get();
            next.set(seq.wrapping_add(1));
            seq
        })
    }
}

/// Reply slot owned by one request; returned to the pool on drop.
struct ReplySlot<'a, E: Debug, const CAP: usize> {
    queue: &'a SendQueue<E, CAP>,
    index: usize,
}

impl<E: Debug, const CAP: usize> Drop for ReplySlot<'_, E, CAP> {
    fn drop(&mut self) {
        // Never full: the channel holds at most the CAP slot indices.
        let _ = self.queue.free_slots.try_send(self.index);
    }
}

/// Service assembling the adapter and its optional channels.
pub struct TransportService<'a, C, T, L, const CMD_CAP: usize, const MSG_CAP: usize>
where
    C: CanBus,
    T: TpTimer,
    L: IsoTpLink,
{
    adapter: TransportAdapter<C, T, L>,
    send_queue: Option<&'a SendQueue<L::Error, CMD_CAP>>,
    message_channel: Option<&'a Channel<CriticalSectionRawMutex, TpMessage, MSG_CAP>>,
}

impl<'a, C, T, L, const CMD_CAP: usize, const MSG_CAP: usize>
    TransportService<'a, C, T, L, CMD_CAP, MSG_CAP>
where
    C: CanBus,
    C::Error: Debug,
    T: TpTimer,
    L: IsoTpLink,
    L::Error: Debug,
{
    /// Wrap an already-configured [`TransportAdapter`].
    pub fn new(
        adapter: TransportAdapter<C, T, L>,
        send_queue: Option<&'a SendQueue<L::Error, CMD_CAP>>,
        message_channel: Option<&'a Channel<CriticalSectionRawMutex, TpMessage, MSG_CAP>>,
    ) -> Self {
        Self {
            adapter,
            send_queue,
            message_channel,
        }
    }

    /// Split into handle/receiver/runner components.
    pub fn into_parts(self) -> TransportServiceParts<'a, C, T, L, CMD_CAP, MSG_CAP> {
        let handle = self.send_queue.map(|queue| TransportHandle { queue });
        let messages = self.message_channel.map(|channel| TransportMessages {
            receiver: channel.receiver(),
        });
        TransportServiceParts {
            handle,
            messages,
            runner: TransportRunner {
                adapter: self.adapter,
                send_queue: self.send_queue,
                message_channel: self.message_channel,
            },
        }
    }
}

/// Bundle returned by [`TransportService::into_parts`].
pub struct TransportServiceParts<'a, C, T, L, const CMD_CAP: usize, const MSG_CAP: usize>
where
    C: CanBus,
    T: TpTimer,
    L: IsoTpLink,
{
    pub handle: Option<TransportHandle<'a, L::Error, CMD_CAP>>,
    pub messages: Option<TransportMessages<'a, MSG_CAP>>,
    pub runner: TransportRunner<'a, C, T, L, CMD_CAP, MSG_CAP>,
}

/// Runner that drives the adapter cycle.
pub struct TransportRunner<'a, C, T, L, const CMD_CAP: usize, const MSG_CAP: usize>
where
    C: CanBus,
    T: TpTimer,
    L: IsoTpLink,
{
    adapter: TransportAdapter<C, T, L>,
    send_queue: Option<&'a SendQueue<L::Error, CMD_CAP>>,
    message_channel: Option<&'a Channel<CriticalSectionRawMutex, TpMessage, MSG_CAP>>,
}

impl<'a, C, T, L, const CMD_CAP: usize, const MSG_CAP: usize>
    TransportRunner<'a, C, T, L, CMD_CAP, MSG_CAP>
where
    C: CanBus,
    C::Error: Debug,
    T: TpTimer,
    L: IsoTpLink,
    L::Error: Debug,
{
    /// Run cycles for the lifetime of the process.
    pub async fn drive(mut self) {
        loop {
            self.cycle().await;
        }
    }

    /// Apply pending send requests, run one adapter cycle, publish its message.
    pub async fn cycle(&mut self) -> CycleReport {
        if let Some(queue) = self.send_queue {
            while let Ok(command) = queue.commands.try_receive() {
                self.apply(queue, command);
            }
        }

        let report = self.adapter.run_cycle().await;

        if let (Some(message), Some(channel)) = (&report.message, self.message_channel) {
            if let Err(TrySendError::Full(_)) = channel.try_send(message.clone()) {
                #[cfg(feature = "defmt")]
                defmt::warn!("Message channel full, dropping {} bytes", message.len);
                self.adapter.record_dropped_message();
            }
        }
        report
    }

    pub fn adapter(&self) -> &TransportAdapter<C, T, L> {
        &self.adapter
    }

    fn apply(&mut self, queue: &SendQueue<L::Error, CMD_CAP>, command: AdapterCommand) {
        match command {
            AdapterCommand::Send {
                seq,
                slot,
                len,
                payload,
            } => {
                let result = self.adapter.send(&payload[..len]);
                match queue.replies.get(slot) {
                    Some(reply) => reply.signal(SendReply { seq, result }),
                    None => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("Send reply #{} has no slot {}", seq, slot);
                    }
                }
            }
        }
    }
}

/// Send handle (optional). Clones share the queue of the service.
pub struct TransportHandle<'a, E: Debug, const CMD_CAP: usize> {
    queue: &'a SendQueue<E, CMD_CAP>,
}

impl<E: Debug, const CMD_CAP: usize> Clone for TransportHandle<'_, E, CMD_CAP> {
    fn clone(&self) -> Self {
        Self { queue: self.queue }
    }
}

impl<'a, E: Debug, const CMD_CAP: usize> TransportHandle<'a, E, CMD_CAP> {
    /// Queue `payload` and wait until the link accepted or refused it.
    ///
    /// Completion of the segmented transfer itself is observed through the
    /// adapter state, not through this call.
    pub async fn send(&self, payload: &[u8]) -> Result<(), AdapterSendError<E>> {
        validate_payload(payload)?;

        let slot = self.queue.acquire_slot().await;
        // Slot indices are always below CMD_CAP.
        let reply = &self.queue.replies[slot.index];
        // Drop whatever a cancelled previous owner of the slot left behind.
        reply.reset();
        let seq = self.queue.take_seq();

        let mut buffer = [0u8; MAX_TP_MESSAGE_LEN];
        buffer[..payload.len()].copy_from_slice(payload);
        self.queue
            .commands
            .send(AdapterCommand::Send {
                seq,
                slot: slot.index,
                len: payload.len(),
                payload: buffer,
            })
            .await;

        loop {
            let answer = reply.wait().await;
            if answer.seq == seq {
                return answer.result;
            }
        }
    }
}

/// Optional receiver returning messages completed by the link.
pub struct TransportMessages<'a, const MSG_CAP: usize> {
    receiver: Receiver<'a, CriticalSectionRawMutex, TpMessage, MSG_CAP>,
}

impl<'a, const MSG_CAP: usize> TransportMessages<'a, MSG_CAP> {
    pub async fn recv(&mut self) -> TpMessage {
        self.receiver.receive().await
    }

    /// Non-blocking variant: `None` when nothing is waiting.
    pub fn try_recv(&mut self) -> Option<TpMessage> {
        self.receiver.try_receive().ok()
    }
}
