//! Raw multi-frame reassembler: concatenates the payloads of consecutive
//! frames sharing one identifier until a requested length is reached or the
//! total deadline expires. No header, no sequence numbers: bytes land in the
//! destination in the order the bus delivers them.
//!
//! A read that runs out of time is not an error: it returns the number of bytes
//! collected so far, and the caller compares it against the requested length.
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::error::{FrameIoError, ReadBytesError};
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::frame_port::FramePort;
use crate::protocol::transport::traits::{can_bus::CanBus, tp_timer::TpTimer};

//==================================================================================Session

/// State of one `read_bytes` call. Lives only for the duration of the call
/// when driven by [`read_bytes`], but can also be fed by hand.
#[derive(Debug)]
pub struct ReassemblySession<'b> {
    target: CanId,
    buffer: &'b mut [u8],
    requested: usize,
    filled: usize,
    deadline_ms: u64,
}

impl<'b> ReassemblySession<'b> {
    /// Start a session collecting `requested` bytes (clamped to the buffer size).
    pub fn new(target: CanId, buffer: &'b mut [u8], requested: usize, deadline_ms: u64) -> Self {
        let requested = requested.min(buffer.len());
        Self {
            target,
            buffer,
            requested,
            filled: 0,
            deadline_ms,
        }
    }

    /// Append the payload of `frame` if it carries the target identifier.
    ///
    /// Returns the number of bytes copied. The copy never exceeds the space left
    /// before the requested length, whatever the frame claims.
    pub fn absorb(&mut self, frame: &CanFrame) -> usize {
        if frame.id != self.target {
            #[cfg(feature = "defmt")]
            defmt::trace!("Reassembler: ignoring frame on {}", frame.id);
            return 0;
        }

        let copy_len = frame.payload().len().min(self.requested - self.filled);
        self.buffer[self.filled..self.filled + copy_len]
            .copy_from_slice(&frame.payload()[..copy_len]);
        self.filled += copy_len;
        copy_len
    }

    /// Bytes collected so far.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn is_complete(&self) -> bool {
        self.filled >= self.requested
    }

    /// Milliseconds left before the deadline, `0` once it has passed.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.deadline_ms.saturating_sub(now_ms)
    }

    /// Collected bytes.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.filled]
    }
}

//==================================================================================Cancellation

/// Cooperative cancellation for [`read_bytes_cancellable`].
///
/// `cancel()` from any task moves the pending read's deadline to "now": the read
/// returns the bytes collected so far. A cancel issued while no read is pending
/// is consumed by the next read; call [`ReadCancel::reset`] to discard it.
pub struct ReadCancel {
    signal: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for ReadCancel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadCancel {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Ask the pending read to stop.
    pub fn cancel(&self) {
        self.signal.signal(());
    }

    /// Drop a cancel request nobody consumed yet.
    pub fn reset(&self) {
        self.signal.reset();
    }

    async fn wait(&self) {
        self.signal.wait().await
    }
}

//==================================================================================Read Functions

/// Fill `buffer[..length]` from frames carrying `target`, waiting at most
/// `timeout_ms` in total.
///
/// Returns the number of bytes copied, which is `length` unless the deadline
/// passed or the bus went quiet first. Frames on other identifiers are skipped.
///
/// # Errors
///
/// - [`ReadBytesError::ZeroLength`] / [`ReadBytesError::BufferTooSmall`] before any I/O
/// - [`ReadBytesError::Driver`] when the driver fails mid-read (collected bytes are dropped)
pub async fn read_bytes<C: CanBus, T: TpTimer>(
    port: &mut FramePort<C, T>,
    target: CanId,
    buffer: &mut [u8],
    length: usize,
    timeout_ms: u32,
) -> Result<usize, ReadBytesError<C::Error>> {
    collect(port, target, buffer, length, timeout_ms, None).await
}

/// Same as [`read_bytes`], returning early with the partial count when `cancel` fires.
pub async fn read_bytes_cancellable<C: CanBus, T: TpTimer>(
    port: &mut FramePort<C, T>,
    target: CanId,
    buffer: &mut [u8],
    length: usize,
    timeout_ms: u32,
    cancel: &ReadCancel,
) -> Result<usize, ReadBytesError<C::Error>> {
    collect(port, target, buffer, length, timeout_ms, Some(cancel)).await
}

async fn collect<C: CanBus, T: TpTimer>(
    port: &mut FramePort<C, T>,
    target: CanId,
    buffer: &mut [u8],
    length: usize,
    timeout_ms: u32,
    cancel: Option<&ReadCancel>,
) -> Result<usize, ReadBytesError<C::Error>> {
    if length == 0 {
        return Err(ReadBytesError::ZeroLength);
    }
    if length > buffer.len() {
        return Err(ReadBytesError::BufferTooSmall {
            requested: length,
            capacity: buffer.len(),
        });
    }

    let deadline_ms = port.now_ms() + timeout_ms as u64;
    let mut session = ReassemblySession::new(target, buffer, length, deadline_ms);

    while !session.is_complete() {
        let remaining = session.remaining_ms(port.now_ms());
        if remaining == 0 {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "Reassembler: deadline reached with {}/{} bytes",
                session.filled(),
                length
            );
            break;
        }

        let step = {
            let recv = port.receive(remaining.min(u32::MAX as u64) as u32);
            let cancelled = async {
                match cancel {
                    Some(cancel) => cancel.wait().await,
                    None => core::future::pending::<()>().await,
                }
            };
            pin_mut!(recv);
            pin_mut!(cancelled);

            match select(recv, cancelled).await {
                Either::Left((result, _)) => Some(result),
                Either::Right(_) => None,
            }
        };

        match step {
            Some(Ok(frame)) => {
                session.absorb(&frame);
            }
            // The bus went quiet for the whole remaining window.
            Some(Err(FrameIoError::Timeout)) => break,
            Some(Err(FrameIoError::Driver(e))) => return Err(ReadBytesError::Driver(e)),
            None => {
                #[cfg(feature = "defmt")]
                defmt::debug!("Reassembler: read cancelled at {} bytes", session.filled());
                break;
            }
        }
    }

    Ok(session.filled())
}

//==================================================================================Text Helpers

/// Write a `0x00` end marker right after the collected bytes.
///
/// Display convenience only: the marker is not a length indicator since binary
/// payloads may contain zero bytes. Returns `false` when the buffer has no room
/// past `filled`.
pub fn nul_terminate(buffer: &mut [u8], filled: usize) -> bool {
    match buffer.get_mut(filled) {
        Some(slot) => {
            *slot = 0;
            true
        }
        None => false,
    }
}

/// View the collected bytes as text when they are valid UTF-8.
pub fn as_text(buffer: &[u8], filled: usize) -> Option<&str> {
    core::str::from_utf8(buffer.get(..filled)?).ok()
}
