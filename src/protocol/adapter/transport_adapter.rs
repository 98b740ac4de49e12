//! The adapter cycle: read one frame with a short timeout, feed the link when
//! the frame carries the inbound-control identifier, service the link on its
//! own cadence, flush the frames the link queued, drain a completed message,
//! then yield.
//!
//! The adapter exclusively owns the link. Other tasks reach it through
//! [`service`](super::service) rather than by sharing it.
use crate::error::{AdapterSendError, FrameIoError, RoleMappingError};
use crate::protocol::adapter::poll_cadence::PollCadence;
use crate::protocol::adapter::{
    AdapterConfig, AdapterState, AdapterStats, CycleReport, FrameDisposition, TpMessage,
};
use crate::protocol::transport::frame_port::FramePort;
use crate::protocol::transport::traits::{
    can_bus::CanBus,
    isotp_link::{IsoTpLink, SendStatus},
    tp_timer::TpTimer,
};
use crate::protocol::transport::MAX_TP_MESSAGE_LEN;

/// One adapter instance: frame port, link, cadence and counters.
pub struct TransportAdapter<C: CanBus, T: TpTimer, L: IsoTpLink> {
    port: FramePort<C, T>,
    link: L,
    config: AdapterConfig,
    cadence: PollCadence,
    state: AdapterState,
    stats: AdapterStats,
}

impl<C: CanBus, T: TpTimer, L: IsoTpLink> TransportAdapter<C, T, L>
where
    C::Error: core::fmt::Debug,
    L::Error: core::fmt::Debug,
{
    /// Take ownership of the port and the link.
    ///
    /// The link must already transmit on `config.roles.outbound_id`; its
    /// inbound-control identifier is overwritten with the one from `config`.
    pub fn new(
        port: FramePort<C, T>,
        mut link: L,
        config: AdapterConfig,
    ) -> Result<Self, RoleMappingError> {
        config.roles.validate()?;
        if link.outbound_id() != config.roles.outbound_id {
            return Err(RoleMappingError::OutboundMismatch {
                link: link.outbound_id(),
                expected: config.roles.outbound_id,
            });
        }
        link.set_inbound_control_id(config.roles.inbound_control_id);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Adapter ready: send ID={}, receive ID={}",
            config.roles.outbound_id,
            config.roles.inbound_control_id
        );

        Ok(Self {
            port,
            link,
            cadence: PollCadence::new(config.service_interval_ms),
            config,
            state: AdapterState::Idle,
            stats: AdapterStats::default(),
        })
    }

    /// Queue `payload` in the link for segmented transmission.
    ///
    /// Returns once the link accepted or refused the message; the frames
    /// themselves go out over the following cycles.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), AdapterSendError<L::Error>> {
        validate_payload(payload)?;

        self.link.send(payload).map_err(|e| {
            #[cfg(feature = "defmt")]
            defmt::error!("Link refused {} bytes: {:?}", payload.len(), defmt::Debug2Format(&e));
            AdapterSendError::Protocol(e)
        })?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Message queued for transmission ({} bytes)", payload.len());

        self.refresh_state();
        Ok(())
    }

    /// Run one cycle. Never fails: driver and transmit errors are counted and
    /// the next cycle starts fresh.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        // Step 1-2: bounded read, role filtering.
        match self.port.receive(self.config.recv_timeout_ms).await {
            Ok(frame) => {
                self.stats.frames_received = self.stats.frames_received.wrapping_add(1);
                if frame.id == self.config.roles.inbound_control_id {
                    let now = self.port.now_ms();
                    self.link.on_can_message(frame.payload(), now);
                    self.stats.frames_forwarded = self.stats.frames_forwarded.wrapping_add(1);
                    report.frame = FrameDisposition::Forwarded;
                    // Flow control answering a First Frame goes out right away.
                    report.transmitted += self.flush_outgoing().await;
                } else {
                    #[cfg(feature = "defmt")]
                    defmt::trace!("Dropping frame on foreign ID {}", frame.id);
                    self.stats.frames_discarded = self.stats.frames_discarded.wrapping_add(1);
                    report.frame = FrameDisposition::Discarded;
                }
            }
            Err(FrameIoError::Timeout) => {}
            Err(FrameIoError::Driver(_e)) => {
                // Transient: the next cycle reads again.
                self.stats.receive_errors = self.stats.receive_errors.wrapping_add(1);
                report.frame = FrameDisposition::DriverError;
            }
        }

        // Step 3: service cadence, independent of frame arrival.
        let now = self.port.now_ms();
        if self.cadence.try_service(now) {
            self.link.poll(now);
            self.stats.polls = self.stats.polls.wrapping_add(1);
            report.serviced = true;
            report.transmitted += self.flush_outgoing().await;
        }

        // Step 4: non-blocking drain.
        report.message = self.drain_message();
        self.refresh_state();

        // Step 5: yield.
        self.port.sleep_ms(self.config.cycle_yield_ms).await;
        report
    }

    /// Run cycles forever, handing each completed message to `deliver`.
    pub async fn run<F: FnMut(&TpMessage)>(&mut self, mut deliver: F) {
        loop {
            let report = self.run_cycle().await;
            if let Some(message) = report.message {
                deliver(&message);
            }
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    pub fn stats(&self) -> &AdapterStats {
        &self.stats
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn cadence(&self) -> &PollCadence {
        &self.cadence
    }

    /// Read access to the link (status, diagnostics).
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Give the port and the link back.
    pub fn release(self) -> (FramePort<C, T>, L) {
        (self.port, self.link)
    }

    pub(crate) fn record_dropped_message(&mut self) {
        self.stats.messages_dropped = self.stats.messages_dropped.wrapping_add(1);
    }

    /// Transmit every frame the link queued. Failures are counted, not retried:
    /// the link's own timers handle a peer that never saw the frame.
    async fn flush_outgoing(&mut self) -> usize {
        let mut sent = 0;
        while let Some(frame) = self.link.next_outgoing() {
            match self.port.transmit(&frame, self.config.send_timeout_ms).await {
                Ok(()) => {
                    sent += 1;
                    self.stats.frames_transmitted = self.stats.frames_transmitted.wrapping_add(1);
                }
                Err(_e) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "Failed to transmit link frame on {}: {:?}",
                        frame.id,
                        defmt::Debug2Format(&_e)
                    );
                    self.stats.transmit_failures = self.stats.transmit_failures.wrapping_add(1);
                }
            }
        }
        sent
    }

    fn drain_message(&mut self) -> Option<TpMessage> {
        let mut message = TpMessage::new();
        let len = self.link.receive(&mut message.payload)?;
        message.len = len.min(MAX_TP_MESSAGE_LEN);
        self.stats.messages_received = self.stats.messages_received.wrapping_add(1);

        #[cfg(feature = "defmt")]
        defmt::info!("Message complete: {} bytes", message.len);
        Some(message)
    }

    fn refresh_state(&mut self) {
        let next = match self.link.send_status() {
            SendStatus::InProgress => AdapterState::Servicing,
            SendStatus::Idle | SendStatus::Error => AdapterState::Idle,
        };
        if next == self.state {
            return;
        }

        #[cfg(feature = "defmt")]
        {
            match (next, self.link.send_status()) {
                (AdapterState::Servicing, _) => defmt::debug!("Adapter servicing a segmented send"),
                (AdapterState::Idle, SendStatus::Error) => {
                    defmt::warn!("Segmented send aborted by the link")
                }
                (AdapterState::Idle, _) => defmt::debug!("Segmented send complete"),
            }
        }

        self.state = next;
    }
}

/// Input checks shared by the adapter and the service handle.
pub(crate) fn validate_payload<E: core::fmt::Debug>(
    payload: &[u8],
) -> Result<(), AdapterSendError<E>> {
    if payload.is_empty() {
        return Err(AdapterSendError::EmptyPayload);
    }
    if payload.len() > MAX_TP_MESSAGE_LEN {
        return Err(AdapterSendError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_TP_MESSAGE_LEN,
        });
    }
    Ok(())
}
