//! # Adapter Loop Example
//!
//! Two adapters talking over an in-memory bus:
//! - The sender queues a message in its link and services it with `run`
//! - The receiver answers the first frame with flow control and hands the
//!   completed message to its `run` callback
//! - Both loops keep going until the message shows up on the application side
//!
//! ```bash
//! cargo run --example adapter_loop
//! ```

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};
use twai_tp::protocol::adapter::transport_adapter::TransportAdapter;
use twai_tp::protocol::adapter::{AdapterConfig, RoleMapping, TpMessage};
use twai_tp::protocol::transport::can_frame::CanFrame;
use twai_tp::protocol::transport::can_id::CanId;
use twai_tp::protocol::transport::frame_port::FramePort;
use twai_tp::protocol::transport::traits::{
    can_bus::CanBus,
    isotp_link::{IsoTpLink, SendStatus},
    tp_timer::TpTimer,
};

/// One node on a two-node bus backed by tokio channels.
struct ChannelBus {
    tx: mpsc::UnboundedSender<CanFrame>,
    rx: mpsc::UnboundedReceiver<CanFrame>,
}

impl ChannelBus {
    fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

impl CanBus for ChannelBus {
    type Error = &'static str;

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.tx.send(*frame).map_err(|_| "peer disconnected")
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        self.rx.recv().await.ok_or("peer disconnected")
    }
}

struct TokioTimer {
    origin: Instant,
}

impl TokioTimer {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TpTimer for TokioTimer {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

const CLEAR_TO_SEND: u8 = 0x30;
const MORE: u8 = 0x00;
const LAST: u8 = 0x01;

/// Toy segmenting link: one header byte plus 7 data bytes per frame.
///
/// The first frame goes out alone; the rest waits for the peer's
/// clear-to-send and leaves one frame per service call.
struct ToyLink {
    outbound: CanId,
    inbound: CanId,
    pending: VecDeque<CanFrame>,
    outgoing: VecDeque<CanFrame>,
    first_sent: bool,
    clear_to_send: bool,
    status: SendStatus,
    assembling: Vec<u8>,
    inbox: Option<Vec<u8>>,
}

impl ToyLink {
    fn new(outbound: CanId) -> Self {
        Self {
            outbound,
            inbound: outbound,
            pending: VecDeque::new(),
            outgoing: VecDeque::new(),
            first_sent: false,
            clear_to_send: false,
            status: SendStatus::Idle,
            assembling: Vec::new(),
            inbox: None,
        }
    }
}

impl IsoTpLink for ToyLink {
    type Error = &'static str;

    fn outbound_id(&self) -> CanId {
        self.outbound
    }

    fn inbound_control_id(&self) -> CanId {
        self.inbound
    }

    fn set_inbound_control_id(&mut self, id: CanId) {
        self.inbound = id;
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), Self::Error> {
        if self.status == SendStatus::InProgress {
            return Err("transfer in progress");
        }
        let chunks = payload.chunks(7);
        let count = chunks.len();
        for (index, chunk) in chunks.enumerate() {
            let mut data = [0u8; 8];
            data[0] = if index + 1 == count { LAST } else { MORE };
            data[1..=chunk.len()].copy_from_slice(chunk);
            self.pending
                .push_back(CanFrame::new(self.outbound, &data[..=chunk.len()]));
        }
        self.first_sent = false;
        self.clear_to_send = false;
        self.status = SendStatus::InProgress;
        Ok(())
    }

    fn on_can_message(&mut self, data: &[u8], _now_ms: u64) {
        let Some((&header, body)) = data.split_first() else {
            return;
        };
        if header == CLEAR_TO_SEND {
            self.clear_to_send = true;
            return;
        }
        if self.assembling.is_empty() {
            self.outgoing
                .push_back(CanFrame::new(self.outbound, &[CLEAR_TO_SEND]));
        }
        self.assembling.extend_from_slice(body);
        if header == LAST {
            self.inbox = Some(std::mem::take(&mut self.assembling));
        }
    }

    fn poll(&mut self, _now_ms: u64) {
        if self.first_sent && !self.clear_to_send {
            return;
        }
        if let Some(frame) = self.pending.pop_front() {
            self.outgoing.push_back(frame);
            self.first_sent = true;
        }
        if self.pending.is_empty() {
            self.status = SendStatus::Idle;
        }
    }

    fn next_outgoing(&mut self) -> Option<CanFrame> {
        self.outgoing.pop_front()
    }

    fn receive(&mut self, dest: &mut [u8]) -> Option<usize> {
        let message = self.inbox.take()?;
        let len = message.len().min(dest.len());
        dest[..len].copy_from_slice(&message[..len]);
        Some(len)
    }

    fn send_status(&self) -> SendStatus {
        self.status
    }
}

#[tokio::main]
async fn main() {
    println!("=== twai-tp adapter loop ===\n");

    // ======================================================================
    // 1. Two nodes on one bus, reference identifiers
    // ======================================================================
    let (sender_bus, receiver_bus) = ChannelBus::pair();

    let sender_roles = RoleMapping::reference_sender();
    let mut sender = TransportAdapter::new(
        FramePort::new(sender_bus, TokioTimer::new()),
        ToyLink::new(sender_roles.outbound_id),
        AdapterConfig::new(sender_roles),
    )
    .expect("sender roles are consistent");

    let receiver_roles = RoleMapping::reference_receiver();
    let mut receiver = TransportAdapter::new(
        FramePort::new(receiver_bus, TokioTimer::new()),
        ToyLink::new(receiver_roles.outbound_id),
        AdapterConfig::new(receiver_roles),
    )
    .expect("receiver roles are consistent");

    println!(
        "1. Sender on {:#X}, receiver on {:#X}",
        sender_roles.outbound_id.raw(),
        receiver_roles.outbound_id.raw()
    );

    // ======================================================================
    // 2. Queue a message longer than one frame
    // ======================================================================
    let message = b"Segmented over the bus, reassembled on the other side.";
    sender.send(message).expect("link accepts the message");
    println!("2. Queued {} bytes", message.len());

    // ======================================================================
    // 3. Run both adapters until the receiver delivers
    // ======================================================================
    let (delivered_tx, mut delivered_rx) = mpsc::unbounded_channel::<TpMessage>();

    tokio::select! {
        _ = sender.run(|_| {}) => {}
        _ = receiver.run(|m| {
            let _ = delivered_tx.send(m.clone());
        }) => {}
        Some(delivered) = delivered_rx.recv() => {
            println!("3. Delivered {} bytes", delivered.len);
            match core::str::from_utf8(delivered.as_slice()) {
                Ok(text) => println!("   Text: {:?}", text),
                Err(_) => println!("   Payload is not valid UTF-8"),
            }
        }
        _ = sleep(Duration::from_secs(2)) => {
            eprintln!("3. No message after 2 s");
        }
    }

    // ======================================================================
    // 4. Counters
    // ======================================================================
    println!("\n4. Sender stats:   {:?}", sender.stats());
    println!("   Receiver stats: {:?}", receiver.stats());
}
