//! # Raw Reassembly Example
//!
//! Desktop walk-through of the simple reassembler:
//! - An in-memory bus stands in for the CAN controller
//! - A peer task streams a text message in 8-byte frames, mixed with noise
//! - `read_bytes` collects the message and the text helpers display it
//!
//! ```bash
//! cargo run --example read_bytes
//! ```

use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};
use twai_tp::protocol::transport::can_frame::CanFrame;
use twai_tp::protocol::transport::can_id::CanId;
use twai_tp::protocol::transport::frame_port::FramePort;
use twai_tp::protocol::transport::reassembler::{as_text, nul_terminate, read_bytes};
use twai_tp::protocol::transport::traits::{can_bus::CanBus, tp_timer::TpTimer};
use twai_tp::protocol::transport::REFERENCE_PAYLOAD_ID;

/// Receive-only bus fed by a tokio channel.
struct ChannelBus {
    rx: mpsc::UnboundedReceiver<CanFrame>,
}

impl CanBus for ChannelBus {
    type Error = &'static str;

    async fn send<'a>(&'a mut self, _frame: &'a CanFrame) -> Result<(), Self::Error> {
        Err("demo bus is receive-only")
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        self.rx.recv().await.ok_or("peer disconnected")
    }
}

struct TokioTimer {
    origin: Instant,
}

impl TpTimer for TokioTimer {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

#[tokio::main]
async fn main() {
    println!("=== twai-tp raw reassembly ===\n");

    let message = b"Hello from the other side of the bus!";
    let noise_id = CanId::standard(0x100).expect("valid standard identifier");

    // ======================================================================
    // 1. Peer: stream the message, interleaved with unrelated traffic
    // ======================================================================
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        for chunk in message.chunks(8) {
            let _ = tx.send(CanFrame::new(noise_id, &[0xEE; 8]));
            let _ = tx.send(CanFrame::new(REFERENCE_PAYLOAD_ID, chunk));
            sleep(Duration::from_millis(20)).await;
        }
        // Keep the bus open so the reader ends on its own deadline.
        sleep(Duration::from_secs(5)).await;
    });

    // ======================================================================
    // 2. Collect the bytes on 0x789
    // ======================================================================
    let mut port = FramePort::new(
        ChannelBus { rx },
        TokioTimer {
            origin: Instant::now(),
        },
    );

    let mut buffer = [0u8; 64];
    let requested = message.len() + 8;
    println!(
        "1. Reading up to {} bytes on ID {:#X} (timeout 1000 ms)",
        requested,
        REFERENCE_PAYLOAD_ID.raw()
    );

    match read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, requested, 1_000).await {
        Ok(filled) => {
            println!("   Received {} of {} bytes", filled, requested);
            if filled < requested {
                println!("   (peer went quiet before the requested length)");
            }

            // ==============================================================
            // 3. Opt-in display helpers
            // ==============================================================
            print!("   Payload: ");
            for byte in &buffer[..filled] {
                print!("{:02X} ", byte);
            }
            println!();

            nul_terminate(&mut buffer, filled);
            match as_text(&buffer, filled) {
                Some(text) => println!("   Text: {:?}", text),
                None => println!("   Payload is not valid UTF-8"),
            }
        }
        Err(e) => eprintln!("   Read failed: {:?}", e),
    }
}
