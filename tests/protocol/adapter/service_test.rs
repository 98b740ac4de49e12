mod helpers {
    include!("../../helpers/mod.rs");
}

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use helpers::{LinkError, MockCanBus, MockTimer, ScriptedLink};
use static_cell::StaticCell;
use tokio::time::{sleep, Duration};
use twai_tp::error::AdapterSendError;
use twai_tp::protocol::adapter::service::{SendQueue, TransportService};
use twai_tp::protocol::adapter::transport_adapter::TransportAdapter;
use twai_tp::protocol::adapter::{AdapterConfig, RoleMapping, TpMessage};
use twai_tp::protocol::transport::frame_port::FramePort;
use twai_tp::protocol::transport::{MAX_TP_MESSAGE_LEN, REFERENCE_PAYLOAD_ID};

type Adapter = TransportAdapter<MockCanBus, MockTimer, ScriptedLink>;

static SEND_QUEUE: StaticCell<SendQueue<LinkError, 4>> = StaticCell::new();
static SHARED_QUEUE: StaticCell<SendQueue<LinkError, 2>> = StaticCell::new();
static REJECT_QUEUE: StaticCell<SendQueue<LinkError, 4>> = StaticCell::new();
static MESSAGE_CHANNEL: StaticCell<Channel<CriticalSectionRawMutex, TpMessage, 4>> =
    StaticCell::new();
static SMALL_CHANNEL: StaticCell<Channel<CriticalSectionRawMutex, TpMessage, 1>> =
    StaticCell::new();

fn adapter_for(roles: RoleMapping) -> (Adapter, MockCanBus) {
    let (dut_bus, host_bus) = MockCanBus::create_pair();
    let port = FramePort::new(dut_bus, MockTimer::new());
    let link = ScriptedLink::new(roles.outbound_id, MAX_TP_MESSAGE_LEN);
    let adapter = TransportAdapter::new(port, link, AdapterConfig::new(roles)).unwrap();
    (adapter, host_bus)
}

#[tokio::test(start_paused = true)]
async fn handle_queues_sends_and_reports_link_verdict() {
    let send_queue = SEND_QUEUE.init(SendQueue::new());
    let (adapter, host_bus) = adapter_for(RoleMapping::reference_sender());

    let service = TransportService::<_, _, _, 4, 0>::new(adapter, Some(&*send_queue), None);
    let parts = service.into_parts();
    let handle = parts
        .handle
        .expect("handle must exist when a send queue is provided");
    assert!(parts.messages.is_none());
    let runner_future = parts.runner.drive();

    tokio::select! {
        _ = runner_future => {
            panic!("runner ended unexpectedly");
        }
        _ = async {
            handle
                .send(&[0x42; 20])
                .await
                .expect("link must accept the first message");

            // Still in flight: the link refuses a second transfer.
            let refused = handle.send(&[0x43; 4]).await;
            assert!(matches!(refused, Err(AdapterSendError::Protocol(LinkError::Busy))));

            sleep(Duration::from_millis(200)).await;
            let frames = host_bus.drain().await;
            assert_eq!(frames.len(), 3);
            assert!(frames.iter().all(|f| f.id == REFERENCE_PAYLOAD_ID));

            // Transfer done: the next one is accepted again.
            handle.send(&[0x44; 4]).await.expect("link idle again");
        } => {}
    }
}

#[tokio::test(start_paused = true)]
async fn cloned_handles_each_get_their_own_verdict() {
    let send_queue = SHARED_QUEUE.init(SendQueue::new());
    let (adapter, host_bus) = adapter_for(RoleMapping::reference_sender());

    let service = TransportService::<_, _, _, 2, 0>::new(adapter, Some(&*send_queue), None);
    let parts = service.into_parts();
    let first = parts.handle.expect("handle must exist when a send queue is provided");
    let second = first.clone();
    let third = first.clone();
    let runner_future = parts.runner.drive();

    tokio::select! {
        _ = runner_future => {
            panic!("runner ended unexpectedly");
        }
        _ = async {
            // Three requests for two reply slots: the third waits for a free one.
            let results = tokio::join!(
                first.send(&[0x51; 64]),
                second.send(&[0x52; 64]),
                third.send(&[0x53; 64]),
            );
            let results = [results.0, results.1, results.2];

            let accepted = results.iter().filter(|r| r.is_ok()).count();
            let busy = results
                .iter()
                .filter(|r| matches!(r, Err(AdapterSendError::Protocol(LinkError::Busy))))
                .count();
            assert_eq!(accepted, 1);
            assert_eq!(busy, 2);

            sleep(Duration::from_millis(300)).await;
            let frames = host_bus.drain().await;
            assert_eq!(frames.len(), 8);

            // Every slot is back in the pool.
            second.send(&[0x54; 4]).await.expect("link idle again");
        } => {}
    }
}

#[tokio::test(start_paused = true)]
async fn handle_rejects_invalid_payloads_without_the_runner() {
    let send_queue = REJECT_QUEUE.init(SendQueue::new());
    let (adapter, _host_bus) = adapter_for(RoleMapping::reference_sender());

    let service = TransportService::<_, _, _, 4, 0>::new(adapter, Some(&*send_queue), None);
    let handle = service.into_parts().handle.unwrap();

    assert!(matches!(handle.send(&[]).await, Err(AdapterSendError::EmptyPayload)));
    let oversized = [0u8; MAX_TP_MESSAGE_LEN + 1];
    assert!(matches!(
        handle.send(&oversized).await,
        Err(AdapterSendError::PayloadTooLarge { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn completed_messages_reach_the_message_channel() {
    let message_channel = MESSAGE_CHANNEL.init(Channel::new());
    let (adapter, host_bus) = adapter_for(RoleMapping::reference_receiver());

    let service = TransportService::<_, _, _, 0, 4>::new(adapter, None, Some(&*message_channel));
    let parts = service.into_parts();
    assert!(parts.handle.is_none());
    let mut messages = parts.messages.expect("message receiver must exist");
    let runner_future = parts.runner.drive();

    tokio::select! {
        _ = runner_future => {
            panic!("runner ended unexpectedly");
        }
        _ = async {
            host_bus.inject(REFERENCE_PAYLOAD_ID, b"ISO-TP h");
            host_bus.inject(REFERENCE_PAYLOAD_ID, b"ello");

            let message = messages.recv().await;
            assert_eq!(message.as_slice(), b"ISO-TP hello");
        } => {}
    }
}

#[tokio::test(start_paused = true)]
async fn full_message_channel_drops_instead_of_blocking() {
    let message_channel = SMALL_CHANNEL.init(Channel::new());
    let (adapter, host_bus) = adapter_for(RoleMapping::reference_receiver());

    let service = TransportService::<_, _, _, 0, 1>::new(adapter, None, Some(&*message_channel));
    let parts = service.into_parts();
    let mut messages = parts.messages.unwrap();
    let mut runner = parts.runner;

    host_bus.inject(REFERENCE_PAYLOAD_ID, &[1, 1]);
    assert!(runner.cycle().await.message.is_some());
    host_bus.inject(REFERENCE_PAYLOAD_ID, &[2, 2]);
    assert!(runner.cycle().await.message.is_some());

    assert_eq!(runner.adapter().stats().messages_dropped, 1);
    assert_eq!(messages.try_recv().map(|m| m.len), Some(2));
    assert_eq!(messages.try_recv().map(|m| m.payload[0]), None);
}
