mod helpers {
    include!("../../helpers/mod.rs");
}

use helpers::{std_id, MockBusError, MockCanBus, MockTimer};
use tokio::time::{Duration, Instant};
use twai_tp::error::FrameIoError;
use twai_tp::protocol::transport::frame_port::FramePort;

#[tokio::test(start_paused = true)]
async fn send_truncates_payload_to_eight_bytes() {
    let (dut_bus, host_bus) = MockCanBus::create_pair();
    let mut port = FramePort::new(dut_bus, MockTimer::new());

    let payload: Vec<u8> = (0u8..12).collect();
    port.send(std_id(0x789), &payload, 100)
        .await
        .expect("send must succeed");

    let frames = host_bus.drain().await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].id, std_id(0x789));
    assert_eq!(frames[0].len, 8);
    assert_eq!(frames[0].payload(), &payload[..8]);
}

#[tokio::test(start_paused = true)]
async fn send_copies_payload_before_returning() {
    let (dut_bus, host_bus) = MockCanBus::create_pair();
    let mut port = FramePort::new(dut_bus, MockTimer::new());

    let mut payload = [0x11u8, 0x22, 0x33];
    port.send(std_id(0x100), &payload, 100).await.unwrap();
    payload.fill(0xFF);

    let frames = host_bus.drain().await;
    assert_eq!(frames[0].payload(), &[0x11, 0x22, 0x33]);
}

#[tokio::test(start_paused = true)]
async fn send_times_out_on_a_stalled_driver() {
    let (dut_bus, _host_bus) = MockCanBus::create_pair();
    dut_bus.stall_sends(true);
    let mut port = FramePort::new(dut_bus, MockTimer::new());

    let start = Instant::now();
    let result = port.send(std_id(0x100), &[1, 2, 3], 100).await;

    assert!(matches!(result, Err(FrameIoError::Timeout)));
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn send_reports_driver_failure() {
    let (dut_bus, _host_bus) = MockCanBus::create_pair();
    dut_bus.fail_next_send(1);
    let mut port = FramePort::new(dut_bus, MockTimer::new());

    let result = port.send(std_id(0x100), &[1], 100).await;
    assert!(matches!(result, Err(FrameIoError::Driver(MockBusError::Injected))));
    // The failure was one-shot.
    assert!(port.send(std_id(0x100), &[1], 100).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn receive_times_out_when_bus_is_quiet() {
    let (dut_bus, _host_bus) = MockCanBus::create_pair();
    let mut port = FramePort::new(dut_bus, MockTimer::new());

    let start = Instant::now();
    let result = port.receive(50).await;

    assert!(result.as_ref().is_err_and(|e| e.is_timeout()));
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn receive_returns_frame_in_arrival_order() {
    let (dut_bus, host_bus) = MockCanBus::create_pair();
    let mut port = FramePort::new(dut_bus, MockTimer::new());

    host_bus.inject(std_id(0x789), &[1, 2]);
    host_bus.inject(std_id(0x787), &[3]);

    let first = port.receive(10).await.unwrap();
    let second = port.receive(10).await.unwrap();
    assert_eq!((first.id, first.payload()), (std_id(0x789), &[1u8, 2][..]));
    assert_eq!((second.id, second.payload()), (std_id(0x787), &[3u8][..]));
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_is_a_non_blocking_poll() {
    let (dut_bus, host_bus) = MockCanBus::create_pair();
    let mut port = FramePort::new(dut_bus, MockTimer::new());

    assert!(matches!(port.receive(0).await, Err(FrameIoError::Timeout)));

    host_bus.inject(std_id(0x789), &[0xAA]);
    let frame = port.receive(0).await.expect("queued frame must be returned");
    assert_eq!(frame.payload(), &[0xAA]);
}

#[tokio::test(start_paused = true)]
async fn receive_reports_driver_failure() {
    let (dut_bus, _host_bus) = MockCanBus::create_pair();
    dut_bus.fail_next_recv(1);
    let mut port = FramePort::new(dut_bus, MockTimer::new());

    assert!(matches!(
        port.receive(10).await,
        Err(FrameIoError::Driver(MockBusError::Injected))
    ));
}
