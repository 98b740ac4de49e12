mod helpers {
    include!("../../helpers/mod.rs");
}

use helpers::{std_id, MockBusError, MockCanBus, MockTimer};
use tokio::time::{sleep, Duration, Instant};
use twai_tp::error::ReadBytesError;
use twai_tp::protocol::transport::frame_port::FramePort;
use twai_tp::protocol::transport::reassembler::{
    as_text, nul_terminate, read_bytes, read_bytes_cancellable, ReadCancel,
};
use twai_tp::protocol::transport::REFERENCE_PAYLOAD_ID;

fn port_pair() -> (FramePort<MockCanBus, MockTimer>, MockCanBus) {
    let (dut_bus, host_bus) = MockCanBus::create_pair();
    (FramePort::new(dut_bus, MockTimer::new()), host_bus)
}

#[tokio::test(start_paused = true)]
async fn three_frames_fill_the_requested_length() {
    let (mut port, host_bus) = port_pair();
    let first: Vec<u8> = (0..8).collect();
    let second: Vec<u8> = (8..16).collect();
    let third: Vec<u8> = (16..20).collect();
    host_bus.inject(REFERENCE_PAYLOAD_ID, &first);
    host_bus.inject(REFERENCE_PAYLOAD_ID, &second);
    host_bus.inject(REFERENCE_PAYLOAD_ID, &third);

    let mut buffer = [0u8; 64];
    let filled = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 20, 5_000)
        .await
        .expect("read must succeed");

    assert_eq!(filled, 20);
    let expected: Vec<u8> = (0..20).collect();
    assert_eq!(&buffer[..20], &expected[..]);
    // The core never writes past the data.
    assert!(buffer[20..].iter().all(|&b| b == 0));
}

#[tokio::test(start_paused = true)]
async fn silence_returns_the_partial_count() {
    let (mut port, host_bus) = port_pair();
    host_bus.inject(REFERENCE_PAYLOAD_ID, &[7; 8]);

    let start = Instant::now();
    let mut buffer = [0u8; 16];
    let filled = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 10, 500)
        .await
        .expect("a timeout is not an error");

    assert_eq!(filled, 8);
    assert_eq!(&buffer[..8], &[7; 8]);
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn nothing_received_returns_zero() {
    let (mut port, _host_bus) = port_pair();
    let mut buffer = [0u8; 8];
    let filled = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 8, 100)
        .await
        .unwrap();
    assert_eq!(filled, 0);
}

#[tokio::test(start_paused = true)]
async fn foreign_identifiers_are_skipped() {
    let (mut port, host_bus) = port_pair();
    host_bus.inject(std_id(0x787), &[0xEE; 8]);
    host_bus.inject(REFERENCE_PAYLOAD_ID, &[1, 2, 3, 4]);
    host_bus.inject(std_id(0x100), &[0xEE; 8]);
    host_bus.inject(REFERENCE_PAYLOAD_ID, &[5, 6, 7, 8]);

    let mut buffer = [0u8; 8];
    let filled = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 8, 1_000)
        .await
        .unwrap();

    assert_eq!(filled, 8);
    assert_eq!(buffer, [1, 2, 3, 4, 5, 6, 7, 8]);
}

#[tokio::test(start_paused = true)]
async fn foreign_traffic_does_not_end_the_read_early() {
    let (mut port, host_bus) = port_pair();

    let producer = async {
        for _ in 0..5 {
            host_bus.inject(std_id(0x100), &[0xEE; 8]);
            sleep(Duration::from_millis(50)).await;
        }
        host_bus.inject(REFERENCE_PAYLOAD_ID, &[9; 4]);
    };

    let mut buffer = [0u8; 4];
    let (result, _) = tokio::join!(
        read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 4, 1_000),
        producer
    );

    assert_eq!(result.unwrap(), 4);
    assert_eq!(buffer, [9; 4]);
}

#[tokio::test(start_paused = true)]
async fn last_frame_is_clamped_to_the_requested_length() {
    let (mut port, host_bus) = port_pair();
    host_bus.inject(REFERENCE_PAYLOAD_ID, &[1; 8]);
    host_bus.inject(REFERENCE_PAYLOAD_ID, &[2; 8]);

    let mut buffer = [0xFFu8; 12];
    let filled = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 10, 1_000)
        .await
        .unwrap();

    assert_eq!(filled, 10);
    assert_eq!(&buffer[..10], &[1, 1, 1, 1, 1, 1, 1, 1, 2, 2]);
    assert_eq!(&buffer[10..], &[0xFF, 0xFF]);
}

#[tokio::test(start_paused = true)]
async fn zero_length_is_rejected_without_io() {
    let (mut port, host_bus) = port_pair();
    host_bus.inject(REFERENCE_PAYLOAD_ID, &[1, 2, 3]);

    let mut buffer = [0u8; 8];
    let result = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 0, 1_000).await;
    assert!(matches!(result, Err(ReadBytesError::ZeroLength)));

    // The queued frame was not consumed.
    let frame = port.receive(0).await.unwrap();
    assert_eq!(frame.payload(), &[1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn length_beyond_buffer_is_rejected() {
    let (mut port, _host_bus) = port_pair();
    let mut buffer = [0u8; 8];
    let result = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 9, 1_000).await;
    assert!(matches!(
        result,
        Err(ReadBytesError::BufferTooSmall {
            requested: 9,
            capacity: 8
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn driver_failure_aborts_the_read() {
    let (mut port, host_bus) = port_pair();
    host_bus.inject(REFERENCE_PAYLOAD_ID, &[1; 8]);

    let (dut_bus, timer) = port.into_inner();
    dut_bus.fail_next_recv(1);
    let mut port = FramePort::new(dut_bus, timer);

    let mut buffer = [0u8; 16];
    let result = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 16, 1_000).await;
    assert!(matches!(result, Err(ReadBytesError::Driver(MockBusError::Injected))));
}

#[tokio::test(start_paused = true)]
async fn cancel_returns_bytes_collected_so_far() {
    let (mut port, host_bus) = port_pair();
    let cancel = ReadCancel::new();

    host_bus.inject(REFERENCE_PAYLOAD_ID, &[4; 8]);
    let canceller = async {
        sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    };

    let start = Instant::now();
    let mut buffer = [0u8; 32];
    let (result, _) = tokio::join!(
        read_bytes_cancellable(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 32, 5_000, &cancel),
        canceller
    );

    assert_eq!(result.unwrap(), 8);
    assert!(start.elapsed() < Duration::from_millis(5_000));
}

#[tokio::test(start_paused = true)]
async fn reset_discards_a_stale_cancel() {
    let (mut port, host_bus) = port_pair();
    let cancel = ReadCancel::new();
    cancel.cancel();
    cancel.reset();

    host_bus.inject(REFERENCE_PAYLOAD_ID, &[1; 4]);
    let mut buffer = [0u8; 4];
    let filled =
        read_bytes_cancellable(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 4, 1_000, &cancel)
            .await
            .unwrap();
    assert_eq!(filled, 4);
}

#[tokio::test(start_paused = true)]
async fn text_helpers_are_opt_in() {
    let (mut port, host_bus) = port_pair();
    host_bus.inject(REFERENCE_PAYLOAD_ID, b"Hello, w");
    host_bus.inject(REFERENCE_PAYLOAD_ID, b"orld");

    let mut buffer = [0xFFu8; 16];
    let filled = read_bytes(&mut port, REFERENCE_PAYLOAD_ID, &mut buffer, 15, 200)
        .await
        .unwrap();

    assert_eq!(filled, 12);
    assert_eq!(buffer[12], 0xFF);
    assert!(nul_terminate(&mut buffer, filled));
    assert_eq!(buffer[12], 0x00);
    assert_eq!(as_text(&buffer, filled), Some("Hello, world"));
}
