use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use shmframe::{CancelToken, Consumer, Error, FrameChannel, HandshakeState, Producer, Wait};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_name(tag: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("/shmframe_test_{}_{}_{}", tag, std::process::id(), n)
}

#[test]
fn full_cycle_ends_idle() {
    let name = unique_name("cycle");
    let mut producer = FrameChannel::create(&name, 1000).unwrap();
    let mut consumer = FrameChannel::attach(&name).unwrap();

    let payload: Vec<u8> = (0..500).map(|i| (i % 251) as u8).collect();
    producer.write_frame(&payload, 10, 10, 3).unwrap();
    producer.signal_ready().unwrap();
    assert_eq!(consumer.state().unwrap(), HandshakeState::Pending);

    assert!(consumer.wait_for_ready(Wait::Forever).unwrap());
    let frame = consumer.read_frame().unwrap();
    assert_eq!(frame.data, payload);
    assert_eq!((frame.width, frame.height, frame.channels), (10, 10, 3));
    consumer.signal_done().unwrap();

    assert!(producer
        .wait_for_done(Wait::For(Duration::from_millis(1000)))
        .unwrap());
    assert_eq!(producer.state().unwrap(), HandshakeState::Idle);
    assert_eq!(consumer.state().unwrap(), HandshakeState::Idle);
}

#[test]
fn payload_at_capacity_round_trips() {
    let name = unique_name("full");
    let mut chan = FrameChannel::create(&name, 256).unwrap();
    let payload = vec![0xa5u8; 256];
    chan.write_frame(&payload, 16, 16, 1).unwrap();
    assert_eq!(chan.read_frame().unwrap().data, payload);
}

#[test]
fn oversized_payload_leaves_header_untouched() {
    let name = unique_name("oversize");
    let mut chan = FrameChannel::create(&name, 100).unwrap();
    let payload = vec![1u8; 101];
    match chan.write_frame(&payload, 1, 1, 1) {
        Err(Error::PayloadTooLarge { capacity, got }) => {
            assert_eq!(capacity, 100);
            assert_eq!(got, 101);
        }
        other => panic!("expected PayloadTooLarge, got {:?}", other),
    }
    let frame = chan.read_frame().unwrap();
    assert!(frame.is_empty());
    assert_eq!((frame.width, frame.height, frame.channels), (0, 0, 0));
    assert_eq!(chan.state().unwrap(), HandshakeState::Idle);
}

#[test]
fn bounded_wait_expires_with_state_untouched() {
    let name = unique_name("timeout");
    let mut chan = FrameChannel::create(&name, 64).unwrap();
    let timeout = Duration::from_millis(150);
    let start = Instant::now();
    assert!(!chan.wait_for_ready(Wait::For(timeout)).unwrap());
    assert!(start.elapsed() >= timeout);
    assert_eq!(chan.state().unwrap(), HandshakeState::Idle);
}

#[test]
fn read_before_any_write_is_empty() {
    let name = unique_name("empty");
    let mut creator = FrameChannel::create(&name, 64).unwrap();
    let mut attacher = FrameChannel::attach(&name).unwrap();
    assert!(attacher.read_frame().unwrap().is_empty());
    assert!(creator.read_frame().unwrap().is_empty());
}

#[test]
fn capacity_discovered_on_attach() {
    let name = unique_name("capacity");
    let creator = FrameChannel::create(&name, 4096).unwrap();
    let attacher = FrameChannel::attach(&name).unwrap();
    assert!(creator.is_creator());
    assert!(!attacher.is_creator());
    assert_eq!(attacher.capacity(), 4096);
}

#[test]
fn create_twice_fails_with_already_exists() {
    let name = unique_name("collision");
    let _first = FrameChannel::create(&name, 64).unwrap();
    match FrameChannel::create(&name, 64) {
        Err(Error::AlreadyExists { .. }) => (),
        other => panic!("expected AlreadyExists, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn attach_missing_fails_with_not_found() {
    match FrameChannel::attach(&unique_name("missing")) {
        Err(Error::NotFound { .. }) => (),
        other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn double_signal_ready_is_idempotent() {
    let name = unique_name("double");
    let mut producer = FrameChannel::create(&name, 64).unwrap();
    let mut consumer = FrameChannel::attach(&name).unwrap();

    producer.write_frame(&[7u8; 8], 2, 2, 2).unwrap();
    producer.signal_ready().unwrap();
    producer.signal_ready().unwrap();
    assert_eq!(producer.state().unwrap(), HandshakeState::Pending);

    // Exactly one logical frame comes out.
    assert!(consumer
        .wait_for_ready(Wait::For(Duration::from_millis(500)))
        .unwrap());
    assert_eq!(consumer.read_frame().unwrap().data, vec![7u8; 8]);
    consumer.signal_done().unwrap();
    assert_eq!(consumer.state().unwrap(), HandshakeState::Idle);
    assert!(!consumer
        .wait_for_ready(Wait::For(Duration::from_millis(100)))
        .unwrap());
}

#[test]
fn cycle_across_threads_with_blocking_waits() {
    let name = unique_name("threads");
    let mut producer = Producer::create(&name, 1 << 16).unwrap();

    let consumer_name = name.clone();
    let handle = thread::spawn(move || {
        let mut consumer = Consumer::attach(&consumer_name).unwrap();
        consumer.recv(Wait::Forever).unwrap()
    });

    let payload: Vec<u8> = (0..48_000u32).map(|i| (i % 256) as u8).collect();
    producer.send(&payload, 160, 100, 3, Wait::Forever).unwrap();

    let frame = handle.join().unwrap();
    assert_eq!(frame.data, payload);
    assert_eq!((frame.width, frame.height, frame.channels), (160, 100, 3));
}

#[test]
fn recv_timeout_surfaces_as_error() {
    let name = unique_name("recv_timeout");
    let mut consumer = Consumer::create(&name, 64).unwrap();
    match consumer.recv(Wait::For(Duration::from_millis(100))) {
        Err(Error::Timeout(t)) => assert_eq!(t, Duration::from_millis(100)),
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[test]
fn send_timeout_without_consumer() {
    let name = unique_name("send_timeout");
    let mut producer = Producer::create(&name, 64).unwrap();
    match producer.send(&[1, 2, 3], 1, 3, 1, Wait::For(Duration::from_millis(100))) {
        Err(Error::Timeout(_)) => (),
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[test]
fn cancel_token_stops_polling_loop() {
    let name = unique_name("cancel");
    let mut consumer = Consumer::create(&name, 64).unwrap();
    let token = CancelToken::new();

    let canceller = token.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        canceller.cancel();
    });

    let got = consumer
        .recv_cancellable(Duration::from_millis(50), &token)
        .unwrap();
    assert!(got.is_none());
    handle.join().unwrap();
}

#[test]
fn producer_skips_frame_then_consumer_catches_up() {
    let name = unique_name("skip");
    let mut producer = Producer::create(&name, 64).unwrap();
    let mut consumer = Consumer::attach(&name).unwrap();

    // Nobody is reading; the bounded wait expires and the frame is dropped
    // by overwriting it with the next one.
    assert!(matches!(
        producer.send(&[1u8; 4], 2, 2, 1, Wait::For(Duration::from_millis(50))),
        Err(Error::Timeout(_))
    ));
    producer.write_frame(&[2u8; 4], 2, 2, 1).unwrap();
    producer.signal_ready().unwrap();

    let frame = consumer.recv(Wait::For(Duration::from_millis(500))).unwrap();
    assert_eq!(frame.data, vec![2u8; 4]);
    assert!(producer
        .wait_for_done(Wait::For(Duration::from_millis(500)))
        .unwrap());
}
