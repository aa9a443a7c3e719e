//! Engines and the full scan pipeline on a QR code loaded from disk.

use qr_debugger::{
    compare, decoder, CaptureStream, Engine, Executor, InteractionQueue, ScanConfig, ScanSession,
    Scanner, StillImageStream,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};
use std::time::Duration;

const PAYLOAD: &str = "4376471154038";

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_code.png")
}

#[test]
fn test_fixture_loads_as_grey_stream() {
    let mut stream = StillImageStream::open(&fixture()).expect("open fixture");
    assert_eq!(stream.plane().width(), 174);
    assert_eq!(stream.plane().height(), 174);

    let frame = stream.next_frame().expect("frame");
    assert_eq!(frame.data.len(), 174 * 174);
}

#[test]
fn test_compare_finds_payload_with_every_engine() {
    let stream = StillImageStream::open(&fixture()).expect("open fixture");
    let reports = compare(stream.plane());

    for report in reports {
        assert!(report.passes(None), "{}: {:?}", report.engine, report.outcome);
        let payload = report.outcome.expect("no engine error").map(|a| a.payload);
        assert_eq!(payload.as_deref(), Some(PAYLOAD), "{}", report.engine);
    }
}

#[test]
fn test_vision_session_delivers_fixture_on_interaction_thread() {
    let mut stream = StillImageStream::open(&fixture())
        .expect("open fixture")
        .with_interval(Duration::from_millis(5));
    let format = stream.format().clone();

    let queue: Arc<dyn Executor> =
        Arc::new(InteractionQueue::spawn("interaction").expect("spawn interaction queue"));
    let (tx, rx) = mpsc::channel();
    let config =
        ScanConfig::for_engine(Engine::Vision).with_settle_delay(Duration::from_millis(50));
    let session = ScanSession::new(config, queue, move |delivery| {
        let thread_name = std::thread::current().name().map(str::to_owned);
        let _ = tx.send((delivery, thread_name));
    })
    .expect("session");

    let mut scanner = Scanner::new(decoder::build(Engine::Vision), 1);
    let stop = AtomicBool::new(false);
    let summary = scanner
        .run(&mut stream, &format, &session, &stop)
        .expect("scan loop");

    let (delivery, thread_name) = rx.recv_timeout(Duration::from_secs(2)).expect("delivery");
    assert_eq!(delivery.payload, PAYLOAD);
    assert!(delivery.confidence.is_some_and(|c| c > 0.9));
    assert!(delivery.settle_time() >= Duration::from_millis(50));
    assert_eq!(thread_name.as_deref(), Some("interaction"));
    assert_eq!(summary.accepted, 1);
}
