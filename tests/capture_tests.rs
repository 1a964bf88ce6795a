mod common;

use chatbuff::audio::capture::RING_CAPACITY;
use chatbuff::audio::{AudioFormat, CaptureSession, CaptureState, POLL_INTERVAL_MS};
use chatbuff::error::SessionError;
use common::{capture_config, FakeSource, FAKE_RATE};

#[test]
fn three_chunks_become_one_payload_in_order() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));

    capture.start().unwrap();
    assert!(tap.is_open());

    for fill in [1u8, 2, 3] {
        tap.feed(vec![fill; 500]);
        assert_eq!(capture.poll(), 1);
    }
    assert_eq!(capture.buffered_chunks(), 3);

    let payload = capture.stop().unwrap().expect("1500 bytes is above the minimum");
    assert_eq!(payload.bytes.len(), 1500);
    assert_eq!(payload.sample_rate, FAKE_RATE);
    assert_eq!(payload.format, AudioFormat::Pcm16);
    assert!(payload.bytes[..500].iter().all(|b| *b == 1));
    assert!(payload.bytes[500..1000].iter().all(|b| *b == 2));
    assert!(payload.bytes[1000..].iter().all(|b| *b == 3));

    assert!(!tap.is_open(), "device must be released after stop");
    assert_eq!(capture.state(), CaptureState::Idle);
}

#[test]
fn stop_flushes_the_unpolled_tail() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));

    capture.start().unwrap();
    tap.feed(vec![7; 500]);
    capture.poll();
    // Never polled; stop has to pick it up.
    tap.feed(vec![8; 700]);

    let payload = capture.stop().unwrap().unwrap();
    assert_eq!(payload.bytes.len(), 1200);
    assert_eq!(payload.bytes[1199], 8);
}

#[test]
fn short_capture_is_discarded_and_released() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));

    capture.start().unwrap();
    tap.feed(vec![1; 500]);
    capture.poll();

    assert_eq!(capture.stop().unwrap(), None);
    assert!(!tap.is_open());
}

#[test]
fn denied_device_reports_unavailable() {
    let (source, tap) = FakeSource::denied();
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));

    let err = capture.start().unwrap_err();
    assert!(matches!(err, SessionError::DeviceUnavailable(_)));
    assert!(!capture.is_recording());
    assert!(!tap.is_open());
}

#[test]
fn zero_rate_counts_as_unavailable() {
    let (source, tap) = FakeSource::new(0);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));

    assert!(matches!(capture.start(), Err(SessionError::DeviceUnavailable(_))));
    assert!(!tap.is_open());
}

#[test]
fn device_released_when_wav_finalization_fails() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Wav));

    capture.start().unwrap();
    // An odd byte count cannot be 16-bit PCM.
    tap.feed(vec![0; 1001]);
    capture.poll();

    assert!(capture.stop().is_err());
    assert!(!tap.is_open(), "failed finalization must still release the device");
    assert!(!capture.is_recording());
}

#[test]
fn wav_payload_has_riff_header() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Wav));

    capture.start().unwrap();
    tap.feed(vec![0; 1000]);

    let payload = capture.stop().unwrap().unwrap();
    assert_eq!(&payload.bytes[..4], b"RIFF");
    assert_eq!(&payload.bytes[8..12], b"WAVE");
    assert!(payload.bytes.len() >= 44 + 1000);
    assert_eq!(payload.format, AudioFormat::Wav);
}

#[test]
fn buffer_is_bounded_by_dropping_oldest_chunks() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut config = capture_config(AudioFormat::Pcm16);
    config.max_buffered_ms = 2000;
    let mut capture = CaptureSession::new(source, config);

    capture.start().unwrap();
    for fill in [1u8, 2, 3, 4] {
        tap.feed(vec![fill; 500]);
        capture.poll();
    }
    assert_eq!(capture.buffered_chunks(), 2);

    let payload = capture.stop().unwrap().unwrap();
    assert_eq!(payload.bytes.len(), 1000);
    assert_eq!(payload.bytes[0], 3);
    assert_eq!(payload.bytes[999], 4);
}

#[test]
fn start_twice_is_rejected() {
    let (source, _tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));

    capture.start().unwrap();
    assert!(matches!(capture.start(), Err(SessionError::InvalidInput(_))));
    assert!(capture.is_recording());
}

#[test]
fn dropping_a_recording_session_releases_the_device() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    {
        let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));
        capture.start().unwrap();
        assert!(tap.is_open());
    }
    assert!(!tap.is_open());
}

#[test]
fn stop_when_idle_is_a_no_op() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));

    assert_eq!(capture.stop().unwrap(), None);
    assert_eq!(tap.closes.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[test]
fn poll_cadence_fits_in_the_device_ring() {
    // Samples that arrive at 48 kHz between two polls.
    let per_poll = POLL_INTERVAL_MS as usize * 48;
    assert!(per_poll * 10 <= RING_CAPACITY, "{} samples per poll", per_poll);
}

#[test]
fn frequent_small_drains_still_close_whole_chunks() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));

    capture.start().unwrap();
    let mut closed = 0;
    for i in 0..30u8 {
        tap.feed(vec![i; 50]);
        closed += capture.poll();
    }

    assert_eq!(closed, 3);
    assert_eq!(capture.buffered_chunks(), 3);
    let payload = capture.stop().unwrap().unwrap();
    assert_eq!(payload.bytes.len(), 1500);
    assert_eq!(&payload.bytes[..50], &[0; 50]);
    assert_eq!(&payload.bytes[1450..], &[29; 50]);
}
