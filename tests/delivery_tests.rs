mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chatbuff::audio::{AudioFormat, AudioPayload, CaptureSession};
use chatbuff::error::SessionError;
use chatbuff::kernel::{Event, ServerEvent};
use chatbuff::services::backend::ClientFrame;
use chatbuff::services::delivery::{Delivery, FallbackPolicy, ReliableSender};
use chatbuff::transcript::Speaker;
use common::{capture_config, FakeLive, FakeSource, FakeUnary, FAKE_RATE};

fn payload(len: usize) -> AudioPayload {
    AudioPayload {
        bytes: vec![0; len],
        sample_rate: 16_000,
        format: AudioFormat::Pcm16,
    }
}

#[tokio::test]
async fn closed_channel_falls_back_to_unary() {
    let live = FakeLive::closed();
    let unary = FakeUnary::new();
    let sender = ReliableSender::new(live.clone(), unary.clone(), FallbackPolicy::PreferLive);

    let delivery = sender.send_audio(&payload(2000)).await.unwrap();

    assert!(matches!(delivery, Delivery::Unary(ref t) if t.text == "heard you"));
    assert_eq!(unary.audio_calls(), 1);
    assert_eq!(live.sent_count(), 0);
}

#[tokio::test]
async fn open_channel_takes_the_payload() {
    let live = FakeLive::open();
    let unary = FakeUnary::new();
    let sender = ReliableSender::new(live.clone(), unary.clone(), FallbackPolicy::PreferLive);

    let delivery = sender.send_audio(&payload(2000)).await.unwrap();

    assert_eq!(delivery, Delivery::Live);
    assert_eq!(unary.audio_calls(), 0);
    let sent = live.sent.lock().unwrap();
    assert!(matches!(&sent[0], ClientFrame::Audio { sample_rate: 16_000, .. }));
}

#[tokio::test]
async fn dropped_channel_is_redialed_before_sending() {
    let live = FakeLive::dropped();
    let unary = FakeUnary::new();
    let sender = ReliableSender::new(live.clone(), unary.clone(), FallbackPolicy::PreferLive);

    assert_eq!(sender.send_text("still there?", Speaker::User).await.unwrap(), Delivery::Live);
    assert_eq!(sender.send_text("good", Speaker::User).await.unwrap(), Delivery::Live);

    assert_eq!(live.redials.load(Ordering::SeqCst), 1);
    assert_eq!(live.sent_count(), 2);
    assert!(unary.texts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unary_only_never_redials() {
    let live = FakeLive::dropped();
    let sender = ReliableSender::new(live.clone(), FakeUnary::new(), FallbackPolicy::UnaryOnly);

    sender.send_text("hello", Speaker::User).await.unwrap();

    assert_eq!(live.redials.load(Ordering::SeqCst), 0);
    assert!(!live.open.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failed_live_send_is_retried_over_unary() {
    let live = FakeLive::failing();
    let unary = FakeUnary::new();
    let sender = ReliableSender::new(live.clone(), unary.clone(), FallbackPolicy::PreferLive);

    let delivery = sender.send_audio(&payload(2000)).await.unwrap();

    assert!(matches!(delivery, Delivery::Unary(_)));
    assert_eq!(unary.audio_calls(), 1);
}

#[tokio::test]
async fn unary_only_never_touches_the_channel() {
    let live = FakeLive::open();
    let unary = FakeUnary::new();
    let sender = ReliableSender::new(live.clone(), unary.clone(), FallbackPolicy::UnaryOnly);

    sender.send_text("hello", Speaker::Other).await.unwrap();

    assert_eq!(live.sent_count(), 0);
    let texts = unary.texts.lock().unwrap();
    assert_eq!(texts.as_slice(), &[("hello".to_string(), Speaker::Other)]);
}

#[tokio::test]
async fn both_paths_down_surfaces_the_unary_error() {
    let live = FakeLive::closed();
    let unary = FakeUnary::failing();
    let sender = ReliableSender::new(live, unary, FallbackPolicy::PreferLive);

    let err = sender.send_audio(&payload(2000)).await.unwrap_err();
    assert_eq!(err, SessionError::Backend { status: Some(500), message: "boom".into() });
}

#[tokio::test]
async fn recording_with_channel_closed_is_submitted_once() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));
    let unary = FakeUnary::new();
    let sender = ReliableSender::new(FakeLive::closed(), unary.clone(), FallbackPolicy::PreferLive);

    capture.start().unwrap();
    for _ in 0..3 {
        tap.feed(vec![5; 500]);
        capture.poll();
    }
    if let Some(p) = capture.stop().unwrap() {
        sender.send_audio(&p).await.unwrap();
    }

    assert_eq!(unary.audio_calls(), 1);
    assert_eq!(unary.audio.lock().unwrap()[0].bytes.len(), 1500);
}

#[tokio::test]
async fn too_short_recording_makes_no_request() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));
    let unary = FakeUnary::new();
    let sender = ReliableSender::new(FakeLive::closed(), unary.clone(), FallbackPolicy::PreferLive);

    capture.start().unwrap();
    tap.feed(vec![5; 500]);
    capture.poll();
    if let Some(p) = capture.stop().unwrap() {
        sender.send_audio(&p).await.unwrap();
    }

    assert_eq!(unary.audio_calls(), 0);
}

#[tokio::test]
async fn sender_is_shareable_across_tasks() {
    let unary = FakeUnary::new();
    let sender = Arc::new(ReliableSender::new(FakeLive::closed(), unary.clone(), FallbackPolicy::PreferLive));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let sender = sender.clone();
            tokio::spawn(async move { sender.send_text(&format!("line {}", i), Speaker::User).await })
        })
        .collect();
    for h in handles {
        h.await.unwrap().unwrap();
    }

    assert_eq!(unary.texts.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn submitted_recording_reports_what_the_controller_needs() {
    let live = FakeLive::open();
    let sender = ReliableSender::new(live.clone(), FakeUnary::new(), FallbackPolicy::PreferLive);
    assert!(sender.submit_recording(&payload(2000)).await.is_none());
    assert_eq!(live.sent_count(), 1);

    let sender = ReliableSender::new(FakeLive::closed(), FakeUnary::new(), FallbackPolicy::PreferLive);
    let event = sender.submit_recording(&payload(2000)).await;
    assert!(matches!(event, Some(Event::Server(ServerEvent::Transcript(ref t))) if t.text == "heard you"));

    let sender = ReliableSender::new(FakeLive::closed(), FakeUnary::failing(), FallbackPolicy::PreferLive);
    let event = sender.submit_recording(&payload(2000)).await;
    assert!(matches!(event, Some(Event::Failure(SessionError::Backend { .. }))));
}

#[tokio::test]
async fn recording_stopped_at_exit_is_still_delivered() {
    let (source, tap) = FakeSource::new(FAKE_RATE);
    let mut capture = CaptureSession::new(source, capture_config(AudioFormat::Pcm16));
    let unary = FakeUnary::new();
    let sender = ReliableSender::new(FakeLive::closed(), unary.clone(), FallbackPolicy::PreferLive);

    capture.start().unwrap();
    tap.feed(vec![1; 1200]);
    capture.poll();

    // Still recording when the session ends.
    assert!(capture.is_recording());
    let payload = capture.stop().unwrap().unwrap();
    sender.submit_recording(&payload).await;

    assert_eq!(unary.audio_calls(), 1);
    assert!(!tap.is_open());
}
