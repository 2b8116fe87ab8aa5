//! Loop handling of the transport and stale decode handling of the source loader.

use audio_clip_editor::decoder::{DecodedAudio, DecodedSource, SourceLoader};
use audio_clip_editor::error::DecodeError;
use audio_clip_editor::time_range::TimeRange;
use audio_clip_editor::transport::{MediaResource, PlaybackStatus, TransportController};
use audio_clip_editor::ByteSource;
use eframe::egui;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct ScriptedMedia {
    position: f64,
    playing: bool,
    ended: bool,
}

impl MediaResource for ScriptedMedia {
    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, time: f64) {
        self.position = time;
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn take_ended(&mut self) -> bool {
        std::mem::take(&mut self.ended)
    }
}

fn looping_transport() -> TransportController<ScriptedMedia> {
    let mut transport = TransportController::new(1.0);
    transport.attach(ScriptedMedia::default(), 100.0);
    transport.set_range(TimeRange::new(5.0, 15.0));
    transport.toggle_loop();
    transport.toggle_play();
    transport
}

#[test]
fn looping_playback_wraps_to_range_start() {
    let mut transport = looping_transport();

    transport.media_mut().unwrap().position = 15.2;
    transport.sample();

    assert_eq!(transport.status(), PlaybackStatus::Playing);
    assert_eq!(transport.current_time(), Some(5.0));
    let media = transport.media().unwrap();
    assert!(media.playing);
    assert_eq!(media.position, 5.0);
}

#[test]
fn looping_playback_stays_inside_range() {
    let mut transport = looping_transport();

    for position in [2.0, 7.5, 14.9, 31.0] {
        transport.media_mut().unwrap().position = position;
        transport.sample();
        let time = transport.current_time().unwrap();
        assert!((5.0..15.0).contains(&transport.media().unwrap().position));
        assert!(time == position || time == 5.0);
    }
    assert_eq!(transport.status(), PlaybackStatus::Playing);
}

#[test]
fn end_of_media_restarts_looping_playback() {
    let mut transport = looping_transport();
    transport.media_mut().unwrap().ended = true;
    transport.sample();

    assert_eq!(transport.status(), PlaybackStatus::Playing);
    assert_eq!(transport.media().unwrap().position, 5.0);
}

fn sized_audio(bytes: &ByteSource) -> Result<DecodedAudio, DecodeError> {
    // The first byte asks for a slow decode
    if bytes.first() == Some(&1) {
        std::thread::sleep(Duration::from_millis(50));
    }
    DecodedAudio::new(vec![0.0; bytes.len()], 1, 1000)
}

/// Polls `loader` until the latest source is delivered, giving up after five seconds.
fn wait_for(loader: &mut SourceLoader) -> Option<Result<DecodedSource, DecodeError>> {
    for _ in 0..2500 {
        if let Some(result) = loader.poll() {
            return Some(result);
        }
        if !loader.is_loading() {
            return None;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    None
}

#[test]
fn only_latest_source_is_delivered() {
    let ctx = egui::Context::default();
    let mut loader = SourceLoader::spawn_with(&ctx, sized_audio);

    let slow: ByteSource = Arc::from(vec![1u8; 100]);
    let fast: ByteSource = Arc::from(vec![2u8; 300]);
    loader.load(slow);
    let latest = loader.load(fast);

    let source = wait_for(&mut loader)
        .expect("latest source must be decoded")
        .expect("decode must succeed");
    assert_eq!(source.generation, latest);
    assert_eq!(source.audio.frames(), 300);

    // The slow, stale result never shows up afterwards
    std::thread::sleep(Duration::from_millis(80));
    assert!(loader.poll().is_none());
    assert!(!loader.is_loading());
}
