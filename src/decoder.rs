use crate::error::DecodeError;
use crate::ByteSource;
use eframe::egui;
use rodio::Source;
use std::io::Cursor;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Fully decoded audio: interleaved samples plus stream parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self, DecodeError> {
        if channels == 0 || sample_rate == 0 {
            return Err(DecodeError::InvalidFormat {
                channels,
                sample_rate,
            });
        }
        if samples.len() < channels as usize {
            return Err(DecodeError::Empty);
        }

        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Interleaved samples of all channels.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of sample frames, i.e. samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Copies out the samples of a single channel.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        if index >= self.channels as usize {
            return Vec::new();
        }

        self.samples
            .iter()
            .skip(index)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }
}

/// Decodes a complete byte source.
pub fn decode(bytes: &ByteSource) -> Result<DecodedAudio, DecodeError> {
    let decoder = rodio::Decoder::new(Cursor::new(Arc::clone(bytes)))?;
    let channels = decoder.channels();
    let sample_rate = decoder.sample_rate();
    let samples: Vec<f32> = decoder.collect();

    DecodedAudio::new(samples, channels, sample_rate)
}

/// Decoded audio of a particular source generation.
#[derive(Clone, Debug)]
pub struct DecodedSource {
    /// Identifies the source this audio was decoded from; changes with every new source.
    pub generation: u64,
    pub audio: Arc<DecodedAudio>,
}

struct DecodeRequest {
    generation: u64,
    bytes: ByteSource,
}

struct DecodeResult {
    generation: u64,
    result: Result<DecodedAudio, DecodeError>,
}

type DecodeFn = dyn Fn(&ByteSource) -> Result<DecodedAudio, DecodeError> + Send;

/// Owns the decode worker thread and hands out results of the latest requested source only.
pub struct SourceLoader {
    thread_handle: Option<JoinHandle<()>>,
    request_sender: Option<Sender<DecodeRequest>>,
    result_receiver: Receiver<DecodeResult>,
    /// Generation of the most recent [SourceLoader::load] call.
    generation: u64,
    /// Generation still waiting for its result.
    pending: Option<u64>,
}

impl SourceLoader {
    /// Spawns a worker that decodes with [decode].
    ///
    /// # Parameters
    ///
    /// * `ui_ctx` - UI context handle, used by the worker to force UI repainting once a result
    ///   is ready.
    pub fn spawn(ui_ctx: &egui::Context) -> Self {
        Self::spawn_with(ui_ctx, decode)
    }

    /// Spawns a worker with a custom decode function.
    pub fn spawn_with<F>(ui_ctx: &egui::Context, decode_fn: F) -> Self
    where
        F: Fn(&ByteSource) -> Result<DecodedAudio, DecodeError> + Send + 'static,
    {
        let (request_sender, request_receiver) = std::sync::mpsc::channel();
        let (result_sender, result_receiver) = std::sync::mpsc::channel();
        let ui_ctx = ui_ctx.clone();
        let decode_fn: Box<DecodeFn> = Box::new(decode_fn);

        let thread_handle = std::thread::Builder::new()
            .name(String::from("decode-worker"))
            .spawn(move || decode_worker(request_receiver, result_sender, decode_fn, ui_ctx));

        let thread_handle = match thread_handle {
            Ok(handle) => Some(handle),
            Err(error) => {
                log::error!("[Decoder] Failed to spawn decode worker: {error}");
                None
            }
        };

        Self {
            thread_handle,
            request_sender: Some(request_sender),
            result_receiver,
            generation: 0,
            pending: None,
        }
    }

    /// Starts decoding a new source and invalidates any decode still in flight.
    ///
    /// Returns the generation the result will carry.
    pub fn load(&mut self, bytes: ByteSource) -> u64 {
        self.generation += 1;
        self.pending = Some(self.generation);

        let request = DecodeRequest {
            generation: self.generation,
            bytes,
        };
        let sent = self
            .request_sender
            .as_ref()
            .map(|sender| sender.send(request).is_ok())
            .unwrap_or(false);

        if !sent {
            log::error!("[Decoder] Decode worker is gone, source will not load");
            self.pending = None;
        }

        self.generation
    }

    /// Invalidates the decode in flight, if any.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.pending = None;
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the result of the latest requested source once it's ready.
    pub fn poll(&mut self) -> Option<Result<DecodedSource, DecodeError>> {
        loop {
            match self.result_receiver.try_recv() {
                Ok(result) if Some(result.generation) == self.pending => {
                    self.pending = None;
                    return Some(result.result.map(|audio| DecodedSource {
                        generation: result.generation,
                        audio: Arc::new(audio),
                    }));
                }
                Ok(stale) => {
                    log::debug!(
                        "[Decoder] Discarding stale decode result of generation {}",
                        stale.generation
                    );
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    if self.pending.take().is_some() {
                        log::error!("[Decoder] Decode worker stopped unexpectedly");
                    }
                    return None;
                }
            }
        }
    }
}

impl Drop for SourceLoader {
    fn drop(&mut self) {
        // Dropping the sender disconnects the worker's receiver and lets the thread finish
        drop(self.request_sender.take());

        if let Some(thread) = self.thread_handle.take() {
            if thread.join().is_err() {
                log::error!("[Decoder] Decode worker panicked");
            }
        }
    }
}

fn decode_worker(
    requests: Receiver<DecodeRequest>,
    results: Sender<DecodeResult>,
    decode_fn: Box<DecodeFn>,
    ui_ctx: egui::Context,
) {
    while let Ok(mut request) = requests.recv() {
        // Only the newest queued source can still be delivered
        while let Ok(newer) = requests.try_recv() {
            log::debug!(
                "[Decoder] Skipping superseded source generation {}",
                request.generation
            );
            request = newer;
        }

        log::info!("[Decoder] Decoding source generation {} ...", request.generation);
        let result = decode_fn(&request.bytes);
        if let Err(error) = &result {
            log::error!("[Decoder] Error loading audio: {error}");
        }

        let result = DecodeResult {
            generation: request.generation,
            result,
        };
        if results.send(result).is_err() {
            return;
        }
        ui_ctx.request_repaint();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn wav_bytes(samples: &[i16], channels: u16) -> ByteSource {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &sample in samples {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        Arc::from(cursor.into_inner())
    }

    #[test]
    fn decodes_wav_parameters() {
        let samples: Vec<i16> = (0..1600).map(|i| if i % 2 == 0 { 8000 } else { -8000 }).collect();
        let audio = decode(&wav_bytes(&samples, 2)).unwrap();

        assert_eq!(audio.channels(), 2);
        assert_eq!(audio.sample_rate(), 8000);
        assert_eq!(audio.frames(), 800);
        assert!((audio.duration() - 0.1).abs() < 1e-9);
        assert!(audio.channel(0).iter().all(|&s| s > 0.0));
        assert!(audio.channel(1).iter().all(|&s| s < 0.0));
        assert!(audio.channel(2).is_empty());
    }

    #[test]
    fn rejects_garbage() {
        let garbage: ByteSource = Arc::from(vec![0x13u8; 64]);
        assert!(decode(&garbage).is_err());
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(matches!(
            DecodedAudio::new(vec![0.0; 4], 0, 44100),
            Err(DecodeError::InvalidFormat { .. })
        ));
        assert!(matches!(DecodedAudio::new(Vec::new(), 1, 44100), Err(DecodeError::Empty)));
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

    fn marker_audio(bytes: &ByteSource) -> Result<DecodedAudio, DecodeError> {
        if bytes.first() == Some(&b'A') {
            std::thread::sleep(Duration::from_millis(50));
        }
        DecodedAudio::new(vec![bytes[0] as f32; 4], 1, 4)
    }

    #[test]
    fn stale_decode_is_discarded() {
        let ctx = egui::Context::default();
        let mut loader = SourceLoader::spawn_with(&ctx, marker_audio);

        loader.load(Arc::from(b"A".to_vec()));
        let generation_b = loader.load(Arc::from(b"B".to_vec()));

        let source = wait_for(&mut loader).unwrap().unwrap();
        assert_eq!(source.generation, generation_b);
        assert_eq!(source.audio.samples()[0], b'B' as f32);
        assert!(!loader.is_loading());

        // A's late result must never show up afterwards either
        std::thread::sleep(Duration::from_millis(80));
        assert!(loader.poll().is_none());
    }

    #[test]
    fn superseded_requests_are_not_decoded() {
        let ctx = egui::Context::default();
        let decoded = Arc::new(Mutex::new(Vec::new()));
        let (release, gate) = std::sync::mpsc::channel::<()>();

        let seen = Arc::clone(&decoded);
        let mut loader = SourceLoader::spawn_with(&ctx, move |bytes: &ByteSource| {
            seen.lock().unwrap().push(bytes[0]);
            if bytes[0] == b'A' {
                let _ = gate.recv();
            }
            DecodedAudio::new(vec![bytes[0] as f32; 4], 1, 4)
        });

        loader.load(Arc::from(b"A".to_vec()));
        for _ in 0..2500 {
            if !decoded.lock().unwrap().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }

        // B and C queue up behind A, only C is worth decoding
        loader.load(Arc::from(b"B".to_vec()));
        let generation_c = loader.load(Arc::from(b"C".to_vec()));
        release.send(()).unwrap();

        let source = wait_for(&mut loader).unwrap().unwrap();
        assert_eq!(source.generation, generation_c);
        assert_eq!(*decoded.lock().unwrap(), vec![b'A', b'C']);
    }

    #[test]
    fn cancel_discards_in_flight_result() {
        let ctx = egui::Context::default();
        let mut loader = SourceLoader::spawn_with(&ctx, marker_audio);

        loader.load(Arc::from(b"A".to_vec()));
        loader.cancel();
        assert!(!loader.is_loading());

        std::thread::sleep(Duration::from_millis(100));
        assert!(loader.poll().is_none());
    }

    #[test]
    fn decode_failure_is_reported() {
        let ctx = egui::Context::default();
        let mut loader = SourceLoader::spawn_with(&ctx, |_: &ByteSource| Err(DecodeError::Empty));

        loader.load(Arc::from(b"x".to_vec()));
        let result = wait_for(&mut loader).unwrap();
        assert!(matches!(result, Err(DecodeError::Empty)));
    }
}
