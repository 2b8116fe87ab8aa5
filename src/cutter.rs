use crate::decoder::{self, DecodedAudio};
use crate::error::TranscodeError;
use crate::source::AudioFile;
use crate::time_range::TimeRange;
use eframe::egui;
use std::io::Cursor;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CutterStatus {
    /// Initialization in progress, requests are queued.
    Loading,
    Ready,
    /// Initialization failed, requests are rejected.
    Unavailable,
}

type CutResult = Result<AudioFile, TranscodeError>;

struct CutRequest {
    file: AudioFile,
    range: TimeRange,
    reply: Sender<CutResult>,
}

/// Pending answer to a single cut request.
pub struct CutJob {
    receiver: Receiver<CutResult>,
    done: bool,
}

impl CutJob {
    /// Returns the result once the cut is finished.
    pub fn try_take(&mut self) -> Option<CutResult> {
        if self.done {
            return None;
        }

        match self.receiver.try_recv() {
            Ok(result) => {
                self.done = true;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.done = true;
                Some(Err(TranscodeError::Unavailable))
            }
        }
    }

    /// Whether the cut is still in flight, i.e. its result was not taken yet.
    pub fn is_busy(&self) -> bool {
        !self.done
    }

    /// Blocks until the cut is finished.
    pub fn wait(self) -> CutResult {
        self.receiver.recv().unwrap_or(Err(TranscodeError::Unavailable))
    }

    fn rejected() -> Self {
        let (sender, receiver) = std::sync::mpsc::channel();
        let _ = sender.send(Err(TranscodeError::Unavailable));
        Self {
            receiver,
            done: false,
        }
    }
}

type InitFn = dyn FnOnce() -> Result<(), TranscodeError> + Send;
type CutFn = dyn Fn(&AudioFile, TimeRange) -> CutResult + Send;

/// Owns the cutter worker thread.
///
/// The worker initializes before it serves requests. Requests made in the meantime wait in its
/// queue, and if initialization fails every request is answered with
/// [TranscodeError::Unavailable]. A request is never dropped without an answer.
pub struct CutterService {
    thread_handle: Option<JoinHandle<()>>,
    request_sender: Option<Sender<CutRequest>>,
    status: Arc<Mutex<CutterStatus>>,
}

impl CutterService {
    /// Spawns the cutter worker with the WAV encoder.
    pub fn spawn(ui_ctx: &egui::Context) -> Self {
        Self::spawn_with(ui_ctx, probe_encoder, cut_clip)
    }

    /// Spawns the cutter worker.
    ///
    /// # Parameters
    ///
    /// * `ui_ctx` - UI context handle, repainted whenever a cut finishes or the status changes.
    /// * `init` - initialization step run before the first request is served.
    /// * `cut` - the actual cut operation.
    pub fn spawn_with<I, C>(ui_ctx: &egui::Context, init: I, cut: C) -> Self
    where
        I: FnOnce() -> Result<(), TranscodeError> + Send + 'static,
        C: Fn(&AudioFile, TimeRange) -> CutResult + Send + 'static,
    {
        let (request_sender, request_receiver) = std::sync::mpsc::channel();
        let status = Arc::new(Mutex::new(CutterStatus::Loading));
        let worker_status = Arc::clone(&status);
        let ui_ctx = ui_ctx.clone();
        let init: Box<InitFn> = Box::new(init);
        let cut: Box<CutFn> = Box::new(cut);

        let thread_handle = std::thread::Builder::new()
            .name(String::from("cutter"))
            .spawn(move || cutter_worker(request_receiver, worker_status, init, cut, ui_ctx));

        let thread_handle = match thread_handle {
            Ok(handle) => Some(handle),
            Err(error) => {
                log::error!("[Cutter] Failed to spawn cutter worker: {error}");
                *status.lock().unwrap_or_else(PoisonError::into_inner) = CutterStatus::Unavailable;
                None
            }
        };

        Self {
            thread_handle,
            request_sender: Some(request_sender),
            status,
        }
    }

    pub fn status(&self) -> CutterStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a cut of `file` to `range`.
    pub fn cut(&self, file: AudioFile, range: TimeRange) -> CutJob {
        let (reply, receiver) = std::sync::mpsc::channel();
        let request = CutRequest { file, range, reply };

        let sent = self
            .request_sender
            .as_ref()
            .map(|sender| sender.send(request).is_ok())
            .unwrap_or(false);

        if sent {
            CutJob {
                receiver,
                done: false,
            }
        } else {
            log::error!("[Cutter] Cutter worker is gone, rejecting cut");
            CutJob::rejected()
        }
    }
}

impl Drop for CutterService {
    fn drop(&mut self) {
        drop(self.request_sender.take());

        if let Some(thread) = self.thread_handle.take() {
            if thread.join().is_err() {
                log::error!("[Cutter] Cutter worker panicked");
            }
        }
    }
}

fn cutter_worker(
    requests: Receiver<CutRequest>,
    status: Arc<Mutex<CutterStatus>>,
    init: Box<InitFn>,
    cut: Box<CutFn>,
    ui_ctx: egui::Context,
) {
    log::info!("[Cutter] Loading ...");
    let ready = match init() {
        Ok(()) => {
            log::info!("[Cutter] Ready");
            true
        }
        Err(error) => {
            log::error!("[Cutter] Initialization failed: {error}");
            false
        }
    };
    *status.lock().unwrap_or_else(PoisonError::into_inner) = if ready {
        CutterStatus::Ready
    } else {
        CutterStatus::Unavailable
    };
    ui_ctx.request_repaint();

    while let Ok(request) = requests.recv() {
        let result = if ready {
            log::info!(
                "[Cutter] Cutting {} to {:.3}s..{:.3}s",
                request.file.name,
                request.range.start,
                request.range.end
            );
            cut(&request.file, request.range)
        } else {
            Err(TranscodeError::Unavailable)
        };

        if let Err(error) = &result {
            log::error!("[Cutter] Cut failed: {error}");
        }
        // The requester may have given up on the job, nothing to do then
        let _ = request.reply.send(result);
        ui_ctx.request_repaint();
    }
}

fn wav_spec(audio: &DecodedAudio) -> hound::WavSpec {
    hound::WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Makes sure the encoder can produce a file at all.
fn probe_encoder() -> Result<(), TranscodeError> {
    let probe = DecodedAudio::new(vec![0.0; 2], 2, 44100)?;
    encode_wav(&probe, probe.samples())?;
    Ok(())
}

fn encode_wav(audio: &DecodedAudio, samples: &[f32]) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(audio))?;
    for &sample in samples {
        let sample = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Cuts `file` down to `range` and encodes the result as 16-bit PCM WAV.
pub fn cut_clip(file: &AudioFile, range: TimeRange) -> CutResult {
    let audio = decoder::decode(&file.bytes)?;
    let duration = audio.duration();

    if !(range.start >= 0.0 && range.start < range.end && range.start < duration) {
        return Err(TranscodeError::InvalidRange {
            start: range.start,
            end: range.end,
            duration,
        });
    }
    let end = range.end.min(duration);

    let channels = audio.channels() as usize;
    let rate = f64::from(audio.sample_rate());
    let start_frame = (range.start * rate).floor() as usize;
    let end_frame = ((end * rate).ceil() as usize).min(audio.frames()).max(start_frame + 1);
    let samples = &audio.samples()[start_frame * channels..end_frame * channels];

    let bytes = encode_wav(&audio, samples)?;
    Ok(AudioFile::new(format!("{}-cut.wav", file.stem()), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Two seconds of mono 8 kHz audio, quiet in the first second and loud in the second.
    fn ramp_file() -> AudioFile {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..16000 {
                let value = if i < 8000 { 1000 } else { 20000 };
                writer.write_sample(value as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        AudioFile::new("ramp.wav", cursor.into_inner())
    }

    #[test]
    fn cut_keeps_requested_frames() {
        let file = ramp_file();
        let clip = cut_clip(&file, TimeRange::new(1.0, 1.5).unwrap()).unwrap();
        assert_eq!(clip.name, "ramp-cut.wav");

        let audio = decoder::decode(&clip.bytes).unwrap();
        assert_eq!(audio.frames(), 4000);
        assert!(audio.samples().iter().all(|&s| s > 0.5));
    }

    #[test]
    fn cut_clamps_end_to_duration() {
        let clip = cut_clip(&ramp_file(), TimeRange::new(1.5, 10.0).unwrap()).unwrap();
        let audio = decoder::decode(&clip.bytes).unwrap();
        assert_eq!(audio.frames(), 4000);
    }

    #[test]
    fn cut_rejects_ranges_outside_audio() {
        let result = cut_clip(&ramp_file(), TimeRange::new(3.0, 4.0).unwrap());
        assert!(matches!(result, Err(TranscodeError::InvalidRange { .. })));

        let result = cut_clip(&ramp_file(), TimeRange::new(1.0, 1.0).unwrap());
        assert!(matches!(result, Err(TranscodeError::InvalidRange { .. })));
    }

    #[test]
    fn cut_of_garbage_fails_to_decode() {
        let file = AudioFile::new("junk.mp3", vec![7u8; 32]);
        let result = cut_clip(&file, TimeRange::new(0.0, 1.0).unwrap());
        assert!(matches!(result, Err(TranscodeError::Decode(_))));
    }

    #[test]
    fn requests_wait_for_initialization() {
        let ctx = egui::Context::default();
        let (release, gate) = std::sync::mpsc::channel::<()>();
        let cutter = CutterService::spawn_with(
            &ctx,
            move || {
                let _ = gate.recv();
                Ok(())
            },
            cut_clip,
        );

        assert_eq!(cutter.status(), CutterStatus::Loading);
        let mut job = cutter.cut(ramp_file(), TimeRange::new(0.0, 0.5).unwrap());
        std::thread::sleep(Duration::from_millis(20));
        assert!(job.try_take().is_none());
        assert!(job.is_busy());

        release.send(()).unwrap();
        let clip = job.wait().unwrap();
        assert_eq!(cutter.status(), CutterStatus::Ready);
        assert_eq!(decoder::decode(&clip.bytes).unwrap().frames(), 4000);
    }

    #[test]
    fn failed_initialization_rejects_requests() {
        let ctx = egui::Context::default();
        let cutter = CutterService::spawn_with(&ctx, || Err(TranscodeError::Unavailable), cut_clip);

        let job = cutter.cut(ramp_file(), TimeRange::new(0.0, 0.5).unwrap());
        assert!(matches!(job.wait(), Err(TranscodeError::Unavailable)));
        assert_eq!(cutter.status(), CutterStatus::Unavailable);
    }

    #[test]
    fn default_cutter_probes_encoder() {
        let ctx = egui::Context::default();
        let cutter = CutterService::spawn(&ctx);
        let job = cutter.cut(ramp_file(), TimeRange::new(0.25, 0.75).unwrap());
        let clip = job.wait().unwrap();
        assert_eq!(cutter.status(), CutterStatus::Ready);
        assert_eq!(decoder::decode(&clip.bytes).unwrap().frames(), 4000);
    }

    #[test]
    fn finished_job_is_taken_once() {
        let ctx = egui::Context::default();
        let cutter = CutterService::spawn(&ctx);
        let mut job = cutter.cut(ramp_file(), TimeRange::new(0.0, 0.1).unwrap());
        assert!(job.is_busy());

        let mut result = None;
        for _ in 0..500 {
            result = job.try_take();
            if result.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(result, Some(Ok(_))));
        assert!(!job.is_busy());
        assert!(job.try_take().is_none());
    }
}
