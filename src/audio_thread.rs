use crate::decoder::DecodedAudio;
use crate::transport::MediaResource;
use eframe::egui;
use rodio::buffer::SamplesBuffer;
use std::sync::mpsc::{RecvError, SendError, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Commands to control a thread, that performs audio playback.
pub enum AudioControlCommand {
    Play,
    Pause,
    /// Move playback to the given position from the start of the track.
    Seek(Duration),
    SetVolume(f32),
}

/// Playback position shared between the audio thread and the UI.
#[derive(Debug, Default)]
struct PlaybackClock {
    position: Duration,
    /// Raised when playback ran off the end of the track, cleared by the UI.
    ended: bool,
}

/// Struct that owns and controls a thread, that performs audio playback process.
///
/// One [AudioThread] plays one decoded track. Dropping it stops the sampling loop and joins
/// the thread, so switching tracks never leaves a stale thread behind.
pub struct AudioThread {
    /// Thread handle to a thread, that performs audio playback.
    ///
    /// Handle is wrapped in [Option] for graceful joining, when [AudioThread] is dropped.
    thread_handle: Option<std::thread::JoinHandle<()>>,
    clock: Arc<Mutex<PlaybackClock>>,
    commands_sender: Option<std::sync::mpsc::Sender<AudioControlCommand>>,
}

impl AudioThread {
    /// Creates new [AudioThread] object with a spawned, paused audio thread.
    ///
    /// # Parameters
    ///
    /// * `ui_ctx` - UI context handle, used by audio playback thread to force UI repainting.
    /// * `audio` - decoded track to play, shared with the UI.
    /// * `volume` - initial volume.
    /// * `sample_interval` - how often the position is published while playing.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread.
    pub fn spawn(
        ui_ctx: &egui::Context,
        audio: Arc<DecodedAudio>,
        volume: f32,
        sample_interval: Duration,
    ) -> Self {
        let (sender, receiver) = std::sync::mpsc::channel();
        let clock = Arc::new(Mutex::new(PlaybackClock::default()));

        let thread_ctx = ThreadContext {
            commands_receiver: receiver,
            clock: Arc::clone(&clock),
            ui_ctx: ui_ctx.clone(),
            track: Track { audio },
            volume,
            sample_interval,
        };

        let thread_handle = std::thread::spawn(move || {
            playback_audio(thread_ctx);
        });

        Self {
            thread_handle: Option::from(thread_handle),
            clock,
            commands_sender: Option::from(sender),
        }
    }

    /// Sends a command to the audio playback thread.
    ///
    /// # Parameters
    ///
    /// * `command` - the command to send to the audio playback thread.
    pub fn send(&self, command: AudioControlCommand) -> Result<(), SendError<AudioControlCommand>> {
        match self.commands_sender.as_ref() {
            Some(sender) => sender.send(command),
            None => Err(SendError(command)),
        }
    }

    /// Returns the current playback position.
    pub fn position(&self) -> Duration {
        self.clock().position
    }

    fn send_logged(&self, command: AudioControlCommand) {
        if self.send(command).is_err() {
            log::warn!("[Audio Thread] Playback thread is gone, command dropped");
        }
    }

    fn clock(&self) -> MutexGuard<'_, PlaybackClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaResource for AudioThread {
    fn play(&mut self) {
        self.send_logged(AudioControlCommand::Play);
    }

    fn pause(&mut self) {
        self.send_logged(AudioControlCommand::Pause);
    }

    fn seek(&mut self, time: f64) {
        let position = Duration::from_secs_f64(time.max(0.0));
        // Publish right away, the UI must not see the old position on the next frame
        {
            let mut clock = self.clock();
            clock.position = position;
            clock.ended = false;
        }
        self.send_logged(AudioControlCommand::Seek(position));
    }

    fn current_time(&self) -> f64 {
        self.position().as_secs_f64()
    }

    fn set_volume(&mut self, volume: f32) {
        self.send_logged(AudioControlCommand::SetVolume(volume));
    }

    fn take_ended(&mut self) -> bool {
        std::mem::take(&mut self.clock().ended)
    }
}

impl Drop for AudioThread {
    fn drop(&mut self) {
        // Take sender end of the channel out of Option and then drop it for notifying the audio
        // thread about the stop. take() is needed as drop() takes mutable reference to self, but
        // dropping requires moving, so we leave None in commands_sender field of the self here
        drop(self.commands_sender.take());

        // As with commands sender, take the ownership over the audio thread handle and then join it
        if let Some(thread) = self.thread_handle.take() {
            if thread.join().is_err() {
                log::error!("[Audio Thread] Playback thread panicked");
            }
        }
    }
}

/// Decoded track shared with the UI.
struct Track {
    audio: Arc<DecodedAudio>,
}

impl Track {
    /// Copies the samples into a rodio source. The sink owns at most one such copy, as the
    /// source is only queued again once the previous one was played to its end.
    fn source(&self) -> SamplesBuffer {
        SamplesBuffer::new(
            self.audio.channels(),
            self.audio.sample_rate(),
            self.audio.samples().to_vec(),
        )
    }
}

/// Struct that stores playback context data, controlled by the audio playback thread.
struct ThreadContext {
    commands_receiver: std::sync::mpsc::Receiver<AudioControlCommand>,
    clock: Arc<Mutex<PlaybackClock>>,
    ui_ctx: egui::Context,
    track: Track,
    volume: f32,
    sample_interval: Duration,
}

impl ThreadContext {
    fn clock(&self) -> MutexGuard<'_, PlaybackClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Playback state private to the audio thread.
struct PlayerState {
    playing: bool,
    /// Seek requested while paused, applied once playback resumes.
    pending_seek: Option<Duration>,
}

/// Entry point for the audio playback thread.
///
/// # Parameters
///
/// * `thread_ctx` - playback context data, controlled by the audio playback thread.
fn playback_audio(thread_ctx: ThreadContext) {
    // For default physical audio device, create output stream. Audio stream must exist or
    // playback will end and attached sink will no longer work
    let audio_stream = match rodio::OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(error) => {
            log::error!("[Audio Thread] Failed to open audio output: {error}");
            return;
        }
    };

    // Sink is a handle for easier playback control and represents audio track.
    //
    // In fact, rodio itself spawns a background thread that is dedicated to reading from the
    // sources and sending the output to the device. Whenever you give up ownership of a Source
    // in order to play it, it is sent to this background thread where it will be read by rodio.
    //
    // We still keep our own thread: it publishes the position while playing even when the UI
    // is idle and update() is not called.
    let audio_sink = rodio::Sink::connect_new(audio_stream.mixer());
    audio_sink.pause();
    audio_sink.set_volume(thread_ctx.volume);
    audio_sink.append(thread_ctx.track.source());

    let mut state = PlayerState {
        playing: false,
        pending_seek: None,
    };

    loop {
        if !state.playing {
            log::debug!("[Audio Thread] recv() ...");
            // If no sound is currently playing we can use blocking wait for new command in
            // order to save CPU time
            match thread_ctx.commands_receiver.recv() {
                Ok(command) => handle_command(&thread_ctx, &mut state, command, &audio_sink),
                Err(RecvError) => return,
            }
            continue;
        }

        // Otherwise sound is playing, and we have to handle new command or sample the position
        // without blocking
        match thread_ctx.commands_receiver.try_recv() {
            Ok(command) => handle_command(&thread_ctx, &mut state, command, &audio_sink),
            Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => {
                if audio_sink.empty() {
                    // Track played to its end, rodio dropped the source
                    log::debug!("[Audio Thread] End of track");
                    state.playing = false;
                    let mut clock = thread_ctx.clock();
                    clock.ended = true;
                    drop(clock);
                    thread_ctx.ui_ctx.request_repaint();
                    continue;
                }

                thread_ctx.clock().position = audio_sink.get_pos();
                // Force UI repainting to show new position
                thread_ctx.ui_ctx.request_repaint();
                std::thread::sleep(thread_ctx.sample_interval);
            }
        }
    }
}

/// Handles single received audio control command.
///
/// # Parameters
///
/// * `thread_ctx` - playback context data, controlled by the audio playback thread.
/// * `state` - playback state of the audio thread.
/// * `command` - the command to handle.
/// * `audio_sink` - [rodio::Sink] that actually performs audio playback.
fn handle_command(
    thread_ctx: &ThreadContext,
    state: &mut PlayerState,
    command: AudioControlCommand,
    audio_sink: &rodio::Sink,
) {
    match command {
        AudioControlCommand::Play => {
            if audio_sink.empty() {
                // The source is gone after the end of the track, queue it again
                audio_sink.append(thread_ctx.track.source());
            }
            audio_sink.play();
            state.playing = true;
            if let Some(position) = state.pending_seek.take() {
                seek_sink(audio_sink, position);
            }
        }
        AudioControlCommand::Pause => {
            audio_sink.pause();
            state.playing = false;
        }
        AudioControlCommand::Seek(position) => {
            if state.playing {
                if audio_sink.empty() {
                    audio_sink.append(thread_ctx.track.source());
                }
                seek_sink(audio_sink, position);
            } else {
                // Seeking waits for the mixer to pick up the order, do it once playing
                state.pending_seek = Some(position);
            }
        }
        AudioControlCommand::SetVolume(volume) => audio_sink.set_volume(volume),
    }
}

fn seek_sink(audio_sink: &rodio::Sink, position: Duration) {
    if let Err(error) = audio_sink.try_seek(position) {
        log::warn!("[Audio Thread] Failed to seek to {position:?}: {error}");
    }
}
