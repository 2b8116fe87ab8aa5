use crate::time_range::TimeRange;

/// Something that can play audio and report its position.
pub trait MediaResource {
    fn play(&mut self);
    fn pause(&mut self);
    /// Moves the playback position to `time` seconds.
    fn seek(&mut self, time: f64);
    /// Latest known playback position in seconds.
    fn current_time(&self) -> f64;
    fn set_volume(&mut self, volume: f32);
    /// Returns `true` once after playback ran off the end of the media.
    fn take_ended(&mut self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

/// Snapshot of the transport for the UI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// [None] while no media is attached.
    pub current_time: Option<f64>,
    pub volume: f32,
    pub looping: bool,
}

/// Playback state machine bound to the selected range.
pub struct TransportController<M: MediaResource> {
    media: Option<M>,
    duration: Option<f64>,
    status: PlaybackStatus,
    current_time: Option<f64>,
    volume: f32,
    /// Volume to restore when unmuting.
    last_volume: f32,
    looping: bool,
    range: Option<TimeRange>,
}

impl<M: MediaResource> TransportController<M> {
    pub fn new(volume: f32) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        Self {
            media: None,
            duration: None,
            status: PlaybackStatus::Stopped,
            current_time: None,
            volume,
            last_volume: if volume > 0.0 { volume } else { 1.0 },
            looping: false,
            range: None,
        }
    }

    /// Binds a new media resource, replacing the previous one.
    ///
    /// # Parameters
    ///
    /// * `media` - resource to control, positioned at its start.
    /// * `duration` - media length in seconds.
    pub fn attach(&mut self, mut media: M, duration: f64) {
        self.detach();

        media.set_volume(self.volume);
        self.media = Some(media);
        self.duration = Some(duration).filter(|d| d.is_finite() && *d > 0.0);
        self.status = PlaybackStatus::Stopped;
        self.current_time = Some(0.0);
        self.range = None;
    }

    /// Pauses and drops the current media resource.
    pub fn detach(&mut self) {
        if let Some(mut media) = self.media.take() {
            // Pause first, so that the resource stops producing sound before it is torn down
            media.pause();
        }
        self.duration = None;
        self.status = PlaybackStatus::Stopped;
        self.current_time = None;
        self.range = None;
    }

    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    pub fn media(&self) -> Option<&M> {
        self.media.as_ref()
    }

    pub fn media_mut(&mut self) -> Option<&mut M> {
        self.media.as_mut()
    }

    pub fn toggle_play(&mut self) {
        let Some(media) = self.media.as_mut() else {
            return;
        };

        match self.status {
            PlaybackStatus::Paused | PlaybackStatus::Stopped => {
                self.status = PlaybackStatus::Playing;
                media.play();
            }
            PlaybackStatus::Playing => {
                self.status = PlaybackStatus::Paused;
                media.pause();
            }
        }
        log::debug!("[Transport] {:?}", self.status);
    }

    /// Stops playback and rewinds to the start of the selection, or of the media.
    pub fn stop(&mut self) {
        if self.media.is_none() {
            return;
        }

        self.status = PlaybackStatus::Stopped;
        if let Some(media) = self.media.as_mut() {
            media.pause();
        }
        self.seek(self.range_start());
    }

    /// Moves playback to `time` seconds, in any state.
    pub fn seek(&mut self, time: f64) {
        let Some(media) = self.media.as_mut() else {
            return;
        };
        if !time.is_finite() {
            log::warn!("[Transport] Ignoring seek to {time}");
            return;
        }

        let time = match self.duration {
            Some(duration) => time.clamp(0.0, duration),
            None => time.max(0.0),
        };
        media.seek(time);
        self.current_time = Some(time);
    }

    /// Replaces the selection playback is bound to.
    ///
    /// Playback jumps to the new start when the start moved; clearing the selection rewinds
    /// to the beginning.
    pub fn set_range(&mut self, range: Option<TimeRange>) {
        let previous = self.range;
        self.range = range;

        match range {
            Some(range) => {
                if previous.map(|p| p.start) != Some(range.start) {
                    self.seek(range.start);
                }
            }
            None => self.seek(0.0),
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        if volume > 0.0 {
            self.last_volume = volume;
        }
        if let Some(media) = self.media.as_mut() {
            media.set_volume(volume);
        }
    }

    /// Mutes, or restores the last audible volume.
    pub fn toggle_mute(&mut self) {
        if self.volume == 0.0 {
            self.set_volume(self.last_volume);
        } else {
            let last_volume = self.volume;
            self.set_volume(0.0);
            self.last_volume = last_volume;
        }
    }

    pub fn toggle_loop(&mut self) {
        self.looping = !self.looping;
    }

    /// Reads the position of the media and enforces the selection and loop rules.
    ///
    /// Called once per frame; this is the sampling loop that keeps the playhead smooth.
    pub fn sample(&mut self) {
        let Some(media) = self.media.as_mut() else {
            self.current_time = None;
            return;
        };

        if media.take_ended() {
            self.handle_ended();
            return;
        }

        let time = media.current_time();
        self.update_current_time(time);
    }

    /// Applies a new current time reported by the media.
    pub fn update_current_time(&mut self, time: f64) {
        if self.media.is_none() {
            return;
        }
        self.current_time = Some(time);

        let Some(range) = self.range else {
            return;
        };

        if time >= range.end {
            self.seek(range.start);
            if !self.looping {
                self.status = PlaybackStatus::Stopped;
                if let Some(media) = self.media.as_mut() {
                    media.pause();
                }
            }
        } else if time < range.start {
            self.seek(range.start);
        }
    }

    /// Playback ran off the end of the media, which halts it.
    pub fn handle_ended(&mut self) {
        if self.media.is_none() {
            return;
        }

        self.seek(self.range_start());
        if self.looping && self.status == PlaybackStatus::Playing {
            if let Some(media) = self.media.as_mut() {
                media.play();
            }
        } else {
            self.status = PlaybackStatus::Stopped;
            if let Some(media) = self.media.as_mut() {
                media.pause();
            }
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn current_time(&self) -> Option<f64> {
        self.current_time
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.range
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            status: self.status,
            current_time: self.current_time,
            volume: self.volume,
            looping: self.looping,
        }
    }

    fn range_start(&self) -> f64 {
        self.range.map(|range| range.start).unwrap_or(0.0)
    }
}
