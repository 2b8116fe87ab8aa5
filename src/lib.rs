pub mod audio_thread;
pub mod clip_editor_app;
pub mod config;
pub mod cutter;
pub mod decoder;
pub mod error;
pub mod layers;
pub mod playhead;
pub mod resize_observer;
pub mod selection;
pub mod source;
pub mod time_range;
pub mod transport;
pub mod waveform;
pub mod waveform_widget;

/// Raw contents of an audio file.
///
/// Shared between the UI, the decoder and the cutter without copying. Two sources are the same
/// source exactly when they point to the same allocation.
pub type ByteSource = std::sync::Arc<[u8]>;
