use thiserror::Error;

/// Errors produced while turning a byte source into decoded samples.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The bytes are not a format the decoder understands, or are corrupted.
    #[error("Unsupported or malformed audio data: {0}")]
    Unsupported(#[from] rodio::decoder::DecoderError),

    /// The stream reported nonsensical parameters.
    #[error("Invalid audio stream: {channels} channels at {sample_rate} Hz")]
    InvalidFormat { channels: u16, sample_rate: u32 },

    /// The stream decoded fine but carried no audio.
    #[error("Audio stream contains no samples")]
    Empty,
}

/// Malformed gesture input. Recovered inside the selection engine, never propagated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureInputError {
    #[error("Touch event carries no active touch points")]
    NoActiveTouch,
}

/// Errors reported by the cutter.
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The cutter failed to initialize or its worker is gone.
    #[error("Cutter is unavailable")]
    Unavailable,

    #[error("Cut range {start:.3}s..{end:.3}s is outside of 0s..{duration:.3}s")]
    InvalidRange { start: f64, end: f64, duration: f64 },

    #[error("Failed to decode cut source: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to encode cut output: {0}")]
    Encode(#[from] hound::Error),
}
