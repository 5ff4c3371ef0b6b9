//! Playback engine error types

use thiserror::Error;

/// Errors surfaced by loading and playback operations.
///
/// Three families matter to callers:
/// - format/IO errors: the file is bad, a smaller chunk won't help
/// - [`AudioError::OutOfDmaMemory`]: retry with a shorter chunk
///   duration or free other sources first
/// - [`AudioError::NoVoiceAvailable`]: expected under load, retry on
///   a later frame
///
/// Voice indices outside 0..24 are programmer errors and panic
/// instead of returning a variant.
#[derive(Error, Debug)]
pub enum AudioError {
    /// File could not be opened or read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ogg container rejected at open
    #[error("input does not appear to be a valid ogg vorbis file or doesn't exist")]
    InvalidVorbis,

    /// Decode failure inside an open Vorbis bitstream
    #[error("error in the ogg vorbis stream: {0}")]
    VorbisStream(String),

    /// Structurally invalid RIFF/WAVE file
    #[error("invalid PCM wav file: {0}")]
    InvalidWav(&'static str),

    /// WAV sample data is not 8- or 16-bit PCM
    #[error("unknown encoding, needs to be PCM8 or PCM16 (got {0} bits per sample)")]
    UnsupportedWavEncoding(u16),

    /// No explicit format given and the file extension matched no
    /// known container
    #[error("unknown audio type")]
    UnknownAudioType,

    /// Raw data encoding name not recognized
    #[error("wrong format: {0}")]
    UnsupportedRawEncoding(String),

    /// Interpolation name not recognized
    #[error("unknown interpolation type: {0}")]
    UnknownInterpolation(String),

    /// Not enough DMA-capable memory for the requested buffers
    #[error("not enough linear memory available (requested {requested} bytes, {available} free)")]
    OutOfDmaMemory { requested: usize, available: usize },

    /// Every voice is busy and no explicit voice was requested
    #[error("no audio channel is currently available")]
    NoVoiceAvailable,

    /// Source id does not refer to a loaded source
    #[error("audio source is not loaded")]
    UnknownSource,
}

impl From<lewton::VorbisError> for AudioError {
    fn from(err: lewton::VorbisError) -> Self {
        AudioError::VorbisStream(err.to_string())
    }
}

/// Result type for playback operations
pub type AudioResult<T> = Result<T, AudioError>;
