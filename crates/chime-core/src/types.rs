//! Shared types for the playback engine

use std::str::FromStr;

use crate::error::AudioError;

/// Number of hardware voices exposed by the DSP.
///
/// Voices are numbered 0 to 23. This is a hardware limit, not a
/// tunable.
pub const NUM_VOICES: usize = 24;

/// Default streaming chunk duration in seconds.
///
/// A negative chunk duration passed to a load call disables streaming
/// entirely (the whole clip is decoded up front).
pub const DEFAULT_CHUNK_DURATION: f64 = 0.1;

/// Sequence number the hardware assigns to each enqueued wave buffer.
///
/// Monotonically increasing per voice; 0 means "no buffer playing".
pub type SequenceId = u16;

/// Handle to a loaded audio source owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Sample encoding of data sent to a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Pcm8,
    Pcm16,
    Adpcm,
}

impl SampleEncoding {
    /// Bytes per sample per channel.
    ///
    /// ADPCM frames have no fixed per-sample byte size; raw ADPCM data
    /// is accounted at 2 bytes per sample, matching how the hardware
    /// counts it.
    pub fn bytes_per_sample(&self) -> u16 {
        match self {
            SampleEncoding::Pcm8 => 1,
            SampleEncoding::Pcm16 | SampleEncoding::Adpcm => 2,
        }
    }
}

impl FromStr for SampleEncoding {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, AudioError> {
        match s {
            "PCM8" => Ok(SampleEncoding::Pcm8),
            "PCM16" => Ok(SampleEncoding::Pcm16),
            "ADPCM" => Ok(SampleEncoding::Adpcm),
            other => Err(AudioError::UnsupportedRawEncoding(other.to_string())),
        }
    }
}

/// Interpolation a voice applies when resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    None,
    #[default]
    Linear,
    Polyphase,
}

impl FromStr for Interpolation {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, AudioError> {
        match s {
            "none" => Ok(Interpolation::None),
            "linear" => Ok(Interpolation::Linear),
            "polyphase" => Ok(Interpolation::Polyphase),
            other => Err(AudioError::UnknownInterpolation(other.to_string())),
        }
    }
}

/// Per-voice volume vector: the four speaker volumes plus the
/// auxiliary send lanes, 12 lanes total as exposed by the DSP mix
/// registers. Volumes go from 0.0 (silent) to 1.0 (full).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixParams(pub [f32; 12]);

impl Default for MixParams {
    fn default() -> Self {
        Self([1.0; 12])
    }
}

impl MixParams {
    /// Build from the four speaker volumes, leaving the aux lanes at
    /// unity.
    pub fn quad(front_left: f32, front_right: f32, back_left: f32, back_right: f32) -> Self {
        let mut levels = [1.0; 12];
        levels[0] = front_left;
        levels[1] = front_right;
        levels[2] = back_left;
        levels[3] = back_right;
        Self(levels)
    }

    pub fn levels(&self) -> &[f32; 12] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_parsing() {
        assert_eq!("PCM8".parse::<SampleEncoding>().unwrap(), SampleEncoding::Pcm8);
        assert_eq!("PCM16".parse::<SampleEncoding>().unwrap(), SampleEncoding::Pcm16);
        assert_eq!("ADPCM".parse::<SampleEncoding>().unwrap(), SampleEncoding::Adpcm);
        assert!(matches!(
            "pcm16".parse::<SampleEncoding>(),
            Err(AudioError::UnsupportedRawEncoding(_))
        ));
    }

    #[test]
    fn test_encoding_sample_widths() {
        assert_eq!(SampleEncoding::Pcm8.bytes_per_sample(), 1);
        assert_eq!(SampleEncoding::Pcm16.bytes_per_sample(), 2);
        assert_eq!(SampleEncoding::Adpcm.bytes_per_sample(), 2);
    }

    #[test]
    fn test_interpolation_parsing() {
        assert_eq!("none".parse::<Interpolation>().unwrap(), Interpolation::None);
        assert_eq!("linear".parse::<Interpolation>().unwrap(), Interpolation::Linear);
        assert_eq!(
            "polyphase".parse::<Interpolation>().unwrap(),
            Interpolation::Polyphase
        );
        assert!("cubic".parse::<Interpolation>().is_err());
    }

    #[test]
    fn test_mix_quad() {
        let mix = MixParams::quad(0.5, 0.25, 0.75, 1.0);
        assert_eq!(mix.levels()[0], 0.5);
        assert_eq!(mix.levels()[1], 0.25);
        assert_eq!(mix.levels()[2], 0.75);
        assert_eq!(mix.levels()[3], 1.0);
        // aux lanes stay at unity
        assert!(mix.levels()[4..].iter().all(|&v| v == 1.0));
    }
}
