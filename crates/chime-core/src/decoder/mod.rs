//! Audio source loading and decoding
//!
//! A loaded [`AudioSource`] always holds its first chunk of decoded
//! PCM in DMA memory, ready to enqueue with no further IO. Sources
//! whose clip fits inside one chunk are complete at load time; longer
//! clips are streamed, and each playback opens its own
//! [`SessionReader`] over the file.

mod vorbis;
mod wav;

pub use vorbis::{VorbisComments, VorbisInfo};

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dma::{DmaBuffer, DmaHeap};
use crate::error::{AudioError, AudioResult};
use crate::types::{Interpolation, MixParams, SampleEncoding, DEFAULT_CHUNK_DURATION};

use vorbis::VorbisReader;
use wav::WavChunkReader;

/// Container format of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Ogg,
    Wav,
    Raw,
}

impl FromStr for SourceFormat {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ogg" => Ok(SourceFormat::Ogg),
            "wav" => Ok(SourceFormat::Wav),
            "raw" => Ok(SourceFormat::Raw),
            _ => Err(AudioError::UnknownAudioType),
        }
    }
}

fn format_from_extension(path: &Path) -> AudioResult<SourceFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("ogg") => Ok(SourceFormat::Ogg),
        Some(ext) if ext.eq_ignore_ascii_case("wav") => Ok(SourceFormat::Wav),
        _ => Err(AudioError::UnknownAudioType),
    }
}

/// Per-format state a source needs to reopen itself for streaming.
#[derive(Debug)]
pub(crate) enum SourceKind {
    Vorbis {
        path: PathBuf,
        info: VorbisInfo,
        comments: VorbisComments,
        /// Samples per channel already held in the initial chunk
        initial_samples: u64,
    },
    Wav {
        path: PathBuf,
        data_start: u64,
        data_size: u64,
        /// Bytes of the data chunk already held in the initial chunk
        initial_bytes: u64,
    },
    Raw,
}

/// Decoded (or decodable) audio clip plus its playback parameters.
///
/// Mix, interpolation and speed live on the source and are applied to
/// a voice at play time, matching how a clip is usually configured
/// once and played many times.
#[derive(Debug)]
pub struct AudioSource {
    pub(crate) kind: SourceKind,
    pub(crate) sample_rate: f32,
    pub(crate) channels: u16,
    pub(crate) encoding: SampleEncoding,
    pub(crate) bytes_per_sample: u16,
    /// Samples per channel over the whole clip
    pub(crate) total_samples: u64,
    pub(crate) total_bytes: u64,
    /// Samples per channel in a full streaming chunk
    pub(crate) chunk_samples: u32,
    pub(crate) chunk_bytes: usize,
    /// Valid samples per channel in `initial_chunk` (short for clips
    /// smaller than one chunk)
    pub(crate) initial_nsamples: u32,
    pub(crate) initial_chunk: DmaBuffer,
    pub(crate) mix: MixParams,
    pub(crate) interpolation: Interpolation,
    pub(crate) speed: f64,
}

/// Chunk sizing: a negative duration means "whole clip in one chunk";
/// otherwise the chunk holds `duration` seconds of samples, at least
/// one and never more than the clip.
pub(crate) fn chunk_counts(
    duration: f64,
    sample_rate: f64,
    total_samples: u64,
    frame_bytes: usize,
) -> (u32, usize) {
    let samples = if duration < 0.0 {
        total_samples
    } else {
        (duration * sample_rate).round() as u64
    };
    let samples = samples.min(total_samples).max(1);
    (samples as u32, samples as usize * frame_bytes)
}

impl AudioSource {
    /// Load a clip from a file.
    ///
    /// The container is picked by `format` when given, by file
    /// extension otherwise. `chunk_duration` is the length in seconds
    /// of each streaming chunk, [`DEFAULT_CHUNK_DURATION`] when
    /// omitted; pass a negative value to decode the whole clip up
    /// front.
    pub fn load(
        path: impl AsRef<Path>,
        format: Option<SourceFormat>,
        chunk_duration: Option<f64>,
        heap: &DmaHeap,
    ) -> AudioResult<Self> {
        let path = path.as_ref();
        let chunk_duration = chunk_duration.unwrap_or(DEFAULT_CHUNK_DURATION);
        let format = match format {
            Some(SourceFormat::Raw) => return Err(AudioError::UnknownAudioType),
            Some(f) => f,
            None => format_from_extension(path)?,
        };
        match format {
            SourceFormat::Ogg => vorbis::load(path, chunk_duration, heap),
            SourceFormat::Wav => wav::load(path, chunk_duration, heap),
            SourceFormat::Raw => unreachable!(),
        }
    }

    /// Wrap raw sample data as a source. The whole clip lives in DMA
    /// memory; raw sources never stream.
    pub fn load_raw(
        data: &[u8],
        encoding: SampleEncoding,
        sample_rate: f32,
        channels: u16,
        heap: &DmaHeap,
    ) -> AudioResult<Self> {
        let bytes_per_sample = encoding.bytes_per_sample();
        let total_samples = match encoding {
            SampleEncoding::Pcm8 | SampleEncoding::Pcm16 => {
                data.len() as u64 / (u64::from(bytes_per_sample) * u64::from(channels))
            }
            // ADPCM packs two samples per byte
            SampleEncoding::Adpcm => data.len() as u64 / 2,
        };

        let mut chunk = heap.alloc(data.len())?;
        chunk.as_mut_slice().copy_from_slice(data);

        Ok(AudioSource {
            kind: SourceKind::Raw,
            sample_rate,
            channels,
            encoding,
            bytes_per_sample,
            total_samples,
            total_bytes: data.len() as u64,
            chunk_samples: total_samples as u32,
            chunk_bytes: data.len(),
            initial_nsamples: total_samples as u32,
            initial_chunk: chunk,
            mix: MixParams::default(),
            interpolation: Interpolation::default(),
            speed: 1.0,
        })
    }

    pub fn format(&self) -> SourceFormat {
        match self.kind {
            SourceKind::Vorbis { .. } => SourceFormat::Ogg,
            SourceKind::Wav { .. } => SourceFormat::Wav,
            SourceKind::Raw => SourceFormat::Raw,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    /// Clip length in seconds
    pub fn duration(&self) -> f64 {
        self.total_samples as f64 / f64::from(self.sample_rate)
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Whether playing this source streams further chunks from disk
    pub fn is_streaming(&self) -> bool {
        (self.chunk_bytes as u64) < self.total_bytes
    }

    /// Identification header of a Vorbis source, `None` otherwise
    pub fn vorbis_info(&self) -> Option<&VorbisInfo> {
        match &self.kind {
            SourceKind::Vorbis { info, .. } => Some(info),
            _ => None,
        }
    }

    /// Comment header of a Vorbis source, `None` otherwise
    pub fn vorbis_comments(&self) -> Option<&VorbisComments> {
        match &self.kind {
            SourceKind::Vorbis { comments, .. } => Some(comments),
            _ => None,
        }
    }

    pub fn mix(&self) -> &MixParams {
        &self.mix
    }

    pub fn set_mix(&mut self, mix: MixParams) {
        self.mix = mix;
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interp: Interpolation) {
        self.interpolation = interp;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Playback rate multiplier; 1.0 is natural speed.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Open a fresh decode cursor positioned right after the samples
    /// in the initial chunk.
    pub(crate) fn open_session_reader(&self) -> AudioResult<SessionReader> {
        match &self.kind {
            SourceKind::Vorbis {
                path,
                initial_samples,
                ..
            } => {
                let mut reader = VorbisReader::open(path)?;
                reader.skip_samples(*initial_samples)?;
                Ok(SessionReader::Vorbis(reader))
            }
            SourceKind::Wav {
                path,
                data_start,
                data_size,
                initial_bytes,
            } => Ok(SessionReader::Wav(WavChunkReader::open(
                path,
                *data_start,
                *data_size,
                *initial_bytes,
            )?)),
            // raw sources fit in their initial chunk and never stream
            SourceKind::Raw => unreachable!(),
        }
    }
}

/// Decode cursor owned by one streaming playback session.
pub(crate) enum SessionReader {
    Vorbis(VorbisReader),
    Wav(WavChunkReader),
}

impl SessionReader {
    pub(crate) fn read_chunk(&mut self, out: &mut [u8]) -> AudioResult<usize> {
        match self {
            SessionReader::Vorbis(r) => r.read_chunk(out),
            SessionReader::Wav(r) => r.read_chunk(out),
        }
    }

    pub(crate) fn at_eof(&self) -> bool {
        match self {
            SessionReader::Vorbis(r) => r.at_eof(),
            SessionReader::Wav(r) => r.at_eof(),
        }
    }
}
