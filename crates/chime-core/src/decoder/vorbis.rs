//! Ogg Vorbis decoding via lewton
//!
//! Each playback session owns a fresh [`VorbisReader`]; resuming a
//! clip at a given sample offset decodes and discards from the start
//! of the stream, which is exact where page-granular seeking is not.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use lewton::inside_ogg::OggStreamReader;

use crate::decoder::{chunk_counts, AudioSource, SourceKind};
use crate::dma::DmaHeap;
use crate::error::{AudioError, AudioResult};
use crate::types::{Interpolation, MixParams, SampleEncoding};

/// Identification header facts, kept for introspection after load.
#[derive(Debug, Clone)]
pub struct VorbisInfo {
    pub channels: u8,
    pub sample_rate: u32,
    pub bitrate_upper: i32,
    pub bitrate_nominal: i32,
    pub bitrate_lower: i32,
}

/// Comment header: vendor string plus the user tag list.
#[derive(Debug, Clone)]
pub struct VorbisComments {
    pub vendor: String,
    pub user_comments: Vec<(String, String)>,
}

/// Total decoded samples per channel, read from the granule position
/// of the stream's final Ogg page.
///
/// Scans the tail of the file for the last `OggS` capture pattern
/// rather than walking every page.
fn total_pcm_samples(path: &Path) -> AudioResult<u64> {
    const TAIL: u64 = 64 * 1024;

    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(TAIL);
    file.seek(SeekFrom::Start(start))?;
    let mut tail = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut tail)?;

    let page = tail
        .windows(4)
        .rposition(|w| w == b"OggS")
        .ok_or(AudioError::InvalidVorbis)?;
    // granule position is a little-endian i64 at byte 6 of the page
    // header
    let granule_at = page + 6;
    if granule_at + 8 > tail.len() {
        return Err(AudioError::InvalidVorbis);
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&tail[granule_at..granule_at + 8]);
    let granule = i64::from_le_bytes(raw);
    if granule < 0 {
        return Err(AudioError::InvalidVorbis);
    }
    Ok(granule as u64)
}

pub(crate) fn load(path: &Path, chunk_duration: f64, heap: &DmaHeap) -> AudioResult<AudioSource> {
    let mut reader = VorbisReader::open(path)?;
    let info = reader.info();
    let comments = reader.comments();
    let total_samples = total_pcm_samples(path)?;

    let channels = u16::from(info.channels);
    let frame_bytes = 2 * usize::from(channels);
    let total_bytes = total_samples * frame_bytes as u64;

    let (chunk_samples, chunk_bytes) = chunk_counts(
        chunk_duration,
        f64::from(info.sample_rate),
        total_samples,
        frame_bytes,
    );

    let mut initial_chunk = heap.alloc(chunk_bytes)?;
    let written = reader.read_chunk(initial_chunk.as_mut_slice())?;

    Ok(AudioSource {
        kind: SourceKind::Vorbis {
            path: path.to_path_buf(),
            info,
            comments,
            initial_samples: (written / frame_bytes) as u64,
        },
        sample_rate: reader.sample_rate() as f32,
        channels,
        encoding: SampleEncoding::Pcm16,
        bytes_per_sample: 2,
        total_samples,
        total_bytes,
        chunk_samples,
        chunk_bytes,
        initial_nsamples: (written / frame_bytes) as u32,
        initial_chunk,
        mix: MixParams::default(),
        interpolation: Interpolation::default(),
        speed: 1.0,
    })
}

/// Decoding cursor over one Vorbis stream.
pub(crate) struct VorbisReader {
    stream: OggStreamReader<BufReader<File>>,
    chunker: PacketChunker,
}

impl VorbisReader {
    pub(crate) fn open(path: &Path) -> AudioResult<Self> {
        let file = File::open(path).map_err(|_| AudioError::InvalidVorbis)?;
        let stream =
            OggStreamReader::new(BufReader::new(file)).map_err(|_| AudioError::InvalidVorbis)?;
        Ok(Self {
            stream,
            chunker: PacketChunker::new(),
        })
    }

    pub(crate) fn info(&self) -> VorbisInfo {
        let ident = &self.stream.ident_hdr;
        VorbisInfo {
            channels: ident.audio_channels,
            sample_rate: ident.audio_sample_rate,
            bitrate_upper: ident.bitrate_maximum,
            bitrate_nominal: ident.bitrate_nominal,
            bitrate_lower: ident.bitrate_minimum,
        }
    }

    pub(crate) fn comments(&self) -> VorbisComments {
        let hdr = &self.stream.comment_hdr;
        VorbisComments {
            vendor: hdr.vendor.clone(),
            user_comments: hdr.comment_list.clone(),
        }
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.stream.ident_hdr.audio_sample_rate
    }

    /// Decode and discard `nsamples` samples per channel from the
    /// start of the stream.
    pub(crate) fn skip_samples(&mut self, nsamples: u64) -> AudioResult<()> {
        let channels = u64::from(self.stream.ident_hdr.audio_channels);
        let count = nsamples
            .checked_mul(channels)
            .ok_or(AudioError::InvalidVorbis)?;
        let Self { stream, chunker } = self;
        chunker.skip(count, || {
            stream.read_dec_packet_itl().map_err(AudioError::from)
        })
    }

    /// Fill `out` with interleaved 16-bit little-endian samples.
    ///
    /// Returns the byte count written, which is less than `out.len()`
    /// only at end of stream.
    pub(crate) fn read_chunk(&mut self, out: &mut [u8]) -> AudioResult<usize> {
        let Self { stream, chunker } = self;
        chunker.read_chunk(out, || {
            stream.read_dec_packet_itl().map_err(AudioError::from)
        })
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.chunker.at_eof()
    }
}

/// Reassembles a stream of decoded packets into fixed-size byte
/// chunks.
///
/// Packet sizes never line up with chunk sizes, so decoded samples
/// that overflow the caller's buffer are parked in `pending` and
/// drained by the next read.
struct PacketChunker {
    pending: Vec<u8>,
    eof: bool,
}

impl PacketChunker {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            eof: false,
        }
    }

    /// Pull and discard `count` interleaved samples, keeping the
    /// overshoot of the last packet for the next read.
    fn skip<F>(&mut self, count: u64, mut next_packet: F) -> AudioResult<()>
    where
        F: FnMut() -> AudioResult<Option<Vec<i16>>>,
    {
        let mut left = count;
        while left > 0 {
            match next_packet()? {
                Some(packet) => {
                    let got = packet.len() as u64;
                    if got > left {
                        let keep = &packet[left as usize..];
                        self.pending.reserve(keep.len() * 2);
                        for &sample in keep {
                            self.pending.extend_from_slice(&sample.to_le_bytes());
                        }
                        left = 0;
                    } else {
                        left -= got;
                    }
                }
                None => {
                    self.eof = true;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Fill `out` with interleaved 16-bit little-endian samples,
    /// returning the byte count written.
    fn read_chunk<F>(&mut self, out: &mut [u8], mut next_packet: F) -> AudioResult<usize>
    where
        F: FnMut() -> AudioResult<Option<Vec<i16>>>,
    {
        let mut written = 0;

        // leftovers from the previous read first
        if !self.pending.is_empty() {
            let take = self.pending.len().min(out.len());
            out[..take].copy_from_slice(&self.pending[..take]);
            self.pending.drain(..take);
            written = take;
        }

        while written < out.len() && !self.eof {
            match next_packet()? {
                Some(packet) => {
                    for sample in packet {
                        let bytes = sample.to_le_bytes();
                        if written + 2 <= out.len() {
                            out[written..written + 2].copy_from_slice(&bytes);
                            written += 2;
                        } else {
                            self.pending.extend_from_slice(&bytes);
                        }
                    }
                }
                None => self.eof = true,
            }
        }
        Ok(written)
    }

    fn at_eof(&self) -> bool {
        self.eof && self.pending.is_empty()
    }
}
