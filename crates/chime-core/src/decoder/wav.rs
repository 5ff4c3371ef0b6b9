//! PCM WAV container reading
//!
//! Hand-parsed RIFF: a restricted profile of `RIFF`/`WAVE` with a
//! 16-byte PCM-only `fmt ` chunk followed by a `data` chunk. Unknown
//! chunks sitting between `fmt ` and `data` are skipped by their
//! declared size; reaching end of file before `data` is a structural
//! error.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::decoder::{chunk_counts, AudioSource, SourceKind};
use crate::dma::DmaHeap;
use crate::error::{AudioError, AudioResult};
use crate::types::{Interpolation, MixParams, SampleEncoding};

/// Format facts pulled from the header, plus where the sample data
/// lives in the file.
#[derive(Debug, Clone)]
pub(crate) struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub data_start: u64,
    pub data_size: u32,
}

fn read_tag(reader: &mut impl Read, err: &'static str) -> AudioResult<[u8; 4]> {
    let mut tag = [0u8; 4];
    reader
        .read_exact(&mut tag)
        .map_err(|_| AudioError::InvalidWav(err))?;
    Ok(tag)
}

fn read_u16(reader: &mut impl Read, err: &'static str) -> AudioResult<u16> {
    let mut bytes = [0u8; 2];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| AudioError::InvalidWav(err))?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32(reader: &mut impl Read, err: &'static str) -> AudioResult<u32> {
    let mut bytes = [0u8; 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| AudioError::InvalidWav(err))?;
    Ok(u32::from_le_bytes(bytes))
}

pub(crate) fn parse_header(reader: &mut (impl Read + Seek)) -> AudioResult<WavHeader> {
    // Master chunk
    if &read_tag(reader, "truncated header")? != b"RIFF" {
        return Err(AudioError::InvalidWav("missing RIFF tag"));
    }
    reader.seek(SeekFrom::Current(4))?; // master chunk size
    if &read_tag(reader, "truncated header")? != b"WAVE" {
        return Err(AudioError::InvalidWav("missing WAVE id"));
    }

    // fmt chunk
    if &read_tag(reader, "truncated header")? != b"fmt " {
        return Err(AudioError::InvalidWav("missing fmt chunk"));
    }
    if read_u32(reader, "truncated fmt chunk")? != 16 {
        return Err(AudioError::InvalidWav("fmt chunk is not plain PCM"));
    }
    if read_u16(reader, "truncated fmt chunk")? != 0x0001 {
        return Err(AudioError::InvalidWav("format tag is not PCM"));
    }
    let channels = read_u16(reader, "truncated fmt chunk")?;
    let sample_rate = read_u32(reader, "truncated fmt chunk")?;
    let _avg_bytes_per_sec = read_u32(reader, "truncated fmt chunk")?;
    let block_align = read_u16(reader, "truncated fmt chunk")?;
    let bits_per_sample = read_u16(reader, "truncated fmt chunk")?;

    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(AudioError::UnsupportedWavEncoding(bits_per_sample));
    }
    if channels == 0 {
        return Err(AudioError::InvalidWav("zero channels"));
    }
    if u32::from(block_align) != u32::from(channels) * u32::from(bits_per_sample / 8) {
        return Err(AudioError::InvalidWav("block alignment mismatch"));
    }

    // Chunks other than `data` may sit here (LIST, bext, cue, ...);
    // skip each by its declared size.
    loop {
        let tag = read_tag(reader, "no data chunk before end of file")?;
        if &tag == b"data" {
            break;
        }
        let size = read_u32(reader, "no data chunk before end of file")?;
        reader
            .seek(SeekFrom::Current(i64::from(size)))
            .map_err(|_| AudioError::InvalidWav("no data chunk before end of file"))?;
    }

    let data_size = read_u32(reader, "truncated data chunk header")?;
    let data_start = reader.stream_position()?;

    Ok(WavHeader {
        channels,
        sample_rate,
        bits_per_sample,
        data_start,
        data_size,
    })
}

pub(crate) fn load(path: &Path, chunk_duration: f64, heap: &DmaHeap) -> AudioResult<AudioSource> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let header = parse_header(&mut reader)?;

    let encoding = if header.bits_per_sample == 8 {
        SampleEncoding::Pcm8
    } else {
        SampleEncoding::Pcm16
    };
    let bytes_per_sample = header.bits_per_sample / 8;
    let frame_bytes = usize::from(bytes_per_sample) * usize::from(header.channels);
    let total_bytes = u64::from(header.data_size);
    let total_samples = total_bytes / frame_bytes as u64;

    let (chunk_samples, chunk_bytes) =
        chunk_counts(chunk_duration, f64::from(header.sample_rate), total_samples, frame_bytes);

    let mut initial_chunk = heap.alloc(chunk_bytes)?;
    let take = chunk_bytes.min(total_bytes as usize);
    reader
        .read_exact(&mut initial_chunk.as_mut_slice()[..take])
        .map_err(|_| AudioError::InvalidWav("data chunk shorter than declared"))?;

    Ok(AudioSource {
        kind: SourceKind::Wav {
            path: path.to_path_buf(),
            data_start: header.data_start,
            data_size: total_bytes,
            initial_bytes: take as u64,
        },
        sample_rate: header.sample_rate as f32,
        channels: header.channels,
        encoding,
        bytes_per_sample,
        total_samples,
        total_bytes,
        chunk_samples,
        chunk_bytes,
        initial_nsamples: (take / frame_bytes) as u32,
        initial_chunk,
        mix: MixParams::default(),
        interpolation: Interpolation::default(),
        speed: 1.0,
    })
}

/// Per-play read cursor over the `data` chunk.
///
/// Every playback session opens its own file handle, so concurrent
/// plays of the same file never fight over one cursor.
pub(crate) struct WavChunkReader {
    reader: BufReader<File>,
    data_size: u64,
    /// Bytes into the data chunk
    pos: u64,
    eof: bool,
}

impl WavChunkReader {
    pub(crate) fn open(
        path: &Path,
        data_start: u64,
        data_size: u64,
        start_offset: u64,
    ) -> AudioResult<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(data_start + start_offset))?;
        Ok(Self {
            reader,
            data_size,
            pos: start_offset,
            eof: start_offset >= data_size,
        })
    }

    /// Read up to `out.len()` bytes, capped by the remaining data
    /// chunk. Returns the byte count actually read; the final chunk
    /// of a clip is usually short.
    pub(crate) fn read_chunk(&mut self, out: &mut [u8]) -> AudioResult<usize> {
        let remaining = (self.data_size - self.pos) as usize;
        let want = remaining.min(out.len());
        if want == 0 {
            self.eof = true;
            return Ok(0);
        }
        self.reader.read_exact(&mut out[..want])?;
        self.pos += want as u64;
        if self.pos == self.data_size {
            self.eof = true;
        }
        Ok(want)
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.eof
    }
}
