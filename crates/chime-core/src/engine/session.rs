//! Double-buffered streaming session
//!
//! A session owns two chunk-sized DMA buffers and a decode cursor.
//! While one buffer plays, the other holds the next chunk, already
//! queued behind it. Each frame the engine compares the voice's
//! playing sequence number against the session's queued one; when the
//! queued buffer has started, the buffer that just finished is
//! refilled and re-queued. One decode per frame keeps the voice fed
//! as long as a chunk outlasts a frame.

use crate::decoder::{AudioSource, SessionReader};
use crate::dma::DmaBuffer;
use crate::error::AudioResult;
use crate::types::SequenceId;
use crate::voice::VoiceBackend;

pub(crate) struct StreamingSession {
    reader: SessionReader,
    /// Free buffer the next chunk decodes into
    decode_buf: Option<DmaBuffer>,
    /// Buffer most recently handed to the voice queue
    play_buf: Option<DmaBuffer>,
    /// Sequence of the buffer queued before `queued_seq`, while it is
    /// still playing
    playing_seq: Option<SequenceId>,
    /// Sequence of the most recently enqueued buffer
    queued_seq: Option<SequenceId>,
    /// Samples per channel in the most recently enqueued buffer
    /// (short for the final chunk of a clip)
    queued_nsamples: u32,
    eof: bool,
    done: bool,
    /// Seconds of audio from chunks that have fully played out
    elapsed_before: f64,
    chunk_samples: u32,
    frame_bytes: usize,
    sample_rate: f64,
}

impl StreamingSession {
    pub(crate) fn new(
        source: &AudioSource,
        reader: SessionReader,
        decode_buf: DmaBuffer,
        play_buf: DmaBuffer,
        initial_seq: SequenceId,
    ) -> Self {
        let eof = reader.at_eof();
        Self {
            reader,
            decode_buf: Some(decode_buf),
            play_buf: Some(play_buf),
            playing_seq: None,
            queued_seq: Some(initial_seq),
            queued_nsamples: source.initial_nsamples,
            eof,
            done: false,
            elapsed_before: 0.0,
            chunk_samples: source.chunk_samples,
            frame_bytes: usize::from(source.bytes_per_sample) * usize::from(source.channels),
            sample_rate: f64::from(source.sample_rate),
        }
    }

    /// One frame of decode-ahead.
    ///
    /// Decodes at most one chunk. A decode error leaves the session in
    /// a consistent state; the caller decides whether to abort.
    pub(crate) fn advance<B: VoiceBackend>(
        &mut self,
        voice: usize,
        backend: &mut B,
    ) -> AudioResult<()> {
        if self.done {
            return Ok(());
        }
        let current = backend.playing_sequence(voice);

        // a buffer the voice has moved past has fully played out
        if let Some(prev) = self.playing_seq {
            if current != prev {
                self.elapsed_before += f64::from(self.chunk_samples) / self.sample_rate;
                self.playing_seq = None;
            }
        }

        let Some(queued) = self.queued_seq else {
            return Ok(());
        };

        // the queued buffer started playing; refill the one that just
        // finished and queue it behind
        if current == queued && !self.eof {
            if let Some(buf) = self.decode_buf.as_mut() {
                let written = self.reader.read_chunk(buf.as_mut_slice())?;
                if self.reader.at_eof() {
                    self.eof = true;
                }
                if written > 0 {
                    backend.flush_cache(buf);
                    let nsamples = (written / self.frame_bytes) as u32;
                    let seq = backend.enqueue(voice, buf, nsamples, false);
                    self.playing_seq = Some(queued);
                    std::mem::swap(&mut self.decode_buf, &mut self.play_buf);
                    self.queued_seq = Some(seq);
                    self.queued_nsamples = nsamples;
                }
            }
        }

        // nothing left to decode and the voice has moved past the last
        // buffer: the stream is over, give the chunk memory back. The
        // final buffer finished too, so its (possibly short) duration
        // counts toward elapsed time; without it, time queries would
        // fall back below positions reported mid-chunk.
        if self.eof && self.playing_seq.is_none() {
            if let Some(last) = self.queued_seq {
                if current != last {
                    self.elapsed_before += f64::from(self.queued_nsamples) / self.sample_rate;
                    self.release();
                }
            }
        }

        Ok(())
    }

    /// Tear the session down early, keeping it queryable. Elapsed time
    /// freezes at the last fully played chunk.
    pub(crate) fn abort(&mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.decode_buf = None;
        self.play_buf = None;
        self.playing_seq = None;
        self.queued_seq = None;
        self.done = true;
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }

    /// Seconds of audio played before the chunk currently on the voice
    pub(crate) fn elapsed(&self) -> f64 {
        self.elapsed_before
    }
}
