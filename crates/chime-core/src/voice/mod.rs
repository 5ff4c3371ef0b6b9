//! Hardware voice interface
//!
//! The DSP plays audio asynchronously over DMA while the CPU keeps
//! running; the engine never blocks on it. Each voice consumes a
//! queue of wave buffers, and every enqueued buffer gets a
//! monotonically increasing sequence number. Comparing the voice's
//! currently-playing sequence number against the ones we enqueued is
//! the only synchronization primitive the streaming code needs.
//!
//! Everything the engine requires from the hardware sits behind
//! [`VoiceBackend`], so the streaming logic can be exercised against
//! a deterministic in-memory implementation in tests.

#[cfg(test)]
pub(crate) mod mock;

use crate::dma::DmaBuffer;
use crate::types::{Interpolation, MixParams, SampleEncoding, SequenceId};

/// Capabilities the playback engine needs from the DSP voice driver.
pub trait VoiceBackend {
    /// Whether the voice has a wave buffer queued or playing
    fn is_playing(&self, voice: usize) -> bool;

    /// Reset the voice to its power-on parameter state
    fn reset(&mut self, voice: usize);

    fn set_format(&mut self, voice: usize, channels: u16, encoding: SampleEncoding);

    /// Playback rate in Hz
    fn set_rate(&mut self, voice: usize, rate: f32);

    fn set_mix(&mut self, voice: usize, mix: &MixParams);

    fn set_interpolation(&mut self, voice: usize, interp: Interpolation);

    /// Append a wave buffer to the voice queue.
    ///
    /// `nsamples` counts samples per channel and may be smaller than
    /// the buffer's capacity (short final chunks are enqueued at
    /// their actual size). The returned sequence number identifies
    /// the buffer in later [`VoiceBackend::playing_sequence`]
    /// comparisons.
    fn enqueue(&mut self, voice: usize, buf: &DmaBuffer, nsamples: u32, looping: bool)
        -> SequenceId;

    /// Sequence number of the buffer currently playing, 0 when idle
    fn playing_sequence(&self, voice: usize) -> SequenceId;

    /// Sample counter within the buffer currently playing
    fn sample_position(&self, voice: usize) -> u32;

    /// Drop every queued wave buffer and stop the voice
    fn clear_queue(&mut self, voice: usize);

    /// Write back the CPU data cache over the buffer's range.
    ///
    /// Must be called before a buffer is enqueued; the DSP reads the
    /// data via DMA and does not see dirty cache lines.
    fn flush_cache(&self, buf: &DmaBuffer);
}
