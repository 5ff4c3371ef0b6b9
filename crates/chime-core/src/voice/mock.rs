//! Deterministic in-memory voice backend for tests
//!
//! Playback progress is driven explicitly through [`MockBackend::tick`],
//! so tests control exactly how many samples "played" between engine
//! updates.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::dma::DmaBuffer;
use crate::types::{Interpolation, MixParams, SampleEncoding, SequenceId, NUM_VOICES};
use crate::voice::VoiceBackend;

#[derive(Debug, Clone, Copy)]
struct QueuedBuf {
    seq: SequenceId,
    nsamples: u32,
    looping: bool,
}

#[derive(Debug, Default)]
struct MockVoice {
    /// Front of the queue is the buffer currently playing
    queue: VecDeque<QueuedBuf>,
    sample_pos: u32,
    rate: f32,
    mix: MixParams,
    interp: Interpolation,
    format: Option<(u16, SampleEncoding)>,
}

impl MockVoice {
    fn reset(&mut self) {
        *self = MockVoice::default();
    }
}

pub(crate) struct MockBackend {
    voices: Vec<MockVoice>,
    next_seq: SequenceId,
    flushes: AtomicUsize,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            voices: (0..NUM_VOICES).map(|_| MockVoice::default()).collect(),
            next_seq: 0,
            flushes: AtomicUsize::new(0),
        }
    }

    /// Advance playback on a voice by `frames` samples, consuming
    /// queued buffers as they finish. Looping buffers wrap in place.
    pub(crate) fn tick(&mut self, voice: usize, frames: u32) {
        let v = &mut self.voices[voice];
        let mut left = frames;
        while left > 0 {
            let Some(front) = v.queue.front().copied() else {
                v.sample_pos = 0;
                return;
            };
            let remaining = front.nsamples - v.sample_pos;
            if left < remaining {
                v.sample_pos += left;
                return;
            }
            left -= remaining;
            if front.looping {
                v.sample_pos = 0;
                // a looping buffer never finishes; burn whole loops
                left %= front.nsamples.max(1);
                v.sample_pos = left;
                return;
            }
            v.queue.pop_front();
            v.sample_pos = 0;
        }
    }

    /// Buffers currently queued on a voice (including the playing one)
    pub(crate) fn queued_len(&self, voice: usize) -> usize {
        self.voices[voice].queue.len()
    }

    pub(crate) fn rate(&self, voice: usize) -> f32 {
        self.voices[voice].rate
    }

    pub(crate) fn mix(&self, voice: usize) -> &MixParams {
        &self.voices[voice].mix
    }

    pub(crate) fn interpolation(&self, voice: usize) -> Interpolation {
        self.voices[voice].interp
    }

    pub(crate) fn format(&self, voice: usize) -> Option<(u16, SampleEncoding)> {
        self.voices[voice].format
    }

    pub(crate) fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }
}

impl VoiceBackend for MockBackend {
    fn is_playing(&self, voice: usize) -> bool {
        !self.voices[voice].queue.is_empty()
    }

    fn reset(&mut self, voice: usize) {
        self.voices[voice].reset();
    }

    fn set_format(&mut self, voice: usize, channels: u16, encoding: SampleEncoding) {
        self.voices[voice].format = Some((channels, encoding));
    }

    fn set_rate(&mut self, voice: usize, rate: f32) {
        self.voices[voice].rate = rate;
    }

    fn set_mix(&mut self, voice: usize, mix: &MixParams) {
        self.voices[voice].mix = *mix;
    }

    fn set_interpolation(&mut self, voice: usize, interp: Interpolation) {
        self.voices[voice].interp = interp;
    }

    fn enqueue(
        &mut self,
        voice: usize,
        _buf: &DmaBuffer,
        nsamples: u32,
        looping: bool,
    ) -> SequenceId {
        self.next_seq = self.next_seq.wrapping_add(1);
        if self.next_seq == 0 {
            self.next_seq = 1;
        }
        let seq = self.next_seq;
        self.voices[voice].queue.push_back(QueuedBuf {
            seq,
            nsamples,
            looping,
        });
        seq
    }

    fn playing_sequence(&self, voice: usize) -> SequenceId {
        self.voices[voice].queue.front().map_or(0, |b| b.seq)
    }

    fn sample_position(&self, voice: usize) -> u32 {
        self.voices[voice].sample_pos
    }

    fn clear_queue(&mut self, voice: usize) {
        self.voices[voice].queue.clear();
        self.voices[voice].sample_pos = 0;
    }

    fn flush_cache(&self, _buf: &DmaBuffer) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::DmaHeap;

    #[test]
    fn test_queue_progress() {
        let heap = DmaHeap::new(1024);
        let buf = heap.alloc(64).unwrap();
        let mut backend = MockBackend::new();

        assert!(!backend.is_playing(0));
        assert_eq!(backend.playing_sequence(0), 0);

        let s1 = backend.enqueue(0, &buf, 100, false);
        let s2 = backend.enqueue(0, &buf, 100, false);
        assert!(backend.is_playing(0));
        assert_eq!(backend.playing_sequence(0), s1);

        backend.tick(0, 40);
        assert_eq!(backend.sample_position(0), 40);

        backend.tick(0, 60);
        assert_eq!(backend.playing_sequence(0), s2);
        assert_eq!(backend.sample_position(0), 0);

        backend.tick(0, 100);
        assert!(!backend.is_playing(0));
        assert_eq!(backend.playing_sequence(0), 0);
    }

    #[test]
    fn test_looping_buffer_wraps() {
        let heap = DmaHeap::new(1024);
        let buf = heap.alloc(64).unwrap();
        let mut backend = MockBackend::new();

        let s1 = backend.enqueue(0, &buf, 50, true);
        backend.tick(0, 130);
        assert_eq!(backend.playing_sequence(0), s1);
        assert_eq!(backend.sample_position(0), 30);
        assert!(backend.is_playing(0));
    }
}
