//! Playback engine: voice slots, sessions, per-frame update
//!
//! The engine owns every loaded [`AudioSource`], the binding of
//! sources to the 24 hardware voices, and the streaming sessions that
//! keep long clips fed. It is single-threaded by design: all decode
//! work happens inside [`PlaybackEngine::update`], which the host
//! calls once per frame.

mod session;

use std::collections::HashMap;
use std::path::Path;

use log::{debug, warn};

use crate::decoder::{AudioSource, SourceFormat};
use crate::dma::DmaHeap;
use crate::error::{AudioError, AudioResult};
use crate::types::{Interpolation, MixParams, SampleEncoding, SequenceId, SourceId, NUM_VOICES};
use crate::voice::VoiceBackend;

use session::StreamingSession;

pub struct PlaybackEngine<B: VoiceBackend> {
    backend: B,
    heap: DmaHeap,
    sources: HashMap<SourceId, AudioSource>,
    next_source: u64,
    /// Source most recently bound to each voice
    slots: [Option<SourceId>; NUM_VOICES],
    /// Streaming state for voices playing a streamed source
    sessions: [Option<StreamingSession>; NUM_VOICES],
}

fn check_voice(voice: usize) {
    assert!(
        voice < NUM_VOICES,
        "voice number must be between 0 and {}",
        NUM_VOICES - 1
    );
}

fn voice_range(voice: Option<usize>) -> std::ops::Range<usize> {
    match voice {
        Some(v) => {
            check_voice(v);
            v..v + 1
        }
        None => 0..NUM_VOICES,
    }
}

/// Push a source's parameters to a voice and queue its first chunk.
fn bind_voice<B: VoiceBackend>(
    backend: &mut B,
    voice: usize,
    source: &AudioSource,
    looping: bool,
) -> SequenceId {
    backend.reset(voice);
    backend.set_format(voice, source.channels, source.encoding);
    backend.set_rate(voice, (f64::from(source.sample_rate) * source.speed) as f32);
    backend.set_mix(voice, &source.mix);
    backend.set_interpolation(voice, source.interpolation);
    backend.flush_cache(&source.initial_chunk);
    backend.enqueue(voice, &source.initial_chunk, source.initial_nsamples, looping)
}

impl<B: VoiceBackend> PlaybackEngine<B> {
    pub fn new(backend: B, heap: DmaHeap) -> Self {
        Self {
            backend,
            heap,
            sources: HashMap::new(),
            next_source: 1,
            slots: [None; NUM_VOICES],
            sessions: std::array::from_fn(|_| None),
        }
    }

    pub fn heap(&self) -> &DmaHeap {
        &self.heap
    }

    /// Load an audio file into a new source. An omitted
    /// `chunk_duration` streams in
    /// [`DEFAULT_CHUNK_DURATION`](crate::types::DEFAULT_CHUNK_DURATION)-second
    /// chunks.
    pub fn load(
        &mut self,
        path: impl AsRef<Path>,
        format: Option<SourceFormat>,
        chunk_duration: Option<f64>,
    ) -> AudioResult<SourceId> {
        let source = AudioSource::load(path, format, chunk_duration, &self.heap)?;
        Ok(self.install(source))
    }

    /// Wrap raw sample data into a new source.
    pub fn load_raw(
        &mut self,
        data: &[u8],
        encoding: SampleEncoding,
        sample_rate: f32,
        channels: u16,
    ) -> AudioResult<SourceId> {
        let source = AudioSource::load_raw(data, encoding, sample_rate, channels, &self.heap)?;
        Ok(self.install(source))
    }

    fn install(&mut self, source: AudioSource) -> SourceId {
        let id = SourceId::new(self.next_source);
        self.next_source += 1;
        debug!(
            "loaded source: {:?}, {} Hz, {} ch, {:.3} s{}",
            source.format(),
            source.sample_rate(),
            source.channels(),
            source.duration(),
            if source.is_streaming() { ", streamed" } else { "" },
        );
        self.sources.insert(id, source);
        id
    }

    pub fn source(&self, id: SourceId) -> AudioResult<&AudioSource> {
        self.sources.get(&id).ok_or(AudioError::UnknownSource)
    }

    pub fn source_mut(&mut self, id: SourceId) -> AudioResult<&mut AudioSource> {
        self.sources.get_mut(&id).ok_or(AudioError::UnknownSource)
    }

    /// Drop a source, silencing any voice still playing it.
    pub fn unload(&mut self, id: SourceId) -> AudioResult<()> {
        if !self.sources.contains_key(&id) {
            return Err(AudioError::UnknownSource);
        }
        for voice in 0..NUM_VOICES {
            if self.slots[voice] == Some(id) {
                self.release_voice(voice);
            }
        }
        self.sources.remove(&id);
        Ok(())
    }

    /// Start playing a source, returning the voice it landed on.
    ///
    /// With `voice` unset, the first idle voice is picked;
    /// [`AudioError::NoVoiceAvailable`] means all 24 are busy. An
    /// explicit voice is taken over even if busy. Looping is only
    /// honored for sources that fit in one chunk; streamed playback
    /// runs the clip once.
    pub fn play(
        &mut self,
        id: SourceId,
        looping: bool,
        voice: Option<usize>,
    ) -> AudioResult<usize> {
        let source = self.sources.get(&id).ok_or(AudioError::UnknownSource)?;
        let streaming = source.is_streaming();
        let chunk_bytes = source.chunk_bytes;

        let voice = match voice {
            Some(v) => {
                check_voice(v);
                v
            }
            None => (0..NUM_VOICES)
                .find(|&v| !self.backend.is_playing(v))
                .ok_or(AudioError::NoVoiceAvailable)?,
        };

        // gather everything fallible before touching the voice, so a
        // failed play leaves the previous playback running
        let streaming_parts = if streaming {
            let reader = source.open_session_reader()?;
            let decode_buf = self.heap.alloc(chunk_bytes)?;
            let play_buf = self.heap.alloc(chunk_bytes)?;
            Some((reader, decode_buf, play_buf))
        } else {
            None
        };

        self.release_voice(voice);

        let Self {
            backend,
            sources,
            slots,
            sessions,
            ..
        } = self;
        let source = sources.get(&id).ok_or(AudioError::UnknownSource)?;
        let seq = bind_voice(backend, voice, source, looping && !streaming);
        slots[voice] = Some(id);
        sessions[voice] = streaming_parts.map(|(reader, decode_buf, play_buf)| {
            StreamingSession::new(source, reader, decode_buf, play_buf, seq)
        });
        Ok(voice)
    }

    /// Stop one voice, or all of them. Returns how many voices were
    /// actually playing something; a voice that was not playing is
    /// left untouched.
    pub fn stop(&mut self, voice: Option<usize>) -> usize {
        voice_range(voice)
            .filter(|&v| {
                let was_playing = self.backend.is_playing(v);
                if was_playing {
                    self.release_voice(v);
                }
                was_playing
            })
            .count()
    }

    /// Stop every voice playing `id` (or just `voice`, when it is
    /// bound to `id`). Returns how many were playing.
    pub fn stop_source(&mut self, id: SourceId, voice: Option<usize>) -> AudioResult<usize> {
        if !self.sources.contains_key(&id) {
            return Err(AudioError::UnknownSource);
        }
        let mut stopped = 0;
        for v in voice_range(voice) {
            if self.slots[v] == Some(id) && self.backend.is_playing(v) {
                self.release_voice(v);
                stopped += 1;
            }
        }
        Ok(stopped)
    }

    pub fn is_playing(&self, voice: usize) -> bool {
        check_voice(voice);
        self.backend.is_playing(voice)
    }

    /// Whether `id` is currently audible, on any voice or just on
    /// `voice`
    pub fn source_playing(&self, id: SourceId, voice: Option<usize>) -> bool {
        let check = |v: usize| self.slots[v] == Some(id) && self.backend.is_playing(v);
        match voice {
            Some(v) => {
                check_voice(v);
                check(v)
            }
            None => (0..NUM_VOICES).any(check),
        }
    }

    /// Number of voices with audio queued
    pub fn playing_count(&self) -> usize {
        (0..NUM_VOICES)
            .filter(|&v| self.backend.is_playing(v))
            .count()
    }

    /// Override the mix on one voice, or on all of them.
    pub fn set_voice_mix(&mut self, voice: Option<usize>, mix: &MixParams) {
        for v in voice_range(voice) {
            self.backend.set_mix(v, mix);
        }
    }

    pub fn set_voice_interpolation(&mut self, voice: Option<usize>, interp: Interpolation) {
        for v in voice_range(voice) {
            self.backend.set_interpolation(v, interp);
        }
    }

    /// Change the playback rate of whatever is on each targeted voice.
    /// Voices with no bound source are left untouched.
    pub fn set_voice_speed(&mut self, voice: Option<usize>, speed: f64) {
        for v in voice_range(voice) {
            if let Some(source) = self.slots[v].and_then(|id| self.sources.get(&id)) {
                self.backend
                    .set_rate(v, (f64::from(source.sample_rate) * speed) as f32);
            }
        }
    }

    /// Seconds into the clip for a voice playing `id`.
    ///
    /// With `voice` unset, the first voice bound to `id` is used.
    /// Returns 0.0 when nothing matches. After a streamed clip plays
    /// to completion the time reports the full clip length; an
    /// aborted stream freezes at the last fully played chunk.
    pub fn playback_time(&self, id: SourceId, voice: Option<usize>) -> f64 {
        let bound = |v: usize| self.slots[v] == Some(id);
        let v = match voice {
            Some(v) => {
                check_voice(v);
                if !bound(v) {
                    return 0.0;
                }
                v
            }
            None => match (0..NUM_VOICES).find(|&v| bound(v)) {
                Some(v) => v,
                None => return 0.0,
            },
        };
        let Some(source) = self.sources.get(&id) else {
            return 0.0;
        };
        let pos = f64::from(self.backend.sample_position(v)) / f64::from(source.sample_rate);
        match &self.sessions[v] {
            Some(session) => session.elapsed() + pos,
            None => pos,
        }
    }

    /// Per-frame decode-ahead for every streaming session.
    ///
    /// A decode failure stops only the session that hit it; other
    /// voices keep playing.
    pub fn update(&mut self) {
        let Self {
            backend, sessions, ..
        } = self;
        for (voice, slot) in sessions.iter_mut().enumerate() {
            if let Some(session) = slot {
                if let Err(err) = session.advance(voice, backend) {
                    warn!("voice {voice}: streaming decode failed, stopping stream: {err}");
                    session.abort();
                }
            }
        }
    }

    fn release_voice(&mut self, voice: usize) {
        self.backend.clear_queue(voice);
        self.sessions[voice] = None;
        self.slots[voice] = None;
    }
}
