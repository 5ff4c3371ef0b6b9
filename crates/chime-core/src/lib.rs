//! Chime Core - playback engine for the console's DSP voices
//!
//! The DSP exposes 24 hardware voices, each able to play a queue of
//! wave buffers out of DMA-capable memory. This crate owns everything
//! between a decoded audio file and those voices:
//! - decoders for Ogg Vorbis, PCM WAV and raw sample data
//! - the DMA heap accounting for chunk buffers
//! - the voice slot table and per-voice streaming sessions
//! - the per-frame decode-ahead update that keeps streams fed
//!
//! The hardware itself sits behind the [`voice::VoiceBackend`] trait;
//! the engine never blocks on it, it polls wave-buffer sequence
//! numbers once per frame.

pub mod decoder;
pub mod dma;
pub mod engine;
pub mod error;
pub mod types;
pub mod voice;

pub use decoder::{AudioSource, SourceFormat, VorbisComments, VorbisInfo};
pub use dma::{DmaBuffer, DmaHeap};
pub use engine::PlaybackEngine;
pub use error::{AudioError, AudioResult};
pub use types::*;
