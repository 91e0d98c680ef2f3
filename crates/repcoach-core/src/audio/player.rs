//! Injected playback capability.
//!
//! The core never touches a concrete audio backend. Playback goes
//! through the `AnnouncementPlayer` trait, so the CLI can plug in a real
//! device-backed player while tests substitute a no-op or scripted
//! implementation. Autoplay restrictions are modeled as
//! `AudioError::PlaybackRejected` -- an expected outcome, not a fault.

use crate::audio::store::ClipHandle;
use crate::error::AudioError;

/// Playback backend for announcement audio.
///
/// Implementations own their threading; calls return as soon as playback
/// has been handed to the backend (as with spawning a sink thread).
pub trait AnnouncementPlayer: Send + Sync {
    /// Begin streaming playback straight from a remote reference.
    fn play_remote(&self, url: &str) -> Result<(), AudioError>;

    /// Begin playback of a locally materialized clip.
    fn play_clip(&self, clip: &ClipHandle) -> Result<(), AudioError>;

    /// Decode raw bytes and play them. The last-resort path.
    fn decode_and_play(&self, bytes: &[u8]) -> Result<(), AudioError>;

    /// Pause the backend's current output. Single-voice: at most one
    /// announcement plays at a time, and callers only invoke this for
    /// the announcement that is actually playing.
    fn pause(&self);
}

/// Silent player. Used when no audio backend is available -- the workout
/// keeps running, announcements degrade to silence.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayer;

impl AnnouncementPlayer for NullPlayer {
    fn play_remote(&self, _url: &str) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_clip(&self, _clip: &ClipHandle) -> Result<(), AudioError> {
        Ok(())
    }

    fn decode_and_play(&self, _bytes: &[u8]) -> Result<(), AudioError> {
        Ok(())
    }

    fn pause(&self) {}
}
