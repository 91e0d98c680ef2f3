//! Resilient announcement audio delivery.
//!
//! Split by concern: `fetch` downloads and validates remote clips,
//! `store` owns the in-memory clip handles, `resource` is the pure
//! per-announcement lifecycle state machine, `player` is the backend
//! seam, and `engine` drives the delivery chain across all of them.

pub mod engine;
pub mod fetch;
pub mod player;
pub mod resource;
pub mod store;

pub use engine::AudioEngine;
pub use fetch::{cache_busted, ClipFetcher, FetchConfig, MIN_PAYLOAD_BYTES};
pub use player::{AnnouncementPlayer, NullPlayer};
pub use resource::{AudioStatus, DeliveryStage, PlaybackInput, PlaybackState, MAX_PLAY_ATTEMPTS};
pub use store::{ClipHandle, ClipStore};
