//! # Repcoach Core Library
//!
//! This library provides the core business logic for the repcoach guided
//! workout runtime. It implements a CLI-first philosophy where all
//! operations are available via a standalone CLI binary, with any GUI
//! being a thin presentation layer over the same core library.
//!
//! ## Architecture
//!
//! - **Session State Machine**: tracks phase (warmup, exercising,
//!   resting, complete), exercise index, and set number; computes
//!   next/back/exit transitions
//! - **Countdown Timer**: a wall-clock-based state machine that requires
//!   the caller to periodically invoke `tick()` for progress updates
//! - **Audio Delivery**: resolves announcement references into locally
//!   playable clips with retries, autoplay handling, and a decode
//!   fallback; failures degrade to silence
//! - **Announcement Resolver**: eagerly maps every (exercise, set,
//!   kind) the session could need to an audio engine handle
//!
//! ## Key Components
//!
//! - [`WorkoutSession`]: Session state machine
//! - [`Countdown`]: Wall-clock countdown timer
//! - [`AudioEngine`]: Per-announcement delivery engine
//! - [`AnnouncementResolver`]: Key-to-engine mapping and resolution
//! - [`Config`]: Application configuration management

pub mod announce;
pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod plan;
pub mod session;
pub mod timer;

pub use announce::{AnnouncementKey, AnnouncementKind, AnnouncementResolver};
pub use api::ApiClient;
pub use audio::{AnnouncementPlayer, AudioEngine, AudioStatus, ClipStore};
pub use config::Config;
pub use error::{ApiError, AudioError, ConfigError, CoreError, PlanError, Result};
pub use plan::{ExercisePlanEntry, ExerciseRecord, Routine, WorkoutPlan, DEFAULT_REST_SECS};
pub use session::{SessionEvent, SessionPhase, SessionPosition, SessionSnapshot, WorkoutSession};
pub use timer::{Countdown, CountdownEvent, CountdownState};
