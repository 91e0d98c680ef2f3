//! Announcement identity, narration text, and eager resolution.
//!
//! The resolver decouples "what to say" from "how to play it": it
//! enumerates every announcement a session could need up front, kicks
//! off one independent synthesis/download task per key, and hands the
//! presentation layer pre-keyed [`AudioEngine`] handles. Resolution
//! completes in any order; a key that fails resolves to a silent engine
//! and never blocks any other key or the session itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::api::ApiClient;
use crate::audio::engine::AudioEngine;
use crate::audio::fetch::ClipFetcher;
use crate::audio::player::AnnouncementPlayer;
use crate::audio::store::ClipStore;
use crate::plan::{format_rest_time, WorkoutPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnouncementKind {
    ExerciseStart,
    RestStart,
}

impl fmt::Display for AnnouncementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExerciseStart => write!(f, "exercise-start"),
            Self::RestStart => write!(f, "rest-start"),
        }
    }
}

/// Deterministic identity of one announcement.
///
/// Keys are derived purely from position, never from resolution state,
/// so out-of-order resolution cannot mis-address an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnouncementKey {
    /// The once-per-session opening narration.
    Intro,
    Set {
        exercise_id: String,
        set: u32,
        kind: AnnouncementKind,
    },
}

impl AnnouncementKey {
    pub fn intro() -> Self {
        Self::Intro
    }

    pub fn for_set(exercise_id: &str, set: u32, kind: AnnouncementKind) -> Self {
        Self::Set {
            exercise_id: exercise_id.to_string(),
            set,
            kind,
        }
    }
}

impl fmt::Display for AnnouncementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intro => write!(f, "intro"),
            Self::Set {
                exercise_id,
                set,
                kind,
            } => write!(f, "{exercise_id}:set{set}:{kind}"),
        }
    }
}

// ── Narration templates ──────────────────────────────────────────────

pub fn exercise_start_text(exercise_name: &str, set: u32, total_sets: u32) -> String {
    format!("Starting {exercise_name}, set {set} of {total_sets}.")
}

pub fn rest_start_text(rest_secs: u32) -> String {
    format!("Set complete. Rest for {}.", format_rest_time(rest_secs))
}

/// Templated session-opening narration built from routine metadata.
/// Used when the backend cannot produce a pre-recorded intro.
pub fn intro_text(plan: &WorkoutPlan) -> String {
    let routine = &plan.routine;
    let count = plan.len();
    let first = plan
        .exercise(0)
        .map(|e| e.name.as_str())
        .unwrap_or("your first exercise");
    let exercises_word = if count == 1 { "exercise" } else { "exercises" };
    format!(
        "Welcome to {}. Today's session has {} {}, starting with {}. \
         Expect around {} minutes. Let's warm up.",
        routine.name,
        count,
        exercises_word,
        first,
        plan.estimated_duration_min()
    )
}

/// Every per-set announcement a session over `plan` could need, with its
/// narration text. One exercise-start per set; one rest-start per set
/// except the very last set of the session.
pub fn keys_for_plan(plan: &WorkoutPlan) -> Vec<(AnnouncementKey, String)> {
    let mut keys = Vec::new();
    let last_exercise = plan.len().saturating_sub(1);
    for (index, exercise) in plan.exercises().iter().enumerate() {
        for set in 1..=exercise.sets {
            keys.push((
                AnnouncementKey::for_set(&exercise.id, set, AnnouncementKind::ExerciseStart),
                exercise_start_text(&exercise.name, set, exercise.sets),
            ));
            let final_set_of_session = index == last_exercise && set == exercise.sets;
            if !final_set_of_session {
                keys.push((
                    AnnouncementKey::for_set(&exercise.id, set, AnnouncementKind::RestStart),
                    rest_start_text(exercise.rest_secs),
                ));
            }
        }
    }
    keys
}

// ── Resolver ─────────────────────────────────────────────────────────

/// Sole owner and mutator of the `AnnouncementKey -> AudioEngine` map.
pub struct AnnouncementResolver {
    api: Arc<ApiClient>,
    store: Arc<RwLock<ClipStore>>,
    fetcher: Arc<ClipFetcher>,
    player: Arc<dyn AnnouncementPlayer>,
    engines: RwLock<HashMap<AnnouncementKey, Arc<AudioEngine>>>,
}

impl AnnouncementResolver {
    pub fn new(api: Arc<ApiClient>, player: Arc<dyn AnnouncementPlayer>) -> Self {
        Self {
            api,
            store: Arc::new(RwLock::new(ClipStore::new())),
            fetcher: Arc::new(ClipFetcher::new()),
            player,
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Register engines for every announcement the plan needs and spawn
    /// one resolution task per key. Engines are visible via
    /// [`engine_for`](Self::engine_for) immediately, before resolution
    /// completes. The returned handles let callers await quiescence;
    /// dropping them detaches the tasks.
    pub async fn resolve_plan(&self, plan: &WorkoutPlan) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        handles.push(self.spawn_intro(plan).await);

        for (key, text) in keys_for_plan(plan) {
            let engine = self.register(key.clone()).await;
            let api = self.api.clone();
            handles.push(tokio::spawn(async move {
                match api.request_announcement_audio(&text).await {
                    Ok(url) => engine.load(&url).await,
                    Err(e) => {
                        tracing::warn!(key = %engine.key(), error = %e, "announcement synthesis failed");
                        engine.mark_unavailable(&e.to_string()).await;
                    }
                }
            }));
        }
        handles
    }

    async fn spawn_intro(&self, plan: &WorkoutPlan) -> JoinHandle<()> {
        let engine = self.register(AnnouncementKey::intro()).await;
        let api = self.api.clone();
        let routine_id = plan.routine.id.clone();
        let prerecorded = plan.routine.warmup_audio_url.clone();
        let narration = intro_text(plan);
        tokio::spawn(async move {
            if let Some(url) = prerecorded {
                engine.load(&url).await;
                return;
            }
            match api.request_intro_audio(&routine_id).await {
                Ok(url) => engine.load(&url).await,
                Err(e) => {
                    tracing::debug!(error = %e, "no backend intro, synthesizing templated narration");
                    match api.request_announcement_audio(&narration).await {
                        Ok(url) => engine.load(&url).await,
                        Err(e) => {
                            tracing::warn!(error = %e, "intro narration unavailable");
                            engine.mark_unavailable(&e.to_string()).await;
                        }
                    }
                }
            }
        })
    }

    async fn register(&self, key: AnnouncementKey) -> Arc<AudioEngine> {
        let engine = Arc::new(AudioEngine::new(
            key.clone(),
            self.store.clone(),
            self.fetcher.clone(),
            self.player.clone(),
        ));
        self.engines.write().await.insert(key, engine.clone());
        engine
    }

    /// Read-only handle lookup for the presentation layer.
    pub async fn engine_for(&self, key: &AnnouncementKey) -> Option<Arc<AudioEngine>> {
        self.engines.read().await.get(key).cloned()
    }

    pub async fn resolved_count(&self) -> usize {
        self.engines.read().await.len()
    }

    /// Session teardown: release every engine and its local clip.
    pub async fn release_all(&self) {
        let engines: Vec<Arc<AudioEngine>> =
            self.engines.read().await.values().cloned().collect();
        for engine in engines {
            engine.release().await;
        }
        self.store.write().await.release_all();
        self.engines.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::player::testing::ScriptedPlayer;
    use crate::audio::resource::AudioStatus;
    use crate::plan::{ExerciseRecord, Routine};

    fn record(id: &str, name: &str, sets: u32, order: u32) -> ExerciseRecord {
        ExerciseRecord {
            id: id.into(),
            name: name.into(),
            sets,
            reps: 8,
            rest_time: Some(60),
            rep_time: None,
            order: Some(order),
        }
    }

    fn plan() -> WorkoutPlan {
        let routine = Routine {
            id: "push".into(),
            name: "Push Day".into(),
            description: "Chest and triceps".into(),
            warmup_audio_url: None,
            created_at: None,
            updated_at: None,
        };
        WorkoutPlan::new(
            routine,
            vec![
                record("bench", "Bench Press", 3, 0),
                record("dips", "Dips", 2, 1),
            ],
        )
        .unwrap()
    }

    #[test]
    fn enumerates_one_rest_fewer_than_sets() {
        let keys = keys_for_plan(&plan());
        let starts = keys
            .iter()
            .filter(|(k, _)| {
                matches!(
                    k,
                    AnnouncementKey::Set {
                        kind: AnnouncementKind::ExerciseStart,
                        ..
                    }
                )
            })
            .count();
        let rests = keys
            .iter()
            .filter(|(k, _)| {
                matches!(
                    k,
                    AnnouncementKey::Set {
                        kind: AnnouncementKind::RestStart,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(starts, 5);
        assert_eq!(rests, 4);

        // No rest after the final set of the session.
        let last_rest = AnnouncementKey::for_set("dips", 2, AnnouncementKind::RestStart);
        assert!(!keys.iter().any(|(k, _)| *k == last_rest));
    }

    #[test]
    fn narration_templates() {
        assert_eq!(
            exercise_start_text("Bench Press", 2, 3),
            "Starting Bench Press, set 2 of 3."
        );
        assert_eq!(rest_start_text(90), "Set complete. Rest for 1 min 30 sec.");

        let text = intro_text(&plan());
        assert!(text.contains("Push Day"));
        assert!(text.contains("2 exercises"));
        assert!(text.contains("Bench Press"));
    }

    #[tokio::test]
    async fn resolves_every_key_and_tolerates_any_completion_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/routines/push/generate-intro")
            .with_body(format!(r#"{{"audio_url":"{}/clips/intro.mp3"}}"#, server.url()))
            .create_async()
            .await;
        server
            .mock("POST", "/api/announcements/generate")
            .with_body(format!(r#"{{"audio_url":"{}/clips/line.mp3"}}"#, server.url()))
            .expect(9)
            .create_async()
            .await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/clips/.*".into()))
            .match_query(mockito::Matcher::Any)
            .with_header("content-type", "audio/mpeg")
            .with_body(vec![1u8; 2048])
            .expect_at_least(10)
            .create_async()
            .await;

        let api = Arc::new(ApiClient::new(&format!("{}/api", server.url())).unwrap());
        let resolver =
            AnnouncementResolver::new(api, Arc::new(ScriptedPlayer::new(vec![])));
        let handles = resolver.resolve_plan(&plan()).await;

        // Intro + 5 exercise starts + 4 rests.
        assert_eq!(resolver.resolved_count().await, 10);

        for handle in handles {
            handle.await.unwrap();
        }

        let key = AnnouncementKey::for_set("dips", 1, AnnouncementKind::ExerciseStart);
        let engine = resolver.engine_for(&key).await.unwrap();
        assert_eq!(engine.status().await, AudioStatus::Ready);
        let intro = resolver.engine_for(&AnnouncementKey::intro()).await.unwrap();
        assert_eq!(intro.status().await, AudioStatus::Ready);
    }

    #[tokio::test]
    async fn synthesis_failure_is_isolated_to_its_key() {
        let mut server = mockito::Server::new_async().await;
        // Intro synthesis fails outright, both directly and via the
        // templated-narration fallback.
        server
            .mock("POST", "/api/routines/push/generate-intro")
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("POST", "/api/announcements/generate")
            .with_body(format!(r#"{{"audio_url":"{}/clips/line.mp3"}}"#, server.url()))
            .create_async()
            .await;
        // Defined last so it takes precedence for the intro narration.
        server
            .mock("POST", "/api/announcements/generate")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "text": intro_text(&plan())
            })))
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("GET", mockito::Matcher::Regex(r"^/clips/.*".into()))
            .match_query(mockito::Matcher::Any)
            .with_header("content-type", "audio/mpeg")
            .with_body(vec![1u8; 2048])
            .create_async()
            .await;

        let api = Arc::new(ApiClient::new(&format!("{}/api", server.url())).unwrap());
        let resolver =
            AnnouncementResolver::new(api, Arc::new(ScriptedPlayer::new(vec![])));
        for handle in resolver.resolve_plan(&plan()).await {
            handle.await.unwrap();
        }

        let intro = resolver.engine_for(&AnnouncementKey::intro()).await.unwrap();
        assert!(matches!(intro.status().await, AudioStatus::Error { .. }));

        // Every per-set key still resolved.
        let key = AnnouncementKey::for_set("bench", 3, AnnouncementKind::ExerciseStart);
        let engine = resolver.engine_for(&key).await.unwrap();
        assert_eq!(engine.status().await, AudioStatus::Ready);
    }

    #[tokio::test]
    async fn release_all_drops_engines_and_clips() {
        let api = Arc::new(ApiClient::new("http://localhost:1/api").unwrap());
        let resolver =
            AnnouncementResolver::new(api, Arc::new(ScriptedPlayer::new(vec![])));
        let handles = resolver.resolve_plan(&plan()).await;
        // Resolution will fail against the dead endpoint; that is fine
        // here, the map is populated regardless.
        assert_eq!(resolver.resolved_count().await, 10);

        resolver.release_all().await;
        assert_eq!(resolver.resolved_count().await, 0);
        assert!(resolver
            .engine_for(&AnnouncementKey::intro())
            .await
            .is_none());
        for handle in handles {
            let _ = handle.await;
        }
    }
}
