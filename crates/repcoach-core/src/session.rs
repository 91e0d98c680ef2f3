//! Workout session state machine.
//!
//! Owns the coarse phase (warmup, exercising, resting, complete) and the
//! fine position (exercise index, set number). Transitions are
//! synchronous, pure computations -- the session never suspends, and a
//! transition fully commits before the next intent is processed. Timers
//! and audio live outside; they only feed intents back in.
//!
//! ## Phase graph
//!
//! ```text
//! Warmup -> Exercising(0,1) -> Resting -> Exercising -> ... -> Complete
//!    |            |
//!    '-- back ----'--- back at (0,1) --> exited
//! ```
//!
//! The last set of the last exercise transitions directly to `Complete`
//! with no trailing rest. "Back" from a rest always returns to the
//! exercise that triggered it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::WorkoutPlan;

/// Pointer into the plan: exercise index and 1-based set number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPosition {
    pub exercise: usize,
    pub set: u32,
}

impl SessionPosition {
    pub fn new(exercise: usize, set: u32) -> Self {
        Self { exercise, set }
    }
}

/// Coarse session state. Exactly one phase is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum SessionPhase {
    Warmup {
        /// Pre-seeded destination: the first exercise's first set.
        next: SessionPosition,
    },
    Exercising {
        position: SessionPosition,
    },
    Resting {
        /// The set whose completion triggered this rest.
        position: SessionPosition,
        /// Where the session goes when the rest finishes.
        next: SessionPosition,
    },
    Complete,
}

/// Every session transition produces an Event. The presentation adapter
/// reacts to events; announcements are keyed off them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    WarmupStarted {
        routine: String,
        at: DateTime<Utc>,
    },
    ExerciseStarted {
        exercise_index: usize,
        exercise: String,
        set: u32,
        total_sets: u32,
        at: DateTime<Utc>,
    },
    RestStarted {
        duration_secs: u32,
        next_exercise: String,
        next_set: u32,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        total_sets: u32,
        at: DateTime<Utc>,
    },
    /// Terminal side-exit: explicit "exit workout" or back from the very
    /// first set / the warmup screen.
    SessionExited {
        at: DateTime<Utc>,
    },
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub routine: String,
    /// Name of the exercise relevant to the current phase (the active
    /// exercise, or the upcoming one during warmup/rest).
    pub exercise: String,
    pub set: u32,
    pub total_sets_for_exercise: u32,
    pub reps: u32,
    pub rest_secs: u32,
    /// Sets fully completed so far, across the whole plan.
    pub completed_sets: u32,
    pub plan_total_sets: u32,
    pub exited: bool,
    pub at: DateTime<Utc>,
}

/// What follows the completion of the set at `pos`.
///
/// Pure: evaluates against the given (pre-transition) position only, so
/// the "is this the final action" check and the post-rest destination are
/// always computed from the same state.
pub fn compute_next(plan: &WorkoutPlan, pos: SessionPosition) -> SessionPhase {
    if pos.set < plan.set_count(pos.exercise) {
        SessionPhase::Resting {
            position: pos,
            next: SessionPosition::new(pos.exercise, pos.set + 1),
        }
    } else if pos.exercise + 1 < plan.len() {
        SessionPhase::Resting {
            position: pos,
            next: SessionPosition::new(pos.exercise + 1, 1),
        }
    } else {
        // Last set of the last exercise: no trailing rest.
        SessionPhase::Complete
    }
}

/// The workout session state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSession {
    plan: WorkoutPlan,
    phase: SessionPhase,
    exited: bool,
}

impl WorkoutSession {
    /// Start a session for a validated plan, in the warmup phase.
    pub fn new(plan: WorkoutPlan) -> Self {
        Self {
            plan,
            phase: SessionPhase::Warmup {
                next: SessionPosition::new(0, 1),
            },
            exited: false,
        }
    }

    pub fn plan(&self) -> &WorkoutPlan {
        &self.plan
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// True once the session reached `Complete` or was exited.
    pub fn is_over(&self) -> bool {
        self.exited || matches!(self.phase, SessionPhase::Complete)
    }

    /// Rest duration for the current `Resting` phase, taken from the
    /// exercise whose set triggered the rest.
    pub fn rest_duration_secs(&self) -> Option<u32> {
        match self.phase {
            SessionPhase::Resting { position, .. } => {
                self.plan.exercise(position.exercise).map(|e| e.rest_secs)
            }
            _ => None,
        }
    }

    // ── Intents ──────────────────────────────────────────────────────

    /// Advance: warmup done, set done, or rest skipped/elapsed.
    pub fn advance(&mut self) -> Option<SessionEvent> {
        if self.exited {
            return None;
        }
        match self.phase {
            SessionPhase::Warmup { next } => {
                self.phase = SessionPhase::Exercising { position: next };
                Some(self.exercise_started(next))
            }
            SessionPhase::Exercising { position } => {
                // Evaluate against the pre-transition position: the same
                // check decides both whether a rest happens and where it
                // leads.
                match compute_next(&self.plan, position) {
                    SessionPhase::Resting { position, next } => {
                        self.phase = SessionPhase::Resting { position, next };
                        Some(self.rest_started(position, next))
                    }
                    SessionPhase::Complete => {
                        self.phase = SessionPhase::Complete;
                        Some(SessionEvent::SessionCompleted {
                            total_sets: self.plan.total_sets(),
                            at: Utc::now(),
                        })
                    }
                    other => {
                        self.phase = other;
                        None
                    }
                }
            }
            SessionPhase::Resting { next, .. } => {
                self.phase = SessionPhase::Exercising { position: next };
                Some(self.exercise_started(next))
            }
            SessionPhase::Complete => None,
        }
    }

    /// Step backwards. From the very first set (or the warmup screen)
    /// this exits the session rather than underflowing the position.
    pub fn back(&mut self) -> Option<SessionEvent> {
        if self.exited {
            return None;
        }
        match self.phase {
            SessionPhase::Warmup { .. } => self.exit(),
            SessionPhase::Resting { position, .. } => {
                // Back from rest returns to the exercise that triggered
                // it, never further.
                self.phase = SessionPhase::Exercising { position };
                Some(self.exercise_started(position))
            }
            SessionPhase::Exercising { position } => {
                if position.exercise == 0 && position.set == 1 {
                    return self.exit();
                }
                let prev = if position.set > 1 {
                    SessionPosition::new(position.exercise, position.set - 1)
                } else {
                    let e = position.exercise - 1;
                    SessionPosition::new(e, self.plan.set_count(e))
                };
                self.phase = SessionPhase::Exercising { position: prev };
                Some(self.exercise_started(prev))
            }
            SessionPhase::Complete => None,
        }
    }

    /// Terminal side-exit, valid from any phase.
    pub fn exit(&mut self) -> Option<SessionEvent> {
        if self.exited {
            return None;
        }
        self.exited = true;
        Some(SessionEvent::SessionExited { at: Utc::now() })
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Build a full state snapshot for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        let (display_pos, set) = match self.phase {
            SessionPhase::Warmup { next } => (next, next.set),
            SessionPhase::Exercising { position } => (position, position.set),
            SessionPhase::Resting { next, .. } => (next, next.set),
            SessionPhase::Complete => {
                let last = self.plan.len().saturating_sub(1);
                (
                    SessionPosition::new(last, self.plan.set_count(last)),
                    self.plan.set_count(last),
                )
            }
        };
        let entry = self.plan.exercise(display_pos.exercise);
        SessionSnapshot {
            phase: self.phase,
            routine: self.plan.routine.name.clone(),
            exercise: entry.map(|e| e.name.clone()).unwrap_or_default(),
            set,
            total_sets_for_exercise: self.plan.set_count(display_pos.exercise),
            reps: entry.map(|e| e.reps).unwrap_or(0),
            rest_secs: entry.map(|e| e.rest_secs).unwrap_or(0),
            completed_sets: self.completed_sets(),
            plan_total_sets: self.plan.total_sets(),
            exited: self.exited,
            at: Utc::now(),
        }
    }

    /// Sets fully completed so far.
    fn completed_sets(&self) -> u32 {
        let done_before = |pos: SessionPosition| -> u32 {
            let prior: u32 = (0..pos.exercise).map(|e| self.plan.set_count(e)).sum();
            prior + (pos.set - 1)
        };
        match self.phase {
            SessionPhase::Warmup { .. } => 0,
            SessionPhase::Exercising { position } => done_before(position),
            // The set at `position` is done once its rest begins.
            SessionPhase::Resting { position, .. } => done_before(position) + 1,
            SessionPhase::Complete => self.plan.total_sets(),
        }
    }

    fn exercise_started(&self, pos: SessionPosition) -> SessionEvent {
        let entry = self.plan.exercise(pos.exercise);
        SessionEvent::ExerciseStarted {
            exercise_index: pos.exercise,
            exercise: entry.map(|e| e.name.clone()).unwrap_or_default(),
            set: pos.set,
            total_sets: self.plan.set_count(pos.exercise),
            at: Utc::now(),
        }
    }

    fn rest_started(&self, pos: SessionPosition, next: SessionPosition) -> SessionEvent {
        let duration = self
            .plan
            .exercise(pos.exercise)
            .map(|e| e.rest_secs)
            .unwrap_or(0);
        SessionEvent::RestStarted {
            duration_secs: duration,
            next_exercise: self
                .plan
                .exercise(next.exercise)
                .map(|e| e.name.clone())
                .unwrap_or_default(),
            next_set: next.set,
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ExerciseRecord, Routine, WorkoutPlan};
    use proptest::prelude::*;

    fn plan(sets: &[u32]) -> WorkoutPlan {
        let routine = Routine {
            id: "r1".into(),
            name: "Push".into(),
            description: String::new(),
            warmup_audio_url: None,
            created_at: None,
            updated_at: None,
        };
        let records = sets
            .iter()
            .enumerate()
            .map(|(i, &s)| ExerciseRecord {
                id: format!("ex{}", i),
                name: format!("Exercise {}", (b'A' + i as u8) as char),
                sets: s,
                reps: 10,
                rest_time: Some(30),
                rep_time: None,
                order: Some(i as u32),
            })
            .collect();
        WorkoutPlan::new(routine, records).unwrap()
    }

    fn position(session: &WorkoutSession) -> SessionPosition {
        match session.phase() {
            SessionPhase::Exercising { position } => position,
            other => panic!("expected Exercising, got {:?}", other),
        }
    }

    #[test]
    fn warmup_advance_enters_first_set() {
        let mut s = WorkoutSession::new(plan(&[3, 2]));
        assert!(matches!(s.phase(), SessionPhase::Warmup { next } if next == SessionPosition::new(0, 1)));
        let ev = s.advance().unwrap();
        assert!(matches!(ev, SessionEvent::ExerciseStarted { set: 1, .. }));
        assert_eq!(position(&s), SessionPosition::new(0, 1));
    }

    #[test]
    fn full_walk_visits_every_set_with_four_rests() {
        // Plan = [A: 3 sets, B: 2 sets] -> exactly 4 rest phases.
        let mut s = WorkoutSession::new(plan(&[3, 2]));
        s.advance(); // warmup -> Ex(A,1)

        let mut visited = vec![position(&s)];
        let mut rests = 0;
        loop {
            match s.advance() {
                Some(SessionEvent::RestStarted { .. }) => {
                    rests += 1;
                    s.advance(); // rest elapses
                    visited.push(position(&s));
                }
                Some(SessionEvent::SessionCompleted { total_sets, .. }) => {
                    assert_eq!(total_sets, 5);
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        assert_eq!(rests, 4);
        assert_eq!(
            visited,
            vec![
                SessionPosition::new(0, 1),
                SessionPosition::new(0, 2),
                SessionPosition::new(0, 3),
                SessionPosition::new(1, 1),
                SessionPosition::new(1, 2),
            ]
        );
        assert!(s.is_over());
    }

    #[test]
    fn last_set_of_last_exercise_completes_without_rest() {
        let mut s = WorkoutSession::new(plan(&[1]));
        s.advance(); // warmup
        let ev = s.advance().unwrap();
        assert!(matches!(ev, SessionEvent::SessionCompleted { .. }));
        assert_eq!(s.phase(), SessionPhase::Complete);
    }

    #[test]
    fn rest_carries_next_exercise_info() {
        let mut s = WorkoutSession::new(plan(&[1, 2]));
        s.advance(); // warmup -> Ex(A,1)
        match s.advance().unwrap() {
            SessionEvent::RestStarted {
                next_exercise,
                next_set,
                duration_secs,
                ..
            } => {
                assert_eq!(next_exercise, "Exercise B");
                assert_eq!(next_set, 1);
                assert_eq!(duration_secs, 30);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(s.rest_duration_secs(), Some(30));
    }

    #[test]
    fn back_from_rest_returns_to_triggering_exercise() {
        let mut s = WorkoutSession::new(plan(&[3]));
        s.advance(); // Ex(0,1)
        s.advance(); // Resting((0,1),(0,2))
        s.back();
        assert_eq!(position(&s), SessionPosition::new(0, 1));
    }

    #[test]
    fn back_at_first_set_exits_session() {
        let mut s = WorkoutSession::new(plan(&[3, 2]));
        s.advance(); // Ex(0,1)
        let ev = s.back().unwrap();
        assert!(matches!(ev, SessionEvent::SessionExited { .. }));
        assert!(s.is_over());
        // Terminal: further intents are ignored.
        assert!(s.advance().is_none());
        assert!(s.back().is_none());
    }

    #[test]
    fn back_from_warmup_exits() {
        let mut s = WorkoutSession::new(plan(&[2]));
        let ev = s.back().unwrap();
        assert!(matches!(ev, SessionEvent::SessionExited { .. }));
    }

    #[test]
    fn back_at_first_set_of_later_exercise_jumps_to_previous_last_set() {
        let mut s = WorkoutSession::new(plan(&[3, 2]));
        s.advance(); // Ex(0,1)
        for _ in 0..3 {
            s.advance(); // rest
            s.advance(); // next set
        }
        assert_eq!(position(&s), SessionPosition::new(1, 1));
        s.back();
        assert_eq!(position(&s), SessionPosition::new(0, 3));
    }

    #[test]
    fn exit_is_terminal_from_any_phase() {
        let mut s = WorkoutSession::new(plan(&[2, 2]));
        s.advance();
        s.advance(); // resting
        assert!(s.exit().is_some());
        assert!(s.is_over());
        assert!(s.exit().is_none());
        assert!(s.advance().is_none());
    }

    #[test]
    fn snapshot_tracks_progress() {
        let mut s = WorkoutSession::new(plan(&[2, 1]));
        assert_eq!(s.snapshot().completed_sets, 0);
        s.advance(); // Ex(0,1)
        assert_eq!(s.snapshot().completed_sets, 0);
        s.advance(); // Resting after (0,1)
        let snap = s.snapshot();
        assert_eq!(snap.completed_sets, 1);
        assert_eq!(snap.plan_total_sets, 3);
        s.advance(); // Ex(0,2)
        s.advance(); // Resting after (0,2)
        s.advance(); // Ex(1,1)
        s.advance(); // Complete
        assert_eq!(s.snapshot().completed_sets, 3);
    }

    proptest! {
        /// Advancing visits each (exercise, set) exactly once in
        /// ascending order, with one exercising-phase advance per set.
        #[test]
        fn advance_reaches_complete_in_total_sets_steps(
            sets in proptest::collection::vec(1u32..5, 1..6)
        ) {
            let mut s = WorkoutSession::new(plan(&sets));
            s.advance(); // warmup

            let total: u32 = sets.iter().sum();
            let mut exercising_advances = 0u32;
            let mut visited = vec![position(&s)];

            while !s.is_over() {
                let was_exercising = matches!(s.phase(), SessionPhase::Exercising { .. });
                s.advance();
                if was_exercising {
                    exercising_advances += 1;
                }
                if let SessionPhase::Exercising { position } = s.phase() {
                    visited.push(position);
                }
            }

            prop_assert_eq!(exercising_advances, total);
            prop_assert_eq!(visited.len() as u32, total);
            // Ascending, no repeats.
            for pair in visited.windows(2) {
                let earlier = (pair[0].exercise, pair[0].set);
                let later = (pair[1].exercise, pair[1].set);
                prop_assert!(earlier < later);
            }
        }

        /// back() is the left inverse of advance() for any position whose
        /// advance does not complete the session.
        #[test]
        fn back_undoes_advance(
            sets in proptest::collection::vec(1u32..5, 1..6),
            steps in 0usize..20
        ) {
            let mut s = WorkoutSession::new(plan(&sets));
            s.advance(); // warmup

            // Walk forward a bounded number of sets.
            for _ in 0..steps {
                if matches!(compute_next(s.plan(), position(&s)), SessionPhase::Complete) {
                    break;
                }
                s.advance(); // into rest
                s.advance(); // into next set
            }

            let here = position(&s);
            if !matches!(compute_next(s.plan(), here), SessionPhase::Complete) {
                s.advance(); // rest
                s.advance(); // next set
                s.back();    // back to the set whose rest we entered
                prop_assert_eq!(position(&s), here);
            }
        }
    }
}
