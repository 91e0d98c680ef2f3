//! Workout plan model.
//!
//! A plan is an ordered list of exercises with set/rep/rest configuration,
//! validated once at session construction. The backend is expected to
//! return exercises already sorted by ordinal, but the plan re-sorts
//! defensively in case that contract is violated.

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Rest duration applied when an exercise has no configured rest time.
pub const DEFAULT_REST_SECS: u32 = 60;

/// A workout routine's metadata, as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Pre-generated intro narration, if the backend has one.
    #[serde(default)]
    pub warmup_audio_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One exercise within a routine, before normalization.
///
/// `rest_time` and `order` are optional on the wire; normalization fills
/// in [`DEFAULT_REST_SECS`] and a defensive sort order respectively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub id: String,
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default)]
    pub rest_time: Option<u32>,
    #[serde(default)]
    pub rep_time: Option<u32>,
    #[serde(default)]
    pub order: Option<u32>,
}

/// A normalized exercise entry. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExercisePlanEntry {
    pub id: String,
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    /// Rest between sets, in seconds. Zero is allowed.
    pub rest_secs: u32,
    /// Optional per-repetition duration in seconds (timed exercises).
    pub rep_secs: Option<u32>,
    /// Position within the routine after normalization.
    pub ordinal: u32,
}

/// A validated, ordered workout plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub routine: Routine,
    exercises: Vec<ExercisePlanEntry>,
}

impl WorkoutPlan {
    /// Build a plan from a routine and its exercise records.
    ///
    /// Rejects empty plans and zero-set exercises; everything else is
    /// normalized (ordinal re-sort, rest-time default).
    pub fn new(routine: Routine, records: Vec<ExerciseRecord>) -> Result<Self, PlanError> {
        if records.is_empty() {
            return Err(PlanError::EmptyPlan {
                routine: routine.name.clone(),
            });
        }
        if let Some(bad) = records.iter().find(|r| r.sets == 0) {
            return Err(PlanError::ZeroSets {
                exercise: bad.name.clone(),
            });
        }

        // Defensive re-sort: by ordinal when present, records without an
        // ordinal go last in name order.
        let mut records = records;
        records.sort_by(|a, b| match (a.order, b.order) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.name.cmp(&b.name)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.name.cmp(&b.name),
        });

        let exercises = records
            .into_iter()
            .enumerate()
            .map(|(i, r)| ExercisePlanEntry {
                id: r.id,
                name: r.name,
                sets: r.sets,
                reps: r.reps,
                rest_secs: r.rest_time.unwrap_or(DEFAULT_REST_SECS),
                rep_secs: r.rep_time,
                ordinal: i as u32,
            })
            .collect();

        Ok(Self { routine, exercises })
    }

    pub fn exercises(&self) -> &[ExercisePlanEntry] {
        &self.exercises
    }

    pub fn exercise(&self, index: usize) -> Option<&ExercisePlanEntry> {
        self.exercises.get(index)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Number of sets for the exercise at `index`. Zero for out of range.
    pub fn set_count(&self, index: usize) -> u32 {
        self.exercises.get(index).map(|e| e.sets).unwrap_or(0)
    }

    /// Total sets across the whole plan.
    pub fn total_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.sets).sum()
    }

    /// Rough workout duration in minutes: one minute per set plus the
    /// rest between sets, rounded up to the nearest 5 minutes.
    pub fn estimated_duration_min(&self) -> u32 {
        let total_sets = self.total_sets() as u64;
        let rest_secs: u64 = self
            .exercises
            .iter()
            .map(|e| u64::from(e.rest_secs) * u64::from(e.sets.saturating_sub(1)))
            .sum();
        let raw_min = total_sets + rest_secs / 60;
        let rounded = raw_min.div_ceil(5) * 5;
        if rounded == 0 {
            45
        } else {
            rounded as u32
        }
    }
}

/// Format a rest duration for display, e.g. "45 sec" or "1 min 30 sec".
pub fn format_rest_time(secs: u32) -> String {
    if secs < 60 {
        format!("{} sec", secs)
    } else {
        let minutes = secs / 60;
        let remaining = secs % 60;
        if remaining > 0 {
            format!("{} min {} sec", minutes, remaining)
        } else {
            format!("{} min", minutes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routine() -> Routine {
        Routine {
            id: "push".into(),
            name: "Push".into(),
            description: "Chest, shoulders, triceps".into(),
            warmup_audio_url: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn record(name: &str, sets: u32, order: Option<u32>) -> ExerciseRecord {
        ExerciseRecord {
            id: name.to_lowercase().replace(' ', "-"),
            name: name.into(),
            sets,
            reps: 10,
            rest_time: Some(90),
            rep_time: None,
            order,
        }
    }

    #[test]
    fn empty_plan_rejected() {
        let err = WorkoutPlan::new(routine(), vec![]).unwrap_err();
        assert!(matches!(err, PlanError::EmptyPlan { .. }));
    }

    #[test]
    fn zero_sets_rejected() {
        let err = WorkoutPlan::new(routine(), vec![record("Bench Press", 0, Some(0))]).unwrap_err();
        assert_eq!(
            err,
            PlanError::ZeroSets {
                exercise: "Bench Press".into()
            }
        );
    }

    #[test]
    fn resorts_by_ordinal() {
        let plan = WorkoutPlan::new(
            routine(),
            vec![
                record("Lateral Raises", 3, Some(2)),
                record("Bench Press", 4, Some(0)),
                record("Shoulder Press", 3, Some(1)),
            ],
        )
        .unwrap();
        let names: Vec<&str> = plan.exercises().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Bench Press", "Shoulder Press", "Lateral Raises"]);
        assert_eq!(plan.exercises()[0].ordinal, 0);
        assert_eq!(plan.exercises()[2].ordinal, 2);
    }

    #[test]
    fn missing_ordinal_falls_back_to_name_order() {
        let plan = WorkoutPlan::new(
            routine(),
            vec![
                record("Squats", 4, None),
                record("Leg Press", 3, None),
                record("Deadlift", 3, Some(0)),
            ],
        )
        .unwrap();
        let names: Vec<&str> = plan.exercises().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Deadlift", "Leg Press", "Squats"]);
    }

    #[test]
    fn missing_rest_defaults_to_sixty() {
        let mut rec = record("Bench Press", 4, Some(0));
        rec.rest_time = None;
        let plan = WorkoutPlan::new(routine(), vec![rec]).unwrap();
        assert_eq!(plan.exercises()[0].rest_secs, DEFAULT_REST_SECS);
    }

    #[test]
    fn total_sets_sums_all_exercises() {
        let plan = WorkoutPlan::new(
            routine(),
            vec![record("A", 3, Some(0)), record("B", 2, Some(1))],
        )
        .unwrap();
        assert_eq!(plan.total_sets(), 5);
    }

    #[test]
    fn duration_estimate_rounds_up_to_five() {
        // 5 sets + (90s * 2 + 90s * 1) rest = 5 + 4 = 9 min -> 10 min
        let plan = WorkoutPlan::new(
            routine(),
            vec![record("A", 3, Some(0)), record("B", 2, Some(1))],
        )
        .unwrap();
        assert_eq!(plan.estimated_duration_min(), 10);
    }

    #[test]
    fn format_rest_time_variants() {
        assert_eq!(format_rest_time(45), "45 sec");
        assert_eq!(format_rest_time(60), "1 min");
        assert_eq!(format_rest_time(90), "1 min 30 sec");
    }
}
