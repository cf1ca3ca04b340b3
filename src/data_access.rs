//! Data access interface for the analytics pipeline
//!
//! The analytics core reads workout history through the [`DataAccess`]
//! trait; the surrounding application implements it against its relational
//! store. Implementations must only surface sets from completed sessions:
//! a session qualifies when `finished_at` is non-null and it was not ended
//! for inactivity. In-progress or abandoned sessions must never influence
//! scores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::error::DataAccessError;
use crate::models::{
    SessionSummary, SetRecord, TemplateExercise, TemplateExerciseSummary,
};

/// Per-muscle figures from the most recent session touching that muscle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSessionStats {
    /// When that session finished
    pub last_trained_at: DateTime<Utc>,

    /// Sets performed for this muscle in that session
    pub sets: u32,

    /// Total reps for this muscle in that session
    pub reps: u32,

    /// Strength volume for this muscle in that session, pounds
    pub volume: f64,
}

/// One (session, muscle) aggregate feeding the stimulus/recovery pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusRow {
    /// Muscle group, lower-cased
    pub muscle_group: String,

    /// Finish timestamp of the session
    pub finished_at: DateTime<Utc>,

    /// Strength sets performed
    pub strength_sets: u32,

    /// Strength volume, pounds
    pub strength_volume: f64,

    /// Cardio minutes performed
    pub cardio_minutes: f64,

    /// Cardio distance covered, when any set recorded one
    pub cardio_distance: Option<f64>,

    /// Incline-weighted cardio minutes (sum of incline percent x minutes),
    /// so the average grade is `cardio_incline_minutes / cardio_minutes`
    pub cardio_incline_minutes: f64,
}

/// Set figures for one exercise within one historical session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSetSummary {
    pub reps: u32,
    pub weight: f64,
    pub target_reps: Option<u32>,
    pub target_weight: Option<f64>,
}

/// One historical session of a single exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSession {
    /// When the session finished
    pub finished_at: DateTime<Utc>,

    /// All sets of the exercise in that session
    pub sets: Vec<ExerciseSetSummary>,
}

impl ExerciseSession {
    /// Whether this session hit its targets: at least `fraction` of its
    /// sets meet or exceed both target reps and target weight. Missing
    /// targets impose no requirement.
    pub fn hit_target(&self, fraction: f64) -> bool {
        if self.sets.is_empty() {
            return false;
        }
        let hits = self
            .sets
            .iter()
            .filter(|s| {
                let reps_ok = s.target_reps.map_or(true, |t| s.reps >= t);
                let weight_ok = s.target_weight.map_or(true, |t| s.weight >= t);
                reps_ok && weight_ok
            })
            .count();
        hits as f64 / self.sets.len() as f64 >= fraction
    }

    /// Whether this session clearly exceeded its rep targets: at least
    /// `fraction` of the sets with a rep target beat it by more than
    /// `margin` reps. Sessions with no rep targets never qualify.
    pub fn exceeds_reps(&self, margin: u32, fraction: f64) -> bool {
        let targeted: Vec<&ExerciseSetSummary> =
            self.sets.iter().filter(|s| s.target_reps.is_some()).collect();
        if targeted.is_empty() {
            return false;
        }
        let exceeding = targeted
            .iter()
            .filter(|s| s.target_reps.map_or(false, |t| s.reps > t + margin))
            .count();
        exceeding as f64 / targeted.len() as f64 >= fraction
    }
}

/// Read (and one write) operations the analytics core needs from the store
///
/// All history-returning operations are newest-first. Volume windows are
/// half-open `(start, end]` so adjacent windows never double-count a
/// session landing exactly on a boundary.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Strength volume per muscle group over a window
    async fn fetch_volume_by_muscle(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>, DataAccessError>;

    /// Most recent session figures per muscle group
    async fn fetch_last_session_by_muscle(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, LastSessionStats>, DataAccessError>;

    /// Per-session per-muscle aggregates since a point in time
    async fn fetch_stimulus_rows(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StimulusRow>, DataAccessError>;

    /// Saved templates with their muscle coverage
    async fn fetch_templates_with_muscles(
        &self,
        user_id: &str,
    ) -> Result<Vec<TemplateExerciseSummary>, DataAccessError>;

    /// Completed sessions since a point in time, newest first
    async fn fetch_recent_sessions_with_sets(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionSummary>, DataAccessError>;

    /// The last `limit` completed sessions containing an exercise,
    /// newest first
    async fn fetch_exercise_session_history(
        &self,
        user_id: &str,
        exercise_id: &str,
        limit: usize,
    ) -> Result<Vec<ExerciseSession>, DataAccessError>;

    /// Exercise rows of a template (empty when the template is unknown)
    async fn fetch_template_exercises(
        &self,
        user_id: &str,
        template_id: &str,
    ) -> Result<Vec<TemplateExercise>, DataAccessError>;

    /// Progression apply path: bump a template exercise's default weight
    async fn update_template_exercise_weight(
        &self,
        user_id: &str,
        template_id: &str,
        exercise_id: &str,
        new_weight: f64,
    ) -> Result<(), DataAccessError>;
}

/// One stored workout session with its sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub template_id: Option<String>,
    /// Null while the session is still in progress
    pub finished_at: Option<DateTime<Utc>>,
    /// Sessions auto-closed for inactivity never reach analytics
    pub ended_for_inactivity: bool,
    pub sets: Vec<SetRecord>,
}

impl SessionRecord {
    pub fn is_eligible(&self) -> bool {
        self.finished_at.is_some() && !self.ended_for_inactivity
    }
}

/// A stored template with its exercise rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub user_id: String,
    pub summary: TemplateExerciseSummary,
    pub exercises: Vec<TemplateExercise>,
}

/// In-memory `DataAccess` implementation
///
/// Derives every aggregate from raw session records, enforcing the
/// completed-session eligibility rule in one place. Used by tests and the
/// CLI seed path; the SQLite store mirrors its semantics in SQL.
pub struct InMemoryStore {
    sessions: Vec<SessionRecord>,
    templates: Mutex<Vec<TemplateRecord>>,
    /// Load credited to bodyweight sets without a recorded weight, pounds
    bodyweight_equivalent_lbs: f64,
}

impl InMemoryStore {
    pub fn new(sessions: Vec<SessionRecord>, templates: Vec<TemplateRecord>) -> Self {
        InMemoryStore {
            sessions,
            templates: Mutex::new(templates),
            bodyweight_equivalent_lbs: 100.0,
        }
    }

    pub fn with_bodyweight_equivalent(mut self, lbs: f64) -> Self {
        self.bodyweight_equivalent_lbs = lbs;
        self
    }

    fn eligible_sessions<'a>(
        &'a self,
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a SessionRecord> {
        self.sessions
            .iter()
            .filter(move |s| s.user_id == user_id && s.is_eligible())
    }
}

#[async_trait]
impl DataAccess for InMemoryStore {
    async fn fetch_volume_by_muscle(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>, DataAccessError> {
        let mut volumes: HashMap<String, f64> = HashMap::new();
        for session in self.eligible_sessions(user_id) {
            let finished = session.finished_at.unwrap_or(end);
            if finished <= start || finished > end {
                continue;
            }
            for set in session.sets.iter().filter(|s| !s.is_cardio()) {
                *volumes.entry(set.muscle_group.clone()).or_insert(0.0) +=
                    set.volume(self.bodyweight_equivalent_lbs);
            }
        }
        Ok(volumes)
    }

    async fn fetch_last_session_by_muscle(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, LastSessionStats>, DataAccessError> {
        let mut latest: HashMap<String, LastSessionStats> = HashMap::new();
        for session in self.eligible_sessions(user_id) {
            let finished = match session.finished_at {
                Some(t) => t,
                None => continue,
            };
            let mut per_muscle: HashMap<String, LastSessionStats> = HashMap::new();
            for set in session.sets.iter().filter(|s| !s.is_cardio()) {
                let entry =
                    per_muscle
                        .entry(set.muscle_group.clone())
                        .or_insert(LastSessionStats {
                            last_trained_at: finished,
                            sets: 0,
                            reps: 0,
                            volume: 0.0,
                        });
                entry.sets += 1;
                entry.reps += set.actual_reps.unwrap_or(0);
                entry.volume += set.volume(self.bodyweight_equivalent_lbs);
            }
            for (muscle, stats) in per_muscle {
                match latest.get(&muscle) {
                    Some(existing) if existing.last_trained_at >= finished => {}
                    _ => {
                        latest.insert(muscle, stats);
                    }
                }
            }
        }
        Ok(latest)
    }

    async fn fetch_stimulus_rows(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StimulusRow>, DataAccessError> {
        let mut rows: BTreeMap<(String, String), StimulusRow> = BTreeMap::new();
        for session in self.eligible_sessions(user_id) {
            let finished = match session.finished_at {
                Some(t) if t > since => t,
                _ => continue,
            };
            for set in &session.sets {
                let key = (session.id.clone(), set.muscle_group.clone());
                let row = rows.entry(key).or_insert(StimulusRow {
                    muscle_group: set.muscle_group.clone(),
                    finished_at: finished,
                    strength_sets: 0,
                    strength_volume: 0.0,
                    cardio_minutes: 0.0,
                    cardio_distance: None,
                    cardio_incline_minutes: 0.0,
                });
                if set.is_cardio() {
                    let minutes = set.actual_duration_min.unwrap_or(0.0);
                    row.cardio_minutes += minutes;
                    if let Some(distance) = set.actual_distance {
                        *row.cardio_distance.get_or_insert(0.0) += distance;
                    }
                    row.cardio_incline_minutes += set.actual_incline.unwrap_or(0.0) * minutes;
                } else {
                    row.strength_sets += 1;
                    row.strength_volume += set.volume(self.bodyweight_equivalent_lbs);
                }
            }
        }
        Ok(rows.into_values().collect())
    }

    async fn fetch_templates_with_muscles(
        &self,
        user_id: &str,
    ) -> Result<Vec<TemplateExerciseSummary>, DataAccessError> {
        let templates = self
            .templates
            .lock()
            .map_err(|_| DataAccessError::QueryFailed {
                reason: "template store poisoned".to_string(),
            })?;
        Ok(templates
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.summary.clone())
            .collect())
    }

    async fn fetch_recent_sessions_with_sets(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionSummary>, DataAccessError> {
        let mut summaries: Vec<SessionSummary> = self
            .eligible_sessions(user_id)
            .filter_map(|session| {
                let finished = session.finished_at?;
                if finished <= since {
                    return None;
                }
                let total_volume: f64 = session
                    .sets
                    .iter()
                    .filter(|s| !s.is_cardio())
                    .map(|s| s.volume(self.bodyweight_equivalent_lbs))
                    .sum();
                let rpes: Vec<f64> = session.sets.iter().filter_map(|s| s.rpe).collect();
                let avg_rpe = if rpes.is_empty() {
                    None
                } else {
                    Some(rpes.iter().sum::<f64>() / rpes.len() as f64)
                };
                let mut muscle_groups: Vec<String> = session
                    .sets
                    .iter()
                    .map(|s| s.muscle_group.clone())
                    .collect();
                muscle_groups.sort();
                muscle_groups.dedup();
                Some(SessionSummary {
                    id: session.id.clone(),
                    finished_at: finished,
                    total_volume,
                    set_count: session.sets.len() as u32,
                    avg_rpe,
                    muscle_groups,
                    template_id: session.template_id.clone(),
                })
            })
            .collect();
        summaries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        Ok(summaries)
    }

    async fn fetch_exercise_session_history(
        &self,
        user_id: &str,
        exercise_id: &str,
        limit: usize,
    ) -> Result<Vec<ExerciseSession>, DataAccessError> {
        let mut history: Vec<ExerciseSession> = self
            .eligible_sessions(user_id)
            .filter_map(|session| {
                let finished = session.finished_at?;
                let sets: Vec<ExerciseSetSummary> = session
                    .sets
                    .iter()
                    .filter(|s| s.exercise_id == exercise_id && !s.is_cardio())
                    .map(|s| ExerciseSetSummary {
                        reps: s.actual_reps.unwrap_or(0),
                        weight: s.actual_weight.unwrap_or(0.0),
                        target_reps: s.target_reps,
                        target_weight: s.target_weight,
                    })
                    .collect();
                if sets.is_empty() {
                    None
                } else {
                    Some(ExerciseSession {
                        finished_at: finished,
                        sets,
                    })
                }
            })
            .collect();
        history.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        history.truncate(limit);
        Ok(history)
    }

    async fn fetch_template_exercises(
        &self,
        user_id: &str,
        template_id: &str,
    ) -> Result<Vec<TemplateExercise>, DataAccessError> {
        let templates = self
            .templates
            .lock()
            .map_err(|_| DataAccessError::QueryFailed {
                reason: "template store poisoned".to_string(),
            })?;
        Ok(templates
            .iter()
            .find(|t| t.user_id == user_id && t.summary.id == template_id)
            .map(|t| t.exercises.clone())
            .unwrap_or_default())
    }

    async fn update_template_exercise_weight(
        &self,
        user_id: &str,
        template_id: &str,
        exercise_id: &str,
        new_weight: f64,
    ) -> Result<(), DataAccessError> {
        let mut templates = self
            .templates
            .lock()
            .map_err(|_| DataAccessError::QueryFailed {
                reason: "template store poisoned".to_string(),
            })?;
        let template = templates
            .iter_mut()
            .find(|t| t.user_id == user_id && t.summary.id == template_id)
            .ok_or_else(|| DataAccessError::NotFound {
                entity: "template".to_string(),
                id: template_id.to_string(),
            })?;
        let exercise = template
            .exercises
            .iter_mut()
            .find(|e| e.exercise_id == exercise_id)
            .ok_or_else(|| DataAccessError::NotFound {
                entity: "template_exercise".to_string(),
                id: exercise_id.to_string(),
            })?;
        exercise.default_weight = Some(new_weight);
        Ok(())
    }
}
