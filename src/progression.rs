//! Progression advisor
//!
//! Decides whether to suggest weight or rep increases for an exercise from
//! its last few completed sessions. The advisor is deliberately
//! conservative: it needs three qualifying sessions before it says
//! anything, and two consecutive on-target sessions before it nudges the
//! load. "Not enough data" is the expected steady state for new users and
//! yields an empty result, never an error.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProgressionConfig;
use crate::data_access::{DataAccess, ExerciseSession};
use crate::error::Result;

/// Exercise categories driving increment size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Bodyweight,
    Compound,
    Isolation,
}

/// Exercise-id fragments marking bodyweight movements
const BODYWEIGHT_KEYWORDS: &[&str] = &[
    "pushup",
    "push-up",
    "pullup",
    "pull-up",
    "chinup",
    "chin-up",
    "dip",
    "plank",
    "burpee",
    "muscle-up",
    "pistol",
    "inverted-row",
    "air-squat",
    "mountain-climber",
];

/// Exercise-id fragments marking compound barbell/dumbbell movements
const COMPOUND_KEYWORDS: &[&str] = &[
    "squat",
    "deadlift",
    "bench",
    "row",
    "press",
    "clean",
    "snatch",
    "lunge",
    "hip-thrust",
    "rdl",
];

impl ExerciseKind {
    /// Categorize an exercise by substring match against its identifier
    ///
    /// Bodyweight keywords win over compound ones so "inverted-row" is not
    /// mistaken for a barbell row.
    pub fn categorize(exercise_id: &str) -> Self {
        let id = exercise_id.to_lowercase();
        if BODYWEIGHT_KEYWORDS.iter().any(|kw| id.contains(kw)) {
            ExerciseKind::Bodyweight
        } else if COMPOUND_KEYWORDS.iter().any(|kw| id.contains(kw)) {
            ExerciseKind::Compound
        } else {
            ExerciseKind::Isolation
        }
    }
}

/// Confidence attached to a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
}

/// What kind of increase is being proposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Weight,
    Reps,
}

/// One per-exercise progression proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSuggestion {
    /// Exercise the suggestion applies to
    pub exercise_id: String,

    /// Weight vs rep increase
    pub kind: SuggestionKind,

    /// Weight increment in pounds; zero for rep suggestions
    pub increment: f64,

    /// Working weight the increment applies on top of
    pub current_weight: Option<f64>,

    /// Confidence in the proposal
    pub confidence: Confidence,

    /// Human-readable justification
    pub reason: String,
}

/// Suggestions for every exercise of one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionReport {
    /// Template the report covers
    pub template_id: String,

    /// Exercises that produced a suggestion
    pub suggestions: Vec<ProgressionSuggestion>,

    /// Exercises examined, including those with too little history
    pub exercises_analyzed: u32,
}

/// Progression analysis engine
pub struct ProgressionAdvisor {
    config: ProgressionConfig,
}

impl Default for ProgressionAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressionAdvisor {
    pub fn new() -> Self {
        ProgressionAdvisor {
            config: ProgressionConfig::default(),
        }
    }

    pub fn with_config(config: ProgressionConfig) -> Self {
        ProgressionAdvisor { config }
    }

    /// Weight increment for an exercise kind at a current working weight
    ///
    /// The larger of the kind-based increment (compound vs isolation) and
    /// the weight-tier increment, never below the floor.
    pub fn increment_for(&self, kind: ExerciseKind, current_weight: f64) -> f64 {
        let config = &self.config;
        let kind_increment = match kind {
            ExerciseKind::Compound => config.compound_increment,
            ExerciseKind::Isolation => config.isolation_increment,
            ExerciseKind::Bodyweight => return 0.0,
        };
        let tier_increment = if current_weight >= config.tier_two_weight {
            config.tier_two_increment
        } else if current_weight >= config.tier_one_weight {
            config.tier_one_increment
        } else {
            0.0
        };
        kind_increment.max(tier_increment).max(config.increment_floor)
    }

    /// Suggest a progression for one exercise from its session history
    /// (newest first). Returns None while fewer than the minimum number of
    /// qualifying sessions exist or when recent performance does not
    /// support an increase.
    pub fn suggest(
        &self,
        exercise_id: &str,
        history: &[ExerciseSession],
    ) -> Option<ProgressionSuggestion> {
        let config = &self.config;
        if history.len() < config.min_sessions {
            return None;
        }

        let last_two = &history[..2];
        let both_hit = last_two
            .iter()
            .all(|s| s.hit_target(config.hit_target_fraction));
        if !both_hit {
            return None;
        }

        let kind = ExerciseKind::categorize(exercise_id);
        if kind == ExerciseKind::Bodyweight {
            return Some(ProgressionSuggestion {
                exercise_id: exercise_id.to_string(),
                kind: SuggestionKind::Reps,
                increment: 0.0,
                current_weight: None,
                confidence: Confidence::High,
                reason: "Hit your targets two sessions running; add 2-3 reps per set"
                    .to_string(),
            });
        }

        let current_weight = last_two[0]
            .sets
            .iter()
            .map(|s| s.weight)
            .fold(f64::NEG_INFINITY, f64::max);
        let current_weight = if current_weight.is_finite() && current_weight > 0.0 {
            current_weight
        } else {
            0.0
        };
        let increment = self.increment_for(kind, current_weight);

        let both_exceeded = last_two.iter().all(|s| {
            s.exceeds_reps(config.rep_exceed_margin, config.hit_target_fraction)
        });

        let (confidence, reason) = if both_exceeded {
            (
                Confidence::High,
                format!(
                    "Beat your rep targets two sessions running; add {increment} lb"
                ),
            )
        } else {
            (
                Confidence::Medium,
                format!(
                    "Hit your targets two sessions running; try {increment} lb more when it feels right"
                ),
            )
        };

        Some(ProgressionSuggestion {
            exercise_id: exercise_id.to_string(),
            kind: SuggestionKind::Weight,
            increment,
            current_weight: Some(current_weight),
            confidence,
            reason,
        })
    }

    /// Build a progression report for every exercise in a template
    ///
    /// Unknown templates yield an empty report.
    pub async fn template_report(
        &self,
        store: &dyn DataAccess,
        user_id: &str,
        template_id: &str,
    ) -> Result<ProgressionReport> {
        let exercises = store.fetch_template_exercises(user_id, template_id).await?;
        let mut suggestions = Vec::new();
        for exercise in &exercises {
            let history = store
                .fetch_exercise_session_history(
                    user_id,
                    &exercise.exercise_id,
                    self.config.min_sessions,
                )
                .await?;
            if let Some(suggestion) = self.suggest(&exercise.exercise_id, &history) {
                suggestions.push(suggestion);
            }
        }
        Ok(ProgressionReport {
            template_id: template_id.to_string(),
            suggestions,
            exercises_analyzed: exercises.len() as u32,
        })
    }

    /// Apply a report's weight suggestions to the template defaults
    ///
    /// Each exercise updates independently; rep suggestions (increment 0)
    /// have no field to bump and are skipped. Returns the number of
    /// exercises updated.
    pub async fn apply(
        &self,
        store: &dyn DataAccess,
        user_id: &str,
        template_id: &str,
        report: &ProgressionReport,
    ) -> Result<u32> {
        let exercises = store.fetch_template_exercises(user_id, template_id).await?;
        let mut updated = 0;
        for suggestion in &report.suggestions {
            if suggestion.increment <= 0.0 {
                continue;
            }
            let Some(exercise) = exercises
                .iter()
                .find(|e| e.exercise_id == suggestion.exercise_id)
            else {
                continue;
            };
            let base = exercise
                .default_weight
                .or(suggestion.current_weight)
                .unwrap_or(0.0);
            let new_weight = base + suggestion.increment;
            store
                .update_template_exercise_weight(
                    user_id,
                    template_id,
                    &suggestion.exercise_id,
                    new_weight,
                )
                .await?;
            debug!(
                exercise = %suggestion.exercise_id,
                from = base,
                to = new_weight,
                "applied progression"
            );
            updated += 1;
        }
        Ok(updated)
    }
}
