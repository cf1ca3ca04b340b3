use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Equipment categories for exercises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Equipment {
    Barbell,
    Dumbbell,
    Machine,
    Cable,
    Kettlebell,
    Band,
    Bodyweight,
    Other,
}

/// Broad exercise categories controlling which aggregation path a set feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Strength,
    Cardio,
}

/// Subjective difficulty rating attached to a performed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyRating {
    TooEasy,
    JustRight,
    TooHard,
}

/// One performed (or planned) set from a completed workout session
///
/// Only sets belonging to sessions with a non-null `finished_at` and not
/// ended for inactivity are eligible for analytics; the data layer enforces
/// this before a `SetRecord` ever reaches a scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRecord {
    /// Exercise identifier (catalog or custom exercise id)
    pub exercise_id: String,

    /// Resolved muscle group, lower-cased
    pub muscle_group: String,

    /// Equipment category of the exercise
    pub equipment: Equipment,

    /// Strength vs cardio categorization
    pub category: ExerciseCategory,

    /// Reps actually performed
    pub actual_reps: Option<u32>,

    /// Target reps from the plan
    pub target_reps: Option<u32>,

    /// Weight actually lifted in pounds
    pub actual_weight: Option<f64>,

    /// Target weight from the plan in pounds
    pub target_weight: Option<f64>,

    /// Duration actually performed in minutes (cardio)
    pub actual_duration_min: Option<f64>,

    /// Target duration in minutes
    pub target_duration_min: Option<f64>,

    /// Distance actually covered (cardio; unit auto-detected downstream)
    pub actual_distance: Option<f64>,

    /// Target distance
    pub target_distance: Option<f64>,

    /// Incline actually used as a percent grade (treadmill)
    pub actual_incline: Option<f64>,

    /// Target incline percent grade
    pub target_incline: Option<f64>,

    /// Rate of perceived exertion (1-10)
    pub rpe: Option<f64>,

    /// Subjective difficulty rating
    pub difficulty: Option<DifficultyRating>,

    /// Finish timestamp of the owning session
    pub finished_at: DateTime<Utc>,
}

impl SetRecord {
    /// Training volume of this set in pounds
    ///
    /// Volume = reps x weight. Bodyweight exercises without an explicit
    /// weight count at a fixed bodyweight-equivalent load; non-bodyweight
    /// sets without a weight contribute zero.
    pub fn volume(&self, bodyweight_equivalent: f64) -> f64 {
        let reps = f64::from(self.actual_reps.unwrap_or(0));
        let weight = match self.actual_weight {
            Some(w) if w > 0.0 => w,
            _ if self.equipment == Equipment::Bodyweight => bodyweight_equivalent,
            _ => 0.0,
        };
        reps * weight
    }

    pub fn is_cardio(&self) -> bool {
        self.category == ExerciseCategory::Cardio
    }
}

/// Resolve a set's muscle group with fallback chain:
/// custom-exercise override -> catalog exercise muscle group -> "other"
pub fn resolve_muscle_group(custom: Option<&str>, catalog: Option<&str>) -> String {
    custom
        .filter(|s| !s.trim().is_empty())
        .or(catalog)
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_else(|| "other".to_string())
}

/// Aggregated per-session totals derived from set history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier
    pub id: String,

    /// When the session was finished
    pub finished_at: DateTime<Utc>,

    /// Total strength volume in pounds
    pub total_volume: f64,

    /// Number of sets performed
    pub set_count: u32,

    /// Average RPE across sets that recorded one
    pub avg_rpe: Option<f64>,

    /// Muscle groups touched in this session (lower-cased)
    pub muscle_groups: Vec<String>,

    /// Template the session was started from, if any
    pub template_id: Option<String>,
}

/// A saved template's summary used for split matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExerciseSummary {
    /// Template identifier
    pub id: String,

    /// User-facing template name
    pub name: String,

    /// Split-type metadata, when the user tagged the template
    pub split_type: Option<SplitType>,

    /// Number of exercises in the template
    pub exercise_count: u32,

    /// Muscle groups covered by the template (lower-cased)
    pub muscle_groups: Vec<String>,

    /// Last time a session was started from this template
    pub last_used_at: Option<DateTime<Utc>>,
}

/// One exercise row inside a template, as needed by the progression advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    /// Exercise identifier
    pub exercise_id: String,

    /// Default working weight stored on the template, pounds
    pub default_weight: Option<f64>,

    /// Default rep target stored on the template
    pub default_reps: Option<u32>,
}

/// Workout split candidates the recommendation engine ranks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    Push,
    Pull,
    Legs,
    Upper,
    Lower,
    FullBody,
}

impl SplitType {
    /// Primary muscle groups trained by this split
    pub fn primary_muscles(&self) -> &'static [&'static str] {
        match self {
            SplitType::Push => &["chest", "shoulders", "triceps"],
            SplitType::Pull => &["back", "biceps"],
            SplitType::Legs | SplitType::Lower => &["quads", "hamstrings", "glutes", "calves"],
            SplitType::Upper => &["chest", "back", "shoulders", "biceps", "triceps"],
            SplitType::FullBody => &[
                "chest",
                "back",
                "shoulders",
                "biceps",
                "triceps",
                "quads",
                "hamstrings",
                "glutes",
                "calves",
            ],
        }
    }

    /// Name fragments that mark a template as belonging to this split
    pub fn name_keywords(&self) -> &'static [&'static str] {
        match self {
            SplitType::Push => &["push"],
            SplitType::Pull => &["pull"],
            SplitType::Legs => &["leg", "lower"],
            SplitType::Upper => &["upper"],
            SplitType::Lower => &["lower", "leg"],
            SplitType::FullBody => &["full body", "full-body", "total body"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SplitType::Push => "push",
            SplitType::Pull => "pull",
            SplitType::Legs => "legs",
            SplitType::Upper => "upper",
            SplitType::Lower => "lower",
            SplitType::FullBody => "full_body",
        }
    }

    /// Parse split metadata stored on templates ("push", "full_body", ...)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "push" => Some(SplitType::Push),
            "pull" => Some(SplitType::Pull),
            "legs" | "leg" => Some(SplitType::Legs),
            "upper" => Some(SplitType::Upper),
            "lower" => Some(SplitType::Lower),
            "full_body" | "full-body" | "fullbody" | "full" => Some(SplitType::FullBody),
            _ => None,
        }
    }

    /// Map a historical session to the split whose primaries best cover its
    /// muscle groups. Requires a strict majority of the session's muscles to
    /// be covered; sessions with no clear owner count as full-body.
    pub fn classify_session(muscle_groups: &[String]) -> SplitType {
        if muscle_groups.is_empty() {
            return SplitType::FullBody;
        }
        let candidates = [
            SplitType::Push,
            SplitType::Pull,
            SplitType::Legs,
            SplitType::Upper,
            SplitType::Lower,
        ];
        let mut best = SplitType::FullBody;
        let mut best_coverage = 0.0_f64;
        for candidate in candidates {
            let primaries = candidate.primary_muscles();
            let covered = muscle_groups
                .iter()
                .filter(|m| primaries.contains(&m.as_str()))
                .count();
            let coverage = covered as f64 / muscle_groups.len() as f64;
            if coverage > best_coverage {
                best_coverage = coverage;
                best = candidate;
            }
        }
        if best_coverage > 0.5 {
            best
        } else {
            SplitType::FullBody
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Canonical form of the user's preferred split setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPlan {
    Ppl,
    UpperLower,
    FullBody,
    Custom,
}

impl SplitPlan {
    /// Canonicalize the stored preference string, defaulting to full-body
    /// when unset or unrecognized
    pub fn canonicalize(preferred: Option<&str>) -> Self {
        match preferred.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("ppl") | Some("push_pull_legs") | Some("push/pull/legs") => SplitPlan::Ppl,
            Some("upper_lower") | Some("upper/lower") | Some("ul") => SplitPlan::UpperLower,
            Some("full_body") | Some("full-body") | Some("fullbody") => SplitPlan::FullBody,
            Some("custom") => SplitPlan::Custom,
            _ => SplitPlan::FullBody,
        }
    }

    /// The fixed rotation for this plan; custom plans derive their cycle
    /// from fatigue at recommendation time
    pub fn cycle(&self) -> Vec<SplitType> {
        match self {
            SplitPlan::Ppl => vec![SplitType::Push, SplitType::Pull, SplitType::Legs],
            SplitPlan::UpperLower => vec![SplitType::Upper, SplitType::Lower],
            SplitPlan::FullBody => vec![SplitType::FullBody],
            SplitPlan::Custom => Vec::new(),
        }
    }
}
