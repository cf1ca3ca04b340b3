//! Muscle fatigue scoring
//!
//! Produces a per-muscle fatigue report from completed workout history.
//! Two independent signals are computed per muscle group:
//!
//! - **Fatigue score**: last-7-day volume as a percentage of the athlete's
//!   own 4-week baseline weekly volume. 100 means training exactly at
//!   baseline; the status bands hang off this ratio.
//! - **Recovery load**: an exponentially-decayed stimulus accumulator with
//!   a 36-hour half-life, capturing short-term fatigue independent of the
//!   weekly ratio. It is reported alongside the score but never gates
//!   status.
//!
//! Missing history is modeled explicitly: a muscle with recent volume but
//! no baseline is assumed to be training at baseline (score 100), and a
//! muscle with neither reports `no-data` rather than zero-dividing.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::config::{FatigueConfig, StimulusConfig};
use crate::data_access::{DataAccess, LastSessionStats, StimulusRow};
use crate::error::Result;
use crate::volume::StimulusCalculator;

/// Per-muscle training state derived from the fatigue score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FatigueStatus {
    /// No volume in either window
    NoData,
    /// Training well below baseline; fully recovered
    UnderTrained,
    /// Training at baseline
    Optimal,
    /// Training moderately above baseline
    ModerateFatigue,
    /// Training far above baseline; recovery at risk
    HighFatigue,
}

impl FatigueStatus {
    /// Determine status from the fatigue score and data availability
    ///
    /// Status is a pure function of these three inputs; nothing else may
    /// influence it.
    pub fn from_score(
        score: f64,
        has_baseline: bool,
        has_recent_volume: bool,
        config: &FatigueConfig,
    ) -> Self {
        if !has_baseline && !has_recent_volume {
            return FatigueStatus::NoData;
        }
        if score < config.under_trained_below {
            FatigueStatus::UnderTrained
        } else if score < config.moderate_fatigue_at {
            FatigueStatus::Optimal
        } else if score < config.high_fatigue_at {
            FatigueStatus::ModerateFatigue
        } else {
            FatigueStatus::HighFatigue
        }
    }

    /// Display ordering: most urgent first
    pub fn severity_rank(&self) -> u8 {
        match self {
            FatigueStatus::HighFatigue => 0,
            FatigueStatus::ModerateFatigue => 1,
            FatigueStatus::Optimal => 2,
            FatigueStatus::UnderTrained => 3,
            FatigueStatus::NoData => 4,
        }
    }
}

impl fmt::Display for FatigueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FatigueStatus::NoData => "no-data",
            FatigueStatus::UnderTrained => "under-trained",
            FatigueStatus::Optimal => "optimal",
            FatigueStatus::ModerateFatigue => "moderate-fatigue",
            FatigueStatus::HighFatigue => "high-fatigue",
        };
        write!(f, "{}", label)
    }
}

/// Per-muscle-group fatigue snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleFatigueEntry {
    /// Muscle group, lower-cased
    pub muscle_group: String,

    /// Strength volume in the last 7 days, pounds
    pub last_7_days_volume: f64,

    /// Baseline weekly volume from the 4-week window, when enough history
    /// exists
    pub baseline_weekly_volume: Option<f64>,

    /// Last-7-day volume as a percentage of baseline (100 = at baseline)
    pub fatigue_score: f64,

    /// Decayed short-term stimulus accumulator
    pub recovery_load: f64,

    /// Status band derived from the fatigue score
    pub status: FatigueStatus,

    /// Score above the high-fatigue flag threshold
    pub fatigued: bool,

    /// Positive score below the under-trained threshold
    pub under_trained: bool,

    /// When this muscle was last trained
    pub last_trained_at: Option<DateTime<Utc>>,

    /// Set count of the most recent session touching this muscle
    pub last_session_sets: Option<u32>,

    /// Rep count of that session
    pub last_session_reps: Option<u32>,

    /// Volume of that session, pounds
    pub last_session_volume: Option<f64>,
}

/// Whole-body fatigue report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueReport {
    /// Per-muscle entries, most urgent status first
    pub entries: Vec<MuscleFatigueEntry>,

    /// Total strength volume over the last 7 days, pounds
    pub total_last_7_days_volume: f64,

    /// Total baseline weekly volume, when enough history exists
    pub total_baseline_weekly_volume: Option<f64>,

    /// Aggregate fatigue score over all muscles
    pub total_fatigue_score: f64,

    /// 0-100 readiness estimate derived from the aggregate score
    pub readiness_score: f64,

    /// True when last-7-day volume collapsed below half of baseline
    pub deload_recommended: bool,

    /// When the report was computed
    pub generated_at: DateTime<Utc>,
}

impl FatigueReport {
    /// Entry lookup by muscle group
    pub fn entry(&self, muscle_group: &str) -> Option<&MuscleFatigueEntry> {
        self.entries.iter().find(|e| e.muscle_group == muscle_group)
    }

    /// Average fatigue score across the given muscles, counting only
    /// muscles that have any data
    pub fn average_score(&self, muscles: &[&str]) -> Option<f64> {
        let scores: Vec<f64> = muscles
            .iter()
            .filter_map(|m| self.entry(m))
            .filter(|e| e.status != FatigueStatus::NoData)
            .map(|e| e.fatigue_score)
            .collect();
        if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    }
}

/// Prefetched inputs for one fatigue report
///
/// Kept separate from the fetch step so scoring is a pure function of
/// history.
#[derive(Debug, Clone, Default)]
pub struct FatigueInputs {
    /// Strength volume per muscle, last 7 days
    pub recent_volume: HashMap<String, f64>,

    /// Strength volume per muscle over the baseline window (days 8-35)
    pub baseline_window_volume: HashMap<String, f64>,

    /// Most recent session figures per muscle
    pub last_sessions: HashMap<String, LastSessionStats>,

    /// Per-session per-muscle aggregates over the stimulus window
    pub stimulus_rows: Vec<StimulusRow>,
}

/// Fatigue report computation engine
pub struct FatigueAnalyzer {
    config: FatigueConfig,
    stimulus: StimulusCalculator,
}

impl Default for FatigueAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FatigueAnalyzer {
    /// Create an analyzer with shipped constants
    pub fn new() -> Self {
        FatigueAnalyzer {
            config: FatigueConfig::default(),
            stimulus: StimulusCalculator::new(),
        }
    }

    /// Create an analyzer with custom constants
    pub fn with_config(config: FatigueConfig, stimulus: StimulusConfig) -> Self {
        FatigueAnalyzer {
            config,
            stimulus: StimulusCalculator::with_config(stimulus),
        }
    }

    /// Fetch history and compute the fatigue report for a user
    ///
    /// The four independent inputs are fetched concurrently; a failure in
    /// any of them fails the report.
    pub async fn report(
        &self,
        store: &dyn DataAccess,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FatigueReport> {
        let recent_start = now - Duration::days(self.config.recent_window_days);
        let baseline_start = recent_start - Duration::days(7 * self.config.baseline_weeks);
        let stimulus_start = now - Duration::days(self.config.stimulus_window_days);

        let (recent_volume, baseline_window_volume, last_sessions, stimulus_rows) = tokio::try_join!(
            store.fetch_volume_by_muscle(user_id, recent_start, now),
            store.fetch_volume_by_muscle(user_id, baseline_start, recent_start),
            store.fetch_last_session_by_muscle(user_id),
            store.fetch_stimulus_rows(user_id, stimulus_start),
        )?;

        let inputs = FatigueInputs {
            recent_volume,
            baseline_window_volume,
            last_sessions,
            stimulus_rows,
        };
        Ok(self.build_report(&inputs, now))
    }

    /// Compute the fatigue report from prefetched inputs
    pub fn build_report(&self, inputs: &FatigueInputs, now: DateTime<Utc>) -> FatigueReport {
        let muscles: BTreeSet<&String> = inputs
            .recent_volume
            .keys()
            .chain(inputs.baseline_window_volume.keys())
            .chain(inputs.last_sessions.keys())
            .chain(inputs.stimulus_rows.iter().map(|r| &r.muscle_group))
            .collect();

        let mut entries: Vec<MuscleFatigueEntry> = muscles
            .into_iter()
            .map(|muscle| self.build_entry(muscle, inputs, now))
            .collect();

        entries.sort_by(|a, b| {
            a.status
                .severity_rank()
                .cmp(&b.status.severity_rank())
                .then_with(|| {
                    if a.status == FatigueStatus::UnderTrained {
                        // Most under-trained first
                        a.fatigue_score
                            .partial_cmp(&b.fatigue_score)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    } else {
                        b.fatigue_score
                            .partial_cmp(&a.fatigue_score)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    }
                })
        });

        let total_last7: f64 = inputs.recent_volume.values().sum();
        let total_baseline_window: f64 = inputs.baseline_window_volume.values().sum();
        let total_baseline_weekly = self
            .stimulus
            .baseline_weekly(total_baseline_window, self.config.baseline_weeks);

        let total_fatigue_score = match total_baseline_weekly {
            Some(weekly) => total_last7 / weekly * 100.0,
            None if total_last7 > 0.0 => 100.0,
            None => 0.0,
        };
        let readiness_score = (150.0 - total_fatigue_score).clamp(0.0, 100.0);
        let deload_recommended = total_baseline_weekly
            .map(|weekly| total_last7 < weekly * self.config.deload_fraction)
            .unwrap_or(false);

        FatigueReport {
            entries,
            total_last_7_days_volume: total_last7,
            total_baseline_weekly_volume: total_baseline_weekly,
            total_fatigue_score,
            readiness_score,
            deload_recommended,
            generated_at: now,
        }
    }

    fn build_entry(
        &self,
        muscle: &str,
        inputs: &FatigueInputs,
        now: DateTime<Utc>,
    ) -> MuscleFatigueEntry {
        let last7 = inputs.recent_volume.get(muscle).copied().unwrap_or(0.0);
        let baseline_window = inputs
            .baseline_window_volume
            .get(muscle)
            .copied()
            .unwrap_or(0.0);
        let baseline_weekly = self
            .stimulus
            .baseline_weekly(baseline_window, self.config.baseline_weeks);

        let fatigue_score = match baseline_weekly {
            Some(weekly) => last7 / weekly * 100.0,
            // Recent volume with no baseline: assume the athlete is
            // training at their norm
            None if last7 > 0.0 => 100.0,
            None => 0.0,
        };

        let recovery_load = self.recovery_load(
            inputs
                .stimulus_rows
                .iter()
                .filter(|r| r.muscle_group == muscle),
            baseline_weekly,
            now,
        );

        let status = FatigueStatus::from_score(
            fatigue_score,
            baseline_weekly.is_some(),
            last7 > 0.0,
            &self.config,
        );

        let last = inputs.last_sessions.get(muscle);

        MuscleFatigueEntry {
            muscle_group: muscle.to_string(),
            last_7_days_volume: last7,
            baseline_weekly_volume: baseline_weekly,
            fatigue_score,
            recovery_load,
            status,
            fatigued: fatigue_score > self.config.fatigued_above,
            under_trained: fatigue_score > 0.0 && fatigue_score < self.config.under_trained_below,
            last_trained_at: last.map(|l| l.last_trained_at),
            last_session_sets: last.map(|l| l.sets),
            last_session_reps: last.map(|l| l.reps),
            last_session_volume: last.map(|l| l.volume),
        }
    }

    /// Decayed stimulus accumulator over the stimulus window
    ///
    /// Each session contributes its stimulus scaled by
    /// `0.5^(age_hours / half_life)`.
    fn recovery_load<'a>(
        &self,
        rows: impl Iterator<Item = &'a StimulusRow>,
        baseline_weekly: Option<f64>,
        now: DateTime<Utc>,
    ) -> f64 {
        rows.map(|row| {
            let age_hours =
                ((now - row.finished_at).num_minutes() as f64 / 60.0).max(0.0);
            let stimulus = self.stimulus.session_stimulus(row, baseline_weekly);
            stimulus * 0.5_f64.powf(age_hours / self.config.decay_half_life_hours)
        })
        .sum()
    }
}
