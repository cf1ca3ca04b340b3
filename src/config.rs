use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogConfig;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration metadata
    pub metadata: ConfigMetadata,

    /// General application settings
    pub settings: AppSettings,

    /// Analytics pipeline tuning
    pub analytics: AnalyticsConfig,

    /// Logging configuration
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Data directory path (workout database location)
    pub data_dir: PathBuf,

    /// Default user id for CLI invocations
    pub default_user_id: Option<String>,
}

/// Tunable constants for the analytics pipeline
///
/// Every scorer takes this by reference so the shipped defaults can be
/// overridden in tests or per-deployment without touching formula code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Volume/stimulus aggregation settings
    pub stimulus: StimulusConfig,

    /// Fatigue scoring settings
    pub fatigue: FatigueConfig,

    /// Next-workout recommendation settings
    pub recommendation: RecommendationConfig,

    /// Progression advisor settings
    pub progression: ProgressionConfig,

    /// Recap/quality scoring settings
    pub recap: RecapConfig,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            stimulus: StimulusConfig::default(),
            fatigue: FatigueConfig::default(),
            recommendation: RecommendationConfig::default(),
            progression: ProgressionConfig::default(),
            recap: RecapConfig::default(),
        }
    }
}

/// Stimulus/volume aggregation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusConfig {
    /// Load credited to a bodyweight set with no recorded weight, pounds
    pub bodyweight_equivalent_lbs: f64,

    /// Set count at which the set-count stimulus component saturates
    pub set_saturation: f64,

    /// Fraction of baseline weekly volume treated as a full stimulus dose
    pub baseline_dose_fraction: f64,

    /// Upper cap on the strength stimulus of one session for one muscle
    pub strength_stimulus_cap: f64,

    /// Absolute volume divisor used when no baseline exists, pounds
    pub absolute_volume_divisor: f64,

    /// Pace above which a recorded distance is assumed to be kilometres, mph
    pub km_detection_pace_mph: f64,

    /// Pace at which the ACSM walking equation hands over to running, mph
    pub walk_run_crossover_mph: f64,

    /// MET assumed for cardio with a duration but no distance
    pub default_cardio_met: f64,

    /// Minutes of MET-minutes per full cardio stimulus unit
    pub cardio_minutes_divisor: f64,

    /// Upper cap on the cardio stimulus of one session for one muscle
    pub cardio_stimulus_cap: f64,
}

impl Default for StimulusConfig {
    fn default() -> Self {
        StimulusConfig {
            bodyweight_equivalent_lbs: 100.0,
            set_saturation: 8.0,
            baseline_dose_fraction: 0.6,
            strength_stimulus_cap: 1.5,
            absolute_volume_divisor: 8000.0,
            km_detection_pace_mph: 12.0,
            walk_run_crossover_mph: 5.0,
            default_cardio_met: 3.5,
            cardio_minutes_divisor: 240.0,
            cardio_stimulus_cap: 0.9,
        }
    }
}

/// Fatigue scoring constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueConfig {
    /// Recent-volume window in days
    pub recent_window_days: i64,

    /// Number of weeks in the baseline window (days 8..=7*(weeks+1) back)
    pub baseline_weeks: i64,

    /// Stimulus window feeding the recovery-load accumulator, days
    pub stimulus_window_days: i64,

    /// Half-life of the recovery-load decay, hours
    pub decay_half_life_hours: f64,

    /// Score below which a muscle is under-trained
    pub under_trained_below: f64,

    /// Score at and above which a muscle is moderately fatigued
    pub moderate_fatigue_at: f64,

    /// Score at and above which a muscle is highly fatigued
    pub high_fatigue_at: f64,

    /// Score above which the `fatigued` flag is set
    pub fatigued_above: f64,

    /// Fraction of baseline weekly volume below which a deload is flagged
    pub deload_fraction: f64,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        FatigueConfig {
            recent_window_days: 7,
            baseline_weeks: 4,
            stimulus_window_days: 7,
            decay_half_life_hours: 36.0,
            under_trained_below: 70.0,
            moderate_fatigue_at: 110.0,
            high_fatigue_at: 130.0,
            fatigued_above: 130.0,
            deload_fraction: 0.5,
        }
    }
}

/// Next-workout recommendation constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Score every candidate split starts from
    pub base_score: f64,

    /// Bonus for the split next in the user's cycle
    pub cycle_bonus: f64,

    /// Penalty per occurrence of the split among recent workouts
    pub repetition_penalty: f64,

    /// Number of recent workouts the repetition penalty looks at
    pub repetition_lookback: usize,

    /// Penalty per avoided muscle overlapping the split's primaries
    pub avoided_muscle_penalty: f64,

    /// Average-fatigue tiers and their adjustments, checked top down
    pub fatigue_severe_at: f64,
    pub fatigue_severe_penalty: f64,
    pub fatigue_high_at: f64,
    pub fatigue_high_penalty: f64,
    pub fatigue_elevated_at: f64,
    pub fatigue_elevated_penalty: f64,
    pub fatigue_fresh_at: f64,
    pub fatigue_fresh_bonus: f64,

    /// Session-duration preference at or below which short-session
    /// adjustments apply, minutes
    pub short_session_minutes: u32,

    /// Adjustment for full-body (positive) and upper/lower (negative)
    /// when the user prefers short sessions
    pub time_fit_adjustment: f64,

    /// Fatigue-score gap between body regions that steers the custom cycle
    pub custom_region_gap: f64,

    /// Template match score for an exact split-type match
    pub match_exact: f64,

    /// Template match score for a name-keyword match
    pub match_keyword: f64,

    /// Template match score for a muscle-overlap match
    pub match_overlap: f64,

    /// Fraction of the split's primaries a template must cover
    pub overlap_primary_fraction: f64,

    /// Fraction of the template's own muscles that must be primaries
    pub overlap_template_fraction: f64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        RecommendationConfig {
            base_score: 100.0,
            cycle_bonus: 18.0,
            repetition_penalty: 6.0,
            repetition_lookback: 3,
            avoided_muscle_penalty: 18.0,
            fatigue_severe_at: 140.0,
            fatigue_severe_penalty: 26.0,
            fatigue_high_at: 125.0,
            fatigue_high_penalty: 16.0,
            fatigue_elevated_at: 110.0,
            fatigue_elevated_penalty: 8.0,
            fatigue_fresh_at: 80.0,
            fatigue_fresh_bonus: 8.0,
            short_session_minutes: 30,
            time_fit_adjustment: 6.0,
            custom_region_gap: 10.0,
            match_exact: 100.0,
            match_keyword: 90.0,
            match_overlap: 85.0,
            overlap_primary_fraction: 0.8,
            overlap_template_fraction: 0.6,
        }
    }
}

/// Progression advisor constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionConfig {
    /// Minimum qualifying sessions before any suggestion is made
    pub min_sessions: usize,

    /// Fraction of a session's sets that must meet both targets
    pub hit_target_fraction: f64,

    /// Reps beyond target that mark a session as clearly exceeding it
    pub rep_exceed_margin: u32,

    /// Weight increment for compound exercises, pounds
    pub compound_increment: f64,

    /// Weight increment for isolation exercises, pounds
    pub isolation_increment: f64,

    /// Weight tier at which the increment rises to 5 lbs
    pub tier_one_weight: f64,
    pub tier_one_increment: f64,

    /// Weight tier at which the increment rises to 10 lbs
    pub tier_two_weight: f64,
    pub tier_two_increment: f64,

    /// Smallest increment ever suggested, pounds
    pub increment_floor: f64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        ProgressionConfig {
            min_sessions: 3,
            hit_target_fraction: 0.75,
            rep_exceed_margin: 1,
            compound_increment: 5.0,
            isolation_increment: 2.5,
            tier_one_weight: 50.0,
            tier_one_increment: 5.0,
            tier_two_weight: 150.0,
            tier_two_increment: 10.0,
            increment_floor: 2.5,
        }
    }
}

/// Recap/quality scoring constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapConfig {
    /// Lookback window, weeks
    pub lookback_weeks: i64,

    /// Sessions needed before a rolling baseline is trusted
    pub baseline_min_sessions: usize,

    /// Quality score clamp bounds
    pub score_floor: f64,
    pub score_ceiling: f64,

    /// Volume-ratio clamp bounds
    pub volume_ratio_floor: f64,
    pub volume_ratio_ceiling: f64,

    /// RPE component clamp bounds and fallback
    pub rpe_component_floor: f64,
    pub rpe_component_ceiling: f64,
    pub rpe_component_default: f64,

    /// RPE the component is centered on, and its tolerance span
    pub rpe_center: f64,
    pub rpe_span: f64,

    /// RPE trend boost clamp bounds
    pub trend_boost_floor: f64,
    pub trend_boost_ceiling: f64,

    /// Score bands
    pub peak_at: f64,
    pub solid_at: f64,

    /// Consecutive dip sessions required to flag a quality dip
    pub dip_run_length: usize,

    /// Days without training before a win-back nudge fires
    pub win_back_gap_days: i64,

    /// Per-user cache TTL, seconds
    pub cache_ttl_secs: u64,
}

impl Default for RecapConfig {
    fn default() -> Self {
        RecapConfig {
            lookback_weeks: 8,
            baseline_min_sessions: 3,
            score_floor: 35.0,
            score_ceiling: 100.0,
            volume_ratio_floor: 0.4,
            volume_ratio_ceiling: 1.6,
            rpe_component_floor: 0.45,
            rpe_component_ceiling: 1.05,
            rpe_component_default: 0.75,
            rpe_center: 8.0,
            rpe_span: 5.0,
            trend_boost_floor: 0.9,
            trend_boost_ceiling: 1.1,
            peak_at: 90.0,
            solid_at: 75.0,
            dip_run_length: 2,
            win_back_gap_days: 5,
            cache_ttl_secs: 120,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let now = Utc::now();
        AppConfig {
            metadata: ConfigMetadata {
                version: "1.0".to_string(),
                created_at: now,
                updated_at: now,
            },
            settings: AppSettings {
                data_dir: default_data_dir(),
                default_user_id: None,
            },
            analytics: AnalyticsConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the given path, or fall back to defaults
    /// when no file exists yet
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Persist configuration to the given path, creating parent directories
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.metadata.updated_at = Utc::now();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serializing config")?;
        fs::write(path, raw).with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    /// Default config file location under the platform config directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("liftrs")
            .join("config.toml")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("liftrs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shipped_constants() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.stimulus.bodyweight_equivalent_lbs, 100.0);
        assert_eq!(config.fatigue.decay_half_life_hours, 36.0);
        assert_eq!(config.fatigue.under_trained_below, 70.0);
        assert_eq!(config.fatigue.high_fatigue_at, 130.0);
        assert_eq!(config.recommendation.cycle_bonus, 18.0);
        assert_eq!(config.progression.min_sessions, 3);
        assert_eq!(config.recap.cache_ttl_secs, 120);
        assert_eq!(config.recap.score_floor, 35.0);
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = AppConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.analytics, config.analytics);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.settings.default_user_id = Some("u1".to_string());
        config.save(&path).unwrap();

        let loaded = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.settings.default_user_id, Some("u1".to_string()));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = AppConfig::load_or_default(Path::new("/nonexistent/liftrs.toml")).unwrap();
        assert_eq!(config.analytics, AnalyticsConfig::default());
    }
}
