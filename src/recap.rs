//! Session recap and quality scoring
//!
//! Scores each recent session for quality against the athlete's own
//! rolling baselines (median volume, average RPE), detects streaks over
//! UTC calendar days, and flags quality dips worth a nudge. Results are
//! cached per user for a short TTL; this map is the only state the
//! analytics core keeps between requests.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Instant;

use crate::config::RecapConfig;
use crate::data_access::DataAccess;
use crate::error::Result;
use crate::models::SessionSummary;

/// Quality band of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecapStatus {
    Peak,
    Solid,
    Dip,
}

/// One scored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapSession {
    /// Session identifier
    pub session_id: String,

    /// When the session finished
    pub finished_at: DateTime<Utc>,

    /// Quality score, 35-100
    pub quality_score: f64,

    /// Band the score falls in
    pub status: RecapStatus,

    /// Session volume, pounds
    pub total_volume: f64,

    /// Session average RPE
    pub avg_rpe: Option<f64>,
}

/// Recap over the recent training window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecapSlice {
    /// Scored sessions, newest first
    pub sessions: Vec<RecapSession>,

    /// Median session volume over the window, when any sessions exist
    pub baseline_volume: Option<f64>,

    /// Average session RPE over the window, when any RPE was recorded
    pub baseline_rpe: Option<f64>,

    /// Consecutive training days ending today
    pub current_streak_days: u32,

    /// Longest run of consecutive training days in the window
    pub best_streak_days: u32,

    /// Two or more of the most recent sessions scored as dips
    pub quality_dip: bool,

    /// Quality dip plus a long absence: worth a win-back nudge
    pub win_back: bool,

    /// Best session of the window
    pub best_session: Option<RecapSession>,

    /// When the slice was computed
    pub generated_at: DateTime<Utc>,
}

/// Recap computation engine with a per-user TTL cache
pub struct RecapAnalyzer {
    config: RecapConfig,
    cache: Mutex<HashMap<String, (Instant, RecapSlice)>>,
}

impl Default for RecapAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecapAnalyzer {
    pub fn new() -> Self {
        RecapAnalyzer {
            config: RecapConfig::default(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(config: RecapConfig) -> Self {
        RecapAnalyzer {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Recap for a user, served from cache within the TTL
    pub async fn slice(
        &self,
        store: &dyn DataAccess,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RecapSlice> {
        if let Some(cached) = self.cached(user_id) {
            return Ok(cached);
        }

        let since = now - Duration::weeks(self.config.lookback_weeks);
        let sessions = store.fetch_recent_sessions_with_sets(user_id, since).await?;
        let slice = self.build_slice(&sessions, now);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(user_id.to_string(), (Instant::now(), slice.clone()));
        }
        Ok(slice)
    }

    fn cached(&self, user_id: &str) -> Option<RecapSlice> {
        let cache = self.cache.lock().ok()?;
        let (stored_at, slice) = cache.get(user_id)?;
        if stored_at.elapsed().as_secs() < self.config.cache_ttl_secs {
            Some(slice.clone())
        } else {
            None
        }
    }

    /// Score a window of sessions (newest first)
    pub fn build_slice(&self, sessions: &[SessionSummary], now: DateTime<Utc>) -> RecapSlice {
        let baseline_volume = self.baseline_volume(sessions);
        let baseline_rpe = self.baseline_rpe(sessions);

        let scored: Vec<RecapSession> = sessions
            .iter()
            .map(|s| {
                let quality_score =
                    self.quality_score(s.total_volume, s.avg_rpe, baseline_volume, baseline_rpe);
                RecapSession {
                    session_id: s.id.clone(),
                    finished_at: s.finished_at,
                    quality_score,
                    status: self.status(quality_score),
                    total_volume: s.total_volume,
                    avg_rpe: s.avg_rpe,
                }
            })
            .collect();

        let (current_streak_days, best_streak_days) = self.streaks(sessions, now);

        let dip_run = scored
            .iter()
            .take_while(|s| s.status == RecapStatus::Dip)
            .count();
        let quality_dip = dip_run >= self.config.dip_run_length;
        let days_away = sessions
            .first()
            .map(|s| (now - s.finished_at).num_days())
            .unwrap_or(i64::MAX);
        let win_back = quality_dip && days_away >= self.config.win_back_gap_days;

        let best_session = scored
            .iter()
            .max_by(|a, b| {
                a.quality_score
                    .partial_cmp(&b.quality_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();

        RecapSlice {
            sessions: scored,
            baseline_volume,
            baseline_rpe,
            current_streak_days,
            best_streak_days,
            quality_dip,
            win_back,
            best_session,
            generated_at: now,
        }
    }

    /// Median session volume; below the minimum session count the mean
    /// stands in, and an empty window has no baseline
    fn baseline_volume(&self, sessions: &[SessionSummary]) -> Option<f64> {
        let volumes: Vec<f64> = sessions.iter().map(|s| s.total_volume).collect();
        if volumes.is_empty() {
            return None;
        }
        if volumes.len() >= self.config.baseline_min_sessions {
            let mut data = Data::new(volumes);
            Some(data.median())
        } else {
            Some(volumes.iter().sum::<f64>() / volumes.len() as f64)
        }
    }

    /// Average RPE over sessions that recorded one
    fn baseline_rpe(&self, sessions: &[SessionSummary]) -> Option<f64> {
        let rpes: Vec<f64> = sessions.iter().filter_map(|s| s.avg_rpe).collect();
        if rpes.is_empty() {
            return None;
        }
        Some(rpes.iter().sum::<f64>() / rpes.len() as f64)
    }

    /// Quality score of one session against the personal baselines
    ///
    /// `100 x (0.7 x volumeRatio + 0.3 x rpeComponent) x rpeTrendBoost`,
    /// clamped to the configured floor and ceiling for all inputs,
    /// including zero volume and missing RPE.
    pub fn quality_score(
        &self,
        volume: f64,
        rpe: Option<f64>,
        baseline_volume: Option<f64>,
        baseline_rpe: Option<f64>,
    ) -> f64 {
        let config = &self.config;

        let volume_ratio = match baseline_volume {
            Some(baseline) if baseline > 0.0 => (volume / baseline)
                .clamp(config.volume_ratio_floor, config.volume_ratio_ceiling),
            _ => 1.0,
        };

        let rpe_component = match rpe {
            Some(r) if r.is_finite() => (1.0 - (r - config.rpe_center).abs() / config.rpe_span)
                .clamp(config.rpe_component_floor, config.rpe_component_ceiling),
            _ => config.rpe_component_default,
        };

        let trend_boost = match (rpe, baseline_rpe) {
            (Some(r), Some(baseline)) if r.is_finite() && baseline.is_finite() => {
                (1.0 + ((r - baseline) / 3.0) * 0.1)
                    .clamp(config.trend_boost_floor, config.trend_boost_ceiling)
            }
            _ => 1.0,
        };

        (100.0 * (0.7 * volume_ratio + 0.3 * rpe_component) * trend_boost)
            .clamp(config.score_floor, config.score_ceiling)
    }

    fn status(&self, score: f64) -> RecapStatus {
        if score >= self.config.peak_at {
            RecapStatus::Peak
        } else if score >= self.config.solid_at {
            RecapStatus::Solid
        } else {
            RecapStatus::Dip
        }
    }

    /// Streaks over distinct UTC calendar days with completed sessions
    fn streaks(&self, sessions: &[SessionSummary], now: DateTime<Utc>) -> (u32, u32) {
        let days: BTreeSet<NaiveDate> = sessions
            .iter()
            .map(|s| s.finished_at.date_naive())
            .collect();

        let mut current = 0_u32;
        let mut day = now.date_naive();
        while days.contains(&day) {
            current += 1;
            day = match day.pred_opt() {
                Some(prev) => prev,
                None => break,
            };
        }

        let mut best = 0_u32;
        let mut run = 0_u32;
        let mut prev: Option<NaiveDate> = None;
        for &date in &days {
            run = match prev {
                Some(p) if p.succ_opt() == Some(date) => run + 1,
                _ => 1,
            };
            best = best.max(run);
            prev = Some(date);
        }

        (current, best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
    }

    fn analyzer() -> RecapAnalyzer {
        RecapAnalyzer::new()
    }

    fn session(id: &str, days_ago: i64, volume: f64, rpe: Option<f64>) -> SessionSummary {
        SessionSummary {
            id: id.to_string(),
            finished_at: now() - Duration::days(days_ago),
            total_volume: volume,
            set_count: 12,
            avg_rpe: rpe,
            muscle_groups: vec!["chest".to_string()],
            template_id: None,
        }
    }

    #[test]
    fn test_quality_score_at_baseline_is_peak() {
        let a = analyzer();
        // Volume at baseline, RPE at the sweet spot, flat trend
        let score = a.quality_score(5000.0, Some(8.0), Some(5000.0), Some(8.0));
        // 100 * (0.7 * 1.0 + 0.3 * 1.0) * 1.0 = 100
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_quality_score_clamped_for_degenerate_inputs() {
        let a = analyzer();
        // Zero volume and no RPE still floors at 35
        let score = a.quality_score(0.0, None, Some(5000.0), None);
        assert!(score >= 35.0);
        // Huge volume cannot exceed 100
        let score = a.quality_score(50_000.0, Some(8.0), Some(5000.0), Some(8.0));
        assert!(score <= 100.0);
        // No baseline at all: neutral ratio, still within bounds
        let score = a.quality_score(1000.0, None, None, None);
        assert!((35.0..=100.0).contains(&score));
        // NaN RPE falls back to the default component
        let score = a.quality_score(5000.0, Some(f64::NAN), Some(5000.0), None);
        assert!((35.0..=100.0).contains(&score));
    }

    #[test]
    fn test_status_bands() {
        let a = analyzer();
        assert_eq!(a.status(95.0), RecapStatus::Peak);
        assert_eq!(a.status(90.0), RecapStatus::Peak);
        assert_eq!(a.status(80.0), RecapStatus::Solid);
        assert_eq!(a.status(75.0), RecapStatus::Solid);
        assert_eq!(a.status(60.0), RecapStatus::Dip);
    }

    #[test]
    fn test_baseline_volume_median_vs_single() {
        let a = analyzer();
        let sessions = vec![
            session("a", 1, 4000.0, None),
            session("b", 3, 5000.0, None),
            session("c", 5, 9000.0, None),
        ];
        // Median of 4000/5000/9000
        assert_eq!(a.baseline_volume(&sessions), Some(5000.0));

        let single = vec![session("a", 1, 4200.0, None)];
        assert_eq!(a.baseline_volume(&single), Some(4200.0));

        assert_eq!(a.baseline_volume(&[]), None);
    }

    #[test]
    fn test_streaks_over_calendar_days() {
        let a = analyzer();
        // Today, yesterday, 2 days ago: current streak of 3.
        // A separate 4-day run ended 10 days ago: best streak of 4.
        let sessions = vec![
            session("a", 0, 5000.0, None),
            session("b", 1, 5000.0, None),
            session("c", 2, 5000.0, None),
            session("d", 10, 5000.0, None),
            session("e", 11, 5000.0, None),
            session("f", 12, 5000.0, None),
            session("g", 13, 5000.0, None),
        ];
        let slice = a.build_slice(&sessions, now());
        assert_eq!(slice.current_streak_days, 3);
        assert_eq!(slice.best_streak_days, 4);
    }

    #[test]
    fn test_current_streak_requires_today() {
        let a = analyzer();
        let sessions = vec![session("a", 1, 5000.0, None), session("b", 2, 5000.0, None)];
        let slice = a.build_slice(&sessions, now());
        assert_eq!(slice.current_streak_days, 0);
        assert_eq!(slice.best_streak_days, 2);
    }

    #[test]
    fn test_two_sessions_same_day_count_once() {
        let a = analyzer();
        let mut s1 = session("a", 0, 5000.0, None);
        s1.finished_at = now() - Duration::hours(2);
        let s2 = session("b", 0, 5000.0, None);
        let slice = a.build_slice(&[s1, s2], now());
        assert_eq!(slice.current_streak_days, 1);
        assert_eq!(slice.best_streak_days, 1);
    }

    #[test]
    fn test_quality_dip_needs_consecutive_recent_dips() {
        let a = analyzer();
        // Baseline median sits at 5000; the two most recent sessions
        // collapse to a fraction of it
        let sessions = vec![
            session("a", 1, 1000.0, Some(5.0)),
            session("b", 2, 1000.0, Some(5.0)),
            session("c", 4, 5000.0, Some(8.0)),
            session("d", 6, 5000.0, Some(8.0)),
            session("e", 8, 5200.0, Some(8.0)),
        ];
        let slice = a.build_slice(&sessions, now());
        assert_eq!(slice.sessions[0].status, RecapStatus::Dip);
        assert_eq!(slice.sessions[1].status, RecapStatus::Dip);
        assert!(slice.quality_dip);
        // Only 1 day since the last workout: no win-back nudge yet
        assert!(!slice.win_back);
    }

    #[test]
    fn test_win_back_needs_absence() {
        let a = analyzer();
        let sessions = vec![
            session("a", 6, 1000.0, Some(5.0)),
            session("b", 8, 1000.0, Some(5.0)),
            session("c", 10, 5000.0, Some(8.0)),
            session("d", 12, 5000.0, Some(8.0)),
            session("e", 14, 5200.0, Some(8.0)),
        ];
        let slice = a.build_slice(&sessions, now());
        assert!(slice.quality_dip);
        assert!(slice.win_back);
    }

    #[test]
    fn test_single_dip_does_not_flag() {
        let a = analyzer();
        let sessions = vec![
            session("a", 1, 1000.0, Some(5.0)),
            session("b", 2, 5000.0, Some(8.0)),
            session("c", 4, 5000.0, Some(8.0)),
        ];
        let slice = a.build_slice(&sessions, now());
        assert!(!slice.quality_dip);
        assert!(!slice.win_back);
    }

    #[test]
    fn test_best_session_is_highest_scored() {
        let a = analyzer();
        // No RPE anywhere keeps scores off the ceiling, so the maximum
        // is unique: 64.5 / 95.3 / 92.5
        let sessions = vec![
            session("small", 1, 3000.0, None),
            session("big", 3, 5200.0, None),
            session("mid", 5, 5000.0, None),
        ];
        let slice = a.build_slice(&sessions, now());
        let best = slice.best_session.unwrap();
        assert_eq!(best.session_id, "big");
    }

    mod cache {
        use super::*;
        use crate::data_access::{InMemoryStore, SessionRecord};
        use crate::models::{Equipment, ExerciseCategory, SetRecord};

        fn store_with_one_session() -> InMemoryStore {
            let finished = now() - Duration::days(1);
            InMemoryStore::new(
                vec![SessionRecord {
                    id: "s1".to_string(),
                    user_id: "u1".to_string(),
                    template_id: None,
                    finished_at: Some(finished),
                    ended_for_inactivity: false,
                    sets: vec![SetRecord {
                        exercise_id: "bench-press".to_string(),
                        muscle_group: "chest".to_string(),
                        equipment: Equipment::Barbell,
                        category: ExerciseCategory::Strength,
                        actual_reps: Some(10),
                        target_reps: Some(8),
                        actual_weight: Some(100.0),
                        target_weight: Some(100.0),
                        actual_duration_min: None,
                        target_duration_min: None,
                        actual_distance: None,
                        target_distance: None,
                        actual_incline: None,
                        target_incline: None,
                        rpe: Some(8.0),
                        difficulty: None,
                        finished_at: finished,
                    }],
                }],
                Vec::new(),
            )
        }

        #[tokio::test]
        async fn test_slice_is_cached_within_ttl() {
            let a = analyzer();
            let populated = store_with_one_session();
            let first = a.slice(&populated, "u1", now()).await.unwrap();
            assert_eq!(first.sessions.len(), 1);

            // A second read inside the TTL ignores the (now empty) store
            let empty = InMemoryStore::new(Vec::new(), Vec::new());
            let second = a.slice(&empty, "u1", now()).await.unwrap();
            assert_eq!(second.sessions.len(), 1);

            // Another user is computed fresh
            let other = a.slice(&empty, "u2", now()).await.unwrap();
            assert!(other.sessions.is_empty());
        }

        #[tokio::test]
        async fn test_zero_ttl_disables_caching() {
            let a = RecapAnalyzer::with_config(RecapConfig {
                cache_ttl_secs: 0,
                ..RecapConfig::default()
            });
            let populated = store_with_one_session();
            let first = a.slice(&populated, "u1", now()).await.unwrap();
            assert_eq!(first.sessions.len(), 1);

            let empty = InMemoryStore::new(Vec::new(), Vec::new());
            let second = a.slice(&empty, "u1", now()).await.unwrap();
            assert!(second.sessions.is_empty());
        }
    }
}
