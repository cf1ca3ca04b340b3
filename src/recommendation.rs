//! Next-workout recommendation engine
//!
//! Ranks candidate workout splits from the user's preferred rotation,
//! recent history, and the current fatigue report, then matches saved
//! templates against the winning split. Scores start from a fixed base and
//! accumulate bounded adjustments, so a candidate can be compared across
//! users and days.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::RecommendationConfig;
use crate::data_access::DataAccess;
use crate::error::Result;
use crate::fatigue::{FatigueReport, FatigueStatus};
use crate::models::{SessionSummary, SplitPlan, SplitType, TemplateExerciseSummary};

/// How far back the engine looks for recent-session context
const HISTORY_LOOKBACK_DAYS: i64 = 30;

/// One scored split candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitCandidate {
    pub split: SplitType,
    pub score: f64,
}

/// A template scored against a split or target-muscle set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub template: TemplateExerciseSummary,
    pub score: f64,
}

/// The engine's answer to "what should I train next?"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpNextRecommendation {
    /// Winning split
    pub split: SplitType,

    /// Score of the winning split, 0-200
    pub score: f64,

    /// Runner-up splits, best first
    pub alternates: Vec<SplitCandidate>,

    /// Days since the user last trained the winning split
    pub days_since_split: Option<i64>,

    /// Best matching saved template, when one clears the match bar
    pub template: Option<TemplateMatch>,

    /// Short human-readable justification
    pub reasoning: String,
}

/// Target muscles and the templates that cover them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationReport {
    /// Muscle groups worth training now, most recovered first
    pub target_muscles: Vec<String>,

    /// Templates ranked by coverage of the target muscles
    pub recommended_workouts: Vec<TemplateMatch>,
}

/// Caller preferences influencing split selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Raw preferred-split setting ("ppl", "upper_lower", ...)
    pub preferred_split: Option<String>,

    /// Muscle groups the next workout should avoid (lower-cased)
    pub avoided_muscles: Vec<String>,

    /// Preferred session duration in minutes
    pub session_minutes: Option<u32>,
}

/// Split selection and template matching engine
pub struct RecommendationEngine {
    config: RecommendationConfig,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationEngine {
    pub fn new() -> Self {
        RecommendationEngine {
            config: RecommendationConfig::default(),
        }
    }

    pub fn with_config(config: RecommendationConfig) -> Self {
        RecommendationEngine { config }
    }

    /// Full up-next flow: fetch context, pick a split, match a template
    ///
    /// Recent-session context is auxiliary: when its fetch fails the engine
    /// degrades to an empty history instead of failing the recommendation.
    /// Template retrieval failures propagate.
    pub async fn up_next(
        &self,
        store: &dyn DataAccess,
        user_id: &str,
        prefs: &UserPreferences,
        fatigue: &FatigueReport,
        now: DateTime<Utc>,
    ) -> Result<UpNextRecommendation> {
        let since = now - Duration::days(HISTORY_LOOKBACK_DAYS);
        let recent = match store.fetch_recent_sessions_with_sets(user_id, since).await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(user_id, error = %err, "recent-session fetch failed; recommending without history");
                Vec::new()
            }
        };
        let templates = store.fetch_templates_with_muscles(user_id).await?;

        Ok(self.up_next_from(prefs, &recent, fatigue, &templates, now))
    }

    /// Pure up-next computation from prefetched context
    pub fn up_next_from(
        &self,
        prefs: &UserPreferences,
        recent: &[SessionSummary],
        fatigue: &FatigueReport,
        templates: &[TemplateExerciseSummary],
        now: DateTime<Utc>,
    ) -> UpNextRecommendation {
        let plan = SplitPlan::canonicalize(prefs.preferred_split.as_deref());
        let candidates = self.score_candidates(plan, recent, fatigue, prefs);

        // score_candidates never returns an empty list: every plan expands
        // to at least [full_body, upper, lower]
        let selected = candidates[0].clone();
        let alternates: Vec<SplitCandidate> = candidates.iter().skip(1).take(2).cloned().collect();

        let days_since_split = last_trained(selected.split, recent)
            .map(|t| (now - t).num_days());

        let matches = self.match_templates(selected.split, templates);
        let template = matches
            .into_iter()
            .find(|m| m.score >= self.config.match_overlap);

        let cycle_next = self
            .next_in_cycle(plan, recent, fatigue)
            .map_or(false, |next| next == selected.split);
        let reasoning =
            self.build_reasoning(selected.split, cycle_next, days_since_split, fatigue);

        UpNextRecommendation {
            split: selected.split,
            score: selected.score,
            alternates,
            days_since_split,
            template,
            reasoning,
        }
    }

    /// Score all candidate splits for a plan, best first
    pub fn score_candidates(
        &self,
        plan: SplitPlan,
        recent: &[SessionSummary],
        fatigue: &FatigueReport,
        prefs: &UserPreferences,
    ) -> Vec<SplitCandidate> {
        let cycle = self.candidate_cycle(plan, fatigue);
        let next = self.next_in_cycle(plan, recent, fatigue);
        let recent_splits: Vec<SplitType> = recent
            .iter()
            .take(self.config.repetition_lookback)
            .map(|s| SplitType::classify_session(&s.muscle_groups))
            .collect();

        // Pad the candidate pool so every plan yields alternates
        let mut pool = cycle;
        for extra in [SplitType::FullBody, SplitType::Upper, SplitType::Lower] {
            if !pool.contains(&extra) {
                pool.push(extra);
            }
        }

        let mut candidates: Vec<SplitCandidate> = pool
            .into_iter()
            .map(|split| SplitCandidate {
                split,
                score: self.score_candidate(split, next, &recent_splits, fatigue, prefs),
            })
            .collect();
        // Stable sort keeps cycle order on ties
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    /// The split cycle for a plan; custom plans derive theirs from which
    /// body region is currently more fatigued
    fn candidate_cycle(&self, plan: SplitPlan, fatigue: &FatigueReport) -> Vec<SplitType> {
        match plan {
            SplitPlan::Custom => {
                let legs = fatigue
                    .average_score(SplitType::Lower.primary_muscles())
                    .unwrap_or(0.0);
                let upper = fatigue
                    .average_score(SplitType::Upper.primary_muscles())
                    .unwrap_or(0.0);
                if legs - upper > self.config.custom_region_gap {
                    vec![SplitType::Upper, SplitType::FullBody, SplitType::Lower]
                } else if upper - legs > self.config.custom_region_gap {
                    vec![SplitType::Lower, SplitType::FullBody, SplitType::Upper]
                } else {
                    vec![SplitType::FullBody, SplitType::Upper, SplitType::Lower]
                }
            }
            _ => plan.cycle(),
        }
    }

    /// The split following the user's most recent workout in their cycle
    ///
    /// Single-step rotation: with a ppl plan and a push day just done, the
    /// next item is pull, never legs. Falls back to the cycle head when
    /// there is no history or the last workout is not part of the cycle.
    fn next_in_cycle(
        &self,
        plan: SplitPlan,
        recent: &[SessionSummary],
        fatigue: &FatigueReport,
    ) -> Option<SplitType> {
        let cycle = self.candidate_cycle(plan, fatigue);
        if cycle.is_empty() {
            return None;
        }
        let last = recent
            .first()
            .map(|s| SplitType::classify_session(&s.muscle_groups));
        let next = match last.and_then(|l| cycle.iter().position(|&c| c == l)) {
            Some(index) => cycle[(index + 1) % cycle.len()],
            None => cycle[0],
        };
        Some(next)
    }

    fn score_candidate(
        &self,
        split: SplitType,
        next_in_cycle: Option<SplitType>,
        recent_splits: &[SplitType],
        fatigue: &FatigueReport,
        prefs: &UserPreferences,
    ) -> f64 {
        let config = &self.config;
        let mut score = config.base_score;

        if next_in_cycle == Some(split) {
            score += config.cycle_bonus;
        }

        let repeats = recent_splits.iter().filter(|&&s| s == split).count();
        score -= config.repetition_penalty * repeats as f64;

        let primaries = split.primary_muscles();
        let avoided_overlap = prefs
            .avoided_muscles
            .iter()
            .filter(|m| primaries.contains(&m.as_str()))
            .count();
        score -= config.avoided_muscle_penalty * avoided_overlap as f64;

        if let Some(avg) = fatigue.average_score(primaries) {
            if avg >= config.fatigue_severe_at {
                score -= config.fatigue_severe_penalty;
            } else if avg >= config.fatigue_high_at {
                score -= config.fatigue_high_penalty;
            } else if avg >= config.fatigue_elevated_at {
                score -= config.fatigue_elevated_penalty;
            } else if avg <= config.fatigue_fresh_at {
                score += config.fatigue_fresh_bonus;
            }
        }

        if let Some(minutes) = prefs.session_minutes {
            if minutes <= config.short_session_minutes {
                match split {
                    SplitType::FullBody => score += config.time_fit_adjustment,
                    SplitType::Upper | SplitType::Lower => {
                        score -= config.time_fit_adjustment
                    }
                    _ => {}
                }
            }
        }

        score.clamp(0.0, 200.0)
    }

    /// Score saved templates against a split, best first
    ///
    /// 100 for an exact split-type tag, 90 for a split keyword in the
    /// name, 85 for strong muscle overlap, 0 otherwise. Ties prefer
    /// never-used templates, then the least recently used.
    pub fn match_templates(
        &self,
        split: SplitType,
        templates: &[TemplateExerciseSummary],
    ) -> Vec<TemplateMatch> {
        let mut matches: Vec<TemplateMatch> = templates
            .iter()
            .map(|t| TemplateMatch {
                template: t.clone(),
                score: self.template_score(split, t),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    match (a.template.last_used_at, b.template.last_used_at) {
                        (None, Some(_)) => std::cmp::Ordering::Less,
                        (Some(_), None) => std::cmp::Ordering::Greater,
                        (Some(x), Some(y)) => x.cmp(&y),
                        (None, None) => std::cmp::Ordering::Equal,
                    }
                })
        });
        matches
    }

    fn template_score(&self, split: SplitType, template: &TemplateExerciseSummary) -> f64 {
        if template.split_type == Some(split) {
            return self.config.match_exact;
        }

        let name = template.name.to_lowercase();
        if split.name_keywords().iter().any(|kw| name.contains(kw)) {
            return self.config.match_keyword;
        }

        let primaries = split.primary_muscles();
        if !primaries.is_empty() && !template.muscle_groups.is_empty() {
            let covered = primaries
                .iter()
                .filter(|p| template.muscle_groups.iter().any(|m| m == *p))
                .count();
            let primary_coverage = covered as f64 / primaries.len() as f64;
            let within = template
                .muscle_groups
                .iter()
                .filter(|m| primaries.contains(&m.as_str()))
                .count();
            let template_share = within as f64 / template.muscle_groups.len() as f64;
            if primary_coverage >= self.config.overlap_primary_fraction
                && template_share >= self.config.overlap_template_fraction
            {
                return self.config.match_overlap;
            }
        }

        0.0
    }

    /// Target muscles and the templates covering them
    ///
    /// Targets are the recovered muscles: anything under-trained, without
    /// data, or at a low score with baseline present, most recovered
    /// first. Workouts are ranked by the fraction of targets they cover.
    pub fn recommend_workouts(
        &self,
        fatigue: &FatigueReport,
        templates: &[TemplateExerciseSummary],
    ) -> RecommendationReport {
        let mut targets: Vec<(&str, f64)> = fatigue
            .entries
            .iter()
            .filter(|e| {
                e.status == FatigueStatus::NoData
                    || e.fatigue_score <= self.config.fatigue_fresh_at
            })
            .map(|e| (e.muscle_group.as_str(), e.fatigue_score))
            .collect();
        targets.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        let target_muscles: Vec<String> = targets.iter().map(|(m, _)| m.to_string()).collect();

        let mut recommended: Vec<TemplateMatch> = templates
            .iter()
            .filter_map(|t| {
                if target_muscles.is_empty() {
                    return None;
                }
                let covered = target_muscles
                    .iter()
                    .filter(|m| t.muscle_groups.contains(m))
                    .count();
                if covered == 0 {
                    return None;
                }
                Some(TemplateMatch {
                    template: t.clone(),
                    score: covered as f64 / target_muscles.len() as f64 * 100.0,
                })
            })
            .collect();
        recommended.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    match (a.template.last_used_at, b.template.last_used_at) {
                        (None, Some(_)) => std::cmp::Ordering::Less,
                        (Some(_), None) => std::cmp::Ordering::Greater,
                        (Some(x), Some(y)) => x.cmp(&y),
                        (None, None) => std::cmp::Ordering::Equal,
                    }
                })
        });

        RecommendationReport {
            target_muscles,
            recommended_workouts: recommended,
        }
    }

    fn build_reasoning(
        &self,
        split: SplitType,
        cycle_next: bool,
        days_since: Option<i64>,
        fatigue: &FatigueReport,
    ) -> String {
        let mut parts: Vec<String> = Vec::new();
        if cycle_next {
            parts.push(format!("{} is next in your rotation", split));
        } else {
            parts.push(format!("{} fits your current recovery best", split));
        }
        if let Some(days) = days_since {
            if days >= 2 {
                parts.push(format!("last trained {} days ago", days));
            }
        }
        if let Some(avg) = fatigue.average_score(split.primary_muscles()) {
            if avg <= self.config.fatigue_fresh_at {
                parts.push("those muscles are fresh".to_string());
            } else if avg >= self.config.fatigue_high_at {
                parts.push("go easier than usual, they are still recovering".to_string());
            }
        }
        parts.join("; ")
    }
}

fn last_trained(split: SplitType, recent: &[SessionSummary]) -> Option<DateTime<Utc>> {
    recent
        .iter()
        .find(|s| SplitType::classify_session(&s.muscle_groups) == split)
        .map(|s| s.finished_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fatigue::{FatigueAnalyzer, FatigueInputs};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
    }

    fn engine() -> RecommendationEngine {
        RecommendationEngine::new()
    }

    fn empty_fatigue() -> FatigueReport {
        FatigueAnalyzer::new().build_report(&FatigueInputs::default(), now())
    }

    /// Fatigue report where every listed muscle sits at the given score
    fn fatigue_at(scores: &[(&str, f64)]) -> FatigueReport {
        let mut inputs = FatigueInputs::default();
        for (muscle, score) in scores {
            // weekly baseline 1000, recent volume = score * 10
            inputs
                .baseline_window_volume
                .insert(muscle.to_string(), 4000.0);
            inputs
                .recent_volume
                .insert(muscle.to_string(), score * 10.0);
        }
        FatigueAnalyzer::new().build_report(&inputs, now())
    }

    fn push_session(days_ago: i64) -> SessionSummary {
        SessionSummary {
            id: format!("push-{days_ago}"),
            finished_at: now() - Duration::days(days_ago),
            total_volume: 5000.0,
            set_count: 15,
            avg_rpe: Some(7.5),
            muscle_groups: vec![
                "chest".to_string(),
                "shoulders".to_string(),
                "triceps".to_string(),
            ],
            template_id: None,
        }
    }

    fn template(
        id: &str,
        name: &str,
        split: Option<SplitType>,
        muscles: &[&str],
        last_used: Option<DateTime<Utc>>,
    ) -> TemplateExerciseSummary {
        TemplateExerciseSummary {
            id: id.to_string(),
            name: name.to_string(),
            split_type: split,
            exercise_count: muscles.len() as u32,
            muscle_groups: muscles.iter().map(|m| m.to_string()).collect(),
            last_used_at: last_used,
        }
    }

    #[test]
    fn test_cycle_bonus_goes_to_single_step_rotation() {
        let e = engine();
        let prefs = UserPreferences {
            preferred_split: Some("ppl".to_string()),
            ..Default::default()
        };
        let recent = vec![push_session(1)];
        let candidates = e.score_candidates(SplitPlan::Ppl, &recent, &empty_fatigue(), &prefs);

        let score_of = |split: SplitType| {
            candidates
                .iter()
                .find(|c| c.split == split)
                .map(|c| c.score)
                .unwrap()
        };
        // pull gets the +18; push pays the repetition penalty; legs is flat
        assert_eq!(score_of(SplitType::Pull), 118.0);
        assert_eq!(score_of(SplitType::Push), 94.0);
        assert_eq!(score_of(SplitType::Legs), 100.0);
        assert_eq!(candidates[0].split, SplitType::Pull);
    }

    #[test]
    fn test_repetition_penalty_per_occurrence() {
        let e = engine();
        let prefs = UserPreferences {
            preferred_split: Some("ppl".to_string()),
            ..Default::default()
        };
        // Three push days in a row
        let recent = vec![push_session(1), push_session(2), push_session(3)];
        let candidates = e.score_candidates(SplitPlan::Ppl, &recent, &empty_fatigue(), &prefs);
        let push = candidates.iter().find(|c| c.split == SplitType::Push).unwrap();
        // 100 - 3 * 6
        assert_eq!(push.score, 82.0);
    }

    #[test]
    fn test_avoided_muscle_penalty() {
        let e = engine();
        let prefs = UserPreferences {
            preferred_split: Some("ppl".to_string()),
            avoided_muscles: vec!["chest".to_string(), "triceps".to_string()],
            ..Default::default()
        };
        let candidates = e.score_candidates(SplitPlan::Ppl, &[], &empty_fatigue(), &prefs);
        let push = candidates.iter().find(|c| c.split == SplitType::Push).unwrap();
        // cycle head bonus +18, minus two avoided overlaps
        assert_eq!(push.score, 100.0 + 18.0 - 36.0);
    }

    #[test]
    fn test_fatigue_tiers_adjust_scores() {
        let e = engine();
        let prefs = UserPreferences {
            preferred_split: Some("ppl".to_string()),
            ..Default::default()
        };
        let report = fatigue_at(&[
            ("quads", 150.0),
            ("hamstrings", 150.0),
            ("glutes", 150.0),
            ("calves", 150.0),
            ("back", 60.0),
            ("biceps", 60.0),
        ]);
        let candidates = e.score_candidates(SplitPlan::Ppl, &[], &report, &prefs);
        let legs = candidates.iter().find(|c| c.split == SplitType::Legs).unwrap();
        let pull = candidates.iter().find(|c| c.split == SplitType::Pull).unwrap();
        // legs avg 150 >= 140: -26; pull avg 60 <= 80: +8
        assert_eq!(legs.score, 74.0);
        assert_eq!(pull.score, 108.0);
    }

    #[test]
    fn test_short_session_time_fit() {
        let e = engine();
        let prefs = UserPreferences {
            preferred_split: Some("upper_lower".to_string()),
            session_minutes: Some(25),
            ..Default::default()
        };
        let candidates =
            e.score_candidates(SplitPlan::UpperLower, &[], &empty_fatigue(), &prefs);
        let upper = candidates.iter().find(|c| c.split == SplitType::Upper).unwrap();
        let full = candidates
            .iter()
            .find(|c| c.split == SplitType::FullBody)
            .unwrap();
        // upper: +18 cycle head, -6 time fit; full_body: +6 time fit
        assert_eq!(upper.score, 112.0);
        assert_eq!(full.score, 106.0);
    }

    #[test]
    fn test_custom_plan_rests_the_hotter_region() {
        let e = engine();
        // Legs far more fatigued than upper body
        let report = fatigue_at(&[
            ("quads", 160.0),
            ("hamstrings", 160.0),
            ("glutes", 160.0),
            ("calves", 160.0),
            ("chest", 90.0),
            ("back", 90.0),
            ("shoulders", 90.0),
            ("biceps", 90.0),
            ("triceps", 90.0),
        ]);
        let prefs = UserPreferences {
            preferred_split: Some("custom".to_string()),
            ..Default::default()
        };
        let candidates = e.score_candidates(SplitPlan::Custom, &[], &report, &prefs);
        assert_eq!(candidates[0].split, SplitType::Upper);
    }

    #[test]
    fn test_template_matching_paths() {
        let e = engine();
        let templates = vec![
            template("t1", "Pull Day A", None, &["back", "biceps"], None),
            template("t2", "Morning Lift", None, &["quads"], None),
            template(
                "t3",
                "Heavy Day",
                Some(SplitType::Pull),
                &["back"],
                None,
            ),
            template("t4", "Row Focus", None, &["back", "biceps", "forearms"], None),
        ];
        let matches = e.match_templates(SplitType::Pull, &templates);

        let score_of = |id: &str| {
            matches
                .iter()
                .find(|m| m.template.id == id)
                .map(|m| m.score)
                .unwrap()
        };
        assert_eq!(score_of("t3"), 100.0); // exact split tag
        assert_eq!(score_of("t1"), 90.0); // name keyword
        assert_eq!(score_of("t2"), 0.0); // zero overlap
        // t4 covers both pull primaries (2/2 >= 80%) and 2/3 of its own
        // muscles are primaries (>= 60%)
        assert_eq!(score_of("t4"), 85.0);
    }

    #[test]
    fn test_template_tie_break_prefers_never_used_then_lru() {
        let e = engine();
        let templates = vec![
            template(
                "used-recent",
                "Pull A",
                None,
                &["back"],
                Some(now() - Duration::days(1)),
            ),
            template(
                "used-old",
                "Pull B",
                None,
                &["back"],
                Some(now() - Duration::days(20)),
            ),
            template("fresh", "Pull C", None, &["back"], None),
        ];
        let matches = e.match_templates(SplitType::Pull, &templates);
        let order: Vec<&str> = matches.iter().map(|m| m.template.id.as_str()).collect();
        assert_eq!(order, vec!["fresh", "used-old", "used-recent"]);
    }

    #[test]
    fn test_recommend_workouts_targets_recovered_muscles() {
        let e = engine();
        let report = fatigue_at(&[
            ("chest", 150.0),
            ("back", 40.0),
            ("biceps", 70.0),
            ("quads", 120.0),
        ]);
        let templates = vec![
            template("t1", "Back & Bi", None, &["back", "biceps"], None),
            template("t2", "Chest Day", None, &["chest"], None),
        ];
        let rec = e.recommend_workouts(&report, &templates);
        // back (40) and biceps (70) are at or under the fresh threshold
        assert_eq!(rec.target_muscles, vec!["back".to_string(), "biceps".to_string()]);
        assert_eq!(rec.recommended_workouts.len(), 1);
        assert_eq!(rec.recommended_workouts[0].template.id, "t1");
        assert_eq!(rec.recommended_workouts[0].score, 100.0);
    }

    #[test]
    fn test_up_next_from_selects_and_explains() {
        let e = engine();
        let prefs = UserPreferences {
            preferred_split: Some("ppl".to_string()),
            ..Default::default()
        };
        let recent = vec![push_session(1)];
        let templates = vec![template("t1", "Pull Day A", None, &["back", "biceps"], None)];
        let up_next = e.up_next_from(&prefs, &recent, &empty_fatigue(), &templates, now());

        assert_eq!(up_next.split, SplitType::Pull);
        assert_eq!(up_next.alternates.len(), 2);
        assert!(up_next.template.is_some());
        assert_eq!(up_next.template.unwrap().template.id, "t1");
        assert!(up_next.reasoning.contains("rotation"));
    }

    #[test]
    fn test_scores_clamped_to_bounds() {
        let e = engine();
        let leg_session = |days_ago: i64| SessionSummary {
            id: format!("legs-{days_ago}"),
            finished_at: now() - Duration::days(days_ago),
            total_volume: 6000.0,
            set_count: 16,
            avg_rpe: Some(8.0),
            muscle_groups: vec![
                "quads".to_string(),
                "hamstrings".to_string(),
                "glutes".to_string(),
                "calves".to_string(),
            ],
            template_id: None,
        };
        let prefs = UserPreferences {
            preferred_split: Some("ppl".to_string()),
            avoided_muscles: vec![
                "quads".to_string(),
                "hamstrings".to_string(),
                "glutes".to_string(),
                "calves".to_string(),
            ],
            ..Default::default()
        };
        let report = fatigue_at(&[
            ("quads", 160.0),
            ("hamstrings", 160.0),
            ("glutes", 160.0),
            ("calves", 160.0),
        ]);
        let recent = vec![leg_session(1), leg_session(2), leg_session(3)];
        let candidates = e.score_candidates(SplitPlan::Ppl, &recent, &report, &prefs);
        for candidate in &candidates {
            assert!(candidate.score >= 0.0 && candidate.score <= 200.0);
        }
        // legs: 100 - 18 repetition - 72 avoided - 26 fatigue, clamped at 0
        let legs = candidates.iter().find(|c| c.split == SplitType::Legs).unwrap();
        assert_eq!(legs.score, 0.0);
    }
}
