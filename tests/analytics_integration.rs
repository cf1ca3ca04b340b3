//! End-to-end tests driving the full analytics pipeline through a store

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

use liftrs::data_access::{
    DataAccess, ExerciseSession, InMemoryStore, LastSessionStats, SessionRecord, StimulusRow,
    TemplateRecord,
};
use liftrs::database::{Database, ExerciseRow, NewSession, NewSet};
use liftrs::error::DataAccessError;
use liftrs::fatigue::{FatigueAnalyzer, FatigueStatus};
use liftrs::models::{
    Equipment, ExerciseCategory, SessionSummary, SetRecord, SplitType, TemplateExercise,
    TemplateExerciseSummary,
};
use liftrs::progression::ProgressionAdvisor;
use liftrs::recap::RecapAnalyzer;
use liftrs::recommendation::{RecommendationEngine, UserPreferences};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
}

fn strength_set(
    exercise: &str,
    muscle: &str,
    reps: u32,
    weight: f64,
    finished_at: DateTime<Utc>,
) -> SetRecord {
    SetRecord {
        exercise_id: exercise.to_string(),
        muscle_group: muscle.to_string(),
        equipment: Equipment::Barbell,
        category: ExerciseCategory::Strength,
        actual_reps: Some(reps),
        target_reps: Some(reps),
        actual_weight: Some(weight),
        target_weight: Some(weight),
        actual_duration_min: None,
        target_duration_min: None,
        actual_distance: None,
        target_distance: None,
        actual_incline: None,
        target_incline: None,
        rpe: Some(7.5),
        difficulty: None,
        finished_at,
    }
}

fn session(id: &str, finished_at: DateTime<Utc>, sets: Vec<SetRecord>) -> SessionRecord {
    SessionRecord {
        id: id.to_string(),
        user_id: "u1".to_string(),
        template_id: None,
        finished_at: Some(finished_at),
        ended_for_inactivity: false,
        sets,
    }
}

/// A month of chest training: 8,050 lbs spread over the baseline window
/// (days 8-35 back) and one 8,100 lb week ending today.
fn overreaching_chest_store() -> InMemoryStore {
    let t = now();
    let sessions = vec![
        // Baseline window sessions: 2700 + 2700 + 2650 = 8050
        session(
            "base-1",
            t - Duration::days(30),
            vec![strength_set("bench-press", "chest", 10, 90.0, t - Duration::days(30)),
                 strength_set("bench-press", "chest", 10, 90.0, t - Duration::days(30)),
                 strength_set("bench-press", "chest", 10, 90.0, t - Duration::days(30))],
        ),
        session(
            "base-2",
            t - Duration::days(20),
            vec![strength_set("bench-press", "chest", 10, 90.0, t - Duration::days(20)),
                 strength_set("bench-press", "chest", 10, 90.0, t - Duration::days(20)),
                 strength_set("bench-press", "chest", 10, 90.0, t - Duration::days(20))],
        ),
        session(
            "base-3",
            t - Duration::days(10),
            vec![strength_set("bench-press", "chest", 10, 100.0, t - Duration::days(10)),
                 strength_set("bench-press", "chest", 10, 90.0, t - Duration::days(10)),
                 strength_set("bench-press", "chest", 5, 150.0, t - Duration::days(10))],
        ),
        // Recent week: 8100
        session(
            "recent",
            t - Duration::days(2),
            vec![strength_set("bench-press", "chest", 10, 270.0, t - Duration::days(2)),
                 strength_set("bench-press", "chest", 10, 270.0, t - Duration::days(2)),
                 strength_set("bench-press", "chest", 10, 270.0, t - Duration::days(2))],
        ),
    ];
    InMemoryStore::new(sessions, Vec::new())
}

#[tokio::test]
async fn test_overreaching_chest_is_high_fatigue() {
    let store = overreaching_chest_store();
    let report = FatigueAnalyzer::new().report(&store, "u1", now()).await.unwrap();

    let chest = report.entry("chest").unwrap();
    assert_eq!(chest.baseline_weekly_volume, Some(2012.5));
    assert!((chest.fatigue_score - 402.48).abs() < 0.01);
    assert_eq!(chest.status, FatigueStatus::HighFatigue);
    assert!(chest.fatigued);
    // Aggregate score matches the single-muscle score, so readiness
    // bottoms out
    assert_eq!(report.readiness_score, 0.0);
    assert!(!report.deload_recommended);
    assert_eq!(chest.last_session_volume, Some(8100.0));
}

#[tokio::test]
async fn test_brand_new_user_is_fully_ready() {
    let store = InMemoryStore::new(Vec::new(), Vec::new());
    let report = FatigueAnalyzer::new().report(&store, "u1", now()).await.unwrap();

    assert!(report.entries.is_empty());
    assert_eq!(report.total_fatigue_score, 0.0);
    assert_eq!(report.readiness_score, 100.0);

    // And every downstream consumer degrades to its empty state
    let engine = RecommendationEngine::new();
    let up_next = engine
        .up_next(&store, "u1", &UserPreferences::default(), &report, now())
        .await
        .unwrap();
    assert_eq!(up_next.split, SplitType::FullBody);
    assert!(up_next.template.is_none());

    let recap = RecapAnalyzer::new().slice(&store, "u1", now()).await.unwrap();
    assert!(recap.sessions.is_empty());
    assert_eq!(recap.current_streak_days, 0);
}

#[tokio::test]
async fn test_full_pipeline_over_rotating_history() {
    let t = now();
    // Push/pull rotation for three weeks, newest workout a push day
    let mut sessions = Vec::new();
    for i in 0..9_i64 {
        let finished = t - Duration::days(i * 2 + 1);
        let sets = if i % 2 == 0 {
            vec![
                strength_set("bench-press", "chest", 8, 135.0, finished),
                strength_set("overhead-press", "shoulders", 8, 85.0, finished),
                strength_set("triceps-pushdown", "triceps", 12, 50.0, finished),
            ]
        } else {
            vec![
                strength_set("barbell-row", "back", 8, 155.0, finished),
                strength_set("dumbbell-curl", "biceps", 12, 30.0, finished),
            ]
        };
        sessions.push(session(&format!("s{i}"), finished, sets));
    }
    let template = TemplateRecord {
        user_id: "u1".to_string(),
        summary: TemplateExerciseSummary {
            id: "pull-a".to_string(),
            name: "Pull Day A".to_string(),
            split_type: None,
            exercise_count: 2,
            muscle_groups: vec!["back".to_string(), "biceps".to_string()],
            last_used_at: None,
        },
        exercises: vec![
            TemplateExercise {
                exercise_id: "barbell-row".to_string(),
                default_weight: Some(155.0),
                default_reps: Some(8),
            },
            TemplateExercise {
                exercise_id: "dumbbell-curl".to_string(),
                default_weight: Some(30.0),
                default_reps: Some(12),
            },
        ],
    };
    let store = InMemoryStore::new(sessions, vec![template]);

    let fatigue = FatigueAnalyzer::new().report(&store, "u1", t).await.unwrap();
    assert!(fatigue.entry("chest").is_some());
    assert!(fatigue.entry("back").is_some());

    // The last workout was push, so a ppl plan rotates to pull and the
    // pull template matches by name
    let engine = RecommendationEngine::new();
    let prefs = UserPreferences {
        preferred_split: Some("ppl".to_string()),
        ..Default::default()
    };
    let up_next = engine.up_next(&store, "u1", &prefs, &fatigue, t).await.unwrap();
    assert_eq!(up_next.split, SplitType::Pull);
    let matched = up_next.template.expect("pull template should match");
    assert_eq!(matched.template.id, "pull-a");
    assert!(matched.score >= 85.0);

    // Progression: rows hit target every session but never exceed reps,
    // so the advisor offers a medium-confidence bump
    let advisor = ProgressionAdvisor::new();
    let progression = advisor.template_report(&store, "u1", "pull-a").await.unwrap();
    assert_eq!(progression.exercises_analyzed, 2);
    assert_eq!(progression.suggestions.len(), 2);
    let applied = advisor.apply(&store, "u1", "pull-a", &progression).await.unwrap();
    assert_eq!(applied, 2);
    let exercises = store.fetch_template_exercises("u1", "pull-a").await.unwrap();
    // 155 lb row sits in the 150+ tier, so the bump is 10
    let row = exercises.iter().find(|e| e.exercise_id == "barbell-row").unwrap();
    assert_eq!(row.default_weight, Some(165.0));
    let curl = exercises.iter().find(|e| e.exercise_id == "dumbbell-curl").unwrap();
    assert_eq!(curl.default_weight, Some(32.5));

    // Recap: the latest session scores well, so no dip flag fires
    let recap = RecapAnalyzer::new().slice(&store, "u1", t).await.unwrap();
    assert_eq!(recap.sessions.len(), 9);
    assert!(!recap.quality_dip);
    assert!(recap.best_streak_days >= 1);
}

/// Store whose recent-session listing always fails; everything else is
/// empty but healthy.
struct FlakyHistoryStore;

#[async_trait]
impl DataAccess for FlakyHistoryStore {
    async fn fetch_volume_by_muscle(
        &self,
        _user_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>, DataAccessError> {
        Ok(HashMap::new())
    }

    async fn fetch_last_session_by_muscle(
        &self,
        _user_id: &str,
    ) -> Result<HashMap<String, LastSessionStats>, DataAccessError> {
        Ok(HashMap::new())
    }

    async fn fetch_stimulus_rows(
        &self,
        _user_id: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<StimulusRow>, DataAccessError> {
        Ok(Vec::new())
    }

    async fn fetch_templates_with_muscles(
        &self,
        _user_id: &str,
    ) -> Result<Vec<TemplateExerciseSummary>, DataAccessError> {
        Ok(Vec::new())
    }

    async fn fetch_recent_sessions_with_sets(
        &self,
        _user_id: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<SessionSummary>, DataAccessError> {
        Err(DataAccessError::QueryFailed {
            reason: "history shard offline".to_string(),
        })
    }

    async fn fetch_exercise_session_history(
        &self,
        _user_id: &str,
        _exercise_id: &str,
        _limit: usize,
    ) -> Result<Vec<ExerciseSession>, DataAccessError> {
        Ok(Vec::new())
    }

    async fn fetch_template_exercises(
        &self,
        _user_id: &str,
        _template_id: &str,
    ) -> Result<Vec<TemplateExercise>, DataAccessError> {
        Ok(Vec::new())
    }

    async fn update_template_exercise_weight(
        &self,
        _user_id: &str,
        _template_id: &str,
        _exercise_id: &str,
        _new_weight: f64,
    ) -> Result<(), DataAccessError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_up_next_degrades_when_history_fetch_fails() {
    let store = FlakyHistoryStore;
    let fatigue = FatigueAnalyzer::new().report(&store, "u1", now()).await.unwrap();
    let engine = RecommendationEngine::new();
    // The failed history fetch degrades to an empty list instead of
    // failing the recommendation
    let up_next = engine
        .up_next(&store, "u1", &UserPreferences::default(), &fatigue, now())
        .await
        .unwrap();
    assert_eq!(up_next.split, SplitType::FullBody);
}

#[tokio::test]
async fn test_sqlite_store_matches_in_memory_semantics() {
    let t = now();
    let db = Database::open_in_memory().unwrap();
    db.insert_exercise(&ExerciseRow {
        id: "bench-press".to_string(),
        name: "bench press".to_string(),
        muscle_group: Some("chest".to_string()),
        custom_muscle_group: None,
        equipment: Equipment::Barbell,
        category: ExerciseCategory::Strength,
    })
    .unwrap();
    db.insert_exercise(&ExerciseRow {
        id: "treadmill-run".to_string(),
        name: "treadmill run".to_string(),
        muscle_group: Some("quads".to_string()),
        custom_muscle_group: None,
        equipment: Equipment::Machine,
        category: ExerciseCategory::Cardio,
    })
    .unwrap();

    let mut mem_sessions = Vec::new();
    for (id, days_ago, weight) in [("a", 2_i64, 100.0), ("b", 12, 90.0), ("c", 20, 90.0)] {
        let finished = t - Duration::days(days_ago);
        db.insert_session(&NewSession {
            id: id.to_string(),
            user_id: "u1".to_string(),
            template_id: None,
            finished_at: Some(finished),
            ended_for_inactivity: false,
            sets: vec![
                NewSet {
                    exercise_id: "bench-press".to_string(),
                    actual_reps: Some(10),
                    target_reps: Some(8),
                    actual_weight: Some(weight),
                    target_weight: Some(weight),
                    rpe: Some(7.5),
                    ..NewSet::default()
                },
                NewSet {
                    exercise_id: "treadmill-run".to_string(),
                    actual_duration_min: Some(20.0),
                    actual_distance: Some(2.0),
                    ..NewSet::default()
                },
            ],
        })
        .unwrap();

        let mut cardio = strength_set("treadmill-run", "quads", 0, 0.0, finished);
        cardio.category = ExerciseCategory::Cardio;
        cardio.actual_reps = None;
        cardio.target_reps = None;
        cardio.actual_weight = None;
        cardio.target_weight = None;
        cardio.actual_duration_min = Some(20.0);
        cardio.actual_distance = Some(2.0);
        cardio.rpe = None;
        mem_sessions.push(session(
            id,
            finished,
            vec![strength_set("bench-press", "chest", 10, weight, finished), cardio],
        ));
    }
    let mem = InMemoryStore::new(mem_sessions, Vec::new());

    let sql_report = FatigueAnalyzer::new().report(&db, "u1", t).await.unwrap();
    let mem_report = FatigueAnalyzer::new().report(&mem, "u1", t).await.unwrap();

    let sql_chest = sql_report.entry("chest").unwrap();
    let mem_chest = mem_report.entry("chest").unwrap();
    assert_eq!(sql_chest.last_7_days_volume, mem_chest.last_7_days_volume);
    assert_eq!(
        sql_chest.baseline_weekly_volume,
        mem_chest.baseline_weekly_volume
    );
    assert!((sql_chest.fatigue_score - mem_chest.fatigue_score).abs() < 1e-9);
    assert_eq!(sql_chest.status, mem_chest.status);
    assert!((sql_chest.recovery_load - mem_chest.recovery_load).abs() < 1e-9);

    let sql_quads = sql_report.entry("quads").unwrap();
    let mem_quads = mem_report.entry("quads").unwrap();
    assert_eq!(sql_quads.status, mem_quads.status);
    assert!((sql_quads.recovery_load - mem_quads.recovery_load).abs() < 1e-9);
}
