//! SQLite-backed workout store
//!
//! Implements [`DataAccess`] against a local SQLite database. Every query
//! repeats the eligibility rule in SQL (`finished_at IS NOT NULL AND
//! ended_for_inactivity = 0`) so in-progress and abandoned sessions can
//! never leak into analytics. Timestamps are stored as unix epoch seconds;
//! muscle-group resolution mirrors the in-memory store's fallback chain
//! (custom override, catalog group, "other").

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::data_access::{
    DataAccess, ExerciseSession, ExerciseSetSummary, LastSessionStats, StimulusRow,
};
use crate::error::DataAccessError;
use crate::models::{
    DifficultyRating, Equipment, ExerciseCategory, SessionSummary, SplitType, TemplateExercise,
    TemplateExerciseSummary,
};

/// SQL fragment selecting the resolved, lower-cased muscle group
const MUSCLE_EXPR: &str = "LOWER(COALESCE(NULLIF(TRIM(e.custom_muscle_group), ''), \
     NULLIF(TRIM(e.muscle_group), ''), 'other'))";

/// SQL fragment for the completed-session eligibility rule
const ELIGIBLE: &str = "s.finished_at IS NOT NULL AND s.ended_for_inactivity = 0";

/// One exercise catalog row
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseRow {
    pub id: String,
    pub name: String,
    /// Catalog muscle group
    pub muscle_group: Option<String>,
    /// Per-user override for custom exercises
    pub custom_muscle_group: Option<String>,
    pub equipment: Equipment,
    pub category: ExerciseCategory,
}

/// One set as written by the app
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewSet {
    pub exercise_id: String,
    pub actual_reps: Option<u32>,
    pub target_reps: Option<u32>,
    pub actual_weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub actual_duration_min: Option<f64>,
    pub target_duration_min: Option<f64>,
    pub actual_distance: Option<f64>,
    pub target_distance: Option<f64>,
    pub actual_incline: Option<f64>,
    pub target_incline: Option<f64>,
    pub rpe: Option<f64>,
    pub difficulty: Option<DifficultyRating>,
}

/// One session as written by the app
#[derive(Debug, Clone, PartialEq)]
pub struct NewSession {
    pub id: String,
    pub user_id: String,
    pub template_id: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
    pub ended_for_inactivity: bool,
    pub sets: Vec<NewSet>,
}

/// One template as written by the app
#[derive(Debug, Clone, PartialEq)]
pub struct NewTemplate {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub split_type: Option<SplitType>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub exercises: Vec<TemplateExercise>,
}

/// Database connection and schema management
pub struct Database {
    conn: Mutex<Connection>,
    /// Load credited to bodyweight sets without a recorded weight, pounds
    bodyweight_equivalent_lbs: f64,
}

impl Database {
    /// Create or open a database at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, DataAccessError> {
        let conn = Connection::open(db_path).map_err(|e| DataAccessError::ConnectionFailed {
            reason: e.to_string(),
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (tests, demos)
    pub fn open_in_memory() -> Result<Self, DataAccessError> {
        let conn =
            Connection::open_in_memory().map_err(|e| DataAccessError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DataAccessError> {
        let db = Database {
            conn: Mutex::new(conn),
            bodyweight_equivalent_lbs: 100.0,
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn with_bodyweight_equivalent(mut self, lbs: f64) -> Self {
        self.bodyweight_equivalent_lbs = lbs;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DataAccessError> {
        self.conn.lock().map_err(|_| DataAccessError::QueryFailed {
            reason: "connection mutex poisoned".to_string(),
        })
    }

    fn init_schema(&self) -> Result<(), DataAccessError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS exercises (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                muscle_group TEXT,
                custom_muscle_group TEXT,
                equipment TEXT NOT NULL DEFAULT 'other',
                category TEXT NOT NULL DEFAULT 'strength'
            );
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                template_id TEXT,
                finished_at INTEGER,
                ended_for_inactivity INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS sets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(id),
                exercise_id TEXT NOT NULL REFERENCES exercises(id),
                actual_reps INTEGER,
                target_reps INTEGER,
                actual_weight REAL,
                target_weight REAL,
                actual_duration_min REAL,
                target_duration_min REAL,
                actual_distance REAL,
                target_distance REAL,
                actual_incline REAL,
                target_incline REAL,
                rpe REAL,
                difficulty TEXT
            );
            CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                split_type TEXT,
                last_used_at INTEGER
            );
            CREATE TABLE IF NOT EXISTS template_exercises (
                template_id TEXT NOT NULL REFERENCES templates(id),
                exercise_id TEXT NOT NULL REFERENCES exercises(id),
                position INTEGER NOT NULL DEFAULT 0,
                default_weight REAL,
                default_reps INTEGER,
                PRIMARY KEY (template_id, exercise_id)
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_finished
                ON sessions(user_id, finished_at);
            CREATE INDEX IF NOT EXISTS idx_sets_session ON sets(session_id);
            CREATE INDEX IF NOT EXISTS idx_sets_exercise ON sets(exercise_id);",
        )?;
        Ok(())
    }

    /// SQL fragment computing a set's strength volume with the
    /// bodyweight-equivalent fallback; always bound as parameter 1
    fn volume_expr() -> &'static str {
        "COALESCE(st.actual_reps, 0) * CASE
            WHEN COALESCE(st.actual_weight, 0) > 0 THEN st.actual_weight
            WHEN e.equipment = 'bodyweight' THEN ?1
            ELSE 0
        END"
    }

    pub fn insert_exercise(&self, exercise: &ExerciseRow) -> Result<(), DataAccessError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO exercises
                (id, name, muscle_group, custom_muscle_group, equipment, category)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                exercise.id,
                exercise.name,
                exercise.muscle_group,
                exercise.custom_muscle_group,
                equipment_str(exercise.equipment),
                category_str(exercise.category),
            ],
        )?;
        Ok(())
    }

    pub fn insert_session(&self, session: &NewSession) -> Result<(), DataAccessError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, user_id, template_id, finished_at, ended_for_inactivity)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.user_id,
                session.template_id,
                session.finished_at.map(|t| t.timestamp()),
                session.ended_for_inactivity as i64,
            ],
        )?;
        for set in &session.sets {
            tx.execute(
                "INSERT INTO sets (session_id, exercise_id, actual_reps, target_reps,
                    actual_weight, target_weight, actual_duration_min, target_duration_min,
                    actual_distance, target_distance, actual_incline, target_incline,
                    rpe, difficulty)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    session.id,
                    set.exercise_id,
                    set.actual_reps,
                    set.target_reps,
                    set.actual_weight,
                    set.target_weight,
                    set.actual_duration_min,
                    set.target_duration_min,
                    set.actual_distance,
                    set.target_distance,
                    set.actual_incline,
                    set.target_incline,
                    set.rpe,
                    set.difficulty.map(difficulty_str),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_template(&self, template: &NewTemplate) -> Result<(), DataAccessError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO templates (id, user_id, name, split_type, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                template.id,
                template.user_id,
                template.name,
                template.split_type.map(|s| s.label()),
                template.last_used_at.map(|t| t.timestamp()),
            ],
        )?;
        for (position, exercise) in template.exercises.iter().enumerate() {
            tx.execute(
                "INSERT OR REPLACE INTO template_exercises
                    (template_id, exercise_id, position, default_weight, default_reps)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    template.id,
                    exercise.exercise_id,
                    position as i64,
                    exercise.default_weight,
                    exercise.default_reps,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl DataAccess for Database {
    async fn fetch_volume_by_muscle(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<String, f64>, DataAccessError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {MUSCLE_EXPR} AS muscle, SUM({volume}) AS volume
             FROM sets st
             JOIN sessions s ON st.session_id = s.id
             JOIN exercises e ON st.exercise_id = e.id
             WHERE s.user_id = ?2 AND {ELIGIBLE}
               AND e.category != 'cardio'
               AND s.finished_at > ?3 AND s.finished_at <= ?4
             GROUP BY muscle",
            volume = Self::volume_expr(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                self.bodyweight_equivalent_lbs,
                user_id,
                start.timestamp(),
                end.timestamp()
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )?;
        let mut volumes = HashMap::new();
        for row in rows {
            let (muscle, volume) = row?;
            volumes.insert(muscle, volume);
        }
        Ok(volumes)
    }

    async fn fetch_last_session_by_muscle(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, LastSessionStats>, DataAccessError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {MUSCLE_EXPR} AS muscle, s.finished_at,
                    COUNT(*), SUM(COALESCE(st.actual_reps, 0)), SUM({volume})
             FROM sets st
             JOIN sessions s ON st.session_id = s.id
             JOIN exercises e ON st.exercise_id = e.id
             WHERE s.user_id = ?2 AND {ELIGIBLE} AND e.category != 'cardio'
             GROUP BY s.id, muscle
             ORDER BY s.finished_at DESC",
            volume = Self::volume_expr(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![self.bodyweight_equivalent_lbs, user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            },
        )?;
        let mut latest: HashMap<String, LastSessionStats> = HashMap::new();
        for row in rows {
            let (muscle, finished_at, sets, reps, volume) = row?;
            // Rows come newest first, so the first hit per muscle wins
            latest.entry(muscle).or_insert(LastSessionStats {
                last_trained_at: epoch_to_datetime(finished_at)?,
                sets,
                reps,
                volume,
            });
        }
        Ok(latest)
    }

    async fn fetch_stimulus_rows(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StimulusRow>, DataAccessError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {MUSCLE_EXPR} AS muscle, s.finished_at,
                    SUM(CASE WHEN e.category != 'cardio' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN e.category != 'cardio' THEN {volume} ELSE 0 END),
                    SUM(CASE WHEN e.category = 'cardio'
                        THEN COALESCE(st.actual_duration_min, 0) ELSE 0 END),
                    SUM(CASE WHEN e.category = 'cardio' THEN st.actual_distance END),
                    SUM(CASE WHEN e.category = 'cardio'
                        THEN COALESCE(st.actual_incline, 0) * COALESCE(st.actual_duration_min, 0)
                        ELSE 0 END)
             FROM sets st
             JOIN sessions s ON st.session_id = s.id
             JOIN exercises e ON st.exercise_id = e.id
             WHERE s.user_id = ?2 AND {ELIGIBLE} AND s.finished_at > ?3
             GROUP BY s.id, muscle
             ORDER BY s.finished_at DESC",
            volume = Self::volume_expr(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![self.bodyweight_equivalent_lbs, user_id, since.timestamp()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, f64>(6)?,
                ))
            },
        )?;
        let mut result = Vec::new();
        for row in rows {
            let (muscle, finished_at, sets, volume, minutes, distance, incline_minutes) = row?;
            result.push(StimulusRow {
                muscle_group: muscle,
                finished_at: epoch_to_datetime(finished_at)?,
                strength_sets: sets,
                strength_volume: volume,
                cardio_minutes: minutes,
                cardio_distance: distance,
                cardio_incline_minutes: incline_minutes,
            });
        }
        Ok(result)
    }

    async fn fetch_templates_with_muscles(
        &self,
        user_id: &str,
    ) -> Result<Vec<TemplateExerciseSummary>, DataAccessError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT t.id, t.name, t.split_type, t.last_used_at, te.exercise_id,
                    CASE WHEN e.id IS NULL THEN NULL ELSE {MUSCLE_EXPR} END
             FROM templates t
             LEFT JOIN template_exercises te ON te.template_id = t.id
             LEFT JOIN exercises e ON te.exercise_id = e.id
             WHERE t.user_id = ?1
             ORDER BY t.id, te.position",
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut templates: Vec<TemplateExerciseSummary> = Vec::new();
        for row in rows {
            let (id, name, split_type, last_used_at, exercise_id, muscle) = row?;
            if templates.last().map(|t| t.id.as_str()) != Some(id.as_str()) {
                templates.push(TemplateExerciseSummary {
                    id,
                    name,
                    split_type: split_type.as_deref().and_then(SplitType::parse),
                    exercise_count: 0,
                    muscle_groups: Vec::new(),
                    last_used_at: last_used_at.map(epoch_to_datetime).transpose()?,
                });
            }
            let template = templates
                .last_mut()
                .ok_or_else(|| DataAccessError::QueryFailed {
                    reason: "template fold invariant".to_string(),
                })?;
            if exercise_id.is_some() {
                template.exercise_count += 1;
            }
            if let Some(muscle) = muscle {
                if !template.muscle_groups.contains(&muscle) {
                    template.muscle_groups.push(muscle);
                }
            }
        }
        Ok(templates)
    }

    async fn fetch_recent_sessions_with_sets(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SessionSummary>, DataAccessError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT s.id, s.finished_at, s.template_id, {MUSCLE_EXPR},
                    CASE WHEN e.category != 'cardio' THEN {volume} ELSE 0 END,
                    st.rpe
             FROM sets st
             JOIN sessions s ON st.session_id = s.id
             JOIN exercises e ON st.exercise_id = e.id
             WHERE s.user_id = ?2 AND {ELIGIBLE} AND s.finished_at > ?3
             ORDER BY s.finished_at DESC, s.id",
            volume = Self::volume_expr(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![self.bodyweight_equivalent_lbs, user_id, since.timestamp()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                ))
            },
        )?;

        let mut summaries: Vec<SessionSummary> = Vec::new();
        let mut rpe_sums: Vec<(f64, u32)> = Vec::new();
        for row in rows {
            let (id, finished_at, template_id, muscle, volume, rpe) = row?;
            if summaries.last().map(|s| s.id.as_str()) != Some(id.as_str()) {
                summaries.push(SessionSummary {
                    id,
                    finished_at: epoch_to_datetime(finished_at)?,
                    total_volume: 0.0,
                    set_count: 0,
                    avg_rpe: None,
                    muscle_groups: Vec::new(),
                    template_id,
                });
                rpe_sums.push((0.0, 0));
            }
            let summary = summaries
                .last_mut()
                .ok_or_else(|| DataAccessError::QueryFailed {
                    reason: "session fold invariant".to_string(),
                })?;
            summary.total_volume += volume;
            summary.set_count += 1;
            if !summary.muscle_groups.contains(&muscle) {
                summary.muscle_groups.push(muscle);
            }
            if let (Some(rpe), Some(acc)) = (rpe, rpe_sums.last_mut()) {
                acc.0 += rpe;
                acc.1 += 1;
            }
        }
        for (summary, (sum, count)) in summaries.iter_mut().zip(rpe_sums) {
            if count > 0 {
                summary.avg_rpe = Some(sum / f64::from(count));
            }
        }
        Ok(summaries)
    }

    async fn fetch_exercise_session_history(
        &self,
        user_id: &str,
        exercise_id: &str,
        limit: usize,
    ) -> Result<Vec<ExerciseSession>, DataAccessError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT s.id, s.finished_at, COALESCE(st.actual_reps, 0),
                    COALESCE(st.actual_weight, 0), st.target_reps, st.target_weight
             FROM sets st
             JOIN sessions s ON st.session_id = s.id
             JOIN exercises e ON st.exercise_id = e.id
             WHERE s.user_id = ?1 AND st.exercise_id = ?2
               AND {ELIGIBLE} AND e.category != 'cardio'
             ORDER BY s.finished_at DESC, s.id",
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, exercise_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<u32>>(4)?,
                row.get::<_, Option<f64>>(5)?,
            ))
        })?;

        let mut history: Vec<ExerciseSession> = Vec::new();
        let mut current_session: Option<String> = None;
        for row in rows {
            let (session_id, finished_at, reps, weight, target_reps, target_weight) = row?;
            if current_session.as_deref() != Some(session_id.as_str()) {
                if history.len() == limit {
                    break;
                }
                current_session = Some(session_id);
                history.push(ExerciseSession {
                    finished_at: epoch_to_datetime(finished_at)?,
                    sets: Vec::new(),
                });
            }
            if let Some(session) = history.last_mut() {
                session.sets.push(ExerciseSetSummary {
                    reps,
                    weight,
                    target_reps,
                    target_weight,
                });
            }
        }
        Ok(history)
    }

    async fn fetch_template_exercises(
        &self,
        user_id: &str,
        template_id: &str,
    ) -> Result<Vec<TemplateExercise>, DataAccessError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT te.exercise_id, te.default_weight, te.default_reps
             FROM template_exercises te
             JOIN templates t ON te.template_id = t.id
             WHERE t.id = ?1 AND t.user_id = ?2
             ORDER BY te.position",
        )?;
        let rows = stmt.query_map(params![template_id, user_id], |row| {
            Ok(TemplateExercise {
                exercise_id: row.get(0)?,
                default_weight: row.get(1)?,
                default_reps: row.get(2)?,
            })
        })?;
        let mut exercises = Vec::new();
        for row in rows {
            exercises.push(row?);
        }
        Ok(exercises)
    }

    async fn update_template_exercise_weight(
        &self,
        user_id: &str,
        template_id: &str,
        exercise_id: &str,
        new_weight: f64,
    ) -> Result<(), DataAccessError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE template_exercises SET default_weight = ?1
             WHERE exercise_id = ?2 AND template_id IN
                (SELECT id FROM templates WHERE id = ?3 AND user_id = ?4)",
            params![new_weight, exercise_id, template_id, user_id],
        )?;
        if changed == 0 {
            return Err(DataAccessError::NotFound {
                entity: "template_exercise".to_string(),
                id: format!("{template_id}/{exercise_id}"),
            });
        }
        Ok(())
    }
}

fn epoch_to_datetime(secs: i64) -> Result<DateTime<Utc>, DataAccessError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| DataAccessError::InvalidRow {
        entity: "sessions".to_string(),
        reason: format!("timestamp out of range: {secs}"),
    })
}

fn equipment_str(equipment: Equipment) -> &'static str {
    match equipment {
        Equipment::Barbell => "barbell",
        Equipment::Dumbbell => "dumbbell",
        Equipment::Machine => "machine",
        Equipment::Cable => "cable",
        Equipment::Kettlebell => "kettlebell",
        Equipment::Band => "band",
        Equipment::Bodyweight => "bodyweight",
        Equipment::Other => "other",
    }
}

fn category_str(category: ExerciseCategory) -> &'static str {
    match category {
        ExerciseCategory::Strength => "strength",
        ExerciseCategory::Cardio => "cardio",
    }
}

fn difficulty_str(difficulty: DifficultyRating) -> &'static str {
    match difficulty {
        DifficultyRating::TooEasy => "too_easy",
        DifficultyRating::JustRight => "just_right",
        DifficultyRating::TooHard => "too_hard",
    }
}
