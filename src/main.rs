use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use tabled::{Table, Tabled};
use uuid::Uuid;

use liftrs::config::AppConfig;
use liftrs::database::{Database, ExerciseRow, NewSession, NewSet, NewTemplate};
use liftrs::fatigue::FatigueAnalyzer;
use liftrs::logging::{init_logging, LogLevel};
use liftrs::models::{Equipment, ExerciseCategory, SplitType, TemplateExercise};
use liftrs::progression::ProgressionAdvisor;
use liftrs::recap::RecapAnalyzer;
use liftrs::recommendation::{RecommendationEngine, UserPreferences};

/// liftrs - Muscle Fatigue & Training Recommendation Analytics
///
/// Inspect the analytics a lifting app derives from completed workout
/// history: per-muscle fatigue and readiness, next-workout picks,
/// progression suggestions, and session recaps.
#[derive(Parser)]
#[command(name = "liftrs")]
#[command(version = "0.1.0")]
#[command(about = "Muscle fatigue and training recommendation analytics", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Workout database path (defaults to the configured data directory)
    #[arg(short, long, value_name = "FILE")]
    db: Option<PathBuf>,

    /// User id to analyze
    #[arg(short, long)]
    user: Option<String>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the per-muscle fatigue report
    Fatigue,

    /// Recommend the next workout split and matching template
    Recommend {
        /// Preferred split (ppl, upper_lower, full_body, custom)
        #[arg(long)]
        split: Option<String>,

        /// Muscle groups to avoid (repeatable)
        #[arg(long)]
        avoid: Vec<String>,

        /// Preferred session length in minutes
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Suggest weight/rep progressions for a template
    Progression {
        /// Template to analyze
        template_id: String,

        /// Apply the weight suggestions to the template defaults
        #[arg(long)]
        apply: bool,
    },

    /// Score recent sessions and show streaks
    Recap,

    /// Populate the database with demo workout history
    Seed,
}

#[derive(Tabled)]
struct FatigueTableRow {
    #[tabled(rename = "Muscle")]
    muscle: String,
    #[tabled(rename = "7d volume")]
    last7: String,
    #[tabled(rename = "Baseline/wk")]
    baseline: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Load")]
    load: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_default(&config_path)?;

    // Verbosity flag overrides the configured level
    config.logging.level = match cli.verbose {
        0 => config.logging.level,
        1 => LogLevel::Info,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    let _log_guard = init_logging(&config.logging)?;

    let db_path = cli
        .db
        .clone()
        .unwrap_or_else(|| config.settings.data_dir.join("liftrs.db"));
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let db = Database::new(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?
        .with_bodyweight_equivalent(config.analytics.stimulus.bodyweight_equivalent_lbs);

    let user = cli
        .user
        .clone()
        .or_else(|| config.settings.default_user_id.clone())
        .unwrap_or_else(|| "demo".to_string());
    let now = Utc::now();

    match cli.command {
        Commands::Fatigue => {
            let analyzer = FatigueAnalyzer::with_config(
                config.analytics.fatigue.clone(),
                config.analytics.stimulus.clone(),
            );
            let report = analyzer.report(&db, &user, now).await?;

            let rows: Vec<FatigueTableRow> = report
                .entries
                .iter()
                .map(|e| FatigueTableRow {
                    muscle: e.muscle_group.clone(),
                    last7: format!("{:.0}", e.last_7_days_volume),
                    baseline: e
                        .baseline_weekly_volume
                        .map(|b| format!("{:.0}", b))
                        .unwrap_or_else(|| "-".to_string()),
                    score: format!("{:.0}", e.fatigue_score),
                    load: format!("{:.2}", e.recovery_load),
                    status: e.status.to_string(),
                })
                .collect();
            if rows.is_empty() {
                println!("{}", "No training history yet".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
            println!(
                "Readiness: {}  Deload: {}",
                format!("{:.0}/100", report.readiness_score).green().bold(),
                if report.deload_recommended {
                    "recommended".red().bold()
                } else {
                    "not needed".normal()
                }
            );
        }

        Commands::Recommend {
            split,
            avoid,
            minutes,
        } => {
            let analyzer = FatigueAnalyzer::with_config(
                config.analytics.fatigue.clone(),
                config.analytics.stimulus.clone(),
            );
            let report = analyzer.report(&db, &user, now).await?;
            let engine =
                RecommendationEngine::with_config(config.analytics.recommendation.clone());
            let prefs = UserPreferences {
                preferred_split: split,
                avoided_muscles: avoid.iter().map(|m| m.to_lowercase()).collect(),
                session_minutes: minutes,
            };
            let up_next = engine.up_next(&db, &user, &prefs, &report, now).await?;

            println!(
                "{} {} {}",
                "Next up:".cyan().bold(),
                up_next.split.to_string().bold(),
                format!("({:.0})", up_next.score).dimmed()
            );
            println!("  {}", up_next.reasoning);
            match &up_next.template {
                Some(matched) => println!(
                    "  Template: {} {}",
                    matched.template.name.green(),
                    format!("(match {:.0})", matched.score).dimmed()
                ),
                None => println!("  {}", "No saved template fits this split".dimmed()),
            }
            for alternate in &up_next.alternates {
                println!(
                    "  Alternate: {} {}",
                    alternate.split,
                    format!("({:.0})", alternate.score).dimmed()
                );
            }
        }

        Commands::Progression { template_id, apply } => {
            let advisor = ProgressionAdvisor::with_config(config.analytics.progression.clone());
            let report = advisor.template_report(&db, &user, &template_id).await?;
            if report.suggestions.is_empty() {
                println!(
                    "{}",
                    "No progression suggestions yet (keep logging sessions)".yellow()
                );
            }
            for suggestion in &report.suggestions {
                println!(
                    "{} {}",
                    suggestion.exercise_id.bold(),
                    suggestion.reason.as_str()
                );
            }
            if apply {
                let updated = advisor.apply(&db, &user, &template_id, &report).await?;
                println!("{}", format!("Updated {} exercise(s)", updated).green());
            }
        }

        Commands::Recap => {
            let analyzer = RecapAnalyzer::with_config(config.analytics.recap.clone());
            let slice = analyzer.slice(&db, &user, now).await?;
            for session in &slice.sessions {
                println!(
                    "{}  {}  {:>5.1}  {:?}",
                    session.finished_at.format("%Y-%m-%d"),
                    session.session_id,
                    session.quality_score,
                    session.status
                );
            }
            println!(
                "Streak: {} day(s), best {} day(s)",
                slice.current_streak_days.to_string().bold(),
                slice.best_streak_days
            );
            if slice.win_back {
                println!("{}", "Quality has dipped and it has been a while - ease back in".yellow());
            } else if slice.quality_dip {
                println!("{}", "Recent sessions dipped below your baseline".yellow());
            }
        }

        Commands::Seed => {
            let sessions = seed_demo_data(&db, &user, now)?;
            println!(
                "{}",
                format!("Seeded {} demo sessions for user '{}'", sessions, user).green()
            );
        }
    }

    Ok(())
}

/// Insert a deterministic month of demo history: a push/pull/legs rotation
/// with gradual load progression, weekly cardio, and saved templates.
fn seed_demo_data(db: &Database, user_id: &str, now: DateTime<Utc>) -> Result<u32> {
    let catalog: &[(&str, &str, Equipment, ExerciseCategory)] = &[
        ("bench-press", "chest", Equipment::Barbell, ExerciseCategory::Strength),
        ("overhead-press", "shoulders", Equipment::Barbell, ExerciseCategory::Strength),
        ("triceps-pushdown", "triceps", Equipment::Cable, ExerciseCategory::Strength),
        ("barbell-row", "back", Equipment::Barbell, ExerciseCategory::Strength),
        ("lat-pulldown", "back", Equipment::Cable, ExerciseCategory::Strength),
        ("dumbbell-curl", "biceps", Equipment::Dumbbell, ExerciseCategory::Strength),
        ("back-squat", "quads", Equipment::Barbell, ExerciseCategory::Strength),
        ("romanian-deadlift", "hamstrings", Equipment::Barbell, ExerciseCategory::Strength),
        ("standing-calf-raise", "calves", Equipment::Machine, ExerciseCategory::Strength),
        ("pull-up", "back", Equipment::Bodyweight, ExerciseCategory::Strength),
        ("treadmill-run", "quads", Equipment::Machine, ExerciseCategory::Cardio),
    ];
    for (id, muscle, equipment, category) in catalog {
        db.insert_exercise(&ExerciseRow {
            id: (*id).to_string(),
            name: id.replace('-', " "),
            muscle_group: Some((*muscle).to_string()),
            custom_muscle_group: None,
            equipment: *equipment,
            category: *category,
        })?;
    }

    let workouts: &[(&str, &[(&str, u32, f64)])] = &[
        ("push", &[("bench-press", 8, 135.0), ("overhead-press", 8, 85.0), ("triceps-pushdown", 12, 50.0)]),
        ("pull", &[("barbell-row", 8, 155.0), ("lat-pulldown", 10, 120.0), ("dumbbell-curl", 12, 30.0)]),
        ("legs", &[("back-squat", 5, 185.0), ("romanian-deadlift", 8, 165.0), ("standing-calf-raise", 15, 90.0)]),
    ];

    for (index, (name, split, exercises)) in [
        ("Push Day A", Some(SplitType::Push), workouts[0].1),
        ("Pull Day A", None, workouts[1].1),
        ("Leg Day", Some(SplitType::Legs), workouts[2].1),
    ]
    .into_iter()
    .enumerate()
    {
        db.insert_template(&NewTemplate {
            id: format!("template-{}", index + 1),
            user_id: user_id.to_string(),
            name: name.to_string(),
            split_type: split,
            last_used_at: Some(now - Duration::days(2 + index as i64)),
            exercises: exercises
                .iter()
                .map(|(id, reps, weight)| TemplateExercise {
                    exercise_id: (*id).to_string(),
                    default_weight: Some(*weight),
                    default_reps: Some(*reps),
                })
                .collect(),
        })?;
    }

    let mut inserted = 0_u32;
    let mut rotation = 0_usize;
    for days_ago in (1..=34_i64).rev() {
        // One rest day per rotation block
        if days_ago % 4 == 0 {
            continue;
        }
        let (kind, exercises) = workouts[rotation % workouts.len()];
        rotation += 1;

        let finished = now - Duration::days(days_ago) - Duration::hours(6);
        // Small linear progression over the month
        let week = (34 - days_ago) / 7;
        let mut sets = Vec::new();
        for (exercise_id, target_reps, base_weight) in exercises {
            let weight = base_weight + (week as f64) * 5.0;
            for set_index in 0..3 {
                let reps = if days_ago % 5 == 0 {
                    target_reps + 2
                } else {
                    *target_reps
                };
                sets.push(NewSet {
                    exercise_id: (*exercise_id).to_string(),
                    actual_reps: Some(reps),
                    target_reps: Some(*target_reps),
                    actual_weight: Some(weight),
                    target_weight: Some(weight),
                    rpe: Some(7.0 + (set_index as f64) * 0.5),
                    ..NewSet::default()
                });
            }
        }
        if kind == "legs" {
            sets.push(NewSet {
                exercise_id: "treadmill-run".to_string(),
                actual_duration_min: Some(25.0),
                actual_distance: Some(2.5),
                actual_incline: Some(1.5),
                ..NewSet::default()
            });
        }

        db.insert_session(&NewSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            template_id: None,
            finished_at: Some(finished),
            ended_for_inactivity: false,
            sets,
        })?;
        inserted += 1;
    }

    Ok(inserted)
}
