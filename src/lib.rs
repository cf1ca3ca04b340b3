// Library interface for liftrs modules
// This allows the CLI and integration tests to access the analytics core

pub mod config;
pub mod data_access;
pub mod database;
pub mod error;
pub mod fatigue;
pub mod logging;
pub mod models;
pub mod progression;
pub mod recap;
pub mod recommendation;
pub mod volume;

// Re-export commonly used types for convenience
pub use models::*;
pub use config::{AnalyticsConfig, AppConfig};
pub use data_access::{DataAccess, InMemoryStore};
pub use database::Database;
pub use error::{LiftrsError, Result};
pub use fatigue::{FatigueAnalyzer, FatigueReport, FatigueStatus, MuscleFatigueEntry};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use progression::{ProgressionAdvisor, ProgressionReport, ProgressionSuggestion};
pub use recap::{RecapAnalyzer, RecapSlice};
pub use recommendation::{RecommendationEngine, UpNextRecommendation, UserPreferences};
pub use volume::StimulusCalculator;
