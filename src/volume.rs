//! Stimulus and volume aggregation
//!
//! Turns raw set aggregates into per-muscle training volume and "stimulus"
//! quantities. Stimulus is a unitless dose estimate per session and muscle:
//! strength work is dosed against the athlete's own baseline weekly volume,
//! cardio work through an ACSM-style MET estimate reconstructed from pace
//! and incline.

use crate::config::StimulusConfig;
use crate::data_access::StimulusRow;

/// Meters per minute in one mile per hour
const MPH_TO_M_PER_MIN: f64 = 26.8224;

/// Kilometre-recorded distances converted to miles
const KM_TO_MILES: f64 = 0.621_371;

/// Resting oxygen uptake, ml/kg/min; 1 MET by definition
const RESTING_VO2: f64 = 3.5;

/// Stimulus calculation engine
pub struct StimulusCalculator {
    config: StimulusConfig,
}

impl Default for StimulusCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl StimulusCalculator {
    /// Create a calculator with shipped constants
    pub fn new() -> Self {
        StimulusCalculator {
            config: StimulusConfig::default(),
        }
    }

    /// Create a calculator with custom constants
    pub fn with_config(config: StimulusConfig) -> Self {
        StimulusCalculator { config }
    }

    /// Normalize a baseline-window volume to a weekly average
    ///
    /// Returns None when the window holds no volume: a missing baseline is
    /// an explicit state every downstream formula must handle, never a zero
    /// divisor.
    pub fn baseline_weekly(&self, baseline_window_volume: f64, weeks: i64) -> Option<f64> {
        if baseline_window_volume > 0.0 && weeks > 0 {
            Some(baseline_window_volume / weeks as f64)
        } else {
            None
        }
    }

    /// Strength stimulus of one session for one muscle group, 0-1.5
    ///
    /// The larger of a set-count dose (saturating at `set_saturation` sets)
    /// and a volume dose relative to the baseline weekly volume. Without a
    /// baseline the volume dose falls back to a fixed absolute divisor.
    pub fn strength_stimulus(
        &self,
        sets: u32,
        volume: f64,
        baseline_weekly: Option<f64>,
    ) -> f64 {
        if sets == 0 && volume <= 0.0 {
            return 0.0;
        }
        let set_component = (f64::from(sets) / self.config.set_saturation).min(1.0);
        let divisor = match baseline_weekly {
            Some(weekly) if weekly > 0.0 => weekly * self.config.baseline_dose_fraction,
            _ => self.config.absolute_volume_divisor,
        };
        let volume_component = (volume / divisor).min(self.config.strength_stimulus_cap);
        set_component.max(volume_component).max(0.0)
    }

    /// Cardio stimulus of one session for one muscle group, 0-0.9
    ///
    /// Reconstructs pace from distance and duration (auto-detecting
    /// kilometre-recorded distances when the computed pace is implausibly
    /// fast), estimates incline-adjusted VO2 with the ACSM walking/running
    /// equations, converts to MET, and doses by MET-minutes.
    pub fn cardio_stimulus(
        &self,
        minutes: f64,
        distance: Option<f64>,
        incline_minutes: f64,
    ) -> f64 {
        if !minutes.is_finite() || minutes <= 0.0 {
            return 0.0;
        }
        let met = self.estimate_met(minutes, distance, incline_minutes);
        let raw = (met - 1.0) * minutes / self.config.cardio_minutes_divisor;
        raw.clamp(0.0, self.config.cardio_stimulus_cap)
    }

    /// Total stimulus of one session row for its muscle group
    ///
    /// Strength and cardio doses add without a combined cap.
    pub fn session_stimulus(&self, row: &StimulusRow, baseline_weekly: Option<f64>) -> f64 {
        self.strength_stimulus(row.strength_sets, row.strength_volume, baseline_weekly)
            + self.cardio_stimulus(
                row.cardio_minutes,
                row.cardio_distance,
                row.cardio_incline_minutes,
            )
    }

    /// Estimated MET for a cardio bout
    fn estimate_met(&self, minutes: f64, distance: Option<f64>, incline_minutes: f64) -> f64 {
        let distance = match distance {
            Some(d) if d.is_finite() && d > 0.0 => d,
            // No usable distance: assume a moderate walk
            _ => return self.config.default_cardio_met,
        };

        let hours = minutes / 60.0;
        let mut mph = distance / hours;
        if mph > self.config.km_detection_pace_mph {
            // Faster than any sustained human pace in miles: the distance
            // was recorded in kilometres
            mph = distance * KM_TO_MILES / hours;
        }
        if !mph.is_finite() || mph <= 0.0 {
            return self.config.default_cardio_met;
        }

        let grade = if incline_minutes.is_finite() && incline_minutes > 0.0 {
            (incline_minutes / minutes) / 100.0
        } else {
            0.0
        };

        let speed_m_min = mph * MPH_TO_M_PER_MIN;
        let vo2 = if mph > self.config.walk_run_crossover_mph {
            // ACSM running equation
            0.2 * speed_m_min + 0.9 * speed_m_min * grade + RESTING_VO2
        } else {
            // ACSM walking equation
            0.1 * speed_m_min + 1.8 * speed_m_min * grade + RESTING_VO2
        };

        let met = vo2 / RESTING_VO2;
        if met.is_finite() && met >= 1.0 {
            met
        } else {
            self.config.default_cardio_met
        }
    }
}
