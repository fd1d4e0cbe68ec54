//! Tunable weights, thresholds and radii for receipt verification.
//!
//! Every section defaults to the production constants, so a JSON file only
//! needs to name the values it overrides.

use crate::processing::image::DEFAULT_SIMILARITY_THRESHOLD;
use crate::utils::VerifyError;
use crate::validation::geofence::DEFAULT_MAX_DISTANCE_M;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub scoring: ScoringWeights,
    pub thresholds: DecisionThresholds,
    pub geofence: GeofenceConfig,
    pub fraud: FraudConfig,
    pub image: ImageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub oib_verified: f64,
    pub oib_restaurant_match: f64,
    pub oib_checksum_only: f64,
    pub date_recent: f64,
    pub date_recent_days: i64,
    pub date_week: f64,
    pub date_week_days: i64,
    pub amount: f64,
    pub amount_unverified: f64,
    pub merchant_strong: f64,
    pub merchant_strong_similarity: f64,
    pub merchant_partial: f64,
    pub merchant_partial_similarity: f64,
    pub location_inside: f64,
    pub location_near: f64,
    pub location_near_distance_m: f64,
    pub ocr_confidence: f64,
    pub fraud_per_signal: f64,
    pub fraud_cap: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            oib_verified: 0.3,
            oib_restaurant_match: 0.05,
            oib_checksum_only: 0.15,
            date_recent: 0.2,
            date_recent_days: 2,
            date_week: 0.1,
            date_week_days: 7,
            amount: 0.2,
            amount_unverified: 0.1,
            merchant_strong: 0.1,
            merchant_strong_similarity: 0.8,
            merchant_partial: 0.05,
            merchant_partial_similarity: 0.5,
            location_inside: 0.1,
            location_near: 0.05,
            location_near_distance_m: 500.0,
            ocr_confidence: 0.1,
            fraud_per_signal: 0.1,
            fraud_cap: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    pub auto_approve: f64,
    pub reject: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        DecisionThresholds {
            auto_approve: 0.8,
            reject: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    pub max_distance_m: f64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        GeofenceConfig {
            max_distance_m: DEFAULT_MAX_DISTANCE_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    pub round_total_min: f64,
    pub round_total_step: f64,
    pub max_age_days: i64,
    pub earliest_hour: u32,
    pub latest_hour: u32,
    pub location_mismatch_distance_m: f64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        FraudConfig {
            round_total_min: 100.0,
            round_total_step: 10.0,
            max_age_days: 7,
            earliest_hour: 6,
            latest_hour: 23,
            location_mismatch_distance_m: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Maximum Hamming distance (bits) for two receipt photos to count as the same.
    pub similarity_threshold: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        ImageConfig {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl VerifierConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VerifyError> {
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            VerifyError::ConfigError(format!(
                "Failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, VerifyError> {
        let config: VerifierConfig = serde_json::from_str(raw)
            .map_err(|e| VerifyError::ConfigError(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VerifyError> {
        let mut problems = Vec::new();
        let s = &self.scoring;

        let weights = [
            ("scoring.oib_verified", s.oib_verified),
            ("scoring.oib_restaurant_match", s.oib_restaurant_match),
            ("scoring.oib_checksum_only", s.oib_checksum_only),
            ("scoring.date_recent", s.date_recent),
            ("scoring.date_week", s.date_week),
            ("scoring.amount", s.amount),
            ("scoring.amount_unverified", s.amount_unverified),
            ("scoring.merchant_strong", s.merchant_strong),
            ("scoring.merchant_partial", s.merchant_partial),
            ("scoring.location_inside", s.location_inside),
            ("scoring.location_near", s.location_near),
            ("scoring.ocr_confidence", s.ocr_confidence),
            ("scoring.fraud_per_signal", s.fraud_per_signal),
            ("scoring.fraud_cap", s.fraud_cap),
        ];
        for (name, value) in weights {
            if !(0.0..=1.0).contains(&value) {
                problems.push(format!("{} must be within [0, 1], got {}", name, value));
            }
        }

        if s.date_recent_days < 0 || s.date_week_days < s.date_recent_days {
            problems.push("scoring.date_recent_days must be >= 0 and <= date_week_days".to_string());
        }
        if s.merchant_partial_similarity > s.merchant_strong_similarity {
            problems.push(
                "scoring.merchant_partial_similarity must not exceed merchant_strong_similarity"
                    .to_string(),
            );
        }

        let t = &self.thresholds;
        if !(0.0..=1.0).contains(&t.auto_approve) || !(0.0..=1.0).contains(&t.reject) {
            problems.push("thresholds must be within [0, 1]".to_string());
        }
        if t.reject > t.auto_approve {
            problems.push(format!(
                "thresholds.reject ({}) must not exceed thresholds.auto_approve ({})",
                t.reject, t.auto_approve
            ));
        }

        if self.geofence.max_distance_m <= 0.0 {
            problems.push("geofence.max_distance_m must be positive".to_string());
        }
        if s.location_near_distance_m <= 0.0 || self.fraud.location_mismatch_distance_m <= 0.0 {
            problems.push("location distances must be positive".to_string());
        }
        if self.fraud.round_total_step <= 0.0 {
            problems.push("fraud.round_total_step must be positive".to_string());
        }
        if self.fraud.earliest_hour > 23 || self.fraud.latest_hour > 23 {
            problems.push("fraud hours must be within 0..=23".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(VerifyError::ConfigError(problems.join("; ")))
        }
    }
}
