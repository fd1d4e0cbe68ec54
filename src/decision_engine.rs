use crate::config::{DecisionThresholds, ScoringWeights, VerifierConfig};
use crate::models::{
    Decision, DecisionResult, ExtractedFields, FraudSignal, GeofenceResult, Restaurant,
    ScoreBreakdown,
};
use crate::utils::VerifyError;
use crate::validation::database::RestaurantStore;
use crate::validation::fraud::{calculate_amount_consistency, days_since};
use crate::validation::oib::validate_oib_checksum;
use crate::validation::similarity::calculate_string_similarity;
use chrono::{Local, NaiveDateTime, Timelike};

/// Everything the engine weighs for one receipt.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub extracted_data: &'a ExtractedFields,
    pub declared_total: Option<f64>,
    pub user_location: Option<GeofenceResult>,
    pub restaurant_id: Option<&'a str>,
    pub fraud_flags: &'a [FraudSignal],
    pub vision_confidence: Option<f64>,
    pub parser_confidence: Option<f64>,
}

// Points earned by one factor and the explanation shown to reviewers.
struct Factor {
    points: f64,
    reason: Option<String>,
}

impl Factor {
    fn new(points: f64, reason: impl Into<String>) -> Self {
        Factor {
            points,
            reason: Some(reason.into()),
        }
    }

    fn silent() -> Self {
        Factor {
            points: 0.0,
            reason: None,
        }
    }
}

/// Weighted multi-factor scoring of a parsed receipt into approve / review / reject.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    weights: ScoringWeights,
    thresholds: DecisionThresholds,
}

impl DecisionEngine {
    pub fn new(config: &VerifierConfig) -> Self {
        DecisionEngine {
            weights: config.scoring.clone(),
            thresholds: config.thresholds.clone(),
        }
    }

    pub async fn calculate_auto_approve_score(
        &self,
        store: &dyn RestaurantStore,
        input: &ScoringInput<'_>,
    ) -> Result<DecisionResult, VerifyError> {
        self.calculate_auto_approve_score_at(store, input, Local::now().naive_local())
            .await
    }

    /// Scores the receipt as of `now`.
    ///
    /// A failed OIB lookup is returned as an error; a failed merchant lookup
    /// only zeroes the merchant factor.
    pub async fn calculate_auto_approve_score_at(
        &self,
        store: &dyn RestaurantStore,
        input: &ScoringInput<'_>,
        now: NaiveDateTime,
    ) -> Result<DecisionResult, VerifyError> {
        let fields = input.extracted_data;
        let valid_oib = fields.oib.as_deref().filter(|oib| validate_oib_checksum(oib));

        let oib_lookup = async {
            match valid_oib {
                Some(oib) => store.find_by_oib(oib).await,
                None => Ok(None),
            }
        };
        let restaurant_lookup = async {
            match input.restaurant_id {
                Some(id) => Some(store.find_by_id(id).await),
                None => None,
            }
        };
        let (oib_restaurant, restaurant) = tokio::join!(oib_lookup, restaurant_lookup);
        let oib_restaurant = oib_restaurant?;

        let mut breakdown = ScoreBreakdown::default();
        let mut reasons = Vec::new();
        let mut record = |factor: Factor, slot: &mut f64| {
            *slot = factor.points;
            if let Some(reason) = factor.reason.filter(|r| !r.is_empty()) {
                reasons.push(reason);
            }
        };

        let (validation, oib_match) = self.score_oib(
            fields.oib.as_deref(),
            oib_restaurant.as_ref(),
            input.restaurant_id,
        );
        breakdown.oib_match = oib_match;
        record(validation, &mut breakdown.oib_validation);
        record(self.score_date(fields, now), &mut breakdown.date_validation);
        record(
            self.score_amount(input.declared_total, fields.total_amount),
            &mut breakdown.amount_consistency,
        );
        record(
            self.score_merchant(fields.merchant_name.as_deref(), input.restaurant_id, restaurant),
            &mut breakdown.merchant_match,
        );
        record(
            self.score_location(input.user_location),
            &mut breakdown.location,
        );
        record(
            self.score_ocr_confidence(input.vision_confidence, input.parser_confidence),
            &mut breakdown.ocr_confidence,
        );
        record(
            self.fraud_penalty(input.fraud_flags),
            &mut breakdown.fraud_penalty,
        );

        let score = (breakdown.total().clamp(0.0, 1.0) * 100.0).round() / 100.0;
        let decision = self.decide(score);
        log::info!("Receipt scored {:.2}: {}", score, decision);

        Ok(DecisionResult {
            score,
            decision,
            reasons,
            breakdown,
        })
    }

    pub fn decide(&self, score: f64) -> Decision {
        if score >= self.thresholds.auto_approve {
            Decision::AutoApproved
        } else if score < self.thresholds.reject {
            Decision::Rejected
        } else {
            Decision::PendingReview
        }
    }

    // Returns the validation factor plus the bonus for the OIB belonging to the claimed restaurant.
    fn score_oib(
        &self,
        oib: Option<&str>,
        registered: Option<&Restaurant>,
        restaurant_id: Option<&str>,
    ) -> (Factor, f64) {
        let w = &self.weights;
        let oib = match oib {
            Some(oib) => oib,
            None => return (Factor::new(0.0, "No OIB found on receipt"), 0.0),
        };
        if !validate_oib_checksum(oib) {
            return (Factor::new(0.0, format!("OIB {} fails checksum", oib)), 0.0);
        }

        match registered {
            Some(restaurant) if restaurant_id == Some(restaurant.id.as_str()) => (
                Factor::new(
                    w.oib_verified,
                    format!("OIB {} belongs to {}, the claimed restaurant", oib, restaurant.name),
                ),
                w.oib_restaurant_match,
            ),
            Some(restaurant) => (
                Factor::new(
                    w.oib_verified,
                    format!("OIB {} is registered to {}", oib, restaurant.name),
                ),
                0.0,
            ),
            None => (
                Factor::new(
                    w.oib_checksum_only,
                    format!("OIB {} is valid but not registered", oib),
                ),
                0.0,
            ),
        }
    }

    fn score_date(&self, fields: &ExtractedFields, now: NaiveDateTime) -> Factor {
        let w = &self.weights;
        let date = match fields.issue_date {
            Some(date) => date,
            None => return Factor::new(0.0, "Receipt date not found"),
        };

        let (hour, minute) = fields
            .issue_time
            .map_or((0, 0), |t| (t.hour(), t.minute()));
        let issued = match date.and_hms_opt(hour, minute, 0) {
            Some(ts) => ts,
            None => return Factor::new(0.0, "Receipt date not usable"),
        };

        let days = days_since(issued, now);
        if days < 0 {
            Factor::new(0.0, "Receipt is dated in the future")
        } else if days <= w.date_recent_days {
            Factor::new(w.date_recent, format!("Receipt issued {} day(s) ago", days))
        } else if days <= w.date_week_days {
            Factor::new(w.date_week, format!("Receipt issued {} days ago", days))
        } else {
            Factor::new(0.0, format!("Receipt is too old ({} days)", days))
        }
    }

    fn score_amount(&self, declared: Option<f64>, extracted: Option<f64>) -> Factor {
        let w = &self.weights;
        match (declared, extracted) {
            (Some(declared), Some(extracted)) => {
                let consistency =
                    calculate_amount_consistency(Some(declared), Some(extracted)).unwrap_or(0.0);
                Factor::new(
                    w.amount * consistency,
                    format!(
                        "Declared total {:.2} vs receipt total {:.2} (consistency {:.2})",
                        declared, extracted, consistency
                    ),
                )
            }
            (None, Some(extracted)) => Factor::new(
                w.amount_unverified,
                format!("Receipt total {:.2} found, nothing declared to compare", extracted),
            ),
            _ => Factor::new(0.0, "Receipt total not found"),
        }
    }

    fn score_merchant(
        &self,
        merchant_name: Option<&str>,
        restaurant_id: Option<&str>,
        restaurant: Option<Result<Option<Restaurant>, VerifyError>>,
    ) -> Factor {
        let w = &self.weights;
        let restaurant = match (restaurant_id, restaurant) {
            (Some(_), Some(Ok(Some(restaurant)))) => restaurant,
            (Some(id), Some(Ok(None))) => {
                return Factor::new(0.0, format!("Restaurant {} not found", id));
            }
            (Some(id), Some(Err(e))) => {
                log::warn!("Merchant check skipped, lookup of restaurant {} failed: {}", id, e);
                return Factor::new(0.0, "Merchant check unavailable");
            }
            _ => return Factor::silent(),
        };

        let name = match merchant_name {
            Some(name) => name,
            None => return Factor::new(0.0, "Merchant name not found on receipt"),
        };

        let similarity =
            calculate_string_similarity(&name.to_lowercase(), &restaurant.name.to_lowercase());
        let points = if similarity > w.merchant_strong_similarity {
            w.merchant_strong
        } else if similarity > w.merchant_partial_similarity {
            w.merchant_partial
        } else {
            0.0
        };

        Factor::new(
            points,
            format!(
                "Merchant \"{}\" vs \"{}\" (similarity {:.2})",
                name, restaurant.name, similarity
            ),
        )
    }

    fn score_location(&self, geofence: Option<GeofenceResult>) -> Factor {
        let w = &self.weights;
        let geo = match geofence.filter(|g| g.is_known()) {
            Some(geo) => geo,
            None => return Factor::new(0.0, "Location data unavailable"),
        };
        let distance = geo.distance.unwrap_or(f64::INFINITY);

        if geo.within_geofence == Some(true) {
            Factor::new(
                w.location_inside,
                format!("Submitted at the restaurant ({:.1} m)", distance),
            )
        } else if distance < w.location_near_distance_m {
            Factor::new(
                w.location_near,
                format!("Submitted near the restaurant ({:.1} m)", distance),
            )
        } else {
            Factor::new(
                0.0,
                format!("Submitted far from the restaurant ({:.1} m)", distance),
            )
        }
    }

    fn score_ocr_confidence(&self, vision: Option<f64>, parser: Option<f64>) -> Factor {
        match (vision, parser) {
            (Some(vision), Some(parser)) => {
                let average = (vision + parser) / 2.0;
                Factor::new(
                    self.weights.ocr_confidence * average,
                    format!("OCR confidence {:.2}", average),
                )
            }
            _ => Factor::silent(),
        }
    }

    fn fraud_penalty(&self, flags: &[FraudSignal]) -> Factor {
        let w = &self.weights;
        if flags.is_empty() {
            return Factor::new(0.0, "No fraud signals");
        }

        let penalty = (flags.len() as f64 * w.fraud_per_signal).min(w.fraud_cap);
        let names: Vec<&str> = flags.iter().map(|f| f.as_str()).collect();
        Factor::new(
            -penalty,
            format!("Fraud signals: {} (-{:.2})", names.join(", "), penalty),
        )
    }
}
