use crate::config::FraudConfig;
use crate::models::{ExtractedFields, FraudSignal, GeofenceResult};
use crate::validation::oib::validate_oib_checksum;
use chrono::{Local, NaiveDateTime, Timelike};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days elapsed from `timestamp` to `now`, floored. Negative for future timestamps.
pub fn days_since(timestamp: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - timestamp).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Heuristic fraud signals for a parsed receipt, evaluated against the current time.
pub fn detect_fraud_patterns(
    fields: &ExtractedFields,
    geofence: Option<&GeofenceResult>,
) -> Vec<FraudSignal> {
    detect_fraud_patterns_at(fields, geofence, &FraudConfig::default(), Local::now().naive_local())
}

/// Each rule contributes at most one signal; several rules may fire together.
pub fn detect_fraud_patterns_at(
    fields: &ExtractedFields,
    geofence: Option<&GeofenceResult>,
    config: &FraudConfig,
    now: NaiveDateTime,
) -> Vec<FraudSignal> {
    let mut signals = Vec::new();

    if let Some(total) = fields.total_amount {
        if total % config.round_total_step == 0.0 && total >= config.round_total_min {
            signals.push(FraudSignal::RoundTotal);
        }
    }

    if let Some(midnight) = fields.issue_date.and_then(|d| d.and_hms_opt(0, 0, 0)) {
        let days = days_since(midnight, now);
        if days > config.max_age_days {
            signals.push(FraudSignal::OldReceipt);
        }
        if days < 0 {
            signals.push(FraudSignal::FutureDate);
        }
    }

    if let Some(time) = fields.issue_time {
        let hour = time.hour();
        if hour < config.earliest_hour || hour > config.latest_hour {
            signals.push(FraudSignal::UnusualHours);
        }
    }

    if let Some(oib) = &fields.oib {
        if !validate_oib_checksum(oib) {
            signals.push(FraudSignal::InvalidOib);
        }
    }

    if let Some(geo) = geofence {
        let far_away = geo
            .distance
            .map_or(false, |d| d > config.location_mismatch_distance_m);
        if geo.within_geofence == Some(false) && far_away {
            signals.push(FraudSignal::LocationMismatch);
        }
    }

    if !signals.is_empty() {
        log::debug!("Fraud signals: {:?}", signals);
    }
    signals
}

/// Banded agreement between the total a user declared and the one read from the receipt.
///
/// `None` when either side is missing.
pub fn calculate_amount_consistency(declared: Option<f64>, extracted: Option<f64>) -> Option<f64> {
    let (declared, extracted) = match (declared, extracted) {
        (Some(d), Some(e)) => (d, e),
        _ => return None,
    };

    let diff = (declared - extracted).abs();
    if diff == 0.0 {
        return Some(1.0);
    }
    if extracted == 0.0 {
        return Some(0.0);
    }

    let percent = diff * 100.0 / extracted.abs();
    let consistency = if percent <= 2.0 {
        0.95
    } else if percent <= 5.0 {
        0.85
    } else if percent <= 10.0 {
        0.7
    } else {
        0.0
    };
    Some(consistency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap()
    }

    fn detect(fields: &ExtractedFields, geofence: Option<&GeofenceResult>) -> Vec<FraudSignal> {
        detect_fraud_patterns_at(fields, geofence, &FraudConfig::default(), now())
    }

    #[test]
    fn test_clean_receipt_has_no_signals() {
        let fields = ExtractedFields {
            oib: Some("12345678903".to_string()),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 15),
            issue_time: NaiveTime::from_hms_opt(12, 15, 0),
            total_amount: Some(25.5),
            ..Default::default()
        };
        let geo = GeofenceResult { within_geofence: Some(true), distance: Some(20.0) };
        assert!(detect(&fields, Some(&geo)).is_empty());
    }

    #[test]
    fn test_round_total() {
        let mut fields = ExtractedFields { total_amount: Some(150.0), ..Default::default() };
        assert_eq!(detect(&fields, None), vec![FraudSignal::RoundTotal]);

        fields.total_amount = Some(90.0);
        assert!(detect(&fields, None).is_empty());

        fields.total_amount = Some(105.0);
        assert!(detect(&fields, None).is_empty());
    }

    #[test]
    fn test_old_and_future_dates() {
        let mut fields = ExtractedFields {
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 7),
            ..Default::default()
        };
        assert_eq!(detect(&fields, None), vec![FraudSignal::OldReceipt]);

        fields.issue_date = NaiveDate::from_ymd_opt(2024, 3, 8);
        assert!(detect(&fields, None).is_empty());

        fields.issue_date = NaiveDate::from_ymd_opt(2024, 3, 16);
        assert_eq!(detect(&fields, None), vec![FraudSignal::FutureDate]);
    }

    #[test]
    fn test_unusual_hours() {
        let mut fields = ExtractedFields {
            issue_time: NaiveTime::from_hms_opt(3, 10, 0),
            ..Default::default()
        };
        assert_eq!(detect(&fields, None), vec![FraudSignal::UnusualHours]);

        fields.issue_time = NaiveTime::from_hms_opt(6, 0, 0);
        assert!(detect(&fields, None).is_empty());
    }

    #[test]
    fn test_invalid_oib_and_location_mismatch_fire_together() {
        let fields = ExtractedFields {
            oib: Some("12345678901".to_string()),
            total_amount: Some(200.0),
            ..Default::default()
        };
        let far = GeofenceResult { within_geofence: Some(false), distance: Some(1200.0) };
        assert_eq!(
            detect(&fields, Some(&far)),
            vec![FraudSignal::RoundTotal, FraudSignal::InvalidOib, FraudSignal::LocationMismatch]
        );

        let near_miss = GeofenceResult { within_geofence: Some(false), distance: Some(400.0) };
        assert!(!detect(&fields, Some(&near_miss)).contains(&FraudSignal::LocationMismatch));
    }

    #[test]
    fn test_days_since_floors() {
        let today_noon = now();
        let yesterday_evening = today_noon - chrono::Duration::hours(20);
        assert_eq!(days_since(yesterday_evening, today_noon), 0);
        assert_eq!(days_since(today_noon + chrono::Duration::hours(1), today_noon), -1);
    }

    #[test]
    fn test_amount_consistency_bands() {
        assert_eq!(calculate_amount_consistency(Some(100.0), Some(100.0)), Some(1.0));
        assert_eq!(calculate_amount_consistency(Some(102.0), Some(100.0)), Some(0.95));
        assert_eq!(calculate_amount_consistency(Some(105.0), Some(100.0)), Some(0.85));
        assert_eq!(calculate_amount_consistency(Some(110.0), Some(100.0)), Some(0.7));
        assert_eq!(calculate_amount_consistency(Some(120.0), Some(100.0)), Some(0.0));
        assert_eq!(calculate_amount_consistency(None, Some(100.0)), None);
        assert_eq!(calculate_amount_consistency(Some(100.0), None), None);
    }
}
