use chrono::{NaiveDate, NaiveDateTime};
use receipt_verifier::models::{Coordinates, Decision, FraudSignal, ReceiptSubmission};
use receipt_verifier::processing::StaticOcrClient;
use receipt_verifier::validation::InMemoryRestaurantStore;
use receipt_verifier::{ReceiptVerifier, VerifierConfig};
use std::io::Write;
use std::sync::Arc;

const RESTAURANTS: &str = r#"[
    {
        "id": "r-1",
        "name": "Restoran Mali Raj",
        "oib": "12345678903",
        "latitude": 45.8131,
        "longitude": 15.9772
    },
    {
        "id": "r-2",
        "name": "Caffe Bar Luka",
        "oib": "94577403194",
        "latitude": null,
        "longitude": null
    }
]"#;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 15)
        .expect("valid date")
        .and_hms_opt(20, 0, 0)
        .expect("valid time")
}

fn store() -> InMemoryRestaurantStore {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(RESTAURANTS.as_bytes()).expect("write restaurants");
    let store = InMemoryRestaurantStore::from_json_file(file.path()).expect("load restaurants");
    assert_eq!(store.len(), 2);
    store
}

fn verifier(text: &str, config: VerifierConfig) -> ReceiptVerifier {
    ReceiptVerifier::new(
        Arc::new(StaticOcrClient::new(text, 0.92)),
        Arc::new(store()),
        config,
    )
}

#[tokio::test]
async fn genuine_receipt_at_the_restaurant_is_auto_approved() {
    let text = "\
Restoran Mali Raj
Ilica 12, Zagreb
OIB: 12345678903
Datum: 15.03.2024 19:12
Burger          14,50
Pivo 0,5         4,00
UKUPNO EUR      18,50
ZKI: 1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d
JIR: 9f8e7d6c-5b4a-3928-1706-f5e4d3c2b1a0
";
    let submission = ReceiptSubmission {
        image: Vec::new(),
        declared_total: Some(18.5),
        user_location: Some(Coordinates::new(45.8132, 15.9771)),
        restaurant_id: Some("r-1".to_string()),
    };

    let report = verifier(text, VerifierConfig::default())
        .verify_at(&submission, &[], now())
        .await
        .expect("verification runs");

    assert!(report.fraud_flags.is_empty());
    assert_eq!(report.result.breakdown.merchant_match, 0.1);
    assert!(report.result.score >= 0.95);
    assert_eq!(report.result.decision, Decision::AutoApproved);

    let json = serde_json::to_value(&report).expect("report serializes");
    assert_eq!(json["result"]["decision"], "auto_approved");
    assert_eq!(json["parsed"]["fields"]["oib"], "12345678903");
    assert_eq!(json["parsed"]["fields"]["issueDate"], "2024-03-15");
    assert_eq!(json["parsed"]["fields"]["issueTime"], "19:12");
    assert_eq!(json["geofence"]["withinGeofence"], true);
}

#[tokio::test]
async fn late_night_round_receipt_far_away_goes_to_review() {
    let text = "\
Restoran Mali Raj
OIB: 12345678903
15.03.2024. 02:15
UKUPNO: 150,00
";
    let submission = ReceiptSubmission {
        declared_total: Some(150.0),
        // ~1 km north of the restaurant
        user_location: Some(Coordinates::new(45.8221, 15.9772)),
        restaurant_id: Some("r-1".to_string()),
        ..Default::default()
    };

    let report = verifier(text, VerifierConfig::default())
        .verify_at(&submission, &[], now())
        .await
        .expect("verification runs");

    assert_eq!(
        report.fraud_flags,
        vec![
            FraudSignal::RoundTotal,
            FraudSignal::UnusualHours,
            FraudSignal::LocationMismatch
        ]
    );
    assert_eq!(report.result.breakdown.fraud_penalty, -0.3);
    assert_eq!(report.result.breakdown.location, 0.0);
    assert_eq!(report.result.decision, Decision::PendingReview);
}

#[tokio::test]
async fn forged_receipt_is_rejected() {
    let text = "\
Neki Bistro
OIB: 12345678901
01.01.2024 03:00
UKUPNO: 200,00
";
    let submission = ReceiptSubmission {
        declared_total: Some(120.0),
        restaurant_id: Some("r-1".to_string()),
        ..Default::default()
    };

    let report = verifier(text, VerifierConfig::default())
        .verify_at(&submission, &[], now())
        .await
        .expect("verification runs");

    assert!(report.fraud_flags.contains(&FraudSignal::InvalidOib));
    assert!(report.fraud_flags.contains(&FraudSignal::OldReceipt));
    assert_eq!(report.result.score, 0.0);
    assert_eq!(report.result.decision, Decision::Rejected);
}

#[tokio::test]
async fn restaurant_without_coordinates_scores_location_as_unknown() {
    let text = "Caffe Bar Luka\nOIB 94577403194\n15.03.2024 10:05\nUKUPNO: 7,40\n";
    let submission = ReceiptSubmission {
        declared_total: Some(7.4),
        user_location: Some(Coordinates::new(45.8131, 15.9772)),
        restaurant_id: Some("r-2".to_string()),
        ..Default::default()
    };

    let report = verifier(text, VerifierConfig::default())
        .verify_at(&submission, &[], now())
        .await
        .expect("verification runs");

    let geofence = report.geofence.expect("user location was given");
    assert!(!geofence.is_known());
    assert!(report
        .result
        .reasons
        .iter()
        .any(|r| r == "Location data unavailable"));
    assert_eq!(report.result.breakdown.oib_match, 0.05);
}

#[tokio::test]
async fn stricter_config_holds_back_approval() {
    let text = "Restoran Mali Raj\nOIB: 12345678903\n15.03.2024 19:12\nUKUPNO: 18,50\n";
    let config =
        VerifierConfig::from_json(r#"{ "thresholds": { "auto_approve": 0.99 } }"#).expect("valid");
    let submission = ReceiptSubmission {
        declared_total: Some(18.5),
        restaurant_id: Some("r-1".to_string()),
        ..Default::default()
    };

    let report = verifier(text, config)
        .verify_at(&submission, &[], now())
        .await
        .expect("verification runs");

    // no location, so at most 0.94
    assert!(report.result.score < 0.99);
    assert_eq!(report.result.decision, Decision::PendingReview);
}
