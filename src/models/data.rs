use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields the receipt parser tries to recover from OCR text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReceiptField {
    Oib,
    Jir,
    Zki,
    IssueDate,
    IssueTime,
    TotalAmount,
    MerchantName,
    MerchantAddress,
}

impl ReceiptField {
    pub const ALL: [ReceiptField; 8] = [
        ReceiptField::Oib,
        ReceiptField::Jir,
        ReceiptField::Zki,
        ReceiptField::IssueDate,
        ReceiptField::IssueTime,
        ReceiptField::TotalAmount,
        ReceiptField::MerchantName,
        ReceiptField::MerchantAddress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptField::Oib => "oib",
            ReceiptField::Jir => "jir",
            ReceiptField::Zki => "zki",
            ReceiptField::IssueDate => "issueDate",
            ReceiptField::IssueTime => "issueTime",
            ReceiptField::TotalAmount => "totalAmount",
            ReceiptField::MerchantName => "merchantName",
            ReceiptField::MerchantAddress => "merchantAddress",
        }
    }
}

impl fmt::Display for ReceiptField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single field extractor.
///
/// A missing value always carries a confidence of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExtraction<T> {
    pub value: Option<T>,
    pub confidence: f64,
}

impl<T> FieldExtraction<T> {
    pub fn found(value: T, confidence: f64) -> Self {
        FieldExtraction {
            value: Some(value),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn missing() -> Self {
        FieldExtraction {
            value: None,
            confidence: 0.0,
        }
    }

    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }

    pub fn split(self) -> (Option<T>, f64) {
        match self.value {
            Some(value) => (Some(value), self.confidence),
            None => (None, 0.0),
        }
    }
}

impl<T> Default for FieldExtraction<T> {
    fn default() -> Self {
        Self::missing()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    pub oib: Option<String>,
    pub jir: Option<String>,
    pub zki: Option<String>,
    pub issue_date: Option<NaiveDate>,
    #[serde(with = "hh_mm", default)]
    pub issue_time: Option<NaiveTime>,
    pub total_amount: Option<f64>,
    pub merchant_name: Option<String>,
    pub merchant_address: Option<String>,
}

/// Per-field confidences, keyed exactly like `ExtractedFields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfidences {
    pub oib: f64,
    pub jir: f64,
    pub zki: f64,
    pub issue_date: f64,
    pub issue_time: f64,
    pub total_amount: f64,
    pub merchant_name: f64,
    pub merchant_address: f64,
}

impl FieldConfidences {
    pub fn get(&self, field: ReceiptField) -> f64 {
        match field {
            ReceiptField::Oib => self.oib,
            ReceiptField::Jir => self.jir,
            ReceiptField::Zki => self.zki,
            ReceiptField::IssueDate => self.issue_date,
            ReceiptField::IssueTime => self.issue_time,
            ReceiptField::TotalAmount => self.total_amount,
            ReceiptField::MerchantName => self.merchant_name,
            ReceiptField::MerchantAddress => self.merchant_address,
        }
    }

    /// Mean of the non-zero confidences, or 0 when nothing was extracted.
    pub fn overall(&self) -> f64 {
        let non_zero: Vec<f64> = ReceiptField::ALL
            .iter()
            .map(|field| self.get(*field))
            .filter(|c| *c > 0.0)
            .collect();

        if non_zero.is_empty() {
            0.0
        } else {
            non_zero.iter().sum::<f64>() / non_zero.len() as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedReceipt {
    pub fields: ExtractedFields,
    pub confidences: FieldConfidences,
    pub overall_confidence: f64,
}

impl ParsedReceipt {
    /// Every field absent, every confidence zero.
    pub fn empty() -> Self {
        ParsedReceipt::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinates {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceResult {
    pub within_geofence: Option<bool>,
    /// Meters, rounded to one decimal.
    pub distance: Option<f64>,
}

impl GeofenceResult {
    pub fn unknown() -> Self {
        GeofenceResult::default()
    }

    pub fn is_known(&self) -> bool {
        self.within_geofence.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudSignal {
    RoundTotal,
    OldReceipt,
    FutureDate,
    UnusualHours,
    InvalidOib,
    LocationMismatch,
}

impl FraudSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudSignal::RoundTotal => "round_total",
            FraudSignal::OldReceipt => "old_receipt",
            FraudSignal::FutureDate => "future_date",
            FraudSignal::UnusualHours => "unusual_hours",
            FraudSignal::InvalidOib => "invalid_oib",
            FraudSignal::LocationMismatch => "location_mismatch",
        }
    }
}

impl fmt::Display for FraudSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AutoApproved,
    PendingReview,
    Rejected,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Decision::AutoApproved => write!(f, "auto_approved"),
            Decision::PendingReview => write!(f, "pending_review"),
            Decision::Rejected => write!(f, "rejected"),
        }
    }
}

/// Signed point contribution of every scoring factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub oib_validation: f64,
    pub oib_match: f64,
    pub date_validation: f64,
    pub amount_consistency: f64,
    pub merchant_match: f64,
    pub location: f64,
    pub ocr_confidence: f64,
    pub fraud_penalty: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.oib_validation
            + self.oib_match
            + self.date_validation
            + self.amount_consistency
            + self.merchant_match
            + self.location
            + self.ocr_confidence
            + self.fraud_penalty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub score: f64,
    pub decision: Decision,
    pub reasons: Vec<String>,
    pub breakdown: ScoreBreakdown,
}

/// Read contract of the restaurant table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub oib: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Restaurant {
    pub fn location(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrBlock {
    pub text: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    pub confidence: f64,
    #[serde(default)]
    pub blocks: Vec<OcrBlock>,
}

impl OcrOutput {
    pub fn empty() -> Self {
        OcrOutput::default()
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFingerprint {
    pub perceptual_hash: Option<String>,
    pub sha256: String,
}

/// A receipt as submitted by a user.
#[derive(Debug, Clone, Default)]
pub struct ReceiptSubmission {
    pub image: Vec<u8>,
    pub declared_total: Option<f64>,
    pub user_location: Option<Coordinates>,
    pub restaurant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub parsed: ParsedReceipt,
    pub vision_confidence: Option<f64>,
    pub geofence: Option<GeofenceResult>,
    pub fraud_flags: Vec<FraudSignal>,
    pub fingerprint: Option<ImageFingerprint>,
    pub duplicate_of: Option<String>,
    pub result: DecisionResult,
}

/// `HH:MM` (de)serialization for receipt times.
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => serializer.serialize_str(&t.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) => NaiveTime::parse_from_str(&s, FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_extraction_has_zero_confidence() {
        let (value, confidence) = FieldExtraction::<String>::missing().split();
        assert!(value.is_none());
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_overall_confidence_ignores_zero_entries() {
        let confidences = FieldConfidences {
            oib: 0.95,
            total_amount: 0.5,
            ..Default::default()
        };
        assert!((confidences.overall() - 0.725).abs() < 1e-9);
        assert_eq!(FieldConfidences::default().overall(), 0.0);
    }

    #[test]
    fn test_extracted_fields_serialize_time_as_hours_minutes() {
        let fields = ExtractedFields {
            issue_time: NaiveTime::from_hms_opt(9, 5, 30),
            ..Default::default()
        };
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json["issueTime"], "09:05");
        assert!(json["oib"].is_null());

        let back: ExtractedFields = serde_json::from_value(json).unwrap();
        assert_eq!(back.issue_time, NaiveTime::from_hms_opt(9, 5, 0));
    }

    #[test]
    fn test_signal_and_decision_wire_names() {
        assert_eq!(
            serde_json::to_string(&FraudSignal::LocationMismatch).unwrap(),
            "\"location_mismatch\""
        );
        assert_eq!(Decision::PendingReview.to_string(), "pending_review");
    }
}
