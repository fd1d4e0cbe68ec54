use crate::config::VerifierConfig;
use crate::decision_engine::{DecisionEngine, ScoringInput};
use crate::models::*;
use crate::processing::*;
use crate::utils::VerifyError;
use crate::validation::*;
use chrono::{Local, NaiveDateTime};
use std::sync::Arc;

pub struct ReceiptVerifier {
    ocr: Arc<dyn OcrClient>,
    store: Arc<dyn RestaurantStore>,
    config: VerifierConfig,
    engine: DecisionEngine,
}

impl ReceiptVerifier {
    pub fn new(
        ocr: Arc<dyn OcrClient>,
        store: Arc<dyn RestaurantStore>,
        config: VerifierConfig,
    ) -> Self {
        let engine = DecisionEngine::new(&config);
        ReceiptVerifier {
            ocr,
            store,
            config,
            engine,
        }
    }

    pub async fn verify(
        &self,
        submission: &ReceiptSubmission,
        known_images: &[ImageFingerprint],
    ) -> Result<VerificationReport, VerifyError> {
        self.verify_at(submission, known_images, Local::now().naive_local())
            .await
    }

    /// Runs the whole pipeline for one submission.
    ///
    /// `known_images` are fingerprints of previously accepted receipts; a match
    /// is reported in `duplicate_of` but does not change the score.
    pub async fn verify_at(
        &self,
        submission: &ReceiptSubmission,
        known_images: &[ImageFingerprint],
        now: NaiveDateTime,
    ) -> Result<VerificationReport, VerifyError> {
        // Step 1: recognize text
        let ocr = match self.ocr.extract_text(&submission.image).await {
            Ok(output) => output,
            Err(e) => {
                log::warn!("OCR via {} failed: {}", self.ocr.name(), e);
                OcrOutput::empty()
            }
        };
        log::debug!(
            "OCR via {} read {} characters (confidence {:.2})",
            self.ocr.name(),
            ocr.text.len(),
            ocr.confidence
        );

        // Step 2: parse receipt fields
        let parsed = ReceiptParser::parse_at(&ocr.text, now);

        // Step 3: locate the claimed restaurant, one lookup per id for this request
        let store = CachedRestaurantStore::new(self.store.as_ref());
        let restaurant_location = match submission.restaurant_id.as_deref() {
            Some(id) => match store.find_by_id(id).await {
                Ok(restaurant) => restaurant.and_then(|r| r.location()),
                Err(e) => {
                    log::warn!("Restaurant {} lookup failed: {}", id, e);
                    None
                }
            },
            None => None,
        };

        let geofence = submission.user_location.map(|user| {
            check_geofence(
                Some(user),
                restaurant_location,
                self.config.geofence.max_distance_m,
            )
        });

        // Step 4: fraud heuristics
        let fraud_flags =
            detect_fraud_patterns_at(&parsed.fields, geofence.as_ref(), &self.config.fraud, now);
        if !fraud_flags.is_empty() {
            log::info!("Fraud signals raised: {:?}", fraud_flags);
        }

        // Step 5: duplicate image check
        let fingerprint = if submission.image.is_empty() {
            None
        } else {
            Some(ImageProcessor::fingerprint(&submission.image))
        };
        let duplicate_of = fingerprint
            .as_ref()
            .and_then(|fp| self.find_duplicate(fp, known_images));
        if let Some(original) = &duplicate_of {
            log::warn!("Receipt image matches a previous submission ({})", original);
        }

        // Step 6: score
        let vision_confidence = ocr.has_text().then_some(ocr.confidence);
        let parser_confidence = vision_confidence.map(|_| parsed.overall_confidence);
        let input = ScoringInput {
            extracted_data: &parsed.fields,
            declared_total: submission.declared_total,
            user_location: geofence,
            restaurant_id: submission.restaurant_id.as_deref(),
            fraud_flags: &fraud_flags,
            vision_confidence,
            parser_confidence,
        };
        let result = self
            .engine
            .calculate_auto_approve_score_at(&store, &input, now)
            .await?;

        Ok(VerificationReport {
            parsed,
            vision_confidence,
            geofence,
            fraud_flags,
            fingerprint,
            duplicate_of,
            result,
        })
    }

    fn find_duplicate(
        &self,
        fingerprint: &ImageFingerprint,
        known_images: &[ImageFingerprint],
    ) -> Option<String> {
        let threshold = self.config.image.similarity_threshold;
        known_images
            .iter()
            .find(|known| {
                known.sha256 == fingerprint.sha256
                    || are_similar_images(
                        known.perceptual_hash.as_deref(),
                        fingerprint.perceptual_hash.as_deref(),
                        threshold,
                    )
            })
            .map(|known| known.sha256.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const RECEIPT: &str = "RESTORAN MALI RAJ\n\
                           Ilica 12, Zagreb\n\
                           OIB: 12345678903\n\
                           Datum: 15.03.2024. 12:30\n\
                           UKUPNO EUR 42,50\n";

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap()
    }

    fn verifier(ocr: Arc<dyn OcrClient>) -> ReceiptVerifier {
        let store = InMemoryRestaurantStore::new(vec![Restaurant {
            id: "r-1".to_string(),
            name: "Restoran Mali Raj".to_string(),
            oib: Some("12345678903".to_string()),
            latitude: Some(45.8131),
            longitude: Some(15.9772),
        }]);
        ReceiptVerifier::new(ocr, Arc::new(store), VerifierConfig::default())
    }

    struct BrokenOcr;

    #[async_trait::async_trait]
    impl OcrClient for BrokenOcr {
        fn name(&self) -> &str {
            "broken"
        }

        async fn extract_text(&self, _image_data: &[u8]) -> Result<OcrOutput, VerifyError> {
            Err(VerifyError::OcrError("engine crashed".to_string()))
        }
    }

    #[tokio::test]
    async fn test_clean_receipt_at_restaurant_is_approved() {
        let verifier = verifier(Arc::new(StaticOcrClient::new(RECEIPT, 0.9)));
        let submission = ReceiptSubmission {
            image: Vec::new(),
            declared_total: Some(42.5),
            user_location: Some(Coordinates::new(45.8132, 15.9773)),
            restaurant_id: Some("r-1".to_string()),
        };

        let report = verifier.verify_at(&submission, &[], now()).await.unwrap();

        assert_eq!(report.parsed.fields.oib.as_deref(), Some("12345678903"));
        assert_eq!(report.geofence.and_then(|g| g.within_geofence), Some(true));
        assert!(report.fraud_flags.is_empty());
        assert!(report.fingerprint.is_none());
        assert_eq!(report.result.decision, Decision::AutoApproved);
    }

    #[tokio::test]
    async fn test_ocr_failure_degrades_to_rejection() {
        let verifier = verifier(Arc::new(BrokenOcr));
        let submission = ReceiptSubmission {
            image: b"jpeg bytes".to_vec(),
            declared_total: Some(42.5),
            ..Default::default()
        };

        let report = verifier.verify_at(&submission, &[], now()).await.unwrap();

        assert_eq!(report.parsed, ParsedReceipt::empty());
        assert_eq!(report.vision_confidence, None);
        assert!(report.geofence.is_none());
        assert_eq!(report.result.decision, Decision::Rejected);
    }

    #[tokio::test]
    async fn test_unknown_restaurant_has_unknown_geofence() {
        let verifier = verifier(Arc::new(StaticOcrClient::new(RECEIPT, 0.9)));
        let submission = ReceiptSubmission {
            user_location: Some(Coordinates::new(45.8132, 15.9773)),
            restaurant_id: Some("missing".to_string()),
            ..Default::default()
        };

        let report = verifier.verify_at(&submission, &[], now()).await.unwrap();
        assert_eq!(report.geofence, Some(GeofenceResult::unknown()));
        assert_eq!(report.result.breakdown.location, 0.0);
    }

    #[tokio::test]
    async fn test_resubmitted_image_is_flagged() {
        let verifier = verifier(Arc::new(StaticOcrClient::new(RECEIPT, 0.9)));
        let image = b"same bytes as before".to_vec();
        let known = vec![ImageProcessor::fingerprint(&image)];
        let submission = ReceiptSubmission {
            image,
            ..Default::default()
        };

        let report = verifier.verify_at(&submission, &known, now()).await.unwrap();
        assert_eq!(report.duplicate_of, Some(known[0].sha256.clone()));

        let fresh = ReceiptSubmission {
            image: b"another photo".to_vec(),
            ..Default::default()
        };
        let report = verifier.verify_at(&fresh, &known, now()).await.unwrap();
        assert!(report.duplicate_of.is_none());
    }
}
