// Receipt verification command line

use clap::{Parser, Subcommand};
use receipt_verifier::{
    config::VerifierConfig,
    models::{Coordinates, ReceiptSubmission, VerificationReport},
    processing::{ImageProcessor, NoopOcrClient, OcrClient, ReceiptParser, StaticOcrClient},
    utils::VerifyError,
    validation::{validate_oib_checksum, InMemoryRestaurantStore},
    ReceiptVerifier,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "receipt-verifier")]
#[command(about = "Verify Croatian fiscal receipts for restaurant rewards")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract receipt fields from already recognized text
    Parse {
        /// Receipt text; read from this file
        #[arg(long)]
        text: PathBuf,
    },
    /// Score a receipt submission
    Verify {
        /// Receipt photo
        #[arg(long)]
        image: Option<PathBuf>,
        /// Recognized receipt text, used instead of running OCR
        #[arg(long)]
        text: Option<PathBuf>,
        /// Confidence attached to --text
        #[arg(long, default_value_t = 0.9)]
        text_confidence: f64,
        #[arg(long)]
        declared_total: Option<f64>,
        #[arg(long, requires = "user_lng")]
        user_lat: Option<f64>,
        #[arg(long, requires = "user_lat")]
        user_lng: Option<f64>,
        #[arg(long)]
        restaurant_id: Option<String>,
        /// JSON array of restaurants
        #[arg(long)]
        restaurants: Option<PathBuf>,
        /// Photos of previously accepted receipts
        #[arg(long)]
        known_image: Vec<PathBuf>,
        /// JSON config overriding the default weights and thresholds
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check an OIB's control digit
    CheckOib { oib: String },
}

fn print_detailed_report(report: &VerificationReport) {
    let fields = &report.parsed.fields;
    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    println!("\n===============================================");
    println!("      RECEIPT VERIFICATION DETAILED REPORT");
    println!("===============================================\n");

    println!("RECEIPT INFORMATION:");
    println!("  Merchant: {}", show(fields.merchant_name.clone()));
    println!("  Address: {}", show(fields.merchant_address.clone()));
    println!("  OIB: {}", show(fields.oib.clone()));
    println!("  JIR: {}", show(fields.jir.clone()));
    println!("  ZKI: {}", show(fields.zki.clone()));
    println!("  Date: {}", show(fields.issue_date.map(|d| d.format("%d.%m.%Y").to_string())));
    println!("  Time: {}", show(fields.issue_time.map(|t| t.format("%H:%M").to_string())));
    println!("  Total: {}", show(fields.total_amount.map(|t| format!("{:.2} EUR", t))));
    println!("  Parser confidence: {:.2}", report.parsed.overall_confidence);

    let b = &report.result.breakdown;
    println!("\nSCORE BREAKDOWN:");
    println!("  OIB validation:     {:+.3}", b.oib_validation);
    println!("  OIB match:          {:+.3}", b.oib_match);
    println!("  Date:               {:+.3}", b.date_validation);
    println!("  Amount:             {:+.3}", b.amount_consistency);
    println!("  Merchant:           {:+.3}", b.merchant_match);
    println!("  Location:           {:+.3}", b.location);
    println!("  OCR confidence:     {:+.3}", b.ocr_confidence);
    println!("  Fraud penalty:      {:+.3}", b.fraud_penalty);

    if !report.fraud_flags.is_empty() {
        println!("\nFRAUD SIGNALS:");
        for flag in &report.fraud_flags {
            println!("  - {}", flag);
        }
    }
    if let Some(original) = &report.duplicate_of {
        println!("\nDUPLICATE OF: {}", original);
    }

    println!("\nREASONS:");
    for reason in &report.result.reasons {
        println!("  - {}", reason);
    }

    println!(
        "\nReceipt score: {:.2} -> {}",
        report.result.score,
        report.result.decision.to_string().to_uppercase()
    );
}

fn ocr_client(text: Option<PathBuf>, confidence: f64) -> Result<Arc<dyn OcrClient>, VerifyError> {
    if let Some(path) = text {
        let raw = std::fs::read_to_string(&path)?;
        return Ok(Arc::new(StaticOcrClient::new(raw, confidence)));
    }

    #[cfg(feature = "tesseract")]
    {
        Ok(Arc::new(receipt_verifier::processing::TesseractOcrClient::default()))
    }
    #[cfg(not(feature = "tesseract"))]
    {
        log::warn!("Built without OCR support and no --text given; receipt text will be empty");
        Ok(Arc::new(NoopOcrClient))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("Error verifying receipt: {}", err);
            ExitCode::FAILURE
        }
    }
}

// Exit status: 0 on success, 2 when `check-oib` rejects the number.
async fn run(cli: Cli) -> Result<u8, VerifyError> {
    match cli.command {
        Commands::Parse { text } => {
            let raw = std::fs::read_to_string(&text)?;
            let parsed = ReceiptParser::parse(&raw);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Commands::Verify {
            image,
            text,
            text_confidence,
            declared_total,
            user_lat,
            user_lng,
            restaurant_id,
            restaurants,
            known_image,
            config,
            json,
        } => {
            let config = match config {
                Some(path) => VerifierConfig::from_file(path)?,
                None => VerifierConfig::default(),
            };
            let store = match restaurants {
                Some(path) => InMemoryRestaurantStore::from_json_file(path)?,
                None => InMemoryRestaurantStore::default(),
            };
            let image = match image {
                Some(path) => ImageProcessor::read_image(&path)?,
                None => Vec::new(),
            };
            let known_images = known_image
                .iter()
                .map(|path| ImageProcessor::read_image(path).map(|b| ImageProcessor::fingerprint(&b)))
                .collect::<Result<Vec<_>, _>>()?;

            let submission = ReceiptSubmission {
                image,
                declared_total,
                user_location: user_lat.zip(user_lng).map(|(lat, lng)| Coordinates::new(lat, lng)),
                restaurant_id,
            };

            let verifier = ReceiptVerifier::new(
                ocr_client(text, text_confidence)?,
                Arc::new(store),
                config,
            );
            let report = verifier.verify(&submission, &known_images).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_detailed_report(&report);
            }
        }
        Commands::CheckOib { oib } => {
            let valid = validate_oib_checksum(oib.trim());
            println!("{}: {}", oib, if valid { "VALID" } else { "INVALID" });
            if !valid {
                return Ok(2);
            }
        }
    }

    Ok(0)
}
