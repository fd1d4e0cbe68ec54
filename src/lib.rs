pub mod config;
pub mod decision_engine;
pub mod models;
pub mod processing;
pub mod receipt_verifier;
pub mod utils;
pub mod validation;

pub use config::VerifierConfig;
pub use decision_engine::{DecisionEngine, ScoringInput};
pub use receipt_verifier::ReceiptVerifier;
pub use utils::VerifyError;
