pub mod database;
pub mod fraud;
pub mod geofence;
pub mod oib;
pub mod similarity;

pub use database::{CachedRestaurantStore, InMemoryRestaurantStore, RestaurantStore};
pub use fraud::{calculate_amount_consistency, detect_fraud_patterns, detect_fraud_patterns_at};
pub use geofence::{calculate_gps_distance, check_geofence};
pub use oib::validate_oib_checksum;
pub use similarity::{calculate_string_similarity, levenshtein_distance};
