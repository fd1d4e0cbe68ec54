// Fingerprints receipt photos and reports which ones look like the same receipt.

use receipt_verifier::processing::{calculate_hamming_distance, ImageProcessor};
use receipt_verifier::VerifierConfig;
use std::path::Path;

fn main() {
    env_logger::init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: receipt_hash <image> [<image> ...]");
        std::process::exit(2);
    }
    let threshold = VerifierConfig::default().image.similarity_threshold;

    let mut fingerprints = Vec::new();
    for path in &paths {
        match ImageProcessor::read_image(Path::new(path)) {
            Ok(bytes) => {
                let fp = ImageProcessor::fingerprint(&bytes);
                println!(
                    "{}\n  sha256: {}\n  phash:  {}",
                    path,
                    fp.sha256,
                    fp.perceptual_hash.as_deref().unwrap_or("-")
                );
                fingerprints.push((path, fp));
            }
            Err(err) => eprintln!("❌ {}", err),
        }
    }

    if fingerprints.len() < 2 {
        return;
    }

    println!("\nPAIRWISE DISTANCES (similar at <= {} bits):", threshold);
    for (i, (path_a, a)) in fingerprints.iter().enumerate() {
        for (path_b, b) in &fingerprints[i + 1..] {
            let verdict = if a.sha256 == b.sha256 {
                "IDENTICAL".to_string()
            } else {
                match calculate_hamming_distance(a.perceptual_hash.as_deref(), b.perceptual_hash.as_deref()) {
                    Some(d) if d <= threshold => format!("{} bits, SIMILAR", d),
                    Some(d) => format!("{} bits", d),
                    None => "not comparable".to_string(),
                }
            };
            println!("  {} <-> {}: {}", path_a, path_b, verdict);
        }
    }
}
