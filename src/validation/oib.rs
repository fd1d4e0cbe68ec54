/// Validate a Croatian OIB using the ISO 7064 MOD 11,10 check digit.
///
/// Anything other than exactly 11 ASCII digits is rejected.
pub fn validate_oib_checksum(oib: &str) -> bool {
    if oib.len() != 11 || !oib.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }

    match (oib_check_digit(&oib[..10]), oib[10..].parse::<u32>()) {
        (Some(expected), Ok(actual)) => expected == actual,
        _ => false,
    }
}

/// Check digit that completes the first ten digits of an OIB.
pub fn oib_check_digit(first_ten: &str) -> Option<u32> {
    if first_ten.len() != 10 || !first_ten.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut acc = 10;
    for digit in first_ten.chars().filter_map(|c| c.to_digit(10)) {
        acc = (acc + digit) % 10;
        if acc == 0 {
            acc = 10;
        }
        acc = (acc * 2) % 11;
    }
    Some((11 - acc) % 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_OIBS: [&str; 4] = ["12345678903", "69435151530", "00000000001", "94577403194"];

    #[test]
    fn test_known_valid_oibs() {
        for oib in VALID_OIBS {
            assert!(validate_oib_checksum(oib), "{} should be valid", oib);
        }
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert!(!validate_oib_checksum(""));
        assert!(!validate_oib_checksum("1234567890"));
        assert!(!validate_oib_checksum("123456789033"));
        assert!(!validate_oib_checksum("1234567890a"));
        assert!(!validate_oib_checksum("12345 78903"));
        assert!(!validate_oib_checksum("١٢٣٤٥٦٧٨٩٠٣"));
    }

    #[test]
    fn test_any_single_digit_change_fails() {
        for oib in VALID_OIBS {
            for position in 0..oib.len() {
                let original = oib.as_bytes()[position];
                for replacement in (b'0'..=b'9').filter(|d| *d != original) {
                    let mut mutated = oib.as_bytes().to_vec();
                    mutated[position] = replacement;
                    let mutated = String::from_utf8(mutated).unwrap();
                    assert!(
                        !validate_oib_checksum(&mutated),
                        "{} (position {}) should be invalid",
                        mutated,
                        position
                    );
                }
            }
        }
    }

    #[test]
    fn test_check_digit_matches_validation() {
        assert_eq!(oib_check_digit("1234567890"), Some(3));
        assert_eq!(oib_check_digit("123456789"), None);
        assert_eq!(oib_check_digit("12345678x0"), None);
    }
}
