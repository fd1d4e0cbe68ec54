// Field extraction from raw OCR text of Croatian fiscal receipts.
// Every extractor is independent: a miss yields an empty value with zero confidence.

use crate::models::{ExtractedFields, FieldConfidences, FieldExtraction, ParsedReceipt};
use crate::validation::oib::validate_oib_checksum;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

const OIB_VALID_CONFIDENCE: f64 = 0.95;
const OIB_UNCHECKED_CONFIDENCE: f64 = 0.3;
const FISCAL_CODE_CONFIDENCE: f64 = 0.9;
const DATE_CONFIDENCE: f64 = 0.85;
const FUTURE_DATE_CONFIDENCE: f64 = 0.3;
const TIME_CONFIDENCE: f64 = 0.8;
const TOTAL_KEYWORD_CONFIDENCE: f64 = 0.9;
const TOTAL_FALLBACK_CONFIDENCE: f64 = 0.5;
const MERCHANT_MARKER_CONFIDENCE: f64 = 0.85;
const MERCHANT_FIRST_LINE_CONFIDENCE: f64 = 0.6;
const ADDRESS_CONFIDENCE: f64 = 0.7;

const MERCHANT_SCAN_LINES: usize = 5;
const ADDRESS_SCAN_LINES: usize = 8;
// Lines inspected for an amount: the keyword line and the two after it.
const TOTAL_LOOKAHEAD: usize = 2;

lazy_static! {
    static ref OIB_PATTERN: Regex = Regex::new(r"\b\d{11}\b").unwrap();

    static ref JIR_PATTERNS: Vec<Regex> = vec![
        // Labelled, hyphenated or bare
        Regex::new(r"(?i)\bJIR\s*[:.]?\s*([0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12})\b").unwrap(),
        // Unlabelled UUID layout
        Regex::new(r"(?i)\b([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\b").unwrap(),
    ];

    // Unlabelled run of 32 hex digits; may also be the ZKI.
    static ref BARE_HEX_32: Regex = Regex::new(r"(?i)\b[0-9a-f]{32}\b").unwrap();

    // 32 hex digits, possibly broken up by spaces; a 33rd adjacent digit disqualifies.
    static ref ZKI_PATTERN: Regex =
        Regex::new(r"(?i)\bZKI\s*[:.]?\s*([0-9a-f](?:[ \t]*[0-9a-f]){31})([0-9a-f])?").unwrap();

    static ref DATE_PATTERN: Regex =
        Regex::new(r"\b(\d{1,2})\.\s?(\d{1,2})\.\s?(\d{4})\b").unwrap();

    static ref TIME_PATTERN: Regex =
        Regex::new(r"\b([01]?\d|2[0-3]):([0-5]\d)(?::([0-5]\d))?\b").unwrap();

    static ref TOTAL_KEYWORDS: Regex =
        Regex::new(r"(?i)(ukupno|za platiti|total|iznos|suma|sveukupno|€|EUR)").unwrap();

    static ref NUMERIC_TOKEN: Regex = Regex::new(r"\d[\d.,]*\d").unwrap();

    static ref AMOUNT_SHAPES: Vec<Regex> = vec![
        Regex::new(r"^\d{1,4}[.,]\d{2}$").unwrap(),
        // Thousands grouping: 1.234,56 / 1,234.56
        Regex::new(r"^\d{1,3}(?:[.,]\d{3})+[.,]\d{2}$").unwrap(),
    ];

    static ref MERCHANT_MARKERS: Regex = Regex::new(
        r"(?i)(\bj\.d\.o\.o\.|\bd\.o\.o\.|\bobrt\b|\bj\.t\.d\.|\bd\.d\.|\brestoran\b|\bkavana\b|\bcaffe\b)"
    ).unwrap();

    static ref ADDRESS_PATTERN: Regex =
        Regex::new(r"^\p{Lu}[\p{L}.]*(?:\s+[\p{L}.]+)*\s+\d{1,4}[a-zA-Z]?(?:[\s,/]|$)").unwrap();

    static ref NOT_ADDRESS: Regex =
        Regex::new(r"(?i)(ra[čc]un|broj|\bbr\.|\bstol\b|blagajn|\bkasa\b|\boib\b|\bjir\b|\bzki\b)").unwrap();
}

pub struct ReceiptParser;

impl ReceiptParser {
    /// Parse raw OCR text, judging dates against the current local time.
    pub fn parse(text: &str) -> ParsedReceipt {
        Self::parse_at(text, Local::now().naive_local())
    }

    pub fn parse_at(text: &str, now: NaiveDateTime) -> ParsedReceipt {
        if text.trim().is_empty() {
            return ParsedReceipt::empty();
        }

        let (oib, oib_c) = Self::extract_oib(text).split();
        let (jir, jir_c) = Self::extract_jir(text).split();
        let (zki, zki_c) = Self::extract_zki(text).split();
        let (issue_date, date_c) = Self::extract_date(text, now.date()).split();
        let (issue_time, time_c) = Self::extract_time(text).split();
        let (total_amount, total_c) = Self::extract_total(text).split();
        let (merchant_name, name_c) = Self::extract_merchant_name(text).split();
        let (merchant_address, address_c) = Self::extract_merchant_address(text).split();

        let fields = ExtractedFields {
            oib,
            jir,
            zki,
            issue_date,
            issue_time,
            total_amount,
            merchant_name,
            merchant_address,
        };
        let confidences = FieldConfidences {
            oib: oib_c,
            jir: jir_c,
            zki: zki_c,
            issue_date: date_c,
            issue_time: time_c,
            total_amount: total_c,
            merchant_name: name_c,
            merchant_address: address_c,
        };
        let overall_confidence = confidences.overall();

        log::debug!(
            "Parsed receipt: {:?} (overall confidence {:.2})",
            fields,
            overall_confidence
        );

        ParsedReceipt {
            fields,
            confidences,
            overall_confidence,
        }
    }

    /// First checksum-valid 11-digit run, else the first 11-digit run at low confidence.
    pub fn extract_oib(text: &str) -> FieldExtraction<String> {
        let candidates: Vec<&str> = OIB_PATTERN.find_iter(text).map(|m| m.as_str()).collect();

        if let Some(valid) = candidates.iter().find(|c| validate_oib_checksum(c)) {
            return FieldExtraction::found(valid.to_string(), OIB_VALID_CONFIDENCE);
        }
        match candidates.first() {
            Some(first) => FieldExtraction::found(first.to_string(), OIB_UNCHECKED_CONFIDENCE),
            None => FieldExtraction::missing(),
        }
    }

    /// JIR normalized to 32 uppercase hex digits.
    pub fn extract_jir(text: &str) -> FieldExtraction<String> {
        for pattern in JIR_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(text) {
                if let Some(matched) = captures.get(1) {
                    let value = matched.as_str().replace('-', "").to_uppercase();
                    if value.len() == 32 {
                        return FieldExtraction::found(value, FISCAL_CODE_CONFIDENCE);
                    }
                }
            }
        }

        let zki = Self::extract_zki(text).value;
        BARE_HEX_32
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|candidate| zki.as_deref() != Some(candidate.to_lowercase().as_str()))
            .map(|candidate| FieldExtraction::found(candidate.to_uppercase(), FISCAL_CODE_CONFIDENCE))
            .unwrap_or_default()
    }

    /// ZKI normalized to 32 lowercase hex digits.
    pub fn extract_zki(text: &str) -> FieldExtraction<String> {
        let captures = match ZKI_PATTERN.captures(text) {
            Some(c) => c,
            None => return FieldExtraction::missing(),
        };
        if captures.get(2).is_some() {
            return FieldExtraction::missing();
        }

        let value: String = captures[1]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if value.len() == 32 {
            FieldExtraction::found(value, FISCAL_CODE_CONFIDENCE)
        } else {
            FieldExtraction::missing()
        }
    }

    /// Latest `DD.MM.YYYY` date not after `today`; if every date lies in the
    /// future, the earliest one at low confidence.
    pub fn extract_date(text: &str, today: NaiveDate) -> FieldExtraction<NaiveDate> {
        let dates: Vec<NaiveDate> = DATE_PATTERN
            .captures_iter(text)
            .filter_map(|caps| {
                let day = caps[1].parse::<u32>().ok()?;
                let month = caps[2].parse::<u32>().ok()?;
                let year = caps[3].parse::<i32>().ok()?;
                NaiveDate::from_ymd_opt(year, month, day)
            })
            .collect();

        if let Some(latest_past) = dates.iter().filter(|d| **d <= today).max() {
            return FieldExtraction::found(*latest_past, DATE_CONFIDENCE);
        }
        match dates.iter().min() {
            Some(earliest) => FieldExtraction::found(*earliest, FUTURE_DATE_CONFIDENCE),
            None => FieldExtraction::missing(),
        }
    }

    /// First `HH:MM` or `HH:MM:SS` occurrence; seconds are dropped.
    pub fn extract_time(text: &str) -> FieldExtraction<NaiveTime> {
        let time = TIME_PATTERN.captures(text).and_then(|caps| {
            let hour = caps[1].parse::<u32>().ok()?;
            let minute = caps[2].parse::<u32>().ok()?;
            NaiveTime::from_hms_opt(hour, minute, 0)
        });
        match time {
            Some(t) => FieldExtraction::found(t, TIME_CONFIDENCE),
            None => FieldExtraction::missing(),
        }
    }

    /// Largest amount on or just below a total keyword, else the largest
    /// amount anywhere at reduced confidence.
    pub fn extract_total(text: &str) -> FieldExtraction<f64> {
        let lines: Vec<&str> = text.lines().collect();
        let mut keyword_max: Option<f64> = None;

        for (i, line) in lines.iter().enumerate() {
            if !TOTAL_KEYWORDS.is_match(line) {
                continue;
            }
            let window_end = (i + TOTAL_LOOKAHEAD).min(lines.len() - 1);
            for candidate in &lines[i..=window_end] {
                for amount in Self::amounts_in(candidate) {
                    keyword_max = Some(keyword_max.map_or(amount, |max: f64| max.max(amount)));
                }
            }
        }

        if let Some(total) = keyword_max {
            return FieldExtraction::found(total, TOTAL_KEYWORD_CONFIDENCE);
        }

        let fallback = Self::amounts_in(text).into_iter().reduce(f64::max);
        match fallback {
            Some(total) => FieldExtraction::found(total, TOTAL_FALLBACK_CONFIDENCE),
            None => FieldExtraction::missing(),
        }
    }

    /// Money amounts in a piece of text. Numbers belonging to dates, times or
    /// identifiers never qualify.
    fn amounts_in(text: &str) -> Vec<f64> {
        NUMERIC_TOKEN
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|token| AMOUNT_SHAPES.iter().any(|shape| shape.is_match(token)))
            .filter_map(Self::parse_amount)
            .collect()
    }

    // The last separator is the decimal point; earlier ones group thousands.
    fn parse_amount(token: &str) -> Option<f64> {
        let split_at = token.rfind(|c: char| c == '.' || c == ',')?;
        let whole: String = token[..split_at].chars().filter(|c| c.is_ascii_digit()).collect();
        let fraction = &token[split_at + 1..];
        format!("{}.{}", whole, fraction).parse::<f64>().ok()
    }

    pub fn extract_merchant_name(text: &str) -> FieldExtraction<String> {
        let head: Vec<&str> = Self::non_empty_lines(text).take(MERCHANT_SCAN_LINES).collect();

        if let Some(line) = head.iter().find(|line| MERCHANT_MARKERS.is_match(line)) {
            return FieldExtraction::found(line.to_string(), MERCHANT_MARKER_CONFIDENCE);
        }
        match head.first() {
            Some(line) => FieldExtraction::found(line.to_string(), MERCHANT_FIRST_LINE_CONFIDENCE),
            None => FieldExtraction::missing(),
        }
    }

    /// First street-and-number line near the top of the receipt.
    pub fn extract_merchant_address(text: &str) -> FieldExtraction<String> {
        Self::non_empty_lines(text)
            .take(ADDRESS_SCAN_LINES)
            .find(|line| {
                ADDRESS_PATTERN.is_match(line)
                    && !NOT_ADDRESS.is_match(line)
                    && !TOTAL_KEYWORDS.is_match(line)
            })
            .map(|line| FieldExtraction::found(line.to_string(), ADDRESS_CONFIDENCE))
            .unwrap_or_default()
    }

    fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
        text.lines().map(str::trim).filter(|line| !line.is_empty())
    }
}

/// Parse OCR text with the current local time as reference.
pub fn parse_receipt_text(text: &str) -> ParsedReceipt {
    ReceiptParser::parse(text)
}
