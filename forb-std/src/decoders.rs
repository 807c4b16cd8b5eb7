//! Bundled decoders

use forb_plugin::prelude::*;

pub struct ExampleFormat;
pub struct Rot13;
pub struct HexBytes;
pub struct DecimalInteger;
pub struct CurrencyAmount;

const EXAMPLE_PREFIX: &str = "EXAMPLE:";

impl DecoderPlugin for ExampleFormat {
    fn meta(&self) -> DecoderMeta {
        DecoderMeta::new("example-format", "Example Custom Format")
            .with_aliases(&["example", "ex"])
            .with_description("Strings that start with the EXAMPLE: prefix")
    }

    fn decode(&self, input: &str) -> Result<Vec<Interpretation>, PluginFailure> {
        let Some(content) = input.strip_prefix(EXAMPLE_PREFIX) else {
            return Ok(vec![]);
        };
        Ok(vec![Interpretation::new(
            CoreValue::Text(content.to_string()),
            0.95,
            format!("Example format: {}", content),
        )])
    }

    fn conversions(&self, value: &CoreValue) -> Result<Vec<Conversion>, PluginFailure> {
        match value {
            CoreValue::Text(s) => Ok(vec![Conversion::new(value.clone(), format!("{}{}", EXAMPLE_PREFIX, s))]),
            _ => Ok(vec![]),
        }
    }
}

impl Rot13 {
    const MIN_LETTERS: usize = 3;

    fn is_candidate_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || " .,!?'-\"".contains(c)
    }

    fn rotate(input: &str) -> String {
        input
            .chars()
            .map(|c| match c {
                'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
                'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
                _ => c,
            })
            .collect()
    }
}

impl DecoderPlugin for Rot13 {
    fn meta(&self) -> DecoderMeta {
        DecoderMeta::new("rot13-encoded", "ROT13 Encoded Text")
            .with_aliases(&["rot13"])
            .with_description("Heuristic ROT13 detection for plain-looking text")
    }

    fn decode(&self, input: &str) -> Result<Vec<Interpretation>, PluginFailure> {
        let letters = input.chars().filter(|c| c.is_alphabetic()).count();
        if letters < Self::MIN_LETTERS || !input.chars().all(Self::is_candidate_char) {
            return Ok(vec![]);
        }

        let decoded = Self::rotate(input);
        if decoded == input {
            return Ok(vec![]);
        }

        // Any text could be "ROT13", so keep this low
        Ok(vec![Interpretation::new(
            CoreValue::Text(decoded.clone()),
            0.3,
            format!("ROT13 decoded: {}", decoded),
        )])
    }

    fn conversions(&self, value: &CoreValue) -> Result<Vec<Conversion>, PluginFailure> {
        let CoreValue::Text(s) = value else {
            return Ok(vec![]);
        };
        if !s.chars().all(Self::is_candidate_char) {
            return Ok(vec![]);
        }
        let rotated = Self::rotate(s);
        if &rotated == s {
            return Ok(vec![]);
        }
        Ok(vec![Conversion::new(CoreValue::Text(rotated.clone()), rotated)])
    }
}

impl HexBytes {
    /// Returns the continuous hex digits and whether the layout itself
    /// signals hex (a `0x` prefix or byte separators).
    fn normalize(input: &str) -> Option<(String, bool)> {
        let trimmed = input.trim();
        if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            return Some((hex.to_string(), true));
        }
        for sep in [' ', ':'] {
            if trimmed.contains(sep) {
                let parts: Vec<&str> = trimmed.split(sep).filter(|p| !p.is_empty()).collect();
                if parts.iter().all(|p| p.len() == 2) {
                    return Some((parts.concat(), true));
                }
                return None;
            }
        }
        let has_letters = trimmed.chars().any(|c| c.is_ascii_alphabetic());
        Some((trimmed.to_string(), has_letters))
    }
}

impl DecoderPlugin for HexBytes {
    fn meta(&self) -> DecoderMeta {
        DecoderMeta::new("hex", "Hexadecimal Bytes")
            .with_aliases(&["bytes", "hexbytes"])
            .with_description("0x-prefixed, separated or continuous hex byte strings")
    }

    fn decode(&self, input: &str) -> Result<Vec<Interpretation>, PluginFailure> {
        let Some((digits, high_confidence)) = Self::normalize(input) else {
            return Ok(vec![]);
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(vec![]);
        }
        let Ok(bytes) = hex::decode(&digits) else {
            return Ok(vec![]);
        };

        let confidence = if high_confidence {
            0.92
        } else if bytes.len() >= 2 {
            0.6
        } else {
            0.4
        };
        let description = format!("{} bytes", bytes.len());
        Ok(vec![Interpretation::new(CoreValue::Bytes(bytes), confidence, description)])
    }

    fn conversions(&self, value: &CoreValue) -> Result<Vec<Conversion>, PluginFailure> {
        let bytes = match value {
            CoreValue::Bytes(b) if !b.is_empty() => b.clone(),
            CoreValue::Text(s) if !s.is_empty() => s.as_bytes().to_vec(),
            CoreValue::Integer(n) if *n >= 0 => {
                let be = (*n as u128).to_be_bytes();
                let first = be.iter().position(|b| *b != 0).unwrap_or(be.len() - 1);
                be[first..].to_vec()
            }
            _ => return Ok(vec![]),
        };
        let display = format!("0x{}", hex::encode(&bytes));
        Ok(vec![Conversion::new(CoreValue::Bytes(bytes), display)])
    }
}

impl DecoderPlugin for DecimalInteger {
    fn meta(&self) -> DecoderMeta {
        DecoderMeta::new("integer", "Decimal Integer")
            .with_aliases(&["int", "decimal"])
            .with_description("Signed base-10 integers, with optional _ or , grouping")
    }

    fn decode(&self, input: &str) -> Result<Vec<Interpretation>, PluginFailure> {
        let trimmed = input.trim();
        let cleaned: String = trimmed.chars().filter(|c| *c != '_' && *c != ',').collect();
        let digits = cleaned.strip_prefix('-').unwrap_or(&cleaned);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Ok(vec![]);
        }
        let Ok(n) = cleaned.parse::<i128>() else {
            return Ok(vec![]);
        };
        let confidence = if cleaned.len() == trimmed.len() { 0.85 } else { 0.7 };
        Ok(vec![Interpretation::new(CoreValue::Integer(n), confidence, format!("Integer {}", n))])
    }

    /// Bytes read as an unsigned big-endian integer
    fn conversions(&self, value: &CoreValue) -> Result<Vec<Conversion>, PluginFailure> {
        let CoreValue::Bytes(bytes) = value else {
            return Ok(vec![]);
        };
        if bytes.is_empty() || bytes.len() > 16 {
            return Ok(vec![]);
        }
        let n = bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
        let Ok(n) = i128::try_from(n) else {
            return Ok(vec![]);
        };
        Ok(vec![Conversion::new(CoreValue::Integer(n), n.to_string())])
    }
}

impl CurrencyAmount {
    fn parse(input: &str) -> Option<(Number, String)> {
        let mut parts = input.split_whitespace();
        let (first, second) = (parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }
        let is_code = |s: &str| (3..=5).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphabetic());

        let (amount, code) = if is_code(second) {
            (first, second)
        } else if is_code(first) {
            (second, first)
        } else {
            return None;
        };
        let amount = Number::from_str(&amount.replace(['_', ','], "")).ok()?;
        Some((amount, code.to_ascii_uppercase()))
    }
}

impl DecoderPlugin for CurrencyAmount {
    fn meta(&self) -> DecoderMeta {
        DecoderMeta::new("currency-amount", "Currency Amount")
            .with_aliases(&["currency", "money"])
            .with_description("An amount followed or preceded by a currency code, e.g. 1.5 BTC")
    }

    fn decode(&self, input: &str) -> Result<Vec<Interpretation>, PluginFailure> {
        let Some((amount, code)) = Self::parse(input) else {
            return Ok(vec![]);
        };
        let description = format!("{} {}", amount, code);
        Ok(vec![Interpretation::new(CoreValue::Currency { amount, code }, 0.9, description)])
    }
}
