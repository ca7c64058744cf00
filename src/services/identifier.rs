// Identifier generation
//
// Derives SQL-safe table and column names from display titles, which are
// typically Thai. Thai characters are transliterated character by character
// following the Royal Thai General System, everything else is slugged down
// to lowercase ASCII. The output is deterministic: the same title always
// yields the same identifier.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::adapters::sql_quote::is_safe_identifier;
use crate::core::error::ValidationError;

/// Length of the deterministic collision suffix, including the separator
const COLLISION_SUFFIX_LEN: usize = 7;

/// Derives SQL identifiers from display titles
#[derive(Debug, Clone)]
pub struct IdentifierGenerator {
    max_length: usize,
}

impl IdentifierGenerator {
    /// Create a generator with the given maximum identifier length
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// The configured maximum identifier length
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Derive a slug from a title, falling back to `fallback` when the
    /// title carries no usable characters at all
    pub fn slugify(&self, title: &str, fallback: &str) -> String {
        let mut slug = String::new();
        let mut pending_separator = false;

        for ch in title.chars() {
            let mapped = transliterate(ch);
            match mapped {
                Mapped::Text(text) => {
                    if pending_separator && !slug.is_empty() {
                        slug.push('_');
                    }
                    pending_separator = false;
                    slug.push_str(text);
                }
                Mapped::Char(c) => {
                    if pending_separator && !slug.is_empty() {
                        slug.push('_');
                    }
                    pending_separator = false;
                    slug.push(c);
                }
                Mapped::Separator => pending_separator = true,
                Mapped::Drop => {}
            }
        }

        let mut slug = if slug.is_empty() {
            fallback.to_string()
        } else {
            slug
        };

        if slug.starts_with(|c: char| c.is_ascii_digit()) {
            slug = format!("{}_{}", fallback, slug);
        }

        truncate_ascii(&slug, self.max_length)
    }

    /// Append the deterministic collision suffix derived from the owning
    /// entity's identifier, keeping the result within the length limit
    pub fn with_collision_suffix(&self, base: &str, owner: &Uuid) -> String {
        let digest = Sha256::digest(owner.as_bytes());
        let suffix: String = digest
            .iter()
            .take(3)
            .map(|b| format!("{:02x}", b))
            .collect();

        let budget = self.max_length.saturating_sub(COLLISION_SUFFIX_LEN);
        format!("{}_{}", truncate_ascii(base, budget), suffix)
    }

    /// Validate an already-assigned identifier
    pub fn validate(&self, identifier: &str) -> Result<(), ValidationError> {
        if identifier.len() > self.max_length || !is_safe_identifier(identifier) {
            return Err(ValidationError::IdentifierTooLong {
                identifier: identifier.to_string(),
                max: self.max_length,
            });
        }
        Ok(())
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new(63)
    }
}

enum Mapped {
    Text(&'static str),
    Char(char),
    Separator,
    Drop,
}

/// Per-character transliteration
///
/// Thai consonants and vowels map to their romanized form; tone marks and
/// the cancellation mark carry no segmental value and are dropped.
fn transliterate(ch: char) -> Mapped {
    match ch {
        'a'..='z' | '0'..='9' => Mapped::Char(ch),
        'A'..='Z' => Mapped::Char(ch.to_ascii_lowercase()),
        '_' => Mapped::Char('_'),

        // Consonants
        'ก' => Mapped::Text("k"),
        'ข' | 'ฃ' | 'ค' | 'ฅ' | 'ฆ' => Mapped::Text("kh"),
        'ง' => Mapped::Text("ng"),
        'จ' | 'ฉ' | 'ช' | 'ฌ' => Mapped::Text("ch"),
        'ซ' | 'ศ' | 'ษ' | 'ส' => Mapped::Text("s"),
        'ญ' | 'ย' => Mapped::Text("y"),
        'ฎ' | 'ด' => Mapped::Text("d"),
        'ฏ' | 'ต' => Mapped::Text("t"),
        'ฐ' | 'ฑ' | 'ฒ' | 'ถ' | 'ท' | 'ธ' => Mapped::Text("th"),
        'ณ' | 'น' => Mapped::Text("n"),
        'บ' => Mapped::Text("b"),
        'ป' => Mapped::Text("p"),
        'ผ' | 'พ' | 'ภ' => Mapped::Text("ph"),
        'ฝ' | 'ฟ' => Mapped::Text("f"),
        'ม' => Mapped::Text("m"),
        'ร' => Mapped::Text("r"),
        'ฤ' => Mapped::Text("rue"),
        'ล' | 'ฬ' => Mapped::Text("l"),
        'ฦ' => Mapped::Text("lue"),
        'ว' => Mapped::Text("w"),
        'ห' | 'ฮ' => Mapped::Text("h"),
        'อ' => Mapped::Text("o"),

        // Vowels
        'ะ' | '\u{0E31}' | 'า' => Mapped::Text("a"),
        'ำ' => Mapped::Text("am"),
        '\u{0E34}' | '\u{0E35}' => Mapped::Text("i"),
        '\u{0E36}' | '\u{0E37}' => Mapped::Text("ue"),
        '\u{0E38}' | '\u{0E39}' => Mapped::Text("u"),
        'เ' => Mapped::Text("e"),
        'แ' => Mapped::Text("ae"),
        'โ' => Mapped::Text("o"),
        'ใ' | 'ไ' => Mapped::Text("ai"),

        // Thai digits
        '๐'..='๙' => Mapped::Char(
            char::from_digit(ch as u32 - '๐' as u32, 10).unwrap_or('0'),
        ),

        // Tone marks, mai taikhu, thanthakhat, phinthu: no segmental value
        '\u{0E48}'..='\u{0E4B}' | '\u{0E47}' | '\u{0E4C}' | '\u{0E3A}' => Mapped::Drop,

        // Repetition and abbreviation signs
        'ๆ' | 'ฯ' => Mapped::Drop,

        _ => Mapped::Separator,
    }
}

/// Truncate to at most `max` bytes; the slug is ASCII so byte and
/// character boundaries coincide
fn truncate_ascii(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thai_title_transliterates() {
        let generator = IdentifierGenerator::new(63);
        // "customer" in Thai
        assert_eq!(generator.slugify("ลูกค้า", "field"), "lukkha");
        // tone marks dropped
        assert_eq!(generator.slugify("ที่อยู่", "field"), "thioyu");
    }

    #[test]
    fn test_mixed_script_title() {
        let generator = IdentifierGenerator::new(63);
        assert_eq!(generator.slugify("Email ลูกค้า", "field"), "email_lukkha");
        assert_eq!(generator.slugify("Full  Name", "field"), "full_name");
    }

    #[test]
    fn test_thai_digits_map_to_ascii() {
        let generator = IdentifierGenerator::new(63);
        assert_eq!(generator.slugify("ข้อ ๑๒", "field"), "kho_12");
    }

    #[test]
    fn test_empty_and_symbol_titles_fall_back() {
        let generator = IdentifierGenerator::new(63);
        assert_eq!(generator.slugify("", "field"), "field");
        assert_eq!(generator.slugify("!!!", "form"), "form");
    }

    #[test]
    fn test_digit_start_gets_prefixed() {
        let generator = IdentifierGenerator::new(63);
        assert_eq!(generator.slugify("2nd Phone", "field"), "field_2nd_phone");
    }

    #[test]
    fn test_truncation_to_max_length() {
        let generator = IdentifierGenerator::new(16);
        let slug = generator.slugify("a very long field title indeed", "field");
        assert_eq!(slug.len(), 16);
        assert_eq!(slug, "a_very_long_fiel");
    }

    #[test]
    fn test_collision_suffix_is_deterministic_and_bounded() {
        let generator = IdentifierGenerator::new(16);
        let owner = Uuid::from_u128(42);

        let first = generator.with_collision_suffix("a_very_long_fiel", &owner);
        let second = generator.with_collision_suffix("a_very_long_fiel", &owner);
        assert_eq!(first, second);
        assert!(first.len() <= 16);
        assert!(is_safe_identifier(&first));

        let other = generator.with_collision_suffix("a_very_long_fiel", &Uuid::from_u128(43));
        assert_ne!(first, other);
    }

    #[test]
    fn test_determinism() {
        let generator = IdentifierGenerator::new(63);
        let a = generator.slugify("ชื่อเต็ม", "field");
        let b = generator.slugify("ชื่อเต็ม", "field");
        assert_eq!(a, b);
        assert!(is_safe_identifier(&a));
    }

    #[test]
    fn test_validate_rejects_overlong_and_unsafe() {
        let generator = IdentifierGenerator::new(8);
        assert!(generator.validate("name").is_ok());
        assert!(generator.validate("too_long_name").is_err());
        assert!(generator.validate("Bad-Name").is_err());
    }
}
