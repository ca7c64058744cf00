// Identifier derivation over realistic form titles.

use formbase::adapters::sql_quote::is_safe_identifier;
use formbase::services::identifier::IdentifierGenerator;
use uuid::Uuid;

#[test]
fn test_common_thai_field_titles() {
    let generator = IdentifierGenerator::new(63);

    // Typical intake-form labels.
    let cases = [
        ("ชื่อเต็ม", "field"),      // full name
        ("ที่อยู่", "field"),       // address
        ("เบอร์โทรศัพท์", "field"), // phone number
        ("จังหวัด", "field"),       // province
        ("อำเภอ", "field"),         // district
    ];

    for (title, fallback) in cases {
        let slug = generator.slugify(title, fallback);
        assert!(
            is_safe_identifier(&slug),
            "slug for '{}' must be SQL-safe, got '{}'",
            title,
            slug
        );
        assert!(!slug.is_empty());
    }
}

#[test]
fn test_slug_is_pure_function_of_title() {
    let generator = IdentifierGenerator::new(63);
    for title in ["ลูกค้า", "Email ลูกค้า", "คะแนน ๑-๕"] {
        assert_eq!(
            generator.slugify(title, "field"),
            generator.slugify(title, "field")
        );
    }
}

#[test]
fn test_same_title_different_owners_diverge_only_on_collision() {
    let generator = IdentifierGenerator::new(63);

    let base = generator.slugify("ชื่อ", "field");
    let a = generator.with_collision_suffix(&base, &Uuid::from_u128(1));
    let b = generator.with_collision_suffix(&base, &Uuid::from_u128(2));

    assert_ne!(a, b);
    assert!(a.starts_with(&base));
    assert!(b.starts_with(&base));
    assert!(is_safe_identifier(&a));
    assert!(is_safe_identifier(&b));
}

#[test]
fn test_emoji_only_title_falls_back() {
    let generator = IdentifierGenerator::new(63);
    let slug = generator.slugify("🎉🎉", "field");
    assert_eq!(slug, "field");
}

#[test]
fn test_slug_honors_configured_limit() {
    let generator = IdentifierGenerator::new(24);
    let slug = generator.slugify(
        "แบบสอบถามความพึงพอใจของลูกค้าประจำปี",
        "form",
    );
    assert!(slug.len() <= 24);
    assert!(is_safe_identifier(&slug));
}
