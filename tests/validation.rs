//! Rule-driven record validation — behaviour specification.
//!
//! The CAT002 fixture declares I002/010 and I002/000 mandatory, and
//! I002/020 conditionally required when `MsgType==2` (sector crossing).
//!
//! | Test | Behaviour |
//! |------|-----------|
//! | `complete_record_passes` | all rules satisfied, no diagnostics |
//! | `missing_mandatory_warns_in_lenient_mode` | warnings, report stays valid |
//! | `missing_mandatory_fails_in_strict_mode` | errors, report invalid |
//! | `conditional_rule_applies_when_antecedent_holds` | MsgType=2 without sector |
//! | `conditional_rule_ignored_when_antecedent_false` | MsgType=1 without sector |
//! | `malformed_rule_condition_warns_and_never_applies` | not a vacuous pass |
//! | `unregistered_category_cannot_be_validated` | error diagnostic |

mod common;

use asterix_decoder::{
    Category, CategoryHeader, Condition, DataFormat, FieldDef, FieldKind, ItemDef, RuleKind,
    Severity, ValidationRule,
};
use common::{decoder, strict_decoder};

/// FSPEC 0xF0: I002/010 + 000 + 020 + 030. MsgType=2, sector present.
const COMPLETE: &[u8] = &[0xF0, 0x00, 0x10, 0x02, 0xBC, 0x12, 0x34, 0x56];

/// FSPEC 0x20: only I002/020.
const SECTOR_ONLY: &[u8] = &[0x20, 0xBC];

/// FSPEC 0xC0: I002/010 + 000 with MsgType=2, no sector number.
const CROSSING_WITHOUT_SECTOR: &[u8] = &[0xC0, 0x00, 0x10, 0x02];

/// FSPEC 0xC0: I002/010 + 000 with MsgType=1.
const MARKER_WITHOUT_SECTOR: &[u8] = &[0xC0, 0x00, 0x10, 0x01];

#[test]
fn complete_record_passes() {
    let decoder = strict_decoder();
    let record = decoder.decode_record(2, COMPLETE);
    let report = decoder.validate(&record);
    assert!(report.valid);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn missing_mandatory_warns_in_lenient_mode() {
    let decoder = decoder();
    let record = decoder.decode_record(2, SECTOR_ONLY);
    let report = decoder.validate(&record);
    assert!(report.valid, "lenient findings are advisory");
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report
        .diagnostics
        .iter()
        .all(|d| d.severity == Severity::Warning));
    assert!(report.diagnostics[0].message.contains("I002/010"));
    assert!(report.diagnostics[1].message.contains("I002/000"));
}

#[test]
fn missing_mandatory_fails_in_strict_mode() {
    let decoder = strict_decoder();
    let record = decoder.decode_record(2, SECTOR_ONLY);
    let report = decoder.validate(&record);
    assert!(!report.valid);
    assert!(report
        .diagnostics
        .iter()
        .all(|d| d.severity == Severity::Error));
}

#[test]
fn conditional_rule_applies_when_antecedent_holds() {
    let lenient = decoder();
    let record = lenient.decode_record(2, CROSSING_WITHOUT_SECTOR);
    let report = lenient.validate(&record);
    assert!(report.valid);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics[0].message.contains("I002/020"));
    assert!(report.diagnostics[0].message.contains("MsgType==2"));

    let strict = strict_decoder();
    let report = strict.validate(&strict.decode_record(2, CROSSING_WITHOUT_SECTOR));
    assert!(!report.valid);
}

#[test]
fn conditional_rule_ignored_when_antecedent_false() {
    let decoder = strict_decoder();
    let record = decoder.decode_record(2, MARKER_WITHOUT_SECTOR);
    let report = decoder.validate(&record);
    assert!(report.valid, "{:?}", report.diagnostics);
    assert!(report.diagnostics.is_empty());
}

fn category_with_rule(rule: ValidationRule) -> Category {
    let mut item = ItemDef::new("I034/000", "Message Type", DataFormat::Fixed);
    item.length = Some(1);
    item.fields = vec![FieldDef::new("MsgType", FieldKind::Unsigned, 8)];
    Category::new(
        CategoryHeader {
            number: 34,
            ..CategoryHeader::default()
        },
        vec!["I034/000".into()],
        vec![item],
        vec![rule],
    )
    .unwrap()
}

#[test]
fn malformed_rule_condition_warns_and_never_applies() {
    let mut decoder = asterix_decoder::Decoder::new();
    decoder.set_strict_validation(true);
    decoder.register_category(category_with_rule(ValidationRule {
        field: "I034/050".into(),
        kind: RuleKind::Conditional,
        condition: Some(Condition::parse("MsgType >= 2")),
    }));
    let record = decoder.decode_record(34, &[0x80, 0x05]);
    let report = decoder.validate(&record);
    // Unrecognised syntax records a warning; it does not pass vacuously as
    // "antecedent true" and it does not fail the report either.
    assert!(report.valid);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].severity, Severity::Warning);
    assert!(report.diagnostics[0].message.contains("unrecognised condition"));
}

#[test]
fn conditional_rule_without_condition_warns() {
    let mut decoder = asterix_decoder::Decoder::new();
    decoder.register_category(category_with_rule(ValidationRule {
        field: "I034/050".into(),
        kind: RuleKind::Conditional,
        condition: None,
    }));
    let record = decoder.decode_record(34, &[0x80, 0x05]);
    let report = decoder.validate(&record);
    assert!(report.valid);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.diagnostics[0].message.contains("no condition"));
}

#[test]
fn optional_rules_are_never_checked() {
    let mut decoder = asterix_decoder::Decoder::new();
    decoder.set_strict_validation(true);
    decoder.register_category(category_with_rule(ValidationRule {
        field: "I034/050".into(),
        kind: RuleKind::Optional,
        condition: None,
    }));
    let record = decoder.decode_record(34, &[0x80, 0x05]);
    let report = decoder.validate(&record);
    assert!(report.valid);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn unregistered_category_cannot_be_validated() {
    let decoder = decoder();
    let mut record = decoder.decode_record(2, COMPLETE);
    record.category = 99;
    let report = decoder.validate(&record);
    assert!(!report.valid);
    assert_eq!(report.diagnostics[0].severity, Severity::Error);
}
