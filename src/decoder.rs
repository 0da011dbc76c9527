//! Block and record decoding.
//!
//! A data block is `CAT (1) | LEN (2, BE) | records…` where `LEN` counts the
//! whole block, header included. Each record opens with an FSPEC bitmap whose
//! bits select data items from the category's UAP; the decoder walks the
//! selected items in UAP order and hands each one to the item parser.
//!
//! The [`Decoder`] owns the schema registry and two configuration flags set
//! before decoding. Decoding itself is read-only: a `Decoder` behind a shared
//! reference may run any number of concurrent decodes.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::cursor::Cursor;
use crate::error::{DecodeError, Result};
use crate::field::{parse_item, ParsedItem};
use crate::schema::{Category, RecordLayout, RuleKind};

/// FSPEC chains longer than this are treated as malformed.
pub const MAX_FSPEC_BYTES: usize = 16;

/// Hard ceiling on records produced from one block.
pub const MAX_RECORDS_PER_BLOCK: usize = 1024;

/// One FSPEC-prefixed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRecord {
    pub category: u8,
    pub items: Vec<ParsedItem>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecodeError>,
    /// Bytes the record occupied, FSPEC included.
    pub byte_length: usize,
}

impl ParsedRecord {
    /// Looks a decoded item up by id.
    pub fn item(&self, id: &str) -> Option<&ParsedItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Looks a decoded field value up by name across all items; the most
    /// recently parsed occurrence wins. Used by conditional validation.
    fn field_value(&self, name: &str) -> Option<i64> {
        self.items
            .iter()
            .rev()
            .find_map(|item| item.field(name).and_then(|f| f.value.as_i64()))
    }
}

/// One decoded data block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedBlock {
    pub category: u8,
    pub declared_length: u16,
    pub records: Vec<ParsedRecord>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecodeError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Outcome of rule-driven record validation. Advisory: validation never
/// mutates decode results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

/// Schema-driven ASTERIX decoder.
///
/// Register category schemas first, then decode. Registration and decoding
/// are distinct lifecycle phases: once loading is done the registry is
/// effectively immutable and the decoder may be shared freely.
#[derive(Debug, Default)]
pub struct Decoder {
    categories: HashMap<u8, Category>,
    strict_validation: bool,
    debug_trace: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder::default()
    }

    /// Strict mode turns length mismatches and missing mandatory items into
    /// failures and stops mid-block recovery. Default off.
    pub fn set_strict_validation(&mut self, on: bool) {
        self.strict_validation = on;
    }

    /// Emits per-record trace events while decoding. Default off.
    pub fn set_debug_trace(&mut self, on: bool) {
        self.debug_trace = on;
    }

    /// Installs a category schema, replacing any previous one for the same
    /// number.
    pub fn register_category(&mut self, category: Category) {
        debug!(category = category.number(), items = category.item_count(), "registered category");
        self.categories.insert(category.number(), category);
    }

    pub fn category(&self, number: u8) -> Option<&Category> {
        self.categories.get(&number)
    }

    /// Sorted list of registered category numbers.
    pub fn supported_categories(&self) -> Vec<u8> {
        let mut out: Vec<u8> = self.categories.keys().copied().collect();
        out.sort_unstable();
        out
    }

    /// Decodes one data block. Never panics; failures are carried on the
    /// returned block.
    pub fn decode_block(&self, bytes: &[u8]) -> ParsedBlock {
        let mut block = ParsedBlock {
            category: 0,
            declared_length: 0,
            records: Vec::new(),
            valid: false,
            error: None,
        };
        if bytes.len() < 3 {
            block.error = Some(DecodeError::Underrun {
                need: 3,
                have: bytes.len(),
            });
            return block;
        }
        block.category = bytes[0];
        block.declared_length = u16::from_be_bytes([bytes[1], bytes[2]]);
        let declared = block.declared_length as usize;
        debug!(category = block.category, length = declared, "decoding block");

        if declared < 3 {
            block.error = Some(DecodeError::Underrun {
                need: 3,
                have: declared,
            });
            return block;
        }
        if declared > bytes.len() {
            block.error = Some(DecodeError::Underrun {
                need: declared,
                have: bytes.len(),
            });
            return block;
        }
        let Some(category) = self.categories.get(&block.category) else {
            block.error = Some(DecodeError::UnsupportedCategory(block.category));
            return block;
        };

        let mut cursor = Cursor::new(&bytes[..declared]);
        cursor.advance_to(3);
        self.decode_records(category, &mut cursor, &mut block);

        if block.error.is_none() {
            let actual: usize = 3 + block.records.iter().map(|r| r.byte_length).sum::<usize>();
            if actual != declared {
                if self.strict_validation {
                    block.error = Some(DecodeError::RecordLengthMismatch {
                        declared,
                        actual,
                    });
                } else {
                    warn!(declared, actual, "record lengths disagree with block length");
                }
            }
        }
        block.valid = block.error.is_none();
        block
    }

    fn decode_records(&self, category: &Category, cursor: &mut Cursor<'_>, block: &mut ParsedBlock) {
        let end = cursor.len();
        while cursor.position() < end {
            if block.records.len() >= MAX_RECORDS_PER_BLOCK {
                warn!(limit = MAX_RECORDS_PER_BLOCK, "record ceiling reached, stopping");
                block.error = Some(DecodeError::RecordLimitExceeded(MAX_RECORDS_PER_BLOCK));
                return;
            }
            match self.decode_record_at(category, cursor) {
                Ok(record) => {
                    block.records.push(record);
                }
                Err(e) => {
                    warn!(error = %e, position = cursor.position(), "record decode failed");
                    block.error = Some(e);
                    if self.strict_validation {
                        return;
                    }
                    // Best effort: advance one byte and retry record
                    // recognition from there.
                    if cursor.skip(1).is_err() {
                        return;
                    }
                }
            }
            if category.header().layout == RecordLayout::Single {
                break;
            }
        }
    }

    /// Decodes one record (FSPEC and items, no block header) against a
    /// registered category.
    pub fn decode_record(&self, category_id: u8, bytes: &[u8]) -> ParsedRecord {
        let Some(category) = self.categories.get(&category_id) else {
            return ParsedRecord {
                category: category_id,
                items: Vec::new(),
                valid: false,
                error: Some(DecodeError::UnsupportedCategory(category_id)),
                byte_length: 0,
            };
        };
        let mut cursor = Cursor::new(bytes);
        match self.decode_record_at(category, &mut cursor) {
            Ok(record) => record,
            Err(e) => ParsedRecord {
                category: category_id,
                items: Vec::new(),
                valid: false,
                error: Some(e),
                byte_length: cursor.position(),
            },
        }
    }

    fn decode_record_at(&self, category: &Category, cursor: &mut Cursor<'_>) -> Result<ParsedRecord> {
        let start = cursor.position();
        let fspec = read_fspec(cursor)?;
        if self.debug_trace {
            trace!(fspec = ?fspec, position = start, "record FSPEC");
        }
        let selected = select_uap_items(&fspec, category.uap());

        let mut items = Vec::with_capacity(selected.len());
        for id in selected {
            if id == "spare" || id.is_empty() {
                continue;
            }
            let Some(def) = category.item(id) else {
                // Unreachable for constructor-validated schemas; contained
                // for defence in depth.
                items.push(ParsedItem {
                    id: id.to_string(),
                    name: String::new(),
                    fields: Vec::new(),
                    valid: false,
                    error: Some(DecodeError::UnknownItem(id.to_string())),
                    byte_length: 0,
                });
                continue;
            };
            let item = parse_item(def, cursor)?;
            if self.debug_trace {
                trace!(item = %item.id, bytes = item.byte_length, "record item");
            }
            items.push(item);
        }
        Ok(ParsedRecord {
            category: category.number(),
            items,
            valid: true,
            error: None,
            byte_length: cursor.position() - start,
        })
    }

    /// Applies the category's validation rules to a decoded record.
    ///
    /// Mandatory rules require their item to be present. Conditional rules
    /// require it only when the rule's condition holds against the record's
    /// decoded field values. In lenient mode findings are warnings; in strict
    /// mode they fail the report.
    pub fn validate(&self, record: &ParsedRecord) -> ValidationReport {
        let mut report = ValidationReport {
            valid: true,
            diagnostics: Vec::new(),
        };
        let Some(category) = self.categories.get(&record.category) else {
            report.valid = false;
            report.diagnostics.push(Diagnostic {
                severity: Severity::Error,
                message: format!("no schema registered for category {}", record.category),
            });
            return report;
        };
        let finding_severity = if self.strict_validation {
            Severity::Error
        } else {
            Severity::Warning
        };
        for rule in category.validations() {
            match rule.kind {
                RuleKind::Mandatory => {
                    if record.item(&rule.field).is_none() {
                        if self.strict_validation {
                            report.valid = false;
                        }
                        report.diagnostics.push(Diagnostic {
                            severity: finding_severity,
                            message: format!("missing mandatory item {}", rule.field),
                        });
                    }
                }
                RuleKind::Conditional => {
                    let Some(condition) = &rule.condition else {
                        report.diagnostics.push(Diagnostic {
                            severity: Severity::Warning,
                            message: format!(
                                "conditional rule for {} has no condition",
                                rule.field
                            ),
                        });
                        continue;
                    };
                    if !condition.is_well_formed() {
                        report.diagnostics.push(Diagnostic {
                            severity: Severity::Warning,
                            message: format!(
                                "unrecognised condition {:?} on rule for {}",
                                condition.raw(),
                                rule.field
                            ),
                        });
                        continue;
                    }
                    let applies = condition.evaluate(|name| record.field_value(name));
                    if applies && record.item(&rule.field).is_none() {
                        if self.strict_validation {
                            report.valid = false;
                        }
                        report.diagnostics.push(Diagnostic {
                            severity: finding_severity,
                            message: format!(
                                "item {} required when {}",
                                rule.field,
                                condition.raw()
                            ),
                        });
                    }
                }
                RuleKind::Optional => {}
            }
        }
        report
    }

    /// Decodes a byte stream holding one or more length-framed blocks back to
    /// back. Framing is on the declared block length only; a truncated
    /// trailer stops the scan.
    pub fn decode_stream(&self, bytes: &[u8]) -> Vec<ParsedBlock> {
        let mut blocks = Vec::new();
        let mut offset = 0usize;
        while offset + 3 <= bytes.len() {
            let declared = u16::from_be_bytes([bytes[offset + 1], bytes[offset + 2]]) as usize;
            if declared < 3 {
                warn!(offset, declared, "implausible block length, stopping scan");
                break;
            }
            if offset + declared > bytes.len() {
                warn!(offset, declared, remaining = bytes.len() - offset, "truncated block, stopping scan");
                break;
            }
            blocks.push(self.decode_block(&bytes[offset..offset + declared]));
            offset += declared;
        }
        if offset < bytes.len() {
            debug!(trailing = bytes.len() - offset, "stream has trailing bytes");
        }
        blocks
    }

    /// Reads a file image and decodes every length-framed block in it.
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<Vec<ParsedBlock>> {
        let bytes = std::fs::read(path)?;
        Ok(self.decode_stream(&bytes))
    }
}

/// Reads the FSPEC byte chain: bytes follow while bit 0 (FX) is set. A chain
/// that runs past the buffer or past [`MAX_FSPEC_BYTES`] is malformed.
fn read_fspec(cursor: &mut Cursor<'_>) -> Result<Vec<u8>> {
    let mut fspec = Vec::new();
    loop {
        if fspec.len() == MAX_FSPEC_BYTES {
            return Err(DecodeError::MalformedFspec(format!(
                "chain exceeds {MAX_FSPEC_BYTES} bytes"
            )));
        }
        let byte = cursor
            .read_u8()
            .map_err(|_| DecodeError::MalformedFspec("chain truncated".to_string()))?;
        fspec.push(byte);
        if byte & 0x01 == 0 {
            return Ok(fspec);
        }
    }
}

/// Expands an FSPEC against a UAP: bits 7..1 of each byte select consecutive
/// UAP slots, bit 0 is the FX bit and never selects. Returns the selected
/// item ids in UAP order; bits beyond the UAP are ignored.
pub fn select_uap_items<'a>(fspec: &[u8], uap: &'a [String]) -> Vec<&'a str> {
    let mut selected = Vec::new();
    let mut slot = 0usize;
    for &byte in fspec {
        for bit in (1..=7).rev() {
            if slot >= uap.len() {
                return selected;
            }
            if byte & (1 << bit) != 0 {
                selected.push(uap[slot].as_str());
            }
            slot += 1;
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uap(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fspec_single_byte() {
        let mut cur = Cursor::new(&[0xF0, 0xAA]);
        assert_eq!(read_fspec(&mut cur).unwrap(), vec![0xF0]);
        assert_eq!(cur.position(), 1);
    }

    #[test]
    fn fspec_chain_follows_fx() {
        let mut cur = Cursor::new(&[0x01, 0x81, 0x02]);
        assert_eq!(read_fspec(&mut cur).unwrap(), vec![0x01, 0x81, 0x02]);
    }

    #[test]
    fn fspec_truncated_chain_is_malformed() {
        let mut cur = Cursor::new(&[0x01]);
        assert!(matches!(
            read_fspec(&mut cur),
            Err(DecodeError::MalformedFspec(_))
        ));
    }

    #[test]
    fn fspec_ceiling_is_enforced() {
        // 16 bytes all chaining onwards: the 17th byte would be required.
        let bytes = [0x01u8; 17];
        let mut cur = Cursor::new(&bytes);
        assert!(matches!(
            read_fspec(&mut cur),
            Err(DecodeError::MalformedFspec(_))
        ));
        // 15 chained bytes plus a terminator is accepted.
        let mut bytes = [0x01u8; 16];
        bytes[15] = 0x00;
        let mut cur = Cursor::new(&bytes);
        assert_eq!(read_fspec(&mut cur).unwrap().len(), 16);
    }

    #[test]
    fn uap_selection_msb_first() {
        let uap = uap(&["a", "b", "c", "d", "e", "f", "g", "h", "i"]);
        // Bit 7 selects slot 1, bit 4 selects slot 4.
        assert_eq!(select_uap_items(&[0x90], &uap), vec!["a", "d"]);
        // Second byte continues from slot 8.
        assert_eq!(select_uap_items(&[0x01, 0x80], &uap), vec!["h"]);
        assert_eq!(select_uap_items(&[0x01, 0x40], &uap), vec!["i"]);
    }

    #[test]
    fn uap_selection_skips_fx_bit() {
        let names = uap(&["a", "b", "c", "d", "e", "f", "g"]);
        // 0xFF: all seven slots, FX bit contributes nothing.
        assert_eq!(
            select_uap_items(&[0xFF, 0x00], &names),
            vec!["a", "b", "c", "d", "e", "f", "g"]
        );
        // 0x01 alone selects nothing.
        assert!(select_uap_items(&[0x01, 0x00], &names).is_empty());
    }

    #[test]
    fn uap_selection_ignores_bits_past_uap() {
        let names = uap(&["a", "b"]);
        assert_eq!(select_uap_items(&[0xFE], &names), vec!["a", "b"]);
    }

    #[test]
    fn uap_selection_is_order_preserving_and_complete() {
        // Walking every single-bit FSPEC hits each slot exactly once, in
        // order: the expansion is a bijection between bit positions and
        // slots.
        let names = uap(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n"]);
        let mut seen = Vec::new();
        for byte_idx in 0..2 {
            for bit in (1..=7).rev() {
                let mut fspec = vec![0x01u8; byte_idx];
                fspec.push(1 << bit);
                for id in select_uap_items(&fspec, &names) {
                    seen.push(id.to_string());
                }
            }
        }
        assert_eq!(seen, names);
    }
}
