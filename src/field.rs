//! Field and data-item parsing.
//!
//! [`parse_item`] consumes exactly one data item from a cursor: it sizes the
//! item body according to the declared format, then extracts each field by
//! bit width at a running offset inside that body. Field values are converted
//! to [`TypedValue`] with two's-complement sign extension from the declared
//! width, ICAO 6-bit character decoding for strings, and enum label
//! resolution. Conditional extension fields are parsed when their gate
//! evaluates true against the fields already decoded in the same item.
//!
//! Error containment: a field failure marks the item invalid and stops the
//! remaining fields, but the cursor still advances to the end of the item
//! body so the caller resumes aligned on the next item. Only a variable-item
//! FX scan that runs past the buffer is returned as `Err` — its length is
//! indeterminate, so the enclosing record cannot realign.

use serde::Serialize;
use tracing::trace;

use crate::cursor::{extract_bits, sign_extend, Cursor};
use crate::error::{DecodeError, Result};
use crate::schema::{DataFormat, Encoding, FieldDef, FieldKind, ItemDef, Unit};
use crate::value::TypedValue;

/// ICAO Annex 10 6-bit character set. Codes 1..=26 are letters, 32..=41
/// digits, 0 and the gaps are spares that render as spaces.
const ICAO_6BIT: &[u8; 48] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ     0123456789      ";

/// One decoded field with the presentation metadata its schema declared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedField {
    pub name: String,
    pub value: TypedValue,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Physical value of a raw 1; the decoder never stores scaled floats.
    pub lsb: f64,
    pub unit: Unit,
    /// Enumeration label matching the raw value, when the schema declares one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecodeError>,
}

/// One decoded data item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedItem {
    pub id: String,
    pub name: String,
    pub fields: Vec<ParsedField>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecodeError>,
    /// Bytes the item occupied on the wire, count/length octets included.
    pub byte_length: usize,
}

impl ParsedItem {
    /// Looks a decoded field up by name; the most recently parsed wins.
    pub fn field(&self, name: &str) -> Option<&ParsedField> {
        self.fields.iter().rev().find(|f| f.name == name)
    }
}

/// Parses one data item at the cursor.
///
/// `Err` is returned only when the item length cannot be determined (an FX
/// chain running past the buffer); every other failure is contained in the
/// returned item and the cursor lands at the item's end.
pub fn parse_item<'a>(def: &ItemDef, cursor: &mut Cursor<'a>) -> Result<ParsedItem> {
    let start = cursor.position();
    let mut item = ParsedItem {
        id: def.id.clone(),
        name: def.name.clone(),
        fields: Vec::new(),
        valid: true,
        error: None,
        byte_length: 0,
    };

    let total = match item_extent(def, cursor) {
        Ok(n) => n,
        Err(Extent::Fatal(e)) => return Err(e),
        Err(Extent::Contained(e, consume)) => {
            item.valid = false;
            item.error = Some(e);
            cursor.advance_to(start + consume);
            item.byte_length = cursor.position() - start;
            return Ok(item);
        }
    };

    if !cursor.has(total) {
        let have = cursor.remaining();
        item.valid = false;
        item.error = Some(DecodeError::Underrun { need: total, have });
        cursor.advance_to(start + total);
        item.byte_length = cursor.position() - start;
        return Ok(item);
    }
    let body = cursor.read_bytes(total)?;
    item.byte_length = total;

    let outcome = match def.format {
        DataFormat::Repetitive => {
            let rep = body[0] as usize;
            let group_bits = def.length.unwrap_or(0) as usize * 8;
            let data = &body[1..];
            let mut result = Ok(());
            for group in 0..rep {
                let mut bit_offset = group * group_bits;
                result = parse_portion(&def.fields, data, &mut bit_offset, &mut item.fields);
                if result.is_err() {
                    break;
                }
            }
            result
        }
        DataFormat::Explicit => {
            let mut bit_offset = 0;
            parse_portion(&def.fields, &body[1..], &mut bit_offset, &mut item.fields)
        }
        DataFormat::Fixed | DataFormat::Variable | DataFormat::Extended => {
            let mut bit_offset = 0;
            parse_portion(&def.fields, body, &mut bit_offset, &mut item.fields)
        }
    };

    if let Err(e) = outcome {
        item.valid = false;
        item.error = Some(e);
    }
    trace!(item = %item.id, bytes = item.byte_length, valid = item.valid, "parsed item");
    Ok(item)
}

enum Extent {
    /// The record cannot continue: the item length is indeterminate.
    Fatal(DecodeError),
    /// The item fails but the cursor can advance the given number of bytes.
    Contained(DecodeError, usize),
}

/// Number of bytes the item occupies, determined without consuming them.
fn item_extent(def: &ItemDef, cursor: &Cursor<'_>) -> std::result::Result<usize, Extent> {
    match def.format {
        DataFormat::Fixed => Ok(def.length.unwrap_or(0) as usize),
        DataFormat::Explicit => {
            let len = cursor
                .peek(0)
                .map_err(|e| Extent::Contained(e, 0))? as usize;
            if len == 0 {
                // A zero length cannot frame the length octet itself.
                return Err(Extent::Contained(
                    DecodeError::InvalidFieldValue {
                        field: def.id.clone(),
                        reason: "explicit length of zero".to_string(),
                    },
                    1,
                ));
            }
            Ok(len)
        }
        DataFormat::Repetitive => {
            let rep = cursor
                .peek(0)
                .map_err(|e| Extent::Contained(e, 0))? as usize;
            Ok(1 + rep * def.length.unwrap_or(0) as usize)
        }
        DataFormat::Variable | DataFormat::Extended => {
            let mut n = 0usize;
            loop {
                let byte = cursor.peek(n).map_err(Extent::Fatal)?;
                n += 1;
                if byte & 0x01 == 0 {
                    return Ok(n);
                }
            }
        }
    }
}

/// Parses a declared field block (and, recursively, any triggered extension
/// blocks) out of `data` starting at `bit_offset`.
fn parse_portion(
    fields: &[FieldDef],
    data: &[u8],
    bit_offset: &mut usize,
    out: &mut Vec<ParsedField>,
) -> Result<()> {
    for def in fields {
        if def.is_spare() {
            *bit_offset += def.bits as usize;
            continue;
        }
        match extract_bits(data, *bit_offset, def.bits) {
            Ok(raw) => {
                *bit_offset += def.bits as usize;
                out.push(make_field(def, raw));
            }
            Err(e) => {
                out.push(ParsedField {
                    name: def.name.clone(),
                    value: TypedValue::U32(0),
                    description: def.description.clone(),
                    lsb: def.lsb,
                    unit: def.unit,
                    label: None,
                    valid: false,
                    error: Some(e.clone()),
                });
                return Err(e);
            }
        }
        if let (Some(cond), false) = (&def.condition, def.extension.is_empty()) {
            let taken = cond.evaluate(|name| {
                out.iter()
                    .rev()
                    .find(|f| f.name == name)
                    .and_then(|f| f.value.as_i64())
            });
            if taken {
                parse_portion(&def.extension, data, bit_offset, out)?;
            }
        }
    }
    Ok(())
}

fn make_field(def: &FieldDef, raw: u32) -> ParsedField {
    let label = def
        .enums
        .iter()
        .find(|e| e.value == raw)
        .map(|e| e.label.clone());
    ParsedField {
        name: def.name.clone(),
        value: convert_raw(raw, def),
        description: def.description.clone(),
        lsb: def.lsb,
        unit: def.unit,
        label,
        valid: true,
        error: None,
    }
}

/// Raw extracted bits to the declared type. Numeric widths pick the smallest
/// standard integer that fits `bits`; 24-bit values ride in 32-bit storage.
fn convert_raw(raw: u32, def: &FieldDef) -> TypedValue {
    match def.kind {
        FieldKind::Unsigned => {
            if def.bits <= 8 {
                TypedValue::U8(raw as u8)
            } else if def.bits <= 16 {
                TypedValue::U16(raw as u16)
            } else {
                TypedValue::U32(raw)
            }
        }
        FieldKind::Signed => {
            let v = sign_extend(raw, def.bits);
            if def.bits <= 8 {
                TypedValue::I8(v as i8)
            } else if def.bits <= 16 {
                TypedValue::I16(v as i16)
            } else {
                TypedValue::I32(v)
            }
        }
        FieldKind::Bool => TypedValue::Bool(raw != 0),
        FieldKind::String => match def.encoding {
            Some(Encoding::SixBitAscii) => {
                TypedValue::String(decode_six_bit(&raw_to_bytes(raw, def.bits)))
            }
            None => TypedValue::String(raw.to_string()),
        },
        FieldKind::Bytes => TypedValue::Bytes(raw_to_bytes(raw, def.bits)),
    }
}

/// Big-endian bytes of the raw value, ceil(bits/8) wide.
fn raw_to_bytes(raw: u32, bits: u8) -> Vec<u8> {
    let n = (bits as usize + 7) / 8;
    (0..n).map(|i| (raw >> (8 * (n - 1 - i))) as u8).collect()
}

/// Decodes ICAO 6-bit packed characters. Groups are read MSB-first; codes
/// past the table map to space. Leading spaces before the first character and
/// trailing spaces are dropped.
fn decode_six_bit(data: &[u8]) -> String {
    let total_bits = data.len() * 8;
    let mut out = String::new();
    let mut bit = 0;
    while bit + 6 <= total_bits {
        let mut code = 0u8;
        for i in 0..6 {
            let idx = bit + i;
            if data[idx / 8] & (1 << (7 - idx % 8)) != 0 {
                code |= 1 << (5 - i);
            }
        }
        bit += 6;
        let c = ICAO_6BIT.get(code as usize).copied().unwrap_or(b' ') as char;
        if c != ' ' || !out.is_empty() {
            out.push(c);
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::schema::EnumValue;

    fn unsigned(name: &str, bits: u8) -> FieldDef {
        FieldDef::new(name, FieldKind::Unsigned, bits)
    }

    #[test]
    fn convert_picks_smallest_storage() {
        assert_eq!(convert_raw(0xAB, &unsigned("a", 8)), TypedValue::U8(0xAB));
        assert_eq!(convert_raw(0xFFF, &unsigned("a", 12)), TypedValue::U16(0xFFF));
        assert_eq!(
            convert_raw(0x123456, &unsigned("a", 24)),
            TypedValue::U32(0x123456)
        );
    }

    #[test]
    fn convert_sign_extends_from_declared_width() {
        let f = FieldDef::new("a", FieldKind::Signed, 8);
        assert_eq!(convert_raw(0xFF, &f), TypedValue::I8(-1));
        let f = FieldDef::new("a", FieldKind::Signed, 12);
        assert_eq!(convert_raw(0x800, &f), TypedValue::I16(-2048));
        let f = FieldDef::new("a", FieldKind::Signed, 24);
        assert_eq!(convert_raw(0xFFFFFF, &f), TypedValue::I32(-1));
    }

    #[test]
    fn convert_bool_and_bytes() {
        let f = FieldDef::new("a", FieldKind::Bool, 1);
        assert_eq!(convert_raw(1, &f), TypedValue::Bool(true));
        assert_eq!(convert_raw(0, &f), TypedValue::Bool(false));
        let f = FieldDef::new("a", FieldKind::Bytes, 16);
        assert_eq!(convert_raw(0xBEEF, &f), TypedValue::Bytes(vec![0xBE, 0xEF]));
    }

    #[test]
    fn six_bit_ascii_alphabet() {
        // 'A' = 1, 'B' = 2, 'C' = 3, 'D' = 4 packed into 24 bits.
        let packed = [0b000001_00, 0b0010_0000, 0b11_000100];
        assert_eq!(decode_six_bit(&packed), "ABCD");
        // Digits start at code 32; '0' = 32, '7' = 39.
        let packed = [0b100000_10, 0b0111_0000, 0];
        assert_eq!(decode_six_bit(&packed), "07");
    }

    #[test]
    fn six_bit_ascii_trims_spaces() {
        // space, 'A', space, space -> "A"
        let packed = [0b000000_00, 0b0001_0000, 0b00_000000];
        assert_eq!(decode_six_bit(&packed), "A");
        // All spares -> empty.
        assert_eq!(decode_six_bit(&[0, 0, 0]), "");
    }

    #[test]
    fn enum_label_is_resolved() {
        let mut f = unsigned("MsgType", 8);
        f.enums = vec![
            EnumValue { value: 1, label: "North marker".into() },
            EnumValue { value: 2, label: "Sector crossing".into() },
        ];
        let parsed = make_field(&f, 2);
        assert_eq!(parsed.label.as_deref(), Some("Sector crossing"));
        assert_eq!(make_field(&f, 9).label, None);
    }

    #[test]
    fn spare_fields_advance_without_output() {
        let fields = vec![
            FieldDef::spare(4),
            unsigned("LOW", 4),
        ];
        let mut out = Vec::new();
        let mut bit = 0;
        parse_portion(&fields, &[0xA5], &mut bit, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, TypedValue::U8(0x5));
        assert_eq!(bit, 8);
    }

    #[test]
    fn extension_parses_when_condition_holds() {
        let mut fx = FieldDef::new("FX", FieldKind::Bool, 1);
        fx.condition = Some(Condition::parse("FX==1"));
        fx.extension = vec![unsigned("W2", 7), FieldDef::new("FX2", FieldKind::Bool, 1)];
        let fields = vec![unsigned("W", 7), fx];

        // 0x03 = W=1, FX=1; 0x02 = W2=1, FX2=0.
        let mut out = Vec::new();
        let mut bit = 0;
        parse_portion(&fields, &[0x03, 0x02], &mut bit, &mut out).unwrap();
        let names: Vec<_> = out.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["W", "FX", "W2", "FX2"]);
        assert_eq!(out[0].value, TypedValue::U8(1));
        assert_eq!(out[2].value, TypedValue::U8(1));

        // 0x02 = W=1, FX=0: no extension.
        let mut out = Vec::new();
        let mut bit = 0;
        parse_portion(&fields, &[0x02], &mut bit, &mut out).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn field_failure_stops_the_portion() {
        let fields = vec![unsigned("A", 8), unsigned("B", 8), unsigned("C", 8)];
        let mut out = Vec::new();
        let mut bit = 0;
        let err = parse_portion(&fields, &[0x11], &mut bit, &mut out).unwrap_err();
        assert!(matches!(err, DecodeError::Underrun { .. }));
        // A parsed, B recorded invalid, C never attempted.
        assert_eq!(out.len(), 2);
        assert!(out[0].valid);
        assert!(!out[1].valid);
    }
}
