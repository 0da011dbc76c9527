//! Human-readable rendering of decode results.
//!
//! The decoder stores raw integers; this module applies the schema's LSB and
//! unit metadata at display time: `raw * lsb` with a unit suffix, enum labels
//! when one matches, time-of-day seconds as `HH:MM:SS`, byte fields as hex.

use std::fmt::Write;

use crate::decoder::{ParsedBlock, ParsedRecord};
use crate::field::{ParsedField, ParsedItem};
use crate::schema::Unit;
use crate::value::TypedValue;

/// Physical value of a numeric field (`raw * lsb`), if the field is numeric.
pub fn scaled(field: &ParsedField) -> Option<f64> {
    field.value.as_f64().map(|raw| raw * field.lsb)
}

/// Formats seconds since midnight as `HH:MM:SS` with milliseconds when the
/// value is not whole.
pub fn format_seconds_as_tod(seconds: f64) -> String {
    if seconds < 0.0 || !seconds.is_finite() {
        return format!("{seconds}");
    }
    let secs = seconds % 86400.0;
    let h = (secs / 3600.0) as u32;
    let m = ((secs % 3600.0) / 60.0) as u32;
    let s_frac = secs % 60.0;
    let s = s_frac as u32;
    let frac = s_frac - s as f64;
    if frac.abs() > 1e-6 {
        format!("{h:02}:{m:02}:{s:02}.{:03}", (frac * 1000.0) as u32)
    } else {
        format!("{h:02}:{m:02}:{s:02}")
    }
}

pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line rendering of a field value.
pub fn format_field(field: &ParsedField) -> String {
    if !field.valid {
        let msg = field
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "invalid".to_string());
        return format!("ERROR - {msg}");
    }
    if let Some(label) = &field.label {
        let raw = field.value.as_i64().unwrap_or_default();
        return format!("{label} ({raw})");
    }
    match &field.value {
        TypedValue::Bool(b) => format!("{b}"),
        TypedValue::String(s) => format!("{s:?}"),
        TypedValue::Bytes(b) => format!("hex({})", hex_string(b)),
        value => {
            let raw = value.as_i64().unwrap_or_default();
            if field.lsb == 1.0 && field.unit == Unit::None {
                return format!("{raw}");
            }
            let physical = raw as f64 * field.lsb;
            if field.unit == Unit::Seconds && (0.0..2.0 * 86400.0).contains(&physical) {
                return format!("{} ({raw})", format_seconds_as_tod(physical));
            }
            let suffix = field.unit.suffix();
            if suffix.is_empty() {
                format!("{physical} ({raw})")
            } else {
                format!("{physical} {suffix} ({raw})")
            }
        }
    }
}

pub fn item_report(item: &ParsedItem, out: &mut String) {
    let _ = writeln!(out, "  [{}] {}", item.id, item.name);
    if !item.valid {
        if let Some(e) = &item.error {
            let _ = writeln!(out, "    ERROR: {e}");
        }
    }
    for field in &item.fields {
        let _ = write!(out, "    {}: {}", field.name, format_field(field));
        if field.description.is_empty() {
            let _ = writeln!(out);
        } else {
            let _ = writeln!(out, " ({})", field.description);
        }
    }
}

pub fn record_report(index: usize, record: &ParsedRecord, out: &mut String) {
    let _ = writeln!(
        out,
        "Record {} ({} bytes){}",
        index + 1,
        record.byte_length,
        if record.valid { "" } else { " INVALID" }
    );
    if let Some(e) = &record.error {
        let _ = writeln!(out, "  ERROR: {e}");
    }
    for item in &record.items {
        item_report(item, out);
    }
}

/// Full text report for one decoded block.
pub fn block_report(block: &ParsedBlock) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Block category {} - length {} - records {}{}",
        block.category,
        block.declared_length,
        block.records.len(),
        if block.valid { "" } else { " INVALID" }
    );
    if let Some(e) = &block.error {
        let _ = writeln!(out, "ERROR: {e}");
    }
    for (i, record) in block.records.iter().enumerate() {
        record_report(i, record, &mut out);
    }
    out
}
