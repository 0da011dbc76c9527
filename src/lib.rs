//! # asterix-decoder — schema-driven ASTERIX decoding
//!
//! Decodes ASTERIX (All Purpose STructured EUROCONTROL Radar Information
//! EXchange) data blocks against declarative category schemas. A schema
//! describes one category: its UAP (the ordered mapping from FSPEC bit
//! positions to data items), a catalogue of data-item layouts, and validation
//! rules. The decoder turns raw blocks into typed, named field values.
//!
//! ## Wire format
//!
//! - **Block**: `CAT (1) | LEN (2, big-endian) | records…` — `LEN` counts the
//!   whole block including the 3 header bytes.
//! - **Record**: `FSPEC (1..16) | items…` — within each FSPEC byte, bit 7
//!   selects the first UAP slot of that byte, down to bit 1; bit 0 (FX)
//!   chains another FSPEC byte.
//! - **Items**: fixed, variable (FX-chained), extended, repetitive
//!   (`REP (1) | group × REP`) and explicit (`LEN (1) | payload (LEN-1)`)
//!   formats. All integers are big-endian; bit extraction is MSB-first.
//!
//! ## Usage
//!
//! ```no_run
//! use asterix_decoder::{xml, Decoder};
//!
//! let mut decoder = Decoder::new();
//! decoder.register_category(xml::category_from_file("cat002.xml")?);
//!
//! let block = decoder.decode_block(&[0x02, 0x00, 0x04, 0x00]);
//! for record in &block.records {
//!     let report = decoder.validate(record);
//!     println!("{} items, valid: {}", record.items.len(), report.valid);
//! }
//! # Ok::<(), asterix_decoder::xml::LoadError>(())
//! ```
//!
//! Schemas are loaded once, then the decoder is read-only: share it freely
//! across threads for concurrent decodes. Decode results own their data and
//! outlive the decoder.

pub mod condition;
pub mod cursor;
pub mod decoder;
pub mod dump;
pub mod error;
pub mod field;
pub mod schema;
pub mod stats;
pub mod value;
pub mod xml;

pub use condition::Condition;
pub use cursor::{extract_bits, pack_bits, sign_extend, Cursor};
pub use decoder::{
    select_uap_items, Decoder, Diagnostic, ParsedBlock, ParsedRecord, Severity, ValidationReport,
    MAX_FSPEC_BYTES, MAX_RECORDS_PER_BLOCK,
};
pub use error::{DecodeError, Result};
pub use field::{parse_item, ParsedField, ParsedItem};
pub use schema::{
    Category, CategoryHeader, DataFormat, Encoding, EnumValue, FieldDef, FieldKind, ItemDef,
    RecordLayout, RuleKind, SchemaError, Unit, ValidationRule,
};
pub use stats::RecordStatistics;
pub use value::TypedValue;
