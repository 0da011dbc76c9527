//! In-memory category schema: header, UAP, item catalogue, validation rules.
//!
//! A [`Category`] is immutable after construction. [`Category::new`] rejects
//! ill-formed schemas so the decoder never has to re-check structural
//! invariants on the hot path: every non-spare UAP entry resolves to an item
//! definition, declared bit widths are in range, length-prefixed formats
//! carry a length, and field conditions only name fields that exist.

use std::collections::HashMap;
use std::fmt;

use crate::condition::Condition;

/// How records are laid out inside a block of this category.
///
/// Service-message categories interleave several records per block; target
/// report categories are designed to yield one record per block. Multi-record
/// decoding is the default and also handles single-record blocks correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordLayout {
    #[default]
    Multi,
    Single,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryHeader {
    pub number: u8,
    pub name: String,
    pub description: String,
    pub version: String,
    pub date: String,
    pub layout: RecordLayout,
}

/// Wire format of a data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// A declared number of bytes.
    Fixed,
    /// One or more bytes chained by the FX bit (bit 0).
    Variable,
    /// A fixed primary portion plus FX-gated extension portions.
    Extended,
    /// One repetition-count byte, then that many copies of the field group.
    Repetitive,
    /// One length byte counting itself, then `len - 1` bytes of payload.
    Explicit,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataFormat::Fixed => "fixed",
            DataFormat::Variable => "variable",
            DataFormat::Extended => "extended",
            DataFormat::Repetitive => "repetitive",
            DataFormat::Explicit => "explicit",
        };
        f.write_str(s)
    }
}

/// Conversion class of a field. The declared `bits` pick the storage width:
/// the smallest of u8/u16/u32 (or i8/i16/i32) that fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unsigned,
    Signed,
    Bool,
    String,
    Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// ICAO 6-bit character packing used by callsign fields.
    SixBitAscii,
}

/// Physical unit of the scaled value `raw * lsb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum Unit {
    #[default]
    None,
    Seconds,
    NauticalMiles,
    Degrees,
    FlightLevel,
    Feet,
    Knots,
    MetersPerSecond,
}

impl Unit {
    /// Display suffix, empty for dimensionless values.
    pub fn suffix(&self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Seconds => "s",
            Unit::NauticalMiles => "NM",
            Unit::Degrees => "°",
            Unit::FlightLevel => "FL",
            Unit::Feet => "ft",
            Unit::Knots => "kts",
            Unit::MetersPerSecond => "m/s",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub value: u32,
    pub label: String,
}

/// One declared field of a data item.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Declared width, 1..=32.
    pub bits: u8,
    pub description: String,
    /// Physical value of a raw 1; metadata for presentation layers.
    pub lsb: f64,
    pub unit: Unit,
    pub enums: Vec<EnumValue>,
    pub encoding: Option<Encoding>,
    /// Gate for `extension`: evaluated against the fields already parsed in
    /// the same item.
    pub condition: Option<Condition>,
    pub extension: Vec<FieldDef>,
}

impl FieldDef {
    pub fn new(name: &str, kind: FieldKind, bits: u8) -> Self {
        FieldDef {
            name: name.to_string(),
            kind,
            bits,
            description: String::new(),
            lsb: 1.0,
            unit: Unit::None,
            enums: Vec::new(),
            encoding: None,
            condition: None,
            extension: Vec::new(),
        }
    }

    /// A spare field: advances the bit offset, produces no output.
    pub fn spare(bits: u8) -> Self {
        FieldDef::new("spare", FieldKind::Unsigned, bits)
    }

    pub fn is_spare(&self) -> bool {
        self.name == "spare"
    }
}

/// A data item definition from the category catalogue.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    pub definition: String,
    pub format: DataFormat,
    /// Byte length of the fixed body (`Fixed`) or of one group (`Repetitive`).
    pub length: Option<u16>,
    pub fields: Vec<FieldDef>,
}

impl ItemDef {
    pub fn new(id: &str, name: &str, format: DataFormat) -> Self {
        ItemDef {
            id: id.to_string(),
            name: name.to_string(),
            definition: String::new(),
            format,
            length: None,
            fields: Vec::new(),
        }
    }

    /// Looks a field up by name anywhere in the item, extensions included.
    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        fn walk<'a>(fields: &'a [FieldDef], name: &str) -> Option<&'a FieldDef> {
            for f in fields {
                if f.name == name {
                    return Some(f);
                }
                if let Some(found) = walk(&f.extension, name) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.fields, name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Mandatory,
    Conditional,
    Optional,
}

/// Presence rule applied to a decoded record.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    /// Item id the rule constrains (e.g. `I002/010`).
    pub field: String,
    pub kind: RuleKind,
    /// For `Conditional` rules: the antecedent, over decoded field values.
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate data item {0}")]
    DuplicateItem(String),
    #[error("UAP entry {0} has no item definition")]
    UnresolvedUapItem(String),
    #[error("item {item}: {format} format requires a length")]
    MissingLength { item: String, format: String },
    #[error("item {item}, field {field}: width of {bits} bits is out of range")]
    WidthOutOfRange { item: String, field: String, bits: u8 },
    #[error("item {item}: portion of {bits} bits is not byte aligned")]
    MisalignedFields { item: String, bits: u32 },
    #[error("item {item}: variable format requires an FX bit in the fixed portion")]
    MissingFx { item: String },
    #[error("item {item}: condition references unknown field {field}")]
    UnknownConditionField { item: String, field: String },
}

/// One ASTERIX category: header, UAP, item catalogue, validation rules.
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Category {
    header: CategoryHeader,
    uap: Vec<String>,
    items: HashMap<String, ItemDef>,
    validations: Vec<ValidationRule>,
}

impl Category {
    /// Builds and validates a category. The UAP is the ordered list of item
    /// ids aligned to FSPEC bit positions; `"spare"` marks unassigned slots.
    pub fn new(
        header: CategoryHeader,
        uap: Vec<String>,
        items: Vec<ItemDef>,
        validations: Vec<ValidationRule>,
    ) -> Result<Self, SchemaError> {
        let mut map = HashMap::with_capacity(items.len());
        for item in items {
            validate_item(&item)?;
            if map.contains_key(&item.id) {
                return Err(SchemaError::DuplicateItem(item.id.clone()));
            }
            map.insert(item.id.clone(), item);
        }
        for entry in &uap {
            if entry != "spare" && !entry.is_empty() && !map.contains_key(entry) {
                return Err(SchemaError::UnresolvedUapItem(entry.clone()));
            }
        }
        Ok(Category {
            header,
            uap,
            items: map,
            validations,
        })
    }

    pub fn number(&self) -> u8 {
        self.header.number
    }

    pub fn header(&self) -> &CategoryHeader {
        &self.header
    }

    pub fn uap(&self) -> &[String] {
        &self.uap
    }

    /// O(1) lookup by item id.
    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn validations(&self) -> &[ValidationRule] {
        &self.validations
    }
}

fn validate_item(item: &ItemDef) -> Result<(), SchemaError> {
    match item.format {
        DataFormat::Fixed | DataFormat::Repetitive => {
            if item.length.map_or(true, |l| l == 0) {
                return Err(SchemaError::MissingLength {
                    item: item.id.clone(),
                    format: item.format.to_string(),
                });
            }
        }
        DataFormat::Variable | DataFormat::Extended => {
            let has_fx = item
                .fields
                .iter()
                .any(|f| f.name.starts_with("FX") && f.bits == 1);
            if !has_fx {
                return Err(SchemaError::MissingFx {
                    item: item.id.clone(),
                });
            }
        }
        DataFormat::Explicit => {}
    }
    validate_fields(&item.id, &item.fields)?;
    validate_alignment(&item.id, &item.fields)?;
    validate_conditions(item, &item.fields)?;
    Ok(())
}

fn validate_fields(item: &str, fields: &[FieldDef]) -> Result<(), SchemaError> {
    for f in fields {
        if f.bits == 0 || f.bits > 32 {
            return Err(SchemaError::WidthOutOfRange {
                item: item.to_string(),
                field: f.name.clone(),
                bits: f.bits,
            });
        }
        validate_fields(item, &f.extension)?;
    }
    Ok(())
}

/// Each portion (the fixed part and every extension block) must pack to
/// whole bytes.
fn validate_alignment(item: &str, fields: &[FieldDef]) -> Result<(), SchemaError> {
    let bits: u32 = fields.iter().map(|f| f.bits as u32).sum();
    if bits % 8 != 0 {
        return Err(SchemaError::MisalignedFields {
            item: item.to_string(),
            bits,
        });
    }
    for f in fields {
        if !f.extension.is_empty() {
            validate_alignment(item, &f.extension)?;
        }
    }
    Ok(())
}

fn validate_conditions(item: &ItemDef, fields: &[FieldDef]) -> Result<(), SchemaError> {
    for f in fields {
        if let Some(cond) = &f.condition {
            if cond.is_well_formed() {
                for name in cond.field_names() {
                    if item.find_field(name).is_none() {
                        return Err(SchemaError::UnknownConditionField {
                            item: item.id.clone(),
                            field: name.to_string(),
                        });
                    }
                }
            }
        }
        validate_conditions(item, &f.extension)?;
    }
    Ok(())
}
