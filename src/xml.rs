//! Category description loader.
//!
//! Category schemas are XML documents rooted at `<asterix_category>`. The
//! document is deserialized with serde into private XML-mapping structs which
//! are then converted into the validated [`Category`] model — callers only
//! ever see the schema types. File and directory helpers cover the common
//! deployment of one description file per category.
//!
//! ```xml
//! <asterix_category>
//!   <header>
//!     <category>2</category>
//!     <name>Monoradar Service Messages</name>
//!     <record_layout>multi</record_layout>
//!   </header>
//!   <user_application_profile>
//!     <uap_items>
//!       <item>I002/010</item>
//!     </uap_items>
//!   </user_application_profile>
//!   <data_items>
//!     <data_item id="I002/010">
//!       <name>Data Source Identifier</name>
//!       <format>fixed</format>
//!       <length>2</length>
//!       <structure>
//!         <field name="SAC" type="uint8" bits="8"/>
//!         <field name="SIC" type="uint8" bits="8"/>
//!       </structure>
//!     </data_item>
//!   </data_items>
//!   <validation_rules>
//!     <rule field="I002/010" type="mandatory"/>
//!   </validation_rules>
//! </asterix_category>
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::condition::Condition;
use crate::decoder::Decoder;
use crate::schema::{
    Category, CategoryHeader, DataFormat, Encoding, EnumValue, FieldDef, FieldKind, ItemDef,
    RecordLayout, RuleKind, SchemaError, Unit, ValidationRule,
};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("item {item}: unknown field type {value:?}")]
    UnknownFieldType { item: String, value: String },
    #[error("item {item}: unknown format {value:?}")]
    UnknownFormat { item: String, value: String },
    #[error("item {item}: unknown encoding {value:?}")]
    UnknownEncoding { item: String, value: String },
    #[error("item {item}: extension block but no open FX field")]
    ExtensionWithoutFx { item: String },
    #[error("{context}: invalid {attribute} value {value:?}")]
    InvalidAttribute {
        context: String,
        attribute: &'static str,
        value: String,
    },
}

impl From<quick_xml::DeError> for LoadError {
    fn from(e: quick_xml::DeError) -> Self {
        LoadError::Xml(e.to_string())
    }
}

/// Parses one category description document.
pub fn category_from_str(xml: &str) -> Result<Category, LoadError> {
    let doc: XmlCategory = quick_xml::de::from_str(xml)?;
    doc.try_into()
}

/// Loads one category description file.
pub fn category_from_file<P: AsRef<Path>>(path: P) -> Result<Category, LoadError> {
    let text = std::fs::read_to_string(path)?;
    category_from_str(&text)
}

/// Loads every `*.xml` file in a directory, in file-name order.
pub fn load_directory<P: AsRef<Path>>(dir: P) -> Result<Vec<Category>, LoadError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "xml"))
        .collect();
    paths.sort();
    let mut categories = Vec::with_capacity(paths.len());
    for path in paths {
        debug!(path = %path.display(), "loading category description");
        categories.push(category_from_file(&path)?);
    }
    Ok(categories)
}

impl Decoder {
    /// Loads a category description file and registers it.
    pub fn load_category_file<P: AsRef<Path>>(&mut self, path: P) -> Result<u8, LoadError> {
        let category = category_from_file(path)?;
        let number = category.number();
        self.register_category(category);
        Ok(number)
    }

    /// Loads and registers every `*.xml` description in a directory; returns
    /// the registered category numbers.
    pub fn load_categories_from_directory<P: AsRef<Path>>(
        &mut self,
        dir: P,
    ) -> Result<Vec<u8>, LoadError> {
        let mut numbers = Vec::new();
        for category in load_directory(dir)? {
            numbers.push(category.number());
            self.register_category(category);
        }
        Ok(numbers)
    }
}

// ---------------------------------------------------------------------------
// XML mapping structs (private; flattened into schema types below)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct XmlCategory {
    header: XmlHeader,
    #[serde(rename = "user_application_profile")]
    uap: XmlUap,
    #[serde(rename = "data_items")]
    data_items: XmlDataItems,
    #[serde(rename = "validation_rules", default)]
    validation_rules: Option<XmlValidationRules>,
}

#[derive(Debug, Deserialize)]
struct XmlHeader {
    category: u8,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    record_layout: Option<String>,
}

#[derive(Debug, Deserialize)]
struct XmlUap {
    #[serde(rename = "uap_items")]
    items: XmlUapItems,
}

#[derive(Debug, Deserialize)]
struct XmlUapItems {
    #[serde(rename = "item", default)]
    items: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct XmlDataItems {
    #[serde(rename = "data_item", default)]
    items: Vec<XmlDataItem>,
}

#[derive(Debug, Deserialize)]
struct XmlDataItem {
    #[serde(rename = "@id")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    definition: String,
    format: String,
    #[serde(default)]
    length: Option<u16>,
    #[serde(default)]
    structure: Option<XmlStructure>,
}

#[derive(Debug, Deserialize)]
struct XmlStructure {
    #[serde(rename = "field", default)]
    fields: Vec<XmlField>,
    #[serde(rename = "extension", default)]
    extensions: Vec<XmlExtension>,
}

#[derive(Debug, Deserialize)]
struct XmlField {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@bits", default)]
    bits: Option<u8>,
    #[serde(rename = "@description", default)]
    description: String,
    #[serde(rename = "@lsb", default)]
    lsb: Option<String>,
    #[serde(rename = "@unit", default)]
    unit: Option<String>,
    #[serde(rename = "@encoding", default)]
    encoding: Option<String>,
    #[serde(rename = "@condition", default)]
    condition: Option<String>,
    #[serde(rename = "enum", default)]
    enums: Vec<XmlEnum>,
}

#[derive(Debug, Deserialize)]
struct XmlEnum {
    #[serde(rename = "@value")]
    value: u32,
    #[serde(rename = "$text", default)]
    label: String,
}

#[derive(Debug, Deserialize)]
struct XmlExtension {
    #[serde(rename = "@condition", default)]
    condition: Option<String>,
    #[serde(rename = "field", default)]
    fields: Vec<XmlField>,
}

#[derive(Debug, Deserialize)]
struct XmlValidationRules {
    #[serde(rename = "rule", default)]
    rules: Vec<XmlRule>,
}

#[derive(Debug, Deserialize)]
struct XmlRule {
    #[serde(rename = "@field")]
    field: String,
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@condition", default)]
    condition: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl TryFrom<XmlCategory> for Category {
    type Error = LoadError;

    fn try_from(doc: XmlCategory) -> Result<Category, LoadError> {
        let layout = match doc.header.record_layout.as_deref() {
            None | Some("multi") => RecordLayout::Multi,
            Some("single") => RecordLayout::Single,
            Some(other) => {
                return Err(LoadError::InvalidAttribute {
                    context: format!("category {}", doc.header.category),
                    attribute: "record_layout",
                    value: other.to_string(),
                })
            }
        };
        let header = CategoryHeader {
            number: doc.header.category,
            name: doc.header.name,
            description: doc.header.description,
            version: doc.header.version,
            date: doc.header.date,
            layout,
        };
        let items = doc
            .data_items
            .items
            .into_iter()
            .map(convert_item)
            .collect::<Result<Vec<_>, _>>()?;
        let validations = doc
            .validation_rules
            .map(|r| r.rules.into_iter().map(convert_rule).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();
        Ok(Category::new(header, doc.uap.items.items, items, validations)?)
    }
}

fn convert_item(item: XmlDataItem) -> Result<ItemDef, LoadError> {
    let format = match item.format.as_str() {
        "fixed" => DataFormat::Fixed,
        "variable" => DataFormat::Variable,
        "extended" => DataFormat::Extended,
        "repetitive" => DataFormat::Repetitive,
        "explicit" => DataFormat::Explicit,
        other => {
            return Err(LoadError::UnknownFormat {
                item: item.id,
                value: other.to_string(),
            })
        }
    };
    let mut fields = Vec::new();
    let mut extensions = Vec::new();
    if let Some(structure) = item.structure {
        for field in structure.fields {
            fields.push(convert_field(&item.id, field)?);
        }
        extensions = structure.extensions;
    }
    for extension in extensions {
        let ext_fields = extension
            .fields
            .into_iter()
            .map(|f| convert_field(&item.id, f))
            .collect::<Result<Vec<_>, _>>()?;
        attach_extension(&mut fields, extension.condition, ext_fields, &item.id)?;
    }
    Ok(ItemDef {
        id: item.id,
        name: item.name,
        definition: item.definition,
        format,
        length: item.length,
        fields,
    })
}

fn convert_field(item: &str, field: XmlField) -> Result<FieldDef, LoadError> {
    let (kind, type_bits) = parse_field_type(&field.kind).ok_or_else(|| {
        LoadError::UnknownFieldType {
            item: item.to_string(),
            value: field.kind.clone(),
        }
    })?;
    let bits = field.bits.or(type_bits).ok_or_else(|| LoadError::InvalidAttribute {
        context: format!("item {item}, field {}", field.name),
        attribute: "bits",
        value: String::new(),
    })?;
    let lsb = match &field.lsb {
        Some(s) => parse_lsb(s).ok_or_else(|| LoadError::InvalidAttribute {
            context: format!("item {item}, field {}", field.name),
            attribute: "lsb",
            value: s.clone(),
        })?,
        None => 1.0,
    };
    let encoding = match field.encoding.as_deref() {
        None => None,
        Some("6bit_ascii") => Some(Encoding::SixBitAscii),
        Some(other) => {
            return Err(LoadError::UnknownEncoding {
                item: item.to_string(),
                value: other.to_string(),
            })
        }
    };
    Ok(FieldDef {
        name: field.name,
        kind,
        bits,
        description: field.description,
        lsb,
        unit: field.unit.as_deref().map(parse_unit).unwrap_or(Unit::None),
        enums: field
            .enums
            .into_iter()
            .map(|e| EnumValue {
                value: e.value,
                label: e.label,
            })
            .collect(),
        encoding,
        condition: field.condition.as_deref().map(Condition::parse),
        extension: Vec::new(),
    })
}

fn convert_rule(rule: XmlRule) -> Result<ValidationRule, LoadError> {
    let kind = match rule.kind.as_str() {
        "mandatory" => RuleKind::Mandatory,
        "conditional" => RuleKind::Conditional,
        "optional" => RuleKind::Optional,
        other => {
            return Err(LoadError::InvalidAttribute {
                context: format!("rule for {}", rule.field),
                attribute: "type",
                value: other.to_string(),
            })
        }
    };
    Ok(ValidationRule {
        field: rule.field,
        kind,
        condition: rule.condition.as_deref().map(Condition::parse),
    })
}

/// Attaches an extension block to the first FX field that does not yet carry
/// one, following already-attached chains depth-first so consecutive
/// `<extension>` elements form a chain.
fn attach_extension(
    fields: &mut [FieldDef],
    condition: Option<String>,
    ext_fields: Vec<FieldDef>,
    item: &str,
) -> Result<(), LoadError> {
    fn find_open(fields: &mut [FieldDef]) -> Option<&mut FieldDef> {
        for f in fields.iter_mut() {
            if f.name.starts_with("FX") {
                if f.extension.is_empty() {
                    return Some(f);
                }
                return find_open(&mut f.extension);
            }
        }
        None
    }
    let Some(fx) = find_open(fields) else {
        return Err(LoadError::ExtensionWithoutFx {
            item: item.to_string(),
        });
    };
    // An extension without a declared gate triggers on its FX bit being set.
    let condition = condition.unwrap_or_else(|| format!("{}==1", fx.name));
    fx.condition = Some(Condition::parse(&condition));
    fx.extension = ext_fields;
    Ok(())
}

fn parse_field_type(s: &str) -> Option<(FieldKind, Option<u8>)> {
    if let Some(n) = s.strip_prefix("uint") {
        let bits: u8 = n.parse().ok()?;
        if (1..=32).contains(&bits) {
            return Some((FieldKind::Unsigned, Some(bits)));
        }
        return None;
    }
    if let Some(n) = s.strip_prefix("int") {
        let bits: u8 = n.parse().ok()?;
        if (2..=32).contains(&bits) {
            return Some((FieldKind::Signed, Some(bits)));
        }
        return None;
    }
    match s {
        "bool" => Some((FieldKind::Bool, Some(1))),
        "string" => Some((FieldKind::String, None)),
        "bytes" => Some((FieldKind::Bytes, None)),
        _ => None,
    }
}

fn parse_unit(s: &str) -> Unit {
    match s {
        "s" => Unit::Seconds,
        "NM" => Unit::NauticalMiles,
        "degrees" => Unit::Degrees,
        "FL" => Unit::FlightLevel,
        "ft" => Unit::Feet,
        "kts" => Unit::Knots,
        "m/s" => Unit::MetersPerSecond,
        _ => Unit::None,
    }
}

/// Parses an LSB expression: a decimal, a fraction `a/b`, or a power of two
/// `2^n` / `2^(-n)` (also usable as a fraction denominator, e.g. `1/2^14`).
fn parse_lsb(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Some((num, denom)) = s.split_once('/') {
        let num = parse_scale_term(num.trim())?;
        let denom = parse_scale_term(denom.trim())?;
        if denom == 0.0 {
            return None;
        }
        return Some(num / denom);
    }
    parse_scale_term(s)
}

fn parse_scale_term(s: &str) -> Option<f64> {
    if let Some(exp) = s.strip_prefix("2^") {
        let exp: i32 = exp.trim_matches(|c| c == '(' || c == ')').parse().ok()?;
        return Some(if exp >= 0 {
            (1u64 << exp) as f64
        } else {
            1.0 / (1u64 << (-exp) as u32) as f64
        });
    }
    s.parse::<f64>().ok()
}
