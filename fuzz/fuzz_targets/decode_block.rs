//! Decoder fuzz target: feed arbitrary bytes to decode_block.
//! Decoding must not panic; failures are values on the returned block.
//! Build with: cargo fuzz run decode_block (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn fuzz_decoder() -> asterix_decoder::Decoder {
    use asterix_decoder::{
        Category, CategoryHeader, DataFormat, Decoder, FieldDef, FieldKind, ItemDef,
    };
    let mut dsi = ItemDef::new("I002/010", "Data Source Identifier", DataFormat::Fixed);
    dsi.length = Some(2);
    dsi.fields = vec![
        FieldDef::new("SAC", FieldKind::Unsigned, 8),
        FieldDef::new("SIC", FieldKind::Unsigned, 8),
    ];
    let mut cfg = ItemDef::new("I002/050", "Station Configuration Status", DataFormat::Variable);
    cfg.fields = vec![
        FieldDef::new("CNF", FieldKind::Unsigned, 7),
        FieldDef::new("FX", FieldKind::Bool, 1),
    ];
    let mut plot = ItemDef::new("I002/070", "Plot Count Values", DataFormat::Repetitive);
    plot.length = Some(2);
    plot.fields = vec![
        FieldDef::new("A", FieldKind::Bool, 1),
        FieldDef::new("IDENT", FieldKind::Unsigned, 5),
        FieldDef::new("COUNTER", FieldKind::Unsigned, 10),
    ];
    let mut sp = ItemDef::new("I002/SP", "Special Purpose Field", DataFormat::Explicit);
    sp.fields = vec![FieldDef::new("SPDATA", FieldKind::Bytes, 32)];
    let category = Category::new(
        CategoryHeader {
            number: 2,
            ..CategoryHeader::default()
        },
        vec![
            "I002/010".into(),
            "I002/050".into(),
            "I002/070".into(),
            "I002/SP".into(),
        ],
        vec![dsi, cfg, plot, sp],
        vec![],
    )
    .unwrap();
    let mut decoder = Decoder::new();
    decoder.register_category(category);
    decoder
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let decoder = fuzz_decoder();
    let _ = decoder.decode_block(data);
    let _ = decoder.decode_stream(data);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_block");
}
