//! Shared test fixture: a CAT002 (monoradar service messages) category
//! description exercising every item format the decoder supports.
#![allow(dead_code)]

use asterix_decoder::{xml, Category, Decoder};

/// CAT002 description. UAP slots (FSPEC bit order):
///
/// | slot | item     | format             |
/// |------|----------|--------------------|
/// | 1    | I002/010 | fixed 2            |
/// | 2    | I002/000 | fixed 1            |
/// | 3    | I002/020 | fixed 1            |
/// | 4    | I002/030 | fixed 3            |
/// | 5    | I002/041 | fixed 2            |
/// | 6    | I002/050 | variable           |
/// | 7    | I002/060 | variable           |
/// | 8    | I002/070 | repetitive, 2/group|
/// | 9    | I002/100 | fixed 8            |
/// | 10   | I002/090 | fixed 2 (signed)   |
/// | 11   | I002/080 | variable           |
/// | 12   | spare    |                    |
/// | 13   | I002/SP  | explicit           |
pub const CAT002_XML: &str = r#"
<asterix_category>
  <header>
    <category>2</category>
    <name>Monoradar Service Messages</name>
    <description>Service messages from monoradar stations</description>
    <version>1.1</version>
    <date>2007-11-01</date>
    <record_layout>multi</record_layout>
  </header>
  <user_application_profile>
    <uap_items>
      <item>I002/010</item>
      <item>I002/000</item>
      <item>I002/020</item>
      <item>I002/030</item>
      <item>I002/041</item>
      <item>I002/050</item>
      <item>I002/060</item>
      <item>I002/070</item>
      <item>I002/100</item>
      <item>I002/090</item>
      <item>I002/080</item>
      <item>spare</item>
      <item>I002/SP</item>
    </uap_items>
  </user_application_profile>
  <data_items>
    <data_item id="I002/010">
      <name>Data Source Identifier</name>
      <definition>Identification of the radar station from which the data are received</definition>
      <format>fixed</format>
      <length>2</length>
      <structure>
        <field name="SAC" type="uint8" bits="8" description="System Area Code"/>
        <field name="SIC" type="uint8" bits="8" description="System Identification Code"/>
      </structure>
    </data_item>
    <data_item id="I002/000">
      <name>Message Type</name>
      <format>fixed</format>
      <length>1</length>
      <structure>
        <field name="MsgType" type="uint8" bits="8">
          <enum value="1">North marker message</enum>
          <enum value="2">Sector crossing message</enum>
          <enum value="3">South marker message</enum>
        </field>
      </structure>
    </data_item>
    <data_item id="I002/020">
      <name>Sector Number</name>
      <format>fixed</format>
      <length>1</length>
      <structure>
        <field name="SECTOR" type="uint8" bits="8" lsb="360/256" unit="degrees"/>
      </structure>
    </data_item>
    <data_item id="I002/030">
      <name>Time of Day</name>
      <format>fixed</format>
      <length>3</length>
      <structure>
        <field name="TOD" type="uint24" bits="24" lsb="1/128" unit="s"/>
      </structure>
    </data_item>
    <data_item id="I002/041">
      <name>Antenna Rotation Speed</name>
      <format>fixed</format>
      <length>2</length>
      <structure>
        <field name="PERIOD" type="uint16" bits="16" lsb="1/128" unit="s"/>
      </structure>
    </data_item>
    <data_item id="I002/050">
      <name>Station Configuration Status</name>
      <format>variable</format>
      <structure>
        <field name="CNF" type="uint7" bits="7"/>
        <field name="FX" type="bool" bits="1"/>
        <extension condition="FX==1">
          <field name="CNF2" type="uint7" bits="7"/>
          <field name="FX2" type="bool" bits="1"/>
        </extension>
        <extension>
          <field name="CNF3" type="uint7" bits="7"/>
          <field name="FX3" type="bool" bits="1"/>
        </extension>
      </structure>
    </data_item>
    <data_item id="I002/060">
      <name>Station Processing Mode</name>
      <format>variable</format>
      <structure>
        <field name="MODE" type="uint7" bits="7"/>
        <field name="FX" type="bool" bits="1"/>
      </structure>
    </data_item>
    <data_item id="I002/070">
      <name>Plot Count Values</name>
      <format>repetitive</format>
      <length>2</length>
      <structure>
        <field name="A" type="bool" bits="1"/>
        <field name="IDENT" type="uint5" bits="5"/>
        <field name="COUNTER" type="uint10" bits="10"/>
      </structure>
    </data_item>
    <data_item id="I002/100">
      <name>Dynamic Window</name>
      <format>fixed</format>
      <length>8</length>
      <structure>
        <field name="RHO_START" type="uint16" bits="16" lsb="1/128" unit="NM"/>
        <field name="RHO_END" type="uint16" bits="16" lsb="1/128" unit="NM"/>
        <field name="THETA_START" type="uint16" bits="16" lsb="360/2^16" unit="degrees"/>
        <field name="THETA_END" type="uint16" bits="16" lsb="360/2^16" unit="degrees"/>
      </structure>
    </data_item>
    <data_item id="I002/090">
      <name>Collimation Error</name>
      <format>fixed</format>
      <length>2</length>
      <structure>
        <field name="RANGE_ERROR" type="int8" bits="8" lsb="1/128" unit="NM"/>
        <field name="AZIMUTH_ERROR" type="int8" bits="8" lsb="360/2^14" unit="degrees"/>
      </structure>
    </data_item>
    <data_item id="I002/080">
      <name>Warning/Error Conditions</name>
      <format>variable</format>
      <structure>
        <field name="WE" type="uint7" bits="7"/>
        <field name="FX" type="bool" bits="1"/>
      </structure>
    </data_item>
    <data_item id="I002/SP">
      <name>Special Purpose Field</name>
      <format>explicit</format>
      <structure>
        <field name="SPDATA" type="bytes" bits="32"/>
      </structure>
    </data_item>
  </data_items>
  <validation_rules>
    <rule field="I002/010" type="mandatory"/>
    <rule field="I002/000" type="mandatory"/>
    <rule field="I002/020" type="conditional" condition="MsgType==2"/>
  </validation_rules>
</asterix_category>
"#;

pub fn cat002() -> Category {
    xml::category_from_str(CAT002_XML).expect("CAT002 fixture loads")
}

pub fn decoder() -> Decoder {
    let mut decoder = Decoder::new();
    decoder.register_category(cat002());
    decoder
}

pub fn strict_decoder() -> Decoder {
    let mut decoder = decoder();
    decoder.set_strict_validation(true);
    decoder
}
