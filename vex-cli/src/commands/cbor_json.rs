//! `vex cbor-to-json` / `vex json-to-cbor`: a schema-agnostic CBOR↔JSON
//! inspection utility (`SPEC_FULL.md` §6, "persisted state layout").
//! Neither direction needs to know the shape of what it's converting —
//! `ciborium::Value` and `serde_json::Value` both carry serde's generic
//! data model, so conversion is just deserializing into one and
//! serializing it back out through the other.

use std::fs::File;
use std::path::Path;

use ciborium::value::Value as CborValue;
use serde_json::Value as JsonValue;

/// Converts a CBOR file to pretty-printed JSON.
pub fn cmd_cbor_to_json(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let reader = File::open(input)?;
    let value: CborValue = ciborium::de::from_reader(reader)?;
    let writer = File::create(output)?;
    serde_json::to_writer_pretty(writer, &value)?;
    Ok(())
}

/// Converts a JSON file to CBOR.
pub fn cmd_json_to_cbor(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let reader = File::open(input)?;
    let value: JsonValue = serde_json::from_reader(reader)?;
    let writer = File::create(output)?;
    ciborium::ser::into_writer(&value, writer)?;
    Ok(())
}
