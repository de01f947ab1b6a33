/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use std::path::Path;

use serde::Deserialize;

use crate::ast::RegisterBank;
use crate::errors::{AssemblyError, ErrorKind, SourceLocation};
use crate::file_reader::FileReader;

use super::schema::{validate_variant, SchemaError};
use super::{InstructionTable, InstructionVariant, Slot, SlotKind};

/// Which on-disk shape the table file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// A JSON array of row objects — the "structured document" shape.
    Json,
    /// Tab-separated rows with a header line — the "tabular
    /// spreadsheet"/"line-oriented text" shape.
    Tsv,
}

impl TableFormat {
    /// Guesses the format from a file extension, falling back to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tsv") | Some("txt") => TableFormat::Tsv,
            _ => TableFormat::Json,
        }
    }
}

pub fn load_table<F: FileReader>(
    reader: &F,
    path: &Path,
    format: TableFormat,
) -> Result<InstructionTable, AssemblyError> {
    let text = reader
        .read_to_string(path)
        .map_err(|e| table_error(path, format!("failed to read table file: {e}")))?;

    let raw_variants = match format {
        TableFormat::Json => parse_json(&text).map_err(|e| table_error(path, e))?,
        TableFormat::Tsv => parse_tsv(&text).map_err(|e| table_error(path, e))?,
    };

    let mut table = InstructionTable::new();
    let mut errors: Vec<SchemaError> = Vec::new();
    for variant in raw_variants {
        match validate_variant(&variant) {
            Ok(()) => table.insert(variant),
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        let joined = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(table_error(
            path,
            format!("{} row(s) failed schema validation: {}", errors.len(), joined),
        ));
    }

    if table.is_empty() {
        return Err(table_error(path, "instruction table is empty".to_string()));
    }

    Ok(table)
}

fn table_error(path: &Path, message: impl Into<String>) -> AssemblyError {
    AssemblyError::new(
        ErrorKind::TableLoadError,
        SourceLocation::new(path, 0, 0),
        message,
    )
}

fn default_scale() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RawSlot {
    kind: String,
    #[serde(default)]
    bit_position: u32,
    #[serde(default)]
    bit_length: u32,
    #[serde(default)]
    signed: bool,
    #[serde(default = "default_scale")]
    scale: u32,
    #[serde(default)]
    post_increment: bool,
    deref: Option<bool>,
    bank: Option<String>,
    index: Option<u8>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVariant {
    mnemonic: String,
    opcode_size_bits: u32,
    base_opcode: serde_json::Value,
    #[serde(default)]
    slots: Vec<RawSlot>,
}

fn parse_json(text: &str) -> Result<Vec<InstructionVariant>, String> {
    let raw: Vec<RawVariant> =
        serde_json::from_str(text).map_err(|e| format!("malformed JSON table: {e}"))?;
    raw.into_iter()
        .enumerate()
        .map(|(i, r)| build_variant(r, i + 1))
        .collect()
}

/// Compact tab-separated form: a header line (ignored beyond a `#` check)
/// followed by one row per line:
///   MNEMONIC<TAB>opcode_size_bits<TAB>base_opcode<TAB>slot<TAB>slot...
/// where each `slot` cell is `kind:bit_position:bit_length:signed:scale`,
/// with `literal_register` slots appending `:BANK:index` and
/// `fixed_literal` slots appending `:TOKEN`.
fn parse_tsv(text: &str) -> Result<Vec<InstructionVariant>, String> {
    let mut variants = Vec::new();
    let mut row_number = 0usize;
    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if line_no == 0 && trimmed.to_ascii_lowercase().starts_with("mnemonic") {
            continue;
        }
        row_number += 1;
        let fields: Vec<&str> = line.split('\t').map(|f| f.trim()).collect();
        if fields.len() < 3 {
            return Err(format!(
                "row {row_number}: expected at least mnemonic, opcode_size_bits, base_opcode"
            ));
        }
        let mnemonic = fields[0].to_ascii_uppercase();
        let opcode_size_bits: u32 = fields[1]
            .parse()
            .map_err(|_| format!("row {row_number}: invalid opcode_size_bits {:?}", fields[1]))?;
        let base_opcode = parse_int_cell(fields[2])
            .ok_or_else(|| format!("row {row_number}: invalid base_opcode {:?}", fields[2]))?;

        let mut slots = Vec::new();
        for cell in &fields[3..] {
            if cell.is_empty() {
                continue;
            }
            slots.push(build_slot_from_tsv_cell(cell, row_number)?);
        }

        variants.push(InstructionVariant {
            mnemonic,
            opcode_size_bits,
            base_opcode,
            slots,
            row: row_number,
        });
    }
    Ok(variants)
}

fn build_slot_from_tsv_cell(cell: &str, row_number: usize) -> Result<Slot, String> {
    let parts: Vec<&str> = cell.split(':').collect();
    if parts.len() < 5 {
        return Err(format!(
            "row {row_number}: slot cell {:?} needs at least kind:pos:len:signed:scale",
            cell
        ));
    }
    let kind_tag = parts[0];
    let bit_position: u32 = parts[1]
        .parse()
        .map_err(|_| format!("row {row_number}: bad bit_position in {:?}", cell))?;
    let bit_length: u32 = parts[2]
        .parse()
        .map_err(|_| format!("row {row_number}: bad bit_length in {:?}", cell))?;
    let signed = parts[3] == "1";
    let scale: u32 = parts[4]
        .parse()
        .map_err(|_| format!("row {row_number}: bad scale in {:?}", cell))?;

    let kind = match kind_tag {
        "literal_register" => {
            let bank_str = parts.get(5).ok_or_else(|| {
                format!("row {row_number}: literal_register slot missing bank in {:?}", cell)
            })?;
            let index: u8 = parts
                .get(6)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    format!("row {row_number}: literal_register slot missing index in {:?}", cell)
                })?;
            SlotKind::LiteralRegister {
                bank: parse_bank(bank_str)
                    .ok_or_else(|| format!("row {row_number}: unknown register bank {:?}", bank_str))?,
                index,
            }
        }
        "fixed_literal" => {
            let token = parts
                .get(5)
                .ok_or_else(|| format!("row {row_number}: fixed_literal slot missing token in {:?}", cell))?;
            SlotKind::FixedLiteral((*token).to_string())
        }
        other => parse_slot_kind_tag(other)
            .ok_or_else(|| format!("row {row_number}: unknown slot kind {:?}", other))?,
    };

    let mut slot = if kind.is_literal() {
        Slot::literal(kind)
    } else {
        Slot::field(kind, bit_position, bit_length, signed).with_scale(scale.max(1))
    };
    if cell.contains("+pi") {
        slot = slot.with_post_increment();
    }
    Ok(slot)
}

fn parse_slot_kind_tag(tag: &str) -> Option<SlotKind> {
    Some(match tag {
        "data_register" => SlotKind::DataRegister,
        "address_register" => SlotKind::AddressRegister,
        "extended_register" => SlotKind::ExtendedRegister,
        "bit_position" => SlotKind::BitPosition,
        "immediate" => SlotKind::Immediate,
        "pc_relative" => SlotKind::PcRelative,
        "memory_offset" => SlotKind::MemoryOffset,
        _ => return None,
    })
}

fn parse_bank(s: &str) -> Option<RegisterBank> {
    Some(match s.to_ascii_uppercase().as_str() {
        "D" => RegisterBank::D,
        "A" => RegisterBank::A,
        "E" => RegisterBank::E,
        "P" => RegisterBank::P,
        _ => return None,
    })
}

fn parse_int_cell(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

fn build_variant(raw: RawVariant, row: usize) -> Result<InstructionVariant, String> {
    let base_opcode = match &raw.base_opcode {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(|v| v as u32)
            .ok_or_else(|| format!("row {row}: base_opcode number out of range"))?,
        serde_json::Value::String(s) => {
            parse_int_cell(s).ok_or_else(|| format!("row {row}: invalid base_opcode string {:?}", s))?
        }
        other => return Err(format!("row {row}: base_opcode must be a number or string, got {other}")),
    };

    let mut slots = Vec::with_capacity(raw.slots.len());
    for raw_slot in raw.slots {
        slots.push(build_slot(raw_slot, row)?);
    }

    Ok(InstructionVariant {
        mnemonic: raw.mnemonic.to_ascii_uppercase(),
        opcode_size_bits: raw.opcode_size_bits,
        base_opcode,
        slots,
        row,
    })
}

fn build_slot(raw: RawSlot, row: usize) -> Result<Slot, String> {
    let kind = match raw.kind.as_str() {
        "literal_register" => {
            let bank_str = raw
                .bank
                .ok_or_else(|| format!("row {row}: literal_register slot missing bank"))?;
            let bank = parse_bank(&bank_str)
                .ok_or_else(|| format!("row {row}: unknown register bank {:?}", bank_str))?;
            let index = raw
                .index
                .ok_or_else(|| format!("row {row}: literal_register slot missing index"))?;
            SlotKind::LiteralRegister { bank, index }
        }
        "fixed_literal" => {
            let token = raw
                .token
                .ok_or_else(|| format!("row {row}: fixed_literal slot missing token"))?;
            SlotKind::FixedLiteral(token)
        }
        other => parse_slot_kind_tag(other)
            .ok_or_else(|| format!("row {row}: unknown slot kind {:?}", other))?,
    };

    let mut slot = if kind.is_literal() {
        Slot::literal(kind)
    } else {
        Slot::field(kind, raw.bit_position, raw.bit_length, raw.signed).with_scale(raw.scale.max(1))
    };
    if raw.post_increment {
        slot = slot.with_post_increment();
    }
    if let Some(deref) = raw.deref {
        slot = slot.with_deref(deref);
    }
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_reader::MockFileReader;
    use std::path::Path;

    #[test]
    fn loads_minimal_json_table() {
        let mut reader = MockFileReader::default();
        reader.add_file(
            "table.json",
            r#"[
                {
                    "mnemonic": "nop",
                    "opcode_size_bits": 16,
                    "base_opcode": 0,
                    "slots": []
                },
                {
                    "mnemonic": "mov",
                    "opcode_size_bits": 16,
                    "base_opcode": "0x0082",
                    "slots": [
                        {"kind": "data_register", "bit_position": 8, "bit_length": 4},
                        {"kind": "immediate", "bit_position": 0, "bit_length": 4, "signed": true}
                    ]
                }
            ]"#,
        );
        let table = load_table(&reader, Path::new("table.json"), TableFormat::Json).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.variants("MOV")[0].base_opcode, 0x0082);
    }

    #[test]
    fn rejects_overlapping_row() {
        let mut reader = MockFileReader::default();
        reader.add_file(
            "table.json",
            r#"[{
                "mnemonic": "bad",
                "opcode_size_bits": 16,
                "base_opcode": 0,
                "slots": [
                    {"kind": "immediate", "bit_position": 0, "bit_length": 8, "signed": false},
                    {"kind": "immediate", "bit_position": 4, "bit_length": 8, "signed": false}
                ]
            }]"#,
        );
        let err = load_table(&reader, Path::new("table.json"), TableFormat::Json).unwrap_err();
        assert!(err.to_string().contains("TableLoadError") || err.to_string().contains("schema"));
    }

    #[test]
    fn loads_tsv_table() {
        let mut reader = MockFileReader::default();
        reader.add_file(
            "table.tsv",
            "mnemonic\topcode_size_bits\tbase_opcode\tslots\nJ\t16\t0x003C\tpc_relative:8:8:1:2\n",
        );
        let table = load_table(&reader, Path::new("table.tsv"), TableFormat::Tsv).unwrap();
        assert_eq!(table.len(), 1);
        let v = &table.variants("J")[0];
        assert_eq!(v.opcode_size_bits, 16);
        assert_eq!(v.slots[0].scale, 2);
    }
}
