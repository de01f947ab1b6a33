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

use std::fmt;

use super::InstructionVariant;

/// A row-level schema validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub row: usize,
    pub reason: String,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.reason)
    }
}

/// Checks the geometry invariant from spec §3: the union of a variant's
/// fixed opcode bits and its slot bit-ranges must be disjoint and cover
/// exactly `opcode_size_bits`. Disjointness reduces to two checks: no two
/// non-literal slots overlap each other, and no slot overlaps a `1` bit of
/// `base_opcode` (the "fixed" bits).
pub fn validate_variant(variant: &InstructionVariant) -> Result<(), SchemaError> {
    let row = variant.row;
    if variant.opcode_size_bits != 16 && variant.opcode_size_bits != 32 {
        return Err(SchemaError {
            row,
            reason: format!(
                "opcode_size_bits must be 16 or 32, got {}",
                variant.opcode_size_bits
            ),
        });
    }

    if variant.mnemonic.trim().is_empty() {
        return Err(SchemaError {
            row,
            reason: "mnemonic must not be empty".to_string(),
        });
    }

    let width = variant.opcode_size_bits;
    if width < 64 && variant.base_opcode >= (1u64 << width) as u32 {
        return Err(SchemaError {
            row,
            reason: format!(
                "base_opcode 0x{:X} does not fit in {} bits",
                variant.base_opcode, width
            ),
        });
    }

    let mut occupied: u64 = 0;
    for (i, slot) in variant.operand_slots().enumerate() {
        if slot.bit_length == 0 {
            return Err(SchemaError {
                row,
                reason: format!("operand slot {} has zero bit_length", i + 1),
            });
        }
        let end = slot.bit_position + slot.bit_length;
        if end > width {
            return Err(SchemaError {
                row,
                reason: format!(
                    "operand slot {} (bits {}..{}) extends past opcode_size_bits ({})",
                    i + 1,
                    slot.bit_position,
                    end,
                    width
                ),
            });
        }

        let mask = slot_mask(slot.bit_position, slot.bit_length);
        if occupied & mask != 0 {
            return Err(SchemaError {
                row,
                reason: format!("operand slot {} overlaps a preceding slot", i + 1),
            });
        }
        occupied |= mask;
    }

    if (variant.base_opcode as u64) & occupied != 0 {
        return Err(SchemaError {
            row,
            reason: "base_opcode has non-zero bits inside a declared operand slot".to_string(),
        });
    }

    Ok(())
}

fn slot_mask(bit_position: u32, bit_length: u32) -> u64 {
    if bit_length == 0 {
        return 0;
    }
    let ones: u64 = if bit_length >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_length) - 1
    };
    ones << bit_position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::RegisterBank;
    use crate::table::{Slot, SlotKind};

    fn variant(slots: Vec<Slot>, base_opcode: u32, width: u32) -> InstructionVariant {
        InstructionVariant {
            mnemonic: "MOV".to_string(),
            opcode_size_bits: width,
            base_opcode,
            slots,
            row: 1,
        }
    }

    #[test]
    fn accepts_disjoint_slots() {
        let v = variant(
            vec![
                Slot::field(SlotKind::DataRegister, 8, 4, false),
                Slot::field(SlotKind::Immediate, 0, 4, true),
            ],
            0x0082,
            16,
        );
        assert!(validate_variant(&v).is_ok());
    }

    #[test]
    fn rejects_overlapping_slots() {
        let v = variant(
            vec![
                Slot::field(SlotKind::DataRegister, 0, 8, false),
                Slot::field(SlotKind::Immediate, 4, 4, true),
            ],
            0,
            16,
        );
        assert!(validate_variant(&v).is_err());
    }

    #[test]
    fn rejects_slot_past_width() {
        let v = variant(vec![Slot::field(SlotKind::Immediate, 12, 8, true)], 0, 16);
        assert!(validate_variant(&v).is_err());
    }

    #[test]
    fn rejects_base_opcode_colliding_with_slot() {
        let v = variant(vec![Slot::field(SlotKind::Immediate, 0, 4, true)], 0x000F, 16);
        assert!(validate_variant(&v).is_err());
    }

    #[test]
    fn literal_register_slot_consumes_no_bits() {
        let v = variant(
            vec![Slot::literal(SlotKind::LiteralRegister {
                bank: RegisterBank::A,
                index: 15,
            })],
            0x1234,
            16,
        );
        assert!(validate_variant(&v).is_ok());
    }
}
