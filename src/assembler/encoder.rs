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

//! Bit-field assembly from a chosen variant plus resolved slot values (spec
//! §4.4 "Encoding"), and the single endianness-aware byte-writing helper
//! spec §9 calls for.

use crate::table::InstructionVariant;

/// Whether emitted bytes are written least-significant-byte-first or not
///.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn is_little(self) -> bool {
        matches!(self, Endianness::Little)
    }
}

/// Folds `base_opcode` with each operand slot's already-fit-checked,
/// masked bits shifted into position. `slot_values` must be in the same
/// order as `variant.operand_slots()`.
pub fn encode_word(variant: &InstructionVariant, slot_values: &[u32]) -> u32 {
    let mut word = variant.base_opcode;
    for (slot, value) in variant.operand_slots().zip(slot_values.iter()) {
        word |= value << slot.bit_position;
    }
    word
}

/// Splits an encoded opcode word into its memory-order bytes, honouring
/// `endianness` and splitting 32-bit words into two 16-bit half-words first
///.
pub fn word_to_bytes(word: u32, opcode_size_bits: u32, endianness: Endianness) -> Vec<u8> {
    match opcode_size_bits {
        16 => write_u16(word as u16, endianness),
        32 => {
            let low_half = (word & 0xFFFF) as u16;
            let high_half = (word >> 16) as u16;
            let mut bytes = Vec::with_capacity(4);
            if endianness.is_little() {
                bytes.extend(write_u16(low_half, endianness));
                bytes.extend(write_u16(high_half, endianness));
            } else {
                bytes.extend(write_u16(high_half, endianness));
                bytes.extend(write_u16(low_half, endianness));
            }
            bytes
        }
        other => panic!("unsupported opcode_size_bits {other}, schema validation should have rejected this"),
    }
}

pub fn write_u16(value: u16, endianness: Endianness) -> [u8; 2] {
    if endianness.is_little() {
        value.to_le_bytes()
    } else {
        value.to_be_bytes()
    }
}

pub fn write_u32(value: u32, endianness: Endianness) -> [u8; 4] {
    if endianness.is_little() {
        value.to_le_bytes()
    } else {
        value.to_be_bytes()
    }
}

/// The instruction word as a single big-endian integer, independent of the
/// configured memory-order endianness — used only by the text-dump
/// emitter.
pub fn word_as_big_endian_text(word: u32, opcode_size_bits: u32) -> String {
    match opcode_size_bits {
        16 => format!("{:04X}", word & 0xFFFF),
        32 => format!("{:08X}", word),
        other => panic!("unsupported opcode_size_bits {other}"),
    }
}
