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

//! The external instruction-set database. Nothing
//! downstream of this module hard-codes a mnemonic; every encoding decision
//! is driven by the `InstructionVariant` rows loaded here.

mod loader;
mod schema;

pub use loader::{load_table, TableFormat};
pub use schema::{validate_variant, SchemaError};

use std::collections::HashMap;

use crate::ast::RegisterBank;

/// One operand slot's shape tag.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotKind {
    DataRegister,
    AddressRegister,
    ExtendedRegister,
    BitPosition,
    Immediate,
    PcRelative,
    MemoryOffset,
    LiteralRegister { bank: RegisterBank, index: u8 },
    FixedLiteral(String),
}

impl SlotKind {
    /// Literal slots contribute no operand-encoded bits of their own: a
    /// `LiteralRegister` constraint is satisfied by the fixed opcode bits
    /// already baked into the row's `base_opcode`, and a `FixedLiteral`
    /// token (e.g. `LL`/`UU`) exists purely to disambiguate otherwise
    /// identical variants at parse time.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            SlotKind::LiteralRegister { .. } | SlotKind::FixedLiteral(_)
        )
    }

    pub fn is_register_like(&self) -> bool {
        matches!(
            self,
            SlotKind::DataRegister
                | SlotKind::AddressRegister
                | SlotKind::ExtendedRegister
                | SlotKind::LiteralRegister { .. }
        )
    }
}

/// One slot's full bit-field geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub kind: SlotKind,
    pub bit_position: u32,
    pub bit_length: u32,
    pub signed: bool,
    pub scale: u32,
    pub requires_post_increment: bool,
    pub requires_deref: Option<bool>,
}

impl Slot {
    pub fn literal(kind: SlotKind) -> Self {
        Self {
            kind,
            bit_position: 0,
            bit_length: 0,
            signed: false,
            scale: 1,
            requires_post_increment: false,
            requires_deref: None,
        }
    }

    pub fn field(kind: SlotKind, bit_position: u32, bit_length: u32, signed: bool) -> Self {
        Self {
            kind,
            bit_position,
            bit_length,
            signed,
            scale: 1,
            requires_post_increment: false,
            requires_deref: None,
        }
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_post_increment(mut self) -> Self {
        self.requires_post_increment = true;
        self
    }

    pub fn with_deref(mut self, deref: bool) -> Self {
        self.requires_deref = Some(deref);
        self
    }
}

/// One row of the loaded instruction table: one encoding variant of a
/// mnemonic.
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionVariant {
    pub mnemonic: String,
    pub opcode_size_bits: u32,
    pub base_opcode: u32,
    pub slots: Vec<Slot>,
    /// 1-based row number in the source table, for diagnostics.
    pub row: usize,
}

impl InstructionVariant {
    pub fn size_bytes(&self) -> u32 {
        self.opcode_size_bits / 8
    }

    /// Non-literal slots, in declared order — these are the slots that
    /// consume a parsed operand and contribute encoded bits.
    pub fn operand_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| !s.kind.is_literal())
    }

    /// Number of slots that consume encoded bits (excludes literal slots).
    pub fn operand_count(&self) -> usize {
        self.operand_slots().count()
    }

    /// Number of explicit operand tokens the assembly syntax expects,
    /// including literal-register and fixed-literal slots: those still
    /// occupy one source operand position even though they contribute no
    /// encoded bits of their own.
    pub fn declared_operand_count(&self) -> usize {
        self.slots.len()
    }
}

/// An indexed, immutable collection of variants.
#[derive(Debug, Clone, Default)]
pub struct InstructionTable {
    by_mnemonic: HashMap<String, Vec<InstructionVariant>>,
}

impl InstructionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variant: InstructionVariant) {
        self.by_mnemonic
            .entry(variant.mnemonic.clone())
            .or_default()
            .push(variant);
    }

    /// Variants for a mnemonic, in table-row order (row order is the
    /// tie-break priority used by the selector, spec §4.4 step 5).
    pub fn variants(&self, mnemonic: &str) -> &[InstructionVariant] {
        self.by_mnemonic
            .get(mnemonic)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_mnemonic(&self, mnemonic: &str) -> bool {
        self.by_mnemonic.contains_key(mnemonic)
    }

    pub fn mnemonics(&self) -> impl Iterator<Item = &str> {
        self.by_mnemonic.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_mnemonic.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Variants filtered by arity, the selector's first filter, pre-computed as a convenience for callers that want to
    /// avoid re-counting slots on every lookup.
    pub fn variants_with_arity(&self, mnemonic: &str, arity: usize) -> Vec<&InstructionVariant> {
        self.variants(mnemonic)
            .iter()
            .filter(|v| v.declared_operand_count() == arity)
            .collect()
    }
}
