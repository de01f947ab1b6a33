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

//! The variant selector: for one `Instruction{mnemonic,
//! operands}` at a candidate `pc`, deterministically picks one table row
//! (or reports why none fit).

use crate::ast::{HighLow, Operand, RegisterBank};
use crate::parser::expr::apply_high_low;
use crate::symtab::SymbolTable;
use crate::table::{InstructionTable, InstructionVariant, Slot, SlotKind};

use super::fit::check_fit;

/// Optimisation-flag filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorOptions {
    pub force_32: bool,
    pub no_implicit: bool,
}

/// One eliminated candidate, kept for the "no candidate survives"
/// diagnostic.
#[derive(Debug, Clone)]
pub struct Elimination {
    pub row: usize,
    pub reason: String,
}

/// Successful selection: the chosen variant plus the resolved, fit-checked
/// bits for each of its non-literal slots, in slot order.
#[derive(Debug, Clone)]
pub struct Selection<'t> {
    pub variant: &'t InstructionVariant,
    pub slot_values: Vec<u32>,
}

/// Whether a forward-referenced label should be treated as "not yet
/// resolved, assume the worst case".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Pass 1 seeding: prefer the largest variant when a label is missing.
    PreferLargest,
    /// Fixpoint passes: a still-missing label is a hard error (every label
    /// must be known by the final pass).
    Strict,
}

/// Runs the full selection algorithm.
///
/// `min_size_bytes` enforces fixpoint monotonicity: once a
/// statement has been assigned a size in an earlier iteration, later
/// iterations must not choose anything smaller, so candidates below it are
/// dropped before the normal size-preference step runs. Pass-1 callers and
/// first-iteration fixpoint callers pass `0` (no floor yet).
pub fn select_variant<'t>(
    table: &'t InstructionTable,
    mnemonic: &str,
    operands: &[Operand],
    pc: u64,
    symbols: &SymbolTable,
    options: SelectorOptions,
    unresolved: UnresolvedPolicy,
    min_size_bytes: u32,
) -> Result<Selection<'t>, Vec<Elimination>> {
    let candidates = table.variants_with_arity(mnemonic, operands.len());
    let mut eliminations = Vec::new();

    // The pass-1 "prefer the largest variant when a label is unresolved"
    // safety margin falls out of `resolve_numeric_operand`
    // forcing an unfittable-for-narrow-slots placeholder displacement when
    // `unresolved == PreferLargest` and the label has no address yet; the
    // normal size-preference step below still picks the smallest *fitting*
    // survivor, which is exactly the largest one once narrow slots are
    // naturally eliminated by that placeholder.
    select_from(
        &candidates,
        operands,
        pc,
        symbols,
        options,
        unresolved,
        min_size_bytes,
        &mut eliminations,
    )
    .ok_or(eliminations)
}

fn select_from<'t>(
    candidates: &[&'t InstructionVariant],
    operands: &[Operand],
    pc: u64,
    symbols: &SymbolTable,
    options: SelectorOptions,
    unresolved: UnresolvedPolicy,
    min_size_bytes: u32,
    eliminations: &mut Vec<Elimination>,
) -> Option<Selection<'t>> {
    let mut survivors: Vec<(&'t InstructionVariant, Vec<u32>)> = Vec::new();

    for variant in candidates {
        if options.force_32 && variant.opcode_size_bits != 32 {
            eliminations.push(Elimination {
                row: variant.row,
                reason: "dropped: force-32 active and variant is 16-bit".to_string(),
            });
            continue;
        }
        if variant.size_bytes() < min_size_bytes {
            eliminations.push(Elimination {
                row: variant.row,
                reason: format!(
                    "dropped: size {} bytes is below the {} byte floor required for fixpoint monotonicity",
                    variant.size_bytes(),
                    min_size_bytes
                ),
            });
            continue;
        }
        if options.no_implicit && uses_implicit_register(variant) {
            eliminations.push(Elimination {
                row: variant.row,
                reason: "dropped: -Ono-implicit active and variant requires an implicit A[10]/A[15]".to_string(),
            });
            continue;
        }

        match match_variant(variant, operands, pc, symbols, unresolved) {
            Ok(values) => survivors.push((variant, values)),
            Err(reason) => eliminations.push(Elimination { row: variant.row, reason }),
        }
    }

    if survivors.is_empty() {
        return None;
    }

    // Size preference: smallest opcode_size_bits wins; ties keep table
    // order, which `variants_with_arity` already preserves.
    survivors.sort_by_key(|(v, _)| v.opcode_size_bits);
    let (variant, slot_values) = survivors.into_iter().next().unwrap();
    eliminations.clear();
    Some(Selection { variant, slot_values })
}

fn uses_implicit_register(variant: &InstructionVariant) -> bool {
    variant.slots.iter().any(|s| {
        matches!(
            s.kind,
            SlotKind::LiteralRegister { bank: RegisterBank::A, index: 10 }
                | SlotKind::LiteralRegister { bank: RegisterBank::A, index: 15 }
        )
    })
}

/// Walks one variant's slot list alongside the parsed operands. Returns the
/// resolved bit values for the variant's non-literal slots in order, or an
/// elimination reason.
fn match_variant(
    variant: &InstructionVariant,
    operands: &[Operand],
    pc: u64,
    symbols: &SymbolTable,
    unresolved: UnresolvedPolicy,
) -> Result<Vec<u32>, String> {
    let mut slot_values = Vec::with_capacity(variant.operand_count());

    for (i, (slot, operand)) in variant.slots.iter().zip(operands.iter()).enumerate() {
        match &slot.kind {
            SlotKind::LiteralRegister { bank, index } => {
                let reg = operand
                    .as_register()
                    .ok_or_else(|| format!("operand {} must be a register", i + 1))?;
                if reg.bank != *bank || reg.index != *index {
                    return Err(format!(
                        "operand {} must be register {:?}{}",
                        i + 1,
                        bank,
                        index
                    ));
                }
            }
            SlotKind::FixedLiteral(expected) => {
                let Operand::Fixed(token) = operand else {
                    return Err(format!("operand {} must be the literal suffix {:?}", i + 1, expected));
                };
                if token.to_ascii_uppercase() != expected.to_ascii_uppercase() {
                    return Err(format!("operand {} expected suffix {:?}, found {:?}", i + 1, expected, token));
                }
            }
            _ => {
                let bits = resolve_slot_value(slot, operand, pc, symbols, unresolved)
                    .map_err(|e| format!("operand {}: {}", i + 1, e))?;
                slot_values.push(bits);
            }
        }
    }

    Ok(slot_values)
}

fn resolve_slot_value(
    slot: &Slot,
    operand: &Operand,
    pc: u64,
    symbols: &SymbolTable,
    unresolved: UnresolvedPolicy,
) -> Result<u32, String> {
    if slot.kind.is_register_like() {
        let reg = operand.as_register().ok_or("expected a register")?;
        match &slot.kind {
            SlotKind::DataRegister if reg.bank != RegisterBank::D => return Err("expected a D register".to_string()),
            SlotKind::AddressRegister if reg.bank != RegisterBank::A => return Err("expected an A register".to_string()),
            SlotKind::ExtendedRegister if !matches!(reg.bank, RegisterBank::E | RegisterBank::P) => {
                return Err("expected an E/P register".to_string());
            }
            _ => {}
        }
        if reg.bank.is_even_only() && reg.index % 2 != 0 {
            return Err("E/P registers must be even-indexed".to_string());
        }
        if slot.requires_post_increment && !reg.post_increment {
            return Err("slot requires a post-increment register form".to_string());
        }
        if let Some(requires_deref) = slot.requires_deref {
            if reg.deref != requires_deref {
                return Err("operand's bracket/deref form does not match this slot".to_string());
            }
        }
        return Ok(reg.index as u32);
    }

    let (value, pc_relative) = resolve_numeric_operand(operand, pc, symbols, unresolved, slot)?;

    let fit = check_fit(value, slot.bit_length, slot.signed, slot.scale, pc_relative)
        .ok_or("value does not fit this slot's width")?;
    Ok(fit.bits)
}

/// Resolves an `Immediate`, `LabelRef`, or `Indexed` operand to its integer
/// value, returning `(value, pc_for_relative_slots)`.
fn resolve_numeric_operand(
    operand: &Operand,
    pc: u64,
    symbols: &SymbolTable,
    unresolved: UnresolvedPolicy,
    slot: &Slot,
) -> Result<(i64, Option<i64>), String> {
    let pc_relative = matches!(slot.kind, SlotKind::PcRelative).then_some(pc as i64);

    match operand {
        Operand::Immediate { value, high_low } => Ok((apply_high_low(*value, *high_low), pc_relative)),
        Operand::LabelRef { name, offset, high_low } => {
            let address = match symbols.get(name) {
                Some(sym) => sym.address as i64,
                None => match unresolved {
                    UnresolvedPolicy::PreferLargest => {
                        // Pass 1: no address yet. For non-PC-relative slots
                        // this is an immediate placeholder of 0; for
                        // PC-relative slots, force a large displacement so
                        // the widest variant is chosen.
                        if pc_relative.is_some() {
                            return Ok((pc as i64 + (1i64 << 30), pc_relative));
                        }
                        0
                    }
                    UnresolvedPolicy::Strict => return Err(format!("undefined symbol {:?}", name)),
                },
            };
            Ok((apply_high_low(address + offset, *high_low), pc_relative))
        }
        Operand::Indexed { displacement, .. } => match displacement.as_ref() {
            Operand::Immediate { value, high_low } => Ok((apply_high_low(*value, *high_low), pc_relative)),
            Operand::LabelRef { name, offset, high_low } => {
                let address = symbols
                    .get(name)
                    .map(|s| s.address as i64)
                    .ok_or_else(|| format!("undefined symbol {:?}", name))?;
                Ok((apply_high_low(address + offset, *high_low), pc_relative))
            }
            _ => Err("unsupported displacement operand".to_string()),
        },
        _ => Err("expected a register or numeric operand".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceLocation;
    use crate::table::Slot;

    fn table_with_j_variants() -> InstructionTable {
        let mut table = InstructionTable::new();
        table.insert(InstructionVariant {
            mnemonic: "J".to_string(),
            opcode_size_bits: 16,
            base_opcode: 0x3C,
            slots: vec![Slot {
                kind: SlotKind::PcRelative,
                bit_position: 8,
                bit_length: 8,
                signed: true,
                scale: 2,
                requires_post_increment: false,
                requires_deref: None,
            }],
            row: 1,
        });
        table.insert(InstructionVariant {
            mnemonic: "J".to_string(),
            opcode_size_bits: 32,
            base_opcode: 0x1D,
            slots: vec![Slot {
                kind: SlotKind::PcRelative,
                bit_position: 16,
                bit_length: 24,
                signed: true,
                scale: 2,
                requires_post_increment: false,
                requires_deref: None,
            }],
            row: 2,
        });
        table
    }

    #[test]
    fn picks_16_bit_when_displacement_fits() {
        let table = table_with_j_variants();
        let symbols = SymbolTable::new();
        let operands = vec![Operand::immediate(0x80000000 + 0xFE)];
        let sel = select_variant(
            &table,
            "J",
            &operands,
            0x80000000,
            &symbols,
            SelectorOptions::default(),
            UnresolvedPolicy::Strict,
            0,
        )
        .unwrap();
        assert_eq!(sel.variant.opcode_size_bits, 16);
    }

    #[test]
    fn picks_32_bit_when_displacement_too_large() {
        let table = table_with_j_variants();
        let symbols = SymbolTable::new();
        let operands = vec![Operand::immediate(0x80000200)];
        let sel = select_variant(
            &table,
            "J",
            &operands,
            0x80000000,
            &symbols,
            SelectorOptions::default(),
            UnresolvedPolicy::Strict,
            0,
        )
        .unwrap();
        assert_eq!(sel.variant.opcode_size_bits, 32);
    }

    #[test]
    fn force_32_drops_16_bit_candidate() {
        let table = table_with_j_variants();
        let symbols = SymbolTable::new();
        let operands = vec![Operand::immediate(0x80000000 + 0xFE)];
        let sel = select_variant(
            &table,
            "J",
            &operands,
            0x80000000,
            &symbols,
            SelectorOptions { force_32: true, no_implicit: false },
            UnresolvedPolicy::Strict,
            0,
        )
        .unwrap();
        assert_eq!(sel.variant.opcode_size_bits, 32);
    }

    #[test]
    fn mov_immediate_smallest_variant_const4() {
        let mut table = InstructionTable::new();
        table.insert(InstructionVariant {
            mnemonic: "MOV".to_string(),
            opcode_size_bits: 16,
            base_opcode: 0x0082,
            slots: vec![
                Slot::field(SlotKind::DataRegister, 8, 4, false),
                Slot::field(SlotKind::Immediate, 12, 4, true),
            ],
            row: 1,
        });
        table.insert(InstructionVariant {
            mnemonic: "MOV".to_string(),
            opcode_size_bits: 32,
            base_opcode: 0x0000_003B,
            slots: vec![
                Slot::field(SlotKind::DataRegister, 8, 4, false),
                Slot::field(SlotKind::Immediate, 12, 16, true),
            ],
            row: 2,
        });
        let symbols = SymbolTable::new();
        let loc = SourceLocation::default();
        let _ = &loc;
        let operands = vec![Operand::Register(crate::ast::RegisterRef::new(RegisterBank::D, 4)), Operand::immediate(1)];
        let sel = select_variant(
            &table,
            "MOV",
            &operands,
            0,
            &symbols,
            SelectorOptions::default(),
            UnresolvedPolicy::Strict,
            0,
        )
        .unwrap();
        assert_eq!(sel.variant.opcode_size_bits, 16);

        let operands32 = vec![Operand::Register(crate::ast::RegisterRef::new(RegisterBank::D, 4)), Operand::immediate(256)];
        let sel32 = select_variant(
            &table,
            "MOV",
            &operands32,
            0,
            &symbols,
            SelectorOptions::default(),
            UnresolvedPolicy::Strict,
            0,
        )
        .unwrap();
        assert_eq!(sel32.variant.opcode_size_bits, 32);
    }

    #[test]
    fn unresolved_label_in_pass1_prefers_largest() {
        let table = table_with_j_variants();
        let symbols = SymbolTable::new();
        let operands = vec![Operand::LabelRef {
            name: "forward".to_string(),
            offset: 0,
            high_low: HighLow::None,
        }];
        let sel = select_variant(
            &table,
            "J",
            &operands,
            0x1000,
            &symbols,
            SelectorOptions::default(),
            UnresolvedPolicy::PreferLargest,
            0,
        )
        .unwrap();
        assert_eq!(sel.variant.opcode_size_bits, 32);
    }
}
