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

//! Pass-1 address seeding and pass-2 size-fixpoint iteration,
//! tying the symbol table (`crate::symtab`), the variant selector, and the
//! encoder together into one assembled program.

pub mod encoder;
pub mod fit;
pub mod selector;

use crate::ast::{DataWidth, Operand, Statement, StatementKind};
use crate::errors::{AssemblyError, ErrorKind, SourceLocation};
use crate::parser::expr::apply_high_low;
use crate::symtab::{align_up, SectionTracker, Section, SymbolTable};
use crate::table::InstructionTable;

use encoder::Endianness;
use selector::{select_variant, SelectorOptions, Selection, UnresolvedPolicy};

/// The maximum number of fixpoint iterations before giving up.
const MAX_FIXPOINT_ITERATIONS: usize = 256;

/// One statement's final emitted form, used by every output emitter.
#[derive(Debug, Clone)]
pub struct EmittedStatement {
    pub address: u64,
    pub bytes: Vec<u8>,
    pub location: SourceLocation,
    pub raw_text: String,
}

/// The fully assembled program: final byte layout, symbol table, and
/// section list, ready for the output emitters.
#[derive(Debug)]
pub struct AssembledProgram {
    pub statements: Vec<EmittedStatement>,
    pub symbols: SymbolTable,
    pub sections: Vec<Section>,
}

/// Runs the full pipeline: pass-1 seeding, pass-2 fixpoint, final encoding
///. `statements` must already have diagnostics-free
/// lexical/operand structure (the parser's job); this stage raises
/// `AssemblyError` directly since it is non-recoverable.
pub fn assemble(
    statements: &[Statement],
    table: &InstructionTable,
    options: SelectorOptions,
    endianness: Endianness,
) -> Result<AssembledProgram, AssemblyError> {
    let mut symbols = SymbolTable::new();

    // `.global` may be declared before or after the label it names, so the
    // full set is collected up front rather than threaded through the walk.
    let globals = collect_global_names(statements);

    // Pass 1: address seeding, optimistic/"prefer largest" sizing.
    let mut sizes = vec![0u32; statements.len()];
    let (_addresses, _tracker) = walk(
        statements,
        &mut sizes,
        &mut symbols,
        table,
        options,
        UnresolvedPolicy::PreferLargest,
        true,
        &vec![0u32; statements.len()],
        &globals,
    )?;

    // Pass 2: fixpoint. Re-walk with the committed size as a floor so no
    // statement ever shrinks.
    let mut iterations = 0;
    loop {
        let previous_sizes = sizes.clone();
        let (_addresses, _tracker) = walk(
            statements,
            &mut sizes,
            &mut symbols,
            table,
            options,
            UnresolvedPolicy::Strict,
            false,
            &previous_sizes,
            &globals,
        )?;
        iterations += 1;
        if sizes == previous_sizes {
            break;
        }
        if iterations > MAX_FIXPOINT_ITERATIONS {
            return Err(AssemblyError::new(
                ErrorKind::DirectiveError,
                SourceLocation::default(),
                "fixpoint iteration did not converge".to_string(),
            ));
        }
    }

    // Final walk: the definitive address assignment, and the section
    // overlap check performed once, after convergence.
    let floor = sizes.clone();
    let (addresses, tracker) = walk(
        statements,
        &mut sizes,
        &mut symbols,
        table,
        options,
        UnresolvedPolicy::Strict,
        false,
        &floor,
        &globals,
    )?;
    let final_cursor = addresses
        .last()
        .zip(sizes.last())
        .map(|(a, s)| a + *s as u64)
        .unwrap_or(0);
    let sections = tracker.finish(final_cursor)?;

    let mut emitted = Vec::with_capacity(statements.len());
    for (stmt, address) in statements.iter().zip(addresses.iter()) {
        let bytes = emit_bytes(&stmt.kind, *address, table, &symbols, options, endianness, &stmt.location)?;
        emitted.push(EmittedStatement {
            address: *address,
            bytes,
            location: stmt.location.clone(),
            raw_text: stmt.raw_text.clone(),
        });
    }

    Ok(AssembledProgram {
        statements: emitted,
        symbols,
        sections,
    })
}

/// Collects every name named by a `.global` directive anywhere in the
/// program, regardless of whether the directive appears before or after the
/// label it refers to.
fn collect_global_names(statements: &[Statement]) -> std::collections::HashSet<String> {
    statements
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StatementKind::Global { name } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

/// One address-assignment walk over every statement. Shared by pass 1, every fixpoint iteration, and the final walk;
/// `define_mode` selects whether labels are inserted fresh (`true`, pass 1)
/// or merely repositioned (`false`, later passes — they already exist).
#[allow(clippy::too_many_arguments)]
fn walk(
    statements: &[Statement],
    sizes: &mut [u32],
    symbols: &mut SymbolTable,
    table: &InstructionTable,
    options: SelectorOptions,
    unresolved: UnresolvedPolicy,
    define_mode: bool,
    min_sizes: &[u32],
    globals: &std::collections::HashSet<String>,
) -> Result<(Vec<u64>, SectionTracker), AssemblyError> {
    let mut cursor: u64 = 0;
    let mut tracker = SectionTracker::new();
    let mut addresses = Vec::with_capacity(statements.len());

    for (idx, stmt) in statements.iter().enumerate() {
        match &stmt.kind {
            StatementKind::Origin { address } => {
                let addr = resolve_constant(address, symbols, &stmt.location)?;
                tracker.origin(addr as u64);
                cursor = addr as u64;
            }
            StatementKind::Section { name } => {
                tracker.section(name, cursor);
            }
            StatementKind::Align { boundary } => {
                cursor = align_up(cursor, *boundary as u64);
            }
            _ => {}
        }

        if let Some(label) = &stmt.label {
            if define_mode {
                symbols.define(
                    label,
                    cursor,
                    globals.contains(label),
                    false,
                    tracker.current_section_name().map(|s| s.to_string()),
                    stmt.location.clone(),
                )?;
            } else {
                symbols.set_address(label, cursor);
            }
        }
        if let StatementKind::Equate { name, value } = &stmt.kind {
            let v = resolve_constant(value, symbols, &stmt.location)? as u64;
            if define_mode {
                symbols.define(name, v, false, true, None, stmt.location.clone())?;
            } else {
                symbols.set_address(name, v);
            }
        }

        addresses.push(cursor);
        let size = statement_size(
            &stmt.kind,
            table,
            cursor,
            symbols,
            options,
            unresolved,
            min_sizes[idx],
            &stmt.location,
        )?;
        sizes[idx] = size;
        cursor += size as u64;
    }

    Ok((addresses, tracker))
}

fn statement_size(
    kind: &StatementKind,
    table: &InstructionTable,
    pc: u64,
    symbols: &SymbolTable,
    options: SelectorOptions,
    unresolved: UnresolvedPolicy,
    min_size_bytes: u32,
    location: &SourceLocation,
) -> Result<u32, AssemblyError> {
    match kind {
        StatementKind::Instruction { mnemonic, operands } => {
            match select_variant(table, mnemonic, operands, pc, symbols, options, unresolved, min_size_bytes) {
                Ok(sel) => Ok(sel.variant.size_bytes()),
                Err(eliminations) => Err(no_candidate_error(mnemonic, table, location, &eliminations)),
            }
        }
        StatementKind::Data { width, values } => Ok(values.len() as u32 * width.size_bytes()),
        StatementKind::Reserve { bytes } => Ok(*bytes),
        StatementKind::Times { count, inner } => {
            let inner_size = statement_size(inner, table, pc, symbols, options, unresolved, 0, location)?;
            Ok(count * inner_size)
        }
        _ => Ok(0),
    }
}

fn no_candidate_error(
    mnemonic: &str,
    table: &InstructionTable,
    location: &SourceLocation,
    eliminations: &[selector::Elimination],
) -> AssemblyError {
    if !table.contains_mnemonic(mnemonic) {
        return AssemblyError::new(
            ErrorKind::UnknownMnemonic,
            location.clone(),
            format!("unknown mnemonic {:?}", mnemonic),
        );
    }
    let mut message = format!("no variant of {:?} matches these operands:", mnemonic);
    for e in eliminations {
        message.push_str(&format!("\n  row {}: {}", e.row, e.reason));
    }
    let kind = if eliminations.is_empty() {
        ErrorKind::InvalidOperand
    } else {
        ErrorKind::OperandOutOfRange
    };
    AssemblyError::new(kind, location.clone(), message)
}

/// Resolves an `Origin`/`Equate`/data-value expression to a plain integer,
/// applying `HI:`/`LO:` if present. Only `Immediate` and already-defined
/// `LabelRef` operands are legal here.
fn resolve_constant(operand: &Operand, symbols: &SymbolTable, location: &SourceLocation) -> Result<i64, AssemblyError> {
    match operand {
        Operand::Immediate { value, high_low } => Ok(apply_high_low(*value, *high_low)),
        Operand::LabelRef { name, offset, high_low } => {
            let sym = symbols.get(name).ok_or_else(|| {
                AssemblyError::new(
                    ErrorKind::UnresolvedSymbol,
                    location.clone(),
                    format!("undefined symbol {:?}", name),
                )
            })?;
            Ok(apply_high_low(sym.address as i64 + offset, *high_low))
        }
        other => Err(AssemblyError::new(
            ErrorKind::DirectiveError,
            location.clone(),
            format!("expected an integer constant, found {:?}", other),
        )),
    }
}

fn emit_bytes(
    kind: &StatementKind,
    address: u64,
    table: &InstructionTable,
    symbols: &SymbolTable,
    options: SelectorOptions,
    endianness: Endianness,
    location: &SourceLocation,
) -> Result<Vec<u8>, AssemblyError> {
    match kind {
        StatementKind::Instruction { mnemonic, operands } => {
            let Selection { variant, slot_values } =
                select_variant(table, mnemonic, operands, address, symbols, options, UnresolvedPolicy::Strict, 0)
                    .map_err(|e| no_candidate_error(mnemonic, table, location, &e))?;
            let word = encoder::encode_word(variant, &slot_values);
            Ok(encoder::word_to_bytes(word, variant.opcode_size_bits, endianness))
        }
        StatementKind::Data { width, values } => {
            let mut bytes = Vec::with_capacity(values.len() * width.size_bytes() as usize);
            for v in values {
                let value = resolve_constant(v, symbols, location)?;
                bytes.extend(value_to_bytes(value, *width, endianness));
            }
            Ok(bytes)
        }
        StatementKind::Reserve { bytes } => Ok(vec![0u8; *bytes as usize]),
        StatementKind::Align { .. } => {
            // Padding length is implicit in the gap between this
            // statement's recorded address and the next; recomputed here
            // from `statement_size`, which for `Align` is always 0 — the
            // actual pad bytes are produced by whichever zero-size gap the
            // cursor jumped, so nothing is emitted for the directive line
            // itself. The jump is realised by subsequent statements simply
            // starting at the rounded-up address.
            Ok(Vec::new())
        }
        StatementKind::Times { count, inner } => {
            let mut bytes = Vec::new();
            let mut pc = address;
            for _ in 0..*count {
                let chunk = emit_bytes(inner, pc, table, symbols, options, endianness, location)?;
                pc += chunk.len() as u64;
                bytes.extend(chunk);
            }
            Ok(bytes)
        }
        _ => Ok(Vec::new()),
    }
}

fn value_to_bytes(value: i64, width: DataWidth, endianness: Endianness) -> Vec<u8> {
    match width {
        DataWidth::Byte => vec![value as u8],
        DataWidth::Word => encoder::write_u16(value as u16, endianness).to_vec(),
        DataWidth::DWord => encoder::write_u32(value as u32, endianness).to_vec(),
        DataWidth::QWord => {
            let v = value as u64;
            if endianness.is_little() {
                v.to_le_bytes().to_vec()
            } else {
                v.to_be_bytes().to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{HighLow, RegisterBank, RegisterRef};
    use crate::errors::SourceLocation;
    use crate::table::{InstructionVariant, Slot, SlotKind};

    fn loc(line: usize) -> SourceLocation {
        SourceLocation::new("t.s", line, 1)
    }

    fn j_table() -> InstructionTable {
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
    fn sixteen_vs_thirty_two_bit_jump_selection() {
        // spec §8 scenario 4.
        let table = j_table();
        let statements = vec![
            Statement {
                label: None,
                kind: StatementKind::Origin { address: Operand::immediate(0x8000_0000) },
                location: loc(1),
                raw_text: String::new(),
            },
            Statement {
                label: None,
                kind: StatementKind::Instruction {
                    mnemonic: "J".to_string(),
                    operands: vec![Operand::immediate(0x8000_0000 + 0xFE)],
                },
                location: loc(2),
                raw_text: String::new(),
            },
            Statement {
                label: None,
                kind: StatementKind::Instruction {
                    mnemonic: "J".to_string(),
                    operands: vec![Operand::immediate(0x8000_0200)],
                },
                location: loc(3),
                raw_text: String::new(),
            },
        ];
        let program = assemble(&statements, &table, SelectorOptions::default(), Endianness::Little).unwrap();
        assert_eq!(program.statements[1].address, 0x8000_0000);
        assert_eq!(program.statements[1].bytes.len(), 2);
        assert_eq!(program.statements[2].address, 0x8000_0002);
        assert_eq!(program.statements[2].bytes.len(), 4);
    }

    #[test]
    fn forward_label_fixpoint_converges() {
        let table = j_table();
        let statements = vec![
            Statement {
                label: None,
                kind: StatementKind::Origin { address: Operand::immediate(0) },
                location: loc(1),
                raw_text: String::new(),
            },
            Statement {
                label: None,
                kind: StatementKind::Instruction {
                    mnemonic: "J".to_string(),
                    operands: vec![Operand::LabelRef {
                        name: "target".to_string(),
                        offset: 0,
                        high_low: HighLow::None,
                    }],
                },
                location: loc(2),
                raw_text: String::new(),
            },
            Statement {
                label: None,
                kind: StatementKind::Reserve { bytes: 300 },
                location: loc(3),
                raw_text: String::new(),
            },
            Statement {
                label: Some("target".to_string()),
                kind: StatementKind::Empty,
                location: loc(4),
                raw_text: String::new(),
            },
        ];
        let program = assemble(&statements, &table, SelectorOptions::default(), Endianness::Little).unwrap();
        let jump = &program.statements[1];
        assert_eq!(jump.bytes.len(), 4, "displacement of 300+ must need the 32-bit variant");
        let target_addr = program.symbols.get("target").unwrap().address;
        assert_eq!(target_addr, jump.address + jump.bytes.len() as u64 + 300);
    }

    #[test]
    fn db_emits_little_endian_bytes() {
        let table = InstructionTable::new();
        let statements = vec![Statement {
            label: None,
            kind: StatementKind::Data {
                width: DataWidth::Byte,
                values: vec![
                    Operand::immediate(0xAB),
                    Operand::immediate(0o253),
                    Operand::immediate(0b1010_1011),
                    Operand::immediate(171),
                    Operand::immediate(171),
                ],
            },
            location: loc(1),
            raw_text: String::new(),
        }];
        let program = assemble(&statements, &table, SelectorOptions::default(), Endianness::Little).unwrap();
        assert_eq!(program.statements[0].bytes, vec![0xAB; 5]);
    }

    #[test]
    fn global_directive_marks_the_symbol_global() {
        let table = InstructionTable::new();
        let statements = vec![
            Statement {
                label: None,
                kind: StatementKind::Global { name: "exported".to_string() },
                location: loc(1),
                raw_text: String::new(),
            },
            Statement {
                label: Some("exported".to_string()),
                kind: StatementKind::Empty,
                location: loc(2),
                raw_text: String::new(),
            },
            Statement {
                label: Some("local_only".to_string()),
                kind: StatementKind::Empty,
                location: loc(3),
                raw_text: String::new(),
            },
        ];
        let program = assemble(&statements, &table, SelectorOptions::default(), Endianness::Little).unwrap();
        assert!(program.symbols.get("exported").unwrap().is_global);
        assert!(!program.symbols.get("local_only").unwrap().is_global);
    }

    #[test]
    fn register_operand_mismatch_is_reported() {
        let table = j_table();
        let statements = vec![Statement {
            label: None,
            kind: StatementKind::Instruction {
                mnemonic: "J".to_string(),
                operands: vec![Operand::Register(RegisterRef::new(RegisterBank::D, 4))],
            },
            location: loc(1),
            raw_text: String::new(),
        }];
        let result = assemble(&statements, &table, SelectorOptions::default(), Endianness::Little);
        assert!(result.is_err());
    }
}
