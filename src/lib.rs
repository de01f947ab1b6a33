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

pub mod assembler;
pub mod ast;
pub mod config;
pub mod emit;
pub mod errors;
pub mod file_reader;
pub mod parser;
pub mod preprocess;
pub mod symtab;
pub mod table;

use std::path::Path;

use assembler::encoder::Endianness;
use assembler::selector::SelectorOptions;
use assembler::AssembledProgram;
use ast::{DataWidth, Operand, Statement, StatementKind};
use errors::{AssemblyError, Diagnostic, DiagnosticCounts, ErrorKind, SourceLocation};
use file_reader::FileReader;
use preprocess::MacroEnv;
use table::InstructionTable;

extern crate pest;
extern crate pest_derive;

/// Everything one call to [`assemble_source`] produces: whatever
/// diagnostics the parse accumulated, and the assembled program if the
/// parse had no fatal diagnostic.
pub struct PipelineOutput {
    pub diagnostics: Vec<Diagnostic>,
    pub program: Option<AssembledProgram>,
}

impl PipelineOutput {
    pub fn counts(&self) -> DiagnosticCounts {
        DiagnosticCounts::tally(&self.diagnostics)
    }
}

/// Runs one source file through the whole pipeline: optional macro
/// preprocessing, parsing,
/// and the fixpoint assembler/linker. This is the single
/// entry point `main.rs` drives for each `-f`/`-l`/`--map` invocation; which
/// outputs get written from the resulting `AssembledProgram` is the `emit`
/// module's job, not this one's.
#[allow(clippy::too_many_arguments)]
pub fn assemble_source<F: FileReader>(
    reader: &F,
    source_path: &Path,
    table: &InstructionTable,
    options: SelectorOptions,
    endianness: Endianness,
    macro_env: &mut MacroEnv,
    enable_macros: bool,
) -> Result<PipelineOutput, AssemblyError> {
    let raw_text = reader.read_to_string(source_path).map_err(|e| {
        AssemblyError::new(
            ErrorKind::DirectiveError,
            SourceLocation::new(source_path, 0, 0),
            format!("failed to read source file: {e}"),
        )
    })?;

    let source_text = if enable_macros {
        let (expanded, _next_counter) = preprocess::preprocess(&raw_text, macro_env, 0)?;
        expanded
    } else {
        raw_text
    };

    let (statements, diagnostics) = parser::parse_source(&source_text, source_path);
    if diagnostics.iter().any(Diagnostic::is_fatal) {
        return Ok(PipelineOutput {
            diagnostics,
            program: None,
        });
    }

    let statements = resolve_incbin(statements, reader)?;

    let program = assembler::assemble(&statements, table, options, endianness)?;
    Ok(PipelineOutput {
        diagnostics,
        program: Some(program),
    })
}

/// Resolves every `INCBIN` statement into an inline byte-`Data` statement
/// before the assembler ever sees it, reading the referenced file through
/// the same `FileReader` used for the source itself. Kept as a pipeline
/// step rather than folded into the parser since the parser has no file
/// access of its own.
fn resolve_incbin<F: FileReader>(statements: Vec<Statement>, reader: &F) -> Result<Vec<Statement>, AssemblyError> {
    statements
        .into_iter()
        .map(|stmt| match &stmt.kind {
            StatementKind::Include { path } => {
                let bytes = reader.read_binary(Path::new(path)).map_err(|e| {
                    AssemblyError::new(
                        ErrorKind::DirectiveError,
                        stmt.location.clone(),
                        format!("failed to read INCBIN file {:?}: {e}", path),
                    )
                })?;
                let values = bytes.into_iter().map(|b| Operand::immediate(b as i64)).collect();
                Ok(Statement {
                    kind: StatementKind::Data {
                        width: DataWidth::Byte,
                        values,
                    },
                    ..stmt
                })
            }
            _ => Ok(stmt),
        })
        .collect()
}
