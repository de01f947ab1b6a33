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

//! Listing emitter: one line per source statement
//! with its address and emitted bytes in memory order, followed by a
//! trailing symbol table block (the `-l` flag, spec §6).

use crate::assembler::AssembledProgram;

pub fn emit_listing(program: &AssembledProgram) -> String {
    let mut lines = Vec::new();
    for stmt in &program.statements {
        let byte_text = stmt
            .bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!(
            "{:08X}  {:<24}  {}",
            stmt.address, byte_text, stmt.raw_text
        ));
    }

    lines.push(String::new());
    lines.push("Symbols:".to_string());
    let mut symbols: Vec<_> = program.symbols.iter().collect();
    symbols.sort_by(|a, b| a.0.cmp(b.0));
    for (name, symbol) in symbols {
        let scope = if symbol.is_global { "global" } else { "local" };
        lines.push(format!("  {:08X}  {:<6}  {}", symbol.address, scope, name));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::EmittedStatement;
    use crate::errors::SourceLocation;
    use crate::symtab::SymbolTable;

    #[test]
    fn lists_bytes_and_source_then_symbols() {
        let mut symbols = SymbolTable::new();
        symbols
            .define("start", 0x1000, true, false, None, SourceLocation::new("t.s", 1, 1))
            .unwrap();
        let program = AssembledProgram {
            statements: vec![EmittedStatement {
                address: 0x1000,
                bytes: vec![0x00, 0x82],
                location: SourceLocation::new("t.s", 1, 1),
                raw_text: "start: mov d4, #1".to_string(),
            }],
            symbols,
            sections: Vec::new(),
        };
        let listing = emit_listing(&program);
        assert!(listing.contains("00001000"));
        assert!(listing.contains("00 82"));
        assert!(listing.contains("start: mov d4, #1"));
        assert!(listing.contains("Symbols:"));
        assert!(listing.contains("global  start"));
    }
}
