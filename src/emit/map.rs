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

//! Map-file emitter: name / address / section / scope for
//! every symbol, sorted by address for readability.

use crate::assembler::AssembledProgram;

pub fn emit_map(program: &AssembledProgram) -> String {
    let mut entries: Vec<_> = program.symbols.iter().collect();
    entries.sort_by_key(|(_, sym)| sym.address);

    let mut lines = vec!["name                             address   section          scope".to_string()];
    for (name, symbol) in entries {
        let section = symbol.section.as_deref().unwrap_or("-");
        let scope = if symbol.is_global { "global" } else { "local" };
        lines.push(format!(
            "{:<32} {:08X}  {:<16} {}",
            name, symbol.address, section, scope
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceLocation;
    use crate::symtab::SymbolTable;

    #[test]
    fn sorts_by_address_and_shows_section_and_scope() {
        let mut symbols = SymbolTable::new();
        symbols
            .define("late", 0x2000, false, false, Some("text".to_string()), SourceLocation::new("t.s", 2, 1))
            .unwrap();
        symbols
            .define("early", 0x1000, true, false, Some("text".to_string()), SourceLocation::new("t.s", 1, 1))
            .unwrap();
        let program = AssembledProgram {
            statements: Vec::new(),
            symbols,
            sections: Vec::new(),
        };
        let map = emit_map(&program);
        let early_pos = map.find("early").unwrap();
        let late_pos = map.find("late").unwrap();
        assert!(early_pos < late_pos);
        assert!(map.contains("global"));
        assert!(map.contains("local"));
    }
}
