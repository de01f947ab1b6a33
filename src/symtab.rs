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

//! Symbol table and section/origin bookkeeping. Generalised from a single flat address counter into named
//! sections, since TriCore sources use `.ORG`/`.sect` rather than a fixed
//! bank model.

use std::collections::HashMap;

use crate::errors::{AssemblyError, ErrorKind, SourceLocation};

/// One resolved (or not-yet-resolved) symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub address: u64,
    pub is_defined: bool,
    pub is_global: bool,
    pub is_constant: bool,
    pub section: Option<String>,
    pub defined_at: SourceLocation,
}

/// A contiguous origin-based address range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a new symbol, or errors if one with this name already
    /// exists.
    pub fn define(
        &mut self,
        name: &str,
        address: u64,
        is_global: bool,
        is_constant: bool,
        section: Option<String>,
        location: SourceLocation,
    ) -> Result<(), AssemblyError> {
        if self.symbols.contains_key(name) {
            return Err(AssemblyError::new(
                ErrorKind::DuplicateSymbol,
                location,
                format!("symbol {:?} is already defined", name),
            ));
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                address,
                is_defined: true,
                is_global,
                is_constant,
                section,
                defined_at: location,
            },
        );
        Ok(())
    }

    /// Updates an already-inserted symbol's address, used by the fixpoint
    /// pass when statement addresses shift.
    pub fn set_address(&mut self, name: &str, address: u64) {
        if let Some(sym) = self.symbols.get_mut(name) {
            sym.address = address;
        }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.symbols.get(name).map(|s| s.is_defined).unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Symbol)> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Tracks the active address cursor across `.ORG`/`.sect`/`.align`
/// directives during pass 1 and each fixpoint re-walk.
#[derive(Debug, Default)]
pub struct SectionTracker {
    sections: Vec<Section>,
    current_name: Option<String>,
    current_start: u64,
}

impl SectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `.ORG addr`: starts a fresh anonymous section at `addr`.
    pub fn origin(&mut self, addr: u64) {
        self.close_current(addr);
        self.current_name = None;
        self.current_start = addr;
    }

    /// `.section name` / `.sect name`: starts a named section continuing
    /// from the current address.
    pub fn section(&mut self, name: &str, current_addr: u64) {
        self.close_current(current_addr);
        self.current_name = Some(name.to_string());
        self.current_start = current_addr;
    }

    fn close_current(&mut self, end_addr: u64) {
        if end_addr > self.current_start {
            self.sections.push(Section {
                name: self.current_name.clone().unwrap_or_else(|| "default".to_string()),
                start: self.current_start,
                end: end_addr,
            });
        }
    }

    pub fn current_section_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    /// Finalises bookkeeping at end-of-program and returns the recorded
    /// sections, checking for overlaps.
    pub fn finish(mut self, final_addr: u64) -> Result<Vec<Section>, AssemblyError> {
        self.close_current(final_addr);
        let mut sorted = self.sections.clone();
        sorted.sort_by_key(|s| s.start);
        for pair in sorted.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.end > b.start {
                return Err(AssemblyError::new(
                    ErrorKind::AddressOverlap,
                    SourceLocation::default(),
                    format!(
                        "section {:?} ({:#x}..{:#x}) overlaps section {:?} ({:#x}..{:#x})",
                        a.name, a.start, a.end, b.name, b.start, b.end
                    ),
                ));
            }
        }
        Ok(self.sections)
    }
}

/// Rounds `addr` up to the next multiple of `boundary`.
pub fn align_up(addr: u64, boundary: u64) -> u64 {
    if boundary == 0 {
        return addr;
    }
    let rem = addr % boundary;
    if rem == 0 {
        addr
    } else {
        addr + (boundary - rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new("t.s", 1, 1)
    }

    #[test]
    fn rejects_duplicate_symbol() {
        let mut table = SymbolTable::new();
        table.define("foo", 0x100, false, false, None, loc()).unwrap();
        let err = table.define("foo", 0x200, false, false, None, loc());
        assert!(err.is_err());
    }

    #[test]
    fn align_rounds_up() {
        assert_eq!(align_up(0x1001, 4), 0x1004);
        assert_eq!(align_up(0x1000, 4), 0x1000);
        assert_eq!(align_up(0x1000, 0), 0x1000);
    }

    #[test]
    fn detects_overlapping_sections() {
        let mut tracker = SectionTracker::new();
        tracker.origin(0x1000);
        tracker.origin(0x1008); // closes [0x1000, 0x1008)
        tracker.origin(0x1004); // overlaps the previous section
        let result = tracker.finish(0x1010);
        assert!(result.is_err());
    }

    #[test]
    fn non_overlapping_sections_pass() {
        let mut tracker = SectionTracker::new();
        tracker.origin(0x1000);
        tracker.origin(0x2000);
        let result = tracker.finish(0x2010).unwrap();
        assert_eq!(result.len(), 2);
    }
}
