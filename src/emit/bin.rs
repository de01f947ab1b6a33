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

//! Flat binary emitter: one contiguous byte blob
//! spanning the lowest to highest emitted address, with zero-filled gaps.

use crate::assembler::AssembledProgram;

/// Concatenates every statement's bytes in address order, padding any gap
/// between consecutive statements (e.g. a `.ORG` jump) with zero bytes.
/// Returns an empty vector for a program that emitted nothing.
pub fn emit_binary(program: &AssembledProgram) -> Vec<u8> {
    let Some(first) = program.statements.iter().find(|s| !s.bytes.is_empty()) else {
        return Vec::new();
    };
    let base = first.address;
    let end = program
        .statements
        .iter()
        .map(|s| s.address + s.bytes.len() as u64)
        .max()
        .unwrap_or(base);

    let mut out = vec![0u8; (end - base) as usize];
    for stmt in &program.statements {
        if stmt.bytes.is_empty() {
            continue;
        }
        let offset = (stmt.address - base) as usize;
        out[offset..offset + stmt.bytes.len()].copy_from_slice(&stmt.bytes);
    }
    out
}
