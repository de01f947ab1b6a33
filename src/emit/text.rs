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

//! Text-dump emitter. One line per emitted
//! statement: an 8-hex-digit address, then the statement's bytes printed as
//! whole 16-bit half-words concatenated most-significant-byte-first — the
//! deliberate exception to this crate's otherwise little-endian-by-default
//! memory order, independent of `endianness`.

use crate::assembler::AssembledProgram;
use crate::assembler::encoder::Endianness;

pub fn emit_text_dump(program: &AssembledProgram, endianness: Endianness) -> String {
    let mut lines = Vec::new();
    for stmt in &program.statements {
        if stmt.bytes.is_empty() {
            continue;
        }
        lines.push(format!(
            "{:08X} {}",
            stmt.address,
            half_words_big_endian_text(&stmt.bytes, endianness)
        ));
    }
    lines.join("\n")
}

/// Reads `bytes` as a sequence of memory-order 16-bit half-words (honouring
/// `endianness`) and prints each one MSB-first, concatenated with no
/// separator. A trailing odd byte (data directives are not required to be
/// half-word aligned) is printed as a single two-digit hex byte.
fn half_words_big_endian_text(bytes: &[u8], endianness: Endianness) -> String {
    let mut chunks = bytes.chunks_exact(2);
    let mut half_words: Vec<String> = chunks
        .by_ref()
        .map(|pair| {
            let half_word = if endianness.is_little() {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            };
            format!("{:04X}", half_word)
        })
        .collect();
    // little-endian memory order stores the least-significant half-word
    // first; reversing recovers the most-to-least ordering a single
    // big-endian integer would print in.
    if endianness.is_little() {
        half_words.reverse();
    }
    let mut out = half_words.join("");
    for leftover in chunks.remainder() {
        out.push_str(&format!("{:02X}", leftover));
    }
    out
}
