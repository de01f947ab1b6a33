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

//! Drives the pest-based outer line grammar and the hand-rolled operand
//! normaliser to build a `Vec<Statement>`. Errors are
//! accumulated as `Diagnostic`s rather than short-circuiting: a bad line is reported, parsing continues on the
//! next line, and the driver checks for fatal diagnostics before going on
//! to the selector/emitter.

pub mod expr;
pub mod numeric;
pub mod operand_normalizer;

use std::path::Path;

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::ast::{DataWidth, HighLow, Operand, RegisterBank, RegisterRef, Statement, StatementKind};
use crate::errors::{Diagnostic, ErrorKind, SourceLocation};

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct TcAsmParser;

/// Directive names with no leading `.` that the bare-word `instruction`
/// grammar rule also matches.
const BARE_DIRECTIVES: &[&str] = &[
    "DB", "DW", "DD", "DQ", "RESB", "RESW", "RESD", "RESQ", "EQU", "TIMES", "INCBIN",
];

/// Parses one whole source file's text (already macro-expanded) into
/// statements plus accumulated diagnostics. Local (`.L`-prefixed or purely
/// numeric) labels are disambiguated by a suffix derived from this file's
/// identity alone, and the same suffix is applied to both a local label's
/// definition and every reference to it, so a definition/reference pair
/// like `.L1: ... j .L1` still resolves against one symbol.
pub fn parse_source(text: &str, file: &Path) -> (Vec<Statement>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut statements = Vec::new();
    let suffix = file_identity_suffix(file);

    let pairs = match TcAsmParser::parse(Rule::program, text) {
        Ok(p) => p,
        Err(e) => {
            diagnostics.push(Diagnostic::error(
                ErrorKind::LexError,
                SourceLocation::new(file, 1, 1),
                format!("{e}"),
            ));
            return (statements, diagnostics);
        }
    };

    for line_pair in pairs {
        if line_pair.as_rule() != Rule::line {
            continue;
        }
        let (line_num, _) = line_pair.as_span().start_pos().line_col();
        let location = SourceLocation::new(file, line_num, 1);
        let raw_text = line_pair.as_str().trim().to_string();

        match build_statement(line_pair, &location, &suffix) {
            Ok(Some(mut stmt)) => {
                stmt.raw_text = raw_text;
                statements.push(stmt);
            }
            Ok(None) => {}
            Err(diag) => diagnostics.push(diag),
        }
    }

    for stmt in statements.iter_mut() {
        rewrite_kind_local_refs(&mut stmt.kind, &suffix);
    }

    (statements, diagnostics)
}

fn build_statement(
    line_pair: Pair<Rule>,
    location: &SourceLocation,
    suffix: &str,
) -> Result<Option<Statement>, Diagnostic> {
    let mut label = None;
    let mut kind = StatementKind::Empty;

    for pair in line_pair.into_inner() {
        match pair.as_rule() {
            Rule::label => {
                let ident = pair.into_inner().next().unwrap().as_str();
                label = Some(normalize_label(ident, suffix));
            }
            Rule::line_body => {
                kind = build_line_body(pair, location, label.as_deref())?;
            }
            _ => {}
        }
    }

    if label.is_none() && matches!(kind, StatementKind::Empty) {
        return Ok(None);
    }

    // An `EQU` statement carries its name inside `StatementKind::Equate`
    // rather than `Statement::label`, since it defines a constant, not an
    // address-valued symbol at the current position.
    if matches!(kind, StatementKind::Equate { .. }) {
        label = None;
    }

    Ok(Some(Statement {
        label,
        kind,
        location: location.clone(),
        raw_text: String::new(),
    }))
}

/// Rewrites GCC-style locals (`.L1`, `1:`) uniquely per file. Only
/// purely numeric labels and `.L`-prefixed labels are considered local;
/// everything else passes through unchanged. The rewrite is a pure
/// function of `(ident, suffix)`, so calling it again on a reference to
/// the same local name in the same file reproduces the exact string the
/// definition was given.
fn normalize_label(ident: &str, suffix: &str) -> String {
    if is_local_label(ident) {
        local_label_name(ident, suffix)
    } else {
        ident.to_string()
    }
}

fn is_local_label(ident: &str) -> bool {
    ident.chars().all(|c| c.is_ascii_digit()) || ident.starts_with(".L")
}

fn local_label_name(ident: &str, suffix: &str) -> String {
    format!("__local_{}_{}", ident.trim_start_matches('.'), suffix)
}

/// Derives a per-file suffix for local-label renaming from the file's path
/// alone (FNV-1a over the path string) so that re-parsing the same file
/// always assigns the same suffix, and two different files never collide.
fn file_identity_suffix(file: &Path) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in file.to_string_lossy().as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{:08x}", hash & 0xFFFF_FFFF)
}

/// Rewrites every local-style `LabelRef` reachable from `kind` to match the
/// renaming already applied to local label definitions, so a reference
/// like `j .L1` resolves against the symbol table entry `.L1`'s definition
/// was rewritten to.
fn rewrite_kind_local_refs(kind: &mut StatementKind, suffix: &str) {
    match kind {
        StatementKind::Instruction { operands, .. } => {
            for op in operands.iter_mut() {
                rewrite_operand_local_refs(op, suffix);
            }
        }
        StatementKind::Data { values, .. } => {
            for op in values.iter_mut() {
                rewrite_operand_local_refs(op, suffix);
            }
        }
        StatementKind::Equate { value, .. } => rewrite_operand_local_refs(value, suffix),
        StatementKind::Origin { address } => rewrite_operand_local_refs(address, suffix),
        StatementKind::Times { inner, .. } => rewrite_kind_local_refs(inner, suffix),
        StatementKind::Reserve { .. }
        | StatementKind::Section { .. }
        | StatementKind::Align { .. }
        | StatementKind::Global { .. }
        | StatementKind::Include { .. }
        | StatementKind::Empty => {}
    }
}

fn rewrite_operand_local_refs(op: &mut Operand, suffix: &str) {
    match op {
        Operand::LabelRef { name, .. } if is_local_label(name) => {
            *name = local_label_name(name, suffix);
        }
        Operand::Indexed { displacement, .. } => rewrite_operand_local_refs(displacement, suffix),
        _ => {}
    }
}

fn build_line_body(
    pair: Pair<Rule>,
    location: &SourceLocation,
    label: Option<&str>,
) -> Result<StatementKind, Diagnostic> {
    let inner = pair.into_inner().next();
    let Some(inner) = inner else {
        return Ok(StatementKind::Empty);
    };

    match inner.as_rule() {
        Rule::directive => {
            let mut parts = inner.into_inner();
            let name = parts.next().unwrap().as_str().to_string();
            let operand_text = parts.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            build_directive(&name, &operand_text, location, label)
        }
        Rule::instruction => {
            let mut parts = inner.into_inner();
            let mnemonic = parts.next().unwrap().as_str().to_string();
            let operand_text = parts.next().map(|p| p.as_str().to_string()).unwrap_or_default();
            let upper = mnemonic.to_ascii_uppercase();
            if BARE_DIRECTIVES.contains(&upper.as_str()) {
                build_directive(&upper, &operand_text, location, label)
            } else {
                let operands = parse_operand_list(&operand_text, location)?;
                Ok(StatementKind::Instruction {
                    mnemonic: upper,
                    operands,
                })
            }
        }
        _ => Ok(StatementKind::Empty),
    }
}

fn build_directive(
    name: &str,
    operand_text: &str,
    location: &SourceLocation,
    label: Option<&str>,
) -> Result<StatementKind, Diagnostic> {
    let upper = name.to_ascii_uppercase();
    match upper.as_str() {
        "ORG" => {
            let op = parse_single_expr(operand_text, location)?;
            Ok(StatementKind::Origin { address: op })
        }
        "SECTION" | "SECT" => Ok(StatementKind::Section {
            name: operand_text.trim().to_string(),
        }),
        "ALIGN" => {
            let n = parse_const_u32(operand_text, location)?;
            Ok(StatementKind::Align { boundary: n })
        }
        "GLOBAL" => Ok(StatementKind::Global {
            name: operand_text.trim().to_string(),
        }),
        "END" => Ok(StatementKind::Empty),
        "TYPE" | "SDECL" => Ok(StatementKind::Empty),
        "DB" => build_data(DataWidth::Byte, operand_text, location),
        "DW" => build_data(DataWidth::Word, operand_text, location),
        "DD" => build_data(DataWidth::DWord, operand_text, location),
        "DQ" => build_data(DataWidth::QWord, operand_text, location),
        "RESB" => build_reserve(1, operand_text, location),
        "RESW" => build_reserve(2, operand_text, location),
        "RESD" => build_reserve(4, operand_text, location),
        "RESQ" => build_reserve(8, operand_text, location),
        "EQU" => match label {
            Some(name) => {
                let value = parse_value_expr(operand_text.trim(), location)?;
                Ok(StatementKind::Equate {
                    name: name.to_string(),
                    value,
                })
            }
            None => Err(Diagnostic::error(
                ErrorKind::DirectiveError,
                location.clone(),
                "EQU directive must be attached to a label".to_string(),
            )),
        },
        "INCBIN" => Ok(StatementKind::Include {
            path: operand_text.trim().trim_matches('"').to_string(),
        }),
        "TIMES" => build_times(operand_text, location),
        other => Err(Diagnostic::error(
            ErrorKind::DirectiveError,
            location.clone(),
            format!("unrecognised directive {:?}", other),
        )),
    }
}

fn build_data(width: DataWidth, operand_text: &str, location: &SourceLocation) -> Result<StatementKind, Diagnostic> {
    let tokens = operand_normalizer::tokenize_operands(operand_text);
    let mut values = Vec::new();
    for token in tokens {
        if let Some(bytes) = numeric::parse_string_literal(&token) {
            for b in bytes {
                values.push(Operand::immediate(b as i64));
            }
            continue;
        }
        if let Some(b) = numeric::parse_char_literal(&token) {
            values.push(Operand::immediate(b as i64));
            continue;
        }
        values.push(parse_value_expr(&token, location)?);
    }
    Ok(StatementKind::Data { width, values })
}

fn build_reserve(unit_bytes: u32, operand_text: &str, location: &SourceLocation) -> Result<StatementKind, Diagnostic> {
    let count = parse_const_u32(operand_text, location)?;
    Ok(StatementKind::Reserve {
        bytes: count * unit_bytes,
    })
}

fn build_times(operand_text: &str, location: &SourceLocation) -> Result<StatementKind, Diagnostic> {
    let text = operand_text.trim();
    let split_at = text.find(char::is_whitespace).ok_or_else(|| {
        Diagnostic::error(
            ErrorKind::DirectiveError,
            location.clone(),
            "TIMES requires a count and an inner statement".to_string(),
        )
    })?;
    let (count_text, rest) = text.split_at(split_at);
    let count = parse_const_u32(count_text, location)?;
    let rest = rest.trim();

    let inner_pairs = TcAsmParser::parse(Rule::line, rest).map_err(|e| {
        Diagnostic::error(
            ErrorKind::DirectiveError,
            location.clone(),
            format!("TIMES inner statement failed to parse: {e}"),
        )
    })?;
    let line_pair = inner_pairs.into_iter().next().ok_or_else(|| {
        Diagnostic::error(
            ErrorKind::DirectiveError,
            location.clone(),
            "TIMES inner statement was empty".to_string(),
        )
    })?;
    let body_pair = line_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::line_body)
        .ok_or_else(|| {
            Diagnostic::error(
                ErrorKind::DirectiveError,
                location.clone(),
                "TIMES inner statement has no instruction or directive".to_string(),
            )
        })?;
    let inner = build_line_body(body_pair, location, None)?;
    Ok(StatementKind::Times {
        count,
        inner: Box::new(inner),
    })
}

fn parse_operand_list(operand_text: &str, location: &SourceLocation) -> Result<Vec<Operand>, Diagnostic> {
    let tokens = operand_normalizer::tokenize_operands(operand_text);
    let tokens = operand_normalizer::split_compound_operands(&tokens);
    let mut operands = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token.is_empty() {
            continue;
        }
        operands.push(parse_single_operand(&token, location)?);
    }
    Ok(operands)
}

fn parse_single_operand(token: &str, location: &SourceLocation) -> Result<Operand, Diagnostic> {
    if let Some((reg_text, off_text)) = operand_normalizer::split_post_increment(token) {
        let reg = parse_register(&reg_text, location)?.with_post_increment();
        if off_text.is_empty() {
            return Ok(Operand::Indexed {
                base: reg,
                displacement: Box::new(Operand::immediate(0)),
            });
        }
        let disp = parse_value_expr(&off_text, location)?;
        return Ok(Operand::Indexed {
            base: reg,
            displacement: Box::new(disp),
        });
    }

    if let Some(reg) = operand_normalizer::normalize_register_token(token) {
        return Ok(Operand::Register(parse_register_from_normalized(reg)));
    }

    if is_fixed_suffix(token) {
        return Ok(Operand::Fixed(token.to_ascii_uppercase()));
    }

    parse_value_expr(token, location)
}

fn is_fixed_suffix(token: &str) -> bool {
    matches!(
        token.to_ascii_uppercase().as_str(),
        "LL" | "UU" | "L" | "U" | "UL" | "LU"
    )
}

fn parse_register(token: &str, location: &SourceLocation) -> Result<RegisterRef, Diagnostic> {
    let normalized = operand_normalizer::normalize_register_token(token).ok_or_else(|| {
        Diagnostic::error(
            ErrorKind::InvalidOperand,
            location.clone(),
            format!("expected a register, found {:?}", token),
        )
    })?;
    Ok(parse_register_from_normalized(normalized))
}

fn parse_register_from_normalized(n: operand_normalizer::NormalizedRegisterToken) -> RegisterRef {
    let bank = match n.bank_char {
        'D' => RegisterBank::D,
        'A' => RegisterBank::A,
        'E' => RegisterBank::E,
        'P' => RegisterBank::P,
        _ => unreachable!("normalize_register_token only emits D/A/E/P"),
    };
    let index: u8 = n.index_text.parse().unwrap_or(0);
    let mut reg = RegisterRef::new(bank, index);
    if n.deref {
        reg = reg.derefed();
    }
    reg
}

/// Parses a single token as an expression operand.
fn parse_value_expr(token: &str, location: &SourceLocation) -> Result<Operand, Diagnostic> {
    let stripped = token.strip_prefix('#').unwrap_or(token);
    expr::parse_expression(stripped).map_err(|msg| {
        Diagnostic::error(ErrorKind::InvalidOperand, location.clone(), msg)
    })
}

fn parse_single_expr(operand_text: &str, location: &SourceLocation) -> Result<Operand, Diagnostic> {
    parse_value_expr(operand_text.trim(), location)
}

fn parse_const_u32(operand_text: &str, location: &SourceLocation) -> Result<u32, Diagnostic> {
    let text = operand_text.trim();
    numeric::parse_numeric_literal(text)
        .map(|v| v as u32)
        .ok_or_else(|| {
            Diagnostic::error(
                ErrorKind::NumericLiteralError,
                location.clone(),
                format!("expected an integer constant, found {:?}", text),
            )
        })
}
