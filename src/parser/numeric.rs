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

//! Numeric-literal parsing. Every supported base/suffix combination reduces
//! to the same canonical `i64`; negation is applied after base parsing, so
//! `0xAB`, `0o253`, `0b10101011`, `171`, and `0d171` all parse equal.

/// Parses one numeric literal token (no surrounding whitespace, optional
/// leading `-`) and returns its value, or `None` if the token does not
/// match any recognised base/suffix combination.
pub fn parse_numeric_literal(token: &str) -> Option<i64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let (negative, rest) = match token.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, token),
    };
    if rest.is_empty() {
        return None;
    }

    let magnitude = parse_unsigned(rest)?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Parses the magnitude (no sign) of a literal, discarding `_` separators
/// and dispatching on the base-specific prefix/suffix conventions (`0x`/`0o`/
/// `0b`/`0d`, a bare decimal run, or a `'c'` character literal).
fn parse_unsigned(rest: &str) -> Option<i64> {
    let cleaned: String = rest.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();

    // Hex: 0x.., 0X.., $0.., or ..h/..0..h forms.
    if let Some(digits) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        return i64::from_str_radix(digits, 16).ok();
    }
    if let Some(digits) = cleaned.strip_prefix('$') {
        let digits = digits.strip_prefix('0').unwrap_or(digits);
        return i64::from_str_radix(digits, 16).ok();
    }
    if let Some(digits) = lower.strip_prefix("0h") {
        return i64::from_str_radix(digits, 16).ok();
    }
    if let Some(digits) = lower.strip_suffix('h') {
        // "0c8h" / "0C8h" style: leading 0 required when first hex digit is A-F.
        return i64::from_str_radix(digits, 16).ok();
    }

    // Binary: 0b.., 0y.., ..b, ..y
    if let Some(digits) = lower.strip_prefix("0b") {
        return i64::from_str_radix(digits, 2).ok();
    }
    if let Some(digits) = lower.strip_prefix("0y") {
        return i64::from_str_radix(digits, 2).ok();
    }
    if let Some(digits) = lower.strip_suffix('b') {
        if !digits.is_empty() && digits.chars().all(|c| c == '0' || c == '1') {
            return i64::from_str_radix(digits, 2).ok();
        }
    }
    if let Some(digits) = lower.strip_suffix('y') {
        if !digits.is_empty() && digits.chars().all(|c| c == '0' || c == '1') {
            return i64::from_str_radix(digits, 2).ok();
        }
    }

    // Octal: 0o.., 0q.., ..q, ..o
    if let Some(digits) = lower.strip_prefix("0o") {
        return i64::from_str_radix(digits, 8).ok();
    }
    if let Some(digits) = lower.strip_prefix("0q") {
        return i64::from_str_radix(digits, 8).ok();
    }
    if let Some(digits) = lower.strip_suffix('q') {
        return i64::from_str_radix(digits, 8).ok();
    }
    if let Some(digits) = lower.strip_suffix('o') {
        return i64::from_str_radix(digits, 8).ok();
    }

    // Decimal: 0d.., ..d, or a bare run of digits (leading zero is NOT octal).
    if let Some(digits) = lower.strip_prefix("0d") {
        return digits.parse().ok();
    }
    if let Some(digits) = lower.strip_suffix('d') {
        return digits.parse().ok();
    }
    if cleaned.chars().all(|c| c.is_ascii_digit()) {
        return cleaned.parse().ok();
    }

    None
}

/// Parses a single-quoted character literal (`'A'`) into its byte value.
pub fn parse_char_literal(token: &str) -> Option<u8> {
    let inner = token.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    if c.is_ascii() {
        Some(c as u8)
    } else {
        None
    }
}

/// Parses a double-quoted string literal into its byte sequence, with no
/// escape processing beyond the bare characters themselves.
pub fn parse_string_literal(token: &str) -> Option<Vec<u8>> {
    let inner = token.strip_prefix('"')?.strip_suffix('"')?;
    Some(inner.bytes().collect())
}
