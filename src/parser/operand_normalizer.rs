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

//! Operand tokenising and normalisation. Deliberately a hand
//! rolled scanner with explicit states rather than a chain of regexes: the
//! states are "between operands", "inside brackets", and "inside quotes",
//! matching spec §9's redesign note.

/// Scanner state while splitting a raw operand-text span on commas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InBrackets,
    InQuotes(char),
}

/// Splits raw operand text on top-level commas, leaving bracket and quote
/// contents untouched. Whitespace around each token is trimmed. Brackets
/// nest (`[A[a]+]` closes only on the matching outer `]`), tracked by an
/// explicit depth counter rather than a single in/out flag.
pub fn tokenize_operands(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::Normal;
    let mut bracket_depth: u32 = 0;

    for c in raw.chars() {
        match state {
            ScanState::Normal => match c {
                ',' => {
                    tokens.push(current.trim().to_string());
                    current.clear();
                }
                '[' => {
                    state = ScanState::InBrackets;
                    bracket_depth = 1;
                    current.push(c);
                }
                '\'' | '"' => {
                    state = ScanState::InQuotes(c);
                    current.push(c);
                }
                _ => current.push(c),
            },
            ScanState::InBrackets => {
                current.push(c);
                match c {
                    '[' => bracket_depth += 1,
                    ']' => {
                        bracket_depth -= 1;
                        if bracket_depth == 0 {
                            state = ScanState::Normal;
                        }
                    }
                    _ => {}
                }
            }
            ScanState::InQuotes(q) => {
                current.push(c);
                if c == q {
                    state = ScanState::Normal;
                }
            }
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() || !tokens.is_empty() {
        tokens.push(trimmed.to_string());
    }
    tokens
}

/// Applies the compound-operand split micro-pass: any token of
/// the form `[<reg>]<disp>` becomes two tokens `<reg>`, `<disp>`. Pure
/// post-increment forms (`[A[a]+]` / `[A[a]+]off`) are left intact — they
/// stay a single `Indexed` operand.
///
/// Idempotent by construction: a token already split (no leading
/// `[...]<extra>` shape) is returned unchanged on a second pass.
pub fn split_compound_operands(tokens: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let Some((reg, disp)) = split_bracket_prefix(token) {
            out.push(reg);
            out.push(disp);
        } else {
            out.push(token.clone());
        }
    }
    out
}

/// Recognises `[<inner>]<disp>` where `<inner>` does not end in `+` (a
/// post-increment marker) and `<disp>` is non-empty. Returns the bracketed
/// register text (without brackets) and the trailing displacement text.
/// `<inner>` may itself contain brackets (`[A[a]+]off`), so the matching
/// close is found by depth, not by the first `]` in the token.
fn split_bracket_prefix(token: &str) -> Option<(String, String)> {
    let token = token.trim();
    if !token.starts_with('[') {
        return None;
    }
    let close = matching_close_bracket(token)?;
    let inner = &token[1..close];
    let rest = token[close + 1..].trim();
    if rest.is_empty() {
        return None; // bare "[reg]" or post-increment marker with nothing trailing
    }
    if inner.trim_end().ends_with('+') {
        return None; // post-increment base, kept fused
    }
    Some((inner.trim().to_string(), rest.to_string()))
}

/// Returns the byte index of the `]` that closes the `[` at index 0,
/// honouring nesting depth.
fn matching_close_bracket(token: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in token.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// A normalised register token, ready for bank/index classification by the
/// caller. Strips `%`, brackets, and case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRegisterToken {
    pub bank_char: char,
    pub index_text: String,
    pub deref: bool,
}

/// Recognises the register-form family from spec §4.2: `d4`, `D4`, `d[4]`,
/// `D[4]`, `%d4`, and bracketed variants of all of those. Returns `None` if
/// `token` is not shaped like any register form.
pub fn normalize_register_token(token: &str) -> Option<NormalizedRegisterToken> {
    let token = token.trim();
    let (deref, inner) = if let Some(stripped) = token.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        (true, stripped.trim())
    } else {
        (false, token)
    };
    let inner = inner.strip_prefix('%').unwrap_or(inner);

    let mut chars = inner.chars();
    let bank_char = chars.next()?.to_ascii_uppercase();
    if !matches!(bank_char, 'D' | 'A' | 'E' | 'P') {
        return None;
    }
    let rest: String = chars.collect();
    let index_text = if let Some(stripped) = rest.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        stripped.to_string()
    } else {
        rest
    };
    if index_text.is_empty() || !index_text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(NormalizedRegisterToken {
        bank_char,
        index_text,
        deref,
    })
}

/// Detects the post-increment family `[A[a]+]` / `[A[a]+]off`. Returns the
/// inner register token text and any trailing offset text (empty if none).
pub fn split_post_increment(token: &str) -> Option<(String, String)> {
    let token = token.trim();
    let close = token.strip_prefix('[')?.find("+]")?;
    let inner = &token[1..1 + close];
    let rest = &token[1 + close + 2..];
    Some((inner.trim().to_string(), rest.trim().to_string()))
}

/// Whether `token` (already comma-split) looks like an immediate rather
/// than a register or label: starts with `#`, or parses as a pure number
///.
pub fn looks_like_immediate(token: &str, is_numeric: impl Fn(&str) -> bool) -> bool {
    let token = token.trim();
    token.starts_with('#') || is_numeric(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_commas() {
        assert_eq!(tokenize_operands("d4, d5"), vec!["d4", "d5"]);
    }

    #[test]
    fn tokenizes_respecting_brackets() {
        assert_eq!(
            tokenize_operands("[a15]14, d1"),
            vec!["[a15]14", "d1"]
        );
    }

    #[test]
    fn tokenizes_respecting_quotes() {
        assert_eq!(
            tokenize_operands("\"a, b\", d1"),
            vec!["\"a, b\"", "d1"]
        );
    }

    #[test]
    fn splits_compound_operand_cases_from_spec() {
        let cases: &[(&str, &[&str])] = &[
            ("[a15]14,d1", &["a15", "14", "d1"]),
            ("d15,[a5]18", &["d15", "a5", "18"]),
            ("[a15]2,d15", &["a15", "2", "d15"]),
            ("d15,[a2]6", &["d15", "a2", "6"]),
        ];
        for (raw, expected) in cases {
            let tokens = tokenize_operands(raw);
            let split = split_compound_operands(&tokens);
            assert_eq!(split, *expected, "case {:?}", raw);
        }
    }

    #[test]
    fn split_is_idempotent() {
        let tokens = tokenize_operands("[a15]14,d1");
        let once = split_compound_operands(&tokens);
        let twice = split_compound_operands(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn tokenizes_respecting_nested_brackets() {
        assert_eq!(
            tokenize_operands("[A[a]+]off, d1"),
            vec!["[A[a]+]off", "d1"]
        );
    }

    #[test]
    fn post_increment_forms_stay_fused() {
        let tokens = tokenize_operands("[A[a]+]off, d1");
        let split = split_compound_operands(&tokens);
        assert_eq!(split, vec!["[A[a]+]off", "d1"]);
    }

    #[test]
    fn register_forms_all_equivalent() {
        let forms = ["d4", "D4", "d[4]", "D[4]", "%d4", "[d4]", "[D4]", "[d[4]]", "[D[4]]"];
        for f in forms {
            let r = normalize_register_token(f).unwrap_or_else(|| panic!("form {f} failed to normalize"));
            assert_eq!(r.bank_char, 'D');
            assert_eq!(r.index_text, "4");
        }
        assert!(!normalize_register_token("d4").unwrap().deref);
        assert!(normalize_register_token("[d4]").unwrap().deref);
    }

    #[test]
    fn rejects_non_register_tokens() {
        assert!(normalize_register_token("200").is_none());
        assert!(normalize_register_token("my_label").is_none());
    }

    #[test]
    fn post_increment_split_extracts_offset() {
        let (reg, off) = split_post_increment("[A[a]+]off").unwrap();
        assert_eq!(reg, "A[a]");
        assert_eq!(off, "off");
        let (reg, off) = split_post_increment("[A[a]+]").unwrap();
        assert_eq!(reg, "A[a]");
        assert_eq!(off, "");
    }
}
