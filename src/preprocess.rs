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

//! The macro preprocessor. Modelled as a pure function of
//! `(source, macro_env, next_counter) -> (expanded_source, new_counter)` —
//! no module-global state, so a file's expansion can be driven one line at
//! a time without hidden carry-over.

use std::collections::HashMap;

use crate::errors::{AssemblyError, ErrorKind, SourceLocation};

const MAX_EXPANSION_DEPTH: usize = 10;

/// A `#define NAME(args) body` or object-like `#define NAME body` entry.
#[derive(Debug, Clone)]
struct Macro {
    params: Vec<String>,
    body: String,
}

/// Macro environment threaded explicitly between preprocessor invocations;
/// callers that want a shared definition set across files pass the same
/// `MacroEnv` through each call.
#[derive(Debug, Clone, Default)]
pub struct MacroEnv {
    macros: HashMap<String, Macro>,
}

impl MacroEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `#define` lines from a standalone macro-definition file (the
    /// `-m` flag's argument).
    pub fn load_definitions(&mut self, source: &str) -> Result<(), AssemblyError> {
        for (i, line) in source.lines().enumerate() {
            let line = strip_hash_comment(line, i + 1)?;
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix("#define") {
                self.define(rest.trim(), i + 1)?;
            }
        }
        Ok(())
    }

    fn define(&mut self, rest: &str, line: usize) -> Result<(), AssemblyError> {
        let (name, params, body) = parse_define(rest).ok_or_else(|| {
            AssemblyError::new(
                ErrorKind::PreprocessError,
                SourceLocation::new("<macro>", line, 1),
                format!("malformed #define: {:?}", rest),
            )
        })?;
        self.macros.insert(name, Macro { params, body });
        Ok(())
    }

    fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }
}

/// Parses the text after `#define`: `NAME(a, b) body` or `NAME body`.
fn parse_define(rest: &str) -> Option<(String, Vec<String>, String)> {
    let rest = rest.trim();
    let name_end = rest
        .find(|c: char| c == '(' || c.is_whitespace())
        .unwrap_or(rest.len());
    let name = rest[..name_end].to_string();
    if name.is_empty() {
        return None;
    }
    let after_name = rest[name_end..].trim_start();

    if let Some(stripped) = after_name.strip_prefix('(') {
        let close = stripped.find(')')?;
        let params: Vec<String> = stripped[..close]
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let body = stripped[close + 1..].trim().to_string();
        Some((name, params, body))
    } else {
        Some((name, Vec::new(), after_name.trim().to_string()))
    }
}

/// Strips a `#`-introduced comment from one physical line: a leading
/// `#<name>` (GCC `#APP`/`#NO_APP`, cpp linemarkers like
/// `# 670 "file" 1`) is a whole-line annotation comment, distinguished from
/// a real preprocessor directive (`#define`, `#undef`, `#ifdef`, `#ifndef`,
/// `#else`, `#endif`) by name. An end-of-line `#<token>` after real content
/// is also a comment, but a bare `#` immediately followed by a digit or by
/// `HI:`/`LO:` is the immediate-value prefix used mid-operand and must be
/// preserved.
fn strip_hash_comment(line: &str, lineno: usize) -> Result<String, AssemblyError> {
    let _ = lineno;
    let trimmed_start = line.trim_start();
    if let Some(rest) = trimmed_start.strip_prefix('#') {
        if is_directive_keyword(rest) {
            return Ok(line.to_string());
        }
        return Ok(String::new());
    }
    Ok(strip_trailing_hash_comment(line))
}

/// Strips a `#`-introduced comment that trails real operand content on the
/// same line (e.g. GCC `d4, #1   # 32-bit mov`). A `#` only starts such a
/// comment when whitespace precedes it and whitespace (or end-of-line)
/// immediately follows it — `#1`/`#HI:x` style immediate prefixes are
/// always written with no space on either side and so never match. Quoted
/// and bracketed spans are passed through untouched since a `#` can't
/// start a comment inside either.
fn strip_trailing_hash_comment(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut in_quotes: Option<char> = None;
    let mut depth = 0i32;
    let mut prev_ws = true;

    for (i, &c) in chars.iter().enumerate() {
        match in_quotes {
            Some(q) => {
                if c == q {
                    in_quotes = None;
                }
                prev_ws = false;
                continue;
            }
            None => {}
        }
        match c {
            '\'' | '"' => {
                in_quotes = Some(c);
                prev_ws = false;
            }
            '[' => {
                depth += 1;
                prev_ws = false;
            }
            ']' => {
                depth -= 1;
                prev_ws = false;
            }
            '#' if depth == 0 && prev_ws => {
                let next_is_ws = chars.get(i + 1).map(|c| c.is_whitespace()).unwrap_or(true);
                if next_is_ws {
                    return chars[..i].iter().collect::<String>().trim_end().to_string();
                }
                prev_ws = false;
            }
            _ => {
                prev_ws = c.is_whitespace();
            }
        }
    }
    line.to_string()
}

fn is_directive_keyword(rest: &str) -> bool {
    const KEYWORDS: &[&str] = &["define", "undef", "ifdef", "ifndef", "else", "endif", "if"];
    KEYWORDS.iter().any(|kw| {
        rest.starts_with(kw)
            && rest[kw.len()..]
                .chars()
                .next()
                .map(|c| c.is_whitespace() || c == '(')
                .unwrap_or(true)
    })
}

/// Expands `source` against `macro_env`, returning the expanded text and the
/// counter value to thread into the next invocation.
pub fn preprocess(
    source: &str,
    macro_env: &mut MacroEnv,
    next_counter: u64,
) -> Result<(String, u64), AssemblyError> {
    let mut counter = next_counter;
    let mut active_ifdef: Vec<bool> = Vec::new();
    let mut out_lines: Vec<String> = Vec::new();

    for (i, raw_line) in source.lines().enumerate() {
        let lineno = i + 1;
        let line = strip_hash_comment(raw_line, lineno)?;
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("#define") {
            if active_ifdef.iter().all(|b| *b) {
                macro_env.define(rest.trim(), lineno)?;
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#undef") {
            if active_ifdef.iter().all(|b| *b) {
                macro_env.undefine(rest.trim());
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#ifdef") {
            let defined = macro_env.macros.contains_key(rest.trim());
            active_ifdef.push(defined);
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("#ifndef") {
            let defined = macro_env.macros.contains_key(rest.trim());
            active_ifdef.push(!defined);
            continue;
        }
        if trimmed == "#else" {
            if let Some(last) = active_ifdef.last_mut() {
                *last = !*last;
            }
            continue;
        }
        if trimmed == "#endif" {
            active_ifdef.pop();
            continue;
        }
        if !active_ifdef.iter().all(|b| *b) {
            continue;
        }

        let expanded = expand_line(&line, macro_env, &mut counter, lineno, 0)?;
        out_lines.push(expanded);
    }

    if !active_ifdef.is_empty() {
        return Err(AssemblyError::new(
            ErrorKind::PreprocessError,
            SourceLocation::new("<source>", source.lines().count(), 1),
            "unterminated #ifdef/#ifndef".to_string(),
        ));
    }

    Ok((out_lines.join("\n"), counter))
}

fn expand_line(
    line: &str,
    macro_env: &MacroEnv,
    counter: &mut u64,
    lineno: usize,
    depth: usize,
) -> Result<String, AssemblyError> {
    if depth > MAX_EXPANSION_DEPTH {
        return Err(AssemblyError::new(
            ErrorKind::PreprocessError,
            SourceLocation::new("<source>", lineno, 1),
            "macro expansion exceeded maximum depth (10)".to_string(),
        ));
    }

    let replaced = replace_counter(line, counter);
    let (expanded, changed) = expand_macro_invocations(&replaced, macro_env)?;
    let spliced = splice_tokens(&expanded);
    let with_breaks = apply_line_breaks(&spliced);

    if !changed {
        return Ok(with_breaks);
    }

    // Re-scan once more so a macro that expands to another macro's name
    // still gets expanded, bounded by MAX_EXPANSION_DEPTH.
    let mut result_lines = Vec::new();
    for l in with_breaks.split('\n') {
        result_lines.push(expand_line(l, macro_env, counter, lineno, depth + 1)?);
    }
    Ok(result_lines.join("\n"))
}

fn replace_counter(line: &str, counter: &mut u64) -> String {
    if !line.contains("__COUNTER__") {
        return line.to_string();
    }
    let mut out = String::new();
    let mut rest = line;
    while let Some(pos) = rest.find("__COUNTER__") {
        out.push_str(&rest[..pos]);
        out.push_str(&counter.to_string());
        *counter += 1;
        rest = &rest[pos + "__COUNTER__".len()..];
    }
    out.push_str(rest);
    out
}

/// Expands one pass of object-like and function-like macro invocations.
/// Returns the expanded text and whether any substitution occurred.
fn expand_macro_invocations(line: &str, macro_env: &MacroEnv) -> Result<(String, bool), AssemblyError> {
    let mut out = String::new();
    let mut changed = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut in_quotes: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = in_quotes {
            out.push(c);
            if c == q {
                in_quotes = None;
            }
            i += 1;
            continue;
        }
        if c == '\'' || c == '"' {
            in_quotes = Some(c);
            out.push(c);
            i += 1;
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            if let Some(m) = macro_env.macros.get(&ident) {
                if m.params.is_empty() {
                    out.push_str(&m.body);
                    changed = true;
                } else if i < chars.len() && chars[i] == '(' {
                    let close = find_matching_paren(&chars, i)?;
                    let args_text: String = chars[i + 1..close].iter().collect();
                    let args = split_macro_args(&args_text);
                    out.push_str(&substitute_params(m, &args));
                    changed = true;
                    i = close + 1;
                } else {
                    out.push_str(&ident);
                }
            } else {
                out.push_str(&ident);
            }
            continue;
        }
        out.push(c);
        i += 1;
    }
    Ok((out, changed))
}

fn find_matching_paren(chars: &[char], open: usize) -> Result<usize, AssemblyError> {
    let mut depth = 0;
    for (i, c) in chars.iter().enumerate().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err(AssemblyError::new(
        ErrorKind::PreprocessError,
        SourceLocation::default(),
        "unterminated macro argument list".to_string(),
    ))
}

fn split_macro_args(args_text: &str) -> Vec<String> {
    crate::parser::operand_normalizer::tokenize_operands(args_text)
}

fn substitute_params(m: &Macro, args: &[String]) -> String {
    let mut body = m.body.clone();
    for (param, arg) in m.params.iter().zip(args.iter()) {
        body = replace_word(&body, param, arg);
    }
    body
}

fn replace_word(haystack: &str, word: &str, replacement: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = haystack.chars().collect();
    let wlen = word.chars().count();
    let mut i = 0;
    while i < chars.len() {
        if chars[i..].iter().collect::<String>().starts_with(word) {
            let before_ok = i == 0 || !(chars[i - 1].is_alphanumeric() || chars[i - 1] == '_');
            let after_idx = i + wlen;
            let after_ok = after_idx >= chars.len()
                || !(chars[after_idx].is_alphanumeric() || chars[after_idx] == '_');
            if before_ok && after_ok {
                out.push_str(replacement);
                i = after_idx;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// `##` token-pasting: removes the operator and any surrounding whitespace,
/// joining the adjacent tokens.
fn splice_tokens(line: &str) -> String {
    line.replace(" ## ", "").replace("##", "")
}

/// A literal `|` in a macro body denotes a line break in the expansion
///. Quoted fragments are passed through untouched.
fn apply_line_breaks(line: &str) -> String {
    let mut out = String::new();
    let mut in_quotes: Option<char> = None;
    for c in line.chars() {
        match in_quotes {
            Some(q) => {
                out.push(c);
                if c == q {
                    in_quotes = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    in_quotes = Some(c);
                    out.push(c);
                }
                '|' => out.push('\n'),
                _ => out.push(c),
            },
        }
    }
    out
}

/// Sanitises a macro-generated label into a legal identifier: any
/// character outside `[A-Za-z0-9_.]` becomes `_`.
pub fn sanitize_label(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
