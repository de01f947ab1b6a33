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

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Where in the source a diagnostic or error originates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<PathBuf>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// The tagged error kinds from spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    LexError,
    NumericLiteralError,
    UnknownMnemonic,
    InvalidOperand,
    OperandOutOfRange,
    DuplicateSymbol,
    UnresolvedSymbol,
    AddressOverlap,
    DirectiveError,
    TableLoadError,
    ConfigError,
    PreprocessError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::LexError => "LexError",
            ErrorKind::NumericLiteralError => "NumericLiteralError",
            ErrorKind::UnknownMnemonic => "UnknownMnemonic",
            ErrorKind::InvalidOperand => "InvalidOperand",
            ErrorKind::OperandOutOfRange => "OperandOutOfRange",
            ErrorKind::DuplicateSymbol => "DuplicateSymbol",
            ErrorKind::UnresolvedSymbol => "UnresolvedSymbol",
            ErrorKind::AddressOverlap => "AddressOverlap",
            ErrorKind::DirectiveError => "DirectiveError",
            ErrorKind::TableLoadError => "TableLoadError",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::PreprocessError => "PreprocessError",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        };
        f.write_str(s)
    }
}

/// One accumulated problem, recoverable or not. The parser (and later
/// stages, when running in "continue on error" mode) collect these instead
/// of bailing on the first one; the driver decides whether to proceed based
/// on whether any `Level::Error` diagnostic was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub level: Level,
    pub location: SourceLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: ErrorKind, location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            kind,
            level: Level::Error,
            location,
            message: message.into(),
        }
    }

    pub fn warning(kind: ErrorKind, location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            kind,
            level: Level::Warning,
            location,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {} [{}]",
            self.location, self.level, self.message, self.kind
        )
    }
}

/// A non-recoverable assembler error: raised by the fixpoint linker and the
/// emitters, which (per spec §7) abort the run rather than accumulate.
#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("Syntax error: {0}")]
    PestError(#[from] Box<pest::error::Error<crate::parser::Rule>>),

    #[error("{location}: {kind}: {message}")]
    Diagnosed {
        kind: ErrorKind,
        location: SourceLocation,
        message: String,
    },

    #[error("{0}")]
    Message(String),
}

impl From<pest::error::Error<crate::parser::Rule>> for AssemblyError {
    fn from(e: pest::error::Error<crate::parser::Rule>) -> Self {
        AssemblyError::PestError(Box::new(e))
    }
}

impl AssemblyError {
    pub fn new(kind: ErrorKind, location: SourceLocation, message: impl Into<String>) -> Self {
        AssemblyError::Diagnosed {
            kind,
            location,
            message: message.into(),
        }
    }

    pub fn from_diagnostic(d: &Diagnostic) -> Self {
        AssemblyError::Diagnosed {
            kind: d.kind,
            location: d.location.clone(),
            message: d.message.clone(),
        }
    }
}

/// Running totals of diagnostics at each level, printed as the end-of-run
/// summary on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticCounts {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub debug: usize,
}

impl DiagnosticCounts {
    pub fn tally(diagnostics: &[Diagnostic]) -> Self {
        let mut counts = Self::default();
        for d in diagnostics {
            match d.level {
                Level::Error => counts.errors += 1,
                Level::Warning => counts.warnings += 1,
                Level::Info => counts.info += 1,
                Level::Debug => counts.debug += 1,
            }
        }
        counts
    }

    pub fn has_fatal(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for DiagnosticCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s), {} info, {} debug",
            self.errors, self.warnings, self.info, self.debug
        )
    }
}
