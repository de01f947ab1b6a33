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

//! The canonical in-memory representation produced by the parser:
//! `Statement`, `Operand`, and the register/directive sum types they're
//! built from. Nothing here knows about any particular mnemonic — that
//! knowledge lives entirely in the loaded `InstructionTable`.

use crate::errors::SourceLocation;

/// Which register file an operand refers to. `E`/`P` are the TriCore
/// extended/pair registers, which may only be even-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterBank {
    D,
    A,
    E,
    P,
}

impl RegisterBank {
    pub fn is_even_only(self) -> bool {
        matches!(self, RegisterBank::E | RegisterBank::P)
    }
}

/// One register reference, e.g. `d4`, `[a15]`, or a post-incrementing
/// `[A[a]+]` base. `deref` distinguishes `d4` (bare) from `[d4]`
/// (bracketed) forms that the normaliser treats as equivalent registers
/// except for this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterRef {
    pub bank: RegisterBank,
    pub index: u8,
    pub deref: bool,
    pub post_increment: bool,
}

impl RegisterRef {
    pub fn new(bank: RegisterBank, index: u8) -> Self {
        Self {
            bank,
            index,
            deref: false,
            post_increment: false,
        }
    }

    pub fn derefed(mut self) -> Self {
        self.deref = true;
        self
    }

    pub fn with_post_increment(mut self) -> Self {
        self.post_increment = true;
        self
    }
}

/// Whether an immediate expression was prefixed with `HI:`/`LO:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighLow {
    None,
    Hi,
    Lo,
}

/// A tagged operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Register(RegisterRef),
    Immediate {
        value: i64,
        high_low: HighLow,
    },
    LabelRef {
        name: String,
        /// Accumulated constant addend from any trailing `+off`/`-off`
        /// terms.
        offset: i64,
        high_low: HighLow,
    },
    /// A register base plus a displacement, e.g. `[a15]14` or
    /// `[A[b]+]off`, post-compound-splitting this still exists as a single
    /// operand when the variant's slot kind calls for a fused
    /// memory-with-offset operand; the *parser* also emits the split
    /// two-token form per spec §4.2, which downstream sees as two separate
    /// `Operand`s in the statement's operand list.
    Indexed {
        base: RegisterRef,
        displacement: Box<Operand>,
    },
    /// A literal suffix token such as `LL`, `UU`, `L`, `U`, `UL`, `LU`.
    Fixed(String),
}

impl Operand {
    pub fn immediate(value: i64) -> Self {
        Operand::Immediate {
            value,
            high_low: HighLow::None,
        }
    }

    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Register(_))
    }

    pub fn as_register(&self) -> Option<&RegisterRef> {
        match self {
            Operand::Register(r) => Some(r),
            _ => None,
        }
    }
}

/// `DB`/`DW`/`DD`/`DQ` element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    Byte,
    Word,
    DWord,
    QWord,
}

impl DataWidth {
    pub fn size_bytes(self) -> u32 {
        match self {
            DataWidth::Byte => 1,
            DataWidth::Word => 2,
            DataWidth::DWord => 4,
            DataWidth::QWord => 8,
        }
    }
}

/// The canonical form of one source line's payload, after label extraction
///.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Instruction {
        mnemonic: String,
        operands: Vec<Operand>,
    },
    Data {
        width: DataWidth,
        values: Vec<Operand>,
    },
    Reserve {
        bytes: u32,
    },
    Equate {
        name: String,
        value: Operand,
    },
    Times {
        count: u32,
        inner: Box<StatementKind>,
    },
    Origin {
        address: Operand,
    },
    Section {
        name: String,
    },
    Align {
        boundary: u32,
    },
    Global {
        name: String,
    },
    /// Resolved ahead of this stage; kept as a no-op marker so listings can
    /// still show the line that requested it.
    Include {
        path: String,
    },
    /// A blank line, comment-only line, or a line reduced to nothing after
    /// `.type`/`.sdecl`-family attribute consumption.
    Empty,
}

/// One parsed source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub label: Option<String>,
    pub kind: StatementKind,
    pub location: SourceLocation,
    pub raw_text: String,
}

impl Statement {
    pub fn is_instruction(&self) -> bool {
        matches!(self.kind, StatementKind::Instruction { .. })
    }
}
