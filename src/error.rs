use std::error::Error;
use std::fmt;

use miette::{miette, LabeledSpan, Report, Severity};

use crate::span::Span;
use crate::symbol::{Word, RAM_SIZE, WORD_MAX, WORD_MIN};

// Assembler errors

/// Error assembling a program. Points at the offending source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    /// 1-based line number in the source text.
    pub line: usize,
    /// Line contents with comments and surrounding whitespace removed.
    pub text: String,
    pub span: Span,
    pub kind: CompileErrorKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// No token on the line is an opcode where one is required.
    NoOpcode,
    TooManyParts { count: usize },
    DuplicateLabel { label: String, first_addr: usize },
    UnknownLabel { label: String },
    /// Instruction operand is not a mailbox address.
    OperandOutOfRange { value: Word },
    /// `DAT` literal does not fit in a mailbox.
    LiteralOutOfRange { value: Word },
    /// Program needs more mailboxes than exist.
    ProgramTooLarge { mailboxes: usize },
}

impl CompileError {
    pub(crate) fn new(line: usize, text: &str, span: Span, kind: CompileErrorKind) -> Self {
        CompileError {
            line,
            text: text.to_string(),
            span,
            kind,
        }
    }

    fn code(&self) -> &'static str {
        match self.kind {
            CompileErrorKind::NoOpcode => "parse::no_opcode",
            CompileErrorKind::TooManyParts { .. } => "parse::too_many_parts",
            CompileErrorKind::DuplicateLabel { .. } => "parse::duplicate_label",
            CompileErrorKind::UnknownLabel { .. } => "parse::unknown_label",
            CompileErrorKind::OperandOutOfRange { .. } => "parse::bad_operand",
            CompileErrorKind::LiteralOutOfRange { .. } => "parse::bad_lit",
            CompileErrorKind::ProgramTooLarge { .. } => "config::too_large",
        }
    }

    fn help(&self) -> String {
        match &self.kind {
            CompileErrorKind::NoOpcode => {
                "lines take the form `[label] opcode [operand]`, e.g. `LOOP LDA COUNT`".into()
            }
            CompileErrorKind::TooManyParts { .. } => {
                "a line holds at most a label, an opcode and one operand".into()
            }
            CompileErrorKind::DuplicateLabel { first_addr, .. } => {
                format!("labels are only allowed once per file, first declared at mailbox {first_addr}")
            }
            CompileErrorKind::UnknownLabel { .. } => {
                "declare the label at the start of a line, e.g. `ONE DAT 1`".into()
            }
            CompileErrorKind::OperandOutOfRange { .. } => {
                format!("operands must be a mailbox address from 0 to {}", RAM_SIZE - 1)
            }
            CompileErrorKind::LiteralOutOfRange { .. } => {
                format!("values from {WORD_MIN} to {WORD_MAX} fit in a mailbox")
            }
            CompileErrorKind::ProgramTooLarge { .. } => {
                format!("only {RAM_SIZE} mailboxes are available")
            }
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            CompileErrorKind::NoOpcode => "no opcode",
            CompileErrorKind::TooManyParts { .. } => "too many parts",
            CompileErrorKind::DuplicateLabel { .. } => "duplicate label",
            CompileErrorKind::UnknownLabel { .. } => "unknown label",
            CompileErrorKind::OperandOutOfRange { .. } => "bad operand",
            CompileErrorKind::LiteralOutOfRange { .. } => "bad literal",
            CompileErrorKind::ProgramTooLarge { .. } => "out of mailboxes",
        }
    }

    /// Render as a diagnostic over the source it was produced from.
    pub fn report(&self, src: &str) -> Report {
        miette!(
            severity = Severity::Error,
            code = self.code(),
            help = self.help(),
            labels = vec![LabeledSpan::at(self.span, self.label())],
            "{}",
            self
        )
        .with_source_code(src.to_string())
    }
}

impl Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CompileErrorKind::NoOpcode => {
                write!(f, "No valid opcode found on line {}", self.line)?;
            }
            CompileErrorKind::TooManyParts { count } => {
                write!(
                    f,
                    "Too many parts in line {}: expected at most 3, found {}",
                    self.line, count
                )?;
            }
            CompileErrorKind::DuplicateLabel { label, .. } => {
                write!(f, "Already a line with label `{}` (line {})", label, self.line)?;
            }
            CompileErrorKind::UnknownLabel { label } => {
                write!(f, "Unknown label `{}` on line {}", label, self.line)?;
            }
            CompileErrorKind::OperandOutOfRange { value } => {
                write!(f, "Operand {} out of range on line {}", value, self.line)?;
            }
            CompileErrorKind::LiteralOutOfRange { value } => {
                write!(f, "Literal {} out of range on line {}", value, self.line)?;
            }
            CompileErrorKind::ProgramTooLarge { mailboxes } => {
                write!(
                    f,
                    "Program needs {} mailboxes, but only {} exist",
                    mailboxes, RAM_SIZE
                )?;
            }
        }
        Ok(())
    }
}

// Image file errors

/// Error reading a memory image file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageError {
    WrongLength { count: usize },
    BadWord { index: usize, text: String },
}

impl Error for ImageError {}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength { count } => write!(
                f,
                "Memory image holds {} words, expected exactly {}",
                count, RAM_SIZE
            ),
            Self::BadWord { index, text } => write!(
                f,
                "Mailbox {} of memory image is not a value from {} to {}: `{}`",
                index, WORD_MIN, WORD_MAX, text
            ),
        }
    }
}

// Runtime errors

/// Fatal error for the current run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionError {
    /// Word at `address` does not decode to one of the ten opcodes.
    InvalidOpcode { address: usize, word: Word },
    AddressOutOfBounds { address: usize },
    /// Configured input does not fit in the accumulator.
    InputOutOfRange { input: Word },
    /// Optional cycle cap was reached before `HLT`.
    CycleLimit { limit: u64 },
    /// `ADD` or `SUB` at `address` left the range of a machine integer.
    AccumulatorOverflow { address: usize },
}

impl ExecutionError {
    pub fn report(&self) -> Report {
        let (code, help) = match self {
            Self::InvalidOpcode { .. } => (
                "run::invalid_opcode",
                "execution may have run into a `DAT` mailbox, is a `HLT` missing?",
            ),
            Self::AddressOutOfBounds { .. } => (
                "run::out_of_bounds",
                "execution may have run off the end of the program, is a `HLT` missing?",
            ),
            Self::InputOutOfRange { .. } => (
                "run::bad_input",
                "input must fit in a mailbox, from -999 to 999",
            ),
            Self::CycleLimit { .. } => (
                "run::cycle_limit",
                "the program may loop forever, or the limit may be too low",
            ),
            Self::AccumulatorOverflow { .. } => (
                "run::acc_overflow",
                "only subtraction below zero wraps, repeatedly subtracting a negative value does not",
            ),
        };
        miette!(severity = Severity::Error, code = code, help = help, "{}", self)
    }
}

impl Error for ExecutionError {}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOpcode { address, word } => {
                write!(f, "Invalid opcode: mailbox {} holds {}", address, word)
            }
            Self::AddressOutOfBounds { address } => {
                write!(
                    f,
                    "Address out of bounds: {} is not below {}",
                    address, RAM_SIZE
                )
            }
            Self::InputOutOfRange { input } => write!(f, "Input {} out of range", input),
            Self::CycleLimit { limit } => {
                write!(f, "Cycle limit reached after {} cycles", limit)
            }
            Self::AccumulatorOverflow { address } => {
                write!(f, "Accumulator overflow at mailbox {}", address)
            }
        }
    }
}
