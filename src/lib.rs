// Parsing
mod parser;
pub use parser::{assemble, AsmParser, COMMENT_CHAR, LINE_COMMENT};
mod air;
pub use air::{Air, AsmLine, Label, Line, Operand, Program};
mod token;

// Running
mod runtime;
pub use runtime::{execute, Effect, Execution, Machine, Registers, RunConfig, Step, Trace};
mod memory;
pub use memory::Memory;

mod symbol;
pub use symbol::{
    decode, LabelTable, Mnemonic, Opcode, Word, ADDR_DIGITS, OPCODE_MULT, RAM_SIZE, WORD_MAX,
    WORD_MIN,
};

mod error;
pub use error::{CompileError, CompileErrorKind, ExecutionError, ImageError};
mod span;
pub use span::Span;

// Driver support
pub mod env;
pub mod oracle;
pub mod output;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 4;
