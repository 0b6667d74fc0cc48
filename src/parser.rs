use crate::{
    air::{Air, AsmLine, Label, Operand, Program},
    error::{CompileError, CompileErrorKind},
    span::{Idx, Span},
    symbol::{is_mnemonic, Mnemonic, Word, RAM_SIZE, WORD_MAX, WORD_MIN},
    token::{words, Token},
};

/// Everything from this character to the end of the line is ignored.
pub const COMMENT_CHAR: char = '#';
/// Alternative line comment, also ignored to the end of the line.
pub const LINE_COMMENT: &str = "//";

/// Assemble source text into a resolved program.
pub fn assemble(src: &str) -> Result<Program, CompileError> {
    AsmParser::new(src).parse()?.backpatch()
}

/// The layouts a line can take, in order of precedence.
///
/// Two-part lines are ambiguous, so `OpOperand` is tried before `LabelOp`: a line whose first
/// word is an opcode is never read as a label declaration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Shape {
    /// `HLT`
    Op,
    /// `LDA COUNT`
    OpOperand,
    /// `END HLT`
    LabelOp,
    /// `ONE DAT 1`
    LabelOpOperand,
}

impl Shape {
    const RULES: [Shape; 4] = [
        Shape::Op,
        Shape::OpOperand,
        Shape::LabelOp,
        Shape::LabelOpOperand,
    ];

    fn parts(self) -> usize {
        match self {
            Shape::Op => 1,
            Shape::OpOperand | Shape::LabelOp => 2,
            Shape::LabelOpOperand => 3,
        }
    }

    fn opcode_idx(self) -> usize {
        match self {
            Shape::Op | Shape::OpOperand => 0,
            Shape::LabelOp | Shape::LabelOpOperand => 1,
        }
    }

    fn has_label(self) -> bool {
        self.opcode_idx() == 1
    }

    fn has_operand(self) -> bool {
        self.parts() > self.opcode_idx() + 1
    }

    fn matches(self, toks: &[Token]) -> bool {
        toks.len() == self.parts() && is_mnemonic(toks[self.opcode_idx()].val)
    }

    /// First rule matching the line.
    fn of(toks: &[Token]) -> Option<Shape> {
        Self::RULES.into_iter().find(|shape| shape.matches(toks))
    }
}

/// Source line with comment and surrounding whitespace removed.
struct CodeLine<'a> {
    line: usize,
    text: &'a str,
    span: Span,
}

/// Transforms source text into AIR
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Self {
        AsmParser { src }
    }

    /// Amount of lines that will take up a mailbox.
    pub fn mailboxes(&self) -> usize {
        self.code_lines().count()
    }

    /// Non-empty lines with comments stripped, keeping their line numbers and offsets.
    fn code_lines(&self) -> impl Iterator<Item = CodeLine<'a>> {
        let mut offs = 0;
        self.src.split('\n').enumerate().filter_map(move |(i, raw)| {
            let start = offs;
            offs += raw.len() + 1;

            let code = match raw.find(COMMENT_CHAR) {
                Some(idx) => &raw[..idx],
                None => raw,
            };
            let code = match code.find(LINE_COMMENT) {
                Some(idx) => &code[..idx],
                None => code,
            };
            let lead = code.len() - code.trim_start().len();
            let text = code.trim();
            if text.is_empty() {
                return None;
            }
            Some(CodeLine {
                line: i + 1,
                text,
                span: Span::new(Idx(start + lead), text.len()),
            })
        })
    }

    /// Create AIR out of the source. Labels are left unresolved.
    pub fn parse(self) -> Result<Air, CompileError> {
        let mut air = Air::new();
        for code in self.code_lines() {
            air.add_stmt(parse_line(&code)?);
        }
        Ok(air)
    }
}

fn parse_line(code: &CodeLine) -> Result<AsmLine, CompileError> {
    let err = |span, kind| CompileError::new(code.line, code.text, span, kind);

    let toks = words(code.text, code.span.offs());
    let Some(shape) = Shape::of(&toks) else {
        let kind = if toks.len() > 3 {
            CompileErrorKind::TooManyParts { count: toks.len() }
        } else {
            CompileErrorKind::NoOpcode
        };
        return Err(err(code.span, kind));
    };

    let label = shape.has_label().then(|| Label {
        name: toks[0].val.to_string(),
        span: toks[0].span,
    });
    let op_tok = toks[shape.opcode_idx()];
    let mnemonic: Mnemonic = op_tok
        .val
        .parse()
        .map_err(|_| err(op_tok.span, CompileErrorKind::NoOpcode))?;

    let (operand, operand_span) = if shape.has_operand() {
        let tok = toks[shape.opcode_idx() + 1];
        let operand = match tok.val.parse::<Word>() {
            Ok(val) => {
                check_literal(mnemonic, val).map_err(|kind| err(tok.span, kind))?;
                Operand::Lit(val)
            }
            Err(_) => Operand::Label(tok.val.to_string()),
        };
        (operand, tok.span)
    } else {
        (Operand::Lit(0), code.span)
    };

    Ok(AsmLine {
        line: code.line,
        text: code.text.to_string(),
        span: code.span,
        label,
        mnemonic,
        operand,
        operand_span,
    })
}

/// Instructions address a mailbox, data must fit inside one.
fn check_literal(mnemonic: Mnemonic, val: Word) -> Result<(), CompileErrorKind> {
    match mnemonic {
        Mnemonic::Dat if !(WORD_MIN..=WORD_MAX).contains(&val) => {
            Err(CompileErrorKind::LiteralOutOfRange { value: val })
        }
        Mnemonic::Op(_) if !(0..RAM_SIZE as Word).contains(&val) => {
            Err(CompileErrorKind::OperandOutOfRange { value: val })
        }
        _ => Ok(()),
    }
}
