use crate::{
    error::{CompileError, CompileErrorKind},
    memory::Memory,
    span::Span,
    symbol::{LabelTable, Mnemonic, Word, RAM_SIZE},
};

/// Assembly intermediate representation, one record per mailbox in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Air {
    ast: Vec<AsmLine>,
}

/// Single source line that produces a mailbox. Has optional label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsmLine {
    /// 1-based line number in the source file
    pub line: usize,
    /// Source text without comment
    pub text: String,
    pub span: Span,
    pub label: Option<Label>,
    pub mnemonic: Mnemonic,
    pub operand: Operand,
    /// Location of the operand, or the whole line if it was omitted
    pub operand_span: Span,
}

/// Label declared at the start of a line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Lit(Word),
    /// Not yet resolved to an address
    Label(String),
}

impl Air {
    pub fn new() -> Self {
        Air { ast: Vec::new() }
    }

    pub fn add_stmt(&mut self, stmt: AsmLine) {
        self.ast.push(stmt)
    }

    pub fn get(&self, idx: usize) -> Option<&AsmLine> {
        self.ast.get(idx)
    }

    pub fn len(&self) -> usize {
        self.ast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ast.is_empty()
    }

    /// Index every label, then replace label operands with their addresses.
    pub fn backpatch(self) -> Result<Program, CompileError> {
        if let Some(extra) = self.ast.get(RAM_SIZE) {
            return Err(error(
                extra,
                extra.span,
                CompileErrorKind::ProgramTooLarge {
                    mailboxes: self.ast.len(),
                },
            ));
        }

        let mut labels = LabelTable::new();
        for (addr, stmt) in self.ast.iter().enumerate() {
            let Some(label) = &stmt.label else {
                continue;
            };
            if let Err(first_addr) = labels.insert(&label.name, addr) {
                return Err(error(
                    stmt,
                    label.span,
                    CompileErrorKind::DuplicateLabel {
                        label: label.name.clone(),
                        first_addr,
                    },
                ));
            }
        }

        let mut lines = Vec::with_capacity(self.ast.len());
        for stmt in &self.ast {
            let operand = match &stmt.operand {
                Operand::Lit(val) => *val,
                Operand::Label(name) => match labels.get(name) {
                    Some(addr) => addr as Word,
                    None => {
                        return Err(error(
                            stmt,
                            stmt.operand_span,
                            CompileErrorKind::UnknownLabel {
                                label: name.clone(),
                            },
                        ))
                    }
                },
            };
            lines.push(Line {
                line: stmt.line,
                text: stmt.text.clone(),
                mnemonic: stmt.mnemonic,
                operand,
            });
        }

        Ok(Program { lines, labels })
    }
}

impl<'a> IntoIterator for &'a Air {
    type Item = &'a AsmLine;
    type IntoIter = std::slice::Iter<'a, AsmLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.ast.iter()
    }
}

fn error(stmt: &AsmLine, span: Span, kind: CompileErrorKind) -> CompileError {
    CompileError::new(stmt.line, &stmt.text, span, kind)
}

/// Fully resolved program, ready to be placed in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    lines: Vec<Line>,
    labels: LabelTable,
}

/// Resolved line. Operand is always numeric.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub line: usize,
    pub text: String,
    pub mnemonic: Mnemonic,
    pub operand: Word,
}

impl Line {
    /// Numeric form of the line as stored in its mailbox.
    pub fn emit(&self) -> Word {
        match self.mnemonic {
            Mnemonic::Dat => self.operand,
            // Range checked while parsing, and label addresses are bounded by program size
            Mnemonic::Op(op) => op.encode(self.operand as usize),
        }
    }
}

impl Program {
    /// Encode every line into a fresh memory image.
    pub fn emit(&self) -> Memory {
        let mut words = [0; RAM_SIZE];
        for (cell, line) in words.iter_mut().zip(&self.lines) {
            *cell = line.emit();
        }
        Memory::from(words)
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Amount of mailboxes taken up by the program.
    pub fn mailboxes(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn label_at(&self, addr: usize) -> Option<&str> {
        self.labels.label_at(addr)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::span::Idx;
    use crate::symbol::Opcode;

    fn stmt(line: usize, label: Option<&str>, mnemonic: Mnemonic, operand: Operand) -> AsmLine {
        AsmLine {
            line,
            text: String::new(),
            span: Span::new(Idx(line * 10), 5),
            label: label.map(|name| Label {
                name: name.into(),
                span: Span::new(Idx(line * 10), name.len()),
            }),
            mnemonic,
            operand,
            operand_span: Span::new(Idx(line * 10 + 6), 3),
        }
    }

    #[test]
    fn resolves_forward_and_backward() {
        let mut air = Air::new();
        air.add_stmt(stmt(1, Some("TOP"), Mnemonic::Op(Opcode::Lda), Operand::Label("X".into())));
        air.add_stmt(stmt(2, None, Mnemonic::Op(Opcode::Br), Operand::Label("TOP".into())));
        air.add_stmt(stmt(3, Some("X"), Mnemonic::Dat, Operand::Lit(42)));

        let program = air.backpatch().unwrap();
        assert_eq!(program.labels().get("TOP"), Some(0));
        assert_eq!(program.labels().get("X"), Some(2));
        assert_eq!(program.mailboxes(), 3);

        let mem = program.emit();
        assert_eq!(&mem.words()[..4], &[402, 500, 42, 0]);
    }

    #[test]
    fn duplicate_label() {
        let mut air = Air::new();
        air.add_stmt(stmt(1, Some("A"), Mnemonic::Op(Opcode::Hlt), Operand::Lit(0)));
        air.add_stmt(stmt(4, Some("A"), Mnemonic::Dat, Operand::Lit(0)));

        let err = air.backpatch().unwrap_err();
        assert_eq!(err.line, 4);
        assert_eq!(
            err.kind,
            CompileErrorKind::DuplicateLabel {
                label: "A".into(),
                first_addr: 0
            }
        );
        assert_eq!(err.span.as_range(), 40..41);
    }

    #[test]
    fn unknown_label_points_at_operand() {
        let mut air = Air::new();
        air.add_stmt(stmt(2, None, Mnemonic::Op(Opcode::Br), Operand::Label("END".into())));

        let err = air.backpatch().unwrap_err();
        assert_eq!(
            err.kind,
            CompileErrorKind::UnknownLabel {
                label: "END".into()
            }
        );
        assert_eq!(err.span.as_range(), 26..29);
    }

    #[test]
    fn too_many_mailboxes() {
        let mut air = Air::new();
        for i in 0..=RAM_SIZE {
            air.add_stmt(stmt(i + 1, None, Mnemonic::Dat, Operand::Lit(1)));
        }
        let err = air.backpatch().unwrap_err();
        assert_eq!(err.line, RAM_SIZE + 1);
        assert_eq!(
            err.kind,
            CompileErrorKind::ProgramTooLarge {
                mailboxes: RAM_SIZE + 1
            }
        );
    }

    #[test]
    fn full_memory_fits() {
        let mut air = Air::new();
        for i in 0..RAM_SIZE {
            air.add_stmt(stmt(i + 1, None, Mnemonic::Dat, Operand::Lit(7)));
        }
        let mem = air.backpatch().unwrap().emit();
        assert!(mem.words().iter().all(|&w| w == 7));
    }
}
