use std::cell::RefCell;
use std::fmt::Write as _;
use std::path::Path;
use std::str::Chars;

use colored::Colorize;

use crate::runtime::{Effect, Machine, Registers, Step};
use crate::symbol::{LabelTable, Word, RAM_SIZE};
use crate::Memory;

#[allow(unused)]
#[derive(Clone, Copy, Debug)]
pub enum MsgColor {
    Green,
    Cyan,
    Red,
}

/// Console output shared by every command.
pub struct Output;

impl Output {
    thread_local! {
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_minimal(new_value: bool) -> bool {
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }

    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }
}

/// Print a status line, e.g. `  Assembling target hello.asm`. Silent if `--minimal`.
pub fn message<S>(color: MsgColor, left: S, right: S)
where
    S: Colorize + std::fmt::Display,
{
    if Output::is_minimal() {
        return;
    }
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

pub fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, right.as_str());
}

/// Program output, one value per line. Printed even if `--minimal`.
pub fn print_output(output: &[Word]) {
    for val in output {
        println!("{val}");
    }
}

/// Describe a single executed cycle on stderr.
pub fn print_trace(labels: &LabelTable, machine: &Machine, step: &Step) {
    let line = trace_line(labels, machine, step);
    if Output::is_minimal() {
        eprintln!("{}", Decolored::new(&line).collect::<String>());
    } else {
        eprintln!("{line}");
    }
}

fn trace_line(labels: &LabelTable, machine: &Machine, step: &Step) -> String {
    let name = |addr: usize| match labels.label_at(addr) {
        Some(label) => format!("{addr:02} ({label})"),
        None => format!("{addr:02}"),
    };
    let effect = match step.effect {
        Effect::Halt => "halted".to_string(),
        Effect::Read { addr, val } => format!("read {val} from {}", name(addr)),
        Effect::Write { addr, val } => format!("wrote {val} to {}", name(addr)),
        Effect::Branch { taken: true } => format!("set PC to {}", name(machine.registers().pc)),
        Effect::Branch { taken: false } => "no change to PC".to_string(),
        Effect::Input(val) => format!("input {val}"),
        Effect::Output(val) => format!("output {val}"),
    };
    let reg = machine.registers();
    format!(
        "{} {:<4}{:02}  {:<28} {}",
        format!("[{:02}]", step.addr).dimmed(),
        step.op.to_string().bold(),
        step.operand,
        effect,
        format!(
            "acc={:<3} {}",
            reg.acc,
            if machine.neg_flag() { "N" } else { "-" }
        )
        .dimmed(),
    )
}

/// Mailboxes laid out in a 10 x 10 grid. Labelled mailboxes are highlighted.
pub fn memory_table(mem: &Memory, labels: Option<&LabelTable>) -> String {
    let mut out = String::new();
    let minimal = Output::is_minimal();

    let _ = write!(out, "    ");
    for col in 0..10 {
        let _ = write!(out, "{:>5}", format!("+{col}").dimmed());
    }
    out.push('\n');

    for (row, words) in mem.words().chunks(10).enumerate() {
        let _ = write!(out, "{}", format!("{:>3} ", row * 10).dimmed());
        for (col, word) in words.iter().enumerate() {
            let addr = row * 10 + col;
            let cell = format!("{word:>5}");
            let labelled = labels.is_some_and(|l| l.label_at(addr).is_some());
            if labelled && !minimal {
                let _ = write!(out, "{}", cell.cyan());
            } else {
                out.push_str(&cell);
            }
        }
        out.push('\n');
    }

    if let Some(labels) = labels.filter(|l| !l.is_empty()) {
        out.push('\n');
        for (label, addr) in labels.iter() {
            debug_assert!(addr < RAM_SIZE);
            let _ = writeln!(out, "{:>12} {addr:02}", label);
        }
    }

    if minimal {
        Decolored::new(&out).collect()
    } else {
        out
    }
}

pub fn registers_table(reg: &Registers, cycles: u64) -> String {
    format!(
        "ACC {}  CIR {}  MDR {}  MAR {:02}  PC {:02}  cycles {}",
        reg.acc, reg.cir, reg.mdr, reg.mar, reg.pc, cycles
    )
}

/// Characters of a string, skipping terminal color codes.
struct Decolored<'a> {
    chars: Chars<'a>,
}

impl<'a> Decolored<'a> {
    pub fn new(string: &'a str) -> Self {
        Self {
            chars: string.chars(),
        }
    }
}

impl<'a> Iterator for Decolored<'a> {
    type Item = char;
    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ch) = self.chars.next() {
            // Skip everything between '\x1b' and 'm' (inclusive)
            if ch == '\x1b' {
                while self.chars.next().is_some_and(|ch| ch != 'm') {}
                continue;
            }
            return Some(ch);
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assemble;
    use crate::runtime::RunConfig;

    #[test]
    fn decolored() {
        assert_eq!(Decolored::new("abcdef").collect::<String>(), "abcdef");
        assert_eq!(
            Decolored::new("abc\x1b[0;2mdef\x1b[0m").collect::<String>(),
            "abcdef"
        );
        assert_eq!(Decolored::new("abc\x1b[0xyz").collect::<String>(), "abc");
    }

    #[test]
    fn table_layout() {
        colored::control::set_override(false);
        let program = assemble("IN\nOUT\nHLT\nX DAT 42").unwrap();
        let table = memory_table(&program.emit(), Some(program.labels()));
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines[0], "       +0   +1   +2   +3   +4   +5   +6   +7   +8   +9");
        assert_eq!(lines[1], "  0   800  900    0   42    0    0    0    0    0    0");
        assert_eq!(lines[10], " 90     0    0    0    0    0    0    0    0    0    0");
        assert_eq!(lines[12], "           X 03");
    }

    #[test]
    fn trace_names_labels() {
        colored::control::set_override(false);
        let program = assemble("LDA X\nHLT\nX DAT 5").unwrap();
        let mut machine = Machine::new(program.emit(), RunConfig::new(0)).unwrap();
        let step = machine.step().unwrap();
        let line = trace_line(program.labels(), &machine, &step);
        assert_eq!(line, "[00] LDA 02  read 5 from 02 (X)           acc=5   -");
    }
}
