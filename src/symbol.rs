use std::{fmt, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

/// Amount of mailboxes available to a program.
pub const RAM_SIZE: usize = 100;
/// Decimal digits needed to address every mailbox, `ceil(log10(RAM_SIZE))`.
pub const ADDR_DIGITS: u32 = addr_digits(RAM_SIZE);
/// Opcode digit is stored above the address digits.
pub const OPCODE_MULT: Word = (10 as Word).pow(ADDR_DIGITS);

/// Smallest value a mailbox may hold.
pub const WORD_MIN: Word = -999;
/// Largest value a mailbox may hold. Arithmetic wraps around this.
pub const WORD_MAX: Word = 999;

/// Contents of a single mailbox.
pub type Word = i32;

const fn addr_digits(size: usize) -> u32 {
    let mut digits = 0;
    let mut span = 1;
    while span < size {
        span *= 10;
        digits += 1;
    }
    digits
}

// Symbol table of label -> mailbox address
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Labels in order of declaration, each bound to the address of its line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelTable(FxMap<String, usize>);

impl LabelTable {
    pub fn new() -> Self {
        LabelTable(IndexMap::with_hasher(FxBuildHasher::default()))
    }

    /// Bind `label` to `addr`. Returns the previous address if the label already existed, in
    /// which case the table is left untouched.
    pub fn insert(&mut self, label: &str, addr: usize) -> Result<(), usize> {
        if let Some(prev) = self.0.get(label) {
            return Err(*prev);
        }
        self.0.insert(label.to_string(), addr);
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.0.get(label).copied()
    }

    /// First label declared at `addr`, if any.
    pub fn label_at(&self, addr: usize) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, a)| **a == addr)
            .map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(label, &addr)| (label.as_str(), addr))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The ten executable instructions. Discriminant is the opcode digit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Opcode {
    Hlt = 0,
    Add = 1,
    Sub = 2,
    Sto = 3,
    Lda = 4,
    Br = 5,
    Brz = 6,
    Brp = 7,
    In = 8,
    Out = 9,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::Hlt,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Sto,
        Opcode::Lda,
        Opcode::Br,
        Opcode::Brz,
        Opcode::Brp,
        Opcode::In,
        Opcode::Out,
    ];

    pub fn from_digit(digit: Word) -> Option<Opcode> {
        usize::try_from(digit)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    pub fn digit(self) -> Word {
        self as Word
    }

    /// Pack opcode and operand into a single word.
    pub fn encode(self, operand: usize) -> Word {
        debug_assert!(operand < RAM_SIZE, "operand should be a valid address");
        self.digit() * OPCODE_MULT + operand as Word
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Sto => "STO",
            Opcode::Lda => "LDA",
            Opcode::Br => "BR",
            Opcode::Brz => "BRZ",
            Opcode::Brp => "BRP",
            Opcode::In => "IN",
            Opcode::Out => "OUT",
        }
    }
}

/// Split a word into opcode and operand address.
///
/// Uses floor division, so any negative word decodes to a negative opcode digit and is rejected.
pub fn decode(word: Word) -> Option<(Opcode, usize)> {
    let digit = word.div_euclid(OPCODE_MULT);
    let operand = word - digit * OPCODE_MULT;
    Opcode::from_digit(digit).map(|op| (op, operand as usize))
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything allowed in the opcode column of a source line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mnemonic {
    Op(Opcode),
    /// Places its operand directly in the mailbox.
    Dat,
}

impl FromStr for Mnemonic {
    type Err = ();

    // Case sensitive, like labels.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "HLT" => Opcode::Hlt,
            "ADD" => Opcode::Add,
            "SUB" => Opcode::Sub,
            "STO" => Opcode::Sto,
            "LDA" => Opcode::Lda,
            "BR" => Opcode::Br,
            "BRZ" => Opcode::Brz,
            "BRP" => Opcode::Brp,
            "IN" | "INP" => Opcode::In,
            "OUT" => Opcode::Out,
            "DAT" => return Ok(Mnemonic::Dat),
            _ => return Err(()),
        };
        Ok(Mnemonic::Op(op))
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mnemonic::Op(op) => write!(f, "{op}"),
            Mnemonic::Dat => f.write_str("DAT"),
        }
    }
}

pub fn is_mnemonic(s: &str) -> bool {
    s.parse::<Mnemonic>().is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn address_width() {
        assert_eq!(ADDR_DIGITS, 2);
        assert_eq!(OPCODE_MULT, 100);
        assert_eq!(addr_digits(1000), 3);
        assert_eq!(addr_digits(101), 3);
    }

    #[test]
    fn encode_decode() {
        for op in Opcode::ALL {
            for operand in 0..RAM_SIZE {
                assert_eq!(decode(op.encode(operand)), Some((op, operand)));
            }
        }
    }

    #[test]
    fn decode_rejects_negative_words() {
        assert_eq!(decode(-1), None);
        assert_eq!(decode(-999), None);
        assert_eq!(decode(999), Some((Opcode::Out, 99)));
    }

    #[test]
    fn mnemonics() {
        assert_eq!("INP".parse::<Mnemonic>(), Ok(Mnemonic::Op(Opcode::In)));
        assert_eq!("IN".parse::<Mnemonic>(), Ok(Mnemonic::Op(Opcode::In)));
        assert_eq!("DAT".parse::<Mnemonic>(), Ok(Mnemonic::Dat));
        assert!(!is_mnemonic("hlt"));
        assert!(!is_mnemonic("LOOP"));
        assert_eq!(Mnemonic::Op(Opcode::In).to_string(), "IN");
    }

    #[test]
    fn label_table() {
        let mut table = LabelTable::new();
        assert_eq!(table.insert("LOOP", 0), Ok(()));
        assert_eq!(table.insert("END", 6), Ok(()));
        assert_eq!(table.insert("LOOP", 3), Err(0));
        assert_eq!(table.get("LOOP"), Some(0));
        assert_eq!(table.get("loop"), None);
        assert_eq!(table.label_at(6), Some("END"));
        assert_eq!(table.label_at(2), None);
        assert_eq!(table.len(), 2);
    }
}
