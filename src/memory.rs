use std::{fmt, str::FromStr};

use crate::error::{ExecutionError, ImageError};
use crate::symbol::{Word, RAM_SIZE, WORD_MAX, WORD_MIN};

/// Mailboxes of the machine, zeroed unless filled by the assembler or an image file.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Memory([Word; RAM_SIZE]);

impl Memory {
    pub fn new() -> Self {
        Memory([0; RAM_SIZE])
    }

    pub fn read(&self, addr: usize) -> Result<Word, ExecutionError> {
        self.0
            .get(addr)
            .copied()
            .ok_or(ExecutionError::AddressOutOfBounds { address: addr })
    }

    pub fn write(&mut self, addr: usize, val: Word) -> Result<(), ExecutionError> {
        let cell = self
            .0
            .get_mut(addr)
            .ok_or(ExecutionError::AddressOutOfBounds { address: addr })?;
        *cell = val;
        Ok(())
    }

    pub fn words(&self) -> &[Word; RAM_SIZE] {
        &self.0
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[Word; RAM_SIZE]> for Memory {
    fn from(words: [Word; RAM_SIZE]) -> Self {
        Memory(words)
    }
}

/// Image files hold every mailbox as a decimal number, separated by whitespace.
impl FromStr for Memory {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mem = Memory::new();
        let mut count = 0;
        for (i, word) in s.split_whitespace().enumerate() {
            count += 1;
            if i >= RAM_SIZE {
                continue;
            }
            let val = word
                .parse::<Word>()
                .ok()
                .filter(|val| (WORD_MIN..=WORD_MAX).contains(val))
                .ok_or_else(|| ImageError::BadWord {
                    index: i,
                    text: word.to_string(),
                })?;
            mem.0[i] = val;
        }
        if count != RAM_SIZE {
            return Err(ImageError::WrongLength { count });
        }
        Ok(mem)
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.0.chunks(10) {
            let row: Vec<String> = row.iter().map(|w| w.to_string()).collect();
            writeln!(f, "{}", row.join(" "))?;
        }
        Ok(())
    }
}
