//! Independently computed outputs for the stopping-time sample programs, used to check a run.

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use crate::symbol::{Word, WORD_MAX};

/// Stopping-time sequence a program is expected to print.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sequence {
    /// Halve even terms, `3n + 1` odd terms.
    Basic,
    /// Halve even terms, `(3n + 1) / 2` odd terms.
    Advanced,
}

impl Sequence {
    pub fn next(self, n: Word) -> Word {
        if n % 2 == 0 {
            n / 2
        } else {
            match self {
                Sequence::Basic => 3 * n + 1,
                Sequence::Advanced => (3 * n + 1) / 2,
            }
        }
    }

    /// Terms from `start` down to 1 (or 0). A term that no longer fits in a mailbox ends the
    /// sequence, and is shown as a single `0` when `zero` is set.
    pub fn expected(self, start: Word, zero: bool) -> Vec<Word> {
        let mut res = Vec::new();
        let mut n = start;
        loop {
            if n > WORD_MAX {
                if zero {
                    res.push(0);
                }
                break;
            }
            // Negative starts would cycle forever, so they end here too
            if n <= 1 {
                res.push(n);
                break;
            }
            res.push(n);
            n = self.next(n);
        }
        res
    }

    pub fn check(self, start: Word, zero: bool, output: &[Word]) -> Result<(), Mismatch> {
        let expected = self.expected(start, zero);
        if expected == output {
            return Ok(());
        }
        Err(Mismatch {
            sequence: self,
            start,
            expected,
            actual: output.to_vec(),
        })
    }
}

impl FromStr for Sequence {
    type Err = String;
    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "bsc" => Ok(Sequence::Basic),
            "adv" => Ok(Sequence::Advanced),
            _ => Err(format!("Unknown sequence '{}', expected 'bsc' or 'adv'", string)),
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Basic => write!(f, "bsc"),
            Sequence::Advanced => write!(f, "adv"),
        }
    }
}

/// Program output differs from the sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub sequence: Sequence,
    pub start: Word,
    pub expected: Vec<Word>,
    pub actual: Vec<Word>,
}

impl Error for Mismatch {}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Output for input {} does not match `{}` sequence",
            self.start, self.sequence
        )?;
        write!(f, "\n    expected: {}", join(&self.expected))?;
        write!(f, "\n    found:    {}", join(&self.actual))
    }
}

pub fn join(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic() {
        assert_eq!(
            Sequence::Basic.expected(6, true),
            [6, 3, 10, 5, 16, 8, 4, 2, 1]
        );
        assert_eq!(Sequence::Basic.expected(1, true), [1]);
        assert_eq!(Sequence::Basic.expected(0, false), [0]);
    }

    #[test]
    fn advanced() {
        assert_eq!(Sequence::Advanced.expected(6, true), [6, 3, 5, 8, 4, 2, 1]);
    }

    #[test]
    fn leaving_the_mailbox_range() {
        // 27 climbs past 999 quickly
        let with_zero = Sequence::Basic.expected(27, true);
        let without = Sequence::Basic.expected(27, false);
        assert_eq!(with_zero.last(), Some(&0));
        assert_eq!(&with_zero[..with_zero.len() - 1], &without[..]);
        assert!(without.iter().all(|&n| n <= WORD_MAX));
        assert_eq!(&without[..4], &[27, 82, 41, 124]);
    }

    #[test]
    fn check_output() {
        assert_eq!(Sequence::Basic.check(4, true, &[4, 2, 1]), Ok(()));
        let err = Sequence::Basic.check(4, true, &[4, 2]).unwrap_err();
        assert_eq!(err.expected, [4, 2, 1]);
        assert!(err.to_string().contains("expected: 4 2 1"));
    }

    #[test]
    fn parse() {
        assert_eq!("adv".parse::<Sequence>(), Ok(Sequence::Advanced));
        assert!("collatz".parse::<Sequence>().is_err());
    }
}
