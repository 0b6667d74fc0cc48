use crate::span::{Idx, Span};

/// Represents a single "word" of a source line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token<'a> {
    // Value contained inside the token
    pub val: &'a str,
    // Location inside the whole source
    pub span: Span,
}

/// Split `code` on whitespace, keeping track of where each word sits in the source.
///
/// `base` is the offset of `code` from the start of the source.
pub fn words(code: &str, base: usize) -> Vec<Token<'_>> {
    let mut toks = Vec::new();
    let mut start = None;
    for (i, c) in code.char_indices() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                toks.push(Token::new(&code[s..i], base + s));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        toks.push(Token::new(&code[s..], base + s));
    }
    toks
}

impl<'a> Token<'a> {
    fn new(val: &'a str, offs: usize) -> Self {
        Token {
            val,
            span: Span::new(Idx(offs), val.len()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_with_offsets() {
        let toks = words("LOOP  LDA\tCOUNT", 10);
        let vals: Vec<_> = toks.iter().map(|t| t.val).collect();
        assert_eq!(vals, ["LOOP", "LDA", "COUNT"]);
        assert_eq!(toks[1].span.as_range(), 16..19);
        assert_eq!(toks[2].span.as_range(), 20..25);
    }

    #[test]
    fn empty() {
        assert!(words("   ", 0).is_empty());
    }
}
