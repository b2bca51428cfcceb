//! Tokenizer for RLE pattern bodies.

use std::iter::Peekable;
use std::str::Chars;

use super::PatternError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Run count for the token that follows.
    Count(u32),
    /// `b`
    Dead,
    /// `o`
    Alive,
    /// `$`
    EndOfRow,
    /// `!`
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

/// Splits an RLE body into tokens.
///
/// Whitespace is skipped. Anything else that is not a token comes out as an
/// `Err` and lexing carries on with the next character. Nothing after `!`
/// is read.
#[derive(Debug)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    /// `first_line` is the 1-based line number `body` starts on.
    pub fn new(body: &'a str, first_line: usize) -> Self {
        Self {
            chars: body.chars().peekable(),
            line: first_line,
            column: 1,
            finished: false,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn count(&mut self, first: u32, line: usize, column: usize) -> Result<Token, PatternError> {
        let mut value = Some(first);
        while let Some(d) = self.chars.peek().and_then(|c| c.to_digit(10)) {
            self.bump();
            value = value.and_then(|v| v.checked_mul(10)?.checked_add(d));
        }
        match value {
            Some(n) => Ok(Token {
                kind: TokenKind::Count(n),
                line,
                column,
            }),
            None => Err(PatternError::CountTooLarge { line, column }),
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, PatternError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            let (line, column) = (self.line, self.column);
            let c = self.bump()?;
            let kind = match c {
                c if c.is_whitespace() => continue,
                'b' => TokenKind::Dead,
                'o' => TokenKind::Alive,
                '$' => TokenKind::EndOfRow,
                '!' => {
                    self.finished = true;
                    TokenKind::End
                }
                c => match c.to_digit(10) {
                    Some(d) => return Some(self.count(d, line, column)),
                    None => {
                        return Some(Err(PatternError::UnexpectedChar {
                            found: c,
                            line,
                            column,
                        }))
                    }
                },
            };
            return Some(Ok(Token { kind, line, column }));
        }
    }
}
