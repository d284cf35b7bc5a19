pub mod token;

use logos::Logos;

use crate::mini_front::lexer::token::{LexingError, Token, TokenKind};
use crate::utils::Span;

/// Tokenizes one source text. Tokens carry byte spans plus the 0-based
/// line/column of their first character; the sequence always ends with a
/// single `Eof` token.
#[derive(Debug)]
pub struct Lexer {
    source: String,
}

impl Lexer {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn tokenize(&self) -> Result<Vec<Token>, (LexingError, Span)> {
        let mut tokens = Vec::new();
        let mut line = 0usize;
        let mut column = 0usize;
        let mut cursor = 0usize;

        for (result, range) in TokenKind::lexer(&self.source).spanned() {
            track(&self.source[cursor..range.start], &mut line, &mut column);
            let span = Span::new(range.start, range.end, line, column);
            track(&self.source[range.start..range.end], &mut line, &mut column);
            cursor = range.end;
            match result {
                Ok(kind) => tokens.push(Token::new(span, kind)),
                Err(e) => return Err((e, span)),
            }
        }

        track(&self.source[cursor..], &mut line, &mut column);
        let end = self.source.len();
        tokens.push(Token::new(
            Span::new(end, end, line, column),
            TokenKind::Eof,
        ));
        Ok(tokens)
    }
}

fn track(text: &str, line: &mut usize, column: &mut usize) {
    for c in text.chars() {
        if c == '\n' {
            *line += 1;
            *column = 0;
        } else {
            *column += 1;
        }
    }
}
