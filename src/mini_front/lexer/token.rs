use logos::Logos;
use std::num::ParseIntError;

use crate::utils::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub span: Span,
    pub kind: TokenKind,
}

impl Token {
    #[inline(always)]
    pub fn new(span: Span, kind: TokenKind) -> Self {
        Self { span, kind }
    }

    #[inline(always)]
    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    #[inline(always)]
    pub fn span(&self) -> Span {
        self.span
    }

    #[inline(always)]
    pub fn start(&self) -> usize {
        self.span.start
    }

    #[inline(always)]
    pub fn end(&self) -> usize {
        self.span.end
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub enum LexingError {
    InvalidInteger(String),
    UnterminatedChar,
    UnterminatedString,
    UnknownEscape(char),
    #[default]
    UnexpectedCharacter,
}

impl std::fmt::Display for LexingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexingError::InvalidInteger(detail) => write!(f, "invalid integer literal: {detail}"),
            LexingError::UnterminatedChar => write!(f, "unterminated character literal"),
            LexingError::UnterminatedString => write!(f, "unterminated string literal"),
            LexingError::UnknownEscape(c) => write!(f, "unknown escape: \\{c}"),
            LexingError::UnexpectedCharacter => write!(f, "unexpected character"),
        }
    }
}

impl From<ParseIntError> for LexingError {
    fn from(e: ParseIntError) -> Self {
        LexingError::InvalidInteger(e.to_string())
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexingError)]
#[logos(skip r"[ \t\r\f\n]+")]
pub enum TokenKind {
    #[regex(r";[^\n]*", |lex| lex.slice().to_string())]
    Comment(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"[0-9]+", |lex| lex.slice().parse())]
    Integer(i64),

    #[regex(r"'(\\[^\n]|[^\\'\n])'?", lex_char)]
    Char(char),

    #[regex(r#""(\\[^\n]|[^"\\\n])*"?"#, lex_string)]
    StringLiteral(String),

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("@")]
    At,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,

    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Comment(text) => write!(f, "{text}"),
            TokenKind::Identifier(name) => write!(f, "{name}"),
            TokenKind::Integer(value) => write!(f, "{value}"),
            TokenKind::Char(c) => write!(f, "{}", crate::mini_vm::code::quote_char(*c)),
            TokenKind::StringLiteral(s) => write!(f, "{s:?}"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::At => write!(f, "@"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

fn unescape(c: char) -> Result<char, LexingError> {
    match c {
        'n' => Ok('\n'),
        't' => Ok('\t'),
        '\\' => Ok('\\'),
        '\'' => Ok('\''),
        '"' => Ok('"'),
        '0' => Ok('\0'),
        other => Err(LexingError::UnknownEscape(other)),
    }
}

fn lex_char(lex: &mut logos::Lexer<TokenKind>) -> Result<char, LexingError> {
    let slice = lex.slice();
    if slice.len() < 3 || !slice.ends_with('\'') {
        return Err(LexingError::UnterminatedChar);
    }
    let inner = &slice[1..slice.len() - 1];
    let mut chars = inner.chars();
    match chars.next() {
        Some('\\') => match chars.next() {
            Some(escape) => unescape(escape),
            None => Err(LexingError::UnterminatedChar),
        },
        Some(c) => Ok(c),
        None => Err(LexingError::UnterminatedChar),
    }
}

fn lex_string(lex: &mut logos::Lexer<TokenKind>) -> Result<String, LexingError> {
    let slice = lex.slice();
    let mut out = String::new();
    let mut chars = slice[1..].chars();
    loop {
        match chars.next() {
            // the first unescaped quote is the terminator
            Some('"') => return Ok(out),
            Some('\\') => match chars.next() {
                Some(escape) => out.push(unescape(escape)?),
                None => return Err(LexingError::UnterminatedString),
            },
            Some(c) => out.push(c),
            None => return Err(LexingError::UnterminatedString),
        }
    }
}
