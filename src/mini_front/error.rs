use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::declare_error_type;
use crate::mini_front::lexer::token::{LexingError, Token};
use crate::utils::Span;

declare_error_type! {
    #[error("syntax error")]
    pub enum SyntaxError {
        InvalidToken(InvalidTokenError),
        UnexpectedToken(UnexpectedTokenError),
        UnexpectedEndOfFile(UnexpectedEndOfFileError),
        UnknownIdentifier(UnknownIdentifierError),
        UnsupportedOffsetRegister(UnsupportedOffsetRegisterError),
    }
}

pub type ParseResult<T> = Result<T, SyntaxError>;

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(lex::invalid_token))]
#[error("{kind}")]
pub struct InvalidTokenError {
    pub kind: LexingError,
    #[label("could not read a token here")]
    pub span: SourceSpan,
    #[source_code]
    pub src: String,
}

impl InvalidTokenError {
    pub fn new(kind: LexingError, span: Span, src: impl Into<String>) -> Self {
        Self {
            kind,
            span: span.into(),
            src: src.into(),
        }
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(syntax::unexpected_token))]
#[error("found unexpected token '{token}'")]
pub struct UnexpectedTokenError {
    pub token: Token,
    pub expected: String,
    #[label("expected {expected} here")]
    pub span: SourceSpan,
    #[source_code]
    pub src: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(syntax::unexpected_end_of_file),
    help("add more input to form a valid program")
)]
#[error("expected more input after this")]
pub struct UnexpectedEndOfFileError {
    #[label("required more input to parse")]
    pub span: SourceSpan,
    #[source_code]
    pub src: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(syntax::unknown_identifier),
    help("identifiers in assembly must name an opcode or a register")
)]
#[error("unknown identifier '{name}'")]
pub struct UnknownIdentifierError {
    pub name: String,
    #[label("neither an opcode nor a register")]
    pub span: SourceSpan,
    #[source_code]
    pub src: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(syntax::unsupported_offset_register),
    help("stack offsets are anchored at sp or bp")
)]
#[error("unsupported offset register '{name}'")]
pub struct UnsupportedOffsetRegisterError {
    pub name: String,
    #[label("only sp and bp can anchor a stack offset")]
    pub span: SourceSpan,
    #[source_code]
    pub src: String,
}

declare_error_type! {
    #[error("emit error")]
    pub enum EmitError {
        UnsupportedNode(UnsupportedNodeError),
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(emit::unsupported_node),
    help("label references must be resolved by the linker before emission")
)]
#[error("cannot emit node: {node}")]
pub struct UnsupportedNodeError {
    pub node: String,
}
