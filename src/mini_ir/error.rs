use miette::Diagnostic;
use thiserror::Error;

use crate::declare_error_type;
use crate::mini_front::error::SyntaxError;

declare_error_type! {
    #[error("ir error")]
    pub enum IrError {
        Syntax(SyntaxError),
        Link(LinkError),
    }
}

declare_error_type! {
    #[error("link error")]
    pub enum LinkError {
        TooManyEntryPoints(TooManyEntryPointsError),
        UndefinedSymbols(UndefinedSymbolsError),
        UnexportedOverwrite(UnexportedOverwriteError),
        DuplicateSymbol(DuplicateSymbolError),
        CyclicSizeof(CyclicSizeofError),
        ConstantNotFound(ConstantNotFoundError),
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(link::too_many_entry_points),
    help("exactly one unit may declare `global <name>`")
)]
#[error("too many entry points: {count}")]
pub struct TooManyEntryPointsError {
    pub count: usize,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(link::undefined_symbols),
    help("every referenced name needs a defining label or constant in some unit")
)]
#[error("undefined symbols: {names}")]
pub struct UndefinedSymbolsError {
    pub names: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(
    code(link::unexported_overwrite),
    help("a symbol satisfying an import must be exported by its unit")
)]
#[error("unexported overwrite of imported symbol '{name}'")]
pub struct UnexportedOverwriteError {
    pub name: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(link::duplicate_symbol))]
#[error("symbol already defined: '{name}'")]
pub struct DuplicateSymbolError {
    pub name: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(link::cyclic_sizeof))]
#[error("cyclic sizeof reference through '{name}'")]
pub struct CyclicSizeofError {
    pub name: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(link::constant_not_found))]
#[error("sizeof refers to unknown constant '{name}'")]
pub struct ConstantNotFoundError {
    pub name: String,
}
