//! minivm is a small execution stack: a register+stack+heap virtual
//! machine, a flat assembly front-end, and a richer IR front-end whose
//! translation units are combined by a linker into one self-contained
//! program.
//!
//! The pipeline is source text -> tokens -> instruction nodes ->
//! (optionally linked) nodes -> flat code sequence -> runtime.

pub mod mini_asm;
pub mod mini_front;
pub mod mini_ir;
pub mod mini_macro;
pub mod mini_vm;
pub mod utils;

use mini_front::emit::emit;
use mini_vm::code::Code;
use mini_vm::runtime::{Config, Runtime};

/// Tokenizes, parses and emits one flat assembly source.
pub fn assemble(source: &str) -> miette::Result<Vec<Code>> {
    let nodes = mini_asm::parse(source)?;
    let codes = emit(&nodes)?;
    Ok(codes)
}

/// Parses every IR source as a translation unit, links them in order and
/// emits the combined program.
pub fn link_sources(sources: &[String]) -> miette::Result<Vec<Code>> {
    let mut units = Vec::with_capacity(sources.len());
    for source in sources {
        units.push(mini_ir::parse(source)?);
    }
    let nodes = mini_ir::link(units)?;
    let codes = emit(&nodes)?;
    Ok(codes)
}

/// Runs a program to completion on a fresh runtime.
pub fn execute(program: Vec<Code>, config: &Config) -> miette::Result<()> {
    let mut runtime = Runtime::new(program, config);
    runtime.run()?;
    Ok(())
}
