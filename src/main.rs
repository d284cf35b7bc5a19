#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use clap::Parser;
use miette::{bail, Context, IntoDiagnostic};

use minivm::mini_vm::debug::dump_text;
use minivm::mini_vm::runtime::{Config, Runtime, DEFAULT_HEAP_SIZE, DEFAULT_STACK_SIZE};

#[derive(Parser)]
#[command(name = "minivm")]
#[command(
    bin_name = "minivm",
    version,
    about = "Small register+stack+heap virtual machine",
    long_about = "Executes flat assembly (.mini) directly, or links one or more IR \
                  translation units (.ir) into a single program and executes that."
)]
enum MiniVmCli {
    #[command(about = "Assemble or link the given files, then execute")]
    Run {
        files: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_STACK_SIZE, help = "stack capacity in cells")]
        stack: usize,
        #[arg(long, default_value_t = DEFAULT_HEAP_SIZE, help = "heap capacity in cells")]
        heap: usize,
    },
    #[command(about = "Link IR units and write the disassembly")]
    Link {
        files: Vec<String>,
        #[arg(short, long, help = "write the listing here instead of stdout")]
        output: Option<String>,
    },
}

fn main() -> miette::Result<()> {
    match MiniVmCli::parse() {
        MiniVmCli::Run { files, stack, heap } => run(&files, stack, heap),
        MiniVmCli::Link { files, output } => link(&files, output),
    }
}

fn read_source(path: &str) -> miette::Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read source file '{path}'"))
}

fn run(files: &[String], stack: usize, heap: usize) -> miette::Result<()> {
    let program = match files {
        [] => bail!("at least one file must be specified"),
        [file] if file.ends_with(".mini") => minivm::assemble(&read_source(file)?)?,
        files if files.iter().all(|f| f.ends_with(".ir")) => {
            let mut sources = Vec::with_capacity(files.len());
            for file in files {
                sources.push(read_source(file)?);
            }
            minivm::link_sources(&sources)?
        }
        _ => bail!("run takes a single .mini file or one or more .ir files"),
    };

    let config = Config {
        stack_size: stack,
        heap_size: heap,
    };
    let mut runtime = Runtime::new(program, &config);
    runtime.run()?;
    Ok(())
}

fn link(files: &[String], output: Option<String>) -> miette::Result<()> {
    if files.is_empty() {
        bail!("at least one file must be specified");
    }
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        sources.push(read_source(file)?);
    }
    let program = minivm::link_sources(&sources)?;
    let listing = dump_text(&program)?;
    match output {
        Some(path) => std::fs::write(&path, listing)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write listing to '{path}'")),
        None => {
            print!("{listing}");
            Ok(())
        }
    }
}
