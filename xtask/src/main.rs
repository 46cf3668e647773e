mod build_ebpf;
mod codegen;
mod run;

use clap::Parser;

#[derive(Debug, Parser)]
pub struct Options {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Build the probe object for the BPF target
    BuildEbpf(build_ebpf::Options),
    /// Generate the kernel bindings used by the probe
    Codegen(codegen::Options),
    /// Build everything and run the agent as root
    Run(run::Options),
}

/// Directory of the probe crate, relative to the workspace root.
pub static EBPF_DIR: &str = "exectrace-ebpf";

fn main() -> Result<(), anyhow::Error> {
    let opts = Options::parse();

    use Command::*;
    match opts.command {
        BuildEbpf(opts) => build_ebpf::build_ebpf(opts)?,
        Codegen(opts) => codegen::generate(opts)?,
        Run(opts) => run::run(opts)?,
    }

    Ok(())
}
