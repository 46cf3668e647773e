use std::process::Command;

use anyhow::Context as _;
use clap::Parser;

use crate::build_ebpf::{build_ebpf, Architecture, Options as BuildOptions};

#[derive(Debug, Parser)]
pub struct Options {
    /// Set the endianness of the BPF target
    #[clap(default_value = "bpfel-unknown-none", long)]
    pub bpf_target: Architecture,
    /// Build and run the release target
    #[clap(long)]
    pub release: bool,
    /// The command used to wrap the agent
    #[clap(short, long, default_value = "sudo -E")]
    pub runner: String,
    /// Arguments passed to the agent
    #[clap(name = "args", last = true)]
    pub run_args: Vec<String>,
}

fn build(opts: &Options) -> Result<(), anyhow::Error> {
    let mut args = vec!["build", "--package", "exectrace"];
    if opts.release {
        args.push("--release")
    }
    let status = Command::new("cargo")
        .args(&args)
        .status()
        .context("failed to build the agent")?;
    anyhow::ensure!(status.success(), "failed to build the agent: {}", status);
    Ok(())
}

/// Build the probe and the agent, then run the agent under `runner`.
pub fn run(opts: Options) -> Result<(), anyhow::Error> {
    build_ebpf(BuildOptions {
        target: opts.bpf_target,
        release: opts.release,
    })?;
    build(&opts)?;

    let profile = if opts.release { "release" } else { "debug" };
    let bin_path = format!("target/{}/exectrace", profile);

    let mut run_args: Vec<&str> = opts.run_args.iter().map(String::as_str).collect();
    let mut args: Vec<&str> = opts.runner.split_whitespace().collect();
    args.push(bin_path.as_str());
    args.append(&mut run_args);

    let (program, rest) = args
        .split_first()
        .context("runner must not be empty")?;
    let status = Command::new(program)
        .args(rest)
        .status()
        .with_context(|| format!("failed to run `{}`", args.join(" ")))?;
    anyhow::ensure!(status.success(), "agent exited with {}", status);
    Ok(())
}
