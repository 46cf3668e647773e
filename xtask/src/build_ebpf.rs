use std::process::Command;

use anyhow::Context as _;
use clap::Parser;

use crate::EBPF_DIR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    BpfEl,
    BpfEb,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::BpfEl => "bpfel-unknown-none",
            Architecture::BpfEb => "bpfeb-unknown-none",
        }
    }
}

impl std::str::FromStr for Architecture {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "bpfel-unknown-none" => Architecture::BpfEl,
            "bpfeb-unknown-none" => Architecture::BpfEb,
            _ => return Err("invalid target"),
        })
    }
}

impl std::fmt::Display for Architecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Parser)]
pub struct Options {
    /// Set the endianness of the BPF target
    #[clap(default_value = "bpfel-unknown-none", long)]
    pub target: Architecture,
    /// Build the release target
    #[clap(long)]
    pub release: bool,
}

pub fn build_ebpf(opts: Options) -> Result<(), anyhow::Error> {
    let Options { target, release } = opts;

    // the probe crate is its own workspace; share the root target dir so the
    // agent finds the object under target/<arch>/<profile>
    let mut cmd = Command::new("cargo");
    cmd.current_dir(EBPF_DIR)
        .env_remove("RUSTUP_TOOLCHAIN")
        .args(["+nightly", "build", "-Z", "build-std=core"])
        .args(["--target", target.as_str()])
        .args(["--target-dir", "../target"]);

    if release {
        cmd.arg("--release");
    }

    let status = cmd
        .status()
        .with_context(|| format!("failed to build bpf program in {}", EBPF_DIR))?;

    anyhow::ensure!(
        status.success(),
        "failed to build bpf program in {}: {}",
        EBPF_DIR,
        status
    );
    Ok(())
}
