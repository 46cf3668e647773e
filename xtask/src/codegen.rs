use std::{fs, path::PathBuf, process::Command};

use anyhow::Context as _;
use clap::Parser;

use crate::EBPF_DIR;

/// Kernel types the probe reads fields of.
const TYPES: &[&str] = &["task_struct", "fs_struct", "path", "dentry", "qstr"];

#[derive(Debug, Parser)]
pub struct Options {
    /// BTF of the kernel to generate bindings for
    #[clap(long, default_value = "/sys/kernel/btf/vmlinux")]
    pub btf: PathBuf,
}

/// Write `exectrace-ebpf/src/vmlinux.rs` with `aya-tool generate`.
pub fn generate(opts: Options) -> Result<(), anyhow::Error> {
    let output = Command::new("aya-tool")
        .arg("generate")
        .arg("--btf")
        .arg(&opts.btf)
        .args(TYPES)
        .output()
        .context("failed to run aya-tool, install it with `cargo install --git https://github.com/aya-rs/aya aya-tool`")?;

    anyhow::ensure!(
        output.status.success(),
        "aya-tool failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let dst = PathBuf::from(EBPF_DIR).join("src").join("vmlinux.rs");
    fs::write(&dst, &output.stdout)
        .with_context(|| format!("failed to write {}", dst.display()))?;
    Ok(())
}
