use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aya::{
    maps::{MapData, RingBuf},
    programs::TracePoint,
    Ebpf,
};
use aya_log::EbpfLogger;
use log::{debug, info, warn};

/// Name of the probe object produced by `cargo xtask build-ebpf`.
pub const EBPF_OBJECT: &str = "exectrace-ebpf";

/// Program and map names inside the probe object.
pub const EXEC_PROGRAM: &str = "enter_execve";
pub const EVENTS_MAP: &str = "EVENTS";

/// A tracepoint program to be loaded and attached.
pub struct TracepointConfig<'a> {
    pub program_name: &'a str,
    pub category: &'a str,
    pub name: &'a str,
}

pub const EXECVE_TRACEPOINT: TracepointConfig<'static> = TracepointConfig {
    program_name: EXEC_PROGRAM,
    category: "syscalls",
    name: "sys_enter_execve",
};

/// The loaded probe. Dropping it detaches the program.
pub struct ExecTracer {
    ebpf: Ebpf,
}

impl ExecTracer {
    /// Load the probe object at `path`.
    ///
    /// When `ebpf_logging` is set the probe's `aya-log` records are
    /// forwarded to the `log` facade; failing to set that up is not fatal.
    pub fn load(path: &Path, ebpf_logging: bool) -> Result<Self> {
        let mut ebpf = Ebpf::load_file(path)
            .with_context(|| format!("failed to load eBPF object {}", path.display()))?;

        if ebpf_logging {
            if let Err(e) = EbpfLogger::init(&mut ebpf) {
                warn!("failed to initialize eBPF logger for exec tracer: {}", e);
            }
        }

        Ok(ExecTracer { ebpf })
    }

    pub fn attach(&mut self) -> Result<()> {
        attach_tracepoint(&mut self.ebpf, &EXECVE_TRACEPOINT)
    }

    /// Take ownership of the `EVENTS` ring buffer.
    pub fn take_events(&mut self) -> Result<RingBuf<MapData>> {
        let map = self
            .ebpf
            .take_map(EVENTS_MAP)
            .with_context(|| format!("map {} not found", EVENTS_MAP))?;
        RingBuf::try_from(map).with_context(|| format!("map {} is not a ring buffer", EVENTS_MAP))
    }
}

pub fn attach_tracepoint(ebpf: &mut Ebpf, config: &TracepointConfig) -> Result<()> {
    info!("Loading program {}", config.program_name);
    let program: &mut TracePoint = ebpf
        .program_mut(config.program_name)
        .with_context(|| format!("failed to find {} program", config.program_name))?
        .try_into()?;
    program.load()?;
    program
        .attach(config.category, config.name)
        .with_context(|| format!("failed to attach {}:{}", config.category, config.name))?;
    Ok(())
}

/// Path of the probe object in the workspace build output.
///
/// `EXECTRACE_EBPF_DIR` at build time replaces the default
/// `target/bpfel-unknown-none/{debug,release}` directory.
pub fn get_ebpf_path(program_name: &str) -> PathBuf {
    let ebpf_dir = if cfg!(debug_assertions) {
        option_env!("EXECTRACE_EBPF_DIR").unwrap_or("target/bpfel-unknown-none/debug")
    } else {
        option_env!("EXECTRACE_EBPF_DIR").unwrap_or("target/bpfel-unknown-none/release")
    };

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .join(ebpf_dir)
        .join(program_name)
}

/// Lift `RLIMIT_MEMLOCK` so map creation works on kernels that still
/// charge BPF memory against it.
pub fn bump_memlock_rlimit() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {}", ret);
    }
}
