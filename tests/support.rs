use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

/// Runs the binary inside `workdir` so no default config is picked up.
///
/// # Errors
///
/// Returns an error when the binary path is unknown or the process cannot
/// be spawned.
pub fn run_cipstress<I, S>(workdir: &Path, args: I) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = cipstress_bin()?;
    Command::new(bin)
        .current_dir(workdir)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .map_err(|err| format!("run cipstress failed: {}", err))
}

#[must_use]
pub fn describe(output: &Output) -> String {
    format!(
        "status: {}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

fn cipstress_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_cipstress").map_or_else(
        || Err("CARGO_BIN_EXE_cipstress missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
