//! Re-run a program as a child that shares our terminal.

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::{ExitStatus, Stdio},
};

use color_eyre::Result;
use log::*;
use tokio::process::Command;

/// Command for `program` with `args` passed through untouched and all three
/// standard streams inherited.
pub fn build_command<I, S>(program: &Path, args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut c = Command::new(program);
    c.args(args);
    c.stdin(Stdio::inherit());
    c.stdout(Stdio::inherit());
    c.stderr(Stdio::inherit());
    c
}

/// Spawn and wait for the child.
pub async fn run_inherited<I, S>(program: &Path, args: I) -> Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = build_command(program, args);
    info!(target: "Launcher", "Spawning {:?}", cmd);
    let mut child = cmd.spawn()?;
    let status = child.wait().await?;
    info!(target: "Launcher", "Child exit {:?}", status);
    Ok(status)
}

/// Child arguments: our own `--config` first, then `args` verbatim.
pub fn relaunch_args<I, S>(config: &Path, args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut forwarded = vec![OsString::from("--config"), config.as_os_str().to_owned()];
    forwarded.extend(args.into_iter().map(|a| a.as_ref().to_owned()));
    forwarded
}

/// Run this very executable again with the same config file and `args`.
pub async fn relaunch<I, S>(config: &Path, args: I) -> Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let exe = std::env::current_exe()?;
    run_inherited(&exe, relaunch_args(config, args)).await
}

/// Exit code to hand back to our own parent.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
