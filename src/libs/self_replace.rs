//! Replacing the running executable and restarting the application.
//!
//! A running binary cannot overwrite itself on every platform, so the new
//! executable is downloaded next to it as `<exe>.new` and a small helper script
//! performs the swap after the process exits:
//!
//! 1. wait for the running copy to release its file handle
//! 2. rename `<exe>` to `<exe>.backup`, then `<exe>.new` to `<exe>`
//!    (restoring the backup if the second rename fails)
//! 3. run the new binary with `--version`; a failing binary is swapped back
//! 4. optionally write the new version record, then relaunch the application
//! 5. delete the backup once the relaunched process is alive
//!
//! The Windows flavor is a silent batch file, everything else gets a POSIX
//! shell script.

use crate::libs::error::{UpdateError, UpdateResult};
use crate::libs::version::{Version, VersionRecord};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

pub const NEW_SUFFIX: &str = "new";
pub const BACKUP_SUFFIX: &str = "backup";

/// How the application has to be restarted once an install finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartMode {
    /// Run the helper script detached and exit; the script relaunches the application.
    SingleBinary { script: PathBuf },
    /// Start the current executable again with the current arguments and exit.
    MultiFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    Batch,
    Shell,
}

impl ScriptFlavor {
    pub fn current() -> Self {
        if cfg!(windows) {
            ScriptFlavor::Batch
        } else {
            ScriptFlavor::Shell
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ScriptFlavor::Batch => "lru_tracker_updater.bat",
            ScriptFlavor::Shell => "lru_tracker_updater.sh",
        }
    }
}

/// `<exe>.new` next to `live`.
pub fn staged_binary_path(live: &Path) -> PathBuf {
    sibling_with_suffix(live, NEW_SUFFIX)
}

pub fn backup_binary_path(live: &Path) -> PathBuf {
    sibling_with_suffix(live, BACKUP_SUFFIX)
}

fn sibling_with_suffix(live: &Path, suffix: &str) -> PathBuf {
    let mut name = live.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    live.with_file_name(name)
}

/// Helper script for the current platform.
pub fn helper_script(live: &Path) -> String {
    helper_script_for(live, ScriptFlavor::current())
}

pub fn helper_script_for(live: &Path, flavor: ScriptFlavor) -> String {
    render_script(live, None, flavor)
}

/// Like [`helper_script_for`], but the script also writes `version` to
/// `record` once the swapped binary passed its health check.
pub fn helper_script_recording(live: &Path, record: &Path, version: &Version, flavor: ScriptFlavor) -> String {
    render_script(live, Some((record, version)), flavor)
}

/// Single-quoted for `sh`; embedded quotes are closed, escaped and reopened.
fn sh_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Double-quoted for `cmd`. Windows paths cannot contain `"`, but `%` would expand.
fn batch_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('%', "%%"))
}

fn render_script(live: &Path, record: Option<(&Path, &Version)>, flavor: ScriptFlavor) -> String {
    let dir = live.parent().map(|p| p.display().to_string()).unwrap_or_else(|| ".".to_string());
    let name = live.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let new = format!("{}.{}", name, NEW_SUFFIX);
    let backup = format!("{}.{}", name, BACKUP_SUFFIX);

    match flavor {
        ScriptFlavor::Batch => {
            let (dir, live, new, backup) = (batch_quote(&dir), batch_quote(&name), batch_quote(&new), batch_quote(&backup));
            let record_line = record
                .map(|(path, version)| format!("(echo {})>{}\n", version, batch_quote(&path.display().to_string())))
                .unwrap_or_default();
            format!(
                r#"@echo off
REM Swap in the downloaded executable once the running copy has exited
timeout /t 2 /nobreak >nul 2>nul
cd /d {dir}
if exist {backup} del /f /q {backup} >nul 2>nul
move /y {live} {backup} >nul 2>nul
if errorlevel 1 goto done
move /y {new} {live} >nul 2>nul
if errorlevel 1 goto restore
{live} --version >nul 2>nul
if errorlevel 1 goto revert
{record_line}start "" {live}
if errorlevel 1 goto done
del /f /q {backup} >nul 2>nul
goto done
:revert
move /y {live} {new} >nul 2>nul
:restore
move /y {backup} {live} >nul 2>nul
start "" {live}
:done
(goto) 2>nul & del "%~f0"
"#
            )
        }
        ScriptFlavor::Shell => {
            let run = sh_quote(&format!("./{}", name));
            let (dir, live, new, backup) = (sh_quote(&dir), sh_quote(&name), sh_quote(&new), sh_quote(&backup));
            let record_line = record
                .map(|(path, version)| format!("printf '%s\\n' {} > {}\n", sh_quote(&version.to_string()), sh_quote(&path.display().to_string())))
                .unwrap_or_default();
            format!(
                r#"#!/bin/sh
# Swap in the downloaded executable once the running copy has exited
cd {dir} || exit 1
sleep 2
rm -f {backup}
mv -f {live} {backup} || exit 1
if ! mv -f {new} {live}; then
    mv -f {backup} {live}
    exit 1
fi
chmod +x {live}
if ! {run} --version >/dev/null 2>&1; then
    mv -f {live} {new}
    mv -f {backup} {live}
    nohup {run} >/dev/null 2>&1 &
    rm -f "$0"
    exit 1
fi
{record_line}nohup {run} >/dev/null 2>&1 &
pid=$!
sleep 1
# The backup goes only once the relaunched process is still alive.
if kill -0 "$pid" 2>/dev/null; then
    rm -f {backup}
fi
rm -f "$0"
"#
            )
        }
    }
}

/// Writes the helper script that will install `new_binary` over the live executable.
///
/// `new_binary` must be the `<exe>.new` sibling of the executable it replaces.
/// Returns the path of the script; nothing is executed yet.
pub fn schedule_self_replace(new_binary: &Path) -> UpdateResult<PathBuf> {
    write_script(new_binary, None)
}

/// [`schedule_self_replace`] whose script also updates the version record
/// after a successful swap, so the next start sees `version` as its baseline.
pub fn schedule_self_replace_recording(new_binary: &Path, record: &VersionRecord, version: &Version) -> UpdateResult<PathBuf> {
    write_script(new_binary, Some((record.path(), version)))
}

fn write_script(new_binary: &Path, record: Option<(&Path, &Version)>) -> UpdateResult<PathBuf> {
    let live = live_binary_for(new_binary)?;
    let flavor = ScriptFlavor::current();
    let dir = live.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let script_path = dir.join(flavor.file_name());

    fs::write(&script_path, render_script(&live, record, flavor)).map_err(|e| UpdateError::io(&script_path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755)).map_err(|e| UpdateError::io(&script_path, e))?;
    }

    info!("Scheduled replacement of {} via {}", live.display(), script_path.display());
    Ok(script_path)
}

fn live_binary_for(new_binary: &Path) -> UpdateResult<PathBuf> {
    let name = new_binary.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    match name.strip_suffix(&format!(".{}", NEW_SUFFIX)) {
        Some(live_name) if !live_name.is_empty() => Ok(new_binary.with_file_name(live_name)),
        _ => Err(UpdateError::io(
            new_binary,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "staged binary must end with .new"),
        )),
    }
}

/// Starts whatever brings the updated application back and exits this process.
pub fn restart_application(mode: &RestartMode) -> UpdateResult<()> {
    spawn_restart(mode)?;
    std::process::exit(0);
}

/// Spawns the restart process without exiting.
pub fn spawn_restart(mode: &RestartMode) -> UpdateResult<()> {
    let mut command = match mode {
        RestartMode::SingleBinary { script } => script_command(script),
        RestartMode::MultiFile => {
            let exe = env::current_exe().map_err(|e| UpdateError::io("current executable", e))?;
            let mut command = Command::new(exe);
            command.args(env::args_os().skip(1));
            command
        }
    };

    detach(&mut command);
    command.spawn().map_err(|e| UpdateError::io("restart", e))?;
    Ok(())
}

fn script_command(script: &Path) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(script);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg(script);
        command
    }
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(|| {
            // New session so the child survives our exit.
            nix::unistd::setsid()?;
            Ok(())
        });
    }
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x08000000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}
