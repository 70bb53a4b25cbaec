//! Thin collaborator that spawns the debugger process and wires its stdio
//! into a [`Session`]. Everything here is optional: callers owning their
//! own process management hand streams to [`Session::start`] directly.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::config::{DebuggerFlavor, SessionConfig};
use crate::error::{Error, Result};
use crate::session::Session;

/// A builder for launching GDB or lldb-mi with an MI interpreter on its
/// stdio.
pub struct DebuggerBuilder {
    path: PathBuf,
    config: SessionConfig,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl DebuggerBuilder {
    pub fn new(path: impl Into<PathBuf>, config: SessionConfig) -> Self {
        DebuggerBuilder { path: path.into(), config, args: Vec::new(), working_dir: None }
    }

    /// Extra command line arguments for the debugger itself.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Spawn the debugger and begin a session over its stdio. The child
    /// handle is returned so the caller controls the process lifetime.
    pub fn try_spawn(self) -> Result<(Session, Child)> {
        let mut command = Command::new(&self.path);
        match self.config.flavor {
            DebuggerFlavor::Gdb => {
                command.arg("--interpreter").arg("mi");
            }
            DebuggerFlavor::Lldb => {
                command.arg("--interpreter");
            }
        }
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        debug!(command = ?command, "starting debugger process");

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("debugger stdin was not piped")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Io(std::io::Error::other("debugger stdout was not piped")))?;

        let session = Session::start(self.config, stdout, stdin);
        Ok((session, child))
    }
}
