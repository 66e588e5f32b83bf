//! Local shell over a pseudo-terminal.
//!
//! [`spawn_shell`] runs the user's `$SHELL` in a [portable-pty] PTY and returns a
//! [`StreamBridge`] over its master side together with a [`PtyResizer`]. Hand the
//! resizer's callback to the terminal as `on_resize` so the PTY follows every fit.
//!
//! [portable-pty]: https://docs.rs/portable-pty

use crate::geometry::ResizeCallback;
use crate::transport::StreamBridge;
use anyhow::Context as _;
use parking_lot::Mutex;
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use std::io::{self, Read};
use std::rc::Rc;
use std::sync::Arc;

/// A spawned shell: its output bridge, resize control and process.
pub struct PtyShell {
    pub bridge: StreamBridge,
    pub resizer: PtyResizer,
    pub process: ShellProcess,
}

/// Spawn the user's shell (`$SHELL`, falling back to `/bin/sh`).
pub fn spawn_shell(columns: usize, rows: usize) -> anyhow::Result<PtyShell> {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".into());
    let mut command = CommandBuilder::new(&shell);
    command.env("TERM", "xterm-256color");
    command.env("COLORTERM", "truecolor");
    spawn(command, columns, rows)
}

/// Spawn `command` in a new PTY of `columns` x `rows`.
pub fn spawn(command: CommandBuilder, columns: usize, rows: usize) -> anyhow::Result<PtyShell> {
    let pair = native_pty_system()
        .openpty(pty_size(columns, rows))
        .context("failed to open pty")?;

    let child = pair
        .slave
        .spawn_command(command)
        .context("failed to spawn shell")?;
    // Only the child holds the slave side, so its exit ends the stream.
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .context("failed to clone pty reader")?;
    let writer = pair.master.take_writer().context("failed to take pty writer")?;
    let bridge = StreamBridge::new(PtyReader(reader), writer)?;

    tracing::debug!(pid = child.process_id(), columns, rows, "spawned shell");

    Ok(PtyShell {
        bridge,
        resizer: PtyResizer {
            master: Arc::new(Mutex::new(pair.master)),
        },
        process: ShellProcess { child },
    })
}

/// Resizes the PTY behind a shell.
#[derive(Clone)]
pub struct PtyResizer {
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
}

impl PtyResizer {
    pub fn resize(&self, columns: usize, rows: usize) -> anyhow::Result<()> {
        self.master
            .lock()
            .resize(pty_size(columns, rows))
            .context("failed to resize pty")
    }

    /// A resize callback for
    /// [`with_resize_callback`](crate::TerminalProps::with_resize_callback).
    pub fn callback(&self) -> ResizeCallback {
        let resizer = self.clone();
        Rc::new(move |columns, rows| {
            if let Err(error) = resizer.resize(columns, rows) {
                tracing::warn!("{error:#}");
            }
        })
    }
}

/// The shell process. Killed on drop if still running.
pub struct ShellProcess {
    child: Box<dyn Child + Send + Sync>,
}

impl ShellProcess {
    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for ShellProcess {
    fn drop(&mut self) {
        if self.is_running()
            && let Err(error) = self.child.kill()
        {
            tracing::warn!(%error, "failed to kill shell");
        }
    }
}

/// Reading a PTY master whose child has exited fails with `EIO` on Linux; that is
/// the end of the stream, not an error.
struct PtyReader(Box<dyn Read + Send>);

impl Read for PtyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.read(buf) {
            Err(error) if is_hangup(&error) => Ok(0),
            result => result,
        }
    }
}

fn is_hangup(error: &io::Error) -> bool {
    cfg!(unix) && error.raw_os_error() == Some(5)
}

fn pty_size(columns: usize, rows: usize) -> PtySize {
    let clamp = |value: usize| value.clamp(1, u16::MAX as usize) as u16;
    PtySize {
        rows: clamp(rows),
        cols: clamp(columns),
        pixel_width: 0,
        pixel_height: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pty_size_clamped() {
        let size = pty_size(0, 100_000);
        assert_eq!((size.cols, size.rows), (1, u16::MAX));

        let size = pty_size(120, 40);
        assert_eq!((size.cols, size.rows), (120, 40));
    }

    #[test]
    fn test_hangup_reads_as_eof() {
        struct HungUp;
        impl Read for HungUp {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from_raw_os_error(5))
            }
        }

        let mut reader = PtyReader(Box::new(HungUp));
        let result = reader.read(&mut [0u8; 8]);
        if cfg!(unix) {
            assert_eq!(result.unwrap(), 0);
        } else {
            assert!(result.is_err());
        }
    }
}
