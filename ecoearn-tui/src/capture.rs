//! Live capture through an external QR reader such as `zbarcam`.

use std::process::Stdio;

use async_trait::async_trait;
use ecoearn_core::scanner::{CaptureError, FrameSource, Sample};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

/// Prefix `zbarcam` prints unless started with `--raw`.
const SYMBOLOGY_PREFIX: &str = "QR-Code:";

/// Reader process whose stdout yields one decoded payload per line.
///
/// The process is killed when this value is dropped, which is how an
/// aborted scan releases the camera.
pub(crate) struct ReaderProcess {
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl ReaderProcess {
    /// Start `command_line`, split on whitespace.
    pub(crate) fn spawn(command_line: &str) -> Result<Self, CaptureError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| CaptureError::Unavailable("no capture command configured".into()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| CaptureError::Unavailable(format!("{program}: {err}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::Unavailable(format!("{program}: no stdout")))?;
        debug!(program, "capture process started");

        Ok(Self {
            _child: child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

#[async_trait]
impl FrameSource for ReaderProcess {
    async fn next_sample(&mut self) -> Result<Option<Sample>, CaptureError> {
        let Some(line) = self.lines.next_line().await? else {
            return Ok(None);
        };
        let text = line.strip_prefix(SYMBOLOGY_PREFIX).unwrap_or(&line);
        Ok(Some(Sample::Text(text.trim().to_owned())))
    }
}
