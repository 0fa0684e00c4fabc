use std::process::Stdio;

use sysswap_core::{RestoreConfig, RestoreResult, WorkflowError};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Program and arguments of the integrity repair tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl RestoreCommand {
    pub fn system_file_checker() -> Self {
        Self::from_config(&RestoreConfig::default())
    }

    pub fn from_config(config: &RestoreConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }
}

pub fn build_restore_command(spec: &RestoreCommand) -> Command {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(windows)]
    command.creation_flags(crate::command::CREATE_NO_WINDOW);
    command
}

/// Runs the repair tool to completion. Every output line is forwarded to
/// `lines` as soon as it is read and kept in `RestoreResult::log` in the same
/// order. The run cannot be cancelled once started.
pub async fn run_restore(
    spec: &RestoreCommand,
    lines: mpsc::UnboundedSender<String>,
) -> Result<RestoreResult, WorkflowError> {
    tracing::info!("launching {} {}", spec.program, spec.args.join(" "));
    let mut child = build_restore_command(spec)
        .spawn()
        .map_err(|source| WorkflowError::ProcessLaunchFailed {
            program: spec.program.clone(),
            source,
        })?;

    let (merged_tx, mut merged_rx) = mpsc::unbounded_channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(stdout, merged_tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(stderr, merged_tx.clone())));
    }
    drop(merged_tx);

    let mut log = Vec::new();
    while let Some(line) = merged_rx.recv().await {
        // The caller may stop listening; the log still records everything.
        let _ = lines.send(line.clone());
        log.push(line);
    }
    for reader in readers {
        let _ = reader.await;
    }

    let status = child.wait().await.map_err(|err| {
        WorkflowError::Unexpected(format!("failed waiting for {}: {err}", spec.program))
    })?;
    let exit_code = status.code().unwrap_or(-1);
    tracing::info!("{} exited with code {exit_code}", spec.program);

    Ok(RestoreResult {
        success: status.success(),
        exit_code,
        log,
    })
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut splitter = OutputSplitter::default();
    loop {
        let available = match reader.fill_buf().await {
            Ok(available) => available,
            Err(err) => {
                tracing::warn!("failed reading repair tool output: {err}");
                break;
            }
        };
        if available.is_empty() {
            break;
        }
        let consumed = available.len();
        let lines = splitter.push(available);
        reader.consume(consumed);
        for line in lines {
            if tx.send(line).is_err() {
                return;
            }
        }
    }
    for line in splitter.finish() {
        let _ = tx.send(line);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputEncoding {
    Utf8,
    Utf16Le,
}

/// Incremental splitter for repair tool output.
///
/// `sfc` writes UTF-16LE on most consoles and redraws its progress with a
/// bare `\r`, so both `\r` and `\n` end a segment and a segment is released
/// as soon as its terminator arrives. The encoding is decided from the first
/// two bytes: a BOM, or a NUL in the odd position, means UTF-16LE.
#[derive(Debug, Default)]
pub(crate) struct OutputSplitter {
    encoding: Option<OutputEncoding>,
    pending: Vec<u8>,
}

impl OutputSplitter {
    /// Buffers `bytes` and returns every segment they complete.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let Some(encoding) = self.detect_encoding() else {
            return Vec::new();
        };

        let mut lines = Vec::new();
        while let Some((end, terminator_len)) = find_terminator(&self.pending, encoding) {
            let segment = decode(&self.pending[..end], encoding);
            self.pending.drain(..end + terminator_len);
            push_segment(&mut lines, segment);
        }
        lines
    }

    /// Releases whatever is left once the stream has ended.
    pub(crate) fn finish(&mut self) -> Vec<String> {
        let encoding = self.detect_encoding().unwrap_or(OutputEncoding::Utf8);
        let mut lines = self.push(&[]);
        let rest = std::mem::take(&mut self.pending);
        push_segment(&mut lines, decode(&rest, encoding));
        lines
    }

    fn detect_encoding(&mut self) -> Option<OutputEncoding> {
        if let Some(encoding) = self.encoding {
            return Some(encoding);
        }
        if self.pending.len() < 2 {
            return None;
        }
        let encoding = if self.pending.starts_with(&[0xFF, 0xFE]) {
            self.pending.drain(..2);
            OutputEncoding::Utf16Le
        } else if self.pending.starts_with(&[0xEF, 0xBB, 0xBF]) {
            self.pending.drain(..3);
            OutputEncoding::Utf8
        } else if self.pending[1] == 0 {
            OutputEncoding::Utf16Le
        } else {
            OutputEncoding::Utf8
        };
        self.encoding = Some(encoding);
        Some(encoding)
    }
}

/// Offset and byte length of the first `\r` or `\n` in `bytes`.
fn find_terminator(bytes: &[u8], encoding: OutputEncoding) -> Option<(usize, usize)> {
    match encoding {
        OutputEncoding::Utf8 => bytes
            .iter()
            .position(|&byte| matches!(byte, b'\r' | b'\n'))
            .map(|end| (end, 1)),
        // Only whole code units count; 0x0A can be the low byte of another character.
        OutputEncoding::Utf16Le => bytes
            .chunks_exact(2)
            .position(|unit| matches!(unit, [b'\r' | b'\n', 0]))
            .map(|unit| (unit * 2, 2)),
    }
}

fn decode(bytes: &[u8], encoding: OutputEncoding) -> String {
    match encoding {
        OutputEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        OutputEncoding::Utf16Le => {
            let units = bytes
                .chunks_exact(2)
                .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
                .collect::<Vec<_>>();
            String::from_utf16_lossy(&units)
        }
    }
}

fn push_segment(lines: &mut Vec<String>, segment: String) {
    let segment = segment.trim_end();
    if !segment.trim().is_empty() {
        lines.push(segment.to_string());
    }
}
