use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::error::AnalyzeError;

/// Default bound for one inspection-tool invocation. A hung `nm` must not
/// block the application indefinitely.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct CapturedToolOutput {
    pub status: std::process::ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

fn spawn_capture_thread(
    reader: Option<impl std::io::Read + Send + 'static>,
) -> Option<JoinHandle<Result<Vec<u8>, std::io::Error>>> {
    reader.map(|mut r| {
        std::thread::spawn(move || {
            let mut buf: Vec<u8> = vec![];
            r.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_capture_thread(
    tool: &str,
    handle: Option<JoinHandle<Result<Vec<u8>, std::io::Error>>>,
) -> Result<Vec<u8>, AnalyzeError> {
    let Some(handle) = handle else {
        return Ok(vec![]);
    };
    handle
        .join()
        .map_err(|_| AnalyzeError::WaitFailed {
            tool: tool.to_string(),
            source: std::io::Error::other("capture thread panicked"),
        })?
        .map_err(|source| AnalyzeError::WaitFailed {
            tool: tool.to_string(),
            source,
        })
}

/// Run one inspection tool to completion, capturing stdout/stderr on
/// dedicated threads so a chatty child cannot deadlock on a full pipe.
/// Expiry kills the child and surfaces `ToolTimedOut`.
pub fn run_tool_capture_with_timeout(
    tool: &str,
    mut command: Command,
    display_command: String,
    timeout: Duration,
) -> Result<CapturedToolOutput, AnalyzeError> {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|source| AnalyzeError::SpawnFailed {
        tool: tool.to_string(),
        source,
    })?;

    let stdout_thread = spawn_capture_thread(child.stdout.take());
    let stderr_thread = spawn_capture_thread(child.stderr.take());

    let maybe_status =
        ChildExt::wait_timeout(&mut child, timeout).map_err(|source| AnalyzeError::WaitFailed {
            tool: tool.to_string(),
            source,
        })?;
    let Some(status) = maybe_status else {
        let _ = child.kill();
        let _ = child.wait();
        let _ = join_capture_thread(tool, stdout_thread);
        let _ = join_capture_thread(tool, stderr_thread);
        return Err(AnalyzeError::ToolTimedOut {
            tool: tool.to_string(),
            command: display_command,
            timeout_ms: timeout.as_millis() as u64,
        });
    };

    let stdout = join_capture_thread(tool, stdout_thread)?;
    let stderr = join_capture_thread(tool, stderr_thread)?;
    Ok(CapturedToolOutput {
        status,
        stdout,
        stderr,
    })
}

/// Capture stdout of a tool that is expected to succeed, folding a nonzero
/// exit into a toolchain error that carries the child's stderr.
pub fn run_tool_expect_success(
    tool: &str,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, AnalyzeError> {
    let display_command = format!("{} {}", program, args.join(" "));
    let mut command = Command::new(program);
    command.args(args);
    let out = run_tool_capture_with_timeout(tool, command, display_command, timeout)?;
    if !out.status.success() {
        let stderr_text = String::from_utf8_lossy(&out.stderr);
        let detail = if stderr_text.trim().is_empty() {
            format!("exit {}", out.status.code().unwrap_or(1))
        } else {
            stderr_text.trim().to_string()
        };
        return Err(AnalyzeError::toolchain(format!(
            "{} failed: {}",
            program, detail
        )));
    }
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}
