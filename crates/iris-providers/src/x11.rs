//! X11 command-bridge backends.
//!
//! Pointer and keyboard synthesis go through `xdotool`; capture prefers
//! `scrot` and falls back to ImageMagick `import`. Every child process runs
//! with a bounded wait. Tool availability is probed once at construction.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::capability::{
    Captured, KeyboardProvider, PointerButton, PointerProvider, ProviderError, ScreenshotProvider,
    ScrollDirection,
};
use crate::retry::RetryPolicy;

const XDOTOOL: &str = "xdotool";
const SCROT: &str = "scrot";
const IMPORT: &str = "import";

const CAPTURE_TIMEOUT_MS: u64 = 10_000;
const INPUT_TIMEOUT_MS: u64 = 5_000;

/// Checks whether an executable resolves on PATH. Probed once per backend at
/// factory time, never per call.
pub(crate) fn tool_available(tool: &str) -> bool {
    Command::new("which")
        .arg(tool)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn run_command(tool: &'static str, args: &[&str], timeout_ms: u64) -> Result<(), ProviderError> {
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    match child.wait_timeout(Duration::from_millis(timeout_ms))? {
        Some(status) if status.success() => Ok(()),
        Some(status) => {
            let stderr = child
                .stderr
                .take()
                .and_then(|mut handle| {
                    use std::io::Read;
                    let mut buffer = String::new();
                    handle.read_to_string(&mut buffer).ok().map(|_| buffer)
                })
                .unwrap_or_default();
            Err(ProviderError::CommandFailed {
                tool,
                status: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            })
        }
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(ProviderError::CommandTimedOut { tool, timeout_ms })
        }
    }
}

fn capture_output_path() -> PathBuf {
    std::env::temp_dir().join(format!("iris-capture-{}.png", std::process::id()))
}

/// Screen capture via scrot, falling back to ImageMagick import.
pub struct X11Screenshot {
    retry: RetryPolicy,
    has_scrot: bool,
    has_import: bool,
}

impl X11Screenshot {
    /// Returns a backend when at least one capture tool is installed.
    pub fn probe(retry: RetryPolicy) -> Option<Self> {
        let has_scrot = tool_available(SCROT);
        let has_import = tool_available(IMPORT);
        if !has_scrot && !has_import {
            tracing::debug!("no X11 capture tool found (tried scrot, import)");
            return None;
        }
        Some(Self {
            retry,
            has_scrot,
            has_import,
        })
    }

    fn capture_once(&self) -> Result<Captured, ProviderError> {
        let output = capture_output_path();
        let output_str = output.to_string_lossy().into_owned();

        let mut last_error = ProviderError::ToolMissing { tool: SCROT };
        let mut backends: Vec<(&'static str, Vec<&str>)> = Vec::new();
        if self.has_scrot {
            backends.push((SCROT, vec!["--overwrite", "--silent", &output_str]));
        }
        if self.has_import {
            backends.push((IMPORT, vec!["-window", "root", &output_str]));
        }

        for (tool, args) in backends {
            match run_command(tool, &args, CAPTURE_TIMEOUT_MS) {
                Ok(()) => {
                    let png_data = std::fs::read(&output)?;
                    let _ = std::fs::remove_file(&output);
                    if png_data.is_empty() {
                        return Err(ProviderError::EmptyCapture);
                    }
                    return Ok(Captured {
                        png_data,
                        backend: tool,
                    });
                }
                Err(error) => {
                    tracing::debug!(tool, %error, "capture backend failed");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }
}

impl ScreenshotProvider for X11Screenshot {
    fn capture(&self) -> Result<Captured, ProviderError> {
        // Capture is idempotent, so the shared retry policy applies here.
        self.retry.run(|| self.capture_once())
    }
}

/// Pointer synthesis via xdotool. Input events are not idempotent, so these
/// run exactly once regardless of the retry policy.
pub struct X11Pointer;

impl X11Pointer {
    pub fn probe() -> Option<Self> {
        if !tool_available(XDOTOOL) {
            tracing::debug!("xdotool not found; pointer capability absent");
            return None;
        }
        Some(Self)
    }
}

fn button_number(button: PointerButton) -> &'static str {
    match button {
        PointerButton::Left => "1",
        PointerButton::Middle => "2",
        PointerButton::Right => "3",
    }
}

impl PointerProvider for X11Pointer {
    fn click(&self, x: i64, y: i64, button: PointerButton) -> Result<(), ProviderError> {
        run_command(
            XDOTOOL,
            &["mousemove", &x.to_string(), &y.to_string()],
            INPUT_TIMEOUT_MS,
        )?;
        run_command(XDOTOOL, &["click", button_number(button)], INPUT_TIMEOUT_MS)
    }

    fn drag(
        &self,
        start_x: i64,
        start_y: i64,
        end_x: i64,
        end_y: i64,
    ) -> Result<(), ProviderError> {
        run_command(
            XDOTOOL,
            &["mousemove", &start_x.to_string(), &start_y.to_string()],
            INPUT_TIMEOUT_MS,
        )?;
        run_command(XDOTOOL, &["mousedown", "1"], INPUT_TIMEOUT_MS)?;
        run_command(
            XDOTOOL,
            &["mousemove", &end_x.to_string(), &end_y.to_string()],
            INPUT_TIMEOUT_MS,
        )?;
        run_command(XDOTOOL, &["mouseup", "1"], INPUT_TIMEOUT_MS)
    }

    fn scroll(&self, direction: ScrollDirection, amount: i64) -> Result<(), ProviderError> {
        let button = match direction {
            ScrollDirection::Up => "4",
            ScrollDirection::Down => "5",
        };
        run_command(
            XDOTOOL,
            &["click", "--repeat", &amount.to_string(), button],
            INPUT_TIMEOUT_MS,
        )
    }
}

/// Keyboard synthesis via xdotool.
pub struct X11Keyboard;

impl X11Keyboard {
    pub fn probe() -> Option<Self> {
        if !tool_available(XDOTOOL) {
            tracing::debug!("xdotool not found; keyboard capability absent");
            return None;
        }
        Some(Self)
    }
}

impl KeyboardProvider for X11Keyboard {
    fn type_text(&self, text: &str) -> Result<(), ProviderError> {
        // `--` stops xdotool from parsing text that begins with a dash.
        run_command(
            XDOTOOL,
            &["type", "--clearmodifiers", "--", text],
            INPUT_TIMEOUT_MS,
        )
    }

    fn key_press(&self, key: &str) -> Result<(), ProviderError> {
        run_command(
            XDOTOOL,
            &["key", "--clearmodifiers", "--", key],
            INPUT_TIMEOUT_MS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_button_numbers_match_x11_convention() {
        assert_eq!(button_number(PointerButton::Left), "1");
        assert_eq!(button_number(PointerButton::Middle), "2");
        assert_eq!(button_number(PointerButton::Right), "3");
    }

    #[test]
    fn unit_tool_probe_rejects_nonexistent_binary() {
        assert!(!tool_available("iris-definitely-not-a-real-tool"));
    }

    #[test]
    fn unit_capture_output_path_is_process_scoped() {
        let path = capture_output_path();
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
        assert!(name.starts_with("iris-capture-"));
        assert!(name.ends_with(".png"));
    }
}
