use std::path::Path;
use std::process::Command;

/// Errors that can occur while reading a track's duration.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The probing tool could not be started.
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// The probing tool exited with a failure status.
    #[error("{tool} exited with {status}: {stderr}")]
    Tool {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    /// The tool's output did not contain a usable duration.
    #[error("unexpected duration output {0:?}")]
    Parse(String),
}

/// Reads the duration of `path` in seconds using `ffprobe`.
pub fn probe_duration(ffprobe: &Path, path: &Path) -> Result<f64, ProbeError> {
    let tool = ffprobe.display().to_string();
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .map_err(|source| ProbeError::Spawn {
            tool: tool.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::Tool {
            tool,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(output: &str) -> Result<f64, ProbeError> {
    let line = output.lines().map(str::trim).find(|line| !line.is_empty());
    match line.and_then(|line| line.parse::<f64>().ok()) {
        Some(duration) if duration.is_finite() && duration >= 0.0 => Ok(duration),
        _ => Err(ProbeError::Parse(output.trim().to_string())),
    }
}
