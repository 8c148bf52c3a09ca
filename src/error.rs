use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can stop a workflow.
///
/// Every variant is fatal to the run that produced it; nothing is retried
/// except the single permission reset performed by
/// [`crate::fs::remove_dir_all_forced`].
#[derive(Debug, Error)]
pub enum Error {
    /// An external tool ran and exited unsuccessfully.
    #[error("{tool} failed ({})", describe_code(.code))]
    ToolFailed {
        tool: String,
        /// `None` when the process was terminated by a signal.
        code: Option<i32>,
        /// Combined stdout and stderr.
        output: String,
    },

    /// An external tool could not be started at all.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("none of {candidates:?} found in PATH")]
    ToolNotFound { candidates: Vec<String> },

    /// Cloning a dependency at its pinned reference failed.
    #[error("failed to fetch {name} at {reference}")]
    Fetch {
        name: String,
        reference: String,
        #[source]
        source: Box<Error>,
    },

    /// Configuring or installing a fetched dependency failed.
    #[error("failed to build and install {name}")]
    Build {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{name}: expected {} in fetched sources", .path.display())]
    MissingArtifact { name: String, path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("no repository root (.git) found above {}", .start.display())]
    RepoRootNotFound { start: PathBuf },

    #[error("preset {name} not found in {}", .path.display())]
    PresetNotFound { name: String, path: PathBuf },

    #[error("failed to parse CMake presets {}: {source}", .path.display())]
    InvalidPresets {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Exit status to hand back to the shell.
    ///
    /// A failing tool's own code is propagated when it fits in a process exit
    /// status; everything else maps to 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ToolFailed { code: Some(code), .. } => match u8::try_from(*code) {
                Ok(0) | Err(_) => 1,
                Ok(code) => code,
            },
            Self::Fetch { source, .. } | Self::Build { source, .. } => source.exit_code(),
            _ => 1,
        }
    }

    /// Captured tool output carried by this error or the one it wraps.
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            Self::ToolFailed { output, .. } => Some(output),
            Self::Fetch { source, .. } | Self::Build { source, .. } => source.tool_output(),
            _ => None,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
