use crate::checksum::Checksum;

/// The main error enum for this crate.
///
/// Transport-class variants are recoverable at the fetch layer: the orchestrator catches them
/// (see [`Error::is_transport`]) and moves on to the next mirror. Everything else propagates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error("Command '{command}' exited with status {status}\n{stderr}")]
    Subprocess {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("download of {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", file.display())]
    ChecksumMismatch {
        file: std::path::PathBuf,
        expected: Checksum,
        actual: Checksum,
    },
    #[error("{0}")]
    Config(String),
    #[error("no mirror given to pull from")]
    NoMirrors,
    #[error("could not get {package}: {reason}")]
    Unavailable { package: String, reason: String },
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid checksum '{0}': expected '<md5|sha256|sha512>=<hex digest>'")]
    InvalidChecksum(String),
    #[error("invalid package '{0}': expected '<name>.<version>'")]
    InvalidPackage(String),
}

impl Error {
    /// True for failures of the transport itself, i.e. failures that another mirror might not
    /// have.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Reqwest(_) | Self::Subprocess { .. } | Self::Transport { .. }
        )
    }

    pub(crate) fn subprocess<S: Into<String>>(
        command: S,
        status: std::process::ExitStatus,
        stderr: &[u8],
    ) -> Self {
        Self::Subprocess {
            command: command.into(),
            status,
            stderr: String::from_utf8_lossy(stderr).trim_end().to_string(),
        }
    }

    pub(crate) fn transport<U: ToString, R: ToString>(url: U, reason: R) -> Self {
        Self::Transport {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
