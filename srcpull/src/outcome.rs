//! The tri-state result of a pull and the things a pull can deliver.

use std::path::{Path, PathBuf};

use crate::Error;
use crate::url::Url;

/// Result of pulling something. Failure to obtain content is a value, not an error: errors are
/// reserved for conditions no other mirror could fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome<T> {
    /// Content was already present; nothing was transferred.
    UpToDate(T),
    /// New content was obtained.
    Fetched(T),
    /// Content could not be obtained, for the given reason.
    Unavailable(String),
}

impl<T> PullOutcome<T> {
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> PullOutcome<U> {
        match self {
            Self::UpToDate(t) => PullOutcome::UpToDate(f(t)),
            Self::Fetched(t) => PullOutcome::Fetched(f(t)),
            Self::Unavailable(reason) => PullOutcome::Unavailable(reason),
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::UpToDate(t) | Self::Fetched(t) => Some(t),
            Self::Unavailable(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::UpToDate(t) | Self::Fetched(t) => Some(t),
            Self::Unavailable(_) => None,
        }
    }

    /// The value, or the reason it could not be obtained.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::UpToDate(t) | Self::Fetched(t) => Ok(t),
            Self::Unavailable(reason) => Err(reason),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Catch transport failures, turning them into [`PullOutcome::Unavailable`]. Any other
    /// error is passed through untouched.
    pub fn recover(result: Result<Self, Error>) -> Result<Self, Error> {
        match result {
            Err(err) if err.is_transport() => Ok(Self::Unavailable(err.to_string())),
            other => other,
        }
    }
}

/// What a backend delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    File(PathBuf),
    Directory(PathBuf),
}

impl AsRef<Path> for Payload {
    fn as_ref(&self) -> &Path {
        match self {
            Payload::File(path) | Payload::Directory(path) => path,
        }
    }
}

/// Where pulled content came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The local cache directory.
    Cache,
    /// A remote cache mirror.
    CacheMirror(Url),
    /// One of the upstream mirrors of the artifact.
    Upstream(Url),
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Cache => write!(f, "cache"),
            Origin::CacheMirror(url) => write!(f, "{url} (cache)"),
            Origin::Upstream(url) => write!(f, "{url}"),
        }
    }
}

/// Content obtained by the fetch orchestrator, tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pulled {
    pub payload: Payload,
    pub origin: Origin,
}
