//! User-facing status of pulls.

use crate::checksum::Checksum;
use crate::outcome::Origin;
use crate::url::Url;

/// Something worth telling the user about a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    FoundInCache,
    Downloaded { origin: Origin },
    /// A directory or an already up to date copy was synchronised.
    Synchronized { url: Url },
    /// A mirror failed and the next one is about to be tried.
    MirrorFailed { url: Url, reason: String },
    ChecksumMismatch {
        url: Url,
        expected: Checksum,
        actual: Checksum,
    },
}

impl Status {
    /// Warnings are worth showing even when the user asked for quiet output.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::MirrorFailed { .. } | Self::ChecksumMismatch { .. })
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FoundInCache => write!(f, "found in cache"),
            Self::Downloaded { origin } => write!(f, "downloaded from {origin}"),
            Self::Synchronized { url } => write!(f, "synchronized with {url}"),
            Self::MirrorFailed { url, reason } => {
                write!(f, "{url} is unavailable ({reason}), trying the next mirror")
            }
            Self::ChecksumMismatch {
                url,
                expected,
                actual,
            } => write!(f, "checksum mismatch for {url}: expected {expected}, got {actual}"),
        }
    }
}

/// Receives status events; `label` names what is being pulled.
pub trait Reporter: Send + Sync {
    fn report(&self, label: &str, status: &Status);
}

/// Sends status events to the [`log`] facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, label: &str, status: &Status) {
        if status.is_warning() {
            log::warn!("[{label}] {status}");
        } else {
            log::info!("[{label}] {status}");
        }
    }
}

impl<R: Reporter + ?Sized> Reporter for std::sync::Arc<R> {
    fn report(&self, label: &str, status: &Status) {
        (**self).report(label, status)
    }
}
