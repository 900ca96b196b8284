use std::process::ExitCode;

/// Categories of application errors that can be matched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorKind {
    /// Argument validation errors
    ArgValidation,
    /// General IO errors
    IO,
    /// Something could not be pulled or archived. Per-package failures are reported as they
    /// happen, so this variant mostly exists to produce the correct `ExitCode`.
    Fetch,
    /// Any other error from the library
    Library,
    /// Errors writing the summary of a command
    Output,
}

/// Internal error type that contains all application error variants.
#[derive(Debug, thiserror::Error)]
pub enum AppErrorInner {
    #[error("Argument error: {0}")]
    ArgValidation(String),
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("failed to get {what}: {reason}")]
    Fetch { what: String, reason: String },
    #[error("failed to archive {count} package(s)")]
    Archive { count: usize },
    #[error(transparent)]
    Library(#[from] srcpull::Error),
    #[error(transparent)]
    Output(#[from] anyhow::Error),
}

/// The main application-level error type: the inner error for the message, and its kind for the
/// exit code.
///
/// This type uses the newtype pattern to wrap a boxed inner error, reducing stack size.
#[derive(Debug)]
pub struct AppError(Box<AppErrorInner>, AppErrorKind);

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl AppError {
    pub fn new(inner: AppErrorInner, kind: AppErrorKind) -> Self {
        Self(Box::new(inner), kind)
    }

    pub fn error_kind(&self) -> &AppErrorKind {
        &self.1
    }

    pub fn arg_validation(msg: String) -> Self {
        Self::new(AppErrorInner::ArgValidation(msg), AppErrorKind::ArgValidation)
    }

    pub fn fetch(what: String, reason: String) -> Self {
        Self::new(AppErrorInner::Fetch { what, reason }, AppErrorKind::Fetch)
    }

    pub fn archive(count: usize) -> Self {
        Self::new(AppErrorInner::Archive { count }, AppErrorKind::Fetch)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::new(AppErrorInner::IO(err), AppErrorKind::IO)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(AppErrorInner::Output(err), AppErrorKind::Output)
    }
}

impl From<srcpull::Error> for AppError {
    fn from(err: srcpull::Error) -> Self {
        use srcpull::Error;
        let kind = match &err {
            Error::Unavailable { .. } | Error::ChecksumMismatch { .. } => AppErrorKind::Fetch,
            err if err.is_transport() => AppErrorKind::Fetch,
            Error::Config(_)
            | Error::NoMirrors
            | Error::InvalidUrl { .. }
            | Error::InvalidChecksum(_)
            | Error::InvalidPackage(_) => AppErrorKind::ArgValidation,
            _ => AppErrorKind::Library,
        };
        Self::new(AppErrorInner::Library(err), kind)
    }
}

impl From<AppError> for ExitCode {
    fn from(error: AppError) -> Self {
        ExitCode::from(match error.error_kind() {
            AppErrorKind::Fetch => 1,
            AppErrorKind::ArgValidation => 2,
            _ => 3,
        })
    }
}
