//! The fetch orchestrator: cache first, then the upstream mirrors in order, validating whatever
//! arrives.

use std::path::{Path, PathBuf};

use crate::Error;
use crate::backend::Registry;
use crate::cache;
use crate::checksum::Checksum;
use crate::outcome::{Origin, Payload, PullOutcome, Pulled};
use crate::report::{LogReporter, Reporter, Status};
use crate::url::Url;
use crate::validate;

/// Settings shared by every pull of a [`Fetcher`].
#[derive(Debug, Clone, Default)]
pub struct FetchSettings {
    /// Where verified content is cached. `None` disables the cache.
    pub cache_dir: Option<PathBuf>,
    /// Remote caches laid out like the cache directory, tried in order on a cache miss.
    pub cache_mirrors: Vec<Url>,
    /// `Some(true)` refuses to fetch anything without a checksum, `Some(false)` skips checksum
    /// validation altogether and `None` validates whatever checksums are given.
    pub require_checksums: Option<bool>,
    /// Do not report cache hits.
    pub silent_hits: bool,
}

/// What to do with checksums that do not match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validation {
    /// Reject the content.
    #[default]
    Enforce,
    /// Accept the content; the caller recomputes the checksums (see
    /// [`validate::fix_checksums`]).
    Fix,
}

pub struct Fetcher {
    registry: Registry,
    settings: FetchSettings,
    reporter: Box<dyn Reporter>,
}

impl Fetcher {
    pub fn new(registry: Registry, settings: FetchSettings) -> Self {
        Self {
            registry,
            settings,
            reporter: Box::new(LogReporter),
        }
    }

    pub fn with_reporter<R: Reporter + 'static>(mut self, reporter: R) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Pull the content described by `checksums` from the cache, or else from the first of
    /// `mirrors` able to deliver it into `dest_dir`.
    ///
    /// Content found in the cache is copied to `dest_dir` under the name of the first mirror, as
    /// if it had been downloaded. The cache is not consulted with [`Validation::Fix`], since the
    /// checksums are not trusted then.
    pub async fn pull_url(
        &self,
        label: &str,
        dest_dir: &Path,
        checksums: &[Checksum],
        mirrors: &[Url],
        mode: Validation,
    ) -> Result<PullOutcome<Pulled>, Error> {
        if mode == Validation::Enforce
            && let Some(cache_dir) = &self.settings.cache_dir
        {
            let cached = cache::fetch_from_cache(
                &self.registry,
                cache_dir,
                &self.settings.cache_mirrors,
                checksums,
            )
            .await?;
            match cached {
                PullOutcome::UpToDate((file, origin)) => {
                    if !self.settings.silent_hits {
                        self.reporter.report(label, &Status::FoundInCache);
                    }
                    let file = place_cached(&file, dest_dir, mirrors).await?;
                    return Ok(PullOutcome::UpToDate(Pulled {
                        payload: Payload::File(file),
                        origin,
                    }));
                }
                PullOutcome::Fetched((file, origin)) => {
                    self.reporter.report(
                        label,
                        &Status::Downloaded {
                            origin: origin.clone(),
                        },
                    );
                    let file = place_cached(&file, dest_dir, mirrors).await?;
                    return Ok(PullOutcome::Fetched(Pulled {
                        payload: Payload::File(file),
                        origin,
                    }));
                }
                PullOutcome::Unavailable(reason) => {
                    log::debug!("[{label}] not taken from the cache: {reason}");
                }
            }
        }
        self.check_required_checksums(label, checksums)?;
        self.pull_from_mirrors(label, dest_dir, checksums, mirrors, mode)
            .await
    }

    /// Pull a single file to `dest_file`.
    pub async fn pull_file(
        &self,
        label: &str,
        dest_file: &Path,
        checksums: &[Checksum],
        mirrors: &[Url],
    ) -> Result<PullOutcome<()>, Error> {
        let scratch = tempfile::tempdir()?;
        let outcome = self
            .pull_url(label, scratch.path(), checksums, mirrors, Validation::Enforce)
            .await?;
        let (fresh, file) = match outcome {
            PullOutcome::Unavailable(reason) => return Ok(PullOutcome::Unavailable(reason)),
            PullOutcome::UpToDate(Pulled {
                payload: Payload::Directory(_),
                ..
            })
            | PullOutcome::Fetched(Pulled {
                payload: Payload::Directory(_),
                ..
            }) => return Ok(PullOutcome::Unavailable("is a directory".to_string())),
            PullOutcome::UpToDate(Pulled {
                payload: Payload::File(file),
                ..
            }) => (false, file),
            PullOutcome::Fetched(Pulled {
                payload: Payload::File(file),
                ..
            }) => (true, file),
        };
        if let Some(parent) = dest_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&file, dest_file).await?;
        Ok(if fresh {
            PullOutcome::Fetched(())
        } else {
            PullOutcome::UpToDate(())
        })
    }

    /// Make sure the cache holds validated content for `checksums`.
    pub async fn pull_file_to_cache(
        &self,
        label: &str,
        checksums: &[Checksum],
        mirrors: &[Url],
    ) -> Result<PullOutcome<()>, Error> {
        let Some(cache_dir) = &self.settings.cache_dir else {
            return Err(Error::Config(format!(
                "cannot cache {label}: no cache directory configured"
            )));
        };
        let scratch = tempfile::tempdir()?;
        let outcome = self
            .pull_url(label, scratch.path(), checksums, mirrors, Validation::Enforce)
            .await?;
        let (fresh, file) = match outcome {
            PullOutcome::Unavailable(reason) => return Ok(PullOutcome::Unavailable(reason)),
            PullOutcome::UpToDate(pulled) => (false, pulled.payload),
            PullOutcome::Fetched(pulled) => (true, pulled.payload),
        };
        let Payload::File(file) = file else {
            return Ok(PullOutcome::Unavailable("is a directory".to_string()));
        };
        // Unvalidated upstream content never reaches the cache on its own
        if let Some(primary) = checksums.first()
            && !cache::path(cache_dir, primary).is_file()
        {
            match validate::validate_and_cache(&file, checksums, Some(cache_dir)).await {
                Ok(()) => {}
                Err(Error::ChecksumMismatch {
                    expected, actual, ..
                }) => {
                    return Ok(PullOutcome::Unavailable(format!(
                        "checksum mismatch: expected {expected}, got {actual}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(if fresh {
            PullOutcome::Fetched(())
        } else {
            PullOutcome::UpToDate(())
        })
    }

    fn check_required_checksums(&self, label: &str, checksums: &[Checksum]) -> Result<(), Error> {
        if checksums.is_empty() && self.settings.require_checksums == Some(true) {
            return Err(Error::Config(format!(
                "{label}: refusing to download without a checksum"
            )));
        }
        Ok(())
    }

    async fn pull_from_mirrors(
        &self,
        label: &str,
        dest_dir: &Path,
        checksums: &[Checksum],
        mirrors: &[Url],
        mode: Validation,
    ) -> Result<PullOutcome<Pulled>, Error> {
        if mirrors.is_empty() {
            return Err(Error::NoMirrors);
        }
        let mut last_reason = String::new();
        for (index, mirror) in mirrors.iter().enumerate() {
            match self
                .pull_from_upstream(label, dest_dir, checksums, mirror, mode)
                .await?
            {
                PullOutcome::Unavailable(reason) => {
                    if index + 1 < mirrors.len() {
                        self.reporter.report(
                            label,
                            &Status::MirrorFailed {
                                url: mirror.clone(),
                                reason: reason.clone(),
                            },
                        );
                    }
                    last_reason = reason;
                }
                pulled => return Ok(pulled),
            }
        }
        Ok(PullOutcome::Unavailable(last_reason))
    }

    async fn pull_from_upstream(
        &self,
        label: &str,
        dest_dir: &Path,
        checksums: &[Checksum],
        mirror: &Url,
        mode: Validation,
    ) -> Result<PullOutcome<Pulled>, Error> {
        let enforce = mode == Validation::Enforce && self.settings.require_checksums != Some(false);
        tokio::fs::create_dir_all(dest_dir).await?;
        let backend = self.registry.backend(mirror.transport());
        let hint = if enforce { checksums.first() } else { None };
        let outcome = PullOutcome::recover(backend.pull_url(dest_dir, hint, mirror).await)?;
        let (fresh, payload) = match outcome {
            PullOutcome::Unavailable(reason) => return Ok(PullOutcome::Unavailable(reason)),
            PullOutcome::UpToDate(payload) => (false, payload),
            PullOutcome::Fetched(payload) => (true, payload),
        };

        let status = match &payload {
            Payload::Directory(dir) => {
                if !checksums.is_empty() {
                    tokio::fs::remove_dir_all(dir).await?;
                    return Ok(PullOutcome::Unavailable(
                        "can't check directory checksums".to_string(),
                    ));
                }
                Status::Synchronized {
                    url: mirror.clone(),
                }
            }
            Payload::File(file) => {
                if enforce {
                    let stored = validate::validate_and_cache(
                        file,
                        checksums,
                        self.settings.cache_dir.as_deref(),
                    )
                    .await;
                    match stored {
                        Ok(()) => {}
                        Err(Error::ChecksumMismatch {
                            expected, actual, ..
                        }) => {
                            let reason = format!("checksum mismatch: expected {expected}, got {actual}");
                            self.reporter.report(
                                label,
                                &Status::ChecksumMismatch {
                                    url: mirror.clone(),
                                    expected,
                                    actual,
                                },
                            );
                            return Ok(PullOutcome::Unavailable(reason));
                        }
                        Err(err) => return Err(err),
                    }
                }
                if fresh {
                    Status::Downloaded {
                        origin: Origin::Upstream(mirror.clone()),
                    }
                } else {
                    Status::Synchronized {
                        url: mirror.clone(),
                    }
                }
            }
        };
        self.reporter.report(label, &status);

        let pulled = Pulled {
            payload,
            origin: Origin::Upstream(mirror.clone()),
        };
        Ok(if fresh {
            PullOutcome::Fetched(pulled)
        } else {
            PullOutcome::UpToDate(pulled)
        })
    }
}

/// Copy a cache entry to `dest_dir`, named after the artifact rather than its digest.
async fn place_cached(cached: &Path, dest_dir: &Path, mirrors: &[Url]) -> Result<PathBuf, Error> {
    let Some(name) = mirrors.first().map(Url::basename) else {
        return Ok(cached.to_path_buf());
    };
    tokio::fs::create_dir_all(dest_dir).await?;
    let dest = dest_dir.join(name);
    tokio::fs::copy(cached, &dest).await?;
    Ok(dest)
}
