//! Transport backends and the registry that selects one per [`Transport`].

use std::path::Path;

use async_trait::async_trait;

use crate::Error;
use crate::checksum::Checksum;
use crate::outcome::{Payload, PullOutcome};
use crate::url::{Transport, Url};

mod darcs;
mod git;
mod hg;
mod http;
mod local;
mod vcs;

pub use darcs::Darcs;
pub use git::Git;
pub use hg::Mercurial;
pub use http::HttpBackend;
pub use local::LocalBackend;
pub use vcs::{VcsBackend, VcsTool};

/// The capabilities every transport provides.
///
/// Failures of the transport itself should be reported either in-band as
/// [`PullOutcome::Unavailable`] or as a transport-class [`Error`] (see [`Error::is_transport`]);
/// callers treat both the same way. Any other error aborts the whole operation.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch the content at `url` into `dest_dir`. When `checksum` is given, a backend able to
    /// verify the content as it arrives may do so.
    async fn pull_url(
        &self,
        dest_dir: &Path,
        checksum: Option<&Checksum>,
        url: &Url,
    ) -> Result<PullOutcome<Payload>, Error>;

    /// Bring the repository mirror at `root` up to date with `url`.
    async fn pull_repo(&self, name: &str, root: &Path, url: &Url) -> Result<(), Error>;

    /// The revision currently checked out at `root`, if the transport has such a notion.
    async fn revision(&self, root: &Path) -> Result<Option<String>, Error>;
}

/// One backend per transport kind, built once and looked up by [`Transport`].
pub struct Registry {
    http: Box<dyn Backend>,
    local: Box<dyn Backend>,
    git: Box<dyn Backend>,
    hg: Box<dyn Backend>,
    darcs: Box<dyn Backend>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            http: Box::new(HttpBackend::new()),
            local: Box::new(LocalBackend),
            git: Box::new(VcsBackend::new(Git)),
            hg: Box::new(VcsBackend::new(Mercurial)),
            darcs: Box::new(VcsBackend::new(Darcs)),
        }
    }

    pub fn backend(&self, transport: Transport) -> &dyn Backend {
        match transport {
            Transport::Http => self.http.as_ref(),
            Transport::Local => self.local.as_ref(),
            Transport::Git => self.git.as_ref(),
            Transport::Hg => self.hg.as_ref(),
            Transport::Darcs => self.darcs.as_ref(),
        }
    }

    /// Replace the backend serving `transport`.
    pub fn with_backend<B: Backend + 'static>(mut self, transport: Transport, backend: B) -> Self {
        let backend: Box<dyn Backend> = Box::new(backend);
        match transport {
            Transport::Http => self.http = backend,
            Transport::Local => self.local = backend,
            Transport::Git => self.git = backend,
            Transport::Hg => self.hg = backend,
            Transport::Darcs => self.darcs = backend,
        }
        self
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
