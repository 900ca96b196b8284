//! Fetch, verify and cache package sources, then pack them into source archives.
//!
//! A package's source is described by a url, an optional list of mirrors and a list of
//! checksums. This crate pulls such sources from plain downloads, local paths or version
//! control remotes, verifies what arrives, keeps verified content in a content-addressed cache
//! and builds one deterministic `.tar.gz` per package with the repository's overlay files on top.
//!
//! # Core Features
//!
//! - Five transports behind one [`Backend`] trait: http(s)/ftp downloads, local paths, `git`,
//!   `hg` and `darcs` (the version control tools must be installed and on `PATH`).
//! - A content-addressed cache at `<cache>/<kind>/<xx>/<hex>`, optionally backed by remote cache
//!   mirrors with the same layout.
//! - Mirrors are tried in order; content is accepted only when it matches every checksum given.
//! - Digest fixing: recompute wrong checksums instead of rejecting the content.
//!
//! # Usage
//!
//! Pull a file, using the cache at `~/.cache/srcpull`:
//!
//! ```no_run
//! use srcpull::{Checksum, FetchSettings, Fetcher, PullOutcome, Registry, Url};
//! use std::path::Path;
//!
//! # async fn pull() -> Result<(), srcpull::Error> {
//! let fetcher = Fetcher::new(
//!     Registry::new(),
//!     FetchSettings {
//!         cache_dir: Some("/home/me/.cache/srcpull".into()),
//!         ..Default::default()
//!     },
//! );
//! let checksum: Checksum = "md5=5eb63bbbe01eeed093cb22bb8f5acdc3".parse()?;
//! let mirrors: Vec<Url> = vec![
//!     "https://example.com/foo-1.0.tar.gz".parse()?,
//!     "https://mirror.example.com/foo-1.0.tar.gz".parse()?,
//! ];
//! match fetcher
//!     .pull_file("foo.1.0", Path::new("foo-1.0.tar.gz"), &[checksum], &mirrors)
//!     .await?
//! {
//!     PullOutcome::Unavailable(reason) => eprintln!("could not get foo: {reason}"),
//!     _ => println!("got foo"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Build the archives of a repository mirror:
//!
//! ```no_run
//! use srcpull::{FetchSettings, Fetcher, Registry, Repository, Validation, make_archives};
//!
//! # async fn build() -> Result<(), srcpull::Error> {
//! let repository = Repository::new("default", "/srv/repo", "/srv/upstream".parse()?);
//! let fetcher = Fetcher::new(Registry::new(), FetchSettings::default());
//! for (package, built) in make_archives(&fetcher, &repository, Validation::Enforce).await? {
//!     match built {
//!         Ok(Some(archive)) => println!("{package}: {}", archive.display()),
//!         Ok(None) => println!("{package}: nothing to archive"),
//!         Err(err) => eprintln!("{package}: {err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod archive;
mod backend;
pub mod cache;
mod checksum;
mod descriptor;
mod error;
pub mod extract;
mod fetch;
mod helper;
pub mod layout;
mod outcome;
mod process;
mod report;
mod repository;
mod url;
pub mod validate;

pub use archive::{make_archive, make_archives};
pub use backend::{
    Backend, Darcs, Git, HttpBackend, LocalBackend, Mercurial, Registry, VcsBackend, VcsTool,
};
pub use checksum::{Checksum, HashKind};
pub use descriptor::UrlDescriptor;
pub use error::Error;
pub use fetch::{FetchSettings, Fetcher, Validation};
pub use layout::PackageId;
pub use outcome::{Origin, Payload, PullOutcome, Pulled};
pub use report::{LogReporter, Reporter, Status};
pub use repository::Repository;
pub use crate::url::{Transport, Url};
