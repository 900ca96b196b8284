//! Synchronisation from the local filesystem.

use std::path::Path;

use async_trait::async_trait;

use super::Backend;
use crate::Error;
use crate::checksum::Checksum;
use crate::helper::{copy_dir, same_contents};
use crate::outcome::{Payload, PullOutcome};
use crate::url::Url;

/// Copies files and directory trees from local paths.
pub struct LocalBackend;

fn sync(src: &Path, dest: &Path) -> std::io::Result<PullOutcome<Payload>> {
    if src.is_dir() {
        if dest.exists() {
            std::fs::remove_dir_all(dest)?;
        }
        copy_dir(src, dest)?;
        Ok(PullOutcome::Fetched(Payload::Directory(dest.to_path_buf())))
    } else if dest.is_file() && same_contents(src, dest)? {
        Ok(PullOutcome::UpToDate(Payload::File(dest.to_path_buf())))
    } else {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dest)?;
        Ok(PullOutcome::Fetched(Payload::File(dest.to_path_buf())))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn pull_url(
        &self,
        dest_dir: &Path,
        _checksum: Option<&Checksum>,
        url: &Url,
    ) -> Result<PullOutcome<Payload>, Error> {
        let src = url.local_path();
        if !src.exists() {
            return Ok(PullOutcome::Unavailable(format!(
                "{} not found",
                src.display()
            )));
        }
        let dest = dest_dir.join(url.basename());
        log::debug!("syncing {} to {}", src.display(), dest.display());
        Ok(tokio::task::spawn_blocking(move || sync(&src, &dest)).await??)
    }

    async fn pull_repo(&self, name: &str, root: &Path, url: &Url) -> Result<(), Error> {
        let src = url.local_path();
        if !src.is_dir() {
            return Err(Error::transport(url, "not a directory"));
        }
        let root = root.to_path_buf();
        let copied = tokio::task::spawn_blocking(move || copy_dir(&src, &root)).await??;
        log::debug!("[{name}] synchronized {} file(s) from {url}", copied.len());
        Ok(())
    }

    async fn revision(&self, _root: &Path) -> Result<Option<String>, Error> {
        Ok(None)
    }
}
