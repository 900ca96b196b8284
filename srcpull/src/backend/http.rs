//! Plain downloads over http(s) and ftp.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::Backend;
use crate::checksum::Checksum;
use crate::helper::copy_dir;
use crate::outcome::{Payload, PullOutcome};
use crate::url::Url;
use crate::{Error, extract, validate};

/// Downloads files with [`reqwest`].
pub struct HttpBackend {
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download `url` to `dest`. The body is streamed to a `.part` file which is only renamed
    /// into place once complete.
    pub async fn download(&self, url: &Url, dest: &Path) -> Result<(), Error> {
        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        match self.download_to(url, &partial).await {
            Ok(()) => Ok(tokio::fs::rename(&partial, dest).await?),
            Err(err) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(err)
            }
        }
    }

    async fn download_to(&self, url: &Url, path: &Path) -> Result<(), Error> {
        log::debug!("downloading {url} to {}", path.display());
        let mut response = self
            .client
            .get(url.address())
            .send()
            .await?
            .error_for_status()?;
        let mut file = tokio::fs::File::create(path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn pull_url(
        &self,
        dest_dir: &Path,
        checksum: Option<&Checksum>,
        url: &Url,
    ) -> Result<PullOutcome<Payload>, Error> {
        tokio::fs::create_dir_all(dest_dir).await?;
        let dest = dest_dir.join(url.basename());
        self.download(url, &dest).await?;
        if let Some(checksum) = checksum
            && let Some(mismatch) =
                validate::first_mismatch(&dest, std::slice::from_ref(checksum)).await?
        {
            tokio::fs::remove_file(&dest).await?;
            return Ok(PullOutcome::Unavailable(format!(
                "checksum mismatch for {url}: expected {}, got {}",
                mismatch.expected, mismatch.actual
            )));
        }
        Ok(PullOutcome::Fetched(Payload::File(dest)))
    }

    async fn pull_repo(&self, name: &str, root: &Path, url: &Url) -> Result<(), Error> {
        let scratch = tempfile::tempdir()?;
        let index = scratch.path().join("index.tar.gz");
        self.download(&url.join(["index.tar.gz"]), &index).await?;
        let unpacked = scratch.path().join("index");
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || {
            extract::extract(&index, &unpacked)?;
            copy_dir(&unpacked, &root).map(|_| ())
        })
        .await??;
        log::debug!("[{name}] synchronized index from {url}");
        Ok(())
    }

    async fn revision(&self, _root: &Path) -> Result<Option<String>, Error> {
        Ok(None)
    }
}

#[cfg(test)]
mod test_http_backend {
    use super::*;

    #[tokio::test]
    async fn refused_connection_is_a_transport_failure() {
        let dir = tempfile::tempdir().unwrap();
        let url: Url = "http://127.0.0.1:1/foo-1.0.tar.gz".parse().unwrap();
        let result = HttpBackend::new().pull_url(dir.path(), None, &url).await;
        assert!(matches!(&result, Err(err) if err.is_transport()));
        assert!(matches!(
            PullOutcome::recover(result),
            Ok(PullOutcome::Unavailable(_))
        ));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
