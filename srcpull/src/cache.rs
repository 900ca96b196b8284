//! The content-addressed cache: `<cache_dir>/<kind>/<xx>/<hex>`.
//!
//! Entries are only ever added, and always by renaming a complete file into place, so readers
//! never observe a partial entry and two writers racing on one key both succeed.

use std::io;
use std::path::{Path, PathBuf};

use crate::Error;
use crate::backend::Registry;
use crate::checksum::Checksum;
use crate::outcome::{Origin, Payload, PullOutcome};
use crate::url::Url;
use crate::validate;

const MISS: &str = "cache miss";
const CONFLICT: &str = "cache CONFLICT";

/// Location of the cache entry for `checksum`.
pub fn path(cache_dir: &Path, checksum: &Checksum) -> PathBuf {
    cache_dir.join(checksum.to_path())
}

/// Copy `file` into the cache under `checksum`. The content is not checked here.
pub async fn store(cache_dir: &Path, checksum: &Checksum, file: &Path) -> Result<PathBuf, Error> {
    let target = path(cache_dir, checksum);
    let source = file.to_path_buf();
    log::debug!("caching {} as {checksum}", source.display());
    Ok(tokio::task::spawn_blocking(move || store_blocking(&source, target)).await??)
}

fn store_blocking(source: &Path, target: PathBuf) -> io::Result<PathBuf> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::other(format!("no parent for {}", target.display())))?;
    std::fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    io::copy(&mut std::fs::File::open(source)?, temp.as_file_mut())?;
    temp.persist(&target).map_err(|e| e.error)?;
    Ok(target)
}

/// Look `checksums` up in the cache, then in the remote cache mirrors.
///
/// The first checksum is the key for remote lookups, but content is only accepted when it
/// matches the whole list. Content that matches some checksums and not others is a conflict:
/// it is deleted and no further cache mirrors are asked.
pub async fn fetch_from_cache(
    registry: &Registry,
    cache_dir: &Path,
    cache_mirrors: &[Url],
    checksums: &[Checksum],
) -> Result<PullOutcome<(PathBuf, Origin)>, Error> {
    let Some(primary) = checksums.first() else {
        return Ok(PullOutcome::Unavailable(MISS.to_string()));
    };

    if let Some(file) = checksums
        .iter()
        .map(|checksum| path(cache_dir, checksum))
        .find(|file| file.is_file())
    {
        if let Some(mismatch) = validate::first_mismatch(&file, checksums).await? {
            log::warn!(
                "conflict in cache entry {}: expected {}, got {}",
                file.display(),
                mismatch.expected,
                mismatch.actual
            );
            tokio::fs::remove_file(&file).await?;
            return Ok(PullOutcome::Unavailable(CONFLICT.to_string()));
        }
        return Ok(PullOutcome::UpToDate((file, Origin::Cache)));
    }

    let target = path(cache_dir, primary);
    let parent = target.parent().unwrap_or(cache_dir);
    for mirror in cache_mirrors {
        if mirror.transport().is_vcs() {
            return Err(Error::Config(
                "Version control not allowed as cache source".to_string(),
            ));
        }
        tokio::fs::create_dir_all(parent).await?;
        let scratch = tempfile::Builder::new()
            .prefix(".download")
            .tempdir_in(parent)?;
        let remote = mirror.join(primary.path_segments());
        let backend = registry.backend(mirror.transport());
        let outcome = PullOutcome::recover(
            backend
                .pull_url(scratch.path(), Some(primary), &remote)
                .await,
        )?;
        let candidate = match outcome {
            PullOutcome::UpToDate(Payload::File(file)) | PullOutcome::Fetched(Payload::File(file)) => {
                file
            }
            PullOutcome::UpToDate(Payload::Directory(_))
            | PullOutcome::Fetched(Payload::Directory(_)) => {
                log::debug!("cache mirror {mirror} served a directory for {primary}");
                continue;
            }
            PullOutcome::Unavailable(reason) => {
                log::debug!("cache mirror {mirror} has no {primary}: {reason}");
                continue;
            }
        };
        if let Some(mismatch) = validate::first_mismatch(&candidate, checksums).await? {
            log::warn!(
                "conflict in cache mirror {mirror}: expected {}, got {}",
                mismatch.expected,
                mismatch.actual
            );
            tokio::fs::remove_file(&candidate).await?;
            return Ok(PullOutcome::Unavailable(CONFLICT.to_string()));
        }
        tokio::fs::rename(&candidate, &target).await?;
        return Ok(PullOutcome::Fetched((target, Origin::CacheMirror(mirror.clone()))));
    }
    Ok(PullOutcome::Unavailable(MISS.to_string()))
}

#[cfg(test)]
mod test_cache {
    use super::*;
    use std::fs;

    const HELLO_MD5: &str = "md5=5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_SHA256: &str =
        "sha256=b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const OTHER_MD5: &str = "md5=00000000000000000000000000000000";

    fn checksum(s: &str) -> Checksum {
        s.parse().unwrap()
    }

    fn put(cache_dir: &Path, key: &str, content: &str) -> PathBuf {
        let file = path(cache_dir, &checksum(key));
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, content).unwrap();
        file
    }

    #[tokio::test]
    async fn store_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let source = dir.path().join("hello.txt");
        fs::write(&source, "hello world").unwrap();
        let stored = store(&cache_dir, &checksum(HELLO_MD5), &source).await.unwrap();
        assert_eq!(stored, cache_dir.join("md5/5e/5eb63bbbe01eeed093cb22bb8f5acdc3"));

        let outcome = fetch_from_cache(
            &Registry::new(),
            &cache_dir,
            &[],
            &[checksum(HELLO_SHA256), checksum(HELLO_MD5)],
        )
        .await
        .unwrap();
        assert_eq!(outcome, PullOutcome::UpToDate((stored, Origin::Cache)));
    }

    #[tokio::test]
    async fn empty_list_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = fetch_from_cache(&Registry::new(), dir.path(), &[], &[]).await.unwrap();
        assert_eq!(outcome, PullOutcome::Unavailable(MISS.to_string()));
    }

    #[tokio::test]
    async fn disagreeing_entry_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let file = put(dir.path(), HELLO_MD5, "hello world");
        let outcome = fetch_from_cache(
            &Registry::new(),
            dir.path(),
            &[],
            &[checksum(HELLO_MD5), checksum(&HELLO_SHA256.replace("b94d", "0000"))],
        )
        .await
        .unwrap();
        assert_eq!(outcome, PullOutcome::Unavailable(CONFLICT.to_string()));
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn local_cache_mirror_fills_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mirror_root = dir.path().join("mirror");
        put(&mirror_root, HELLO_MD5, "hello world");
        let cache_dir = dir.path().join("cache");
        let mirror: Url = mirror_root.display().to_string().parse().unwrap();

        let outcome = fetch_from_cache(
            &Registry::new(),
            &cache_dir,
            std::slice::from_ref(&mirror),
            &[checksum(HELLO_MD5)],
        )
        .await
        .unwrap();
        let expected = cache_dir.join("md5/5e/5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(
            outcome,
            PullOutcome::Fetched((expected.clone(), Origin::CacheMirror(mirror)))
        );
        assert_eq!(fs::read_to_string(expected).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn corrupt_cache_mirror_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad");
        let good = dir.path().join("good");
        put(&bad, OTHER_MD5, "not what was asked for");
        put(&good, OTHER_MD5, "still not it");
        let cache_dir = dir.path().join("cache");
        let mirrors: Vec<Url> = [&bad, &good]
            .iter()
            .map(|root| root.display().to_string().parse().unwrap())
            .collect();

        let outcome = fetch_from_cache(&Registry::new(), &cache_dir, &mirrors, &[checksum(OTHER_MD5)])
            .await
            .unwrap();
        assert_eq!(outcome, PullOutcome::Unavailable(CONFLICT.to_string()));
        assert!(!path(&cache_dir, &checksum(OTHER_MD5)).exists());
    }

    #[tokio::test]
    async fn version_control_mirror_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mirror: Url = "git+https://example.com/cache.git".parse().unwrap();
        let result =
            fetch_from_cache(&Registry::new(), dir.path(), &[mirror], &[checksum(HELLO_MD5)]).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
