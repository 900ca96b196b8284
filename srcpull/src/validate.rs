//! Verification of files against checksum lists.

use std::path::Path;

use crate::Error;
use crate::cache;
use crate::checksum::{Checksum, HashKind};

/// A checksum that did not match, with the digest actually computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: Checksum,
    pub actual: Checksum,
}

/// The first checksum of the list that `file` does not match, in list order.
pub(crate) async fn first_mismatch(
    file: &Path,
    checksums: &[Checksum],
) -> Result<Option<Mismatch>, Error> {
    if checksums.is_empty() {
        return Ok(None);
    }
    let file = file.to_path_buf();
    let checksums = checksums.to_vec();
    let mismatch = tokio::task::spawn_blocking(move || -> std::io::Result<Option<Mismatch>> {
        for expected in checksums {
            if let Some(actual) = expected.mismatch(&file)? {
                return Ok(Some(Mismatch { expected, actual }));
            }
        }
        Ok(None)
    })
    .await??;
    Ok(mismatch)
}

/// Check `file` against every checksum. On mismatch the file is deleted and
/// [`Error::ChecksumMismatch`] returned. An empty list always passes.
pub async fn validate(file: &Path, checksums: &[Checksum]) -> Result<(), Error> {
    match first_mismatch(file, checksums).await? {
        None => Ok(()),
        Some(Mismatch { expected, actual }) => {
            tokio::fs::remove_file(file).await?;
            Err(Error::ChecksumMismatch {
                file: file.to_path_buf(),
                expected,
                actual,
            })
        }
    }
}

/// [`validate`], then store the file in `cache_dir` under the first checksum. Failing to store
/// is only a warning.
pub async fn validate_and_cache(
    file: &Path,
    checksums: &[Checksum],
    cache_dir: Option<&Path>,
) -> Result<(), Error> {
    validate(file, checksums).await?;
    if let (Some(cache_dir), Some(primary)) = (cache_dir, checksums.first())
        && let Err(err) = cache::store(cache_dir, primary, file).await
    {
        log::warn!("could not store {} in the cache: {err}", file.display());
    }
    Ok(())
}

/// The checksum list with every entry recomputed from the bytes of `file`. Entries that were
/// already right are kept as they are; an empty list gets a single sha256.
pub async fn fix_checksums(file: &Path, checksums: &[Checksum]) -> Result<Vec<Checksum>, Error> {
    let file = file.to_path_buf();
    let checksums = checksums.to_vec();
    let fixed = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<Checksum>> {
        if checksums.is_empty() {
            return Ok(vec![HashKind::Sha256.compute(&file)?]);
        }
        let mut fixed = Vec::with_capacity(checksums.len());
        for checksum in checksums {
            match checksum.mismatch(&file)? {
                Some(actual) => {
                    log::warn!(
                        "fixing checksum of {}: {checksum} -> {actual}",
                        file.display()
                    );
                    fixed.push(actual);
                }
                None => fixed.push(checksum),
            }
        }
        Ok(fixed)
    })
    .await??;
    Ok(fixed)
}

#[cfg(test)]
mod test_validate {
    use super::*;
    use std::path::PathBuf;

    const HELLO_MD5: &str = "md5=5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_SHA256: &str =
        "sha256=b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const WRONG_MD5: &str = "md5=00000000000000000000000000000000";

    fn hello(dir: &Path) -> PathBuf {
        let file = dir.join("hello.txt");
        std::fs::write(&file, "hello world").unwrap();
        file
    }

    fn checksums(list: &[&str]) -> Vec<Checksum> {
        list.iter().map(|c| c.parse().unwrap()).collect()
    }

    #[tokio::test]
    async fn matching_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let file = hello(dir.path());
        validate(&file, &checksums(&[HELLO_SHA256, HELLO_MD5])).await.unwrap();
        validate(&file, &[]).await.unwrap();
        assert!(file.is_file());
    }

    #[tokio::test]
    async fn mismatch_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = hello(dir.path());
        let err = validate(&file, &checksums(&[HELLO_SHA256, WRONG_MD5]))
            .await
            .unwrap_err();
        match err {
            Error::ChecksumMismatch { expected, actual, .. } => {
                assert_eq!(expected.to_string(), WRONG_MD5);
                assert_eq!(actual.to_string(), HELLO_MD5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn validated_file_is_cached_under_the_first_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let file = hello(dir.path());
        let list = checksums(&[HELLO_MD5, HELLO_SHA256]);
        validate_and_cache(&file, &list, Some(&cache_dir)).await.unwrap();
        let cached = cache::path(&cache_dir, &list[0]);
        assert_eq!(std::fs::read_to_string(cached).unwrap(), "hello world");
        assert!(file.is_file());
    }

    #[tokio::test]
    async fn fixing_replaces_wrong_entries() {
        let dir = tempfile::tempdir().unwrap();
        let file = hello(dir.path());
        let fixed = fix_checksums(&file, &checksums(&[HELLO_SHA256, WRONG_MD5]))
            .await
            .unwrap();
        assert_eq!(fixed, checksums(&[HELLO_SHA256, HELLO_MD5]));
        assert!(file.is_file());
    }

    #[tokio::test]
    async fn fixing_an_empty_list_adds_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let file = hello(dir.path());
        assert_eq!(fix_checksums(&file, &[]).await.unwrap(), checksums(&[HELLO_SHA256]));
    }
}
