//! Building one source archive per package: the pulled payload with the repository's `files/`
//! overlay on top, packed as `archives/<name>.<version>+opam.tar.gz`.

use std::io;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use walkdir::WalkDir;

use crate::descriptor::UrlDescriptor;
use crate::fetch::{Fetcher, Validation};
use crate::helper::{copy_dir, list_files};
use crate::layout::{self, PackageId};
use crate::outcome::Payload;
use crate::repository::Repository;
use crate::{Error, extract, validate};

/// Build the archive of `package` in the repository at `repo_root`.
///
/// Returns the path of the archive, or `None` for a package with neither a source nor overlay
/// files. With [`Validation::Fix`], checksums that do not match the pulled content are
/// corrected in the package's `url.toml`.
pub async fn make_archive(
    fetcher: &Fetcher,
    repo_root: &Path,
    prefix: Option<&str>,
    package: &PackageId,
    mode: Validation,
) -> Result<Option<PathBuf>, Error> {
    let label = package.to_string();
    let package_dir = layout::package_dir(repo_root, prefix, package);
    let url_file = layout::url_file(&package_dir);
    let files_dir = layout::files_dir(&package_dir);
    let descriptor = UrlDescriptor::read(&url_file)?;

    let scratch = tempfile::tempdir()?;
    let content = scratch.path().join(&label);
    if let Some(mut descriptor) = descriptor.clone() {
        let download_dir = scratch.path().join("download");
        let outcome = fetcher
            .pull_url(&label, &download_dir, &descriptor.checksum, &descriptor.urls(), mode)
            .await?;
        let pulled = match outcome.into_result() {
            Ok(pulled) => pulled,
            Err(reason) => {
                return Err(Error::Unavailable {
                    package: label,
                    reason,
                });
            }
        };
        match pulled.payload {
            Payload::File(file) => {
                if mode == Validation::Fix {
                    let fixed = validate::fix_checksums(&file, &descriptor.checksum).await?;
                    if fixed != descriptor.checksum {
                        log::warn!("[{label}] updating checksums in {}", url_file.display());
                        descriptor.checksum = fixed;
                        descriptor.write(&url_file)?;
                    }
                }
                let dest = content.clone();
                tokio::task::spawn_blocking(move || extract::extract(&file, &dest)).await??;
            }
            Payload::Directory(dir) => {
                let dest = content.clone();
                tokio::task::spawn_blocking(move || copy_dir(&dir, &dest)).await??;
            }
        }
    }

    let staged = content.clone();
    let files = tokio::task::spawn_blocking(move || -> io::Result<Vec<PathBuf>> {
        if files_dir.is_dir() {
            copy_dir(&files_dir, &staged)?;
        }
        list_files(&staged)
    })
    .await??;
    if files.is_empty() && descriptor.is_none() {
        log::debug!("[{label}] nothing to archive");
        return Ok(None);
    }

    let archive = layout::archive(repo_root, package);
    let target = archive.clone();
    tokio::task::spawn_blocking(move || write_archive(&content, &label, &target)).await??;
    log::info!("[{package}] wrote {} ({} file(s))", archive.display(), files.len());
    Ok(Some(archive))
}

/// Build the archives of every package in `repository` concurrently.
pub async fn make_archives(
    fetcher: &Fetcher,
    repository: &Repository,
    mode: Validation,
) -> Result<Vec<(PackageId, Result<Option<PathBuf>, Error>)>, Error> {
    let packages = repository.packages()?;
    let builds = packages.iter().map(|(prefix, package)| async move {
        let built = make_archive(fetcher, &repository.root, prefix.as_deref(), package, mode).await;
        (package.clone(), built)
    });
    Ok(futures::future::join_all(builds).await)
}

/// Pack `content` as a gzipped tar with every entry below `root_name/`. Entries are sorted and
/// their headers normalised, so the same content always gives the same bytes.
fn write_archive(content: &Path, root_name: &str, archive: &Path) -> io::Result<()> {
    let dir = archive
        .parent()
        .ok_or_else(|| io::Error::other(format!("no parent for {}", archive.display())))?;
    std::fs::create_dir_all(dir)?;
    let temp = tempfile::NamedTempFile::new_in(dir)?;
    let mut builder = tar::Builder::new(GzEncoder::new(temp.as_file(), Compression::default()));
    builder.mode(tar::HeaderMode::Deterministic);
    builder.follow_symlinks(false);
    std::fs::create_dir_all(content)?;
    builder.append_dir(root_name, content)?;
    for entry in WalkDir::new(content).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry.path().strip_prefix(content).map_err(io::Error::other)?;
        let name = Path::new(root_name).join(relative);
        if entry.file_type().is_dir() {
            builder.append_dir(&name, entry.path())?;
        } else {
            builder.append_path_with_name(entry.path(), &name)?;
        }
    }
    builder.into_inner()?.finish()?;
    temp.persist(archive).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod test_archive {
    use super::*;
    use crate::backend::Registry;
    use crate::fetch::FetchSettings;
    use flate2::read::GzDecoder;
    use std::fs;

    fn write_source(path: &Path) {
        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in [("foo-1.0/README", "upstream"), ("foo-1.0/src/foo.ml", "let x = 1")] {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn entries(archive: &Path) -> Vec<String> {
        let mut tar = tar::Archive::new(GzDecoder::new(fs::File::open(archive).unwrap()));
        tar.entries()
            .unwrap()
            .map(|e| {
                let path = e.unwrap().path().unwrap().display().to_string();
                path.trim_end_matches('/').to_string()
            })
            .collect()
    }

    #[tokio::test]
    async fn overlay_wins_and_output_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("foo-1.0.tar.gz");
        write_source(&source);
        let root = dir.path().join("repo");
        let id = PackageId::new("foo", "1.0");
        let package_dir = layout::package_dir(&root, None, &id);
        fs::create_dir_all(layout::files_dir(&package_dir)).unwrap();
        fs::write(layout::files_dir(&package_dir).join("README"), "patched").unwrap();
        UrlDescriptor::new(source.display().to_string().parse().unwrap())
            .write(&layout::url_file(&package_dir))
            .unwrap();

        let fetcher = Fetcher::new(Registry::new(), FetchSettings::default());
        let archive = make_archive(&fetcher, &root, None, &id, Validation::Enforce)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(archive, root.join("archives/foo.1.0+opam.tar.gz"));
        assert_eq!(
            entries(&archive),
            vec!["foo.1.0", "foo.1.0/README", "foo.1.0/src", "foo.1.0/src/foo.ml"]
        );
        let unpacked = dir.path().join("unpacked");
        tar::Archive::new(GzDecoder::new(fs::File::open(&archive).unwrap()))
            .unpack(&unpacked)
            .unwrap();
        assert_eq!(fs::read_to_string(unpacked.join("foo.1.0/README")).unwrap(), "patched");

        let first = fs::read(&archive).unwrap();
        make_archive(&fetcher, &root, None, &id, Validation::Enforce)
            .await
            .unwrap();
        assert_eq!(fs::read(&archive).unwrap(), first);
    }

    #[tokio::test]
    async fn cached_single_file_keeps_its_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upstream/foo.ml");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "hello world").unwrap();
        let root = dir.path().join("repo");
        let id = PackageId::new("foo", "1.0");
        let package_dir = layout::package_dir(&root, None, &id);
        fs::create_dir_all(&package_dir).unwrap();
        let mut descriptor = UrlDescriptor::new(source.display().to_string().parse().unwrap());
        descriptor.checksum = vec!["md5=5eb63bbbe01eeed093cb22bb8f5acdc3".parse().unwrap()];
        descriptor.write(&layout::url_file(&package_dir)).unwrap();

        let fetcher = Fetcher::new(
            Registry::new(),
            FetchSettings {
                cache_dir: Some(dir.path().join("cache")),
                ..Default::default()
            },
        );
        let archive = make_archive(&fetcher, &root, None, &id, Validation::Enforce)
            .await
            .unwrap()
            .unwrap();
        let first = fs::read(&archive).unwrap();
        assert_eq!(entries(&archive), vec!["foo.1.0", "foo.1.0/foo.ml"]);

        // the second build is served from the cache
        fs::remove_file(&source).unwrap();
        make_archive(&fetcher, &root, None, &id, Validation::Enforce)
            .await
            .unwrap();
        assert_eq!(entries(&archive), vec!["foo.1.0", "foo.1.0/foo.ml"]);
        assert_eq!(fs::read(&archive).unwrap(), first);
    }

    #[tokio::test]
    async fn empty_package_has_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        let id = PackageId::new("meta", "1");
        fs::create_dir_all(layout::package_dir(dir.path(), None, &id)).unwrap();
        let fetcher = Fetcher::new(Registry::new(), FetchSettings::default());
        let archive = make_archive(&fetcher, dir.path(), None, &id, Validation::Enforce)
            .await
            .unwrap();
        assert_eq!(archive, None);
    }

    #[tokio::test]
    async fn unreachable_source_fails_the_package() {
        let dir = tempfile::tempdir().unwrap();
        let id = PackageId::new("gone", "1.0");
        let package_dir = layout::package_dir(dir.path(), None, &id);
        fs::create_dir_all(&package_dir).unwrap();
        UrlDescriptor::new(dir.path().join("nowhere.tar.gz").display().to_string().parse().unwrap())
            .write(&layout::url_file(&package_dir))
            .unwrap();
        let fetcher = Fetcher::new(Registry::new(), FetchSettings::default());
        let result = make_archive(&fetcher, dir.path(), None, &id, Validation::Enforce).await;
        assert!(matches!(result, Err(Error::Unavailable { package, .. }) if package == "gone.1.0"));
    }
}
