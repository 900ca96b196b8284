//! Local mirrors of package repositories.

use std::path::{Path, PathBuf};

use crate::Error;
use crate::backend::Registry;
use crate::layout::{self, PackageId};
use crate::url::Url;

/// A package repository mirrored at `root` from `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub root: PathBuf,
    pub url: Url,
}

#[derive(serde::Deserialize, serde::Serialize)]
struct RepoFile {
    name: String,
    url: Url,
}

impl Repository {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, root: P, url: Url) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            url,
        }
    }

    /// Open the repository initialised at `root`.
    pub fn load<P: Into<PathBuf>>(root: P) -> Result<Self, Error> {
        let root = root.into();
        let path = layout::repo_file(&root);
        let text = std::fs::read_to_string(&path).map_err(|err| {
            Error::Config(format!("no repository at {}: {err}", root.display()))
        })?;
        let RepoFile { name, url } = toml::from_str(&text)?;
        Ok(Self { name, root, url })
    }

    /// Create the empty mirror layout and record the name and url of the repository.
    pub fn init(&self) -> Result<(), Error> {
        std::fs::create_dir_all(layout::packages_dir(&self.root))?;
        std::fs::create_dir_all(layout::archives_dir(&self.root))?;
        let repo_file = RepoFile {
            name: self.name.clone(),
            url: self.url.clone(),
        };
        std::fs::write(layout::repo_file(&self.root), toml::to_string(&repo_file)?)?;
        Ok(())
    }

    /// Re-synchronise the mirror with its url.
    pub async fn update(&self, registry: &Registry) -> Result<(), Error> {
        log::info!("[{}] updating from {}", self.name, self.url);
        registry
            .backend(self.url.transport())
            .pull_repo(&self.name, &self.root, &self.url)
            .await
    }

    /// The revision of the mirror, for transports that have one.
    pub async fn revision(&self, registry: &Registry) -> Result<Option<String>, Error> {
        registry.backend(self.url.transport()).revision(&self.root).await
    }

    /// Every package of the mirror, with the prefix directory it was found in. Directories under
    /// `packages/` are packages when their name parses as `name.version`, prefix directories
    /// otherwise.
    pub fn packages(&self) -> Result<Vec<(Option<String>, PackageId)>, Error> {
        let mut packages = Vec::new();
        for (name, path) in subdirs(&layout::packages_dir(&self.root))? {
            match name.parse::<PackageId>() {
                Ok(package) => packages.push((None, package)),
                Err(_) => {
                    for (inner, _) in subdirs(&path)? {
                        match inner.parse::<PackageId>() {
                            Ok(package) => packages.push((Some(name.clone()), package)),
                            Err(_) => log::debug!("skipping {}", path.join(&inner).display()),
                        }
                    }
                }
            }
        }
        Ok(packages)
    }
}

fn subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    let mut found = Vec::new();
    if !dir.is_dir() {
        return Ok(found);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            found.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    found.sort();
    Ok(found)
}
