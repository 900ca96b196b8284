//! Where things live inside a repository:
//!
//! ```text
//! <root>/repo.toml
//! <root>/packages/[<prefix>/]<name>.<version>/url.toml
//! <root>/packages/[<prefix>/]<name>.<version>/files/
//! <root>/archives/<name>.<version>+opam.tar.gz
//! ```

use std::path::{Path, PathBuf};

use crate::Error;

/// A package name and version, written `name.version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl PackageId {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, version: V) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.name, self.version)
    }
}

impl std::str::FromStr for PackageId {
    type Err = Error;

    // Names never contain a dot, versions may
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self::new(name, version))
            }
            _ => Err(Error::InvalidPackage(s.to_string())),
        }
    }
}

/// The file recording a repository's name and url.
pub fn repo_file(root: &Path) -> PathBuf {
    root.join("repo.toml")
}

pub fn packages_dir(root: &Path) -> PathBuf {
    root.join("packages")
}

pub fn archives_dir(root: &Path) -> PathBuf {
    root.join("archives")
}

pub fn package_dir(root: &Path, prefix: Option<&str>, package: &PackageId) -> PathBuf {
    let mut dir = packages_dir(root);
    if let Some(prefix) = prefix {
        dir.push(prefix);
    }
    dir.join(package.to_string())
}

pub fn url_file(package_dir: &Path) -> PathBuf {
    package_dir.join("url.toml")
}

pub fn files_dir(package_dir: &Path) -> PathBuf {
    package_dir.join("files")
}

/// The archive built for `package`.
pub fn archive(root: &Path, package: &PackageId) -> PathBuf {
    archives_dir(root).join(format!("{package}+opam.tar.gz"))
}
