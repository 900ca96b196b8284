//! The shared machinery of the version-control backends. Each tool only describes its commands;
//! [`VcsBackend`] decides whether to clone or update and runs them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::Backend;
use crate::Error;
use crate::checksum::Checksum;
use crate::outcome::{Payload, PullOutcome};
use crate::process;
use crate::url::Url;

/// The command lines of one version-control tool.
pub trait VcsTool: Send + Sync {
    /// The program name, for messages.
    fn name(&self) -> &'static str;

    /// The directory marking a checkout, relative to its root.
    fn metadata_dir(&self) -> &'static str;

    /// Clone `url` into `into`. The command runs in the parent of `into`.
    fn clone_command(&self, url: &Url, into: &Path) -> Command;

    /// Bring the existing checkout at `repo` up to date with `url`, in order.
    fn update_commands(&self, url: &Url, repo: &Path) -> Vec<Command>;

    /// Print the revision checked out at `repo`.
    fn revision_command(&self, repo: &Path) -> Command;

    fn parse_revision(&self, stdout: &str) -> Option<String> {
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// A [`Backend`] driving a [`VcsTool`] through subprocesses.
pub struct VcsBackend<T> {
    tool: T,
}

impl<T: VcsTool> VcsBackend<T> {
    pub fn new(tool: T) -> Self {
        Self { tool }
    }

    /// Clone into `repo`, or update it if it already holds a checkout.
    async fn sync(&self, url: &Url, repo: &Path) -> Result<(), Error> {
        if repo.join(self.tool.metadata_dir()).is_dir() {
            log::debug!("updating {} checkout at {}", self.tool.name(), repo.display());
            for command in self.tool.update_commands(url, repo) {
                process::run(command).await?;
            }
            return Ok(());
        }
        if repo.is_dir() {
            let mut entries = tokio::fs::read_dir(repo).await?;
            if entries.next_entry().await?.is_some() {
                return Err(Error::Config(format!(
                    "{} exists and is not a {} checkout",
                    repo.display(),
                    self.tool.name()
                )));
            }
            tokio::fs::remove_dir(repo).await?;
        }
        if let Some(parent) = repo.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        log::debug!("cloning {url} into {}", repo.display());
        process::run(self.tool.clone_command(url, repo)).await?;
        Ok(())
    }
}

fn checkout_name(url: &Url) -> PathBuf {
    let basename = url.basename();
    match basename.strip_suffix(".git") {
        Some("") => PathBuf::from("checkout"),
        Some(stem) => PathBuf::from(stem),
        None => PathBuf::from(basename),
    }
}

#[async_trait]
impl<T: VcsTool> Backend for VcsBackend<T> {
    async fn pull_url(
        &self,
        dest_dir: &Path,
        _checksum: Option<&Checksum>,
        url: &Url,
    ) -> Result<PullOutcome<Payload>, Error> {
        let repo = dest_dir.join(checkout_name(url));
        self.sync(url, &repo).await?;
        Ok(PullOutcome::Fetched(Payload::Directory(repo)))
    }

    async fn pull_repo(&self, name: &str, root: &Path, url: &Url) -> Result<(), Error> {
        self.sync(url, root).await?;
        log::debug!("[{name}] synchronized with {url}");
        Ok(())
    }

    async fn revision(&self, root: &Path) -> Result<Option<String>, Error> {
        if !root.join(self.tool.metadata_dir()).is_dir() {
            return Ok(None);
        }
        let stdout = process::run(self.tool.revision_command(root)).await?;
        Ok(self.tool.parse_revision(&stdout))
    }
}

#[cfg(test)]
mod test_vcs_backend {
    use super::*;

    /// A tool made of shell one-liners, so the clone/update logic can be checked without any
    /// version-control program installed.
    struct Shell;

    impl VcsTool for Shell {
        fn name(&self) -> &'static str {
            "shell"
        }

        fn metadata_dir(&self) -> &'static str {
            ".shell"
        }

        fn clone_command(&self, url: &Url, into: &Path) -> Command {
            let mut command = process::command("sh", into.parent().unwrap());
            command.args(["-c", "mkdir -p \"$1/.shell\" && echo \"$2\" > \"$1/.shell/rev\""]);
            command.arg("sh").arg(into).arg(url.fragment().unwrap_or("r1"));
            command
        }

        fn update_commands(&self, _url: &Url, repo: &Path) -> Vec<Command> {
            let mut command = process::command("sh", repo);
            command.args(["-c", "echo r2 > .shell/rev"]);
            vec![command]
        }

        fn revision_command(&self, repo: &Path) -> Command {
            let mut command = process::command("cat", repo);
            command.arg(".shell/rev");
            command
        }
    }

    fn url() -> Url {
        "git+https://example.com/foo.git#r1".parse().unwrap()
    }

    #[tokio::test]
    async fn clone_then_update() {
        let dir = tempfile::tempdir().unwrap();
        let backend = VcsBackend::new(Shell);
        let outcome = backend.pull_url(dir.path(), None, &url()).await.unwrap();
        let repo = dir.path().join("foo");
        assert_eq!(outcome, PullOutcome::Fetched(Payload::Directory(repo.clone())));
        assert_eq!(backend.revision(&repo).await.unwrap().as_deref(), Some("r1"));

        backend.pull_url(dir.path(), None, &url()).await.unwrap();
        assert_eq!(backend.revision(&repo).await.unwrap().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn empty_directory_is_replaced_by_a_clone() {
        let root = tempfile::tempdir().unwrap();
        let backend = VcsBackend::new(Shell);
        backend.pull_repo("default", root.path(), &url()).await.unwrap();
        assert!(root.path().join(".shell/rev").is_file());
    }

    #[tokio::test]
    async fn foreign_directory_is_a_config_error() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("README"), "not a checkout").unwrap();
        let result = VcsBackend::new(Shell)
            .pull_repo("default", root.path(), &url())
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn no_checkout_has_no_revision() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(VcsBackend::new(Shell).revision(root.path()).await.unwrap(), None);
    }

    #[test]
    fn checkout_names() {
        assert_eq!(checkout_name(&url()), PathBuf::from("foo"));
        let plain: Url = "hg+https://example.com/repos/bar".parse().unwrap();
        assert_eq!(checkout_name(&plain), PathBuf::from("bar"));
    }
}
