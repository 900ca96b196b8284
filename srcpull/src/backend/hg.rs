//! Support for mercurial remotes.

use std::path::Path;

use tokio::process::Command;

use super::vcs::VcsTool;
use crate::process;
use crate::url::Url;

/// The `hg` command line.
pub struct Mercurial;

impl VcsTool for Mercurial {
    fn name(&self) -> &'static str {
        "hg"
    }

    fn metadata_dir(&self) -> &'static str {
        ".hg"
    }

    fn clone_command(&self, url: &Url, into: &Path) -> Command {
        let mut hg = process::command("hg", into.parent().unwrap_or(Path::new(".")));
        hg.arg("clone");
        if let Some(reference) = url.fragment() {
            hg.args(["-r", reference]);
        }
        hg.arg(url.address()).arg(into);
        hg
    }

    fn update_commands(&self, url: &Url, repo: &Path) -> Vec<Command> {
        let mut pull = process::command("hg", repo);
        pull.arg("pull");
        let mut update = process::command("hg", repo);
        update.args(["update", "--clean"]);
        if let Some(reference) = url.fragment() {
            pull.args(["-r", reference]);
            update.args(["-r", reference]);
        }
        pull.arg(url.address());
        vec![pull, update]
    }

    fn revision_command(&self, repo: &Path) -> Command {
        let mut hg = process::command("hg", repo);
        hg.args(["id", "-i"]);
        hg
    }
}
