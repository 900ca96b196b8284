//! Support for darcs remotes.

use std::path::Path;

use tokio::process::Command;

use super::vcs::VcsTool;
use crate::process;
use crate::url::Url;

/// The `darcs` command line.
pub struct Darcs;

impl VcsTool for Darcs {
    fn name(&self) -> &'static str {
        "darcs"
    }

    fn metadata_dir(&self) -> &'static str {
        "_darcs"
    }

    fn clone_command(&self, url: &Url, into: &Path) -> Command {
        let mut darcs = process::command("darcs", into.parent().unwrap_or(Path::new(".")));
        darcs.args(["clone", "--lazy"]);
        if let Some(tag) = url.fragment() {
            darcs.args(["--tag", tag]);
        }
        darcs.arg(url.address()).arg(into);
        darcs
    }

    fn update_commands(&self, url: &Url, repo: &Path) -> Vec<Command> {
        let mut pull = process::command("darcs", repo);
        pull.args(["pull", "--all"]).arg(url.address());
        vec![pull]
    }

    fn revision_command(&self, repo: &Path) -> Command {
        let mut darcs = process::command("darcs", repo);
        darcs.args(["log", "--last", "1"]);
        darcs
    }

    // `darcs log` starts with `patch <hash>`
    fn parse_revision(&self, stdout: &str) -> Option<String> {
        stdout
            .lines()
            .find_map(|line| line.strip_prefix("patch "))
            .map(|hash| hash.trim().to_string())
    }
}
