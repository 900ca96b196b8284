//! Support for git remotes.

use std::path::Path;

use tokio::process::Command;

use super::vcs::VcsTool;
use crate::process;
use crate::url::Url;

/// The `git` command line.
pub struct Git;

fn is_commit_sha(reference: &str) -> bool {
    reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

impl VcsTool for Git {
    fn name(&self) -> &'static str {
        "git"
    }

    fn metadata_dir(&self) -> &'static str {
        ".git"
    }

    fn clone_command(&self, url: &Url, into: &Path) -> Command {
        let mut git = process::command("git", into.parent().unwrap_or(Path::new(".")));
        git.args(["clone", "--depth", "1", "--no-tags"]);
        match url.fragment() {
            Some(commit_sha) if is_commit_sha(commit_sha) => {
                git.args(["--revision", commit_sha]);
            }
            Some(branch) => {
                git.args(["--branch", branch]);
            }
            None => {}
        }
        git.args(["--recurse-submodules", "--shallow-submodules"]);
        git.arg(url.address()).arg(into);
        git
    }

    fn update_commands(&self, url: &Url, repo: &Path) -> Vec<Command> {
        let mut fetch = process::command("git", repo);
        fetch.args(["fetch", "--depth", "1", "--no-tags"]);
        fetch.arg(url.address()).arg(url.fragment().unwrap_or("HEAD"));
        let mut reset = process::command("git", repo);
        reset.args(["reset", "--hard", "FETCH_HEAD"]);
        let mut submodules = process::command("git", repo);
        submodules.args(["submodule", "update", "--init", "--recursive", "--depth", "1"]);
        vec![fetch, reset, submodules]
    }

    fn revision_command(&self, repo: &Path) -> Command {
        let mut git = process::command("git", repo);
        git.args(["rev-parse", "HEAD"]);
        git
    }
}

#[cfg(test)]
mod test_git_commands {
    use super::*;

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    #[test]
    fn clone_with_branch() {
        let command = Git.clone_command(&url("https://example.com/foo.git#main"), Path::new("/tmp/foo"));
        assert_eq!(
            process::describe(&command),
            "git clone --depth 1 --no-tags --branch main --recurse-submodules --shallow-submodules https://example.com/foo.git /tmp/foo"
        );
    }

    #[test]
    fn clone_with_commit_sha() {
        let sha = "0123456789abcdef0123456789abcdef01234567";
        let command = Git.clone_command(
            &url(&format!("https://example.com/foo.git#{sha}")),
            Path::new("/tmp/foo"),
        );
        assert!(process::describe(&command).contains(&format!("--revision {sha}")));
    }

    #[test]
    fn update_fetches_the_fragment() {
        let commands = Git.update_commands(&url("git+https://example.com/foo#v1.0"), Path::new("/tmp/foo"));
        let lines: Vec<String> = commands.iter().map(process::describe).collect();
        assert_eq!(
            lines,
            vec![
                "git fetch --depth 1 --no-tags https://example.com/foo v1.0",
                "git reset --hard FETCH_HEAD",
                "git submodule update --init --recursive --depth 1",
            ]
        );
    }

    #[test]
    fn revision_is_the_first_line() {
        assert_eq!(Git.parse_revision("abc123\n").as_deref(), Some("abc123"));
        assert_eq!(Git.parse_revision("\n"), None);
    }
}
