use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::Error;

/// Build a command for `program` running in `cwd`.
pub(crate) fn command<P: AsRef<Path>>(program: &str, cwd: P) -> Command {
    let mut command = Command::new(program);
    command
        .current_dir(cwd.as_ref())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// The command line, for messages.
pub(crate) fn describe(command: &Command) -> String {
    let std = command.as_std();
    std::iter::once(std.get_program())
        .chain(std.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command to completion and return its stdout. A non-zero exit is an
/// [`Error::Subprocess`]; a program that cannot be started is a configuration error.
pub(crate) async fn run(mut command: Command) -> Result<String, Error> {
    let line = describe(&command);
    log::debug!("running '{line}'");
    let output = command
        .output()
        .await
        .map_err(|e| Error::Config(format!("could not run '{line}': {e}")))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(Error::subprocess(line, output.status, &output.stderr))
    }
}
