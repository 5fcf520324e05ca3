//! Command implementations for cradlesync.
//!
//! Each command returns its rendered output; `main` prints it.

mod daemon;
mod queue;
mod run;

pub use daemon::daemon;
pub use queue::{clear, dead_letters, dequeue, enqueue, list, status, EnqueueArgs};
pub use run::run;

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::args::Cli;
use crate::error::Error;

/// Generate a shell completion script.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the generated script is not UTF-8.
pub fn completions(shell: Shell) -> Result<String, Error> {
    let mut cmd = Cli::command();
    let mut buf = Vec::new();
    clap_complete::generate(shell, &mut cmd, "cradlesync", &mut buf);
    String::from_utf8(buf).map_err(|e| Error::InvalidInput(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_completions() {
        let script = completions(Shell::Bash).unwrap();
        assert!(script.contains("cradlesync"));
        assert!(script.contains("dead-letters"));
    }

    #[test]
    fn test_zsh_completions() {
        let script = completions(Shell::Zsh).unwrap();
        assert!(script.contains("#compdef cradlesync"));
    }
}
