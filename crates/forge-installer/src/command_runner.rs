//! Subprocess abstraction for `npm`/`pip` installer steps (spec.md §9).
//!
//! Reimplementing npm/pip is out of scope; they are always shelled out to.
//! This trait exists so tests can substitute a double instead of actually
//! invoking those tools.

use std::path::Path;

use async_trait::async_trait;

/// Captured output of a subprocess invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the process exited with status 0.
    pub success: bool,
    /// The raw exit code, when the process was not killed by a signal.
    pub status: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Abstracts over spawning a subprocess and waiting for it to finish.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` in `cwd`, capturing stdout/stderr.
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> std::io::Result<CommandOutput>;
}

/// The real runner: shells out via [`tokio::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> std::io::Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .await?;
        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
pub mod test_double {
    //! A scripted [`CommandRunner`] double for installer tests.
    use super::{async_trait, CommandOutput, CommandRunner};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;

    /// Replays a fixed queue of responses, one per call, regardless of
    /// which program/args were requested.
    pub struct ScriptedRunner {
        responses: Mutex<VecDeque<CommandOutput>>,
    }

    impl ScriptedRunner {
        /// Build a double that returns `responses` in order.
        #[must_use]
        pub fn new(responses: Vec<CommandOutput>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            _program: &str,
            _args: &[String],
            _cwd: &Path,
        ) -> std::io::Result<CommandOutput> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| std::io::Error::other("ScriptedRunner ran out of responses"))
        }
    }
}
