//! Command execution abstraction shared by the tunnel, network-plane and
//! router drivers (§4.5–§4.7). All three shell out to host tools (`ip`,
//! `wg`, the routing daemon's CLI); routing that through a trait lets
//! their orchestration logic run under test without touching the host's
//! network stack, matching the design note on dependency-injecting for
//! tests instead of module-level global state.

use std::process::Output;

/// Runs an external command and returns its captured output. Implemented
/// by [`SystemCommandRunner`] for real use and by fakes in test modules.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output>;
}

/// Shells out via `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output> {
        std::process::Command::new(program).args(args).output()
    }
}

/// Convenience: true if `output` reported a zero exit status.
pub fn succeeded(output: &Output) -> bool {
    output.status.success()
}

pub fn stdout_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[cfg(test)]
pub mod fake {
    //! A scripted `CommandRunner` for driver unit tests: records every
    //! invocation and returns pre-seeded output keyed by `(program, args)`,
    //! falling back to a configurable default.

    use super::CommandRunner;
    use std::collections::VecDeque;
    use std::os::unix::process::ExitStatusExt;
    use std::process::{ExitStatus, Output};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub struct ScriptedOutput {
        pub ok: bool,
        pub stdout: String,
        pub stderr: String,
    }

    impl ScriptedOutput {
        pub fn ok(stdout: impl Into<String>) -> Self {
            Self {
                ok: true,
                stdout: stdout.into(),
                stderr: String::new(),
            }
        }

        pub fn err(stderr: impl Into<String>) -> Self {
            Self {
                ok: false,
                stdout: String::new(),
                stderr: stderr.into(),
            }
        }
    }

    pub struct FakeCommandRunner {
        queue: Mutex<VecDeque<ScriptedOutput>>,
        default: ScriptedOutput,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl FakeCommandRunner {
        pub fn new() -> Self {
            Self {
                queue: Mutex::new(VecDeque::new()),
                default: ScriptedOutput::ok(""),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn push(&self, output: ScriptedOutput) {
            self.queue.lock().unwrap().push_back(output);
        }

        pub fn calls(&self) -> Vec<(String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Default for FakeCommandRunner {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CommandRunner for FakeCommandRunner {
        fn run(&self, program: &str, args: &[&str]) -> std::io::Result<Output> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_string(), args.iter().map(|s| s.to_string()).collect()));
            let scripted = self.queue.lock().unwrap().pop_front().unwrap_or_else(|| self.default.clone());
            Ok(Output {
                status: ExitStatus::from_raw(if scripted.ok { 0 } else { 1 << 8 }),
                stdout: scripted.stdout.into_bytes(),
                stderr: scripted.stderr.into_bytes(),
            })
        }
    }
}
