use std::os::unix::process::CommandExt;
use std::process::Command;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::kill;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use slog::Logger;
use wait_timeout::ChildExt;

/// Runs the operator-supplied shell command with a hard deadline and reports pass/fail.
///
/// The command is spawned in its own process group (`setsid`, via `pre_exec`) so that on timeout
/// the whole group -- not just the `sh` that exec'd it -- can be killed. This is the structured
/// reading (§4.1, §9 REDESIGN FLAGS) of the original's `SIGALRM` handler plus `os.killpg`.
pub struct Probe {
    command: String,
    deadline: Duration,
    logger: Logger,
}

impl Probe {
    pub fn new(command: impl Into<String>, deadline: Duration, logger: Logger) -> Probe {
        Probe {
            command: command.into(),
            deadline,
            logger,
        }
    }

    /// Run the configured command once. Returns `true` iff it exits with status 0 before the
    /// deadline. Execution is synchronous: the caller (the control loop) blocks for the duration
    /// of a single probe, by design (§4.1: probes never overlap).
    pub fn check(&self) -> bool {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        unsafe {
            command.pre_exec(|| {
                let _ = nix::unistd::setsid();
                Ok(())
            });
        }
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(error) => {
                error!(self.logger, "Failed to spawn health probe"; "error" => %error);
                return false;
            }
        };

        let pid = Pid::from_raw(child.id() as i32);
        match child.wait_timeout(self.deadline) {
            Ok(Some(status)) => {
                if status.success() {
                    true
                } else {
                    error!(
                        self.logger, "Health probe exited with non-zero status";
                        "code" => status.code()
                    );
                    false
                }
            }
            Ok(None) => {
                error!(self.logger, "Health probe exceeded deadline, killing process group");
                let _ = kill(Pid::from_raw(-pid.as_raw()), Signal::SIGKILL);
                let _ = child.wait();
                false
            }
            Err(error) => {
                error!(self.logger, "Failed to wait on health probe"; "error" => %error);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use slog::Discard;
    use slog::Logger;

    use super::Probe;

    fn logger() -> Logger {
        Logger::root(Discard, o!())
    }

    #[test]
    fn passes_on_zero_exit() {
        let probe = Probe::new("exit 0", Duration::from_millis(900), logger());
        assert!(probe.check());
    }

    #[test]
    fn fails_on_nonzero_exit() {
        let probe = Probe::new("exit 1", Duration::from_millis(900), logger());
        assert!(!probe.check());
    }

    #[test]
    fn fails_on_timeout() {
        let probe = Probe::new("sleep 2", Duration::from_millis(200), logger());
        assert!(!probe.check());
    }
}
