use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::command_builder::ConversionCommand;

/// Wall-clock cap for one conversion run.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(180);

/// Per-stream retention cap. ogr2ogr with -progress can be chatty on big
/// sources; each pipe is read incrementally, the first `OUTPUT_CAP` bytes
/// are kept and everything past that is read and discarded, so memory stays
/// bounded and the child never blocks on a full pipe.
pub const OUTPUT_CAP: usize = 64 * 1024 * 1024;

/// What came back from one bounded external run.
#[derive(Debug)]
pub struct RunOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Present when the run failed: spawn error, timeout or exit status.
    pub error: Option<String>,
}

impl RunOutcome {
    fn failed(error: String) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error),
        }
    }
}

/// Run the command with the standard limits.
pub async fn run(command: &ConversionCommand) -> RunOutcome {
    run_with_limits(command, RUN_TIMEOUT, OUTPUT_CAP).await
}

/// Run an external command, kill it past `timeout`, retain at most
/// `output_cap` bytes per captured stream. Never returns Err: every failure
/// mode is folded into the outcome so callers decide how hard it is.
pub async fn run_with_limits(
    command: &ConversionCommand,
    timeout: Duration,
    output_cap: usize,
) -> RunOutcome {
    let mut child = match Command::new(command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the child on timeout must not leave an orphaned ogr2ogr
        // behind.
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return RunOutcome::failed(format!("failed to spawn {}: {}", command.program, e))
        }
    };

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let run = async {
        let (stdout, stderr, status) = tokio::join!(
            drain_capped(stdout_pipe, output_cap),
            drain_capped(stderr_pipe, output_cap),
            child.wait(),
        );
        (stdout, stderr, status)
    };

    let (stdout, stderr, status) = match tokio::time::timeout(timeout, run).await {
        Err(_) => {
            return RunOutcome::failed(format!(
                "{} timed out after {}s",
                command.program,
                timeout.as_secs()
            ))
        }
        Ok(result) => result,
    };

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            return RunOutcome::failed(format!("failed to wait on {}: {}", command.program, e))
        }
    };

    let success = status.success();
    RunOutcome {
        success,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        error: if success {
            None
        } else {
            Some(format!("{} exited with {}", command.program, status))
        },
    }
}

/// Read a child pipe, keeping the first `cap` bytes. The remainder is read
/// and thrown away so the child can keep writing until it exits.
async fn drain_capped<R>(pipe: Option<R>, cap: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Vec::new();
    };

    let mut retained = Vec::new();
    if (&mut pipe)
        .take(cap as u64)
        .read_to_end(&mut retained)
        .await
        .is_ok()
    {
        let _ = tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await;
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ConversionCommand {
        ConversionCommand {
            program: "sh",
            args: vec!["-c".into(), script.into()],
        }
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr_on_success() {
        let outcome = run(&sh("echo out; echo warn >&2")).await;
        assert!(outcome.success);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.stdout, "out\n");
        // Warnings on stderr do not make the run a failure.
        assert_eq!(outcome.stderr, "warn\n");
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failure_with_stderr_preserved() {
        let outcome = run(&sh("echo broken >&2; exit 3")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.stderr, "broken\n");
        let error = outcome.error.unwrap();
        assert!(error.contains("exited with"), "got: {error}");
    }

    #[tokio::test]
    async fn spawn_failure_is_a_failure() {
        let command = ConversionCommand {
            program: "definitely-not-a-real-binary",
            args: vec![],
        };
        let outcome = run(&command).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn timeout_kills_the_run() {
        let outcome =
            run_with_limits(&sh("sleep 5"), Duration::from_millis(100), OUTPUT_CAP).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn output_past_the_cap_is_dropped() {
        let outcome =
            run_with_limits(&sh("printf 'abcdefgh'"), Duration::from_secs(10), 4).await;
        assert!(outcome.success);
        assert_eq!(outcome.stdout, "abcd");
    }

    #[tokio::test]
    async fn over_cap_writer_finishes_without_blocking_and_retention_stays_capped() {
        // Emits well past both the cap and the kernel pipe buffer; the run
        // must still complete cleanly, with only the cap retained.
        let cap = 1024;
        let outcome = run_with_limits(
            &sh("head -c 500000 /dev/zero; echo done >&2"),
            Duration::from_secs(10),
            cap,
        )
        .await;
        assert!(outcome.success, "got error: {:?}", outcome.error);
        assert_eq!(outcome.stdout.len(), cap);
        assert_eq!(outcome.stderr, "done\n");
    }
}
