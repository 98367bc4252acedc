//! Process helpers for agents started inside simulated nodes.

use std::process::{Child, Command};
use std::time::{Duration, Instant};

/// Pid reported by `pgrep`, if the output holds exactly one line.
///
/// No match and several matches both yield `None`: the harness cannot tell
/// which process it started.
pub fn parse_pgrep(output: &str) -> Option<u32> {
    let lines: Vec<&str> = output
        .trim()
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    match lines.as_slice() {
        [only] => only.parse().ok(),
        _ => None,
    }
}

/// Send SIGTERM to `pid`.
///
/// Agents launched through `sudo ip netns exec` belong to root; when the
/// direct signal is refused the request is retried through `sudo kill`.
pub fn terminate(pid: u32) -> std::io::Result<()> {
    let raw = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::other(format!("pid {pid} out of range")))?;
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid only
    // yields ESRCH.
    let rc = unsafe { libc::kill(raw, libc::SIGTERM) };
    if rc == 0 {
        tracing::debug!(pid, "sent SIGTERM");
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::EPERM) {
        return Err(err);
    }
    let output = Command::new("sudo")
        .args(["kill", "-TERM", &pid.to_string()])
        .output()?;
    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "sudo kill {pid} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    tracing::debug!(pid, "sent SIGTERM via sudo");
    Ok(())
}

/// Wait for `child` to exit, killing it once `timeout` elapses.
pub fn reap(child: &mut Child, timeout: Duration) -> std::io::Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            tracing::warn!(pid = child.id(), "process did not exit, killing");
            child.kill()?;
            child.wait()?;
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgrep_needs_exactly_one_line() {
        assert_eq!(parse_pgrep("4242\n"), Some(4242));
        assert_eq!(parse_pgrep("  17  "), Some(17));
        assert_eq!(parse_pgrep(""), None);
        assert_eq!(parse_pgrep("12\n13\n"), None);
        assert_eq!(parse_pgrep("not-a-pid"), None);
    }

    #[test]
    fn terminate_and_reap_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        terminate(child.id()).unwrap();
        reap(&mut child, Duration::from_secs(5)).unwrap();
        assert!(child.try_wait().unwrap().is_some());
    }
}
