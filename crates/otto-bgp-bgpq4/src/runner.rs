// crates/otto-bgp-bgpq4/src/runner.rs
// ============================================================================
// Module: bgpq4 subprocess runner
// Description: Spawns one `bgpq4` invocation, enforces the 30 s default
// timeout (section 5), and turns its stdout into a Policy (section 3).
// Dependencies: otto-bgp-core, std::process, std::sync, std::thread
// ============================================================================

use std::io::Read;
use std::process::Child;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::time::Duration;
use std::time::Instant;

use otto_bgp_core::Asn;
use otto_bgp_core::GeneratorMode;
use otto_bgp_core::Policy;
use otto_bgp_core::ResourceId;
use otto_bgp_core::Timestamp;

use crate::command::TunnelEndpoint;
use crate::command::build_argv;
use crate::error::Bgpq4Error;

/// One `bgpq4` request: which AS/policy name to query, and over which
/// tunnel (if any).
#[derive(Debug, Clone)]
pub struct Bgpq4Request {
    /// The origin AS to generate a policy for.
    pub asn: Asn,
    /// The prefix-list name the generated policy will carry.
    pub policy_name: String,
}

fn spawn_with_timeout(argv: &[String], timeout: Duration) -> Result<(std::process::ExitStatus, Vec<u8>, Vec<u8>), Bgpq4Error> {
    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child: Child = command.spawn().map_err(|e| Bgpq4Error::Spawn(e.to_string()))?;
    let child = Arc::new(Mutex::new(Some(child)));
    let (tx, rx) = mpsc::channel();

    {
        let child = Arc::clone(&child);
        std::thread::spawn(move || {
            let mut guard = child.lock().unwrap_or_else(|p| p.into_inner());
            let Some(mut owned) = guard.take() else {
                return;
            };
            drop(guard);

            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            if let Some(mut out) = owned.stdout.take() {
                let _ = out.read_to_end(&mut stdout);
            }
            if let Some(mut err) = owned.stderr.take() {
                let _ = err.read_to_end(&mut stderr);
            }
            let status = owned.wait();
            let _ = tx.send(status.map(|s| (s, stdout, stderr)));
        });
    }

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            if let Some(mut owned) = child.lock().unwrap_or_else(|p| p.into_inner()).take() {
                let _ = owned.kill();
                let _ = owned.wait();
            }
            return Err(Bgpq4Error::Timeout(timeout));
        }
        match rx.recv_timeout(remaining.min(Duration::from_millis(50))) {
            Ok(Ok((status, stdout, stderr))) => {
                return Ok((status, stdout, stderr));
            }
            Ok(Err(e)) => return Err(Bgpq4Error::Spawn(e.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(Bgpq4Error::Spawn("worker thread disconnected".to_owned()));
            }
        }
    }
}

/// Run one `bgpq4` invocation and parse its stdout into a [`Policy`].
///
/// # Errors
/// Returns [`Bgpq4Error::UnsafeArgument`] if the request's fields fail
/// validation, [`Bgpq4Error::Timeout`] if the subprocess exceeds `timeout`,
/// [`Bgpq4Error::NonZeroExit`] if it exits with a failure status, or
/// [`Bgpq4Error::PolicyConstruction`] if the output cannot become a
/// well-formed [`Policy`].
pub fn run_one(
    request: &Bgpq4Request,
    tunnel: Option<TunnelEndpoint<'_>>,
    timeout: Duration,
) -> Result<Policy, Bgpq4Error> {
    let argv = build_argv(&request.policy_name, request.asn, tunnel)?;
    let (status, stdout, stderr) = spawn_with_timeout(&argv, timeout)?;

    if !status.success() {
        return Err(Bgpq4Error::NonZeroExit {
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        });
    }

    let generator_mode = if tunnel.is_some() {
        GeneratorMode::Bgpq4Tunneled
    } else {
        GeneratorMode::Bgpq4Direct
    };

    Policy::new(
        ResourceId::Asn(request.asn),
        request.policy_name.clone(),
        stdout,
        Timestamp::now(),
        generator_mode,
    )
    .map_err(|e| Bgpq4Error::PolicyConstruction(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_policy_name_is_rejected_before_spawn() {
        let request = Bgpq4Request {
            asn: Asn::new(1),
            policy_name: "bad;name".to_owned(),
        };
        let err = run_one(&request, None, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Bgpq4Error::UnsafeArgument(_)));
    }

    #[test]
    fn nonexistent_binary_surfaces_as_spawn_error() {
        // build_argv always emits argv[0] == "bgpq4"; spawn_with_timeout is
        // exercised directly here against a binary guaranteed absent.
        let argv = vec!["otto-bgp-definitely-not-a-real-binary".to_owned()];
        let err = spawn_with_timeout(&argv, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Bgpq4Error::Spawn(_)));
    }
}
