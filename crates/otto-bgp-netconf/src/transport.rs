// crates/otto-bgp-netconf/src/transport.rs
// ============================================================================
// Module: NETCONF transport
// Description: The `NetconfTransport` trait and its SSH-backed implementation
// (section 4.5 step 1, section 6 SSH options).
// Dependencies: ssh2, otto-bgp-config
// ============================================================================

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use otto_bgp_config::NetconfConfig;
use ssh2::{HostKeyType, KnownHostFileKind, Session};

use crate::error::NetconfError;
use crate::rpc::EOM_MARKER;

/// A NETCONF-over-SSH session capable of exchanging framed RPCs.
///
/// Abstracted so the pipeline (`pipeline.rs`) can be exercised against a
/// fake in tests without opening a real SSH connection (§4.5).
pub trait NetconfTransport {
    /// Send one already-framed RPC and block for the matching reply,
    /// stripping the trailing `]]>]]>` marker before returning.
    fn send_rpc(&mut self, request: &str) -> Result<String, NetconfError>;

    /// Close the NETCONF channel and the underlying SSH session.
    fn close(&mut self) -> Result<(), NetconfError>;
}

/// SSH-backed transport using `libssh2` via the `ssh2` crate, opening the
/// `netconf` SSH subsystem channel per Junos convention (§6).
pub struct SshNetconfTransport {
    channel: ssh2::Channel,
    read_buf: Vec<u8>,
}

impl SshNetconfTransport {
    /// Connect to `hostname:830`, verify the host key against
    /// `config.known_hosts_path`, authenticate with the given username and
    /// private key, and open the `netconf` subsystem channel.
    ///
    /// `StrictHostKeyChecking=yes` is the only mode this client implements:
    /// an unrecognized or mismatched host key is always `HostKeyMismatch`,
    /// never silently accepted.
    pub fn connect(
        hostname: &str,
        address: &str,
        username: &str,
        private_key_path: &std::path::Path,
        config: &NetconfConfig,
    ) -> Result<Self, NetconfError> {
        let tcp = TcpStream::connect((address, 830)).map_err(|source| NetconfError::ConnectFailed {
            hostname: hostname.to_string(),
            source,
        })?;
        tcp.set_read_timeout(Some(Duration::from_secs(config.session_timeout_secs)))
            .map_err(|source| NetconfError::ConnectFailed {
                hostname: hostname.to_string(),
                source,
            })?;

        let mut session = Session::new().map_err(|e| NetconfError::ConnectFailed {
            hostname: hostname.to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| NetconfError::ConnectFailed {
            hostname: hostname.to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;

        Self::verify_host_key(&session, hostname, address, config)?;

        session
            .userauth_pubkey_file(username, None, private_key_path, None)
            .map_err(|e| NetconfError::ConnectFailed {
                hostname: hostname.to_string(),
                source: std::io::Error::other(e.to_string()),
            })?;
        if !session.authenticated() {
            return Err(NetconfError::ConnectFailed {
                hostname: hostname.to_string(),
                source: std::io::Error::other("SSH authentication did not complete"),
            });
        }

        let mut channel = session.channel_session().map_err(|e| NetconfError::ConnectFailed {
            hostname: hostname.to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;
        channel.subsystem("netconf").map_err(|e| NetconfError::ConnectFailed {
            hostname: hostname.to_string(),
            source: std::io::Error::other(e.to_string()),
        })?;

        let mut transport = Self {
            channel,
            read_buf: Vec::new(),
        };
        // Exchange <hello> before any RPC is valid on the session.
        let hello = transport.send_rpc(&crate::rpc::client_hello())?;
        if hello.is_empty() {
            return Err(NetconfError::MalformedReply(
                "server sent an empty <hello> reply".to_string(),
            ));
        }
        Ok(transport)
    }

    /// Check the server's host key against the `UserKnownHostsFile` entry,
    /// restricted to the algorithms `config.key_algorithms` names.
    fn verify_host_key(
        session: &Session,
        hostname: &str,
        address: &str,
        config: &NetconfConfig,
    ) -> Result<(), NetconfError> {
        let (key, key_type) = session
            .host_key()
            .ok_or_else(|| NetconfError::HostKeyMismatch {
                hostname: hostname.to_string(),
            })?;

        let algorithm_name = match key_type {
            HostKeyType::Rsa => "ssh-rsa",
            HostKeyType::Dss => "ssh-dss",
            HostKeyType::Ecdsa256 => "ecdsa-sha2-nistp256",
            HostKeyType::Ecdsa384 => "ecdsa-sha2-nistp384",
            HostKeyType::Ecdsa521 => "ecdsa-sha2-nistp521",
            HostKeyType::Ed25519 => "ssh-ed25519",
            HostKeyType::Unknown => "unknown",
        };
        if !config.key_algorithms.iter().any(|a| a == algorithm_name) {
            return Err(NetconfError::HostKeyMismatch {
                hostname: hostname.to_string(),
            });
        }

        if config.known_hosts_path.is_empty() {
            return Err(NetconfError::HostKeyMismatch {
                hostname: hostname.to_string(),
            });
        }

        let mut known_hosts = session.known_hosts().map_err(|_| NetconfError::HostKeyMismatch {
            hostname: hostname.to_string(),
        })?;
        known_hosts
            .read_file(
                std::path::Path::new(&config.known_hosts_path),
                KnownHostFileKind::OpenSSH,
            )
            .map_err(|_| NetconfError::HostKeyMismatch {
                hostname: hostname.to_string(),
            })?;

        match known_hosts.check(address, key) {
            ssh2::CheckResult::Match => Ok(()),
            ssh2::CheckResult::NotFound | ssh2::CheckResult::Mismatch | ssh2::CheckResult::Failure => {
                Err(NetconfError::HostKeyMismatch {
                    hostname: hostname.to_string(),
                })
            }
        }
    }
}

impl NetconfTransport for SshNetconfTransport {
    fn send_rpc(&mut self, request: &str) -> Result<String, NetconfError> {
        self.channel
            .write_all(request.as_bytes())
            .and_then(|()| self.channel.flush())
            .map_err(|source| NetconfError::ConnectFailed {
                hostname: "session".to_string(),
                source,
            })?;

        self.read_buf.clear();
        let mut chunk = [0_u8; 4096];
        loop {
            let n = self
                .channel
                .read(&mut chunk)
                .map_err(|source| NetconfError::ConnectFailed {
                    hostname: "session".to_string(),
                    source,
                })?;
            if n == 0 {
                return Err(NetconfError::MalformedReply(
                    "connection closed before end-of-message marker".to_string(),
                ));
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find_subslice(&self.read_buf, EOM_MARKER.as_bytes()) {
                let reply = String::from_utf8_lossy(&self.read_buf[..pos]).into_owned();
                return Ok(reply);
            }
        }
    }

    fn close(&mut self) -> Result<(), NetconfError> {
        let _ = self.send_rpc(&crate::rpc::close_session(u64::MAX));
        self.channel
            .close()
            .map_err(|e| NetconfError::MalformedReply(format!("failed to close channel: {e}")))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn find_subslice_locates_the_eom_marker() {
        let haystack = b"<rpc-reply/>]]>]]>";
        assert_eq!(find_subslice(haystack, EOM_MARKER.as_bytes()), Some(12));
    }

    #[test]
    fn find_subslice_returns_none_when_absent() {
        let haystack = b"<rpc-reply/>";
        assert_eq!(find_subslice(haystack, EOM_MARKER.as_bytes()), None);
    }
}
