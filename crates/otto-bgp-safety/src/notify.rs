// crates/otto-bgp-safety/src/notify.rs
// ============================================================================
// Module: Notification delivery
// Description: Sendmail-subprocess and SMTP+STARTTLS delivery of safety
// notifications (section 4.4).
// Dependencies: otto-bgp-config, rustls, rustls-pki-types, webpki-roots,
// base64, std::net, std::process
// ============================================================================

//! ## Overview
//! [`Notifier`] abstracts delivery; [`SendmailNotifier`] spawns a local
//! MTA-shaped binary the way `otto-bgp-bgpq4` spawns `bgpq4`, and
//! [`SmtpNotifier`] speaks line-based SMTP over a `TcpStream`, upgrading to
//! TLS with `rustls` immediately after `STARTTLS`.

use std::io::BufRead;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::process::Command;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;
use std::time::Instant;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use otto_bgp_config::DeliveryMethod;
use otto_bgp_config::NotificationConfig;
use rustls::ClientConnection;
use rustls::RootCertStore;
use rustls::StreamOwned;
use rustls_pki_types::ServerName;

use crate::error::SafetyError;

static ROOT_STORE: LazyLock<Arc<RootCertStore>> = LazyLock::new(|| {
    let mut store = RootCertStore::empty();
    store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    Arc::new(store)
});

/// A notification message: subject and body, already composed by the
/// caller.
pub struct Notification<'a> {
    pub subject: &'a str,
    pub body: &'a str,
}

/// Delivers a [`Notification`] to the configured recipients.
pub trait Notifier {
    /// # Errors
    /// Returns [`SafetyError::NotificationFailed`] if delivery fails or
    /// times out.
    fn send(&self, notification: &Notification<'_>) -> Result<(), SafetyError>;
}

/// Build the configured notifier, or `None` when notifications are
/// disabled.
#[must_use]
pub fn notifier_from_config(config: &NotificationConfig) -> Option<Box<dyn Notifier + Send + Sync>> {
    if !config.enabled {
        return None;
    }
    match config.delivery_method {
        DeliveryMethod::Sendmail => Some(Box::new(SendmailNotifier::new(config.clone()))),
        DeliveryMethod::Smtp => Some(Box::new(SmtpNotifier::new(config.clone()))),
    }
}

/// Delivers via a local `sendmail`-style binary, invoked the same way
/// `otto-bgp-bgpq4` invokes `bgpq4`: piped stdio, a reader thread, and a
/// deadline-bounded wait.
pub struct SendmailNotifier {
    config: NotificationConfig,
}

impl SendmailNotifier {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }
}

impl Notifier for SendmailNotifier {
    fn send(&self, notification: &Notification<'_>) -> Result<(), SafetyError> {
        let message = render_message(&self.config, notification);
        let timeout = Duration::from_secs(self.config.delivery_timeout_secs);

        let mut command = Command::new("sendmail");
        command
            .arg("-t")
            .arg("-oi")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .map_err(|e| SafetyError::NotificationFailed(format!("spawn sendmail: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(message.as_bytes())
                .map_err(|e| SafetyError::NotificationFailed(format!("write to sendmail: {e}")))?;
        }

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let status = child.wait();
            let mut stderr = Vec::new();
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_end(&mut stderr);
            }
            let _ = tx.send((status, stderr));
        });

        match rx.recv_timeout(timeout) {
            Ok((Ok(status), _stderr)) if status.success() => Ok(()),
            Ok((Ok(status), stderr)) => Err(SafetyError::NotificationFailed(format!(
                "sendmail exited {status}: {}",
                String::from_utf8_lossy(&stderr)
            ))),
            Ok((Err(e), _)) => Err(SafetyError::NotificationFailed(format!("sendmail wait failed: {e}"))),
            Err(_) => Err(SafetyError::NotificationFailed("sendmail delivery timed out".to_string())),
        }
    }
}

/// Delivers over SMTP with STARTTLS, using a synchronous `TcpStream` for
/// the line-based command exchange and `rustls` for the TLS upgrade.
pub struct SmtpNotifier {
    config: NotificationConfig,
}

impl SmtpNotifier {
    #[must_use]
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    fn deliver(&self, notification: &Notification<'_>) -> Result<(), SafetyError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.delivery_timeout_secs);
        let tcp = TcpStream::connect((self.config.smtp_server.as_str(), self.config.smtp_port))
            .map_err(|e| SafetyError::NotificationFailed(format!("connect: {e}")))?;
        tcp.set_read_timeout(Some(Duration::from_secs(self.config.delivery_timeout_secs)))
            .map_err(|e| SafetyError::NotificationFailed(format!("set timeout: {e}")))?;

        let mut plain = BufReader::new(tcp.try_clone().map_err(|e| SafetyError::NotificationFailed(e.to_string()))?);
        let mut plain_write = tcp;
        read_reply(&mut plain)?;
        send_line(&mut plain_write, "EHLO otto-bgp")?;
        read_reply(&mut plain)?;

        if !self.config.smtp_use_tls {
            return Err(SafetyError::NotificationFailed(
                "SMTP delivery without STARTTLS is not supported".to_string(),
            ));
        }

        send_line(&mut plain_write, "STARTTLS")?;
        read_reply(&mut plain)?;

        let server_name = ServerName::try_from(self.config.smtp_server.clone())
            .map_err(|e| SafetyError::NotificationFailed(format!("invalid SMTP server name: {e}")))?;
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates((*ROOT_STORE).clone())
            .with_no_client_auth();
        let client_conn = ClientConnection::new(Arc::new(tls_config), server_name)
            .map_err(|e| SafetyError::NotificationFailed(format!("TLS setup: {e}")))?;
        let tcp_for_tls = plain_write
            .try_clone()
            .map_err(|e| SafetyError::NotificationFailed(e.to_string()))?;
        let mut tls = StreamOwned::new(client_conn, tcp_for_tls);

        send_line(&mut tls, "EHLO otto-bgp")?;
        read_tls_reply(&mut tls)?;

        if !self.config.smtp_username.is_empty() {
            send_line(&mut tls, "AUTH LOGIN")?;
            read_tls_reply(&mut tls)?;
            send_line(&mut tls, &BASE64.encode(&self.config.smtp_username))?;
            read_tls_reply(&mut tls)?;
            send_line(&mut tls, &BASE64.encode(&self.config.smtp_password))?;
            read_tls_reply(&mut tls)?;
        }

        send_line(&mut tls, &format!("MAIL FROM:<{}>", self.config.from))?;
        read_tls_reply(&mut tls)?;
        for recipient in self.config.to.iter().chain(self.config.cc.iter()) {
            send_line(&mut tls, &format!("RCPT TO:<{recipient}>"))?;
            read_tls_reply(&mut tls)?;
        }
        send_line(&mut tls, "DATA")?;
        read_tls_reply(&mut tls)?;
        let message = render_message(&self.config, notification);
        write!(tls, "{message}\r\n.\r\n").map_err(|e| SafetyError::NotificationFailed(e.to_string()))?;
        read_tls_reply(&mut tls)?;
        send_line(&mut tls, "QUIT")?;

        if Instant::now() > deadline {
            return Err(SafetyError::NotificationFailed("SMTP delivery exceeded its deadline".to_string()));
        }
        Ok(())
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, notification: &Notification<'_>) -> Result<(), SafetyError> {
        self.deliver(notification)
    }
}

fn send_line(writer: &mut impl Write, line: &str) -> Result<(), SafetyError> {
    write!(writer, "{line}\r\n").map_err(|e| SafetyError::NotificationFailed(format!("write: {e}")))
}

fn read_reply(reader: &mut impl BufRead) -> Result<String, SafetyError> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| SafetyError::NotificationFailed(format!("read: {e}")))?;
    Ok(line)
}

fn read_tls_reply(stream: &mut StreamOwned<ClientConnection, TcpStream>) -> Result<String, SafetyError> {
    let mut buf = [0_u8; 1024];
    let n = stream
        .read(&mut buf)
        .map_err(|e| SafetyError::NotificationFailed(format!("tls read: {e}")))?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

fn render_message(config: &NotificationConfig, notification: &Notification<'_>) -> String {
    format!(
        "From: {}\r\nTo: {}\r\nSubject: {} {}\r\n\r\n{}",
        config.from,
        config.to.join(", "),
        config.subject_prefix,
        notification.subject,
        notification.body
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn notifier_from_config_is_none_when_disabled() {
        let config = NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        };
        assert!(notifier_from_config(&config).is_none());
    }

    #[test]
    fn render_message_includes_subject_prefix_and_body() {
        let config = NotificationConfig {
            from: "otto@example.com".to_string(),
            to: vec!["oncall@example.com".to_string()],
            subject_prefix: "[otto-bgp]".to_string(),
            ..NotificationConfig::default()
        };
        let notification = Notification {
            subject: "apply failed on r1",
            body: "commit-check rejected the candidate",
        };
        let message = render_message(&config, &notification);
        assert!(message.contains("Subject: [otto-bgp] apply failed on r1"));
        assert!(message.contains("commit-check rejected the candidate"));
    }
}
