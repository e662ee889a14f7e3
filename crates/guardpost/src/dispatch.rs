//! Alert delivery with local fallback.
//!
//! The primary path submits an alert through the configured notification
//! channel. Any channel failure downgrades delivery to the run's own
//! output stream: the alert is printed in full so the information is never
//! dropped, even though delivery to the human recipient is lost. The
//! fallback never retries the channel.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::finding::Alert;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("no notification channel configured")]
    NotConfigured,

    #[error("failed to spawn delivery command: {0}")]
    Spawn(#[source] io::Error),

    #[error("channel rejected alert (exit code {0})")]
    Rejected(i32),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Notification channel seam: send one alert to the fixed destination.
pub trait AlertChannel {
    fn send(&self, alert: &Alert) -> Result<(), ChannelError>;
}

/// Channel used when no delivery command is configured. Every send fails,
/// which routes all alerts through the local fallback.
pub struct UnconfiguredChannel;

impl AlertChannel for UnconfiguredChannel {
    fn send(&self, _alert: &Alert) -> Result<(), ChannelError> {
        Err(ChannelError::NotConfigured)
    }
}

/// Delivers alerts by piping them to a configured command, e.g. a
/// `sendmail`-compatible binary or a site-specific relay script. The
/// subject and body are written to the command's stdin as an RFC-ish
/// `Subject:` header followed by a blank line and the body.
pub struct CommandChannel {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandChannel {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

impl AlertChannel for CommandChannel {
    fn send(&self, alert: &Alert) -> Result<(), ChannelError> {
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(ChannelError::Spawn)?;

        // Write on a helper thread: once the body exceeds the OS pipe
        // buffer, a relay that holds stdin open without reading would
        // block a direct write for as long as the relay lives.
        let (write_tx, write_rx) = mpsc::channel();
        match child.stdin.take() {
            Some(mut stdin) => {
                let payload = format!("Subject: {}\n\n{}\n", alert.subject, alert.body);
                thread::spawn(move || {
                    let result = stdin.write_all(payload.as_bytes());
                    // Dropping stdin closes the pipe so the command sees EOF
                    let _ = write_tx.send(result);
                });
            }
            None => {
                let _ = write_tx.send(Ok(()));
            }
        }

        // Poll rather than block: a hung relay must not stall the run
        // past the configured timeout.
        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ChannelError::Timeout(self.timeout));
                }
                None => thread::sleep(WAIT_POLL_INTERVAL),
            }
        };

        if !status.success() {
            return Err(ChannelError::Rejected(status.code().unwrap_or(-1)));
        }

        // An exit-0 relay that never accepted the body still failed to
        // deliver it; surface that so the alert takes the fallback path
        // instead of being counted as sent.
        match write_rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(ChannelError::Io(err)),
            Err(_) => Err(ChannelError::Timeout(self.timeout)),
        }
    }
}

/// Outcome of one dispatch. Fallback deliveries are not errors for
/// watermark purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Fallback,
}

/// Formats and delivers alerts; never fails.
pub struct Dispatcher<'a> {
    channel: &'a dyn AlertChannel,
    fallback_out: Box<dyn Write + Send + 'a>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(channel: &'a dyn AlertChannel) -> Self {
        Self {
            channel,
            fallback_out: Box::new(io::stdout()),
        }
    }

    /// Like `new`, but fallback emission goes to the given writer instead
    /// of stdout.
    pub fn with_output(channel: &'a dyn AlertChannel, out: impl Write + Send + 'a) -> Self {
        Self {
            channel,
            fallback_out: Box::new(out),
        }
    }

    /// Deliver one alert through the channel, falling back to local
    /// emission on any failure.
    pub fn dispatch(&mut self, alert: &Alert) -> DeliveryOutcome {
        match self.channel.send(alert) {
            Ok(()) => {
                info!(subject = %alert.subject, "Alert sent");
                DeliveryOutcome::Sent
            }
            Err(err) => {
                warn!(error = %err, subject = %alert.subject, "Notification channel failed, emitting alert locally");
                self.emit_fallback(alert);
                DeliveryOutcome::Fallback
            }
        }
    }

    fn emit_fallback(&mut self, alert: &Alert) {
        if let Err(err) = write_banner(self.fallback_out.as_mut(), alert) {
            warn!(error = %err, "Fallback emission failed");
        }
    }
}

fn write_banner(out: &mut dyn Write, alert: &Alert) -> io::Result<()> {
    writeln!(out, "----- SECURITY ALERT -----")?;
    writeln!(out, "{}", alert.subject)?;
    writeln!(out, "{}", alert.body)?;
    writeln!(out, "--------------------------")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct OkChannel;

    impl AlertChannel for OkChannel {
        fn send(&self, _alert: &Alert) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    struct DownChannel;

    impl AlertChannel for DownChannel {
        fn send(&self, _alert: &Alert) -> Result<(), ChannelError> {
            Err(ChannelError::Rejected(1))
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn alert() -> Alert {
        Alert {
            subject: "Security Alert: Severity HIGH".to_string(),
            body: "{\n  \"severity\": \"HIGH\"\n}".to_string(),
        }
    }

    #[test]
    fn successful_send_reports_sent() {
        let channel = OkChannel;
        let buf = SharedBuf::default();
        let mut dispatcher = Dispatcher::with_output(&channel, buf.clone());
        assert_eq!(dispatcher.dispatch(&alert()), DeliveryOutcome::Sent);
        assert!(buf.0.lock().unwrap().is_empty());
    }

    #[test]
    fn channel_failure_emits_alert_verbatim() {
        let channel = DownChannel;
        let buf = SharedBuf::default();
        let mut dispatcher = Dispatcher::with_output(&channel, buf.clone());
        assert_eq!(dispatcher.dispatch(&alert()), DeliveryOutcome::Fallback);

        let output = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Security Alert: Severity HIGH"));
        assert!(output.contains("{\n  \"severity\": \"HIGH\"\n}"));
        assert!(output.contains("----- SECURITY ALERT -----"));
    }

    #[test]
    fn unconfigured_channel_always_falls_back() {
        let channel = UnconfiguredChannel;
        let buf = SharedBuf::default();
        let mut dispatcher = Dispatcher::with_output(&channel, buf.clone());
        assert_eq!(dispatcher.dispatch(&alert()), DeliveryOutcome::Fallback);
    }

    #[cfg(unix)]
    #[test]
    fn command_channel_delivers_to_command() {
        let channel = CommandChannel::new(
            "/bin/sh",
            vec!["-c".to_string(), "cat > /dev/null".to_string()],
            Duration::from_secs(5),
        );
        assert!(channel.send(&alert()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn command_channel_reports_nonzero_exit() {
        let channel = CommandChannel::new(
            "/bin/sh",
            vec!["-c".to_string(), "exit 3".to_string()],
            Duration::from_secs(5),
        );
        assert!(matches!(
            channel.send(&alert()),
            Err(ChannelError::Rejected(3))
        ));
    }

    #[test]
    fn command_channel_spawn_failure() {
        let channel = CommandChannel::new(
            "/nonexistent/guardpost-relay",
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(
            channel.send(&alert()),
            Err(ChannelError::Spawn(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn command_channel_times_out_hung_relay() {
        let channel = CommandChannel::new(
            "/bin/sh",
            vec!["-c".to_string(), "cat > /dev/null; sleep 30".to_string()],
            Duration::from_millis(200),
        );
        assert!(matches!(
            channel.send(&alert()),
            Err(ChannelError::Timeout(_))
        ));
    }

    /// Alert whose body is larger than any OS pipe buffer, so delivery
    /// cannot complete until the relay actually reads its stdin.
    fn oversized_alert() -> Alert {
        Alert {
            subject: "Security Alert: Severity HIGH".to_string(),
            body: "x".repeat(1 << 20),
        }
    }

    #[cfg(unix)]
    #[test]
    fn command_channel_timeout_covers_the_stdin_write() {
        // Relay never reads stdin and outlives the timeout; the send must
        // still return within the deadline instead of blocking on the
        // pipe write.
        let channel = CommandChannel::new(
            "/bin/sh",
            vec!["-c".to_string(), "sleep 3".to_string()],
            Duration::from_millis(200),
        );
        let started = Instant::now();
        let result = channel.send(&oversized_alert());
        assert!(matches!(result, Err(ChannelError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[test]
    fn command_channel_unread_body_is_not_reported_sent() {
        // Relay exits 0 without ever reading the body; that delivery
        // failed and must take the fallback path, not count as sent.
        let channel = CommandChannel::new(
            "/bin/sh",
            vec!["-c".to_string(), "exit 0".to_string()],
            Duration::from_secs(5),
        );
        assert!(channel.send(&oversized_alert()).is_err());
    }
}
