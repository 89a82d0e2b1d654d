//! Error mapping for the request pipeline
//!
//! Every failure of a request ends up here exactly once. The mapper decides
//! the HTTP status, the extra headers and how loudly the failure is logged.

use crate::config::AutodiscoverConfig;
use crate::error::{AutodiscoverError, error_chain};
use crate::request::IncomingRequest;
use log::{error, warn};
use std::fmt;

/// Log severity of a mapped failure.
///
/// `Fatal` has no `log` level of its own and is emitted at error level with a
/// `FATAL:` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Fatal,
    Error,
    Warn,
}

impl Severity {
    /// Write `message` to the log at this severity.
    pub fn emit(self, message: &str) {
        match self {
            Severity::Fatal => error!("FATAL: {}", message),
            Severity::Error => error!("{}", message),
            Severity::Warn => warn!("{}", message),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Fatal => "FATAL",
            Severity::Error => "ERROR",
            Severity::Warn => "WARN",
        })
    }
}

/// What the transport should send and log for a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedError {
    /// Status override; `None` leaves the transport default in place
    pub status: Option<u16>,
    /// Reason phrase for `status`
    pub status_text: Option<String>,
    /// Extra `Name: value` header lines
    pub headers: Vec<String>,
    pub severity: Severity,
    pub log_message: String,
}

impl MappedError {
    fn with_status(
        status: u16,
        status_text: impl Into<String>,
        severity: Severity,
        log_message: String,
    ) -> Self {
        Self {
            status: Some(status),
            status_text: Some(status_text.into()),
            headers: Vec::new(),
            severity,
            log_message,
        }
    }

    /// Write the log entry for this failure.
    pub fn emit(&self) {
        self.severity.emit(&self.log_message);
    }

    /// `401 Unauthorized` style status line, if a status is set.
    pub fn status_line(&self) -> Option<String> {
        self.status.map(|status| match &self.status_text {
            Some(text) => format!("{} {}", status, text),
            None => status.to_string(),
        })
    }
}

/// `WWW-Authenticate` challenge header line for `realm`.
pub fn challenge_header(realm: &str) -> String {
    format!("WWW-Authenticate: Basic realm=\"{}\"", realm)
}

/// Map a pipeline failure to its reply and log entry.
///
/// # Arguments
/// * `err` - The failure that ended the request
/// * `request` - The parsed request, if parsing got that far
/// * `client_addr` - Address of the device, used in log lines
/// * `config` - Supplies the challenge realm and whether failed logins are
///   logged with their email and client address (`LOGAUTHFAIL`)
pub fn map_error(
    err: &AutodiscoverError,
    request: Option<&IncomingRequest>,
    client_addr: &str,
    config: &AutodiscoverConfig,
) -> MappedError {
    match err {
        AutodiscoverError::AuthenticationRequired(failure) => {
            let (severity, log_message) = match request {
                Some(request) if config.logging.auth_fail => (
                    Severity::Warn,
                    format!(
                        "Unable to complete autodiscover because login failed for user with email '{}' from IP {}.",
                        request.email_address(),
                        client_addr
                    ),
                ),
                Some(_) => (
                    Severity::Warn,
                    "Unable to complete autodiscover because login failed.".to_string(),
                ),
                None => (
                    Severity::Error,
                    format!(
                        "Unable to complete autodiscover incorrect request: '{}'",
                        failure
                    ),
                ),
            };
            let mut mapped = MappedError::with_status(401, "Unauthorized", severity, log_message);
            mapped.headers.push(challenge_header(&config.auth_realm));
            mapped
        }
        AutodiscoverError::PayloadTooLarge { .. } => {
            MappedError::with_status(413, "Payload Too Large", Severity::Error, failed(err))
        }
        AutodiscoverError::InvalidRequest { .. } => {
            MappedError::with_status(500, "Internal Server Error", Severity::Error, failed(err))
        }
        AutodiscoverError::Protocol(protocol) => {
            let mut mapped = MappedError::with_status(
                protocol.status,
                protocol.reason.clone(),
                Severity::Error,
                failed(err),
            );
            mapped.headers.extend(protocol.headers.iter().cloned());
            mapped
        }
        AutodiscoverError::Backend(_) | AutodiscoverError::Internal { .. } => MappedError {
            status: None,
            status_text: None,
            headers: Vec::new(),
            severity: Severity::Fatal,
            log_message: format!("Exception: ({}) - {}", err.kind(), error_chain(err)),
        },
    }
}

fn failed(err: &AutodiscoverError) -> String {
    format!(
        "Unable to complete autodiscover because of {}. Error: {}",
        err.kind(),
        err
    )
}
