//! Common test utilities for autodiscover integration testing.
//!
//! Provides a backend that records every call it receives, request body
//! builders and a few handler shortcuts.

use activesync_autodiscover::backend::Backend;
use activesync_autodiscover::{
    ACCEPTABLE_RESPONSE_SCHEMA_MOBILESYNC, AutodiscoverConfig, AutodiscoverError, AutodiscoverHandler,
    RequestMeta, UserDetails,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type LogonFn = dyn Fn(&str, &str) -> Result<bool, AutodiscoverError> + Send + Sync;

/// A single recorded `logon` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogonCall {
    pub username: String,
    pub domain: String,
}

/// Backend that records calls and answers from canned behaviour.
#[derive(Clone)]
pub struct RecordingBackend {
    logon: Arc<LogonFn>,
    details: UserDetails,
    logon_calls: Arc<Mutex<Vec<LogonCall>>>,
    detail_calls: Arc<AtomicUsize>,
}

impl RecordingBackend {
    /// Accept any username presenting `password`.
    pub fn accepting(password: &str) -> Self {
        let expected = password.to_string();
        Self::with_logon(move |_, given| Ok(given == expected))
    }

    /// Reject every login.
    pub fn rejecting() -> Self {
        Self::with_logon(|_, _| Ok(false))
    }

    /// Fail every login with the error produced by `make_error`.
    pub fn failing(make_error: fn() -> AutodiscoverError) -> Self {
        Self::with_logon(move |_, _| Err(make_error()))
    }

    fn with_logon(
        logon: impl Fn(&str, &str) -> Result<bool, AutodiscoverError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            logon: Arc::new(logon),
            details: UserDetails::new(),
            logon_calls: Arc::new(Mutex::new(Vec::new())),
            detail_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return `details` from every user lookup.
    pub fn with_details(mut self, details: UserDetails) -> Self {
        self.details = details;
        self
    }

    pub fn logon_calls(&self) -> Vec<LogonCall> {
        self.logon_calls.lock().unwrap().clone()
    }

    pub fn logon_count(&self) -> usize {
        self.logon_calls.lock().unwrap().len()
    }

    pub fn detail_count(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    /// Whether the backend was never touched.
    pub fn untouched(&self) -> bool {
        self.logon_count() == 0 && self.detail_count() == 0
    }
}

impl Backend for RecordingBackend {
    type Error = AutodiscoverError;

    async fn logon(&self, username: &str, domain: &str, password: &str) -> Result<bool, Self::Error> {
        self.logon_calls.lock().unwrap().push(LogonCall {
            username: username.to_string(),
            domain: domain.to_string(),
        });
        (self.logon)(username, password)
    }

    async fn get_user_details(&self, _username: &str) -> Result<UserDetails, Self::Error> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.details.clone())
    }
}

/// Protocol-conformant request body for `email`.
pub fn mobilesync_body(email: &str) -> Vec<u8> {
    autodiscover_body(email, ACCEPTABLE_RESPONSE_SCHEMA_MOBILESYNC)
}

/// Request body for `email` asking for `schema`.
pub fn autodiscover_body(email: &str, schema: &str) -> Vec<u8> {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Autodiscover xmlns="http://schemas.microsoft.com/exchange/autodiscover/mobilesync/requestschema/2006">
  <Request>
    <EMailAddress>{}</EMailAddress>
    <AcceptableResponseSchema>{}</AcceptableResponseSchema>
  </Request>
</Autodiscover>"#,
        email, schema
    )
    .into_bytes()
}

/// POST metadata with Basic credentials and a Host header.
pub fn post_as(username: &str, password: &str) -> RequestMeta {
    RequestMeta::post()
        .with_basic_auth(username, password)
        .with_host("mail.example.com")
        .with_remote_addr("192.0.2.10")
}

/// Handler over `backend` with default settings.
pub fn handler(backend: RecordingBackend) -> AutodiscoverHandler<RecordingBackend> {
    AutodiscoverHandler::new(backend, AutodiscoverConfig::default())
}

/// Text content of the first `<tag>` element in `xml`.
pub fn element_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(&xml[start..end])
}
