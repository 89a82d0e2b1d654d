//! Core handler infrastructure
//!
//! The handler struct, the reply type handed back to the transport and the
//! method dispatch shared by the POST and GET paths.

use crate::backend::Backend;
use crate::config::AutodiscoverConfig;
use crate::handler::errors::MappedError;
use crate::request::RequestMeta;
use crate::response::ResponseBuilder;
use log::{debug, info};
use uuid::Uuid;

/// Crate version, logged at the start of every request.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Content type of every reply.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type: text/html";

/// Cookie carrying the authenticated login name.
pub const MEMBER_COOKIE: &str = "membername";

/// Transport-agnostic autodiscover handler.
///
/// Holds the backend, the validated configuration and the response template.
/// One handler serves any number of concurrent requests; it keeps no state
/// between them.
pub struct AutodiscoverHandler<B: Backend> {
    pub(super) backend: B,
    pub(super) config: AutodiscoverConfig,
    pub(super) responses: ResponseBuilder,
}

/// What the transport should send back to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    /// Status override; `None` means the transport default of 200
    pub status: Option<u16>,
    /// Reason phrase for `status`
    pub status_text: Option<String>,
    /// Header lines in `Name: value` form, in send order
    pub headers: Vec<String>,
    pub body: String,
    /// Process exit status the transport should report, if any
    pub exit_code: Option<i32>,
}

impl HttpReply {
    /// Successful reply carrying `body`.
    pub fn ok(body: String) -> Self {
        Self {
            status: None,
            status_text: None,
            headers: vec![CONTENT_TYPE_HEADER.to_string()],
            body,
            exit_code: None,
        }
    }

    /// Empty-bodied failure reply for a mapped error.
    pub fn from_mapped(mapped: MappedError) -> Self {
        let mut headers = Vec::with_capacity(mapped.headers.len() + 1);
        headers.push(CONTENT_TYPE_HEADER.to_string());
        headers.extend(mapped.headers);
        Self {
            status: mapped.status,
            status_text: mapped.status_text,
            headers,
            body: String::new(),
            exit_code: None,
        }
    }

    /// Append a header line.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    /// Value of the first header called `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    /// Value of the cookie called `name` set by this reply.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("Set-Cookie") {
                return None;
            }
            let pair = value.trim().split(';').next()?;
            let (cookie, value) = pair.split_once('=')?;
            (cookie == name).then_some(value)
        })
    }

    /// Whether the reply carries a status other than success.
    pub fn is_error(&self) -> bool {
        self.status.is_some_and(|status| status >= 400)
    }
}

/// `Set-Cookie` header line for the authenticated login name.
pub fn member_cookie(username: &str) -> String {
    format!("Set-Cookie: {}={}", MEMBER_COOKIE, encode_cookie_value(username))
}

// Percent-encodes everything outside the unreserved set.
fn encode_cookie_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

impl<B: Backend + Sync> AutodiscoverHandler<B> {
    /// Create a handler for `backend` with an already validated `config`.
    pub fn new(backend: B, config: AutodiscoverConfig) -> Self {
        Self {
            backend,
            config,
            responses: ResponseBuilder::new(),
        }
    }

    /// Replace the response template.
    pub fn with_response_builder(mut self, responses: ResponseBuilder) -> Self {
        self.responses = responses;
        self
    }

    pub fn config(&self) -> &AutodiscoverConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Handle one request.
    ///
    /// Methods containing `GET` take the informational GET path, everything
    /// else is treated as an autodiscover POST.
    pub async fn handle(&self, raw_body: &[u8], meta: &RequestMeta) -> HttpReply {
        let request_id = Uuid::new_v4();
        debug!("-------- Start ({}) {}", request_id, meta.method);
        info!("Autodiscover version='{}'", VERSION);

        let reply = if meta.is_get() {
            self.handle_get(meta).await
        } else {
            self.handle_post(raw_body, meta).await
        };

        debug!(
            "-------- End ({}) {}",
            request_id,
            reply
                .status
                .map_or_else(|| "200".to_string(), |status| status.to_string())
        );
        reply
    }
}
