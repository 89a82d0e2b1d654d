//! Incoming request validation and parsing.
//!
//! The transport hands over the raw body together with a [`RequestMeta`]
//! describing the facts it knows about the request (declared length, Basic
//! credentials, Host header, client address). [`IncomingRequest::parse`]
//! bounds-checks the input, requires credentials and extracts the two fields
//! the autodiscover protocol needs.

use crate::error::{AuthFailure, AutodiscoverError, AutodiscoverResult};
use crate::username::local_part;
use base64::{Engine as _, engine::general_purpose};
use log::{debug, trace, warn};
use serde::Deserialize;
use std::fmt;

/// The only response schema this service answers.
pub const ACCEPTABLE_RESPONSE_SCHEMA_MOBILESYNC: &str =
    "http://schemas.microsoft.com/exchange/autodiscover/mobilesync/responseschema/2006";

/// HTTP Basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: Option<String>,
}

impl Credentials {
    /// Create credentials from already decoded values.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
        }
    }

    /// Credentials that carry a username only.
    pub fn username_only(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
        }
    }

    /// Decode an `Authorization: Basic ...` header value.
    ///
    /// Returns `None` for other schemes and undecodable values. Decoded bytes
    /// that are not valid UTF-8 are read as ISO-8859-1, which is what desktop
    /// mail clients send.
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        let (scheme, encoded) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
        let text = latin1_fallback(decoded);
        match text.split_once(':') {
            Some((username, password)) => Some(Self::new(username, password)),
            None => Some(Self::username_only(text)),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn latin1_fallback(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

/// What the transport knows about a request, apart from the body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// HTTP method as received
    pub method: String,
    /// Declared `Content-Length`, if any
    pub content_length: Option<u64>,
    /// Decoded Basic credentials, if any
    pub credentials: Option<Credentials>,
    /// `Host` header
    pub host: Option<String>,
    /// The server's own name, used when no Host header was sent
    pub server_name: Option<String>,
    /// Client address for log lines
    pub remote_addr: Option<String>,
}

impl RequestMeta {
    /// Create request metadata for `method`.
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    /// Metadata for a POST request.
    pub fn post() -> Self {
        Self::new("POST")
    }

    /// Metadata for a GET request.
    pub fn get() -> Self {
        Self::new("GET")
    }

    /// Set the declared body length.
    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Set decoded Basic credentials.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Set credentials from a raw `Authorization` header value.
    pub fn with_authorization_header(mut self, value: &str) -> Self {
        self.credentials = Credentials::from_authorization_header(value);
        self
    }

    /// Set the `Host` header.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the server's own name.
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Set the client address.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Client address for log lines.
    pub fn client_addr(&self) -> &str {
        self.remote_addr.as_deref().unwrap_or("unknown")
    }

    /// Whether the method should take the GET path.
    pub fn is_get(&self) -> bool {
        self.method.to_ascii_uppercase().contains("GET")
    }
}

// Either the protocol's `<Autodiscover><Request>` nesting or a bare `<Request>` root.
#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(rename = "Request")]
    request: Option<RawRequest>,
    #[serde(rename = "EMailAddress")]
    email_address: Option<String>,
    #[serde(rename = "AcceptableResponseSchema")]
    acceptable_response_schema: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRequest {
    #[serde(rename = "EMailAddress")]
    email_address: Option<String>,
    #[serde(rename = "AcceptableResponseSchema")]
    acceptable_response_schema: Option<String>,
}

impl RawDocument {
    fn into_fields(self) -> (Option<String>, Option<String>) {
        let (email, schema) = match self.request {
            Some(request) => (request.email_address, request.acceptable_response_schema),
            None => (self.email_address, self.acceptable_response_schema),
        };
        (non_empty(email), non_empty(schema))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A validated autodiscover request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    email_address: String,
    acceptable_response_schema: String,
}

impl IncomingRequest {
    /// Validate and parse a raw request body.
    ///
    /// Checks run in this order: declared size, credentials (a username
    /// without a password counts as missing), actual size, email address,
    /// response schema. Size and credential checks happen
    /// before the body is looked at.
    pub fn parse(
        raw_body: &[u8],
        meta: &RequestMeta,
        max_input_size: usize,
    ) -> AutodiscoverResult<Self> {
        if meta
            .content_length
            .is_some_and(|length| length > max_input_size as u64)
        {
            return Err(AutodiscoverError::PayloadTooLarge {
                limit: max_input_size,
            });
        }

        let credentials = meta
            .credentials
            .as_ref()
            .ok_or(AuthFailure::MissingCredentials)?;
        if credentials.password().is_none() {
            return Err(AuthFailure::MissingPassword.into());
        }

        // A body that fills the whole read window may have been cut off.
        if raw_body.len() >= max_input_size {
            return Err(AutodiscoverError::PayloadTooLarge {
                limit: max_input_size,
            });
        }

        let xml = String::from_utf8_lossy(raw_body);
        trace!("Autodiscover incoming XML data:\n{}", xml);

        let document = quick_xml::de::from_str::<RawDocument>(&xml).unwrap_or_else(|e| {
            debug!("Autodiscover request body is not well-formed XML: {}", e);
            RawDocument::default()
        });
        let (email_address, schema) = document.into_fields();

        let email_address = email_address
            .ok_or_else(|| AutodiscoverError::invalid_request("Invalid input XML: no email address."))?;

        let requested_local = local_part(&email_address);
        let auth_local = local_part(credentials.username());
        if requested_local != auth_local {
            warn!(
                "The local part of the server auth user is different from the local part in the XML request ('{}' != '{}')",
                requested_local, auth_local
            );
        }

        let schema = schema.ok_or_else(|| {
            AutodiscoverError::invalid_request("Invalid input XML: no AcceptableResponseSchema.")
        })?;

        if !schema.eq_ignore_ascii_case(ACCEPTABLE_RESPONSE_SCHEMA_MOBILESYNC) {
            return Err(AutodiscoverError::invalid_request(format!(
                "Request for a responseschema that is not supported (only mobilesync is supported): {}",
                schema
            )));
        }

        Ok(Self {
            email_address,
            acceptable_response_schema: schema,
        })
    }

    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    pub fn acceptable_response_schema(&self) -> &str {
        &self.acceptable_response_schema
    }
}
