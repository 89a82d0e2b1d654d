//! Autodiscover response rendering.
//!
//! The reply document is a fixed template with four placeholder nodes:
//! `User/DisplayName`, `User/EMailAddress` and the `Action/Settings/Server`
//! `Url` and `Name` nodes, which both carry the server URL. [`ResponseBuilder`]
//! streams the template through `quick-xml` and fills the placeholders, so any
//! customised template keeps its layout and namespaces.

use crate::config::AutodiscoverConfig;
use crate::error::{AutodiscoverError, AutodiscoverResult};
use crate::request::RequestMeta;
use log::{info, trace};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// Response document shipped with the crate.
pub const DEFAULT_TEMPLATE: &str = include_str!("response.xml");

/// Path appended to the host to form the server URL.
pub const ACTIVESYNC_PATH: &str = "/Microsoft-Server-ActiveSync";

const DISPLAY_NAME: &[&[u8]] = &[b"Response", b"User", b"DisplayName"];
const EMAIL_ADDRESS: &[&[u8]] = &[b"Response", b"User", b"EMailAddress"];
const SERVER_URL: &[&[u8]] = &[b"Response", b"Action", b"Settings", b"Server", b"Url"];
const SERVER_NAME: &[&[u8]] = &[b"Response", b"Action", b"Settings", b"Server", b"Name"];

/// The resolved values of one successful autodiscover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutodiscoverResponse {
    pub display_name: String,
    pub email_address: String,
    pub server_url: String,
}

impl AutodiscoverResponse {
    pub fn new(
        display_name: impl Into<String>,
        email_address: impl Into<String>,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            email_address: email_address.into(),
            server_url: server_url.into(),
        }
    }

    fn value_for(&self, path: &[Vec<u8>]) -> Option<&str> {
        if ends_with(path, DISPLAY_NAME) {
            Some(&self.display_name)
        } else if ends_with(path, EMAIL_ADDRESS) {
            Some(&self.email_address)
        } else if ends_with(path, SERVER_URL) || ends_with(path, SERVER_NAME) {
            Some(&self.server_url)
        } else {
            None
        }
    }
}

fn ends_with(path: &[Vec<u8>], suffix: &[&[u8]]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(segment, expected)| segment.as_slice() == *expected)
}

/// Host the device should connect to.
///
/// The configured override wins, then the request's Host header, then the
/// server's own name.
pub fn resolve_host<'a>(config: &'a AutodiscoverConfig, meta: &'a RequestMeta) -> &'a str {
    [
        config.zpush_host.as_deref(),
        meta.host.as_deref(),
        meta.server_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|host| !host.trim().is_empty())
    .unwrap_or("localhost")
}

/// `https://<host>/Microsoft-Server-ActiveSync`
pub fn server_url(host: &str) -> String {
    format!("https://{}{}", host, ACTIVESYNC_PATH)
}

/// Fills the response template.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    template: String,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl ResponseBuilder {
    /// Builder using the shipped template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder using a custom template with the same placeholder nodes.
    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the response for `email`, `display_name` and `host`.
    pub fn build(&self, email: &str, display_name: &str, host: &str) -> AutodiscoverResult<String> {
        let url = server_url(host);
        info!("Autodiscover createResponse(): server URL: '{}'", url);
        self.render(&AutodiscoverResponse::new(display_name, email, url))
    }

    /// Render an already resolved response.
    pub fn render(&self, response: &AutodiscoverResponse) -> AutodiscoverResult<String> {
        let mut reader = Reader::from_str(&self.template);
        let mut writer = Writer::new(Vec::with_capacity(self.template.len() + 256));
        let mut path: Vec<Vec<u8>> = Vec::new();
        let mut filling = false;
        let mut filled = 0usize;

        loop {
            let event = reader.read_event().map_err(|e| {
                AutodiscoverError::internal(format!("Response template is not valid XML: {}", e))
            })?;

            match event {
                Event::Eof => break,
                Event::Start(start) => {
                    path.push(start.local_name().as_ref().to_vec());
                    let value = response.value_for(&path);
                    write(&mut writer, Event::Start(start))?;
                    if let Some(value) = value {
                        write(&mut writer, Event::Text(BytesText::new(value)))?;
                        filling = true;
                        filled += 1;
                    }
                }
                Event::Empty(empty) => {
                    path.push(empty.local_name().as_ref().to_vec());
                    match response.value_for(&path) {
                        Some(value) => {
                            let end = empty.to_end().into_owned();
                            write_filled(&mut writer, empty, value, end)?;
                            filled += 1;
                        }
                        None => write(&mut writer, Event::Empty(empty))?,
                    }
                    path.pop();
                }
                Event::End(end) => {
                    filling = false;
                    path.pop();
                    write(&mut writer, Event::End(end))?;
                }
                // Placeholder content is replaced, not appended to.
                Event::Text(_) | Event::CData(_) if filling => {}
                other => write(&mut writer, other)?,
            }
        }

        if filled != 4 {
            return Err(AutodiscoverError::internal(format!(
                "Response template has {} of 4 placeholder nodes",
                filled
            )));
        }

        let xml = String::from_utf8(writer.into_inner())
            .map_err(|e| AutodiscoverError::internal(format!("Response is not UTF-8: {}", e)))?;
        trace!("Autodiscover createResponse(): XML response:\n{}", xml);
        Ok(xml)
    }
}

fn write_filled(
    writer: &mut Writer<Vec<u8>>,
    start: BytesStart<'_>,
    value: &str,
    end: BytesEnd<'_>,
) -> AutodiscoverResult<()> {
    write(writer, Event::Start(start))?;
    write(writer, Event::Text(BytesText::new(value)))?;
    write(writer, Event::End(end))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> AutodiscoverResult<()> {
    writer
        .write_event(event)
        .map_err(|e| AutodiscoverError::internal(format!("Failed to write response XML: {}", e)))
}
