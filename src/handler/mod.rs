//! Framework-agnostic autodiscover request handler.
//!
//! The handler takes the raw request body plus the few HTTP facts it needs
//! ([`RequestMeta`](crate::request::RequestMeta)) and produces an [`HttpReply`]
//! for whatever transport hosts it.
//!
//! # Key Types
//!
//! - [`AutodiscoverHandler`] - Runs the request pipeline against a backend
//! - [`HttpReply`] - Status, headers and body for the transport to send
//! - [`MappedError`] - How a failure is answered and logged
//!
//! # Examples
//!
//! ```rust
//! use activesync_autodiscover::{
//!     AutodiscoverConfig, AutodiscoverHandler, InMemoryBackend, LoggingConfig, RequestMeta,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = InMemoryBackend::new();
//! backend.add_user("jdoe", "secret").await;
//! let config = AutodiscoverConfig::default()
//!     .with_logging(LoggingConfig::syslog())
//!     .validate()?;
//! let handler = AutodiscoverHandler::new(backend, config);
//!
//! let body = br#"<Autodiscover><Request>
//!   <EMailAddress>jdoe@example.com</EMailAddress>
//!   <AcceptableResponseSchema>http://schemas.microsoft.com/exchange/autodiscover/mobilesync/responseschema/2006</AcceptableResponseSchema>
//! </Request></Autodiscover>"#;
//! let meta = RequestMeta::post().with_basic_auth("jdoe", "secret");
//!
//! let reply = handler.handle(body, &meta).await;
//! assert_eq!(reply.status, None);
//! assert_eq!(reply.cookie("membername"), Some("jdoe"));
//! # Ok(())
//! # }
//! ```

mod core;
mod errors;
mod get;
mod post;

pub use core::{
    AutodiscoverHandler, CONTENT_TYPE_HEADER, HttpReply, MEMBER_COOKIE, VERSION, member_cookie,
};
pub use errors::{MappedError, Severity, challenge_header, map_error};
pub use get::{GET_EXIT_CODE, get_not_supported_page};
