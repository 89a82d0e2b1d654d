//! ActiveSync autodiscover service library for Rust.
//!
//! Answers the mobilesync autodiscover request a phone sends when a user
//! types only an email address and password: the credentials are checked
//! against a pluggable backend and the device is told which server URL to
//! use for ActiveSync.
//!
//! # Core Components
//!
//! - [`AutodiscoverHandler`] - Runs one request through the pipeline
//! - [`Backend`] - Trait for implementing authentication and user lookup
//! - [`AutodiscoverConfig`] - Startup configuration and its validation
//! - [`ResponseBuilder`] - Renders the mobilesync response document
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use activesync_autodiscover::{AutodiscoverConfig, AutodiscoverHandler, InMemoryBackend, RequestMeta};
//!
//! # async fn example(body: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = AutodiscoverConfig::from_file("autodiscover.json")?.validate()?;
//! let handler = AutodiscoverHandler::new(InMemoryBackend::new(), config);
//!
//! let meta = RequestMeta::post()
//!     .with_authorization_header("Basic amRvZTpzZWNyZXQ=")
//!     .with_host("mail.example.com");
//! let reply = handler.handle(&body, &meta).await;
//! println!("{:?} {:?}", reply.status, reply.headers);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod username;

// Re-export commonly used types for convenience
pub use error::{
    AuthFailure, AutodiscoverError, AutodiscoverResult, ConfigError, ConfigResult, ProtocolError,
};

pub use backend::{Backend, InMemoryBackend, UserDetails};
pub use config::{AutodiscoverConfig, LogLevel, LoggingConfig};
pub use handler::{AutodiscoverHandler, HttpReply, MappedError, Severity};
pub use request::{ACCEPTABLE_RESPONSE_SCHEMA_MOBILESYNC, Credentials, IncomingRequest, RequestMeta};
pub use response::{AutodiscoverResponse, ResponseBuilder};
pub use username::{LoginType, derive_username};
