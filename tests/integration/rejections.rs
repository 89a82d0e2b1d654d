//! Requests that are turned away, and what the device sees for each.

use crate::common::{RecordingBackend, autodiscover_body, handler, mobilesync_body, post_as};
use activesync_autodiscover::{
    AutodiscoverConfig, AutodiscoverError, AutodiscoverHandler, HttpReply, ProtocolError,
    RequestMeta,
};

fn assert_empty_failure(reply: &HttpReply, status: u16) {
    assert_eq!(reply.status, Some(status));
    assert!(reply.body.is_empty(), "failure replies carry no body");
    assert_eq!(reply.header("Content-Type"), Some("text/html"));
    assert_eq!(reply.cookie("membername"), None);
}

#[tokio::test]
async fn test_rejected_login_is_challenged() {
    let backend = RecordingBackend::rejecting();
    let reply = handler(backend.clone())
        .handle(&mobilesync_body("jdoe@example.com"), &post_as("jdoe", "wrong"))
        .await;

    assert_empty_failure(&reply, 401);
    assert_eq!(reply.status_text.as_deref(), Some("Unauthorized"));
    assert_eq!(
        reply.header("WWW-Authenticate"),
        Some("Basic realm=\"ZPush\"")
    );
    assert_eq!(backend.logon_count(), 1);
    assert_eq!(backend.detail_count(), 0);
}

#[tokio::test]
async fn test_challenge_uses_configured_realm() {
    let config = AutodiscoverConfig::default().with_auth_realm("Example Mail");
    let handler = AutodiscoverHandler::new(RecordingBackend::rejecting(), config);

    let reply = handler
        .handle(&mobilesync_body("jdoe@example.com"), &post_as("jdoe", "wrong"))
        .await;

    assert_eq!(
        reply.header("WWW-Authenticate"),
        Some("Basic realm=\"Example Mail\"")
    );
}

#[tokio::test]
async fn test_missing_credentials_never_reach_backend() {
    let backend = RecordingBackend::accepting("secret");
    let meta = RequestMeta::post().with_host("mail.example.com");

    let reply = handler(backend.clone())
        .handle(&mobilesync_body("jdoe@example.com"), &meta)
        .await;

    assert_empty_failure(&reply, 401);
    assert!(reply.header("WWW-Authenticate").is_some());
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_username_without_password() {
    let backend = RecordingBackend::accepting("secret");
    // "jdoe" with no colon
    let meta = RequestMeta::post().with_authorization_header("Basic amRvZQ==");

    let reply = handler(backend.clone())
        .handle(&mobilesync_body("jdoe@example.com"), &meta)
        .await;

    assert_empty_failure(&reply, 401);
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_username_without_password_is_challenged_before_body_checks() {
    let backend = RecordingBackend::accepting("secret");
    let meta = RequestMeta::post().with_authorization_header("Basic amRvZQ==");

    let no_email = handler(backend.clone())
        .handle(b"<Autodiscover><Request></Request></Autodiscover>", &meta)
        .await;
    assert_empty_failure(&no_email, 401);
    assert_eq!(
        no_email.header("WWW-Authenticate"),
        Some("Basic realm=\"ZPush\"")
    );

    let oversized = vec![b' '; 9000];
    let too_large = handler(backend.clone()).handle(&oversized, &meta).await;
    assert_empty_failure(&too_large, 401);
    assert_eq!(
        too_large.header("WWW-Authenticate"),
        Some("Basic realm=\"ZPush\"")
    );

    assert!(backend.untouched());
}

#[tokio::test]
async fn test_non_basic_scheme_counts_as_missing() {
    let backend = RecordingBackend::accepting("secret");
    let meta = RequestMeta::post().with_authorization_header("Bearer abc.def");

    let reply = handler(backend.clone())
        .handle(&mobilesync_body("jdoe@example.com"), &meta)
        .await;

    assert_empty_failure(&reply, 401);
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_missing_email_never_reaches_backend() {
    let backend = RecordingBackend::accepting("secret");
    let body = format!(
        "<Autodiscover><Request><AcceptableResponseSchema>{}</AcceptableResponseSchema>\
         </Request></Autodiscover>",
        activesync_autodiscover::ACCEPTABLE_RESPONSE_SCHEMA_MOBILESYNC
    );

    let reply = handler(backend.clone())
        .handle(body.as_bytes(), &post_as("jdoe", "secret"))
        .await;

    assert_empty_failure(&reply, 500);
    assert!(reply.header("WWW-Authenticate").is_none());
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_missing_schema() {
    let backend = RecordingBackend::accepting("secret");
    let body = "<Autodiscover><Request><EMailAddress>jdoe@example.com</EMailAddress>\
                </Request></Autodiscover>";

    let reply = handler(backend.clone())
        .handle(body.as_bytes(), &post_as("jdoe", "secret"))
        .await;

    assert_empty_failure(&reply, 500);
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_unsupported_schema() {
    let backend = RecordingBackend::accepting("secret");
    let body = autodiscover_body(
        "jdoe@example.com",
        "http://schemas.microsoft.com/exchange/autodiscover/outlook/responseschema/2006a",
    );

    let reply = handler(backend.clone())
        .handle(&body, &post_as("jdoe", "secret"))
        .await;

    assert_empty_failure(&reply, 500);
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_malformed_xml() {
    let backend = RecordingBackend::accepting("secret");

    let reply = handler(backend.clone())
        .handle(b"<Autodiscover><Request><EMailAddress>", &post_as("jdoe", "secret"))
        .await;

    assert_empty_failure(&reply, 500);
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_declared_length_checked_before_credentials() {
    let backend = RecordingBackend::accepting("secret");
    let meta = RequestMeta::post().with_content_length(1_000_000);

    let reply = handler(backend.clone())
        .handle(&mobilesync_body("jdoe@example.com"), &meta)
        .await;

    assert_empty_failure(&reply, 413);
    assert_eq!(reply.status_text.as_deref(), Some("Payload Too Large"));
    assert!(reply.header("WWW-Authenticate").is_none());
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_body_filling_the_limit_is_rejected() {
    let backend = RecordingBackend::accepting("secret");
    let mut body = mobilesync_body("jdoe@example.com");
    body.resize(8192, b' ');

    let reply = handler(backend.clone())
        .handle(&body, &post_as("jdoe", "secret"))
        .await;

    assert_empty_failure(&reply, 413);
    assert!(backend.untouched());
}

#[tokio::test]
async fn test_credentials_checked_before_body_size() {
    let mut body = mobilesync_body("jdoe@example.com");
    body.resize(10_000, b' ');

    let reply = handler(RecordingBackend::accepting("secret"))
        .handle(&body, &RequestMeta::post())
        .await;

    assert_eq!(reply.status, Some(401));
}

#[tokio::test]
async fn test_configured_input_limit() {
    let config = AutodiscoverConfig::default().with_max_input_size(64);
    let handler = AutodiscoverHandler::new(RecordingBackend::accepting("secret"), config);

    let reply = handler
        .handle(&mobilesync_body("jdoe@example.com"), &post_as("jdoe", "secret"))
        .await;

    assert_eq!(reply.status, Some(413));
}

#[tokio::test]
async fn test_backend_protocol_error_passes_through() {
    let backend = RecordingBackend::failing(|| {
        AutodiscoverError::from(
            ProtocolError::provisioning_required().with_header("MS-Server-ActiveSync: 14.0"),
        )
    });

    let reply = handler(backend)
        .handle(&mobilesync_body("jdoe@example.com"), &post_as("jdoe", "secret"))
        .await;

    assert_eq!(reply.status, Some(449));
    assert_eq!(
        reply.status_text.as_deref(),
        Some("Retry after sending a PROVISION command")
    );
    assert_eq!(reply.header("MS-Server-ActiveSync"), Some("14.0"));
    assert!(reply.body.is_empty());
}

#[derive(Debug, thiserror::Error)]
#[error("directory unreachable")]
struct Unreachable(#[source] std::io::Error);

#[tokio::test]
async fn test_backend_failure_keeps_default_status() {
    let backend = RecordingBackend::failing(|| {
        AutodiscoverError::backend(Unreachable(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "ldap timeout",
        )))
    });

    let reply = handler(backend.clone())
        .handle(&mobilesync_body("jdoe@example.com"), &post_as("jdoe", "secret"))
        .await;

    assert_eq!(reply.status, None);
    assert!(reply.body.is_empty());
    assert!(reply.header("WWW-Authenticate").is_none());
    assert_eq!(reply.headers, vec!["Content-Type: text/html".to_string()]);
    assert_eq!(backend.detail_count(), 0);
}
