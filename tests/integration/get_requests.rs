//! The informational GET path.

use crate::common::{RecordingBackend, handler};
use activesync_autodiscover::handler::{GET_EXIT_CODE, get_not_supported_page};
use activesync_autodiscover::{AutodiscoverConfig, AutodiscoverHandler, RequestMeta};

#[tokio::test]
async fn test_domain_prefix_and_email_are_stripped() {
    let backend = RecordingBackend::accepting("secret");
    let meta = RequestMeta::get().with_basic_auth("CORP\\jdoe@example.com", "secret");

    let reply = handler(backend.clone()).handle(b"", &meta).await;

    assert_eq!(reply.status, None);
    assert_eq!(reply.body, get_not_supported_page());
    assert_eq!(reply.exit_code, Some(GET_EXIT_CODE));
    assert_eq!(backend.logon_calls()[0].username, "jdoe");
    assert_eq!(backend.logon_calls()[0].domain, "");
    assert_eq!(backend.detail_count(), 0);
}

#[tokio::test]
async fn test_full_email_login_keeps_address() {
    let backend = RecordingBackend::accepting("secret");
    let config = AutodiscoverConfig::default().with_full_email_login(true);
    let handler = AutodiscoverHandler::new(backend.clone(), config);
    let meta = RequestMeta::get().with_basic_auth("CORP\\jdoe@example.com", "secret");

    handler.handle(b"", &meta).await;

    assert_eq!(backend.logon_calls()[0].username, "jdoe@example.com");
}

#[tokio::test]
async fn test_failed_login_still_returns_page() {
    let backend = RecordingBackend::rejecting();
    let meta = RequestMeta::get()
        .with_basic_auth("jdoe", "wrong")
        .with_remote_addr("198.51.100.4");

    let reply = handler(backend).handle(b"", &meta).await;

    assert_eq!(reply.status, Some(401));
    assert_eq!(reply.header("WWW-Authenticate"), Some("Basic realm=\"ZPush\""));
    assert!(reply.body.contains("GET not supported"));
    assert_eq!(reply.exit_code, Some(1));
}

#[tokio::test]
async fn test_method_match_is_loose() {
    for method in ["get", "GET", "xGETx"] {
        let backend = RecordingBackend::accepting("secret");
        let meta = RequestMeta::new(method).with_basic_auth("jdoe", "secret");

        let reply = handler(backend).handle(b"ignored", &meta).await;

        assert_eq!(reply.exit_code, Some(1), "method {}", method);
        assert!(reply.body.contains("GET not supported"));
    }
}

#[tokio::test]
async fn test_post_replies_have_no_exit_code() {
    let meta = RequestMeta::post().with_basic_auth("jdoe", "secret");
    let reply = handler(RecordingBackend::accepting("secret"))
        .handle(b"", &meta)
        .await;

    assert_eq!(reply.exit_code, None);
    assert_eq!(reply.status, Some(500));
}
