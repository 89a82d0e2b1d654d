//! Autodiscover POST pipeline
//!
//! Parse, authenticate, look up the user and render the response. Every stage
//! fails fast; the single catch point in [`AutodiscoverHandler::handle_post`]
//! hands the failure to the error mapper.

use crate::backend::Backend;
use crate::error::{AuthFailure, AutodiscoverError, AutodiscoverResult, error_chain};
use crate::handler::core::{AutodiscoverHandler, HttpReply, member_cookie};
use crate::handler::errors::map_error;
use crate::request::{IncomingRequest, RequestMeta};
use crate::response::resolve_host;
use crate::username::derive_username;
use log::{debug, trace, warn};

// What a successful run produced.
struct Resolved {
    username: String,
    xml: String,
}

impl<B: Backend + Sync> AutodiscoverHandler<B> {
    /// Handle an autodiscover POST.
    ///
    /// Never fails: any error becomes an empty-bodied reply with the status
    /// and headers chosen by [`map_error`](crate::handler::map_error).
    pub async fn handle_post(&self, raw_body: &[u8], meta: &RequestMeta) -> HttpReply {
        let mut parsed = None;
        let result = self.autodiscover(raw_body, meta, &mut parsed).await;
        match result {
            Ok(resolved) => HttpReply::ok(resolved.xml).with_header(member_cookie(&resolved.username)),
            Err(err) => {
                debug!("Exception: ({}) - {}", err.kind(), error_chain(&err));
                let mapped = map_error(&err, parsed.as_ref(), meta.client_addr(), &self.config);
                mapped.emit();
                HttpReply::from_mapped(mapped)
            }
        }
    }

    async fn autodiscover(
        &self,
        raw_body: &[u8],
        meta: &RequestMeta,
        parsed: &mut Option<IncomingRequest>,
    ) -> AutodiscoverResult<Resolved> {
        let request = &*parsed.insert(IncomingRequest::parse(
            raw_body,
            meta,
            self.config.max_input_size,
        )?);

        let username = self.login(request, meta).await?;

        let details = self
            .backend
            .get_user_details(&username)
            .await
            .map_err(AutodiscoverError::backend)?;

        let email = match details.email_address() {
            Some(email) => email.to_string(),
            None => {
                warn!(
                    "Backend returned no email address for '{}', using the one from the request",
                    username
                );
                request.email_address().to_string()
            }
        };
        let display_name = match details.fullname() {
            Some(name) => name.to_string(),
            None => {
                warn!(
                    "Backend returned no full name for '{}', using the email address",
                    username
                );
                email.clone()
            }
        };
        trace!("Resolved user's '{}' fullname to '{}'", username, display_name);

        let host = resolve_host(&self.config, meta);
        let xml = self.responses.build(&email, &display_name, host)?;

        Ok(Resolved { username, xml })
    }

    async fn login(&self, request: &IncomingRequest, meta: &RequestMeta) -> AutodiscoverResult<String> {
        let credentials = meta
            .credentials
            .as_ref()
            .ok_or(AuthFailure::MissingCredentials)?;
        let password = credentials.password().ok_or(AuthFailure::MissingPassword)?;

        let username = derive_username(
            request.email_address(),
            self.config.login_type,
            self.config.use_full_email_for_login,
        );
        if self.config.use_full_email_for_login {
            debug!("Using the complete email address for login: '{}'", username);
        } else {
            debug!(
                "Using the username '{}' for login ({})",
                username, self.config.login_type
            );
        }

        let accepted = self
            .backend
            .logon(&username, "", password)
            .await
            .map_err(AutodiscoverError::backend)?;
        if !accepted {
            return Err(AuthFailure::IncorrectCredentials.into());
        }

        debug!("login() successful with '{}' as the username", username);
        Ok(username)
    }
}
