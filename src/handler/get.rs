//! Informational GET path
//!
//! Browsers and misconfigured clients that GET the endpoint are checked
//! against the backend and always answered with a fixed page.

use crate::backend::Backend;
use crate::error::{AuthFailure, AutodiscoverError, AutodiscoverResult};
use crate::handler::core::{AutodiscoverHandler, HttpReply, VERSION};
use crate::handler::errors::challenge_header;
use crate::request::RequestMeta;
use crate::username::{local_part, split_domain_user};
use log::{error, info, warn};

/// Exit status reported after the informational page.
pub const GET_EXIT_CODE: i32 = 1;

/// Body of every GET reply.
pub fn get_not_supported_page() -> String {
    format!(
        "<html>\n<head>\n<title>ActiveSync Autodiscover</title>\n</head>\n<body>\n\
         <h2>ActiveSync Autodiscover</h2>\n<b>Version {}</b><br>\n\
         <h3>GET not supported</h3>\n\
         This is the autodiscover endpoint of an ActiveSync server. \
         Configure your mobile device to use it; it only answers POST requests.\n\
         </body>\n</html>\n",
        VERSION
    )
}

impl<B: Backend + Sync> AutodiscoverHandler<B> {
    /// Handle a GET.
    ///
    /// Credentials are checked so a failed login is logged and challenged, but
    /// the body is the same fixed page either way.
    pub async fn handle_get(&self, meta: &RequestMeta) -> HttpReply {
        info!("Autodiscover GET request from IP {}", meta.client_addr());

        let mut reply = HttpReply::ok(get_not_supported_page());
        reply.exit_code = Some(GET_EXIT_CODE);

        match self.get_login(meta).await {
            Ok(username) => info!("GET login successful for '{}'", username),
            Err(AutodiscoverError::AuthenticationRequired(failure)) => {
                warn!("GET request not authenticated: {}", failure);
                reply.status = Some(401);
                reply.status_text = Some("Unauthorized".to_string());
                reply.headers.push(challenge_header(&self.config.auth_realm));
            }
            Err(err) => warn!("GET login check failed: {}", err),
        }

        reply
    }

    async fn get_login(&self, meta: &RequestMeta) -> AutodiscoverResult<String> {
        let credentials = meta
            .credentials
            .as_ref()
            .ok_or(AuthFailure::MissingCredentials)?;
        let password = credentials.password().ok_or(AuthFailure::MissingPassword)?;

        let (user, domain) = split_domain_user(credentials.username());
        let username = if self.config.use_full_email_for_login {
            user
        } else {
            local_part(user)
        };

        let accepted = self
            .backend
            .logon(username, "", password)
            .await
            .map_err(AutodiscoverError::backend)?;
        if !accepted {
            error!(
                "getLogin(): Login failed for user '{}'{} from IP {}.",
                username,
                domain.map(|d| format!(" (domain '{}')", d)).unwrap_or_default(),
                meta.client_addr()
            );
            return Err(AuthFailure::IncorrectCredentials.into());
        }

        Ok(username.to_string())
    }
}
