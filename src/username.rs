//! Login name derivation from email addresses.
//!
//! Devices only tell the autodiscover service an email address, but backends
//! usually authenticate a login name with a site-specific shape. The
//! [`LoginType`] strategy selects how the local part of the address is turned
//! into that login name.
//!
//! # Examples
//!
//! ```rust
//! use activesync_autodiscover::username::{LoginType, derive_username};
//!
//! let email = "first.last@domain.com";
//! assert_eq!(derive_username(email, LoginType::Email, false), "first.last");
//! assert_eq!(derive_username(email, LoginType::NoDot, false), "firstlast");
//! assert_eq!(derive_username(email, LoginType::FirstNoDotLast, false), "flast");
//! assert_eq!(derive_username(email, LoginType::FirstDotLast, false), "f.last");
//! assert_eq!(derive_username(email, LoginType::NoDot, true), email);
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strategy for turning an email address into a backend login name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum LoginType {
    /// Local part unchanged: `first.last@domain.com` -> `first.last`
    #[default]
    #[serde(rename = "AUTODISCOVER_LOGIN_EMAIL")]
    Email,
    /// Every `.` removed: `first.last@domain.com` -> `firstlast`
    #[serde(rename = "AUTODISCOVER_LOGIN_NO_DOT")]
    NoDot,
    /// First letter plus everything from the first `.` on, dots removed: `flast`
    #[serde(rename = "AUTODISCOVER_LOGIN_F_NO_DOT_LAST")]
    FirstNoDotLast,
    /// First letter plus everything from the first `.` on: `f.last`
    #[serde(rename = "AUTODISCOVER_LOGIN_F_DOT_LAST")]
    FirstDotLast,
}

impl LoginType {
    /// All strategies in their numeric configuration order.
    pub const ALL: [LoginType; 4] = [
        LoginType::Email,
        LoginType::NoDot,
        LoginType::FirstNoDotLast,
        LoginType::FirstDotLast,
    ];

    /// Configuration constant name of this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginType::Email => "AUTODISCOVER_LOGIN_EMAIL",
            LoginType::NoDot => "AUTODISCOVER_LOGIN_NO_DOT",
            LoginType::FirstNoDotLast => "AUTODISCOVER_LOGIN_F_NO_DOT_LAST",
            LoginType::FirstDotLast => "AUTODISCOVER_LOGIN_F_DOT_LAST",
        }
    }

    /// Numeric code used by older configuration files.
    pub fn code(&self) -> u8 {
        match self {
            LoginType::Email => 0,
            LoginType::NoDot => 1,
            LoginType::FirstNoDotLast => 2,
            LoginType::FirstDotLast => 3,
        }
    }

    /// Look up a strategy by its numeric code.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| u64::from(t.code()) == code)
    }

    /// Apply the strategy to an already extracted local part.
    pub fn apply(&self, local_part: &str) -> String {
        match self {
            LoginType::Email => local_part.to_string(),
            LoginType::NoDot => local_part.replace('.', ""),
            LoginType::FirstNoDotLast => cut_after_first_letter(local_part).replace('.', ""),
            LoginType::FirstDotLast => cut_after_first_letter(local_part),
        }
    }
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a login type name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown AUTODISCOVER_LOGIN_TYPE '{0}'")]
pub struct UnknownLoginType(pub String);

impl FromStr for LoginType {
    type Err = UnknownLoginType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u64>() {
            return Self::from_code(code).ok_or_else(|| UnknownLoginType(s.to_string()));
        }

        let normalized = trimmed.to_ascii_uppercase();
        let short = normalized
            .strip_prefix("AUTODISCOVER_LOGIN_")
            .unwrap_or(&normalized);
        match short {
            "EMAIL" => Ok(LoginType::Email),
            "NO_DOT" => Ok(LoginType::NoDot),
            "F_NO_DOT_LAST" => Ok(LoginType::FirstNoDotLast),
            "F_DOT_LAST" => Ok(LoginType::FirstDotLast),
            _ => Err(UnknownLoginType(s.to_string())),
        }
    }
}

// Accepts both constant names and the numeric codes.
impl<'de> Deserialize<'de> for LoginType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(UnknownLoginType(code.to_string()))),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Substring of an email address before the first `@`.
///
/// Input without `@` is returned whole.
pub fn local_part(email: &str) -> &str {
    email.split_once('@').map_or(email, |(local, _)| local)
}

/// Split a `DOMAIN\user` login into `(user, domain)`.
pub fn split_domain_user(login: &str) -> (&str, Option<&str>) {
    match login.split_once('\\') {
        Some((domain, user)) => (user, Some(domain)),
        None => (login, None),
    }
}

/// Derive the backend login name for `email`.
///
/// With `use_full_email` the address is returned unchanged regardless of the
/// strategy. Otherwise the strategy is applied to the local part.
pub fn derive_username(email: &str, login_type: LoginType, use_full_email: bool) -> String {
    if use_full_email {
        return email.to_string();
    }
    login_type.apply(local_part(email))
}

/// Keep the first character and drop everything between it and the first
/// `.` after it. A local part with no such dot is returned unchanged.
fn cut_after_first_letter(local_part: &str) -> String {
    let mut chars = local_part.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let rest = chars.as_str();
    match rest.find('.') {
        Some(dot) => {
            let mut username = String::with_capacity(local_part.len());
            username.push(first);
            username.push_str(&rest[dot..]);
            username
        }
        None => local_part.to_string(),
    }
}
