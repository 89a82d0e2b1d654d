//! Startup configuration for the autodiscover service.
//!
//! The configuration is read once, validated once and then handed to
//! [`AutodiscoverHandler`](crate::handler::AutodiscoverHandler) by value. Field
//! names on the wire match the option names operators already know from
//! existing deployments (`USE_FULLEMAIL_FOR_LOGIN`, `ZPUSH_HOST`, ...).
//!
//! # Examples
//!
//! ```rust
//! use activesync_autodiscover::config::AutodiscoverConfig;
//! use activesync_autodiscover::username::LoginType;
//!
//! let config = AutodiscoverConfig::from_json_str(r#"{
//!     "AUTODISCOVER_LOGIN_TYPE": "AUTODISCOVER_LOGIN_F_DOT_LAST",
//!     "ZPUSH_HOST": "sync.example.com",
//!     "LOGBACKEND": "syslog"
//! }"#)?
//! .validate()?;
//!
//! assert_eq!(config.login_type, LoginType::FirstDotLast);
//! assert_eq!(config.zpush_host.as_deref(), Some("sync.example.com"));
//! # Ok::<(), activesync_autodiscover::ConfigError>(())
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::username::LoginType;
use chrono_tz::Tz;
use log::LevelFilter;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Largest request body the service accepts, in bytes.
pub const MAX_INPUT_SIZE: usize = 8192;

/// Timezone used when none is configured.
pub const DEFAULT_TIMEZONE: &str = "Europe/Amsterdam";

/// Realm announced in the `WWW-Authenticate` challenge by default.
pub const DEFAULT_AUTH_REALM: &str = "ZPush";

/// Process-wide configuration, immutable once validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutodiscoverConfig {
    /// Default timezone of the process (IANA name)
    #[serde(rename = "TIMEZONE", deserialize_with = "empty_as_none")]
    pub timezone: Option<String>,

    /// Filesystem root of the autodiscover installation
    #[serde(rename = "BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Root of the main sync installation, derived from `BASE_PATH` when unset
    #[serde(rename = "REAL_BASE_PATH")]
    pub real_base_path: Option<PathBuf>,

    /// Authenticate with the complete email address instead of a derived name
    #[serde(rename = "USE_FULLEMAIL_FOR_LOGIN")]
    pub use_full_email_for_login: bool,

    /// How the login name is derived from the email address
    #[serde(rename = "AUTODISCOVER_LOGIN_TYPE")]
    pub login_type: LoginType,

    /// Host announced in the server URL, overriding the request's Host header
    #[serde(rename = "ZPUSH_HOST", deserialize_with = "empty_as_none")]
    pub zpush_host: Option<String>,

    /// Realm sent with the Basic authentication challenge
    #[serde(rename = "AUTH_REALM")]
    pub auth_realm: String,

    /// Maximum accepted request body size in bytes
    #[serde(rename = "MAX_INPUT_SIZE")]
    pub max_input_size: usize,

    /// Name of the backend the host application should load
    #[serde(rename = "BACKEND_PROVIDER", deserialize_with = "empty_as_none")]
    pub backend_provider: Option<String>,

    /// Logging sink settings
    #[serde(flatten)]
    pub logging: LoggingConfig,
}

impl Default for AutodiscoverConfig {
    fn default() -> Self {
        Self {
            timezone: None,
            base_path: None,
            real_base_path: None,
            use_full_email_for_login: false,
            login_type: LoginType::Email,
            zpush_host: None,
            auth_realm: DEFAULT_AUTH_REALM.to_string(),
            max_input_size: MAX_INPUT_SIZE,
            backend_provider: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AutodiscoverConfig {
    /// Parse a configuration from JSON. The result is not yet validated.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file. The result is not yet validated.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Use the complete email address as the login name.
    pub fn with_full_email_login(mut self, enabled: bool) -> Self {
        self.use_full_email_for_login = enabled;
        self
    }

    /// Set the login name derivation strategy.
    pub fn with_login_type(mut self, login_type: LoginType) -> Self {
        self.login_type = login_type;
        self
    }

    /// Announce `host` in the server URL instead of the request host.
    pub fn with_zpush_host(mut self, host: impl Into<String>) -> Self {
        self.zpush_host = Some(host.into());
        self
    }

    /// Set the realm of the Basic authentication challenge.
    pub fn with_auth_realm(mut self, realm: impl Into<String>) -> Self {
        self.auth_realm = realm.into();
        self
    }

    /// Set the maximum accepted request body size.
    pub fn with_max_input_size(mut self, bytes: usize) -> Self {
        self.max_input_size = bytes;
        self
    }

    /// Set the default timezone.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Replace the logging settings.
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Check the configuration and fill in derived defaults.
    ///
    /// This is meant to run once at startup; any error here means the
    /// service must not start.
    pub fn validate(mut self) -> ConfigResult<Self> {
        match &self.timezone {
            Some(name) => {
                name.parse::<Tz>().map_err(|_| {
                    ConfigError::misconfiguration(format!(
                        "The configured TIMEZONE '{}' is not valid. Please use an IANA timezone name such as 'Europe/London'",
                        name
                    ))
                })?;
            }
            None => self.timezone = Some(DEFAULT_TIMEZONE.to_string()),
        }

        if self.real_base_path.is_none() {
            self.real_base_path = self.base_path.as_ref().map(|base| {
                PathBuf::from(base.to_string_lossy().replace("autodiscover/", ""))
            });
        }

        if self.auth_realm.trim().is_empty() {
            return Err(ConfigError::misconfiguration("The AUTH_REALM cannot be empty."));
        }

        if self.max_input_size == 0 {
            return Err(ConfigError::misconfiguration(
                "The MAX_INPUT_SIZE must be greater than zero.",
            ));
        }

        self.logging.validate()?;
        Ok(self)
    }

    /// The configured timezone, falling back to the default.
    pub fn timezone(&self) -> Tz {
        self.timezone
            .as_deref()
            .and_then(|name| name.parse().ok())
            .unwrap_or(chrono_tz::Europe::Amsterdam)
    }
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogBackend {
    /// Plain log files below `LOGFILEDIR`
    FileLog,
    /// Local or remote syslog
    Syslog,
    /// A backend supplied by the host application
    Custom(String),
}

impl LogBackend {
    fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "filelog" => LogBackend::FileLog,
            "syslog" => LogBackend::Syslog,
            _ => LogBackend::Custom(name.to_string()),
        }
    }
}

impl fmt::Display for LogBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogBackend::FileLog => f.write_str("filelog"),
            LogBackend::Syslog => f.write_str("syslog"),
            LogBackend::Custom(name) => f.write_str(name),
        }
    }
}

/// Logging sink settings.
///
/// The sink itself belongs to the host application; these settings are
/// validated at startup so a broken sink is reported before any request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    #[serde(rename = "LOGBACKEND")]
    pub backend: String,

    #[serde(rename = "LOGFILEDIR", deserialize_with = "empty_as_none")]
    pub file_dir: Option<String>,

    #[serde(rename = "LOGFILE", deserialize_with = "empty_as_none")]
    pub file: Option<String>,

    #[serde(rename = "LOGERRORFILE", deserialize_with = "empty_as_none")]
    pub error_file: Option<String>,

    #[serde(rename = "LOGLEVEL")]
    pub level: LogLevel,

    #[serde(rename = "LOG_SYSLOG_HOST", deserialize_with = "empty_as_none")]
    pub syslog_host: Option<String>,

    #[serde(rename = "LOG_SYSLOG_PORT")]
    pub syslog_port: Option<u16>,

    #[serde(rename = "LOG_SYSLOG_PROGRAM", deserialize_with = "empty_as_none")]
    pub syslog_program: Option<String>,

    #[serde(rename = "LOG_SYSLOG_FACILITY", deserialize_with = "empty_as_none")]
    pub syslog_facility: Option<String>,

    /// Name the email and client address of failed logins (for fail2ban)
    #[serde(rename = "LOGAUTHFAIL")]
    pub auth_fail: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            backend: "filelog".to_string(),
            file_dir: Some("/var/log/z-push/".to_string()),
            file: None,
            error_file: None,
            level: LogLevel::Info,
            syslog_host: None,
            syslog_port: None,
            syslog_program: None,
            syslog_facility: None,
            auth_fail: false,
        }
    }
}

impl LoggingConfig {
    /// Syslog logging with defaults for everything else.
    pub fn syslog() -> Self {
        Self {
            backend: "syslog".to_string(),
            file_dir: None,
            ..Self::default()
        }
    }

    /// File logging into `dir`, which must end with `/`.
    pub fn file_log(dir: impl Into<String>) -> Self {
        Self {
            backend: "filelog".to_string(),
            file_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Log the email and client address of failed logins.
    pub fn with_auth_fail(mut self, enabled: bool) -> Self {
        self.auth_fail = enabled;
        self
    }

    /// The parsed sink kind.
    pub fn log_backend(&self) -> LogBackend {
        LogBackend::parse(&self.backend)
    }

    fn validate(&mut self) -> ConfigResult<()> {
        match self.log_backend() {
            LogBackend::Syslog => self.validate_syslog(),
            LogBackend::FileLog => self.validate_file_log(),
            LogBackend::Custom(_) => Ok(()),
        }
    }

    fn validate_syslog(&mut self) -> ConfigResult<()> {
        self.syslog_facility
            .get_or_insert_with(|| "LOG_LOCAL0".to_string());
        self.syslog_program
            .get_or_insert_with(|| "z-push-autodiscover".to_string());
        let port = *self.syslog_port.get_or_insert(514);

        if self.syslog_host.is_some() && port == 0 {
            return Err(ConfigError::misconfiguration(
                "LOG_SYSLOG_HOST is defined but the LOG_SYSLOG_PORT does not seem to be valid.",
            ));
        }
        Ok(())
    }

    fn validate_file_log(&mut self) -> ConfigResult<()> {
        let dir = self.file_dir.clone().ok_or_else(|| {
            ConfigError::misconfiguration(
                "The LOGFILEDIR is not configured. Check if the config file is in place.",
            )
        })?;

        if !dir.ends_with('/') {
            return Err(ConfigError::misconfiguration(
                "The LOGFILEDIR should terminate with a '/'",
            ));
        }

        if !Path::new(&dir).is_dir() {
            return Err(ConfigError::misconfiguration(
                "The configured LOGFILEDIR does not exist or can not be accessed.",
            ));
        }

        let file = self
            .file
            .get_or_insert_with(|| format!("{}autodiscover.log", dir))
            .clone();
        let error_file = self
            .error_file
            .get_or_insert_with(|| format!("{}autodiscover-error.log", dir))
            .clone();

        ensure_writable(&file, "LOGFILE")?;
        ensure_writable(&error_file, "LOGERRORFILE")?;
        Ok(())
    }
}

fn ensure_writable(path: &str, option: &str) -> ConfigResult<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| {
            ConfigError::misconfiguration(format!(
                "The configured {} can not be modified: {}",
                option, e
            ))
        })
}

/// Verbosity levels understood by the `LOGLEVEL` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum LogLevel {
    #[serde(rename = "LOGLEVEL_OFF")]
    Off,
    #[serde(rename = "LOGLEVEL_FATAL")]
    Fatal,
    #[serde(rename = "LOGLEVEL_ERROR")]
    Error,
    #[serde(rename = "LOGLEVEL_WARN")]
    Warn,
    #[default]
    #[serde(rename = "LOGLEVEL_INFO")]
    Info,
    #[serde(rename = "LOGLEVEL_DEBUG")]
    Debug,
    #[serde(rename = "LOGLEVEL_WBXML")]
    Wbxml,
    #[serde(rename = "LOGLEVEL_DEVICEID")]
    DeviceId,
    #[serde(rename = "LOGLEVEL_WBXMLSTACK")]
    WbxmlStack,
}

impl LogLevel {
    const NAMED: [(LogLevel, &'static str, u64); 9] = [
        (LogLevel::Off, "OFF", 0),
        (LogLevel::Fatal, "FATAL", 1),
        (LogLevel::Error, "ERROR", 2),
        (LogLevel::Warn, "WARN", 4),
        (LogLevel::Info, "INFO", 8),
        (LogLevel::Debug, "DEBUG", 16),
        (LogLevel::Wbxml, "WBXML", 32),
        (LogLevel::DeviceId, "DEVICEID", 64),
        (LogLevel::WbxmlStack, "WBXMLSTACK", 128),
    ];

    /// Parse `LOGLEVEL_INFO`, `info` or the numeric constant `8`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(code) = value.parse::<u64>() {
            return Self::from_code(code);
        }
        let upper = value.to_ascii_uppercase();
        let short = upper.strip_prefix("LOGLEVEL_").unwrap_or(&upper);
        Self::NAMED
            .iter()
            .find(|(_, name, _)| *name == short)
            .map(|(level, _, _)| *level)
    }

    /// Short name such as `INFO`.
    pub fn as_str(self) -> &'static str {
        Self::NAMED
            .iter()
            .find(|(level, _, _)| *level == self)
            .map_or("INFO", |(_, name, _)| *name)
    }

    /// Look up a level by its numeric constant.
    pub fn from_code(code: u64) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, _, c)| *c == code)
            .map(|(level, _, _)| *level)
    }

    /// The `log` crate filter for this level.
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Fatal | LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Wbxml | LogLevel::DeviceId | LogLevel::WbxmlStack => LevelFilter::Trace,
        }
    }
}

impl<'de> Deserialize<'de> for LogLevel {
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

        let level = match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::from_code(code),
            Raw::Name(name) => Self::parse(&name),
        };
        level.ok_or_else(|| serde::de::Error::custom("unknown LOGLEVEL"))
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}
