//! # Autodiscover Configuration Checker
//!
//! A command-line utility that loads an autodiscover configuration file, runs
//! the same startup validation the service runs, and shows which login name
//! each given email address would be authenticated with.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin autodiscover-check autodiscover.json
//! cargo run --bin autodiscover-check autodiscover.json first.last@example.com
//! ```
//!
//! ## Output Example
//!
//! ```text
//! Checking configuration: autodiscover.json
//! ✓ Configuration is valid!
//!
//! Configuration Summary:
//!   Timezone: Europe/Amsterdam (now 2024-05-02 14:03:11 CEST)
//!   Login type: AUTODISCOVER_LOGIN_F_DOT_LAST
//!   Full email login: false
//!   Announced host: (request Host header)
//!   Auth realm: ZPush
//!   Log failed logins: false
//!   Max input size: 8192 bytes
//!   Log backend: syslog (INFO)
//!
//! Login names:
//!   first.last@example.com -> f.last
//! ```
//!
//! ## Exit Codes
//!
//! - `0`: The configuration is valid
//! - `1`: The configuration could not be read or failed validation
//!
//! Log output goes through `env_logger` at the configured `LOGLEVEL`, with
//! timestamps in the configured `TIMEZONE`; `RUST_LOG` takes precedence when set.

use activesync_autodiscover::{AutodiscoverConfig, derive_username};
use chrono::Utc;
use std::env;
use std::io::Write;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [email ...]", args[0]);
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  {} autodiscover.json", args[0]);
        eprintln!("  {} autodiscover.json first.last@example.com", args[0]);
        process::exit(1);
    }

    let path = &args[1];
    println!("Checking configuration: {}", path);

    let config = match AutodiscoverConfig::from_file(path).and_then(AutodiscoverConfig::validate) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration check failed: {}", e);
            process::exit(1);
        }
    };

    let timezone = config.timezone();
    env_logger::Builder::new()
        .filter_level(config.logging.level.to_level_filter())
        .parse_default_env()
        .format(move |buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Utc::now().with_timezone(&timezone).format("%d/%m/%Y %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
    log::debug!("Configuration loaded from {}", path);

    println!("✓ Configuration is valid!");
    print_summary(&config);

    if args.len() > 2 {
        println!("\nLogin names:");
        for email in &args[2..] {
            let login = derive_username(email, config.login_type, config.use_full_email_for_login);
            println!("  {} -> {}", email, login);
        }
    }
}

fn print_summary(config: &AutodiscoverConfig) {
    println!("\nConfiguration Summary:");
    let timezone = config.timezone();
    println!(
        "  Timezone: {} (now {})",
        timezone.name(),
        Utc::now().with_timezone(&timezone).format("%Y-%m-%d %H:%M:%S %Z")
    );
    println!("  Login type: {}", config.login_type);
    println!("  Full email login: {}", config.use_full_email_for_login);
    println!(
        "  Announced host: {}",
        config
            .zpush_host
            .as_deref()
            .unwrap_or("(request Host header)")
    );
    println!("  Auth realm: {}", config.auth_realm);
    println!("  Log failed logins: {}", config.logging.auth_fail);
    println!("  Max input size: {} bytes", config.max_input_size);
    println!(
        "  Log backend: {} ({})",
        config.logging.log_backend(),
        config.logging.level.as_str()
    );
    if let Some(base) = &config.real_base_path {
        println!("  Sync installation: {}", base.display());
    }
}
