//! Environment-derived settings, resolved once per invocation.

use std::time::Duration;

const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 20;
const DEFAULT_SSH_CLIENT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Skip all certificate handling and disable server verification.
    pub disable_security: bool,
    pub socket_timeout: Duration,
    pub ssh_client_timeout: Duration,
    /// Password used instead of prompting (test automation).
    pub test_password: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            disable_security: false,
            socket_timeout: Duration::from_secs(DEFAULT_SOCKET_TIMEOUT_SECS),
            ssh_client_timeout: Duration::from_secs(DEFAULT_SSH_CLIENT_TIMEOUT_SECS),
            test_password: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            disable_security: lookup("APPDEV_DISABLE_SECURITY")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            socket_timeout: seconds(lookup("APPDEV_SOCKET_TIMEOUT"))
                .unwrap_or(defaults.socket_timeout),
            ssh_client_timeout: seconds(lookup("APPDEV_SSH_CLIENT_TIMEOUT"))
                .unwrap_or(defaults.ssh_client_timeout),
            test_password: lookup("APPDEV_TEST_PWD").filter(|p| !p.is_empty()),
        }
    }
}

fn seconds(value: Option<String>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
